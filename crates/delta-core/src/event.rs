//! Event records emitted by every state-changing call
//!
//! User operations record the economic parties (payer, beneficiary) and the
//! amount; admin setters record the old and new value.

use crate::clock::Clock;
use crate::types::{amount_string, Address, Amount};
use serde::{Deserialize, Serialize};

/// Typed event payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    // === Ownership ===
    OwnershipTransferred {
        previous: Address,
        new: Address,
    },

    // === Asset ledger ===
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    Approval {
        owner: Address,
        spender: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },

    // === Earning pool ===
    Deposited {
        payer: Address,
        beneficiary: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    Withdrawn {
        payer: Address,
        beneficiary: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    Dispensed {
        token: Address,
        recipient: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    WithdrawFeeFactorChanged {
        #[serde(with = "amount_string")]
        old: Amount,
        #[serde(with = "amount_string")]
        new: Amount,
    },
    EarningRecipientChanged {
        old: Option<Address>,
        new: Option<Address>,
    },
    RewardRecipientChanged {
        old: Option<Address>,
        new: Option<Address>,
    },
    EarningDispenseThresholdChanged {
        #[serde(with = "amount_string")]
        old: Amount,
        #[serde(with = "amount_string")]
        new: Amount,
    },
    RewardDispenseThresholdChanged {
        #[serde(with = "amount_string")]
        old: Amount,
        #[serde(with = "amount_string")]
        new: Amount,
    },

    // === Reward pools ===
    Promoted {
        manager: Address,
    },
    Demoted {
        manager: Address,
    },
    SharesMinted {
        account: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    SharesBurned {
        account: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    Staked {
        payer: Address,
        beneficiary: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    StakeWithdrawn {
        payer: Address,
        beneficiary: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    RewardPaid {
        account: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    RewardAdded {
        #[serde(with = "amount_string")]
        amount: Amount,
        #[serde(with = "amount_string")]
        rate: Amount,
        period_finish: u64,
    },
    RewardRateChanged {
        #[serde(with = "amount_string")]
        old: Amount,
        #[serde(with = "amount_string")]
        new: Amount,
    },
    RemainingRewardsWithdrawn {
        recipient: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },

    // === Pool token ===
    Minted {
        payer: Address,
        beneficiary: Address,
        underlying: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    Redeemed {
        payer: Address,
        beneficiary: Address,
        underlying: Address,
        #[serde(with = "amount_string")]
        amount: Amount,
    },
    Swapped {
        payer: Address,
        beneficiary: Address,
        underlying_from: Address,
        #[serde(with = "amount_string")]
        amount_from: Amount,
        underlying_to: Address,
        #[serde(with = "amount_string")]
        amount_to: Amount,
    },
    EarningPoolAdded {
        earning_pool: Address,
        underlying: Address,
    },
    Paused {
        underlying: Address,
    },
    Unpaused {
        underlying: Address,
    },
    NameChanged {
        old: String,
        new: String,
    },
    SymbolChanged {
        old: String,
        new: String,
    },
}

/// An event together with where and when it was emitted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Emitting contract
    pub emitter: Address,

    pub timestamp: u64,

    pub block: u64,

    #[serde(flatten)]
    pub event: Event,
}

/// Append-only event log
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, emitter: Address, clock: &Clock, event: Event) {
        tracing::trace!(%emitter, ?event, "event");
        self.records.push(EventRecord {
            emitter,
            timestamp: clock.timestamp(),
            block: clock.block(),
            event,
        });
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent event emitted by `emitter`
    pub fn last_from(&self, emitter: Address) -> Option<&Event> {
        self.records
            .iter()
            .rev()
            .find(|r| r.emitter == emitter)
            .map(|r| &r.event)
    }

    /// Whether `event` was emitted by `emitter`
    pub fn contains(&self, emitter: Address, event: &Event) -> bool {
        self.records
            .iter()
            .any(|r| r.emitter == emitter && &r.event == event)
    }

    /// Records emitted since position `mark`
    pub fn since(&self, mark: usize) -> &[EventRecord] {
        &self.records[mark.min(self.records.len())..]
    }
}
