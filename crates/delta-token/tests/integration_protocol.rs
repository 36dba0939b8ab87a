//! Integration tests for the Delta protocol
//!
//! These tests drive a deployed pool token end to end: minting and
//! redeeming across underlyings of different precision, venue interest and
//! earning dispensing, swaps, mining rewards, and all-or-nothing calls.

use delta_core::math::MANTISSA_ONE;
use delta_core::{Address, Amount, DeltaError, UNLIMITED_ALLOWANCE};
use delta_token::config::{
    asset_address, earning_pool_address, staking_pool_address, AssetConfig, EarningPoolConfig,
    StakingPoolConfig,
};
use delta_token::{DeploymentConfig, Protocol, ProtocolHandle};

const ONE: u128 = MANTISSA_ONE;

/// Two underlyings (6 and 18 decimals) over venues at exchange rate 10,
/// earnings sent to a DELT staking pool, 10 DELT mined per block
fn feature_config() -> DeploymentConfig {
    let mut config = DeploymentConfig::default();
    config.assets = vec![
        AssetConfig { symbol: "UDO".to_string(), decimals: 6 },
        AssetConfig { symbol: "UDT".to_string(), decimals: 18 },
        AssetConfig { symbol: "DELT".to_string(), decimals: 18 },
        AssetConfig { symbol: "COMP".to_string(), decimals: 18 },
    ];
    config.reward_pool.rate = 10 * ONE;
    config.reward_pool.funding = 10_000 * ONE;
    config.earning_pools = ["UDO", "UDT"]
        .into_iter()
        .map(|symbol| EarningPoolConfig {
            venue_exchange_rate: 10 * ONE,
            venue_reward_asset: Some("COMP".to_string()),
            earning_recipient: Some("staking-pool/DELT".to_string()),
            ..EarningPoolConfig::for_underlying(symbol)
        })
        .collect();
    config.staking_pools = vec![StakingPoolConfig {
        name: "DELT".to_string(),
        stake_asset: "DELT".to_string(),
        reward_asset: "COMP".to_string(),
        emission: delta_token::config::EmissionMode::PerBlock,
        rate: 10 * ONE,
        duration_secs: 0,
        funding: 0,
        start_timestamp: 0,
    }];
    config
}

struct Setup {
    protocol: Protocol,
    admin: Address,
    user: Address,
    udo: Address,
    udt: Address,
}

fn setup() -> Setup {
    let mut protocol = feature_config().deploy().unwrap();
    let token = protocol.token().address();
    let user = Address::from_label("user");
    let (udo, udt) = (asset_address("UDO"), asset_address("UDT"));

    protocol.mint_asset(udo, user, 100_000_000).unwrap();
    protocol.mint_asset(udt, user, 100 * ONE).unwrap();
    protocol.approve_asset(udo, user, token, UNLIMITED_ALLOWANCE).unwrap();
    protocol.approve_asset(udt, user, token, UNLIMITED_ALLOWANCE).unwrap();

    Setup { protocol, admin: Address::from_label("admin"), user, udo, udt }
}

fn pool_value(protocol: &Protocol, underlying: Address) -> Amount {
    protocol
        .earning_pool(&underlying)
        .unwrap()
        .calc_pool_value_in_underlying(protocol.env())
        .unwrap()
}

fn undispensed(protocol: &Protocol, underlying: Address) -> Amount {
    protocol
        .earning_pool(&underlying)
        .unwrap()
        .calc_undispensed_earning_in_underlying(protocol.env())
        .unwrap()
}

mod round_trip_tests {
    use super::*;

    #[test]
    fn test_mint_and_redeem_multiple_underlyings() {
        let Setup { mut protocol, user, udo, udt, .. } = setup();

        protocol.mint(user, user, udo, 100_000_000).unwrap();
        protocol.mint(user, user, udt, 100 * ONE).unwrap();

        assert_eq!(protocol.env().balance_of(&udo, &user), 0);
        assert_eq!(protocol.env().balance_of(&udt, &user), 0);
        assert_eq!(pool_value(&protocol, udo), 100_000_000);
        assert_eq!(pool_value(&protocol, udt), 100 * ONE);
        assert_eq!(protocol.token().total_supply(), 200 * ONE);
        assert_eq!(protocol.token().balance_of(&user), 200 * ONE);

        protocol.redeem(user, user, udo, 100_000_000).unwrap();
        protocol.redeem(user, user, udt, 100 * ONE).unwrap();

        assert_eq!(protocol.env().balance_of(&udo, &user), 100_000_000);
        assert_eq!(protocol.env().balance_of(&udt, &user), 100 * ONE);
        assert_eq!(pool_value(&protocol, udo), 0);
        assert_eq!(pool_value(&protocol, udt), 0);
        assert_eq!(protocol.token().total_supply(), 0);
        assert_eq!(protocol.contracts().reward_pool.shares_of(&user), 0);
    }

    #[test]
    fn test_redeem_into_other_underlying() {
        let Setup { mut protocol, user, udo, udt, .. } = setup();
        protocol.mint(user, user, udt, 100 * ONE).unwrap();

        // balance minted with UDT is redeemable as UDO once UDO is deposited
        let other = Address::from_label("other");
        protocol.mint_asset(udo, other, 50_000_000).unwrap();
        let token = protocol.token().address();
        protocol.approve_asset(udo, other, token, 50_000_000).unwrap();
        protocol.mint(other, other, udo, 50_000_000).unwrap();

        protocol.redeem(user, user, udo, 50_000_000).unwrap();
        assert_eq!(protocol.env().balance_of(&udo, &user), 150_000_000);
        assert_eq!(protocol.token().balance_of(&user), 50 * ONE);
    }

    #[test]
    fn test_unaligned_amounts_redeem_in_full() {
        let Setup { mut protocol, user, udo, .. } = setup();

        // 15 base units at 10 per venue unit
        protocol.mint(user, user, udo, 15).unwrap();
        assert_eq!(pool_value(&protocol, udo), 15);
        assert_eq!(protocol.redeem(user, user, udo, 15).unwrap(), 15);
        assert_eq!(protocol.env().balance_of(&udo, &user), 100_000_000);
        assert_eq!(protocol.token().total_supply(), 0);
    }

    #[test]
    fn test_sample_deployment_round_trips_odd_amount() {
        let config = DeploymentConfig::from_toml_str(include_str!("../../../demos/deployment.toml")).unwrap();
        let mut protocol = config.deploy().unwrap();
        let token = protocol.token().address();
        let alice = Address::from_label("alice");
        let dai = asset_address("DAI");
        let amount = ONE + 1;

        protocol.mint_asset(dai, alice, amount).unwrap();
        protocol.approve_asset(dai, alice, token, UNLIMITED_ALLOWANCE).unwrap();
        assert_eq!(protocol.mint(alice, alice, dai, amount).unwrap(), amount);
        assert_eq!(pool_value(&protocol, dai), amount);

        assert_eq!(protocol.redeem(alice, alice, dai, amount).unwrap(), amount);
        assert_eq!(protocol.env().balance_of(&dai, &alice), amount);
        assert_eq!(protocol.token().balance_of(&alice), 0);
    }

    #[test]
    fn test_withdraw_fee_on_redeem() {
        let Setup { mut protocol, admin, user, udt, .. } = setup();
        protocol
            .with_earning_pool(udt, |pool, env| pool.set_withdraw_fee_factor(env, admin, ONE / 10))
            .unwrap();
        protocol.mint(user, user, udt, 100 * ONE).unwrap();

        let sent = protocol.redeem(user, user, udt, 100 * ONE).unwrap();

        assert_eq!(sent, 90 * ONE);
        assert_eq!(protocol.env().balance_of(&udt, &user), 90 * ONE);
        assert_eq!(protocol.token().balance_of(&user), 0);
        assert_eq!(pool_value(&protocol, udt), 10 * ONE);
        assert_eq!(undispensed(&protocol, udt), 10 * ONE);
    }
}

mod earning_tests {
    use super::*;

    #[test]
    fn test_interest_accrues_per_pool() {
        let Setup { mut protocol, user, udo, udt, .. } = setup();
        protocol.mint(user, user, udo, 100_000_000).unwrap();
        protocol.mint(user, user, udt, 100 * ONE).unwrap();

        protocol.accrue_interest(udo, 2 * ONE).unwrap();
        protocol.accrue_interest(udt, 4 * ONE).unwrap();

        assert_eq!(undispensed(&protocol, udo), 100_000_000);
        assert_eq!(undispensed(&protocol, udt), 300 * ONE);

        // principal leaves, earning stays behind for the dispenser
        protocol.redeem(user, user, udo, 100_000_000).unwrap();
        assert_eq!(protocol.env().balance_of(&udo, &user), 100_000_000);
        assert_eq!(pool_value(&protocol, udo), 100_000_000);

        let staking = staking_pool_address("DELT");
        assert_eq!(protocol.dispense_earning(udo).unwrap(), 100_000_000);
        assert_eq!(protocol.env().balance_of(&udo, &staking), 100_000_000);
        assert_eq!(pool_value(&protocol, udo), 0);
    }

    #[test]
    fn test_collect_earnings_twice() {
        let Setup { mut protocol, user, udo, udt, .. } = setup();
        let staking = staking_pool_address("DELT");

        protocol.mint(user, user, udo, 10_000_000).unwrap();
        protocol.mint(user, user, udt, 10 * ONE).unwrap();
        protocol.accrue_interest(udo, 2 * ONE).unwrap();
        protocol.accrue_interest(udt, 4 * ONE).unwrap();

        protocol.dispense_earning(udo).unwrap();
        protocol.dispense_earning(udt).unwrap();
        assert_eq!(protocol.env().balance_of(&udo, &staking), 10_000_000);
        assert_eq!(protocol.env().balance_of(&udt, &staking), 30 * ONE);
        assert_eq!(undispensed(&protocol, udo), 0);
        assert_eq!(pool_value(&protocol, udo), 10_000_000);
        assert_eq!(undispensed(&protocol, udt), 0);
        assert_eq!(pool_value(&protocol, udt), 10 * ONE);

        protocol.mint(user, user, udo, 10_000_000).unwrap();
        protocol.mint(user, user, udt, 10 * ONE).unwrap();
        protocol.accrue_interest(udo, 2 * ONE).unwrap();
        protocol.accrue_interest(udt, 2 * ONE).unwrap();

        protocol.dispense_earning(udo).unwrap();
        protocol.dispense_earning(udt).unwrap();
        assert_eq!(protocol.env().balance_of(&udo, &staking), 30_000_000);
        assert_eq!(protocol.env().balance_of(&udt, &staking), 50 * ONE);
        assert_eq!(pool_value(&protocol, udo), 20_000_000);
        assert_eq!(pool_value(&protocol, udt), 20 * ONE);
    }

    #[test]
    fn test_dispense_is_a_noop_below_threshold() {
        let Setup { mut protocol, admin, user, udt, .. } = setup();
        protocol
            .with_earning_pool(udt, |pool, env| pool.set_earning_dispense_threshold(env, admin, 50 * ONE))
            .unwrap();
        protocol.mint(user, user, udt, 10 * ONE).unwrap();
        protocol.accrue_interest(udt, 2 * ONE).unwrap();

        assert_eq!(protocol.dispense_earning(udt).unwrap(), 0);
        assert_eq!(undispensed(&protocol, udt), 10 * ONE);
    }

    #[test]
    fn test_provider_rewards_dispensed() {
        let Setup { mut protocol, admin, udt, .. } = setup();
        let recipient = Address::from_label("rewards-recipient");
        let comp = asset_address("COMP");
        protocol
            .with_earning_pool(udt, |pool, env| pool.set_reward_recipient(env, admin, Some(recipient)))
            .unwrap();
        let pool = earning_pool_address("UDT");
        let venue = protocol.earning_pool(&udt).unwrap().venue();
        protocol
            .with_earning_pool(udt, |_, env| env.distribute_venue_reward(&venue, &pool, 7 * ONE))
            .unwrap();

        assert_eq!(protocol.dispense_reward(udt).unwrap(), 7 * ONE);
        assert_eq!(protocol.env().balance_of(&comp, &recipient), 7 * ONE);
    }
}

mod swap_tests {
    use super::*;

    #[test]
    fn test_swap_between_decimals() {
        let Setup { mut protocol, user, udo, udt, .. } = setup();
        protocol.mint(user, user, udt, 100 * ONE).unwrap();
        let shares_before = protocol.contracts().reward_pool.shares_of(&user);

        let sent = protocol.swap(user, user, udo, 5_000_000, udt).unwrap();

        assert_eq!(sent, 5 * ONE);
        assert_eq!(protocol.env().balance_of(&udo, &user), 95_000_000);
        assert_eq!(protocol.env().balance_of(&udt, &user), 5 * ONE);
        assert_eq!(protocol.token().balance_of(&user), 100 * ONE);
        assert_eq!(protocol.contracts().reward_pool.shares_of(&user), shares_before);
    }

    #[test]
    fn test_swap_without_liquidity_fails() {
        let Setup { mut protocol, user, udo, udt, .. } = setup();
        let err = protocol.swap(user, user, udo, 1_000, udt).unwrap_err();
        assert_eq!(err, DeltaError::InsufficientLiquidity { required: 1_000_000_000_000_000, available: 0 });
        assert_eq!(protocol.env().balance_of(&udo, &user), 100_000_000);
    }

    #[test]
    fn test_swap_paused_source() {
        let Setup { mut protocol, admin, user, udo, udt } = setup();
        protocol.mint(user, user, udt, 100 * ONE).unwrap();
        protocol.pause(admin, udo).unwrap();

        assert_eq!(
            protocol.swap(user, user, udo, 1_000_000, udt),
            Err(DeltaError::UnderlyingPaused(udo))
        );
        // the paused underlying can still be swapped into
        protocol.mint(user, user, udo, 10_000_000).unwrap_err();
        protocol.unpause(admin, udo).unwrap();
        protocol.mint(user, user, udo, 10_000_000).unwrap();
        protocol.pause(admin, udo).unwrap();
        protocol.swap(user, user, udt, ONE, udo).unwrap();
        assert_eq!(protocol.env().balance_of(&udo, &user), 91_000_000);
    }
}

mod decimal_tests {
    use super::*;

    #[test]
    fn test_six_eighteen_and_twenty_decimals() {
        let mut config = DeploymentConfig::default();
        config.assets = vec![
            AssetConfig { symbol: "U6".to_string(), decimals: 6 },
            AssetConfig { symbol: "U18".to_string(), decimals: 18 },
            AssetConfig { symbol: "U20".to_string(), decimals: 20 },
            AssetConfig { symbol: "DELT".to_string(), decimals: 18 },
        ];
        config.earning_pools = ["U6", "U20", "U18"]
            .into_iter()
            .map(EarningPoolConfig::for_underlying)
            .collect();
        let mut protocol = config.deploy().unwrap();
        let token = protocol.token().address();
        let user = Address::from_label("user");
        let (u6, u18, u20) = (asset_address("U6"), asset_address("U18"), asset_address("U20"));
        for (asset, amount) in [(u6, 100_000_000), (u18, 100 * ONE), (u20, 100 * ONE * 100)] {
            protocol.mint_asset(asset, user, amount).unwrap();
            protocol.approve_asset(asset, user, token, UNLIMITED_ALLOWANCE).unwrap();
        }

        protocol.mint(user, user, u6, 100_000_000).unwrap();
        protocol.mint(user, user, u18, 100 * ONE).unwrap();
        protocol.mint(user, user, u20, 100 * ONE * 100).unwrap();
        assert_eq!(protocol.token().balance_of(&user), 300 * ONE);

        protocol.redeem(user, user, u6, 100_000_000).unwrap();
        assert_eq!(protocol.token().balance_of(&user), 200 * ONE);
        assert_eq!(protocol.env().balance_of(&u6, &user), 100_000_000);

        protocol.swap(user, user, u6, 100_000_000, u18).unwrap();
        assert_eq!(protocol.token().balance_of(&user), 200 * ONE);
        assert_eq!(protocol.env().balance_of(&u6, &user), 0);
        assert_eq!(protocol.env().balance_of(&u18, &user), 100 * ONE);

        protocol.redeem(user, user, u20, 100 * ONE * 100).unwrap();
        protocol.redeem(user, user, u6, 100_000_000).unwrap();
        assert_eq!(protocol.token().balance_of(&user), 0);
        assert_eq!(protocol.token().total_supply(), 0);
    }

    #[test]
    fn test_dust_below_token_precision_is_rejected() {
        let mut config = DeploymentConfig::default();
        config.assets.push(AssetConfig { symbol: "U20".to_string(), decimals: 20 });
        config.earning_pools.push(EarningPoolConfig::for_underlying("U20"));
        let mut protocol = config.deploy().unwrap();
        let token = protocol.token().address();
        let user = Address::from_label("user");
        let u20 = asset_address("U20");
        protocol.mint_asset(u20, user, 1_000).unwrap();
        protocol.approve_asset(u20, user, token, UNLIMITED_ALLOWANCE).unwrap();

        assert_eq!(
            protocol.mint(user, user, u20, 99).unwrap_err().to_string(),
            "mint must be greater than 0"
        );
        assert_eq!(protocol.mint(user, user, u20, 1_000).unwrap(), 10);

        // redeeming part of a token unit burns the whole unit
        protocol.redeem(user, user, u20, 150).unwrap();
        assert_eq!(protocol.token().balance_of(&user), 8);
    }
}

mod mining_tests {
    use super::*;

    #[test]
    fn test_minting_mines_delt() {
        let Setup { mut protocol, user, udt, .. } = setup();
        protocol.mint(user, user, udt, 10 * ONE).unwrap();
        protocol.mine(3, 13);
        assert_eq!(protocol.unclaimed_rewards(&user).unwrap(), 30 * ONE);

        let delt = asset_address("DELT");
        assert_eq!(protocol.claim_rewards(user).unwrap(), 30 * ONE);
        assert_eq!(protocol.env().balance_of(&delt, &user), 30 * ONE);
        assert_eq!(protocol.unclaimed_rewards(&user).unwrap(), 0);
    }

    #[test]
    fn test_first_minter_is_credited_for_idle_blocks() {
        let Setup { mut protocol, user, udt, .. } = setup();
        protocol.mine(3, 13);
        protocol.mint(user, user, udt, 10 * ONE).unwrap();
        assert_eq!(protocol.unclaimed_rewards(&user).unwrap(), 30 * ONE);
    }

    #[test]
    fn test_transfer_moves_future_rewards() {
        let Setup { mut protocol, user, udt, .. } = setup();
        let recipient = Address::from_label("recipient");
        protocol.mint(user, user, udt, 10 * ONE).unwrap();
        protocol.mine(1, 13);

        protocol.transfer(user, recipient, 10 * ONE).unwrap();
        protocol.mine(1, 13);

        assert_eq!(protocol.unclaimed_rewards(&user).unwrap(), 10 * ONE);
        assert_eq!(protocol.unclaimed_rewards(&recipient).unwrap(), 10 * ONE);
        assert_eq!(protocol.contracts().reward_pool.shares_of(&recipient), 10 * ONE);
    }

    #[test]
    fn test_transfer_from_splits_rewards() {
        let Setup { mut protocol, user, udt, .. } = setup();
        let spender = Address::from_label("spender");
        protocol.mint(user, user, udt, 10 * ONE).unwrap();
        protocol.approve(user, spender, UNLIMITED_ALLOWANCE);

        protocol.transfer_from(spender, user, spender, 5 * ONE).unwrap();
        protocol.mine(2, 13);

        assert_eq!(protocol.token().allowance(&user, &spender), UNLIMITED_ALLOWANCE);
        assert_eq!(protocol.unclaimed_rewards(&user).unwrap(), 10 * ONE);
        assert_eq!(protocol.unclaimed_rewards(&spender).unwrap(), 10 * ONE);
    }
}

mod atomicity_tests {
    use super::*;

    #[test]
    fn test_failed_mint_leaves_no_trace() {
        let Setup { mut protocol, admin, user, udt, .. } = setup();
        let token = protocol.token().address();
        protocol
            .execute(|_, c| {
                let (pool, env) = c.reward_pool_mut();
                pool.demote(env, admin, token)
            })
            .unwrap();
        let events = protocol.env().events.len();

        // the deposit leg succeeds, the reward-share leg fails
        assert_eq!(protocol.mint(user, user, udt, 10 * ONE), Err(DeltaError::NotManager(token)));

        assert_eq!(protocol.env().balance_of(&udt, &user), 100 * ONE);
        assert_eq!(protocol.token().total_supply(), 0);
        assert_eq!(protocol.token().balance_of(&user), 0);
        assert_eq!(protocol.earning_pool(&udt).unwrap().total_shares(), 0);
        assert_eq!(pool_value(&protocol, udt), 0);
        assert_eq!(protocol.env().events.len(), events);
    }

    #[test]
    fn test_failed_transfer_keeps_balances() {
        let Setup { mut protocol, admin, user, udt, .. } = setup();
        let token = protocol.token().address();
        protocol.mint(user, user, udt, 10 * ONE).unwrap();
        protocol
            .execute(|_, c| {
                let (pool, env) = c.reward_pool_mut();
                pool.demote(env, admin, token)
            })
            .unwrap();

        let recipient = Address::from_label("recipient");
        assert!(protocol.transfer(user, recipient, 10 * ONE).is_err());
        assert_eq!(protocol.token().balance_of(&user), 10 * ONE);
        assert_eq!(protocol.token().balance_of(&recipient), 0);
    }
}

mod staking_tests {
    use super::*;

    #[test]
    fn test_stake_and_exit_through_protocol() {
        let Setup { mut protocol, user, .. } = setup();
        let staking = staking_pool_address("DELT");
        let (delt, comp) = (asset_address("DELT"), asset_address("COMP"));
        protocol.mint_asset(delt, user, 50 * ONE).unwrap();
        protocol.approve_asset(delt, user, staking, 50 * ONE).unwrap();
        protocol.mint_asset(comp, staking, 1_000 * ONE).unwrap();

        protocol.stake(staking, user, user, 50 * ONE).unwrap();
        protocol.mine(2, 13);
        assert_eq!(protocol.claim_staking_rewards(staking, user).unwrap(), 20 * ONE);

        protocol.mine(1, 13);
        assert_eq!(protocol.exit_staking(staking, user).unwrap(), (50 * ONE, 10 * ONE));
        assert_eq!(protocol.env().balance_of(&delt, &user), 50 * ONE);
        assert_eq!(protocol.env().balance_of(&comp, &user), 30 * ONE);
    }
}

mod handle_tests {
    use super::*;

    #[test]
    fn test_concurrent_mints_are_serialized() {
        let Setup { mut protocol, udt, .. } = setup();
        let token = protocol.token().address();
        let users: Vec<Address> = (0..4).map(|i| Address::from_label(&format!("minter-{i}"))).collect();
        for user in &users {
            protocol.mint_asset(udt, *user, 10 * ONE).unwrap();
            protocol.approve_asset(udt, *user, token, UNLIMITED_ALLOWANCE).unwrap();
        }
        let handle = ProtocolHandle::new(protocol);

        std::thread::scope(|s| {
            for user in &users {
                let handle = handle.clone();
                s.spawn(move || {
                    for _ in 0..10 {
                        handle.with(|p| p.mint(*user, *user, udt, ONE)).unwrap();
                    }
                });
            }
        });

        let stats = handle.stats().unwrap();
        assert_eq!(stats.token.total_supply, 40 * ONE);
        assert_eq!(stats.reward_pool.total_shares, 40 * ONE);
        handle.with(|p| {
            for user in &users {
                assert_eq!(p.token().balance_of(user), 10 * ONE);
            }
        });
    }

    #[test]
    fn test_stats_serialize() {
        let Setup { mut protocol, user, udt, .. } = setup();
        protocol.mint(user, user, udt, 10 * ONE).unwrap();
        let json = serde_json::to_value(protocol.stats().unwrap()).unwrap();
        assert_eq!(json["token"]["total_supply"], "10000000000000000000");
        assert_eq!(json["earning_pools"].as_array().unwrap().len(), 2);
        assert_eq!(json["reward_pool"]["emission"]["mode"], "per_block");
    }
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// Amounts are base units of the named underlying, or pool token units
    /// for transfers
    #[derive(Clone, Debug)]
    enum Op {
        Mint { user: usize, udo: bool, amount: u128 },
        Redeem { user: usize, udo: bool, amount: u128 },
        Transfer { from: usize, to: usize, amount: u128 },
        Swap { user: usize, udo_in: bool, amount: u128 },
    }

    fn underlying_amount() -> impl Strategy<Value = (bool, u128)> {
        prop_oneof![
            (1..50_000_000u128).prop_map(|amount| (true, amount)),
            (1..50 * ONE).prop_map(|amount| (false, amount)),
        ]
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3usize, underlying_amount()).prop_map(|(user, (udo, amount))| Op::Mint { user, udo, amount }),
            (0..3usize, underlying_amount()).prop_map(|(user, (udo, amount))| Op::Redeem { user, udo, amount }),
            (0..3usize, 0..3usize, 1..50 * ONE).prop_map(|(from, to, amount)| Op::Transfer { from, to, amount }),
            (0..3usize, underlying_amount()).prop_map(|(user, (udo_in, amount))| Op::Swap { user, udo_in, amount }),
        ]
    }

    proptest! {
        #[test]
        fn prop_balances_shares_and_backing_stay_consistent(ops in prop::collection::vec(op(), 1..40)) {
            let Setup { mut protocol, udo, udt, .. } = setup();
            let token = protocol.token().address();
            let users: Vec<Address> = (0..3).map(|i| Address::from_label(&format!("holder-{i}"))).collect();
            for user in &users {
                protocol.mint_asset(udo, *user, 1_000_000_000).unwrap();
                protocol.mint_asset(udt, *user, 1_000 * ONE).unwrap();
                protocol.approve_asset(udo, *user, token, UNLIMITED_ALLOWANCE).unwrap();
                protocol.approve_asset(udt, *user, token, UNLIMITED_ALLOWANCE).unwrap();
            }
            let asset = |is_udo: bool| if is_udo { udo } else { udt };

            for op in ops {
                let _ = match op {
                    Op::Mint { user, udo, amount } => {
                        protocol.mint(users[user], users[user], asset(udo), amount).map(|_| ())
                    }
                    Op::Redeem { user, udo, amount } => {
                        let before = protocol.env().balance_of(&asset(udo), &users[user]);
                        match protocol.redeem(users[user], users[user], asset(udo), amount) {
                            Ok(received) => {
                                prop_assert_eq!(received, amount);
                                prop_assert_eq!(
                                    protocol.env().balance_of(&asset(udo), &users[user]),
                                    before + amount
                                );
                                Ok(())
                            }
                            Err(e) => Err(e),
                        }
                    }
                    Op::Transfer { from, to, amount } => {
                        protocol.transfer(users[from], users[to], amount)
                    }
                    Op::Swap { user, udo_in, amount } => {
                        protocol.swap(users[user], users[user], asset(udo_in), amount, asset(!udo_in)).map(|_| ())
                    }
                };

                let held: Amount = users.iter().map(|u| protocol.token().balance_of(u)).sum();
                prop_assert_eq!(held, protocol.token().total_supply());
                prop_assert_eq!(protocol.contracts().reward_pool.total_shares(), protocol.token().total_supply());
                for user in &users {
                    prop_assert_eq!(
                        protocol.contracts().reward_pool.shares_of(user),
                        protocol.token().balance_of(user)
                    );
                }

                // backing, rescaled to token precision, never falls below supply;
                // swaps into the coarser underlying leave the truncated part behind
                let backing = protocol.earning_pool(&udo).unwrap().shares_of(&token) * 1_000_000_000_000
                    + protocol.earning_pool(&udt).unwrap().shares_of(&token);
                prop_assert!(backing >= protocol.token().total_supply());
                for underlying in [udo, udt] {
                    let pool = protocol.earning_pool(&underlying).unwrap();
                    prop_assert!(pool.calc_pool_value_in_underlying(protocol.env()).unwrap() >= pool.total_shares());
                }
            }
        }
    }
}
