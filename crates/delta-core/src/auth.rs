//! Role tables: a single owner per component and an optional manager set

use crate::error::{DeltaError, Result};
use crate::types::Address;
use std::collections::BTreeSet;

/// Single-owner capability
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ownable {
    owner: Address,
}

impl Ownable {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_owner(&self, account: &Address) -> bool {
        &self.owner == account
    }

    /// Fail unless `caller` is the owner
    pub fn ensure_owner(&self, caller: &Address) -> Result<()> {
        if !self.is_owner(caller) {
            return Err(DeltaError::NotOwner(*caller));
        }
        Ok(())
    }

    /// Hand ownership to `new_owner`, returning the previous owner
    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<Address> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(DeltaError::InvalidParameter(
                "new owner is the zero address".to_string(),
            ));
        }
        Ok(std::mem::replace(&mut self.owner, new_owner))
    }
}

/// Set of accounts promoted to manager
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Managers {
    members: BTreeSet<Address>,
}

impl Managers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if already a manager
    pub fn promote(&mut self, account: Address) -> bool {
        self.members.insert(account)
    }

    /// Returns false if not a manager
    pub fn demote(&mut self, account: &Address) -> bool {
        self.members.remove(account)
    }

    pub fn contains(&self, account: &Address) -> bool {
        self.members.contains(account)
    }

    pub fn ensure_manager(&self, caller: &Address) -> Result<()> {
        if !self.contains(caller) {
            return Err(DeltaError::NotManager(*caller));
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.members.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ownership_transfer() {
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let mut ownable = Ownable::new(alice);

        assert_eq!(ownable.transfer_ownership(&bob, bob), Err(DeltaError::NotOwner(bob)));
        assert!(ownable.transfer_ownership(&alice, Address::ZERO).is_err());
        assert_eq!(ownable.transfer_ownership(&alice, bob).unwrap(), alice);
        assert!(ownable.ensure_owner(&bob).is_ok());
        assert!(ownable.ensure_owner(&alice).is_err());
    }

    #[test]
    fn test_manager_set() {
        let token = Address::from_label("token");
        let mut managers = Managers::new();

        assert!(managers.ensure_manager(&token).is_err());
        assert!(managers.promote(token));
        assert!(!managers.promote(token));
        assert!(managers.ensure_manager(&token).is_ok());
        assert!(managers.demote(&token));
        assert!(!managers.contains(&token));
    }
}
