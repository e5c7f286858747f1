// 📒 Account Ledger - Authoritative balances and entitlement ownership
//
// Primitive mutations only. Each call either fully applies or returns an
// error with nothing changed; the reconciler sequences them into transfers.

use crate::entities::{Account, AccountId};
use crate::error::{LedgerError, LedgerResult};
use crate::token_id::TokenId;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct AccountLedger {
    accounts: HashMap<AccountId, Account>,

    /// id -> current holder
    owners: HashMap<TokenId, AccountId>,
}

impl AccountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, account: &AccountId) -> Option<&Account> {
        self.accounts.get(account)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &Account)> {
        self.accounts.iter()
    }

    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.accounts.get(account).map_or(0, |a| a.balance)
    }

    pub fn entitlement_count(&self, account: &AccountId) -> usize {
        self.accounts
            .get(account)
            .map_or(0, |a| a.entitlements.len())
    }

    /// Held ids, oldest first
    pub fn owned_tokens(&self, account: &AccountId) -> Vec<TokenId> {
        self.accounts
            .get(account)
            .map(|a| a.entitlements.to_vec())
            .unwrap_or_default()
    }

    pub fn owner_of(&self, id: &TokenId) -> Option<&AccountId> {
        self.owners.get(id)
    }

    pub fn owns(&self, account: &AccountId, id: &TokenId) -> bool {
        self.owners.get(id) == Some(account)
    }

    // ========================================================================
    // BALANCES
    // ========================================================================

    pub fn credit_balance(&mut self, account: &AccountId, amount: u128) -> LedgerResult<()> {
        let entry = self.accounts.entry(account.clone()).or_default();
        entry.balance = entry
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    pub fn debit_balance(&mut self, account: &AccountId, amount: u128) -> LedgerResult<()> {
        let have = self.balance_of(account);
        if amount > have {
            return Err(LedgerError::InsufficientBalance { have, need: amount });
        }
        if amount == 0 {
            return Ok(());
        }

        if let Some(entry) = self.accounts.get_mut(account) {
            entry.balance = have - amount;
        }
        Ok(())
    }

    // ========================================================================
    // ENTITLEMENTS
    // ========================================================================

    /// Append a freshly minted id on top of the account's stack
    pub fn push_entitlement(&mut self, account: &AccountId, id: TokenId) {
        self.accounts
            .entry(account.clone())
            .or_default()
            .entitlements
            .push(id);
        self.owners.insert(id, account.clone());
    }

    /// Remove the top id (burn path); the id is retired by the caller
    pub fn pop_entitlement(&mut self, account: &AccountId) -> LedgerResult<TokenId> {
        let id = self
            .accounts
            .get_mut(account)
            .and_then(|a| a.entitlements.pop())
            .ok_or_else(|| LedgerError::NoEntitlements(account.clone()))?;
        self.owners.remove(&id);
        Ok(id)
    }

    /// Move a specific id from `from` to the top of `to`
    pub fn move_entitlement(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        id: TokenId,
    ) -> LedgerResult<()> {
        let removed = self
            .accounts
            .get_mut(from)
            .map(|a| a.entitlements.remove(&id))
            .unwrap_or(false);

        if !removed {
            return Err(LedgerError::NotOwned {
                id,
                account: from.clone(),
            });
        }

        self.push_entitlement(to, id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> TokenId {
        TokenId::from_sequence(n)
    }

    #[test]
    fn test_credit_and_debit() {
        let mut ledger = AccountLedger::new();
        let alice = AccountId::from("alice");

        ledger.credit_balance(&alice, 100).unwrap();
        ledger.debit_balance(&alice, 40).unwrap();
        assert_eq!(ledger.balance_of(&alice), 60);

        let err = ledger.debit_balance(&alice, 61).unwrap_err();
        assert_eq!(err, LedgerError::InsufficientBalance { have: 60, need: 61 });
        assert_eq!(ledger.balance_of(&alice), 60);
    }

    #[test]
    fn test_debit_unknown_account() {
        let mut ledger = AccountLedger::new();
        let ghost = AccountId::from("ghost");
        assert!(ledger.debit_balance(&ghost, 0).is_ok());
        assert!(ledger.debit_balance(&ghost, 1).is_err());
        assert_eq!(ledger.balance_of(&ghost), 0);
    }

    #[test]
    fn test_credit_overflow() {
        let mut ledger = AccountLedger::new();
        let alice = AccountId::from("alice");
        ledger.credit_balance(&alice, u128::MAX).unwrap();
        assert_eq!(ledger.credit_balance(&alice, 1), Err(LedgerError::Overflow));
        assert_eq!(ledger.balance_of(&alice), u128::MAX);
    }

    #[test]
    fn test_push_pop_tracks_owner() {
        let mut ledger = AccountLedger::new();
        let alice = AccountId::from("alice");

        ledger.push_entitlement(&alice, id(1));
        ledger.push_entitlement(&alice, id(2));
        assert_eq!(ledger.owner_of(&id(2)), Some(&alice));

        assert_eq!(ledger.pop_entitlement(&alice), Ok(id(2)));
        assert_eq!(ledger.owner_of(&id(2)), None);
        assert_eq!(ledger.owned_tokens(&alice), vec![id(1)]);
    }

    #[test]
    fn test_pop_empty_is_fault() {
        let mut ledger = AccountLedger::new();
        let alice = AccountId::from("alice");
        assert_eq!(
            ledger.pop_entitlement(&alice),
            Err(LedgerError::NoEntitlements(alice))
        );
    }

    #[test]
    fn test_move_entitlement() {
        let mut ledger = AccountLedger::new();
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");

        for n in 1..=3 {
            ledger.push_entitlement(&alice, id(n));
        }
        ledger.push_entitlement(&bob, id(9));

        ledger.move_entitlement(&alice, &bob, id(1)).unwrap();
        assert_eq!(ledger.owned_tokens(&alice), vec![id(2), id(3)]);
        assert_eq!(ledger.owned_tokens(&bob), vec![id(9), id(1)]);
        assert!(ledger.owns(&bob, &id(1)));

        let err = ledger.move_entitlement(&alice, &bob, id(1)).unwrap_err();
        assert!(matches!(err, LedgerError::NotOwned { .. }));
    }
}
