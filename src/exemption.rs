// 🛡️ Exemption Registry - Accounts that sit outside the entitlement curve
//
// Exempt accounts (pools, contracts, the treasury) move balance freely and
// never mint or burn ids as a side effect.

use crate::entities::AccountId;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct ExemptionRegistry {
    exempt: HashSet<AccountId>,
}

impl ExemptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_exempt(&self, account: &AccountId) -> bool {
        self.exempt.contains(account)
    }

    /// Returns true if the status actually changed
    pub fn set_exempt(&mut self, account: &AccountId, exempt: bool) -> bool {
        if exempt {
            self.exempt.insert(account.clone())
        } else {
            self.exempt.remove(account)
        }
    }

    /// Accounts whose status actually changed
    pub fn set_exempt_batch(&mut self, accounts: &[AccountId], exempt: bool) -> Vec<AccountId> {
        accounts
            .iter()
            .filter(|account| self.set_exempt(account, exempt))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.exempt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exempt.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear() {
        let mut registry = ExemptionRegistry::new();
        let pool = AccountId::from("pool");

        assert!(!registry.is_exempt(&pool));
        assert!(registry.set_exempt(&pool, true));
        assert!(!registry.set_exempt(&pool, true));
        assert!(registry.is_exempt(&pool));

        assert!(registry.set_exempt(&pool, false));
        assert!(!registry.is_exempt(&pool));
    }

    #[test]
    fn test_batch_reports_changes_only() {
        let mut registry = ExemptionRegistry::new();
        let a = AccountId::from("a");
        let b = AccountId::from("b");
        registry.set_exempt(&a, true);

        let changed = registry.set_exempt_batch(&[a.clone(), b.clone(), b.clone()], true);
        assert_eq!(changed, vec![b]);
        assert_eq!(registry.len(), 2);
    }
}
