// 💳 Account Entity - Balance plus an ordered stack of entitlement ids
//
// The stack is LIFO for minting and burning, but direct transfers can pull
// an id out of the middle. Ids are keyed by a per-account insertion sequence
// in an ordered map, with an id -> sequence index for O(log n) removal.

use crate::token_id::TokenId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// ============================================================================
// ACCOUNT ID
// ============================================================================

/// Opaque account address supplied by the calling layer
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(address: impl Into<String>) -> Self {
        AccountId(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(address: &str) -> Self {
        AccountId(address.to_string())
    }
}

impl From<String> for AccountId {
    fn from(address: String) -> Self {
        AccountId(address)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// ENTITLEMENT STACK
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementStack {
    /// insertion sequence -> id, oldest first
    slots: BTreeMap<u64, TokenId>,

    /// id -> insertion sequence
    index: HashMap<TokenId, u64>,

    next_slot: u64,
}

impl EntitlementStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: &TokenId) -> bool {
        self.index.contains_key(id)
    }

    /// Most recently added id
    pub fn top(&self) -> Option<TokenId> {
        self.slots.last_key_value().map(|(_, id)| *id)
    }

    /// Append on top
    pub fn push(&mut self, id: TokenId) {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(slot, id);
        self.index.insert(id, slot);
    }

    /// Remove and return the top id
    pub fn pop(&mut self) -> Option<TokenId> {
        let (_, id) = self.slots.pop_last()?;
        self.index.remove(&id);
        Some(id)
    }

    /// Remove a specific id wherever it sits
    pub fn remove(&mut self, id: &TokenId) -> bool {
        match self.index.remove(id) {
            Some(slot) => {
                self.slots.remove(&slot);
                true
            }
            None => false,
        }
    }

    /// Ids oldest first
    pub fn iter(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.slots.values().copied()
    }

    pub fn to_vec(&self) -> Vec<TokenId> {
        self.iter().collect()
    }
}

// ============================================================================
// ACCOUNT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    /// Fine-grained units
    pub balance: u128,

    /// Held entitlement ids, mint/arrival order
    pub entitlements: EntitlementStack,
}

impl Account {
    pub fn new() -> Self {
        Self::default()
    }

    /// floor(balance / whole_unit_size)
    pub fn whole_units(&self, whole_unit_size: u128) -> u128 {
        self.balance / whole_unit_size
    }

    pub fn is_empty(&self) -> bool {
        self.balance == 0 && self.entitlements.is_empty()
    }
}

/// Read-only view of one account, used by snapshots and the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub account: AccountId,
    pub balance: u128,
    pub exempt: bool,
    pub entitlements: Vec<TokenId>,
}

// ============================================================================
// TESTS
// ============================================================================
