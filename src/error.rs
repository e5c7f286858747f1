// ❗ Ledger Errors - Typed failures for every public operation
//
// Validation always runs before mutation, so any error returned here
// means the ledger is exactly as it was before the call.

use crate::entities::AccountId;
use crate::token_id::TokenId;
use thiserror::Error;

/// Error during ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u128, need: u128 },

    #[error("Token {id} is not owned by {account}")]
    NotOwned { id: TokenId, account: AccountId },

    /// Internal consistency fault: a burn was planned against an empty
    /// collection. Indicates broken curve bookkeeping, never bad input.
    #[error("Internal fault: {0} has no entitlements left to burn")]
    NoEntitlements(AccountId),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: u128, need: u128 },

    #[error("Mint cap exceeded: cap {cap}, would reach {requested}")]
    MintCapExceeded { cap: u64, requested: u64 },

    #[error("Unknown token: {0}")]
    UnknownToken(TokenId),

    #[error("Arithmetic overflow")]
    Overflow,
}

impl LedgerError {
    /// True for faults that signal a bookkeeping bug rather than bad input
    pub fn is_internal_fault(&self) -> bool {
        matches!(self, LedgerError::NoEntitlements(_))
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
