// Entity Models
// Per-account value types shared by the ledger, tracker and reconciler.

pub mod account;

pub use account::{Account, AccountId, AccountView, EntitlementStack};
