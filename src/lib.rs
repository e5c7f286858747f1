// Entitlement Ledger - Core Library
// Exposes all modules for use in the CLI, the journal exporter, and tests

pub mod config;     // Token parameters and curve validation
pub mod curve;      // Gap recurrence and threshold preview
pub mod entities;   // Accounts and entitlement stacks
pub mod error;
pub mod events;     // Audit trail
pub mod exemption;
pub mod journal;    // SQLite export of the audit trail
pub mod ledger;
pub mod reconciler; // Plan/commit of entitlement changes per transfer
pub mod script;     // CSV operation scripts
pub mod token;
pub mod token_id;
pub mod tracker;    // Per-account threshold logs

// Re-export commonly used types
pub use config::{CalculationMode, GlobalConfig, DEFAULT_WHOLE_UNIT_SIZE, GEOMETRIC_SCALE};
pub use curve::{thresholds, CurveModel, Threshold};
pub use entities::{Account, AccountId, AccountView, EntitlementStack};
pub use error::{LedgerError, LedgerResult};
pub use events::{EventLog, LedgerEvent, RecordedEvent};
pub use exemption::ExemptionRegistry;
pub use journal::{append_events, events_for_account, load_events, open_journal, setup_journal};
pub use ledger::AccountLedger;
pub use reconciler::{TransferReceipt, TransferReconciler};
pub use script::{apply_step, load_script, ScriptOp, ScriptStep, StepOutcome};
pub use token::{EntitlementToken, LedgerSnapshot, SharedToken, UNLIMITED_ALLOWANCE};
pub use token_id::{TokenId, TokenIdAllocator, SEQUENCE_LIMIT, TOKEN_ID_MARKER};
pub use tracker::{CurveProjection, CurveState, EntitlementTracker, ThresholdEntry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
