// 📜 Ledger Events - Audit trail of every committed change
// "Every change is an event": mints, burns, moves and admin overrides are
// appended in commit order with a gap-free sequence number.

use crate::entities::AccountId;
use crate::token_id::TokenId;
use serde::{Deserialize, Serialize};

// Externally tagged: ids are u128 and must not pass through serde's buffered
// representation used by internally tagged enums
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    BalanceMoved {
        from: AccountId,
        to: AccountId,
        amount: u128,
    },
    Minted {
        account: AccountId,
        id: TokenId,
    },
    Burned {
        account: AccountId,
        id: TokenId,
    },
    TokenMoved {
        from: AccountId,
        to: AccountId,
        id: TokenId,
    },
    ExemptionChanged {
        account: AccountId,
        exempt: bool,
    },
    CurveOverridden {
        parameter: String,
        value: u128,
    },
    Approval {
        owner: AccountId,
        spender: AccountId,
        amount: u128,
    },
}

impl LedgerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::BalanceMoved { .. } => "balance_moved",
            LedgerEvent::Minted { .. } => "minted",
            LedgerEvent::Burned { .. } => "burned",
            LedgerEvent::TokenMoved { .. } => "token_moved",
            LedgerEvent::ExemptionChanged { .. } => "exemption_changed",
            LedgerEvent::CurveOverridden { .. } => "curve_overridden",
            LedgerEvent::Approval { .. } => "approval",
        }
    }

    /// Account the event is indexed under in the journal
    pub fn primary_account(&self) -> Option<&AccountId> {
        match self {
            LedgerEvent::BalanceMoved { from, .. } => Some(from),
            LedgerEvent::Minted { account, .. } => Some(account),
            LedgerEvent::Burned { account, .. } => Some(account),
            LedgerEvent::TokenMoved { from, .. } => Some(from),
            LedgerEvent::ExemptionChanged { account, .. } => Some(account),
            LedgerEvent::CurveOverridden { .. } => None,
            LedgerEvent::Approval { owner, .. } => Some(owner),
        }
    }
}

/// Event with its position in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub sequence: u64,
    pub event: LedgerEvent,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pending: Vec<RecordedEvent>,
    next_sequence: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: LedgerEvent) {
        self.pending.push(RecordedEvent {
            sequence: self.next_sequence,
            event,
        });
        self.next_sequence += 1;
    }

    /// Events not yet drained
    pub fn events(&self) -> &[RecordedEvent] {
        &self.pending
    }

    /// Hand off pending events; sequence numbers keep counting
    pub fn drain(&mut self) -> Vec<RecordedEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Total events ever recorded
    pub fn recorded(&self) -> u64 {
        self.next_sequence
    }
}
