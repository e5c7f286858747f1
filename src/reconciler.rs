// ⚖️ Transfer Reconciler - Keeps balances and entitlement ids in step
//
// Every operation runs in two phases:
//   1. PLAN   - validate amounts/ownership, project both curves, count the
//               ids to burn and mint, check the mint cap. Nothing mutates.
//   2. COMMIT - debit, credit, then burn (sender side first) and mint.
//
// Validation never happens after the first mutation, so a failed call
// leaves the ledger untouched.

use crate::entities::AccountId;
use crate::error::{LedgerError, LedgerResult};
use crate::events::{EventLog, LedgerEvent};
use crate::exemption::ExemptionRegistry;
use crate::ledger::AccountLedger;
use crate::token_id::{TokenId, TokenIdAllocator};
use crate::tracker::{CurveProjection, EntitlementTracker};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

// ============================================================================
// TRANSFER RECEIPT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub receipt_id: Uuid,

    /// Ids retired by this operation, in burn order (top of stack first)
    pub burned: Vec<TokenId>,

    /// Ids created by this operation, in mint order
    pub minted: Vec<TokenId>,

    pub recorded_at: DateTime<Utc>,
}

impl TransferReceipt {
    pub fn empty() -> Self {
        TransferReceipt {
            receipt_id: Uuid::new_v4(),
            burned: Vec::new(),
            minted: Vec::new(),
            recorded_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.burned.is_empty() && self.minted.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "receipt {}: burned {}, minted {}",
            self.receipt_id,
            self.burned.len(),
            self.minted.len()
        )
    }
}

// ============================================================================
// RECONCILIATION PLAN
// ============================================================================

/// What one party needs after a balance change
#[derive(Debug)]
struct PartyPlan {
    account: AccountId,
    projection: CurveProjection,
    burn: u64,
    mint: u64,
}

// ============================================================================
// TRANSFER RECONCILER
// ============================================================================

/// Borrowed view over the ledger components for the span of one operation
pub struct TransferReconciler<'a> {
    pub ledger: &'a mut AccountLedger,
    pub tracker: &'a mut EntitlementTracker,
    pub allocator: &'a TokenIdAllocator,
    pub exemptions: &'a ExemptionRegistry,
    pub events: &'a mut EventLog,
    pub whole_unit_size: u128,
}

impl<'a> TransferReconciler<'a> {
    /// Move `amount` fine-grained units and reconcile both parties' ids
    pub fn transfer(
        &mut self,
        sender: &AccountId,
        recipient: &AccountId,
        amount: u128,
    ) -> LedgerResult<TransferReceipt> {
        // ====================================================================
        // PLAN
        // ====================================================================
        let sender_before = self.ledger.balance_of(sender);
        if amount > sender_before {
            warn!(sender = %sender, amount, balance = sender_before, "transfer rejected");
            return Err(LedgerError::InsufficientBalance {
                have: sender_before,
                need: amount,
            });
        }

        if sender == recipient {
            return Ok(TransferReceipt::empty());
        }

        let recipient_before = self.ledger.balance_of(recipient);
        let recipient_after = recipient_before
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let sender_after = sender_before - amount;

        let sender_plan = self.plan(sender, sender_before, sender_after)?;
        let recipient_plan = self.plan(recipient, recipient_before, recipient_after)?;

        let to_mint = sender_plan.as_ref().map_or(0, |p| p.mint)
            + recipient_plan.as_ref().map_or(0, |p| p.mint);
        self.allocator.ensure_capacity(to_mint)?;

        // ====================================================================
        // COMMIT
        // ====================================================================
        self.ledger.debit_balance(sender, amount)?;
        self.ledger.credit_balance(recipient, amount)?;
        self.events.record(LedgerEvent::BalanceMoved {
            from: sender.clone(),
            to: recipient.clone(),
            amount,
        });

        let mut receipt = TransferReceipt::empty();
        for plan in [sender_plan, recipient_plan].into_iter().flatten() {
            self.commit(plan, &mut receipt)?;
        }

        debug!(
            sender = %sender,
            recipient = %recipient,
            amount,
            burned = receipt.burned.len(),
            minted = receipt.minted.len(),
            "transfer reconciled"
        );

        Ok(receipt)
    }

    /// Move one specific id together with exactly one whole unit
    pub fn transfer_token(
        &mut self,
        sender: &AccountId,
        recipient: &AccountId,
        id: TokenId,
    ) -> LedgerResult<()> {
        if !self.ledger.owns(sender, &id) {
            warn!(sender = %sender, id = %id, "token transfer rejected: not owned");
            return Err(LedgerError::NotOwned {
                id,
                account: sender.clone(),
            });
        }

        let have = self.ledger.balance_of(sender);
        if have < self.whole_unit_size {
            warn!(sender = %sender, id = %id, balance = have, "token transfer rejected: no backing unit");
            return Err(LedgerError::InsufficientBalance {
                have,
                need: self.whole_unit_size,
            });
        }

        if sender == recipient {
            return Ok(());
        }

        self.ledger
            .balance_of(recipient)
            .checked_add(self.whole_unit_size)
            .ok_or(LedgerError::Overflow)?;

        self.ledger.debit_balance(sender, self.whole_unit_size)?;
        self.ledger.credit_balance(recipient, self.whole_unit_size)?;
        self.ledger.move_entitlement(sender, recipient, id)?;

        if !self.exemptions.is_exempt(sender) {
            self.tracker.record_direct_move(sender, -1);
        }
        if !self.exemptions.is_exempt(recipient) {
            self.tracker.record_direct_move(recipient, 1);
        }

        self.events.record(LedgerEvent::BalanceMoved {
            from: sender.clone(),
            to: recipient.clone(),
            amount: self.whole_unit_size,
        });
        self.events.record(LedgerEvent::TokenMoved {
            from: sender.clone(),
            to: recipient.clone(),
            id,
        });

        debug!(sender = %sender, recipient = %recipient, id = %id, "token moved");

        Ok(())
    }

    /// Reseed a newly non-exempt account and bring its ids in line
    pub fn resync(&mut self, account: &AccountId) -> LedgerResult<TransferReceipt> {
        self.tracker.forget(account);

        let whole_units = self.ledger.balance_of(account) / self.whole_unit_size;
        let projection = self.tracker.project_fresh(whole_units);
        let plan = self.diff(account, projection);
        self.allocator.ensure_capacity(plan.mint)?;

        let mut receipt = TransferReceipt::empty();
        self.commit(plan, &mut receipt)?;
        Ok(receipt)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// None when the party is exempt or its whole-unit bracket is unchanged
    fn plan(
        &self,
        account: &AccountId,
        before: u128,
        after: u128,
    ) -> LedgerResult<Option<PartyPlan>> {
        if self.exemptions.is_exempt(account) {
            return Ok(None);
        }

        let whole_before = before / self.whole_unit_size;
        let whole_after = after / self.whole_unit_size;
        if whole_before == whole_after {
            return Ok(None);
        }

        let projection = self.tracker.project(account, whole_after);
        let plan = self.diff(account, projection);

        if plan.burn as usize > self.ledger.entitlement_count(account) {
            error!(account = %account, burn = plan.burn, "burn planned past empty collection");
            return Err(LedgerError::NoEntitlements(account.clone()));
        }

        Ok(Some(plan))
    }

    fn diff(&self, account: &AccountId, projection: CurveProjection) -> PartyPlan {
        let held = self.ledger.entitlement_count(account) as u64;
        let target = projection.entitlement_count();

        PartyPlan {
            account: account.clone(),
            projection,
            burn: held.saturating_sub(target),
            mint: target.saturating_sub(held),
        }
    }

    fn commit(&mut self, plan: PartyPlan, receipt: &mut TransferReceipt) -> LedgerResult<()> {
        let PartyPlan {
            account,
            projection,
            burn,
            mint,
        } = plan;

        self.tracker.apply(&account, projection);

        for _ in 0..burn {
            let id = self.ledger.pop_entitlement(&account).map_err(|err| {
                error!(account = %account, "entitlement stack ran dry mid-burn");
                err
            })?;
            self.events.record(LedgerEvent::Burned {
                account: account.clone(),
                id,
            });
            receipt.burned.push(id);
        }

        for _ in 0..mint {
            let id = self.allocator.allocate()?;
            self.ledger.push_entitlement(&account, id);
            self.events.record(LedgerEvent::Minted {
                account: account.clone(),
                id,
            });
            receipt.minted.push(id);
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
