// 🪙 Entitlement Token - Public surface of the hybrid ledger
//
// Owns every component and hands the reconciler a borrowed view for each
// mutating call. All operations are synchronous and in-memory; SharedToken
// serialises them behind one write lock for multi-threaded callers.

use crate::config::{validate_curve, CalculationMode, GlobalConfig};
use crate::curve::CurveModel;
use crate::entities::{AccountId, AccountView};
use crate::error::{LedgerError, LedgerResult};
use crate::events::{EventLog, LedgerEvent, RecordedEvent};
use crate::exemption::ExemptionRegistry;
use crate::ledger::AccountLedger;
use crate::reconciler::{TransferReceipt, TransferReconciler};
use crate::token_id::{TokenId, TokenIdAllocator};
use crate::tracker::EntitlementTracker;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

/// Allowance that is never decremented
pub const UNLIMITED_ALLOWANCE: u128 = u128::MAX;

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Read-only export of the whole ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub config: GlobalConfig,
    pub minted: u64,
    pub total_supply: u128,
    pub accounts: Vec<AccountView>,
}

// ============================================================================
// ENTITLEMENT TOKEN
// ============================================================================

#[derive(Debug, Clone)]
pub struct EntitlementToken {
    config: GlobalConfig,
    ledger: AccountLedger,
    tracker: EntitlementTracker,
    allocator: TokenIdAllocator,
    exemptions: ExemptionRegistry,
    allowances: HashMap<(AccountId, AccountId), u128>,
    events: EventLog,
    total_supply: u128,
}

impl EntitlementToken {
    /// Validate the config and credit the genesis supply to the exempt treasury
    pub fn new(config: GlobalConfig) -> LedgerResult<Self> {
        config.validate()?;
        let genesis = config.genesis_balance()?;

        let mut token = EntitlementToken {
            ledger: AccountLedger::new(),
            tracker: EntitlementTracker::new(CurveModel::from_config(&config), config.seed_gap),
            allocator: TokenIdAllocator::new(config.max_mint_count),
            exemptions: ExemptionRegistry::new(),
            allowances: HashMap::new(),
            events: EventLog::new(),
            total_supply: genesis,
            config,
        };

        let treasury = token.config.treasury.clone();
        token.exemptions.set_exempt(&treasury, true);
        token.ledger.credit_balance(&treasury, genesis)?;

        info!(
            name = %token.config.name,
            mode = token.config.calculation_mode.as_str(),
            seed_gap = token.config.seed_gap,
            growth = token.config.growth_parameter,
            "ledger initialised"
        );

        Ok(token)
    }

    fn reconciler(&mut self) -> TransferReconciler<'_> {
        TransferReconciler {
            ledger: &mut self.ledger,
            tracker: &mut self.tracker,
            allocator: &self.allocator,
            exemptions: &self.exemptions,
            events: &mut self.events,
            whole_unit_size: self.config.whole_unit_size,
        }
    }

    // ========================================================================
    // METADATA
    // ========================================================================

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn whole_unit_size(&self) -> u128 {
        self.config.whole_unit_size
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Fine-grained units in circulation (fixed at genesis)
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Ids ever allocated, burned ones included
    pub fn minted(&self) -> u64 {
        self.allocator.minted()
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.ledger.balance_of(account)
    }

    /// Held ids, oldest first
    pub fn owned_tokens(&self, account: &AccountId) -> Vec<TokenId> {
        self.ledger.owned_tokens(account)
    }

    pub fn owner_of(&self, id: &TokenId) -> Option<&AccountId> {
        self.ledger.owner_of(id)
    }

    /// Strict variant failing with UnknownToken for burned or never-minted ids
    pub fn require_owner(&self, id: &TokenId) -> LedgerResult<&AccountId> {
        self.ledger
            .owner_of(id)
            .ok_or(LedgerError::UnknownToken(*id))
    }

    pub fn is_exempt(&self, account: &AccountId) -> bool {
        self.exemptions.is_exempt(account)
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u128 {
        self.allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Entitlements the curve demands for the account's current balance
    pub fn expected_entitlements(&self, account: &AccountId) -> u64 {
        let whole_units = self.ledger.balance_of(account) / self.config.whole_unit_size;
        self.tracker.expected_entitlements(account, whole_units)
    }

    /// True when every non-exempt account holds exactly what the curve demands
    pub fn is_consistent(&self) -> bool {
        self.ledger
            .accounts()
            .filter(|(account, _)| !self.exemptions.is_exempt(account))
            .all(|(account, state)| {
                state.entitlements.len() as u64 == self.expected_entitlements(account)
            })
    }

    // ========================================================================
    // TRANSFERS
    // ========================================================================

    pub fn transfer(
        &mut self,
        sender: &AccountId,
        recipient: &AccountId,
        amount: u128,
    ) -> LedgerResult<TransferReceipt> {
        self.reconciler().transfer(sender, recipient, amount)
    }

    pub fn transfer_token(
        &mut self,
        sender: &AccountId,
        recipient: &AccountId,
        id: TokenId,
    ) -> LedgerResult<()> {
        self.reconciler().transfer_token(sender, recipient, id)
    }

    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: u128) {
        self.allowances
            .insert((owner.clone(), spender.clone()), amount);
        self.events.record(LedgerEvent::Approval {
            owner: owner.clone(),
            spender: spender.clone(),
            amount,
        });
    }

    /// Balance transfer on the owner's behalf, spending the spender's allowance
    pub fn transfer_from(
        &mut self,
        spender: &AccountId,
        owner: &AccountId,
        recipient: &AccountId,
        amount: u128,
    ) -> LedgerResult<TransferReceipt> {
        let have = self.allowance(owner, spender);
        if have < amount {
            warn!(spender = %spender, owner = %owner, amount, allowance = have, "transfer_from rejected");
            return Err(LedgerError::InsufficientAllowance { have, need: amount });
        }

        let receipt = self.transfer(owner, recipient, amount)?;

        if have != UNLIMITED_ALLOWANCE {
            self.allowances
                .insert((owner.clone(), spender.clone()), have - amount);
        }

        Ok(receipt)
    }

    // ========================================================================
    // EXEMPTIONS
    // ========================================================================

    /// Exempting keeps held ids and drops the cached curve; un-exempting
    /// reseeds the curve and reconciles the held ids to it
    pub fn set_exempt(&mut self, account: &AccountId, exempt: bool) -> LedgerResult<TransferReceipt> {
        if self.exemptions.is_exempt(account) == exempt {
            return Ok(TransferReceipt::empty());
        }

        if !exempt {
            // Validate capacity before flipping the flag
            self.allocator.ensure_capacity(self.resync_mints(account))?;
        }

        self.exemptions.set_exempt(account, exempt);
        self.exemption_changed(account, exempt)
    }

    /// Flips every listed account in one registry pass, then reconciles the
    /// accounts that actually changed, merging their receipts
    pub fn set_exempt_batch(
        &mut self,
        accounts: &[AccountId],
        exempt: bool,
    ) -> LedgerResult<TransferReceipt> {
        if !exempt {
            let mut pending: Vec<&AccountId> = accounts
                .iter()
                .filter(|account| self.exemptions.is_exempt(account))
                .collect();
            pending.sort();
            pending.dedup();

            let to_mint = pending
                .into_iter()
                .fold(0u64, |sum, account| sum.saturating_add(self.resync_mints(account)));
            self.allocator.ensure_capacity(to_mint)?;
        }

        let changed = self.exemptions.set_exempt_batch(accounts, exempt);

        let mut merged = TransferReceipt::empty();
        for account in &changed {
            let receipt = self.exemption_changed(account, exempt)?;
            merged.burned.extend(receipt.burned);
            merged.minted.extend(receipt.minted);
        }
        Ok(merged)
    }

    /// Bookkeeping after the registry flag flipped
    fn exemption_changed(&mut self, account: &AccountId, exempt: bool) -> LedgerResult<TransferReceipt> {
        self.events.record(LedgerEvent::ExemptionChanged {
            account: account.clone(),
            exempt,
        });
        info!(account = %account, exempt, "exemption changed");

        if exempt {
            self.tracker.forget(account);
            Ok(TransferReceipt::empty())
        } else {
            self.reconciler().resync(account)
        }
    }

    /// Ids a reseeded curve would mint for the account's current balance
    fn resync_mints(&self, account: &AccountId) -> u64 {
        let whole_units = self.ledger.balance_of(account) / self.config.whole_unit_size;
        let target = self.tracker.project_fresh(whole_units).entitlement_count();
        let held = self.ledger.entitlement_count(account) as u64;
        target.saturating_sub(held)
    }

    // ========================================================================
    // ADMINISTRATIVE CURVE OVERRIDES
    // ========================================================================

    /// New seed applies to fresh and reseeded curves only
    pub fn set_seed_gap(&mut self, seed_gap: u128) -> LedgerResult<()> {
        validate_curve(self.config.calculation_mode, seed_gap, self.config.growth_parameter)?;
        self.config.seed_gap = seed_gap;
        self.tracker.set_seed_gap(seed_gap);
        self.record_override("seed_gap", seed_gap);
        Ok(())
    }

    /// New growth applies to forward steps not yet taken. Rejected when it
    /// would stall any curve, including cached ones sitting below the seed.
    pub fn set_growth_parameter(&mut self, growth_parameter: u128) -> LedgerResult<()> {
        validate_curve(self.config.calculation_mode, self.config.seed_gap, growth_parameter)?;
        let smallest_gap = self.tracker.smallest_gap();
        if let Err(err) = validate_curve(self.config.calculation_mode, smallest_gap, growth_parameter) {
            warn!(growth = growth_parameter, smallest_gap, "growth override would stall a cached curve");
            return Err(err);
        }
        self.config.growth_parameter = growth_parameter;
        self.tracker.set_growth_parameter(growth_parameter);
        self.record_override("growth_parameter", growth_parameter);
        Ok(())
    }

    pub fn calculation_mode(&self) -> CalculationMode {
        self.config.calculation_mode
    }

    fn record_override(&mut self, parameter: &str, value: u128) {
        info!(parameter, value, "curve parameter overridden");
        self.events.record(LedgerEvent::CurveOverridden {
            parameter: parameter.to_string(),
            value,
        });
    }

    // ========================================================================
    // AUDIT TRAIL & EXPORT
    // ========================================================================

    pub fn events(&self) -> &[RecordedEvent] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<RecordedEvent> {
        self.events.drain()
    }

    /// All accounts sorted by address
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut accounts: Vec<AccountView> = self
            .ledger
            .accounts()
            .map(|(account, state)| AccountView {
                account: account.clone(),
                balance: state.balance,
                exempt: self.exemptions.is_exempt(account),
                entitlements: state.entitlements.to_vec(),
            })
            .collect();
        accounts.sort_by(|a, b| a.account.cmp(&b.account));

        LedgerSnapshot {
            config: self.config.clone(),
            minted: self.allocator.minted(),
            total_supply: self.total_supply,
            accounts,
        }
    }

    /// SHA-256 over config, mint counter and every account, hex encoded
    pub fn state_digest(&self) -> String {
        let snapshot = self.snapshot();
        let mut hasher = Sha256::new();

        hasher.update(format!(
            "{}|{}|{}|{}|{}|{}",
            snapshot.config.whole_unit_size,
            snapshot.config.calculation_mode.as_str(),
            snapshot.config.growth_parameter,
            snapshot.config.seed_gap,
            snapshot.minted,
            snapshot.total_supply
        ));

        for view in &snapshot.accounts {
            hasher.update(format!(
                "|{}:{}:{}",
                view.account, view.balance, view.exempt
            ));
            for id in &view.entitlements {
                hasher.update(id.raw().to_be_bytes());
            }
        }

        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// SHARED TOKEN
// ============================================================================

/// Thread-safe handle: each operation runs to completion under the write lock
#[derive(Debug, Clone)]
pub struct SharedToken {
    inner: Arc<RwLock<EntitlementToken>>,
}

impl SharedToken {
    pub fn new(token: EntitlementToken) -> Self {
        SharedToken {
            inner: Arc::new(RwLock::new(token)),
        }
    }

    // Operations never leave partial state, so a poisoned lock is still usable
    pub fn read(&self) -> RwLockReadGuard<'_, EntitlementToken> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, EntitlementToken> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transfer(
        &self,
        sender: &AccountId,
        recipient: &AccountId,
        amount: u128,
    ) -> LedgerResult<TransferReceipt> {
        self.write().transfer(sender, recipient, amount)
    }

    pub fn transfer_token(
        &self,
        sender: &AccountId,
        recipient: &AccountId,
        id: TokenId,
    ) -> LedgerResult<()> {
        self.write().transfer_token(sender, recipient, id)
    }

    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.read().balance_of(account)
    }

    pub fn owned_tokens(&self, account: &AccountId) -> Vec<TokenId> {
        self.read().owned_tokens(account)
    }
}

// ============================================================================
// TESTS
// ============================================================================
