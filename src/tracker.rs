// 🧮 Entitlement Tracker - Cached per-account curve position
//
// Each account keeps a log of the thresholds it has crossed. Moving up
// appends entries, moving down pops back to the largest threshold still
// covered by the balance. Popping is exact for both curve modes, so the
// geometric recurrence never has to be inverted.
//
// The tracker only projects. Callers decide whether to apply a projection,
// which lets the reconciler validate a whole transfer before touching state.

use crate::curve::CurveModel;
use crate::entities::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

// ============================================================================
// THRESHOLD LOG ENTRY
// ============================================================================

/// One crossed threshold: where the curve stood before it and the gap consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdEntry {
    pub cumulative_before: u128,
    pub gap: u128,
}

impl ThresholdEntry {
    /// Whole units at which this entry was crossed (checked when pushed)
    pub fn threshold(&self) -> u128 {
        self.cumulative_before + self.gap
    }
}

// ============================================================================
// CURVE STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveState {
    /// Distance from the last crossed threshold to the next one
    current_gap: u128,

    /// Whole units consumed by the thresholds crossed so far
    cumulative_threshold: u128,

    /// Crossed thresholds, oldest first
    log: Vec<ThresholdEntry>,

    /// Net ids moved in (+) or out (-) by direct transfers
    carried: i64,
}

impl CurveState {
    /// Fresh curve starting at the given seed gap
    pub fn seeded(seed_gap: u128) -> Self {
        CurveState {
            current_gap: seed_gap,
            cumulative_threshold: 0,
            log: Vec::new(),
            carried: 0,
        }
    }

    pub fn current_gap(&self) -> u128 {
        self.current_gap
    }

    pub fn cumulative_threshold(&self) -> u128 {
        self.cumulative_threshold
    }

    pub fn carried(&self) -> i64 {
        self.carried
    }

    /// Number of thresholds crossed
    pub fn entitlement_count(&self) -> u64 {
        self.log.len() as u64
    }

    pub fn thresholds(&self) -> impl Iterator<Item = u128> + '_ {
        self.log.iter().map(ThresholdEntry::threshold)
    }

    /// Smallest gap this curve can step from again, after any rollback
    pub fn smallest_gap(&self) -> u128 {
        self.log
            .first()
            .map_or(self.current_gap, |entry| entry.gap.min(self.current_gap))
    }

    /// Where this account would stand at `whole_units`, without mutating.
    ///
    /// Directly moved ids stay accounted for: the curve is evaluated at
    /// `whole_units - carried` and `carried` is added back. When that would
    /// leave fewer ids than zero, or more ids than whole units, `carried`
    /// is clamped so the count stays within `0..=whole_units`.
    pub fn project(&self, whole_units: u128, model: &CurveModel, seed_gap: u128) -> CurveProjection {
        if whole_units == 0 {
            return CurveProjection::reseed(seed_gap, 0);
        }

        let moved = u128::from(self.carried.unsigned_abs());
        let curve_units = if self.carried >= 0 {
            match whole_units.checked_sub(moved) {
                Some(units) => units,
                None => {
                    // Every remaining whole unit backs a directly received id;
                    // whole_units < carried here, so it fits in i64
                    let carried = i64::try_from(whole_units).unwrap_or(self.carried);
                    return CurveProjection::reseed(seed_gap, carried);
                }
            }
        } else {
            whole_units.saturating_add(moved)
        };

        let mut projection = self.project_curve(curve_units, model);
        let count = projection.curve_count();
        projection.carried = if self.carried < 0 && count < self.carried.unsigned_abs() {
            // count < |carried| <= i64::MAX
            -i64::try_from(count).unwrap_or(i64::MAX)
        } else {
            self.carried
        };
        projection
    }

    fn project_curve(&self, target: u128, model: &CurveModel) -> CurveProjection {
        if target >= self.cumulative_threshold {
            let mut gap = self.current_gap;
            let mut cumulative = self.cumulative_threshold;
            let mut appended = Vec::new();

            while let Some(next) = cumulative.checked_add(gap) {
                if gap == 0 || next > target {
                    break;
                }
                appended.push(ThresholdEntry {
                    cumulative_before: cumulative,
                    gap,
                });
                cumulative = next;
                gap = model.next_gap(gap);
            }

            return CurveProjection {
                retained: self.log.len(),
                appended,
                current_gap: gap,
                cumulative_threshold: cumulative,
                carried: 0,
                reseed: false,
            };
        }

        // Rolling back: keep every entry whose threshold is still covered.
        // cumulative_threshold > target guarantees the log is non-empty here.
        let retained = self.log.partition_point(|entry| entry.threshold() <= target);
        let first_popped = self.log[retained];

        CurveProjection {
            retained,
            appended: Vec::new(),
            current_gap: first_popped.gap,
            cumulative_threshold: first_popped.cumulative_before,
            carried: 0,
            reseed: false,
        }
    }

    /// Commit a projection computed from this exact state
    pub fn apply(&mut self, projection: CurveProjection) {
        if projection.reseed {
            self.log.clear();
        } else {
            self.log.truncate(projection.retained);
            self.log.extend(projection.appended);
        }
        self.current_gap = projection.current_gap;
        self.cumulative_threshold = projection.cumulative_threshold;
        self.carried = projection.carried;
    }
}

// ============================================================================
// CURVE PROJECTION
// ============================================================================

/// Result of projecting an account to a new whole-unit balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurveProjection {
    retained: usize,
    appended: Vec<ThresholdEntry>,
    current_gap: u128,
    cumulative_threshold: u128,
    carried: i64,
    reseed: bool,
}

impl CurveProjection {
    fn reseed(seed_gap: u128, carried: i64) -> Self {
        CurveProjection {
            retained: 0,
            appended: Vec::new(),
            current_gap: seed_gap,
            cumulative_threshold: 0,
            carried,
            reseed: true,
        }
    }

    /// Thresholds crossed on the curve itself
    pub fn curve_count(&self) -> u64 {
        (self.retained + self.appended.len()) as u64
    }

    /// Authoritative number of ids the account holds at the projected balance
    pub fn entitlement_count(&self) -> u64 {
        let moved = self.carried.unsigned_abs();
        if self.carried >= 0 {
            self.curve_count().saturating_add(moved)
        } else {
            self.curve_count().saturating_sub(moved)
        }
    }

    pub fn current_gap(&self) -> u128 {
        self.current_gap
    }

    pub fn cumulative_threshold(&self) -> u128 {
        self.cumulative_threshold
    }

    pub fn carried(&self) -> i64 {
        self.carried
    }
}

// ============================================================================
// ENTITLEMENT TRACKER
// ============================================================================

/// Per-account curve cache plus the curve parameters currently in force
#[derive(Debug, Clone)]
pub struct EntitlementTracker {
    model: CurveModel,
    seed_gap: u128,
    states: HashMap<AccountId, CurveState>,
}

impl EntitlementTracker {
    pub fn new(model: CurveModel, seed_gap: u128) -> Self {
        EntitlementTracker {
            model,
            seed_gap,
            states: HashMap::new(),
        }
    }

    pub fn model(&self) -> CurveModel {
        self.model
    }

    pub fn seed_gap(&self) -> u128 {
        self.seed_gap
    }

    /// Takes effect for fresh or reseeded curves; cached states are kept
    pub fn set_seed_gap(&mut self, seed_gap: u128) {
        self.seed_gap = seed_gap;
    }

    /// Takes effect for forward steps not yet taken; cached states are kept
    pub fn set_growth_parameter(&mut self, growth_parameter: u128) {
        self.model.growth_parameter = growth_parameter;
    }

    /// Smallest gap any curve, cached or fresh, can still step from
    pub fn smallest_gap(&self) -> u128 {
        self.states
            .values()
            .map(CurveState::smallest_gap)
            .fold(self.seed_gap, u128::min)
    }

    pub fn state(&self, account: &AccountId) -> Option<&CurveState> {
        self.states.get(account)
    }

    /// Project `account` to `target` whole units (fresh curve if never seen)
    pub fn project(&self, account: &AccountId, target: u128) -> CurveProjection {
        let projection = match self.states.get(account) {
            Some(state) => state.project(target, &self.model, self.seed_gap),
            None => self.project_fresh(target),
        };

        debug!(
            account = %account,
            target,
            entitlements = projection.entitlement_count(),
            "curve projected"
        );

        projection
    }

    /// Project a freshly seeded curve, ignoring any cached state
    pub fn project_fresh(&self, whole_units: u128) -> CurveProjection {
        CurveState::seeded(self.seed_gap).project(whole_units, &self.model, self.seed_gap)
    }

    /// Commit a projection, creating the cached state lazily
    pub fn apply(&mut self, account: &AccountId, projection: CurveProjection) {
        let seed_gap = self.seed_gap;
        self.states
            .entry(account.clone())
            .or_insert_with(|| CurveState::seeded(seed_gap))
            .apply(projection);
    }

    /// Project and commit in one step, returning the new count
    pub fn entitlements_for(&mut self, account: &AccountId, target: u128) -> u64 {
        let projection = self.project(account, target);
        let count = projection.entitlement_count();
        self.apply(account, projection);
        count
    }

    /// Record an id moved in (+1) or out (-1) by a direct transfer
    pub fn record_direct_move(&mut self, account: &AccountId, delta: i64) {
        let seed_gap = self.seed_gap;
        let state = self
            .states
            .entry(account.clone())
            .or_insert_with(|| CurveState::seeded(seed_gap));
        state.carried += delta;
    }

    /// Entitlements the account should hold at `whole_units`, read-only
    pub fn expected_entitlements(&self, account: &AccountId, whole_units: u128) -> u64 {
        self.project(account, whole_units).entitlement_count()
    }

    /// Drop the cached curve (account became exempt)
    pub fn forget(&mut self, account: &AccountId) {
        self.states.remove(account);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalculationMode;

    fn arithmetic(step: u128, seed: u128) -> EntitlementTracker {
        EntitlementTracker::new(CurveModel::new(CalculationMode::Arithmetic, step), seed)
    }

    fn alice() -> AccountId {
        AccountId::from("alice")
    }

    #[test]
    fn test_forward_triangular() {
        let mut tracker = arithmetic(1, 1);
        let counts: Vec<u64> = (1..=10)
            .map(|units| tracker.entitlements_for(&alice(), units))
            .collect();

        // thresholds at 1, 3, 6, 10
        assert_eq!(counts, vec![1, 1, 2, 2, 2, 3, 3, 3, 3, 4]);

        let state = tracker.state(&alice()).unwrap();
        assert_eq!(state.cumulative_threshold(), 10);
        assert_eq!(state.current_gap(), 5);
    }

    #[test]
    fn test_single_jump_matches_incremental() {
        let mut stepwise = arithmetic(2, 3);
        let mut jump = arithmetic(2, 3);

        for units in 1..=200 {
            stepwise.entitlements_for(&alice(), units);
        }
        let count = jump.entitlements_for(&alice(), 200);

        assert_eq!(count, stepwise.state(&alice()).unwrap().entitlement_count());
        assert_eq!(stepwise.state(&alice()), jump.state(&alice()));
    }

    #[test]
    fn test_rollback_pops_thresholds() {
        let mut tracker = arithmetic(1, 1);
        assert_eq!(tracker.entitlements_for(&alice(), 30), 7);

        // 28 was the last threshold; 27 drops back below it
        assert_eq!(tracker.entitlements_for(&alice(), 27), 6);
        let state = tracker.state(&alice()).unwrap();
        assert_eq!(state.cumulative_threshold(), 21);
        assert_eq!(state.current_gap(), 7);

        assert_eq!(tracker.entitlements_for(&alice(), 5), 2);
        assert_eq!(tracker.entitlements_for(&alice(), 30), 7);
    }

    #[test]
    fn test_rollback_exact_threshold_keeps_entry() {
        let mut tracker = arithmetic(1, 1);
        tracker.entitlements_for(&alice(), 12);
        assert_eq!(tracker.entitlements_for(&alice(), 10), 4);
    }

    #[test]
    fn test_zero_resets_to_seed() {
        let mut tracker = arithmetic(1, 2);
        tracker.entitlements_for(&alice(), 50);

        tracker.set_seed_gap(5);
        assert_eq!(tracker.entitlements_for(&alice(), 0), 0);

        let state = tracker.state(&alice()).unwrap();
        assert_eq!(state.current_gap(), 5);
        assert_eq!(state.cumulative_threshold(), 0);
        assert_eq!(tracker.entitlements_for(&alice(), 4), 0);
        assert_eq!(tracker.entitlements_for(&alice(), 5), 1);
    }

    #[test]
    fn test_geometric_rollback_is_exact() {
        let model = CurveModel::new(CalculationMode::Geometric, 700);
        let mut tracker = EntitlementTracker::new(model, 100);

        let up = tracker.entitlements_for(&alice(), 5_000);
        let thresholds: Vec<u128> = tracker.state(&alice()).unwrap().thresholds().collect();

        let down = tracker.entitlements_for(&alice(), 1_000);
        assert!(down < up);

        let back = tracker.entitlements_for(&alice(), 5_000);
        assert_eq!(back, up);
        let again: Vec<u128> = tracker.state(&alice()).unwrap().thresholds().collect();
        assert_eq!(thresholds, again);
    }

    #[test]
    fn test_project_does_not_mutate() {
        let mut tracker = arithmetic(1, 1);
        tracker.entitlements_for(&alice(), 10);
        let before = tracker.state(&alice()).cloned();

        let projection = tracker.project(&alice(), 100);
        assert_eq!(projection.entitlement_count(), 13);
        assert_eq!(tracker.state(&alice()).cloned(), before);
    }

    #[test]
    fn test_constant_gap_arithmetic() {
        let mut tracker = arithmetic(0, 4);
        assert_eq!(tracker.entitlements_for(&alice(), 17), 4);
    }

    #[test]
    fn test_growth_override_leaves_cached_state() {
        let mut tracker = arithmetic(1, 1);
        tracker.entitlements_for(&alice(), 6);
        tracker.set_growth_parameter(10);

        let state = tracker.state(&alice()).unwrap();
        assert_eq!(state.current_gap(), 4);

        // next gap (4) was computed before the override; the one after uses +10
        assert_eq!(tracker.entitlements_for(&alice(), 10), 4);
        assert_eq!(tracker.state(&alice()).unwrap().current_gap(), 14);
    }

    #[test]
    fn test_expected_entitlements_with_carried() {
        let mut tracker = arithmetic(1, 1);
        tracker.entitlements_for(&alice(), 7); // 3 entitlements

        tracker.record_direct_move(&alice(), -1);
        assert_eq!(tracker.expected_entitlements(&alice(), 6), 2);

        tracker.record_direct_move(&alice(), 2);
        assert_eq!(tracker.expected_entitlements(&alice(), 8), 4);

        // fresh accounts follow the pure curve
        assert_eq!(tracker.expected_entitlements(&AccountId::from("bob"), 6), 3);
    }

    #[test]
    fn test_carried_survives_recomputation() {
        let mut tracker = arithmetic(1, 1);
        tracker.entitlements_for(&alice(), 10); // 4 entitlements
        tracker.record_direct_move(&alice(), -1); // 9 units, 3 ids

        // curve evaluated at 12 - (-1) = 13: still 4 thresholds, minus the moved id
        assert_eq!(tracker.entitlements_for(&alice(), 12), 3);
        assert_eq!(tracker.state(&alice()).unwrap().carried(), -1);
    }

    #[test]
    fn test_carried_clamped_when_spent() {
        let mut tracker = arithmetic(1, 1);
        tracker.record_direct_move(&alice(), 3); // 3 units, 3 ids, curve at 0

        // spending two of the carried units leaves one carried id
        assert_eq!(tracker.entitlements_for(&alice(), 1), 1);
        assert_eq!(tracker.state(&alice()).unwrap().carried(), 1);
        assert_eq!(tracker.state(&alice()).unwrap().entitlement_count(), 0);
    }

    #[test]
    fn test_carried_clamped_at_zero_ids() {
        let mut tracker = arithmetic(1, 1);
        tracker.entitlements_for(&alice(), 10); // 4 ids
        for _ in 0..4 {
            tracker.record_direct_move(&alice(), -1); // 6 units, 0 ids
        }

        // curve at 3 - (-4) = 7 crosses 3 thresholds; 3 - 4 < 0 clamps to zero ids
        assert_eq!(tracker.entitlements_for(&alice(), 3), 0);
        assert_eq!(tracker.state(&alice()).unwrap().carried(), -3);

        assert_eq!(tracker.entitlements_for(&alice(), 0), 0);
        assert_eq!(tracker.state(&alice()).unwrap().carried(), 0);
    }

    #[test]
    fn test_top_half_balances_keep_carried_exact() {
        // doubling curve: thresholds at 2^k - 1
        let model = CurveModel::new(CalculationMode::Geometric, 10_000);
        let top = 1u128 << 127;

        let mut tracker = EntitlementTracker::new(model, 1);
        assert_eq!(tracker.entitlements_for(&alice(), top), 127);

        let mut received = EntitlementTracker::new(model, 1);
        received.record_direct_move(&alice(), 2);
        // curve at 2^127 - 2 crosses 126 thresholds, plus the 2 received ids
        assert_eq!(received.entitlements_for(&alice(), top), 128);

        let mut sent = EntitlementTracker::new(model, 1);
        sent.record_direct_move(&alice(), -1);
        assert_eq!(sent.entitlements_for(&alice(), top), 126);
        assert_eq!(sent.state(&alice()).unwrap().carried(), -1);

        let mut saturated = EntitlementTracker::new(model, 1);
        saturated.record_direct_move(&alice(), -3);
        assert_eq!(saturated.entitlements_for(&alice(), u128::MAX), 125);
    }

    #[test]
    fn test_smallest_gap_covers_rollback() {
        let mut tracker = arithmetic(1, 5);
        tracker.entitlements_for(&alice(), 20); // thresholds 5, 11

        let state = tracker.state(&alice()).unwrap();
        assert_eq!(state.current_gap(), 7);
        assert_eq!(state.smallest_gap(), 5);

        // a raised seed does not lift gaps already cached
        tracker.set_seed_gap(50);
        assert_eq!(tracker.smallest_gap(), 5);

        tracker.set_seed_gap(2);
        assert_eq!(tracker.smallest_gap(), 2);
    }

    #[test]
    fn test_forget_drops_state() {
        let mut tracker = arithmetic(1, 1);
        tracker.entitlements_for(&alice(), 3);
        tracker.forget(&alice());
        assert!(tracker.state(&alice()).is_none());
    }
}
