// 📈 Curve Model - Gap recurrence for entitlement thresholds
//
//   nextGap = gap + increment(gap)
//   Arithmetic: increment(gap) = growth
//   Geometric:  increment(gap) = floor(gap * growth / 10_000)
//
// Exact integer arithmetic only. Gaps saturate at u128::MAX, which simply
// puts the next threshold out of reach.

use crate::config::{CalculationMode, GlobalConfig, GEOMETRIC_SCALE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveModel {
    pub mode: CalculationMode,
    pub growth_parameter: u128,
}

impl CurveModel {
    pub fn new(mode: CalculationMode, growth_parameter: u128) -> Self {
        CurveModel {
            mode,
            growth_parameter,
        }
    }

    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(config.calculation_mode, config.growth_parameter)
    }

    /// Amount added to `gap` to obtain the following gap
    pub fn increment(&self, gap: u128) -> u128 {
        match self.mode {
            CalculationMode::Arithmetic => self.growth_parameter,
            CalculationMode::Geometric => {
                // floor(gap * rate) without overflowing the intermediate product
                let whole = (gap / GEOMETRIC_SCALE).saturating_mul(self.growth_parameter);
                let frac = (gap % GEOMETRIC_SCALE).saturating_mul(self.growth_parameter)
                    / GEOMETRIC_SCALE;
                whole.saturating_add(frac)
            }
        }
    }

    pub fn next_gap(&self, gap: u128) -> u128 {
        gap.saturating_add(self.increment(gap))
    }
}

// ============================================================================
// CURVE PREVIEW
// ============================================================================

/// One crossed threshold of a fresh curve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    /// 1-based entitlement number unlocked at this threshold
    pub ordinal: u64,

    /// Gap consumed to reach this threshold
    pub gap: u128,

    /// Whole units needed to hold `ordinal` entitlements
    pub whole_units: u128,
}

/// Thresholds a fresh account crosses on its way up to `max_units`
pub fn thresholds(config: &GlobalConfig, max_units: u128) -> Vec<Threshold> {
    let model = CurveModel::from_config(config);
    let mut out = Vec::new();
    let mut gap = config.seed_gap;
    let mut cumulative: u128 = 0;

    while gap > 0 {
        let Some(next) = cumulative.checked_add(gap) else {
            break;
        };
        if next > max_units {
            break;
        }
        cumulative = next;
        out.push(Threshold {
            ordinal: out.len() as u64 + 1,
            gap,
            whole_units: cumulative,
        });
        gap = model.next_gap(gap);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_increment_is_constant() {
        let model = CurveModel::new(CalculationMode::Arithmetic, 3);
        assert_eq!(model.increment(1), 3);
        assert_eq!(model.increment(1_000), 3);
        assert_eq!(model.next_gap(4), 7);
    }

    #[test]
    fn test_arithmetic_zero_step_keeps_gap() {
        let model = CurveModel::new(CalculationMode::Arithmetic, 0);
        assert_eq!(model.next_gap(5), 5);
    }

    #[test]
    fn test_geometric_increment_truncates() {
        // 1%
        let model = CurveModel::new(CalculationMode::Geometric, 100);
        assert_eq!(model.increment(100), 1);
        assert_eq!(model.increment(199), 1);
        assert_eq!(model.increment(200), 2);
        assert_eq!(model.next_gap(101), 102);
    }

    #[test]
    fn test_geometric_large_gap_no_overflow() {
        let model = CurveModel::new(CalculationMode::Geometric, 5_000);
        let gap = u128::MAX / 2;
        assert_eq!(model.increment(gap), gap / 2);
        assert_eq!(model.next_gap(u128::MAX), u128::MAX);
    }

    #[test]
    fn test_triangular_thresholds() {
        let config = GlobalConfig::arithmetic(1, 1, 1);
        let list = thresholds(&config, 30);
        let units: Vec<u128> = list.iter().map(|t| t.whole_units).collect();
        assert_eq!(units, vec![1, 3, 6, 10, 15, 21, 28]);
        assert_eq!(list[1].gap, 2);
        assert_eq!(list.last().unwrap().ordinal, 7);
    }

    #[test]
    fn test_geometric_thresholds() {
        let config = GlobalConfig::geometric(1, 100, 100);
        let list = thresholds(&config, 400);
        let gaps: Vec<u128> = list.iter().map(|t| t.gap).collect();
        assert_eq!(gaps, vec![100, 101, 102]);
        assert_eq!(list[2].whole_units, 303);
    }

    #[test]
    fn test_thresholds_empty_below_seed() {
        let config = GlobalConfig::arithmetic(1, 10, 1);
        assert!(thresholds(&config, 9).is_empty());
        assert_eq!(thresholds(&config, 10).len(), 1);
    }
}
