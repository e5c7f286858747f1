// ⚙️ Global Configuration - Fixed at construction
//
// Curve parameters (seed_gap, growth_parameter) can be overridden later by
// the administrative calls on EntitlementToken; everything else is frozen.

use crate::entities::AccountId;
use crate::error::{LedgerError, LedgerResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Geometric growth parameters are expressed in basis points of the gap
pub const GEOMETRIC_SCALE: u128 = 10_000;

/// Default fine-grained units per whole unit (18 decimals)
pub const DEFAULT_WHOLE_UNIT_SIZE: u128 = 1_000_000_000_000_000_000;

// ============================================================================
// CALCULATION MODE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationMode {
    /// Each gap is the previous gap plus a fixed step
    Arithmetic,

    /// Each gap is the previous gap plus floor(gap * rate)
    Geometric,
}

impl CalculationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationMode::Arithmetic => "arithmetic",
            CalculationMode::Geometric => "geometric",
        }
    }
}

// ============================================================================
// GLOBAL CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GlobalConfig {
    /// Human-readable token name
    pub name: String,

    /// Ticker symbol
    pub symbol: String,

    /// Fine-grained units per whole unit (>= 1)
    pub whole_unit_size: u128,

    /// Arithmetic or geometric gap growth
    pub calculation_mode: CalculationMode,

    /// Arithmetic: integer step. Geometric: basis points (100 = 1%)
    pub growth_parameter: u128,

    /// Gap to the first threshold of a fresh curve
    pub seed_gap: u128,

    /// Optional cap on the number of ids ever minted
    pub max_mint_count: Option<u64>,

    /// Whole units credited to the treasury at genesis
    pub total_supply: u128,

    /// Genesis holder, always exempt
    pub treasury: AccountId,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            name: "Entitlement".to_string(),
            symbol: "ENT".to_string(),
            whole_unit_size: DEFAULT_WHOLE_UNIT_SIZE,
            calculation_mode: CalculationMode::Arithmetic,
            growth_parameter: 1,
            seed_gap: 1,
            max_mint_count: None,
            total_supply: 1_000_000_000,
            treasury: AccountId::from("treasury"),
        }
    }
}

impl GlobalConfig {
    /// Arithmetic curve with the given unit size, seed and step
    pub fn arithmetic(whole_unit_size: u128, seed_gap: u128, step: u128) -> Self {
        GlobalConfig {
            whole_unit_size,
            calculation_mode: CalculationMode::Arithmetic,
            growth_parameter: step,
            seed_gap,
            ..Default::default()
        }
    }

    /// Geometric curve; `rate_bps` is in basis points of the current gap
    pub fn geometric(whole_unit_size: u128, seed_gap: u128, rate_bps: u128) -> Self {
        GlobalConfig {
            whole_unit_size,
            calculation_mode: CalculationMode::Geometric,
            growth_parameter: rate_bps,
            seed_gap,
            ..Default::default()
        }
    }

    /// Load and validate a JSON config file
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate a JSON config document
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: GlobalConfig =
            serde_json::from_str(raw).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would produce a stalled or degenerate curve
    pub fn validate(&self) -> LedgerResult<()> {
        if self.whole_unit_size == 0 {
            return Err(LedgerError::InvalidConfiguration(
                "whole_unit_size must be at least 1".to_string(),
            ));
        }
        validate_curve(self.calculation_mode, self.seed_gap, self.growth_parameter)?;
        self.genesis_balance()?;
        Ok(())
    }

    /// Fine-grained units credited to the treasury at construction
    pub fn genesis_balance(&self) -> LedgerResult<u128> {
        self.total_supply
            .checked_mul(self.whole_unit_size)
            .ok_or(LedgerError::Overflow)
    }
}

/// Curve parameter checks shared by construction and admin overrides
pub fn validate_curve(mode: CalculationMode, seed_gap: u128, growth: u128) -> LedgerResult<()> {
    if seed_gap == 0 {
        return Err(LedgerError::InvalidConfiguration(
            "seed_gap must be at least 1".to_string(),
        ));
    }

    if mode == CalculationMode::Geometric {
        // Gaps never shrink, so a non-zero increment at the seed holds forever
        let first_increment = seed_gap.saturating_mul(growth) / GEOMETRIC_SCALE;
        if first_increment == 0 {
            return Err(LedgerError::InvalidConfiguration(format!(
                "geometric rate {} bps on seed gap {} never advances the curve",
                growth, seed_gap
            )));
        }
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = GlobalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.calculation_mode, CalculationMode::Arithmetic);
        assert_eq!(config.whole_unit_size, DEFAULT_WHOLE_UNIT_SIZE);
    }

    #[test]
    fn test_zero_unit_size_rejected() {
        let config = GlobalConfig::arithmetic(0, 1, 1);
        assert!(matches!(
            config.validate(),
            Err(LedgerError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_seed_gap_rejected() {
        assert!(validate_curve(CalculationMode::Arithmetic, 0, 1).is_err());
        assert!(validate_curve(CalculationMode::Geometric, 0, 100).is_err());
    }

    #[test]
    fn test_arithmetic_zero_step_is_valid() {
        assert!(validate_curve(CalculationMode::Arithmetic, 5, 0).is_ok());
    }

    #[test]
    fn test_geometric_stall_rejected() {
        // 1% of 50 truncates to zero
        assert!(validate_curve(CalculationMode::Geometric, 50, 100).is_err());
        // 1% of 100 is exactly one
        assert!(validate_curve(CalculationMode::Geometric, 100, 100).is_ok());
    }

    #[test]
    fn test_genesis_overflow_rejected() {
        let mut config = GlobalConfig::default();
        config.total_supply = u128::MAX;
        assert_eq!(config.validate(), Err(LedgerError::Overflow));
    }

    #[test]
    fn test_from_json_str_partial() {
        let config = GlobalConfig::from_json_str(
            r#"{ "calculation_mode": "geometric", "growth_parameter": 100, "seed_gap": 100, "whole_unit_size": 1 }"#,
        )
        .unwrap();

        assert_eq!(config.calculation_mode, CalculationMode::Geometric);
        assert_eq!(config.seed_gap, 100);
        assert_eq!(config.symbol, "ENT");
        assert_eq!(config.treasury, AccountId::from("treasury"));
    }

    #[test]
    fn test_from_json_str_rejects_unknown_fields() {
        let result = GlobalConfig::from_json_str(r#"{ "seed": 3 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_json_str_rejects_stalled_curve() {
        let result = GlobalConfig::from_json_str(
            r#"{ "calculation_mode": "geometric", "growth_parameter": 1, "seed_gap": 10 }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "name": "Flux", "symbol": "FLX", "seed_gap": 4, "max_mint_count": 10000 }}"#
        )
        .unwrap();

        let config = GlobalConfig::from_path(file.path()).unwrap();
        assert_eq!(config.name, "Flux");
        assert_eq!(config.seed_gap, 4);
        assert_eq!(config.max_mint_count, Some(10_000));

        println!("✅ Config loaded from {}", file.path().display());
    }
}
