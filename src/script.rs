// 📂 Operation Scripts - CSV-driven sequences of ledger calls
//
// Columns: op,from,to,value,by
//
//   transfer       from -> to, value in whole units ("1.5" allowed)
//   transfer_token from -> to, value is the token sequence number
//   approve        from = owner, to = spender, value in whole units
//   transfer_from  by = spender, from = owner, to = recipient
//   exempt         from = account
//   unexempt       from = account
//   seed_gap       value = new seed gap
//   growth         value = new growth parameter

use crate::entities::AccountId;
use crate::reconciler::TransferReceipt;
use crate::token::EntitlementToken;
use crate::token_id::TokenId;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptOp {
    Transfer,
    TransferToken,
    Approve,
    TransferFrom,
    Exempt,
    Unexempt,
    SeedGap,
    Growth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub op: ScriptOp,

    #[serde(default)]
    pub from: String,

    #[serde(default)]
    pub to: String,

    #[serde(default)]
    pub value: String,

    #[serde(default)]
    pub by: String,
}

/// What a step did, for CLI output
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub description: String,
    pub receipt: Option<TransferReceipt>,
}

pub fn load_script(path: &Path) -> Result<Vec<ScriptStep>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open script {}", path.display()))?;

    let mut steps = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let step: ScriptStep =
            result.with_context(|| format!("Failed to parse script row {}", line + 2))?;
        steps.push(step);
    }

    Ok(steps)
}

/// Parse "12" or "12.5" whole units into fine-grained units
pub fn parse_amount(raw: &str, whole_unit_size: u128) -> Result<u128> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("Missing amount");
    }

    let (whole, frac) = raw.split_once('.').unwrap_or((raw, ""));
    let whole: u128 = whole
        .parse()
        .with_context(|| format!("Invalid amount: {}", raw))?;

    let mut value = whole
        .checked_mul(whole_unit_size)
        .ok_or_else(|| anyhow!("Amount overflows: {}", raw))?;

    if !frac.is_empty() {
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            bail!("Invalid amount: {}", raw);
        }
        let scale = 10u128
            .checked_pow(frac.len() as u32)
            .ok_or_else(|| anyhow!("Too many decimals: {}", raw))?;
        let frac_value: u128 = frac.parse()?;
        let fine = frac_value
            .checked_mul(whole_unit_size)
            .ok_or_else(|| anyhow!("Amount overflows: {}", raw))?;
        if fine % scale != 0 {
            bail!("Amount {} is finer than the unit size allows", raw);
        }
        value = value
            .checked_add(fine / scale)
            .ok_or_else(|| anyhow!("Amount overflows: {}", raw))?;
    }

    Ok(value)
}

fn account(raw: &str, column: &str) -> Result<AccountId> {
    if raw.is_empty() {
        bail!("Missing '{}' column", column);
    }
    Ok(AccountId::from(raw))
}

fn integer(raw: &str) -> Result<u128> {
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid integer: {}", raw))
}

/// Run one step against the ledger
pub fn apply_step(token: &mut EntitlementToken, step: &ScriptStep) -> Result<StepOutcome> {
    let unit = token.whole_unit_size();

    let outcome = match step.op {
        ScriptOp::Transfer => {
            let from = account(&step.from, "from")?;
            let to = account(&step.to, "to")?;
            let amount = parse_amount(&step.value, unit)?;
            let receipt = token.transfer(&from, &to, amount)?;
            StepOutcome {
                description: format!("transfer {} {} -> {}", step.value, from, to),
                receipt: Some(receipt),
            }
        }
        ScriptOp::TransferToken => {
            let from = account(&step.from, "from")?;
            let to = account(&step.to, "to")?;
            let sequence = u64::try_from(integer(&step.value)?)
                .context("Token sequence out of range")?;
            let id = TokenId::from_sequence(sequence);
            token.transfer_token(&from, &to, id)?;
            StepOutcome {
                description: format!("transfer_token {} {} -> {}", id, from, to),
                receipt: None,
            }
        }
        ScriptOp::Approve => {
            let owner = account(&step.from, "from")?;
            let spender = account(&step.to, "to")?;
            let amount = parse_amount(&step.value, unit)?;
            token.approve(&owner, &spender, amount);
            StepOutcome {
                description: format!("approve {} {} for {}", step.value, owner, spender),
                receipt: None,
            }
        }
        ScriptOp::TransferFrom => {
            let spender = account(&step.by, "by")?;
            let owner = account(&step.from, "from")?;
            let to = account(&step.to, "to")?;
            let amount = parse_amount(&step.value, unit)?;
            let receipt = token.transfer_from(&spender, &owner, &to, amount)?;
            StepOutcome {
                description: format!(
                    "transfer_from {} {} -> {} by {}",
                    step.value, owner, to, spender
                ),
                receipt: Some(receipt),
            }
        }
        ScriptOp::Exempt | ScriptOp::Unexempt => {
            let target = account(&step.from, "from")?;
            let exempt = step.op == ScriptOp::Exempt;
            let receipt = token.set_exempt(&target, exempt)?;
            StepOutcome {
                description: format!("set_exempt {} {}", target, exempt),
                receipt: Some(receipt),
            }
        }
        ScriptOp::SeedGap => {
            let value = integer(&step.value)?;
            token.set_seed_gap(value)?;
            StepOutcome {
                description: format!("set_seed_gap {}", value),
                receipt: None,
            }
        }
        ScriptOp::Growth => {
            let value = integer(&step.value)?;
            token.set_growth_parameter(value)?;
            StepOutcome {
                description: format!("set_growth_parameter {}", value),
                receipt: None,
            }
        }
    };

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalConfig;
    use std::io::Write;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("12", 1_000).unwrap(), 12_000);
        assert_eq!(parse_amount("1.5", 1_000).unwrap(), 1_500);
        assert_eq!(parse_amount("0.001", 1_000).unwrap(), 1);
        assert!(parse_amount("0.0001", 1_000).is_err());
        assert!(parse_amount("abc", 1_000).is_err());
        assert!(parse_amount("1.-5", 1_000).is_err());
        assert!(parse_amount("", 1_000).is_err());
    }

    #[test]
    fn test_load_and_apply_script() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "op,from,to,value,by").unwrap();
        writeln!(file, "exempt,pool,,,").unwrap();
        writeln!(file, "transfer,treasury,alice,10,").unwrap();
        writeln!(file, "transfer_token,alice,bob,1,").unwrap();
        writeln!(file, "approve,alice,router,2,").unwrap();
        writeln!(file, "transfer_from,alice,pool,2,router").unwrap();
        writeln!(file, "seed_gap,,,3,").unwrap();
        file.flush().unwrap();

        let steps = load_script(file.path()).unwrap();
        assert_eq!(steps.len(), 6);
        assert_eq!(steps[4].by, "router");

        let mut token = EntitlementToken::new(GlobalConfig::arithmetic(1, 1, 1)).unwrap();
        for step in &steps {
            apply_step(&mut token, step).unwrap();
        }

        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");
        assert_eq!(token.balance_of(&alice), 7);
        assert_eq!(token.balance_of(&bob), 1);
        assert_eq!(token.owned_tokens(&bob), vec![TokenId::from_sequence(1)]);
        assert_eq!(token.config().seed_gap, 3);
        assert!(token.is_consistent());
    }

    #[test]
    fn test_apply_step_surfaces_ledger_errors() {
        let mut token = EntitlementToken::new(GlobalConfig::arithmetic(1, 1, 1)).unwrap();
        let step = ScriptStep {
            op: ScriptOp::Transfer,
            from: "nobody".to_string(),
            to: "alice".to_string(),
            value: "1".to_string(),
            by: String::new(),
        };

        let err = apply_step(&mut token, &step).unwrap_err();
        assert!(err.to_string().contains("Insufficient balance"));
    }
}
