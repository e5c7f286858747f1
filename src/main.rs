use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use entitlement_ledger::{
    append_events, apply_step, load_script, open_journal, thresholds, EntitlementToken,
    GlobalConfig,
};

#[derive(Parser)]
#[command(name = "entitlement-ledger", version, about = "Fungible balances with curve-driven entitlement ids")]
struct Cli {
    /// JSON config file (defaults: arithmetic curve, seed 1, step 1)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the threshold schedule of the configured curve
    Curve {
        /// Stop once thresholds pass this many whole units
        #[arg(long, default_value_t = 100)]
        max_units: u128,
    },

    /// Replay a CSV operation script against a fresh ledger
    Simulate {
        /// Script with columns op,from,to,value,by
        script: PathBuf,

        /// Append the audit trail to this SQLite journal
        #[arg(long)]
        journal: Option<PathBuf>,

        /// Write the final ledger snapshot as JSON
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Stop at the first failing step instead of reporting and continuing
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Curve { max_units } => run_curve(&config, max_units),
        Command::Simulate {
            script,
            journal,
            snapshot,
            strict,
        } => run_simulate(config, &script, journal.as_deref(), snapshot.as_deref(), strict),
    }
}

fn load_config(path: Option<&Path>) -> Result<GlobalConfig> {
    match path {
        Some(path) => GlobalConfig::from_path(path),
        None => Ok(GlobalConfig::default()),
    }
}

fn run_curve(config: &GlobalConfig, max_units: u128) -> Result<()> {
    config.validate()?;

    println!("📈 {} ({}) - {} curve", config.name, config.symbol, config.calculation_mode.as_str());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   seed gap: {}   growth: {}", config.seed_gap, config.growth_parameter);
    println!();
    println!("{:>8}  {:>20}  {:>24}", "ordinal", "gap", "whole units");

    let schedule = thresholds(config, max_units);
    for t in &schedule {
        println!("{:>8}  {:>20}  {:>24}", t.ordinal, t.gap, t.whole_units);
    }

    println!();
    println!("✓ {} entitlements within {} whole units", schedule.len(), max_units);
    Ok(())
}

fn run_simulate(
    config: GlobalConfig,
    script: &Path,
    journal: Option<&Path>,
    snapshot: Option<&Path>,
    strict: bool,
) -> Result<()> {
    println!("🪙 Entitlement Ledger - Script Replay");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load script
    println!("\n📂 Loading script...");
    let steps = load_script(script)?;
    println!("✓ Loaded {} steps from {}", steps.len(), script.display());

    // 2. Genesis
    println!("\n🔧 Creating ledger...");
    let mut token = EntitlementToken::new(config)?;
    println!(
        "✓ {} {} minted to {}",
        token.config().total_supply,
        token.symbol(),
        token.config().treasury
    );

    // 3. Replay
    println!("\n▶️  Replaying...");
    let mut failed = 0usize;
    for (i, step) in steps.iter().enumerate() {
        match apply_step(&mut token, step) {
            Ok(outcome) => {
                let detail = outcome
                    .receipt
                    .filter(|r| !r.is_empty())
                    .map(|r| format!("  (burned {}, minted {})", r.burned.len(), r.minted.len()))
                    .unwrap_or_default();
                println!("  {:>4}. ✓ {}{}", i + 1, outcome.description, detail);
            }
            Err(e) => {
                if strict {
                    return Err(e.context(format!("Step {} failed", i + 1)));
                }
                failed += 1;
                println!("  {:>4}. ❌ {:?}: {}", i + 1, step.op, e);
            }
        }
    }

    // 4. Journal
    if let Some(path) = journal {
        println!("\n💾 Writing journal...");
        let mut conn = open_journal(path)?;
        let events = token.drain_events();
        let inserted = append_events(&mut conn, &events)?;
        println!("✓ Journaled {} of {} events to {}", inserted, events.len(), path.display());
    }

    // 5. Snapshot
    let snap = token.snapshot();
    if let Some(path) = snapshot {
        let json = serde_json::to_string_pretty(&snap)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        println!("\n📸 Snapshot written to {}", path.display());
    }

    // 6. Summary
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📊 Accounts:");
    for view in &snap.accounts {
        let marker = if view.exempt { " (exempt)" } else { "" };
        println!(
            "   {:<16} balance {:>28}  ids {:>6}{}",
            view.account.as_str(),
            view.balance,
            view.entitlements.len(),
            marker
        );
    }
    println!("\n✓ Ids minted: {}", token.minted());
    println!("✓ State digest: {}", token.state_digest());

    if token.is_consistent() {
        println!("✅ Entitlements match every curve");
    } else {
        println!("⚠️  Entitlement counts drifted from their curves");
    }

    if failed > 0 {
        println!("⚠️  {} step(s) rejected", failed);
    }

    Ok(())
}
