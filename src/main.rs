use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::Parser;
use interest_accrual::{AppConfig, InterestRun, SafeTimeProvider, TimeSource, YnabLedger};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "interest-accrual",
    version,
    about = "Accrue interest from ledger history and record the payout transaction"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "interest-accrual.toml")]
    config: PathBuf,

    /// Compute and log payouts without writing them
    #[arg(long)]
    dry_run: bool,

    /// Run as if today were this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,
}

fn parse_date(value: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| format!("invalid date '{value}': {err}"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let settings = config.validate()?;
    let ledger = YnabLedger::new(config.ledger_token()?, &config.ledger)?;

    let source = match cli.today {
        Some(day) => {
            let midday = day
                .and_hms_opt(12, 0, 0)
                .context("invalid --today")?;
            TimeSource::Test(Utc.from_utc_datetime(&midday))
        }
        None => TimeSource::System,
    };
    let time = SafeTimeProvider::new(source);

    let report = InterestRun::new(&ledger, &settings)
        .dry_run(cli.dry_run)
        .execute(&time)
        .await
        .context("interest run failed")?;

    info!(
        accounts = report.accounts.len(),
        submitted = report.submitted.len(),
        "interest run complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
