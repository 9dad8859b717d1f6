use std::collections::HashSet;
use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AccrualError, Result};
use crate::interest::{AccrualEngine, RateSchedule};
use crate::interval::{Granularity, DEFAULT_LABEL_FORMAT};
use crate::ledger::ynab::YNAB_BASE_URL;
use crate::payout::PayoutReconciler;
use crate::types::AccountId;

/// environment overlay prefix, e.g. `INTEREST_ACCRUAL__TOKEN`
pub const ENV_PREFIX: &str = "INTEREST_ACCRUAL";

/// raw configuration as read from file and environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_budget_id")]
    pub budget_id: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// ledger client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    /// retries for reads only, writes are never retried
    pub read_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            base_url: YNAB_BASE_URL.to_string(),
            timeout_secs: 30,
            read_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

/// per-account entry, e.g. `calculated = "1 month"`, `rate_apr = ["2", "2024-03-01 4.5"]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: String,
    pub calculated: String,
    pub payout: String,
    pub rate_apr: RateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateConfig {
    Single(RateValue),
    Schedule(Vec<RateValue>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl RateValue {
    fn as_entry_text(&self) -> String {
        match self {
            RateValue::Text(text) => text.clone(),
            RateValue::Integer(value) => value.to_string(),
            RateValue::Float(value) => value.to_string(),
        }
    }
}

impl RateConfig {
    pub fn to_schedule(&self) -> Result<RateSchedule> {
        let raw: Vec<String> = match self {
            RateConfig::Single(value) => vec![value.as_entry_text()],
            RateConfig::Schedule(values) => values.iter().map(RateValue::as_entry_text).collect(),
        };
        RateSchedule::parse(&raw)
    }
}

/// validated account settings
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSettings {
    pub account_id: AccountId,
    pub schedule: RateSchedule,
    pub calculation: Granularity,
    pub payout: Granularity,
}

impl AccountSettings {
    pub fn engine(&self) -> AccrualEngine {
        AccrualEngine::new(self.account_id, self.schedule.clone(), self.calculation, self.payout)
    }
}

/// everything a run needs, validated up front
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub budget_id: String,
    pub date_format: String,
    pub accounts: Vec<AccountSettings>,
}

impl RunSettings {
    pub fn reconciler(&self) -> PayoutReconciler {
        PayoutReconciler::new(self.date_format.clone())
    }
}

impl AppConfig {
    /// load a TOML file and overlay `INTEREST_ACCRUAL__*` environment variables
    pub fn load(path: &Path) -> Result<Self> {
        let builder = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));
        Self::build(builder)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|err| AccrualError::configuration(err.to_string()))
    }

    /// token for the ledger service
    pub fn ledger_token(&self) -> Result<&str> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(AccrualError::configuration(format!(
                "ledger token missing, set `token` or {ENV_PREFIX}__TOKEN"
            )));
        }
        Ok(token)
    }

    /// fail fast on the first malformed entry
    pub fn validate(&self) -> Result<RunSettings> {
        if self.budget_id.trim().is_empty() {
            return Err(AccrualError::configuration("budget_id is empty"));
        }
        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(AccrualError::configuration(format!(
                "date_format '{}' is not a valid format string",
                self.date_format
            )));
        }
        if self.accounts.is_empty() {
            return Err(AccrualError::configuration("no accounts configured"));
        }

        let mut seen = HashSet::new();
        let mut accounts = Vec::with_capacity(self.accounts.len());
        for account in &self.accounts {
            let settings = account.validate()?;
            if !seen.insert(settings.account_id) {
                return Err(AccrualError::configuration(format!(
                    "account {} is configured twice",
                    settings.account_id
                )));
            }
            accounts.push(settings);
        }

        Ok(RunSettings {
            budget_id: self.budget_id.clone(),
            date_format: self.date_format.clone(),
            accounts,
        })
    }
}

impl AccountConfig {
    pub fn validate(&self) -> Result<AccountSettings> {
        let account_id = Uuid::parse_str(self.id.trim()).map_err(|err| {
            AccrualError::configuration(format!("account id '{}' is not a uuid: {err}", self.id))
        })?;
        let in_account = |err: AccrualError| match err {
            AccrualError::InvalidConfiguration { message } => {
                AccrualError::configuration(format!("account {account_id}: {message}"))
            }
            other => other,
        };

        Ok(AccountSettings {
            account_id,
            schedule: self.rate_apr.to_schedule().map_err(in_account)?,
            calculation: self.calculated.parse().map_err(in_account)?,
            payout: self.payout.parse().map_err(in_account)?,
        })
    }
}

fn default_budget_id() -> String {
    "last-used".to_string()
}

fn default_date_format() -> String {
    DEFAULT_LABEL_FORMAT.to_string()
}
