pub mod config;
pub mod decimal;
pub mod errors;
pub mod interest;
pub mod interval;
pub mod ledger;
pub mod payout;
pub mod runner;
pub mod types;

// re-export key types
pub use crate::config::{AccountSettings, AppConfig, LedgerSettings, RunSettings};
pub use decimal::{Amount, Rate};
pub use errors::{AccrualError, Result};
pub use interest::{
    accrue, accumulate_balance, resolve_apr, AccrualEngine, AccrualOutcome, AccrualState,
    PeriodAccrual, RateEntry, RateSchedule,
};
pub use interval::{compute_interval, Granularity, Period, Unit};
pub use ledger::{Ledger, MemoryLedger, UpsertSummary, YnabLedger};
pub use payout::{reconcile_payout, PayoutDecision, PayoutReconciler};
pub use runner::{AccountOutcome, AccountReport, InterestRun, RunReport};
pub use types::{
    AccountId, ClearedState, FlagColor, Transaction, TransactionUpsert, INTEREST_PAYEE,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
