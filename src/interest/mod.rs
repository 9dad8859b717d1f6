pub mod accrual;
pub mod balance;
pub mod rate;

pub use accrual::{
    accrue, whole_period_interest, AccrualEngine, AccrualOutcome, AccrualState, PeriodAccrual,
};
pub use balance::accumulate_balance;
pub use rate::{resolve_apr, RateEntry, RateSchedule};
