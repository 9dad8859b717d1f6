use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::decimal::{Amount, Rate};
use crate::errors::{AccrualError, Result};
use crate::interest::balance::accumulate_balance;
use crate::interest::rate::RateSchedule;
use crate::interval::{Granularity, Period};
use crate::types::{AccountId, Transaction};

/// walk state, owned by a single `accrue` call
#[derive(Debug, Clone, PartialEq)]
pub struct AccrualState {
    pub current_date: NaiveDate,
    pub running_balance: Amount,
    pub accrued_interest: Decimal,
    pub current_payout_index: u32,
}

impl AccrualState {
    pub fn new(start: NaiveDate) -> Self {
        Self {
            current_date: start,
            running_balance: Amount::ZERO,
            accrued_interest: Decimal::ZERO,
            current_payout_index: 0,
        }
    }
}

/// interest computed for one calculation period
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodAccrual {
    pub calculation: Period,
    pub payout: Period,
    /// running balance at the end of the calculation period
    pub balance: Amount,
    pub interest: Decimal,
    /// accrued total for the payout period so far
    pub accrued: Decimal,
}

/// result of walking an account's history up to today
#[derive(Debug, Clone, PartialEq)]
pub struct AccrualOutcome {
    pub accrued_interest: Decimal,
    /// payout period the accrued total belongs to, range-labelled
    pub payout_period: Period,
    /// first date after the walk
    pub final_date: NaiveDate,
    pub running_balance: Amount,
    pub periods: Vec<PeriodAccrual>,
}

/// engine for accruing interest over a transaction history
#[derive(Debug, Clone)]
pub struct AccrualEngine {
    pub account_id: AccountId,
    pub schedule: RateSchedule,
    pub calculation: Granularity,
    pub payout: Granularity,
}

impl AccrualEngine {
    pub fn new(
        account_id: AccountId,
        schedule: RateSchedule,
        calculation: Granularity,
        payout: Granularity,
    ) -> Self {
        Self {
            account_id,
            schedule,
            calculation,
            payout,
        }
    }

    /// walk calculation periods from the first transaction through `today`
    pub fn accrue(&self, transactions: &[Transaction], today: NaiveDate) -> Result<AccrualOutcome> {
        let first = transactions
            .iter()
            .map(|tx| tx.date)
            .min()
            .ok_or(AccrualError::NoTransactions {
                account_id: self.account_id,
            })?;

        let mut state = AccrualState::new(first);
        let mut periods = Vec::new();
        let mut last_payout: Option<Period> = None;
        let mut reset_pending = false;

        while state.current_date <= today {
            let calculation = self.calculation.period_containing(state.current_date)?;
            let payout = self.payout.period_containing(state.current_date)?;

            // crossed into a new payout period
            if reset_pending {
                state.accrued_interest = Decimal::ZERO;
                reset_pending = false;
            }
            state.current_payout_index = payout.index;

            state.running_balance += accumulate_balance(transactions, &calculation);
            let interest = self.period_interest(state.running_balance, &calculation);
            state.accrued_interest += interest;

            debug!(
                account_id = %self.account_id,
                payout = %payout,
                calculation = %calculation,
                balance = %state.running_balance,
                rate_change = self.schedule.changes_within(calculation.start, calculation.end),
                interest = %interest.round_dp(4),
                accrued = %state.accrued_interest.round_dp(4),
                "accrued calculation period"
            );

            state.current_date = calculation.next()?.start;
            if state.current_date >= payout.end {
                reset_pending = true;
            }

            periods.push(PeriodAccrual {
                calculation,
                payout: payout.clone(),
                balance: state.running_balance,
                interest,
                accrued: state.accrued_interest,
            });
            last_payout = Some(payout);
        }

        let payout_period = match last_payout {
            Some(period) => period,
            // history starts after today, nothing accrued yet
            None => self.payout.period_containing(today)?,
        };

        Ok(AccrualOutcome {
            accrued_interest: state.accrued_interest,
            payout_period: payout_period.with_range_label(),
            final_date: state.current_date,
            running_balance: state.running_balance,
            periods,
        })
    }

    /// daily proration, resolving the rate for every day of the period
    pub fn period_interest(&self, balance: Amount, period: &Period) -> Decimal {
        let days_in_year = period.days_in_year();
        period
            .iter_days()
            .map(|day| balance.as_decimal() * self.schedule.resolve(day).daily_rate(days_in_year))
            .sum()
    }
}

/// `accrue` for callers that do not keep an engine around
pub fn accrue(
    account_id: AccountId,
    transactions: &[Transaction],
    schedule: &RateSchedule,
    calculation: Granularity,
    payout: Granularity,
    today: NaiveDate,
) -> Result<AccrualOutcome> {
    AccrualEngine::new(account_id, schedule.clone(), calculation, payout)
        .accrue(transactions, today)
}

/// whole-period proration at a single rate
pub fn whole_period_interest(balance: Amount, rate: Rate, period: &Period) -> Decimal {
    balance.as_decimal() * rate.as_decimal() * Decimal::from(period.days())
        / Decimal::from(period.days_in_year())
}
