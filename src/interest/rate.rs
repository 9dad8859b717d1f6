use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::decimal::Rate;
use crate::errors::{AccrualError, Result};

/// one entry of a rate schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateEntry {
    /// applies before the first dated entry
    Initial(Rate),
    /// applies strictly after `effective`
    Dated { effective: NaiveDate, rate: Rate },
}

impl RateEntry {
    pub fn rate(&self) -> Rate {
        match self {
            RateEntry::Initial(rate) | RateEntry::Dated { rate, .. } => *rate,
        }
    }
}

/// parses `"<apr>"` or `"<YYYY-MM-DD> <apr>"`, apr given in percent
impl FromStr for RateEntry {
    type Err = AccrualError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            [apr] => Ok(RateEntry::Initial(parse_percentage(apr)?)),
            [effective, apr] => {
                let effective =
                    NaiveDate::parse_from_str(effective, "%Y-%m-%d").map_err(|err| {
                        AccrualError::configuration(format!(
                            "unparsable effective date '{effective}': {err}"
                        ))
                    })?;
                Ok(RateEntry::Dated {
                    effective,
                    rate: parse_percentage(apr)?,
                })
            }
            _ => Err(AccrualError::configuration(format!(
                "rate entry '{s}' must look like '<apr>' or '<YYYY-MM-DD> <apr>'"
            ))),
        }
    }
}

fn parse_percentage(value: &str) -> Result<Rate> {
    Decimal::from_str(value)
        .map(Rate::from_percentage)
        .map_err(|_| AccrualError::configuration(format!("rate '{value}' is not numeric")))
}

/// validated, possibly time-varying APR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSchedule {
    initial: Rate,
    /// ascending by effective date
    dated: Vec<(NaiveDate, Rate)>,
}

impl RateSchedule {
    pub fn constant(rate: Rate) -> Result<Self> {
        Self::new(vec![RateEntry::Initial(rate)])
    }

    /// validate entries; the first must be `Initial`, dated entries strictly ascending
    pub fn new(entries: Vec<RateEntry>) -> Result<Self> {
        let mut entries = entries.into_iter();
        let initial = match entries.next() {
            Some(RateEntry::Initial(rate)) => rate,
            Some(RateEntry::Dated { effective, .. }) => {
                return Err(AccrualError::configuration(format!(
                    "rate dated {effective} needs an initial rate before it"
                )))
            }
            None => return Err(AccrualError::configuration("rate schedule is empty")),
        };
        ensure_non_negative(initial)?;

        let mut dated: Vec<(NaiveDate, Rate)> = Vec::new();
        for entry in entries {
            let RateEntry::Dated { effective, rate } = entry else {
                return Err(AccrualError::configuration(
                    "only the first rate entry may be undated",
                ));
            };
            ensure_non_negative(rate)?;

            if let Some((previous, _)) = dated.last() {
                if effective <= *previous {
                    return Err(AccrualError::configuration(format!(
                        "rate dated {effective} must come after {previous}"
                    )));
                }
            }
            dated.push((effective, rate));
        }

        Ok(Self { initial, dated })
    }

    /// parse and validate raw configuration strings
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self> {
        let entries = raw
            .iter()
            .map(|entry| entry.as_ref().parse())
            .collect::<Result<Vec<RateEntry>>>()?;
        Self::new(entries)
    }

    pub fn initial(&self) -> Rate {
        self.initial
    }

    pub fn dated(&self) -> &[(NaiveDate, Rate)] {
        &self.dated
    }

    pub fn is_constant(&self) -> bool {
        self.dated.is_empty()
    }

    /// latest rate whose effective date is strictly before `date`
    pub fn resolve(&self, date: NaiveDate) -> Rate {
        self.dated
            .iter()
            .rev()
            .find(|(effective, _)| *effective < date)
            .map(|(_, rate)| *rate)
            .unwrap_or(self.initial)
    }

    /// true when a rate change takes effect between `start` and `end` (exclusive)
    pub fn changes_within(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.dated.iter().any(|(effective, _)| {
            start <= *effective && effective.succ_opt().is_some_and(|d| d < end)
        })
    }
}

/// effective APR for `date`
pub fn resolve_apr(date: NaiveDate, schedule: &RateSchedule) -> Rate {
    schedule.resolve(date)
}

fn ensure_non_negative(rate: Rate) -> Result<()> {
    if rate.is_negative() {
        return Err(AccrualError::configuration(format!("negative rate {rate}")));
    }
    Ok(())
}
