//! calendar-aligned periods
//!
//! Every period is counted from the first day of the calendar year that
//! contains its anchor date, so index 0 is always the first period of the
//! year. A period never extends past the end of its year: the last period
//! of a year is cut at 1 January of the next one, which keeps consecutive
//! periods tiling the timeline without gaps or overlaps.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{AccrualError, Result};

/// default label format (day/month/year)
pub const DEFAULT_LABEL_FORMAT: &str = "%d/%m/%Y";

/// calendar unit a period is measured in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Day => "day",
            Unit::Week => "week",
            Unit::Month => "month",
            Unit::Quarter => "quarter",
            Unit::Year => "year",
        }
    }

    /// whole units elapsed between 1 january and `date`
    fn units_since_year_start(&self, date: NaiveDate) -> u32 {
        match self {
            Unit::Day => date.ordinal0(),
            Unit::Week => date.ordinal0() / 7,
            Unit::Month => date.month0(),
            Unit::Quarter => date.month0() / 3,
            Unit::Year => 0,
        }
    }

    fn add(&self, date: NaiveDate, n: u32) -> Result<NaiveDate> {
        let shifted = match self {
            Unit::Day => date.checked_add_days(Days::new(u64::from(n))),
            Unit::Week => date.checked_add_days(Days::new(u64::from(n) * 7)),
            Unit::Month => date.checked_add_months(Months::new(n)),
            Unit::Quarter => n.checked_mul(3).and_then(|m| date.checked_add_months(Months::new(m))),
            Unit::Year => n.checked_mul(12).and_then(|m| date.checked_add_months(Months::new(m))),
        };

        shifted.ok_or_else(|| AccrualError::InvalidDate {
            message: format!("{date} + {n} {} is out of range", self.as_str()),
        })
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = AccrualError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        let singular = lowered.strip_suffix('s').unwrap_or(&lowered);
        match singular {
            "day" => Ok(Unit::Day),
            "week" => Ok(Unit::Week),
            "month" => Ok(Unit::Month),
            "quarter" => Ok(Unit::Quarter),
            "year" => Ok(Unit::Year),
            _ => Err(AccrualError::configuration(format!("unknown interval unit '{s}'"))),
        }
    }
}

/// period size, e.g. "1 month" or "2 weeks"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Granularity {
    count: u32,
    unit: Unit,
}

impl Granularity {
    pub fn new(count: u32, unit: Unit) -> Result<Self> {
        if count == 0 {
            return Err(AccrualError::configuration(format!(
                "interval count must be at least 1, got 0 {unit}"
            )));
        }
        Ok(Self { count, unit })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// period containing `anchor`
    pub fn period_containing(&self, anchor: NaiveDate) -> Result<Period> {
        compute_interval(*self, anchor, false)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.count, self.unit)
    }
}

impl FromStr for Granularity {
    type Err = AccrualError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let (Some(count), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AccrualError::configuration(format!(
                "interval '{s}' must look like '<count> <unit>'"
            )));
        };

        let count = count.parse::<u32>().map_err(|_| {
            AccrualError::configuration(format!(
                "interval count '{count}' is not a positive integer"
            ))
        })?;
        Granularity::new(count, unit.parse()?)
    }
}

impl TryFrom<String> for Granularity {
    type Error = AccrualError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Granularity> for String {
    fn from(value: Granularity) -> Self {
        value.to_string()
    }
}

/// one calendar-aligned period, `start` inclusive, `end` exclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    /// ordinal of the period within its calendar year
    pub index: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub unit: Unit,
    pub count: u32,
    force_range: bool,
}

impl Period {
    pub fn granularity(&self) -> Granularity {
        Granularity {
            count: self.count,
            unit: self.unit,
        }
    }

    /// the period starting where this one ends
    pub fn next(&self) -> Result<Period> {
        compute_interval(self.granularity(), self.end, false)
    }

    /// the period ending where this one starts
    pub fn previous(&self) -> Result<Period> {
        let before = self.start.pred_opt().ok_or_else(|| AccrualError::InvalidDate {
            message: format!("no period precedes {}", self.start),
        })?;
        compute_interval(self.granularity(), before, false)
    }

    #[must_use]
    pub fn with_range_label(mut self) -> Self {
        self.force_range = true;
        self
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    pub fn days(&self) -> u32 {
        (self.end - self.start).num_days() as u32
    }

    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |day| *day < self.end)
    }

    /// length of the calendar year the period belongs to
    pub fn days_in_year(&self) -> u32 {
        days_in_year(self.start.year())
    }

    pub fn label(&self) -> String {
        self.label_with(DEFAULT_LABEL_FORMAT)
    }

    pub fn label_with(&self, format: &str) -> String {
        let start = self.start.format(format).to_string();
        if self.count == 1 && self.unit == Unit::Day && !self.force_range {
            start
        } else {
            format!("{start}-{}", self.end.format(format))
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// compute the period of the given size that contains `anchor`
pub fn compute_interval(
    granularity: Granularity,
    anchor: NaiveDate,
    force_range: bool,
) -> Result<Period> {
    let Granularity { count, unit } = granularity;
    let year_start = start_of_year(anchor.year())?;
    let next_year_start = start_of_year(anchor.year() + 1)?;

    let index = unit.units_since_year_start(anchor) / count;
    let start = unit.add(year_start, index * count)?;
    let end = unit.add(start, count)?.min(next_year_start);

    Ok(Period {
        index,
        start,
        end,
        unit,
        count,
        force_range,
    })
}

pub fn start_of_year(year: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| AccrualError::InvalidDate {
        message: format!("year {year} is out of range"),
    })
}

/// 365, or 366 in leap years
pub fn days_in_year(year: i32) -> u32 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366
    } else {
        365
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn granularity(count: u32, unit: Unit) -> Granularity {
        Granularity::new(count, unit).unwrap()
    }

    fn period_of(count: u32, unit: Unit, anchor: NaiveDate) -> Period {
        compute_interval(granularity(count, unit), anchor, false).unwrap()
    }

    #[test]
    fn test_month_period() {
        let period = period_of(1, Unit::Month, date(2024, 2, 17));
        assert_eq!(period.index, 1);
        assert_eq!(period.start, date(2024, 2, 1));
        assert_eq!(period.end, date(2024, 3, 1));
        assert_eq!(period.days(), 29);
        assert_eq!(period.label(), "01/02/2024-01/03/2024");
    }

    #[test]
    fn test_multi_unit_alignment() {
        let period = period_of(2, Unit::Month, date(2023, 6, 30));
        assert_eq!(period.index, 2);
        assert_eq!(period.start, date(2023, 5, 1));
        assert_eq!(period.end, date(2023, 7, 1));

        let quarter = period_of(1, Unit::Quarter, date(2023, 8, 15));
        assert_eq!(quarter.index, 2);
        assert_eq!(quarter.start, date(2023, 7, 1));
        assert_eq!(quarter.end, date(2023, 10, 1));
    }

    #[test]
    fn test_index_zero_starts_the_year() {
        for unit in [Unit::Day, Unit::Week, Unit::Month, Unit::Quarter, Unit::Year] {
            for count in 1..=5 {
                let period = period_of(count, unit, date(2023, 1, 1));
                assert_eq!(period.index, 0);
                assert_eq!(period.start, date(2023, 1, 1));
            }
        }
    }

    #[test]
    fn test_periods_tile_across_years() {
        for unit in [Unit::Day, Unit::Week, Unit::Month, Unit::Quarter, Unit::Year] {
            for count in [1, 2, 3, 5, 7] {
                let mut period = period_of(count, unit, date(2023, 3, 9));
                while period.start < date(2025, 6, 1) {
                    assert!(period.start < period.end, "{unit} x{count}: empty period");
                    let next = period.next().unwrap();
                    assert_eq!(period.end, next.start, "{unit} x{count}: gap or overlap");
                    let previous = next.previous().unwrap();
                    assert_eq!(previous, period, "{unit} x{count}: previous mismatch");
                    period = next;
                }
            }
        }
    }

    #[test]
    fn test_last_week_is_cut_at_year_end() {
        let period = period_of(1, Unit::Week, date(2023, 12, 31));
        assert_eq!(period.index, 52);
        assert_eq!(period.start, date(2023, 12, 31));
        assert_eq!(period.end, date(2024, 1, 1));

        let next = period.next().unwrap();
        assert_eq!(next.index, 0);
        assert_eq!(next.start, date(2024, 1, 1));
        assert_eq!(next.end, date(2024, 1, 8));
    }

    #[test]
    fn test_uneven_months_are_cut_at_year_end() {
        let period = period_of(5, Unit::Month, date(2023, 12, 1));
        assert_eq!(period.index, 2);
        assert_eq!(period.start, date(2023, 11, 1));
        assert_eq!(period.end, date(2024, 1, 1));
    }

    #[test]
    fn test_previous_of_first_period() {
        let period = period_of(1, Unit::Month, date(2024, 1, 10));
        let previous = period.previous().unwrap();
        assert_eq!(previous.start, date(2023, 12, 1));
        assert_eq!(previous.end, date(2024, 1, 1));
        assert_eq!(previous.index, 11);
    }

    #[test]
    fn test_labels() {
        let day = period_of(1, Unit::Day, date(2024, 5, 4));
        assert_eq!(day.label(), "04/05/2024");
        assert_eq!(day.clone().with_range_label().label(), "04/05/2024-05/05/2024");

        let year = compute_interval(granularity(1, Unit::Year), date(2023, 7, 1), true).unwrap();
        assert_eq!(year.label(), "01/01/2023-01/01/2024");
        assert_eq!(year.label_with("%Y-%m-%d"), "2023-01-01-2024-01-01");

        let days = period_of(3, Unit::Day, date(2024, 1, 5));
        assert_eq!(days.label(), "04/01/2024-07/01/2024");
    }

    #[test]
    fn test_days_in_year() {
        assert_eq!(days_in_year(2023), 365);
        assert_eq!(days_in_year(2024), 366);
        assert_eq!(days_in_year(1900), 365);
        assert_eq!(days_in_year(2000), 366);
    }

    #[test]
    fn test_iter_days() {
        let period = period_of(1, Unit::Week, date(2024, 1, 3));
        let days: Vec<_> = period.iter_days().collect();
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], date(2024, 1, 1));
        assert_eq!(days[6], date(2024, 1, 7));
        assert!(period.contains(date(2024, 1, 7)));
        assert!(!period.contains(date(2024, 1, 8)));
    }

    #[test]
    fn test_granularity_parsing() {
        let parsed: Granularity = "2 Weeks".parse().unwrap();
        assert_eq!(parsed, granularity(2, Unit::Week));
        assert_eq!(parsed.to_string(), "2 week");

        assert!("0 month".parse::<Granularity>().is_err());
        assert!("-1 month".parse::<Granularity>().is_err());
        assert!("month".parse::<Granularity>().is_err());
        assert!("1 fortnight".parse::<Granularity>().is_err());
        assert!("1 month extra".parse::<Granularity>().is_err());
    }
}
