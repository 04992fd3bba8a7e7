//! Epoch-day and decimal-year arithmetic
//!
//! All interpolation is done on two integer axes: age in days and date in
//! days since 1970-01-01 (epoch days, negative for earlier dates). The
//! conversions here are the only place calendar logic lives; everything
//! downstream works on plain numbers.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Days per year used in every age<->day conversion.
///
/// This constant is contractual: knot positions and returned counts are
/// defined relative to 365.25, so substituting 365 or 365.2425 changes
/// results.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Month of the annual enumeration anchor (WPP estimates are mid-year)
pub const ENUM_MONTH: u32 = 7;
/// Day of the annual enumeration anchor
pub const ENUM_DAY: u32 = 1;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).expect("static date")
}

/// Days between `date` and 1970-01-01 (negative for earlier dates)
pub fn to_epoch_days(date: NaiveDate) -> i64 {
    (date - epoch()).num_days()
}

/// Calendar date `days` after 1970-01-01
pub fn from_epoch_days(days: i64) -> NaiveDate {
    epoch() + chrono::Duration::days(days)
}

fn anchor_days(year: i32, month: u32, day: u32) -> i64 {
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, month, day - 1).expect("anchor date"));
    to_epoch_days(date)
}

/// Frame an epoch day into `(year, frac)` relative to a recurring anchor
/// day: `days` lies `frac` of the way from `(year, month, day)` to the
/// next year's anchor. With the default July-1 anchor this yields the
/// enumeration year a date belongs to.
pub fn days_to_decimal_year(days: i64, anchor_month: u32, anchor_day: u32) -> (i32, f64) {
    let mut year = from_epoch_days(days).year();
    if days < anchor_days(year, anchor_month, anchor_day) {
        year -= 1;
    }
    let start = anchor_days(year, anchor_month, anchor_day);
    let end = anchor_days(year + 1, anchor_month, anchor_day);
    let frac = (days - start) as f64 / (end - start) as f64;
    (year, frac)
}

/// Inverse of [`days_to_decimal_year`]: the (possibly fractional) epoch
/// day lying `frac` of the way from the year's anchor to the next.
pub fn decimal_year_to_days(year: i32, frac: f64, anchor_month: u32, anchor_day: u32) -> f64 {
    let start = anchor_days(year, anchor_month, anchor_day);
    let end = anchor_days(year + 1, anchor_month, anchor_day);
    start as f64 + frac * (end - start) as f64
}

/// A calendar offset of whole years, months and days.
///
/// Parsed from either a plain digit string (interpreted as days) or the
/// pattern `##y##m##d` with each group optional but at least one present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub years: u32,
    pub months: u32,
    pub days: u32,
}

impl Offset {
    pub fn new(years: u32, months: u32, days: u32) -> Self {
        Self { years, months, days }
    }

    /// Offset of a whole number of days
    pub fn from_days(days: u32) -> Self {
        Self { years: 0, months: 0, days }
    }

    pub fn is_zero(&self) -> bool {
        self.years == 0 && self.months == 0 && self.days == 0
    }

    /// Add the offset to a date using calendar arithmetic: whole months
    /// first (clamping to month ends), then days.
    pub fn add_to(&self, date: NaiveDate) -> Option<NaiveDate> {
        date.checked_add_months(Months::new(self.years * 12 + self.months))?
            .checked_add_days(Days::new(self.days as u64))
    }

    /// Subtract the offset from a date using calendar arithmetic
    pub fn sub_from(&self, date: NaiveDate) -> Option<NaiveDate> {
        date.checked_sub_months(Months::new(self.years * 12 + self.months))?
            .checked_sub_days(Days::new(self.days as u64))
    }

    /// Decimal-year value: `years + months/12 + days/365`
    pub fn decimal_years(&self) -> f64 {
        self.years as f64 + self.months as f64 / 12.0 + self.days as f64 / 365.0
    }

    /// Truncate a decimal-year value back into a whole-year/day offset
    pub fn from_decimal_years(years: f64) -> Self {
        let whole = years.trunc() as u32;
        let days = (years.fract() * 365.0).trunc() as u32;
        Self { years: whole, months: 0, days }
    }
}

impl FromStr for Offset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let fail = || Error::ParseOffset(s.to_string());

        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            let days: u32 = s.parse().map_err(|_| fail())?;
            return Ok(Offset::from_days(days));
        }

        // ^(\d+y)?(\d+m)?(\d+d)?$ with at least one group matched
        let mut rest = s;
        let mut matched = false;
        let mut take = |suffix: char| -> Result<u32, Error> {
            let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            if digits > 0 && rest[digits..].starts_with(suffix) {
                let value = rest[..digits].parse().map_err(|_| fail())?;
                rest = &rest[digits + 1..];
                matched = true;
                Ok(value)
            } else {
                Ok(0)
            }
        };

        let years = take('y')?;
        let months = take('m')?;
        let days = take('d')?;

        if !matched || !rest.is_empty() {
            return Err(fail());
        }
        Ok(Offset { years, months, days })
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0d");
        }
        if self.years > 0 {
            write!(f, "{}y", self.years)?;
        }
        if self.months > 0 {
            write!(f, "{}m", self.months)?;
        }
        if self.days > 0 {
            write!(f, "{}d", self.days)?;
        }
        Ok(())
    }
}
