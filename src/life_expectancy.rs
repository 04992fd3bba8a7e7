//! Remaining and total life expectancy
//!
//! The UN tables give remaining life expectancy per (sex, region, 5-year
//! period) at a fixed set of exact ages. A query interpolates twice:
//! a cubic spline across the age columns inside each of the three
//! periods around the reference date, then a degree-2 spline across the
//! period midpoints evaluated at the reference date itself.

use chrono::{Datelike, NaiveDate};

use crate::dates::{to_epoch_days, Offset};
use crate::error::{Error, Result};
use crate::interp::{CubicSpline, Parabola};
use crate::tables::{LifeExpectancyTable, MortalitySex, LIFE_AGE_COLUMNS};

/// Validation bounds for the life-expectancy queries.
///
/// `max_effective_birthdate` caps `refdate - age`; the two historic
/// variants of the service disagreed on its value (2095-06-30 vs
/// 2015-06-30), so it is an explicit parameter here with the wider bound
/// as default.
#[derive(Debug, Clone)]
pub struct LifeExpectancyBounds {
    /// Earliest accepted reference date (inclusive)
    pub min_refdate: NaiveDate,
    /// Latest accepted reference date (exclusive)
    pub max_refdate: NaiveDate,
    /// Latest accepted `refdate - age` (inclusive)
    pub max_effective_birthdate: NaiveDate,
    /// Highest accepted age in decimal years
    pub max_age_years: f64,
}

impl Default for LifeExpectancyBounds {
    fn default() -> Self {
        Self {
            min_refdate: NaiveDate::from_ymd_opt(1955, 1, 1).expect("static date"),
            max_refdate: NaiveDate::from_ymd_opt(2095, 1, 1).expect("static date"),
            max_effective_birthdate: NaiveDate::from_ymd_opt(2095, 6, 30).expect("static date"),
            max_age_years: 120.0,
        }
    }
}

/// Supported birthdates for [`total`]
const TOTAL_DOB_MIN: (i32, u32, u32) = (1920, 1, 1);
const TOTAL_DOB_MAX: (i32, u32, u32) = (2059, 12, 31);

/// Anchor age for total life expectancy. Kept at 35 years for
/// compatibility with the original service; the choice is arbitrary and
/// biases the result toward the mortality regime around `dob + 35y`.
const TOTAL_ANCHOR_YEARS: u32 = 35;

/// Remaining life expectancy in years for a person of the given sex,
/// region and age on `refdate`
pub fn remaining(
    table: &LifeExpectancyTable,
    sex: MortalitySex,
    region: &str,
    refdate: NaiveDate,
    age: Offset,
    bounds: &LifeExpectancyBounds,
) -> Result<f64> {
    let age_years = age.decimal_years();
    if age_years > bounds.max_age_years {
        return Err(Error::AgeOutOfRange { value: age_years, max: bounds.max_age_years });
    }
    if refdate < bounds.min_refdate || refdate >= bounds.max_refdate {
        return Err(Error::CalculationDateOutOfRange {
            value: refdate,
            min: bounds.min_refdate,
            max: bounds.max_refdate.pred_opt().unwrap_or(bounds.max_refdate),
        });
    }
    let effective_birthdate = age.sub_from(refdate).ok_or_else(|| {
        Error::Internal(format!("cannot subtract {} from {}", age, refdate))
    })?;
    if effective_birthdate > bounds.max_effective_birthdate {
        return Err(Error::EffectiveBirthdateOutOfRange {
            value: effective_birthdate,
            max: bounds.max_effective_birthdate,
        });
    }

    let period = refdate.year().div_euclid(5) * 5;
    let ages: Vec<f64> = LIFE_AGE_COLUMNS.iter().map(|&a| a as f64).collect();

    let mut midpoints = [0.0; 3];
    let mut values = [0.0; 3];
    for (slot, p) in [period - 5, period, period + 5].into_iter().enumerate() {
        let row = table.lookup(region, sex, p)?;
        let by_age = CubicSpline::new(ages.clone(), row.to_vec())?;
        values[slot] = by_age.eval(age_years);
        midpoints[slot] = period_midpoint(p) as f64;
    }

    let across_time = Parabola::through(midpoints, values)?;
    Ok(across_time.eval(to_epoch_days(refdate) as f64))
}

/// Total life expectancy at birth for a person born on `dob`, anchored at
/// age 35: the anchor age plus the remaining expectancy at `dob + 35y`
pub fn total(
    table: &LifeExpectancyTable,
    sex: MortalitySex,
    region: &str,
    dob: NaiveDate,
    bounds: &LifeExpectancyBounds,
) -> Result<f64> {
    let (min, max) = (ymd(TOTAL_DOB_MIN), ymd(TOTAL_DOB_MAX));
    if dob < min || dob > max {
        return Err(Error::BirthdateOutOfRange { value: dob, min, max });
    }

    let anchor = Offset::new(TOTAL_ANCHOR_YEARS, 0, 0);
    let refdate = anchor
        .add_to(dob)
        .ok_or_else(|| Error::Internal(format!("cannot add {} to {}", anchor, dob)))?;
    let rest = remaining(table, sex, region, refdate, anchor, bounds)?;
    Ok(anchor.decimal_years() + rest)
}

/// Midpoint of a 5-year period `[p, p+5)` as epoch days: January 1 of
/// `p + 3`, the convention of the source tables
pub(crate) fn period_midpoint(period: i32) -> i64 {
    to_epoch_days(NaiveDate::from_ymd_opt(period + 3, 1, 1).expect("static date"))
}

fn ymd((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("static date")
}
