//! Linear daily population model
//!
//! A cheaper alternative to the spline surfaces: bilinear interpolation
//! between the four surrounding annual grid cells, framed on the July-1
//! enumeration anchor. No per-(region, sex) state is built, so it costs
//! nothing at startup and serves as an independent cross-check for the
//! spline model in tests and tooling.

use std::sync::Arc;

use crate::dates::{days_to_decimal_year, DAYS_PER_YEAR, ENUM_DAY, ENUM_MONTH};
use crate::error::Result;
use crate::tables::{AnnualPopulationTable, Sex};

pub struct LinearDailyPopulationModel {
    annual: Arc<AnnualPopulationTable>,
}

impl LinearDailyPopulationModel {
    pub fn new(annual: Arc<AnnualPopulationTable>) -> Self {
        Self { annual }
    }

    /// Population aged exactly `age_days` on `date` (people per day of
    /// age), bilinearly interpolated between the neighbouring annual
    /// estimates
    pub fn pop_age(&self, date: i64, region: &str, sex: Sex, age_days: i64) -> Result<i64> {
        let (year, frac) = days_to_decimal_year(date, ENUM_MONTH, ENUM_DAY);
        let (min_year, max_year) = self.annual.date_range();
        let year = year.clamp(min_year, max_year);
        let next_year = (year + 1).min(max_year);

        let age_years_exact = age_days as f64 / DAYS_PER_YEAR;
        let age_years = age_years_exact.floor() as i64;
        let age_frac = age_years_exact - age_years as f64;

        let corner = |y: i32, a: i64| -> Result<f64> {
            Ok(self.annual.pop_age(y, region, sex, a)? as f64 / DAYS_PER_YEAR)
        };
        let low_year_low_age = corner(year, age_years)?;
        let low_year_high_age = corner(year, age_years + 1)?;
        let high_year_low_age = corner(next_year, age_years)?;
        let high_year_high_age = corner(next_year, age_years + 1)?;

        let low_age = low_year_low_age + (high_year_low_age - low_year_low_age) * frac;
        let high_age = low_year_high_age + (high_year_high_age - low_year_high_age) * frac;
        Ok((low_age + (high_age - low_age) * age_frac).round() as i64)
    }

    /// Population born exactly on `dob`, observed on `date`
    pub fn pop_dob(&self, date: i64, region: &str, sex: Sex, dob: i64) -> Result<i64> {
        self.pop_age(date, region, sex, date - dob)
    }
}
