//! Mortality distribution by future age bucket
//!
//! Projects a synthetic cohort of 100 people currently the subject's age
//! through the 5-year survival ratios, answering "in which age bracket
//! will someone like me most likely die". Future periods are not in the
//! tables, so each age group's ratio is extrapolated to today from the
//! three most recent observed periods along the cohort diagonal.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::dates::{to_epoch_days, Offset};
use crate::error::{Error, Result};
use crate::interp::Parabola;
use crate::life_expectancy::period_midpoint;
use crate::tables::{MortalitySex, SurvivalRatioTable};

/// Highest accepted age in decimal years
const MAX_AGE_YEARS: f64 = 120.0;

/// One output row: the share of remaining deaths expected to fall in the
/// 5-year bucket starting at `lower_age`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortalityBucket {
    pub lower_age: u32,
    pub percent: f64,
}

/// Distribution of remaining deaths over future 5-year age buckets for a
/// person of the given sex, region and age on `today`. Percentages sum
/// to 100.
pub fn distribution(
    table: &SurvivalRatioTable,
    sex: MortalitySex,
    region: &str,
    age: Offset,
    today: NaiveDate,
) -> Result<Vec<MortalityBucket>> {
    let age_years = age.decimal_years();
    if age_years > MAX_AGE_YEARS {
        return Err(Error::AgeOutOfRange { value: age_years, max: MAX_AGE_YEARS });
    }

    let quinquennial = today.year().div_euclid(5) * 5;
    let floor_age = (age_years / 5.0).floor() as i64 * 5;
    let first_group = (floor_age - 5).max(0) as usize;

    let rows = table.rows_from(region, sex, quinquennial - 10)?;
    if rows.len() < 3 {
        return Err(Error::DataMissing {
            table: "survival-ratio",
            region: region.to_string(),
            sex,
            period: quinquennial - 10,
        });
    }

    // sub-matrix: rows are the periods >= y-10 ascending, columns the age
    // groups from first_group; the three consecutive diagonals follow the
    // same age sequence through three successive periods
    let first_col = first_group / 5;
    let n_cols = rows[0].1.len() - first_col;
    let steps = (rows.len() - 2).min(n_cols);
    let today_days = to_epoch_days(today) as f64;

    let mut survival = Vec::with_capacity(steps);
    for i in 0..steps {
        let midpoints = [
            period_midpoint(rows[i].0) as f64,
            period_midpoint(rows[i + 1].0) as f64,
            period_midpoint(rows[i + 2].0) as f64,
        ];
        let ratios = [
            rows[i].1[first_col + i],
            rows[i + 1].1[first_col + i],
            rows[i + 2].1[first_col + i],
        ];
        let extrapolated = Parabola::through(midpoints, ratios)?.eval(today_days);
        // quadratic extrapolation can leave the unit interval
        survival.push(extrapolated.clamp(0.0, 1.0));
    }

    // synthetic cohort of 100 survivors through the buckets
    let mut alive = Vec::with_capacity(steps);
    alive.push(100.0);
    for i in 1..steps {
        alive.push(alive[i - 1] * survival[i]);
    }

    let mut deaths: Vec<f64> = (0..steps)
        .map(|i| if i + 1 < steps { alive[i] - alive[i + 1] } else { alive[i] })
        .collect();
    // the share of the first bucket already lived through
    deaths[0] -= deaths[0] * (age_years - floor_age as f64) / 5.0;

    let sum: f64 = deaths.iter().sum();
    if sum <= 0.0 {
        return Err(Error::Internal(format!(
            "mortality distribution for \"{}\" degenerated to zero mass",
            region
        )));
    }

    Ok(deaths
        .iter()
        .enumerate()
        .map(|(i, &d)| MortalityBucket {
            lower_age: (floor_age + 5 * i as i64) as u32,
            percent: d * 100.0 / sum,
        })
        .collect())
}
