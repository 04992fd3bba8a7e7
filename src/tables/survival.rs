//! Survival-ratio table: (region, sex, 5-year period) -> cohort survival
//! probabilities per 5-year age group
//!
//! Column `X{a}` is the probability that the cohort aged `[a, a+5)` at the
//! period start is still alive five years later. Used by the mortality
//! distribution to project a synthetic cohort forward.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::tables::MortalitySex;

/// Lower bounds of the 5-year age groups (columns X0, X5, ..., X125)
pub const SURVIVAL_AGE_GROUPS: [u32; 26] = [
    0, 5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 55, 60, 65, 70, 75, 80, 85, 90, 95, 100, 105, 110,
    115, 120, 125,
];

/// One source row
#[derive(Debug, Clone)]
pub struct SurvivalRatioRow {
    pub region: String,
    pub sex: MortalitySex,
    pub period: i32,
    /// Survival probability per entry of [`SURVIVAL_AGE_GROUPS`]
    pub values: Vec<f64>,
}

/// In-memory survival-ratio table (C3)
#[derive(Debug, Clone)]
pub struct SurvivalRatioTable {
    // period-ordered rows per (region, sex) so diagonal scans are a range
    // query
    rows: HashMap<(String, MortalitySex), BTreeMap<i32, Vec<f64>>>,
}

impl SurvivalRatioTable {
    pub fn from_rows(rows: Vec<SurvivalRatioRow>) -> Result<Self> {
        let mut map: HashMap<(String, MortalitySex), BTreeMap<i32, Vec<f64>>> = HashMap::new();
        for row in rows {
            if row.values.len() != SURVIVAL_AGE_GROUPS.len() {
                return Err(Error::Internal(format!(
                    "survival-ratio row for \"{}\" period {} has {} columns, expected {}",
                    row.region,
                    row.period,
                    row.values.len(),
                    SURVIVAL_AGE_GROUPS.len()
                )));
            }
            if row.values.iter().any(|&v| !(0.0..=1.0).contains(&v)) {
                return Err(Error::Internal(format!(
                    "survival-ratio row for \"{}\" period {} has a probability outside [0, 1]",
                    row.region, row.period
                )));
            }
            map.entry((row.region, row.sex))
                .or_default()
                .insert(row.period, row.values);
        }
        Ok(Self { rows: map })
    }

    /// The full set of age-group values for one (region, sex, period)
    pub fn lookup(&self, region: &str, sex: MortalitySex, period: i32) -> Result<&[f64]> {
        self.rows
            .get(&(region.to_string(), sex))
            .and_then(|by_period| by_period.get(&period))
            .map(Vec::as_slice)
            .ok_or_else(|| Error::DataMissing {
                table: "survival-ratio",
                region: region.to_string(),
                sex,
                period,
            })
    }

    /// All rows with `period >= min_period`, ascending by period. Empty
    /// results are reported as missing data, matching [`Self::lookup`].
    pub fn rows_from(
        &self,
        region: &str,
        sex: MortalitySex,
        min_period: i32,
    ) -> Result<Vec<(i32, &[f64])>> {
        let by_period = self
            .rows
            .get(&(region.to_string(), sex))
            .ok_or_else(|| Error::DataMissing {
                table: "survival-ratio",
                region: region.to_string(),
                sex,
                period: min_period,
            })?;
        let rows: Vec<(i32, &[f64])> = by_period
            .range(min_period..)
            .map(|(&period, values)| (period, values.as_slice()))
            .collect();
        if rows.is_empty() {
            return Err(Error::DataMissing {
                table: "survival-ratio",
                region: region.to_string(),
                sex,
                period: min_period,
            });
        }
        Ok(rows)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
