//! Life-expectancy table: (region, sex, 5-year period) -> remaining life
//! expectancy at a fixed set of exact ages
//!
//! Source rows cover period-begin years 1950, 1955, ... and carry one
//! column per exact age in [`LIFE_AGE_COLUMNS`]. Values are fractional
//! years.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tables::MortalitySex;

/// Exact ages the life-expectancy columns refer to
pub const LIFE_AGE_COLUMNS: [u32; 27] = [
    0, 1, 5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 55, 60, 65, 70, 75, 80, 85, 90, 95, 100, 105,
    110, 115, 120, 125,
];

/// One source row
#[derive(Debug, Clone)]
pub struct LifeExpectancyRow {
    pub region: String,
    pub sex: MortalitySex,
    pub period: i32,
    /// Remaining life expectancy per entry of [`LIFE_AGE_COLUMNS`]
    pub values: Vec<f64>,
}

/// In-memory life-expectancy table (C2)
#[derive(Debug, Clone)]
pub struct LifeExpectancyTable {
    rows: HashMap<(String, MortalitySex, i32), Vec<f64>>,
}

impl LifeExpectancyTable {
    pub fn from_rows(rows: Vec<LifeExpectancyRow>) -> Result<Self> {
        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            if row.values.len() != LIFE_AGE_COLUMNS.len() {
                return Err(Error::Internal(format!(
                    "life-expectancy row for \"{}\" period {} has {} columns, expected {}",
                    row.region,
                    row.period,
                    row.values.len(),
                    LIFE_AGE_COLUMNS.len()
                )));
            }
            map.insert((row.region, row.sex, row.period), row.values);
        }
        Ok(Self { rows: map })
    }

    /// The full set of age-column values for one (region, sex, period)
    pub fn lookup(&self, region: &str, sex: MortalitySex, period: i32) -> Result<&[f64]> {
        self.rows
            .get(&(region.to_string(), sex, period))
            .map(Vec::as_slice)
            .ok_or_else(|| Error::DataMissing {
                table: "life-expectancy",
                region: region.to_string(),
                sex,
                period,
            })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
