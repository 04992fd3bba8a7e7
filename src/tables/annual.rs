//! Annual population table: (region, sex) -> age x year matrix of counts
//!
//! Backed by the WPP single-year-of-age annual estimates. Each cell is the
//! mid-year (July 1) population in whole persons for one region, sex, age
//! in whole years and calendar year. Dense over ages 0..=100 and years
//! 1950..=2100; immutable after construction.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tables::Sex;

/// First year of the annual estimates
pub const MIN_YEAR: i32 = 1950;
/// Last year of the annual estimates
pub const MAX_YEAR: i32 = 2100;
/// Lowest age in whole years
pub const MIN_AGE: u32 = 0;
/// Highest age in whole years
pub const MAX_AGE: u32 = 100;

const N_AGES: usize = (MAX_AGE - MIN_AGE + 1) as usize;
const N_YEARS: usize = (MAX_YEAR - MIN_YEAR + 1) as usize;

/// One source cell in whole persons (already scaled from the file's
/// thousands)
#[derive(Debug, Clone)]
pub struct AnnualRow {
    pub location: String,
    pub year: i32,
    pub age: u32,
    pub male: i64,
    pub female: i64,
    pub total: i64,
}

/// Age-major matrices for one region, index `age * N_YEARS + year_offset`
#[derive(Debug, Clone)]
struct SexMatrices {
    male: Vec<i64>,
    female: Vec<i64>,
    all: Vec<i64>,
}

impl SexMatrices {
    fn empty() -> Self {
        // -1 marks cells not yet populated; the dense-rectangle check
        // rejects any survivor
        Self {
            male: vec![-1; N_AGES * N_YEARS],
            female: vec![-1; N_AGES * N_YEARS],
            all: vec![-1; N_AGES * N_YEARS],
        }
    }

    fn of(&self, sex: Sex) -> &[i64] {
        match sex {
            Sex::Male => &self.male,
            Sex::Female => &self.female,
            Sex::All => &self.all,
        }
    }
}

/// In-memory annual population table (C1)
#[derive(Debug, Clone)]
pub struct AnnualPopulationTable {
    regions: HashMap<String, SexMatrices>,
}

impl AnnualPopulationTable {
    /// Build the table from source cells, validating that every region is
    /// a dense ages x years rectangle of non-negative counts.
    pub fn from_rows(rows: Vec<AnnualRow>) -> Result<Self> {
        let mut regions: HashMap<String, SexMatrices> = HashMap::new();

        for row in rows {
            if row.year < MIN_YEAR || row.year > MAX_YEAR {
                return Err(Error::YearOutOfRange {
                    value: row.year,
                    min: MIN_YEAR,
                    max: MAX_YEAR,
                });
            }
            if row.age > MAX_AGE {
                return Err(Error::Internal(format!(
                    "age {} out of range for region \"{}\"",
                    row.age, row.location
                )));
            }
            if row.male < 0 || row.female < 0 || row.total < 0 {
                return Err(Error::Internal(format!(
                    "negative count for region \"{}\", year {}, age {}",
                    row.location, row.year, row.age
                )));
            }

            let idx = cell_index(row.age, row.year);
            let matrices = regions.entry(row.location).or_insert_with(SexMatrices::empty);
            matrices.male[idx] = row.male;
            matrices.female[idx] = row.female;
            matrices.all[idx] = row.total;
        }

        if regions.is_empty() {
            return Err(Error::Internal("annual population table is empty".to_string()));
        }
        for (region, matrices) in &regions {
            for (name, cells) in [
                ("male", &matrices.male),
                ("female", &matrices.female),
                ("all", &matrices.all),
            ] {
                if let Some(missing) = cells.iter().position(|&v| v < 0) {
                    return Err(Error::Internal(format!(
                        "region \"{}\" is missing the {} cell for age {}, year {}",
                        region,
                        name,
                        missing / N_YEARS,
                        MIN_YEAR + (missing % N_YEARS) as i32
                    )));
                }
            }
        }

        Ok(Self { regions })
    }

    /// All region keys, sorted for stable listings
    pub fn regions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.regions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn contains_region(&self, region: &str) -> bool {
        self.regions.contains_key(region)
    }

    /// Inclusive age range in whole years
    pub fn age_range(&self) -> (u32, u32) {
        (MIN_AGE, MAX_AGE)
    }

    /// Inclusive year range
    pub fn date_range(&self) -> (i32, i32) {
        (MIN_YEAR, MAX_YEAR)
    }

    /// Population for one (year, region, sex, age) cell.
    ///
    /// Ages outside 0..=100 return 0 (nobody is tracked there); years
    /// outside the table and unknown regions are errors.
    pub fn pop_age(&self, year: i32, region: &str, sex: Sex, age_years: i64) -> Result<i64> {
        if year < MIN_YEAR || year > MAX_YEAR {
            return Err(Error::YearOutOfRange { value: year, min: MIN_YEAR, max: MAX_YEAR });
        }
        let matrices = self
            .regions
            .get(region)
            .ok_or_else(|| Error::UnknownRegion(region.to_string()))?;
        if age_years < MIN_AGE as i64 || age_years > MAX_AGE as i64 {
            return Ok(0);
        }
        Ok(matrices.of(sex)[cell_index(age_years as u32, year)])
    }

    /// Sum over every age for one (year, region, sex)
    pub fn pop_sum_age(&self, year: i32, region: &str, sex: Sex) -> Result<i64> {
        let mut sum = 0;
        for age in MIN_AGE..=MAX_AGE {
            sum += self.pop_age(year, region, sex, age as i64)?;
        }
        Ok(sum)
    }

    /// Full age-major count matrix for one (region, sex), laid out
    /// `[age][year]` with `year_count()` columns. Used by the surface
    /// factory to build interpolators without copying per cell.
    pub fn counts(&self, region: &str, sex: Sex) -> Result<&[i64]> {
        self.regions
            .get(region)
            .map(|m| m.of(sex))
            .ok_or_else(|| Error::UnknownRegion(region.to_string()))
    }

    /// Number of year columns in [`Self::counts`]
    pub fn year_count(&self) -> usize {
        N_YEARS
    }

    /// Number of age rows in [`Self::counts`]
    pub fn age_count(&self) -> usize {
        N_AGES
    }
}

fn cell_index(age: u32, year: i32) -> usize {
    age as usize * N_YEARS + (year - MIN_YEAR) as usize
}
