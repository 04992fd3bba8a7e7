//! Immutable demographic source tables
//!
//! Three tables are loaded once at startup and never mutated afterwards:
//! the annual population table (per region, sex, age and year), the
//! life-expectancy table and the survival-ratio table (both per region,
//! sex and 5-year period). Concurrent unsynchronized reads are safe.

pub mod annual;
pub mod continents;
pub mod life;
pub mod loader;
pub mod survival;

pub use annual::{AnnualPopulationTable, AnnualRow};
pub use continents::ContinentTable;
pub use life::{LifeExpectancyRow, LifeExpectancyTable, LIFE_AGE_COLUMNS};
pub use survival::{SurvivalRatioRow, SurvivalRatioTable, SURVIVAL_AGE_GROUPS};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Sex scope of a population query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    /// Both sexes combined (the source's PopTotal column)
    All,
}

impl Sex {
    pub const ALL: [Sex; 3] = [Sex::Male, Sex::Female, Sex::All];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::All => "all",
        }
    }

    /// Narrow to the life-expectancy / mortality domain, which has no
    /// combined-sex rows
    pub fn mortality(&self) -> Option<MortalitySex> {
        match self {
            Sex::Male => Some(MortalitySex::Male),
            Sex::Female => Some(MortalitySex::Female),
            Sex::All => None,
        }
    }
}

impl FromStr for Sex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "male" => Ok(Sex::Male),
            "female" => Ok(Sex::Female),
            "all" | "unisex" => Ok(Sex::All),
            other => Err(Error::InvalidSex(other.to_string())),
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sex in the life-expectancy / survival-ratio tables (no combined rows;
/// encoded 1 = male, 2 = female in the source files)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MortalitySex {
    Male,
    Female,
}

impl MortalitySex {
    /// Numeric code used by the source tables
    pub fn code(&self) -> u8 {
        match self {
            MortalitySex::Male => 1,
            MortalitySex::Female => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(MortalitySex::Male),
            2 => Some(MortalitySex::Female),
            _ => None,
        }
    }
}

impl FromStr for MortalitySex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.parse::<Sex>()? {
            Sex::Male => Ok(MortalitySex::Male),
            Sex::Female => Ok(MortalitySex::Female),
            Sex::All => Err(Error::InvalidSex(s.to_string())),
        }
    }
}
