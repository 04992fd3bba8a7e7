//! Error taxonomy for the query engine
//!
//! Every validation failure carries the offending value and the accepted
//! range, so calling layers can surface the message verbatim. Validation
//! errors are raised at the first point where the bad value is observable
//! and are never downgraded to defaults.

use chrono::NaiveDate;

use crate::tables::MortalitySex;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes of the engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Unrecognized sex value
    #[error("\"{0}\" is an invalid value for the parameter \"sex\", valid values are: male, female, all")]
    InvalidSex(String),

    /// Region not present in the annual population table
    #[error("\"{0}\" is an invalid value for the parameter \"country\", the list of valid values can be retrieved from the regions listing")]
    UnknownRegion(String),

    /// Continent not present in the continent-countries mapping
    #[error("\"{0}\" is an invalid value for the parameter \"continent\", the list of valid values can be retrieved from the continents listing")]
    UnknownContinent(String),

    /// Date string did not parse
    #[error("the date \"{value}\" in parameter \"{param}\" could not be parsed, please provide dates in the format YYYY-MM-DD")]
    ParseDate { param: &'static str, value: String },

    /// Offset string did not parse
    #[error("the offset \"{0}\" could not be parsed, valid values are a number of days or a combination of years, months and days in the format ##y##m##d")]
    ParseOffset(String),

    /// Numeric string did not parse
    #[error("the number \"{value}\" in parameter \"{param}\" could not be parsed")]
    ParseNumber { param: &'static str, value: String },

    /// A query that needs at least one of several optional parameters got
    /// none of them
    #[error("at least one of the parameters {0} must be given")]
    MissingParameter(&'static str),

    /// Birthdate outside the supported interval
    #[error("the birthdate {value} can not be processed, only dates between {min} and {max} are supported")]
    BirthdateOutOfRange {
        value: NaiveDate,
        min: NaiveDate,
        max: NaiveDate,
    },

    /// Calculation date outside the supported interval
    #[error("the calculation date {value} can not be processed, only dates between {min} and {max} are supported")]
    CalculationDateOutOfRange {
        value: NaiveDate,
        min: NaiveDate,
        max: NaiveDate,
    },

    /// Effective birthdate (refdate minus age) outside the supported interval
    #[error("the effective birthdate {value} can not be processed, only dates up to {max} are supported")]
    EffectiveBirthdateOutOfRange { value: NaiveDate, max: NaiveDate },

    /// Age beyond the supported maximum
    #[error("the age {value:.2} can not be processed, only ages up to {max:.0} years are supported")]
    AgeOutOfRange { value: f64, max: f64 },

    /// Year outside the table's year range
    #[error("the year {value} can not be processed, only years between {min} and {max} are supported")]
    YearOutOfRange { value: i32, min: i32, max: i32 },

    /// Epoch-day date outside the daily model's range
    #[error("the date {value} (epoch days) is outside the supported range [{min}, {max}]")]
    DateOutOfRange { value: i64, min: i64, max: i64 },

    /// Requested rank not reachable within the date bracket
    #[error("the rank {rank} can not be reached between epoch days {lower} and {upper}")]
    RankOutOfRange { rank: i64, lower: i64, upper: i64 },

    /// Calculation span wider than the supported maximum
    #[error("the calculation spans {days} days, only spans up to {max_days} days are supported")]
    CalculationTooWide { days: i64, max_days: i64 },

    /// No row in the life-expectancy or survival-ratio table
    #[error("no {table} data for region \"{region}\", sex {sex:?}, period {period}")]
    DataMissing {
        table: &'static str,
        region: String,
        sex: MortalitySex,
        period: i32,
    },

    /// Invariant breach; indicates a bug, not bad input
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for the out-of-range family: validation failures on
    /// otherwise well-formed input
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            Error::BirthdateOutOfRange { .. }
                | Error::CalculationDateOutOfRange { .. }
                | Error::EffectiveBirthdateOutOfRange { .. }
                | Error::AgeOutOfRange { .. }
                | Error::YearOutOfRange { .. }
                | Error::DateOutOfRange { .. }
                | Error::RankOutOfRange { .. }
                | Error::CalculationTooWide { .. }
        )
    }
}
