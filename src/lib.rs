//! Population Engine - daily-resolution demographic queries over the UN
//! World Population Prospects dataset
//!
//! This library provides:
//! - An annual population table interpolated to daily resolution per
//!   (region, sex), with lazily built bicubic spline surfaces
//! - World population rank by date and its inverse (date by rank)
//! - Remaining and total life expectancy
//! - Total population and tabular population counts
//! - Mortality distribution over future age buckets

pub mod daily;
pub mod dates;
pub mod engine;
pub mod error;
pub mod interp;
pub mod life_expectancy;
pub mod linear;
pub mod mortality;
pub mod tables;

// Re-export commonly used types
pub use daily::{AnnualSurfaceFactory, DailyPopulationModel, SurfaceCache, SurfaceFactory};
pub use dates::{from_epoch_days, to_epoch_days, Offset, DAYS_PER_YEAR};
pub use engine::{Engine, PopulationCountRow};
pub use error::{Error, Result};
pub use life_expectancy::LifeExpectancyBounds;
pub use linear::LinearDailyPopulationModel;
pub use mortality::MortalityBucket;
pub use tables::{
    AnnualPopulationTable, ContinentTable, LifeExpectancyTable, MortalitySex, Sex,
    SurvivalRatioTable,
};
