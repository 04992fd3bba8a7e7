//! The demographic query engine
//!
//! One `Engine` value owns the three immutable source tables and the
//! lazily filled interpolation cache; every query is a method on it.
//! Queries are pure functions of their arguments plus the loaded data,
//! safe to call from any thread.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use crate::daily::DailyPopulationModel;
use crate::dates::{from_epoch_days, to_epoch_days, Offset};
use crate::error::{Error, Result};
use crate::life_expectancy::{self, LifeExpectancyBounds};
use crate::mortality::{self, MortalityBucket};
use crate::tables::{
    loader, AnnualPopulationTable, ContinentTable, LifeExpectancyTable, MortalitySex, Sex,
    SurvivalRatioTable,
};

/// Earliest birthdate any rank query accepts
const RANK_DOB_MIN: (i32, u32, u32) = (1920, 1, 1);
/// Latest birthdate for date-by-rank queries
const RANK_DOB_MAX: (i32, u32, u32) = (2079, 12, 31);
/// Earliest reference date for rank queries
const RANK_DATE_MIN: (i32, u32, u32) = (1950, 1, 1);
/// Widest supported span between birthdate and reference date (100 years
/// of days)
const RANK_SPAN_MAX_DAYS: i64 = 36_500;
/// Reference-date window of the total-population query
const TOTAL_POP_MIN: (i32, u32, u32) = (2013, 1, 1);
const TOTAL_POP_MAX: (i32, u32, u32) = (2022, 12, 31);

/// One row of the tabular population-count query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationCountRow {
    pub year: i32,
    pub age: u32,
    pub males: i64,
    pub females: i64,
    pub total: i64,
}

/// The engine value: immutable tables plus the surface cache
pub struct Engine {
    annual: Arc<AnnualPopulationTable>,
    life: LifeExpectancyTable,
    survival: SurvivalRatioTable,
    continents: Option<ContinentTable>,
    daily: DailyPopulationModel,
    le_bounds: LifeExpectancyBounds,
}

impl Engine {
    pub fn new(
        annual: AnnualPopulationTable,
        life: LifeExpectancyTable,
        survival: SurvivalRatioTable,
    ) -> Self {
        let annual = Arc::new(annual);
        let daily = DailyPopulationModel::new(Arc::clone(&annual));
        Self {
            annual,
            life,
            survival,
            continents: None,
            daily,
            le_bounds: LifeExpectancyBounds::default(),
        }
    }

    /// Override the life-expectancy validation bounds (see
    /// [`LifeExpectancyBounds`] for the historic variants)
    pub fn with_life_expectancy_bounds(mut self, bounds: LifeExpectancyBounds) -> Self {
        self.le_bounds = bounds;
        self
    }

    /// Attach the optional continent-countries mapping
    pub fn with_continents(mut self, continents: ContinentTable) -> Self {
        self.continents = Some(continents);
        self
    }

    /// Load all three tables from their CSV files
    pub fn from_csv_paths<P: AsRef<Path>>(
        population: P,
        life_expectancy: P,
        survival_ratio: P,
    ) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let start = Instant::now();
        let annual = loader::load_annual_population(population)?;
        let life = loader::load_life_expectancy(life_expectancy)?;
        let survival = loader::load_survival_ratios(survival_ratio)?;
        info!("engine data loaded in {:.2?}", start.elapsed());
        Ok(Self::new(annual, life, survival))
    }

    /// All known region names, sorted
    pub fn regions(&self) -> Vec<&str> {
        self.annual.regions()
    }

    /// All continents of the attached mapping (empty without one)
    pub fn continents(&self) -> Vec<&str> {
        self.continents.as_ref().map(|t| t.continents()).unwrap_or_default()
    }

    /// Countries belonging to one continent. Without an attached mapping
    /// every continent is unknown.
    pub fn countries_in_continent(&self, continent: &str) -> Result<&[String]> {
        match &self.continents {
            Some(table) => table.countries(continent),
            None => Err(Error::UnknownContinent(continent.to_string())),
        }
    }

    pub fn annual(&self) -> &AnnualPopulationTable {
        &self.annual
    }

    pub fn daily(&self) -> &DailyPopulationModel {
        &self.daily
    }

    fn check_region(&self, region: &str) -> Result<()> {
        if !self.annual.contains_region(region) {
            return Err(Error::UnknownRegion(region.to_string()));
        }
        Ok(())
    }

    /// World population rank of a person on `refdate`: the number of
    /// people born in `[dob, refdate]` still alive on `refdate`, within
    /// the region and sex scope. `today` caps the accepted birthdates.
    pub fn rank(
        &self,
        sex: Sex,
        region: &str,
        dob: NaiveDate,
        refdate: NaiveDate,
        today: NaiveDate,
    ) -> Result<i64> {
        self.check_region(region)?;

        let dob_min = ymd(RANK_DOB_MIN);
        if dob < dob_min || dob > today {
            return Err(Error::BirthdateOutOfRange { value: dob, min: dob_min, max: today });
        }
        let date_min = ymd(RANK_DATE_MIN).max(dob);
        let date_max = from_epoch_days(self.daily.date_range().1);
        if refdate < date_min || refdate > date_max {
            return Err(Error::CalculationDateOutOfRange {
                value: refdate,
                min: date_min,
                max: date_max,
            });
        }
        let span = (refdate - dob).num_days();
        if span > RANK_SPAN_MAX_DAYS {
            return Err(Error::CalculationTooWide { days: span, max_days: RANK_SPAN_MAX_DAYS });
        }

        let rank = self.daily.pop_sum_dob(
            to_epoch_days(refdate),
            region,
            sex,
            Some(to_epoch_days(dob)),
            Some(to_epoch_days(refdate)),
        )?;
        if rank <= 0 {
            // the validations above guarantee a populated bracket
            return Err(Error::Internal(format!(
                "rank for ({}, {}, {}, {}) came out non-positive: {}",
                sex, region, dob, refdate, rank
            )));
        }
        Ok(rank)
    }

    /// Rank as of `today`
    pub fn rank_today(
        &self,
        sex: Sex,
        region: &str,
        dob: NaiveDate,
        today: NaiveDate,
    ) -> Result<i64> {
        self.rank(sex, region, dob, today, today)
    }

    /// Rank on the day the person reaches `age`
    pub fn rank_by_age(
        &self,
        sex: Sex,
        region: &str,
        dob: NaiveDate,
        age: Offset,
        today: NaiveDate,
    ) -> Result<i64> {
        let refdate = age
            .add_to(dob)
            .ok_or_else(|| Error::Internal(format!("cannot add {} to {}", age, dob)))?;
        self.rank(sex, region, dob, refdate, today)
    }

    /// Rank `offset` before today
    pub fn rank_in_past(
        &self,
        sex: Sex,
        region: &str,
        dob: NaiveDate,
        offset: Offset,
        today: NaiveDate,
    ) -> Result<i64> {
        let refdate = offset
            .sub_from(today)
            .ok_or_else(|| Error::Internal(format!("cannot subtract {} from {}", offset, today)))?;
        self.rank(sex, region, dob, refdate, today)
    }

    /// Rank `offset` after today
    pub fn rank_in_future(
        &self,
        sex: Sex,
        region: &str,
        dob: NaiveDate,
        offset: Offset,
        today: NaiveDate,
    ) -> Result<i64> {
        let refdate = offset
            .add_to(today)
            .ok_or_else(|| Error::Internal(format!("cannot add {} to {}", offset, today)))?;
        self.rank(sex, region, dob, refdate, today)
    }

    /// The day a person born on `dob` reaches the given rank
    pub fn date_for_rank(
        &self,
        sex: Sex,
        region: &str,
        dob: NaiveDate,
        rank: i64,
    ) -> Result<NaiveDate> {
        self.check_region(region)?;

        let (dob_min, dob_max) = (ymd(RANK_DOB_MIN), ymd(RANK_DOB_MAX));
        if dob < dob_min || dob > dob_max {
            return Err(Error::BirthdateOutOfRange { value: dob, min: dob_min, max: dob_max });
        }
        let (date_min, date_max) = self.daily.date_range();
        if rank < 1 {
            return Err(Error::RankOutOfRange { rank, lower: date_min, upper: date_max });
        }

        let day = self.daily.pop_sum_dob_inverse_date(
            rank,
            region,
            sex,
            to_epoch_days(dob),
            None,
            None,
        )?;
        Ok(from_epoch_days(day))
    }

    /// Remaining life expectancy in years on `refdate` at the given age
    pub fn remaining_life_expectancy(
        &self,
        sex: MortalitySex,
        region: &str,
        refdate: NaiveDate,
        age: Offset,
    ) -> Result<f64> {
        self.check_region(region)?;
        life_expectancy::remaining(&self.life, sex, region, refdate, age, &self.le_bounds)
    }

    /// Total life expectancy at birth (35-year anchor, kept for
    /// compatibility with the original service)
    pub fn total_life_expectancy(
        &self,
        sex: MortalitySex,
        region: &str,
        dob: NaiveDate,
    ) -> Result<f64> {
        self.check_region(region)?;
        life_expectancy::total(&self.life, sex, region, dob, &self.le_bounds)
    }

    /// Total population of a country on `refdate`
    pub fn total_population(&self, country: &str, refdate: NaiveDate) -> Result<i64> {
        self.check_region(country)?;
        let (min, max) = (ymd(TOTAL_POP_MIN), ymd(TOTAL_POP_MAX));
        if refdate < min || refdate > max {
            return Err(Error::CalculationDateOutOfRange { value: refdate, min, max });
        }
        self.daily
            .pop_sum_age(to_epoch_days(refdate), country, Sex::All, None, None)
    }

    /// Tabular population counts straight from the annual table: the
    /// Cartesian product of the given (or all) ages and years
    pub fn population_count(
        &self,
        country: &str,
        age: Option<u32>,
        year: Option<i32>,
    ) -> Result<Vec<PopulationCountRow>> {
        self.check_region(country)?;
        if age.is_none() && year.is_none() {
            return Err(Error::MissingParameter("\"age\" and \"year\""));
        }

        let (age_min, age_max) = self.annual.age_range();
        if let Some(a) = age {
            if a > age_max {
                return Err(Error::AgeOutOfRange { value: a as f64, max: age_max as f64 });
            }
        }
        let (year_min, year_max) = self.annual.date_range();
        if let Some(y) = year {
            if y < year_min || y > year_max {
                return Err(Error::YearOutOfRange { value: y, min: year_min, max: year_max });
            }
        }

        let years: Vec<i32> = match year {
            Some(y) => vec![y],
            None => (year_min..=year_max).collect(),
        };
        let ages: Vec<u32> = match age {
            Some(a) => vec![a],
            None => (age_min..=age_max).collect(),
        };

        let mut rows = Vec::with_capacity(years.len() * ages.len());
        for &y in &years {
            for &a in &ages {
                rows.push(PopulationCountRow {
                    year: y,
                    age: a,
                    males: self.annual.pop_age(y, country, Sex::Male, a as i64)?,
                    females: self.annual.pop_age(y, country, Sex::Female, a as i64)?,
                    total: self.annual.pop_age(y, country, Sex::All, a as i64)?,
                });
            }
        }
        Ok(rows)
    }

    /// Distribution of remaining deaths over future 5-year age buckets
    pub fn mortality_distribution(
        &self,
        sex: MortalitySex,
        country: &str,
        age: Offset,
        today: NaiveDate,
    ) -> Result<Vec<MortalityBucket>> {
        self.check_region(country)?;
        mortality::distribution(&self.survival, sex, country, age, today)
    }

    /// Build (or fetch) the interpolation surface for one (region, sex)
    pub fn warm(&self, region: &str, sex: Sex) -> Result<()> {
        self.daily.preload(region, sex)
    }
}

fn ymd((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("static date")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::annual::testutil as annual_testutil;
    use crate::tables::life::testutil as life_testutil;
    use crate::tables::survival::testutil as survival_testutil;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Constant-population region: 365,250 people per year of age for
    /// each sex (a density of exactly 1000/day), life expectancy 70
    /// everywhere, flat survival ratios
    fn engine() -> Engine {
        Engine::new(
            annual_testutil::linear_table("Atlantis", 365_250, 0, 0),
            life_testutil::linear_table("Atlantis", 70.0, 0.0, 0.0),
            survival_testutil::flat_table("Atlantis", 0.9),
        )
    }

    const TODAY: (i32, u32, u32) = (2020, 6, 1);

    #[test]
    fn test_rank_counts_birth_cohort() {
        let engine = engine();
        let dob = date(1993, 12, 6);
        let refdate = date(2014, 6, 1);
        let got = engine.rank(Sex::All, "Atlantis", dob, refdate, ymd(TODAY)).unwrap();
        // 2000 people/day over the inclusive day span dob..refdate
        let span = (refdate - dob).num_days() + 1;
        assert_eq!(got, 2000 * span);
    }

    #[test]
    fn test_rank_validations() {
        let engine = engine();
        let today = ymd(TODAY);

        assert!(matches!(
            engine.rank(Sex::All, "Nowhere", date(1990, 1, 1), date(2000, 1, 1), today),
            Err(Error::UnknownRegion(_))
        ));
        assert!(matches!(
            engine.rank(Sex::All, "Atlantis", date(1919, 12, 31), date(2000, 1, 1), today),
            Err(Error::BirthdateOutOfRange { .. })
        ));
        // birthdates after today are rejected
        assert!(matches!(
            engine.rank(Sex::All, "Atlantis", date(2020, 6, 2), date(2021, 1, 1), today),
            Err(Error::BirthdateOutOfRange { .. })
        ));
        assert!(matches!(
            engine.rank(Sex::All, "Atlantis", date(1945, 1, 1), date(1949, 12, 31), today),
            Err(Error::CalculationDateOutOfRange { .. })
        ));
        // refdate before dob
        assert!(matches!(
            engine.rank(Sex::All, "Atlantis", date(1970, 1, 1), date(1960, 1, 1), today),
            Err(Error::CalculationDateOutOfRange { .. })
        ));
    }

    #[test]
    fn test_rank_span_boundary() {
        let engine = engine();
        let today = ymd(TODAY);
        let dob = date(1920, 1, 1);

        let at_limit = dob + chrono::Duration::days(RANK_SPAN_MAX_DAYS);
        assert!(engine.rank(Sex::All, "Atlantis", dob, at_limit, today).is_ok());

        let beyond = dob + chrono::Duration::days(RANK_SPAN_MAX_DAYS + 1);
        assert!(matches!(
            engine.rank(Sex::All, "Atlantis", dob, beyond, today),
            Err(Error::CalculationTooWide { days, .. }) if days == RANK_SPAN_MAX_DAYS + 1
        ));
    }

    #[test]
    fn test_rank_conveniences_agree() {
        let engine = engine();
        let today = ymd(TODAY);
        let dob = date(1993, 12, 6);

        let by_date = engine.rank(Sex::All, "Atlantis", dob, today, today).unwrap();
        assert_eq!(engine.rank_today(Sex::All, "Atlantis", dob, today).unwrap(), by_date);

        let age = Offset::from_days(3650);
        let by_age = engine.rank_by_age(Sex::All, "Atlantis", dob, age, today).unwrap();
        let direct = engine
            .rank(Sex::All, "Atlantis", dob, dob + chrono::Duration::days(3650), today)
            .unwrap();
        assert_eq!(by_age, direct);

        let offset = Offset::new(0, 6, 0);
        let past = engine.rank_in_past(Sex::All, "Atlantis", dob, offset, today).unwrap();
        assert_eq!(
            past,
            engine.rank(Sex::All, "Atlantis", dob, date(2019, 12, 1), today).unwrap()
        );
        let future = engine.rank_in_future(Sex::All, "Atlantis", dob, offset, today).unwrap();
        assert_eq!(
            future,
            engine.rank(Sex::All, "Atlantis", dob, date(2020, 12, 1), today).unwrap()
        );
    }

    #[test]
    fn test_date_for_rank_round_trip() {
        let engine = engine();
        let dob = date(1993, 12, 6);
        // cumulative count grows by exactly 2000/day for Sex::All
        let target = 2000 * 5000;
        let day = engine.date_for_rank(Sex::All, "Atlantis", dob, target).unwrap();
        assert_eq!(day, dob + chrono::Duration::days(4999));

        let back = engine.rank(Sex::All, "Atlantis", dob, day, ymd(TODAY)).unwrap();
        assert_eq!(back, target);
    }

    #[test]
    fn test_date_for_rank_validations() {
        let engine = engine();
        assert!(matches!(
            engine.date_for_rank(Sex::All, "Atlantis", date(2080, 1, 1), 1000),
            Err(Error::BirthdateOutOfRange { .. })
        ));
        assert!(engine.date_for_rank(Sex::All, "Atlantis", date(2079, 12, 31), 1000).is_ok());
        assert!(matches!(
            engine.date_for_rank(Sex::All, "Atlantis", date(1990, 1, 1), 0),
            Err(Error::RankOutOfRange { .. })
        ));
        // far beyond anything the bracket can reach
        assert!(matches!(
            engine.date_for_rank(Sex::All, "Atlantis", date(2079, 1, 1), i64::MAX / 2),
            Err(Error::RankOutOfRange { .. })
        ));
    }

    #[test]
    fn test_rank_round_trip_on_growing_population() {
        // ~1% of the base added every year, so the cumulative count has
        // real interpolation structure instead of a flat density
        let engine = Engine::new(
            annual_testutil::linear_table("Atlantis", 365_250, 0, 3_653),
            life_testutil::linear_table("Atlantis", 70.0, 0.0, 0.0),
            survival_testutil::flat_table("Atlantis", 0.9),
        );
        let dob = date(1980, 5, 3);
        let refdate = date(2014, 6, 1);
        let today = ymd(TODAY);

        // the cumulative count must be non-decreasing day over day
        let mut previous = 0;
        for step in 0..5 {
            let d = date(2000, 1, 1) + chrono::Duration::days(step * 997);
            let cum = engine.rank(Sex::All, "Atlantis", dob, d, today).unwrap();
            assert!(cum >= previous, "cumulative count decreased at {}", d);
            previous = cum;
        }

        let rank = engine.rank(Sex::All, "Atlantis", dob, refdate, today).unwrap();
        let day = engine.date_for_rank(Sex::All, "Atlantis", dob, rank).unwrap();
        assert!(
            (day - refdate).num_days().abs() <= 1,
            "rank {} mapped back to {}",
            rank,
            day
        );

        let back = engine.rank(Sex::All, "Atlantis", dob, day, today).unwrap();
        assert!(
            (back - rank).abs() as f64 <= rank as f64 * 0.001,
            "round trip drifted: {} vs {}",
            back,
            rank
        );
    }

    #[test]
    fn test_continent_queries() {
        use crate::tables::ContinentTable;

        let engine0 = engine();
        assert!(engine0.continents().is_empty());
        assert!(matches!(
            engine0.countries_in_continent("Europe"),
            Err(Error::UnknownContinent(_))
        ));

        let engine = engine().with_continents(ContinentTable::from_pairs(vec![
            ("Oceania".to_string(), "Fiji".to_string()),
            ("Oceania".to_string(), "Samoa".to_string()),
        ]));
        assert_eq!(engine.continents(), vec!["Oceania"]);
        assert_eq!(engine.countries_in_continent("Oceania").unwrap(), ["Fiji", "Samoa"]);
        assert!(matches!(
            engine.countries_in_continent("Europe"),
            Err(Error::UnknownContinent(_))
        ));
    }

    #[test]
    fn test_total_population_window() {
        let engine = engine();
        let got = engine.total_population("Atlantis", date(2013, 1, 1)).unwrap();
        // 2000/day over the full (age_max + 1)-day age axis
        assert_eq!(got, 2 * 36_890_000);

        assert!(matches!(
            engine.total_population("Atlantis", date(2012, 12, 31)),
            Err(Error::CalculationDateOutOfRange { .. })
        ));
        assert!(engine.total_population("Atlantis", date(2022, 12, 31)).is_ok());
        assert!(matches!(
            engine.total_population("Atlantis", date(2023, 1, 1)),
            Err(Error::CalculationDateOutOfRange { .. })
        ));
    }

    #[test]
    fn test_population_count_shapes() {
        let engine = engine();

        let by_both = engine.population_count("Atlantis", Some(18), Some(1980)).unwrap();
        assert_eq!(by_both.len(), 1);
        assert_eq!(
            by_both[0],
            PopulationCountRow {
                year: 1980,
                age: 18,
                males: 365_250,
                females: 365_250,
                total: 730_500,
            }
        );

        let by_age = engine.population_count("Atlantis", Some(0), None).unwrap();
        assert_eq!(by_age.len(), 151);
        assert!(by_age.iter().all(|row| row.age == 0));

        let by_year = engine.population_count("Atlantis", None, Some(2000)).unwrap();
        assert_eq!(by_year.len(), 101);
        assert!(by_year.iter().all(|row| row.year == 2000));
    }

    #[test]
    fn test_population_count_validations() {
        let engine = engine();
        assert!(matches!(
            engine.population_count("Atlantis", None, None),
            Err(Error::MissingParameter(_))
        ));
        assert!(matches!(
            engine.population_count("Atlantis", Some(101), None),
            Err(Error::AgeOutOfRange { .. })
        ));
        assert!(matches!(
            engine.population_count("Atlantis", None, Some(1949)),
            Err(Error::YearOutOfRange { .. })
        ));
        assert!(matches!(
            engine.population_count("Atlantis", None, Some(2101)),
            Err(Error::YearOutOfRange { .. })
        ));
    }

    #[test]
    fn test_life_expectancy_queries() {
        let engine = engine();
        let remaining = engine
            .remaining_life_expectancy(
                MortalitySex::Female,
                "Atlantis",
                date(2014, 6, 1),
                Offset::new(20, 6, 0),
            )
            .unwrap();
        assert!((remaining - 70.0).abs() < 1e-9);

        let total = engine
            .total_life_expectancy(MortalitySex::Female, "Atlantis", date(1993, 12, 6))
            .unwrap();
        assert!((total - 105.0).abs() < 1e-9);

        assert!(matches!(
            engine.remaining_life_expectancy(
                MortalitySex::Male,
                "Nowhere",
                date(2014, 6, 1),
                Offset::new(20, 0, 0)
            ),
            Err(Error::UnknownRegion(_))
        ));
    }

    #[test]
    fn test_mortality_distribution_query() {
        let engine = engine();
        let buckets = engine
            .mortality_distribution(
                MortalitySex::Male,
                "Atlantis",
                Offset::new(42, 0, 0),
                ymd(TODAY),
            )
            .unwrap();
        let total: f64 = buckets.iter().map(|b| b.percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert_eq!(buckets[0].lower_age, 40);
    }

    #[test]
    fn test_warm_fills_cache() {
        let engine = engine();
        assert_eq!(engine.daily().cached_surfaces(), 0);
        engine.warm("Atlantis", Sex::Male).unwrap();
        engine.warm("Atlantis", Sex::Male).unwrap();
        assert_eq!(engine.daily().cached_surfaces(), 1);
        assert!(engine.warm("Nowhere", Sex::Male).is_err());
    }
}
