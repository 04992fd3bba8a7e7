//! CSV loaders for the three source tables
//!
//! Loads the WPP annual population estimates, the life-expectancy table
//! and the survival-ratio table. Population values are published in
//! thousands and scaled to whole persons here; the single region rename
//! (`Australia/New Zealand` -> `Australia and New Zealand`) is also
//! applied here so the rest of the crate only ever sees the canonical
//! spelling.

use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use csv::StringRecord;
use log::{info, warn};

use super::annual::{AnnualPopulationTable, AnnualRow};
use super::continents::ContinentTable;
use super::life::{LifeExpectancyRow, LifeExpectancyTable, LIFE_AGE_COLUMNS};
use super::survival::{SurvivalRatioRow, SurvivalRatioTable, SURVIVAL_AGE_GROUPS};
use super::MortalitySex;

/// Region spelling fixed up on load
const AUSTRALIA_SOURCE: &str = "Australia/New Zealand";
const AUSTRALIA_CANONICAL: &str = "Australia and New Zealand";

/// Raw CSV row of the annual population file; extra source columns
/// (LocID, Variant, ...) are ignored
#[derive(Debug, serde::Deserialize)]
struct AnnualCsvRow {
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Time")]
    year: i32,
    #[serde(rename = "Age")]
    age: u32,
    #[serde(rename = "PopMale")]
    pop_male: f64,
    #[serde(rename = "PopFemale")]
    pop_female: f64,
    #[serde(rename = "PopTotal")]
    pop_total: f64,
}

fn thousands_to_persons(value: f64) -> i64 {
    (value * 1000.0).round() as i64
}

/// Load the annual population table from a CSV file
pub fn load_annual_population<P: AsRef<Path>>(
    path: P,
) -> Result<AnnualPopulationTable, Box<dyn Error>> {
    load_annual_population_from_reader(File::open(path)?)
}

/// Load the annual population table from any reader (string buffer,
/// network stream)
pub fn load_annual_population_from_reader<R: Read>(
    reader: R,
) -> Result<AnnualPopulationTable, Box<dyn Error>> {
    let start = Instant::now();
    let mut csv_reader = csv::Reader::from_reader(reader);

    let mut rows = Vec::new();
    let mut sex_sum_mismatches = 0usize;
    for result in csv_reader.deserialize() {
        let row: AnnualCsvRow = result?;
        let location = if row.location == AUSTRALIA_SOURCE {
            AUSTRALIA_CANONICAL.to_string()
        } else {
            row.location
        };

        let male = thousands_to_persons(row.pop_male);
        let female = thousands_to_persons(row.pop_female);
        let total = thousands_to_persons(row.pop_total);
        // the published total is rounded independently of the sex columns
        if (male + female - total).abs() > 2 {
            sex_sum_mismatches += 1;
        }

        rows.push(AnnualRow {
            location,
            year: row.year,
            age: row.age,
            male,
            female,
            total,
        });
    }

    if sex_sum_mismatches > 0 {
        warn!(
            "{} annual rows where male + female differs from the total beyond source rounding",
            sex_sum_mismatches
        );
    }

    let table = AnnualPopulationTable::from_rows(rows)?;
    info!(
        "parsed annual population table: {} regions in {:.2?}",
        table.regions().len(),
        start.elapsed()
    );
    Ok(table)
}

/// Load the life-expectancy table from a CSV file
pub fn load_life_expectancy<P: AsRef<Path>>(
    path: P,
) -> Result<LifeExpectancyTable, Box<dyn Error>> {
    load_life_expectancy_from_reader(File::open(path)?)
}

/// Load the life-expectancy table from any reader. Expected columns:
/// `region`, `sex` (1 = male, 2 = female), `Begin_prd`, then one column
/// per exact age `0, 1, 5, ..., 125`.
pub fn load_life_expectancy_from_reader<R: Read>(
    reader: R,
) -> Result<LifeExpectancyTable, Box<dyn Error>> {
    let start = Instant::now();
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let region_idx = find_column(&headers, "region")?;
    let sex_idx = find_column(&headers, "sex")?;
    let period_idx = find_column(&headers, "Begin_prd")?;
    let age_indices: Vec<usize> = LIFE_AGE_COLUMNS
        .iter()
        .map(|age| find_column(&headers, &age.to_string()))
        .collect::<Result<_, _>>()?;

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        rows.push(LifeExpectancyRow {
            region: field(&record, region_idx, "region")?.to_string(),
            sex: parse_sex_code(field(&record, sex_idx, "sex")?)?,
            period: field(&record, period_idx, "Begin_prd")?.parse()?,
            values: parse_value_columns(&record, &age_indices)?,
        });
    }

    let table = LifeExpectancyTable::from_rows(rows)?;
    info!("parsed life-expectancy table in {:.2?}", start.elapsed());
    Ok(table)
}

/// Load the survival-ratio table from a CSV file
pub fn load_survival_ratios<P: AsRef<Path>>(
    path: P,
) -> Result<SurvivalRatioTable, Box<dyn Error>> {
    load_survival_ratios_from_reader(File::open(path)?)
}

/// Load the survival-ratio table from any reader. Expected columns:
/// `region`, `sex` (1 = male, 2 = female), `Begin_prd`, then age-group
/// columns `X0, X5, ..., X125`.
pub fn load_survival_ratios_from_reader<R: Read>(
    reader: R,
) -> Result<SurvivalRatioTable, Box<dyn Error>> {
    let start = Instant::now();
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let region_idx = find_column(&headers, "region")?;
    let sex_idx = find_column(&headers, "sex")?;
    let period_idx = find_column(&headers, "Begin_prd")?;
    let group_indices: Vec<usize> = SURVIVAL_AGE_GROUPS
        .iter()
        .map(|age| find_column(&headers, &format!("X{}", age)))
        .collect::<Result<_, _>>()?;

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        rows.push(SurvivalRatioRow {
            region: field(&record, region_idx, "region")?.to_string(),
            sex: parse_sex_code(field(&record, sex_idx, "sex")?)?,
            period: field(&record, period_idx, "Begin_prd")?.parse()?,
            values: parse_value_columns(&record, &group_indices)?,
        });
    }

    let table = SurvivalRatioTable::from_rows(rows)?;
    info!("parsed survival-ratio table in {:.2?}", start.elapsed());
    Ok(table)
}

/// Load the continent-countries mapping from a CSV file
pub fn load_continent_countries<P: AsRef<Path>>(
    path: P,
) -> Result<ContinentTable, Box<dyn Error>> {
    load_continent_countries_from_reader(File::open(path)?)
}

/// Load the continent-countries mapping from any reader. Expected
/// columns: `continent`, `country`.
pub fn load_continent_countries_from_reader<R: Read>(
    reader: R,
) -> Result<ContinentTable, Box<dyn Error>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let continent_idx = find_column(&headers, "continent")?;
    let country_idx = find_column(&headers, "country")?;

    let mut pairs = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        pairs.push((
            field(&record, continent_idx, "continent")?.to_string(),
            field(&record, country_idx, "country")?.to_string(),
        ));
    }
    Ok(ContinentTable::from_pairs(pairs))
}

fn find_column(headers: &StringRecord, name: &str) -> Result<usize, Box<dyn Error>> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| format!("missing column \"{}\"", name).into())
}

fn field<'r>(
    record: &'r StringRecord,
    idx: usize,
    name: &str,
) -> Result<&'r str, Box<dyn Error>> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| format!("row is missing the \"{}\" field", name).into())
}

fn parse_sex_code(raw: &str) -> Result<MortalitySex, Box<dyn Error>> {
    let code: u8 = raw.parse()?;
    MortalitySex::from_code(code).ok_or_else(|| format!("unknown sex code {}", code).into())
}

fn parse_value_columns(
    record: &StringRecord,
    indices: &[usize],
) -> Result<Vec<f64>, Box<dyn Error>> {
    indices
        .iter()
        .map(|&idx| Ok(field(record, idx, "value")?.parse::<f64>()?))
        .collect()
}
