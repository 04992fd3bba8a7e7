//! Population Engine CLI
//!
//! Command-line interface for one-off demographic queries against the
//! WPP CSV tables

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use population_engine::{Engine, MortalitySex, Offset, Sex};

#[derive(Parser)]
#[command(name = "population_engine", about = "Demographic queries over the WPP dataset")]
struct Cli {
    /// Annual population CSV (Location, Time, Age, PopMale, PopFemale, PopTotal)
    #[arg(long, default_value = "data/WPP2012_INT_F3_Population_By_Sex_Annual_Single_100_Medium.csv")]
    population_csv: String,

    /// Life-expectancy CSV (region, sex, Begin_prd, age columns)
    #[arg(long, default_value = "data/life_expectancy_ages.csv")]
    life_expectancy_csv: String,

    /// Survival-ratio CSV (region, sex, Begin_prd, X0..X125)
    #[arg(long, default_value = "data/survival_ratio.csv")]
    survival_csv: String,

    /// Optional continent-countries CSV (continent, country)
    #[arg(long)]
    continents_csv: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every region in the dataset
    Countries,

    /// List continents, or the countries of one continent
    Continents { continent: Option<String> },

    /// World population rank on a given date (defaults to today)
    Rank {
        sex: String,
        country: String,
        dob: NaiveDate,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Rank at this age instead of on a date (days or ##y##m##d)
        #[arg(long, conflicts_with = "date")]
        age: Option<String>,
    },

    /// The date on which a person reaches a given rank
    DateForRank {
        sex: String,
        country: String,
        dob: NaiveDate,
        rank: i64,
    },

    /// Remaining life expectancy at an age on a reference date
    RemainingLife {
        sex: String,
        country: String,
        refdate: NaiveDate,
        /// Age as days or ##y##m##d
        age: String,
    },

    /// Total life expectancy for a date of birth
    TotalLife {
        sex: String,
        country: String,
        dob: NaiveDate,
    },

    /// Total population of a country on a date
    TotalPopulation { country: String, refdate: NaiveDate },

    /// Tabular population counts by age and/or year
    PopulationCount {
        country: String,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long)]
        year: Option<i32>,
    },

    /// Mortality distribution over future age buckets
    Mortality {
        sex: String,
        country: String,
        /// Age as days or ##y##m##d
        age: String,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut engine = Engine::from_csv_paths(
        &cli.population_csv,
        &cli.life_expectancy_csv,
        &cli.survival_csv,
    )
    .map_err(|e| anyhow::anyhow!(e.to_string()))
    .context("failed to load the source tables")?;

    if let Some(path) = &cli.continents_csv {
        let continents = population_engine::tables::loader::load_continent_countries(path)
            .map_err(|e| anyhow::anyhow!(e.to_string()))
            .context("failed to load the continent mapping")?;
        engine = engine.with_continents(continents);
    }

    let today = Utc::now().date_naive();

    match cli.command {
        Command::Countries => {
            for region in engine.regions() {
                println!("{}", region);
            }
        }

        Command::Continents { continent } => match continent {
            Some(continent) => {
                for country in engine.countries_in_continent(&continent)? {
                    println!("{}", country);
                }
            }
            None => {
                for continent in engine.continents() {
                    println!("{}", continent);
                }
            }
        },

        Command::Rank { sex, country, dob, date, age } => {
            let sex: Sex = sex.parse()?;
            let rank = match (date, age) {
                (Some(date), None) => engine.rank(sex, &country, dob, date, today)?,
                (None, Some(age)) => {
                    let age: Offset = age.parse()?;
                    engine.rank_by_age(sex, &country, dob, age, today)?
                }
                _ => engine.rank_today(sex, &country, dob, today)?,
            };
            println!("{}", rank);
        }

        Command::DateForRank { sex, country, dob, rank } => {
            let sex: Sex = sex.parse()?;
            println!("{}", engine.date_for_rank(sex, &country, dob, rank)?);
        }

        Command::RemainingLife { sex, country, refdate, age } => {
            let sex: MortalitySex = sex.parse()?;
            let age: Offset = age.parse()?;
            let years = engine.remaining_life_expectancy(sex, &country, refdate, age)?;
            println!("{:.2}", years);
        }

        Command::TotalLife { sex, country, dob } => {
            let sex: MortalitySex = sex.parse()?;
            println!("{:.2}", engine.total_life_expectancy(sex, &country, dob)?);
        }

        Command::TotalPopulation { country, refdate } => {
            println!("{}", engine.total_population(&country, refdate)?);
        }

        Command::PopulationCount { country, age, year } => {
            let rows = engine.population_count(&country, age, year)?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }

        Command::Mortality { sex, country, age } => {
            let sex: MortalitySex = sex.parse()?;
            let age: Offset = age.parse()?;
            let buckets = engine.mortality_distribution(sex, &country, age, today)?;
            println!("{}", serde_json::to_string_pretty(&buckets)?);
        }
    }

    Ok(())
}
