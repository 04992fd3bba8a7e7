//! Eagerly build every interpolation surface
//!
//! The engine builds surfaces lazily on first query; this binary warms
//! the whole cache up front (regions x sexes in parallel) so a serving
//! process can start with predictable latency.

use std::time::Instant;

use population_engine::{Engine, Sex};
use rayon::prelude::*;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let population = args
        .next()
        .unwrap_or_else(|| "data/WPP2012_INT_F3_Population_By_Sex_Annual_Single_100_Medium.csv".to_string());
    let life = args.next().unwrap_or_else(|| "data/life_expectancy_ages.csv".to_string());
    let survival = args.next().unwrap_or_else(|| "data/survival_ratio.csv".to_string());

    let start = Instant::now();
    println!("Loading source tables...");
    let engine = Engine::from_csv_paths(&population, &life, &survival)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    println!("Loaded {} regions in {:?}", engine.regions().len(), start.elapsed());

    let keys: Vec<(String, Sex)> = engine
        .regions()
        .iter()
        .flat_map(|region| Sex::ALL.iter().map(move |&sex| (region.to_string(), sex)))
        .collect();

    println!("Building {} interpolation surfaces...", keys.len());
    let build_start = Instant::now();

    let failures: Vec<String> = keys
        .par_iter()
        .filter_map(|(region, sex)| {
            engine
                .warm(region, *sex)
                .err()
                .map(|e| format!("({}, {}): {}", region, sex, e))
        })
        .collect();

    println!(
        "Built {} surfaces in {:?} ({} failures)",
        engine.daily().cached_surfaces(),
        build_start.elapsed(),
        failures.len()
    );
    for failure in &failures {
        eprintln!("  {}", failure);
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("{} surfaces failed to build", failures.len()))
    }
}
