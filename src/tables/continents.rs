//! Continent to countries mapping
//!
//! A small auxiliary table grouping the dataset's countries by
//! continent, used by listing queries. Optional: engines without it
//! simply treat every continent as unknown.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Mapping of continent name to its member countries
#[derive(Debug, Clone, Default)]
pub struct ContinentTable {
    // sorted keys keep the listings stable
    continents: BTreeMap<String, Vec<String>>,
}

impl ContinentTable {
    /// Build from (continent, country) pairs; countries keep their file
    /// order within each continent
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut continents: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (continent, country) in pairs {
            continents.entry(continent).or_default().push(country);
        }
        Self { continents }
    }

    /// All continent names
    pub fn continents(&self) -> Vec<&str> {
        self.continents.keys().map(String::as_str).collect()
    }

    /// Countries belonging to one continent
    pub fn countries(&self, continent: &str) -> Result<&[String]> {
        self.continents
            .get(continent)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UnknownContinent(continent.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.continents.is_empty()
    }
}
