//! ZIP → city/county/state directory backed by a static CSV table.
//!
//! The table (columns `zip,city,state_id,state_name,county_name,county_fips`)
//! is read fully into memory once at startup; the directory is then injected
//! into the request handler and read concurrently with no further writes.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::types::ZipRecord;

pub struct ZipDirectory {
    records: HashMap<String, ZipRecord>,
}

impl ZipDirectory {
    /// Load the backing table from a CSV file. Fails if the file cannot be
    /// read or parsed, or if it yields no usable rows.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read zip table {}", path.display()))?;
        Self::from_csv(&content)
    }

    /// Parse the backing table from CSV content.
    pub fn from_csv(content: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader
            .headers()
            .context("Failed to read zip table headers")?
            .clone();

        let col = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .with_context(|| format!("Zip table is missing a '{}' column", name))
        };

        let zip_idx = col("zip")?;
        let city_idx = col("city")?;
        let state_id_idx = col("state_id")?;
        let state_name_idx = col("state_name")?;
        let county_name_idx = col("county_name")?;
        let county_fips_idx = col("county_fips")?;

        let mut records = HashMap::new();
        for result in reader.records() {
            let record = result.context("Failed to parse zip table row")?;
            let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or("").to_string();

            let county_name = field(county_name_idx);
            let state_id = field(state_id_idx);
            // Rows without county or state data cannot answer a lookup.
            if county_name.is_empty() || state_id.is_empty() {
                continue;
            }

            let zip = normalize_zip(&field(zip_idx));
            if zip.is_empty() {
                continue;
            }

            records.insert(
                zip.clone(),
                ZipRecord {
                    zip,
                    city: field(city_idx),
                    state_id,
                    state_name: field(state_name_idx),
                    county_name,
                    county_fips: field(county_fips_idx),
                },
            );
        }

        if records.is_empty() {
            bail!("Zip table contained no usable rows");
        }

        Ok(Self { records })
    }

    /// Point lookup by zip. The argument is zero-padded to 5 digits first, so
    /// `"6824"` and `"06824"` resolve identically.
    pub fn lookup(&self, zip: &str) -> Option<&ZipRecord> {
        self.records.get(&normalize_zip(zip))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Zero-pad a numeric zip to 5 digits; drops a ZIP+4 suffix if present.
fn normalize_zip(zip: &str) -> String {
    let digits: String = zip
        .split('-')
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return String::new();
    }
    format!("{:0>5}", digits)
}
