use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::ImportError;
use crate::import::{has_extension, ImportFormat};
use crate::models::{LocationSample, Route};

/// Integer timestamps at or above this are read as milliseconds, below as seconds
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Spacing given to rows of a file without a timestamp column
const DEFAULT_SAMPLE_INTERVAL_MS: i64 = 1000;

/// CSV importer with flexible column mapping
pub struct CsvImporter {
    column_mapping: HashMap<String, String>,
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        // Common column name variations
        Self::add_mapping(
            &mut column_mapping,
            "latitude",
            &["latitude", "lat", "position_lat"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "longitude",
            &["longitude", "lng", "lon", "long", "position_long"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "altitude",
            &["altitude", "elevation", "alt", "ele", "elev", "height"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "timestamp",
            &["timestamp", "time", "datetime", "date_time", "timestamp_ms"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "speed",
            &["speed", "velocity", "speed_ms"],
        );

        Self { column_mapping }
    }

    fn add_mapping(mapping: &mut HashMap<String, String>, standard: &str, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard.to_string());
        }
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    /// Parse a timestamp cell into milliseconds since the Unix epoch
    fn parse_timestamp(value: &str) -> Option<i64> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.timestamp_millis());
        }

        let formats = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S%.f",
        ];
        for format in &formats {
            if let Ok(naive_dt) = NaiveDateTime::parse_from_str(value, format) {
                return Some(DateTime::<Utc>::from_naive_utc_and_offset(naive_dt, Utc).timestamp_millis());
            }
        }

        match value.parse::<i64>() {
            Ok(raw) if raw >= EPOCH_MILLIS_THRESHOLD => Some(raw),
            Ok(seconds) => seconds.checked_mul(1000),
            Err(_) => None,
        }
    }

    fn parse_field(column: &str, value: &str, row: usize) -> Result<f64> {
        value.parse::<f64>().map_err(|_| {
            ImportError::ParseError {
                format: "CSV".to_string(),
                reason: format!("row {}: invalid {} '{}'", row, column, value),
            }
            .into()
        })
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "csv")
    }

    fn import_file(&self, file_path: &Path) -> Result<Route> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(file_path)?;

        // Map standard names to column indices
        let columns: HashMap<String, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, header)| (self.normalize_column_name(header), i))
            .collect();

        let column = |name: &str| -> Result<usize> {
            columns.get(name).copied().ok_or_else(|| {
                ImportError::MissingData {
                    field: name.to_string(),
                }
                .into()
            })
        };
        let latitude_col = column("latitude")?;
        let longitude_col = column("longitude")?;
        let altitude_col = columns.get("altitude").copied();
        let timestamp_col = columns.get("timestamp").copied();
        let speed_col = columns.get("speed").copied();

        let mut route = Route::new();
        for (index, result) in reader.records().enumerate() {
            let record = result?;
            let row = index + 2;
            let cell = |col: Option<usize>| {
                col.and_then(|i| record.get(i)).filter(|value| !value.is_empty())
            };

            let (Some(latitude), Some(longitude)) = (cell(Some(latitude_col)), cell(Some(longitude_col))) else {
                debug!(row, "CSV row without position skipped");
                continue;
            };

            let timestamp_ms = match cell(timestamp_col) {
                Some(value) => Self::parse_timestamp(value).ok_or_else(|| ImportError::ParseError {
                    format: "CSV".to_string(),
                    reason: format!("row {}: invalid timestamp '{}'", row, value),
                })?,
                None if timestamp_col.is_none() => index as i64 * DEFAULT_SAMPLE_INTERVAL_MS,
                None => {
                    debug!(row, "CSV row without timestamp skipped");
                    continue;
                }
            };

            route.push(LocationSample {
                latitude: Self::parse_field("latitude", latitude, row)?,
                longitude: Self::parse_field("longitude", longitude, row)?,
                altitude: cell(altitude_col)
                    .map(|value| Self::parse_field("altitude", value, row))
                    .transpose()?,
                timestamp_ms,
                speed: cell(speed_col)
                    .map(|value| Self::parse_field("speed", value, row))
                    .transpose()?,
            });
        }

        if route.is_empty() {
            anyhow::bail!("No valid samples found in CSV file");
        }

        Ok(route)
    }

    fn get_format_name(&self) -> &'static str {
        "CSV"
    }
}
