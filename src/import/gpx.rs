use anyhow::{Context, Result};
use chrono::DateTime;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use crate::error::ImportError;
use crate::import::{has_extension, ImportFormat};
use crate::models::{LocationSample, Route};

/// GPX importer for recorded GPS tracks
///
/// Every track segment is flattened into one route. Points without a time
/// stamp cannot be replayed and are skipped.
pub struct GpxImporter;

impl GpxImporter {
    pub fn new() -> Self {
        Self
    }

    fn parse_point(point: &gpx::Waypoint) -> Result<Option<LocationSample>> {
        let Some(time) = &point.time else {
            return Ok(None);
        };
        let formatted = time.format().map_err(|e| ImportError::ParseError {
            format: "GPX".to_string(),
            reason: e.to_string(),
        })?;
        let timestamp = DateTime::parse_from_rfc3339(&formatted)
            .with_context(|| format!("Invalid GPX time: {}", formatted))?;

        Ok(Some(LocationSample {
            latitude: point.point().y(),
            longitude: point.point().x(),
            altitude: point.elevation,
            timestamp_ms: timestamp.timestamp_millis(),
            speed: point.speed,
        }))
    }
}

impl Default for GpxImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for GpxImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "gpx")
    }

    fn import_file(&self, file_path: &Path) -> Result<Route> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open GPX file: {}", file_path.display()))?;
        let data = gpx::read(BufReader::new(file)).map_err(|e| ImportError::ParseError {
            format: "GPX".to_string(),
            reason: e.to_string(),
        })?;

        let mut route = Route::new();
        let mut skipped = 0usize;
        for point in data
            .tracks
            .iter()
            .flat_map(|track| track.segments.iter())
            .flat_map(|segment| segment.points.iter())
        {
            match Self::parse_point(point)? {
                Some(sample) => route.push(sample),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!(skipped, "GPX points without time skipped");
        }
        if route.is_empty() {
            return Err(ImportError::MissingData {
                field: "timed track points".to_string(),
            }
            .into());
        }

        Ok(route)
    }

    fn get_format_name(&self) -> &'static str {
        "GPX"
    }
}
