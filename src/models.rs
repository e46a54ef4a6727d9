use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sensor observation from the location source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    /// Latitude in degrees (WGS-84)
    pub latitude: f64,

    /// Longitude in degrees (WGS-84)
    pub longitude: f64,

    /// Altitude in meters, absent without a vertical fix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,

    /// Wall clock in milliseconds since the Unix epoch
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,

    /// Sensor-reported instantaneous speed in meters per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            timestamp_ms,
            speed: None,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }
}

/// Ordered samples of one tracking session, insertion order is temporal order
pub type Route = Vec<LocationSample>;

/// A completed downhill segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Timestamp of the last flat sample before the descent, ms since epoch
    pub start_timestamp: i64,

    /// Timestamp of the sample closing the descent, ms since epoch
    pub end_timestamp: i64,

    pub start_altitude: f64,
    pub end_altitude: f64,

    /// `start_altitude - end_altitude`, always above the detector's minimum drop
    pub vertical_drop: f64,

    /// Highest sampled speed inside the segment (m/s)
    pub max_speed: f64,

    /// Mean of positive sampled speeds inside the segment (m/s)
    pub average_speed: f64,

    /// Path length along the segment in meters
    pub distance: f64,
}

impl Run {
    /// Segment duration in whole seconds
    pub fn duration_seconds(&self) -> i64 {
        (self.end_timestamp - self.start_timestamp).max(0) / 1000
    }
}

/// Statistics snapshot, replaced wholesale on every ingested sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    /// Cumulative distance in meters
    pub distance: f64,

    /// Whole seconds since start, paused time included
    pub duration: u64,

    pub current_speed: f64,
    pub average_speed: f64,

    /// Running maximum, never decreases within a session
    pub max_speed: f64,

    pub elevation_gain: f64,
    pub elevation_loss: f64,

    /// Total elevation change, `elevation_gain + elevation_loss`
    pub vertical: f64,

    pub number_of_runs: usize,

    pub current_altitude: f64,
    pub max_altitude: f64,
    pub min_altitude: f64,
}

/// Lifecycle status recorded on a stored session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Completed,
    Active,
    Paused,
}

/// Final record of one tracking run, handed to the session store on stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnowboardSession {
    /// Unique identifier, key in the session store
    pub id: String,

    /// When tracking started
    pub date: DateTime<Utc>,

    /// Duration in seconds
    pub duration: u64,

    /// Distance in meters
    pub distance: f64,

    pub max_speed: f64,
    pub average_speed: f64,
    pub current_speed: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
    pub vertical: f64,
    pub number_of_runs: usize,
    pub current_altitude: f64,
    pub max_altitude: f64,
    pub min_altitude: f64,

    pub route: Route,

    /// Runs detected during the session, in order
    #[serde(default)]
    pub runs: Vec<Run>,

    pub status: SessionStatus,
}

impl SnowboardSession {
    /// Pin a snapshot into a completed session record
    pub fn completed(
        date: DateTime<Utc>,
        duration: u64,
        stats: &LiveStats,
        route: Route,
        runs: Vec<Run>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            date,
            duration,
            distance: stats.distance,
            max_speed: stats.max_speed,
            average_speed: stats.average_speed,
            current_speed: stats.current_speed,
            elevation_gain: stats.elevation_gain,
            elevation_loss: stats.elevation_loss,
            vertical: stats.vertical,
            number_of_runs: runs.len(),
            current_altitude: stats.current_altitude,
            max_altitude: stats.max_altitude,
            min_altitude: stats.min_altitude,
            route,
            runs,
            status: SessionStatus::Completed,
        }
    }

    /// Subtract time spent paused from the recorded duration.
    ///
    /// The engine measures duration from start to stop; paused intervals are
    /// tracked by the caller and must be removed before the session is stored.
    pub fn exclude_paused(mut self, paused_ms: u64) -> Self {
        self.duration = (self.duration * 1000).saturating_sub(paused_ms) / 1000;
        self
    }

    /// The statistics pinned in this session, as a snapshot value
    pub fn stats(&self) -> LiveStats {
        LiveStats {
            distance: self.distance,
            duration: self.duration,
            current_speed: self.current_speed,
            average_speed: self.average_speed,
            max_speed: self.max_speed,
            elevation_gain: self.elevation_gain,
            elevation_loss: self.elevation_loss,
            vertical: self.vertical,
            number_of_runs: self.number_of_runs,
            current_altitude: self.current_altitude,
            max_altitude: self.max_altitude,
            min_altitude: self.min_altitude,
        }
    }
}
