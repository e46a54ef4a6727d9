//! Downhill run detection
//!
//! A two-state hysteresis machine over the altitude deltas of consecutive
//! samples. A drop of at least `descent_trigger_m` opens a candidate run at the
//! last flat sample; a climb above `climb_exit_m`, or more than `stall_samples`
//! samples without another qualifying drop, closes it. A closed candidate
//! becomes a [`Run`] only if it lost more than `min_vertical_drop_m`.
//!
//! The stall limit counts samples, not seconds: sources are subscribed at one
//! sample per second, so 30 samples stand in for roughly 30 s without descent.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::geo;
use crate::models::{LocationSample, Run};

/// Thresholds for run detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetectorConfig {
    /// Minimum drop between consecutive samples that counts as descending (m)
    pub descent_trigger_m: f64,

    /// Climb between consecutive samples that ends a run (m)
    pub climb_exit_m: f64,

    /// Samples without a qualifying drop after which a run ends
    pub stall_samples: usize,

    /// A candidate must lose strictly more than this to be recorded (m)
    pub min_vertical_drop_m: f64,

    /// Routes shorter than this never produce a run
    pub min_route_samples: usize,
}

impl Default for RunDetectorConfig {
    fn default() -> Self {
        Self {
            descent_trigger_m: 2.0,
            climb_exit_m: 5.0,
            stall_samples: 30,
            min_vertical_drop_m: 10.0,
            min_route_samples: 3,
        }
    }
}

/// Detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Flat,
    InRun {
        /// Route index of the last flat sample before the descent
        start_index: usize,
        /// Altitude-bearing samples seen since the last qualifying drop
        samples_since_descent: usize,
    },
}

/// Segments a route into downhill runs, one sample at a time
#[derive(Debug, Clone)]
pub struct RunDetector {
    config: RunDetectorConfig,
    state: DetectorState,
    runs: Vec<Run>,
}

impl RunDetector {
    pub fn new(config: RunDetectorConfig) -> Self {
        Self {
            config,
            state: DetectorState::Flat,
            runs: Vec::new(),
        }
    }

    /// Run detection over a complete route from scratch, including the
    /// forced finalize a stop would perform
    pub fn replay(config: RunDetectorConfig, route: &[LocationSample]) -> Self {
        let mut detector = Self::new(config);
        for end in 1..=route.len() {
            detector.observe(&route[..end]);
        }
        detector.finish(route);
        detector
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Runs finalized so far, in order
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn config(&self) -> &RunDetectorConfig {
        &self.config
    }

    /// Drop all state and recorded runs
    pub fn reset(&mut self) {
        self.state = DetectorState::Flat;
        self.runs.clear();
    }

    /// Evaluate the newest sample of `route` against its predecessor.
    ///
    /// Returns the run finalized by this sample, if any.
    pub fn observe(&mut self, route: &[LocationSample]) -> Option<&Run> {
        let n = route.len();
        if n < 2 {
            return None;
        }

        let (Some(previous), Some(current)) = (route[n - 2].altitude, route[n - 1].altitude) else {
            return None;
        };
        let delta = current - previous;
        let descending = delta <= -self.config.descent_trigger_m;

        match self.state {
            DetectorState::Flat => {
                if descending {
                    debug!(start_index = n - 2, delta, "Descent started");
                    self.state = DetectorState::InRun {
                        start_index: n - 2,
                        samples_since_descent: 0,
                    };
                }
                None
            }
            DetectorState::InRun {
                start_index,
                samples_since_descent,
            } => {
                if descending {
                    self.state = DetectorState::InRun {
                        start_index,
                        samples_since_descent: 0,
                    };
                    return None;
                }

                let stalled = samples_since_descent + 1 > self.config.stall_samples;
                if delta > self.config.climb_exit_m || stalled {
                    debug!(start_index, end_index = n - 2, delta, stalled, "Descent ended");
                    self.state = DetectorState::Flat;
                    return self.finalize(route, start_index, n - 2);
                }

                self.state = DetectorState::InRun {
                    start_index,
                    samples_since_descent: samples_since_descent + 1,
                };
                None
            }
        }
    }

    /// Close an open candidate at the end of the route (explicit stop)
    pub fn finish(&mut self, route: &[LocationSample]) -> Option<&Run> {
        match self.state {
            DetectorState::InRun { start_index, .. } if !route.is_empty() => {
                self.state = DetectorState::Flat;
                self.finalize(route, start_index, route.len() - 1)
            }
            _ => {
                self.state = DetectorState::Flat;
                None
            }
        }
    }

    fn finalize(&mut self, route: &[LocationSample], start: usize, end: usize) -> Option<&Run> {
        if route.len() < self.config.min_route_samples || start >= end || end >= route.len() {
            return None;
        }

        // the closing sample is the last one in the span that has an altitude
        let end = (start..=end).rev().find(|&i| route[i].altitude.is_some())?;
        let span = &route[start..=end];
        let first = span.first()?;
        let last = span.last()?;
        let start_altitude = first.altitude?;
        let end_altitude = last.altitude?;

        let vertical_drop = start_altitude - end_altitude;
        if vertical_drop <= self.config.min_vertical_drop_m {
            debug!(vertical_drop, "Candidate run discarded");
            return None;
        }

        let speeds: Vec<f64> = span
            .iter()
            .filter_map(|sample| sample.speed)
            .filter(|&speed| speed > 0.0)
            .collect();
        let max_speed = speeds.iter().copied().fold(0.0, f64::max);
        let average_speed = if speeds.is_empty() {
            0.0
        } else {
            speeds.iter().sum::<f64>() / speeds.len() as f64
        };

        let run = Run {
            start_timestamp: first.timestamp_ms,
            end_timestamp: last.timestamp_ms,
            start_altitude,
            end_altitude,
            vertical_drop,
            max_speed,
            average_speed,
            distance: geo::path_length(span),
        };

        info!(
            number = self.runs.len() + 1,
            vertical_drop = run.vertical_drop,
            distance = run.distance,
            max_speed = run.max_speed,
            "Run recorded"
        );

        self.runs.push(run);
        self.runs.last()
    }
}

impl Default for RunDetector {
    fn default() -> Self {
        Self::new(RunDetectorConfig::default())
    }
}
