//! Live statistics over a growing route
//!
//! [`StatsAggregator`] keeps running totals so each sample costs O(1) apart
//! from run finalization. [`StatsAggregator::recompute`] derives the same
//! snapshot from the full route and is the reference the running totals are
//! tested against; the two agree up to floating-point summation order.

use crate::elevation::ElevationAccumulator;
use crate::geo;
use crate::models::{LiveStats, LocationSample, Run};
use crate::runs::{RunDetector, RunDetectorConfig};

/// Whole seconds between two millisecond timestamps, never negative
pub fn elapsed_seconds(start_ms: i64, now_ms: i64) -> u64 {
    ((now_ms - start_ms).max(0) / 1000) as u64
}

/// Composes distance, elevation and run detection into one snapshot per sample
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    detector: RunDetector,
    elevation: ElevationAccumulator,
    distance: f64,
    max_speed: f64,
}

impl StatsAggregator {
    pub fn new(config: RunDetectorConfig) -> Self {
        Self {
            detector: RunDetector::new(config),
            elevation: ElevationAccumulator::new(),
            distance: 0.0,
            max_speed: 0.0,
        }
    }

    /// Account for the newest sample of `route`
    pub fn observe(&mut self, route: &[LocationSample]) {
        let Some(latest) = route.last() else {
            return;
        };

        if route.len() >= 2 {
            self.distance += geo::distance(&route[route.len() - 2], latest);
        }
        self.elevation.push(latest);
        if let Some(speed) = latest.speed {
            self.max_speed = self.max_speed.max(speed);
        }
        self.detector.observe(route);
    }

    /// Close any open run at the end of the route
    pub fn finish(&mut self, route: &[LocationSample]) -> Option<Run> {
        self.detector.finish(route).cloned()
    }

    /// Current snapshot, `start_ms` and `now_ms` supplied by the caller
    pub fn snapshot(&self, route: &[LocationSample], start_ms: i64, now_ms: i64) -> LiveStats {
        let Some(latest) = route.last() else {
            return LiveStats::default();
        };

        Self::assemble(
            latest,
            self.distance,
            self.max_speed,
            &self.elevation,
            self.detector.run_count(),
            elapsed_seconds(start_ms, now_ms),
        )
    }

    /// Full recomputation over `route`, without the forced finalize of a stop
    pub fn recompute(
        config: RunDetectorConfig,
        route: &[LocationSample],
        start_ms: i64,
        now_ms: i64,
    ) -> LiveStats {
        let Some(latest) = route.last() else {
            return LiveStats::default();
        };

        let mut detector = RunDetector::new(config);
        for end in 1..=route.len() {
            detector.observe(&route[..end]);
        }
        let max_speed = route
            .iter()
            .filter_map(|sample| sample.speed)
            .fold(0.0, f64::max);

        Self::assemble(
            latest,
            geo::path_length(route),
            max_speed,
            &ElevationAccumulator::from_samples(route),
            detector.run_count(),
            elapsed_seconds(start_ms, now_ms),
        )
    }

    fn assemble(
        latest: &LocationSample,
        distance: f64,
        max_speed: f64,
        elevation: &ElevationAccumulator,
        number_of_runs: usize,
        duration: u64,
    ) -> LiveStats {
        let average_speed = if duration > 0 {
            distance / duration as f64
        } else {
            0.0
        };

        LiveStats {
            distance,
            duration,
            current_speed: latest.speed.unwrap_or(0.0),
            average_speed,
            max_speed,
            elevation_gain: elevation.gain(),
            elevation_loss: elevation.loss(),
            vertical: elevation.vertical(),
            number_of_runs,
            current_altitude: elevation.current_altitude(),
            max_altitude: elevation.max_altitude(),
            min_altitude: elevation.min_altitude(),
        }
    }

    pub fn runs(&self) -> &[Run] {
        self.detector.runs()
    }

    pub fn reset(&mut self) {
        self.detector.reset();
        self.elevation = ElevationAccumulator::new();
        self.distance = 0.0;
        self.max_speed = 0.0;
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new(RunDetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPSILON: f64 = 1e-6;

    fn sample(i: usize, altitude: Option<f64>, speed: Option<f64>) -> LocationSample {
        LocationSample {
            latitude: 45.0 + i as f64 * 0.00005,
            longitude: 6.0 + i as f64 * 0.0001,
            altitude,
            timestamp_ms: i as i64 * 1000,
            speed,
        }
    }

    fn observe_all(aggregator: &mut StatsAggregator, route: &[LocationSample]) -> Vec<LiveStats> {
        (1..=route.len())
            .map(|end| {
                aggregator.observe(&route[..end]);
                aggregator.snapshot(&route[..end], 0, route[end - 1].timestamp_ms)
            })
            .collect()
    }

    #[test]
    fn test_empty_route_snapshot_is_zero() {
        let aggregator = StatsAggregator::default();
        assert_eq!(aggregator.snapshot(&[], 0, 60_000), LiveStats::default());
        assert_eq!(
            StatsAggregator::recompute(RunDetectorConfig::default(), &[], 0, 60_000),
            LiveStats::default()
        );
    }

    #[test]
    fn test_elapsed_seconds_floors_and_clamps() {
        assert_eq!(elapsed_seconds(1_000, 11_999), 10);
        assert_eq!(elapsed_seconds(5_000, 1_000), 0);
    }

    #[test]
    fn test_stationary_session() {
        let still = LocationSample::new(46.0, 7.0, 0).with_altitude(1800.0);
        let route = vec![still.clone(), LocationSample { timestamp_ms: 10_000, ..still }];

        let mut aggregator = StatsAggregator::default();
        let stats = observe_all(&mut aggregator, &route).pop().unwrap();

        assert_eq!(stats.distance, 0.0);
        assert_eq!(stats.average_speed, 0.0);
        assert_eq!(stats.duration, 10);
        assert_eq!(stats.current_altitude, 1800.0);
    }

    #[test]
    fn test_snapshot_fields() {
        let route = vec![
            sample(0, Some(2000.0), Some(3.0)),
            sample(1, Some(1990.0), Some(9.0)),
            sample(2, None, None),
            sample(3, Some(1995.0), Some(4.0)),
        ];
        let mut aggregator = StatsAggregator::default();
        let stats = observe_all(&mut aggregator, &route).pop().unwrap();

        assert_eq!(stats.current_speed, 4.0);
        assert_eq!(stats.max_speed, 9.0);
        assert_eq!(stats.elevation_gain, 0.0);
        assert_eq!(stats.elevation_loss, 10.0);
        assert_eq!(stats.vertical, 10.0);
        assert_eq!(stats.max_altitude, 2000.0);
        assert_eq!(stats.min_altitude, 1990.0);
        assert_eq!(stats.duration, 3);
        assert!((stats.average_speed - stats.distance / 3.0).abs() < EPSILON);
        assert!((stats.distance - geo::path_length(&route)).abs() < EPSILON);
    }

    #[test]
    fn test_missing_speed_reads_as_zero() {
        let route = vec![sample(0, None, Some(5.0)), sample(1, None, None)];
        let mut aggregator = StatsAggregator::default();
        let stats = observe_all(&mut aggregator, &route).pop().unwrap();
        assert_eq!(stats.current_speed, 0.0);
        assert_eq!(stats.max_speed, 5.0);
    }

    #[test]
    fn test_runs_counted_and_reset() {
        let altitudes = [500.0, 480.0, 460.0, 470.0];
        let route: Vec<_> = altitudes
            .iter()
            .enumerate()
            .map(|(i, &a)| sample(i, Some(a), None))
            .collect();

        let mut aggregator = StatsAggregator::default();
        let stats = observe_all(&mut aggregator, &route).pop().unwrap();
        assert_eq!(stats.number_of_runs, 1);
        assert_eq!(aggregator.runs().len(), 1);

        aggregator.reset();
        assert!(aggregator.runs().is_empty());
        assert_eq!(aggregator.snapshot(&[], 0, 0), LiveStats::default());
    }

    proptest! {
        #[test]
        fn test_incremental_matches_recompute(
            points in proptest::collection::vec(
                (
                    -0.0005f64..0.0005,
                    -0.0005f64..0.0005,
                    proptest::option::of(1000.0f64..3000.0),
                    proptest::option::of(0.0f64..30.0),
                ),
                1..120,
            )
        ) {
            let mut latitude = 46.0;
            let mut longitude = 7.0;
            let route: Vec<_> = points
                .into_iter()
                .enumerate()
                .map(|(i, (dlat, dlon, altitude, speed))| {
                    latitude += dlat;
                    longitude += dlon;
                    LocationSample { latitude, longitude, altitude, timestamp_ms: i as i64 * 1000, speed }
                })
                .collect();

            let mut aggregator = StatsAggregator::default();
            let snapshots = observe_all(&mut aggregator, &route);

            let now = route.last().unwrap().timestamp_ms;
            let reference = StatsAggregator::recompute(RunDetectorConfig::default(), &route, 0, now);
            let live = snapshots.last().unwrap();

            prop_assert!((live.distance - reference.distance).abs() < EPSILON);
            prop_assert!((live.elevation_gain - reference.elevation_gain).abs() < EPSILON);
            prop_assert!((live.elevation_loss - reference.elevation_loss).abs() < EPSILON);
            prop_assert_eq!(live.number_of_runs, reference.number_of_runs);
            prop_assert_eq!(live.max_speed, reference.max_speed);
            prop_assert_eq!(live.duration, reference.duration);

            for pair in snapshots.windows(2) {
                prop_assert!(pair[1].max_speed >= pair[0].max_speed);
            }
            for stats in &snapshots {
                prop_assert_eq!(stats.vertical, stats.elevation_gain + stats.elevation_loss);
            }
        }
    }
}
