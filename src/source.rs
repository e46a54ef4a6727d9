//! The platform location service as seen by the tracking session

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::clock::ManualClock;
use crate::error::{Result, TrackerError};
use crate::models::LocationSample;

/// Outcome of the one-shot authorization query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Granted,
    Denied,
}

/// Delivery constraints requested when subscribing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionOptions {
    /// Minimum time between delivered samples (ms)
    pub min_interval_ms: u64,

    /// Minimum movement between delivered samples (m)
    pub min_distance_m: f64,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000,
            min_distance_m: 1.0,
        }
    }
}

/// A producer of location samples.
///
/// Samples are delivered one at a time through [`SampleSource::poll`]; `None`
/// means nothing is available right now (or the subscription has ended). An
/// `Err` terminates the stream and is not retried by the session.
pub trait SampleSource {
    /// Whether location access is granted
    fn authorization(&mut self) -> Result<Authorization>;

    /// Begin delivering samples
    fn subscribe(&mut self, options: &SubscriptionOptions) -> Result<()>;

    /// Next available sample, if any
    fn poll(&mut self) -> Option<Result<LocationSample>>;

    /// Stop delivering samples
    fn unsubscribe(&mut self);
}

/// Replays a recorded route as if it arrived live.
///
/// Samples closer in time than the subscription's `min_interval_ms` to the
/// previously delivered one are skipped. A sample stamped earlier than the
/// previous one is delivered as-is. When given a [`ManualClock`] the
/// clock is moved to each sample's timestamp as it is delivered.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    pending: VecDeque<LocationSample>,
    authorization: Authorization,
    clock: Option<ManualClock>,
    fail_after: Option<(usize, String)>,
    fail_subscribe: Option<String>,
    min_interval_ms: u64,
    last_delivered_ms: Option<i64>,
    delivered: usize,
    subscribed: bool,
}

impl ReplaySource {
    pub fn new(samples: Vec<LocationSample>) -> Self {
        Self {
            pending: samples.into(),
            authorization: Authorization::Granted,
            clock: None,
            fail_after: None,
            fail_subscribe: None,
            min_interval_ms: 0,
            last_delivered_ms: None,
            delivered: 0,
            subscribed: false,
        }
    }

    /// A source whose authorization query answers `Denied`
    pub fn denied(samples: Vec<LocationSample>) -> Self {
        Self {
            authorization: Authorization::Denied,
            ..Self::new(samples)
        }
    }

    /// Drive `clock` from the sample timestamps
    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Fail the stream once `count` samples have been delivered
    pub fn fail_after(mut self, count: usize, reason: impl Into<String>) -> Self {
        self.fail_after = Some((count, reason.into()));
        self
    }

    /// Reject every subscription attempt with `reason`
    pub fn fail_subscribe(mut self, reason: impl Into<String>) -> Self {
        self.fail_subscribe = Some(reason.into());
        self
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Samples not yet delivered
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl SampleSource for ReplaySource {
    fn authorization(&mut self) -> Result<Authorization> {
        Ok(self.authorization)
    }

    fn subscribe(&mut self, options: &SubscriptionOptions) -> Result<()> {
        if self.authorization == Authorization::Denied {
            return Err(TrackerError::PermissionDenied);
        }
        if let Some(reason) = &self.fail_subscribe {
            return Err(TrackerError::SampleSourceFailure(reason.clone()));
        }
        self.min_interval_ms = options.min_interval_ms;
        self.subscribed = true;
        debug!(
            pending = self.pending.len(),
            min_interval_ms = options.min_interval_ms,
            "Replay subscribed"
        );
        Ok(())
    }

    fn poll(&mut self) -> Option<Result<LocationSample>> {
        if !self.subscribed {
            return None;
        }

        if let Some((count, reason)) = &self.fail_after {
            if self.delivered >= *count {
                self.subscribed = false;
                return Some(Err(TrackerError::SampleSourceFailure(reason.clone())));
            }
        }

        while let Some(sample) = self.pending.pop_front() {
            let too_soon = self
                .last_delivered_ms
                .map(|last| {
                    sample.timestamp_ms >= last
                        && sample.timestamp_ms - last < self.min_interval_ms as i64
                })
                .unwrap_or(false);
            if too_soon {
                continue;
            }

            if let Some(clock) = &self.clock {
                clock.set(sample.timestamp_ms);
            }
            self.last_delivered_ms = Some(sample.timestamp_ms);
            self.delivered += 1;
            return Some(Ok(sample));
        }

        None
    }

    fn unsubscribe(&mut self) {
        self.subscribed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;

    fn samples(timestamps: &[i64]) -> Vec<LocationSample> {
        timestamps
            .iter()
            .map(|&t| LocationSample::new(46.0, 7.0, t))
            .collect()
    }

    #[test]
    fn test_nothing_before_subscribe() {
        let mut source = ReplaySource::new(samples(&[0, 1000]));
        assert!(source.poll().is_none());
        assert_eq!(source.remaining(), 2);
    }

    #[test]
    fn test_replay_advances_clock() {
        let clock = ManualClock::new(0);
        let mut source = ReplaySource::new(samples(&[5_000, 6_000])).with_clock(clock.clone());
        source.subscribe(&SubscriptionOptions::default()).unwrap();

        let first = source.poll().unwrap().unwrap();
        assert_eq!(first.timestamp_ms, 5_000);
        assert_eq!(clock.now_millis(), 5_000);

        source.poll().unwrap().unwrap();
        assert_eq!(clock.now_millis(), 6_000);
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_min_interval_skips_dense_samples() {
        let mut source = ReplaySource::new(samples(&[0, 200, 900, 1000, 1500, 2100]));
        source.subscribe(&SubscriptionOptions::default()).unwrap();

        let delivered: Vec<i64> = std::iter::from_fn(|| source.poll())
            .map(|s| s.unwrap().timestamp_ms)
            .collect();
        assert_eq!(delivered, vec![0, 1000, 2100]);
    }

    #[test]
    fn test_backwards_timestamps_are_delivered() {
        let mut source = ReplaySource::new(samples(&[0, 1000, 500, 900, 2000]));
        source.subscribe(&SubscriptionOptions::default()).unwrap();

        let delivered: Vec<i64> = std::iter::from_fn(|| source.poll())
            .map(|s| s.unwrap().timestamp_ms)
            .collect();
        assert_eq!(delivered, vec![0, 1000, 500, 2000]);
    }

    #[test]
    fn test_subscribe_failure() {
        let mut source = ReplaySource::new(samples(&[0])).fail_subscribe("provider unavailable");
        assert!(matches!(
            source.subscribe(&SubscriptionOptions::default()),
            Err(TrackerError::SampleSourceFailure(_))
        ));
        assert!(!source.is_subscribed());
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_denied_source() {
        let mut source = ReplaySource::denied(samples(&[0]));
        assert_eq!(source.authorization().unwrap(), Authorization::Denied);
        assert!(matches!(
            source.subscribe(&SubscriptionOptions::default()),
            Err(TrackerError::PermissionDenied)
        ));
    }

    #[test]
    fn test_failure_terminates_stream() {
        let mut source = ReplaySource::new(samples(&[0, 1000, 2000])).fail_after(1, "gps lost");
        source.subscribe(&SubscriptionOptions::default()).unwrap();

        assert!(source.poll().unwrap().is_ok());
        assert!(matches!(
            source.poll(),
            Some(Err(TrackerError::SampleSourceFailure(_)))
        ));
        assert!(!source.is_subscribed());
        assert!(source.poll().is_none());
    }
}
