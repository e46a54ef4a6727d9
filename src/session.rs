//! The tracking session: route ownership and the start/pause/stop lifecycle
//!
//! ```text
//!  Idle --start--> Tracking --pause--> Paused
//!                     ^   <--resume--    |
//!                     |                  |
//!                     +-------stop-------+--> Stopped
//! ```
//!
//! The session measures `duration` from start to now. Time spent paused is
//! *not* removed by the engine; callers keep their own tally (see
//! [`PauseLedger`]) and apply it with [`SnowboardSession::exclude_paused`]
//! before storing the session.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::models::{LiveStats, LocationSample, Route, Run, SnowboardSession};
use crate::runs::RunDetectorConfig;
use crate::source::{Authorization, SampleSource, SubscriptionOptions};
use crate::stats::{elapsed_seconds, StatsAggregator};

/// Receives every snapshot produced while tracking
pub type SnapshotSink = Box<dyn FnMut(&LiveStats)>;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, never started
    Idle,
    /// Accepting samples
    Tracking,
    /// Subscribed but dropping samples
    Paused,
    /// Stopped, buffers handed off
    Stopped,
}

/// What `stop` hands back for persistence
#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub route: Route,
    pub session: SnowboardSession,
}

/// Owns the route of one activity and turns incoming samples into snapshots
pub struct TrackingSession<S: SampleSource, C: Clock = SystemClock> {
    source: S,
    clock: C,
    detector_config: RunDetectorConfig,
    subscription: SubscriptionOptions,
    state: SessionState,
    route: Route,
    aggregator: StatsAggregator,
    started_at_ms: i64,
    last_snapshot: LiveStats,
    sink: Option<SnapshotSink>,
}

impl<S: SampleSource> TrackingSession<S, SystemClock> {
    /// Session reading the system clock, default thresholds
    pub fn new(source: S) -> Self {
        Self::with_clock(source, SystemClock, &TrackerConfig::default())
    }
}

impl<S: SampleSource, C: Clock> TrackingSession<S, C> {
    pub fn with_clock(source: S, clock: C, config: &TrackerConfig) -> Self {
        Self {
            source,
            clock,
            detector_config: config.detector.clone(),
            subscription: config.source.clone(),
            state: SessionState::Idle,
            route: Vec::new(),
            aggregator: StatsAggregator::new(config.detector.clone()),
            started_at_ms: 0,
            last_snapshot: LiveStats::default(),
            sink: None,
        }
    }

    /// Begin tracking, delivering each snapshot to `sink`.
    ///
    /// Calling this while already tracking (or paused) is a no-op. Starting a
    /// stopped session begins a fresh activity.
    pub fn start<F>(&mut self, sink: F) -> Result<()>
    where
        F: FnMut(&LiveStats) + 'static,
    {
        if self.is_tracking() {
            warn!("Tracking already started");
            return Ok(());
        }

        match self.source.authorization().map_err(into_source_failure)? {
            Authorization::Granted => {}
            Authorization::Denied => {
                warn!("Location permission not granted");
                return Err(TrackerError::PermissionDenied);
            }
        }

        self.route.clear();
        self.aggregator = StatsAggregator::new(self.detector_config.clone());
        self.last_snapshot = LiveStats::default();

        self.source
            .subscribe(&self.subscription)
            .map_err(into_source_failure)?;

        self.started_at_ms = self.clock.now_millis();
        self.sink = Some(Box::new(sink));
        self.state = SessionState::Tracking;

        info!(
            started_at_ms = self.started_at_ms,
            min_interval_ms = self.subscription.min_interval_ms,
            "Tracking started"
        );
        Ok(())
    }

    /// Accept one sample.
    ///
    /// Returns the new snapshot, or `None` when the sample was dropped because
    /// the session is not tracking.
    pub fn ingest(&mut self, sample: LocationSample) -> Option<LiveStats> {
        if self.state != SessionState::Tracking {
            debug!(state = ?self.state, timestamp_ms = sample.timestamp_ms, "Sample dropped");
            return None;
        }

        self.route.push(sample);
        self.aggregator.observe(&self.route);

        let snapshot = self
            .aggregator
            .snapshot(&self.route, self.started_at_ms, self.clock.now_millis());
        self.last_snapshot = snapshot.clone();

        if let Some(sink) = self.sink.as_mut() {
            sink(&snapshot);
        }
        Some(snapshot)
    }

    /// Pull one sample from the source and ingest it.
    ///
    /// Returns `false` once the source has nothing more to deliver. A source
    /// error ends the subscription and is surfaced as `SampleSourceFailure`.
    pub fn pump_next(&mut self) -> Result<bool> {
        if !self.is_tracking() {
            return Ok(false);
        }

        match self.source.poll() {
            None => Ok(false),
            Some(Ok(sample)) => {
                self.ingest(sample);
                Ok(true)
            }
            Some(Err(e)) => {
                self.source.unsubscribe();
                let error = into_source_failure(e);
                warn!(error = %error, samples = self.route.len(), "Sample stream terminated");
                Err(error)
            }
        }
    }

    /// Drain every sample the source currently has, returning how many were delivered
    pub fn pump(&mut self) -> Result<usize> {
        let mut delivered = 0;
        while self.pump_next()? {
            delivered += 1;
        }
        Ok(delivered)
    }

    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            SessionState::Tracking => {
                self.state = SessionState::Paused;
                info!(samples = self.route.len(), "Tracking paused");
                Ok(())
            }
            SessionState::Paused => Ok(()),
            SessionState::Idle | SessionState::Stopped => Err(TrackerError::NotTracking),
        }
    }

    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            SessionState::Paused => {
                self.state = SessionState::Tracking;
                info!(samples = self.route.len(), "Tracking resumed");
                Ok(())
            }
            SessionState::Tracking => Ok(()),
            SessionState::Idle | SessionState::Stopped => Err(TrackerError::NotTracking),
        }
    }

    /// End the activity.
    ///
    /// Any open run is finalized first. Internal buffers are cleared whether or
    /// not a session could be produced; with fewer than two samples the attempt
    /// fails with `SessionTooShort` and should be discarded by the caller.
    pub fn stop(&mut self) -> Result<StopOutcome> {
        if !self.is_tracking() {
            return Err(TrackerError::NotTracking);
        }

        self.source.unsubscribe();
        self.sink = None;
        self.state = SessionState::Stopped;

        let now_ms = self.clock.now_millis();
        self.aggregator.finish(&self.route);
        let runs = self.aggregator.runs().to_vec();
        let route = std::mem::take(&mut self.route);
        let last_snapshot = std::mem::take(&mut self.last_snapshot);
        self.aggregator.reset();

        if route.len() < 2 {
            warn!(samples = route.len(), "Session too short");
            return Err(TrackerError::SessionTooShort {
                samples: route.len(),
            });
        }

        let duration = elapsed_seconds(self.started_at_ms, now_ms);
        let date = DateTime::<Utc>::from_timestamp_millis(self.started_at_ms).unwrap_or_else(Utc::now);
        let session = SnowboardSession::completed(date, duration, &last_snapshot, route.clone(), runs);

        info!(
            id = %session.id,
            samples = route.len(),
            duration,
            distance = session.distance,
            runs = session.number_of_runs,
            "Tracking stopped"
        );

        Ok(StopOutcome { route, session })
    }

    /// True while tracking or paused
    pub fn is_tracking(&self) -> bool {
        matches!(self.state, SessionState::Tracking | SessionState::Paused)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Copy of the route collected so far
    pub fn current_route(&self) -> Route {
        self.route.clone()
    }

    /// Copy of the runs finalized so far
    pub fn runs(&self) -> Vec<Run> {
        self.aggregator.runs().to_vec()
    }

    /// The most recent snapshot, all zero before the first sample
    pub fn last_snapshot(&self) -> &LiveStats {
        &self.last_snapshot
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

fn into_source_failure(error: TrackerError) -> TrackerError {
    match error {
        TrackerError::PermissionDenied | TrackerError::SampleSourceFailure(_) => error,
        other => TrackerError::SampleSourceFailure(other.to_string()),
    }
}

/// Caller-side tally of paused wall-clock time
#[derive(Debug, Clone, Default)]
pub struct PauseLedger {
    paused_since_ms: Option<i64>,
    total_ms: u64,
}

impl PauseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&mut self, now_ms: i64) {
        if self.paused_since_ms.is_none() {
            self.paused_since_ms = Some(now_ms);
        }
    }

    pub fn resume(&mut self, now_ms: i64) {
        if let Some(since) = self.paused_since_ms.take() {
            self.total_ms += (now_ms - since).max(0) as u64;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_since_ms.is_some()
    }

    /// Paused time up to `now_ms`, including an ongoing pause
    pub fn total_ms(&self, now_ms: i64) -> u64 {
        let ongoing = self
            .paused_since_ms
            .map(|since| (now_ms - since).max(0) as u64)
            .unwrap_or(0);
        self.total_ms + ongoing
    }
}
