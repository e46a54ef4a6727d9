use slopetrack::import::ImportManager;
use slopetrack::{
    Clock, JsonSessionStore, LiveStats, LocationSample, ManualClock, PauseLedger, ReplaySource,
    RunDetector, RunDetectorConfig, SessionState, SessionStore, TrackerConfig, TrackerError,
    TrackingSession,
};
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use tempfile::tempdir;

/// End-to-end tests driving the tracking engine through a replayed source

#[cfg(test)]
mod tracking_session_tests {
    use super::*;

    const START_MS: i64 = 1_707_555_600_000;

    /// Two runs of 60 m, a lift ride between them and a 6 m dip that must not count
    fn ski_day() -> Vec<LocationSample> {
        let mut altitudes = Vec::new();
        altitudes.extend(std::iter::repeat(2000.0).take(5));
        altitudes.extend((1..=20).map(|i| 2000.0 - 3.0 * i as f64));
        altitudes.extend(std::iter::repeat(1940.0).take(31));
        altitudes.extend((1..=30).map(|i| 1940.0 + 4.0 * i as f64));
        altitudes.extend((1..=15).map(|i| 2060.0 - 4.0 * i as f64));
        altitudes.push(2006.0);
        altitudes.push(2000.0);
        altitudes.extend(std::iter::repeat(2000.0).take(31));

        let mut previous = altitudes[0];
        altitudes
            .into_iter()
            .enumerate()
            .map(|(i, altitude): (usize, f64)| {
                let speed = if altitude < previous { 8.0 + (i % 3) as f64 } else { 2.0 };
                previous = altitude;
                LocationSample::new(46.02, 7.74 + i as f64 * 0.0001, START_MS + i as i64 * 1000)
                    .with_altitude(altitude)
                    .with_speed(speed)
            })
            .collect()
    }

    fn replay_session(
        route: Vec<LocationSample>,
    ) -> (TrackingSession<ReplaySource, ManualClock>, ManualClock) {
        let clock = ManualClock::new(route.first().map(|s| s.timestamp_ms).unwrap_or(0));
        let source = ReplaySource::new(route).with_clock(clock.clone());
        let session = TrackingSession::with_clock(source, clock.clone(), &TrackerConfig::default());
        (session, clock)
    }

    /// Test a full day replayed sample by sample
    #[test]
    fn test_ski_day_detects_two_runs() {
        let route = ski_day();
        let snapshots: Rc<RefCell<Vec<LiveStats>>> = Rc::default();
        let sink = Rc::clone(&snapshots);

        let (mut session, _clock) = replay_session(route.clone());
        session
            .start(move |stats| sink.borrow_mut().push(stats.clone()))
            .unwrap();
        assert_eq!(session.pump().unwrap(), route.len());

        let runs = session.runs();
        assert_eq!(runs.len(), 2);
        for run in &runs {
            assert_eq!(run.vertical_drop, 60.0);
            assert_eq!(run.vertical_drop, run.start_altitude - run.end_altitude);
            assert!(run.max_speed >= 8.0);
        }
        assert_eq!(runs[0].start_altitude, 2000.0);
        assert_eq!(runs[1].start_altitude, 2060.0);

        let snapshots = snapshots.borrow();
        assert_eq!(snapshots.len(), route.len());
        for pair in snapshots.windows(2) {
            assert!(pair[1].max_speed >= pair[0].max_speed);
        }
        for stats in snapshots.iter() {
            assert_eq!(stats.vertical, stats.elevation_gain + stats.elevation_loss);
        }

        let last = snapshots.last().unwrap().clone();
        assert_eq!(last.number_of_runs, 2);
        assert_eq!(last.max_altitude, 2060.0);
        assert_eq!(last.min_altitude, 1940.0);
        assert_eq!(last.duration, (route.len() as u64) - 1);

        let outcome = session.stop().unwrap();
        assert_eq!(outcome.session.number_of_runs, 2);
        assert_eq!(outcome.session.runs, runs);
        assert_eq!(outcome.route, route);
        assert_eq!(
            LiveStats {
                duration: last.duration,
                ..outcome.session.stats()
            },
            last
        );
    }

    #[test]
    fn test_replayed_detector_matches_session() {
        let route = ski_day();
        let detector = RunDetector::replay(RunDetectorConfig::default(), &route);

        let (mut session, _clock) = replay_session(route);
        session.start(|_| {}).unwrap();
        session.pump().unwrap();
        let outcome = session.stop().unwrap();

        assert_eq!(detector.runs(), outcome.session.runs.as_slice());
    }

    #[test]
    fn test_descent_open_at_stop_is_recorded() {
        let route = vec![
            LocationSample::new(0.0, 0.0, 0).with_altitude(100.0),
            LocationSample::new(0.0, 0.0001, 1000).with_altitude(97.0),
            LocationSample::new(0.0, 0.0002, 2000).with_altitude(80.0),
        ];
        let (mut session, _clock) = replay_session(route);
        session.start(|_| {}).unwrap();
        session.pump().unwrap();

        assert_eq!(session.last_snapshot().number_of_runs, 0);
        let outcome = session.stop().unwrap();
        assert_eq!(outcome.session.runs.len(), 1);
        assert_eq!(outcome.session.runs[0].vertical_drop, 20.0);
    }

    #[test]
    fn test_two_sample_route_has_no_runs() {
        let route = vec![
            LocationSample::new(0.0, 0.0, 0).with_altitude(100.0),
            LocationSample::new(0.0, 0.0001, 1000).with_altitude(50.0),
        ];
        let (mut session, _clock) = replay_session(route);
        session.start(|_| {}).unwrap();
        session.pump().unwrap();

        let outcome = session.stop().unwrap();
        assert_eq!(outcome.session.number_of_runs, 0);
        assert_eq!(outcome.session.elevation_loss, 50.0);
    }

    #[test]
    fn test_stationary_session() {
        let route = vec![
            LocationSample::new(46.0, 7.0, 0).with_altitude(1800.0),
            LocationSample::new(46.0, 7.0, 10_000).with_altitude(1800.0),
        ];
        let (mut session, _clock) = replay_session(route);
        session.start(|_| {}).unwrap();
        session.pump().unwrap();

        let outcome = session.stop().unwrap();
        assert_eq!(outcome.session.distance, 0.0);
        assert_eq!(outcome.session.average_speed, 0.0);
        assert_eq!(outcome.session.duration, 10);
    }

    #[test]
    fn test_single_sample_is_too_short() {
        let (mut session, _clock) = replay_session(vec![LocationSample::new(46.0, 7.0, 0)]);
        session.start(|_| {}).unwrap();
        session.pump().unwrap();

        let err = session.stop().unwrap_err();
        assert!(matches!(err, TrackerError::SessionTooShort { samples: 1 }));
        assert!(!err.is_retryable());
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_pause_excluded_by_caller() {
        let (mut session, clock) = replay_session(ski_day());
        let mut ledger = PauseLedger::new();
        session.start(|_| {}).unwrap();
        session.pump().unwrap();

        session.pause().unwrap();
        ledger.pause(clock.now_millis());
        clock.advance(120_000);
        assert!(session.ingest(LocationSample::new(46.0, 7.0, clock.now_millis())).is_none());
        ledger.resume(clock.now_millis());
        session.resume().unwrap();

        let outcome = session.stop().unwrap();
        let raw = outcome.session.duration;
        let stored = outcome.session.exclude_paused(ledger.total_ms(clock.now_millis()));
        assert_eq!(raw - stored.duration, 120);
    }

    #[test]
    fn test_stored_session_round_trip() {
        let temp_dir = tempdir().unwrap();
        let mut store = JsonSessionStore::new(temp_dir.path().join("sessions.json"));

        let (mut session, _clock) = replay_session(ski_day());
        session.start(|_| {}).unwrap();
        session.pump().unwrap();
        let outcome = session.stop().unwrap();
        store.save(&outcome.session).unwrap();

        let loaded = store.get(&outcome.session.id).unwrap().unwrap();
        assert_eq!(loaded.runs, outcome.session.runs);
        assert_eq!(loaded.route.len(), outcome.route.len());
        assert_eq!(loaded.number_of_runs, 2);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_csv_track_replay() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("track.csv");
        let mut csv = String::from("time,lat,lon,ele,speed\n");
        for (i, altitude) in [2100.0, 2097.0, 2090.0, 2080.0, 2075.0].iter().enumerate() {
            csv.push_str(&format!(
                "{},46.1,{:.4},{},6.5\n",
                START_MS + i as i64 * 1000,
                7.0 + i as f64 * 0.0002,
                altitude
            ));
        }
        fs::write(&path, csv).unwrap();

        let route = ImportManager::new().import_file(&path).unwrap();
        assert_eq!(route.len(), 5);

        let (mut session, _clock) = replay_session(route);
        session.start(|_| {}).unwrap();
        session.pump().unwrap();
        let outcome = session.stop().unwrap();

        assert_eq!(outcome.session.number_of_runs, 1);
        assert_eq!(outcome.session.runs[0].vertical_drop, 25.0);
        assert_eq!(outcome.session.duration, 4);
    }
}
