//! Running elevation totals over a sample stream

use crate::models::LocationSample;

/// Ascent, descent and altitude extrema accumulated from consecutive samples.
///
/// Only pairs of *adjacent* samples that both carry an altitude contribute to
/// gain and loss. A sample without altitude breaks the pair chain but still
/// counts as the predecessor of the next sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElevationAccumulator {
    gain: f64,
    loss: f64,
    current: Option<f64>,
    extrema: Option<(f64, f64)>,
    previous: Option<f64>,
}

impl ElevationAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute totals for a whole sample sequence
    pub fn from_samples(samples: &[LocationSample]) -> Self {
        let mut accumulator = Self::new();
        for sample in samples {
            accumulator.push(sample);
        }
        accumulator
    }

    /// Advance by one sample
    pub fn push(&mut self, sample: &LocationSample) {
        if let (Some(prev), Some(curr)) = (self.previous, sample.altitude) {
            let diff = curr - prev;
            if diff > 0.0 {
                self.gain += diff;
            } else {
                self.loss += diff.abs();
            }
        }

        if let Some(altitude) = sample.altitude {
            self.current = Some(altitude);
            self.extrema = Some(match self.extrema {
                Some((min, max)) => (min.min(altitude), max.max(altitude)),
                None => (altitude, altitude),
            });
        }

        self.previous = sample.altitude;
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn loss(&self) -> f64 {
        self.loss
    }

    /// Total elevation change (gain plus loss)
    pub fn vertical(&self) -> f64 {
        self.gain + self.loss
    }

    /// Most recent defined altitude, 0 if none seen
    pub fn current_altitude(&self) -> f64 {
        self.current.unwrap_or(0.0)
    }

    pub fn max_altitude(&self) -> f64 {
        self.extrema.map(|(_, max)| max).unwrap_or(0.0)
    }

    pub fn min_altitude(&self) -> f64 {
        self.extrema.map(|(min, _)| min).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(altitude: Option<f64>) -> LocationSample {
        LocationSample {
            latitude: 0.0,
            longitude: 0.0,
            altitude,
            timestamp_ms: 0,
            speed: None,
        }
    }

    #[test]
    fn test_empty_is_zero() {
        let acc = ElevationAccumulator::new();
        assert_eq!(acc.gain(), 0.0);
        assert_eq!(acc.loss(), 0.0);
        assert_eq!(acc.current_altitude(), 0.0);
        assert_eq!(acc.max_altitude(), 0.0);
        assert_eq!(acc.min_altitude(), 0.0);
    }

    #[test]
    fn test_gain_and_loss() {
        let route: Vec<_> = [100.0, 110.0, 105.0, 120.0, 90.0]
            .iter()
            .map(|&a| sample(Some(a)))
            .collect();
        let acc = ElevationAccumulator::from_samples(&route);

        assert_eq!(acc.gain(), 25.0);
        assert_eq!(acc.loss(), 35.0);
        assert_eq!(acc.vertical(), 60.0);
        assert_eq!(acc.current_altitude(), 90.0);
        assert_eq!(acc.max_altitude(), 120.0);
        assert_eq!(acc.min_altitude(), 90.0);
    }

    #[test]
    fn test_missing_altitude_breaks_pair() {
        let route = vec![sample(Some(100.0)), sample(None), sample(Some(150.0)), sample(Some(140.0))];
        let acc = ElevationAccumulator::from_samples(&route);

        // 100 -> None and None -> 150 are skipped
        assert_eq!(acc.gain(), 0.0);
        assert_eq!(acc.loss(), 10.0);
        assert_eq!(acc.max_altitude(), 150.0);
        assert_eq!(acc.min_altitude(), 100.0);
    }

    #[test]
    fn test_current_altitude_keeps_last_defined() {
        let route = vec![sample(Some(2000.0)), sample(Some(1990.0)), sample(None)];
        let acc = ElevationAccumulator::from_samples(&route);
        assert_eq!(acc.current_altitude(), 1990.0);
    }

    #[test]
    fn test_no_altitude_at_all() {
        let route = vec![sample(None), sample(None)];
        let acc = ElevationAccumulator::from_samples(&route);
        assert_eq!(acc.vertical(), 0.0);
        assert_eq!(acc.max_altitude(), 0.0);
        assert_eq!(acc.min_altitude(), 0.0);
    }

    proptest! {
        #[test]
        fn test_vertical_is_gain_plus_loss(
            altitudes in proptest::collection::vec(proptest::option::of(-100.0f64..4000.0), 0..200)
        ) {
            let route: Vec<_> = altitudes.into_iter().map(sample).collect();
            let acc = ElevationAccumulator::from_samples(&route);
            prop_assert_eq!(acc.vertical(), acc.gain() + acc.loss());
            prop_assert!(acc.gain() >= 0.0);
            prop_assert!(acc.loss() >= 0.0);
            prop_assert!(acc.min_altitude() <= acc.max_altitude());
        }
    }
}
