//! Great-circle distance on a spherical Earth

use crate::models::LocationSample;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two samples in meters.
///
/// Altitude is ignored; the spherical approximation is accurate to well under
/// one percent at the scales a tracked session covers.
pub fn distance(a: &LocationSample, b: &LocationSample) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    // absolute deltas keep the result bit-identical when a and b are swapped
    let d_phi = (b.latitude - a.latitude).abs().to_radians();
    let d_lambda = (b.longitude - a.longitude).abs().to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Sum of pairwise distances along a sample sequence
pub fn path_length(samples: &[LocationSample]) -> f64 {
    samples.windows(2).map(|pair| distance(&pair[0], &pair[1])).sum()
}
