//! Common utilities for interpolation algorithms.
//!
//! Longitudes live on a circle, so every difference between two of them is
//! taken along the shortest arc.

/// Linear blend of `x` and `y`; exact at `p == 0` and `p == 1`.
pub fn midpoint(x: f64, y: f64, p: f64) -> f64 {
    (1.0 - p) * x + p * y
}

/// Get the weights for linear interpolation
pub fn linear_weight(fraction: f64) -> (f64, f64) {
    (1.0 - fraction, fraction)
}

/// Signed shortest angular distance from `from` to `to`, in `[-180, 180)`.
pub fn longitude_difference(from: f64, to: f64) -> f64 {
    (to - from + 180.0).rem_euclid(360.0) - 180.0
}

/// Map a longitude into `[-180, 180)`.
pub fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Interpolate linearly along longitude between two samples.
///
/// When both samples sit on the same meridian the first value is returned.
pub fn interpolate_longitude(lon: f64, (lon_a, v_a): (f64, f64), (lon_b, v_b): (f64, f64)) -> f64 {
    let span = longitude_difference(lon_a, lon_b);
    if span == 0.0 {
        return v_a;
    }
    let (w_a, w_b) = linear_weight(longitude_difference(lon_a, lon) / span);
    if w_b == 0.0 {
        v_a
    } else if w_a == 0.0 {
        v_b
    } else {
        w_a * v_a + w_b * v_b
    }
}
