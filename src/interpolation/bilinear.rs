//! Bilinear interpolation.
//!
//! Interpolates first along latitude inside each column of the enclosing
//! cell, then along longitude between the two column results.

use super::common::{interpolate_longitude, midpoint};
use super::nearest::FourPoints;
use crate::error::{GribError, Result};

/// Interpolate at `(lat, lon)` from the four surrounding points.
///
/// `value` reads the field at a flat index.
pub fn interpolate<F>(lat: f64, lon: f64, points: &FourPoints, value: F) -> Result<f64>
where
    F: Fn(usize) -> Result<f64>,
{
    let ((a, b), (c, d)) = points;
    if a.lat == c.lat {
        return Err(GribError::Interpolation {
            message: format!(
                "four nearest points around ({}, {}) lie on a single latitude {}",
                lat, lon, a.lat
            ),
        });
    }

    let p = (lat - a.lat).abs() / (c.lat - a.lat).abs();
    let v_ac = midpoint(value(a.index)?, value(c.index)?, p);
    let v_bd = midpoint(value(b.index)?, value(d.index)?, p);

    Ok(interpolate_longitude(lon, (a.lon, v_ac), (b.lon, v_bd)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::nearest::{group_by_latitude, GridPoint};

    fn cell() -> FourPoints {
        let point = |lat, lon, index| GridPoint { lat, lon, index };
        group_by_latitude([
            point(10.0, 0.0, 0),
            point(10.0, 10.0, 1),
            point(0.0, 0.0, 2),
            point(0.0, 10.0, 3),
        ])
    }

    fn field(index: usize) -> Result<f64> {
        Ok([1.0, 2.0, 3.0, 4.0][index])
    }

    #[test]
    fn test_exact_at_corners() {
        let points = cell();
        assert_eq!(interpolate(10.0, 0.0, &points, field).unwrap(), 1.0);
        assert_eq!(interpolate(10.0, 10.0, &points, field).unwrap(), 2.0);
        assert_eq!(interpolate(0.0, 0.0, &points, field).unwrap(), 3.0);
        assert_eq!(interpolate(0.0, 10.0, &points, field).unwrap(), 4.0);
    }

    #[test]
    fn test_cell_centre() {
        let value = interpolate(5.0, 5.0, &cell(), field).unwrap();
        assert!((value - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_latitude_then_longitude() {
        // 3/4 of the way north, 1/5 of the way east
        let value = interpolate(7.5, 2.0, &cell(), field).unwrap();
        let west = 0.25 * 3.0 + 0.75 * 1.0;
        let east = 0.25 * 4.0 + 0.75 * 2.0;
        let expected = 0.8 * west + 0.2 * east;
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn test_single_latitude_is_rejected() {
        let point = |lon, index| GridPoint {
            lat: 5.0,
            lon,
            index,
        };
        let points = group_by_latitude([point(0.0, 0), point(10.0, 1), point(0.0, 2), point(10.0, 3)]);
        let err = interpolate(5.0, 5.0, &points, field).unwrap_err();
        assert!(matches!(err, GribError::Interpolation { .. }));
    }

    #[test]
    fn test_value_errors_propagate() {
        let err = interpolate(5.0, 5.0, &cell(), |_| {
            Err(GribError::ResourceReleased {
                kind: "GRIB message",
            })
        })
        .unwrap_err();
        assert!(matches!(err, GribError::ResourceReleased { .. }));
    }
}
