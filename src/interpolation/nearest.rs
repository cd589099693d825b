//! The four grid points surrounding a query coordinate.
//!
//! Points come either from the grid descriptor, computed directly, or from
//! the decoding library's own nearest-point search. Both are normalised into
//! the same [`FourPoints`] shape: two latitude bands of two points each, the
//! lower band first.

use serde::Serialize;
use std::cmp::Ordering;

use crate::codes::NearestPoint;
use crate::error::{GribError, Result};
use crate::grid::GridDescriptor;

const EPS: f64 = 1e-9;

/// One grid point and its position in the message's values array
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridPoint {
    pub lat: f64,
    pub lon: f64,
    pub index: usize,
}

/// `((a, b), (c, d))` with `a`, `b` on the lower latitude band.
pub type FourPoints = ((GridPoint, GridPoint), (GridPoint, GridPoint));

/// Stable-sort four points by latitude and group them into bands.
pub fn group_by_latitude(mut points: [GridPoint; 4]) -> FourPoints {
    points.sort_by(|p, q| p.lat.partial_cmp(&q.lat).unwrap_or(Ordering::Equal));
    let [a, b, c, d] = points;
    ((a, b), (c, d))
}

/// Flat indices of the four points, sorted, for order-independent comparison.
pub fn index_set(points: &FourPoints) -> Vec<usize> {
    let ((a, b), (c, d)) = points;
    let mut indices = vec![a.index, b.index, c.index, d.index];
    indices.sort_unstable();
    indices
}

/// Convert the decoding library's answer.
pub fn from_library(points: Vec<NearestPoint>) -> Result<FourPoints> {
    let count = points.len();
    let points: [NearestPoint; 4] = points.try_into().map_err(|_| GribError::Interpolation {
        message: format!("expected 4 nearest points from the decoding library, got {}", count),
    })?;
    Ok(group_by_latitude(points.map(|p| GridPoint {
        lat: p.lat,
        lon: p.lon,
        index: p.index,
    })))
}

/// Rows `(i0, i0 + 1)` bracketing `lat`.
fn bracket_rows(grid: &GridDescriptor, lat: f64) -> Option<(usize, usize)> {
    let x = (lat - grid.lat0) / grid.d_lat;
    let last = (grid.n_lat - 1) as f64;
    if !(x >= -EPS && x <= last + EPS) {
        return None;
    }
    let i0 = ((x + EPS).floor().max(0.0) as usize).min(grid.n_lat - 2);
    Some((i0, i0 + 1))
}

/// Columns bracketing `lon`, walking in the scanning direction.
fn bracket_columns(grid: &GridDescriptor, lon: f64) -> Option<(usize, usize)> {
    let n = grid.n_lon;
    let mut offset = ((lon - grid.lon0) * grid.d_lon.signum()).rem_euclid(360.0);
    if offset > 360.0 - EPS {
        offset = 0.0;
    }
    let y = offset / grid.d_lon.abs();
    let j0 = ((y + EPS).floor() as usize).min(n - 1);

    if grid.is_lon_circular() {
        return Some(if j0 == n - 1 { (n - 1, 0) } else { (j0, j0 + 1) });
    }
    if y > (n - 1) as f64 + EPS {
        return None;
    }
    let j0 = j0.min(n - 2);
    Some((j0, j0 + 1))
}

/// The four points around `(lat, lon)` computed from the grid geometry.
///
/// Points are produced row by row, `(i0, j0), (i0, j1), (i1, j0), (i1, j1)`,
/// before being grouped by latitude.
pub fn four_nearest_points(grid: &GridDescriptor, lat: f64, lon: f64) -> Result<FourPoints> {
    let (i0, i1) = bracket_rows(grid, lat).ok_or(GribError::OutOfGrid { lat, lon })?;
    let (j0, j1) = bracket_columns(grid, lon).ok_or(GribError::OutOfGrid { lat, lon })?;

    let point = |i: usize, j: usize| GridPoint {
        lat: grid.lat0 + i as f64 * grid.d_lat,
        lon: grid.lon0 + j as f64 * grid.d_lon,
        index: grid.flat_index(i, j),
    };
    Ok(group_by_latitude([
        point(i0, j0),
        point(i0, j1),
        point(i1, j0),
        point(i1, j1),
    ]))
}
