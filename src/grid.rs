//! Regular lat/lon grid geometry.
//!
//! A [`GridDescriptor`] is reconstructed from a message's header keys and
//! validated before use. It drives the fast nearest-point lookup and the
//! export of a message's values as a latitude-major 2D array.

use ndarray::{concatenate, s, Array1, Array2, Axis};
use serde::Serialize;

use crate::error::{GribError, Result};
use crate::grib_keys as gk;
use crate::interpolation::common::normalize_longitude;
use crate::message::GribMessage;

/// Tolerance used for all grid consistency checks
pub const GRID_TOLERANCE: f64 = 1e-4;

/// Geometry of a regular lat/lon grid as encoded in the message.
///
/// Spacings are signed: `d_lat` is negative when rows scan southwards and
/// `d_lon` is negative when columns scan westwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridDescriptor {
    pub lat0: f64,
    pub lon0: f64,
    pub lat1: f64,
    pub lon1: f64,
    pub d_lat: f64,
    pub d_lon: f64,
    pub n_lat: usize,
    pub n_lon: usize,
    /// Whether consecutive values run along longitude (rows of constant latitude)
    pub lat_major: bool,
}

/// True when `value` is within tolerance of a multiple of 360.
fn is_multiple_of_360(value: f64) -> bool {
    let r = value.rem_euclid(360.0);
    r.abs() <= GRID_TOLERANCE || (r - 360.0).abs() <= GRID_TOLERANCE
}

impl GridDescriptor {
    /// Build a descriptor, checking that counts, spacing and end points agree.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lat0: f64,
        lon0: f64,
        lat1: f64,
        lon1: f64,
        d_lat: f64,
        d_lon: f64,
        n_lat: usize,
        n_lon: usize,
        lat_major: bool,
    ) -> Result<Self> {
        if n_lat <= 1 {
            return Err(GribError::GridGeometry {
                message: format!("size of latitude grid must be >= 2; got {}", n_lat),
            });
        }
        if n_lon <= 1 {
            return Err(GribError::GridGeometry {
                message: format!("size of longitude grid must be >= 2; got {}", n_lon),
            });
        }
        if d_lat == 0.0 || d_lon == 0.0 {
            return Err(GribError::GridGeometry {
                message: format!(
                    "grid spacing must be non-zero; got d_lat={}, d_lon={}",
                    d_lat, d_lon
                ),
            });
        }
        if (lat0 + (n_lat - 1) as f64 * d_lat - lat1).abs() > GRID_TOLERANCE {
            return Err(GribError::GridGeometry {
                message: format!(
                    "latitude grid spacing, size and first and last point are not consistent: \
                     got lat0={}, lat1={}, d_lat={}, n_lat={}",
                    lat0, lat1, d_lat, n_lat
                ),
            });
        }
        if !is_multiple_of_360(lon0 + (n_lon - 1) as f64 * d_lon - lon1) {
            return Err(GribError::GridGeometry {
                message: format!(
                    "longitude grid spacing, size and first and last point are not consistent: \
                     got lon0={}, lon1={}, d_lon={}, n_lon={}",
                    lon0, lon1, d_lon, n_lon
                ),
            });
        }

        Ok(Self {
            lat0,
            lon0,
            lat1,
            lon1,
            d_lat,
            d_lon,
            n_lat,
            n_lon,
            lat_major,
        })
    }

    /// Derive the descriptor of a message.
    ///
    /// Returns `None` unless the message carries values with simple packing
    /// on a regular lat/lon grid.
    pub fn from_message(message: &GribMessage) -> Result<Option<Self>> {
        if !message.contains(gk::VALUES)?
            || message.get_string(gk::PACKING_TYPE)?.as_deref() != Some(gk::PACKING_TYPE_GRID_SIMPLE)
            || message.get_string(gk::GRID_TYPE)?.as_deref() != Some(gk::GRID_TYPE_REGULAR_LL)
        {
            return Ok(None);
        }

        let lat0 = message.get_f64(gk::LATITUDE_OF_FIRST_GRID_POINT)?;
        let lon0 = message.get_f64(gk::LONGITUDE_OF_FIRST_GRID_POINT)?;
        let lat1 = message.get_f64(gk::LATITUDE_OF_LAST_GRID_POINT)?;
        let lon1 = message.get_f64(gk::LONGITUDE_OF_LAST_GRID_POINT)?;
        let d_lat = message.get_f64(gk::DELTA_LATITUDE)?.abs()
            * if message.get_flag(gk::DELTA_LATITUDE_POSITIVE)? {
                1.0
            } else {
                -1.0
            };
        let d_lon = message.get_f64(gk::DELTA_LONGITUDE)?.abs()
            * if message.get_flag(gk::DELTA_LONGITUDE_NEGATIVE)? {
                -1.0
            } else {
                1.0
            };
        let lat_major = !message.get_flag(gk::LATITUDE_MINOR_LONGITUDE_MAJOR)?;
        let n_lat = count(gk::NO_LATITUDES, message.get_i64(gk::NO_LATITUDES)?)?;
        let n_lon = count(gk::NO_LONGITUDES, message.get_i64(gk::NO_LONGITUDES)?)?;

        Self::new(lat0, lon0, lat1, lon1, d_lat, d_lon, n_lat, n_lon, lat_major).map(Some)
    }

    /// Whether the longitudes wrap all the way around the globe.
    pub fn is_lon_circular(&self) -> bool {
        is_multiple_of_360(self.n_lon as f64 * self.d_lon)
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.n_lat * self.n_lon
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position in the values array of row `i` (latitude) and column `j`.
    pub fn flat_index(&self, i: usize, j: usize) -> usize {
        if self.lat_major {
            i * self.n_lon + j
        } else {
            j * self.n_lat + i
        }
    }
}

fn count(key: &str, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| GribError::GridGeometry {
        message: format!("{} must be non-negative; got {}", key, value),
    })
}

/// A message's values laid out on increasing latitude and longitude axes.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredGrid {
    /// Values indexed `[lat, lon]`
    pub values: Array2<f64>,
    /// Strictly increasing latitudes
    pub latitudes: Array1<f64>,
    /// Strictly increasing longitudes, starting in `[-180, 180)`
    pub longitudes: Array1<f64>,
}

/// Arrange raw values into a latitude-major array with increasing axes.
///
/// Circular grids get one extra longitude column, a copy of the first one, so
/// that interpolation across the seam needs no special casing.
pub fn to_structured_grid(grid: &GridDescriptor, values: Vec<f64>) -> Result<StructuredGrid> {
    if values.len() != grid.len() {
        return Err(GribError::GridGeometry {
            message: format!(
                "expected {} values for a {}x{} grid, got {}",
                grid.len(),
                grid.n_lat,
                grid.n_lon,
                values.len()
            ),
        });
    }

    let GridDescriptor {
        mut lat0,
        mut lat1,
        mut d_lat,
        mut lon0,
        mut lon1,
        mut d_lon,
        n_lat,
        mut n_lon,
        lat_major,
    } = *grid;

    let shape = if lat_major { (n_lat, n_lon) } else { (n_lon, n_lat) };
    let mut data = Array2::from_shape_vec(shape, values).map_err(|e| GribError::GridGeometry {
        message: format!("cannot shape values as {:?}: {}", shape, e),
    })?;

    if !lat_major {
        data = data.reversed_axes();
    }

    if d_lat < 0.0 {
        std::mem::swap(&mut lat0, &mut lat1);
        d_lat = -d_lat;
        data = data.slice(s![..;-1, ..]).to_owned();
    }
    if d_lon < 0.0 {
        std::mem::swap(&mut lon0, &mut lon1);
        d_lon = -d_lon;
        data = data.slice(s![.., ..;-1]).to_owned();
    }

    if is_multiple_of_360(n_lon as f64 * d_lon) {
        n_lon += 1;
        lon1 += d_lon;
        data = concatenate(Axis(1), &[data.view(), data.slice(s![.., 0..1])]).map_err(|e| {
            GribError::GridGeometry {
                message: format!("cannot wrap longitude axis: {}", e),
            }
        })?;
    }

    let latitudes = Array1::linspace(lat0, lat1, n_lat);
    let lon0 = normalize_longitude(lon0);
    let longitudes = Array1::linspace(lon0, lon0 + (n_lon - 1) as f64 * d_lon, n_lon);
    tracing::trace!(lat0, lat1, d_lat, lon0, lon1, n_lon, "built structured grid");

    Ok(StructuredGrid {
        values: data.as_standard_layout().into_owned(),
        latitudes,
        longitudes,
    })
}
