//! Test data generators for GRIB fixtures.
//!
//! Fixtures are JSON-lines files in the format read by
//! [`JsonCodes`](gribmanager::codes::json::JsonCodes): one JSON object of
//! GRIB keys per line.

use serde_json::{json, Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Geometry of a regular lat/lon fixture grid
#[derive(Debug, Clone, Copy)]
pub struct GridSpec {
    pub lat0: f64,
    pub lon0: f64,
    /// Signed latitude step, negative when scanning southwards
    pub d_lat: f64,
    /// Signed longitude step, negative when scanning westwards
    pub d_lon: f64,
    pub n_lat: usize,
    pub n_lon: usize,
    pub lat_major: bool,
}

impl GridSpec {
    pub fn lat(&self, i: usize) -> f64 {
        self.lat0 + i as f64 * self.d_lat
    }

    pub fn lon(&self, j: usize) -> f64 {
        self.lon0 + j as f64 * self.d_lon
    }

    pub fn flat_index(&self, i: usize, j: usize) -> usize {
        if self.lat_major {
            i * self.n_lon + j
        } else {
            j * self.n_lat + i
        }
    }
}

/// A 2.5 x 5 degree grid over Europe, scanning southwards
pub fn europe() -> GridSpec {
    GridSpec {
        lat0: 70.0,
        lon0: -10.0,
        d_lat: -2.5,
        d_lon: 5.0,
        n_lat: 13,
        n_lon: 9,
        lat_major: true,
    }
}

/// A 30 degree global grid whose longitudes wrap around
pub fn global() -> GridSpec {
    GridSpec {
        lat0: 90.0,
        lon0: 0.0,
        d_lat: -30.0,
        d_lon: 30.0,
        n_lat: 7,
        n_lon: 12,
        lat_major: true,
    }
}

/// A 0.1 degree grid whose coordinates are not exact in binary
pub fn fine() -> GridSpec {
    GridSpec {
        lat0: 10.0,
        lon0: 0.0,
        d_lat: -0.1,
        d_lon: 0.1,
        n_lat: 21,
        n_lon: 31,
        lat_major: true,
    }
}

/// Every scanning mode combination over a small regional grid
pub fn scanning_variants() -> Vec<GridSpec> {
    let mut variants = Vec::new();
    for &(lat0, d_lat) in &[(40.0, -5.0), (20.0, 5.0)] {
        for &(lon0, d_lon) in &[(10.0, 10.0), (50.0, -10.0)] {
            for &lat_major in &[true, false] {
                variants.push(GridSpec {
                    lat0,
                    lon0,
                    d_lat,
                    d_lon,
                    n_lat: 5,
                    n_lon: 5,
                    lat_major,
                });
            }
        }
    }
    variants
}

/// A field that bilinear interpolation reproduces exactly
pub fn linear_field(lat: f64, lon: f64) -> f64 {
    2.0 * lat + 0.5 * lon
}

/// A field that only depends on the position modulo the globe
pub fn periodic_field(lat: f64, lon: f64) -> f64 {
    100.0 * lat + lon.rem_euclid(360.0)
}

/// Header keys of an isobaric temperature field
pub fn temperature_header(level: i64) -> Map<String, Value> {
    header(130, "t", "Temperature", "K", level)
}

/// Header keys of an isobaric field
pub fn header(param_id: i64, short_name: &str, name: &str, units: &str, level: i64) -> Map<String, Value> {
    let value = json!({
        "class": "od",
        "stream": "oper",
        "type": "an",
        "centre": "ecmf",
        "centreDescription": "European Centre for Medium-Range Weather Forecasts",
        "paramId": param_id,
        "shortName": short_name,
        "name": name,
        "units": units,
        "dataDate": 20240115,
        "dataTime": 1200,
        "step": 0,
        "typeOfLevel": "isobaricInhPa",
        "level": level,
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// A full message: `header` plus the geometry of `spec` and values sampled from `field`
pub fn grid_message(spec: &GridSpec, header: Map<String, Value>, field: impl Fn(f64, f64) -> f64) -> Value {
    let mut values = vec![0.0; spec.n_lat * spec.n_lon];
    for i in 0..spec.n_lat {
        for j in 0..spec.n_lon {
            values[spec.flat_index(i, j)] = field(spec.lat(i), spec.lon(j));
        }
    }

    let mut message = header;
    let geometry = json!({
        "gridType": "regular_ll",
        "packingType": "grid_simple",
        "Ni": spec.n_lon,
        "Nj": spec.n_lat,
        "latitudeOfFirstGridPointInDegrees": spec.lat0,
        "longitudeOfFirstGridPointInDegrees": spec.lon0,
        "latitudeOfLastGridPointInDegrees": spec.lat(spec.n_lat - 1),
        "longitudeOfLastGridPointInDegrees": spec.lon(spec.n_lon - 1),
        "jDirectionIncrementInDegrees": spec.d_lat.abs(),
        "iDirectionIncrementInDegrees": spec.d_lon.abs(),
        "jScansPositively": if spec.d_lat > 0.0 { 1 } else { 0 },
        "iScansNegatively": if spec.d_lon < 0.0 { 1 } else { 0 },
        "jPointsAreConsecutive": if spec.lat_major { 0 } else { 1 },
        "values": values,
    });
    if let Value::Object(geometry) = geometry {
        message.extend(geometry);
    }
    Value::Object(message)
}

/// Write one message per line
pub fn write_messages(path: &Path, messages: &[Value]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for message in messages {
        writeln!(file, "{}", message)?;
    }
    Ok(())
}

/// Temperature at 500 and 850 hPa and wind at 850 hPa over [`europe`],
/// in that order
pub fn pressure_level_messages() -> Vec<Value> {
    let grid = europe();
    vec![
        grid_message(&grid, temperature_header(500), |lat, lon| 250.0 + linear_field(lat, lon)),
        grid_message(&grid, temperature_header(850), |lat, lon| 270.0 + linear_field(lat, lon)),
        grid_message(&grid, header(131, "u", "U component of wind", "m s**-1", 850), linear_field),
    ]
}

/// Temperature at three pressure levels, all matching `shortName=t`
pub fn temperature_profile_messages() -> Vec<Value> {
    let grid = europe();
    [500, 700, 850]
        .iter()
        .map(|&level| grid_message(&grid, temperature_header(level), linear_field))
        .collect()
}

/// Create a temporary directory holding `name` with `messages` in it
pub fn create_grib_file(name: &str, messages: &[Value]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join(name);
    write_messages(&path, messages).expect("Failed to write GRIB fixture");
    (dir, path)
}

/// Create a temporary file with the [`pressure_level_messages`]
pub fn create_pressure_level_file() -> (TempDir, PathBuf) {
    create_grib_file("pressure_levels.grib", &pressure_level_messages())
}
