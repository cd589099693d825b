//! Dictionary-like access to a single decoded GRIB message.
//!
//! A [`GribMessage`] owns one native message handle. Values are read through
//! the decoding library on demand, optionally memoised per key, and regular
//! lat/lon messages additionally carry a [`GridDescriptor`] that enables fast
//! nearest-point lookup and bilinear interpolation.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::codes::{expect_f64, expect_i64, CodesApi, KeyValue, MessageId};
use crate::error::{GribError, Result};
use crate::file::SourceStream;
use crate::grib_keys as gk;
use crate::grid::{to_structured_grid, GridDescriptor, StructuredGrid};
use crate::handle::{GribItem, MessageKind, NativeHandle};
use crate::interpolation::{bilinear, nearest, FourPoints};
use crate::key_iterator::KeyIterator;
use crate::metadata::MessageMetadata;

/// Result of looking a key up in a message
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Present(KeyValue),
    /// The key is defined but its value is flagged MISSING
    Missing(KeyValue),
    Absent,
}

impl Lookup {
    /// The value, if the key is defined at all.
    pub fn value(self) -> Option<KeyValue> {
        match self {
            Lookup::Present(v) | Lookup::Missing(v) => Some(v),
            Lookup::Absent => None,
        }
    }
}

/// Per-message value caching strategy, chosen when the message is created.
#[derive(Debug)]
pub enum ValueCache {
    Disabled,
    Memo(Mutex<HashMap<String, Lookup>>),
}

impl ValueCache {
    pub fn new(enabled: bool) -> Self {
        if enabled {
            ValueCache::Memo(Mutex::new(HashMap::new()))
        } else {
            ValueCache::Disabled
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, ValueCache::Memo(_))
    }
}

/// Where a message came from.
#[derive(Debug, Clone)]
pub enum Origin {
    /// Decoded from an open file; keeps the file's stream alive
    Stream(Arc<SourceStream>),
    /// Produced by an index built over `path`
    Index { path: PathBuf },
}

impl Origin {
    pub fn path(&self) -> &Path {
        match self {
            Origin::Stream(stream) => stream.path(),
            Origin::Index { path } => path,
        }
    }
}

/// How [`GribMessage::four_nearest_points`] finds the surrounding points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NearestMode {
    /// Grid descriptor when available, decoding library otherwise
    #[default]
    Auto,
    /// Both, failing when they disagree on the set of points
    CrossCheck,
    /// Always ask the decoding library
    Library,
}

/// One decoded GRIB message.
///
/// Read access takes `&self` and a message may be shared between threads.
/// Calls into the decoding library on this message's handle are serialised
/// by a per-message lock, so the library never sees concurrent calls on one
/// handle.
pub struct GribMessage {
    handle: NativeHandle<MessageKind>,
    library: Mutex<()>,
    origin: Origin,
    grid: Option<GridDescriptor>,
    values: OnceCell<Vec<f64>>,
    cache: ValueCache,
}

impl GribMessage {
    /// Wrap a freshly decoded message id.
    ///
    /// The handle is owned from the first line on, so a failure while deriving
    /// the grid still releases it.
    pub(crate) fn new(
        codes: Arc<dyn CodesApi>,
        id: MessageId,
        origin: Origin,
        headers_only: bool,
        cache: bool,
    ) -> Result<Self> {
        let mut message = Self {
            handle: NativeHandle::new(codes, id),
            library: Mutex::new(()),
            origin,
            grid: None,
            values: OnceCell::new(),
            cache: ValueCache::new(cache),
        };
        if !headers_only {
            message.grid = GridDescriptor::from_message(&message)?;
        }
        debug!(
            id = ?id,
            origin = %message.origin.path().display(),
            fast_access = message.grid.is_some(),
            "initialized GRIB message"
        );
        Ok(message)
    }

    pub(crate) fn handle(&self) -> &NativeHandle<MessageKind> {
        &self.handle
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The regular grid geometry, when fast gridded access is available.
    pub fn grid(&self) -> Option<&GridDescriptor> {
        self.grid.as_ref()
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_enabled()
    }

    /// Run `f` against the decoding library while holding this message's lock.
    pub(crate) fn with_library<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&dyn CodesApi, MessageId) -> Result<R>,
    {
        let _guard = self.library.lock();
        let id = self.handle.id()?;
        f(self.handle.codes(), id)
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        self.with_library(|codes, id| codes.is_defined(id, key))
    }

    /// Look `key` up, distinguishing MISSING values from absent keys.
    pub fn lookup(&self, key: &str) -> Result<Lookup> {
        self.handle.id()?;
        if let ValueCache::Memo(memo) = &self.cache {
            if let Some(hit) = memo.lock().get(key) {
                return Ok(hit.clone());
            }
        }

        let found = self.with_library(|codes, id| {
            if !codes.is_defined(id, key)? {
                return Ok(Lookup::Absent);
            }
            let value = if codes.size(id, key)? > 1 {
                codes.get_array(id, key)?
            } else {
                codes.get_scalar(id, key)?
            };
            Ok(if codes.is_missing(id, key)? {
                Lookup::Missing(value)
            } else {
                Lookup::Present(value)
            })
        })?;
        if matches!(found, Lookup::Absent) {
            return Ok(found);
        }

        if let ValueCache::Memo(memo) = &self.cache {
            memo.lock().insert(key.to_string(), found.clone());
        }
        Ok(found)
    }

    /// The value of `key`; `KeyNotFound` when it is not defined.
    ///
    /// MISSING values are returned as decoded, with a warning.
    pub fn get(&self, key: &str) -> Result<KeyValue> {
        self.get_optional(key)?.ok_or_else(|| GribError::KeyNotFound {
            message: format!("GRIB message does not contain key={}: {}", key, self),
        })
    }

    /// Like [`get`](Self::get) but `None` for an absent key.
    pub fn get_optional(&self, key: &str) -> Result<Option<KeyValue>> {
        match self.lookup(key)? {
            Lookup::Present(value) => Ok(Some(value)),
            Lookup::Missing(value) => {
                warn!(key, grib = %self, "key has value MISSING in the GRIB message");
                Ok(Some(value))
            }
            Lookup::Absent => Ok(None),
        }
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        expect_f64(key, &self.get(key)?)
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        expect_i64(key, &self.get(key)?)
    }

    /// A string-valued key; `None` when absent.
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_optional(key)?.map(|v| v.to_string()))
    }

    /// Scanning-mode style flag; an absent key reads as `false`.
    pub fn get_flag(&self, key: &str) -> Result<bool> {
        match self.get_optional(key)? {
            Some(value) => value.as_flag().ok_or_else(|| GribError::UnexpectedKeyType {
                key: key.to_string(),
                expected: "flag",
            }),
            None => Ok(false),
        }
    }

    pub fn get_metadata(&self) -> Result<MessageMetadata> {
        MessageMetadata::from_message(self)
    }

    /// The four grid points around `(lat, lon)` as `((a, b), (c, d))`,
    /// `a` and `b` on the lower latitude.
    pub fn four_nearest_points(&self, lat: f64, lon: f64, mode: NearestMode) -> Result<FourPoints> {
        let grid = match (mode, &self.grid) {
            (NearestMode::Library, _) | (_, None) => return self.library_nearest_points(lat, lon),
            (_, Some(grid)) => grid,
        };
        // Reject use after close on the fast path as well
        self.handle.id()?;
        let points = nearest::four_nearest_points(grid, lat, lon)?;

        if mode == NearestMode::CrossCheck {
            let library = self.library_nearest_points(lat, lon)?;
            let (grid_set, library_set) = (nearest::index_set(&points), nearest::index_set(&library));
            if grid_set != library_set {
                return Err(GribError::NearestPointMismatch {
                    lat,
                    lon,
                    grid: grid_set,
                    library: library_set,
                });
            }
        }
        Ok(points)
    }

    fn library_nearest_points(&self, lat: f64, lon: f64) -> Result<FourPoints> {
        let points = self.with_library(|codes, id| codes.find_nearest(id, lat, lon, 4))?;
        nearest::from_library(points)
    }

    /// Bilinearly interpolated field value at `(lat, lon)`.
    pub fn value_at(&self, lat: f64, lon: f64) -> Result<f64> {
        let points = self.four_nearest_points(lat, lon, NearestMode::Auto)?;
        bilinear::interpolate(lat, lon, &points, |index| self.value_by_index(index))
    }

    /// The `index`-th entry of the `values` array.
    ///
    /// The array is decoded on first use and kept for the message's lifetime.
    pub fn value_by_index(&self, index: usize) -> Result<f64> {
        self.handle.id()?;
        let values = self.values.get_or_try_init(|| self.decode_values())?;
        values.get(index).copied().ok_or_else(|| GribError::Interpolation {
            message: format!("value index {} out of range for {} values", index, values.len()),
        })
    }

    fn decode_values(&self) -> Result<Vec<f64>> {
        self.get(gk::VALUES)?
            .to_f64_vec()
            .ok_or_else(|| GribError::UnexpectedKeyType {
                key: gk::VALUES.to_string(),
                expected: "numeric array",
            })
    }

    /// The values on increasing latitude and longitude axes, or `None` when
    /// the message has no regular lat/lon grid.
    pub fn to_structured_array(&self) -> Result<Option<StructuredGrid>> {
        let grid = match GridDescriptor::from_message(self)? {
            Some(grid) => grid,
            None => return Ok(None),
        };
        let values = match self.values.get() {
            Some(values) => values.clone(),
            None => self.decode_values()?,
        };
        to_structured_grid(&grid, values).map(Some)
    }

    fn type_of_level(&self) -> Result<Option<String>> {
        self.get_string(gk::TYPE_OF_LEVEL)
    }

    pub fn is_level_hybrid(&self) -> Result<bool> {
        Ok(self.contains(gk::LEVEL)?
            && self.type_of_level()?.as_deref() == Some(gk::HYBRID_LEVEL_TYPE)
            && self.contains(gk::PV)?)
    }

    pub fn is_level_isobaric(&self) -> Result<bool> {
        Ok(self.contains(gk::LEVEL)?
            && matches!(
                self.type_of_level()?.as_deref(),
                Some(gk::ISOBARIC_IN_HPA_LEVEL_TYPE) | Some(gk::ISOBARIC_IN_PA_LEVEL_TYPE)
            ))
    }

    pub fn is_level_surface(&self) -> Result<bool> {
        Ok(self.type_of_level()?.as_deref() == Some(gk::SURFACE_LEVEL))
    }

    /// Iterate over every key name of the message.
    pub fn keys(&self) -> Result<KeyIterator<'_>> {
        KeyIterator::new(self, None)
    }

    /// Iterate over the key names of one namespace, e.g. `"mars"`.
    pub fn keys_in(&self, namespace: &str) -> Result<KeyIterator<'_>> {
        KeyIterator::new(self, Some(namespace))
    }

    /// Multi-line human readable description.
    pub fn summary(&self) -> Result<String> {
        let show = |key: &str| -> Result<String> {
            Ok(self
                .get_optional(key)?
                .map_or_else(|| "-".to_string(), |v| v.to_string()))
        };

        let mut lines = vec![
            format!(
                "GRIB message; fast gridded data access: {}",
                if self.grid.is_some() { "yes" } else { "no" }
            ),
            format!("\tOriginating generating centre: {}", show(gk::CENTRE)?),
            format!(
                "\tReference date: {}, time: {}",
                show(gk::REFERENCE_DATE)?,
                show(gk::REFERENCE_TIME)?
            ),
            format!("\tParameter id: {}", show(gk::PARAMETER_ID)?),
            format!("\tShort name: {}", show(gk::SHORT_NAME)?),
            format!("\tName: {}", show(gk::NAME)?),
            format!("\tUnits: {}", show(gk::UNITS)?),
            format!("\tType of level: {}", show(gk::TYPE_OF_LEVEL)?),
            format!("\tLevel: {}", show(gk::LEVEL)?),
        ];

        let grid_type = self.get_string(gk::GRID_TYPE)?;
        lines.push(format!("\tGrid type: {}", grid_type.as_deref().unwrap_or("-")));
        match grid_type.as_deref() {
            Some(gk::GRID_TYPE_REGULAR_LL) => {
                lines.push(format!(
                    "\t\tGridded area (lat, lon): ({}, {}), ({}, {})",
                    show(gk::LATITUDE_OF_FIRST_GRID_POINT)?,
                    show(gk::LONGITUDE_OF_FIRST_GRID_POINT)?,
                    show(gk::LATITUDE_OF_LAST_GRID_POINT)?,
                    show(gk::LONGITUDE_OF_LAST_GRID_POINT)?
                ));
                lines.push(format!(
                    "\tGrid resolution: d_lat={}, d_lon={}",
                    show(gk::DELTA_LATITUDE)?,
                    show(gk::DELTA_LONGITUDE)?
                ));
            }
            Some(gk::GRID_TYPE_SH) => lines.push(format!(
                "\t\tM={}, K={}, J={}",
                show(gk::GRID_SH_M)?,
                show(gk::GRID_SH_K)?,
                show(gk::GRID_SH_J)?
            )),
            _ => {}
        }
        Ok(lines.join("\n"))
    }

    fn write_mars_keys(&self, f: &mut fmt::Formatter<'_>) -> Result<fmt::Result> {
        for key in self.keys_in(gk::NAMESPACE_MARS)? {
            let key = key?;
            let value = self.lookup(&key)?.value().map(|v| v.to_string()).unwrap_or_default();
            if let Err(e) = write!(f, ", {}={}", key, value) {
                return Ok(Err(e));
            }
        }
        Ok(Ok(()))
    }
}

/// `filename=<origin>, key=value, ...` over the `mars` namespace.
impl fmt::Display for GribMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filename={}", self.origin.path().display())?;
        if self.handle.is_released() {
            return f.write_str(" (released)");
        }
        match self.write_mars_keys(f) {
            Ok(result) => result,
            Err(e) => write!(f, " <{}>", e),
        }
    }
}

impl fmt::Debug for GribMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GribMessage")
            .field("handle", &self.handle)
            .field("origin", &self.origin.path())
            .field("grid", &self.grid)
            .field("cached", &self.cache.is_enabled())
            .finish()
    }
}

impl GribItem for GribMessage {
    fn close(&mut self) {
        self.handle.release();
    }

    fn is_closed(&self) -> bool {
        self.handle.is_released()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::json::JsonCodes;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    const TEMPERATURE: &str = r#"{"class": "od", "stream": "oper", "type": "an", "centre": "ecmf", "paramId": 130, "shortName": "t", "name": "Temperature", "units": "K", "dataDate": 20240115, "dataTime": 1200, "step": 6, "typeOfLevel": "isobaricInhPa", "level": 850, "gridType": "regular_ll", "packingType": "grid_simple", "Ni": 3, "Nj": 2, "latitudeOfFirstGridPointInDegrees": 10.0, "longitudeOfFirstGridPointInDegrees": 0.0, "latitudeOfLastGridPointInDegrees": 0.0, "longitudeOfLastGridPointInDegrees": 20.0, "jDirectionIncrementInDegrees": 10.0, "iDirectionIncrementInDegrees": 10.0, "jScansPositively": 0, "iScansNegatively": 0, "jPointsAreConsecutive": 0, "bitmapPresent": null, "values": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]}"#;

    fn message_from(codes: &Arc<JsonCodes>, text: &str, headers_only: bool, cache: bool) -> GribMessage {
        let mut stream = Cursor::new(text.as_bytes().to_vec());
        let id = codes
            .decode_next_message(&mut stream, headers_only)
            .unwrap()
            .unwrap();
        GribMessage::new(
            codes.clone(),
            id,
            Origin::Index {
                path: PathBuf::from("test.grib"),
            },
            headers_only,
            cache,
        )
        .unwrap()
    }

    #[test]
    fn test_get_and_lookup() {
        let codes = Arc::new(JsonCodes::new());
        let message = message_from(&codes, TEMPERATURE, false, false);

        assert!(message.contains("shortName").unwrap());
        assert_eq!(message.get("shortName").unwrap(), KeyValue::from("t"));
        assert_eq!(message.get_i64("level").unwrap(), 850);
        assert_eq!(message.get("values").unwrap().len(), 6);
        assert_eq!(message.lookup("nope").unwrap(), Lookup::Absent);
        assert!(matches!(
            message.lookup("bitmapPresent").unwrap(),
            Lookup::Missing(_)
        ));

        let err = message.get("nope").unwrap_err();
        assert!(err.is_key_error());
        assert!(err.to_string().contains("key=nope"));
        assert_eq!(message.get_optional("nope").unwrap(), None);
    }

    #[test]
    fn test_cached_lookups_skip_the_library() {
        let codes = Arc::new(JsonCodes::new());
        let message = message_from(&codes, TEMPERATURE, false, true);
        assert!(message.is_cached());

        let first = message.get("paramId").unwrap();
        let calls = codes.stats().queries;
        let second = message.get("paramId").unwrap();
        assert_eq!(first, second);
        assert_eq!(codes.stats().queries, calls);
    }

    #[test]
    fn test_use_after_close() {
        let codes = Arc::new(JsonCodes::new());
        let mut message = message_from(&codes, TEMPERATURE, false, true);
        message.get("shortName").unwrap();
        message.close();
        message.close();

        assert!(message.is_closed());
        assert!(matches!(
            message.get("shortName"),
            Err(GribError::ResourceReleased { .. })
        ));
        assert!(matches!(
            message.value_at(5.0, 5.0),
            Err(GribError::ResourceReleased { .. })
        ));
        assert_eq!(message.to_string(), "filename=test.grib (released)");
        assert_eq!(codes.stats().messages_released, 1);
    }

    #[test]
    fn test_grid_descriptor_from_keys() {
        let codes = Arc::new(JsonCodes::new());
        let message = message_from(&codes, TEMPERATURE, false, false);
        let grid = message.grid().unwrap();
        assert_eq!(grid.d_lat, -10.0);
        assert_eq!(grid.d_lon, 10.0);
        assert_eq!((grid.n_lat, grid.n_lon), (2, 3));
        assert!(grid.lat_major);

        let headers = message_from(&codes, TEMPERATURE, true, false);
        assert!(headers.grid().is_none());
    }

    #[test]
    fn test_inconsistent_grid_is_rejected_and_released() {
        let codes = Arc::new(JsonCodes::new());
        let broken = TEMPERATURE.replace(
            r#""latitudeOfLastGridPointInDegrees": 0.0"#,
            r#""latitudeOfLastGridPointInDegrees": -5.0"#,
        );
        let mut stream = Cursor::new(broken.into_bytes());
        let id = codes.decode_next_message(&mut stream, false).unwrap().unwrap();
        let err = GribMessage::new(
            codes.clone(),
            id,
            Origin::Index {
                path: PathBuf::from("test.grib"),
            },
            false,
            false,
        )
        .unwrap_err();

        assert!(matches!(err, GribError::GridGeometry { .. }));
        assert_eq!(codes.stats().live_messages(), 0);
    }

    #[test]
    fn test_value_at_grid_points_and_centre() {
        let codes = Arc::new(JsonCodes::new());
        let message = message_from(&codes, TEMPERATURE, false, false);

        assert_eq!(message.value_at(10.0, 0.0).unwrap(), 1.0);
        assert_eq!(message.value_at(10.0, 20.0).unwrap(), 3.0);
        assert_eq!(message.value_at(0.0, 10.0).unwrap(), 5.0);
        let centre = message.value_at(5.0, 5.0).unwrap();
        assert!((centre - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_point_modes_agree() {
        let codes = Arc::new(JsonCodes::new());
        let message = message_from(&codes, TEMPERATURE, false, false);

        let fast = message.four_nearest_points(3.0, 12.0, NearestMode::Auto).unwrap();
        let library = message.four_nearest_points(3.0, 12.0, NearestMode::Library).unwrap();
        assert_eq!(nearest::index_set(&fast), nearest::index_set(&library));
        assert!(message
            .four_nearest_points(3.0, 12.0, NearestMode::CrossCheck)
            .is_ok());
    }

    #[test]
    fn test_level_predicates() {
        let codes = Arc::new(JsonCodes::new());
        let message = message_from(&codes, TEMPERATURE, false, false);
        assert!(message.is_level_isobaric().unwrap());
        assert!(!message.is_level_hybrid().unwrap());
        assert!(!message.is_level_surface().unwrap());

        let hybrid = message_from(
            &codes,
            r#"{"typeOfLevel": "hybrid", "level": 1, "pv": [0.0, 1.0]}"#,
            false,
            false,
        );
        assert!(hybrid.is_level_hybrid().unwrap());
        assert!(!hybrid.is_level_isobaric().unwrap());

        let surface = message_from(&codes, r#"{"typeOfLevel": "surface"}"#, false, false);
        assert!(surface.is_level_surface().unwrap());
        assert!(!surface.is_level_isobaric().unwrap());
    }

    #[test]
    fn test_key_iteration() {
        let codes = Arc::new(JsonCodes::new());
        let message = message_from(&codes, TEMPERATURE, false, false);

        let mars: Vec<String> = message
            .keys_in("mars")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(mars, vec!["class", "stream", "type"]);

        let all = message.keys().unwrap().count();
        assert_eq!(all, 28);
        assert_eq!(codes.stats().live_iterators(), 0);
    }

    #[test]
    fn test_dropped_key_iterator_is_released() {
        let codes = Arc::new(JsonCodes::new());
        let message = message_from(&codes, TEMPERATURE, false, false);
        {
            let mut keys = message.keys().unwrap();
            assert!(keys.next().is_some());
            assert_eq!(codes.stats().live_iterators(), 1);
        }
        assert_eq!(codes.stats().live_iterators(), 0);
    }

    #[test]
    fn test_display_and_summary() {
        let codes = Arc::new(JsonCodes::new());
        let message = message_from(&codes, TEMPERATURE, false, false);

        assert_eq!(
            message.to_string(),
            "filename=test.grib, class=od, stream=oper, type=an"
        );

        let summary = message.summary().unwrap();
        assert!(summary.starts_with("GRIB message; fast gridded data access: yes"));
        assert!(summary.contains("\tShort name: t"));
        assert!(summary.contains("Gridded area (lat, lon): (10, 0), (0, 20)"));
        assert!(summary.contains("d_lat=10, d_lon=10"));
    }
}
