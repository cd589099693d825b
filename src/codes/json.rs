//! Reference decoding backend over newline-delimited JSON messages.
//!
//! Every non-blank line of the stream is one message: a JSON object mapping
//! key names to values. `null` marks a key whose value is MISSING. Arrays of
//! integers decode to integer arrays, any other numeric array to floats (with
//! `null` elements read as NaN). Lines starting with `#` are skipped.
//!
//! Handles are tracked in a table behind a mutex, so ids that were never issued
//! or were already released are rejected and counted in [`CodesStats`].

use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::{CodesApi, IndexId, IteratorId, KeyValue, MessageId, NearestPoint};
use crate::error::{GribError, Result};
use crate::grib_keys as gk;

/// Value reported for MISSING integer keys
pub const MISSING_LONG: i64 = 2147483647;

const EARTH_RADIUS_KM: f64 = 6371.229;
const EPS: f64 = 1e-9;

const MARS_KEYS: &[&str] = &[
    "class", "type", "stream", "expver", "date", "time", "step", "levtype", "levelist", "param",
    "domain",
];

const PARAMETER_KEYS: &[&str] = &[
    gk::CENTRE,
    gk::CENTRE_DESCRIPTION,
    gk::PARAMETER_ID,
    gk::SHORT_NAME,
    gk::UNITS,
    gk::NAME,
];

const TIME_KEYS: &[&str] = &[
    gk::REFERENCE_DATE,
    gk::REFERENCE_TIME,
    gk::STEP,
    "stepUnits",
    "stepType",
    "stepRange",
    "startStep",
    "endStep",
    "validityDate",
    "validityTime",
];

const VERTICAL_KEYS: &[&str] = &[gk::TYPE_OF_LEVEL, gk::LEVEL, gk::PV];

const GEOGRAPHY_KEYS: &[&str] = &[
    gk::GRID_TYPE,
    gk::NO_LONGITUDES,
    gk::NO_LATITUDES,
    gk::LATITUDE_OF_FIRST_GRID_POINT,
    gk::LONGITUDE_OF_FIRST_GRID_POINT,
    gk::LATITUDE_OF_LAST_GRID_POINT,
    gk::LONGITUDE_OF_LAST_GRID_POINT,
    gk::DELTA_LATITUDE,
    gk::DELTA_LONGITUDE,
    gk::DELTA_LATITUDE_POSITIVE,
    gk::DELTA_LONGITUDE_NEGATIVE,
    gk::LATITUDE_MINOR_LONGITUDE_MAJOR,
];

const LS_KEYS: &[&str] = &[
    "edition",
    gk::CENTRE,
    gk::TYPE_OF_LEVEL,
    gk::LEVEL,
    gk::REFERENCE_DATE,
    "stepRange",
    "dataType",
    gk::SHORT_NAME,
    gk::PACKING_TYPE,
    gk::GRID_TYPE,
];

/// Key membership of the namespaces this backend understands
fn namespace_keys(namespace: &str) -> Option<&'static [&'static str]> {
    match namespace {
        "mars" => Some(MARS_KEYS),
        "parameter" => Some(PARAMETER_KEYS),
        "time" => Some(TIME_KEYS),
        "vertical" => Some(VERTICAL_KEYS),
        "geography" => Some(GEOGRAPHY_KEYS),
        "ls" => Some(LS_KEYS),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: KeyValue,
    missing: bool,
}

#[derive(Debug)]
struct DecodedMessage {
    entries: Vec<(String, Entry)>,
}

impl DecodedMessage {
    fn parse(line: &str, headers_only: bool) -> Result<Self> {
        let document: Value = serde_json::from_str(line)?;
        let object = match document {
            Value::Object(object) => object,
            other => {
                return Err(GribError::decode(format!(
                    "expected a JSON object per message, got {}",
                    other
                )))
            }
        };

        let mut entries = Vec::with_capacity(object.len());
        for (key, value) in &object {
            if headers_only && key == gk::VALUES {
                continue;
            }
            entries.push((key.clone(), convert(key, value)?));
        }
        Ok(Self { entries })
    }

    fn entry(&self, key: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, entry)| entry)
    }

    fn require(&self, key: &str) -> Result<&Entry> {
        self.entry(key)
            .ok_or_else(|| GribError::decode(format!("key not found: {}", key)))
    }

    fn number(&self, key: &str) -> Result<f64> {
        super::expect_f64(key, &self.require(key)?.value)
    }

    fn flag(&self, key: &str) -> bool {
        self.entry(key)
            .and_then(|e| e.value.as_flag())
            .unwrap_or(false)
    }
}

fn convert(key: &str, value: &Value) -> Result<Entry> {
    let value = match value {
        Value::Null => {
            return Ok(Entry {
                value: KeyValue::Int(MISSING_LONG),
                missing: true,
            })
        }
        Value::Bool(b) => KeyValue::Int(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => KeyValue::Int(i),
            None => KeyValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => KeyValue::Str(s.clone()),
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_i64) => {
            KeyValue::IntArray(items.iter().filter_map(Value::as_i64).collect())
        }
        Value::Array(items) => {
            let mut floats = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Number(n) => floats.push(n.as_f64().unwrap_or(f64::NAN)),
                    Value::Null => floats.push(f64::NAN),
                    other => {
                        return Err(GribError::decode(format!(
                            "key {} holds a non-numeric array element {}",
                            key, other
                        )))
                    }
                }
            }
            KeyValue::FloatArray(floats)
        }
        Value::Object(_) => {
            return Err(GribError::decode(format!(
                "key {} holds a nested object",
                key
            )))
        }
    };
    Ok(Entry {
        value,
        missing: false,
    })
}

fn loosely_equal(a: &KeyValue, b: &KeyValue) -> bool {
    if a == b {
        return true;
    }
    if a.is_array() || b.is_array() {
        return false;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a.to_string() == b.to_string(),
    }
}

struct KeyCursor {
    keys: Vec<String>,
    position: usize,
    skip_duplicates: bool,
    seen: HashSet<String>,
}

struct IndexState {
    keys: Vec<String>,
    messages: Vec<Arc<DecodedMessage>>,
    selection: Vec<Option<KeyValue>>,
    cursor: usize,
}

impl IndexState {
    fn key_position(&self, key: &str) -> Result<usize> {
        self.keys
            .iter()
            .position(|k| k == key)
            .ok_or_else(|| GribError::decode(format!("key {} is not part of the index", key)))
    }

    fn matches(&self, message: &DecodedMessage) -> bool {
        self.keys
            .iter()
            .zip(&self.selection)
            .all(|(key, selected)| match (message.entry(key), selected) {
                (Some(entry), Some(value)) => loosely_equal(&entry.value, value),
                _ => false,
            })
    }
}

/// Handle counters kept by [`JsonCodes`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodesStats {
    pub messages_acquired: u64,
    pub messages_released: u64,
    pub iterators_acquired: u64,
    pub iterators_released: u64,
    pub indices_acquired: u64,
    pub indices_released: u64,
    /// Release requests for ids that were unknown or already released
    pub invalid_releases: u64,
    /// Reads addressed to a message id
    pub queries: u64,
}

impl CodesStats {
    pub fn live_messages(&self) -> u64 {
        self.messages_acquired - self.messages_released
    }

    pub fn live_iterators(&self) -> u64 {
        self.iterators_acquired - self.iterators_released
    }

    pub fn live_indices(&self) -> u64 {
        self.indices_acquired - self.indices_released
    }
}

#[derive(Default)]
struct State {
    next_id: u64,
    messages: HashMap<u64, Arc<DecodedMessage>>,
    iterators: HashMap<u64, KeyCursor>,
    indices: HashMap<u64, IndexState>,
    stats: CodesStats,
}

impl State {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn register_message(&mut self, message: Arc<DecodedMessage>) -> MessageId {
        let id = self.allocate();
        self.messages.insert(id, message);
        self.stats.messages_acquired += 1;
        MessageId(id)
    }

    fn message(&self, msg: MessageId) -> Result<Arc<DecodedMessage>> {
        self.messages
            .get(&msg.0)
            .cloned()
            .ok_or_else(|| GribError::decode(format!("invalid message id {}", msg.0)))
    }
}

/// Decoding backend for newline-delimited JSON message streams.
#[derive(Default)]
pub struct JsonCodes {
    state: Mutex<State>,
}

impl JsonCodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current handle counters.
    pub fn stats(&self) -> CodesStats {
        self.state.lock().stats
    }

    fn message(&self, msg: MessageId) -> Result<Arc<DecodedMessage>> {
        let mut state = self.state.lock();
        state.stats.queries += 1;
        state.message(msg)
    }
}

impl std::fmt::Debug for JsonCodes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCodes")
            .field("stats", &self.stats())
            .finish()
    }
}

impl CodesApi for JsonCodes {
    fn decode_next_message(
        &self,
        stream: &mut dyn BufRead,
        headers_only: bool,
    ) -> Result<Option<MessageId>> {
        let mut line = String::new();
        loop {
            line.clear();
            if stream.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let message = DecodedMessage::parse(trimmed, headers_only)?;
            return Ok(Some(self.state.lock().register_message(Arc::new(message))));
        }
    }

    fn is_defined(&self, msg: MessageId, key: &str) -> Result<bool> {
        Ok(self.message(msg)?.entry(key).is_some())
    }

    fn is_missing(&self, msg: MessageId, key: &str) -> Result<bool> {
        Ok(self.message(msg)?.require(key)?.missing)
    }

    fn size(&self, msg: MessageId, key: &str) -> Result<usize> {
        Ok(self.message(msg)?.require(key)?.value.len())
    }

    fn get_scalar(&self, msg: MessageId, key: &str) -> Result<KeyValue> {
        let message = self.message(msg)?;
        match &message.require(key)?.value {
            KeyValue::IntArray(v) if v.len() == 1 => Ok(KeyValue::Int(v[0])),
            KeyValue::FloatArray(v) if v.len() == 1 => Ok(KeyValue::Float(v[0])),
            value if value.is_array() => Err(GribError::decode(format!(
                "key {} is an array of size {}",
                key,
                value.len()
            ))),
            value => Ok(value.clone()),
        }
    }

    fn get_array(&self, msg: MessageId, key: &str) -> Result<KeyValue> {
        let message = self.message(msg)?;
        match &message.require(key)?.value {
            KeyValue::Int(v) => Ok(KeyValue::IntArray(vec![*v])),
            KeyValue::Float(v) => Ok(KeyValue::FloatArray(vec![*v])),
            KeyValue::Str(_) => Err(GribError::decode(format!(
                "key {} is a string, not an array",
                key
            ))),
            array => Ok(array.clone()),
        }
    }

    fn release_message(&self, msg: MessageId) -> Result<()> {
        let mut state = self.state.lock();
        if state.messages.remove(&msg.0).is_none() {
            state.stats.invalid_releases += 1;
            return Err(GribError::decode(format!("invalid message id {}", msg.0)));
        }
        state.stats.messages_released += 1;
        Ok(())
    }

    fn find_nearest(
        &self,
        msg: MessageId,
        lat: f64,
        lon: f64,
        npoints: usize,
    ) -> Result<Vec<NearestPoint>> {
        if npoints != 4 {
            return Err(GribError::decode(format!(
                "nearest point search supports 4 points, got {}",
                npoints
            )));
        }
        surrounding_points(&*self.message(msg)?, lat, lon)
    }

    fn keys_iterator_new(&self, msg: MessageId, namespace: Option<&str>) -> Result<IteratorId> {
        let mut state = self.state.lock();
        let message = state.message(msg)?;
        let allowed = namespace.map(|ns| namespace_keys(ns).unwrap_or(&[]));
        let keys = message
            .entries
            .iter()
            .map(|(name, _)| name)
            .filter(|name| allowed.map_or(true, |keys| keys.iter().any(|k| *k == name.as_str())))
            .cloned()
            .collect();

        let id = state.allocate();
        state.iterators.insert(
            id,
            KeyCursor {
                keys,
                position: 0,
                skip_duplicates: false,
                seen: HashSet::new(),
            },
        );
        state.stats.iterators_acquired += 1;
        Ok(IteratorId(id))
    }

    fn keys_iterator_skip_duplicates(&self, iter: IteratorId) -> Result<()> {
        let mut state = self.state.lock();
        let cursor = state
            .iterators
            .get_mut(&iter.0)
            .ok_or_else(|| GribError::decode(format!("invalid iterator id {}", iter.0)))?;
        cursor.skip_duplicates = true;
        Ok(())
    }

    fn keys_iterator_next(&self, iter: IteratorId) -> Result<Option<String>> {
        let mut state = self.state.lock();
        let cursor = state
            .iterators
            .get_mut(&iter.0)
            .ok_or_else(|| GribError::decode(format!("invalid iterator id {}", iter.0)))?;
        while cursor.position < cursor.keys.len() {
            let key = cursor.keys[cursor.position].clone();
            cursor.position += 1;
            if cursor.skip_duplicates && !cursor.seen.insert(key.clone()) {
                continue;
            }
            return Ok(Some(key));
        }
        Ok(None)
    }

    fn keys_iterator_release(&self, iter: IteratorId) -> Result<()> {
        let mut state = self.state.lock();
        if state.iterators.remove(&iter.0).is_none() {
            state.stats.invalid_releases += 1;
            return Err(GribError::decode(format!("invalid iterator id {}", iter.0)));
        }
        state.stats.iterators_released += 1;
        Ok(())
    }

    fn index_new(&self, path: &Path, keys: &[String]) -> Result<IndexId> {
        if keys.is_empty() {
            return Err(GribError::EmptyIndexKeys);
        }
        let reader = BufReader::new(File::open(path)?);
        let mut messages = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            messages.push(Arc::new(DecodedMessage::parse(trimmed, false)?));
        }
        debug!(
            path = %path.display(),
            keys = ?keys,
            messages = messages.len(),
            "built index"
        );

        let mut state = self.state.lock();
        let id = state.allocate();
        state.indices.insert(
            id,
            IndexState {
                keys: keys.to_vec(),
                messages,
                selection: vec![None; keys.len()],
                cursor: 0,
            },
        );
        state.stats.indices_acquired += 1;
        Ok(IndexId(id))
    }

    fn index_select(&self, index: IndexId, key: &str, value: &KeyValue) -> Result<()> {
        let mut state = self.state.lock();
        let idx = state
            .indices
            .get_mut(&index.0)
            .ok_or_else(|| GribError::decode(format!("invalid index id {}", index.0)))?;
        let position = idx.key_position(key)?;
        idx.selection[position] = Some(value.clone());
        idx.cursor = 0;
        Ok(())
    }

    fn index_next(&self, index: IndexId) -> Result<Option<MessageId>> {
        let mut state = self.state.lock();
        let message = {
            let idx = state
                .indices
                .get_mut(&index.0)
                .ok_or_else(|| GribError::decode(format!("invalid index id {}", index.0)))?;
            if let Some(position) = idx.selection.iter().position(Option::is_none) {
                return Err(GribError::decode(format!(
                    "index key {} has no selected value",
                    idx.keys[position]
                )));
            }

            let found = (idx.cursor..idx.messages.len()).find(|&i| idx.matches(&idx.messages[i]));
            match found {
                Some(i) => {
                    idx.cursor = i + 1;
                    Arc::clone(&idx.messages[i])
                }
                None => {
                    idx.cursor = idx.messages.len();
                    return Ok(None);
                }
            }
        };
        Ok(Some(state.register_message(message)))
    }

    fn index_values(&self, index: IndexId, key: &str) -> Result<Vec<KeyValue>> {
        let state = self.state.lock();
        let idx = state
            .indices
            .get(&index.0)
            .ok_or_else(|| GribError::decode(format!("invalid index id {}", index.0)))?;
        idx.key_position(key)?;

        let mut values: Vec<KeyValue> = Vec::new();
        for message in &idx.messages {
            if let Some(entry) = message.entry(key) {
                if !values.iter().any(|v| loosely_equal(v, &entry.value)) {
                    values.push(entry.value.clone());
                }
            }
        }
        values.sort_by(|a, b| match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.to_string().cmp(&b.to_string()),
        });
        Ok(values)
    }

    fn index_release(&self, index: IndexId) -> Result<()> {
        let mut state = self.state.lock();
        if state.indices.remove(&index.0).is_none() {
            state.stats.invalid_releases += 1;
            return Err(GribError::decode(format!("invalid index id {}", index.0)));
        }
        state.stats.indices_released += 1;
        Ok(())
    }
}

/// The four corners of the grid cell enclosing `(lat, lon)` on a regular
/// lat/lon grid, lower row first, each row in scanning order.
fn surrounding_points(message: &DecodedMessage, lat: f64, lon: f64) -> Result<Vec<NearestPoint>> {
    let grid_type = message
        .entry(gk::GRID_TYPE)
        .and_then(|e| e.value.as_str().map(str::to_string))
        .unwrap_or_default();
    if grid_type != gk::GRID_TYPE_REGULAR_LL {
        return Err(GribError::decode(format!(
            "nearest point search is not supported for gridType={}",
            grid_type
        )));
    }

    let ni = message.number(gk::NO_LONGITUDES)? as usize;
    let nj = message.number(gk::NO_LATITUDES)? as usize;
    if ni < 2 || nj < 2 {
        return Err(GribError::decode(format!(
            "grid of {}x{} points is too small for a nearest point search",
            ni, nj
        )));
    }
    let lat_step = message.number(gk::DELTA_LATITUDE)?.abs()
        * if message.flag(gk::DELTA_LATITUDE_POSITIVE) {
            1.0
        } else {
            -1.0
        };
    let lon_step = message.number(gk::DELTA_LONGITUDE)?.abs()
        * if message.flag(gk::DELTA_LONGITUDE_NEGATIVE) {
            -1.0
        } else {
            1.0
        };
    let lat_first = message.number(gk::LATITUDE_OF_FIRST_GRID_POINT)?;
    let lon_first = message.number(gk::LONGITUDE_OF_FIRST_GRID_POINT)?;
    let j_consecutive = message.flag(gk::LATITUDE_MINOR_LONGITUDE_MAJOR);

    let lats: Vec<f64> = (0..nj).map(|r| lat_first + r as f64 * lat_step).collect();
    let lons: Vec<f64> = (0..ni)
        .map(|c| (lon_first + c as f64 * lon_step).rem_euclid(360.0))
        .collect();
    let span = (ni as f64 * lon_step.abs()) % 360.0;
    let global = span < 1e-4 || (span - 360.0).abs() < 1e-4;

    let rows = bracket_rows(&lats, lat_step, lat).ok_or(GribError::OutOfGrid { lat, lon })?;
    let cols =
        bracket_columns(&lons, lon_step, lon, global).ok_or(GribError::OutOfGrid { lat, lon })?;
    let values = message.entry(gk::VALUES).and_then(|e| e.value.to_f64_vec());

    let mut points = Vec::with_capacity(4);
    for r in [rows.0, rows.1] {
        for c in [cols.0, cols.1] {
            let index = if j_consecutive { c * nj + r } else { r * ni + c };
            points.push(NearestPoint {
                lat: lats[r],
                lon: lons[c],
                value: values
                    .as_ref()
                    .and_then(|v| v.get(index).copied())
                    .unwrap_or(f64::NAN),
                distance: great_circle_km(lat, lon, lats[r], lons[c]),
                index,
            });
        }
    }
    Ok(points)
}

fn bracket_rows(lats: &[f64], step: f64, lat: f64) -> Option<(usize, usize)> {
    let direction = step.signum();
    let lower = lats[..lats.len() - 1]
        .iter()
        .rposition(|&row_lat| (lat - row_lat) * direction >= -EPS)?;
    if (lat - lats[lower + 1]) * direction > EPS {
        return None;
    }
    Some((lower, lower + 1))
}

fn bracket_columns(lons: &[f64], step: f64, lon: f64, global: bool) -> Option<(usize, usize)> {
    let n = lons.len();
    let direction = step.signum();
    let offset = |c: usize| {
        let o = ((lon - lons[c]) * direction).rem_euclid(360.0);
        if o > 360.0 - EPS {
            0.0
        } else {
            o
        }
    };
    let column = (0..n).min_by(|&a, &b| offset(a).partial_cmp(&offset(b)).unwrap_or(Ordering::Equal))?;

    if column == n - 1 {
        if global {
            Some((n - 1, 0))
        } else if offset(column) <= EPS {
            Some((n - 2, n - 1))
        } else {
            None
        }
    } else if offset(column) <= step.abs() + EPS {
        Some((column, column + 1))
    } else {
        None
    }
}

fn great_circle_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = phi2 - phi1;
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GRID: &str = r#"{"gridType": "regular_ll", "Ni": 4, "Nj": 3, "latitudeOfFirstGridPointInDegrees": 10.0, "longitudeOfFirstGridPointInDegrees": 0.0, "latitudeOfLastGridPointInDegrees": 0.0, "longitudeOfLastGridPointInDegrees": 270.0, "jDirectionIncrementInDegrees": 5.0, "iDirectionIncrementInDegrees": 90.0, "jScansPositively": 0, "iScansNegatively": 0, "jPointsAreConsecutive": 0, "level": null, "values": [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]}"#;

    fn decode(codes: &JsonCodes, text: &str, headers_only: bool) -> MessageId {
        let mut stream = Cursor::new(text.as_bytes().to_vec());
        codes
            .decode_next_message(&mut stream, headers_only)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_decode_stream() {
        let codes = JsonCodes::new();
        let text = "# comment\n\n{\"shortName\": \"t\"}\n{\"shortName\": \"u\"}\n";
        let mut stream = Cursor::new(text.as_bytes().to_vec());

        let first = codes.decode_next_message(&mut stream, false).unwrap();
        let second = codes.decode_next_message(&mut stream, false).unwrap();
        let end = codes.decode_next_message(&mut stream, false).unwrap();

        assert!(first.is_some());
        assert!(second.is_some());
        assert!(end.is_none());
        assert_eq!(
            codes.get_scalar(second.unwrap(), "shortName").unwrap(),
            KeyValue::Str("u".to_string())
        );
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        let codes = JsonCodes::new();
        let mut stream = Cursor::new(b"[1, 2, 3]\n".to_vec());
        assert!(codes.decode_next_message(&mut stream, false).is_err());
    }

    #[test]
    fn test_missing_and_size() {
        let codes = JsonCodes::new();
        let msg = decode(&codes, GRID, false);

        assert!(codes.is_missing(msg, "level").unwrap());
        assert_eq!(
            codes.get_scalar(msg, "level").unwrap(),
            KeyValue::Int(MISSING_LONG)
        );
        assert_eq!(codes.size(msg, "values").unwrap(), 12);
        assert_eq!(codes.size(msg, "Ni").unwrap(), 1);
        assert!(codes.get_scalar(msg, "values").is_err());
        assert!(!codes.is_defined(msg, "pv").unwrap());
    }

    #[test]
    fn test_floats_decode_bit_exact() {
        let codes = JsonCodes::new();
        let value: f64 = 100.0 * (10.0 + 2.0 * -0.1);
        let line = serde_json::json!({"values": [value, 0.1, 1.0 / 3.0]}).to_string();
        let msg = decode(&codes, &line, false);

        match codes.get_array(msg, "values").unwrap() {
            KeyValue::FloatArray(values) => {
                assert_eq!(values[0].to_bits(), value.to_bits());
                assert_eq!(values[1].to_bits(), 0.1f64.to_bits());
                assert_eq!(values[2].to_bits(), (1.0f64 / 3.0).to_bits());
            }
            other => panic!("expected a float array, got {:?}", other),
        }
    }

    #[test]
    fn test_headers_only_drops_values() {
        let codes = JsonCodes::new();
        let msg = decode(&codes, GRID, true);
        assert!(!codes.is_defined(msg, "values").unwrap());
        assert!(codes.is_defined(msg, "Ni").unwrap());
    }

    #[test]
    fn test_double_release_is_rejected() {
        let codes = JsonCodes::new();
        let msg = decode(&codes, GRID, false);

        assert!(codes.release_message(msg).is_ok());
        assert!(codes.release_message(msg).is_err());

        let stats = codes.stats();
        assert_eq!(stats.messages_released, 1);
        assert_eq!(stats.invalid_releases, 1);
        assert!(codes.is_defined(msg, "Ni").is_err());
    }

    #[test]
    fn test_key_iterator_namespaces() {
        let codes = JsonCodes::new();
        let msg = decode(&codes, GRID, false);

        let iter = codes.keys_iterator_new(msg, Some("vertical")).unwrap();
        codes.keys_iterator_skip_duplicates(iter).unwrap();
        assert_eq!(
            codes.keys_iterator_next(iter).unwrap(),
            Some("level".to_string())
        );
        assert_eq!(codes.keys_iterator_next(iter).unwrap(), None);
        codes.keys_iterator_release(iter).unwrap();

        let iter = codes.keys_iterator_new(msg, Some("no-such-namespace")).unwrap();
        assert_eq!(codes.keys_iterator_next(iter).unwrap(), None);
        codes.keys_iterator_release(iter).unwrap();

        assert_eq!(codes.stats().live_iterators(), 0);
    }

    #[test]
    fn test_find_nearest_cell_corners() {
        let codes = JsonCodes::new();
        let msg = decode(&codes, GRID, false);

        // Rows scan southwards: 10, 5, 0. Columns: 0, 90, 180, 270.
        let points = codes.find_nearest(msg, 7.0, 45.0, 4).unwrap();
        let mut indices: Vec<usize> = points.iter().map(|p| p.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 4, 5]);
        assert_eq!(points[0].value, points[0].index as f64);
    }

    #[test]
    fn test_find_nearest_wraps_global_grid() {
        let codes = JsonCodes::new();
        let msg = decode(&codes, GRID, false);

        let points = codes.find_nearest(msg, 2.0, 300.0, 4).unwrap();
        let mut indices: Vec<usize> = points.iter().map(|p| p.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![4, 7, 8, 11]);
    }

    #[test]
    fn test_find_nearest_outside_grid() {
        let codes = JsonCodes::new();
        let msg = decode(&codes, GRID, false);
        assert!(matches!(
            codes.find_nearest(msg, 20.0, 45.0, 4),
            Err(GribError::OutOfGrid { .. })
        ));
    }

    #[test]
    fn test_loose_equality() {
        assert!(loosely_equal(&KeyValue::Int(130), &KeyValue::Float(130.0)));
        assert!(loosely_equal(&KeyValue::Str("130".into()), &KeyValue::Int(130)));
        assert!(!loosely_equal(&KeyValue::Int(130), &KeyValue::Int(131)));
        assert!(loosely_equal(&KeyValue::Str("t".into()), &KeyValue::Str("t".into())));
    }
}
