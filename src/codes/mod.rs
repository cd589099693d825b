//! The decoding-library seam.
//!
//! Everything that touches raw GRIB bytes lives behind [`CodesApi`]. The rest
//! of the crate only ever sees opaque handle ids handed out by an implementation
//! of this trait, and is responsible for releasing each of them exactly once.

pub mod json;

use serde::Serialize;
use std::convert::Infallible;
use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

use crate::error::{GribError, Result};

/// Opaque id of a decoded message owned by the decoding library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub u64);

/// Opaque id of a key iterator owned by the decoding library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IteratorId(pub u64);

/// Opaque id of a composite index owned by the decoding library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexId(pub u64);

/// A decoded key value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KeyValue {
    Int(i64),
    Float(f64),
    Str(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

impl KeyValue {
    /// Number of elements held by this value.
    pub fn len(&self) -> usize {
        match self {
            KeyValue::IntArray(v) => v.len(),
            KeyValue::FloatArray(v) => v.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_array(&self) -> bool {
        matches!(self, KeyValue::IntArray(_) | KeyValue::FloatArray(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KeyValue::Int(v) => Some(*v as f64),
            KeyValue::Float(v) => Some(*v),
            KeyValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KeyValue::Int(v) => Some(*v),
            KeyValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            KeyValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Flag semantics used by GRIB scanning-mode keys: non-zero is true.
    pub fn as_flag(&self) -> Option<bool> {
        self.as_i64().map(|v| v != 0)
    }

    /// The value as a flat sequence of floats.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            KeyValue::IntArray(v) => Some(v.iter().map(|&x| x as f64).collect()),
            KeyValue::FloatArray(v) => Some(v.clone()),
            scalar => scalar.as_f64().map(|x| vec![x]),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(v) => write!(f, "{}", v),
            KeyValue::Float(v) => write!(f, "{}", v),
            KeyValue::Str(s) => f.write_str(s),
            KeyValue::IntArray(v) => write!(f, "{:?}", v),
            KeyValue::FloatArray(v) => write!(f, "{:?}", v),
        }
    }
}

/// Parses command-line style values: integers first, then floats, else text.
impl FromStr for KeyValue {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(v) = s.parse::<i64>() {
            return Ok(KeyValue::Int(v));
        }
        if let Ok(v) = s.parse::<f64>() {
            return Ok(KeyValue::Float(v));
        }
        Ok(KeyValue::Str(s.to_string()))
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int(v)
    }
}

impl From<i32> for KeyValue {
    fn from(v: i32) -> Self {
        KeyValue::Int(v as i64)
    }
}

impl From<f64> for KeyValue {
    fn from(v: f64) -> Self {
        KeyValue::Float(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::Str(v.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        KeyValue::Str(v)
    }
}

/// A grid point reported by the library's nearest-point search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint {
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
    /// Great-circle distance from the query point, in kilometres
    pub distance: f64,
    /// Position of the point in the message's `values` array
    pub index: usize,
}

/// Operations the decoding library exposes on its native handles.
///
/// Handles are plain ids; implementations must reject ids that were never
/// issued or were already released instead of misbehaving. None of these
/// calls are expected to be invoked concurrently on the same handle.
pub trait CodesApi: Send + Sync {
    /// Decode the next message from `stream`, or `None` at end of stream.
    fn decode_next_message(
        &self,
        stream: &mut dyn BufRead,
        headers_only: bool,
    ) -> Result<Option<MessageId>>;

    fn is_defined(&self, msg: MessageId, key: &str) -> Result<bool>;

    fn is_missing(&self, msg: MessageId, key: &str) -> Result<bool>;

    /// Number of values held by `key`.
    fn size(&self, msg: MessageId, key: &str) -> Result<usize>;

    fn get_scalar(&self, msg: MessageId, key: &str) -> Result<KeyValue>;

    fn get_array(&self, msg: MessageId, key: &str) -> Result<KeyValue>;

    fn release_message(&self, msg: MessageId) -> Result<()>;

    /// The `npoints` grid points surrounding `(lat, lon)`.
    fn find_nearest(
        &self,
        msg: MessageId,
        lat: f64,
        lon: f64,
        npoints: usize,
    ) -> Result<Vec<NearestPoint>>;

    fn keys_iterator_new(&self, msg: MessageId, namespace: Option<&str>) -> Result<IteratorId>;

    fn keys_iterator_skip_duplicates(&self, iter: IteratorId) -> Result<()>;

    /// Advance and return the next key name, or `None` when exhausted.
    fn keys_iterator_next(&self, iter: IteratorId) -> Result<Option<String>>;

    fn keys_iterator_release(&self, iter: IteratorId) -> Result<()>;

    fn index_new(&self, path: &Path, keys: &[String]) -> Result<IndexId>;

    /// Restrict the index to messages whose `key` equals `value`.
    fn index_select(&self, index: IndexId, key: &str, value: &KeyValue) -> Result<()>;

    /// Next message matching the current selection, or `None` when drained.
    fn index_next(&self, index: IndexId) -> Result<Option<MessageId>>;

    /// Distinct values of `key` present in the index.
    fn index_values(&self, index: IndexId, key: &str) -> Result<Vec<KeyValue>>;

    fn index_release(&self, index: IndexId) -> Result<()>;
}

pub(crate) fn expect_f64(key: &str, value: &KeyValue) -> Result<f64> {
    value.as_f64().ok_or_else(|| GribError::UnexpectedKeyType {
        key: key.to_string(),
        expected: "number",
    })
}

pub(crate) fn expect_i64(key: &str, value: &KeyValue) -> Result<i64> {
    value.as_i64().ok_or_else(|| GribError::UnexpectedKeyType {
        key: key.to_string(),
        expected: "integer",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_parsing() {
        assert_eq!("130".parse::<KeyValue>().unwrap(), KeyValue::Int(130));
        assert_eq!("0.5".parse::<KeyValue>().unwrap(), KeyValue::Float(0.5));
        assert_eq!(
            "isobaricInhPa".parse::<KeyValue>().unwrap(),
            KeyValue::Str("isobaricInhPa".to_string())
        );
    }

    #[test]
    fn test_key_value_conversions() {
        assert_eq!(KeyValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(KeyValue::Float(2.0).as_i64(), Some(2));
        assert_eq!(KeyValue::Float(2.5).as_i64(), None);
        assert_eq!(KeyValue::Int(0).as_flag(), Some(false));
        assert_eq!(KeyValue::Int(64).as_flag(), Some(true));
        assert_eq!(
            KeyValue::IntArray(vec![1, 2]).to_f64_vec(),
            Some(vec![1.0, 2.0])
        );
        assert_eq!(KeyValue::FloatArray(vec![1.0, 2.0, 3.0]).len(), 3);
        assert!(KeyValue::FloatArray(vec![]).is_empty());
    }

    #[test]
    fn test_key_value_serialization() {
        let json = serde_json::to_string(&KeyValue::Str("t".to_string())).unwrap();
        assert_eq!(json, r#""t""#);
        let json = serde_json::to_string(&KeyValue::IntArray(vec![1, 2])).unwrap();
        assert_eq!(json, "[1,2]");
    }
}
