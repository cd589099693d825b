//! Summary metadata of a GRIB message.
//!
//! A fixed set of commonly needed fields, each read from the first defined key
//! of a short candidate list, plus reference and valid times.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::codes::KeyValue;
use crate::error::{GribError, Result};
use crate::grib_keys as gk;
use crate::message::GribMessage;

/// Commonly used metadata of one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// MARS class, e.g. `od`
    pub class: Option<KeyValue>,
    pub stream: Option<KeyValue>,
    #[serde(rename = "type")]
    pub kind: Option<KeyValue>,

    pub centre: Option<KeyValue>,
    pub centre_description: Option<KeyValue>,
    pub param_id: Option<KeyValue>,
    pub short_name: Option<KeyValue>,
    pub units: Option<KeyValue>,
    pub name: Option<KeyValue>,

    /// From `dataDate` (YYYYMMDD) and `dataTime` (HHMM)
    pub reference_date_time: Option<NaiveDateTime>,
    /// Forecast step in hours
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_step: Option<i64>,
    /// Reference time plus step
    pub instant_date_time: Option<NaiveDateTime>,

    pub type_of_level: Option<KeyValue>,
}

/// Value of the first candidate key that is defined and not empty.
///
/// Only an empty string falls through to the next candidate. A numeric zero
/// is a real value (`type=0`, `stream=0`) and is kept.
fn first_of(message: &GribMessage, candidates: &[&str]) -> Result<Option<KeyValue>> {
    for key in candidates {
        if let Some(value) = message.get_optional(key)? {
            let empty = matches!(&value, KeyValue::Str(s) if s.is_empty());
            if !empty {
                return Ok(Some(value));
            }
        }
    }
    Ok(None)
}

/// Combine `dataDate` and `dataTime` values into a timestamp.
///
/// Returns `None` unless the date has exactly eight digits.
pub fn reference_date_time(date: &KeyValue, time: Option<&KeyValue>) -> Result<Option<NaiveDateTime>> {
    let date = date.to_string();
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    let hhmm = match time {
        Some(t) => t.as_i64().ok_or_else(|| GribError::UnexpectedKeyType {
            key: gk::REFERENCE_TIME.to_string(),
            expected: "integer",
        })?,
        None => 0,
    };

    let invalid = || GribError::decode(format!("invalid reference date/time {} {:04}", date, hhmm));
    let parse = |range: std::ops::Range<usize>| date[range].parse::<u32>().map_err(|_| invalid());
    let (year, month, day) = (parse(0..4)?, parse(4..6)?, parse(6..8)?);
    let (hour, minute) = (u32::try_from(hhmm / 100).map_err(|_| invalid())?, (hhmm % 100) as u32);

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .map(Some)
        .ok_or_else(invalid)
}

impl MessageMetadata {
    pub fn from_message(message: &GribMessage) -> Result<Self> {
        let reference_date_time = match message.get_optional(gk::REFERENCE_DATE)? {
            Some(date) => reference_date_time(&date, message.get_optional(gk::REFERENCE_TIME)?.as_ref())?,
            None => None,
        };

        let time_step = match message.get_optional(gk::STEP)? {
            Some(step) => Some(step.as_i64().ok_or_else(|| GribError::UnexpectedKeyType {
                key: gk::STEP.to_string(),
                expected: "integer",
            })?),
            None => None,
        };
        let instant_date_time =
            reference_date_time.map(|reference| reference + Duration::hours(time_step.unwrap_or(0)));

        Ok(Self {
            class: first_of(message, &[gk::CLASS, "class"])?,
            stream: first_of(message, &[gk::STREAM, "stream"])?,
            kind: first_of(message, &[gk::TYPE, "type"])?,
            centre: message.get_optional(gk::CENTRE)?,
            centre_description: message.get_optional(gk::CENTRE_DESCRIPTION)?,
            param_id: message.get_optional(gk::PARAMETER_ID)?,
            short_name: message.get_optional(gk::SHORT_NAME)?,
            units: message.get_optional(gk::UNITS)?,
            name: message.get_optional(gk::NAME)?,
            reference_date_time,
            time_step,
            instant_date_time,
            type_of_level: message.get_optional(gk::TYPE_OF_LEVEL)?,
        })
    }
}
