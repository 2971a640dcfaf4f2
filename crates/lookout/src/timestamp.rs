//! Archive timestamp codec
//!
//! Archived records carry their observation time as text in the layout
//! `YYYY-MM-DD_HH-MM-SS-fff`: the date and time parts are joined by the first
//! underscore, the time fields by hyphens, and the trailing field holds the
//! fractional second (milliseconds in practice).

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::config::TimezoneMode;
use crate::error::TimestampError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H-%M-%S";
const MAX_FRACTION_DIGITS: usize = 6;

/// A wall-clock point in time with sub-second precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
  pub fn new(value: NaiveDateTime) -> Self {
    Self(value)
  }

  /// Parse the archive layout. Malformed input is always an error, never a
  /// placeholder value.
  pub fn parse(input: &str) -> Result<Self, TimestampError> {
    let (date_part, time_part) =
      input.split_once('_').ok_or_else(|| TimestampError::new(input, "missing '_' between date and time"))?;

    let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT)
      .map_err(|e| TimestampError::new(input, format!("invalid date: {e}")))?;

    let (clock_part, fraction_part) = time_part
      .rsplit_once('-')
      .ok_or_else(|| TimestampError::new(input, "missing fractional seconds"))?;

    let clock = NaiveTime::parse_from_str(clock_part, TIME_FORMAT)
      .map_err(|e| TimestampError::new(input, format!("invalid time: {e}")))?;

    let micros = parse_fraction(fraction_part).map_err(|reason| TimestampError::new(input, reason))?;
    let time = clock
      .with_nanosecond(micros * 1_000)
      .ok_or_else(|| TimestampError::new(input, "fractional seconds out of range"))?;

    Ok(Self(NaiveDateTime::new(date, time)))
  }

  /// Render in the archive layout with exactly three fraction digits
  pub fn encode(&self) -> String {
    self.0.format("%Y-%m-%d_%H-%M-%S-%3f").to_string()
  }

  /// Convert epoch seconds to wall-clock time in the given timezone
  pub fn from_epoch(seconds: i64, timezone: TimezoneMode) -> Option<Self> {
    let naive = match timezone {
      TimezoneMode::Local => Local.timestamp_opt(seconds, 0).single()?.naive_local(),
      TimezoneMode::Utc => Utc.timestamp_opt(seconds, 0).single()?.naive_utc(),
    };
    Some(Self(naive))
  }

  pub fn as_naive(&self) -> NaiveDateTime {
    self.0
  }
}

fn parse_fraction(fraction: &str) -> Result<u32, String> {
  if fraction.is_empty() || fraction.len() > MAX_FRACTION_DIGITS {
    return Err(format!("fractional seconds must have 1 to {MAX_FRACTION_DIGITS} digits"));
  }
  if !fraction.bytes().all(|b| b.is_ascii_digit()) {
    return Err(format!("fractional seconds '{fraction}' are not numeric"));
  }

  let padded = format!("{fraction:0<width$}", width = MAX_FRACTION_DIGITS);
  padded.parse::<u32>().map_err(|e| e.to_string())
}

impl fmt::Display for Timestamp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S%.3f"))
  }
}

impl Serialize for Timestamp {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Timestamp {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
      .map(Self)
      .map_err(serde::de::Error::custom)
  }
}

impl schemars::JsonSchema for Timestamp {
  fn schema_name() -> String {
    "Timestamp".to_string()
  }

  fn json_schema(generator: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
    <String as schemars::JsonSchema>::json_schema(generator)
  }
}

/// Inclusive time range a query restricts matching to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
  pub start: Timestamp,
  pub end: Timestamp,
}

impl Window {
  /// Build a window, returning `None` when `start > end`
  pub fn new(start: Timestamp, end: Timestamp) -> Option<Self> {
    (start <= end).then_some(Self { start, end })
  }

  pub fn contains(&self, ts: &Timestamp) -> bool {
    self.start <= *ts && *ts <= self.end
  }
}
