//! [Point], the immutable value object this whole datastore is built
//! around: a timestamp, a measurement name, a tag map, and a field map.
//!
//! A point with `time = None` is in the distinguished "unstamped" state;
//! it is preserved through serialization as such and is only filled in
//! by the engine at the moment it is first inserted (see `engine.rs`).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

/// Default measurement name used when a point does not name one.
pub const DEFAULT_MEASUREMENT: &str = "_default";

/// Tag values are always plain strings; the empty string is valid.
pub type Tags = BTreeMap<String, String>;

/// A field's value, closed over the three primitive kinds tinyflux
/// will ever store. Integer and floating point are kept as distinct
/// variants so that the exact representation chosen at insert survives
/// a round trip (spec: "Numeric values keep exact representation").
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    /// Ordered comparison within the same variant. Cross-variant
    /// comparisons (e.g. Int vs Str) are not meaningful and yield
    /// `None`, which leaf-level comparisons treat as "does not match".
    pub fn partial_compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a.partial_cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (Bool(a), Bool(b)) => a.partial_cmp(b),
            (Str(a), Str(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", if *v { "True" } else { "False" }),
            Value::Str(v) => write!(f, "{}", v),
        }
    }
}

pub type Fields = BTreeMap<String, Value>;

/// A single time-series observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub time: Option<DateTime<Utc>>,
    pub measurement: String,
    pub tags: Tags,
    pub fields: Fields,
}

impl Default for Point {
    fn default() -> Self {
        Point {
            time: None,
            measurement: DEFAULT_MEASUREMENT.to_string(),
            tags: Tags::new(),
            fields: Fields::new(),
        }
    }
}

impl Point {
    pub fn new() -> Self {
        Point::default()
    }

    /// Stamp with an already-UTC instant.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Stamp with a naive (timezone-less) instant, interpreted as local
    /// time and converted to UTC, per spec.md §8 "Naive-timezone insert".
    pub fn with_time_naive(mut self, naive: NaiveDateTime) -> Self {
        self.time = Some(match Local.from_local_datetime(&naive).single() {
            Some(local) => local.with_timezone(&Utc),
            // ambiguous/non-existent local time (DST fold/gap): fall back
            // to treating the naive value as if it were already UTC.
            None => Utc.from_utc_datetime(&naive),
        });
        self
    }

    pub fn with_measurement<S: Into<String>>(mut self, name: S) -> Self {
        self.measurement = name.into();
        self
    }

    pub fn with_tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_field<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

#[cfg(test)]
#[path = "point_test.rs"]
mod point_test;
