//! Point <-> text-row conversion (spec.md §4.5).
//!
//! A row is a flat list of fields: timestamp, measurement, then
//! alternating key/value columns for tags and fields, each key
//! prefixed to say which map it came from. Two prefix conventions
//! exist side by side: the full one (`__tag__`/`__field__`) and the
//! compact one (`t_`/`f_`). Writers pick one per insert; readers
//! accept either, so a file can mix rows written under different
//! settings over its lifetime.
//!
//! Numeric/boolean encoding keeps the declared kind recoverable from
//! the text alone (no separate type tag): an integer never carries a
//! decimal point, a float always does, and booleans serialize as the
//! literal words `True`/`False`. This is a deliberate, narrow
//! inference — a string field whose value happens to be exactly
//! `"True"` or `"5"` will round-trip as a bool/int instead. The
//! alternative (tagging every value with its type) would change the
//! on-disk shape; this crate keeps the simpler, documented trade-off.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::err_at;
use crate::error::Result;
use crate::point::{Point, Value};

pub const TAG_PREFIX_FULL: &str = "__tag__";
pub const FIELD_PREFIX_FULL: &str = "__field__";
pub const TAG_PREFIX_COMPACT: &str = "t_";
pub const FIELD_PREFIX_COMPACT: &str = "f_";

/// Which key-prefix convention a writer emits. Readers always accept both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStyle {
    Full,
    Compact,
}

pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        None => String::new(),
        Some(t) => t.to_rfc3339_opts(SecondsFormat::Micros, true),
    }
}

pub fn parse_time(s: &str) -> Result<Option<DateTime<Utc>>> {
    if s.is_empty() {
        return Ok(None);
    }
    match DateTime::parse_from_rfc3339(s) {
        Ok(t) => Ok(Some(t.with_timezone(&Utc))),
        Err(err) => err_at!(Invalid, msg: "bad timestamp {:?}: {}", s, err),
    }
}

fn format_float(v: f64) -> String {
    let s = format!("{}", v);
    if s.contains('.') || s.contains('e') || s.contains('E') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{}.0", s)
    }
}

pub fn encode_value(v: &Value) -> String {
    match v {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        Value::Str(s) => s.clone(),
    }
}

/// Infer the kind of a stored value from its text, per the module doc.
pub fn decode_value(s: &str) -> Value {
    if s == "True" {
        return Value::Bool(true);
    }
    if s == "False" {
        return Value::Bool(false);
    }
    if !s.contains('.') && !s.contains('e') && !s.contains('E') {
        if let Ok(i) = s.parse::<i64>() {
            return Value::Int(i);
        }
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Str(s.to_string())
}

fn tag_key(key: &str, style: KeyStyle) -> String {
    match style {
        KeyStyle::Full => format!("{}{}", TAG_PREFIX_FULL, key),
        KeyStyle::Compact => format!("{}{}", TAG_PREFIX_COMPACT, key),
    }
}

fn field_key(key: &str, style: KeyStyle) -> String {
    match style {
        KeyStyle::Full => format!("{}{}", FIELD_PREFIX_FULL, key),
        KeyStyle::Compact => format!("{}{}", FIELD_PREFIX_COMPACT, key),
    }
}

/// Build the flat column list for one point: `[time, measurement, k1,
/// v1, k2, v2, ...]`. Tags are emitted before fields; within each map,
/// columns follow the map's natural (sorted) key order, so encoding is
/// deterministic.
pub fn encode_fields(point: &Point, style: KeyStyle) -> Vec<String> {
    let mut out = Vec::with_capacity(2 + 2 * (point.tags.len() + point.fields.len()));
    out.push(format_time(point.time));
    out.push(point.measurement.clone());
    for (k, v) in &point.tags {
        out.push(tag_key(k, style));
        out.push(v.clone());
    }
    for (k, v) in &point.fields {
        out.push(field_key(k, style));
        out.push(encode_value(v));
    }
    out
}

/// Parse a flat column list back into a [Point]. Accepts either prefix
/// convention, even mixed within the same row (not expected in
/// practice, but harmless to allow).
pub fn decode_fields(fields: &[String]) -> Result<Point> {
    if fields.len() < 2 {
        return err_at!(Invalid, msg: "row has {} columns, need at least 2", fields.len());
    }
    if fields.len() % 2 != 0 {
        return err_at!(Invalid, msg: "row has odd trailing key/value column: {:?}", fields);
    }

    let time = parse_time(&fields[0])?;
    let measurement = fields[1].clone();
    let mut point = Point::new().with_measurement(measurement);
    point.time = time;

    let mut i = 2;
    while i + 1 < fields.len() {
        let key = &fields[i];
        let value = &fields[i + 1];
        if let Some(k) = key.strip_prefix(TAG_PREFIX_FULL).or_else(|| key.strip_prefix(TAG_PREFIX_COMPACT)) {
            point.tags.insert(k.to_string(), value.clone());
        } else if let Some(k) = key
            .strip_prefix(FIELD_PREFIX_FULL)
            .or_else(|| key.strip_prefix(FIELD_PREFIX_COMPACT))
        {
            point.fields.insert(k.to_string(), decode_value(value));
        } else {
            return err_at!(Invalid, msg: "column key {:?} has no tag/field prefix", key);
        }
        i += 2;
    }
    Ok(point)
}

#[cfg(test)]
#[path = "serialize_test.rs"]
mod serialize_test;
