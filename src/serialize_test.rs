use super::*;
use crate::point::Point;
use chrono::TimeZone;

fn sample() -> Point {
    Point::new()
        .with_time(Utc.timestamp_opt(1_598_598_000, 500_000_000).unwrap())
        .with_measurement("air")
        .with_tag("city", "LA")
        .with_tag("note", "")
        .with_field("aqi", Value::Int(112))
        .with_field("temp", Value::Float(0.0))
        .with_field("ok", Value::Bool(true))
        .with_field("label", Value::Str("clear".into()))
}

#[test]
fn round_trip_full_prefix() {
    let p = sample();
    let fields = encode_fields(&p, KeyStyle::Full);
    let back = decode_fields(&fields).unwrap();
    assert_eq!(p, back);
}

#[test]
fn round_trip_compact_prefix() {
    let p = sample();
    let fields = encode_fields(&p, KeyStyle::Compact);
    let back = decode_fields(&fields).unwrap();
    assert_eq!(p, back);
}

#[test]
fn unstamped_time_round_trips_as_none() {
    let p = Point::new();
    let fields = encode_fields(&p, KeyStyle::Full);
    assert_eq!(fields[0], "");
    let back = decode_fields(&fields).unwrap();
    assert_eq!(back.time, None);
}

#[test]
fn zero_float_serializes_with_decimal_point() {
    assert_eq!(encode_value(&Value::Float(0.0)), "0.0");
    assert_eq!(decode_value("0.0"), Value::Float(0.0));
}

#[test]
fn integer_has_no_decimal_point() {
    assert_eq!(encode_value(&Value::Int(5)), "5");
    assert_eq!(decode_value("5"), Value::Int(5));
}

#[test]
fn empty_string_tag_value_is_not_a_sentinel() {
    let p = Point::new().with_time(Utc::now()).with_tag("note", "");
    let fields = encode_fields(&p, KeyStyle::Full);
    let note_col = fields.iter().position(|f| f == "__tag__note").unwrap();
    assert_eq!(fields[note_col + 1], "");
    assert_ne!(fields[note_col + 1], "_none");
}

#[test]
fn reader_accepts_either_prefix_style_in_the_same_call() {
    let full = vec!["".to_string(), "m".to_string(), "__tag__city".to_string(), "LA".to_string()];
    let compact = vec!["".to_string(), "m".to_string(), "t_city".to_string(), "LA".to_string()];
    assert_eq!(decode_fields(&full).unwrap(), decode_fields(&compact).unwrap());
}

#[test]
fn bool_round_trips() {
    assert_eq!(decode_value(&encode_value(&Value::Bool(true))), Value::Bool(true));
    assert_eq!(decode_value(&encode_value(&Value::Bool(false))), Value::Bool(false));
}
