use super::*;
use crate::point::Value;
use chrono::TimeZone;

fn sample() -> Point {
    Point::new()
        .with_measurement("weather")
        .with_tag("city", "LA")
        .with_tag("room", "lobby")
        .with_field("aqi", Value::Int(10))
        .with_time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
}

#[test]
fn tags_merge_not_replace() {
    let p = sample();
    let u = Updater::new().tags(|_| {
        let mut m = Tags::new();
        m.insert("city".to_string(), "SF".to_string());
        m
    });
    let updated = u.apply(&p);
    assert_eq!(updated.tag("city"), Some("SF"));
    assert_eq!(updated.tag("room"), Some("lobby"));
}

#[test]
fn unset_tags_removes_after_merge() {
    let p = sample();
    let u = Updater::new().unset_tags(["room"]);
    let updated = u.apply(&p);
    assert_eq!(updated.tag("room"), None);
    assert_eq!(updated.tag("city"), Some("LA"));
}

#[test]
fn map_time_derives_from_old_value() {
    let p = sample();
    let u = Updater::new().map_time(|t| t + chrono::Duration::hours(1));
    let updated = u.apply(&p);
    assert_eq!(updated.time, Some(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()));
}

#[test]
fn set_measurement_replaces_outright() {
    let p = sample();
    let updated = Updater::new().set_measurement("climate").apply(&p);
    assert_eq!(updated.measurement, "climate");
}

#[test]
fn unset_fields_removes_key() {
    let p = sample();
    let updated = Updater::new().unset_fields(["aqi"]).apply(&p);
    assert_eq!(updated.field("aqi"), None);
}

#[test]
fn untouched_attributes_survive() {
    let p = sample();
    let updated = Updater::new().set_measurement("climate").apply(&p);
    assert_eq!(updated.tag("city"), Some("LA"));
    assert_eq!(updated.field("aqi"), Some(&Value::Int(10)));
}
