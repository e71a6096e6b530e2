use super::*;
use crate::point::Value;
use crate::query::{FieldQuery, TagQuery, TimeQuery};
use crate::storage::MemoryBackend;
use chrono::TimeZone;
use std::cell::Cell;
use std::rc::Rc;

fn ts(y: i32, m: u32, d: u32, h: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn open() -> Engine<MemoryBackend> {
    Engine::open(MemoryBackend::new(), EngineConfig::new()).unwrap()
}

fn aqi_point(city: &str, hour: u32, aqi: i64) -> Point {
    Point::new()
        .with_measurement("air_quality")
        .with_tag("city", city)
        .with_field("aqi", Value::Int(aqi))
        .with_time(ts(2024, 1, 1, hour))
}

#[test]
fn insert_and_search_round_trip() {
    let mut e = open();
    e.insert(aqi_point("LA", 0, 42)).unwrap();
    e.insert(aqi_point("SF", 1, 12)).unwrap();

    let hits = e.search(&TagQuery::key("city").eq("LA"), true).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].field("aqi"), Some(&Value::Int(42)));
}

#[test]
fn out_of_order_insert_invalidates_then_reindex_restores() {
    let mut e = open();
    e.insert(aqi_point("LA", 5, 1)).unwrap();
    e.insert(aqi_point("LA", 2, 2)).unwrap(); // out of order: invalidates
    assert!(!e.index_valid());

    // auto_index=true means a read transparently rebuilds first.
    let all = e.search(&TimeQuery::ge(ts(2024, 1, 1, 0)), true).unwrap();
    assert!(e.index_valid());
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].field("aqi"), Some(&Value::Int(2))); // rebuilt, sorted by time
}

#[test]
fn unsupported_leaf_sees_every_row_after_an_out_of_order_rebuild() {
    // A regex/predicate leaf has no index fast path, so `partial_eval`
    // falls back to `index.all_rows()` as its candidate set. After an
    // out-of-order insert forces a rebuild, `all_rows()` must still be
    // row-id-sorted, or rows get silently dropped from the scan.
    let mut e = open();
    e.insert(aqi_point("LA", 5, 1)).unwrap(); // row 0, later timestamp
    e.insert(aqi_point("LA", 2, 2)).unwrap(); // row 1, earlier: invalidates
    assert!(!e.index_valid());

    let always_true = FieldQuery::key("aqi").test(|_| true);
    let hits = e.search(&always_true, false).unwrap();
    assert_eq!(hits.len(), 2, "both rows must survive an unsupported-leaf scan after rebuild");
    assert!(e.index_valid());
}

#[test]
fn auto_index_false_never_rebuilds_on_its_own() {
    let mut e = Engine::open(MemoryBackend::new(), EngineConfig::new().auto_index(false)).unwrap();
    e.insert(aqi_point("LA", 5, 1)).unwrap();
    e.insert(aqi_point("LA", 2, 2)).unwrap();
    assert!(!e.index_valid());

    let all = e.search(&TimeQuery::ge(ts(2024, 1, 1, 0)), false).unwrap();
    assert_eq!(all.len(), 2);
    assert!(!e.index_valid(), "auto_index=false must never rebuild implicitly");

    e.reindex().unwrap();
    assert!(e.index_valid());
}

#[test]
fn get_tie_breaks_on_row_id_ascending() {
    let mut e = open();
    let t = ts(2024, 1, 1, 0);
    e.insert(Point::new().with_time(t).with_tag("city", "LA")).unwrap();
    e.insert(Point::new().with_time(t).with_tag("city", "SF")).unwrap();

    let found = e.get(&TimeQuery::eq(t)).unwrap().unwrap();
    assert_eq!(found.tag("city"), Some("LA"));
}

#[test]
fn update_all_merges_tags_and_unsets_a_field() {
    let mut e = open();
    e.insert(aqi_point("LA", 0, 1)).unwrap();
    e.insert(aqi_point("SF", 1, 2)).unwrap();

    let updater = Updater::new()
        .tags(|_| {
            let mut m = crate::point::Tags::new();
            m.insert("region".to_string(), "west".to_string());
            m
        })
        .unset_fields(["aqi"]);
    let touched = e.update_all(&updater).unwrap();
    assert_eq!(touched, 2);

    let all = e.all(true).unwrap();
    assert!(all.iter().all(|p| p.tag("region") == Some("west")));
    assert!(all.iter().all(|p| p.field("aqi").is_none()));
    // original tags survive the merge
    assert_eq!(all[0].tag("city"), Some("LA"));
}

#[test]
fn remove_drops_only_matching_rows() {
    let mut e = open();
    e.insert(aqi_point("LA", 0, 1)).unwrap();
    e.insert(aqi_point("SF", 1, 2)).unwrap();

    let removed = e.remove(&TagQuery::key("city").eq("LA")).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(e.row_count(), 1);
    assert_eq!(e.all(true).unwrap()[0].tag("city"), Some("SF"));
}

#[test]
fn remove_all_empties_the_dataset() {
    let mut e = open();
    e.insert(aqi_point("LA", 0, 1)).unwrap();
    e.remove_all().unwrap();
    assert_eq!(e.row_count(), 0);
    assert!(e.index_valid());
}

#[test]
fn residual_predicate_only_runs_against_index_candidates() {
    let mut e = open();
    for h in 0..5 {
        e.insert(aqi_point("LA", h, h as i64)).unwrap();
    }
    for h in 0..5 {
        e.insert(aqi_point("SF", h, h as i64)).unwrap();
    }

    let calls = Rc::new(Cell::new(0usize));
    let calls2 = calls.clone();
    let residual = FieldQuery::key("aqi").test(move |_| {
        calls2.set(calls2.get() + 1);
        true
    });
    // city == LA is index-exact; ANDed with a residual predicate, the
    // predicate should only run against the 5 LA rows, not all 10.
    let query = TagQuery::key("city").eq("LA") & residual;
    let hits = e.search(&query, true).unwrap();
    assert_eq!(hits.len(), 5);
    assert_eq!(calls.get(), 5);
}

#[test]
fn contains_short_circuits_on_first_match() {
    let mut e = open();
    e.insert(aqi_point("LA", 0, 1)).unwrap();
    e.insert(aqi_point("LA", 1, 2)).unwrap();
    assert!(e.contains(&TagQuery::key("city").eq("LA")).unwrap());
    assert!(!e.contains(&TagQuery::key("city").eq("NYC")).unwrap());
}

#[test]
fn select_projects_requested_paths() {
    let mut e = open();
    e.insert(aqi_point("LA", 0, 42)).unwrap();

    let rows = e.select(&["tags.city", "fields.aqi"], &TagQuery::key("city").eq("LA")).unwrap();
    assert_eq!(rows.len(), 1);
    match &rows[0][0] {
        Some(crate::query::AttrValue::Str(s)) => assert_eq!(s, "LA"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn select_rejects_unknown_path() {
    let mut e = open();
    e.insert(aqi_point("LA", 0, 42)).unwrap();
    let err = e.select(&["bogus.path"], &TagQuery::key("city").eq("LA"));
    assert!(err.is_err());
}

#[test]
fn insert_multiple_batches_and_indexes_incrementally() {
    let mut e = open();
    let points = (0..7).map(|h| aqi_point("LA", h, h as i64));
    let ids = e.insert_multiple(points, 3).unwrap();
    assert_eq!(ids.len(), 7);
    assert_eq!(ids, (0..7).collect::<Vec<_>>());
    assert_eq!(e.row_count(), 7);
    assert!(e.index_valid());
}

#[test]
fn insert_multiple_rejects_zero_batch_size() {
    let mut e = open();
    let err = e.insert_multiple(std::iter::once(aqi_point("LA", 0, 1)), 0);
    assert!(err.is_err());
}

#[test]
fn get_measurements_and_tag_catalog_are_index_backed() {
    let mut e = open();
    e.insert(aqi_point("LA", 0, 1)).unwrap();
    e.insert(Point::new().with_measurement("traffic").with_tag("road", "101")).unwrap();

    let measurements = e.get_measurements().unwrap();
    assert!(measurements.contains("air_quality"));
    assert!(measurements.contains("traffic"));

    let tag_keys = e.get_tag_keys().unwrap();
    assert!(tag_keys.contains("city"));
    assert!(tag_keys.contains("road"));
}

#[test]
fn reopening_backend_with_existing_rows_rebuilds_index() {
    let mut backend = MemoryBackend::new();
    backend
        .append(crate::serialize::encode_fields(&aqi_point("LA", 0, 1), crate::serialize::KeyStyle::Full))
        .unwrap();
    let e = Engine::open(backend, EngineConfig::new()).unwrap();
    assert!(e.index_valid());
    assert_eq!(e.row_count(), 1);
}
