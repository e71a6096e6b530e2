use super::*;
use crate::point::{Point, Value};
use chrono::TimeZone;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn point_at(secs: i64) -> Point {
    Point::new().with_time(t(secs)).with_measurement("m")
}

#[test]
fn empty_index_is_valid_and_empty() {
    let idx = Index::new();
    assert!(idx.is_valid());
    assert!(idx.is_empty());
    assert_eq!(idx.row_count(), 0);
}

#[test]
fn in_order_inserts_stay_valid() {
    let mut idx = Index::new();
    for i in 0..10u64 {
        idx.insert(i, &point_at(i as i64));
    }
    assert!(idx.is_valid());
    assert_eq!(idx.row_count(), 10);
}

#[test]
fn out_of_order_insert_invalidates() {
    let mut idx = Index::new();
    for i in 0..10u64 {
        idx.insert(i, &point_at(i as i64));
    }
    idx.insert(10, &point_at(1));
    assert!(!idx.is_valid());
}

#[test]
fn rebuild_restores_validity_and_row_count() {
    let mut idx = Index::new();
    for i in 0..10u64 {
        idx.insert(i, &point_at(i as i64));
    }
    idx.insert(10, &point_at(1));
    assert!(!idx.is_valid());

    let rows: Vec<(RowId, Point)> = (0..11)
        .map(|i| (i as u64, point_at(if i == 10 { 1 } else { i })))
        .collect();
    idx.rebuild(rows.into_iter()).unwrap();
    assert!(idx.is_valid());
    assert_eq!(idx.row_count(), 11);
}

#[test]
fn rebuild_rejects_unstamped_row_instead_of_panicking() {
    let mut idx = Index::new();
    let rows = vec![(0u64, Point::new())]; // time = None
    let err = idx.rebuild(rows.into_iter());
    assert!(err.is_err());
    assert!(!idx.is_valid());
}

#[test]
fn all_rows_is_row_id_sorted_even_after_an_out_of_order_rebuild() {
    // row 0 inserted at 5:00, row 1 at 2:00: out of order, then rebuilt.
    // `timestamps` ends up time-ordered as [(2:00, 1), (5:00, 0)], but
    // `all_rows()` must still come back in ascending RowId order.
    let mut idx = Index::new();
    idx.insert(0, &point_at(5));
    idx.insert(1, &point_at(2));
    assert!(!idx.is_valid());

    let rows = vec![(0u64, point_at(5)), (1u64, point_at(2))];
    idx.rebuild(rows.into_iter()).unwrap();
    assert!(idx.is_valid());

    let all = idx.all_rows();
    assert_eq!(all, vec![0, 1]);
    assert!(all.binary_search(&0).is_ok());
    assert!(all.binary_search(&1).is_ok());
}

#[test]
fn time_range_binary_search() {
    let mut idx = Index::new();
    for i in 0..5u64 {
        idx.insert(i, &point_at(i as i64 * 10));
    }
    let got = idx.rows_in_time_range(Some(t(10)), Some(t(30)), true, false);
    assert_eq!(got, vec![1, 2]);
}

#[test]
fn measurement_and_tag_lookups() {
    let mut idx = Index::new();
    let p0 = point_at(0).with_tag("city", "LA");
    let p1 = point_at(1).with_measurement("other").with_tag("city", "SF");
    idx.insert(0, &p0);
    idx.insert(1, &p1);

    assert_eq!(idx.rows_for_measurement("m"), vec![0]);
    assert_eq!(idx.rows_for_measurement("other"), vec![1]);
    assert_eq!(idx.rows_for_tag("city", "LA"), vec![0]);
    assert_eq!(idx.rows_with_tag_key("city"), vec![0, 1]);
}

#[test]
fn field_key_lookup() {
    let mut idx = Index::new();
    let p0 = point_at(0).with_field("aqi", Value::Int(1));
    idx.insert(0, &p0);
    assert_eq!(idx.rows_with_field_key("aqi"), vec![0]);
    assert!(idx.rows_with_field_key("missing").is_empty());
}

#[test]
fn set_ops_are_correct() {
    let a = vec![1, 2, 4, 6];
    let b = vec![2, 3, 4, 7];
    assert_eq!(set_union(&a, &b), vec![1, 2, 3, 4, 6, 7]);
    assert_eq!(set_intersect(&a, &b), vec![2, 4]);
    assert_eq!(set_complement(&a, &b), vec![1, 6]);
}
