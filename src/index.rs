//! The in-memory index: a timestamp-sorted sequence of row-ids plus
//! inverted maps from measurement/tag/field attributes to row-ids.
//!
//! The index is authoritative only while `valid` is true. Out-of-order
//! inserts flip it false cheaply (§4.3); a full [Index::rebuild] is the
//! only way back to `valid = true`. Row-id sets are kept as sorted
//! `Vec<RowId>`, built in insertion order, so intersection/union/
//! complement are plain linear merges — no bitmap library needed at
//! the scale this engine targets.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::err_at;
use crate::error::Result;
use crate::point::Point;

pub type RowId = u64;

/// A sorted, deduplicated set of row-ids.
pub type RowIdSet = Vec<RowId>;

pub fn set_union(a: &[RowId], b: &[RowId]) -> RowIdSet {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

pub fn set_intersect(a: &[RowId], b: &[RowId]) -> RowIdSet {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// `all \ set`, both assumed sorted.
pub fn set_complement(all: &[RowId], set: &[RowId]) -> RowIdSet {
    let mut out = Vec::with_capacity(all.len().saturating_sub(set.len()));
    let mut j = 0;
    for &id in all {
        while j < set.len() && set[j] < id {
            j += 1;
        }
        if j >= set.len() || set[j] != id {
            out.push(id);
        }
    }
    out
}

/// Timestamp-sorted plus inverted-map index over a storage backend.
#[derive(Debug, Default)]
pub struct Index {
    /// (timestamp, row-id) pairs, sorted by timestamp then row-id.
    timestamps: Vec<(DateTime<Utc>, RowId)>,
    by_measurement: BTreeMap<String, RowIdSet>,
    by_tag: BTreeMap<(String, String), RowIdSet>,
    tag_keys: BTreeMap<String, RowIdSet>,
    field_keys: BTreeMap<String, RowIdSet>,
    max_time: Option<DateTime<Utc>>,
    valid: bool,
    empty: bool,
}

impl Index {
    pub fn new() -> Self {
        Index {
            timestamps: Vec::new(),
            by_measurement: BTreeMap::new(),
            by_tag: BTreeMap::new(),
            tag_keys: BTreeMap::new(),
            field_keys: BTreeMap::new(),
            max_time: None,
            valid: true,
            empty: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn row_count(&self) -> usize {
        self.timestamps.len()
    }

    /// Insert one freshly-appended point. If its timestamp is not
    /// strictly behind the maximum seen so far, the index absorbs it
    /// in place; otherwise the index is marked invalid and left
    /// otherwise unchanged (spec.md §4.3).
    pub fn insert(&mut self, row_id: RowId, point: &Point) {
        if !self.valid {
            return;
        }
        let time = point.time.expect("point must be stamped before indexing");
        if !self.empty && time < self.max_time.unwrap() {
            log::debug!("out-of-order insert at row {}, index now invalid", row_id);
            self.valid = false;
            return;
        }

        self.timestamps.push((time, row_id));
        push_sorted(self.by_measurement.entry(point.measurement.clone()).or_default(), row_id);
        for (k, v) in &point.tags {
            push_sorted(self.by_tag.entry((k.clone(), v.clone())).or_default(), row_id);
            push_sorted(self.tag_keys.entry(k.clone()).or_default(), row_id);
        }
        for k in point.fields.keys() {
            push_sorted(self.field_keys.entry(k.clone()).or_default(), row_id);
        }

        self.max_time = Some(time);
        self.empty = false;
    }

    /// Discard all accumulated state and rebuild from a full scan.
    /// `rows` must be an iterator of `(row_id, point)` in storage order.
    /// Errors (e.g. a row with no timestamp) abort the rebuild and
    /// leave the index invalid rather than partially populated.
    pub fn rebuild<I>(&mut self, rows: I) -> Result<()>
    where
        I: Iterator<Item = (RowId, Point)>,
    {
        log::trace!("reindex: full rebuild starting");
        self.timestamps.clear();
        self.by_measurement.clear();
        self.by_tag.clear();
        self.tag_keys.clear();
        self.field_keys.clear();
        self.max_time = None;
        self.empty = true;
        self.valid = false;

        for (row_id, point) in rows {
            let time = match point.time {
                Some(t) => t,
                None => {
                    return err_at!(Invalid, msg: "row {} has no timestamp, cannot be indexed", row_id);
                }
            };
            self.timestamps.push((time, row_id));
            self.by_measurement
                .entry(point.measurement.clone())
                .or_default()
                .push(row_id);
            for (k, v) in &point.tags {
                self.by_tag
                    .entry((k.clone(), v.clone()))
                    .or_default()
                    .push(row_id);
                self.tag_keys.entry(k.clone()).or_default().push(row_id);
            }
            for k in point.fields.keys() {
                self.field_keys.entry(k.clone()).or_default().push(row_id);
            }
            self.max_time = Some(time);
            self.empty = false;
        }

        // stable tie-break by row-id on equal timestamps.
        self.timestamps.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        for set in self.by_measurement.values_mut() {
            set.sort_unstable();
        }
        for set in self.by_tag.values_mut() {
            set.sort_unstable();
        }
        for set in self.tag_keys.values_mut() {
            set.sort_unstable();
        }
        for set in self.field_keys.values_mut() {
            set.sort_unstable();
        }
        self.valid = true;
        log::trace!("reindex: rebuild complete, {} rows", self.timestamps.len());
        Ok(())
    }

    /// Every row-id currently indexed, in ascending `RowId` order —
    /// NOT timestamp order; `timestamps` is sorted by time, but
    /// `set_union`/`set_intersect`/`set_complement` and callers doing
    /// `binary_search` all require numeric order.
    pub fn all_rows(&self) -> RowIdSet {
        let mut out: RowIdSet = self.timestamps.iter().map(|(_, id)| *id).collect();
        out.sort_unstable();
        out
    }

    pub fn rows_in_time_range(
        &self,
        lo: Option<DateTime<Utc>>,
        hi: Option<DateTime<Utc>>,
        lo_inclusive: bool,
        hi_inclusive: bool,
    ) -> RowIdSet {
        let start = match lo {
            None => 0,
            Some(lo) => {
                if lo_inclusive {
                    self.timestamps.partition_point(|(t, _)| *t < lo)
                } else {
                    self.timestamps.partition_point(|(t, _)| *t <= lo)
                }
            }
        };
        let end = match hi {
            None => self.timestamps.len(),
            Some(hi) => {
                if hi_inclusive {
                    self.timestamps.partition_point(|(t, _)| *t <= hi)
                } else {
                    self.timestamps.partition_point(|(t, _)| *t < hi)
                }
            }
        };
        if start >= end {
            return RowIdSet::new();
        }
        let mut out: RowIdSet = self.timestamps[start..end].iter().map(|(_, id)| *id).collect();
        out.sort_unstable();
        out
    }

    pub fn rows_for_measurement(&self, name: &str) -> RowIdSet {
        self.by_measurement.get(name).cloned().unwrap_or_default()
    }

    pub fn rows_for_tag(&self, key: &str, value: &str) -> RowIdSet {
        self.by_tag
            .get(&(key.to_string(), value.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn rows_with_tag_key(&self, key: &str) -> RowIdSet {
        self.tag_keys.get(key).cloned().unwrap_or_default()
    }

    pub fn rows_with_field_key(&self, key: &str) -> RowIdSet {
        self.field_keys.get(key).cloned().unwrap_or_default()
    }

    pub fn measurements(&self) -> HashSet<String> {
        self.by_measurement.keys().cloned().collect()
    }

    pub fn tag_keys(&self) -> HashSet<String> {
        self.tag_keys.keys().cloned().collect()
    }

    pub fn tag_values(&self, key: &str) -> HashSet<String> {
        self.by_tag
            .keys()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn field_keys_set(&self) -> HashSet<String> {
        self.field_keys.keys().cloned().collect()
    }

    /// All timestamps, ascending (row-id ascending on ties).
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.timestamps.iter().map(|(t, _)| *t).collect()
    }
}

fn push_sorted(set: &mut RowIdSet, row_id: RowId) {
    // callers insert in append order, so sets stay sorted; this just
    // documents/guards the invariant rather than re-sorting each time.
    debug_assert!(set.last().map_or(true, |&last| last < row_id));
    set.push(row_id);
}

#[cfg(test)]
#[path = "index_test.rs"]
mod index_test;
