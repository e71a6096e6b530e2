//! The [Engine]: the orchestrator that ties a [Storage] backend, an
//! [Index], and the [Query] evaluator together into the read/write
//! surface spec.md §4.4 describes.
//!
//! All blocking I/O happens through `storage`; everything else here is
//! synchronous, single-threaded, in-memory work. A query that the
//! index can answer exactly skips deserializing anything but the
//! matching rows — `materialize` only calls [serialize::decode_fields]
//! on row-ids already known to be candidates, so a disqualified row
//! (say, one far outside a time range, or under the wrong measurement)
//! is never turned into a `Point` at all.

use chrono::Utc;

use crate::err_at;
use crate::error::Result;
use crate::index::{Index, RowId, RowIdSet};
use crate::point::Point;
use crate::query::{parse_path, AttrValue, Path, Query};
use crate::serialize::{self, KeyStyle};
use crate::storage::Storage;
use crate::updater::Updater;

/// Knobs an [Engine] is opened with.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Rebuild the index automatically the moment a read needs it.
    /// When `false`, reads against an invalid index fall back to a
    /// full scan for that one call and the index stays invalid until
    /// [Engine::reindex] is called explicitly (spec.md §4.3).
    pub auto_index: bool,
    /// Write new rows with the compact `t_`/`f_` key prefixes instead
    /// of the default `__tag__`/`__field__` ones.
    pub compact_keys: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            auto_index: true,
            compact_keys: false,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        EngineConfig::default()
    }

    pub fn auto_index(mut self, v: bool) -> Self {
        self.auto_index = v;
        self
    }

    pub fn compact_keys(mut self, v: bool) -> Self {
        self.compact_keys = v;
        self
    }
}

pub struct Engine<S: Storage> {
    storage: S,
    index: Index,
    config: EngineConfig,
}

impl<S: Storage> Engine<S> {
    /// Open `storage`, building the index from whatever it already
    /// contains. A freshly created backend indexes as an empty, valid
    /// dataset; a reopened one replays its full history.
    pub fn open(storage: S, config: EngineConfig) -> Result<Self> {
        let mut engine = Engine {
            storage,
            index: Index::new(),
            config,
        };
        engine.reindex()?;
        Ok(engine)
    }

    fn style(&self) -> KeyStyle {
        if self.config.compact_keys {
            KeyStyle::Compact
        } else {
            KeyStyle::Full
        }
    }

    pub fn row_count(&self) -> usize {
        self.storage.length()
    }

    pub fn index_valid(&self) -> bool {
        self.index.is_valid()
    }

    /// Force a full rebuild of the index from storage.
    pub fn reindex(&mut self) -> Result<()> {
        let rows = self.storage.read_all()?;
        let mut decoded = Vec::with_capacity(rows.len());
        for (id, raw) in rows {
            decoded.push((id, serialize::decode_fields(&raw)?));
        }
        self.index.rebuild(decoded.into_iter())?;
        Ok(())
    }

    fn maybe_reindex(&mut self) -> Result<()> {
        if self.config.auto_index && !self.index.is_valid() {
            log::debug!("auto_index: index invalid, rebuilding before read");
            self.reindex()?;
        }
        Ok(())
    }

    // -- writes ----------------------------------------------------

    pub fn insert(&mut self, mut point: Point) -> Result<RowId> {
        if point.time.is_none() {
            point.time = Some(Utc::now());
        }
        let raw = serialize::encode_fields(&point, self.style());
        let row_id = self.storage.append(raw)?;
        self.index.insert(row_id, &point);
        Ok(row_id)
    }

    /// Insert `points`, appending to storage (and updating the index)
    /// in batches of `batch_size`. A point with no timestamp is
    /// stamped with the current time, same as [Engine::insert].
    pub fn insert_multiple<I>(&mut self, points: I, batch_size: usize) -> Result<Vec<RowId>>
    where
        I: IntoIterator<Item = Point>,
    {
        if batch_size < 1 {
            return err_at!(Invalid, msg: "batch_size must be >= 1, got {}", batch_size);
        }
        let style = self.style();
        let mut ids = Vec::new();
        let mut chunk: Vec<Point> = Vec::with_capacity(batch_size);
        for mut p in points {
            if p.time.is_none() {
                p.time = Some(Utc::now());
            }
            chunk.push(p);
            if chunk.len() == batch_size {
                ids.extend(self.flush_chunk(&mut chunk, style)?);
            }
        }
        if !chunk.is_empty() {
            ids.extend(self.flush_chunk(&mut chunk, style)?);
        }
        Ok(ids)
    }

    fn flush_chunk(&mut self, chunk: &mut Vec<Point>, style: KeyStyle) -> Result<Vec<RowId>> {
        let raws = chunk.iter().map(|p| serialize::encode_fields(p, style)).collect();
        let ids = self.storage.append_many(raws)?;
        for (id, p) in ids.iter().zip(chunk.iter()) {
            self.index.insert(*id, p);
        }
        chunk.clear();
        Ok(ids)
    }

    // -- reads -------------------------------------------------------

    /// Candidate row-ids plus residual predicate for `query`, taking
    /// the index fast path when valid. With an invalid index and
    /// `auto_index = false`, every row is a candidate and the whole
    /// query is left as residual (a plain full scan).
    fn resolve(&mut self, query: &Query) -> Result<(RowIdSet, Option<Query>)> {
        self.maybe_reindex()?;
        if self.index.is_valid() {
            let pe = query.partial_eval(&self.index);
            Ok((pe.candidates, pe.residual))
        } else {
            log::debug!("resolve: index invalid and auto_index=false, falling back to full scan");
            let all: RowIdSet = (0..self.storage.length() as RowId).collect();
            Ok((all, Some(query.clone())))
        }
    }

    fn materialize(&self, candidates: &RowIdSet, residual: &Option<Query>) -> Result<Vec<(RowId, Point)>> {
        let mut out = Vec::new();
        for (id, raw) in self.storage.read_all()? {
            if candidates.binary_search(&id).is_err() {
                continue;
            }
            let point = serialize::decode_fields(&raw)?;
            let keep = match residual {
                None => true,
                Some(q) => q.eval(&point),
            };
            if keep {
                out.push((id, point));
            }
        }
        Ok(out)
    }

    fn sort_points(rows: &mut [(RowId, Point)]) {
        rows.sort_by(|a, b| a.1.time.cmp(&b.1.time).then(a.0.cmp(&b.0)));
    }

    /// All points matching `query`. Sorted by time ascending (row-id
    /// ascending on ties) unless `sorted = false`, in which case rows
    /// come back in storage (insertion) order.
    pub fn search(&mut self, query: &Query, sorted: bool) -> Result<Vec<Point>> {
        let (candidates, residual) = self.resolve(query)?;
        let mut rows = self.materialize(&candidates, &residual)?;
        if sorted {
            Self::sort_points(&mut rows);
        }
        Ok(rows.into_iter().map(|(_, p)| p).collect())
    }

    /// Whether any point matches `query`. Short-circuits on the first
    /// match rather than materializing the whole candidate set.
    pub fn contains(&mut self, query: &Query) -> Result<bool> {
        let (candidates, residual) = self.resolve(query)?;
        if candidates.is_empty() {
            return Ok(false);
        }
        match residual {
            None => Ok(true),
            Some(r) => {
                for (id, raw) in self.storage.read_all()? {
                    if candidates.binary_search(&id).is_err() {
                        continue;
                    }
                    if r.eval(&serialize::decode_fields(&raw)?) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Count of points matching `query`. Skips deserialization entirely
    /// when the index answers the query exactly.
    pub fn count(&mut self, query: &Query) -> Result<usize> {
        let (candidates, residual) = self.resolve(query)?;
        match residual {
            None => Ok(candidates.len()),
            Some(r) => {
                let mut n = 0;
                for (id, raw) in self.storage.read_all()? {
                    if candidates.binary_search(&id).is_err() {
                        continue;
                    }
                    if r.eval(&serialize::decode_fields(&raw)?) {
                        n += 1;
                    }
                }
                Ok(n)
            }
        }
    }

    /// The earliest-by-time match (row-id ascending tie-break), or
    /// `None` if nothing matches.
    pub fn get(&mut self, query: &Query) -> Result<Option<Point>> {
        let (candidates, residual) = self.resolve(query)?;
        let mut rows = self.materialize(&candidates, &residual)?;
        Self::sort_points(&mut rows);
        Ok(rows.into_iter().next().map(|(_, p)| p))
    }

    /// Project `paths` (e.g. `"time"`, `"tags.city"`, `"fields.aqi"`)
    /// out of every point matching `query`. A path naming an attribute
    /// the point doesn't have yields `None` in that column; an
    /// unparseable path string is an error up front.
    pub fn select(&mut self, paths: &[&str], query: &Query) -> Result<Vec<Vec<Option<AttrValue>>>> {
        let parsed: Result<Vec<Path>> = paths.iter().map(|s| parse_path(s)).collect();
        let parsed = parsed?;
        let points = self.search(query, true)?;
        Ok(points
            .iter()
            .map(|p| parsed.iter().map(|path| crate::query::lookup(path, p)).collect())
            .collect())
    }

    pub fn get_measurements(&mut self) -> Result<std::collections::HashSet<String>> {
        self.maybe_reindex()?;
        if self.index.is_valid() {
            Ok(self.index.measurements())
        } else {
            let mut set = std::collections::HashSet::new();
            for (_, raw) in self.storage.read_all()? {
                set.insert(serialize::decode_fields(&raw)?.measurement);
            }
            Ok(set)
        }
    }

    pub fn get_tag_keys(&mut self) -> Result<std::collections::HashSet<String>> {
        self.maybe_reindex()?;
        if self.index.is_valid() {
            Ok(self.index.tag_keys())
        } else {
            let mut set = std::collections::HashSet::new();
            for (_, raw) in self.storage.read_all()? {
                set.extend(serialize::decode_fields(&raw)?.tags.into_keys());
            }
            Ok(set)
        }
    }

    pub fn get_tag_values(&mut self, key: &str) -> Result<std::collections::HashSet<String>> {
        self.maybe_reindex()?;
        if self.index.is_valid() {
            Ok(self.index.tag_values(key))
        } else {
            let mut set = std::collections::HashSet::new();
            for (_, raw) in self.storage.read_all()? {
                if let Some(v) = serialize::decode_fields(&raw)?.tags.remove(key) {
                    set.insert(v);
                }
            }
            Ok(set)
        }
    }

    pub fn get_field_keys(&mut self) -> Result<std::collections::HashSet<String>> {
        self.maybe_reindex()?;
        if self.index.is_valid() {
            Ok(self.index.field_keys_set())
        } else {
            let mut set = std::collections::HashSet::new();
            for (_, raw) in self.storage.read_all()? {
                set.extend(serialize::decode_fields(&raw)?.fields.into_keys());
            }
            Ok(set)
        }
    }

    /// Every distinct value ever stored under `fields.<key>`. The
    /// index has no by-field-value map (only by-key), so this always
    /// scans regardless of index validity.
    pub fn get_field_values(&mut self, key: &str) -> Result<Vec<crate::point::Value>> {
        let mut values = Vec::new();
        for (_, raw) in self.storage.read_all()? {
            if let Some(v) = serialize::decode_fields(&raw)?.fields.remove(key) {
                if !values.contains(&v) {
                    values.push(v);
                }
            }
        }
        Ok(values)
    }

    pub fn get_timestamps(&mut self) -> Result<Vec<chrono::DateTime<Utc>>> {
        self.maybe_reindex()?;
        if self.index.is_valid() {
            Ok(self.index.timestamps())
        } else {
            let mut times = Vec::new();
            for (_, raw) in self.storage.read_all()? {
                if let Some(t) = serialize::decode_fields(&raw)?.time {
                    times.push(t);
                }
            }
            times.sort();
            Ok(times)
        }
    }

    // -- rewrites ------------------------------------------------------

    fn rewrite_with(&mut self, matches: impl Fn(&Point) -> bool, updater: &Updater) -> Result<usize> {
        let style = self.style();
        let rows = self.storage.read_all()?;
        let mut new_rows = Vec::with_capacity(rows.len());
        let mut touched = 0;
        for (_, raw) in &rows {
            let point = serialize::decode_fields(raw)?;
            if matches(&point) {
                touched += 1;
                new_rows.push(serialize::encode_fields(&updater.apply(&point), style));
            } else {
                new_rows.push(raw.clone());
            }
        }
        self.storage.rewrite(new_rows)?;
        self.reindex()?;
        Ok(touched)
    }

    /// Rewrite every point matching `query` through `updater`. Always
    /// performs a full stage-and-swap rewrite of storage, even if
    /// nothing ends up touched, and leaves the previous dataset intact
    /// if the rewrite itself fails (spec.md §7).
    pub fn update(&mut self, query: &Query, updater: &Updater) -> Result<usize> {
        self.rewrite_with(|p| query.eval(p), updater)
    }

    pub fn update_all(&mut self, updater: &Updater) -> Result<usize> {
        self.rewrite_with(|_| true, updater)
    }

    fn remove_with(&mut self, matches: impl Fn(&Point) -> bool) -> Result<usize> {
        let rows = self.storage.read_all()?;
        let mut kept = Vec::with_capacity(rows.len());
        let mut removed = 0;
        for (_, raw) in &rows {
            let point = serialize::decode_fields(raw)?;
            if matches(&point) {
                removed += 1;
            } else {
                kept.push(raw.clone());
            }
        }
        self.storage.rewrite(kept)?;
        self.reindex()?;
        Ok(removed)
    }

    pub fn remove(&mut self, query: &Query) -> Result<usize> {
        self.remove_with(|p| query.eval(p))
    }

    pub fn remove_all(&mut self) -> Result<()> {
        self.storage.rewrite(Vec::new())?;
        self.index = Index::new();
        Ok(())
    }

    // -- full scans ------------------------------------------------

    pub fn all(&mut self, sorted: bool) -> Result<Vec<Point>> {
        self.maybe_reindex()?;
        let mut rows = Vec::new();
        for (id, raw) in self.storage.read_all()? {
            rows.push((id, serialize::decode_fields(&raw)?));
        }
        if sorted {
            Self::sort_points(&mut rows);
        }
        Ok(rows.into_iter().map(|(_, p)| p).collect())
    }

    pub fn close(&mut self) -> Result<()> {
        self.storage.close()
    }

    pub fn lock(&self) -> Result<()> {
        self.storage.lock()
    }

    pub fn unlock(&self) -> Result<()> {
        self.storage.unlock()
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
