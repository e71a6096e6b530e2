//! [MeasurementView]: a scoped façade over an [Engine] for a single
//! measurement name (spec.md §4.6).
//!
//! Every query-taking call is rewritten to also require
//! `measurement == name`; every insert is stamped with that name
//! before it reaches the engine. Everything else — `reindex`,
//! `row_count`, the `get_*` catalog calls — passes straight through
//! unscoped, since those report on the whole dataset by design.

use chrono::{DateTime, Utc};

use crate::engine::Engine;
use crate::error::Result;
use crate::index::RowId;
use crate::point::Point;
use crate::query::{AttrValue, MeasurementQuery, Query};
use crate::storage::Storage;
use crate::updater::Updater;

pub struct MeasurementView<'a, S: Storage> {
    engine: &'a mut Engine<S>,
    name: String,
}

impl<'a, S: Storage> MeasurementView<'a, S> {
    pub fn new(engine: &'a mut Engine<S>, name: impl Into<String>) -> Self {
        MeasurementView {
            engine,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn scoped(&self, query: &Query) -> Query {
        MeasurementQuery::eq(self.name.clone()).and(query.clone())
    }

    fn only_this(&self) -> Query {
        MeasurementQuery::eq(self.name.clone())
    }

    pub fn insert(&mut self, point: Point) -> Result<RowId> {
        self.engine.insert(point.with_measurement(self.name.clone()))
    }

    pub fn insert_multiple<I>(&mut self, points: I, batch_size: usize) -> Result<Vec<RowId>>
    where
        I: IntoIterator<Item = Point>,
    {
        let name = self.name.clone();
        let stamped = points.into_iter().map(move |p| p.with_measurement(name.clone()));
        self.engine.insert_multiple(stamped, batch_size)
    }

    pub fn search(&mut self, query: &Query, sorted: bool) -> Result<Vec<Point>> {
        let q = self.scoped(query);
        self.engine.search(&q, sorted)
    }

    pub fn contains(&mut self, query: &Query) -> Result<bool> {
        let q = self.scoped(query);
        self.engine.contains(&q)
    }

    pub fn count(&mut self, query: &Query) -> Result<usize> {
        let q = self.scoped(query);
        self.engine.count(&q)
    }

    pub fn get(&mut self, query: &Query) -> Result<Option<Point>> {
        let q = self.scoped(query);
        self.engine.get(&q)
    }

    pub fn select(&mut self, paths: &[&str], query: &Query) -> Result<Vec<Vec<Option<AttrValue>>>> {
        let q = self.scoped(query);
        self.engine.select(paths, &q)
    }

    /// All points under this measurement (scoped, unlike
    /// [Engine::all]'s whole-dataset scan).
    pub fn all(&mut self, sorted: bool) -> Result<Vec<Point>> {
        let q = self.only_this();
        self.engine.search(&q, sorted)
    }

    pub fn update(&mut self, query: &Query, updater: &Updater) -> Result<usize> {
        let q = self.scoped(query);
        self.engine.update(&q, updater)
    }

    pub fn update_all(&mut self, updater: &Updater) -> Result<usize> {
        let q = self.only_this();
        self.engine.update(&q, updater)
    }

    pub fn remove(&mut self, query: &Query) -> Result<usize> {
        let q = self.scoped(query);
        self.engine.remove(&q)
    }

    /// Removes only this measurement's points, not the whole dataset.
    pub fn remove_all(&mut self) -> Result<usize> {
        let q = self.only_this();
        self.engine.remove(&q)
    }

    pub fn get_tag_keys(&mut self) -> Result<std::collections::HashSet<String>> {
        self.engine.get_tag_keys()
    }

    pub fn get_tag_values(&mut self, key: &str) -> Result<std::collections::HashSet<String>> {
        self.engine.get_tag_values(key)
    }

    pub fn get_field_keys(&mut self) -> Result<std::collections::HashSet<String>> {
        self.engine.get_field_keys()
    }

    pub fn get_field_values(&mut self, key: &str) -> Result<Vec<crate::point::Value>> {
        self.engine.get_field_values(key)
    }

    pub fn get_timestamps(&mut self) -> Result<Vec<DateTime<Utc>>> {
        self.engine.get_timestamps()
    }

    pub fn reindex(&mut self) -> Result<()> {
        self.engine.reindex()
    }

    pub fn row_count(&self) -> usize {
        self.engine.row_count()
    }
}

#[cfg(test)]
#[path = "measurement_test.rs"]
mod measurement_test;
