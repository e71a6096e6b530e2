//! [Updater]: the description of an in-place point rewrite used by
//! `Engine::update`/`update_all` (spec.md §4.4.1).
//!
//! An updater is built up from a handful of independent knobs — each
//! attribute is either left alone, replaced outright, or derived from
//! its old value. Tags and fields are the odd ones out: their closures
//! receive the *current* map and return a map whose keys overwrite the
//! original (merge, not replace) — keys the closure's return value
//! omits are left untouched. `unset_tags`/`unset_fields` remove keys
//! after the merge.

use chrono::{DateTime, Utc};

use crate::point::{Fields, Point, Tags};

enum MeasurementUpdate {
    Set(String),
    Map(Box<dyn Fn(&str) -> String>),
}

enum TimeUpdate {
    Set(DateTime<Utc>),
    Map(Box<dyn Fn(DateTime<Utc>) -> DateTime<Utc>>),
}

/// A rewrite to apply to every point a query matches. Construct with
/// [Updater::new] and chain the setters that apply; unset attributes
/// are left untouched by [Updater::apply].
#[derive(Default)]
pub struct Updater {
    measurement: Option<MeasurementUpdate>,
    time: Option<TimeUpdate>,
    tags: Option<Box<dyn Fn(&Tags) -> Tags>>,
    unset_tags: Vec<String>,
    fields: Option<Box<dyn Fn(&Fields) -> Fields>>,
    unset_fields: Vec<String>,
}

impl Updater {
    pub fn new() -> Self {
        Updater::default()
    }

    pub fn set_measurement<S: Into<String>>(mut self, name: S) -> Self {
        self.measurement = Some(MeasurementUpdate::Set(name.into()));
        self
    }

    pub fn map_measurement(mut self, f: impl Fn(&str) -> String + 'static) -> Self {
        self.measurement = Some(MeasurementUpdate::Map(Box::new(f)));
        self
    }

    pub fn set_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(TimeUpdate::Set(time));
        self
    }

    pub fn map_time(mut self, f: impl Fn(DateTime<Utc>) -> DateTime<Utc> + 'static) -> Self {
        self.time = Some(TimeUpdate::Map(Box::new(f)));
        self
    }

    /// `f` receives the point's current tags and returns the tags to
    /// merge in; keys it omits are left as they were.
    pub fn tags(mut self, f: impl Fn(&Tags) -> Tags + 'static) -> Self {
        self.tags = Some(Box::new(f));
        self
    }

    pub fn unset_tags<I: IntoIterator<Item = S>, S: Into<String>>(mut self, keys: I) -> Self {
        self.unset_tags.extend(keys.into_iter().map(Into::into));
        self
    }

    /// `f` receives the point's current fields and returns the fields
    /// to merge in; keys it omits are left as they were.
    pub fn fields(mut self, f: impl Fn(&Fields) -> Fields + 'static) -> Self {
        self.fields = Some(Box::new(f));
        self
    }

    pub fn unset_fields<I: IntoIterator<Item = S>, S: Into<String>>(mut self, keys: I) -> Self {
        self.unset_fields.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn apply(&self, point: &Point) -> Point {
        let mut out = point.clone();

        if let Some(m) = &self.measurement {
            out.measurement = match m {
                MeasurementUpdate::Set(name) => name.clone(),
                MeasurementUpdate::Map(f) => f(&out.measurement),
            };
        }
        if let Some(t) = &self.time {
            out.time = Some(match t {
                TimeUpdate::Set(v) => *v,
                TimeUpdate::Map(f) => f(out.time.expect("stored points are always stamped")),
            });
        }
        if let Some(f) = &self.tags {
            for (k, v) in f(&out.tags) {
                out.tags.insert(k, v);
            }
        }
        for k in &self.unset_tags {
            out.tags.remove(k);
        }
        if let Some(f) = &self.fields {
            for (k, v) in f(&out.fields) {
                out.fields.insert(k, v);
            }
        }
        for k in &self.unset_fields {
            out.fields.remove(k);
        }
        out
    }
}

#[cfg(test)]
#[path = "updater_test.rs"]
mod updater_test;
