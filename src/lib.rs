//! tinyflux is an embedded, single-process time-series datastore: no
//! server, no background threads, no network surface. An [engine::Engine]
//! owns one [storage::Storage] backend and an in-memory [index::Index]
//! over it; everything above that — points, queries, updates — is
//! plain synchronous Rust.
//!
//! Two backends ship: [storage::MemoryBackend] for ephemeral or
//! test use, and [storage::TextFileBackend] for a single append-mostly
//! CSV file on disk. Both implement [storage::Storage], so the engine
//! (and everything built on it) is generic over which one backs it.
//!
//! ```
//! use tinyflux::{Engine, EngineConfig, MemoryBackend, Point, TagQuery, Value};
//!
//! let mut engine = Engine::open(MemoryBackend::new(), EngineConfig::new()).unwrap();
//! engine
//!     .insert(Point::new().with_measurement("air_quality").with_tag("city", "LA").with_field("aqi", Value::Int(42)))
//!     .unwrap();
//! let hits = engine.search(&TagQuery::key("city").eq("LA"), true).unwrap();
//! assert_eq!(hits.len(), 1);
//! ```

pub mod engine;
pub mod error;
pub mod index;
pub mod measurement;
pub mod point;
pub mod query;
pub mod serialize;
pub mod storage;
pub mod updater;

pub use crate::engine::{Engine, EngineConfig};
pub use crate::error::{Error, Result};
pub use crate::measurement::MeasurementView;
pub use crate::point::{Fields, Point, Tags, Value, DEFAULT_MEASUREMENT};
pub use crate::query::{
    AttrValue, FieldQuery, Leaf, MeasurementQuery, Op, Query, RegexMode, TagQuery, TimeQuery,
};
pub use crate::storage::{MemoryBackend, Storage, TextFileBackend};
pub use crate::updater::Updater;
