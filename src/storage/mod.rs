//! The storage backend capability (spec.md §6): an ordered sequence of
//! rows with append, full scan, and bulk rewrite. The engine treats
//! this as the only place blocking I/O happens; everything upstream of
//! it (index, query evaluation) is in-memory and synchronous.
//!
//! A row is represented as the flat column list produced by
//! `serialize::encode_fields` — opaque to the backend, interpreted
//! only by the engine and `serialize`.

pub mod memory;
pub mod text;

use crate::error::Result;
use crate::index::RowId;

pub type RawRow = Vec<String>;

/// Capability a concrete backend must provide. Implementors own
/// exactly one dataset; the engine is the only caller.
pub trait Storage {
    /// All rows in storage (insertion) order, paired with their row-id.
    fn read_all(&self) -> Result<Vec<(RowId, RawRow)>>;

    /// Append one row, in O(1), returning its freshly assigned row-id.
    fn append(&mut self, row: RawRow) -> Result<RowId>;

    /// Append a batch of rows in order, returning their row-ids in the
    /// same order.
    fn append_many(&mut self, rows: Vec<RawRow>) -> Result<Vec<RowId>>;

    /// Atomically replace the entire dataset. Per spec.md §7, a
    /// failure here must leave the previous dataset intact — no
    /// partial swap.
    fn rewrite(&mut self, rows: Vec<RawRow>) -> Result<()>;

    /// Current row count.
    fn length(&self) -> usize;

    /// Release any resources (file handles). A no-op for backends that
    /// don't hold any.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Advisory lock; the engine never relies on it for correctness,
    /// only to warn cooperating external processes away (spec.md §5).
    fn lock(&self) -> Result<()> {
        Ok(())
    }

    fn unlock(&self) -> Result<()> {
        Ok(())
    }
}

pub use memory::MemoryBackend;
pub use text::TextFileBackend;
