//! In-memory storage backend: an ordered `Vec` of raw rows, no
//! durability. Row-ids are plain vector indices, which gives the dense
//! `0..N-1` numbering spec.md §3 invariant 2 requires for free.

use crate::error::Result;
use crate::index::RowId;
use crate::storage::{RawRow, Storage};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: Vec<RawRow>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend { rows: Vec::new() }
    }
}

impl Storage for MemoryBackend {
    fn read_all(&self) -> Result<Vec<(RowId, RawRow)>> {
        Ok(self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (i as RowId, r.clone()))
            .collect())
    }

    fn append(&mut self, row: RawRow) -> Result<RowId> {
        let id = self.rows.len() as RowId;
        self.rows.push(row);
        Ok(id)
    }

    fn append_many(&mut self, rows: Vec<RawRow>) -> Result<Vec<RowId>> {
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(self.append(row)?);
        }
        Ok(ids)
    }

    fn rewrite(&mut self, rows: Vec<RawRow>) -> Result<()> {
        // a fresh Vec moved into place — the old one is simply dropped,
        // which is this backend's equivalent of the text backend's
        // rename-based swap (spec.md §9).
        self.rows = rows;
        Ok(())
    }

    fn length(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;
