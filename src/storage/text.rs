//! Text-file storage backend: one CSV row per point on disk, quoted
//! per standard CSV rules, `\n` line terminator with no universal-
//! newline translation (spec.md §6).
//!
//! Appends open the file in append mode and `fsync` after every write,
//! so a crash leaves at most the last append unflushed, never a
//! partial rewrite. `rewrite` stages the new dataset into a sibling
//! temp file and only replaces the original via `fs::rename`, which is
//! atomic on the same filesystem — the previous file is untouched
//! until the rename succeeds, matching `rdms`'s segment-rotation
//! pattern in its write-ahead log.

use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Terminator, WriterBuilder};
use fs2::FileExt;

use crate::err_at;
use crate::error::Result;
use crate::index::RowId;
use crate::storage::{RawRow, Storage};

#[derive(Debug)]
pub struct TextFileBackend {
    path: PathBuf,
    row_count: usize,
    lock_file: RefCell<Option<fs::File>>,
}

impl TextFileBackend {
    /// Open `path`, creating an empty file if it does not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            err_at!(IoError, fs::File::create(&path))?;
        }
        let row_count = Self::read_rows(&path)?.len();
        Ok(TextFileBackend {
            path,
            row_count,
            lock_file: RefCell::new(None),
        })
    }

    fn read_rows(path: &Path) -> Result<Vec<RawRow>> {
        let file = err_at!(IoError, fs::File::open(path))?;
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .terminator(Terminator::Any(b'\n'))
            .from_reader(file);

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = err_at!(IoError, result)?;
            if record.len() == 1 && record.get(0) == Some("") {
                continue; // trailing blank line
            }
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }

    fn append_rows(&self, rows: &[RawRow]) -> Result<()> {
        let file = err_at!(IoError, fs::OpenOptions::new().append(true).open(&self.path))?;
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(file);
        for row in rows {
            err_at!(IoError, wtr.write_record(row.iter()))?;
        }
        err_at!(IoError, wtr.flush())?;
        let mut file = err_at!(IoError, wtr.into_inner().map_err(|e| e.into_error()))?;
        err_at!(IoError, file.sync_all())?;
        Ok(())
    }
}

impl Storage for TextFileBackend {
    fn read_all(&self) -> Result<Vec<(RowId, RawRow)>> {
        let rows = Self::read_rows(&self.path)?;
        Ok(rows.into_iter().enumerate().map(|(i, r)| (i as RowId, r)).collect())
    }

    fn append(&mut self, row: RawRow) -> Result<RowId> {
        self.append_rows(std::slice::from_ref(&row))?;
        let id = self.row_count as RowId;
        self.row_count += 1;
        Ok(id)
    }

    fn append_many(&mut self, rows: Vec<RawRow>) -> Result<Vec<RowId>> {
        self.append_rows(&rows)?;
        let start = self.row_count as RowId;
        self.row_count += rows.len();
        Ok((start..start + rows.len() as RowId).collect())
    }

    fn rewrite(&mut self, rows: Vec<RawRow>) -> Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        {
            let tmp_file = err_at!(IoError, fs::File::create(&tmp_path))?;
            let mut wtr = WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .terminator(Terminator::Any(b'\n'))
                .from_writer(tmp_file);
            for row in &rows {
                err_at!(IoError, wtr.write_record(row.iter()))?;
            }
            err_at!(IoError, wtr.flush())?;
            let mut tmp_file = err_at!(IoError, wtr.into_inner().map_err(|e| e.into_error()))?;
            err_at!(IoError, tmp_file.sync_all())?;
        }
        // previous file stays intact until this rename succeeds.
        err_at!(IoError, fs::rename(&tmp_path, &self.path))?;
        self.row_count = rows.len();
        Ok(())
    }

    fn length(&self) -> usize {
        self.row_count
    }

    fn close(&mut self) -> Result<()> {
        self.unlock()
    }

    fn lock(&self) -> Result<()> {
        let file = err_at!(IoError, fs::OpenOptions::new().read(true).open(&self.path))?;
        err_at!(IoError, file.try_lock_exclusive())?;
        *self.lock_file.borrow_mut() = Some(file);
        Ok(())
    }

    fn unlock(&self) -> Result<()> {
        if let Some(file) = self.lock_file.borrow_mut().take() {
            err_at!(IoError, FileExt::unlock(&file))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "text_test.rs"]
mod text_test;
