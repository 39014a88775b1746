//! Output sink contract.
//!
//! The accumulator binds every column on the sink once, before the first
//! event, and then commits one [`Row`] per event. The sink owns the storage
//! format; the core never looks past this trait.

use crate::error::{Error, Result};
use crate::schema::{ColumnHandle, ColumnKind, Row, Schema};
use std::collections::BTreeMap;

/// Persistence binding for event rows.
pub trait RowSink {
    /// Declares a scalar column bound to `handle`.
    fn define_scalar_column(
        &mut self,
        handle: ColumnHandle,
        name: &str,
        kind: ColumnKind,
    ) -> Result<()>;

    /// Declares a variable-length list column bound to `handle`.
    fn define_list_column(
        &mut self,
        handle: ColumnHandle,
        name: &str,
        kind: ColumnKind,
    ) -> Result<()>;

    /// Appends one row. Slots are in handle order.
    fn commit_row(&mut self, row: &Row) -> Result<()>;

    /// Stores a run-level key/value pair (seed, run number, ...).
    ///
    /// Each key is written at most once per sink. A repeated key returns
    /// [`Error::DuplicateMetadata`] and the first value stays in place.
    fn write_metadata(&mut self, key: &str, value: &str) -> Result<()>;

    /// Makes committed rows durable (checkpoint).
    fn flush(&mut self) -> Result<()>;

    /// Final flush and release of the underlying storage.
    fn close(&mut self) -> Result<()>;
}

/// Binds every column of a locked schema on `sink`, in handle order.
///
/// # Errors
/// Propagates sink errors.
pub fn bind_schema<S: RowSink + ?Sized>(schema: &Schema, sink: &mut S) -> Result<()> {
    for (handle, spec) in schema.iter() {
        if spec.kind.is_list() {
            sink.define_list_column(handle, &spec.name, spec.kind)?;
        } else {
            sink.define_scalar_column(handle, &spec.name, spec.kind)?;
        }
    }
    Ok(())
}

/// Sink keeping everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    columns: Vec<(String, ColumnKind)>,
    rows: Vec<Row>,
    metadata: BTreeMap<String, String>,
    flushes: usize,
    closed: bool,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Column names and kinds, in handle order.
    #[must_use]
    pub fn columns(&self) -> &[(String, ColumnKind)] {
        &self.columns
    }

    /// Committed rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Handle of a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<ColumnHandle> {
        self.columns
            .iter()
            .position(|(column, _)| column == name)
            .map(ColumnHandle)
    }

    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Number of flushes, including the one from `close`.
    #[must_use]
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn define(&mut self, handle: ColumnHandle, name: &str, kind: ColumnKind) {
        debug_assert_eq!(handle.0, self.columns.len(), "columns bound out of order");
        self.columns.push((name.to_string(), kind));
    }
}

impl RowSink for MemorySink {
    fn define_scalar_column(
        &mut self,
        handle: ColumnHandle,
        name: &str,
        kind: ColumnKind,
    ) -> Result<()> {
        self.define(handle, name, kind);
        Ok(())
    }

    fn define_list_column(
        &mut self,
        handle: ColumnHandle,
        name: &str,
        kind: ColumnKind,
    ) -> Result<()> {
        self.define(handle, name, kind);
        Ok(())
    }

    fn commit_row(&mut self, row: &Row) -> Result<()> {
        self.rows.push(row.clone());
        Ok(())
    }

    fn write_metadata(&mut self, key: &str, value: &str) -> Result<()> {
        if self.metadata.contains_key(key) {
            return Err(Error::DuplicateMetadata(key.to_string()));
        }
        self.metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.closed = true;
        Ok(())
    }
}
