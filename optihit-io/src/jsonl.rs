//! JSON-lines row sink.
//!
//! Each committed row becomes one JSON object keyed by column name, in
//! schema order. Run metadata is written as `{"metadata":{"key":..,"value":..}}`
//! lines, so a reader can tell the two apart by the single `metadata` key.

use crate::{Error, Result};
use optihit_core::{ColumnHandle, ColumnKind, Row, RowSink, RowView, Schema};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Serialize)]
struct MetadataLine<'a> {
    metadata: MetadataEntry<'a>,
}

#[derive(Serialize)]
struct MetadataEntry<'a> {
    key: &'a str,
    value: &'a str,
}

/// Writes one JSON object per event.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    schema: Schema,
    metadata_keys: HashSet<String>,
    rows: u64,
    closed: bool,
}

impl JsonLinesSink<BufWriter<File>> {
    /// Creates (or truncates) a JSON-lines file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        log::debug!("writing JSON lines to {}", path.as_ref().display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonLinesSink<W> {
    /// Wraps an existing writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            schema: Schema::new(),
            metadata_keys: HashSet::new(),
            rows: 0,
            closed: false,
        }
    }

    /// Rows written so far.
    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Columns bound on this sink.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    fn bind(&mut self, handle: ColumnHandle, name: &str, kind: ColumnKind) -> Result<()> {
        self.ensure_open()?;
        let bound = if kind.is_list() {
            self.schema.define_list(name, kind)?
        } else {
            self.schema.define_scalar(name, kind)?
        };
        if bound != handle {
            return Err(Error::InvalidFormat(format!(
                "column `{name}` bound at {} but the sink expected {}",
                handle.0, bound.0
            )));
        }
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> Result<()> {
        self.ensure_open()?;
        if row.len() != self.schema.len() {
            return Err(Error::InvalidFormat(format!(
                "row has {} slots, sink has {} columns",
                row.len(),
                self.schema.len()
            )));
        }
        serde_json::to_writer(&mut self.writer, &RowView::new(&self.schema, row))?;
        self.writer.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    fn write_metadata_line(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        if self.metadata_keys.contains(key) {
            return Err(Error::DuplicateMetadata(key.to_string()));
        }
        let line = MetadataLine {
            metadata: MetadataEntry { key, value },
        };
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        self.metadata_keys.insert(key.to_string());
        Ok(())
    }
}

impl<W: Write> RowSink for JsonLinesSink<W> {
    fn define_scalar_column(
        &mut self,
        handle: ColumnHandle,
        name: &str,
        kind: ColumnKind,
    ) -> optihit_core::Result<()> {
        Ok(self.bind(handle, name, kind)?)
    }

    fn define_list_column(
        &mut self,
        handle: ColumnHandle,
        name: &str,
        kind: ColumnKind,
    ) -> optihit_core::Result<()> {
        Ok(self.bind(handle, name, kind)?)
    }

    fn commit_row(&mut self, row: &Row) -> optihit_core::Result<()> {
        Ok(self.write_row(row)?)
    }

    fn write_metadata(&mut self, key: &str, value: &str) -> optihit_core::Result<()> {
        Ok(self.write_metadata_line(key, value)?)
    }

    fn flush(&mut self) -> optihit_core::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> optihit_core::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.writer.flush()?;
        self.closed = true;
        log::debug!("JSON-lines sink closed after {} rows", self.rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optihit_core::{bind_schema, OpticalHitData};

    fn bound_sink() -> (Schema, JsonLinesSink<Vec<u8>>) {
        let mut schema = Schema::new();
        schema.define_scalar("event", ColumnKind::Count).unwrap();
        schema.define_scalar("asym", ColumnKind::Float).unwrap();
        schema
            .define_list("PMT1_optical_hits", ColumnKind::HitList)
            .unwrap();
        schema.define_list("Crystal_times", ColumnKind::FloatList).unwrap();
        schema.lock();

        let mut sink = JsonLinesSink::new(Vec::new());
        bind_schema(&schema, &mut sink).unwrap();
        (schema, sink)
    }

    #[test]
    fn test_rows_in_schema_order() {
        let (schema, mut sink) = bound_sink();
        let mut row = Row::for_schema(&schema);
        row.set_count(ColumnHandle(0), 4).unwrap();
        row.set_float(ColumnHandle(1), 0.25).unwrap();
        row.bind_hits(
            ColumnHandle(2),
            &[OpticalHitData {
                track_id: 9,
                ..OpticalHitData::default()
            }],
        )
        .unwrap();
        row.bind_floats(ColumnHandle(3), &[1.5]).unwrap();
        sink.commit_row(&row).unwrap();
        sink.close().unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let line = text.lines().next().unwrap();
        assert!(line.starts_with(r#"{"event":4,"asym":0.25,"PMT1_optical_hits":[{"track_id":9,"#));
        assert!(line.ends_with(r#""Crystal_times":[1.5]}"#));
    }

    #[test]
    fn test_metadata_lines() {
        let (_, mut sink) = bound_sink();
        sink.write_metadata("random_seed", "42").unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            "{\"metadata\":{\"key\":\"random_seed\",\"value\":\"42\"}}\n"
        );
    }

    #[test]
    fn test_repeated_metadata_key_rejected() {
        let (_, mut sink) = bound_sink();
        sink.write_metadata("run_number", "12").unwrap();
        assert!(matches!(
            sink.write_metadata("run_number", "13"),
            Err(optihit_core::Error::DuplicateMetadata(key)) if key == "run_number"
        ));
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"12\""));
    }

    #[test]
    fn test_mismatched_row_rejected() {
        let (_, mut sink) = bound_sink();
        let mut other = Schema::new();
        other.define_scalar("event", ColumnKind::Count).unwrap();
        let row = Row::for_schema(&other);
        assert!(matches!(
            sink.commit_row(&row),
            Err(optihit_core::Error::Sink(_))
        ));
        assert_eq!(sink.rows(), 0);
    }

    #[test]
    fn test_out_of_order_binding_rejected() {
        let mut sink = JsonLinesSink::new(Vec::new());
        assert!(sink
            .define_scalar_column(ColumnHandle(3), "event", ColumnKind::Count)
            .is_err());
    }

    #[test]
    fn test_commit_after_close_rejected() {
        let (schema, mut sink) = bound_sink();
        sink.close().unwrap();
        assert!(sink.is_closed());
        assert!(sink.commit_row(&Row::for_schema(&schema)).is_err());
    }
}
