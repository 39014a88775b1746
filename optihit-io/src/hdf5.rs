//! HDF5 row sink.
//!
//! Layout:
//!
//! ```text
//! /                      attrs: optihit_format_version, run metadata
//! /events                attrs: rows
//! /events/<scalar>       1-D extendable dataset, one entry per event
//! /events/<list>/event_index   offset of each event's first element
//! /events/<list>/<field>       concatenated list elements
//! ```
//!
//! Hit lists store one dataset per [`OpticalHitData`] field; float lists
//! store a single `values` dataset.

use crate::{Error, Result};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use ndarray::{s, ArrayView1};
use optihit_core::{ColumnHandle, ColumnKind, ColumnValue, OpticalHitData, Row, RowSink};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

const FORMAT_VERSION: &str = "0.1";

/// Options for HDF5 output.
#[derive(Clone, Debug)]
pub struct Hdf5WriteOptions {
    /// Chunk length of every extendable dataset.
    pub chunk_rows: usize,
    /// Deflate level, if any.
    pub compression: Option<u8>,
    pub shuffle: bool,
}

impl Default for Hdf5WriteOptions {
    fn default() -> Self {
        Self {
            chunk_rows: 4096,
            compression: Some(4),
            shuffle: true,
        }
    }
}

struct HitListWriter {
    event_index: Dataset,
    track_id: Dataset,
    parent_id: Dataset,
    volume_index: Dataset,
    x: Dataset,
    y: Dataset,
    z: Dataset,
    global_time: Dataset,
    kinetic_energy: Dataset,
    len: usize,
}

impl HitListWriter {
    fn new(group: &Group, options: &Hdf5WriteOptions) -> Result<Self> {
        let f64_dataset = |name: &str| create_extendable_dataset::<f64>(group, name, options);
        Ok(Self {
            event_index: create_extendable_dataset::<u64>(group, "event_index", options)?,
            track_id: create_extendable_dataset::<i32>(group, "track_id", options)?,
            parent_id: create_extendable_dataset::<i32>(group, "parent_id", options)?,
            volume_index: create_extendable_dataset::<u32>(group, "volume_index", options)?,
            x: f64_dataset("x")?,
            y: f64_dataset("y")?,
            z: f64_dataset("z")?,
            global_time: f64_dataset("global_time")?,
            kinetic_energy: f64_dataset("kinetic_energy")?,
            len: 0,
        })
    }

    fn append(&mut self, row: usize, hits: &[OpticalHitData]) -> Result<()> {
        append_slice(&self.event_index, row, &[self.len as u64])?;
        if hits.is_empty() {
            return Ok(());
        }

        let offset = self.len;
        let field = |get: fn(&OpticalHitData) -> f64| hits.iter().map(get).collect::<Vec<_>>();
        append_slice(
            &self.track_id,
            offset,
            &hits.iter().map(|hit| hit.track_id).collect::<Vec<_>>(),
        )?;
        append_slice(
            &self.parent_id,
            offset,
            &hits.iter().map(|hit| hit.parent_id).collect::<Vec<_>>(),
        )?;
        append_slice(
            &self.volume_index,
            offset,
            &hits.iter().map(|hit| hit.volume_index).collect::<Vec<_>>(),
        )?;
        append_slice(&self.x, offset, &field(|hit| hit.x))?;
        append_slice(&self.y, offset, &field(|hit| hit.y))?;
        append_slice(&self.z, offset, &field(|hit| hit.z))?;
        append_slice(&self.global_time, offset, &field(|hit| hit.global_time))?;
        append_slice(&self.kinetic_energy, offset, &field(|hit| hit.kinetic_energy))?;
        self.len += hits.len();
        Ok(())
    }
}

struct FloatListWriter {
    event_index: Dataset,
    values: Dataset,
    len: usize,
}

impl FloatListWriter {
    fn new(group: &Group, options: &Hdf5WriteOptions) -> Result<Self> {
        Ok(Self {
            event_index: create_extendable_dataset::<u64>(group, "event_index", options)?,
            values: create_extendable_dataset::<f64>(group, "values", options)?,
            len: 0,
        })
    }

    fn append(&mut self, row: usize, values: &[f64]) -> Result<()> {
        append_slice(&self.event_index, row, &[self.len as u64])?;
        append_slice(&self.values, self.len, values)?;
        self.len += values.len();
        Ok(())
    }
}

enum ColumnWriter {
    Float(Dataset),
    Count(Dataset),
    Hits(HitListWriter),
    Floats(FloatListWriter),
}

impl ColumnWriter {
    fn append(&mut self, row: usize, value: &ColumnValue) -> Result<()> {
        match (self, value) {
            (Self::Float(dataset), ColumnValue::Float(v)) => append_slice(dataset, row, &[*v]),
            (Self::Count(dataset), ColumnValue::Count(v)) => append_slice(dataset, row, &[*v]),
            (Self::Hits(writer), ColumnValue::Hits(hits)) => writer.append(row, hits),
            (Self::Floats(writer), ColumnValue::Floats(values)) => writer.append(row, values),
            _ => Err(Error::InvalidFormat(format!(
                "row {row}: value does not match the column kind"
            ))),
        }
    }
}

/// Streaming writer of event rows into chunked HDF5 datasets.
pub struct Hdf5RowSink {
    file: Option<File>,
    events: Group,
    columns: Vec<ColumnWriter>,
    options: Hdf5WriteOptions,
    metadata_keys: HashSet<String>,
    rows: usize,
}

impl Hdf5RowSink {
    /// Creates a new HDF5 file for event rows.
    ///
    /// # Errors
    /// Returns an error if the file or the `events` group cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, options: Hdf5WriteOptions) -> Result<Self> {
        if options.chunk_rows == 0 {
            return Err(Error::InvalidFormat("chunk_rows must be positive".to_string()));
        }
        let file = File::create(path.as_ref())?;
        set_attr_str_file(&file, "optihit_format_version", FORMAT_VERSION)?;
        let events = file.create_group("events")?;
        log::debug!("writing HDF5 rows to {}", path.as_ref().display());

        Ok(Self {
            file: Some(file),
            events,
            columns: Vec::new(),
            options,
            metadata_keys: HashSet::new(),
            rows: 0,
        })
    }

    /// Rows written so far.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or(Error::Closed)
    }

    fn bind(&mut self, handle: ColumnHandle, name: &str, kind: ColumnKind) -> Result<()> {
        self.file()?;
        if handle.0 != self.columns.len() {
            return Err(Error::InvalidFormat(format!(
                "column `{name}` bound at {} but the sink expected {}",
                handle.0,
                self.columns.len()
            )));
        }

        let name = dataset_name(name);
        let writer = match kind {
            ColumnKind::Float => ColumnWriter::Float(create_extendable_dataset::<f64>(
                &self.events,
                &name,
                &self.options,
            )?),
            ColumnKind::Count => ColumnWriter::Count(create_extendable_dataset::<u64>(
                &self.events,
                &name,
                &self.options,
            )?),
            ColumnKind::HitList => {
                let group = self.events.create_group(&name)?;
                ColumnWriter::Hits(HitListWriter::new(&group, &self.options)?)
            }
            ColumnKind::FloatList => {
                let group = self.events.create_group(&name)?;
                ColumnWriter::Floats(FloatListWriter::new(&group, &self.options)?)
            }
        };
        self.columns.push(writer);
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> Result<()> {
        self.file()?;
        if row.len() != self.columns.len() {
            return Err(Error::InvalidFormat(format!(
                "row has {} slots, sink has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        for (writer, value) in self.columns.iter_mut().zip(row.values()) {
            writer.append(self.rows, value)?;
        }
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        self.events
            .new_attr::<u64>()
            .create("rows")?
            .write_scalar(&(self.rows as u64))?;
        file.flush()?;
        self.columns.clear();
        log::debug!("HDF5 sink closed after {} rows", self.rows);
        file.close()?;
        Ok(())
    }
}

impl RowSink for Hdf5RowSink {
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
        let name = dataset_name(key);
        if self.metadata_keys.contains(&name) {
            return Err(Error::DuplicateMetadata(key.to_string()).into());
        }
        set_attr_str_file(self.file()?, &name, value)?;
        self.metadata_keys.insert(name);
        Ok(())
    }

    fn flush(&mut self) -> optihit_core::Result<()> {
        if let Some(file) = &self.file {
            file.flush().map_err(Error::from)?;
        }
        Ok(())
    }

    fn close(&mut self) -> optihit_core::Result<()> {
        Ok(self.finish()?)
    }
}

impl Drop for Hdf5RowSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("failed to close HDF5 sink: {e}");
        }
    }
}

/// HDF5 names may not contain `/`.
fn dataset_name(column: &str) -> String {
    column.replace('/', "_")
}

fn create_extendable_dataset<T: H5Type>(
    group: &Group,
    name: &str,
    options: &Hdf5WriteOptions,
) -> Result<Dataset> {
    let mut builder = group
        .new_dataset::<T>()
        .shape((0..,))
        .chunk((options.chunk_rows,));

    if let Some(level) = options.compression {
        builder = builder.deflate(level);
    }

    if options.shuffle {
        builder = builder.shuffle();
    }

    Ok(builder.create(name)?)
}

fn append_slice<T: H5Type>(dataset: &Dataset, offset: usize, data: &[T]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let new_len = offset + data.len();
    dataset.resize((new_len,))?;
    let view = ArrayView1::from(data);
    dataset.write_slice(view, s![offset..new_len])?;
    Ok(())
}

fn set_attr_str_file(file: &File, name: &str, value: &str) -> Result<()> {
    let value = VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))?;
    file.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use optihit_core::{bind_schema, Schema};
    use tempfile::NamedTempFile;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.define_scalar("event", ColumnKind::Count).unwrap();
        schema.define_scalar("Crystal.eDep", ColumnKind::Float).unwrap();
        schema
            .define_list("PMT1_optical_hits", ColumnKind::HitList)
            .unwrap();
        schema.define_list("Crystal_times", ColumnKind::FloatList).unwrap();
        schema.lock();
        schema
    }

    fn hit(track_id: i32) -> OpticalHitData {
        OpticalHitData {
            track_id,
            volume_index: 0,
            global_time: f64::from(track_id) * 0.5,
            ..OpticalHitData::default()
        }
    }

    #[test]
    fn test_rows_and_lists_written() {
        let file = NamedTempFile::new().unwrap();
        let schema = schema();
        let options = Hdf5WriteOptions {
            chunk_rows: 2,
            compression: None,
            shuffle: false,
        };
        let mut sink = Hdf5RowSink::create(file.path(), options).unwrap();
        bind_schema(&schema, &mut sink).unwrap();
        sink.write_metadata("random_seed", "1234").unwrap();

        let mut row = Row::for_schema(&schema);
        for event in 0..3_u64 {
            row.reset();
            row.set_count(ColumnHandle(0), event).unwrap();
            #[allow(clippy::cast_precision_loss)]
            row.set_float(ColumnHandle(1), event as f64 * 1.5).unwrap();
            let hits: Vec<OpticalHitData> = (0..i32::try_from(event).unwrap()).map(hit).collect();
            row.bind_hits(ColumnHandle(2), &hits).unwrap();
            row.bind_floats(ColumnHandle(3), &[2.0]).unwrap();
            sink.commit_row(&row).unwrap();
        }
        sink.close().unwrap();
        assert_eq!(sink.rows(), 3);

        let h5 = File::open(file.path()).unwrap();
        let events = h5.group("events").unwrap();
        assert_eq!(
            events.dataset("event").unwrap().read_raw::<u64>().unwrap(),
            vec![0, 1, 2]
        );
        assert_eq!(
            events.dataset("Crystal.eDep").unwrap().read_raw::<f64>().unwrap(),
            vec![0.0, 1.5, 3.0]
        );

        let hits = events.group("PMT1_optical_hits").unwrap();
        assert_eq!(
            hits.dataset("event_index").unwrap().read_raw::<u64>().unwrap(),
            vec![0, 0, 1]
        );
        assert_eq!(
            hits.dataset("track_id").unwrap().read_raw::<i32>().unwrap(),
            vec![0, 0, 1]
        );

        let times = events.group("Crystal_times").unwrap();
        assert_eq!(
            times.dataset("values").unwrap().read_raw::<f64>().unwrap(),
            vec![2.0, 2.0, 2.0]
        );

        let seed: VarLenUnicode = h5.attr("random_seed").unwrap().read_scalar().unwrap();
        assert_eq!(seed.as_str(), "1234");
        let rows: u64 = events.attr("rows").unwrap().read_scalar().unwrap();
        assert_eq!(rows, 3);
    }

    #[test]
    fn test_repeated_metadata_key_rejected() {
        let file = NamedTempFile::new().unwrap();
        let mut sink = Hdf5RowSink::create(file.path(), Hdf5WriteOptions::default()).unwrap();
        sink.write_metadata("run_label", "0012").unwrap();
        assert!(matches!(
            sink.write_metadata("run_label", "0013"),
            Err(optihit_core::Error::DuplicateMetadata(key)) if key == "run_label"
        ));
        sink.close().unwrap();

        let h5 = File::open(file.path()).unwrap();
        let label: VarLenUnicode = h5.attr("run_label").unwrap().read_scalar().unwrap();
        assert_eq!(label.as_str(), "0012");
    }

    #[test]
    fn test_closed_sink_rejects_rows() {
        let file = NamedTempFile::new().unwrap();
        let schema = schema();
        let mut sink = Hdf5RowSink::create(file.path(), Hdf5WriteOptions::default()).unwrap();
        bind_schema(&schema, &mut sink).unwrap();
        sink.close().unwrap();
        assert!(sink.commit_row(&Row::for_schema(&schema)).is_err());
        // Closing twice is harmless.
        sink.close().unwrap();
    }
}
