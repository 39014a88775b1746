//! Output schema and the reusable row arena.
//!
//! Columns are defined once, before the first event, and addressed by
//! [`ColumnHandle`]s afterwards. A [`Row`] holds one slot per column and
//! is allocated once per run; list slots are cleared, never dropped, so
//! their storage survives from event to event.

use crate::error::{Error, Result};
use crate::hit::OpticalHitData;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashMap;

/// Stable handle to an output column (index into the row arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnHandle(pub usize);

/// Storage kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Floating-point scalar.
    Float,
    /// Unsigned counter.
    Count,
    /// Variable-length list of serialized optical hits.
    HitList,
    /// Variable-length list of floating-point values.
    FloatList,
}

impl ColumnKind {
    /// Returns true for variable-length list kinds.
    #[must_use]
    pub fn is_list(self) -> bool {
        matches!(self, Self::HitList | Self::FloatList)
    }

    fn label(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Count => "count",
            Self::HitList => "hit list",
            Self::FloatList => "float list",
        }
    }
}

/// A named output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Ordered set of output columns.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
    names: HashMap<String, ColumnHandle>,
    locked: bool,
}

impl Schema {
    /// Creates an empty, unlocked schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a scalar column.
    ///
    /// # Errors
    /// Returns [`Error::SchemaLocked`] once the schema is locked,
    /// [`Error::DuplicateColumn`] for a repeated name and
    /// [`Error::ColumnKindMismatch`] if `kind` is a list kind.
    pub fn define_scalar(
        &mut self,
        name: impl Into<String>,
        kind: ColumnKind,
    ) -> Result<ColumnHandle> {
        if kind.is_list() {
            return Err(Error::ColumnKindMismatch {
                handle: self.columns.len(),
                expected: "scalar",
            });
        }
        self.define(name.into(), kind)
    }

    /// Defines a variable-length list column.
    ///
    /// # Errors
    /// Same conditions as [`Schema::define_scalar`], with the kind required to be a list.
    pub fn define_list(
        &mut self,
        name: impl Into<String>,
        kind: ColumnKind,
    ) -> Result<ColumnHandle> {
        if !kind.is_list() {
            return Err(Error::ColumnKindMismatch {
                handle: self.columns.len(),
                expected: "list",
            });
        }
        self.define(name.into(), kind)
    }

    fn define(&mut self, name: String, kind: ColumnKind) -> Result<ColumnHandle> {
        if self.locked {
            return Err(Error::SchemaLocked(name));
        }
        if self.names.contains_key(&name) {
            return Err(Error::DuplicateColumn(name));
        }
        let handle = ColumnHandle(self.columns.len());
        self.names.insert(name.clone(), handle);
        self.columns.push(ColumnSpec { name, kind });
        Ok(handle)
    }

    /// Rejects any further column definitions.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn handle(&self, name: &str) -> Option<ColumnHandle> {
        self.names.get(name).copied()
    }

    /// Returns the column for a handle.
    #[must_use]
    pub fn column(&self, handle: ColumnHandle) -> Option<&ColumnSpec> {
        self.columns.get(handle.0)
    }

    /// Iterates columns with their handles, in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (ColumnHandle, &ColumnSpec)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, spec)| (ColumnHandle(i), spec))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Value held by one row slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Float(f64),
    Count(u64),
    Hits(Vec<OpticalHitData>),
    Floats(Vec<f64>),
}

impl ColumnValue {
    fn empty(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Float => Self::Float(0.0),
            ColumnKind::Count => Self::Count(0),
            ColumnKind::HitList => Self::Hits(Vec::new()),
            ColumnKind::FloatList => Self::Floats(Vec::new()),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Float(value) => *value = 0.0,
            Self::Count(value) => *value = 0,
            Self::Hits(values) => values.clear(),
            Self::Floats(values) => values.clear(),
        }
    }

    /// Returns the scalar as `f64` (counts are widened).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Count(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Count(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_hits(&self) -> Option<&[OpticalHitData]> {
        match self {
            Self::Hits(values) => Some(values),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Self::Floats(values) => Some(values),
            _ => None,
        }
    }
}

/// One output row: a slot per schema column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<ColumnValue>,
}

impl Row {
    /// Allocates a row matching `schema`.
    #[must_use]
    pub fn for_schema(schema: &Schema) -> Self {
        Self {
            values: schema
                .iter()
                .map(|(_, spec)| ColumnValue::empty(spec.kind))
                .collect(),
        }
    }

    /// Zeroes scalars and empties lists, keeping list capacity.
    pub fn reset(&mut self) {
        for value in &mut self.values {
            value.reset();
        }
    }

    /// Writes a float slot.
    ///
    /// # Errors
    /// Returns [`Error::ColumnKindMismatch`] if the slot is not a float.
    pub fn set_float(&mut self, handle: ColumnHandle, value: f64) -> Result<()> {
        match self.values.get_mut(handle.0) {
            Some(ColumnValue::Float(slot)) => {
                *slot = value;
                Ok(())
            }
            _ => Err(mismatch(handle, ColumnKind::Float)),
        }
    }

    /// Writes a count slot.
    ///
    /// # Errors
    /// Returns [`Error::ColumnKindMismatch`] if the slot is not a count.
    pub fn set_count(&mut self, handle: ColumnHandle, value: u64) -> Result<()> {
        match self.values.get_mut(handle.0) {
            Some(ColumnValue::Count(slot)) => {
                *slot = value;
                Ok(())
            }
            _ => Err(mismatch(handle, ColumnKind::Count)),
        }
    }

    /// Replaces the contents of a hit-list slot, reusing its storage.
    ///
    /// # Errors
    /// Returns [`Error::ColumnKindMismatch`] if the slot is not a hit list.
    pub fn bind_hits(&mut self, handle: ColumnHandle, hits: &[OpticalHitData]) -> Result<()> {
        match self.values.get_mut(handle.0) {
            Some(ColumnValue::Hits(slot)) => {
                slot.clear();
                slot.extend_from_slice(hits);
                Ok(())
            }
            _ => Err(mismatch(handle, ColumnKind::HitList)),
        }
    }

    /// Replaces the contents of a float-list slot, reusing its storage.
    ///
    /// # Errors
    /// Returns [`Error::ColumnKindMismatch`] if the slot is not a float list.
    pub fn bind_floats(&mut self, handle: ColumnHandle, values: &[f64]) -> Result<()> {
        match self.values.get_mut(handle.0) {
            Some(ColumnValue::Floats(slot)) => {
                slot.clear();
                slot.extend_from_slice(values);
                Ok(())
            }
            _ => Err(mismatch(handle, ColumnKind::FloatList)),
        }
    }

    /// Returns a slot.
    #[must_use]
    pub fn get(&self, handle: ColumnHandle) -> Option<&ColumnValue> {
        self.values.get(handle.0)
    }

    /// Returns all slots in column order.
    #[must_use]
    pub fn values(&self) -> &[ColumnValue] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn mismatch(handle: ColumnHandle, kind: ColumnKind) -> Error {
    Error::ColumnKindMismatch {
        handle: handle.0,
        expected: kind.label(),
    }
}

/// Serializes a row as a map of column name to value, in schema order.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    schema: &'a Schema,
    row: &'a Row,
}

impl<'a> RowView<'a> {
    #[must_use]
    pub fn new(schema: &'a Schema, row: &'a Row) -> Self {
        Self { schema, row }
    }
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.row.len()))?;
        for ((_, spec), value) in self.schema.iter().zip(self.row.values()) {
            map.serialize_entry(&spec.name, value)?;
        }
        map.end()
    }
}
