//! Registry of sensitive volumes.
//!
//! Volumes are indexed in registration order; the index addresses every
//! per-volume container of a detector and fixes the output column order.

use crate::efficiency::{EfficiencyCurve, MaterialPropertiesTable};
use crate::step::VolumeId;
use std::collections::HashMap;

/// Dense index of a registered volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeIndex(pub usize);

impl VolumeIndex {
    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }
}

/// An instrumented volume and its acceptance model.
#[derive(Debug, Clone)]
pub struct SensitiveVolume {
    /// Kernel handle.
    pub id: VolumeId,
    /// Display name, used as the output column prefix.
    pub name: String,
    /// Registry index.
    pub index: VolumeIndex,
    /// Detection efficiency; `None` means nothing is ever detected.
    pub efficiency: Option<EfficiencyCurve>,
}

impl SensitiveVolume {
    /// Detection probability at `energy` (0 without a curve).
    #[inline]
    #[must_use]
    pub fn efficiency_at(&self, energy: f64) -> f64 {
        self.efficiency
            .as_ref()
            .map_or(0.0, |curve| curve.value(energy))
    }
}

/// Maps kernel volume handles to stable indices.
#[derive(Debug, Clone, Default)]
pub struct VolumeRegistry {
    volumes: Vec<SensitiveVolume>,
    indices: HashMap<VolumeId, VolumeIndex>,
}

impl VolumeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a volume and returns its index.
    ///
    /// Registering the same volume twice is a caller error; the second
    /// entry shadows the first for lookups.
    pub fn register(
        &mut self,
        id: VolumeId,
        name: impl Into<String>,
        efficiency: Option<EfficiencyCurve>,
    ) -> VolumeIndex {
        let index = VolumeIndex(self.volumes.len());
        let name = name.into();
        log::debug!(
            "registered sensitive volume `{name}` ({id}) at index {}",
            index.0
        );
        self.volumes.push(SensitiveVolume {
            id,
            name,
            index,
            efficiency,
        });
        self.indices.insert(id, index);
        index
    }

    /// Registers a volume using the curve stored under `key` in its material table.
    pub fn register_with_properties(
        &mut self,
        id: VolumeId,
        name: impl Into<String>,
        properties: Option<&MaterialPropertiesTable>,
        key: &str,
    ) -> VolumeIndex {
        let curve = properties.and_then(|table| table.property(key)).cloned();
        self.register(id, name, curve)
    }

    /// Looks up the index of a volume.
    #[inline]
    #[must_use]
    pub fn lookup(&self, id: VolumeId) -> Option<VolumeIndex> {
        self.indices.get(&id).copied()
    }

    /// Returns the volume at `index`.
    #[must_use]
    pub fn get(&self, index: VolumeIndex) -> Option<&SensitiveVolume> {
        self.volumes.get(index.0)
    }

    /// Returns the number of registered volumes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// Returns true if no volume is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Iterates volumes in index order.
    pub fn iter(&self) -> impl Iterator<Item = &SensitiveVolume> {
        self.volumes.iter()
    }

    /// Iterates kernel handles in index order.
    pub fn ids(&self) -> impl Iterator<Item = VolumeId> + '_ {
        self.volumes.iter().map(|volume| volume.id)
    }
}
