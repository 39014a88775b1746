//! Accepted optical detections.

use crate::registry::VolumeIndex;
use crate::step::Step;
use serde::{Deserialize, Serialize};

/// Serialized form of an [`OpticalHit`], written to the `_optical_hits` columns.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OpticalHitData {
    pub track_id: i32,
    pub parent_id: i32,
    pub volume_index: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub global_time: f64,
    pub kinetic_energy: f64,
}

/// A photon absorbed and detected in a cathode volume.
#[derive(Debug, Clone, PartialEq)]
pub struct OpticalHit {
    track_id: i32,
    parent_id: i32,
    volume: VolumeIndex,
    position: [f64; 3],
    global_time: f64,
    kinetic_energy: f64,
}

impl OpticalHit {
    /// Builds a hit from the step that produced it.
    #[must_use]
    pub fn from_step(step: &Step, volume: VolumeIndex) -> Self {
        Self {
            track_id: step.track_id,
            parent_id: step.parent_id,
            volume,
            position: step.position,
            global_time: step.global_time,
            kinetic_energy: step.kinetic_energy,
        }
    }

    /// Registry index of the volume that detected the photon.
    #[must_use]
    pub fn volume(&self) -> VolumeIndex {
        self.volume
    }

    #[must_use]
    pub fn track_id(&self) -> i32 {
        self.track_id
    }

    #[must_use]
    pub fn global_time(&self) -> f64 {
        self.global_time
    }

    /// Returns the serializable representation.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn data(&self) -> OpticalHitData {
        OpticalHitData {
            track_id: self.track_id,
            parent_id: self.parent_id,
            volume_index: self.volume.0 as u32,
            x: self.position[0],
            y: self.position[1],
            z: self.position[2],
            global_time: self.global_time,
            kinetic_energy: self.kinetic_energy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{ParticleKind, TrackStatus, VolumeId};

    #[test]
    fn test_hit_from_step() {
        let step = Step::new(12, ParticleKind::OpticalPhoton, Some(VolumeId(5)), 2.8)
            .with_parent(3)
            .with_status(TrackStatus::StopAndKill)
            .with_position([1.0, -2.0, 30.5])
            .with_global_time(4.25);

        let hit = OpticalHit::from_step(&step, VolumeIndex(2));
        assert_eq!(hit.volume(), VolumeIndex(2));
        assert_eq!(hit.track_id(), 12);
        assert_eq!(hit.global_time(), 4.25);

        let data = hit.data();
        assert_eq!(data.volume_index, 2);
        assert_eq!(data.parent_id, 3);
        assert_eq!((data.x, data.y, data.z), (1.0, -2.0, 30.5));
        assert_eq!(data.global_time, 4.25);
        assert_eq!(data.kinetic_energy, 2.8);
    }
}
