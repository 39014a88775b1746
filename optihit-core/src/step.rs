//! Step records delivered by the transport kernel.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kernel handle of a physical volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeId(pub u32);

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "volume#{}", self.0)
    }
}

/// Particle species carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleKind {
    OpticalPhoton,
    Gamma,
    Electron,
    Positron,
    Proton,
    Neutron,
    /// Any other species, by PDG code.
    Other(i32),
}

impl ParticleKind {
    /// Returns the kernel's particle name.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::OpticalPhoton => "opticalphoton".to_string(),
            Self::Gamma => "gamma".to_string(),
            Self::Electron => "e-".to_string(),
            Self::Positron => "e+".to_string(),
            Self::Proton => "proton".to_string(),
            Self::Neutron => "neutron".to_string(),
            Self::Other(pdg) => format!("pdg:{pdg}"),
        }
    }
}

impl FromStr for ParticleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "opticalphoton" | "optical_photon" => Ok(Self::OpticalPhoton),
            "gamma" => Ok(Self::Gamma),
            "e-" | "electron" => Ok(Self::Electron),
            "e+" | "positron" => Ok(Self::Positron),
            "proton" => Ok(Self::Proton),
            "neutron" => Ok(Self::Neutron),
            other => other
                .strip_prefix("pdg:")
                .and_then(|code| code.parse().ok())
                .map(Self::Other)
                .ok_or_else(|| Error::ConfigError(format!("unknown particle `{other}`"))),
        }
    }
}

/// Track status at the end of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    /// Continues to propagate.
    #[default]
    Alive,
    /// Stopped but alive (e.g. waiting for an at-rest process).
    StopButAlive,
    /// Stopped and removed at the end of this step.
    StopAndKill,
    /// Removed together with its secondaries.
    KillTrackAndSecondaries,
    /// Suspended until its secondaries are tracked.
    Suspend,
    /// Deferred to the next event.
    PostponeToNextEvent,
}

impl TrackStatus {
    /// Returns true if the track ends at this step and will not propagate further.
    #[inline]
    #[must_use]
    pub fn is_terminating(self) -> bool {
        matches!(self, Self::StopAndKill)
    }
}

/// One step of a particle between two boundaries.
///
/// Energies share a single unit with the efficiency curves (eV in the
/// bundled setups). Times are in ns and positions in mm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub track_id: i32,
    #[serde(default)]
    pub parent_id: i32,
    pub particle: ParticleKind,
    #[serde(default)]
    pub status: TrackStatus,
    /// Kinetic energy at the post-step point.
    pub kinetic_energy: f64,
    /// Volume the step lies in; `None` once a track leaves the world.
    pub volume: Option<VolumeId>,
    #[serde(default)]
    pub position: [f64; 3],
    #[serde(default)]
    pub global_time: f64,
    #[serde(default)]
    pub energy_deposit: f64,
}

impl Step {
    /// Creates an in-flight step with zeroed position, time and deposit.
    #[must_use]
    pub fn new(
        track_id: i32,
        particle: ParticleKind,
        volume: Option<VolumeId>,
        kinetic_energy: f64,
    ) -> Self {
        Self {
            track_id,
            parent_id: 0,
            particle,
            status: TrackStatus::Alive,
            kinetic_energy,
            volume,
            position: [0.0; 3],
            global_time: 0.0,
            energy_deposit: 0.0,
        }
    }

    /// Sets the track status.
    #[must_use]
    pub fn with_status(mut self, status: TrackStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the parent track id.
    #[must_use]
    pub fn with_parent(mut self, parent_id: i32) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Sets the post-step position.
    #[must_use]
    pub fn with_position(mut self, position: [f64; 3]) -> Self {
        self.position = position;
        self
    }

    /// Sets the global time.
    #[must_use]
    pub fn with_global_time(mut self, time: f64) -> Self {
        self.global_time = time;
        self
    }

    /// Sets the energy deposited along the step.
    #[must_use]
    pub fn with_energy_deposit(mut self, energy: f64) -> Self {
        self.energy_deposit = energy;
        self
    }

    /// Returns true if the track ends with this step.
    #[inline]
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.status.is_terminating()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminating_status() {
        assert!(TrackStatus::StopAndKill.is_terminating());
        assert!(!TrackStatus::Alive.is_terminating());
        assert!(!TrackStatus::StopButAlive.is_terminating());
        assert!(!TrackStatus::Suspend.is_terminating());
    }

    #[test]
    fn test_particle_names() {
        for kind in [
            ParticleKind::OpticalPhoton,
            ParticleKind::Gamma,
            ParticleKind::Electron,
            ParticleKind::Positron,
            ParticleKind::Other(2112),
        ] {
            assert_eq!(kind.name().parse::<ParticleKind>().unwrap(), kind);
        }
        assert!("graviton".parse::<ParticleKind>().is_err());
    }

    #[test]
    fn test_step_json_defaults() {
        let json = r#"{
            "track_id": 7,
            "particle": "optical_photon",
            "status": "stop_and_kill",
            "kinetic_energy": 2.9,
            "volume": 3
        }"#;
        let step: Step = serde_json::from_str(json).unwrap();
        assert_eq!(step.track_id, 7);
        assert_eq!(step.volume, Some(VolumeId(3)));
        assert!(step.is_terminating());
        assert_eq!(step.position, [0.0; 3]);
        assert_eq!(step.parent_id, 0);
    }
}
