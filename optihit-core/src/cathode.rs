//! Photo-cathode sensitive detector.
//!
//! Optical photons that are absorbed (stopped and killed) in a registered
//! cathode volume are accepted with the volume's energy-dependent
//! efficiency. Each acceptance test consumes exactly one deviate from the
//! shared stream, in step order.

use crate::accumulator::EventRecord;
use crate::detector::{DetectorOptions, HitContext, SensitiveDetector};
use crate::efficiency::EfficiencyCurve;
use crate::error::{Error, Result};
use crate::hit::{OpticalHit, OpticalHitData};
use crate::registry::{VolumeIndex, VolumeRegistry};
use crate::schema::{ColumnHandle, ColumnKind, Schema};
use crate::step::{ParticleKind, Step, VolumeId};

/// Option key selecting the particle whose absorption is detected.
pub const BOUNDARY_PARTICLE_OPTION: &str = "boundary_particle";

#[derive(Debug, Clone, Default)]
struct VolumeEventState {
    accepted: u64,
    hits: Vec<OpticalHit>,
    data: Vec<OpticalHitData>,
}

impl VolumeEventState {
    fn clear(&mut self) {
        self.accepted = 0;
        self.hits.clear();
        self.data.clear();
    }
}

#[derive(Debug, Clone, Copy)]
struct VolumeColumns {
    num_photons: ColumnHandle,
    optical_hits: ColumnHandle,
}

/// Cathode of a photomultiplier (or any photon counter).
#[derive(Debug, Clone)]
pub struct PhotoCathode {
    name: String,
    boundary_particle: ParticleKind,
    registry: VolumeRegistry,
    volumes: Vec<VolumeEventState>,
    columns: Vec<VolumeColumns>,
    schema_defined: bool,
}

impl PhotoCathode {
    /// Creates a cathode detecting optical photons.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boundary_particle: ParticleKind::OpticalPhoton,
            registry: VolumeRegistry::new(),
            volumes: Vec::new(),
            columns: Vec::new(),
            schema_defined: false,
        }
    }

    /// Particle kind whose absorption counts as a detection.
    #[must_use]
    pub fn boundary_particle(&self) -> ParticleKind {
        self.boundary_particle
    }

    /// Accepted photons in a volume for the current event.
    #[must_use]
    pub fn accepted_count(&self, index: VolumeIndex) -> u64 {
        self.volumes.get(index.0).map_or(0, |state| state.accepted)
    }

    /// Accepted photons over all volumes for the current event.
    #[must_use]
    pub fn total_accepted(&self) -> u64 {
        self.volumes.iter().map(|state| state.accepted).sum()
    }

    /// Hits recorded in a volume for the current event.
    #[must_use]
    pub fn hits(&self, index: VolumeIndex) -> &[OpticalHit] {
        self.volumes
            .get(index.0)
            .map_or(&[][..], |state| state.hits.as_slice())
    }

    /// Serialized hits of a volume for the current event.
    #[must_use]
    pub fn hit_data(&self, index: VolumeIndex) -> &[OpticalHitData] {
        self.volumes
            .get(index.0)
            .map_or(&[][..], |state| state.data.as_slice())
    }

    /// Storage reserved by a volume's hit lists (hits, data).
    #[must_use]
    pub fn hit_capacity(&self, index: VolumeIndex) -> (usize, usize) {
        self.volumes
            .get(index.0)
            .map_or((0, 0), |state| (state.hits.capacity(), state.data.capacity()))
    }
}

impl SensitiveDetector for PhotoCathode {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, options: &DetectorOptions) -> Result<()> {
        for (key, value) in options {
            match key.as_str() {
                BOUNDARY_PARTICLE_OPTION => self.boundary_particle = value.parse()?,
                other => log::warn!("{}: ignoring unknown option `{other}`", self.name),
            }
        }
        Ok(())
    }

    fn register_volume(
        &mut self,
        id: VolumeId,
        name: &str,
        efficiency: Option<EfficiencyCurve>,
    ) -> Result<VolumeIndex> {
        if self.schema_defined {
            return Err(Error::SchemaLocked(format!("{name}_num_photons")));
        }
        if efficiency.is_none() {
            log::warn!(
                "{}: volume `{name}` has no efficiency curve and will never detect",
                self.name
            );
        }
        let index = self.registry.register(id, name, efficiency);
        self.volumes.push(VolumeEventState::default());
        Ok(index)
    }

    fn registry(&self) -> &VolumeRegistry {
        &self.registry
    }

    fn define_output_schema(&mut self, schema: &mut Schema) -> Result<()> {
        self.columns.clear();
        for volume in self.registry.iter() {
            let num_photons =
                schema.define_scalar(format!("{}_num_photons", volume.name), ColumnKind::Count)?;
            let optical_hits =
                schema.define_list(format!("{}_optical_hits", volume.name), ColumnKind::HitList)?;
            self.columns.push(VolumeColumns {
                num_photons,
                optical_hits,
            });
        }
        self.schema_defined = true;
        Ok(())
    }

    fn clean_event(&mut self) {
        for state in &mut self.volumes {
            state.clear();
        }
    }

    fn process_step(&mut self, step: &Step, ctx: &mut HitContext<'_>) -> bool {
        let Some(index) = step.volume.and_then(|id| self.registry.lookup(id)) else {
            log::trace!(
                "{}: step of track {} outside registered volumes",
                self.name,
                step.track_id
            );
            return false;
        };

        if step.particle != self.boundary_particle {
            return true;
        }

        // Only absorbed photons are candidates; in-flight steps just get counted below.
        if step.is_terminating() {
            let efficiency = self
                .registry
                .get(index)
                .map_or(0.0, |volume| volume.efficiency_at(step.kinetic_energy));

            if ctx.random.uniform() < efficiency {
                let state = &mut self.volumes[index.0];
                state.accepted += 1;
                let hit = OpticalHit::from_step(step, index);
                state.data.push(hit.data());
                state.hits.push(hit);
                ctx.record.optical_hit();
            }
        }

        ctx.record.process_optical_track_id(step.track_id);
        true
    }

    fn end_of_event(&mut self, record: &mut EventRecord) -> Result<()> {
        if self.columns.len() != self.volumes.len() {
            return Err(Error::NotInitialized);
        }

        let row = record.row_mut();
        for (state, columns) in self.volumes.iter().zip(&self.columns) {
            row.set_count(columns.num_photons, state.accepted)?;
            row.bind_hits(columns.optical_hits, &state.data)?;
        }

        if record.has_detector(&self.name) {
            record.set_optical_hits(&self.name, self.total_accepted())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::EventRecord;
    use crate::random::RandomSource;
    use crate::step::TrackStatus;

    /// Replays fixed deviates.
    struct Scripted(Vec<f64>);

    impl RandomSource for Scripted {
        fn uniform(&mut self) -> f64 {
            self.0.remove(0)
        }
    }

    fn absorbed(track_id: i32, volume: u32, energy: f64) -> Step {
        Step::new(track_id, ParticleKind::OpticalPhoton, Some(VolumeId(volume)), energy)
            .with_status(TrackStatus::StopAndKill)
    }

    fn cathode() -> PhotoCathode {
        let mut cathode = PhotoCathode::new("PMT");
        cathode
            .register_volume(
                VolumeId(1),
                "PMT1",
                Some(EfficiencyCurve::tabulated([(2.0, 0.5), (4.0, 0.5)]).unwrap()),
            )
            .unwrap();
        cathode.register_volume(VolumeId(2), "PMT2", None).unwrap();
        cathode
    }

    #[test]
    fn test_acceptance_threshold() {
        let mut cathode = cathode();
        let mut record = EventRecord::default();
        let mut random = Scripted(vec![0.49, 0.51]);
        let mut ctx = HitContext::new(&mut random, &mut record);

        assert!(cathode.process_step(&absorbed(1, 1, 3.0), &mut ctx));
        assert!(cathode.process_step(&absorbed(2, 1, 3.0), &mut ctx));

        assert_eq!(cathode.accepted_count(VolumeIndex(0)), 1);
        assert_eq!(cathode.hits(VolumeIndex(0))[0].track_id(), 1);
        assert_eq!(record.photons().absorbed, 1);
        assert_eq!(record.photons().produced, 2);
    }

    #[test]
    fn test_missing_curve_consumes_draw_without_hit() {
        let mut cathode = cathode();
        let mut record = EventRecord::default();
        let mut random = Scripted(vec![0.0, 0.1]);
        let mut ctx = HitContext::new(&mut random, &mut record);

        assert!(cathode.process_step(&absorbed(1, 2, 3.0), &mut ctx));
        assert_eq!(cathode.accepted_count(VolumeIndex(1)), 0);
        // The second deviate is still available for the next test.
        assert_eq!(random.0, vec![0.1]);
    }

    #[test]
    fn test_out_of_domain_energy_never_accepted() {
        let mut cathode = cathode();
        let mut record = EventRecord::default();
        let mut random = Scripted(vec![0.0]);
        let mut ctx = HitContext::new(&mut random, &mut record);

        assert!(cathode.process_step(&absorbed(1, 1, 9.0), &mut ctx));
        assert_eq!(cathode.total_accepted(), 0);
    }

    #[test]
    fn test_non_boundary_particle_ignored() {
        let mut cathode = cathode();
        let mut record = EventRecord::default();
        let mut random = Scripted(Vec::new());
        let mut ctx = HitContext::new(&mut random, &mut record);

        let electron = Step::new(5, ParticleKind::Electron, Some(VolumeId(1)), 3.0)
            .with_status(TrackStatus::StopAndKill);
        assert!(cathode.process_step(&electron, &mut ctx));
        assert_eq!(record.photons().produced, 0);
    }

    #[test]
    fn test_missing_step_not_handled() {
        let mut cathode = cathode();
        let mut record = EventRecord::default();
        let mut random = Scripted(Vec::new());
        let mut ctx = HitContext::new(&mut random, &mut record);
        assert!(!cathode.process_hits(None, &mut ctx));
    }

    #[test]
    fn test_configure_boundary_particle() {
        let mut cathode = cathode();
        let mut options = DetectorOptions::new();
        options.insert(BOUNDARY_PARTICLE_OPTION.to_string(), "gamma".to_string());
        options.insert("gain".to_string(), "1e6".to_string());
        cathode.configure(&options).unwrap();
        assert_eq!(cathode.boundary_particle(), ParticleKind::Gamma);

        options.insert(BOUNDARY_PARTICLE_OPTION.to_string(), "tachyon".to_string());
        assert!(cathode.configure(&options).is_err());
    }

    #[test]
    fn test_schema_columns_and_lock() {
        let mut cathode = cathode();
        let mut schema = Schema::new();
        cathode.define_output_schema(&mut schema).unwrap();

        let names: Vec<&str> = schema.iter().map(|(_, spec)| spec.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["PMT1_num_photons", "PMT1_optical_hits", "PMT2_num_photons", "PMT2_optical_hits"]
        );
        assert!(matches!(
            cathode.register_volume(VolumeId(3), "PMT3", None),
            Err(Error::SchemaLocked(_))
        ));
    }
}
