//! Energy-summing calorimeter detector.

use crate::accumulator::EventRecord;
use crate::detector::{DetectorOptions, HitContext, SensitiveDetector};
use crate::efficiency::EfficiencyCurve;
use crate::error::{Error, Result};
use crate::registry::{VolumeIndex, VolumeRegistry};
use crate::schema::{ColumnHandle, ColumnKind, Schema};
use crate::step::{ParticleKind, Step, VolumeId};

/// Option key: minimum deposit for a step's time to be recorded.
pub const MIN_TIMED_EDEP_OPTION: &str = "min_timed_edep";

/// Sums deposited energy per volume and records deposit times.
///
/// Optical photons terminating inside the crystal are counted as stopped,
/// and every optical track is reported for the produced-photon tally.
#[derive(Debug, Clone)]
pub struct Calorimeter {
    name: String,
    min_timed_edep: f64,
    registry: VolumeRegistry,
    edep: Vec<f64>,
    times: Vec<f64>,
    columns: Vec<ColumnHandle>,
    schema_defined: bool,
}

impl Calorimeter {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_timed_edep: 0.0,
            registry: VolumeRegistry::new(),
            edep: Vec::new(),
            times: Vec::new(),
            columns: Vec::new(),
            schema_defined: false,
        }
    }

    /// Energy deposited in a volume during the current event.
    #[must_use]
    pub fn edep(&self, index: VolumeIndex) -> f64 {
        self.edep.get(index.0).copied().unwrap_or(0.0)
    }

    /// Total deposit over all volumes.
    #[must_use]
    pub fn total_edep(&self) -> f64 {
        self.edep.iter().sum()
    }

    /// Global times of depositing steps, in step order.
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }
}

impl SensitiveDetector for Calorimeter {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, options: &DetectorOptions) -> Result<()> {
        for (key, value) in options {
            match key.as_str() {
                MIN_TIMED_EDEP_OPTION => {
                    self.min_timed_edep = value.trim().parse().map_err(|_| {
                        Error::ConfigError(format!(
                            "{}: `{MIN_TIMED_EDEP_OPTION}` expects a number, got `{value}`",
                            self.name
                        ))
                    })?;
                }
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
            return Err(Error::SchemaLocked(format!("{name}_edep")));
        }
        let index = self.registry.register(id, name, efficiency);
        self.edep.push(0.0);
        Ok(index)
    }

    fn registry(&self) -> &VolumeRegistry {
        &self.registry
    }

    fn define_output_schema(&mut self, schema: &mut Schema) -> Result<()> {
        self.columns.clear();
        for volume in self.registry.iter() {
            self.columns
                .push(schema.define_scalar(format!("{}_edep", volume.name), ColumnKind::Float)?);
        }
        self.schema_defined = true;
        Ok(())
    }

    fn clean_event(&mut self) {
        self.edep.iter_mut().for_each(|e| *e = 0.0);
        self.times.clear();
    }

    fn process_step(&mut self, step: &Step, ctx: &mut HitContext<'_>) -> bool {
        let Some(index) = step.volume.and_then(|id| self.registry.lookup(id)) else {
            return false;
        };

        if step.energy_deposit > 0.0 {
            self.edep[index.0] += step.energy_deposit;
            if step.energy_deposit >= self.min_timed_edep {
                self.times.push(step.global_time);
            }
        }

        if step.particle == ParticleKind::OpticalPhoton {
            if step.is_terminating() {
                ctx.record.stopped_optical_photon();
            }
            ctx.record.process_optical_track_id(step.track_id);
        }
        true
    }

    fn end_of_event(&mut self, record: &mut EventRecord) -> Result<()> {
        if self.columns.len() != self.edep.len() {
            return Err(Error::NotInitialized);
        }

        let row = record.row_mut();
        for (&edep, &column) in self.edep.iter().zip(&self.columns) {
            row.set_float(column, edep)?;
        }

        if record.has_detector(&self.name) {
            record.set_edep(&self.name, self.total_edep())?;
            record.set_global_times(&self.name, &self.times)?;
        }
        Ok(())
    }
}
