//! Sensitive detector capability.
//!
//! A sensitive detector owns a [`VolumeRegistry`] and one container per
//! registered volume. The transport kernel drives it through a strict
//! per-event sequence:
//!
//! 1. [`SensitiveDetector::initialize`] (clears the previous event),
//! 2. [`SensitiveDetector::process_hits`] once per step,
//! 3. [`SensitiveDetector::end_of_event`] (binds the containers into the row).

use crate::accumulator::EventRecord;
use crate::efficiency::EfficiencyCurve;
use crate::error::Result;
use crate::random::RandomSource;
use crate::registry::{VolumeIndex, VolumeRegistry};
use crate::schema::Schema;
use crate::step::{Step, VolumeId};
use std::collections::BTreeMap;

/// Free-form detector options (`key = value`).
pub type DetectorOptions = BTreeMap<String, String>;

/// Per-step collaborators: the shared random stream and the event record.
pub struct HitContext<'a> {
    pub random: &'a mut dyn RandomSource,
    pub record: &'a mut EventRecord,
}

impl<'a> HitContext<'a> {
    pub fn new(random: &'a mut dyn RandomSource, record: &'a mut EventRecord) -> Self {
        Self { random, record }
    }
}

/// Trait for sensitive detectors.
pub trait SensitiveDetector {
    /// Detector name, also its key in the event summary table.
    fn name(&self) -> &str;

    /// Applies detector options.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConfigError`] for malformed option values.
    fn configure(&mut self, options: &DetectorOptions) -> Result<()>;

    /// Registers a volume before the output schema is defined.
    ///
    /// # Errors
    /// Returns [`crate::Error::SchemaLocked`] once columns have been defined.
    fn register_volume(
        &mut self,
        id: VolumeId,
        name: &str,
        efficiency: Option<EfficiencyCurve>,
    ) -> Result<VolumeIndex>;

    /// Registered volumes.
    fn registry(&self) -> &VolumeRegistry;

    /// Contributes this detector's columns.
    ///
    /// # Errors
    /// Propagates schema errors (locked schema, duplicate names).
    fn define_output_schema(&mut self, schema: &mut Schema) -> Result<()>;

    /// Start of event.
    fn initialize(&mut self) {
        self.clean_event();
    }

    /// Zeroes counters and empties per-volume lists, keeping their storage.
    fn clean_event(&mut self);

    /// Handles one step. Returns false if the step is not in a registered volume.
    fn process_step(&mut self, step: &Step, ctx: &mut HitContext<'_>) -> bool;

    /// Kernel entry point; a missing step is not handled.
    fn process_hits(&mut self, step: Option<&Step>, ctx: &mut HitContext<'_>) -> bool {
        match step {
            Some(step) => self.process_step(step, ctx),
            None => false,
        }
    }

    /// End of event: binds the per-volume containers into the output row.
    ///
    /// # Errors
    /// Returns an error if the schema was never defined.
    fn end_of_event(&mut self, record: &mut EventRecord) -> Result<()>;

    /// Returns true if `volume` is registered with this detector.
    fn owns(&self, volume: VolumeId) -> bool {
        self.registry().lookup(volume).is_some()
    }
}
