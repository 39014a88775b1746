//! Two-phase event pipeline.
//!
//! [`HitPipeline::configure`] runs once and freezes the output schema.
//! After that, events are driven either step by step
//! ([`HitPipeline::begin_event`], [`HitPipeline::process_step`],
//! [`HitPipeline::end_event`]) or in one call with
//! [`HitPipeline::process_event`].

use crate::accumulator::{EventAccumulator, EventKinematics, PhotonCounters};
use crate::detector::{HitContext, SensitiveDetector};
use crate::error::{Error, Result};
use crate::random::RandomStream;
use crate::sink::RowSink;
use crate::step::{Step, VolumeId};
use std::collections::HashMap;

/// Outcome of one processed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSummary {
    /// Zero-based event number.
    pub event: u64,
    /// Steps delivered.
    pub steps: usize,
    /// Steps handled by a detector.
    pub handled: usize,
    pub photons: PhotonCounters,
}

/// Routes kernel steps to sensitive detectors and commits one row per event.
pub struct HitPipeline<S: RowSink> {
    detectors: Vec<Box<dyn SensitiveDetector>>,
    routes: HashMap<VolumeId, usize>,
    accumulator: EventAccumulator<S>,
    random: RandomStream,
    configured: bool,
    in_event: bool,
}

impl<S: RowSink> HitPipeline<S> {
    /// Creates an unconfigured pipeline.
    pub fn new(accumulator: EventAccumulator<S>, random: RandomStream) -> Self {
        Self {
            detectors: Vec::new(),
            routes: HashMap::new(),
            accumulator,
            random,
            configured: false,
            in_event: false,
        }
    }

    /// Adds a detector; returns its position.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyInitialized`] after [`HitPipeline::configure`].
    pub fn add_detector(&mut self, detector: Box<dyn SensitiveDetector>) -> Result<usize> {
        if self.configured {
            return Err(Error::AlreadyInitialized);
        }
        self.detectors.push(detector);
        Ok(self.detectors.len() - 1)
    }

    #[must_use]
    pub fn detector(&self, index: usize) -> Option<&dyn SensitiveDetector> {
        self.detectors.get(index).map(|detector| &**detector)
    }

    #[must_use]
    pub fn detectors(&self) -> &[Box<dyn SensitiveDetector>] {
        &self.detectors
    }

    #[must_use]
    pub fn accumulator(&self) -> &EventAccumulator<S> {
        &self.accumulator
    }

    pub fn accumulator_mut(&mut self) -> &mut EventAccumulator<S> {
        &mut self.accumulator
    }

    #[must_use]
    pub fn random(&self) -> &RandomStream {
        &self.random
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Registers summaries, defines and binds the schema, and records the seed.
    ///
    /// A schema error rolls back the detector summaries, leaving the
    /// pipeline unconfigured.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyInitialized`] on a second call and propagates
    /// schema and sink errors.
    pub fn configure(&mut self) -> Result<()> {
        if self.configured {
            return Err(Error::AlreadyInitialized);
        }

        let summaries = self.accumulator.record().detectors().len();
        if let Err(err) = self.define_output() {
            self.accumulator.record_mut().truncate_detectors(summaries);
            return Err(err);
        }

        for (position, detector) in self.detectors.iter().enumerate() {
            for id in detector.registry().ids() {
                if let Some(&owner) = self.routes.get(&id) {
                    log::warn!(
                        "{id} registered by `{}` and `{}`; keeping `{}`",
                        self.detectors[owner].name(),
                        detector.name(),
                        self.detectors[owner].name()
                    );
                    continue;
                }
                self.routes.insert(id, position);
            }
        }

        self.accumulator.store_random_seed(self.random.seed());
        self.accumulator.write_random_seed()?;
        self.configured = true;
        Ok(())
    }

    fn define_output(&mut self) -> Result<()> {
        for detector in &self.detectors {
            self.accumulator.add_detector(detector.name())?;
        }
        self.accumulator.initialize(&mut self.detectors)
    }

    /// Starts an event. A still-open event is aborted first.
    ///
    /// # Errors
    /// Returns [`Error::NotInitialized`] before [`HitPipeline::configure`],
    /// and propagates errors from aborting a leftover event.
    pub fn begin_event(&mut self, kinematics: EventKinematics) -> Result<()> {
        if !self.configured {
            return Err(Error::NotInitialized);
        }
        if self.in_event {
            log::warn!(
                "event {} was not ended; aborting it before the next event",
                self.accumulator.events()
            );
            self.abort_event()?;
        }

        self.accumulator.start_of_event();
        self.accumulator.set_kinematics(kinematics);
        for detector in &mut self.detectors {
            detector.initialize();
        }
        self.in_event = true;
        Ok(())
    }

    /// Hands one step to the detector owning its volume.
    ///
    /// Returns false for a missing step, a step outside every sensitive
    /// volume, or a step delivered outside an event.
    pub fn process_step(&mut self, step: Option<&Step>) -> bool {
        if !self.in_event {
            log::debug!("step delivered outside an event; ignored");
            return false;
        }
        let Some(step) = step else {
            return false;
        };
        let Some(&position) = step.volume.and_then(|id| self.routes.get(&id)) else {
            return false;
        };

        let mut ctx = HitContext::new(&mut self.random, self.accumulator.record_mut());
        self.detectors[position].process_hits(Some(step), &mut ctx)
    }

    /// Ends the event: detectors bind their containers, then the row is committed.
    ///
    /// # Errors
    /// Returns [`Error::NoOpenEvent`] without a matching
    /// [`HitPipeline::begin_event`], and propagates detector and sink errors.
    pub fn end_event(&mut self) -> Result<()> {
        if !self.in_event {
            return Err(Error::NoOpenEvent);
        }
        self.in_event = false;

        for detector in &mut self.detectors {
            detector.end_of_event(self.accumulator.record_mut())?;
        }
        self.accumulator.end_of_event()
    }

    /// Terminates an event early: commits what was collected, then resets.
    ///
    /// Does nothing when no event is open.
    ///
    /// # Errors
    /// Propagates errors from ending the event. State is reset either way.
    pub fn abort_event(&mut self) -> Result<()> {
        if !self.in_event {
            return Ok(());
        }
        let result = self.end_event();
        self.accumulator.clean_event();
        for detector in &mut self.detectors {
            detector.clean_event();
        }
        result
    }

    /// Runs a complete event.
    ///
    /// # Errors
    /// Propagates errors from [`HitPipeline::begin_event`] and
    /// [`HitPipeline::end_event`].
    pub fn process_event<'a, I>(
        &mut self,
        kinematics: EventKinematics,
        steps: I,
    ) -> Result<EventSummary>
    where
        I: IntoIterator<Item = &'a Step>,
    {
        self.begin_event(kinematics)?;
        let event = self.accumulator.events();

        let mut delivered = 0;
        let mut handled = 0;
        for step in steps {
            delivered += 1;
            if self.process_step(Some(step)) {
                handled += 1;
            }
        }
        let photons = self.accumulator.record().photons();
        self.end_event()?;

        Ok(EventSummary {
            event,
            steps: delivered,
            handled,
            photons,
        })
    }

    /// Ends any open event, then flushes and closes the sink.
    ///
    /// # Errors
    /// Propagates errors from ending the event and closing the sink.
    pub fn finish(mut self) -> Result<S> {
        if self.in_event {
            log::warn!("finishing with an open event; committing it");
            self.end_event()?;
        }
        self.accumulator.finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::RunConfig;
    use crate::cathode::PhotoCathode;
    use crate::efficiency::EfficiencyCurve;
    use crate::sink::MemorySink;
    use crate::step::{ParticleKind, TrackStatus};

    fn pipeline() -> HitPipeline<MemorySink> {
        let mut cathode = PhotoCathode::new("PMT");
        cathode
            .register_volume(VolumeId(1), "PMT1", Some(EfficiencyCurve::constant(1.0).unwrap()))
            .unwrap();
        let accumulator = EventAccumulator::new(RunConfig::default(), MemorySink::new());
        let mut pipeline = HitPipeline::new(accumulator, RandomStream::seeded(5));
        pipeline.add_detector(Box::new(cathode)).unwrap();
        pipeline.configure().unwrap();
        pipeline
    }

    fn photon(track_id: i32) -> Step {
        Step::new(track_id, ParticleKind::OpticalPhoton, Some(VolumeId(1)), 2.0)
            .with_status(TrackStatus::StopAndKill)
    }

    #[test]
    fn test_lifecycle_guards() {
        let mut pipeline = pipeline();
        assert!(matches!(pipeline.configure(), Err(Error::AlreadyInitialized)));
        assert!(pipeline
            .add_detector(Box::new(PhotoCathode::new("late")))
            .is_err());
        assert!(matches!(pipeline.end_event(), Err(Error::NoOpenEvent)));
        assert!(!pipeline.process_step(Some(&photon(1))));
    }

    #[test]
    fn test_failed_configure_leaves_pipeline_unchanged() {
        let accumulator = EventAccumulator::new(RunConfig::default(), MemorySink::new());
        let mut pipeline = HitPipeline::new(accumulator, RandomStream::seeded(5));
        for (name, id) in [("top", 1), ("bottom", 2)] {
            let mut cathode = PhotoCathode::new(name);
            cathode.register_volume(VolumeId(id), "PMT1", None).unwrap();
            pipeline.add_detector(Box::new(cathode)).unwrap();
        }

        for _ in 0..2 {
            match pipeline.configure() {
                Err(Error::DuplicateColumn(name)) => assert_eq!(name, "PMT1_num_photons"),
                other => panic!("unexpected configure result: {other:?}"),
            }
            assert!(!pipeline.is_configured());
            assert!(!pipeline.accumulator().is_initialized());
            assert!(pipeline.accumulator().record().detectors().is_empty());
            assert!(pipeline.accumulator().record().schema().is_empty());
            assert!(!pipeline.accumulator().record().schema().is_locked());
        }
        assert!(pipeline.accumulator().sink().metadata("random_seed").is_none());
    }

    #[test]
    fn test_unconfigured_pipeline_rejects_events() {
        let accumulator = EventAccumulator::new(RunConfig::default(), MemorySink::new());
        let mut pipeline = HitPipeline::new(accumulator, RandomStream::seeded(5));
        assert!(matches!(
            pipeline.begin_event(EventKinematics::default()),
            Err(Error::NotInitialized)
        ));
    }

    #[test]
    fn test_seed_written_at_configure() {
        let pipeline = pipeline();
        assert_eq!(pipeline.accumulator().sink().metadata("random_seed"), Some("5"));
    }

    #[test]
    fn test_process_event_summary() {
        let mut pipeline = pipeline();
        let steps = [photon(1), photon(2), photon(2)];
        let summary = pipeline
            .process_event(EventKinematics::default(), &steps)
            .unwrap();

        assert_eq!(summary.event, 0);
        assert_eq!(summary.steps, 3);
        assert_eq!(summary.handled, 3);
        assert_eq!(summary.photons.produced, 2);
        assert_eq!(summary.photons.absorbed, 3);
        assert_eq!(pipeline.random().draws(), 3);
    }

    #[test]
    fn test_open_event_aborted_on_next_begin() {
        let mut pipeline = pipeline();
        pipeline.begin_event(EventKinematics::default()).unwrap();
        assert!(pipeline.process_step(Some(&photon(1))));

        pipeline.begin_event(EventKinematics::default()).unwrap();
        assert_eq!(pipeline.accumulator().events(), 1);
        assert_eq!(pipeline.accumulator().record().photons(), PhotonCounters::default());
        pipeline.end_event().unwrap();

        let sink = pipeline.finish().unwrap();
        assert_eq!(sink.rows().len(), 2);
        let hits = sink.column("PMT1_num_photons").unwrap();
        assert_eq!(sink.rows()[0].get(hits).unwrap().as_count(), Some(1));
        assert_eq!(sink.rows()[1].get(hits).unwrap().as_count(), Some(0));
    }
}
