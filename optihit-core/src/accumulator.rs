//! Run and event bookkeeping.
//!
//! [`EventRecord`] is the part of the accumulator that sensitive detectors
//! see during an event: kinematics, per-detector summaries, photon
//! counters, optical track deduplication, and the output row arena.
//! [`EventAccumulator`] adds run identity, the output schema lifecycle,
//! checkpointing and the sink.

use crate::detector::SensitiveDetector;
use crate::error::{Error, Result};
use crate::schema::{ColumnHandle, ColumnKind, Row, Schema};
use crate::sink::{bind_schema, RowSink};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Global kinematic inputs of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EventKinematics {
    /// Theoretical asymmetry.
    pub asym: f64,
    /// Normalized scattered-photon energy.
    pub rho: f64,
    /// Absolute scattered-photon energy.
    pub gamma_e: f64,
    /// Scattering angle (degrees).
    pub theta: f64,
    /// Azimuthal angle (degrees).
    pub phi: f64,
}

/// Event-wide optical photon tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhotonCounters {
    /// Photons stopped outside a cathode.
    pub stopped: u64,
    /// Distinct optical tracks seen.
    pub produced: u64,
    /// Photons accepted by a cathode.
    pub absorbed: u64,
}

/// Per-detector event summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorSummary {
    pub name: String,
    pub edep: f64,
    pub optical_hits: u64,
    pub times: Vec<f64>,
}

impl DetectorSummary {
    fn clear(&mut self) {
        self.edep = 0.0;
        self.optical_hits = 0;
        self.times.clear();
    }
}

/// Event state shared with sensitive detectors.
#[derive(Debug, Clone, Default)]
pub struct EventRecord {
    kinematics: EventKinematics,
    photons: PhotonCounters,
    detectors: Vec<DetectorSummary>,
    detector_indices: HashMap<String, usize>,
    optical_track_ids: HashSet<i32>,
    schema: Schema,
    row: Row,
}

impl EventRecord {
    #[must_use]
    pub fn kinematics(&self) -> &EventKinematics {
        &self.kinematics
    }

    pub fn set_kinematics(&mut self, kinematics: EventKinematics) {
        self.kinematics = kinematics;
    }

    pub fn set_asym(&mut self, asym: f64) {
        self.kinematics.asym = asym;
    }

    pub fn set_rho(&mut self, rho: f64) {
        self.kinematics.rho = rho;
    }

    pub fn set_gamma_e(&mut self, energy: f64) {
        self.kinematics.gamma_e = energy;
    }

    pub fn set_theta(&mut self, theta: f64) {
        self.kinematics.theta = theta;
    }

    pub fn set_phi(&mut self, phi: f64) {
        self.kinematics.phi = phi;
    }

    #[must_use]
    pub fn photons(&self) -> PhotonCounters {
        self.photons
    }

    /// Counts a photon stopped without detection.
    pub fn stopped_optical_photon(&mut self) {
        self.photons.stopped += 1;
    }

    /// Counts a photon accepted by a cathode.
    pub fn optical_hit(&mut self) {
        self.photons.absorbed += 1;
    }

    /// Counts an optical track once per event, however often it is reported.
    pub fn process_optical_track_id(&mut self, track_id: i32) {
        if self.optical_track_ids.insert(track_id) {
            self.photons.produced += 1;
        }
    }

    /// Appends a detector to the summary table and returns its index.
    ///
    /// Names must be unique; a repeated name shadows the earlier entry.
    pub fn add_detector(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        let index = self.detectors.len();
        self.detector_indices.insert(name.clone(), index);
        self.detectors.push(DetectorSummary {
            name,
            ..DetectorSummary::default()
        });
        index
    }

    /// Drops summaries added after the first `len`.
    pub(crate) fn truncate_detectors(&mut self, len: usize) {
        if len >= self.detectors.len() {
            return;
        }
        self.detectors.truncate(len);
        self.detector_indices.clear();
        for (index, summary) in self.detectors.iter().enumerate() {
            self.detector_indices.insert(summary.name.clone(), index);
        }
    }

    #[must_use]
    pub fn has_detector(&self, name: &str) -> bool {
        self.detector_indices.contains_key(name)
    }

    #[must_use]
    pub fn detector(&self, name: &str) -> Option<&DetectorSummary> {
        self.detector_indices
            .get(name)
            .map(|&index| &self.detectors[index])
    }

    /// Summaries in registration order.
    #[must_use]
    pub fn detectors(&self) -> &[DetectorSummary] {
        &self.detectors
    }

    fn summary_mut(&mut self, name: &str) -> Result<&mut DetectorSummary> {
        match self.detector_indices.get(name) {
            Some(&index) => Ok(&mut self.detectors[index]),
            None => Err(Error::UnknownDetector(name.to_string())),
        }
    }

    /// Sets the energy deposited in a detector.
    ///
    /// # Errors
    /// Returns [`Error::UnknownDetector`] if `name` was never added.
    pub fn set_edep(&mut self, name: &str, edep: f64) -> Result<()> {
        self.summary_mut(name)?.edep = edep;
        Ok(())
    }

    /// Sets the optical hit count of a detector.
    ///
    /// # Errors
    /// Returns [`Error::UnknownDetector`] if `name` was never added.
    pub fn set_optical_hits(&mut self, name: &str, hits: u64) -> Result<()> {
        self.summary_mut(name)?.optical_hits = hits;
        Ok(())
    }

    /// Replaces the hit times of a detector.
    ///
    /// # Errors
    /// Returns [`Error::UnknownDetector`] if `name` was never added.
    pub fn set_global_times(&mut self, name: &str, times: &[f64]) -> Result<()> {
        let summary = self.summary_mut(name)?;
        summary.times.clear();
        summary.times.extend_from_slice(times);
        Ok(())
    }

    /// Resets every per-event value, keeping container storage.
    pub fn clean_event(&mut self) {
        self.kinematics = EventKinematics::default();
        self.photons = PhotonCounters::default();
        for summary in &mut self.detectors {
            summary.clear();
        }
        self.optical_track_ids.clear();
        self.row.reset();
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    #[must_use]
    pub fn row(&self) -> &Row {
        &self.row
    }

    pub fn row_mut(&mut self) -> &mut Row {
        &mut self.row
    }
}

/// Run identity and output policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub run_number: u32,
    /// Minimum number of digits in the run label.
    pub run_min_digits: usize,
    /// Flush every n committed events; 0 disables periodic flushes.
    pub auto_save: u64,
    pub output_path: PathBuf,
    pub file_prefix: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_number: 0,
            run_min_digits: 4,
            auto_save: 0,
            output_path: PathBuf::from("."),
            file_prefix: "optihit_".to_string(),
        }
    }
}

impl RunConfig {
    #[must_use]
    pub fn with_run_number(mut self, run_number: u32) -> Self {
        self.run_number = run_number;
        self
    }

    #[must_use]
    pub fn with_run_min_digits(mut self, digits: usize) -> Self {
        self.run_min_digits = digits;
        self
    }

    #[must_use]
    pub fn with_auto_save(mut self, events: u64) -> Self {
        self.auto_save = events;
        self
    }

    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    #[must_use]
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Zero-padded run number, e.g. `0042`.
    #[must_use]
    pub fn run_label(&self) -> String {
        format!("{:0width$}", self.run_number, width = self.run_min_digits)
    }

    /// Output file name, e.g. `optihit_0042.jsonl`.
    #[must_use]
    pub fn output_file_name(&self, extension: &str) -> String {
        format!("{}{}.{extension}", self.file_prefix, self.run_label())
    }

    /// Output file path under `output_path`.
    #[must_use]
    pub fn output_file(&self, extension: &str) -> PathBuf {
        self.output_path.join(self.output_file_name(extension))
    }
}

#[derive(Debug, Clone, Copy)]
struct DetectorColumns {
    edep: ColumnHandle,
    optical_photons: ColumnHandle,
    times: ColumnHandle,
}

#[derive(Debug, Clone)]
struct GlobalColumns {
    event: ColumnHandle,
    asym: ColumnHandle,
    rho: ColumnHandle,
    gamma_e: ColumnHandle,
    theta: ColumnHandle,
    phi: ColumnHandle,
    random_seed: ColumnHandle,
    stopped: ColumnHandle,
    produced: ColumnHandle,
    absorbed: ColumnHandle,
    detectors: Vec<DetectorColumns>,
}

impl GlobalColumns {
    fn define(schema: &mut Schema, detectors: &[DetectorSummary]) -> Result<Self> {
        let event = schema.define_scalar("event", ColumnKind::Count)?;
        let asym = schema.define_scalar("asym", ColumnKind::Float)?;
        let rho = schema.define_scalar("rho", ColumnKind::Float)?;
        let gamma_e = schema.define_scalar("gamma_e", ColumnKind::Float)?;
        let theta = schema.define_scalar("theta", ColumnKind::Float)?;
        let phi = schema.define_scalar("phi", ColumnKind::Float)?;
        let random_seed = schema.define_scalar("random_seed", ColumnKind::Count)?;
        let stopped = schema.define_scalar("optical_photons_stopped", ColumnKind::Count)?;
        let produced = schema.define_scalar("optical_photons_produced", ColumnKind::Count)?;
        let absorbed = schema.define_scalar("optical_photons_absorbed", ColumnKind::Count)?;

        let mut columns = Vec::with_capacity(detectors.len());
        for summary in detectors {
            columns.push(DetectorColumns {
                edep: schema.define_scalar(format!("{}.eDep", summary.name), ColumnKind::Float)?,
                optical_photons: schema
                    .define_scalar(format!("{}.nOpticalPhotons", summary.name), ColumnKind::Count)?,
                times: schema
                    .define_list(format!("{}_times", summary.name), ColumnKind::FloatList)?,
            });
        }

        Ok(Self {
            event,
            asym,
            rho,
            gamma_e,
            theta,
            phi,
            random_seed,
            stopped,
            produced,
            absorbed,
            detectors: columns,
        })
    }
}

/// Event accumulator: owns the output schema, the row and the sink.
#[derive(Debug)]
pub struct EventAccumulator<S> {
    run: RunConfig,
    record: EventRecord,
    columns: Option<GlobalColumns>,
    random_seed: Option<u64>,
    events: u64,
    sink: S,
}

impl<S: RowSink> EventAccumulator<S> {
    /// Creates an accumulator writing to `sink`.
    pub fn new(run: RunConfig, sink: S) -> Self {
        Self {
            run,
            record: EventRecord::default(),
            columns: None,
            random_seed: None,
            events: 0,
            sink,
        }
    }

    #[must_use]
    pub fn run(&self) -> &RunConfig {
        &self.run
    }

    pub fn set_run_number(&mut self, run_number: u32) {
        self.run.run_number = run_number;
    }

    pub fn set_run_min_digits(&mut self, digits: usize) {
        self.run.run_min_digits = digits;
    }

    pub fn set_auto_save(&mut self, events: u64) {
        self.run.auto_save = events;
    }

    pub fn set_output_path(&mut self, path: impl AsRef<Path>) {
        self.run.output_path = path.as_ref().to_path_buf();
    }

    pub fn set_file_prefix(&mut self, prefix: impl Into<String>) {
        self.run.file_prefix = prefix.into();
    }

    /// Zero-padded run number.
    #[must_use]
    pub fn run_label(&self) -> String {
        self.run.run_label()
    }

    #[must_use]
    pub fn record(&self) -> &EventRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut EventRecord {
        &mut self.record
    }

    /// Appends a detector to the summary table.
    ///
    /// # Errors
    /// Returns [`Error::SchemaLocked`] after [`EventAccumulator::initialize`].
    pub fn add_detector(&mut self, name: impl Into<String>) -> Result<usize> {
        let name = name.into();
        if self.columns.is_some() {
            return Err(Error::SchemaLocked(format!("{name}.eDep")));
        }
        Ok(self.record.add_detector(name))
    }

    /// Events committed so far.
    #[must_use]
    pub fn events(&self) -> u64 {
        self.events
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.columns.is_some()
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Defines the full column set, locks it, and binds it on the sink.
    ///
    /// Columns are collected in a scratch schema first, so a schema error
    /// (a duplicate column name, say) leaves the accumulator untouched and
    /// the call can be repeated. A sink that fails while columns are being
    /// bound may hold a partial binding and should be discarded.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyInitialized`] on a second call, and
    /// propagates schema and sink errors.
    pub fn initialize(&mut self, detectors: &mut [Box<dyn SensitiveDetector>]) -> Result<()> {
        if self.columns.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let mut schema = self.record.schema.clone();
        let columns = GlobalColumns::define(&mut schema, &self.record.detectors)?;
        for detector in detectors.iter_mut() {
            detector.define_output_schema(&mut schema)?;
        }
        schema.lock();
        bind_schema(&schema, &mut self.sink)?;
        self.record.row = Row::for_schema(&schema);
        self.record.schema = schema;

        log::info!(
            "run {}: output schema with {} columns ({} detectors)",
            self.run_label(),
            self.record.schema.len(),
            detectors.len()
        );
        self.columns = Some(columns);
        Ok(())
    }

    /// Resets transient state at the start of an event.
    pub fn start_of_event(&mut self) {
        self.record.clean_event();
    }

    /// Same as [`EventRecord::clean_event`].
    pub fn clean_event(&mut self) {
        self.record.clean_event();
    }

    pub fn set_kinematics(&mut self, kinematics: EventKinematics) {
        self.record.set_kinematics(kinematics);
    }

    pub fn set_asym(&mut self, asym: f64) {
        self.record.set_asym(asym);
    }

    pub fn set_rho(&mut self, rho: f64) {
        self.record.set_rho(rho);
    }

    pub fn set_gamma_e(&mut self, energy: f64) {
        self.record.set_gamma_e(energy);
    }

    pub fn set_theta(&mut self, theta: f64) {
        self.record.set_theta(theta);
    }

    pub fn set_phi(&mut self, phi: f64) {
        self.record.set_phi(phi);
    }

    /// Sets the energy deposited in a detector.
    ///
    /// # Errors
    /// Returns [`Error::UnknownDetector`] for an unregistered name.
    pub fn set_edep(&mut self, name: &str, edep: f64) -> Result<()> {
        self.record.set_edep(name, edep)
    }

    /// Sets the optical hit count of a detector.
    ///
    /// # Errors
    /// Returns [`Error::UnknownDetector`] for an unregistered name.
    pub fn set_optical_hits(&mut self, name: &str, hits: u64) -> Result<()> {
        self.record.set_optical_hits(name, hits)
    }

    /// Replaces the hit times of a detector.
    ///
    /// # Errors
    /// Returns [`Error::UnknownDetector`] for an unregistered name.
    pub fn set_global_times(&mut self, name: &str, times: &[f64]) -> Result<()> {
        self.record.set_global_times(name, times)
    }

    pub fn process_optical_track_id(&mut self, track_id: i32) {
        self.record.process_optical_track_id(track_id);
    }

    pub fn optical_hit(&mut self) {
        self.record.optical_hit();
    }

    pub fn stopped_optical_photon(&mut self) {
        self.record.stopped_optical_photon();
    }

    /// Records the seed of the shared random stream.
    pub fn store_random_seed(&mut self, seed: u64) {
        self.random_seed = Some(seed);
    }

    #[must_use]
    pub fn random_seed(&self) -> Option<u64> {
        self.random_seed
    }

    /// Persists the seed next to the run metadata.
    ///
    /// Metadata keys are written once per sink, so a second call fails.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateMetadata`] when the keys were already
    /// written, and propagates other sink errors.
    pub fn write_random_seed(&mut self) -> Result<()> {
        let Some(seed) = self.random_seed else {
            log::warn!("run {}: no random seed stored", self.run_label());
            return Ok(());
        };
        self.sink.write_metadata("run_number", &self.run.run_number.to_string())?;
        self.sink.write_metadata("run_label", &self.run.run_label())?;
        self.sink.write_metadata("random_seed", &seed.to_string())?;
        Ok(())
    }

    /// Commits the event row and flushes on auto-save boundaries.
    ///
    /// # Errors
    /// Returns [`Error::NotInitialized`] before [`EventAccumulator::initialize`],
    /// and propagates sink errors.
    pub fn end_of_event(&mut self) -> Result<()> {
        let Some(columns) = &self.columns else {
            return Err(Error::NotInitialized);
        };

        let record = &mut self.record;
        let kinematics = record.kinematics;
        let photons = record.photons;
        let row = &mut record.row;

        row.set_count(columns.event, self.events)?;
        row.set_float(columns.asym, kinematics.asym)?;
        row.set_float(columns.rho, kinematics.rho)?;
        row.set_float(columns.gamma_e, kinematics.gamma_e)?;
        row.set_float(columns.theta, kinematics.theta)?;
        row.set_float(columns.phi, kinematics.phi)?;
        row.set_count(columns.random_seed, self.random_seed.unwrap_or(0))?;
        row.set_count(columns.stopped, photons.stopped)?;
        row.set_count(columns.produced, photons.produced)?;
        row.set_count(columns.absorbed, photons.absorbed)?;
        for (summary, handles) in record.detectors.iter().zip(&columns.detectors) {
            row.set_float(handles.edep, summary.edep)?;
            row.set_count(handles.optical_photons, summary.optical_hits)?;
            row.bind_floats(handles.times, &summary.times)?;
        }

        self.sink.commit_row(row)?;
        self.events += 1;

        if self.run.auto_save > 0 && self.events % self.run.auto_save == 0 {
            log::info!("run {}: auto-save after {} events", self.run.run_label(), self.events);
            self.sink.flush()?;
        }
        Ok(())
    }

    /// Final flush and close. Returns the sink.
    ///
    /// # Errors
    /// Propagates sink errors.
    pub fn finished(mut self) -> Result<S> {
        self.sink.close()?;
        log::info!("run {}: closed after {} events", self.run_label(), self.events);
        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn accumulator(auto_save: u64) -> EventAccumulator<MemorySink> {
        let run = RunConfig::default()
            .with_run_number(42)
            .with_auto_save(auto_save);
        let mut acc = EventAccumulator::new(run, MemorySink::new());
        acc.add_detector("Crystal").unwrap();
        acc.initialize(&mut []).unwrap();
        acc
    }

    #[test]
    fn test_run_label_padding() {
        let run = RunConfig::default().with_run_number(42).with_run_min_digits(5);
        assert_eq!(run.run_label(), "00042");
        assert_eq!(run.output_file_name("jsonl"), "optihit_00042.jsonl");

        let run = run.with_run_number(123_456).with_run_min_digits(3);
        assert_eq!(run.run_label(), "123456");

        let run = run.with_output_path("/data").with_file_prefix("compton_");
        assert_eq!(run.output_file("h5"), PathBuf::from("/data/compton_123456.h5"));
    }

    #[test]
    fn test_track_id_dedup() {
        let mut record = EventRecord::default();
        for _ in 0..5 {
            record.process_optical_track_id(17);
        }
        record.process_optical_track_id(18);
        assert_eq!(record.photons().produced, 2);

        record.clean_event();
        record.process_optical_track_id(17);
        assert_eq!(record.photons().produced, 1);
    }

    #[test]
    fn test_detector_setters() {
        let mut record = EventRecord::default();
        record.add_detector("Crystal");
        record.set_edep("Crystal", 3.5).unwrap();
        record.set_optical_hits("Crystal", 12).unwrap();
        record.set_global_times("Crystal", &[1.0, 2.0]).unwrap();

        let summary = record.detector("Crystal").unwrap();
        assert_eq!(summary.edep, 3.5);
        assert_eq!(summary.optical_hits, 12);
        assert_eq!(summary.times, vec![1.0, 2.0]);

        assert!(matches!(
            record.set_edep("Missing", 1.0),
            Err(Error::UnknownDetector(name)) if name == "Missing"
        ));
    }

    #[test]
    fn test_commit_before_initialize() {
        let mut acc = EventAccumulator::new(RunConfig::default(), MemorySink::new());
        assert!(matches!(acc.end_of_event(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_schema_defined_once() {
        let mut acc = accumulator(0);
        assert!(acc.is_initialized());
        assert!(matches!(acc.initialize(&mut []), Err(Error::AlreadyInitialized)));
        assert!(acc.add_detector("Late").is_err());
        assert!(acc
            .record_mut()
            .schema_mut()
            .define_scalar("late", ColumnKind::Float)
            .is_err());

        let names: Vec<&str> = acc.sink().columns().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(&names[..3], &["event", "asym", "rho"]);
        assert!(names.contains(&"Crystal.eDep"));
        assert!(names.contains(&"Crystal.nOpticalPhotons"));
        assert!(names.contains(&"Crystal_times"));
    }

    #[test]
    fn test_end_of_event_commits_row() {
        let mut acc = accumulator(0);
        acc.store_random_seed(77);
        acc.start_of_event();
        acc.set_asym(0.12);
        acc.set_gamma_e(21.5);
        acc.optical_hit();
        acc.stopped_optical_photon();
        acc.process_optical_track_id(4);
        acc.set_edep("Crystal", 8.0).unwrap();
        acc.end_of_event().unwrap();

        let sink = acc.sink();
        let row = &sink.rows()[0];
        let value = |name: &str| row.get(sink.column(name).unwrap()).unwrap().clone();
        assert_eq!(value("event").as_count(), Some(0));
        assert_eq!(value("asym").as_f64(), Some(0.12));
        assert_eq!(value("gamma_e").as_f64(), Some(21.5));
        assert_eq!(value("random_seed").as_count(), Some(77));
        assert_eq!(value("optical_photons_absorbed").as_count(), Some(1));
        assert_eq!(value("optical_photons_stopped").as_count(), Some(1));
        assert_eq!(value("optical_photons_produced").as_count(), Some(1));
        assert_eq!(value("Crystal.eDep").as_f64(), Some(8.0));
        assert_eq!(acc.events(), 1);
    }

    #[test]
    fn test_start_of_event_resets() {
        let mut acc = accumulator(0);
        acc.start_of_event();
        acc.set_theta(45.0);
        acc.optical_hit();
        acc.set_global_times("Crystal", &[1.0]).unwrap();
        acc.end_of_event().unwrap();

        acc.start_of_event();
        assert_eq!(acc.record().kinematics(), &EventKinematics::default());
        assert_eq!(acc.record().photons(), PhotonCounters::default());
        assert!(acc.record().detector("Crystal").unwrap().times.is_empty());
    }

    #[test]
    fn test_auto_save_interval() {
        let mut acc = accumulator(3);
        for _ in 0..7 {
            acc.start_of_event();
            acc.end_of_event().unwrap();
        }
        assert_eq!(acc.sink().flushes(), 2);

        let sink = acc.finished().unwrap();
        assert_eq!(sink.flushes(), 3);
        assert!(sink.is_closed());
        assert_eq!(sink.rows().len(), 7);
    }

    #[test]
    fn test_auto_save_disabled() {
        let mut acc = accumulator(0);
        for _ in 0..10 {
            acc.start_of_event();
            acc.end_of_event().unwrap();
        }
        assert_eq!(acc.sink().flushes(), 0);
    }

    #[test]
    fn test_write_random_seed() {
        let mut acc = accumulator(0);
        acc.store_random_seed(987_654_321);
        acc.write_random_seed().unwrap();
        assert_eq!(acc.sink().metadata("random_seed"), Some("987654321"));
        assert_eq!(acc.sink().metadata("run_label"), Some("0042"));
    }
}
