//! optihit-core: Sensitive detectors and event accumulation for optical
//! photon simulations.
//!
//! This crate provides the efficiency model, the photo-cathode and
//! calorimeter detectors, the per-event accumulator with its output schema,
//! and the pipeline that routes transport steps to detectors.
//!

pub mod accumulator;
pub mod calorimeter;
pub mod cathode;
pub mod config;
pub mod detector;
pub mod efficiency;
pub mod error;
pub mod hit;
pub mod pipeline;
pub mod random;
pub mod registry;
pub mod schema;
pub mod sink;
pub mod step;

pub use accumulator::{
    DetectorSummary, EventAccumulator, EventKinematics, EventRecord, PhotonCounters, RunConfig,
};
pub use calorimeter::Calorimeter;
pub use cathode::PhotoCathode;
pub use config::{DetectorKind, DetectorSetup, SetupConfig, VolumeSetup};
pub use detector::{DetectorOptions, HitContext, SensitiveDetector};
pub use efficiency::{EfficiencyCurve, MaterialPropertiesTable, DEFAULT_EFFICIENCY_KEY};
pub use error::{Error, Result};
pub use hit::{OpticalHit, OpticalHitData};
pub use pipeline::{EventSummary, HitPipeline};
pub use random::{RandomSource, RandomStream};
pub use registry::{SensitiveVolume, VolumeIndex, VolumeRegistry};
pub use schema::{ColumnHandle, ColumnKind, ColumnSpec, ColumnValue, Row, RowView, Schema};
pub use sink::{bind_schema, MemorySink, RowSink};
pub use step::{ParticleKind, Step, TrackStatus, VolumeId};
