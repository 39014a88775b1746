//! JSON setup for a run: run identity, materials, detectors and volumes.
//!
//! ```json
//! {
//!   "run": { "run_number": 42, "min_digits": 5, "auto_save": 1000, "seed": 7 },
//!   "efficiency_property": "EFFICIENCY",
//!   "materials": {
//!     "Bialkali": { "EFFICIENCY": [[1.9, 0.05], [2.9, 0.27], [3.9, 0.18]] }
//!   },
//!   "detectors": [
//!     { "name": "PMT", "kind": "photocathode",
//!       "volumes": [{ "id": 11, "name": "PMT1", "material": "Bialkali" }] }
//!   ]
//! }
//! ```
//!
//! Every section is optional and falls back to defaults.

use crate::accumulator::{EventAccumulator, RunConfig};
use crate::calorimeter::Calorimeter;
use crate::cathode::PhotoCathode;
use crate::detector::{DetectorOptions, SensitiveDetector};
use crate::efficiency::{EfficiencyCurve, MaterialPropertiesTable, DEFAULT_EFFICIENCY_KEY};
use crate::error::{Error, Result};
use crate::pipeline::HitPipeline;
use crate::random::RandomStream;
use crate::sink::RowSink;
use crate::step::VolumeId;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Concrete detector type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    #[default]
    Photocathode,
    Calorimeter,
}

/// One sensitive volume of a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSetup {
    pub id: VolumeId,
    pub name: String,
    pub material: Option<String>,
}

/// One sensitive detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSetup {
    pub name: String,
    pub kind: DetectorKind,
    pub options: DetectorOptions,
    pub volumes: Vec<VolumeSetup>,
}

/// Complete run setup.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupConfig {
    pub run: RunConfig,
    pub seed: u64,
    /// Material property holding the efficiency curve.
    pub efficiency_property: String,
    pub materials: BTreeMap<String, MaterialPropertiesTable>,
    pub detectors: Vec<DetectorSetup>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            seed: 0,
            efficiency_property: DEFAULT_EFFICIENCY_KEY.to_string(),
            materials: BTreeMap::new(),
            detectors: Vec::new(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonSetup {
    run: JsonRun,
    efficiency_property: Option<String>,
    materials: BTreeMap<String, BTreeMap<String, JsonCurve>>,
    detectors: Vec<JsonDetector>,
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonRun {
    run_number: u32,
    min_digits: usize,
    auto_save: u64,
    seed: u64,
    output_path: PathBuf,
    file_prefix: String,
}

impl Default for JsonRun {
    fn default() -> Self {
        let run = RunConfig::default();
        Self {
            run_number: run.run_number,
            min_digits: run.run_min_digits,
            auto_save: run.auto_save,
            seed: 0,
            output_path: run.output_path,
            file_prefix: run.file_prefix,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonCurve {
    Constant(f64),
    Table(Vec<[f64; 2]>),
}

#[derive(Deserialize)]
struct JsonDetector {
    name: String,
    #[serde(default)]
    kind: DetectorKind,
    #[serde(default)]
    options: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    volumes: Vec<JsonVolume>,
}

#[derive(Deserialize)]
struct JsonVolume {
    id: u32,
    name: String,
    #[serde(default)]
    material: Option<String>,
}

impl SetupConfig {
    /// Loads a setup from a JSON file.
    ///
    /// # Errors
    /// Returns I/O, JSON or validation errors.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json: JsonSetup = serde_json::from_reader(reader)?;
        Self::from_json_setup(json)
    }

    /// Loads a setup from a JSON string.
    ///
    /// # Errors
    /// Returns JSON or validation errors.
    pub fn from_json(json: &str) -> Result<Self> {
        let json: JsonSetup = serde_json::from_str(json)?;
        Self::from_json_setup(json)
    }

    fn from_json_setup(json: JsonSetup) -> Result<Self> {
        let mut materials = BTreeMap::new();
        for (material, properties) in json.materials {
            let mut table = MaterialPropertiesTable::new();
            for (key, curve) in properties {
                let curve = match curve {
                    JsonCurve::Constant(probability) => EfficiencyCurve::constant(probability),
                    JsonCurve::Table(points) => {
                        EfficiencyCurve::tabulated(points.into_iter().map(|[e, p]| (e, p)))
                    }
                }
                .map_err(|e| {
                    Error::ConfigError(format!("material `{material}`, property `{key}`: {e}"))
                })?;
                table.add_property(key, curve);
            }
            materials.insert(material, table);
        }

        let mut detectors = Vec::with_capacity(json.detectors.len());
        for detector in json.detectors {
            let options = detector
                .options
                .into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, value)
                })
                .collect();

            let mut volumes = Vec::with_capacity(detector.volumes.len());
            for volume in detector.volumes {
                if let Some(material) = &volume.material {
                    if !materials.contains_key(material) {
                        return Err(Error::ConfigError(format!(
                            "volume `{}` of detector `{}` uses unknown material `{material}`",
                            volume.name, detector.name
                        )));
                    }
                }
                volumes.push(VolumeSetup {
                    id: VolumeId(volume.id),
                    name: volume.name,
                    material: volume.material,
                });
            }

            detectors.push(DetectorSetup {
                name: detector.name,
                kind: detector.kind,
                options,
                volumes,
            });
        }

        Ok(Self {
            run: RunConfig {
                run_number: json.run.run_number,
                run_min_digits: json.run.min_digits,
                auto_save: json.run.auto_save,
                output_path: json.run.output_path,
                file_prefix: json.run.file_prefix,
            },
            seed: json.run.seed,
            efficiency_property: json
                .efficiency_property
                .unwrap_or_else(|| DEFAULT_EFFICIENCY_KEY.to_string()),
            materials,
            detectors,
        })
    }

    /// Efficiency curve of a volume's material, if any.
    #[must_use]
    pub fn efficiency_for(&self, volume: &VolumeSetup) -> Option<EfficiencyCurve> {
        volume
            .material
            .as_ref()
            .and_then(|material| self.materials.get(material))
            .and_then(|table| table.property(&self.efficiency_property))
            .cloned()
    }

    /// Builds and configures every detector, in setup order.
    ///
    /// # Errors
    /// Returns option or registration errors.
    pub fn build_detectors(&self) -> Result<Vec<Box<dyn SensitiveDetector>>> {
        let mut detectors: Vec<Box<dyn SensitiveDetector>> =
            Vec::with_capacity(self.detectors.len());
        for setup in &self.detectors {
            let mut detector: Box<dyn SensitiveDetector> = match setup.kind {
                DetectorKind::Photocathode => Box::new(PhotoCathode::new(&setup.name)),
                DetectorKind::Calorimeter => Box::new(Calorimeter::new(&setup.name)),
            };
            detector.configure(&setup.options)?;
            for volume in &setup.volumes {
                detector.register_volume(volume.id, &volume.name, self.efficiency_for(volume))?;
            }
            detectors.push(detector);
        }
        Ok(detectors)
    }

    /// Builds a configured pipeline writing to `sink`.
    ///
    /// # Errors
    /// Returns detector, schema or sink errors.
    pub fn build_pipeline<S: RowSink>(&self, sink: S) -> Result<HitPipeline<S>> {
        let accumulator = EventAccumulator::new(self.run.clone(), sink);
        let mut pipeline = HitPipeline::new(accumulator, RandomStream::seeded(self.seed));
        for detector in self.build_detectors()? {
            pipeline.add_detector(detector)?;
        }
        pipeline.configure()?;
        Ok(pipeline)
    }
}
