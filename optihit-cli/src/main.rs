//! optihit: replay recorded transport steps through sensitive detectors.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::redundant_closure_for_method_calls,
    clippy::too_many_lines
)]

mod replay;

use clap::{Parser, Subcommand, ValueEnum};
use optihit_core::{RandomSource, RandomStream, SetupConfig};
use optihit_io::JsonLinesSink;
use replay::{replay, ReplayTotals};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    OptihitIo(#[from] optihit_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] optihit_core::Error),

    #[error("line {line}: invalid event record: {source}")]
    Input {
        line: usize,
        source: serde_json::Error,
    },

    #[error("no sensitive volume named `{0}` in the setup")]
    UnknownVolume(String),

    #[error("{0} output requires building with the `hdf5` feature")]
    Unsupported(&'static str),
}

/// Output format for replayed rows.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// One JSON object per event
    Jsonl,
    /// Chunked HDF5 datasets
    Hdf5,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Self::Jsonl => "jsonl",
            Self::Hdf5 => "h5",
        }
    }
}

/// Optical photon detection replay.
#[derive(Parser)]
#[command(name = "optihit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded events through the configured detectors
    Replay {
        /// Detector setup (JSON)
        setup: PathBuf,

        /// Recorded events (JSON lines)
        events: PathBuf,

        /// Output file path (default: <output_path>/<prefix><run>.<ext> from the setup)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "jsonl")]
        format: Format,

        /// Override the random seed from the setup
        #[arg(long)]
        seed: Option<u64>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Estimate the acceptance of one volume at a fixed energy
    Acceptance {
        /// Detector setup (JSON)
        setup: PathBuf,

        /// Sensitive volume name
        #[arg(long)]
        volume: String,

        /// Photon kinetic energy
        #[arg(long)]
        energy: f64,

        /// Number of acceptance tests
        #[arg(short, long, default_value = "100000")]
        draws: u64,

        /// Override the random seed from the setup
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            setup,
            events,
            output,
            format,
            seed,
            verbose,
        } => {
            let mut config = SetupConfig::from_file(&setup)?;
            if let Some(seed) = seed {
                config.seed = seed;
            }
            let output = output.unwrap_or_else(|| config.run.output_file(format.extension()));

            if verbose {
                eprintln!("Setup: {}", setup.display());
                eprintln!("Run: {}", config.run.run_label());
                eprintln!("Seed: {}", config.seed);
                eprintln!("Detectors: {}", config.detectors.len());
                eprintln!("Writing output to: {}", output.display());
            }

            let start = Instant::now();
            let totals = match format {
                Format::Jsonl => {
                    let sink = JsonLinesSink::create(&output)?;
                    replay(&config, &events, sink)?.0
                }
                Format::Hdf5 => replay_hdf5(&config, &events, &output)?,
            };
            let elapsed = start.elapsed();

            println!(
                "Replayed {} events in {:.2}s",
                totals.events,
                elapsed.as_secs_f64()
            );
            println!("Steps: {} ({} handled)", totals.steps, totals.handled);
            println!("Optical photons produced: {}", totals.photons.produced);
            println!("Optical photons absorbed: {}", totals.photons.absorbed);
            println!("Optical photons stopped: {}", totals.photons.stopped);
            println!("Output: {}", output.display());
        }

        Commands::Acceptance {
            setup,
            volume,
            energy,
            draws,
            seed,
        } => {
            let config = SetupConfig::from_file(&setup)?;
            let target = config
                .detectors
                .iter()
                .flat_map(|detector| detector.volumes.iter())
                .find(|candidate| candidate.name == volume)
                .ok_or_else(|| CliError::UnknownVolume(volume.clone()))?;

            let curve = config.efficiency_for(target);
            let expected = curve.as_ref().map_or(0.0, |curve| curve.value(energy));
            let mut random = RandomStream::seeded(seed.unwrap_or(config.seed));
            let accepted = (0..draws)
                .filter(|_| random.uniform() < expected)
                .count();

            println!("Volume: {} ({})", target.name, target.id);
            match curve.as_ref().and_then(|curve| curve.domain()) {
                Some((low, high)) => println!("Curve domain: {} - {}", low, high),
                None if curve.is_some() => println!("Curve domain: constant"),
                None => println!("Curve domain: none (never detects)"),
            }
            println!("Efficiency at {}: {:.6}", energy, expected);
            if draws > 0 {
                println!(
                    "Accepted {} of {} draws: {:.6}",
                    accepted,
                    draws,
                    accepted as f64 / draws as f64
                );
            }
        }
    }

    Ok(())
}

#[cfg(feature = "hdf5")]
fn replay_hdf5(config: &SetupConfig, events: &Path, output: &Path) -> Result<ReplayTotals> {
    let sink = optihit_io::Hdf5RowSink::create(output, optihit_io::Hdf5WriteOptions::default())?;
    Ok(replay(config, events, sink)?.0)
}

#[cfg(not(feature = "hdf5"))]
fn replay_hdf5(_config: &SetupConfig, _events: &Path, _output: &Path) -> Result<ReplayTotals> {
    Err(CliError::Unsupported("HDF5"))
}
