//! Replay of recorded events through a configured pipeline.
//!
//! Input is JSON lines, one event per line:
//!
//! ```json
//! {"kinematics": {"asym": 0.1, "gamma_e": 12.0}, "steps": [{"track_id": 3, "particle": "optical_photon", "status": "stop_and_kill", "kinetic_energy": 2.5, "volume": 11}]}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use crate::{CliError, Result};
use optihit_core::{EventKinematics, PhotonCounters, RowSink, SetupConfig, Step};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Deserialize)]
struct EventInput {
    #[serde(default)]
    kinematics: EventKinematics,
    #[serde(default)]
    steps: Vec<Step>,
}

/// Totals over a replayed run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayTotals {
    pub events: u64,
    pub steps: usize,
    pub handled: usize,
    pub photons: PhotonCounters,
}

impl ReplayTotals {
    fn add(&mut self, steps: usize, handled: usize, photons: PhotonCounters) {
        self.events += 1;
        self.steps += steps;
        self.handled += handled;
        self.photons.stopped += photons.stopped;
        self.photons.produced += photons.produced;
        self.photons.absorbed += photons.absorbed;
    }
}

/// Replays every event in `events` into `sink` and closes it.
///
/// # Errors
/// Returns setup, input parsing, pipeline or sink errors. Input line
/// numbers are reported one-based.
pub(crate) fn replay<S: RowSink>(
    setup: &SetupConfig,
    events: &Path,
    sink: S,
) -> Result<(ReplayTotals, S)> {
    let reader = BufReader::new(File::open(events)?);
    let mut pipeline = setup.build_pipeline(sink)?;
    let mut totals = ReplayTotals::default();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let input: EventInput =
            serde_json::from_str(trimmed).map_err(|source| CliError::Input {
                line: number + 1,
                source,
            })?;

        let summary = pipeline.process_event(input.kinematics, &input.steps)?;
        log::debug!(
            "event {}: {} steps, {} handled, {} absorbed",
            summary.event,
            summary.steps,
            summary.handled,
            summary.photons.absorbed
        );
        totals.add(summary.steps, summary.handled, summary.photons);
    }

    let sink = pipeline.finish()?;
    Ok((totals, sink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use optihit_core::MemorySink;
    use optihit_io::JsonLinesSink;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SETUP: &str = r#"{
        "run": { "run_number": 3, "seed": 99 },
        "materials": { "Bialkali": { "EFFICIENCY": 1.0 } },
        "detectors": [
            { "name": "PMT", "volumes": [{ "id": 11, "name": "PMT1", "material": "Bialkali" }] }
        ]
    }"#;

    fn events_file(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn test_replay_counts() {
        let setup = SetupConfig::from_json(SETUP).unwrap();
        let events = events_file(&[
            "# two events",
            r#"{"kinematics": {"asym": 0.5}, "steps": [{"track_id": 1, "particle": "optical_photon", "status": "stop_and_kill", "kinetic_energy": 2.0, "volume": 11}]}"#,
            "",
            r#"{"steps": [{"track_id": 2, "particle": "gamma", "kinetic_energy": 1.0, "volume": 5}]}"#,
        ]);

        let (totals, sink) = replay(&setup, events.path(), MemorySink::new()).unwrap();
        assert_eq!(totals.events, 2);
        assert_eq!(totals.steps, 2);
        assert_eq!(totals.handled, 1);
        assert_eq!(totals.photons.absorbed, 1);
        assert_eq!(sink.rows().len(), 2);
        assert!(sink.is_closed());
    }

    #[test]
    fn test_replay_to_json_lines() {
        let setup = SetupConfig::from_json(SETUP).unwrap();
        let events = events_file(&[r#"{"steps": []}"#]);

        let (_, sink) = replay(&setup, events.path(), JsonLinesSink::new(Vec::new())).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        // run_number, run_label and random_seed metadata, then one row.
        assert_eq!(lines.len(), 4);
        assert!(lines[2].contains("\"random_seed\""));
        assert!(lines[3].starts_with("{\"event\":0,"));
    }

    #[test]
    fn test_bad_line_reported() {
        let setup = SetupConfig::from_json(SETUP).unwrap();
        let events = events_file(&[r#"{"steps": []}"#, "not json"]);

        let err = replay(&setup, events.path(), MemorySink::new()).unwrap_err();
        assert!(matches!(err, CliError::Input { line: 2, .. }));
    }
}
