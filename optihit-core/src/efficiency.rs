//! Energy-dependent detection efficiency.
//!
//! An [`EfficiencyCurve`] maps the kinetic energy of a photon to the
//! probability that its absorption in a cathode produces a detectable hit.
//! Curves are attached to volumes through a [`MaterialPropertiesTable`],
//! looked up under a named property key ([`DEFAULT_EFFICIENCY_KEY`]).

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Property key used for efficiency curves unless configured otherwise.
pub const DEFAULT_EFFICIENCY_KEY: &str = "EFFICIENCY";

/// Detection probability as a function of kinetic energy.
///
/// Only [`EfficiencyCurve::constant`] and [`EfficiencyCurve::tabulated`]
/// build a curve, so every curve holds validated points.
#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyCurve(Repr);

#[derive(Debug, Clone, PartialEq)]
enum Repr {
    Constant(f64),
    // Non-empty, strictly increasing energies with one probability each.
    Tabulated {
        energies: Vec<f64>,
        probabilities: Vec<f64>,
    },
}

impl EfficiencyCurve {
    /// Creates a curve with the same probability at every energy.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCurve`] if `probability` is not within `[0, 1]`.
    pub fn constant(probability: f64) -> Result<Self> {
        validate_probability(probability)?;
        Ok(Self(Repr::Constant(probability)))
    }

    /// Creates a tabulated curve from `(energy, probability)` points.
    ///
    /// Energies outside the first and last point have probability 0.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCurve`] if there are no points, energies are not
    /// finite and strictly increasing, or a probability lies outside `[0, 1]`.
    pub fn tabulated<I>(points: I) -> Result<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let (energies, probabilities): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();

        if energies.is_empty() {
            return Err(Error::InvalidCurve("curve has no points".to_string()));
        }
        if let Some(energy) = energies.iter().find(|e| !e.is_finite()) {
            return Err(Error::InvalidCurve(format!("non-finite energy {energy}")));
        }
        for window in energies.windows(2) {
            if window[1] <= window[0] {
                return Err(Error::InvalidCurve(format!(
                    "energies must be strictly increasing ({} then {})",
                    window[0], window[1]
                )));
            }
        }
        for &probability in &probabilities {
            validate_probability(probability)?;
        }

        Ok(Self(Repr::Tabulated {
            energies,
            probabilities,
        }))
    }

    /// Returns the detection probability at `energy`.
    ///
    /// Energies outside the tabulated domain, and non-finite energies,
    /// yield 0.
    #[must_use]
    pub fn value(&self, energy: f64) -> f64 {
        if !energy.is_finite() {
            return 0.0;
        }
        match &self.0 {
            Repr::Constant(probability) => *probability,
            Repr::Tabulated {
                energies,
                probabilities,
            } => interpolate(energies, probabilities, energy),
        }
    }

    /// Returns the energy domain, or `None` for a constant curve.
    #[must_use]
    pub fn domain(&self) -> Option<(f64, f64)> {
        match &self.0 {
            Repr::Constant(_) => None,
            Repr::Tabulated { energies, .. } => Some((*energies.first()?, *energies.last()?)),
        }
    }
}

fn interpolate(energies: &[f64], probabilities: &[f64], energy: f64) -> f64 {
    let (Some(&low), Some(&high)) = (energies.first(), energies.last()) else {
        return 0.0;
    };
    if energy < low || energy > high {
        return 0.0;
    }
    // First index whose energy is >= the query.
    let upper = energies.partition_point(|&e| e < energy);
    if upper == 0 {
        return probabilities.first().copied().unwrap_or(0.0);
    }
    let lower = upper - 1;
    match (probabilities.get(lower), probabilities.get(upper)) {
        (Some(&p_low), Some(&p_high)) => {
            let t = (energy - energies[lower]) / (energies[upper] - energies[lower]);
            p_low + t * (p_high - p_low)
        }
        _ => 0.0,
    }
}

fn validate_probability(probability: f64) -> Result<()> {
    if probability.is_finite() && (0.0..=1.0).contains(&probability) {
        Ok(())
    } else {
        Err(Error::InvalidCurve(format!(
            "probability {probability} outside [0, 1]"
        )))
    }
}

/// Named material properties, each an energy-dependent curve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialPropertiesTable {
    properties: BTreeMap<String, EfficiencyCurve>,
}

impl MaterialPropertiesTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a property curve.
    pub fn add_property(&mut self, key: impl Into<String>, curve: EfficiencyCurve) {
        self.properties.insert(key.into(), curve);
    }

    /// Sets a property curve, builder style.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, curve: EfficiencyCurve) -> Self {
        self.add_property(key, curve);
        self
    }

    /// Looks up a property curve by key.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&EfficiencyCurve> {
        self.properties.get(key)
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns true if the table holds no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
