use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::model::{Molecule, MoleculeMap, Spectrum};

// ---------------------------------------------------------------------------
// Selection criteria: which spectra are exported downstream
// ---------------------------------------------------------------------------

/// Predicates applied to every spectrum (and its owning molecule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionCriteria {
    /// Minimum number of peaks actually present in the spectrum.
    pub min_peaks: usize,
    /// Molecule must carry a numeric monoisotopic weight.
    pub require_parent_mass: bool,
    /// Spectrum must carry a non-empty ionization mode.
    pub require_ionization: bool,
    /// At least one of these taxonomy levels must be non-empty.
    pub taxonomy_levels: Vec<String>,
}

impl Default for SelectionCriteria {
    fn default() -> Self {
        Self {
            min_peaks: 4,
            require_parent_mass: true,
            require_ionization: true,
            taxonomy_levels: ["kingdom", "class", "sub_class"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Ionization mode used in identifiers when a spectrum has none.
pub const UNKNOWN_IONIZATION: &str = "unknown";

/// Stable identifier of a spectrum: `<key>_MS2-<index>_<mode>`, where
/// `index` is the spectrum's position in its molecule.
pub fn spectrum_id(key: &str, index: usize, ionization_mode: &str) -> String {
    format!("{key}_MS2-{index}_{ionization_mode}")
}

/// A spectrum that passed selection, flattened for export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedSpectrum {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "inchi")]
    pub key: String,
    #[serde(skip)]
    pub index: usize,
    #[serde(rename = "parentmass")]
    pub parent_mass: Option<f64>,
    /// Requested taxonomy levels; `None` where the level is missing or empty.
    #[serde(flatten)]
    pub taxonomy: BTreeMap<String, Option<String>>,
    #[serde(rename = "ionization")]
    pub ionization_mode: String,
    pub peaks: Vec<(f64, f64)>,
}

// ---------------------------------------------------------------------------
// Iteration
// ---------------------------------------------------------------------------

/// Every spectrum with its owner and position, molecules in key order.
pub fn iter_spectra(
    molecules: &MoleculeMap,
) -> impl Iterator<Item = (&str, &Molecule, usize, &Spectrum)> {
    molecules.iter().flat_map(|(key, molecule)| {
        molecule
            .spectra
            .iter()
            .enumerate()
            .map(move |(i, spectrum)| (key.as_str(), molecule, i, spectrum))
    })
}

/// Apply `criteria` to every spectrum. Spectrum indices always refer to the
/// unfiltered spectrum list, so identifiers stay stable across criteria.
pub fn select(molecules: &MoleculeMap, criteria: &SelectionCriteria) -> Vec<SelectedSpectrum> {
    let mut selected = Vec::new();
    for (key, molecule) in molecules {
        let parent_mass = molecule.parent_mass();
        if criteria.require_parent_mass && parent_mass.is_none() {
            continue;
        }
        let Some(taxonomy) = taxonomy_levels(molecule, &criteria.taxonomy_levels) else {
            continue;
        };

        for (index, spectrum) in molecule.spectra.iter().enumerate() {
            let Some(peaks) = spectrum.peaks() else {
                continue;
            };
            if peaks.len() < criteria.min_peaks {
                continue;
            }
            let mode = match spectrum.ionization_mode() {
                Some(mode) => mode,
                None if criteria.require_ionization => continue,
                None => UNKNOWN_IONIZATION,
            };
            selected.push(SelectedSpectrum {
                id: spectrum_id(key, index, mode),
                key: key.clone(),
                index,
                parent_mass,
                taxonomy: taxonomy.clone(),
                ionization_mode: mode.to_string(),
                peaks: spectrum.peak_pairs(),
            });
        }
    }
    log::debug!("selected {} spectra", selected.len());
    selected
}

/// The requested levels of the molecule's taxonomy, or `None` when the
/// molecule has no taxonomy or every requested level is empty.
fn taxonomy_levels(
    molecule: &Molecule,
    levels: &[String],
) -> Option<BTreeMap<String, Option<String>>> {
    let taxonomy = molecule.taxonomy()?;
    let picked: BTreeMap<String, Option<String>> = levels
        .iter()
        .map(|level| {
            let value = taxonomy
                .get(level)
                .cloned()
                .flatten()
                .filter(|v| !v.is_empty());
            (level.clone(), value)
        })
        .collect();
    if !levels.is_empty() && picked.values().all(Option::is_none) {
        return None;
    }
    Some(picked)
}
