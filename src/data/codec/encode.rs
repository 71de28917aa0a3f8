use std::collections::BTreeMap;

use log::{debug, warn};

use super::error::{EncodingError, EncodingFault, RecordLocation};
use super::{infer_kind, Row, ATTR_SEP, LIST_SEP, MAPPING_KV_SEP, MAPPING_SEP, PEAK_SEP};
use crate::data::model::{AttrValue, Attributes, Molecule, MoleculeMap, Peak};
use crate::data::registry;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Encode every molecule, failing on the first one that cannot be written.
pub fn encode(molecules: &MoleculeMap) -> Result<Vec<Row>, EncodingError> {
    let mut rows = Vec::with_capacity(molecules.len());
    for (key, molecule) in molecules {
        rows.extend(encode_molecule(key, molecule)?);
    }
    Ok(rows)
}

/// Encode every molecule that can be written; the others are left out of the
/// rows and returned as errors.
pub fn encode_skipping(molecules: &MoleculeMap) -> (Vec<Row>, Vec<EncodingError>) {
    let mut rows = Vec::with_capacity(molecules.len());
    let mut errors = Vec::new();
    for (key, molecule) in molecules {
        match encode_molecule(key, molecule) {
            Ok(molecule_rows) => rows.extend(molecule_rows),
            Err(e) => {
                warn!("skipping molecule: {e}");
                errors.push(e);
            }
        }
    }
    (rows, errors)
}

/// The molecule row followed by one continuation row per spectrum.
pub fn encode_molecule(key: &str, molecule: &Molecule) -> Result<Vec<Row>, EncodingError> {
    let location = RecordLocation::new(None, key, None);
    if key.is_empty() {
        return Err(EncodingError {
            location,
            fault: EncodingFault::EmptyKey,
        });
    }

    let mut rows = Vec::with_capacity(1 + molecule.spectra.len());
    rows.push(encode_row(key.to_string(), &molecule.attributes, &location)?);

    for (i, spectrum) in molecule.spectra.iter().enumerate() {
        let location = RecordLocation::new(None, key, Some(i));
        rows.push(encode_row(String::new(), &spectrum.attributes, &location)?);
    }
    debug!("encoded '{key}' into {} rows", rows.len());
    Ok(rows)
}

fn encode_row(
    first: String,
    attributes: &Attributes,
    location: &RecordLocation,
) -> Result<Row, EncodingError> {
    let mut row = Vec::with_capacity(1 + attributes.len());
    row.push(first);
    for (name, value) in attributes {
        let cell = encode_cell(name, value).map_err(|fault| EncodingError {
            location: location.attribute(name),
            fault,
        })?;
        row.push(cell);
    }
    Ok(row)
}

/// Encode one `name=value` cell.
pub fn encode_cell(name: &str, value: &AttrValue) -> Result<String, EncodingFault> {
    if name.is_empty() {
        return Err(EncodingFault::EmptyName);
    }
    reject(name, "attribute name", "=")?;

    let registered = registry::kind_of(name);
    if let Some(expected) = registered {
        if expected != value.kind() {
            return Err(EncodingFault::KindMismatch {
                expected,
                found: value.kind(),
            });
        }
    }

    let body = match value {
        AttrValue::Text(s) => s.clone(),
        AttrValue::List(items) => encode_list(items)?,
        AttrValue::Map(entries) => encode_mapping(entries)?,
        AttrValue::Peaks(peaks) => encode_peaks(peaks)?,
    };

    // Discovered attributes are decoded by shape, so the shape has to survive.
    if registered.is_none() {
        let decoded = infer_kind(&body);
        if decoded != value.kind() {
            return Err(EncodingFault::AmbiguousShape {
                found: value.kind(),
                decoded,
            });
        }
    }

    Ok(format!("{name}{ATTR_SEP}{body}"))
}

// ---------------------------------------------------------------------------
// Per-kind cell bodies
// ---------------------------------------------------------------------------

fn encode_list(items: &[String]) -> Result<String, EncodingFault> {
    if let [only] = items {
        if only.is_empty() {
            return Err(EncodingFault::SingleEmptyItem);
        }
    }
    for item in items {
        reject(item, "list item", ",")?;
    }
    Ok(items.join(LIST_SEP))
}

fn encode_mapping(entries: &BTreeMap<String, Option<String>>) -> Result<String, EncodingFault> {
    let mut parts = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        reject(key, "mapping key", ":")?;
        reject(key, "mapping key", ";")?;
        match value {
            Some(v) if v.is_empty() => {
                return Err(EncodingFault::EmptyMappingValue(key.clone()));
            }
            Some(v) => {
                reject(v, "mapping value", MAPPING_SEP)?;
                if v.starts_with(';') || v.ends_with(';') {
                    return Err(EncodingFault::Sentinel {
                        part: "mapping value",
                        value: v.clone(),
                        sentinel: ";",
                    });
                }
                parts.push(format!("{key}{MAPPING_KV_SEP}{v}"));
            }
            None => parts.push(format!("{key}{MAPPING_KV_SEP}")),
        }
    }
    Ok(parts.join(MAPPING_SEP))
}

/// Required fields go first: every peak then opens with `mass_charge`, which
/// is what the decoder splits peaks on.
fn encode_peaks(peaks: &[Peak]) -> Result<String, EncodingFault> {
    let mut out = String::new();
    for (index, peak) in peaks.iter().enumerate() {
        for (field, value) in [("mass_charge", peak.mass_charge), ("intensity", peak.intensity)] {
            if !value.is_finite() {
                return Err(EncodingFault::NonFiniteNumber { index, field });
            }
            out.push_str(&format!("{PEAK_SEP}{field}{ATTR_SEP}{value}"));
        }
        for (field, value) in [("id", &peak.id), ("ms_ms_id", &peak.ms_ms_id)] {
            if let Some(v) = value {
                reject(v, "peak field", "!")?;
                out.push_str(&format!("{PEAK_SEP}{field}{ATTR_SEP}{v}"));
            }
        }
    }
    Ok(out)
}

fn reject(value: &str, part: &'static str, sentinel: &'static str) -> Result<(), EncodingFault> {
    if value.contains(sentinel) {
        Err(EncodingFault::Sentinel {
            part,
            value: value.to_string(),
            sentinel,
        })
    } else {
        Ok(())
    }
}
