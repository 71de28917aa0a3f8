use std::collections::BTreeMap;

use log::{debug, warn};

use super::error::{DecodeError, DecodeIssue, PeakDecodeError, PeakFault, RecordLocation};
use super::{infer_kind, ATTR_SEP, LIST_SEP, MAPPING_KV_SEP, MAPPING_SEP, PEAK_SEP};
use crate::data::model::{AttrValue, Attributes, Molecule, MoleculeMap, Peak, Spectrum};
use crate::data::registry::{self, AttrKind, PEAK_FIELDS};

// ---------------------------------------------------------------------------
// Decode result
// ---------------------------------------------------------------------------

/// Everything recovered from a table, plus what had to be left behind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub molecules: MoleculeMap,
    pub issues: Vec<DecodeIssue>,
}

impl Decoded {
    /// Number of peaks dropped across all spectra.
    pub fn dropped_peaks(&self) -> usize {
        self.peak_errors().count()
    }

    pub fn peak_errors(&self) -> impl Iterator<Item = &PeakDecodeError> {
        self.issues.iter().filter_map(|issue| match issue {
            DecodeIssue::Peak(e) => Some(e),
            _ => None,
        })
    }

    pub fn spectrum_count(&self) -> usize {
        self.molecules.values().map(|m| m.spectra.len()).sum()
    }
}

/// Decode a whole table.
pub fn decode<I, R, S>(rows: I) -> Result<Decoded, DecodeError>
where
    I: IntoIterator<Item = R>,
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    let mut decoder = Decoder::new();
    for row in rows {
        decoder.push_row(row.as_ref())?;
    }
    Ok(decoder.finish())
}

// ---------------------------------------------------------------------------
// Row-by-row decoder
// ---------------------------------------------------------------------------

/// Incremental decoder. The molecule being assembled is held here until the
/// next molecule row (or [`Decoder::finish`]) commits it.
#[derive(Debug, Default)]
pub struct Decoder {
    molecules: MoleculeMap,
    issues: Vec<DecodeIssue>,
    current: Option<Pending>,
    row: usize,
}

#[derive(Debug)]
struct Pending {
    key: String,
    row: usize,
    molecule: Molecule,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next table row.
    pub fn push_row<S: AsRef<str>>(&mut self, cells: &[S]) -> Result<(), DecodeError> {
        self.row += 1;
        let row = self.row;
        let first = cells.first().map(|c| c.as_ref()).unwrap_or("");

        if !first.is_empty() {
            self.commit();
            let location = RecordLocation::new(Some(row), first, None);
            let attributes = self.decode_attributes(&cells[1..], &location);
            self.current = Some(Pending {
                key: first.to_string(),
                row,
                molecule: Molecule {
                    attributes,
                    spectra: Vec::new(),
                },
            });
            return Ok(());
        }

        let Some(mut pending) = self.current.take() else {
            return Err(DecodeError::OrphanSpectrum { row });
        };
        let index = pending.molecule.spectra.len();
        let location = RecordLocation::new(Some(row), &pending.key, Some(index));
        let rest = if cells.is_empty() { cells } else { &cells[1..] };
        let attributes = self.decode_attributes(rest, &location);
        pending.molecule.spectra.push(Spectrum { attributes });
        self.current = Some(pending);
        Ok(())
    }

    /// Commit the last molecule and return the result.
    pub fn finish(mut self) -> Decoded {
        self.commit();
        debug!(
            "decoded {} rows into {} molecules ({} issues)",
            self.row,
            self.molecules.len(),
            self.issues.len()
        );
        Decoded {
            molecules: self.molecules,
            issues: self.issues,
        }
    }

    fn commit(&mut self) {
        let Some(Pending { key, row, molecule }) = self.current.take() else {
            return;
        };
        if self.molecules.insert(key.clone(), molecule).is_some() {
            warn!("row {row}: duplicate molecule '{key}', keeping the later record");
            self.issues.push(DecodeIssue::DuplicateKey { key, row });
        }
    }

    fn decode_attributes<S: AsRef<str>>(
        &mut self,
        cells: &[S],
        location: &RecordLocation,
    ) -> Attributes {
        let mut attributes = Attributes::new();
        for cell in cells {
            let cell = cell.as_ref();
            if cell.is_empty() {
                continue;
            }
            let Some((name, body)) = cell.split_once(ATTR_SEP) else {
                warn!("{location}: skipping cell without '=': {cell:?}");
                self.issues.push(DecodeIssue::MalformedCell {
                    location: location.clone(),
                    cell: cell.to_string(),
                });
                continue;
            };
            let value = self.decode_value(name, body, &location.attribute(name));
            if attributes.insert(name.to_string(), value).is_some() {
                debug!("{location}: attribute '{name}' repeated, keeping the last one");
            }
        }
        attributes
    }

    fn decode_value(&mut self, name: &str, body: &str, location: &RecordLocation) -> AttrValue {
        let kind = registry::kind_of(name).unwrap_or_else(|| infer_kind(body));
        match kind {
            AttrKind::Scalar => AttrValue::Text(body.to_string()),
            AttrKind::List => AttrValue::List(decode_list(body)),
            AttrKind::Mapping => AttrValue::Map(decode_mapping(body)),
            AttrKind::Peaks => {
                let (peaks, errors) = decode_peaks(body, location);
                for e in errors {
                    warn!("dropping peak: {e}");
                    self.issues.push(e.into());
                }
                AttrValue::Peaks(peaks)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Cell bodies
// ---------------------------------------------------------------------------

fn decode_list(body: &str) -> Vec<String> {
    if body.is_empty() {
        return Vec::new();
    }
    body.split(LIST_SEP).map(String::from).collect()
}

/// `k1:v1;;k2:` → `{k1: Some(v1), k2: None}`. Only the first `:` of an entry
/// separates key from value. Older exports end the cell with a stray `;` (or
/// a full `;;`), which is dropped; encoded values never end with `;`.
fn decode_mapping(body: &str) -> BTreeMap<String, Option<String>> {
    let body = body
        .strip_suffix(MAPPING_SEP)
        .or_else(|| body.strip_suffix(';'))
        .unwrap_or(body);
    if body.is_empty() {
        return BTreeMap::new();
    }
    body.split(MAPPING_SEP)
        .map(|entry| match entry.split_once(MAPPING_KV_SEP) {
            Some((k, v)) if !v.is_empty() => (k.to_string(), Some(v.to_string())),
            Some((k, _)) => (k.to_string(), None),
            None => (entry.to_string(), None),
        })
        .collect()
}

#[derive(Default)]
struct PeakFields {
    id: Option<String>,
    ms_ms_id: Option<String>,
    mass_charge: Option<String>,
    intensity: Option<String>,
    fault: Option<PeakFault>,
}

impl PeakFields {
    fn slot(&mut self, field: &str) -> Option<&mut Option<String>> {
        match field {
            "id" => Some(&mut self.id),
            "ms_ms_id" => Some(&mut self.ms_ms_id),
            "mass_charge" => Some(&mut self.mass_charge),
            "intensity" => Some(&mut self.intensity),
            _ => None,
        }
    }

    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.ms_ms_id.is_none()
            && self.mass_charge.is_none()
            && self.intensity.is_none()
            && self.fault.is_none()
    }

    fn build(self) -> Result<Peak, PeakFault> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }
        let mass_charge = parse_number("mass_charge", self.mass_charge)?;
        let intensity = parse_number("intensity", self.intensity)?;
        Ok(Peak {
            id: self.id,
            ms_ms_id: self.ms_ms_id,
            mass_charge,
            intensity,
        })
    }
}

fn parse_number(field: &'static str, raw: Option<String>) -> Result<f64, PeakFault> {
    let raw = raw.ok_or(PeakFault::MissingField(field))?;
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PeakFault::InvalidNumber { field, value: raw }),
    }
}

/// Split a peak cell into peaks. Peaks carry no count or terminator: the
/// first field name of the cell opens every peak. Any other field seen twice
/// in a peak belongs to a fragment without that opening field, which is
/// dropped on its own.
fn decode_peaks(body: &str, location: &RecordLocation) -> (Vec<Peak>, Vec<PeakDecodeError>) {
    let mut groups: Vec<PeakFields> = Vec::new();
    let mut current = PeakFields::default();
    let mut opening: Option<&'static str> = None;

    for segment in body.split(PEAK_SEP).filter(|s| !s.is_empty()) {
        let Some((field, value)) = segment.split_once(ATTR_SEP) else {
            current.fault.get_or_insert(PeakFault::MalformedSegment(segment.to_string()));
            continue;
        };
        let Some(&field) = PEAK_FIELDS.iter().find(|f| **f == field) else {
            current.fault.get_or_insert(PeakFault::UnknownField(field.to_string()));
            continue;
        };
        let anchor = *opening.get_or_insert(field);

        if field == anchor {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
        } else if current.slot(field).is_some_and(|s| s.is_some())
            && current.slot(anchor).is_some_and(|s| s.is_some())
        {
            groups.push(std::mem::take(&mut current));
            current.fault = Some(PeakFault::MissingField(anchor));
        }
        if let Some(slot) = current.slot(field) {
            *slot = Some(value.to_string());
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    let mut peaks = Vec::with_capacity(groups.len());
    let mut errors = Vec::new();
    for (peak, fields) in groups.into_iter().enumerate() {
        match fields.build() {
            Ok(p) => peaks.push(p),
            Err(fault) => errors.push(PeakDecodeError {
                location: location.clone(),
                peak,
                fault,
            }),
        }
    }
    (peaks, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn location() -> RecordLocation {
        RecordLocation::new(Some(1), "KEY", Some(0)).attribute("peaks")
    }

    #[test]
    fn bad_peak_is_dropped_and_reported() {
        let body = "!mass_charge=100.5!intensity=20!mass_charge=abc!intensity=3!mass_charge=300!intensity=1";
        let (peaks, errors) = decode_peaks(body, &location());
        assert_eq!(peaks, vec![Peak::new(100.5, 20.0), Peak::new(300.0, 1.0)]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].peak, 1);
        assert_eq!(
            errors[0].fault,
            PeakFault::InvalidNumber {
                field: "mass_charge",
                value: "abc".to_string()
            }
        );
    }

    #[test]
    fn peak_missing_a_number_is_dropped() {
        let (peaks, errors) =
            decode_peaks("!mass_charge=1!mass_charge=2!intensity=3", &location());
        assert_eq!(peaks, vec![Peak::new(2.0, 3.0)]);
        assert_eq!(errors[0].fault, PeakFault::MissingField("intensity"));
    }

    #[test]
    fn fragment_without_mass_charge_is_dropped_alone() {
        let body = "!mass_charge=1!intensity=10!intensity=20!mass_charge=3!intensity=30";
        let (peaks, errors) = decode_peaks(body, &location());
        assert_eq!(peaks, vec![Peak::new(1.0, 10.0), Peak::new(3.0, 30.0)]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].peak, 1);
        assert_eq!(errors[0].fault, PeakFault::MissingField("mass_charge"));
    }

    #[test]
    fn legacy_fragment_without_id_is_dropped_alone() {
        let body = "!id=1!intensity=20!mass_charge=100.5\
                    !intensity=7!mass_charge=8\
                    !id=2!intensity=5.5!mass_charge=200.25";
        let (peaks, errors) = decode_peaks(body, &location());
        assert_eq!(
            peaks,
            vec![
                Peak::new(100.5, 20.0).with_id("1"),
                Peak::new(200.25, 5.5).with_id("2"),
            ]
        );
        assert_eq!(errors[0].fault, PeakFault::MissingField("id"));
    }

    #[test]
    fn legacy_field_order_still_splits() {
        // Older exports wrote every field of every peak in alphabetical order.
        let body = "!id=1!intensity=20!mass_charge=100.5!ms_ms_id=9\
                    !id=2!intensity=5.5!mass_charge=200.25!ms_ms_id=9";
        let (peaks, errors) = decode_peaks(body, &location());
        assert!(errors.is_empty());
        assert_eq!(
            peaks,
            vec![
                Peak::new(100.5, 20.0).with_id("1").with_ms_ms_id("9"),
                Peak::new(200.25, 5.5).with_id("2").with_ms_ms_id("9"),
            ]
        );
    }

    #[test]
    fn unknown_and_malformed_segments_drop_only_their_peak() {
        let body = "!mass_charge=1!intensity=1!colour=red!mass_charge=2!intensity=2!junk";
        let (peaks, errors) = decode_peaks(body, &location());
        assert!(peaks.is_empty());
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].fault, PeakFault::UnknownField("colour".to_string()));
        assert_eq!(errors[1].fault, PeakFault::MalformedSegment("junk".to_string()));

        let (peaks, _) = decode_peaks("", &location());
        assert!(peaks.is_empty());
    }

    #[test]
    fn discovered_attributes_decode_by_shape() {
        let rows = vec![row(&["K", "a=x:1;;y:", "b=p,q", "c=just:text", "d="])];
        let decoded = decode(&rows).unwrap();
        let m = &decoded.molecules["K"];
        assert!(matches!(m.get("a"), Some(AttrValue::Map(map)) if map.len() == 2));
        assert_eq!(
            m.get("b"),
            Some(&AttrValue::List(vec!["p".to_string(), "q".to_string()]))
        );
        assert_eq!(m.get("c"), Some(&AttrValue::Text("just:text".to_string())));
        assert_eq!(m.get("d"), Some(&AttrValue::Text(String::new())));
    }

    #[test]
    fn registered_attributes_ignore_shape() {
        let rows = vec![row(&[
            "K",
            "iupac_name=(2S,3R)-2,3-diol",
            "secondary_accessions=HMDB01",
            "taxonomy=kingdom:Organic compounds",
        ])];
        let m = &decode(&rows).unwrap().molecules["K"];
        assert_eq!(m.get("iupac_name").and_then(AttrValue::as_text), Some("(2S,3R)-2,3-diol"));
        assert_eq!(
            m.get("secondary_accessions"),
            Some(&AttrValue::List(vec!["HMDB01".to_string()]))
        );
        assert_eq!(
            m.taxonomy().unwrap()["kingdom"].as_deref(),
            Some("Organic compounds")
        );
    }

    #[test]
    fn legacy_mapping_trailing_semicolon_is_dropped() {
        let rows = vec![row(&[
            "K",
            "taxonomy_dict=kingdom:Organic compounds;;class:Lipids;;sub_class:;",
            "references=pubmed_id:123;",
        ])];
        let decoded = decode(&rows).unwrap();
        let m = &decoded.molecules["K"];
        let taxonomy = m.taxonomy().unwrap();
        assert_eq!(taxonomy["kingdom"].as_deref(), Some("Organic compounds"));
        assert_eq!(taxonomy["class"].as_deref(), Some("Lipids"));
        assert_eq!(taxonomy["sub_class"], None);
        assert_eq!(
            m.get("references").and_then(AttrValue::as_map).unwrap()["pubmed_id"].as_deref(),
            Some("123")
        );
        assert!(decoded.issues.is_empty());
    }

    #[test]
    fn spectrum_before_molecule_is_fatal() {
        let rows = vec![row(&["", "ionization_mode=Positive"]), row(&["K"])];
        assert_eq!(decode(&rows), Err(DecodeError::OrphanSpectrum { row: 1 }));
    }

    #[test]
    fn duplicate_key_last_write_wins() {
        let rows = vec![
            row(&["K", "name=first"]),
            row(&["", "ionization_mode=Positive"]),
            row(&["K", "name=second"]),
        ];
        let decoded = decode(&rows).unwrap();
        let m = &decoded.molecules["K"];
        assert_eq!(m.get("name").and_then(AttrValue::as_text), Some("second"));
        assert!(m.spectra.is_empty());
        assert_eq!(
            decoded.issues,
            vec![DecodeIssue::DuplicateKey {
                key: "K".to_string(),
                row: 3
            }]
        );
    }

    #[test]
    fn malformed_and_empty_cells() {
        let rows = vec![row(&["K", "no separator", "", "name=ok"])];
        let decoded = decode(&rows).unwrap();
        assert_eq!(decoded.molecules["K"].attributes.len(), 1);
        assert!(matches!(
            &decoded.issues[..],
            [DecodeIssue::MalformedCell { cell, .. }] if cell == "no separator"
        ));
    }

    #[test]
    fn spectra_keep_row_order() {
        let rows = vec![
            row(&["K"]),
            row(&["", "spectra_id=3"]),
            row(&["", "spectra_id=1"]),
            row(&["", "spectra_id=2"]),
        ];
        let decoded = decode(&rows).unwrap();
        let ids: Vec<_> = decoded.molecules["K"]
            .spectra
            .iter()
            .filter_map(|s| s.get("spectra_id").and_then(AttrValue::as_text))
            .collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert_eq!(decoded.spectrum_count(), 3);
    }

    #[test]
    fn dropped_peaks_are_counted_per_table() {
        let rows = vec![
            row(&["K"]),
            row(&[
                "",
                "peaks=!mass_charge=1!intensity=1!mass_charge=x!intensity=2!mass_charge=3!intensity=3",
            ]),
        ];
        let decoded = decode(&rows).unwrap();
        assert_eq!(decoded.molecules["K"].spectra[0].peaks().map(<[Peak]>::len), Some(2));
        assert_eq!(decoded.dropped_peaks(), 1);
        let err = decoded.peak_errors().next().unwrap();
        assert_eq!(err.location.row, Some(2));
        assert_eq!(err.location.spectrum, Some(0));
    }
}
