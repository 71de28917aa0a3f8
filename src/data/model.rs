use std::collections::BTreeMap;
use std::fmt;

use super::registry::{
    AttrKind, IONIZATION_MODE, PARENT_MASS_ATTRIBUTES, PEAKS, TAXONOMY_ATTRIBUTES,
};

// ---------------------------------------------------------------------------
// AttrValue – the value held by one attribute of a record
// ---------------------------------------------------------------------------

/// A dynamically-shaped attribute value.
///
/// Absence is expressed by the attribute not being present in the owning
/// [`Attributes`] map at all, so an empty `Text`, `List` or `Map` is always a
/// present value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    List(Vec<String>),
    /// Nested mapping. `None` marks a key whose value was missing in the source.
    Map(BTreeMap<String, Option<String>>),
    Peaks(Vec<Peak>),
}

impl AttrValue {
    /// The structural kind of this value, as the registry names it.
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::Text(_) => AttrKind::Scalar,
            AttrValue::List(_) => AttrKind::List,
            AttrValue::Map(_) => AttrKind::Mapping,
            AttrValue::Peaks(_) => AttrKind::Peaks,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Option<String>>> {
        match self {
            AttrValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_peaks(&self) -> Option<&[Peak]> {
        match self {
            AttrValue::Peaks(p) => Some(p),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(items: Vec<String>) -> Self {
        AttrValue::List(items)
    }
}

impl From<Vec<Peak>> for AttrValue {
    fn from(peaks: Vec<Peak>) -> Self {
        AttrValue::Peaks(peaks)
    }
}

/// Open attribute set: attribute name → value. Sorted, so rows encode in a
/// stable order.
pub type Attributes = BTreeMap<String, AttrValue>;

// ---------------------------------------------------------------------------
// Peak – one m/z / intensity point of an MS2 spectrum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Peak {
    pub id: Option<String>,
    /// Identifier of the spectrum this peak was recorded under.
    pub ms_ms_id: Option<String>,
    pub mass_charge: f64,
    pub intensity: f64,
}

impl Peak {
    pub fn new(mass_charge: f64, intensity: f64) -> Self {
        Peak {
            id: None,
            ms_ms_id: None,
            mass_charge,
            intensity,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_ms_ms_id(mut self, ms_ms_id: impl Into<String>) -> Self {
        self.ms_ms_id = Some(ms_ms_id.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Spectrum – one MS2 measurement owned by a molecule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrum {
    pub attributes: Attributes,
}

impl Spectrum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    /// Peak list, or `None` if the spectrum carries no `peaks` attribute.
    pub fn peaks(&self) -> Option<&[Peak]> {
        self.attributes.get(PEAKS).and_then(AttrValue::as_peaks)
    }

    /// Compact `(mz, intensity)` view of the peak list, in source order.
    pub fn peak_pairs(&self) -> Vec<(f64, f64)> {
        self.peaks()
            .unwrap_or_default()
            .iter()
            .map(|p| (p.mass_charge, p.intensity))
            .collect()
    }

    /// Ionization mode, treating an empty string as unknown.
    pub fn ionization_mode(&self) -> Option<&str> {
        self.attributes
            .get(IONIZATION_MODE)
            .and_then(AttrValue::as_text)
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Molecule – metadata plus owned spectra
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    pub attributes: Attributes,
    /// Spectra in ingestion order; the index is part of exported identifiers.
    pub spectra: Vec<Spectrum>,
}

impl Molecule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn with_spectrum(mut self, spectrum: Spectrum) -> Self {
        self.spectra.push(spectrum);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    /// Taxonomy mapping, looked up under either of its known attribute names.
    pub fn taxonomy(&self) -> Option<&BTreeMap<String, Option<String>>> {
        TAXONOMY_ATTRIBUTES
            .iter()
            .find_map(|name| self.attributes.get(*name).and_then(AttrValue::as_map))
    }

    /// Parent (monoisotopic) mass, if present and numeric.
    pub fn parent_mass(&self) -> Option<f64> {
        PARENT_MASS_ATTRIBUTES.iter().find_map(|name| {
            self.attributes
                .get(*name)
                .and_then(AttrValue::as_text)
                .and_then(|s| s.trim().parse::<f64>().ok())
        })
    }
}

/// Molecule key → molecule. The key is usually an InChIKey.
pub type MoleculeMap = BTreeMap<String, Molecule>;

/// Build a nested mapping from `(key, value)` pairs, turning empty values
/// into `None` since the table format cannot tell them apart.
pub fn mapping<'a, I>(entries: I) -> AttrValue
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    AttrValue::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.filter(|s| !s.is_empty()).map(String::from)))
            .collect(),
    )
}

/// Build a list value from string slices.
pub fn list<'a, I>(items: I) -> AttrValue
where
    I: IntoIterator<Item = &'a str>,
{
    AttrValue::List(items.into_iter().map(String::from).collect())
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => write!(f, "{s}"),
            AttrValue::List(items) => write!(f, "[{}]", items.join(", ")),
            AttrValue::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match v {
                        Some(v) => write!(f, "{k}: {v}")?,
                        None => write!(f, "{k}: <none>")?,
                    }
                }
                write!(f, "}}")
            }
            AttrValue::Peaks(p) => write!(f, "<{} peaks>", p.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_found_under_either_name() {
        let a = Molecule::new().with("taxonomy", mapping([("kingdom", Some("Lipids"))]));
        let b = Molecule::new().with("taxonomy_dict", mapping([("kingdom", Some("Lipids"))]));
        assert_eq!(a.taxonomy(), b.taxonomy());
        assert!(Molecule::new().taxonomy().is_none());
    }

    #[test]
    fn mapping_helper_drops_empty_values() {
        let AttrValue::Map(m) = mapping([("kingdom", Some("")), ("class", Some("Acids"))]) else {
            panic!("expected a mapping");
        };
        assert_eq!(m["kingdom"], None);
        assert_eq!(m["class"].as_deref(), Some("Acids"));
    }

    #[test]
    fn parent_mass_prefers_hmdb_spelling() {
        let m = Molecule::new()
            .with("monisotopic_molecular_weight", "180.063")
            .with("monoisotopic_molecular_weight", "1.0");
        assert_eq!(m.parent_mass(), Some(180.063));

        let m = Molecule::new().with("monoisotopic_molecular_weight", "not a number");
        assert_eq!(m.parent_mass(), None);
    }

    #[test]
    fn peak_pairs_follow_source_order() {
        let s = Spectrum::new().with(
            "peaks",
            vec![Peak::new(200.0, 1.0), Peak::new(100.0, 2.0)],
        );
        assert_eq!(s.peak_pairs(), vec![(200.0, 1.0), (100.0, 2.0)]);
        assert!(Spectrum::new().peaks().is_none());
        assert!(Spectrum::new().peak_pairs().is_empty());
    }

    #[test]
    fn empty_ionization_mode_is_unknown() {
        assert_eq!(Spectrum::new().with("ionization_mode", "").ionization_mode(), None);
        assert_eq!(
            Spectrum::new().with("ionization_mode", "Negative").ionization_mode(),
            Some("Negative")
        );
    }
}
