//! Attribute names the codec treats structurally.
//!
//! Everything in [`REGISTRY`] decodes by its listed kind no matter what the
//! cell looks like. Names that are not listed were discovered at ingestion
//! time and are decoded from the shape of their value instead.

/// How an attribute value is laid out inside a table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
    /// `name=value`
    Scalar,
    /// `name=a,b,c`
    List,
    /// `name=k1:v1;;k2:v2`
    Mapping,
    /// `name=!mass_charge=..!intensity=..`
    Peaks,
}

pub const PEAKS: &str = "peaks";
pub const IONIZATION_MODE: &str = "ionization_mode";

/// The taxonomy mapping was written as `taxonomy_dict` by older exports.
pub const TAXONOMY_ATTRIBUTES: [&str; 2] = ["taxonomy", "taxonomy_dict"];

/// HMDB spells this one without the second "o".
pub const PARENT_MASS_ATTRIBUTES: [&str; 2] =
    ["monisotopic_molecular_weight", "monoisotopic_molecular_weight"];

/// Fixed field set of a peak, in encoding order.
pub const PEAK_FIELDS: [&str; 4] = ["id", "ms_ms_id", "mass_charge", "intensity"];

static REGISTRY: &[(&str, AttrKind)] = &[
    // nested mappings
    ("taxonomy", AttrKind::Mapping),
    ("taxonomy_dict", AttrKind::Mapping),
    ("references", AttrKind::Mapping),
    ("references_dict", AttrKind::Mapping),
    ("id_dict", AttrKind::Mapping),
    // lists
    ("secondary_accessions", AttrKind::List),
    ("biofluid_locations", AttrKind::List),
    // peak lists
    (PEAKS, AttrKind::Peaks),
    // metabolite scalars
    ("accession", AttrKind::Scalar),
    ("name", AttrKind::Scalar),
    ("chemical_formula", AttrKind::Scalar),
    ("monisotopic_molecular_weight", AttrKind::Scalar),
    ("monoisotopic_molecular_weight", AttrKind::Scalar),
    ("iupac_name", AttrKind::Scalar),
    ("traditional_iupac", AttrKind::Scalar),
    ("cas_registry", AttrKind::Scalar),
    ("cas_registry_number", AttrKind::Scalar),
    ("smiles", AttrKind::Scalar),
    ("inchi", AttrKind::Scalar),
    ("inchikey", AttrKind::Scalar),
    ("inchi_key", AttrKind::Scalar),
    // MS2 scalars
    ("id", AttrKind::Scalar),
    ("peak_counter", AttrKind::Scalar),
    ("mono_mass", AttrKind::Scalar),
    ("spectra_type", AttrKind::Scalar),
    ("frequency", AttrKind::Scalar),
    ("instrument_type", AttrKind::Scalar),
    ("energy_field", AttrKind::Scalar),
    ("base_peak", AttrKind::Scalar),
    ("sample_mass_units", AttrKind::Scalar),
    ("chromatography_type", AttrKind::Scalar),
    ("searchable", AttrKind::Scalar),
    ("sample_mass", AttrKind::Scalar),
    ("derivative_mw", AttrKind::Scalar),
    ("retention_time", AttrKind::Scalar),
    ("updated_at", AttrKind::Scalar),
    ("sample_assessment", AttrKind::Scalar),
    ("derivative_formula", AttrKind::Scalar),
    ("derivative_type", AttrKind::Scalar),
    ("database_id", AttrKind::Scalar),
    ("ref_text", AttrKind::Scalar),
    ("mass_charge", AttrKind::Scalar),
    ("collision_energy_voltage", AttrKind::Scalar),
    ("sample_concentration", AttrKind::Scalar),
    ("spectra_assessment", AttrKind::Scalar),
    ("solvent", AttrKind::Scalar),
    ("nucleus_y", AttrKind::Scalar),
    (IONIZATION_MODE, AttrKind::Scalar),
    ("collection_date", AttrKind::Scalar),
    ("nucleus", AttrKind::Scalar),
    ("sample_temperature_units", AttrKind::Scalar),
    ("sample_ph", AttrKind::Scalar),
    ("spectra_id", AttrKind::Scalar),
    ("c_ms_id", AttrKind::Scalar),
    ("sample_concentration_units", AttrKind::Scalar),
    ("sample_source", AttrKind::Scalar),
    ("nil_classes", AttrKind::Scalar),
    ("nucleus_x", AttrKind::Scalar),
    ("database", AttrKind::Scalar),
    ("notes", AttrKind::Scalar),
    ("created_at", AttrKind::Scalar),
    ("sample_temperature", AttrKind::Scalar),
    ("ri_type", AttrKind::Scalar),
    ("pubmed_id", AttrKind::Scalar),
    ("molecule_id", AttrKind::Scalar),
    ("column_type", AttrKind::Scalar),
    ("retention_index", AttrKind::Scalar),
    ("collision_energy_level", AttrKind::Scalar),
    ("ms_ms_id", AttrKind::Scalar),
];

/// Registered kind of `name`, or `None` for a discovered attribute.
pub fn kind_of(name: &str) -> Option<AttrKind> {
    REGISTRY
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, kind)| *kind)
}

/// All registered names, in registry order.
pub fn registered_names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(n, _)| *n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn special_names_are_registered() {
        assert_eq!(kind_of("taxonomy"), Some(AttrKind::Mapping));
        assert_eq!(kind_of("references"), Some(AttrKind::Mapping));
        assert_eq!(kind_of("secondary_accessions"), Some(AttrKind::List));
        assert_eq!(kind_of("peaks"), Some(AttrKind::Peaks));
        assert_eq!(kind_of("iupac_name"), Some(AttrKind::Scalar));
        assert_eq!(kind_of("some_new_tag"), None);
    }

    #[test]
    fn no_duplicate_names() {
        let mut seen = HashSet::new();
        for name in registered_names() {
            assert!(seen.insert(name), "{name} registered twice");
        }
    }
}
