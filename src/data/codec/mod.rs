//! Flat table codec for the molecule → spectrum → peak tree.
//!
//! Layout of an encoded table:
//! ```text
//!  HMDB_KEY , accession=HMDB0000001 , taxonomy=kingdom:Organic compounds;;class:
//!           , ionization_mode=Positive , peaks=!mass_charge=100.5!intensity=20
//!           , ionization_mode=Negative , peaks=
//!  NEXT_KEY , ...
//! ```
//! A non-empty first cell starts a molecule; an empty one continues it with a
//! spectrum. Every other cell is `name=value`, split at the first `=`.
//!
//! In-cell sentinels, one per structural level:
//! * `;;` between mapping entries, `:` between a mapping key and its value
//! * `,`  between list items
//! * `!`  before every peak field

pub mod decode;
pub mod encode;
pub mod error;

pub use decode::{decode, Decoded, Decoder};
pub use encode::{encode, encode_cell, encode_molecule, encode_skipping};
pub use error::{
    DecodeError, DecodeIssue, EncodingError, EncodingFault, PeakDecodeError, PeakFault,
    RecordLocation,
};

use super::registry::AttrKind;

/// One table row: an ordered list of cells.
pub type Row = Vec<String>;

pub(crate) const MAPPING_SEP: &str = ";;";
pub(crate) const MAPPING_KV_SEP: char = ':';
pub(crate) const LIST_SEP: &str = ",";
pub(crate) const PEAK_SEP: char = '!';
pub(crate) const ATTR_SEP: char = '=';

/// Shape of a discovered (unregistered) attribute, read off its encoded value.
/// The mapping sentinel wins over the list sentinel.
pub fn infer_kind(body: &str) -> AttrKind {
    if body.contains(MAPPING_SEP) {
        AttrKind::Mapping
    } else if body.contains(LIST_SEP) {
        AttrKind::List
    } else {
        AttrKind::Scalar
    }
}
