//! Pack and unpack HMDB metabolite records and their MS2 spectra to flat
//! CSV tables, then select spectra for export and feature tables.

pub mod data;

pub use data::codec::{decode, encode, Decoded};
pub use data::model::{AttrValue, Molecule, MoleculeMap, Peak, Spectrum};
