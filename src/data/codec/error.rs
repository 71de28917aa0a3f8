use std::fmt;

use thiserror::Error;

use crate::data::registry::AttrKind;

// ---------------------------------------------------------------------------
// Where in the record tree something went wrong
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordLocation {
    /// 1-based table row, when the location came from a table.
    pub row: Option<usize>,
    pub key: String,
    /// Index of the spectrum within its molecule; `None` for the molecule row.
    pub spectrum: Option<usize>,
    pub attribute: Option<String>,
}

impl RecordLocation {
    pub(crate) fn new(row: Option<usize>, key: &str, spectrum: Option<usize>) -> Self {
        RecordLocation {
            row,
            key: key.to_string(),
            spectrum,
            attribute: None,
        }
    }

    pub(crate) fn attribute(&self, name: &str) -> Self {
        RecordLocation {
            attribute: Some(name.to_string()),
            ..self.clone()
        }
    }
}

impl fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(row) = self.row {
            write!(f, "row {row}, ")?;
        }
        write!(f, "molecule '{}'", self.key)?;
        if let Some(i) = self.spectrum {
            write!(f, ", spectrum {i}")?;
        }
        if let Some(attr) = &self.attribute {
            write!(f, ", attribute '{attr}'")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// A value that cannot be written without being misread on decode.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot encode {location}: {fault}")]
pub struct EncodingError {
    pub location: RecordLocation,
    pub fault: EncodingFault,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodingFault {
    #[error("molecule key is empty")]
    EmptyKey,
    #[error("attribute name is empty")]
    EmptyName,
    #[error("{part} {value:?} contains reserved {sentinel:?}")]
    Sentinel {
        part: &'static str,
        value: String,
        sentinel: &'static str,
    },
    #[error("mapping key '{0}' has an empty value, which reads back as missing")]
    EmptyMappingValue(String),
    #[error("a list holding a single empty item reads back as an empty list")]
    SingleEmptyItem,
    #[error("peak {index} has a non-finite {field}")]
    NonFiniteNumber { index: usize, field: &'static str },
    #[error("registered as {expected:?} but holds a {found:?} value")]
    KindMismatch { expected: AttrKind, found: AttrKind },
    #[error("{found:?} value would read back as {decoded:?}")]
    AmbiguousShape { found: AttrKind, decoded: AttrKind },
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Structural failure: the table cannot be decoded at all.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("row {row}: spectrum row appears before any molecule row")]
    OrphanSpectrum { row: usize },
}

/// A peak that was dropped while the rest of its spectrum was kept.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{location}, peak {peak}: {fault}")]
pub struct PeakDecodeError {
    pub location: RecordLocation,
    /// Position of the peak within the cell, counting dropped peaks.
    pub peak: usize,
    pub fault: PeakFault,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PeakFault {
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' is not a finite number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("segment has no '=': {0:?}")]
    MalformedSegment(String),
}

/// Recoverable problems collected while decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeIssue {
    #[error(transparent)]
    Peak(#[from] PeakDecodeError),
    #[error("{location}: cell has no '=' and was skipped: {cell:?}")]
    MalformedCell {
        location: RecordLocation,
        cell: String,
    },
    #[error("row {row}: molecule '{key}' appears again and replaces the earlier record")]
    DuplicateKey { key: String, row: usize },
}
