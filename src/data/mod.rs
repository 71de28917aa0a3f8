//! Data layer: record model, packed-table codec, selection and export.
//!
//! Architecture:
//! ```text
//!  packed .csv / .txt
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  CSV rows ⇄ codec
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  codec    │  rows ⇄ MoleculeMap (+ recovered issues)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  selection criteria → SelectedSpectrum
//!   └──────────┘
//!        │
//!        ├──▶ export         .json / .parquet
//!        └──▶ feature_table  molecule × m/z TSV
//! ```

pub mod codec;
pub mod export;
pub mod feature_table;
pub mod filter;
pub mod loader;
pub mod model;
pub mod registry;
