use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float64Array, Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use super::feature_table::{FeatureTable, MzBinning};
use super::filter::SelectedSpectrum;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Write selected spectra to a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.json`    – `{ "<spectrum id>": { "inchi": .., "peaks": [[mz, i], ..] }, .. }`
/// * `.parquet` – one row per spectrum, `x` = m/z list, `y` = intensity list
pub fn export_file(path: &Path, selected: &[SelectedSpectrum]) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "json" => export_json(path, selected),
        "parquet" | "pq" => export_parquet(path, selected),
        other => bail!("Unsupported export extension: .{other}"),
    }?;
    info!("exported {} spectra to {}", selected.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

pub fn to_json(selected: &[SelectedSpectrum]) -> Result<serde_json::Value> {
    let by_id: BTreeMap<&str, &SelectedSpectrum> =
        selected.iter().map(|s| (s.id.as_str(), s)).collect();
    serde_json::to_value(by_id).context("serializing selected spectra")
}

fn export_json(path: &Path, selected: &[SelectedSpectrum]) -> Result<()> {
    let file = std::fs::File::create(path).context("creating JSON file")?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer(writer, &to_json(selected)?).context("writing JSON")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Merged JSON: one peak list per molecule
// ---------------------------------------------------------------------------

/// All selected spectra of one molecule folded into a single peak list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedMolecule {
    #[serde(rename = "parentmass")]
    pub parent_mass: Option<f64>,
    #[serde(flatten)]
    pub taxonomy: BTreeMap<String, Option<String>>,
    /// Strongest first. A repeated m/z keeps its highest intensity.
    pub peaks: Vec<(f64, f64)>,
}

/// Merge spectra per molecule key. Parent mass and taxonomy come from the
/// molecule's first selected spectrum.
pub fn merge_spectra(selected: &[SelectedSpectrum]) -> BTreeMap<String, MergedMolecule> {
    let table = FeatureTable::build(selected, MzBinning::Exact);
    let mut merged = BTreeMap::new();
    for spectrum in selected {
        merged.entry(spectrum.key.clone()).or_insert_with(|| {
            let mut peaks: Vec<(f64, f64)> = table
                .rows
                .get(&spectrum.key)
                .map(|row| row.intensities.iter().map(|(mz, i)| (mz.0, *i)).collect())
                .unwrap_or_default();
            peaks.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.total_cmp(&b.0)));
            MergedMolecule {
                parent_mass: spectrum.parent_mass,
                taxonomy: spectrum.taxonomy.clone(),
                peaks,
            }
        });
    }
    merged
}

pub fn to_merged_json(selected: &[SelectedSpectrum]) -> Result<serde_json::Value> {
    serde_json::to_value(merge_spectra(selected)).context("serializing merged spectra")
}

/// Write the per-molecule merged spectra. Only `.json` is supported.
pub fn export_merged(path: &Path, selected: &[SelectedSpectrum]) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "json" {
        bail!("Merged spectra can only be written as .json, not .{ext}");
    }
    let merged = to_merged_json(selected)?;
    let file = std::fs::File::create(path).context("creating JSON file")?;
    serde_json::to_writer(std::io::BufWriter::new(file), &merged).context("writing JSON")?;
    info!(
        "exported {} merged molecules to {}",
        merged.as_object().map_or(0, |m| m.len()),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

const TAXONOMY_COLUMNS: [&str; 3] = ["kingdom", "class", "sub_class"];

fn list_field(name: &str) -> Field {
    Field::new(
        name,
        DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
        false,
    )
}

fn string_column<'a>(
    selected: &'a [SelectedSpectrum],
    f: impl Fn(&'a SelectedSpectrum) -> Option<&'a str>,
) -> ArrayRef {
    Arc::new(StringArray::from(selected.iter().map(f).collect::<Vec<_>>()))
}

/// Build the Arrow batch: one row per selected spectrum.
pub fn to_record_batch(selected: &[SelectedSpectrum]) -> Result<RecordBatch> {
    let mut x_builder = ListBuilder::new(Float64Builder::new());
    let mut y_builder = ListBuilder::new(Float64Builder::new());
    for spectrum in selected {
        for &(mz, intensity) in &spectrum.peaks {
            x_builder.values().append_value(mz);
            y_builder.values().append_value(intensity);
        }
        x_builder.append(true);
        y_builder.append(true);
    }

    let mut fields = vec![
        Field::new("spectrum_id", DataType::Utf8, false),
        Field::new("inchi", DataType::Utf8, false),
        Field::new("ionization", DataType::Utf8, false),
        Field::new("parentmass", DataType::Float64, true),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        string_column(selected, |s| Some(s.id.as_str())),
        string_column(selected, |s| Some(s.key.as_str())),
        string_column(selected, |s| Some(s.ionization_mode.as_str())),
        Arc::new(Float64Array::from(
            selected.iter().map(|s| s.parent_mass).collect::<Vec<_>>(),
        )),
    ];
    for level in TAXONOMY_COLUMNS {
        fields.push(Field::new(level, DataType::Utf8, true));
        columns.push(string_column(selected, |s| {
            s.taxonomy.get(level).and_then(|v| v.as_deref())
        }));
    }
    fields.push(list_field("x"));
    fields.push(list_field("y"));
    columns.push(Arc::new(x_builder.finish()));
    columns.push(Arc::new(y_builder.finish()));

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("building record batch")
}

fn export_parquet(path: &Path, selected: &[SelectedSpectrum]) -> Result<()> {
    let batch = to_record_batch(selected)?;
    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}
