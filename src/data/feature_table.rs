use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use super::filter::SelectedSpectrum;

// ---------------------------------------------------------------------------
// MzKey – an m/z column header
// ---------------------------------------------------------------------------

/// m/z value usable as an ordered map key.
#[derive(Debug, Clone, Copy)]
pub struct MzKey(pub f64);

// -- Manual Eq/Ord so MzKey can head BTreeMap columns --

impl PartialEq for MzKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for MzKey {}

impl PartialOrd for MzKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MzKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for MzKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How peak m/z values become columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MzBinning {
    /// One column per distinct m/z.
    #[default]
    Exact,
    /// m/z truncated to an integer.
    Integer,
}

impl MzBinning {
    fn key(self, mz: f64) -> MzKey {
        match self {
            MzBinning::Exact => MzKey(mz),
            MzBinning::Integer => MzKey(mz.trunc()),
        }
    }

    fn file_stem(self) -> &'static str {
        match self {
            MzBinning::Exact => "raw_mz",
            MzBinning::Integer => "mz_integer",
        }
    }
}

// ---------------------------------------------------------------------------
// FeatureTable – molecules × m/z intensity matrix
// ---------------------------------------------------------------------------

pub const LABEL_COLUMNS: [&str; 3] = ["kingdom", "sub_class", "class"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    pub intensities: BTreeMap<MzKey, f64>,
    pub labels: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    pub columns: BTreeSet<MzKey>,
    /// Molecule key → row. All spectra of a molecule merge into one row.
    pub rows: BTreeMap<String, FeatureRow>,
}

impl FeatureTable {
    /// Pivot spectra into one row per molecule. When the same m/z occurs more
    /// than once for a molecule the highest intensity is kept.
    pub fn build<'a, I>(spectra: I, binning: MzBinning) -> Self
    where
        I: IntoIterator<Item = &'a SelectedSpectrum>,
    {
        let mut table = FeatureTable::default();
        for spectrum in spectra {
            let row = table.rows.entry(spectrum.key.clone()).or_insert_with(|| FeatureRow {
                intensities: BTreeMap::new(),
                labels: LABEL_COLUMNS
                    .iter()
                    .map(|l| (l.to_string(), spectrum.taxonomy.get(*l).cloned().flatten()))
                    .collect(),
            });
            for &(mz, intensity) in &spectrum.peaks {
                let key = binning.key(mz);
                table.columns.insert(key);
                row.intensities
                    .entry(key)
                    .and_modify(|best| *best = best.max(intensity))
                    .or_insert(intensity);
            }
        }
        table
    }

    pub fn get(&self, key: &str, mz: f64) -> Option<f64> {
        self.rows.get(key)?.intensities.get(&MzKey(mz)).copied()
    }

    /// Tab-separated: `inchi`, one column per m/z, then the taxonomy labels.
    /// Missing intensities are written as `0`.
    pub fn write_tsv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);

        let mut header = vec!["inchi".to_string()];
        header.extend(self.columns.iter().map(MzKey::to_string));
        header.extend(LABEL_COLUMNS.iter().map(|l| l.to_string()));
        writer.write_record(&header).context("writing feature table header")?;

        for (key, row) in &self.rows {
            let mut record = Vec::with_capacity(header.len());
            record.push(key.clone());
            for mz in &self.columns {
                let value = row.intensities.get(mz).copied().unwrap_or(0.0);
                record.push(value.to_string());
            }
            for label in LABEL_COLUMNS {
                let value = row.labels.get(label).cloned().flatten().unwrap_or_default();
                record.push(value);
            }
            writer
                .write_record(&record)
                .with_context(|| format!("writing feature row for {key}"))?;
        }
        writer.flush().context("flushing feature table")?;
        Ok(())
    }
}

/// Write the positive, negative and all-scan tables into `dir`.
pub fn write_feature_tables(
    dir: &Path,
    selected: &[SelectedSpectrum],
    binning: MzBinning,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    let subsets: [(&str, Option<&str>); 3] = [
        ("positive", Some("Positive")),
        ("negative", Some("Negative")),
        ("all_scans", None),
    ];

    let mut written = Vec::with_capacity(subsets.len());
    for (suffix, mode) in subsets {
        let spectra = selected
            .iter()
            .filter(|s| mode.map_or(true, |m| s.ionization_mode == m));
        let table = FeatureTable::build(spectra, binning);

        let path = dir.join(format!("{}.{suffix}.txt", binning.file_stem()));
        let file = std::fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        table.write_tsv(file)?;
        info!(
            "{}: {} molecules x {} m/z columns",
            path.display(),
            table.rows.len(),
            table.columns.len()
        );
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(key: &str, mode: &str, peaks: &[(f64, f64)]) -> SelectedSpectrum {
        let mut taxonomy = BTreeMap::new();
        taxonomy.insert("kingdom".to_string(), Some("Lipids".to_string()));
        taxonomy.insert("class".to_string(), None);
        SelectedSpectrum {
            id: format!("{key}_MS2-0_{mode}"),
            key: key.to_string(),
            index: 0,
            parent_mass: Some(100.0),
            taxonomy,
            ionization_mode: mode.to_string(),
            peaks: peaks.to_vec(),
        }
    }

    #[test]
    fn duplicate_mz_keeps_highest_intensity() {
        let spectra = [
            spectrum("A", "Positive", &[(100.5, 2.0), (150.0, 1.0)]),
            spectrum("A", "Negative", &[(100.5, 7.0)]),
            spectrum("B", "Positive", &[(150.0, 3.0)]),
        ];
        let table = FeatureTable::build(&spectra, MzBinning::Exact);
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.get("A", 100.5), Some(7.0));
        assert_eq!(table.get("B", 100.5), None);
        assert_eq!(table.rows["A"].labels["kingdom"].as_deref(), Some("Lipids"));
    }

    #[test]
    fn integer_binning_merges_columns() {
        let spectra = [spectrum("A", "Positive", &[(100.2, 2.0), (100.9, 5.0), (101.0, 1.0)])];
        let table = FeatureTable::build(&spectra, MzBinning::Integer);
        let cols: Vec<f64> = table.columns.iter().map(|k| k.0).collect();
        assert_eq!(cols, vec![100.0, 101.0]);
        assert_eq!(table.get("A", 100.0), Some(5.0));
    }

    #[test]
    fn tsv_layout() {
        let spectra = [
            spectrum("A", "Positive", &[(100.5, 2.0)]),
            spectrum("B", "Positive", &[(50.0, 3.0)]),
        ];
        let table = FeatureTable::build(&spectra, MzBinning::Exact);
        let mut buf = Vec::new();
        table.write_tsv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "inchi\t50\t100.5\tkingdom\tsub_class\tclass");
        assert_eq!(lines[1], "A\t0\t2\tLipids\t\t");
        assert_eq!(lines[2], "B\t3\t0\tLipids\t\t");
    }

    #[test]
    fn writes_one_table_per_mode() {
        let dir = tempfile::tempdir().unwrap();
        let spectra = [
            spectrum("A", "Positive", &[(100.5, 2.0)]),
            spectrum("B", "Negative", &[(50.0, 3.0)]),
        ];
        let paths = write_feature_tables(dir.path(), &spectra, MzBinning::Integer).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "mz_integer.positive.txt",
                "mz_integer.negative.txt",
                "mz_integer.all_scans.txt"
            ]
        );
        let all = std::fs::read_to_string(&paths[2]).unwrap();
        assert_eq!(all.lines().count(), 3);
    }
}
