use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;

use super::codec::{self, Decoded, Decoder, Row};
use super::model::MoleculeMap;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load and decode a packed table.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` – comma separated, no header, ragged rows
/// * `.txt` – same layout, as written by the HMDB export scripts
pub fn load_file(path: &Path) -> Result<Decoded> {
    check_extension(path)?;
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening packed table {}", path.display()))?;
    let decoded = decode_reader(file)
        .with_context(|| format!("decoding packed table {}", path.display()))?;
    info!(
        "{}: {} molecules, {} spectra, {} issues",
        path.display(),
        decoded.molecules.len(),
        decoded.spectrum_count(),
        decoded.issues.len()
    );
    Ok(decoded)
}

/// Encode and write every molecule; fails without writing if any molecule
/// cannot be encoded.
pub fn save_file(path: &Path, molecules: &MoleculeMap) -> Result<()> {
    check_extension(path)?;
    let rows = codec::encode(molecules)?;
    write_table(path, &rows)
}

fn check_extension(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" | "txt" => Ok(()),
        other => bail!("Unsupported packed table extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// CSV row I/O
// ---------------------------------------------------------------------------

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
}

fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(writer)
}

/// Decode straight from CSV records without materialising the rows.
pub fn decode_reader<R: Read>(reader: R) -> Result<Decoded> {
    let mut reader = csv_reader(reader);
    let mut decoder = Decoder::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {}", row_no + 1))?;
        let cells: Vec<&str> = record.iter().collect();
        decoder.push_row(cells.as_slice())?;
    }
    Ok(decoder.finish())
}

pub fn read_rows<R: Read>(reader: R) -> Result<Vec<Row>> {
    let mut reader = csv_reader(reader);
    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {}", row_no + 1))?;
        rows.push(record.iter().map(String::from).collect());
    }
    Ok(rows)
}

pub fn write_rows<W: Write>(writer: W, rows: &[Row]) -> Result<()> {
    let mut writer = csv_writer(writer);
    for (row_no, row) in rows.iter().enumerate() {
        writer
            .write_record(row)
            .with_context(|| format!("writing CSV row {}", row_no + 1))?;
    }
    writer.flush().context("flushing CSV writer")?;
    Ok(())
}

pub fn read_table(path: &Path) -> Result<Vec<Row>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    read_rows(file)
}

pub fn write_table(path: &Path, rows: &[Row]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_rows(file, rows)?;
    info!("wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{mapping, Molecule, Peak, Spectrum};

    #[test]
    fn commas_inside_cells_are_quoted() {
        let rows = vec![vec![
            "KEY".to_string(),
            "biofluid_locations=Blood,Urine".to_string(),
            "notes=said \"hi\"".to_string(),
        ]];
        let mut buf = Vec::new();
        write_rows(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(
            text,
            "KEY,\"biofluid_locations=Blood,Urine\",\"notes=said \"\"hi\"\"\"\n"
        );
        assert_eq!(read_rows(&buf[..]).unwrap(), rows);
    }

    #[test]
    fn empty_spectrum_row_survives_csv() {
        let mut molecules = MoleculeMap::new();
        molecules.insert(
            "K".to_string(),
            Molecule::new()
                .with("taxonomy", mapping([("kingdom", Some("Lipids")), ("class", None)]))
                .with_spectrum(Spectrum::new())
                .with_spectrum(Spectrum::new().with("peaks", vec![Peak::new(1.5, 2.0)])),
        );
        let rows = codec::encode(&molecules).unwrap();
        let mut buf = Vec::new();
        write_rows(&mut buf, &rows).unwrap();

        let decoded = decode_reader(&buf[..]).unwrap();
        assert_eq!(decoded.molecules, molecules);
    }

    #[test]
    fn ragged_rows_are_accepted() {
        let text = "A,name=x,accession=1\n,ionization_mode=Positive\nB\n";
        let decoded = decode_reader(text.as_bytes()).unwrap();
        assert_eq!(decoded.molecules.len(), 2);
        assert_eq!(decoded.molecules["A"].spectra.len(), 1);
    }

    #[test]
    fn orphan_spectrum_aborts_load() {
        let err = decode_reader(",name=x\nA\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("before any molecule"));
    }

    #[test]
    fn unsupported_extension() {
        assert!(load_file(Path::new("table.parquet")).is_err());
    }
}
