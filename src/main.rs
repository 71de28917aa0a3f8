//! # metab-pack
//!
//! Command-line front end for packed HMDB metabolite tables.
//!
//! ## Usage
//!
//! ```bash
//! # Summarise a packed table
//! metab-pack inspect hmdb_packed.csv
//!
//! # Export spectra suitable for classification
//! metab-pack select hmdb_packed.csv selected.json --min-peaks 5
//!
//! # One merged peak list per molecule
//! metab-pack select hmdb_packed.csv merged.json --merge
//!
//! # Build molecule × m/z feature tables
//! metab-pack features hmdb_packed.csv tables/ --integer-mz
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use metab_pack::data::codec;
use metab_pack::data::export::{export_file, export_merged};
use metab_pack::data::feature_table::{write_feature_tables, MzBinning};
use metab_pack::data::filter::{select, SelectionCriteria};
use metab_pack::data::loader;

/// metab-pack - HMDB metabolite/MS2 packed table tool
#[derive(Parser)]
#[command(name = "metab-pack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a packed table and report what it holds
    Inspect {
        #[arg(value_name = "TABLE")]
        table: PathBuf,
    },

    /// Decode a packed table and encode it again
    Repack {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },

    /// Write the selected spectra as .json or .parquet
    Select {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Minimum number of peaks per spectrum (overrides the config file)
        #[arg(long)]
        min_peaks: Option<usize>,

        /// TOML file with selection criteria
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Merge the spectra of each molecule into one peak list (.json only)
        #[arg(long)]
        merge: bool,
    },

    /// Write positive, negative and all-scan m/z feature tables
    Features {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTDIR")]
        outdir: PathBuf,

        /// Truncate m/z values to integers before pivoting
        #[arg(long)]
        integer_mz: bool,

        /// TOML file with selection criteria
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Inspect { table } => run_inspect(&table, cli.verbose > 0),
        Commands::Repack { input, output } => run_repack(&input, &output),
        Commands::Select {
            input,
            output,
            min_peaks,
            config,
            merge,
        } => run_select(&input, &output, min_peaks, config.as_deref(), merge),
        Commands::Features {
            input,
            outdir,
            integer_mz,
            config,
        } => run_features(&input, &outdir, integer_mz, config.as_deref()),
    }
}

fn load_criteria(config: Option<&Path>, min_peaks: Option<usize>) -> Result<SelectionCriteria> {
    let mut criteria = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => SelectionCriteria::default(),
    };
    if let Some(n) = min_peaks {
        criteria.min_peaks = n;
    }
    Ok(criteria)
}

fn run_inspect(table: &Path, list_issues: bool) -> Result<()> {
    let decoded = loader::load_file(table)?;
    let peaks: usize = decoded
        .molecules
        .values()
        .flat_map(|m| &m.spectra)
        .filter_map(|s| s.peaks())
        .map(<[_]>::len)
        .sum();

    println!("File:          {}", table.display());
    println!("Molecules:     {}", decoded.molecules.len());
    println!("Spectra:       {}", decoded.spectrum_count());
    println!("Peaks:         {peaks}");
    println!("Dropped peaks: {}", decoded.dropped_peaks());
    println!("Issues:        {}", decoded.issues.len());
    if list_issues {
        for issue in &decoded.issues {
            println!("  {issue}");
        }
    }
    Ok(())
}

fn run_repack(input: &Path, output: &Path) -> Result<()> {
    let decoded = loader::load_file(input)?;
    let (rows, errors) = codec::encode_skipping(&decoded.molecules);
    loader::write_table(output, &rows)?;
    if !errors.is_empty() {
        warn!("{} molecules could not be encoded", errors.len());
    }
    info!(
        "repacked {} of {} molecules",
        decoded.molecules.len() - errors.len(),
        decoded.molecules.len()
    );
    Ok(())
}

fn run_select(
    input: &Path,
    output: &Path,
    min_peaks: Option<usize>,
    config: Option<&Path>,
    merge: bool,
) -> Result<()> {
    let criteria = load_criteria(config, min_peaks)?;
    let decoded = loader::load_file(input)?;
    let selected = select(&decoded.molecules, &criteria);
    if merge {
        export_merged(output, &selected)?;
    } else {
        export_file(output, &selected)?;
    }
    println!(
        "Selected {} of {} spectra -> {}",
        selected.len(),
        decoded.spectrum_count(),
        output.display()
    );
    Ok(())
}

fn run_features(
    input: &Path,
    outdir: &Path,
    integer_mz: bool,
    config: Option<&Path>,
) -> Result<()> {
    let criteria = load_criteria(config, None)?;
    let decoded = loader::load_file(input)?;
    let selected = select(&decoded.molecules, &criteria);
    let binning = if integer_mz {
        MzBinning::Integer
    } else {
        MzBinning::Exact
    };
    for path in write_feature_tables(outdir, &selected, binning)? {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
