//! Distance matrix reports.
//!
//! A report is a tab-separated table: the first row holds an empty corner
//! cell followed by the column labels, then one row per record with its
//! label and distances. Undefined cells (length mismatch) are written as
//! `NA`.
//!
//! ```text
//! \ta\tb
//! a\t0\t3
//! b\t3\t0
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::align::{AlignError, Aligner};
use crate::distance::all_pairs_distance;
use crate::fasta::{read_fasta_file, FastaError};
use crate::model::DistanceMatrix;

/// Suffix appended to the input prefix to name the report file.
pub const REPORT_SUFFIX: &str = "_multipleHamming.txt";

/// Text written for a cell with no distance.
pub const MISSING_CELL: &str = "NA";

/// Errors that can occur while producing a report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    IoError(#[from] io::Error),

    #[error("{0}")]
    FastaError(#[from] FastaError),

    #[error("{0}")]
    AlignError(#[from] AlignError),

    #[error("No FASTA records found in {0}")]
    NoRecords(PathBuf),
}

/// Writes `matrix` as tab-separated text.
pub fn write_matrix_tsv<W: Write>(writer: &mut W, matrix: &DistanceMatrix) -> io::Result<()> {
    for label in matrix.labels() {
        write!(writer, "\t{}", label)?;
    }
    writeln!(writer)?;

    for (label, row) in matrix.rows() {
        write!(writer, "{}", label)?;
        for cell in row {
            match cell {
                Some(d) => write!(writer, "\t{}", d)?,
                None => write!(writer, "\t{}", MISSING_CELL)?,
            }
        }
        writeln!(writer)?;
    }
    writer.flush()
}

/// Renders `matrix` as a tab-separated string.
pub fn matrix_to_tsv(matrix: &DistanceMatrix) -> String {
    let mut buf = Vec::new();
    // Writing to a Vec cannot fail
    let _ = write_matrix_tsv(&mut buf, matrix);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Derives the report path for `input`.
///
/// The report sits next to the input and is named after the input's file
/// name up to its first `.`, e.g. `data/run1.aln.fa` gives
/// `data/run1_multipleHamming.txt`.
pub fn report_path<P: AsRef<Path>>(input: P) -> PathBuf {
    let input = input.as_ref();
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = file_name.split('.').next().unwrap_or_default();
    input.with_file_name(format!("{}{}", prefix, REPORT_SUFFIX))
}

/// Writes `matrix` to a report file at `path`, overwriting it.
pub fn write_report<P: AsRef<Path>>(path: P, matrix: &DistanceMatrix) -> Result<(), ReportError> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_matrix_tsv(&mut writer, matrix)?;
    info!("Wrote {}x{} matrix to {}", matrix.size(), matrix.size(), path.as_ref().display());
    Ok(())
}

/// Reads `input`, computes all pairwise distances and writes the report.
///
/// Returns the report path and the matrix. An input without any FASTA
/// record is rejected before anything is aligned or written.
pub fn multiple_hamming<P: AsRef<Path>>(
    input: P,
    aligner: Option<&Aligner>,
) -> Result<(PathBuf, DistanceMatrix), ReportError> {
    let input = input.as_ref();
    let records = read_fasta_file(input)?;
    if records.is_empty() {
        return Err(ReportError::NoRecords(input.to_path_buf()));
    }
    info!("Read {} records from {}", records.len(), input.display());

    let matrix = all_pairs_distance(&records, aligner)?;
    let path = report_path(input);
    write_report(&path, &matrix)?;
    Ok((path, matrix))
}
