//! FASTA reading and writing.
//!
//! This module handles reading and writing FASTA format files.
//! It supports both single-line and multi-line sequences.
//!
//! ## FASTA Format
//!
//! ```text
//! >sequence_identifier optional description
//! ACGTACGTACGT...
//! >another_sequence
//! TGCATGCATGCA...
//! ```
//!
//! Records are split on lines whose first character is `>`. Only the line
//! terminator (`\n` or `\r\n`) is stripped from each line; other whitespace is
//! kept as-is. Lines before the first header are ignored, and input without
//! any header yields an empty collection rather than an error.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::warn;
use thiserror::Error;

use crate::model::{Record, MARKER};

/// Width at which sequence lines are wrapped on output.
pub const LINE_WIDTH: usize = 80;

/// Errors that can occur while reading or writing FASTA.
#[derive(Error, Debug)]
pub enum FastaError {
    #[error("Failed to access FASTA file: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for FASTA operations.
pub type FastaResult<T> = Result<T, FastaError>;

/// Removes a single trailing line terminator, if any.
fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Parses FASTA content from a string.
///
/// Returns records in input order. Content without any `>` line gives an
/// empty `Vec`; callers must check for that.
pub fn parse_fasta_str(content: &str) -> Vec<Record> {
    let mut records: Vec<Record> = Vec::new();

    for line in content.split_inclusive('\n') {
        let line = strip_terminator(line);
        if line.starts_with(MARKER) {
            records.push(Record::new(line, String::new()));
        } else if let Some(current) = records.last_mut() {
            current.sequence.push_str(line);
        }
        // Lines before the first header are dropped
    }

    if records.is_empty() && !content.is_empty() {
        warn!("No FASTA header found in {} bytes of input", content.len());
    }

    records
}

/// Parses FASTA content from a reader.
///
/// The whole input is materialized before parsing.
pub fn parse_fasta<R: BufRead>(mut reader: R) -> FastaResult<Vec<Record>> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    Ok(parse_fasta_str(&content))
}

/// Parses a FASTA file.
///
/// # Examples
///
/// ```no_run
/// use seqdist::fasta::read_fasta_file;
///
/// let records = read_fasta_file("sequences.fasta").unwrap();
/// println!("Loaded {} sequences", records.len());
/// ```
pub fn read_fasta_file<P: AsRef<Path>>(path: P) -> FastaResult<Vec<Record>> {
    let file = File::open(path)?;
    let metadata = file.metadata()?;
    let capacity = (metadata.len() as usize).clamp(8 * 1024, 1024 * 1024);
    let reader = BufReader::with_capacity(capacity, file);
    parse_fasta(reader)
}

/// Output settings for the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Maximum sequence characters per line
    pub line_width: usize,
    /// Terminate the very last line of the output
    pub final_newline: bool,
    /// Append to the destination instead of truncating it
    pub append: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            line_width: LINE_WIDTH,
            final_newline: true,
            append: false,
        }
    }
}

/// Splits `sequence` into chunks of at most `width` characters.
fn wrap_sequence(sequence: &str, width: usize) -> Vec<&str> {
    let width = width.max(1);
    let mut chunks = Vec::with_capacity(sequence.len() / width + 1);
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in sequence.char_indices() {
        if count == width {
            chunks.push(&sequence[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < sequence.len() {
        chunks.push(&sequence[start..]);
    }
    chunks
}

/// Writes records as FASTA.
///
/// Each header is emitted as `>` plus the header with any leading `>`
/// removed, so headers read by the parser are not doubled. Sequences are
/// wrapped at `options.line_width`; an empty sequence produces no lines.
pub fn write_fasta<W: Write>(
    writer: &mut W,
    records: &[Record],
    options: &WriteOptions,
) -> FastaResult<()> {
    for (i, record) in records.iter().enumerate() {
        let is_last_record = i + 1 == records.len();
        let lines = wrap_sequence(&record.sequence, options.line_width);

        write!(writer, "{}{}", MARKER, record.name())?;
        if !(is_last_record && lines.is_empty() && !options.final_newline) {
            writeln!(writer)?;
        }

        for (j, line) in lines.iter().enumerate() {
            let is_last_line = is_last_record && j + 1 == lines.len();
            if is_last_line && !options.final_newline {
                write!(writer, "{}", line)?;
            } else {
                writeln!(writer, "{}", line)?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes records to a FASTA file, creating or overwriting it (or appending,
/// per `options.append`).
///
/// Nothing is written if the file cannot be opened.
pub fn write_fasta_file<P: AsRef<Path>>(
    path: P,
    records: &[Record],
    options: &WriteOptions,
) -> FastaResult<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .append(options.append)
        .truncate(!options.append)
        .open(path)?;
    let mut writer = BufWriter::new(file);
    write_fasta(&mut writer, records, options)
}

/// Renders records as a FASTA string.
pub fn to_fasta_string(records: &[Record], options: &WriteOptions) -> String {
    let mut buf = Vec::new();
    // Writing to a Vec cannot fail
    let _ = write_fasta(&mut buf, records, options);
    String::from_utf8_lossy(&buf).into_owned()
}
