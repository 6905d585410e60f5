//! Data model for sequence collections and distance results.
//!
//! This module contains the data structures shared by every stage:
//! - `Record`: one FASTA entry (header, sequence, caller metadata)
//! - record collections, which are plain ordered `Vec<Record>`s
//! - `DistanceMatrix`: the all-pairs result, indexed in collection order

use std::ops::Index;

use crate::gaps::ungap;

/// The record-start marker of a FASTA header line.
pub const MARKER: char = '>';

/// Represents a single FASTA entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    /// The full header line as read, including the leading '>'
    pub header: String,
    /// The concatenated sequence, without line terminators
    pub sequence: String,
    /// Free slot for caller metadata; never read by this crate
    pub aux: Option<String>,
}

impl Record {
    /// Creates a new record. The header is stored verbatim.
    pub fn new(header: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            sequence: sequence.into(),
            aux: None,
        }
    }

    /// Returns the header without its leading marker(s).
    pub fn name(&self) -> &str {
        self.header.trim_start_matches(MARKER)
    }

    /// Returns the length of the sequence, in characters.
    pub fn len(&self) -> usize {
        self.sequence.chars().count()
    }

    /// Returns true if the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Removes every character of `chars` from the sequence, in place.
    pub fn ungap(&mut self, chars: &str) {
        self.sequence = ungap(&self.sequence, chars);
    }
}

/// Returns true if all records share the same sequence length.
///
/// An empty collection counts as aligned.
pub fn is_aligned(records: &[Record]) -> bool {
    match records.first() {
        Some(first) => records.iter().all(|r| r.len() == first.len()),
        None => true,
    }
}

/// Square table of pairwise distances.
///
/// Cell `(i, j)` holds the distance between records `i` and `j`, or `None`
/// when their sequences had different lengths after alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceMatrix {
    labels: Vec<String>,
    cells: Vec<Option<usize>>,
}

impl DistanceMatrix {
    /// Creates a matrix of the given labels with every cell set to `None`.
    pub fn new(labels: Vec<String>) -> Self {
        let n = labels.len();
        Self {
            labels,
            cells: vec![None; n * n],
        }
    }

    /// Number of rows (and columns).
    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Row/column labels, in collection order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Gets a cell, or `None` if out of bounds or undefined.
    pub fn get(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.size() || col >= self.size() {
            return None;
        }
        self.cells[row * self.size() + col]
    }

    /// Sets a cell. Panics if out of bounds.
    pub fn set(&mut self, row: usize, col: usize, value: Option<usize>) {
        let n = self.size();
        assert!(row < n && col < n, "cell ({row}, {col}) outside {n}x{n} matrix");
        self.cells[row * n + col] = value;
    }

    /// Returns one full row.
    pub fn row(&self, row: usize) -> &[Option<usize>] {
        let n = self.size();
        &self.cells[row * n..(row + 1) * n]
    }

    /// Iterates over `(label, row)` pairs.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[Option<usize>])> {
        self.labels
            .iter()
            .enumerate()
            .map(move |(i, label)| (label.as_str(), self.row(i)))
    }

    /// Number of cells left undefined by a length mismatch.
    pub fn mismatch_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }
}

impl Index<(usize, usize)> for DistanceMatrix {
    type Output = Option<usize>;

    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        &self.cells[row * self.size() + col]
    }
}
