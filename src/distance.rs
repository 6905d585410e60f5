//! Hamming distances between sequences.
//!
//! Two entry points:
//! - `pairwise_distance`: one pair, optionally aligned first
//! - `all_pairs_distance`: a full matrix, aligning the whole collection once
//!
//! Characters are compared one by one, case-sensitively. Sequences of
//! different lengths (in characters) have no distance; this is reported,
//! never fatal.

use std::borrow::Cow;

use log::{debug, warn};
use thiserror::Error;

use crate::align::{AlignError, Aligner};
use crate::model::{is_aligned, DistanceMatrix, Record};

/// Errors that can occur when computing a pairwise distance.
#[derive(Error, Debug)]
pub enum DistanceError {
    #[error("Sequence lengths differ: {left} ({left_len}) <-> {right} ({right_len})")]
    LengthMismatch {
        left: String,
        right: String,
        left_len: usize,
        right_len: usize,
    },

    #[error("Alignment failed: {0}")]
    AlignError(#[from] AlignError),
}

/// Result type for distance operations.
pub type DistanceResult<T> = Result<T, DistanceError>;

/// Label given to the first sequence of a raw pair.
pub const RAW_LABEL_1: &str = "SEQUENCE 1";
/// Label given to the second sequence of a raw pair.
pub const RAW_LABEL_2: &str = "SEQUENCE 2";

/// The two inputs of a pairwise comparison.
#[derive(Debug, Clone, Copy)]
pub enum SequencePair<'a> {
    /// Bare sequences, labelled `SEQUENCE 1` and `SEQUENCE 2`
    Raw(&'a str, &'a str),
    /// Records, labelled by name
    Records(&'a Record, &'a Record),
}

impl<'a> SequencePair<'a> {
    /// Labels used in reports and errors.
    pub fn labels(&self) -> (&'a str, &'a str) {
        match *self {
            SequencePair::Raw(_, _) => (RAW_LABEL_1, RAW_LABEL_2),
            SequencePair::Records(a, b) => (a.name(), b.name()),
        }
    }

    /// The two sequences.
    pub fn sequences(&self) -> (&'a str, &'a str) {
        match *self {
            SequencePair::Raw(a, b) => (a, b),
            SequencePair::Records(a, b) => (a.sequence.as_str(), b.sequence.as_str()),
        }
    }

    fn to_records(self) -> [Record; 2] {
        match self {
            SequencePair::Raw(a, b) => [
                Record::new(format!(">{}", RAW_LABEL_1), a),
                Record::new(format!(">{}", RAW_LABEL_2), b),
            ],
            SequencePair::Records(a, b) => [a.clone(), b.clone()],
        }
    }
}

/// Counts the positions at which `a` and `b` differ.
///
/// Returns `None` if the lengths differ.
pub fn hamming_distance(a: &str, b: &str) -> Option<usize> {
    let mut a_chars = a.chars();
    let mut b_chars = b.chars();
    let mut distance = 0;
    loop {
        match (a_chars.next(), b_chars.next()) {
            (Some(x), Some(y)) => {
                if x != y {
                    distance += 1;
                }
            }
            (None, None) => return Some(distance),
            _ => return None,
        }
    }
}

/// Computes the Hamming distance of one pair.
///
/// With `aligner` set, the pair is aligned first (gaps stripped, then
/// realigned); pass `None` for sequences that are already aligned.
pub fn pairwise_distance(
    pair: SequencePair<'_>,
    aligner: Option<&Aligner>,
) -> DistanceResult<usize> {
    let (left, right) = pair.labels();

    let distance = match aligner {
        Some(aligner) => {
            let aligned = aligner.align(&pair.to_records())?;
            let [a, b] = aligned.as_slice() else {
                return Err(AlignError::RecordCountMismatch {
                    tool: aligner.method(),
                    expected: 2,
                    found: aligned.len(),
                }
                .into());
            };
            hamming_distance(&a.sequence, &b.sequence)
                .ok_or_else(|| mismatch(left, right, a.len(), b.len()))
        }
        None => {
            let (a, b) = pair.sequences();
            hamming_distance(a, b)
                .ok_or_else(|| mismatch(left, right, a.chars().count(), b.chars().count()))
        }
    };

    if let Err(e) = &distance {
        warn!("{}", e);
    }
    distance
}

fn mismatch(left: &str, right: &str, left_len: usize, right_len: usize) -> DistanceError {
    DistanceError::LengthMismatch {
        left: left.to_string(),
        right: right.to_string(),
        left_len,
        right_len,
    }
}

/// Computes the distance between every pair of records.
///
/// With `aligner` set, the whole collection is aligned once up front. Rows
/// and columns follow collection order and are labelled by record name. A
/// pair whose lengths differ leaves its cell `None`; the rest of the matrix
/// is still computed. Only alignment failures abort.
pub fn all_pairs_distance(
    records: &[Record],
    aligner: Option<&Aligner>,
) -> Result<DistanceMatrix, AlignError> {
    let aligned: Cow<'_, [Record]> = match aligner {
        Some(aligner) => Cow::Owned(aligner.align(records)?),
        None => {
            if !is_aligned(records) {
                warn!(
                    "Sequences differ in length and no aligner is set; \
                     some cells will be undefined"
                );
            }
            Cow::Borrowed(records)
        }
    };

    let labels = aligned.iter().map(|r| r.name().to_string()).collect();
    let mut matrix = DistanceMatrix::new(labels);

    // Distance is symmetric: compute the upper triangle and mirror it
    for (i, a) in aligned.iter().enumerate() {
        for (j, b) in aligned.iter().enumerate().skip(i) {
            let cell = hamming_distance(&a.sequence, &b.sequence);
            if cell.is_none() {
                warn!(
                    "Sequence lengths differ: {} ({}) <-> {} ({})",
                    a.name(),
                    a.len(),
                    b.name(),
                    b.len()
                );
            }
            matrix.set(i, j, cell);
            matrix.set(j, i, cell);
        }
    }

    debug!(
        "Computed {}x{} distance matrix ({} undefined cells)",
        matrix.size(),
        matrix.size(),
        matrix.mismatch_count()
    );
    Ok(matrix)
}
