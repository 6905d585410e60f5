//! # seqdist - Pairwise Hamming distances for FASTA collections
//!
//! Reads multi-FASTA files, optionally aligns the sequences with an external
//! tool (Clustal Omega or MUSCLE), and computes Hamming distances between
//! one pair or all pairs of sequences.
//!
//! ## Architecture
//!
//! - `model`: Records and the distance matrix
//! - `fasta`: FASTA parsing and writing
//! - `gaps`: Gap character filtering
//! - `align`: External aligner invocation through temporary files
//! - `distance`: Pairwise and all-pairs Hamming distance
//! - `report`: Tab-separated matrix reports

pub mod align;
pub mod distance;
pub mod fasta;
pub mod gaps;
pub mod model;
pub mod report;

pub use align::{AlignError, AlignMethod, Aligner};
pub use distance::{
    all_pairs_distance, hamming_distance, pairwise_distance, DistanceError, SequencePair,
};
pub use fasta::{parse_fasta_str, read_fasta_file, write_fasta_file, WriteOptions};
pub use model::{DistanceMatrix, Record};
