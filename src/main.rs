//! seqdist - Hamming distances for FASTA files
//!
//! ## Usage
//!
//! ```bash
//! seqdist matrix sequences.fasta              # align with clustalo, write matrix
//! seqdist matrix -m muscle sequences.fasta    # align with muscle
//! seqdist matrix --no-align aligned.fasta     # sequences already aligned
//! seqdist pair sequences.fasta seq1 seq2      # one pair
//! seqdist align sequences.fasta -o out.fasta  # alignment only
//! ```
//!
//! Set `RUST_LOG=info` (or `debug`) for progress output.

// Use jemalloc for better memory management (returns memory to OS)
#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;

use seqdist::align::{AlignMethod, Aligner};
use seqdist::distance::{pairwise_distance, SequencePair};
use seqdist::fasta::{read_fasta_file, write_fasta, write_fasta_file, WriteOptions};
use seqdist::gaps::DEFAULT_GAP_CHARS;
use seqdist::model::Record;
use seqdist::report::{matrix_to_tsv, multiple_hamming};

/// Alignment tool selection for command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MethodArg {
    /// Clustal Omega
    Clustalo,
    /// MUSCLE
    Muscle,
}

impl From<MethodArg> for AlignMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Clustalo => AlignMethod::ClustalOmega,
            MethodArg::Muscle => AlignMethod::Muscle,
        }
    }
}

/// Alignment settings shared by all subcommands
#[derive(Args, Debug)]
struct AlignArgs {
    /// Alignment tool
    #[arg(short = 'm', long = "method", value_enum, default_value = "clustalo")]
    method: MethodArg,

    /// Sequences are already aligned; do not run any tool
    #[arg(long = "no-align")]
    no_align: bool,

    /// Path to the alignment executable (default: looked up on PATH)
    #[arg(short = 'p', long = "program")]
    program: Option<PathBuf>,

    /// Kill the alignment tool after this many seconds
    #[arg(short = 't', long = "timeout")]
    timeout: Option<u64>,

    /// Directory for temporary alignment files
    #[arg(long = "temp-dir")]
    temp_dir: Option<PathBuf>,

    /// Characters stripped from sequences before alignment
    #[arg(short = 'g', long = "gap-chars", default_value = DEFAULT_GAP_CHARS)]
    gap_chars: String,
}

impl AlignArgs {
    /// Builds the configured aligner, or `None` with `--no-align`.
    fn aligner(&self) -> Result<Option<Aligner>> {
        if self.no_align {
            return Ok(None);
        }
        let mut aligner = Aligner::new(self.method.into()).with_gap_chars(self.gap_chars.clone());
        if let Some(program) = &self.program {
            aligner = aligner.with_program(program);
        }
        if let Some(secs) = self.timeout {
            aligner = aligner.with_timeout(Duration::from_secs(secs));
        }
        if let Some(dir) = &self.temp_dir {
            aligner = aligner.with_temp_dir(dir);
        }
        Ok(Some(aligner))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the all-pairs distance matrix and write <prefix>_multipleHamming.txt
    Matrix {
        /// Multi-FASTA input file
        file: PathBuf,

        /// Also print the matrix to stdout
        #[arg(long = "print")]
        print: bool,

        #[command(flatten)]
        align: AlignArgs,
    },

    /// Compute the distance between two records of a file
    Pair {
        /// Multi-FASTA input file
        file: PathBuf,

        /// Name of the first record (header without '>')
        first: String,

        /// Name of the second record (header without '>')
        second: String,

        #[command(flatten)]
        align: AlignArgs,
    },

    /// Align a file and write the aligned sequences as FASTA
    Align {
        /// Multi-FASTA input file
        file: PathBuf,

        /// Output file. Use "-" for stdout.
        #[arg(short = 'o', long = "output", default_value = "-")]
        output: String,

        #[command(flatten)]
        align: AlignArgs,
    },
}

/// seqdist - Hamming distances between FASTA sequences
///
/// Sequences are aligned with an external tool (clustalo or muscle) before
/// comparison unless --no-align is given.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Reads a FASTA file, failing if it holds no records.
fn read_records(file: &Path) -> Result<Vec<Record>> {
    let records =
        read_fasta_file(file).with_context(|| format!("Cannot read {}", file.display()))?;
    if records.is_empty() {
        anyhow::bail!("No FASTA records found in {}", file.display());
    }
    Ok(records)
}

fn find_record<'a>(records: &'a [Record], name: &str) -> Result<&'a Record> {
    records
        .iter()
        .find(|r| r.name() == name)
        .ok_or_else(|| anyhow::anyhow!("No record named '{}'", name))
}

fn run_matrix(file: &Path, print: bool, align: &AlignArgs) -> Result<()> {
    let aligner = align.aligner()?;
    let (path, matrix) = multiple_hamming(file, aligner.as_ref())?;

    if print {
        print!("{}", matrix_to_tsv(&matrix));
    }
    let undefined = matrix.mismatch_count();
    if undefined > 0 {
        eprintln!("{} cells left undefined (sequence lengths differ)", undefined);
    }
    eprintln!("Wrote {}x{} matrix to {}", matrix.size(), matrix.size(), path.display());
    Ok(())
}

fn run_pair(file: &Path, first: &str, second: &str, align: &AlignArgs) -> Result<()> {
    let aligner = align.aligner()?;
    let records = read_records(file)?;
    let a = find_record(&records, first)?;
    let b = find_record(&records, second)?;

    let distance = pairwise_distance(SequencePair::Records(a, b), aligner.as_ref())?;
    println!("{}\t{}\t{}", a.name(), b.name(), distance);
    Ok(())
}

fn run_align(file: &Path, output: &str, align: &AlignArgs) -> Result<()> {
    let Some(aligner) = align.aligner()? else {
        anyhow::bail!("The align command needs an alignment tool (drop --no-align)");
    };
    let records = read_records(file)?;
    let aligned = aligner.align(&records)?;

    if output == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        write_fasta(&mut handle, &aligned, &WriteOptions::default())?;
        handle.flush()?;
    } else {
        write_fasta_file(output, &aligned, &WriteOptions::default())?;
        eprintln!("Wrote {} aligned sequences to {}", aligned.len(), output);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    info!("Starting log");

    let cli = Cli::parse();

    match &cli.command {
        Command::Matrix { file, print, align } => run_matrix(file, *print, align),
        Command::Pair {
            file,
            first,
            second,
            align,
        } => run_pair(file, first, second, align),
        Command::Align { file, output, align } => run_align(file, output, align),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn align_args(argv: &[&str]) -> AlignArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Matrix { align, .. } => align,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_method_defaults_to_clustalo() {
        let args = align_args(&["seqdist", "matrix", "in.fasta"]);
        assert_eq!(args.method, MethodArg::Clustalo);
        let aligner = args.aligner().unwrap().unwrap();
        assert_eq!(aligner.method(), AlignMethod::ClustalOmega);
    }

    #[test]
    fn test_method_muscle() {
        let args = align_args(&["seqdist", "matrix", "-m", "muscle", "in.fasta"]);
        let aligner = args.aligner().unwrap().unwrap();
        assert_eq!(aligner.method(), AlignMethod::Muscle);
    }

    #[test]
    fn test_unknown_method_rejected_by_parser() {
        let result = Cli::try_parse_from(["seqdist", "matrix", "-m", "mafft", "in.fasta"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_align_has_no_aligner() {
        let args = align_args(&["seqdist", "matrix", "--no-align", "in.fasta"]);
        assert!(args.aligner().unwrap().is_none());
    }
}
