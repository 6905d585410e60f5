//! External multiple-sequence alignment.
//!
//! Alignment is delegated to a command-line tool. The records are written to a
//! temporary FASTA file, the tool is run with that file as input and a second
//! temporary file as output, and the output is parsed back. Both temporary
//! files carry a random per-call token and are removed when the call returns,
//! whether it succeeded or not.
//!
//! Supported tools:
//! - `clustalo`: `clustalo -i IN -o OUT --force`
//! - `muscle`:   `muscle -in IN -out OUT -quiet -stable`

use std::ffi::OsString;
use std::fmt;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

use crate::fasta::{read_fasta_file, write_fasta, FastaError, WriteOptions};
use crate::gaps::DEFAULT_GAP_CHARS;
use crate::model::Record;

/// How often a running tool is polled when a timeout is set.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors that can occur during alignment.
#[derive(Error, Debug)]
pub enum AlignError {
    #[error("Unsupported alignment method '{0}' (expected one of: clustalo, muscle)")]
    UnsupportedMethod(String),

    #[error("Failed to run {tool}: {source}")]
    Launch {
        tool: AlignMethod,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed with {}", describe_status(.status))]
    ToolFailed { tool: AlignMethod, status: Option<i32> },

    #[error("{tool} did not finish within {timeout:?}")]
    TimedOut { tool: AlignMethod, timeout: Duration },

    #[error("{tool} returned {found} records for {expected} input sequences")]
    RecordCountMismatch {
        tool: AlignMethod,
        expected: usize,
        found: usize,
    },

    #[error("Temporary file error: {0}")]
    IoError(#[from] io::Error),

    #[error("{0}")]
    FastaError(#[from] FastaError),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {}", code),
        None => String::from("no exit status (killed by signal)"),
    }
}

/// Result type for alignment operations.
pub type AlignResult<T> = Result<T, AlignError>;

/// The supported alignment tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignMethod {
    /// Clustal Omega
    ClustalOmega,
    /// MUSCLE, in stable (input) order
    Muscle,
}

impl AlignMethod {
    /// Every supported method.
    pub const ALL: [AlignMethod; 2] = [AlignMethod::ClustalOmega, AlignMethod::Muscle];

    /// The name used to select this method.
    pub fn name(&self) -> &'static str {
        match self {
            AlignMethod::ClustalOmega => "clustalo",
            AlignMethod::Muscle => "muscle",
        }
    }

    /// Executable looked up on `PATH` when no program is configured.
    pub fn default_program(&self) -> &'static str {
        self.name()
    }

    /// Command-line arguments for aligning `input` into `output`.
    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let (in_flag, out_flag, extra): (&str, &str, &[&str]) = match self {
            AlignMethod::ClustalOmega => ("-i", "-o", &["--force"]),
            AlignMethod::Muscle => ("-in", "-out", &["-quiet", "-stable"]),
        };
        let mut args: Vec<OsString> = vec![
            in_flag.into(),
            input.as_os_str().to_owned(),
            out_flag.into(),
            output.as_os_str().to_owned(),
        ];
        args.extend(extra.iter().map(OsString::from));
        args
    }
}

impl fmt::Display for AlignMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for AlignMethod {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlignMethod::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| AlignError::UnsupportedMethod(s.to_string()))
    }
}

/// A configured external aligner.
#[derive(Debug, Clone)]
pub struct Aligner {
    method: AlignMethod,
    program: Option<PathBuf>,
    timeout: Option<Duration>,
    temp_dir: Option<PathBuf>,
    gap_chars: String,
}

impl Aligner {
    /// Creates an aligner running the method's default program with no timeout.
    pub fn new(method: AlignMethod) -> Self {
        Self {
            method,
            program: None,
            timeout: None,
            temp_dir: None,
            gap_chars: DEFAULT_GAP_CHARS.to_string(),
        }
    }

    /// Creates an aligner from a method name.
    ///
    /// Fails with `AlignError::UnsupportedMethod` for unknown names; nothing
    /// is written or run in that case.
    pub fn from_name(name: &str) -> AlignResult<Self> {
        Ok(Self::new(name.parse()?))
    }

    /// Runs `program` instead of the default executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Kills the tool if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Creates temporary files in `dir` instead of the system temp dir.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Characters stripped from sequences before alignment.
    pub fn with_gap_chars(mut self, chars: impl Into<String>) -> Self {
        self.gap_chars = chars.into();
        self
    }

    pub fn method(&self) -> AlignMethod {
        self.method
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn program(&self) -> PathBuf {
        self.program
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.method.default_program()))
    }

    /// Aligns `records`, returning new records of equal length in input order.
    ///
    /// Gap characters are stripped first. Collections of fewer than two
    /// records are returned stripped, without running the tool.
    pub fn align(&self, records: &[Record]) -> AlignResult<Vec<Record>> {
        let stripped: Vec<Record> = records
            .iter()
            .cloned()
            .map(|mut r| {
                r.ungap(&self.gap_chars);
                r
            })
            .collect();

        if stripped.len() < 2 {
            debug!("Nothing to align ({} record(s))", stripped.len());
            return Ok(stripped);
        }

        let token: u32 = rand::random();
        let prefix = format!("seqdist-{:08x}-", token);
        let dir = self.temp_dir.clone().unwrap_or_else(std::env::temp_dir);

        // Both files are deleted on drop, including on every early return below
        let mut input = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".in.fa")
            .tempfile_in(&dir)?;
        let output = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".out.fa")
            .tempfile_in(&dir)?;
        debug!(
            "Alignment files: {} -> {}",
            input.path().display(),
            output.path().display()
        );

        {
            let mut writer = BufWriter::new(input.as_file_mut());
            write_fasta(&mut writer, &stripped, &WriteOptions::default())?;
        }

        info!("Aligning {} sequences with {}", stripped.len(), self.method);
        let started = Instant::now();
        self.run_tool(input.path(), output.path())?;
        debug!("{} finished in {:?}", self.method, started.elapsed());

        let aligned = read_fasta_file(output.path())?;
        if aligned.len() != stripped.len() {
            return Err(AlignError::RecordCountMismatch {
                tool: self.method,
                expected: stripped.len(),
                found: aligned.len(),
            });
        }

        Ok(restore_order(records, aligned))
    }

    fn run_tool(&self, input: &Path, output: &Path) -> AlignResult<()> {
        let mut command = Command::new(self.program());
        command
            .args(self.method.args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        debug!("Running {:?}", command);

        let mut child = command.spawn().map_err(|source| AlignError::Launch {
            tool: self.method,
            source,
        })?;

        let status = match self.timeout {
            None => child.wait()?,
            Some(timeout) => match wait_with_timeout(&mut child, timeout)? {
                Some(status) => status,
                None => {
                    warn!("{} killed after {:?}", self.method, timeout);
                    return Err(AlignError::TimedOut {
                        tool: self.method,
                        timeout,
                    });
                }
            },
        };

        if !status.success() {
            return Err(AlignError::ToolFailed {
                tool: self.method,
                status: status.code(),
            });
        }
        Ok(())
    }
}

/// Waits for `child`, killing it once `timeout` has elapsed.
///
/// Returns `None` if the child was killed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            // The child may exit between try_wait and kill
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
    }
}

/// Puts aligned records back in the order of `original`, matching by name.
///
/// Caller metadata is carried over. If the names cannot all be matched, the
/// tool's order is kept.
fn restore_order(original: &[Record], aligned: Vec<Record>) -> Vec<Record> {
    let mut used = vec![false; aligned.len()];
    let mut order = Vec::with_capacity(original.len());

    for record in original {
        let found = (0..aligned.len()).find(|&i| !used[i] && aligned[i].name() == record.name());
        match found {
            Some(idx) => {
                used[idx] = true;
                order.push(idx);
            }
            None => {
                warn!(
                    "Aligned output has no record named '{}'; keeping tool order",
                    record.name()
                );
                return aligned;
            }
        }
    }

    let mut slots: Vec<Option<Record>> = aligned.into_iter().map(Some).collect();
    order
        .into_iter()
        .zip(original)
        .filter_map(|(idx, record)| {
            let mut aligned = slots[idx].take()?;
            aligned.aux = record.aux.clone();
            Some(aligned)
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_method_from_name() {
        assert_eq!("clustalo".parse::<AlignMethod>().unwrap(), AlignMethod::ClustalOmega);
        assert_eq!("muscle".parse::<AlignMethod>().unwrap(), AlignMethod::Muscle);
        assert!(matches!(
            "mafft".parse::<AlignMethod>(),
            Err(AlignError::UnsupportedMethod(name)) if name == "mafft"
        ));
    }

    #[test]
    fn test_unsupported_method_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let result = Aligner::from_name("biopython").map(|a| a.with_temp_dir(dir.path()));
        assert!(matches!(result, Err(AlignError::UnsupportedMethod(_))));
        assert_eq!(entries(dir.path()), 0);
    }

    #[test]
    fn test_command_shapes() {
        let input = Path::new("in.fa");
        let output = Path::new("out.fa");

        let clustalo: Vec<OsString> = AlignMethod::ClustalOmega.args(input, output);
        assert_eq!(clustalo, ["-i", "in.fa", "-o", "out.fa", "--force"].map(OsString::from));

        let muscle: Vec<OsString> = AlignMethod::Muscle.args(input, output);
        assert_eq!(
            muscle,
            ["-in", "in.fa", "-out", "out.fa", "-quiet", "-stable"].map(OsString::from)
        );
    }

    #[test]
    fn test_single_record_skips_tool() {
        // The program does not exist; it must not be launched
        let aligner = Aligner::new(AlignMethod::Muscle).with_program("/nonexistent/muscle");
        let aligned = aligner.align(&[Record::new(">a", "AC-GT")]).unwrap();
        assert_eq!(aligned, vec![Record::new(">a", "ACGT")]);
        assert!(aligner.align(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let aligner = Aligner::new(AlignMethod::ClustalOmega)
            .with_program(dir.path().join("no-such-tool"))
            .with_temp_dir(dir.path());
        let records = vec![Record::new(">a", "ACGT"), Record::new(">b", "ACGA")];

        let result = aligner.align(&records);
        assert!(matches!(result, Err(AlignError::Launch { .. })));
        assert_eq!(entries(dir.path()), 0);
    }

    #[test]
    fn test_restore_order_by_name() {
        let mut original = vec![Record::new(">a", "AC"), Record::new(">b", "GT")];
        original[1].aux = Some(String::from("meta"));
        let aligned = vec![Record::new(">b", "G-T"), Record::new(">a", "A-C")];

        let ordered = restore_order(&original, aligned);
        assert_eq!(ordered[0].sequence, "A-C");
        assert_eq!(ordered[1].sequence, "G-T");
        assert_eq!(ordered[1].aux.as_deref(), Some("meta"));
    }

    #[test]
    fn test_restore_order_unknown_name_keeps_tool_order() {
        let original = vec![Record::new(">a", "AC"), Record::new(">b", "GT")];
        let aligned = vec![Record::new(">a", "AC"), Record::new(">renamed", "GT")];

        let ordered = restore_order(&original, aligned.clone());
        assert_eq!(ordered, aligned);
    }

    #[cfg(unix)]
    mod with_tools {
        use super::*;
        use crate::align::fake_tool;

        #[test]
        fn test_align_strips_gaps_and_cleans_up() {
            let tools = tempfile::tempdir().unwrap();
            let work = tempfile::tempdir().unwrap();
            let aligner = Aligner::new(AlignMethod::ClustalOmega)
                .with_program(fake_tool::copying(tools.path()))
                .with_temp_dir(work.path());
            let records = vec![Record::new(">s1", "AC-GT"), Record::new(">s2", "A-CGA")];

            let aligned = aligner.align(&records).unwrap();
            assert_eq!(aligned, vec![Record::new(">s1", "ACGT"), Record::new(">s2", "ACGA")]);
            // Input is left untouched
            assert_eq!(records[0].sequence, "AC-GT");
            assert_eq!(entries(work.path()), 0);
        }

        #[test]
        fn test_align_custom_gap_chars() {
            let tools = tempfile::tempdir().unwrap();
            let aligner = Aligner::new(AlignMethod::Muscle)
                .with_program(fake_tool::copying(tools.path()))
                .with_gap_chars("-N");
            let records = vec![Record::new(">s1", "ANC-G"), Record::new(">s2", "TTT")];

            let aligned = aligner.align(&records).unwrap();
            assert_eq!(aligned[0].sequence, "ACG");
        }

        #[test]
        fn test_align_restores_input_order() {
            let tools = tempfile::tempdir().unwrap();
            let aligner = Aligner::new(AlignMethod::ClustalOmega)
                .with_program(fake_tool::reversing(tools.path()));
            let records = vec![
                Record::new(">x", "AAAA"),
                Record::new(">y", "CCCC"),
                Record::new(">z", "GGGG"),
            ];

            let aligned = aligner.align(&records).unwrap();
            let names: Vec<&str> = aligned.iter().map(|r| r.name()).collect();
            assert_eq!(names, vec!["x", "y", "z"]);
        }

        #[test]
        fn test_tool_failure_reports_status_and_cleans_up() {
            let tools = tempfile::tempdir().unwrap();
            let work = tempfile::tempdir().unwrap();
            let aligner = Aligner::new(AlignMethod::ClustalOmega)
                .with_program(fake_tool::failing(tools.path(), 3))
                .with_temp_dir(work.path());
            let records = vec![Record::new(">a", "ACGT"), Record::new(">b", "ACG")];

            let result = aligner.align(&records);
            assert!(matches!(
                result,
                Err(AlignError::ToolFailed { tool: AlignMethod::ClustalOmega, status: Some(3) })
            ));
            assert_eq!(entries(work.path()), 0);

            // A second run starts from a clean directory too
            assert!(aligner.align(&records).is_err());
            assert_eq!(entries(work.path()), 0);
        }

        #[test]
        fn test_timeout_kills_tool() {
            let tools = tempfile::tempdir().unwrap();
            let work = tempfile::tempdir().unwrap();
            let aligner = Aligner::new(AlignMethod::Muscle)
                .with_program(fake_tool::hanging(tools.path()))
                .with_temp_dir(work.path())
                .with_timeout(Duration::from_millis(200));
            let records = vec![Record::new(">a", "ACGT"), Record::new(">b", "ACGA")];

            let started = Instant::now();
            let result = aligner.align(&records);
            assert!(matches!(result, Err(AlignError::TimedOut { .. })));
            assert!(started.elapsed() < Duration::from_secs(10));
            assert_eq!(entries(work.path()), 0);
        }

        #[test]
        fn test_empty_output_is_count_mismatch() {
            let tools = tempfile::tempdir().unwrap();
            let aligner = Aligner::new(AlignMethod::ClustalOmega)
                .with_program(fake_tool::script(tools.path(), "fake-empty", "exit 0"));
            let records = vec![Record::new(">a", "ACGT"), Record::new(">b", "ACGA")];

            let result = aligner.align(&records);
            assert!(matches!(
                result,
                Err(AlignError::RecordCountMismatch { expected: 2, found: 0, .. })
            ));
        }
    }
}
