use std::io;
use std::path::PathBuf;

use log::LevelFilter;
use thiserror::Error;

use crate::cli::Arguments;

// External software
pub const FLASH_TAG: &str = "flash";
pub const AODP_TAG: &str = "aodp";

// Static Filenames
pub const FLASH_PREFIX: &str = "flash";
pub const FLASH_HIST: &str = "flash.hist";
pub const FLASH_JOINED: &str = "flash.extendedFrags.fastq";
pub const FLASH_REMAINDER: &str = "flash.notCombined_1.fastq";
pub const AODP_BASENAME: &str = "aodp";
pub const AODP_OUTPUT: &str = "aodp.out";
pub const UNIQUE_READS: &str = "unique.fa";
pub const RESULTS_JSON: &str = "results.json";

// Static Parameters
pub const AODP_OLIGO_SIZE: usize = 8;
pub const AODP_MAX_HOMOLOGY: usize = 0;
pub const AODP_NO_MATCH: &str = "-";
pub const AODP_FIELDS: usize = 7;
pub const FLASH_MAX_OVERLAP_FRACTION: f64 = 0.65;
pub const FASTQ_LINES_PER_RECORD: u64 = 4;
pub const READ_LENGTH_SCAN_RECORDS: usize = 10_000;

pub const GZIP_EXT: &str = "gz";
pub const FASTQ_EXTS: &[&'static str] = &["fastq", "fq"];


/// Parameters handed to AODP. Defaults match the values the workflow has always run with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    pub oligo_size: usize,
    pub max_homology: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            oligo_size: AODP_OLIGO_SIZE,
            max_homology: AODP_MAX_HOMOLOGY,
        }
    }
}

/// The sequenced sample the pipeline runs against.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub read_paths: Vec<PathBuf>,
    pub read_length: usize,
}

impl Sample {
    pub fn paired(&self) -> bool {
        self.read_paths.len() > 1
    }
}

pub struct RunConfig {
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
    pub work_dir: PathBuf,
    pub proc: usize,
    pub match_config: MatchConfig,
    pub log_level: LevelFilter,
    pub args: Arguments,
}


#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Stage '{stage}' requires '{input}', which is neither supplied nor produced by an earlier stage")]
    MissingInput { stage: String, input: String },

    #[error("Stage '{stage}' finished without producing '{key}'")]
    MissingOutput { stage: String, key: String },

    #[error("Result '{0}' was already recorded by an earlier stage")]
    DuplicateResult(String),

    #[error("Malformed {kind} line {line} in {}: {reason}", .path.display())]
    MalformedLine {
        kind: &'static str,
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Read '{read_id}' (line {line}) has no deduplication count; unique reads and match output are out of sync")]
    UnknownRead { read_id: String, line: usize },

    #[error("Sequence '{0}' is not present in the reference index")]
    UnknownSequence(String),

    #[error("{} has {lines} lines, not a whole number of FASTQ records", .path.display())]
    TruncatedFastq { path: PathBuf, lines: u64 },

    #[error("Invalid FASTQ: {0}")]
    InvalidFastqFormat(String),

    #[error("Tool {tool} failed: {error}")]
    ToolExecution { tool: String, error: String },

    #[error("I/O error on {}: {source}", .path.display())]
    IOError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::IOError {
            path: path.into(),
            source,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_path() {
        let error = PipelineError::io(
            "/no/such/aodp.out",
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );
        let msg = format!("{error}");
        assert!(msg.contains("/no/such/aodp.out"));
        assert!(msg.contains("missing"));
    }

    #[test]
    fn test_malformed_line_message() {
        let error = PipelineError::MalformedLine {
            kind: "AODP",
            path: PathBuf::from("aodp.out"),
            line: 3,
            reason: "expected 7 fields, found 6".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("line 3"));
        assert!(msg.contains("aodp.out"));
        assert!(msg.contains("found 6"));
    }

    #[test]
    fn test_match_config_defaults() {
        let config = MatchConfig::default();
        assert_eq!(config.oligo_size, 8);
        assert_eq!(config.max_homology, 0);
    }
}
