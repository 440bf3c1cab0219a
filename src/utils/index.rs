// Reference index lookups: which OTU, at which version, owns a reference sequence.
use std::path::{Path, PathBuf};

use fxhash::FxHashMap;
use log::info;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::defs::PipelineError;

/// OTU a hit resolves to, at the version recorded for the matched sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtuRef {
    pub id: String,
    pub version: u32,
}

/// Read-only view of a reference index for the length of one run.
pub trait OtuIndex: Send + Sync {
    /// Reference sequences handed to the matcher.
    fn fasta_path(&self) -> &Path;

    fn otu_id(&self, sequence_id: &str) -> Option<&str>;

    fn otu_version(&self, sequence_id: &str) -> Option<u32>;

    fn resolve(&self, sequence_id: &str) -> Result<OtuRef, PipelineError> {
        match (self.otu_id(sequence_id), self.otu_version(sequence_id)) {
            (Some(id), Some(version)) => Ok(OtuRef {
                id: id.to_string(),
                version,
            }),
            _ => Err(PipelineError::UnknownSequence(sequence_id.to_string())),
        }
    }
}


/// Index backed by the reference FASTA and a tab-separated
/// `sequence_id  otu_id  otu_version` map.
#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    fasta_path: PathBuf,
    sequence_otu_map: FxHashMap<String, OtuRef>,
}

impl ReferenceIndex {
    pub fn new(fasta_path: PathBuf, sequence_otu_map: FxHashMap<String, OtuRef>) -> Self {
        ReferenceIndex {
            fasta_path,
            sequence_otu_map,
        }
    }

    /// Loads the sequence-to-OTU map. Lines beginning with `#` are comments.
    pub async fn load(fasta_path: PathBuf, map_path: &Path) -> Result<Self, PipelineError> {
        if !fasta_path.exists() {
            return Err(PipelineError::InvalidConfig(format!(
                "Reference FASTA {} does not exist",
                fasta_path.display()
            )));
        }

        let file = File::open(map_path).await.map_err(|e| PipelineError::io(map_path, e))?;
        let mut reader = BufReader::new(file).lines();

        let mut sequence_otu_map = FxHashMap::default();
        let mut line_number = 0;
        while let Some(line) = reader.next_line().await.map_err(|e| PipelineError::io(map_path, e))? {
            line_number += 1;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = |reason: String| PipelineError::MalformedLine {
                kind: "index map",
                path: map_path.to_path_buf(),
                line: line_number,
                reason,
            };
            let parts: Vec<&str> = line.trim_end().split('\t').collect();
            if parts.len() != 3 {
                return Err(malformed(format!("expected 3 fields, found {}", parts.len())));
            }
            let version: u32 = parts[2]
                .parse()
                .map_err(|e| malformed(format!("OTU version '{}': {}", parts[2], e)))?;
            let otu = OtuRef {
                id: parts[1].to_string(),
                version,
            };
            if sequence_otu_map.insert(parts[0].to_string(), otu).is_some() {
                return Err(malformed(format!("sequence '{}' listed twice", parts[0])));
            }
        }
        info!("Loaded {} reference sequences from {}", sequence_otu_map.len(), map_path.display());

        Ok(ReferenceIndex::new(fasta_path, sequence_otu_map))
    }

    pub fn len(&self) -> usize {
        self.sequence_otu_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence_otu_map.is_empty()
    }
}

impl OtuIndex for ReferenceIndex {
    fn fasta_path(&self) -> &Path {
        &self.fasta_path
    }

    fn otu_id(&self, sequence_id: &str) -> Option<&str> {
        self.sequence_otu_map.get(sequence_id).map(|otu| otu.id.as_str())
    }

    fn otu_version(&self, sequence_id: &str) -> Option<u32> {
        self.sequence_otu_map.get(sequence_id).map(|otu| otu.version)
    }
}
