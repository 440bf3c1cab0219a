// Functions and definitions for AODP match output
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use crate::config::defs::{PipelineError, AODP_FIELDS, AODP_NO_MATCH};
use crate::utils::dedup::SequenceCounts;
use crate::utils::index::{OtuIndex, OtuRef};

/// A unique read matched to a reference sequence, joined with its duplicate count
/// and owning OTU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    #[serde(rename = "id")]
    pub read_id: String,
    pub sequence_id: String,
    pub identity: f64,
    pub matched_length: u64,
    pub read_length: u64,
    pub min_cluster: u64,
    pub max_cluster: u64,
    pub count: u64,
    pub otu: OtuRef,
}

/// The fields of one AODP line that survived filtering, before joining.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord<'a> {
    pub read_id: &'a str,
    pub sequence_id: &'a str,
    pub identity: f64,
    pub matched_length: u64,
    pub read_length: u64,
    pub min_cluster: u64,
    pub max_cluster: u64,
}

/// Splits and validates one line of AODP output.
///
/// Returns `Ok(None)` for lines that carry no usable match: no reference sequence
/// (`-`) or an identity reported only as a lower bound (`<`). A line with other than
/// seven fields, or fields that do not parse, is an error.
pub fn parse_match_line(line: &str) -> Result<Option<MatchRecord<'_>>, String> {
    let fields: Vec<&str> = line.trim_end().split('\t').collect();
    if fields.len() != AODP_FIELDS {
        return Err(format!("expected {} fields, found {}", AODP_FIELDS, fields.len()));
    }

    let sequence_id = fields[1];
    if sequence_id == AODP_NO_MATCH {
        return Ok(None);
    }

    let identity = fields[2];
    if identity.is_empty() {
        return Err("empty identity".to_string());
    }
    if identity.starts_with('<') {
        return Ok(None);
    }
    let identity: f64 = identity
        .trim_end_matches('%')
        .parse()
        .map_err(|e| format!("identity '{}': {}", fields[2], e))?;
    if !(0.0..=100.0).contains(&identity) {
        return Err(format!("identity {} outside 0-100", identity));
    }

    let integer = |idx: usize, name: &str| -> Result<u64, String> {
        fields[idx]
            .parse::<u64>()
            .map_err(|e| format!("{} '{}': {}", name, fields[idx], e))
    };

    Ok(Some(MatchRecord {
        read_id: fields[0],
        sequence_id,
        identity,
        matched_length: integer(3, "matched length")?,
        read_length: integer(4, "read length")?,
        min_cluster: integer(5, "min cluster")?,
        max_cluster: integer(6, "max cluster")?,
    }))
}


/// Buffered line stream over an AODP output file. Reopen the file to read it again.
pub struct MatchLines {
    path: PathBuf,
    lines: LinesStream<BufReader<File>>,
    line_number: usize,
}

impl MatchLines {
    pub async fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path).await.map_err(|e| PipelineError::io(path, e))?;
        Ok(MatchLines {
            path: path.to_path_buf(),
            lines: LinesStream::new(BufReader::new(file).lines()),
            line_number: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next raw line with its 1-based line number, or `None` at end of file.
    pub async fn next_line(&mut self) -> Result<Option<(usize, String)>, PipelineError> {
        match self.lines.next().await {
            Some(Ok(line)) => {
                self.line_number += 1;
                Ok(Some((self.line_number, line)))
            }
            Some(Err(e)) => Err(PipelineError::io(&self.path, e)),
            None => Ok(None),
        }
    }
}


/// Streams AODP output and joins every usable match with its duplicate count and OTU.
///
/// # Arguments
///
/// * `path` - AODP `--match-output` file.
/// * `sequence_counts` - Unique read id to count, from deduplication.
/// * `index` - Reference index the matcher ran against.
///
/// # Returns
/// Hits in file order. Fails on the first malformed line, on a read without a count,
/// or on a sequence the index does not know.
pub async fn parse_match_output(
    path: &Path,
    sequence_counts: &SequenceCounts,
    index: &dyn OtuIndex,
) -> Result<Vec<HitRecord>, PipelineError> {
    let mut lines = MatchLines::open(path).await?;
    let mut hits = Vec::new();
    let mut filtered = 0usize;

    while let Some((line_number, line)) = lines.next_line().await? {
        let record = parse_match_line(&line).map_err(|reason| PipelineError::MalformedLine {
            kind: "AODP",
            path: lines.path().to_path_buf(),
            line: line_number,
            reason,
        })?;

        let Some(record) = record else {
            filtered += 1;
            continue;
        };

        let count = *sequence_counts
            .get(record.read_id)
            .ok_or_else(|| PipelineError::UnknownRead {
                read_id: record.read_id.to_string(),
                line: line_number,
            })?;
        let otu = index.resolve(record.sequence_id)?;

        hits.push(HitRecord {
            read_id: record.read_id.to_string(),
            sequence_id: record.sequence_id.to_string(),
            identity: record.identity,
            matched_length: record.matched_length,
            read_length: record.read_length,
            min_cluster: record.min_cluster,
            max_cluster: record.max_cluster,
            count,
            otu,
        });
    }

    debug!("{}: {} hits, {} lines without a usable match", path.display(), hits.len(), filtered);
    Ok(hits)
}
