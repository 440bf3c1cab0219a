// Collapsing of identical joined reads into unique sequences.
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use fxhash::FxHashMap;
use log::debug;
use seq_io::fastq::Record;
use tempfile::NamedTempFile;
use tokio::task;

use crate::config::defs::PipelineError;
use crate::utils::fastx::{fastq_reader, write_fasta_record};

pub type SequenceCounts = FxHashMap<String, u64>;

/// Identifier given to the `n`th distinct sequence (1-based).
pub fn unique_read_id(n: usize) -> String {
    format!("read_{}", n)
}


/// Collapses identical reads in `joined_path` into a FASTA of unique sequences at
/// `unique_path`.
///
/// Ids are assigned in order of first appearance. The FASTA is written to a temporary
/// file beside the destination and only moved into place once complete.
///
/// # Arguments
///
/// * `joined_path` - FASTQ (plain or gzipped) of joined reads.
/// * `unique_path` - Destination FASTA.
///
/// # Returns
/// Map of unique read id to the number of input reads it stands for.
pub fn run_deduplication(joined_path: &Path, unique_path: &Path) -> Result<SequenceCounts, PipelineError> {
    let dest_dir = match unique_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let tmp = NamedTempFile::new_in(&dest_dir).map_err(|e| PipelineError::io(&dest_dir, e))?;
    let mut writer = BufWriter::new(tmp);

    let mut reader = fastq_reader(joined_path)?;
    let mut first_seen: FxHashMap<Vec<u8>, usize> = FxHashMap::default();
    let mut counts: Vec<u64> = Vec::new();

    while let Some(record) = reader.next() {
        let record = record.map_err(|e| {
            PipelineError::InvalidFastqFormat(format!("{}: {}", joined_path.display(), e))
        })?;
        let seq = record.seq();
        match first_seen.get(seq) {
            Some(&idx) => counts[idx] += 1,
            None => {
                let idx = counts.len();
                write_fasta_record(&mut writer, &unique_read_id(idx + 1), seq)
                    .map_err(|e| PipelineError::io(unique_path, e))?;
                first_seen.insert(seq.to_vec(), idx);
                counts.push(1);
            }
        }
    }

    writer.flush().map_err(|e| PipelineError::io(unique_path, e))?;
    let tmp = writer
        .into_inner()
        .map_err(|e| PipelineError::io(unique_path, e.into_error()))?;
    tmp.persist(unique_path)
        .map_err(|e| PipelineError::io(unique_path, e.error))?;

    debug!("Collapsed {} reads into {} unique sequences", counts.iter().sum::<u64>(), counts.len());

    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(idx, count)| (unique_read_id(idx + 1), count))
        .collect())
}


/// Runs [`run_deduplication`] on tokio's blocking pool and waits for it.
pub async fn deduplicate_reads(joined_path: PathBuf, unique_path: PathBuf) -> Result<SequenceCounts, PipelineError> {
    task::spawn_blocking(move || run_deduplication(&joined_path, &unique_path))
        .await
        .map_err(|e| PipelineError::Other(anyhow::Error::new(e).context("deduplication worker failed")))?
}
