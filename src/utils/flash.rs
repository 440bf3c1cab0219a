// Functions for the FLASH read joiner's output files
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::defs::{PipelineError, FLASH_MAX_OVERLAP_FRACTION};

/// One row of `flash.hist`: how many read pairs joined with a given overlap length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBin(pub u64, pub u64);

impl HistogramBin {
    pub fn overlap_length(&self) -> u64 {
        self.0
    }

    pub fn pair_count(&self) -> u64 {
        self.1
    }
}

/// `--max-overlap` for FLASH: 65% of the sample read length, ties rounded to even.
pub fn max_overlap(read_length: usize) -> u64 {
    (FLASH_MAX_OVERLAP_FRACTION * read_length as f64).round_ties_even() as u64
}

fn parse_histogram_line(line: &str) -> Result<HistogramBin, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 2 {
        return Err(format!("expected 2 columns, found {}", fields.len()));
    }
    let length = fields[0]
        .parse::<u64>()
        .map_err(|e| format!("overlap length '{}': {}", fields[0], e))?;
    let count = fields[1]
        .parse::<u64>()
        .map_err(|e| format!("pair count '{}': {}", fields[1], e))?;
    Ok(HistogramBin(length, count))
}


/// Parses the overlap-length histogram FLASH writes next to its joined reads.
///
/// Every line must hold exactly two integer columns; anything else is an error,
/// never skipped.
///
/// # Arguments
///
/// * `path` - `flash.hist`.
///
/// # Returns
/// Bins in file order.
pub async fn parse_flash_histogram(path: &Path) -> Result<Vec<HistogramBin>, PipelineError> {
    let file = File::open(path).await.map_err(|e| PipelineError::io(path, e))?;
    let mut lines = BufReader::new(file).lines();

    let mut histogram = Vec::new();
    let mut line_number = 0;
    while let Some(line) = lines.next_line().await.map_err(|e| PipelineError::io(path, e))? {
        line_number += 1;
        let bin = parse_histogram_line(&line).map_err(|reason| PipelineError::MalformedLine {
            kind: "FLASH histogram",
            path: path.to_path_buf(),
            line: line_number,
            reason,
        })?;
        histogram.push(bin);
    }
    Ok(histogram)
}
