use std::io::{self, Write};
use std::path::Path;

use seq_io::fastq::{Reader as FastqReader, Record};

use crate::config::defs::{PipelineError, READ_LENGTH_SCAN_RECORDS};
use crate::utils::file::{open_reader, FileReader};


/// Opens a FASTQ file (plain or gzipped) with seq_io.
pub fn fastq_reader(path: &Path) -> Result<FastqReader<FileReader>, PipelineError> {
    let reader = open_reader(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(FastqReader::new(reader))
}


/// Longest read among the first `max_records` records of a FASTQ.
///
/// # Arguments
///
/// * `path` - FASTQ to scan.
/// * `max_records` - Stop after this many records.
///
/// # Returns
/// Maximum sequence length seen.
pub fn max_read_length(path: &Path, max_records: usize) -> Result<usize, PipelineError> {
    let mut reader = fastq_reader(path)?;
    let mut max_len = 0;
    let mut seen = 0;
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| PipelineError::InvalidFastqFormat(format!("{}: {}", path.display(), e)))?;
        max_len = max_len.max(record.seq().len());
        seen += 1;
        if seen >= max_records {
            break;
        }
    }
    if seen == 0 {
        return Err(PipelineError::InvalidFastqFormat(format!("{} contains no reads", path.display())));
    }
    Ok(max_len)
}

/// Read length for a sample: the CLI value if given, otherwise scanned from R1.
pub fn sample_read_length(file1: &Path, given: Option<usize>) -> Result<usize, PipelineError> {
    match given {
        Some(0) => Err(PipelineError::InvalidConfig("read length must be positive".to_string())),
        Some(len) => Ok(len),
        None => max_read_length(file1, READ_LENGTH_SCAN_RECORDS),
    }
}


pub fn write_fasta_record<W: Write>(
    writer: &mut W,
    id: &str,
    seq: &[u8],
) -> io::Result<()> {
    writer.write_all(b">")?;
    writer.write_all(id.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.write_all(seq)?;
    writer.write_all(b"\n")?;
    Ok(())
}

pub fn write_fastq_record<W: Write>(
    writer: &mut W,
    id: &str,
    seq: &[u8],
    qual: &[u8],
) -> io::Result<()> {
    writer.write_all(b"@")?;
    writer.write_all(id.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.write_all(seq)?;
    writer.write_all(b"\n+\n")?;
    writer.write_all(qual)?;
    writer.write_all(b"\n")?;
    Ok(())
}
