use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tokio::io::AsyncReadExt;

use crate::config::defs::{PipelineError, FASTQ_EXTS, FASTQ_LINES_PER_RECORD, GZIP_EXT};

/// Enum to hold either an uncompressed or gzipped file reader
pub enum FileReader {
    Uncompressed(BufReader<File>),
    Gzipped(GzDecoder<File>),
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileReader::Uncompressed(r) => r.read(buf),
            FileReader::Gzipped(r) => r.read(buf),
        }
    }
}

pub fn is_gzipped(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 2];
    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1F, 0x8B]), // Gzip magic bytes
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Opens a file for reading, transparently decompressing gzip.
pub fn open_reader(path: &Path) -> io::Result<FileReader> {
    let gzipped = is_gzipped(path)?;
    let file = File::open(path)?;
    if gzipped {
        Ok(FileReader::Gzipped(GzDecoder::new(file)))
    } else {
        Ok(FileReader::Uncompressed(BufReader::new(file)))
    }
}


/// Counts the lines in a file. A final line without a trailing newline still counts.
///
/// # Arguments
///
/// * `path` - File to count.
///
/// # Returns
/// Number of lines.
pub async fn file_length(path: &Path) -> Result<u64, PipelineError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;

    let mut buffer = vec![0u8; 64 * 1024];
    let mut lines = 0u64;
    let mut last = b'\n';
    loop {
        let n = file
            .read(&mut buffer)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        if n == 0 {
            break;
        }
        lines += buffer[..n].iter().filter(|&&b| b == b'\n').count() as u64;
        last = buffer[n - 1];
    }
    if last != b'\n' {
        lines += 1;
    }
    Ok(lines)
}


/// Number of FASTQ records (read pairs for one side of a pair) from the line count.
/// Fails when the line count is not a multiple of four, which means a truncated file.
pub async fn read_pair_count(path: &Path) -> Result<u64, PipelineError> {
    let lines = file_length(path).await?;
    if lines % FASTQ_LINES_PER_RECORD != 0 {
        return Err(PipelineError::TruncatedFastq {
            path: path.to_path_buf(),
            lines,
        });
    }
    Ok(lines / FASTQ_LINES_PER_RECORD)
}


/// Strips gzip and FASTQ extensions plus a trailing R1 tag from a read file name.
/// `sample_S1_R1.fastq.gz` becomes `sample_S1`.
pub fn sample_base(path: &Path) -> String {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    for ext in std::iter::once(GZIP_EXT).chain(FASTQ_EXTS.iter().copied()) {
        let suffix = format!(".{}", ext);
        if name.len() > suffix.len() && name.to_ascii_lowercase().ends_with(&suffix) {
            name.truncate(name.len() - suffix.len());
        }
    }

    for tag in ["_R1", "_r1", "_1", ".R1", ".1"] {
        if let Some(stripped) = name.strip_suffix(tag) {
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }
    name
}

/// Resolves `path` against `base` unless already absolute.
pub fn resolve_path(path: &str, base: &Path) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_file_length() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(tmp, "a\nb\nc\n")?;
        tmp.flush()?;
        assert_eq!(file_length(tmp.path()).await?, 3);

        let mut tmp = NamedTempFile::new()?;
        write!(tmp, "a\nb\nc")?;
        tmp.flush()?;
        assert_eq!(file_length(tmp.path()).await?, 3);

        let tmp = NamedTempFile::new()?;
        assert_eq!(file_length(tmp.path()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_read_pair_count() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(tmp, "@r1\nACGT\n+\nIIII\n@r2\nACGA\n+\nIIII\n")?;
        tmp.flush()?;
        assert_eq!(read_pair_count(tmp.path()).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_read_pair_count_truncated() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(tmp, "@r1\nACGT\n+\nIIII\n@r2\nACGA\n")?;
        tmp.flush()?;
        match read_pair_count(tmp.path()).await {
            Err(PipelineError::TruncatedFastq { lines, .. }) => assert_eq!(lines, 6),
            other => panic!("expected TruncatedFastq, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_file_length_missing() {
        let result = file_length(Path::new("/definitely/not/here.fastq")).await;
        assert!(matches!(result, Err(PipelineError::IOError { .. })));
    }

    #[test]
    fn test_sample_base() {
        assert_eq!(sample_base(Path::new("/data/sample_S1_R1.fastq.gz")), "sample_S1");
        assert_eq!(sample_base(Path::new("reads_1.fq")), "reads");
        assert_eq!(sample_base(Path::new("single.fastq")), "single");
        assert_eq!(sample_base(Path::new("R1.fastq")), "R1");
    }

    #[test]
    fn test_is_gzipped() -> io::Result<()> {
        let mut plain = NamedTempFile::new()?;
        write!(plain, "@r1\nACGT\n+\nIIII\n")?;
        plain.flush()?;
        assert!(!is_gzipped(plain.path())?);

        let mut gz = NamedTempFile::new()?;
        {
            let mut encoder = flate2::write::GzEncoder::new(gz.as_file_mut(), flate2::Compression::default());
            encoder.write_all(b"@r1\nACGT\n+\nIIII\n")?;
            encoder.finish()?;
        }
        assert!(is_gzipped(gz.path())?);
        Ok(())
    }
}
