use std::io::{stderr, Write};
use std::time::Instant;

use anyhow::Result;
use otu_pipelines::utils::dedup::{deduplicate_reads, unique_read_id};
use otu_pipelines::utils::sequence::write_synthetic_fastq;


#[tokio::test]
async fn test_deduplication_stress() -> Result<()> {
    let distinct = vec![10usize, 1_000, 10_000];
    let read_sizes = vec![100, 150, 300];

    let dir = tempfile::tempdir()?;
    for read_size in &read_sizes {
        for n_distinct in &distinct {
            eprintln!("Testing: distinct: {}, size: {}", n_distinct, read_size);
            stderr().flush()?;

            // Uneven duplicate counts: 1, 2, 3, 1, 2, 3, ...
            let copies: Vec<u64> = (0..*n_distinct).map(|i| (i % 3) as u64 + 1).collect();
            let total: u64 = copies.iter().sum();

            let joined = dir.path().join(format!("joined_{}_{}.fq", read_size, n_distinct));
            let unique = dir.path().join(format!("unique_{}_{}.fa", read_size, n_distinct));
            let sequences = write_synthetic_fastq(&joined, &copies, *read_size)?;

            let start = Instant::now();
            let counts = deduplicate_reads(joined, unique.clone()).await?;
            eprintln!("  {} reads in {} ms", total, start.elapsed().as_millis());

            // Random sequences of this length collide with negligible probability.
            assert_eq!(counts.len(), sequences.len());
            assert_eq!(counts.values().sum::<u64>(), total);
            for (i, expected) in copies.iter().enumerate() {
                assert_eq!(counts.get(&unique_read_id(i + 1)), Some(expected));
            }

            let fasta = std::fs::read_to_string(&unique)?;
            assert_eq!(fasta.lines().count(), 2 * sequences.len());
            assert_eq!(fasta.lines().nth(1), Some(sequences[0].as_str()));
        }
    }
    Ok(())
}
