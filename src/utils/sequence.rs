use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use rand::rngs::ThreadRng;
use rand::seq::IndexedRandom;
use rand::rng;
use rand_distr::{Distribution, Normal};

use crate::utils::fastx::write_fastq_record;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DNA {
    A,
    C,
    G,
    T,
}

impl DNA {
    /// Convert nucleotide to its character representation.
    pub fn to_char(&self) -> char {
        match self {
            DNA::A => 'A',
            DNA::C => 'C',
            DNA::G => 'G',
            DNA::T => 'T',
        }
    }

    /// Get all possible nucleotides as a static slice.
    pub fn all() -> &'static [DNA] {
        &[DNA::A, DNA::C, DNA::G, DNA::T]
    }

    /// Generate a random sequence of nucleotides of the given length.
    pub fn random_sequence(length: usize) -> String {
        let mut rng = rng();
        (0..length)
            .map(|_| DNA::random_with_rng(&mut rng).to_char())
            .collect()
    }

    fn random_with_rng(rng: &mut ThreadRng) -> DNA {
        *DNA::all()
            .choose(rng)
            .unwrap_or(&DNA::A)
    }
}

fn phred33(score: u8) -> u8 {
    score + 33
}

fn normal_phred_qual(normal: &Normal<f32>, rng: &mut ThreadRng) -> u8 {
    let mut raw_phred = -1.0;
    while !(0.0..=40.0).contains(&raw_phred) {
        raw_phred = normal.sample(rng);
    }
    phred33(raw_phred as u8)
}

/// Phred+33 quality string drawn from a normal distribution clamped to 0..=40.
pub fn normal_phred_qual_string(length: usize, mean: f32, stdev: f32) -> String {
    let normal = match Normal::new(mean, stdev) {
        Ok(normal) => normal,
        Err(_) => return String::from_utf8(vec![phred33(mean.clamp(0.0, 40.0) as u8); length]).unwrap_or_default(),
    };
    let mut rng = rng();
    (0..length)
        .map(|_| normal_phred_qual(&normal, &mut rng) as char)
        .collect()
}


/// Writes a synthetic FASTQ in which each of `distinct` random sequences appears
/// `copies[i]` times, interleaved round-robin so duplicates are not adjacent.
///
/// # Arguments
///
/// * `path` - Output FASTQ.
/// * `copies` - Occurrences per distinct sequence.
/// * `read_len` - Length of every read.
///
/// # Returns
/// The distinct sequences, in order of first appearance.
pub fn write_synthetic_fastq(path: &Path, copies: &[u64], read_len: usize) -> io::Result<Vec<String>> {
    let mut writer = BufWriter::new(File::create(path)?);
    let sequences: Vec<String> = copies.iter().map(|_| DNA::random_sequence(read_len)).collect();

    let mut remaining = copies.to_vec();
    let mut read_number = 0usize;
    while remaining.iter().any(|&r| r > 0) {
        for (seq, left) in sequences.iter().zip(remaining.iter_mut()) {
            if *left == 0 {
                continue;
            }
            *left -= 1;
            read_number += 1;
            let qual = normal_phred_qual_string(read_len, 35.0, 3.0);
            write_fastq_record(&mut writer, &format!("synthetic_{}", read_number), seq.as_bytes(), qual.as_bytes())?;
        }
    }
    writer.flush()?;
    Ok(sequences)
}
