use clap::Parser;

use crate::config::defs::{AODP_MAX_HOMOLOGY, AODP_OLIGO_SIZE, AODP_TAG, FLASH_TAG};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "otu-pipelines", version, about = "Join, deduplicate and match reads against an OTU reference index")]
pub struct Arguments {

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(short = 'i', long = "file1")]
    pub file1: String,

    #[arg(short = 'I', long = "file2")]
    pub file2: Option<String>,

    #[arg(short = 'o', long = "out", help = "Output directory for all generated files. If not specified, a directory named '<sample_base>_YYYYMMDD' will be created in the current working directory.")]
    pub out_dir: Option<String>,

    #[arg(long, help = "Scratch directory for FLASH and AODP files. Defaults to '<out>/work'.")]
    pub work_dir: Option<String>,

    #[arg(long, help = "Reference sequences the matcher aligns against")]
    pub index_fasta: String,

    #[arg(long, help = "Tab-separated sequence_id, otu_id, otu_version map for the reference")]
    pub index_map: String,

    #[arg(long, help = "Sample read length; scanned from file1 when omitted")]
    pub read_length: Option<usize>,

    #[arg(long, default_value_t = 64)]
    pub threads: usize,

    #[arg(long, default_value_t = AODP_OLIGO_SIZE)]
    pub oligo_size: usize,

    #[arg(long, default_value_t = AODP_MAX_HOMOLOGY)]
    pub max_homology: usize,

    #[arg(long, default_value = FLASH_TAG)]
    pub flash_bin: String,

    #[arg(long, default_value = AODP_TAG)]
    pub aodp_bin: String,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Arguments::try_parse_from([
            "otu-pipelines",
            "-i", "sample_R1.fq.gz",
            "--index-fasta", "ref.fa",
            "--index-map", "ref.tsv",
        ])
        .unwrap();
        assert_eq!(args.threads, 64);
        assert_eq!(args.oligo_size, 8);
        assert_eq!(args.max_homology, 0);
        assert_eq!(args.flash_bin, "flash");
        assert_eq!(args.aodp_bin, "aodp");
        assert!(args.file2.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_index_required() {
        let result = Arguments::try_parse_from(["otu-pipelines", "-i", "sample_R1.fq"]);
        assert!(result.is_err());
    }
}
