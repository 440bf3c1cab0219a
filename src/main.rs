use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use anyhow::Result;
use chrono::DateTime;
use env_logger::Builder;
use log::{LevelFilter, debug, info, error};

use otu_pipelines::Arguments;
use otu_pipelines::cli::parse;
use otu_pipelines::config::defs::{MatchConfig, RunConfig};
use otu_pipelines::pipelines::otu_identification;
use otu_pipelines::utils::file::{resolve_path, sample_base};
use otu_pipelines::utils::system::resolve_proc;


#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n OTU Identification\n-------------\n");

    let dir = env::current_dir()?;
    info!("The current directory is {:?}", dir);

    let proc = resolve_proc(args.threads).await;
    debug!("Using {} threads for FLASH and AODP", proc);

    let out_dir = setup_output_dir(&args, &dir)?;
    let work_dir = match &args.work_dir {
        Some(work) => resolve_path(work, &dir),
        None => out_dir.join("work"),
    };
    info!("Writing results to {:?}, scratch files to {:?}", out_dir, work_dir);

    let match_config = MatchConfig {
        oligo_size: args.oligo_size,
        max_homology: args.max_homology,
    };

    let run_config = Arc::new(RunConfig {
        cwd: dir,
        out_dir,
        work_dir,
        proc,
        match_config,
        log_level,
        args,
    });

    if let Err(e) = otu_identification::run(run_config).await {
        error!("Pipeline failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
        std::process::exit(1);
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}


/// Sets up output directory
/// If `out_dir` is specified from args, uses it;
/// otherwise, creates a directory named `<sample_base>_YYYYMMDD`.
/// Ensures the directory exists.
///
/// # Arguments
/// * `args` - The parsed command-line arguments.
/// * `cwd` - The current working directory.
/// # Returns
/// path to the output directory.
fn setup_output_dir(args: &Arguments, cwd: &Path) -> Result<PathBuf> {
    let out_dir = match &args.out_dir {
        Some(out) => resolve_path(out, cwd),
        None => {
            let dir_base = sample_base(&PathBuf::from(&args.file1));
            let dir_base = if dir_base.is_empty() {
                info!("Could not derive a sample name from file 1; using 'default_sample'.");
                "default_sample".to_string()
            } else {
                dir_base
            };

            let timestamp = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .ok()
                .and_then(|d| DateTime::from_timestamp(d.as_secs() as i64, 0))
                .map(|dt| dt.format("%Y%m%d").to_string())
                .unwrap_or_else(|| "19700101".to_string());
            cwd.join(format!("{}_{}", dir_base, timestamp))
        }
    };
    std::fs::create_dir_all(&out_dir)?;
    Ok(out_dir)
}
