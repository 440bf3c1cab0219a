// Functions and structs for building and running external tool command lines
use std::path::Path;
use std::process::Stdio;

use log::{debug, info};
use tokio::process::Command;

use crate::config::defs::PipelineError;


pub mod flash {
    use std::path::PathBuf;

    use crate::config::defs::{Sample, FLASH_PREFIX};
    use crate::utils::flash::max_overlap;

    pub struct FlashConfig<'a> {
        pub sample: &'a Sample,
        pub work_dir: &'a PathBuf,
        pub proc: usize,
    }

    pub fn arg_generator(config: &FlashConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("--max-overlap".to_string());
        args_vec.push(max_overlap(config.sample.read_length).to_string());
        args_vec.push("-d".to_string());
        args_vec.push(config.work_dir.to_string_lossy().to_string());
        args_vec.push("-o".to_string());
        args_vec.push(FLASH_PREFIX.to_string());
        args_vec.push("-t".to_string());
        // One core is left for the pipeline itself
        args_vec.push(config.proc.saturating_sub(1).max(1).to_string());
        for path in &config.sample.read_paths {
            args_vec.push(path.to_string_lossy().to_string());
        }
        args_vec
    }
}

pub mod aodp {
    use std::path::Path;

    use crate::config::defs::MatchConfig;

    pub struct AodpConfig<'a> {
        pub basename: &'a Path,
        pub proc: usize,
        pub match_config: MatchConfig,
        pub unique_path: &'a Path,
        pub output_path: &'a Path,
        pub fasta_path: &'a Path,
    }

    pub fn arg_generator(config: &AodpConfig) -> Vec<String> {
        vec![
            format!("--basename={}", config.basename.display()),
            format!("--threads={}", config.proc.max(1)),
            format!("--oligo-size={}", config.match_config.oligo_size),
            format!("--match={}", config.unique_path.display()),
            format!("--match-output={}", config.output_path.display()),
            format!("--max-homolo={}", config.match_config.max_homology),
            config.fasta_path.to_string_lossy().to_string(),
        ]
    }
}


/// Runs an external tool to completion.
///
/// # Arguments
///
/// * `tool` - Tool tag, used in errors and logs.
/// * `program` - Executable to spawn.
/// * `args` - Command line arguments.
/// * `cwd` - Optional working directory.
///
/// # Returns
/// Captured stdout. A spawn failure or non-zero exit is a `ToolExecution` error carrying stderr.
pub async fn run_subprocess(
    tool: &str,
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
) -> Result<Vec<u8>, PipelineError> {
    info!("Running {}", tool);
    debug!("{} {}", program, args.join(" "));

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command.output().await.map_err(|e| PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: format!("Failed to spawn {}: {}. Is {} installed?", program, e, tool),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::ToolExecution {
            tool: tool.to_string(),
            error: format!("exited with {}: {}", output.status, stderr.trim()),
        });
    }
    debug!("{} finished", tool);
    Ok(output.stdout)
}
