use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use log::{info, warn};

use crate::config::defs::{
    PipelineError, RunConfig, Sample, AODP_BASENAME, AODP_OUTPUT, AODP_TAG, FLASH_HIST, FLASH_JOINED,
    FLASH_REMAINDER, FLASH_TAG, RESULTS_JSON, UNIQUE_READS,
};
use crate::pipelines::coordinator::{Input, Pipeline, Stage, StageContext};
use crate::utils::aodp::parse_match_output;
use crate::utils::command::{aodp, flash, run_subprocess};
use crate::utils::dedup::deduplicate_reads;
use crate::utils::fastx::sample_read_length;
use crate::utils::file::{read_pair_count, resolve_path, sample_base};
use crate::utils::flash::parse_flash_histogram;
use crate::utils::index::{OtuIndex, ReferenceIndex};
use crate::utils::results::{ResultKey, ResultValue};
use crate::utils::upload::{publish_results, JsonFileUploader, ResultUploader};


/// Joins overlapping read pairs with FLASH and records the overlap histogram and
/// joined/remainder pair counts.
pub struct JoinReads;

impl Stage for JoinReads {
    fn name(&self) -> &'static str {
        "join_reads"
    }

    fn requires(&self) -> &'static [Input] {
        &[Input::Sample, Input::WorkDir, Input::Proc, Input::JoinedPath]
    }

    fn produces(&self) -> &'static [ResultKey] {
        &[ResultKey::JoinHistogram, ResultKey::JoinedPairCount, ResultKey::RemainderPairCount]
    }

    fn run<'a>(&'a self, ctx: &'a mut StageContext) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let stage = self.name();
            let work_dir = ctx.work_dir(stage)?.to_path_buf();
            let joined_path = ctx.joined_path(stage)?.to_path_buf();

            let flash_args = flash::arg_generator(&flash::FlashConfig {
                sample: ctx.sample(stage)?,
                work_dir: &work_dir,
                proc: ctx.proc(stage)?,
            });
            let program = ctx.flash_bin.clone().unwrap_or_else(|| FLASH_TAG.to_string());
            run_subprocess(FLASH_TAG, &program, &flash_args, None).await?;

            let histogram = parse_flash_histogram(&work_dir.join(FLASH_HIST)).await?;
            let joined_pair_count = read_pair_count(&joined_path).await?;
            let remainder_pair_count = read_pair_count(&work_dir.join(FLASH_REMAINDER)).await?;
            info!(
                "Joined {} read pairs, {} left unjoined ({} histogram bins)",
                joined_pair_count,
                remainder_pair_count,
                histogram.len()
            );

            ctx.results.insert(ResultKey::JoinHistogram, ResultValue::Histogram(histogram))?;
            ctx.results.insert(ResultKey::JoinedPairCount, ResultValue::Count(joined_pair_count))?;
            ctx.results.insert(ResultKey::RemainderPairCount, ResultValue::Count(remainder_pair_count))?;
            Ok(())
        })
    }
}


/// Collapses identical joined reads and records how many reads each unique one stands for.
pub struct DeduplicateReads;

impl Stage for DeduplicateReads {
    fn name(&self) -> &'static str {
        "deduplicate_reads"
    }

    fn requires(&self) -> &'static [Input] {
        &[Input::JoinedPath, Input::UniquePath]
    }

    fn produces(&self) -> &'static [ResultKey] {
        &[ResultKey::SequenceCounts]
    }

    fn run<'a>(&'a self, ctx: &'a mut StageContext) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let stage = self.name();
            let joined_path = ctx.joined_path(stage)?.to_path_buf();
            let unique_path = ctx.unique_path(stage)?.to_path_buf();

            let counts = deduplicate_reads(joined_path, unique_path).await?;
            info!("{} unique reads", counts.len());

            ctx.results.insert(ResultKey::SequenceCounts, ResultValue::SequenceCounts(counts))?;
            Ok(())
        })
    }
}


/// Matches unique reads against the reference with AODP and records the hits,
/// joined with read counts and OTU references.
pub struct MatchReads;

impl Stage for MatchReads {
    fn name(&self) -> &'static str {
        "match_reads"
    }

    fn requires(&self) -> &'static [Input] {
        &[
            Input::Index,
            Input::Proc,
            Input::WorkDir,
            Input::UniquePath,
            Input::Result(ResultKey::SequenceCounts),
        ]
    }

    fn produces(&self) -> &'static [ResultKey] {
        &[ResultKey::Hits]
    }

    fn run<'a>(&'a self, ctx: &'a mut StageContext) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let stage = self.name();
            let index = ctx.index(stage)?;
            let work_dir = ctx.work_dir(stage)?.to_path_buf();
            let output_path = work_dir.join(AODP_OUTPUT);
            let basename = work_dir.join(AODP_BASENAME);

            let aodp_args = aodp::arg_generator(&aodp::AodpConfig {
                basename: &basename,
                proc: ctx.proc(stage)?,
                match_config: ctx.match_config,
                unique_path: ctx.unique_path(stage)?,
                output_path: &output_path,
                fasta_path: index.fasta_path(),
            });
            let program = ctx.aodp_bin.clone().unwrap_or_else(|| AODP_TAG.to_string());
            run_subprocess(AODP_TAG, &program, &aodp_args, Some(&work_dir)).await?;

            let sequence_counts = ctx.results.sequence_counts().ok_or_else(|| PipelineError::MissingInput {
                stage: stage.to_string(),
                input: ResultKey::SequenceCounts.to_string(),
            })?;
            let hits = parse_match_output(&output_path, sequence_counts, index.as_ref()).await?;
            info!("{} unique reads matched the reference", hits.len());

            ctx.results.insert(ResultKey::Hits, ResultValue::Hits(hits))?;
            Ok(())
        })
    }
}


/// The join, deduplicate, match stage list.
pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![Box::new(JoinReads), Box::new(DeduplicateReads), Box::new(MatchReads)]
}

/// Builds the stage context for a run: sample, working paths, thread count and index.
pub fn build_context(config: &RunConfig, sample: Sample, index: Arc<dyn OtuIndex>) -> StageContext {
    StageContext {
        sample: Some(sample),
        work_dir: Some(config.work_dir.clone()),
        proc: Some(config.proc),
        index: Some(index),
        joined_path: Some(config.work_dir.join(FLASH_JOINED)),
        unique_path: Some(config.work_dir.join(UNIQUE_READS)),
        match_config: config.match_config,
        flash_bin: Some(config.args.flash_bin.clone()).filter(|bin| !bin.is_empty()),
        aodp_bin: Some(config.args.aodp_bin.clone()).filter(|bin| !bin.is_empty()),
        ..Default::default()
    }
}

/// Assembles the sample from the command line, scanning R1 for a read length when
/// none was given.
pub fn discover_sample(config: &RunConfig) -> Result<Sample, PipelineError> {
    let file1 = resolve_path(&config.args.file1, &config.cwd);
    if !file1.exists() {
        return Err(PipelineError::InvalidConfig(format!("Cannot find file 1 (-i): {}", file1.display())));
    }
    let mut read_paths = vec![file1.clone()];
    if let Some(file2) = &config.args.file2 {
        let file2 = resolve_path(file2, &config.cwd);
        if !file2.exists() {
            return Err(PipelineError::InvalidConfig(format!("Cannot find file 2 (-I): {}", file2.display())));
        }
        read_paths.push(file2);
    }

    let read_length = sample_read_length(&file1, config.args.read_length)?;
    Ok(Sample {
        name: sample_base(&file1),
        read_paths,
        read_length,
    })
}


/// Runs the pipeline with an explicit uploader and publishes the results once every
/// stage has succeeded. A failed run publishes nothing.
pub async fn run_with(
    pipeline: &Pipeline,
    mut ctx: StageContext,
    uploader: &dyn ResultUploader,
) -> Result<StageContext, PipelineError> {
    pipeline.run(&mut ctx).await?;
    publish_results(&ctx.results, uploader).await?;
    Ok(ctx)
}

/// Run function for the OTU identification pipeline
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// Result<(), PipelineError>
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let sample = discover_sample(&config)?;
    info!(
        "Sample {}: {} read file(s), read length {}",
        sample.name,
        sample.read_paths.len(),
        sample.read_length
    );
    if !sample.paired() {
        warn!("Single read file given; FLASH expects paired reads");
    }

    let index_fasta: PathBuf = resolve_path(&config.args.index_fasta, &config.cwd);
    let index_map = resolve_path(&config.args.index_map, &config.cwd);
    let index = ReferenceIndex::load(index_fasta, &index_map).await?;
    if index.is_empty() {
        return Err(PipelineError::InvalidConfig(format!("{} lists no sequences", index_map.display())));
    }

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .map_err(|e| PipelineError::io(&config.work_dir, e))?;

    let ctx = build_context(&config, sample, Arc::new(index));
    let pipeline = Pipeline::new(stages());
    let uploader = JsonFileUploader::new(config.out_dir.join(RESULTS_JSON));

    let ctx = run_with(&pipeline, ctx, &uploader).await?;
    info!(
        "Finished OTU identification: {} hits from {} unique reads",
        ctx.results.hits().map_or(0, |h| h.len()),
        ctx.results.sequence_counts().map_or(0, |c| c.len())
    );
    Ok(())
}
