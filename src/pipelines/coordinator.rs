// Sequencing of pipeline stages over a shared context.
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use log::{debug, info};

use crate::config::defs::{MatchConfig, PipelineError, Sample};
use crate::utils::index::OtuIndex;
use crate::utils::results::{ResultKey, ResultsAccumulator};

/// Something a stage needs before it can run: either a field supplied when the
/// context is built, or a result an earlier stage records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Input {
    Sample,
    WorkDir,
    Proc,
    Index,
    JoinedPath,
    UniquePath,
    Result(ResultKey),
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Sample => f.write_str("sample"),
            Input::WorkDir => f.write_str("work_dir"),
            Input::Proc => f.write_str("proc"),
            Input::Index => f.write_str("index"),
            Input::JoinedPath => f.write_str("joined_path"),
            Input::UniquePath => f.write_str("unique_path"),
            Input::Result(key) => write!(f, "{}", key),
        }
    }
}


/// Everything a stage can read, plus the results accumulator it writes to.
///
/// The coordinator owns the context and lends it to one stage at a time.
#[derive(Default)]
pub struct StageContext {
    pub sample: Option<Sample>,
    pub work_dir: Option<PathBuf>,
    pub proc: Option<usize>,
    pub index: Option<Arc<dyn OtuIndex>>,
    pub joined_path: Option<PathBuf>,
    pub unique_path: Option<PathBuf>,
    pub match_config: MatchConfig,
    pub flash_bin: Option<String>,
    pub aodp_bin: Option<String>,
    pub results: ResultsAccumulator,
}

impl StageContext {
    /// Whether `input` is available right now.
    pub fn has(&self, input: Input) -> bool {
        match input {
            Input::Sample => self.sample.is_some(),
            Input::WorkDir => self.work_dir.is_some(),
            Input::Proc => self.proc.is_some(),
            Input::Index => self.index.is_some(),
            Input::JoinedPath => self.joined_path.is_some(),
            Input::UniquePath => self.unique_path.is_some(),
            Input::Result(key) => self.results.contains(key),
        }
    }

    fn missing(stage: &str, input: Input) -> PipelineError {
        PipelineError::MissingInput {
            stage: stage.to_string(),
            input: input.to_string(),
        }
    }

    pub fn sample(&self, stage: &str) -> Result<&Sample, PipelineError> {
        self.sample.as_ref().ok_or_else(|| Self::missing(stage, Input::Sample))
    }

    pub fn work_dir(&self, stage: &str) -> Result<&Path, PipelineError> {
        self.work_dir.as_deref().ok_or_else(|| Self::missing(stage, Input::WorkDir))
    }

    pub fn proc(&self, stage: &str) -> Result<usize, PipelineError> {
        self.proc.ok_or_else(|| Self::missing(stage, Input::Proc))
    }

    pub fn index(&self, stage: &str) -> Result<Arc<dyn OtuIndex>, PipelineError> {
        self.index.clone().ok_or_else(|| Self::missing(stage, Input::Index))
    }

    pub fn joined_path(&self, stage: &str) -> Result<&Path, PipelineError> {
        self.joined_path.as_deref().ok_or_else(|| Self::missing(stage, Input::JoinedPath))
    }

    pub fn unique_path(&self, stage: &str) -> Result<&Path, PipelineError> {
        self.unique_path.as_deref().ok_or_else(|| Self::missing(stage, Input::UniquePath))
    }
}


/// One step of a pipeline.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inputs that must be available when the stage starts.
    fn requires(&self) -> &'static [Input];

    /// Result keys the stage records.
    fn produces(&self) -> &'static [ResultKey];

    fn run<'a>(&'a self, ctx: &'a mut StageContext) -> BoxFuture<'a, Result<(), PipelineError>>;
}


/// An ordered list of stages run one after another.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Pipeline { stages }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Checks every stage's requirements against what the context supplies and what
    /// earlier stages declare, before anything runs.
    pub fn validate(&self, ctx: &StageContext) -> Result<(), PipelineError> {
        let mut produced: BTreeSet<ResultKey> = BTreeSet::new();
        for stage in &self.stages {
            for &input in stage.requires() {
                let available = match input {
                    Input::Result(key) => produced.contains(&key) || ctx.has(input),
                    _ => ctx.has(input),
                };
                if !available {
                    return Err(StageContext::missing(stage.name(), input));
                }
            }
            produced.extend(stage.produces().iter().copied());
        }
        Ok(())
    }

    /// Validates, then runs each stage in order. The first failure stops the run.
    pub async fn run(&self, ctx: &mut StageContext) -> Result<(), PipelineError> {
        self.validate(ctx)?;

        let run_start = Instant::now();
        for stage in &self.stages {
            let stage_start = Instant::now();
            info!("Stage {} started", stage.name());
            stage.run(ctx).await?;

            for &key in stage.produces() {
                if !ctx.results.contains(key) {
                    return Err(PipelineError::MissingOutput {
                        stage: stage.name().to_string(),
                        key: key.to_string(),
                    });
                }
            }
            info!("Stage {} finished in {} ms", stage.name(), stage_start.elapsed().as_millis());
        }
        debug!("All {} stages finished in {} ms", self.stages.len(), run_start.elapsed().as_millis());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::results::ResultValue;
    use std::sync::Mutex;

    struct TestStage {
        name: &'static str,
        requires: &'static [Input],
        produces: &'static [ResultKey],
        fail: bool,
        skip_output: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl TestStage {
        fn new(name: &'static str, requires: &'static [Input], produces: &'static [ResultKey], log: &Arc<Mutex<Vec<&'static str>>>) -> Self {
            TestStage { name, requires, produces, fail: false, skip_output: false, log: log.clone() }
        }
    }

    impl Stage for TestStage {
        fn name(&self) -> &'static str {
            self.name
        }

        fn requires(&self) -> &'static [Input] {
            self.requires
        }

        fn produces(&self) -> &'static [ResultKey] {
            self.produces
        }

        fn run<'a>(&'a self, ctx: &'a mut StageContext) -> BoxFuture<'a, Result<(), PipelineError>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(self.name);
                if self.fail {
                    return Err(PipelineError::ToolExecution { tool: self.name.to_string(), error: "boom".to_string() });
                }
                if !self.skip_output {
                    for &key in self.produces {
                        ctx.results.insert(key, ResultValue::Count(1))?;
                    }
                }
                Ok(())
            })
        }
    }

    const JOIN_OUT: &[ResultKey] = &[ResultKey::JoinedPairCount];
    const DEDUP_IN: &[Input] = &[Input::Result(ResultKey::JoinedPairCount)];
    const DEDUP_OUT: &[ResultKey] = &[ResultKey::RemainderPairCount];
    const MATCH_IN: &[Input] = &[Input::WorkDir, Input::Result(ResultKey::RemainderPairCount)];

    fn ctx() -> StageContext {
        StageContext {
            work_dir: Some(PathBuf::from("/work")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_order() -> anyhow::Result<()> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            Box::new(TestStage::new("join", &[], JOIN_OUT, &log)),
            Box::new(TestStage::new("deduplicate", DEDUP_IN, DEDUP_OUT, &log)),
            Box::new(TestStage::new("match", MATCH_IN, &[], &log)),
        ]);
        let mut ctx = ctx();
        pipeline.run(&mut ctx).await?;

        assert_eq!(*log.lock().unwrap(), vec!["join", "deduplicate", "match"]);
        assert_eq!(pipeline.stage_names(), vec!["join", "deduplicate", "match"]);
        assert_eq!(ctx.results.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_input_fails_before_any_stage() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            Box::new(TestStage::new("join", &[], JOIN_OUT, &log)),
            Box::new(TestStage::new("match", &[Input::Index], &[], &log)),
        ]);
        let mut ctx = ctx();
        match pipeline.run(&mut ctx).await {
            Err(PipelineError::MissingInput { stage, input }) => {
                assert_eq!(stage, "match");
                assert_eq!(input, "index");
            }
            other => panic!("expected MissingInput, got {:?}", other),
        }
        assert!(log.lock().unwrap().is_empty());
        assert!(ctx.results.is_empty());
    }

    #[tokio::test]
    async fn test_result_required_before_it_is_produced() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            Box::new(TestStage::new("deduplicate", DEDUP_IN, DEDUP_OUT, &log)),
            Box::new(TestStage::new("join", &[], JOIN_OUT, &log)),
        ]);
        let result = pipeline.validate(&ctx());
        assert!(matches!(result, Err(PipelineError::MissingInput { .. })));
    }

    #[tokio::test]
    async fn test_prepopulated_result_satisfies_requirement() -> anyhow::Result<()> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![Box::new(TestStage::new("deduplicate", DEDUP_IN, DEDUP_OUT, &log))]);
        let mut ctx = ctx();
        ctx.results.insert(ResultKey::JoinedPairCount, ResultValue::Count(3))?;
        pipeline.run(&mut ctx).await?;
        assert_eq!(ctx.results.count(ResultKey::JoinedPairCount), Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_failure_stops_downstream_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = TestStage::new("deduplicate", DEDUP_IN, DEDUP_OUT, &log);
        failing.fail = true;
        let pipeline = Pipeline::new(vec![
            Box::new(TestStage::new("join", &[], JOIN_OUT, &log)),
            Box::new(failing),
            Box::new(TestStage::new("match", MATCH_IN, &[], &log)),
        ]);
        let mut ctx = ctx();
        let result = pipeline.run(&mut ctx).await;
        assert!(matches!(result, Err(PipelineError::ToolExecution { .. })));
        assert_eq!(*log.lock().unwrap(), vec!["join", "deduplicate"]);
        assert!(ctx.results.contains(ResultKey::JoinedPairCount));
    }

    #[tokio::test]
    async fn test_declared_output_must_be_written() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut lazy = TestStage::new("join", &[], JOIN_OUT, &log);
        lazy.skip_output = true;
        let pipeline = Pipeline::new(vec![
            Box::new(lazy),
            Box::new(TestStage::new("deduplicate", DEDUP_IN, DEDUP_OUT, &log)),
        ]);
        let result = pipeline.run(&mut ctx()).await;
        assert!(matches!(result, Err(PipelineError::MissingOutput { .. })));
        assert_eq!(*log.lock().unwrap(), vec!["join"]);
    }

    #[test]
    fn test_context_accessors() {
        let ctx = ctx();
        assert_eq!(ctx.work_dir("match").unwrap(), Path::new("/work"));
        assert!(matches!(ctx.proc("match"), Err(PipelineError::MissingInput { .. })));
        assert!(ctx.has(Input::WorkDir));
        assert!(!ctx.has(Input::Result(ResultKey::Hits)));
    }
}
