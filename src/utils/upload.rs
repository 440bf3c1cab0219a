// Handing finished results to whatever stores them.
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use log::info;

use crate::config::defs::PipelineError;
use crate::utils::results::ResultsAccumulator;

/// Destination for a completed run's results.
pub trait ResultUploader: Send + Sync {
    fn upload<'a>(&'a self, results: &'a ResultsAccumulator) -> BoxFuture<'a, Result<(), PipelineError>>;
}


/// Writes results as pretty-printed JSON to a single file.
#[derive(Debug, Clone)]
pub struct JsonFileUploader {
    path: PathBuf,
}

impl JsonFileUploader {
    pub fn new(path: PathBuf) -> Self {
        JsonFileUploader { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultUploader for JsonFileUploader {
    fn upload<'a>(&'a self, results: &'a ResultsAccumulator) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let json = serde_json::to_vec_pretty(results)
                .map_err(|e| PipelineError::Upload(format!("could not serialize results: {}", e)))?;
            tokio::fs::write(&self.path, json)
                .await
                .map_err(|e| PipelineError::io(&self.path, e))?;
            info!("Results written to {}", self.path.display());
            Ok(())
        })
    }
}


/// Hands the complete accumulator to `uploader`, unchanged. Called once, after the
/// last stage has returned successfully.
pub async fn publish_results(
    results: &ResultsAccumulator,
    uploader: &dyn ResultUploader,
) -> Result<(), PipelineError> {
    info!("Publishing {} result keys", results.len());
    uploader.upload(results).await
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::results::{ResultKey, ResultValue};
    use std::sync::Mutex;

    struct RecordingUploader {
        seen: Mutex<Vec<ResultsAccumulator>>,
    }

    impl ResultUploader for RecordingUploader {
        fn upload<'a>(&'a self, results: &'a ResultsAccumulator) -> BoxFuture<'a, Result<(), PipelineError>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(results.clone());
                Ok(())
            })
        }
    }

    struct FailingUploader;

    impl ResultUploader for FailingUploader {
        fn upload<'a>(&'a self, _results: &'a ResultsAccumulator) -> BoxFuture<'a, Result<(), PipelineError>> {
            Box::pin(async { Err(PipelineError::Upload("store unavailable".to_string())) })
        }
    }

    fn results() -> ResultsAccumulator {
        let mut results = ResultsAccumulator::new();
        results.insert(ResultKey::JoinedPairCount, ResultValue::Count(12)).unwrap();
        results
    }

    #[tokio::test]
    async fn test_publish_passes_results_through() -> anyhow::Result<()> {
        let uploader = RecordingUploader { seen: Mutex::new(Vec::new()) };
        let results = results();
        publish_results(&results, &uploader).await?;
        let seen = uploader.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], results);
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_failure_surfaces() {
        let result = publish_results(&results(), &FailingUploader).await;
        assert!(matches!(result, Err(PipelineError::Upload(_))));
    }

    #[tokio::test]
    async fn test_json_file_uploader() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let uploader = JsonFileUploader::new(dir.path().join("results.json"));
        publish_results(&results(), &uploader).await?;

        let written: serde_json::Value = serde_json::from_slice(&std::fs::read(uploader.path())?)?;
        assert_eq!(written["joined_pair_count"], 12);
        Ok(())
    }

    #[tokio::test]
    async fn test_json_file_uploader_bad_path() {
        let uploader = JsonFileUploader::new(PathBuf::from("/no/such/dir/results.json"));
        assert!(matches!(
            publish_results(&results(), &uploader).await,
            Err(PipelineError::IOError { .. })
        ));
    }
}
