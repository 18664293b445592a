use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::cache::CompletionCache;
use crate::config::RunConfig;
use crate::error::{PicscribeError, ScanError};
use crate::pipeline::progress::{ConsoleProgress, ProgressReporter};
use crate::pipeline::Pipeline;
use crate::processor::Collaborators;
use crate::report::ErrorLog;
use crate::termination::TerminationController;
use crate::worker::counter::Counter;
use crate::worker::job::{ProcessingResult, SkipReason, TaskResult};
use crate::worker::{DirectoryScanner, WorkerPool};

/// Outcome counts of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Subset of `skipped` that never ran because of an interrupt.
    pub cancelled: usize,
    pub elapsed: Duration,
    pub error_log: PathBuf,
    pub error_entries: usize,
}

impl RunSummary {
    pub fn from_results(results: &[TaskResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match &result.outcome {
                ProcessingResult::Succeeded { .. } => summary.succeeded += 1,
                ProcessingResult::Skipped(reason) => {
                    summary.skipped += 1;
                    if *reason == SkipReason::Cancelled {
                        summary.cancelled += 1;
                    }
                }
                ProcessingResult::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub fn was_interrupted(&self) -> bool {
        self.cancelled > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} images: {} described, {} skipped, {} failed in {:.1?}",
            self.total, self.succeeded, self.skipped, self.failed, self.elapsed
        )
    }
}

/// Wires scanner, cache, pipeline and pool together for one invocation.
pub struct Orchestrator {
    config: RunConfig,
    collaborators: Collaborators,
    termination: Arc<TerminationController>,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl Orchestrator {
    pub fn new(config: RunConfig, collaborators: Collaborators) -> Self {
        let termination = Arc::new(TerminationController::new(
            &config.scratch_dir,
            config.grace_period,
        ));
        Self {
            config,
            collaborators,
            termination,
            progress: None,
        }
    }

    /// Replaces the console reporter. The error log is then left to the
    /// given reporter.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn termination(&self) -> Arc<TerminationController> {
        Arc::clone(&self.termination)
    }

    /// Runs every startup check, then processes the directory. Returns
    /// `Err` only for fatal-startup problems; per-image failures end up in
    /// the summary and the error log.
    pub fn run(&self) -> Result<RunSummary, PicscribeError> {
        let start = Instant::now();
        let config = Arc::new(self.prepare_config()?);

        let cache = Arc::new(
            CompletionCache::open(&config.cache_dir)?.with_model(config.model.clone()),
        );

        self.collaborators.model.ensure_ready()?;

        let tasks = DirectoryScanner::new(&config.root, config.recursive).scan()?;
        info!(
            "Processing {} images with {} workers",
            tasks.len(),
            config.workers
        );

        let error_log = Arc::new(ErrorLog::new(&config.error_log));
        let progress = match &self.progress {
            Some(progress) => Arc::clone(progress),
            None => Arc::new(ConsoleProgress::new(Arc::clone(&error_log))),
        };

        let cancel = self.termination.token();
        let counter = Arc::new(Counter::new());
        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&config),
            self.collaborators.clone(),
            Arc::clone(&cache),
            Arc::clone(&counter),
            cancel.clone(),
        ));

        let pool = WorkerPool::new(pipeline, config.workers, cancel, progress);
        let results = pool.run(tasks);

        match Arc::try_unwrap(cache) {
            Ok(cache) => {
                if let Err(e) = cache.close() {
                    warn!("Failed to close completion cache: {}", e);
                }
            }
            Err(_) => warn!("Completion cache still shared at shutdown"),
        }
        self.termination.cleanup();

        let mut summary = RunSummary::from_results(&results);
        summary.elapsed = start.elapsed();
        summary.error_log = config.error_log.clone();
        summary.error_entries = error_log.entries();

        info!("{}", summary);
        debug_assert_eq!(counter.value() as usize, summary.succeeded);
        if summary.error_entries > 0 {
            info!(
                "{} problem(s) written to {}",
                summary.error_entries,
                summary.error_log.display()
            );
        }

        Ok(summary)
    }

    /// Resolves the root so cache keys do not depend on how the directory
    /// was spelled on the command line.
    fn prepare_config(&self) -> Result<RunConfig, PicscribeError> {
        let mut config = self.config.clone();

        if !config.root.exists() {
            return Err(ScanError::RootMissing(config.root).into());
        }
        config.root = config
            .root
            .canonicalize()
            .map_err(|source| PicscribeError::Io {
                path: config.root.clone(),
                source,
            })?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::pipeline::error::Stage;
    use crate::processor::{DescriptionModel, ImageConverter, MetadataStore, TextExtractor};
    use std::path::Path;

    struct Fail;

    impl ImageConverter for Fail {
        fn convert(&self, _source: &Path) -> Result<PathBuf, ProcessError> {
            Err(ProcessError::ImageProcessing("unreadable".to_string()))
        }
    }

    impl TextExtractor for Fail {
        fn extract(&self, _image: &Path, _timeout: Duration) -> Result<String, ProcessError> {
            Ok(String::new())
        }
    }

    impl DescriptionModel for Fail {
        fn describe(&self, _image: &Path, _prompt: &str, _timeout: Duration) -> Result<String, ProcessError> {
            Ok("caption".to_string())
        }
    }

    impl MetadataStore for Fail {
        fn has_description(&self, _path: &Path) -> Result<bool, ProcessError> {
            Ok(false)
        }

        fn write_description(&self, _path: &Path, _text: &str) -> Result<(), ProcessError> {
            Ok(())
        }
    }

    fn collaborators() -> Collaborators {
        Collaborators {
            converter: Arc::new(Fail),
            extractor: Arc::new(Fail),
            model: Arc::new(Fail),
            metadata: Arc::new(Fail),
        }
    }

    #[test]
    fn test_summary_counts() {
        let result = |outcome| TaskResult {
            source_path: PathBuf::from("/p/a.jpg"),
            outcome,
            elapsed: Duration::ZERO,
        };
        let results = vec![
            result(ProcessingResult::Succeeded {
                description: "x".to_string(),
            }),
            result(ProcessingResult::Skipped(SkipReason::InCache)),
            result(ProcessingResult::Skipped(SkipReason::Cancelled)),
            result(ProcessingResult::failure(crate::pipeline::PipelineError::at(
                Stage::Convert,
                ProcessError::ImageProcessing("x".to_string()),
            ))),
        ];

        let summary = RunSummary::from_results(&results);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.was_interrupted());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = RunConfig::new(temp_dir.path().join("missing"));
        config.cache_dir = temp_dir.path().join("cache");

        let err = Orchestrator::new(config, collaborators()).run().unwrap_err();
        assert!(matches!(err, PicscribeError::Scan(ScanError::RootMissing(_))));
        assert!(!temp_dir.path().join("cache").exists());
    }

    #[test]
    fn test_failures_land_in_error_log() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = temp_dir.path().join("photos");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("a.jpg"), b"jpg").unwrap();
        std::fs::write(root.join("b.png"), b"png").unwrap();

        let mut config = RunConfig::new(&root);
        config.cache_dir = temp_dir.path().join("cache");
        config.scratch_dir = temp_dir.path().join("temp");
        config.error_log = temp_dir.path().join("errors_run");
        config.workers = 2;

        let summary = Orchestrator::new(config, collaborators()).run().unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.error_entries, 2);
        let log = std::fs::read_to_string(temp_dir.path().join("errors_run")).unwrap();
        assert_eq!(log.lines().filter(|l| l.contains("[convert]")).count(), 2);
    }
}
