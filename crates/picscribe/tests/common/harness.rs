//! Isolated environment for running the whole engine against fake
//! collaborators: a photo root, cache, scratch space and error log, all
//! inside one temporary directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use picscribe::{Collaborators, Orchestrator, RunConfig, RunSummary};

use super::fakes::{ExtractBehavior, FakeConverter, FakeExtractor, FakeMetadata, FakeModel, RecordingProgress};

pub const CAPTION: &str = "a red boat in a harbor";
pub const OCR_TEXT: &str = "HARBOR MASTER";

pub struct TestHarness {
    temp_dir: TempDir,
    pub root: PathBuf,
    pub cache_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub error_log: PathBuf,
    pub converter: Arc<FakeConverter>,
    pub extractor: Arc<FakeExtractor>,
    pub model: Arc<FakeModel>,
    pub metadata: Arc<FakeMetadata>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let root = base.join("photos");
        std::fs::create_dir_all(&root).expect("Failed to create photo root");
        // Match the canonical form the orchestrator uses for cache keys.
        let root = root.canonicalize().expect("Failed to resolve photo root");

        let scratch_dir = base.join("temp");

        Self {
            root,
            cache_dir: base.join("cache"),
            error_log: base.join("errors_test"),
            converter: Arc::new(FakeConverter::new(&scratch_dir)),
            extractor: Arc::new(FakeExtractor::new(ExtractBehavior::Text(OCR_TEXT.to_string()))),
            model: Arc::new(FakeModel::new(CAPTION)),
            metadata: Arc::new(FakeMetadata::default()),
            scratch_dir,
            temp_dir,
        }
    }

    /// Creates an (empty) image file at `relative` under the root.
    pub fn add_image(&self, relative: &str) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create image directory");
        }
        std::fs::write(&path, b"image bytes").expect("Failed to write image");
        path
    }

    pub fn config(&self) -> RunConfig {
        let mut config = RunConfig::new(&self.root);
        config.cache_dir = self.cache_dir.clone();
        config.scratch_dir = self.scratch_dir.clone();
        config.error_log = self.error_log.clone();
        config.workers = 2;
        config.stage_timeout = Duration::from_secs(5);
        config.grace_period = Duration::from_secs(2);
        config
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            converter: self.converter.clone(),
            extractor: self.extractor.clone(),
            model: self.model.clone(),
            metadata: self.metadata.clone(),
        }
    }

    pub fn orchestrator(&self, config: RunConfig) -> (Orchestrator, Arc<RecordingProgress>) {
        let progress = Arc::new(RecordingProgress::default());
        let orchestrator =
            Orchestrator::new(config, self.collaborators()).with_progress(progress.clone());
        (orchestrator, progress)
    }

    pub fn run_with(&self, config: RunConfig) -> (RunSummary, Arc<RecordingProgress>) {
        let (orchestrator, progress) = self.orchestrator(config);
        let summary = orchestrator.run().expect("run failed to start");
        (summary, progress)
    }

    pub fn run(&self) -> (RunSummary, Arc<RecordingProgress>) {
        self.run_with(self.config())
    }

    pub fn error_log_contents(&self) -> String {
        std::fs::read_to_string(&self.error_log).unwrap_or_default()
    }

    pub fn base(&self) -> &Path {
        self.temp_dir.path()
    }
}
