use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{extension_in, OCR_NATIVE_EXTENSIONS};
use crate::pipeline::error::{PipelineError, Stage};

/// One image's unit of work. Built by the scanner, consumed by exactly
/// one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTask {
    root_path: PathBuf,
    filename: String,
    /// Lower-cased, without the leading dot.
    extension: String,
}

impl ImageTask {
    /// Builds a task for `root_path/filename`. Returns `None` when the
    /// file name has no extension.
    pub fn new(root_path: impl Into<PathBuf>, filename: impl Into<String>) -> Option<Self> {
        let filename = filename.into();
        let extension = Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();

        Some(Self {
            root_path: root_path.into(),
            filename,
            extension,
        })
    }

    /// Builds a task from a full file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        let filename = path.file_name()?.to_str()?.to_string();
        let root = path.parent().unwrap_or_else(|| Path::new(""));
        Self::new(root, filename)
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Identity of the task; also the completion cache key.
    pub fn full_path(&self) -> PathBuf {
        self.root_path.join(&self.filename)
    }

    /// Whether the text extractor can read the original file directly.
    pub fn is_ocr_native(&self) -> bool {
        extension_in(&self.extension, OCR_NATIVE_EXTENSIONS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The completion cache already has an entry for the path.
    InCache,
    /// The image metadata already carries a description.
    AlreadyDescribed,
    /// The run was interrupted before this image finished.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InCache => write!(f, "found in cache"),
            SkipReason::AlreadyDescribed => write!(f, "already has a description"),
            SkipReason::Cancelled => write!(f, "run cancelled"),
        }
    }
}

/// Terminal state of one task.
#[derive(Debug)]
pub enum ProcessingResult {
    Skipped(SkipReason),
    Succeeded { description: String },
    Failed { stage: Stage, error: PipelineError },
}

impl ProcessingResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingResult::Succeeded { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ProcessingResult::Skipped(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ProcessingResult::Failed { .. })
    }

    pub fn failure(error: PipelineError) -> Self {
        ProcessingResult::Failed {
            stage: error.stage(),
            error,
        }
    }
}

/// A task's outcome as sent back from a worker.
#[derive(Debug)]
pub struct TaskResult {
    pub source_path: PathBuf,
    pub outcome: ProcessingResult,
    pub elapsed: Duration,
}
