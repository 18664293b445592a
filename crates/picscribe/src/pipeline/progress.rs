use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::report::ErrorLog;
use crate::worker::job::{ImageTask, SkipReason};

use super::error::Stage;

/// Events emitted by the pipeline while it processes one image.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started,
    Skipped {
        reason: SkipReason,
    },
    Warning {
        stage: Stage,
        message: String,
        timed_out: bool,
    },
    Completed {
        elapsed: Duration,
        processed: u64,
    },
    Failed {
        stage: Stage,
        error: String,
        timed_out: bool,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, task: &ImageTask, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _task: &ImageTask, _event: ProgressEvent) {}
}

/// Prints per-image progress through the logger and copies warnings and
/// failures into the run's error log.
pub struct ConsoleProgress {
    error_log: Arc<ErrorLog>,
}

impl ConsoleProgress {
    pub fn new(error_log: Arc<ErrorLog>) -> Self {
        Self { error_log }
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, task: &ImageTask, event: ProgressEvent) {
        let path = task.full_path();
        match event {
            ProgressEvent::Started => {
                info!("{}: started", path.display());
            }
            ProgressEvent::Skipped { reason } => {
                info!("{}: skipped, {}", path.display(), reason);
            }
            ProgressEvent::Warning {
                stage,
                message,
                timed_out,
            } => {
                warn!("{}: [{}] {}", path.display(), stage, message);
                self.error_log.record(stage, timed_out, &path, &message);
            }
            ProgressEvent::Completed { elapsed, processed } => {
                info!(
                    "{}: took {:.2?}, processed {} so far",
                    path.display(),
                    elapsed,
                    processed
                );
            }
            ProgressEvent::Failed {
                stage,
                error,
                timed_out,
            } => {
                if timed_out {
                    error!("{}: [{} timeout] {}", path.display(), stage, error);
                } else {
                    error!("{}: [{}] {}", path.display(), stage, error);
                }
                self.error_log.record(stage, timed_out, &path, &error);
            }
        }
    }
}
