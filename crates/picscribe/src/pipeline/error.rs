use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::error::ProcessError;

/// One of the four stages an image passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Convert,
    Extract,
    Describe,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Convert => "convert",
            Stage::Extract => "extract",
            Stage::Describe => "describe",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Conversion failed: {0}")]
    Convert(#[source] ProcessError),

    #[error("Text extraction failed: {0}")]
    Extract(#[source] ProcessError),

    #[error("Description failed: {0}")]
    Describe(#[source] ProcessError),

    #[error("Writing metadata failed: {0}")]
    Persist(#[source] ProcessError),

    #[error("{stage} stage timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },
}

impl PipelineError {
    /// Wraps a collaborator error, lifting collaborator-side timeouts into
    /// the `Timeout` variant so they are reported the same way.
    pub fn at(stage: Stage, error: ProcessError) -> Self {
        match error {
            ProcessError::Timeout(after) => PipelineError::Timeout { stage, after },
            error => match stage {
                Stage::Convert => PipelineError::Convert(error),
                Stage::Extract => PipelineError::Extract(error),
                Stage::Describe => PipelineError::Describe(error),
                Stage::Persist => PipelineError::Persist(error),
            },
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Convert(_) => Stage::Convert,
            PipelineError::Extract(_) => Stage::Extract,
            PipelineError::Describe(_) => Stage::Describe,
            PipelineError::Persist(_) => Stage::Persist,
            PipelineError::Timeout { stage, .. } => *stage,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineError::Timeout { .. })
    }
}

/// Problems that did not stop the task.
#[derive(Debug, Clone)]
pub enum PipelineWarning {
    ExtractFailed { error: String, timed_out: bool },
    CacheStoreFailed { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_maps_stage() {
        let err = PipelineError::at(Stage::Persist, ProcessError::Metadata("locked".into()));
        assert_eq!(err.stage(), Stage::Persist);
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn test_at_lifts_timeout() {
        let err = PipelineError::at(
            Stage::Describe,
            ProcessError::Timeout(Duration::from_secs(20)),
        );
        assert!(err.is_timeout());
        assert_eq!(err.stage(), Stage::Describe);
        assert_eq!(err.to_string(), "describe stage timed out after 20s");
    }
}
