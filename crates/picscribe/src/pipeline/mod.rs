pub mod context;
pub mod error;
pub mod progress;
pub mod retry;
pub mod runner;
pub mod timeout;

pub use context::PipelineContext;
pub use error::{PipelineError, PipelineWarning, Stage};
pub use progress::{ConsoleProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use retry::RetryPolicy;
pub use runner::Pipeline;
