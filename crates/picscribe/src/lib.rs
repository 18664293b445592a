pub mod ai;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod processor;
pub mod report;
pub mod sanitize;
pub mod termination;
pub mod worker;

pub use cache::{CacheMarker, CompletionCache};
pub use config::{Args, RunConfig};
pub use error::{ConfigError, PicscribeError, ProcessError, Result, ScanError};
pub use orchestrator::{Orchestrator, RunSummary};
pub use pipeline::{Pipeline, PipelineContext, PipelineError, Stage};
pub use processor::{Collaborators, DescriptionModel, ImageConverter, MetadataStore, TextExtractor};
pub use termination::{CancellationToken, TerminationController};
pub use worker::{Counter, DirectoryScanner, ImageTask, ProcessingResult, SkipReason, TaskResult, WorkerPool};
