use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, info_span, warn};

use crate::cache::{CacheMarker, CompletionCache};
use crate::config::{RunConfig, DESCRIPTION_PROMPT};
use crate::processor::Collaborators;
use crate::sanitize;
use crate::termination::CancellationToken;
use crate::worker::counter::Counter;
use crate::worker::job::{ProcessingResult, SkipReason};

use super::context::PipelineContext;
use super::error::{PipelineError, PipelineWarning, Stage};
use super::progress::{ProgressEvent, ProgressReporter};
use super::retry::RetryPolicy;
use super::timeout::{run_bounded, HelperLimit};

/// The per-image state machine: gate, convert, extract, describe, persist.
pub struct Pipeline {
    config: Arc<RunConfig>,
    collaborators: Collaborators,
    cache: Arc<CompletionCache>,
    counter: Arc<Counter>,
    cancel: CancellationToken,
    retry: RetryPolicy,
    extract_helpers: Arc<HelperLimit>,
    describe_helpers: Arc<HelperLimit>,
}

/// Each worker may leave behind one abandoned call per stage on top of
/// the one it is waiting on.
fn helper_limit(workers: usize) -> Arc<HelperLimit> {
    Arc::new(HelperLimit::new(workers.saturating_mul(2)))
}

impl Pipeline {
    pub fn new(
        config: Arc<RunConfig>,
        collaborators: Collaborators,
        cache: Arc<CompletionCache>,
        counter: Arc<Counter>,
        cancel: CancellationToken,
    ) -> Self {
        let retry = RetryPolicy::new(config.describe_retries);
        let extract_helpers = helper_limit(config.workers);
        let describe_helpers = helper_limit(config.workers);
        Self {
            config,
            collaborators,
            cache,
            counter,
            cancel,
            retry,
            extract_helpers,
            describe_helpers,
        }
    }

    /// Overrides the describe retry policy (the default comes from the
    /// run configuration).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn counter(&self) -> &Counter {
        &self.counter
    }

    /// Runs one image to a terminal state.
    pub fn run(
        &self,
        mut ctx: PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> (ProcessingResult, PipelineContext) {
        let path = ctx.task.full_path();
        let filename = sanitize::redact_path(&path);
        let _pipeline_span = info_span!("pipeline", filename = %filename).entered();
        let start = Instant::now();

        // Gate
        {
            let _step = info_span!("gate").entered();
            if let Some(reason) = self.step_gate(&path) {
                progress.report(&ctx.task, ProgressEvent::Skipped { reason });
                return (ProcessingResult::Skipped(reason), ctx);
            }
        }

        progress.report(&ctx.task, ProgressEvent::Started);

        // Convert
        if let Some(result) = self.cancelled(&ctx, progress) {
            return (result, ctx);
        }
        {
            let _step = info_span!("convert").entered();
            if let Err(e) = self.step_convert(&mut ctx) {
                return (self.fail(&ctx, e, progress), ctx);
            }
        }

        // Extract
        if let Some(result) = self.cancelled(&ctx, progress) {
            return (result, ctx);
        }
        if self.config.skip_ocr {
            debug!("Text extraction disabled");
        } else {
            let _step = info_span!("extract").entered();
            self.step_extract(&mut ctx, progress);
        }

        // Describe
        if let Some(result) = self.cancelled(&ctx, progress) {
            return (result, ctx);
        }
        {
            let _step = info_span!("describe").entered();
            if let Err(e) = self.step_describe(&mut ctx) {
                return (self.fail(&ctx, e, progress), ctx);
            }
        }

        // Persist
        if let Some(result) = self.cancelled(&ctx, progress) {
            return (result, ctx);
        }
        let description = {
            let _step = info_span!("persist").entered();
            match self.step_persist(&mut ctx) {
                Ok(description) => description,
                Err(e) => return (self.fail(&ctx, e, progress), ctx),
            }
        };

        let processed = self.counter.inc();
        progress.report(
            &ctx.task,
            ProgressEvent::Completed {
                elapsed: start.elapsed(),
                processed,
            },
        );

        (ProcessingResult::Succeeded { description }, ctx)
    }

    /// Cheap checks that let a rerun skip finished images before any
    /// expensive stage runs.
    fn step_gate(&self, path: &std::path::Path) -> Option<SkipReason> {
        if self.config.overwrite {
            return None;
        }

        if self.cache.lookup(path).is_some() {
            return Some(SkipReason::InCache);
        }

        match self.collaborators.metadata.has_description(path) {
            Ok(true) => {
                // Remember it so the next run skips without asking the
                // metadata tool again.
                if let Err(e) = self.cache.store(path, CacheMarker::AlreadyDescribed) {
                    warn!("Failed to cache completion marker for {}: {}", path.display(), e);
                }
                Some(SkipReason::AlreadyDescribed)
            }
            Ok(false) => None,
            Err(e) => {
                warn!(
                    "Could not read existing description of {}, processing anyway: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    fn step_convert(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let converted = self
            .collaborators
            .converter
            .convert(&ctx.task.full_path())
            .map_err(|e| PipelineError::at(Stage::Convert, e))?;
        ctx.converted_path = Some(converted);
        Ok(())
    }

    /// Failures here only cost the OCR text; the task carries on.
    fn step_extract(&self, ctx: &mut PipelineContext, progress: &dyn ProgressReporter) {
        let source = if ctx.task.is_ocr_native() {
            ctx.task.full_path()
        } else {
            match ctx.converted_path.clone() {
                Some(path) => path,
                None => return,
            }
        };

        let extractor = Arc::clone(&self.collaborators.extractor);
        let timeout = self.config.stage_timeout;
        let result = run_bounded("extract", timeout, &self.extract_helpers, move || {
            extractor.extract(&source, timeout)
        });

        match result {
            Ok(text) => ctx.extracted_text = text.trim().to_string(),
            Err(e) => {
                let error = PipelineError::at(Stage::Extract, e);
                let timed_out = error.is_timeout();
                let message = error.to_string();
                progress.report(
                    &ctx.task,
                    ProgressEvent::Warning {
                        stage: Stage::Extract,
                        message: message.clone(),
                        timed_out,
                    },
                );
                ctx.warnings.push(PipelineWarning::ExtractFailed {
                    error: message,
                    timed_out,
                });
                ctx.extracted_text.clear();
            }
        }
    }

    fn step_describe(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let image = ctx
            .converted_path
            .clone()
            .unwrap_or_else(|| ctx.task.full_path());

        let mut retries_done = 0;
        loop {
            match self.describe_once(image.clone()) {
                Ok(caption) => {
                    ctx.caption = Some(caption);
                    return Ok(());
                }
                Err(e) if self.retry.should_retry(retries_done) && !self.cancel.is_cancelled() => {
                    retries_done += 1;
                    let delay = self.retry.delay_for(retries_done);
                    warn!(
                        "Describe attempt {} failed, retrying in {:?}: {}",
                        retries_done, delay, e
                    );
                    thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn describe_once(&self, image: PathBuf) -> Result<String, PipelineError> {
        let model = Arc::clone(&self.collaborators.model);
        let timeout = self.config.stage_timeout;
        run_bounded("describe", timeout, &self.describe_helpers, move || {
            model.describe(&image, DESCRIPTION_PROMPT, timeout)
        })
        .map_err(|e| PipelineError::at(Stage::Describe, e))
    }

    fn step_persist(&self, ctx: &mut PipelineContext) -> Result<String, PipelineError> {
        let caption = ctx.caption.as_deref().unwrap_or_default();
        let description = compose_description(caption, &ctx.extracted_text);
        let path = ctx.task.full_path();

        self.collaborators
            .metadata
            .write_description(&path, &description)
            .map_err(|e| PipelineError::at(Stage::Persist, e))?;

        // Best effort: a lost cache write only means this image is looked
        // at again on the next run.
        if let Err(e) = self
            .cache
            .store(&path, CacheMarker::Description(description.clone()))
        {
            warn!("Failed to record completion of {}: {}", path.display(), e);
            ctx.warnings.push(PipelineWarning::CacheStoreFailed {
                error: e.to_string(),
            });
        }

        ctx.description = Some(description.clone());
        Ok(description)
    }

    fn cancelled(
        &self,
        ctx: &PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Option<ProcessingResult> {
        if !self.cancel.is_cancelled() {
            return None;
        }
        let reason = SkipReason::Cancelled;
        progress.report(&ctx.task, ProgressEvent::Skipped { reason });
        Some(ProcessingResult::Skipped(reason))
    }

    fn fail(
        &self,
        ctx: &PipelineContext,
        error: PipelineError,
        progress: &dyn ProgressReporter,
    ) -> ProcessingResult {
        progress.report(
            &ctx.task,
            ProgressEvent::Failed {
                stage: error.stage(),
                error: error.to_string(),
                timed_out: error.is_timeout(),
            },
        );
        ProcessingResult::failure(error)
    }
}

/// Caption, then the extracted text on its own line when there is any.
pub fn compose_description(caption: &str, extracted_text: &str) -> String {
    let caption = caption.trim();
    let text = extracted_text.trim();
    if text.is_empty() {
        caption.to_string()
    } else {
        format!("{}\n{}", caption, text)
    }
}
