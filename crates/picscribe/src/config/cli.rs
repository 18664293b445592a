use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::Parser;

use crate::config::{RunConfig, DEFAULT_MAX_EDGE, DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
use crate::error::ConfigError;

#[derive(Parser, Debug)]
#[command(name = "picscribe")]
#[command(about = "Describe images with OCR and a local vision model, and store the text in their metadata")]
#[command(version)]
pub struct Args {
    /// Error file path prefix; a timestamp is appended per run
    #[arg(short = 'e', long = "error", default_value = "./errors")]
    pub error_file: PathBuf,

    /// Vision-capable model to describe images with
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Timeout in seconds for the OCR and description stages of each image
    #[arg(short, long, default_value_t = 20)]
    pub timeout: u64,

    /// Number of images processed in parallel
    #[arg(short, long, default_value_t = 4)]
    pub workers: usize,

    /// Overwrite existing descriptions instead of skipping those images
    #[arg(short, long)]
    pub overwrite: bool,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Skip OCR text extraction
    #[arg(long)]
    pub skip_ocr: bool,

    /// Ollama server the model is served from
    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,

    /// Directory holding the completion cache
    #[arg(long, default_value = "./cache")]
    pub cache_dir: PathBuf,

    /// Scratch directory for converted copies; removed on exit
    #[arg(long, default_value = "./temp")]
    pub scratch_dir: PathBuf,

    /// Longest edge in pixels of the copy sent to the model
    #[arg(long, default_value_t = DEFAULT_MAX_EDGE)]
    pub max_edge: u32,

    /// Tesseract language(s), e.g. "eng" or "eng+deu"
    #[arg(long, default_value = "eng")]
    pub ocr_lang: String,

    /// Extra attempts for a failed description request
    #[arg(long, default_value_t = 0)]
    pub describe_retries: u32,

    /// Seconds to wait for in-flight images after an interrupt
    #[arg(long, default_value_t = 5)]
    pub grace_period: u64,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Directory to process images in
    pub directory: PathBuf,
}

impl Args {
    /// Error log path for this run: `<prefix>_<YYYYMMDD_HHMMSS>`.
    pub fn error_log_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let mut name = self.error_file.as_os_str().to_os_string();
        name.push(format!("_{}", stamp));
        PathBuf::from(name)
    }

    pub fn into_run_config(self) -> Result<RunConfig, ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_edge == 0 {
            return Err(ConfigError::ZeroMaxEdge);
        }
        let ollama_url = normalize_url(&self.ollama_url)?;
        let error_log = self.error_log_path();

        Ok(RunConfig {
            root: self.directory,
            model: self.model,
            ollama_url,
            stage_timeout: Duration::from_secs(self.timeout),
            workers: self.workers,
            recursive: self.recursive,
            overwrite: self.overwrite,
            skip_ocr: self.skip_ocr,
            error_log,
            cache_dir: self.cache_dir,
            scratch_dir: self.scratch_dir,
            max_edge: self.max_edge,
            ocr_language: self.ocr_lang,
            describe_retries: self.describe_retries,
            grace_period: Duration::from_secs(self.grace_period),
        })
    }
}

/// Accepts Ollama's own `OLLAMA_HOST` forms (`host`, `host:port`) as well
/// as full URLs.
fn normalize_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: "empty".to_string(),
        });
    }
    if trimmed.contains(char::is_whitespace) {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: "contains whitespace".to_string(),
        });
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else if trimmed.contains("://") {
        Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: "only http and https are supported".to_string(),
        })
    } else {
        Ok(format!("http://{}", trimmed))
    }
}
