pub mod cli;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use cli::Args;

/// Extensions (lower-case, without the dot) the scanner picks up.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["hif", "heif", "heic", "jpg", "jpeg", "tif", "tiff", "png"];

/// Extensions the text extractor can read without conversion.
pub const OCR_NATIVE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// HEIF-family extensions that need the external decoder.
pub const HEIF_EXTENSIONS: &[&str] = &["hif", "heif", "heic"];

pub const DEFAULT_MODEL: &str = "qwen2.5vl:3b";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MAX_EDGE: u32 = 1000;

/// Instruction sent with every image to the vision model.
pub const DESCRIPTION_PROMPT: &str = "\
Provide a concise description of the image content for search purposes, including:
   - Main subjects/objects in the image
   - Setting/location type
   - Notable activities or scenes
   - Colors, style, or distinctive features
   - Don't miss any part of the image like objects and animals
Use simple words and no derivations for smaller or larger; use a different word for size or similar attributes instead. Remember we are optimising for search.
You can also add some simpler synonyms at the end of the description for better searchability.
Don't use any markdown or other kind of formatting, or newlines. Give the text as clear as possible.";

/// Settings for one invocation. Immutable once built and shared by all
/// workers as `Arc<RunConfig>`.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub root: PathBuf,
    pub model: String,
    pub ollama_url: String,
    /// Applies separately to each bounded stage, never to the whole task.
    pub stage_timeout: Duration,
    pub workers: usize,
    pub recursive: bool,
    pub overwrite: bool,
    pub skip_ocr: bool,
    pub error_log: PathBuf,
    pub cache_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub max_edge: u32,
    pub ocr_language: String,
    pub describe_retries: u32,
    pub grace_period: Duration,
}

impl RunConfig {
    /// Defaults matching the CLI, rooted at `root`. Used by tests and
    /// embedders that do not go through `Args`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            model: DEFAULT_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            stage_timeout: Duration::from_secs(20),
            workers: 4,
            recursive: false,
            overwrite: false,
            skip_ocr: false,
            error_log: PathBuf::from("./errors"),
            cache_dir: PathBuf::from("./cache"),
            scratch_dir: PathBuf::from("./temp"),
            max_edge: DEFAULT_MAX_EDGE,
            ocr_language: "eng".to_string(),
            describe_retries: 0,
            grace_period: Duration::from_secs(5),
        }
    }
}

/// Case-insensitive membership test against one of the extension tables.
pub fn extension_in(extension: &str, table: &[&str]) -> bool {
    table.iter().any(|e| e.eq_ignore_ascii_case(extension))
}
