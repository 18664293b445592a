pub mod command;
pub mod exif;
pub mod image;
pub mod ocr;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::ai::{ModelError, OllamaDescriber};
use crate::config::RunConfig;
use crate::error::ProcessError;

/// Produces a normalized, size-bounded raster copy of an image in scratch
/// space.
pub trait ImageConverter: Send + Sync {
    fn convert(&self, source: &Path) -> Result<PathBuf, ProcessError>;
}

pub trait TextExtractor: Send + Sync {
    fn extract(&self, image: &Path, timeout: Duration) -> Result<String, ProcessError>;
}

pub trait DescriptionModel: Send + Sync {
    /// Startup precondition: make sure the model can serve requests.
    fn ensure_ready(&self) -> Result<(), ModelError> {
        Ok(())
    }

    /// Returns the `description` field of the model's answer.
    fn describe(&self, image: &Path, prompt: &str, timeout: Duration) -> Result<String, ProcessError>;
}

pub trait MetadataStore: Send + Sync {
    fn has_description(&self, path: &Path) -> Result<bool, ProcessError>;
    fn write_description(&self, path: &Path, text: &str) -> Result<(), ProcessError>;
}

/// The four external collaborators one pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub converter: Arc<dyn ImageConverter>,
    pub extractor: Arc<dyn TextExtractor>,
    pub model: Arc<dyn DescriptionModel>,
    pub metadata: Arc<dyn MetadataStore>,
}

impl Collaborators {
    /// Production wiring: image crate + heif-convert, Tesseract, Ollama,
    /// exiftool.
    pub fn from_config(config: &RunConfig) -> Result<Self, ModelError> {
        let model = OllamaDescriber::new(&config.ollama_url, &config.model)?;

        Ok(Self {
            converter: Arc::new(image::RasterConverter::new(
                &config.scratch_dir,
                config.max_edge,
                config.stage_timeout,
            )),
            extractor: Arc::new(ocr::TesseractExtractor::new(&config.ocr_language)),
            model: Arc::new(model),
            metadata: Arc::new(exif::ExifTool::new(config.stage_timeout)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_builds_adapters() {
        let config = RunConfig::new("/photos");
        assert!(Collaborators::from_config(&config).is_ok());
    }
}
