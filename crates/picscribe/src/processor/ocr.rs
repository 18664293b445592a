use std::path::Path;
use std::time::Duration;

use crate::error::ProcessError;
use crate::processor::TextExtractor;

/// Tesseract through `leptess`.
///
/// Tesseract runs in-process and cannot be interrupted, so the deadline is
/// enforced by the caller abandoning the call; the number of abandoned
/// calls still running is capped per run.
#[derive(Clone)]
pub struct TesseractExtractor {
    languages: String,
}

impl TesseractExtractor {
    pub fn new(languages: &str) -> Self {
        let languages = languages.trim();
        Self {
            languages: if languages.is_empty() {
                "eng".to_string()
            } else {
                languages.to_string()
            },
        }
    }
}

impl TextExtractor for TesseractExtractor {
    fn extract(&self, image: &Path, _timeout: Duration) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.ocr").entered();

        let mut lt = leptess::LepTess::new(None, &self.languages).map_err(|e| {
            ProcessError::OcrFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image(image)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to load {}: {}", image.display(), e)))?;

        let text = lt
            .get_utf8_text()
            .map_err(|e| ProcessError::OcrFailed(format!("OCR failed: {}", e)))?;

        Ok(normalize_text(&text))
    }
}

/// Joins Tesseract's line-broken output into one line.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
