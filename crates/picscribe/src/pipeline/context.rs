use std::path::PathBuf;

use crate::worker::job::ImageTask;

use super::error::PipelineWarning;

pub struct PipelineContext {
    // Input
    pub task: ImageTask,

    // Convert result, a file inside the scratch directory
    pub converted_path: Option<PathBuf>,

    // Extract result; empty when OCR is skipped or failed
    pub extracted_text: String,

    // Describe result
    pub caption: Option<String>,

    // Persist input: caption plus extracted text
    pub description: Option<String>,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(task: ImageTask) -> Self {
        Self {
            task,
            converted_path: None,
            extracted_text: String::new(),
            caption: None,
            description: None,
            warnings: Vec::new(),
        }
    }
}
