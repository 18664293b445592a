//! In-memory stand-ins for the external collaborators.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use picscribe::pipeline::{ProgressEvent, ProgressReporter};
use picscribe::sanitize::hash_path;
use picscribe::{DescriptionModel, ImageConverter, ImageTask, MetadataStore, ProcessError, TextExtractor};

/// Writes a placeholder PNG into the scratch directory.
pub struct FakeConverter {
    scratch_dir: PathBuf,
    pub calls: AtomicUsize,
}

impl FakeConverter {
    pub fn new(scratch_dir: &Path) -> Self {
        Self {
            scratch_dir: scratch_dir.to_path_buf(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl ImageConverter for FakeConverter {
    fn convert(&self, source: &Path) -> Result<PathBuf, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(&self.scratch_dir).map_err(|e| ProcessError::ReadImage {
            path: self.scratch_dir.clone(),
            source: e,
        })?;
        let stem = source.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
        let dest = self
            .scratch_dir
            .join(format!("{}-{}.png", stem, hash_path(source)));
        std::fs::write(&dest, b"png").map_err(|e| ProcessError::ReadImage {
            path: dest.clone(),
            source: e,
        })?;
        Ok(dest)
    }
}

#[derive(Clone)]
pub enum ExtractBehavior {
    Text(String),
    Fail,
    Hang(Duration),
}

pub struct FakeExtractor {
    behavior: Mutex<ExtractBehavior>,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FakeExtractor {
    pub fn new(behavior: ExtractBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, behavior: ExtractBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }
}

impl TextExtractor for FakeExtractor {
    fn extract(&self, image: &Path, _timeout: Duration) -> Result<String, ProcessError> {
        self.calls.lock().unwrap().push(image.to_path_buf());
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            ExtractBehavior::Text(text) => Ok(text),
            ExtractBehavior::Fail => Err(ProcessError::OcrFailed("engine crashed".to_string())),
            ExtractBehavior::Hang(delay) => {
                thread::sleep(delay);
                Ok("too late".to_string())
            }
        }
    }
}

pub struct FakeModel {
    caption: String,
    delay: Mutex<Duration>,
    pub calls: AtomicUsize,
}

impl FakeModel {
    pub fn new(caption: &str) -> Self {
        Self {
            caption: caption.to_string(),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DescriptionModel for FakeModel {
    fn describe(&self, _image: &Path, _prompt: &str, _timeout: Duration) -> Result<String, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        thread::sleep(delay);
        Ok(self.caption.clone())
    }
}

/// Metadata kept in a map keyed by image path.
#[derive(Default)]
pub struct FakeMetadata {
    pub descriptions: Mutex<HashMap<PathBuf, String>>,
    pub writes: AtomicUsize,
}

impl FakeMetadata {
    pub fn preset(&self, path: &Path, text: &str) {
        self.descriptions
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), text.to_string());
    }

    pub fn get(&self, path: &Path) -> Option<String> {
        self.descriptions.lock().unwrap().get(path).cloned()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl MetadataStore for FakeMetadata {
    fn has_description(&self, path: &Path) -> Result<bool, ProcessError> {
        Ok(self.descriptions.lock().unwrap().contains_key(path))
    }

    fn write_description(&self, path: &Path, text: &str) -> Result<(), ProcessError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.preset(path, text);
        Ok(())
    }
}

/// Keeps every progress event for later assertions.
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<(PathBuf, ProgressEvent)>>,
}

impl RecordingProgress {
    pub fn count(&self, matches: impl Fn(&ProgressEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| matches(e))
            .count()
    }

    pub fn paths_with(&self, matches: impl Fn(&ProgressEvent) -> bool) -> Vec<PathBuf> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| matches(e))
            .map(|(p, _)| p.clone())
            .collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, task: &ImageTask, event: ProgressEvent) {
        self.events.lock().unwrap().push((task.full_path(), event));
    }
}
