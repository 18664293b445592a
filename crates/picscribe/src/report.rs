use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use log::warn;

use crate::pipeline::error::Stage;

/// Per-run error log shared by all workers.
///
/// Each task-level error or warning becomes one line:
/// `<RFC3339> [<stage>] <path>: <message>`, or `[<stage> timeout]` for
/// timeouts. The file is only created once something is written.
pub struct ErrorLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

#[derive(Default)]
struct LogState {
    file: Option<File>,
    entries: usize,
}

impl ErrorLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Mutex::new(LogState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines written so far.
    pub fn entries(&self) -> usize {
        self.state.lock().map(|s| s.entries).unwrap_or(0)
    }

    /// Appends one entry. Write failures are logged and swallowed; losing a
    /// line of the error log must not affect the run.
    pub fn record(&self, stage: Stage, timed_out: bool, image: &Path, message: &str) {
        let line = format_line(stage, timed_out, image, message);

        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if state.file.is_none() {
            match self.open() {
                Ok(file) => state.file = Some(file),
                Err(e) => {
                    warn!("Cannot open error log {}: {}", self.path.display(), e);
                    return;
                }
            }
        }

        if let Some(file) = state.file.as_mut() {
            if let Err(e) = writeln!(file, "{}", line) {
                warn!("Cannot write error log {}: {}", self.path.display(), e);
                return;
            }
            state.entries += 1;
        }
    }

    fn open(&self) -> std::io::Result<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(&self.path)
    }
}

fn format_line(stage: Stage, timed_out: bool, image: &Path, message: &str) -> String {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let tag = if timed_out {
        format!("{} timeout", stage)
    } else {
        stage.to_string()
    };
    // One entry per line.
    let message = message.replace('\n', " ");
    format!("{} [{}] {}: {}", timestamp, tag, image.display(), message)
}
