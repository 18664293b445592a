use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use crate::error::ProcessError;
use crate::processor::command::run_with_timeout;
use crate::processor::MetadataStore;

const EXIFTOOL: &str = "exiftool";
const DESCRIPTION_TAG: &str = "ImageDescription";

/// Reads and writes the `ImageDescription` tag with `exiftool`.
pub struct ExifTool {
    program: String,
    timeout: Duration,
}

impl ExifTool {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program(EXIFTOOL, timeout)
    }

    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn metadata_error(&self, error: ProcessError) -> ProcessError {
        match error {
            ProcessError::Command { message, .. } => {
                ProcessError::Metadata(format!("{}: {}", self.program, message))
            }
            other => other,
        }
    }
}

impl MetadataStore for ExifTool {
    fn has_description(&self, path: &Path) -> Result<bool, ProcessError> {
        let tag = format!("-{}", DESCRIPTION_TAG);
        let output = run_with_timeout(
            &self.program,
            [
                OsStr::new("-s3"),
                OsStr::new(&tag),
                path.as_os_str(),
            ],
            self.timeout,
        )
        .map_err(|e| self.metadata_error(e))?;

        Ok(!output.stdout.trim().is_empty())
    }

    fn write_description(&self, path: &Path, text: &str) -> Result<(), ProcessError> {
        let assignment = format!("-{}={}", DESCRIPTION_TAG, text);
        run_with_timeout(
            &self.program,
            [
                OsStr::new(&assignment),
                OsStr::new("-P"),
                OsStr::new("-overwrite_original"),
                path.as_os_str(),
            ],
            self.timeout,
        )
        .map_err(|e| self.metadata_error(e))?;

        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// A stand-in `exiftool` that answers from a side file and records writes.
    fn fake_exiftool(dir: &Path) -> PathBuf {
        let script = dir.join("exiftool");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\n\
                 state='{state}'\n\
                 if [ \"$1\" = \"-s3\" ]; then\n  cat \"$state\" 2>/dev/null\n  exit 0\nfi\n\
                 printf '%s' \"${{1#-ImageDescription=}}\" > \"$state\"\n",
                state = dir.join("description").display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[test]
    fn test_round_trip_through_tool() {
        let temp_dir = TempDir::new().unwrap();
        let tool = fake_exiftool(temp_dir.path());
        let store = ExifTool::with_program(tool.to_string_lossy(), Duration::from_secs(5));
        let image = temp_dir.path().join("a.jpg");

        assert!(!store.has_description(&image).unwrap());

        store.write_description(&image, "a red boat\nHARBOR").unwrap();
        assert!(store.has_description(&image).unwrap());
        let written = std::fs::read_to_string(temp_dir.path().join("description")).unwrap();
        assert_eq!(written, "a red boat\nHARBOR");
    }

    #[test]
    fn test_tool_failure_is_metadata_error() {
        let store = ExifTool::with_program("false", Duration::from_secs(5));
        let err = store.write_description(Path::new("/p/a.jpg"), "x").unwrap_err();
        assert!(matches!(err, ProcessError::Metadata(_)));
    }
}
