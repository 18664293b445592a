use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{extension_in, SUPPORTED_EXTENSIONS};
use crate::error::ScanError;
use crate::worker::job::ImageTask;

pub struct DirectoryScanner {
    root: PathBuf,
    recursive: bool,
}

impl DirectoryScanner {
    pub fn new<P: AsRef<Path>>(root: P, recursive: bool) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            recursive,
        }
    }

    /// Lists every supported image under the root, one task per file.
    ///
    /// Order follows filesystem enumeration and is not stable across
    /// platforms. Symlinks are not followed, so link cycles cannot loop.
    /// Only a root that cannot be read is fatal; unreadable entries below
    /// it are logged and left out.
    pub fn scan(&self) -> Result<Vec<ImageTask>, ScanError> {
        if !self.root.exists() {
            return Err(ScanError::RootMissing(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut tasks = Vec::new();

        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) if source.depth() == 0 => {
                    return Err(ScanError::Walk {
                        path: self.root.clone(),
                        source,
                    });
                }
                Err(e) => {
                    warn!(
                        "Skipping {}: {}",
                        e.path().unwrap_or(self.root.as_path()).display(),
                        e
                    );
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| extension_in(ext, SUPPORTED_EXTENSIONS))
                .unwrap_or(false);
            if !supported {
                continue;
            }

            match ImageTask::from_path(path) {
                Some(task) => {
                    debug!("Found image: {}", path.display());
                    tasks.push(task);
                }
                None => warn!("Skipping {}: file name is not valid UTF-8", path.display()),
            }
        }

        info!("Scanned {} images in {}", tasks.len(), self.root.display());
        Ok(tasks)
    }
}
