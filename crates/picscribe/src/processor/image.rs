use std::path::{Path, PathBuf};
use std::time::Duration;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::config::{extension_in, HEIF_EXTENSIONS};
use crate::error::ProcessError;
use crate::processor::command::run_with_timeout;
use crate::processor::ImageConverter;
use crate::sanitize;

const HEIF_DECODER: &str = "heif-convert";

/// Produces the size-bounded PNG copy the model and OCR work on.
pub struct RasterConverter {
    scratch_dir: PathBuf,
    max_edge: u32,
    decode_timeout: Duration,
}

impl RasterConverter {
    pub fn new(scratch_dir: impl AsRef<Path>, max_edge: u32, decode_timeout: Duration) -> Self {
        Self {
            scratch_dir: scratch_dir.as_ref().to_path_buf(),
            max_edge,
            decode_timeout,
        }
    }

    /// `<stem>-<hash of full source path>.png` inside the scratch directory.
    pub fn scratch_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        self.scratch_dir
            .join(format!("{}-{}.png", stem, sanitize::hash_path(source)))
    }

    fn decode(&self, source: &Path, dest: &Path) -> Result<DynamicImage, ProcessError> {
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        if extension_in(extension, HEIF_EXTENSIONS) {
            // The image crate has no HEIF decoder; let the external tool
            // write a full-size PNG at the destination first.
            run_with_timeout(
                HEIF_DECODER,
                [source.as_os_str(), dest.as_os_str()],
                self.decode_timeout,
            )?;
            return open(dest);
        }

        open(source)
    }
}

impl ImageConverter for RasterConverter {
    fn convert(&self, source: &Path) -> Result<PathBuf, ProcessError> {
        let _span = tracing::info_span!("processor.convert").entered();

        std::fs::create_dir_all(&self.scratch_dir).map_err(|e| ProcessError::ReadImage {
            path: self.scratch_dir.clone(),
            source: e,
        })?;

        let dest = self.scratch_path(source);
        let img = self.decode(source, &dest)?;

        let (width, height) = img.dimensions();
        let (new_width, new_height) = bounded_dimensions(width, height, self.max_edge);
        let img = if (new_width, new_height) == (width, height) {
            img
        } else {
            img.resize_exact(new_width, new_height, FilterType::CatmullRom)
        };

        let img = if img.color().has_alpha() {
            DynamicImage::ImageRgba8(img.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(img.to_rgb8())
        };

        img.save_with_format(&dest, ImageFormat::Png)
            .map_err(|e| ProcessError::ImageProcessing(format!("Failed to write {}: {}", dest.display(), e)))?;

        Ok(dest)
    }
}

/// Scales `(width, height)` so the longest edge is at most `max_edge`,
/// keeping the aspect ratio. Never enlarges.
pub fn bounded_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_edge || longest == 0 {
        return (width, height);
    }

    let scale = f64::from(max_edge) / f64::from(longest);
    let scaled = |edge: u32| ((f64::from(edge) * scale).round() as u32).clamp(1, max_edge);
    (scaled(width), scaled(height))
}

fn open(path: &Path) -> Result<DynamicImage, ProcessError> {
    image::open(path).map_err(|e| {
        ProcessError::ImageProcessing(format!("Failed to load {}: {}", path.display(), e))
    })
}
