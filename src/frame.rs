use crate::config::FrameConfig;
use crate::error::{LocateError, Result};
use image::imageops::{self, FilterType};
use image::{ImageReader, RgbImage};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Supplier of decoded frames. `Ok(None)` means the source is drained.
pub trait FrameSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>>;
}

/// Decode an image file and normalize it to the working resolution
pub fn load_frame(path: &Path, config: &FrameConfig) -> Result<RgbImage> {
    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let img = img.to_rgb8();
    if img.width() == 0 || img.height() == 0 {
        return Err(LocateError::invalid_input(format!(
            "{} decoded to an empty image",
            path.display()
        )));
    }
    debug!(path = %path.display(), width = img.width(), height = img.height(), "decoded frame");
    Ok(normalize(img, config))
}

/// Resize to the configured resolution unless resizing is disabled or the
/// frame already matches
pub fn normalize(img: RgbImage, config: &FrameConfig) -> RgbImage {
    if !config.resize || img.dimensions() == (config.width, config.height) {
        return img;
    }
    imageops::resize(&img, config.width, config.height, FilterType::Triangle)
}

/// Frames read from a list of image files, in order
pub struct ImageFileSource {
    paths: VecDeque<PathBuf>,
    config: FrameConfig,
}

impl ImageFileSource {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>, config: FrameConfig) -> Self {
        Self {
            paths: paths.into_iter().collect(),
            config,
        }
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let frame = load_frame(&path, &self.config)
            .map_err(|e| anyhow::anyhow!("Failed to load frame {}: {}", path.display(), e))?;
        Ok(Some(frame))
    }
}
