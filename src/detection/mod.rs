pub mod annotate;
pub mod color;
pub mod contours;
pub mod orientation;
pub mod preprocessing;
pub mod rectify;
pub mod regions;

use crate::config::{LocatorConfig, RectifyConfig};
use crate::error::{LocateError, Result, ensure_not_empty};
use crate::models::{BoundingBox, Polygon, Quadrilateral, RectifiedImage, Role};
use image::{DynamicImage, RgbImage};
use orientation::{OrientationOutcome, OrientationSearch};
use rayon::prelude::*;
use regions::RegionOutcome;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Everything one frame produced
#[derive(Debug, Clone)]
pub struct LocalizationReport {
    pub orientation: OrientationOutcome,
    /// `None` when the tray search did not run
    pub tray: Option<RegionOutcome<Quadrilateral>>,
    /// `None` when the substrate search did not run
    pub substrates: Option<RegionOutcome<BoundingBox>>,
    /// Barcode first, then trays, then substrates
    pub rectified: Vec<RectifiedImage>,
}

impl LocalizationReport {
    /// Frame in the orientation all region coordinates refer to
    pub fn frame(&self) -> &RgbImage {
        &self.orientation.frame
    }

    pub fn barcode_found(&self) -> bool {
        self.orientation.is_found()
    }

    pub fn rectified_with_role(&self, role: Role) -> impl Iterator<Item = &RectifiedImage> {
        self.rectified.iter().filter(move |r| r.role == role)
    }
}

/// Writes stage images as `NN_stage/MM.png` under a root directory
struct DebugSink {
    root: PathBuf,
}

impl DebugSink {
    fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn save(&self, step: usize, name: &str, images: &[DynamicImage]) -> Result<()> {
        let step_dir = self.root.join(format!("{:02}_{}", step, name));
        std::fs::create_dir_all(&step_dir)?;
        for (idx, img) in images.iter().enumerate() {
            let path = step_dir.join(format!("{:02}.png", idx + 1));
            img.save(&path)?;
            debug!("saved debug image {}", path.display());
        }
        Ok(())
    }
}

fn rgb(img: &RgbImage) -> DynamicImage {
    DynamicImage::ImageRgb8(img.clone())
}

/// Rectify each region in turn. A region whose geometry cannot be recovered
/// is skipped; the rest of the frame still counts.
fn rectify_regions(
    frame: &RgbImage,
    polygons: impl IntoIterator<Item = Polygon>,
    role: Role,
    config: &RectifyConfig,
) -> Result<Vec<RectifiedImage>> {
    let mut out = Vec::new();
    for (idx, polygon) in polygons.into_iter().enumerate() {
        match rectify::rectify(frame, &polygon, role, config) {
            Ok(rectified) => out.push(rectified),
            Err(err) if err.is_recoverable() => {
                warn!(%role, region = idx, error = %err, "skipping region");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(out)
}

/// Runs the barcode search, region searches and rectification for a frame
pub struct Localizer {
    config: LocatorConfig,
    debug: Option<PathBuf>,
}

impl Localizer {
    pub fn new(config: LocatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            debug: None,
        })
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Enable debug mode with output directory. The directory must be empty
    /// or absent.
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(LocateError::invalid_input(format!(
                    "debug directory is not empty: {}",
                    output_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }
        self.debug = Some(output_dir);
        Ok(self)
    }

    pub fn debug_dir(&self) -> Option<&Path> {
        self.debug.as_deref()
    }

    /// Localize one frame
    pub fn localize(&self, frame: &RgbImage) -> Result<LocalizationReport> {
        let sink = self.debug.clone().map(DebugSink::new);
        self.run(frame, sink.as_ref())
    }

    /// Localize independent frames in parallel. Debug output for frame `i`
    /// goes to `frame_iii` under the debug directory.
    pub fn localize_batch(&self, frames: &[RgbImage]) -> Vec<Result<LocalizationReport>> {
        frames
            .par_iter()
            .enumerate()
            .map(|(i, frame)| {
                let sink = self
                    .debug
                    .as_ref()
                    .map(|root| DebugSink::new(root.join(format!("frame_{i:03}"))));
                self.run(frame, sink.as_ref())
            })
            .collect()
    }

    #[instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
    fn run(&self, frame: &RgbImage, sink: Option<&DebugSink>) -> Result<LocalizationReport> {
        ensure_not_empty(frame.dimensions(), "frame")?;
        let config = &self.config;
        if let Some(sink) = sink {
            sink.save(0, "input", &[rgb(frame)])?;
        }

        let orientation = OrientationSearch::new(config.barcode.clone()).locate(frame)?;
        let mut rectified = Vec::new();

        if let Some(sink) = sink {
            let mut images = vec![rgb(&orientation.frame)];
            images.extend(orientation.result.annotated().map(rgb));
            sink.save(1, "orientation", &images)?;
        }

        if let Some(hit) = orientation.result.detection() {
            let barcode = rectify_regions(
                &orientation.frame,
                [hit.polygon.clone()],
                Role::Barcode,
                &config.rectify,
            )?;
            if let Some(sink) = sink {
                let mut images = vec![rgb(&hit.crop)];
                images.extend(barcode.iter().map(|r| rgb(&r.image)));
                sink.save(2, "barcode", &images)?;
            }
            rectified.extend(barcode);
        } else if config.require_barcode {
            info!(attempts = orientation.attempts, "no barcode, skipping region searches");
            return Ok(LocalizationReport {
                orientation,
                tray: None,
                substrates: None,
                rectified,
            });
        }

        let working = &orientation.frame;

        let tray = if config.mode.includes_tray() {
            let outcome =
                regions::locate_quadrilaterals(working, &config.tray, config.brightness_offset)?;
            let start = rectified.len();
            let polygons = outcome.detections().iter().map(Quadrilateral::to_polygon);
            rectified.extend(rectify_regions(working, polygons, Role::Tray, &config.rectify)?);
            if let Some(sink) = sink {
                let mut images = vec![DynamicImage::ImageLuma8(outcome.mask.clone())];
                images.extend(outcome.result.annotated().map(rgb));
                sink.save(3, "tray", &images)?;
                let outputs: Vec<_> = rectified[start..].iter().map(|r| rgb(&r.image)).collect();
                sink.save(4, "tray_rectified", &outputs)?;
            }
            Some(outcome)
        } else {
            None
        };

        let substrates = if config.mode.includes_substrate() {
            let outcome =
                regions::locate_blobs(working, &config.substrate, config.brightness_offset)?;
            let start = rectified.len();
            let polygons = outcome.detections().iter().map(BoundingBox::to_polygon);
            rectified.extend(rectify_regions(working, polygons, Role::Substrate, &config.rectify)?);
            if let Some(sink) = sink {
                let mut images = vec![DynamicImage::ImageLuma8(outcome.mask.clone())];
                images.extend(outcome.result.annotated().map(rgb));
                sink.save(5, "substrate", &images)?;
                let outputs: Vec<_> = rectified[start..].iter().map(|r| rgb(&r.image)).collect();
                sink.save(6, "substrate_rectified", &outputs)?;
            }
            Some(outcome)
        } else {
            None
        };

        info!(
            barcode = orientation.is_found(),
            quarter_turns = orientation.quarter_turns,
            rectified = rectified.len(),
            "frame localized"
        );

        Ok(LocalizationReport {
            orientation,
            tray,
            substrates,
            rectified,
        })
    }
}
