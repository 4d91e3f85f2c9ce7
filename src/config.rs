//! Tunable parameters for the localization pipeline.
//!
//! Every threshold here was tuned against one camera rig and working
//! distance, so all of them are configuration rather than literals. Missing
//! JSON fields fall back to the rig defaults:
//!
//! ```no_run
//! use traylocate::LocatorConfig;
//! use std::path::Path;
//!
//! let config = LocatorConfig::from_json_file(Path::new("rig.json"))?;
//! # Ok::<(), traylocate::LocateError>(())
//! ```

use crate::error::{LocateError, Result};
use crate::models::ColorRange;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which region searches run after the barcode search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RegionMode {
    Tray,
    Substrate,
    Both,
}

impl RegionMode {
    pub fn includes_tray(self) -> bool {
        matches!(self, RegionMode::Tray | RegionMode::Both)
    }

    pub fn includes_substrate(self) -> bool {
        matches!(self, RegionMode::Substrate | RegionMode::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub frame: FrameConfig,
    pub barcode: BarcodeConfig,
    pub tray: TrayConfig,
    pub substrate: SubstrateConfig,
    pub rectify: RectifyConfig,

    /// Added to the HSV value channel before color segmentation
    pub brightness_offset: u8,

    pub mode: RegionMode,

    /// Skip region searches when no barcode was found
    pub require_barcode: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            barcode: BarcodeConfig::default(),
            tray: TrayConfig::default(),
            substrate: SubstrateConfig::default(),
            rectify: RectifyConfig::default(),
            brightness_offset: 50,
            mode: RegionMode::Tray,
            require_barcode: true,
        }
    }
}

/// Working resolution frames are normalized to before processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub width: u32,
    pub height: u32,
    pub resize: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            resize: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarcodeConfig {
    pub min_area: f64,
    pub max_area: f64,
    pub blur_kernel: u32,
    pub blur_sigma: f32,
    pub epsilon_factor: f64,
    /// 3x3 dilation passes over the edge map to close broken outlines
    pub dilate_iterations: u8,
}

impl Default for BarcodeConfig {
    fn default() -> Self {
        Self {
            min_area: 5_000.0,
            max_area: 100_000.0,
            blur_kernel: 3,
            blur_sigma: 3.0,
            epsilon_factor: 0.02,
            dilate_iterations: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrayConfig {
    pub min_area: f64,
    /// No upper bound when absent
    pub max_area: Option<f64>,
    pub epsilon_factor: f64,
    /// 0 derives the kernel size from sigma
    pub blur_kernel: u32,
    pub blur_sigma: f32,
    pub dilate_iterations: u8,
    /// Gray ranges, strictest first
    pub ranges: Vec<ColorRange>,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            min_area: 50_000.0,
            max_area: None,
            epsilon_factor: 0.02,
            blur_kernel: 0,
            blur_sigma: 1.0,
            dilate_iterations: 1,
            ranges: vec![
                ColorRange::new([0, 0, 60], [180, 60, 180]),
                ColorRange::new([0, 0, 60], [180, 60, 140]),
                ColorRange::new([0, 0, 60], [180, 20, 180]),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstrateConfig {
    pub min_width: u32,
    pub min_height: u32,
    pub expected_count: usize,
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
    pub blur_kernel: u32,
    /// 0 derives sigma from the kernel size
    pub blur_sigma: f32,
    pub dilate_iterations: u8,
    /// Green/yellow ranges in fallback order
    pub ranges: Vec<ColorRange>,
}

impl Default for SubstrateConfig {
    fn default() -> Self {
        Self {
            min_width: 100,
            min_height: 100,
            expected_count: 6,
            min_aspect_ratio: 0.8,
            max_aspect_ratio: 1.2,
            blur_kernel: 5,
            blur_sigma: 0.0,
            dilate_iterations: 2,
            ranges: vec![
                ColorRange::new([5, 30, 30], [95, 255, 255]),
                ColorRange::new([10, 40, 40], [90, 255, 255]),
                ColorRange::new([15, 50, 50], [85, 255, 255]),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    /// Simplification tolerance when re-approximating the cropped region
    pub epsilon_factor: f64,
    /// Crop pixels at or below this intensity count as masked background
    pub background_threshold: u8,
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            epsilon_factor: 0.02,
            background_threshold: 1,
        }
    }
}

impl LocatorConfig {
    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LocateError::config_with_source(format!("cannot read {}", path.display()), e)
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| LocateError::config_with_source("malformed configuration JSON", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LocateError::config_with_source("cannot serialize configuration", e))
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(LocateError::config("frame dimensions must be positive"));
        }

        let b = &self.barcode;
        check_area_window("barcode", b.min_area, Some(b.max_area))?;
        check_epsilon("barcode", b.epsilon_factor)?;
        check_blur("barcode", b.blur_kernel, b.blur_sigma)?;

        let t = &self.tray;
        check_area_window("tray", t.min_area, t.max_area)?;
        check_epsilon("tray", t.epsilon_factor)?;
        check_blur("tray", t.blur_kernel, t.blur_sigma)?;
        check_ranges("tray", &t.ranges)?;

        let s = &self.substrate;
        check_blur("substrate", s.blur_kernel, s.blur_sigma)?;
        check_ranges("substrate", &s.ranges)?;
        if !(s.min_aspect_ratio > 0.0 && s.min_aspect_ratio <= s.max_aspect_ratio) {
            return Err(LocateError::config(format!(
                "substrate aspect ratio window [{}, {}] is empty",
                s.min_aspect_ratio, s.max_aspect_ratio
            )));
        }
        if s.expected_count == 0 {
            return Err(LocateError::config("substrate expected_count must be at least 1"));
        }

        check_epsilon("rectify", self.rectify.epsilon_factor)?;
        Ok(())
    }
}

fn check_area_window(stage: &str, min_area: f64, max_area: Option<f64>) -> Result<()> {
    if !(min_area >= 0.0) {
        return Err(LocateError::config(format!(
            "{stage} min_area must be non-negative, got {min_area}"
        )));
    }
    if let Some(max_area) = max_area {
        if !(max_area >= min_area) {
            return Err(LocateError::config(format!(
                "{stage} max_area {max_area} is below min_area {min_area}"
            )));
        }
    }
    Ok(())
}

fn check_epsilon(stage: &str, epsilon_factor: f64) -> Result<()> {
    if !(epsilon_factor > 0.0 && epsilon_factor < 1.0) {
        return Err(LocateError::config(format!(
            "{stage} epsilon_factor must be in (0, 1), got {epsilon_factor}"
        )));
    }
    Ok(())
}

fn check_blur(stage: &str, kernel: u32, sigma: f32) -> Result<()> {
    if kernel != 0 && kernel % 2 == 0 {
        return Err(LocateError::config(format!(
            "{stage} blur kernel must be odd, got {kernel}"
        )));
    }
    if kernel == 0 && !(sigma > 0.0) {
        return Err(LocateError::config(format!(
            "{stage} blur needs a kernel size or a positive sigma"
        )));
    }
    Ok(())
}

fn check_ranges(stage: &str, ranges: &[ColorRange]) -> Result<()> {
    if ranges.is_empty() {
        return Err(LocateError::config(format!("{stage} needs at least one color range")));
    }
    for (index, range) in ranges.iter().enumerate() {
        let inverted = (0..3).any(|c| range.lower[c] > range.upper[c]);
        if inverted || range.upper[0] > 180 {
            return Err(LocateError::config(format!(
                "{stage} range {index} is invalid: {:?}..{:?}",
                range.lower, range.upper
            )));
        }
    }
    Ok(())
}
