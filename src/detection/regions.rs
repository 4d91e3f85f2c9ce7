//! Color-driven region search with ordered fallback ranges.
//!
//! Both modes share the same shape: brighten and blur the frame once, convert
//! to HSV, then walk the configured ranges until one produces enough
//! detections. The tray mode looks for large quadrilaterals in the outline of
//! the gray mask, the substrate mode for roughly square blobs of green/yellow.

use super::annotate::{RED, draw_boxes, draw_polygons};
use super::color::{HsvImage, brighten, segment_hsv};
use super::contours::{ReduceParams, bounding_box, dilate_mask, external_contours, reduce};
use super::preprocessing::{apply_blur_rgb, detect_edges};
use crate::config::{SubstrateConfig, TrayConfig};
use crate::error::{LocateError, Result, ensure_not_empty};
use crate::models::{BoundingBox, ColorRange, DetectionResult, Quadrilateral};
use image::{GrayImage, RgbImage};
use tracing::{debug, info, warn};

/// Result of walking a list of ranges
#[derive(Debug, Clone)]
pub struct Fallback<R> {
    pub output: R,
    /// Range that produced `output`
    pub range_index: usize,
    pub ranges_tried: usize,
    pub accepted: bool,
}

/// Try `search` on each range in order and stop at the first output `accept`
/// approves. When none is approved the last range's output is returned.
pub fn run_fallback<R>(
    ranges: &[ColorRange],
    mut search: impl FnMut(usize, &ColorRange) -> R,
    accept: impl Fn(&R) -> bool,
) -> Result<Fallback<R>> {
    let mut last = None;
    for (index, range) in ranges.iter().enumerate() {
        let output = search(index, range);
        if accept(&output) {
            return Ok(Fallback {
                output,
                range_index: index,
                ranges_tried: index + 1,
                accepted: true,
            });
        }
        last = Some((index, output));
    }

    let (index, output) =
        last.ok_or_else(|| LocateError::invalid_input("no color ranges to search"))?;
    Ok(Fallback {
        output,
        range_index: index,
        ranges_tried: ranges.len(),
        accepted: false,
    })
}

/// Detections for one range plus the mask they came from
#[derive(Debug, Clone)]
pub struct RangeOutput<T> {
    pub items: Vec<T>,
    pub mask: GrayImage,
}

#[derive(Debug, Clone)]
pub struct RegionOutcome<T> {
    pub result: DetectionResult<Vec<T>>,
    pub range_index: usize,
    pub ranges_tried: usize,
    /// Minimum number of detections the search was after
    pub target: usize,
    pub target_met: bool,
    /// Segmentation mask of the range that was kept
    pub mask: GrayImage,
}

impl<T> RegionOutcome<T> {
    pub fn detections(&self) -> &[T] {
        self.result.detection().map(Vec::as_slice).unwrap_or(&[])
    }
}

fn prepare(
    image: &RgbImage,
    brightness_offset: u8,
    blur_kernel: u32,
    blur_sigma: f32,
) -> Result<HsvImage> {
    ensure_not_empty(image.dimensions(), "region search input")?;
    let bright = brighten(image, brightness_offset);
    let blurred = apply_blur_rgb(&bright, blur_kernel, blur_sigma);
    Ok(HsvImage::from_rgb(&blurred))
}

fn search_ranges<T>(
    stage: &str,
    ranges: &[ColorRange],
    target: usize,
    mut search: impl FnMut(&ColorRange) -> RangeOutput<T>,
) -> Result<Fallback<RangeOutput<T>>> {
    let fallback = run_fallback(
        ranges,
        |index, range| {
            let output = search(range);
            debug!(stage, range = index, found = output.items.len(), "searched color range");
            if output.items.len() < target && index + 1 < ranges.len() {
                warn!(
                    stage,
                    range = index,
                    found = output.items.len(),
                    target,
                    "below target, falling back to next range"
                );
            }
            output
        },
        |output| output.items.len() >= target,
    )?;

    info!(
        stage,
        range = fallback.range_index,
        tried = fallback.ranges_tried,
        found = fallback.output.items.len(),
        target_met = fallback.accepted,
        "region search finished"
    );
    Ok(fallback)
}

/// Large quadrilaterals within the gray tray ranges
pub fn locate_quadrilaterals(
    image: &RgbImage,
    config: &TrayConfig,
    brightness_offset: u8,
) -> Result<RegionOutcome<Quadrilateral>> {
    let hsv = prepare(image, brightness_offset, config.blur_kernel, config.blur_sigma)?;
    let params = ReduceParams {
        min_area: config.min_area,
        max_area: config.max_area.unwrap_or(f64::INFINITY),
        epsilon_factor: config.epsilon_factor,
        dilate_iterations: config.dilate_iterations,
    };

    let fallback = search_ranges("tray", &config.ranges, 1, |range| {
        let mask = segment_hsv(&hsv, range);
        let items = reduce(&detect_edges(&mask), &params)
            .iter()
            .filter_map(|polygon| polygon.to_quadrilateral())
            .collect();
        RangeOutput { items, mask }
    })?;

    let Fallback {
        output: RangeOutput { items, mask },
        range_index,
        ranges_tried,
        accepted,
    } = fallback;
    let result = if items.is_empty() {
        DetectionResult::NotFound
    } else {
        let outlines: Vec<_> = items.iter().map(Quadrilateral::to_polygon).collect();
        DetectionResult::Found {
            annotated: draw_polygons(image, &outlines, RED),
            detection: items,
        }
    };

    Ok(RegionOutcome {
        result,
        range_index,
        ranges_tried,
        target: 1,
        target_met: accepted,
        mask,
    })
}

fn keep_blob(bbox: &BoundingBox, config: &SubstrateConfig) -> bool {
    let ratio = bbox.aspect_ratio();
    bbox.width > config.min_width
        && bbox.height > config.min_height
        && ratio >= config.min_aspect_ratio
        && ratio <= config.max_aspect_ratio
}

/// Roughly square green/yellow blobs, in reading order
pub fn locate_blobs(
    image: &RgbImage,
    config: &SubstrateConfig,
    brightness_offset: u8,
) -> Result<RegionOutcome<BoundingBox>> {
    let hsv = prepare(image, brightness_offset, config.blur_kernel, config.blur_sigma)?;
    let target = config.expected_count;

    let fallback = search_ranges("substrate", &config.ranges, target, |range| {
        let mask = dilate_mask(&segment_hsv(&hsv, range), config.dilate_iterations);
        let mut items: Vec<BoundingBox> = external_contours(&mask)
            .iter()
            .filter_map(|points| bounding_box(points))
            .filter(|bbox| keep_blob(bbox, config))
            .collect();
        items.sort_by_key(|b| (b.y, b.x));
        RangeOutput { items, mask }
    })?;

    let Fallback {
        output: RangeOutput { items, mask },
        range_index,
        ranges_tried,
        accepted,
    } = fallback;
    let result = if items.is_empty() {
        DetectionResult::NotFound
    } else {
        DetectionResult::Found {
            annotated: draw_boxes(image, &items, RED),
            detection: items,
        }
    };

    Ok(RegionOutcome {
        result,
        range_index,
        ranges_tried,
        target,
        target_met: accepted,
        mask,
    })
}
