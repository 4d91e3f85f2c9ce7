//! Rotate-and-retry search for the barcode label.
//!
//! The label sits near the bottom edge of a correctly oriented frame. Each
//! attempt looks for the largest outline in the configured area window and
//! accepts it only when it lies entirely in the bottom half; otherwise the
//! frame is turned a quarter clockwise and searched again.

use super::annotate::{GREEN, draw_polygons};
use super::contours::{ReduceParams, reduce};
use super::preprocessing::extract;
use super::rectify::crop_polygon;
use crate::config::BarcodeConfig;
use crate::error::Result;
use crate::models::{BoundingBox, DetectionResult, Polygon};
use image::RgbImage;
use image::imageops::rotate90;
use tracing::{debug, info, warn};

/// Orientations tried before giving up
pub const MAX_ATTEMPTS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    /// Searching the frame after `k` quarter turns
    Attempt(u8),
    Found,
    Exhausted,
}

impl SearchState {
    /// Transition after an attempt. Terminal states stay put.
    pub fn next(self, accepted: bool) -> SearchState {
        match self {
            SearchState::Attempt(_) if accepted => SearchState::Found,
            SearchState::Attempt(k) if k + 1 < MAX_ATTEMPTS => SearchState::Attempt(k + 1),
            SearchState::Attempt(_) => SearchState::Exhausted,
            terminal => terminal,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, SearchState::Attempt(_))
    }
}

/// Accepted barcode candidate
#[derive(Debug, Clone)]
pub struct BarcodeHit {
    /// Outline in the coordinates of the rotated frame
    pub polygon: Polygon,
    /// Masked crop of the outline's bounding box
    pub crop: RgbImage,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone)]
pub struct OrientationOutcome {
    pub result: DetectionResult<BarcodeHit>,
    /// Frame in the orientation the search ended on. After an exhausted
    /// search this is the input turned three quarters clockwise (the last
    /// orientation examined), and region searches run on it when a barcode
    /// is not required.
    pub frame: RgbImage,
    /// Clockwise quarter turns applied to the input
    pub quarter_turns: u8,
    pub attempts: u8,
}

impl OrientationOutcome {
    pub fn is_found(&self) -> bool {
        self.result.is_found()
    }
}

pub struct OrientationSearch {
    config: BarcodeConfig,
}

impl OrientationSearch {
    pub fn new(config: BarcodeConfig) -> Self {
        Self { config }
    }

    fn params(&self) -> ReduceParams {
        ReduceParams {
            min_area: self.config.min_area,
            max_area: self.config.max_area,
            epsilon_factor: self.config.epsilon_factor,
            dilate_iterations: self.config.dilate_iterations,
        }
    }

    /// Examine one orientation. `Some` only for an accepted candidate.
    fn attempt(&self, frame: &RgbImage, k: u8) -> Result<Option<BarcodeHit>> {
        let edges = extract(frame, self.config.blur_kernel, self.config.blur_sigma)?;
        let polygons = reduce(&edges, &self.params());
        debug!(attempt = k, candidates = polygons.len(), "barcode search attempt");

        let Some(largest) = polygons.into_iter().next() else {
            return Ok(None);
        };

        let midline = frame.height() as f64 / 2.0;
        if !largest.lies_below(midline) {
            debug!(
                attempt = k,
                vertices = largest.len(),
                "largest outline reaches above the midline"
            );
            return Ok(None);
        }

        match crop_polygon(frame, &largest) {
            Ok((crop, bbox)) => Ok(Some(BarcodeHit {
                polygon: largest,
                crop,
                bbox,
            })),
            Err(err) if err.is_recoverable() => {
                warn!(attempt = k, error = %err, "rejecting uncroppable outline");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Run the search. An empty frame is the only error; an unsuccessful
    /// search is reported as `NotFound` with the frame after three turns.
    pub fn locate(&self, image: &RgbImage) -> Result<OrientationOutcome> {
        let mut frame = image.clone();
        let mut state = SearchState::Attempt(0);
        let mut hit = None;
        let mut attempts = 0;
        let mut quarter_turns = 0;

        while let SearchState::Attempt(k) = state {
            attempts += 1;
            hit = self.attempt(&frame, k)?;
            state = state.next(hit.is_some());
            if let SearchState::Attempt(next) = state {
                frame = rotate90(&frame);
                quarter_turns = next;
            }
        }

        let result = match hit {
            Some(hit) => {
                info!(attempts, quarter_turns, vertices = hit.polygon.len(), "barcode found");
                let annotated = draw_polygons(&frame, std::slice::from_ref(&hit.polygon), GREEN);
                DetectionResult::Found {
                    detection: hit,
                    annotated,
                }
            }
            None => {
                info!(attempts, "barcode not found in any orientation");
                DetectionResult::NotFound
            }
        };

        Ok(OrientationOutcome {
            result,
            frame,
            quarter_turns,
            attempts,
        })
    }
}
