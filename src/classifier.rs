use crate::detection::LocalizationReport;
use crate::models::Role;
use anyhow::Context;
use image::RgbImage;
use serde::Serialize;

/// Label and per-class confidences for one rectified image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub label: String,
    pub confidences: Vec<f32>,
}

impl Classification {
    /// Highest confidence, if any class was scored
    pub fn top_confidence(&self) -> Option<f32> {
        self.confidences.iter().copied().reduce(f32::max)
    }
}

/// Downstream model that labels rectified regions
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &RgbImage, role: Role) -> anyhow::Result<Classification>;

    /// Human-readable name (used in error context)
    fn name(&self) -> &str;
}

/// Classify every rectified image of a report, in report order
pub fn classify_all(
    classifier: &dyn Classifier,
    report: &LocalizationReport,
) -> anyhow::Result<Vec<(Role, Classification)>> {
    report
        .rectified
        .iter()
        .enumerate()
        .map(|(i, rectified)| {
            let classification = classifier
                .classify(&rectified.image, rectified.role)
                .with_context(|| {
                    format!("{} failed on {} #{}", classifier.name(), rectified.role, i + 1)
                })?;
            Ok((rectified.role, classification))
        })
        .collect()
}
