use crate::error::{Result, ensure_not_empty};
use image::{GrayImage, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::separable_filter_equal;
use imageproc::stats::histogram;

/// Convert image to grayscale
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    image::imageops::grayscale(img)
}

/// Normalized 1-D Gaussian kernel.
///
/// Follows the OpenCV conventions: a `kernel_size` of 0 derives the size from
/// sigma, and a non-positive sigma derives sigma from the size.
pub fn gaussian_kernel(kernel_size: u32, sigma: f32) -> Vec<f32> {
    let size = if kernel_size == 0 {
        ((sigma * 6.0 + 1.0).round() as u32) | 1
    } else {
        kernel_size | 1
    };
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
    };

    let radius = (size / 2) as i32;
    let weights: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Apply Gaussian blur with an explicit kernel size
pub fn apply_blur(img: &GrayImage, kernel_size: u32, sigma: f32) -> GrayImage {
    let kernel = gaussian_kernel(kernel_size, sigma);
    separable_filter_equal(img, &kernel)
}

/// Color variant of [`apply_blur`], used ahead of color segmentation
pub fn apply_blur_rgb(img: &RgbImage, kernel_size: u32, sigma: f32) -> RgbImage {
    let kernel = gaussian_kernel(kernel_size, sigma);
    separable_filter_equal(img, &kernel)
}

/// Median intensity; averages the two middle samples for even pixel counts
pub fn median_intensity(img: &GrayImage) -> f32 {
    let hist = histogram(img);
    let counts = &hist.channels[0];
    let total: u64 = counts.iter().map(|&c| c as u64).sum();
    if total == 0 {
        return 0.0;
    }

    let value_at = |rank: u64| -> f32 {
        let mut seen = 0u64;
        for (value, &count) in counts.iter().enumerate() {
            seen += count as u64;
            if seen > rank {
                return value as f32;
            }
        }
        255.0
    };

    (value_at((total - 1) / 2) + value_at(total / 2)) / 2.0
}

/// Canny thresholds relative to the median: 0.7x and 1.3x, clamped to the
/// 8-bit range. Both are floored at 1 because imageproc keeps gradients equal
/// to the threshold, and a zero threshold would turn every flat pixel into an
/// edge.
pub fn adaptive_thresholds(median: f32) -> (f32, f32) {
    let lower = (0.7 * median).floor().clamp(0.0, 255.0).max(1.0);
    let upper = (1.3 * median).floor().clamp(0.0, 255.0).max(1.0);
    (lower, upper)
}

/// Canny edges with median-derived thresholds
pub fn detect_edges(img: &GrayImage) -> GrayImage {
    let (lower, upper) = adaptive_thresholds(median_intensity(img));
    canny(img, lower, upper)
}

/// Grayscale, blur, then median-adaptive Canny
pub fn extract(img: &RgbImage, blur_kernel: u32, blur_sigma: f32) -> Result<GrayImage> {
    ensure_not_empty(img.dimensions(), "edge extraction input")?;
    let gray = to_grayscale(img);
    let blurred = apply_blur(&gray, blur_kernel, blur_sigma);
    Ok(detect_edges(&blurred))
}
