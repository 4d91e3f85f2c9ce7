use crate::models::{BoundingBox, Polygon, shoelace_area};
use image::GrayImage;
use imageproc::contours::{BorderType, find_contours_with_threshold};
use imageproc::distance_transform::Norm;
use imageproc::geometry::approximate_polygon_dp;
use imageproc::morphology::dilate;
use imageproc::point::Point;

/// Area window and simplification settings for [`reduce`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReduceParams {
    pub min_area: f64,
    pub max_area: f64,
    pub epsilon_factor: f64,
    pub dilate_iterations: u8,
}

/// Grow white regions by `iterations` passes of a 3x3 square element
pub fn dilate_mask(mask: &GrayImage, iterations: u8) -> GrayImage {
    if iterations == 0 {
        return mask.clone();
    }
    // An L-infinity ball of radius k equals k passes of a 3x3 square.
    dilate(mask, Norm::LInf, iterations)
}

/// Outermost borders of the regions brighter than `threshold`
pub fn external_contours_above(image: &GrayImage, threshold: u8) -> Vec<Vec<Point<i32>>> {
    find_contours_with_threshold::<i32>(image, threshold)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points)
        .collect()
}

/// Outermost borders of the non-zero regions of a binary map
pub fn external_contours(binary: &GrayImage) -> Vec<Vec<Point<i32>>> {
    external_contours_above(binary, 0)
}

/// Inclusive bounding box of a traced contour
pub fn bounding_box(points: &[Point<i32>]) -> Option<BoundingBox> {
    Polygon::new(points.to_vec()).bounding_box()
}

fn farthest_from(points: &[Point<i32>], origin: Point<i32>) -> usize {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let dx = (p.x - origin.x) as i64;
            let dy = (p.y - origin.y) as i64;
            (i, dx * dx + dy * dy)
        })
        .fold((0, 0), |best, cur| if cur.1 > best.1 { cur } else { best })
        .0
}

/// Douglas-Peucker simplification of a closed contour.
///
/// The contour is split at two mutually distant points and each half is
/// simplified as an open curve. Both split points are extremal, so they are
/// genuine vertices and the result does not depend on where the tracer
/// happened to start.
pub fn approximate_closed(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 3 || epsilon <= 0.0 {
        return points.to_vec();
    }

    let a = farthest_from(points, points[0]);
    let b = farthest_from(points, points[a]);
    if a == b {
        return vec![points[a]];
    }
    let (start, end) = (a.min(b), a.max(b));

    let mut result = approximate_polygon_dp(&points[start..=end], epsilon, false);
    let mut wrap = points[end..].to_vec();
    wrap.extend_from_slice(&points[..=start]);
    let tail = approximate_polygon_dp(&wrap, epsilon, false);

    // `end` opens the wrapped half and `start` closes it
    result.pop();
    result.extend(tail);
    result.pop();
    result.dedup();
    result
}

/// Simplify one contour with a tolerance relative to its closed perimeter
pub fn simplify(points: &[Point<i32>], epsilon_factor: f64) -> Polygon {
    let perimeter = Polygon::new(points.to_vec()).perimeter();
    Polygon::new(approximate_closed(points, epsilon_factor * perimeter))
}

/// External contours whose area lies in `[min_area, max_area]`, largest
/// first, each simplified to a polygon. Approximations that collapse below
/// three vertices are dropped.
pub fn reduce(edge_map: &GrayImage, params: &ReduceParams) -> Vec<Polygon> {
    let working = dilate_mask(edge_map, params.dilate_iterations);

    let mut candidates: Vec<(f64, Vec<Point<i32>>)> = external_contours(&working)
        .into_iter()
        .map(|points| (shoelace_area(&points), points))
        .filter(|(area, _)| *area >= params.min_area && *area <= params.max_area)
        .collect();
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    candidates
        .into_iter()
        .map(|(_, points)| simplify(&points, params.epsilon_factor))
        .filter(|polygon| polygon.len() >= 3)
        .collect()
}
