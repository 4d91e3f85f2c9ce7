//! Perspective rectification of quadrilateral regions.
//!
//! A region is first cut out of the frame with everything outside the polygon
//! blacked out. The non-black part of that crop is re-approximated; when it
//! reduces to four corners they are put into canonical order and the crop is
//! warped onto an axis-aligned rectangle. Anything else hands back the crop
//! unchanged.

use crate::config::RectifyConfig;
use crate::detection::contours::{external_contours_above, simplify};
use crate::detection::preprocessing::to_grayscale;
use crate::error::{LocateError, Result, ensure_not_empty};
use crate::models::{
    BoundingBox, Corners, Polygon, Quadrilateral, Rectification, RectifiedImage, Role,
    shoelace_area,
};
use image::{GrayImage, Luma, Rgb, RgbImage, imageops};
use imageproc::drawing::draw_polygon_mut;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use std::cmp::Ordering;
use tracing::{debug, warn};

fn pick(points: &[(f32, f32); 4], key: impl Fn(&(f32, f32)) -> f32, want: Ordering) -> (f32, f32) {
    // ties resolve on (x, y) so the choice never depends on input order
    let rank = |p: &(f32, f32)| (key(p), p.0, p.1);
    let cmp = |a: &(f32, f32), b: &(f32, f32)| {
        let (ka, xa, ya) = rank(a);
        let (kb, xb, yb) = rank(b);
        ka.total_cmp(&kb)
            .then(xa.total_cmp(&xb))
            .then(ya.total_cmp(&yb))
    };
    let best = match want {
        Ordering::Less => points.iter().min_by(|a, b| cmp(a, b)),
        _ => points.iter().max_by(|a, b| cmp(a, b)),
    };
    *best.unwrap_or(&points[0])
}

/// Assign canonical corner roles by coordinate sums and differences.
///
/// Top-left has the smallest `x + y`, bottom-right the largest; top-right has
/// the smallest `y - x`, bottom-left the largest.
pub fn order_corners(points: [(f32, f32); 4]) -> Corners {
    Corners {
        top_left: pick(&points, |p| p.0 + p.1, Ordering::Less),
        top_right: pick(&points, |p| p.1 - p.0, Ordering::Less),
        bottom_right: pick(&points, |p| p.0 + p.1, Ordering::Greater),
        bottom_left: pick(&points, |p| p.1 - p.0, Ordering::Greater),
    }
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Longer of each pair of opposing edges: `(width, height)`
pub fn target_size(corners: &Corners) -> (f32, f32) {
    let width = distance(corners.top_left, corners.top_right)
        .max(distance(corners.bottom_left, corners.bottom_right));
    let height = distance(corners.top_left, corners.bottom_left)
        .max(distance(corners.top_right, corners.bottom_right));
    (width, height)
}

/// Warp the quadrilateral onto an axis-aligned rectangle.
///
/// Output dimensions count pixels: a span of `d` between corner pixel centres
/// becomes `round(d) + 1` columns, so an axis-aligned region maps onto itself.
pub fn warp_quadrilateral(img: &RgbImage, quad: &Quadrilateral) -> Result<(RgbImage, Corners)> {
    ensure_not_empty(img.dimensions(), "rectification input")?;

    let corners = order_corners(quad.to_f32());
    let roles = corners.to_array();
    for i in 0..4 {
        for j in i + 1..4 {
            if roles[i] == roles[j] {
                return Err(LocateError::degenerate(format!(
                    "corner ordering assigned {:?} to two roles",
                    roles[i]
                )));
            }
        }
    }

    let (width, height) = target_size(&corners);
    let span_x = width.round();
    let span_y = height.round();
    if !(span_x >= 1.0 && span_y >= 1.0) {
        return Err(LocateError::degenerate(format!(
            "target size {width:.1}x{height:.1} is not positive"
        )));
    }

    let dest = [
        (0.0, 0.0),
        (span_x, 0.0),
        (span_x, span_y),
        (0.0, span_y),
    ];
    let projection = Projection::from_control_points(roles, dest).ok_or_else(|| {
        LocateError::degenerate(format!("no homography maps {roles:?} onto the rectangle"))
    })?;

    let mut out = RgbImage::new(span_x as u32 + 1, span_y as u32 + 1);
    warp_into(img, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut out);
    Ok((out, corners))
}

/// Bounding box of the polygon clipped to the image, `None` when they do not
/// overlap
fn clamped_bbox(img: &RgbImage, polygon: &Polygon) -> Option<BoundingBox> {
    let bbox = polygon
        .bounding_box()
        .filter(|b| b.x < img.width() && b.y < img.height())?;
    Some(BoundingBox {
        width: bbox.width.min(img.width() - bbox.x),
        height: bbox.height.min(img.height() - bbox.y),
        ..bbox
    })
}

/// Cut the polygon out of the image: pixels outside it are blacked out and
/// the result is cropped to the polygon's bounding box.
pub fn crop_polygon(img: &RgbImage, polygon: &Polygon) -> Result<(RgbImage, BoundingBox)> {
    ensure_not_empty(img.dimensions(), "crop input")?;

    let mut vertices = polygon.vertices().to_vec();
    vertices.dedup();
    while vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    if vertices.len() < 3 {
        return Err(LocateError::degenerate(format!(
            "cannot crop a polygon with {} distinct vertices",
            vertices.len()
        )));
    }

    let bbox = clamped_bbox(img, polygon)
        .ok_or_else(|| LocateError::degenerate("polygon lies outside the image"))?;

    let mut mask = GrayImage::new(img.width(), img.height());
    draw_polygon_mut(&mut mask, &vertices, Luma([255u8]));

    let crop = RgbImage::from_fn(bbox.width, bbox.height, |x, y| {
        let (sx, sy) = (bbox.x + x, bbox.y + y);
        if mask.get_pixel(sx, sy)[0] > 0 {
            *img.get_pixel(sx, sy)
        } else {
            Rgb([0, 0, 0])
        }
    });
    Ok((crop, bbox))
}

/// Re-derive the four corners of the region left in a masked crop
pub fn reapproximate(crop: &RgbImage, config: &RectifyConfig) -> Result<Quadrilateral> {
    let gray = to_grayscale(crop);
    let largest = external_contours_above(&gray, config.background_threshold)
        .into_iter()
        .max_by(|a, b| shoelace_area(a).total_cmp(&shoelace_area(b)))
        .ok_or_else(|| LocateError::not_found("crop has no foreground region"))?;

    let polygon = simplify(&largest, config.epsilon_factor);
    polygon.to_quadrilateral().ok_or_else(|| {
        LocateError::degenerate(format!(
            "re-approximation produced {} vertices instead of 4",
            polygon.len()
        ))
    })
}

/// Crop the polygon, then warp it to a rectangle if its region still has
/// exactly four corners. Degenerate geometry yields the crop itself. A
/// polygon too collapsed to mask yields the plain bounding-box crop; only a
/// polygon entirely outside the image is an error.
pub fn rectify(
    img: &RgbImage,
    polygon: &Polygon,
    role: Role,
    config: &RectifyConfig,
) -> Result<RectifiedImage> {
    let (crop, bbox) = match crop_polygon(img, polygon) {
        Ok(cropped) => cropped,
        Err(err) if err.is_recoverable() => return box_crop(img, polygon, role, err),
        Err(err) => return Err(err),
    };
    debug!(
        %role,
        x = bbox.x,
        y = bbox.y,
        width = bbox.width,
        height = bbox.height,
        "cropped region"
    );

    let warped = reapproximate(&crop, config).and_then(|quad| warp_quadrilateral(&crop, &quad));
    match warped {
        Ok((image, corners)) => {
            debug!(%role, width = image.width(), height = image.height(), "rectified");
            Ok(RectifiedImage {
                role,
                image,
                rectification: Rectification::Warped { corners },
            })
        }
        Err(err) if err.is_recoverable() => {
            warn!(%role, error = %err, "returning unrectified crop");
            Ok(RectifiedImage {
                role,
                image: crop,
                rectification: Rectification::Unrectified {
                    reason: err.to_string(),
                },
            })
        }
        Err(err) => Err(err),
    }
}

fn box_crop(
    img: &RgbImage,
    polygon: &Polygon,
    role: Role,
    err: LocateError,
) -> Result<RectifiedImage> {
    let Some(bbox) = clamped_bbox(img, polygon) else {
        return Err(err);
    };
    warn!(%role, error = %err, "returning unmasked box crop");
    let image = imageops::crop_imm(img, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
    Ok(RectifiedImage {
        role,
        image,
        rectification: Rectification::Unrectified {
            reason: err.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use imageproc::point::Point;

    #[test]
    fn orders_axis_aligned_corners() {
        let corners = order_corners([(10.0, 50.0), (90.0, 10.0), (10.0, 10.0), (90.0, 50.0)]);
        assert_eq!(corners.top_left, (10.0, 10.0));
        assert_eq!(corners.top_right, (90.0, 10.0));
        assert_eq!(corners.bottom_right, (90.0, 50.0));
        assert_eq!(corners.bottom_left, (10.0, 50.0));
    }

    #[test]
    fn orders_keystoned_corners() {
        let corners = order_corners([(30.0, 10.0), (70.0, 12.0), (95.0, 80.0), (5.0, 78.0)]);
        assert_eq!(corners.top_left, (30.0, 10.0));
        assert_eq!(corners.top_right, (70.0, 12.0));
        assert_eq!(corners.bottom_right, (95.0, 80.0));
        assert_eq!(corners.bottom_left, (5.0, 78.0));
    }

    #[test]
    fn target_size_takes_longer_edges() {
        let corners = Corners {
            top_left: (0.0, 0.0),
            top_right: (30.0, 0.0),
            bottom_right: (40.0, 20.0),
            bottom_left: (0.0, 20.0),
        };
        let (w, h) = target_size(&corners);
        assert_relative_eq!(w, 40.0);
        assert_relative_eq!(h, (10.0f32 * 10.0 + 20.0 * 20.0).sqrt());
    }

    #[test]
    fn collapsed_quad_is_degenerate() {
        let img = RgbImage::new(20, 20);
        let quad = Quadrilateral::new([
            Point::new(5, 5),
            Point::new(5, 5),
            Point::new(5, 5),
            Point::new(5, 5),
        ]);
        let err = warp_quadrilateral(&img, &quad).unwrap_err();
        assert!(matches!(err, LocateError::DegenerateGeometry { .. }));
    }

    #[test]
    fn crop_blacks_out_everything_outside_polygon() {
        let img = RgbImage::from_pixel(40, 40, Rgb([200, 200, 200]));
        let triangle = Polygon::new(vec![Point::new(0, 0), Point::new(30, 0), Point::new(0, 30)]);
        let (crop, bbox) = crop_polygon(&img, &triangle).unwrap();
        assert_eq!((bbox.width, bbox.height), (31, 31));
        assert_eq!(crop.get_pixel(2, 2).0, [200, 200, 200]);
        assert_eq!(crop.get_pixel(29, 29).0, [0, 0, 0]);
    }

    #[test]
    fn crop_rejects_two_point_polygon() {
        let img = RgbImage::new(10, 10);
        let line = Polygon::new(vec![Point::new(0, 0), Point::new(5, 5), Point::new(0, 0)]);
        assert!(crop_polygon(&img, &line).is_err());
    }

    #[test]
    fn single_pixel_box_yields_unmasked_crop() {
        let img = RgbImage::from_pixel(40, 40, Rgb([0, 200, 0]));
        let pixel = BoundingBox {
            x: 10,
            y: 10,
            width: 1,
            height: 1,
        };
        let out = rectify(&img, &pixel.to_polygon(), Role::Substrate, &RectifyConfig::default())
            .unwrap();
        assert!(matches!(out.rectification, Rectification::Unrectified { .. }));
        assert_eq!(out.image.dimensions(), (1, 1));
        assert_eq!(out.image.get_pixel(0, 0).0, [0, 200, 0]);
    }

    #[test]
    fn collapsed_polygon_outside_image_is_degenerate() {
        let img = RgbImage::new(20, 20);
        let line = Polygon::new(vec![Point::new(30, 30), Point::new(35, 35)]);
        let err = rectify(&img, &line, Role::Tray, &RectifyConfig::default()).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn non_quadrilateral_region_falls_back_to_crop() {
        let mut img = RgbImage::new(100, 100);
        let triangle =
            Polygon::new(vec![Point::new(10, 10), Point::new(80, 10), Point::new(45, 80)]);
        draw_polygon_mut(&mut img, triangle.vertices(), Rgb([255, 255, 255]));

        let out = rectify(&img, &triangle, Role::Tray, &RectifyConfig::default()).unwrap();
        assert!(!out.is_warped());
        assert!(matches!(out.rectification, Rectification::Unrectified { .. }));
        assert_eq!(out.image.dimensions(), (71, 71));
    }

    #[test]
    fn rectangle_region_is_warped_to_its_size() {
        let mut img = RgbImage::new(120, 90);
        for y in 20..60 {
            for x in 30..100 {
                img.put_pixel(x, y, Rgb([240, 240, 240]));
            }
        }
        let polygon = Polygon::new(vec![
            Point::new(28, 18),
            Point::new(101, 18),
            Point::new(101, 61),
            Point::new(28, 61),
        ]);
        let out = rectify(&img, &polygon, Role::Barcode, &RectifyConfig::default()).unwrap();
        assert!(out.is_warped());
        assert_eq!(out.image.dimensions(), (70, 40));
    }
}
