use image::RgbImage;
use imageproc::geometry::arc_length;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic role of a localized region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Barcode,
    Tray,
    Substrate,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Barcode => "barcode",
            Role::Tray => "tray",
            Role::Substrate => "substrate",
        };
        f.write_str(name)
    }
}

/// Axis-aligned box in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Corners of the box as a closed polygon, clockwise from top-left
    pub fn to_polygon(&self) -> Polygon {
        let x0 = self.x as i32;
        let y0 = self.y as i32;
        let x1 = x0 + self.width.saturating_sub(1) as i32;
        let y1 = y0 + self.height.saturating_sub(1) as i32;
        Polygon::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }
}

/// Approximated contour. Vertices keep the tracer's winding order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polygon {
    vertices: Vec<Point<i32>>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point<i32>>) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Point<i32>] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Enclosed area (shoelace formula)
    pub fn area(&self) -> f64 {
        shoelace_area(&self.vertices)
    }

    /// Closed perimeter
    pub fn perimeter(&self) -> f64 {
        if self.vertices.len() < 2 {
            return 0.0;
        }
        arc_length(&self.vertices, true)
    }

    /// Inclusive bounding box of the vertices, `None` for an empty polygon or
    /// one lying entirely at negative coordinates.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.vertices.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.vertices[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if max_x < 0 || max_y < 0 {
            return None;
        }
        let min_x = min_x.max(0);
        let min_y = min_y.max(0);
        Some(BoundingBox {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        })
    }

    /// True when every vertex sits at or below `y`
    pub fn lies_below(&self, y: f64) -> bool {
        !self.vertices.is_empty() && self.vertices.iter().all(|p| p.y as f64 >= y)
    }

    pub fn to_quadrilateral(&self) -> Option<Quadrilateral> {
        let vertices: [Point<i32>; 4] = self.vertices.as_slice().try_into().ok()?;
        Some(Quadrilateral { vertices })
    }
}

/// Polygon with exactly four vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quadrilateral {
    pub vertices: [Point<i32>; 4],
}

impl Quadrilateral {
    pub fn new(vertices: [Point<i32>; 4]) -> Self {
        Self { vertices }
    }

    pub fn to_f32(&self) -> [(f32, f32); 4] {
        self.vertices.map(|p| (p.x as f32, p.y as f32))
    }

    pub fn to_polygon(&self) -> Polygon {
        Polygon::new(self.vertices.to_vec())
    }
}

/// Corners of a quadrilateral in canonical roles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corners {
    pub top_left: (f32, f32),
    pub top_right: (f32, f32),
    pub bottom_right: (f32, f32),
    pub bottom_left: (f32, f32),
}

impl Corners {
    /// Clockwise from top-left
    pub fn to_array(&self) -> [(f32, f32); 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }
}

/// Lower/upper bounds in OpenCV-style 8-bit HSV (H 0..=180, S and V 0..=255)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

/// Outcome of a search stage
#[derive(Debug, Clone)]
pub enum DetectionResult<T> {
    NotFound,
    Found {
        detection: T,
        /// Copy of the searched frame with the detection outlined
        annotated: RgbImage,
    },
}

impl<T> DetectionResult<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, DetectionResult::Found { .. })
    }

    pub fn detection(&self) -> Option<&T> {
        match self {
            DetectionResult::Found { detection, .. } => Some(detection),
            DetectionResult::NotFound => None,
        }
    }

    pub fn annotated(&self) -> Option<&RgbImage> {
        match self {
            DetectionResult::Found { annotated, .. } => Some(annotated),
            DetectionResult::NotFound => None,
        }
    }
}

/// How a rectified image came to be
#[derive(Debug, Clone, PartialEq)]
pub enum Rectification {
    /// Perspective-warped from these source corners
    Warped { corners: Corners },
    /// Geometry was degenerate; the image is the masked crop, unwarped
    Unrectified { reason: String },
}

/// Output of the rectifier, handed to the classifier collaborator
#[derive(Debug, Clone)]
pub struct RectifiedImage {
    pub role: Role,
    pub image: RgbImage,
    pub rectification: Rectification,
}

impl RectifiedImage {
    pub fn is_warped(&self) -> bool {
        matches!(self.rectification, Rectification::Warped { .. })
    }
}

pub(crate) fn shoelace_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.unsigned_abs() as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: i32, y: i32, side: i32) -> Polygon {
        Polygon::new(vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ])
    }

    #[test]
    fn area_is_winding_independent() {
        let cw = square(0, 0, 10);
        let mut reversed = cw.vertices().to_vec();
        reversed.reverse();
        assert_eq!(cw.area(), 100.0);
        assert_eq!(Polygon::new(reversed).area(), 100.0);
    }

    #[test]
    fn degenerate_polygons_have_no_area() {
        let line = Polygon::new(vec![Point::new(0, 0), Point::new(5, 5)]);
        assert_eq!(line.area(), 0.0);
    }

    #[test]
    fn perimeter_closes_the_outline() {
        assert_eq!(square(0, 0, 10).perimeter(), 40.0);
        assert_eq!(Polygon::new(vec![Point::new(2, 2)]).perimeter(), 0.0);
    }

    #[test]
    fn box_area_counts_pixels() {
        let bbox = BoundingBox {
            x: 5,
            y: 5,
            width: 4,
            height: 3,
        };
        assert_eq!(bbox.area(), 12);
        assert_eq!(BoundingBox { width: 0, ..bbox }.area(), 0);
    }

    #[test]
    fn bounding_box_is_inclusive() {
        let bbox = square(3, 4, 9).bounding_box().unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                x: 3,
                y: 4,
                width: 10,
                height: 10
            }
        );
    }

    #[test]
    fn lies_below_checks_every_vertex() {
        let poly = square(0, 50, 10);
        assert!(poly.lies_below(50.0));
        assert!(!poly.lies_below(51.0));
        assert!(!Polygon::new(Vec::new()).lies_below(0.0));
    }

    #[test]
    fn only_four_vertices_make_a_quadrilateral() {
        assert!(square(0, 0, 4).to_quadrilateral().is_some());
        let triangle = Polygon::new(vec![Point::new(0, 0), Point::new(4, 0), Point::new(0, 4)]);
        assert!(triangle.to_quadrilateral().is_none());
    }

    #[test]
    fn bounding_box_round_trips_through_polygon() {
        let bbox = BoundingBox {
            x: 10,
            y: 20,
            width: 30,
            height: 40,
        };
        assert_eq!(bbox.to_polygon().bounding_box(), Some(bbox));
    }

    #[test]
    fn color_range_bounds_are_inclusive() {
        let range = ColorRange::new([0, 0, 60], [180, 60, 180]);
        assert!(range.contains([0, 0, 60]));
        assert!(range.contains([180, 60, 180]));
        assert!(!range.contains([90, 61, 100]));
        assert!(!range.contains([90, 10, 59]));
    }

    #[test]
    fn role_display_is_lowercase() {
        assert_eq!(Role::Barcode.to_string(), "barcode");
        assert_eq!(Role::Substrate.to_string(), "substrate");
    }
}
