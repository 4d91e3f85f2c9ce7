use crate::models::{BoundingBox, Polygon};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Copy of `img` with each polygon outlined as a closed path
pub fn draw_polygons(img: &RgbImage, polygons: &[Polygon], color: Rgb<u8>) -> RgbImage {
    let mut canvas = img.clone();
    for polygon in polygons {
        let vertices = polygon.vertices();
        for i in 0..vertices.len() {
            let p1 = vertices[i];
            let p2 = vertices[(i + 1) % vertices.len()];
            draw_line_segment_mut(
                &mut canvas,
                (p1.x as f32, p1.y as f32),
                (p2.x as f32, p2.y as f32),
                color,
            );
        }
    }
    canvas
}

/// Copy of `img` with each box outlined
pub fn draw_boxes(img: &RgbImage, boxes: &[BoundingBox], color: Rgb<u8>) -> RgbImage {
    let mut canvas = img.clone();
    for bbox in boxes {
        if bbox.area() == 0 {
            continue;
        }
        let rect = Rect::at(bbox.x as i32, bbox.y as i32).of_size(bbox.width, bbox.height);
        draw_hollow_rect_mut(&mut canvas, rect, color);
    }
    canvas
}
