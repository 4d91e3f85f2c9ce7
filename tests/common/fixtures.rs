use image::imageops::rotate270;
use image::{Rgb, RgbImage};
use traylocate::config::BarcodeConfig;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const GREEN: Rgb<u8> = Rgb([0, 200, 0]);

/// Fills the axis-aligned rectangle `[x0, x0 + w) x [y0, y0 + h)`
pub fn fill_rect(img: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgb<u8>) {
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            img.put_pixel(x, y, color);
        }
    }
}

/// Black frame with a white `w x h` label centred at `(cx, cy)`
pub fn frame_with_label(
    width: u32,
    height: u32,
    (cx, cy): (u32, u32),
    (w, h): (u32, u32),
) -> RgbImage {
    let mut img = RgbImage::new(width, height);
    fill_rect(&mut img, cx - w / 2, cy - h / 2, w, h, WHITE);
    img
}

/// The canonical 1280x720 inspection frame with a 200x100 label
pub fn full_frame_with_label(center: (u32, u32)) -> RgbImage {
    frame_with_label(1280, 720, center, (200, 100))
}

/// Smaller frame used where the exact working resolution does not matter
pub fn small_frame_with_label() -> RgbImage {
    frame_with_label(640, 360, (320, 300), (100, 50))
}

/// Barcode search tuned for [`small_frame_with_label`]
pub fn small_barcode_config() -> BarcodeConfig {
    BarcodeConfig {
        min_area: 1_000.0,
        max_area: 50_000.0,
        ..BarcodeConfig::default()
    }
}

/// Undo `turns` clockwise quarter turns, so that a clockwise search needs
/// exactly `turns` rotations to restore the original orientation
pub fn counter_rotate(img: &RgbImage, turns: u8) -> RgbImage {
    let mut out = img.clone();
    for _ in 0..turns {
        out = rotate270(&out);
    }
    out
}

/// Six green squares laid out in two rows of three
pub fn substrate_frame() -> RgbImage {
    let mut img = RgbImage::from_pixel(800, 500, Rgb([40, 40, 40]));
    for row in 0..2 {
        for col in 0..3 {
            fill_rect(&mut img, 60 + col * 250, 60 + row * 220, 120, 120, GREEN);
        }
    }
    img
}

/// Horizontal and vertical color gradient, so warps that shift pixels show
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}
