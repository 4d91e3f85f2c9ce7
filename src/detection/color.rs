use crate::models::ColorRange;
use image::{GrayImage, Luma, Rgb, RgbImage};
use palette::{FromColor, Hsv, Srgb};

/// Image in OpenCV-style 8-bit HSV: H in 0..=180, S and V in 0..=255
#[derive(Debug, Clone)]
pub struct HsvImage {
    pixels: RgbImage,
}

impl HsvImage {
    pub fn from_rgb(img: &RgbImage) -> Self {
        let mut pixels = RgbImage::new(img.width(), img.height());
        for (x, y, pixel) in img.enumerate_pixels() {
            pixels.put_pixel(x, y, Rgb(rgb_to_hsv(*pixel)));
        }
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn get(&self, x: u32, y: u32) -> [u8; 3] {
        self.pixels.get_pixel(x, y).0
    }
}

pub fn rgb_to_hsv(pixel: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0;
    let rgb = Srgb::<u8>::new(r, g, b).into_format::<f32>();
    let hsv: Hsv = Hsv::from_color(rgb);
    let hue = hsv.hue.into_positive_degrees();
    [
        (hue / 2.0).round().clamp(0.0, 180.0) as u8,
        (hsv.saturation * 255.0).round().clamp(0.0, 255.0) as u8,
        (hsv.value * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

pub fn hsv_to_rgb(hsv: [u8; 3]) -> Rgb<u8> {
    let [h, s, v] = hsv;
    let color: Hsv = Hsv::new(h as f32 * 2.0, s as f32 / 255.0, v as f32 / 255.0);
    let rgb: Srgb = Srgb::from_color(color);
    let rgb: Srgb<u8> = rgb.into_format();
    Rgb([rgb.red, rgb.green, rgb.blue])
}

/// Raise the HSV value channel by `offset`, saturating at 255
pub fn brighten(img: &RgbImage, offset: u8) -> RgbImage {
    if offset == 0 {
        return img.clone();
    }
    let mut out = RgbImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let [h, s, v] = rgb_to_hsv(*pixel);
        out.put_pixel(x, y, hsv_to_rgb([h, s, v.saturating_add(offset)]));
    }
    out
}

/// Binary mask (255 = inside) of the pixels whose HSV falls within `range`
pub fn segment_hsv(hsv: &HsvImage, range: &ColorRange) -> GrayImage {
    GrayImage::from_fn(hsv.width(), hsv.height(), |x, y| {
        if range.contains(hsv.get(x, y)) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Convert to HSV and threshold against `range`
pub fn segment(img: &RgbImage, range: &ColorRange) -> GrayImage {
    segment_hsv(&HsvImage::from_rgb(img), range)
}
