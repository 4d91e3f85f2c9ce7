mod common;

use common::*;
use traylocate::config::{SubstrateConfig, TrayConfig};

fn tray_frame(background: Rgb<u8>, tray: Rgb<u8>) -> RgbImage {
    let mut img = RgbImage::from_pixel(800, 600, background);
    fill_rect(&mut img, 150, 150, 500, 300, tray);
    img
}

#[test]
fn gray_tray_is_found_with_default_ranges() {
    let img = tray_frame(Rgb([0, 0, 0]), Rgb([110, 110, 110]));
    let outcome = locate_quadrilaterals(&img, &TrayConfig::default(), 50).unwrap();

    assert!(outcome.target_met);
    assert_eq!(outcome.range_index, 0);
    assert_eq!(outcome.ranges_tried, 1);
    assert_eq!(outcome.detections().len(), 1);

    let bbox = outcome.detections()[0].to_polygon().bounding_box().unwrap();
    assert!(bbox.x.abs_diff(150) <= 5, "left edge at {}", bbox.x);
    assert!(bbox.y.abs_diff(150) <= 5, "top edge at {}", bbox.y);
    assert!(bbox.width.abs_diff(500) <= 10);
    assert!(bbox.height.abs_diff(300) <= 10);
}

#[test]
fn tray_search_falls_back_when_first_range_floods() {
    // after brightening the background reaches V=170: inside the first range
    // only, so that range masks the whole frame and finds no outline
    let img = tray_frame(Rgb([120, 120, 120]), Rgb([70, 70, 70]));
    let outcome = locate_quadrilaterals(&img, &TrayConfig::default(), 50).unwrap();

    assert!(outcome.target_met);
    assert_eq!(outcome.range_index, 1);
    assert_eq!(outcome.ranges_tried, 2);
    assert_eq!(outcome.detections().len(), 1);
    assert_eq!(outcome.mask.dimensions(), (800, 600));
}

#[test]
fn tray_below_min_area_is_reported_empty() {
    let img = tray_frame(Rgb([0, 0, 0]), Rgb([110, 110, 110]));
    let config = TrayConfig {
        min_area: 200_000.0,
        ..TrayConfig::default()
    };
    let outcome = locate_quadrilaterals(&img, &config, 50).unwrap();
    assert!(!outcome.result.is_found());
    assert!(!outcome.target_met);
    assert_eq!(outcome.ranges_tried, 3);
    assert_eq!(outcome.range_index, 2);
}

#[test]
fn six_substrates_are_found_in_reading_order() {
    let img = substrate_frame();
    let outcome = locate_blobs(&img, &SubstrateConfig::default(), 50).unwrap();

    assert!(outcome.target_met);
    assert_eq!(outcome.range_index, 0);
    assert_eq!(outcome.target, 6);

    let boxes = outcome.detections();
    assert_eq!(boxes.len(), 6);
    for (i, bbox) in boxes.iter().enumerate() {
        let (row, col) = (i as u32 / 3, i as u32 % 3);
        assert!(bbox.x.abs_diff(60 + col * 250) <= 6, "box {i}: {bbox:?}");
        assert!(bbox.y.abs_diff(60 + row * 220) <= 6, "box {i}: {bbox:?}");
        assert!(bbox.width.abs_diff(120) <= 12, "box {i}: {bbox:?}");
        assert!(bbox.height.abs_diff(120) <= 12, "box {i}: {bbox:?}");
    }
}

#[test]
fn short_substrate_count_returns_loosest_result() {
    let mut img = RgbImage::from_pixel(800, 300, Rgb([40, 40, 40]));
    for col in 0..4 {
        fill_rect(&mut img, 40 + col * 190, 80, 120, 120, GREEN);
    }
    let outcome = locate_blobs(&img, &SubstrateConfig::default(), 50).unwrap();

    assert!(!outcome.target_met);
    assert_eq!(outcome.ranges_tried, 3);
    assert_eq!(outcome.range_index, 2);
    assert_eq!(outcome.detections().len(), 4);
    assert!(outcome.result.annotated().is_some());
}

#[test]
fn elongated_and_small_blobs_are_rejected() {
    let mut img = RgbImage::from_pixel(800, 400, Rgb([40, 40, 40]));
    fill_rect(&mut img, 20, 20, 300, 120, GREEN);
    fill_rect(&mut img, 400, 20, 60, 60, GREEN);
    fill_rect(&mut img, 500, 200, 130, 130, GREEN);
    let config = SubstrateConfig {
        expected_count: 1,
        ..SubstrateConfig::default()
    };
    let outcome = locate_blobs(&img, &config, 50).unwrap();
    assert_eq!(outcome.detections().len(), 1);
    assert!(outcome.detections()[0].x.abs_diff(500) <= 6);
}

#[test]
fn empty_frame_is_invalid_input() {
    let err = locate_blobs(&RgbImage::new(0, 0), &SubstrateConfig::default(), 50).unwrap_err();
    assert!(matches!(err, LocateError::InputInvalid { .. }));
}
