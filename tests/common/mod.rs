mod fixtures;
pub use fixtures::*;

pub use image::{Rgb, RgbImage};

// Re-export commonly used types from traylocate for tests
pub use traylocate::detection::orientation::{MAX_ATTEMPTS, OrientationSearch};
pub use traylocate::detection::rectify::{order_corners, rectify, warp_quadrilateral};
pub use traylocate::detection::regions::{locate_blobs, locate_quadrilaterals};
pub use traylocate::{
    BoundingBox, LocateError, LocatorConfig, Localizer, Polygon, Quadrilateral, RegionMode, Role,
};
