pub mod classifier;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod models;

pub use classifier::{Classification, Classifier, classify_all};
pub use config::{LocatorConfig, RegionMode};
pub use detection::{LocalizationReport, Localizer};
pub use error::{LocateError, Result};
pub use frame::{FrameSource, ImageFileSource};
pub use models::{
    BoundingBox, ColorRange, Corners, DetectionResult, Polygon, Quadrilateral, Rectification,
    RectifiedImage, Role,
};
