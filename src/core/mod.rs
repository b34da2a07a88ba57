//! Core change detection modules

pub mod aoi;
pub mod change_detection;
pub mod overlay;
pub mod rasterize;
pub mod statistics;
pub mod vectorize;

// Re-export main types
pub use aoi::Aoi;
pub use change_detection::{detect, detect_change, ChangeDetectionParams, ChangeDetector, ChangeDirection};
pub use overlay::{normalize_for_display, overlay};
pub use rasterize::rasterize_polygons;
pub use statistics::{pixel_size_m, summarize, summarize_with_units, AreaReport};
pub use vectorize::{vectorize, PolygonFeature, PolygonSet};
