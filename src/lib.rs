//! floodmap: Threshold Change Detection for Flood and Burn-Scar Mapping
//!
//! Compares co-registered before/after rasters (SAR backscatter in dB, or
//! spectral indices), classifies changed cells into a binary mask, reports
//! the affected area, converts the mask into georeferenced polygons and
//! renders a color overlay for inspection.

pub mod config;
pub mod core;
pub mod io;
pub mod pipeline;
pub mod synthetic;
pub mod types;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use config::{DateWindow, DetectionConfig, EventConfig};
pub use core::{
    detect, detect_change, normalize_for_display, overlay, rasterize_polygons, summarize,
    summarize_with_units, vectorize, Aoi, AreaReport, ChangeDetectionParams, ChangeDetector,
    ChangeDirection, PolygonFeature, PolygonSet,
};
pub use pipeline::{ChangeDetectionPipeline, ChangeDetectionProducts};
pub use synthetic::{SyntheticScene, SyntheticSceneGenerator, SyntheticSceneParams};
pub use types::{
    BinaryMask, BoundingBox, ChangeGrid, Crs, FloodError, FloodResult, GeoTransform, Grid,
    PixelUnits, RasterLayer, NEGATIVE, NODATA, POSITIVE,
};
