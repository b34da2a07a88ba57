//! I/O modules for rasters, vector products and cached loads

pub mod cache;
#[cfg(feature = "gdal")]
pub mod geotiff;
pub mod vector;

pub use cache::{Fingerprint, ResultCache};
#[cfg(feature = "gdal")]
pub use geotiff::{read_raster, write_grid_geotiff, write_mask_geotiff};
pub use vector::{parse_geojson, read_geojson, write_geojson};
