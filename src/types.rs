use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Real-valued backscatter (dB) or intensity sample
pub type GridValue = f32;

/// 2D real raster (rows x cols)
pub type Grid = Array2<GridValue>;

/// Continuous change raster produced by change detection
pub type ChangeGrid = Array2<GridValue>;

/// Binary classification raster (0, 1 or [`NODATA`])
pub type BinaryMask = Array2<u8>;

/// Mask value of the positive class (flooded / burned)
pub const POSITIVE: u8 = 1;

/// Mask value of the negative class
pub const NEGATIVE: u8 = 0;

/// No-data sentinel, excluded from statistics
pub const NODATA: u8 = 255;

/// Units of the coordinate reference system axes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelUnits {
    /// Geographic coordinates (longitude, latitude)
    #[default]
    Degrees,
    /// Projected coordinates (e.g., UTM, Web Mercator)
    Meters,
}

/// EPSG codes treated as geographic (degree-based) systems
const GEOGRAPHIC_EPSG: &[u32] = &[4326, 4258, 4269, 4674];

/// Coordinate reference system identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    /// Authority identifier, e.g. `EPSG:4326`, or a WKT string
    pub identifier: String,
    /// Units of the transform's scale coefficients
    pub units: PixelUnits,
}

impl Crs {
    pub fn new(identifier: impl Into<String>, units: PixelUnits) -> Self {
        Self {
            identifier: identifier.into(),
            units,
        }
    }

    /// WGS84 geographic coordinates
    pub fn wgs84() -> Self {
        Self::new("EPSG:4326", PixelUnits::Degrees)
    }

    /// Build from an EPSG code, inferring units from the known geographic codes
    pub fn from_epsg(code: u32) -> Self {
        let units = if GEOGRAPHIC_EPSG.contains(&code) {
            PixelUnits::Degrees
        } else {
            PixelUnits::Meters
        };
        Self::new(format!("EPSG:{}", code), units)
    }

    /// EPSG code if the identifier is of the form `EPSG:<code>`
    pub fn epsg(&self) -> Option<u32> {
        let (authority, code) = self.identifier.split_once(':')?;
        if authority.eq_ignore_ascii_case("EPSG") {
            code.trim().parse().ok()
        } else {
            None
        }
    }

    pub fn is_geographic(&self) -> bool {
        self.units == PixelUnits::Degrees
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier)
    }
}

impl FromStr for Crs {
    type Err = FloodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (authority, code) = trimmed.split_once(':').ok_or_else(|| {
            FloodError::InvalidParameter(format!("Unrecognized CRS identifier: {}", s))
        })?;
        if !authority.eq_ignore_ascii_case("EPSG") {
            return Err(FloodError::InvalidParameter(format!(
                "Unsupported CRS authority: {}",
                authority
            )));
        }
        let code: u32 = code.trim().parse().map_err(|_| {
            FloodError::InvalidParameter(format!("Invalid EPSG code in CRS identifier: {}", s))
        })?;
        Ok(Crs::from_epsg(code))
    }
}

/// Affine transform from pixel (col, row) to CRS (x, y), GDAL coefficient order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub scale_x: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub scale_y: f64,
}

impl GeoTransform {
    /// Build from the GDAL six-coefficient array
    pub fn from_gdal(coefficients: [f64; 6]) -> Self {
        Self {
            top_left_x: coefficients[0],
            scale_x: coefficients[1],
            rotation_x: coefficients[2],
            top_left_y: coefficients[3],
            rotation_y: coefficients[4],
            scale_y: coefficients[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.scale_x,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.scale_y,
        ]
    }

    /// North-up transform covering `(min_x, min_y, max_x, max_y)` with a raster of `width x height`
    pub fn from_bounds(
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        width: usize,
        height: usize,
    ) -> FloodResult<Self> {
        if width == 0 || height == 0 {
            return Err(FloodError::EmptyInput(format!(
                "Cannot build a transform for a {}x{} raster",
                width, height
            )));
        }
        if !(max_x > min_x && max_y > min_y) {
            return Err(FloodError::InvalidParameter(format!(
                "Invalid bounds: ({}, {}, {}, {})",
                min_x, min_y, max_x, max_y
            )));
        }

        Ok(Self {
            top_left_x: min_x,
            scale_x: (max_x - min_x) / width as f64,
            rotation_x: 0.0,
            top_left_y: max_y,
            rotation_y: 0.0,
            scale_y: -(max_y - min_y) / height as f64,
        })
    }

    /// Pixel width in CRS units (always positive)
    pub fn pixel_width(&self) -> f64 {
        self.scale_x.abs()
    }

    /// Pixel height in CRS units (always positive)
    pub fn pixel_height(&self) -> f64 {
        self.scale_y.abs()
    }

    /// Map fractional pixel coordinates to CRS coordinates
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.top_left_x + col * self.scale_x + row * self.rotation_x;
        let y = self.top_left_y + col * self.rotation_y + row * self.scale_y;
        (x, y)
    }

    /// CRS coordinates of the center of pixel `(row, col)`
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.pixel_to_geo(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Bounding box of a `rows x cols` raster
    pub fn bounds(&self, rows: usize, cols: usize) -> BoundingBox {
        let corners = [
            self.pixel_to_geo(0.0, 0.0),
            self.pixel_to_geo(cols as f64, 0.0),
            self.pixel_to_geo(0.0, rows as f64),
            self.pixel_to_geo(cols as f64, rows as f64),
        ];

        let mut bbox = BoundingBox {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        bbox
    }
}

/// Axis-aligned bounding box in CRS units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// A grid together with its georeferencing
#[derive(Debug, Clone)]
pub struct RasterLayer {
    pub data: Grid,
    pub transform: GeoTransform,
    pub crs: Crs,
}

impl RasterLayer {
    pub fn new(data: Grid, transform: GeoTransform, crs: Crs) -> Self {
        Self {
            data,
            transform,
            crs,
        }
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }
}

/// Error types for change detection processing
#[derive(Debug, thiserror::Error)]
pub enum FloodError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Shape mismatch for {context}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        context: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid geometry type: {0}")]
    InvalidGeometryType(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for change detection operations
pub type FloodResult<T> = Result<T, FloodError>;

/// Fail with [`FloodError::ShapeMismatch`] unless both shapes agree
pub(crate) fn ensure_same_shape(
    context: &str,
    expected: (usize, usize),
    found: (usize, usize),
) -> FloodResult<()> {
    if expected != found {
        return Err(FloodError::ShapeMismatch {
            context: context.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}
