use crate::types::{BinaryMask, FloodError, FloodResult, GeoTransform, PixelUnits, NODATA, POSITIVE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Meters per degree of latitude (spherical approximation)
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Area statistics for a binary mask
///
/// Built once by [`summarize`] and never modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaReport {
    pub positive_pixel_count: usize,
    pub total_pixel_count: usize,
    pub positive_ratio: f64,
    pub pixel_area_m2: f64,
    pub area_km2: f64,
    pub area_ha: f64,
}

impl AreaReport {
    /// Positive area in square meters
    pub fn area_m2(&self) -> f64 {
        self.positive_pixel_count as f64 * self.pixel_area_m2
    }

    /// Write the report as pretty-printed JSON
    pub fn write_json<P: AsRef<Path>>(&self, output_path: P) -> FloodResult<()> {
        let file = std::fs::File::create(output_path.as_ref())?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        log::debug!("Area report written to {}", output_path.as_ref().display());
        Ok(())
    }
}

/// Pixel dimensions in meters `(width, height)`
///
/// Degree-based transforms are scaled by 111320 m per degree of latitude and
/// `111320 * cos(latitude)` m per degree of longitude.
pub fn pixel_size_m(
    transform: &GeoTransform,
    units: PixelUnits,
    reference_latitude: f64,
) -> FloodResult<(f64, f64)> {
    match units {
        PixelUnits::Meters => Ok((transform.pixel_width(), transform.pixel_height())),
        PixelUnits::Degrees => {
            validate_latitude(reference_latitude)?;
            let m_per_deg_lat = METERS_PER_DEGREE;
            let m_per_deg_lon = METERS_PER_DEGREE * reference_latitude.to_radians().cos();
            Ok((
                transform.pixel_width() * m_per_deg_lon,
                transform.pixel_height() * m_per_deg_lat,
            ))
        }
    }
}

/// Summarize a mask whose transform is in geographic degrees
pub fn summarize(
    mask: &BinaryMask,
    transform: &GeoTransform,
    reference_latitude: f64,
) -> FloodResult<AreaReport> {
    summarize_with_units(mask, transform, PixelUnits::Degrees, reference_latitude)
}

/// Summarize a mask, with the caller stating the transform's units
///
/// `reference_latitude` is ignored for [`PixelUnits::Meters`]. Cells holding
/// the no-data sentinel are excluded from both counts.
pub fn summarize_with_units(
    mask: &BinaryMask,
    transform: &GeoTransform,
    units: PixelUnits,
    reference_latitude: f64,
) -> FloodResult<AreaReport> {
    let (pixel_width_m, pixel_height_m) = pixel_size_m(transform, units, reference_latitude)?;
    let pixel_area_m2 = pixel_width_m * pixel_height_m;

    let mut positive_pixel_count = 0usize;
    let mut total_pixel_count = 0usize;
    for &value in mask.iter() {
        if value == NODATA {
            continue;
        }
        total_pixel_count += 1;
        if value == POSITIVE {
            positive_pixel_count += 1;
        }
    }

    let positive_ratio = if total_pixel_count == 0 {
        0.0
    } else {
        positive_pixel_count as f64 / total_pixel_count as f64
    };

    let area_m2 = positive_pixel_count as f64 * pixel_area_m2;
    let report = AreaReport {
        positive_pixel_count,
        total_pixel_count,
        positive_ratio,
        pixel_area_m2,
        area_km2: area_m2 / 1_000_000.0,
        area_ha: area_m2 / 10_000.0,
    };

    log::debug!(
        "Pixel size {:.2}m x {:.2}m ({:.1} m2)",
        pixel_width_m,
        pixel_height_m,
        pixel_area_m2
    );
    log::info!(
        "Positive pixels: {} / {} ({:.2}%), area {:.3} km2 ({:.1} ha)",
        report.positive_pixel_count,
        report.total_pixel_count,
        report.positive_ratio * 100.0,
        report.area_km2,
        report.area_ha
    );

    Ok(report)
}

fn validate_latitude(latitude: f64) -> FloodResult<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(FloodError::InvalidParameter(format!(
            "Reference latitude must be within [-90, 90], got {}",
            latitude
        )));
    }
    Ok(())
}
