//! End-to-end change detection for a before/after raster pair
//!
//! detect -> optional AOI clip -> summarize -> vectorize, then write the
//! products to an output directory.

use crate::config::DetectionConfig;
use crate::core::aoi::Aoi;
use crate::core::change_detection::{finite_range, ChangeDetector};
use crate::core::overlay::{normalize_for_display, overlay};
use crate::core::statistics::{summarize_with_units, AreaReport};
use crate::core::vectorize::{vectorize, PolygonSet};
use crate::io::vector::{read_geojson, write_geojson};
use crate::types::{BinaryMask, ChangeGrid, Crs, FloodResult, GeoTransform, RasterLayer};
use std::path::{Path, PathBuf};

pub const AREA_REPORT_FILE: &str = "area_report.json";
pub const POLYGONS_FILE: &str = "flood_areas.geojson";
pub const OVERLAY_FILE: &str = "overlay.png";
pub const MASK_FILE: &str = "flood_mask.tif";
pub const CHANGE_MAP_FILE: &str = "change_map.tif";

/// Everything produced by one pipeline run
#[derive(Debug, Clone)]
pub struct ChangeDetectionProducts {
    pub mask: BinaryMask,
    pub change: ChangeGrid,
    pub report: AreaReport,
    pub polygons: PolygonSet,
    pub transform: GeoTransform,
    pub crs: Crs,
    /// Display-normalized "after" image used as overlay background
    pub display: ndarray::Array2<f32>,
}

/// Runs change detection and derives statistics, polygons and overlay
pub struct ChangeDetectionPipeline {
    config: DetectionConfig,
    aoi: Option<Aoi>,
}

impl ChangeDetectionPipeline {
    /// Build from a validated config, loading `aoi_path` when set
    pub fn new(config: DetectionConfig) -> FloodResult<Self> {
        config.validate()?;
        let aoi = match &config.aoi_path {
            Some(path) => Some(Aoi::from_geometries(&read_geojson(path)?)?),
            None => None,
        };
        Ok(Self { config, aoi })
    }

    pub fn with_aoi(mut self, aoi: Aoi) -> Self {
        self.aoi = Some(aoi);
        self
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Run on a co-registered pair; georeferencing is taken from `before`
    pub fn run(
        &self,
        before: &RasterLayer,
        after: &RasterLayer,
    ) -> FloodResult<ChangeDetectionProducts> {
        log::info!(
            "Starting change detection pipeline on {}x{} grids",
            before.shape().0,
            before.shape().1
        );

        if before.transform != after.transform {
            log::warn!(
                "Before/after transforms differ ({:?} vs {:?}); using the before transform",
                before.transform,
                after.transform
            );
        }
        if before.crs != after.crs {
            log::warn!(
                "Before/after CRS differ ({} vs {}); using {}",
                before.crs,
                after.crs,
                before.crs
            );
        }

        let detector = ChangeDetector::new(self.config.change_params());
        let (mut mask, change) = detector.detect(&before.data, &after.data)?;

        let (min_change, max_change) = finite_range(&change);
        log::info!("Change range: {:.2} .. {:.2}", min_change, max_change);

        if let Some(aoi) = &self.aoi {
            mask = aoi.apply(&mask, &before.transform);
        }

        let units = self.config.resolve_units(&before.crs);
        let report = summarize_with_units(
            &mask,
            &before.transform,
            units,
            self.config.reference_latitude,
        )?;
        log::info!(
            "Positive cells: {} / {} ({:.2}%), area {:.4} km2 ({:.2} ha)",
            report.positive_pixel_count,
            report.total_pixel_count,
            report.positive_ratio * 100.0,
            report.area_km2,
            report.area_ha
        );

        let mut polygons = vectorize(&mask, &before.transform, &before.crs);
        if let Some(tolerance) = self.config.simplify_tolerance {
            polygons = polygons.simplify(tolerance);
        }
        log::info!("Extracted {} polygons", polygons.len());

        Ok(ChangeDetectionProducts {
            mask,
            change,
            report,
            polygons,
            transform: before.transform,
            crs: before.crs.clone(),
            display: normalize_for_display(&after.data),
        })
    }

    /// Write products into `output_dir`, returning the written paths
    pub fn write_products<P: AsRef<Path>>(
        &self,
        products: &ChangeDetectionProducts,
        output_dir: P,
    ) -> FloodResult<Vec<PathBuf>> {
        let output_dir = output_dir.as_ref();
        std::fs::create_dir_all(output_dir)?;
        let mut written = Vec::new();

        let report_path = output_dir.join(AREA_REPORT_FILE);
        products.report.write_json(&report_path)?;
        written.push(report_path);

        if products.polygons.is_empty() {
            log::info!("No polygons to export, skipping {}", POLYGONS_FILE);
        } else {
            let polygons_path = output_dir.join(POLYGONS_FILE);
            write_geojson(&products.polygons, &polygons_path)?;
            written.push(polygons_path);
        }

        let overlay_path = output_dir.join(OVERLAY_FILE);
        let image = overlay(
            &products.display,
            &products.mask,
            self.config.overlay_color,
            self.config.overlay_alpha,
        )?;
        image.save(&overlay_path)?;
        written.push(overlay_path);

        #[cfg(feature = "gdal")]
        {
            use crate::io::geotiff::{write_grid_geotiff, write_mask_geotiff};

            let mask_path = output_dir.join(MASK_FILE);
            write_mask_geotiff(&products.mask, &products.transform, &products.crs, &mask_path)?;
            written.push(mask_path);

            let change_path = output_dir.join(CHANGE_MAP_FILE);
            write_grid_geotiff(&products.change, &products.transform, &products.crs, &change_path)?;
            written.push(change_path);
        }

        log::info!("Wrote {} products to {}", written.len(), output_dir.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FloodError, PixelUnits, NODATA};
    use geo::{polygon, Geometry};
    use ndarray::Array2;

    fn layers() -> (RasterLayer, RasterLayer) {
        let transform = GeoTransform::from_gdal([0.0, 10.0, 0.0, 80.0, 0.0, -10.0]);
        let crs = Crs::from_epsg(32652);
        let before = Array2::from_elem((8, 8), -8.0f32);
        let mut after = before.clone();
        for i in 2..5 {
            for j in 2..6 {
                after[[i, j]] = -18.0;
            }
        }
        (
            RasterLayer::new(before, transform, crs.clone()),
            RasterLayer::new(after, transform, crs),
        )
    }

    #[test]
    fn test_run_counts_and_polygons() {
        let (before, after) = layers();
        let pipeline = ChangeDetectionPipeline::new(DetectionConfig::default()).unwrap();
        let products = pipeline.run(&before, &after).unwrap();

        assert_eq!(products.report.positive_pixel_count, 12);
        assert_eq!(products.report.total_pixel_count, 64);
        assert_eq!(products.report.pixel_area_m2, 100.0);
        assert_eq!(products.polygons.len(), 1);
        assert_eq!(products.crs, Crs::from_epsg(32652));
    }

    #[test]
    fn test_aoi_excludes_cells() {
        let (before, after) = layers();
        let aoi = Aoi::from_geometries(&[Geometry::Polygon(polygon![
            (x: 0.0, y: 80.0),
            (x: 40.0, y: 80.0),
            (x: 40.0, y: 0.0),
            (x: 0.0, y: 0.0),
        ])])
        .unwrap();

        let pipeline = ChangeDetectionPipeline::new(DetectionConfig::default())
            .unwrap()
            .with_aoi(aoi);
        let products = pipeline.run(&before, &after).unwrap();

        assert_eq!(products.report.total_pixel_count, 32);
        assert_eq!(products.report.positive_pixel_count, 6);
        assert_eq!(products.mask[[0, 7]], NODATA);
    }

    #[test]
    fn test_projected_layer_uses_crs_units_by_default() {
        let (before, after) = layers();
        let products = ChangeDetectionPipeline::new(DetectionConfig::default())
            .unwrap()
            .run(&before, &after)
            .unwrap();

        assert_eq!(products.report.pixel_area_m2, 100.0);
        assert_eq!(products.report.area_m2(), 1200.0);
    }

    #[test]
    fn test_explicit_units_override_crs() {
        let transform = GeoTransform::from_gdal([126.9, 0.001, 0.0, 37.6, 0.0, -0.001]);
        let grid = Array2::from_elem((2, 2), -8.0f32);
        let layer = RasterLayer::new(grid, transform, Crs::new("EPSG:5186", PixelUnits::Meters));

        let config = DetectionConfig {
            pixel_units: Some(PixelUnits::Degrees),
            ..DetectionConfig::default()
        };
        let products = ChangeDetectionPipeline::new(config).unwrap().run(&layer, &layer).unwrap();
        assert!(products.report.pixel_area_m2 > 9000.0);
        assert!(products.report.pixel_area_m2 < 13000.0);
    }

    #[test]
    fn test_aoi_loaded_from_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let aoi_path = dir.path().join("aoi.geojson");
        std::fs::write(
            &aoi_path,
            r#"{"type": "Feature", "properties": {}, "geometry": {"type": "Polygon",
                "coordinates": [[[0, 80], [40, 80], [40, 0], [0, 0], [0, 80]]]}}"#,
        )
        .unwrap();

        let config = DetectionConfig {
            aoi_path: Some(aoi_path),
            ..DetectionConfig::default()
        };
        let (before, after) = layers();
        let products = ChangeDetectionPipeline::new(config).unwrap().run(&before, &after).unwrap();
        assert_eq!(products.report.total_pixel_count, 32);
        assert_eq!(products.report.positive_pixel_count, 6);
    }

    #[test]
    fn test_missing_aoi_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectionConfig {
            aoi_path: Some(dir.path().join("missing.geojson")),
            ..DetectionConfig::default()
        };
        assert!(matches!(ChangeDetectionPipeline::new(config), Err(FloodError::Io(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DetectionConfig {
            threshold: f32::NAN,
            ..DetectionConfig::default()
        };
        assert!(ChangeDetectionPipeline::new(config).is_err());
    }

    #[test]
    fn test_write_products_skips_empty_geojson() {
        let (before, _) = layers();
        let pipeline = ChangeDetectionPipeline::new(DetectionConfig::default()).unwrap();
        let products = pipeline.run(&before, &before).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let written = pipeline.write_products(&products, dir.path()).unwrap();

        assert!(dir.path().join(AREA_REPORT_FILE).exists());
        assert!(dir.path().join(OVERLAY_FILE).exists());
        assert!(!dir.path().join(POLYGONS_FILE).exists());
        assert!(written.iter().all(|p| p.exists()));
    }
}
