use crate::types::{
    BinaryMask, Crs, FloodError, FloodResult, GeoTransform, Grid, PixelUnits, RasterLayer, NODATA,
};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::Path;

/// Read band 1 of a raster as a georeferenced f32 grid
///
/// Cells equal to the band's no-data value are returned as NaN.
pub fn read_raster<P: AsRef<Path>>(path: P) -> FloodResult<RasterLayer> {
    log::info!("Reading raster from: {}", path.as_ref().display());

    let dataset = Dataset::open(path.as_ref())?;
    let transform = GeoTransform::from_gdal(dataset.geo_transform()?);
    let (width, height) = dataset.raster_size();
    log::debug!("Raster size: {}x{}, transform: {:?}", width, height, transform);

    let rasterband = dataset.rasterband(1)?;
    let nodata = rasterband.no_data_value();
    let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

    let mut data = Array2::from_shape_vec((height, width), band_data.data)
        .map_err(|e| FloodError::Processing(format!("Failed to reshape raster data: {}", e)))?;
    if let Some(nodata) = nodata {
        let nodata = nodata as f32;
        let mut replaced = 0usize;
        data.mapv_inplace(|v| {
            if v == nodata {
                replaced += 1;
                f32::NAN
            } else {
                v
            }
        });
        log::debug!("Replaced {} no-data cells with NaN", replaced);
    }

    let crs = crs_of(&dataset);
    Ok(RasterLayer::new(data, transform, crs))
}

fn crs_of(dataset: &Dataset) -> Crs {
    match dataset.spatial_ref() {
        Ok(srs) => {
            let units = if srs.is_geographic() {
                PixelUnits::Degrees
            } else {
                PixelUnits::Meters
            };
            let identifier = match (srs.auth_name(), srs.auth_code()) {
                (Ok(name), Ok(code)) => format!("{}:{}", name, code),
                _ => srs.to_wkt().unwrap_or_else(|_| dataset.projection()),
            };
            Crs::new(identifier, units)
        }
        Err(e) => {
            log::warn!("Raster has no usable spatial reference ({}), assuming EPSG:4326", e);
            Crs::wgs84()
        }
    }
}

fn spatial_ref_for(crs: &Crs) -> FloodResult<SpatialRef> {
    match crs.epsg() {
        Some(code) => Ok(SpatialRef::from_epsg(code)?),
        None => Ok(SpatialRef::from_definition(&crs.identifier)?),
    }
}

/// Save a continuous grid (e.g. the change map) as a float GeoTIFF
pub fn write_grid_geotiff<P: AsRef<Path>>(
    grid: &Grid,
    transform: &GeoTransform,
    crs: &Crs,
    output_path: P,
) -> FloodResult<()> {
    log::info!("Saving grid as GeoTIFF: {}", output_path.as_ref().display());

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (height, width) = grid.dim();

    let mut dataset = driver.create_with_band_type::<f32, _>(
        output_path.as_ref(),
        width as isize,
        height as isize,
        1,
    )?;
    dataset.set_geo_transform(&transform.to_gdal())?;
    dataset.set_spatial_ref(&spatial_ref_for(crs)?)?;

    let mut rasterband = dataset.rasterband(1)?;
    let flat_data: Vec<f32> = grid.iter().cloned().collect();
    let buffer = gdal::raster::Buffer::new((width, height), flat_data);
    rasterband.write((0, 0), (width, height), &buffer)?;
    rasterband.set_no_data_value(Some(f32::NAN as f64))?;

    Ok(())
}

/// Save a binary mask as a byte GeoTIFF with no-data 255
pub fn write_mask_geotiff<P: AsRef<Path>>(
    mask: &BinaryMask,
    transform: &GeoTransform,
    crs: &Crs,
    output_path: P,
) -> FloodResult<()> {
    log::info!("Saving mask as GeoTIFF: {}", output_path.as_ref().display());

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (height, width) = mask.dim();

    let mut dataset = driver.create_with_band_type::<u8, _>(
        output_path.as_ref(),
        width as isize,
        height as isize,
        1,
    )?;
    dataset.set_geo_transform(&transform.to_gdal())?;
    dataset.set_spatial_ref(&spatial_ref_for(crs)?)?;

    let mut rasterband = dataset.rasterband(1)?;
    let flat_data: Vec<u8> = mask.iter().cloned().collect();
    let buffer = gdal::raster::Buffer::new((width, height), flat_data);
    rasterband.write((0, 0), (width, height), &buffer)?;
    rasterband.set_no_data_value(Some(NODATA as f64))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("change_map.tif");

        let grid = Array2::from_shape_fn((5, 7), |(i, j)| i as f32 - j as f32 * 0.5);
        let transform = GeoTransform::from_gdal([126.8, 0.001, 0.0, 37.6, 0.0, -0.001]);
        write_grid_geotiff(&grid, &transform, &Crs::wgs84(), &path).unwrap();

        let layer = read_raster(&path).unwrap();
        assert_eq!(layer.shape(), (5, 7));
        assert_eq!(layer.transform, transform);
        assert!(layer.crs.is_geographic());
        assert_eq!(layer.data[[4, 6]], grid[[4, 6]]);
    }

    #[test]
    fn test_mask_nodata_reads_as_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flood_mask.tif");

        let mut mask = Array2::<u8>::zeros((3, 3));
        mask[[0, 0]] = 1;
        mask[[2, 2]] = NODATA;
        let transform = GeoTransform::from_gdal([0.0, 10.0, 0.0, 100.0, 0.0, -10.0]);
        write_mask_geotiff(&mask, &transform, &Crs::from_epsg(32652), &path).unwrap();

        let layer = read_raster(&path).unwrap();
        assert_eq!(layer.data[[0, 0]], 1.0);
        assert!(layer.data[[2, 2]].is_nan());
        assert_eq!(layer.crs.units, PixelUnits::Meters);
    }
}
