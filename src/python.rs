//! Python bindings (`floodmap._core`)

use crate::core::change_detection::{ChangeDetectionParams, ChangeDetector, ChangeDirection};
use crate::core::overlay::overlay;
use crate::core::statistics::summarize_with_units;
use crate::core::vectorize::vectorize;
use crate::types::{Crs, FloodError, GeoTransform, PixelUnits};
use numpy::{PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

/// Convert PyReadonlyArray2 to ndarray Array2
fn numpy_to_array2<T>(arr: PyReadonlyArray2<T>) -> ndarray::Array2<T>
where
    T: Copy + numpy::Element,
{
    arr.as_array().to_owned()
}

fn to_py_err(error: FloodError) -> PyErr {
    match error {
        FloodError::Io(_) | FloodError::Processing(_) | FloodError::Image(_) => {
            PyRuntimeError::new_err(error.to_string())
        }
        _ => PyValueError::new_err(error.to_string()),
    }
}

fn parse_units(units: &str) -> PyResult<PixelUnits> {
    match units.to_lowercase().as_str() {
        "degrees" => Ok(PixelUnits::Degrees),
        "meters" => Ok(PixelUnits::Meters),
        _ => Err(PyValueError::new_err(format!("Invalid pixel units: {}", units))),
    }
}

/// Threshold change detection; returns {"mask", "change", "positive_pixel_count"}
#[pyfunction]
#[pyo3(signature = (before, after, threshold, direction = "decrease"))]
fn detect_change(
    py: Python,
    before: PyReadonlyArray2<f32>,
    after: PyReadonlyArray2<f32>,
    threshold: f32,
    direction: &str,
) -> PyResult<PyObject> {
    let direction = match direction.to_lowercase().as_str() {
        "decrease" => ChangeDirection::Decrease,
        "increase" => ChangeDirection::Increase,
        _ => return Err(PyValueError::new_err(format!("Invalid direction: {}", direction))),
    };

    let before = numpy_to_array2(before);
    let after = numpy_to_array2(after);
    let detector = ChangeDetector::new(ChangeDetectionParams {
        threshold,
        direction,
    });
    let (mask, change) = detector.detect(&before, &after).map_err(to_py_err)?;

    let result = PyDict::new(py);
    result.set_item("mask", mask.to_pyarray(py))?;
    result.set_item("change", change.to_pyarray(py))?;
    result.set_item("positive_pixel_count", mask.iter().filter(|&&v| v == 1).count())?;
    Ok(result.into())
}

/// Area statistics for a mask; `transform` is the GDAL six-tuple
#[pyfunction]
#[pyo3(signature = (mask, transform, reference_latitude = 37.55, units = "degrees"))]
fn summarize_mask(
    py: Python,
    mask: PyReadonlyArray2<u8>,
    transform: [f64; 6],
    reference_latitude: f64,
    units: &str,
) -> PyResult<PyObject> {
    let mask = numpy_to_array2(mask);
    let report = summarize_with_units(
        &mask,
        &GeoTransform::from_gdal(transform),
        parse_units(units)?,
        reference_latitude,
    )
    .map_err(to_py_err)?;

    let result = PyDict::new(py);
    result.set_item("positive_pixel_count", report.positive_pixel_count)?;
    result.set_item("total_pixel_count", report.total_pixel_count)?;
    result.set_item("positive_ratio", report.positive_ratio)?;
    result.set_item("pixel_area_m2", report.pixel_area_m2)?;
    result.set_item("area_km2", report.area_km2)?;
    result.set_item("area_ha", report.area_ha)?;
    Ok(result.into())
}

/// Polygons of the positive regions as a GeoJSON FeatureCollection string
#[pyfunction]
#[pyo3(signature = (mask, transform, crs = "EPSG:4326"))]
fn vectorize_mask(mask: PyReadonlyArray2<u8>, transform: [f64; 6], crs: &str) -> PyResult<String> {
    let crs: Crs = crs.parse().map_err(to_py_err)?;
    let mask = numpy_to_array2(mask);
    let polygons = vectorize(&mask, &GeoTransform::from_gdal(transform), &crs);
    Ok(polygons.to_geojson().to_string())
}

/// Colored overlay as a (rows, cols, 3) uint8 array
#[pyfunction]
#[pyo3(signature = (base_image, mask, color = [255, 0, 0], alpha = 0.4))]
fn overlay_mask(
    py: Python,
    base_image: PyReadonlyArray2<f32>,
    mask: PyReadonlyArray2<u8>,
    color: [u8; 3],
    alpha: f32,
) -> PyResult<PyObject> {
    let base = numpy_to_array2(base_image);
    let mask = numpy_to_array2(mask);
    let (rows, cols) = base.dim();

    let image = overlay(&base, &mask, color, alpha).map_err(to_py_err)?;
    let pixels = ndarray::Array3::from_shape_vec((rows, cols, 3), image.into_raw())
        .map_err(|e| PyRuntimeError::new_err(format!("Failed to shape overlay: {}", e)))?;
    Ok(pixels.to_pyarray(py).into())
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(detect_change, m)?)?;
    m.add_function(wrap_pyfunction!(summarize_mask, m)?)?;
    m.add_function(wrap_pyfunction!(vectorize_mask, m)?)?;
    m.add_function(wrap_pyfunction!(overlay_mask, m)?)?;
    Ok(())
}
