use crate::types::{ensure_same_shape, BinaryMask, FloodError, FloodResult, POSITIVE};
use image::{Rgb, RgbImage};
use ndarray::Array2;
use num_traits::Float;

/// Blend `color` over `base_image` at positive mask cells
///
/// Masked cells become `alpha * base + (1 - alpha) * color`; every other cell
/// keeps the base value on all three channels. Channels are clipped to
/// [0, 255] and truncated to 8 bits.
pub fn overlay(
    base_image: &Array2<f32>,
    mask: &BinaryMask,
    color: [u8; 3],
    alpha: f32,
) -> FloodResult<RgbImage> {
    ensure_same_shape("base image/mask", base_image.dim(), mask.dim())?;
    if !(0.0..=1.0).contains(&alpha) {
        return Err(FloodError::InvalidParameter(format!(
            "Overlay alpha must be within [0, 1], got {}",
            alpha
        )));
    }

    let (rows, cols) = base_image.dim();
    let width = u32::try_from(cols)
        .map_err(|_| FloodError::InvalidParameter(format!("Image too wide: {} columns", cols)))?;
    let height = u32::try_from(rows)
        .map_err(|_| FloodError::InvalidParameter(format!("Image too tall: {} rows", rows)))?;

    let mut image = RgbImage::new(width, height);
    for ((row, col), &base) in base_image.indexed_iter() {
        let pixel = if mask[[row, col]] == POSITIVE {
            let blend = |channel: u8| to_channel(alpha * base + (1.0 - alpha) * channel as f32);
            Rgb([blend(color[0]), blend(color[1]), blend(color[2])])
        } else {
            let value = to_channel(base);
            Rgb([value, value, value])
        };
        image.put_pixel(col as u32, row as u32, pixel);
    }

    log::debug!("Rendered {}x{} overlay (alpha {})", width, height, alpha);
    Ok(image)
}

fn to_channel(value: f32) -> u8 {
    // NaN saturates to 0 in the cast
    value.clamp(0.0, 255.0) as u8
}

/// Min-max stretch to [0, 255] for display; NaN cells map to 0
pub fn normalize_for_display<T: Float>(grid: &Array2<T>) -> Array2<f32> {
    let (min, max) = crate::core::change_detection::finite_range(grid);
    if min.is_nan() {
        return Array2::zeros(grid.dim());
    }

    let min = min.to_f64().unwrap_or(0.0);
    let range = max.to_f64().unwrap_or(0.0) - min + 1e-6;
    grid.mapv(|v| match v.to_f64() {
        Some(v) if v.is_finite() => (((v - min) / range) * 255.0).clamp(0.0, 255.0) as f32,
        Some(v) if v == f64::INFINITY => 255.0,
        _ => 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn checker_mask() -> BinaryMask {
        Array2::from_shape_fn((4, 4), |(i, j)| ((i + j) % 2) as u8)
    }

    #[test]
    fn test_alpha_zero_gives_exact_color() {
        let base = Array2::<f32>::from_elem((4, 4), 90.0);
        let image = overlay(&base, &checker_mask(), [255, 0, 40], 0.0).unwrap();

        assert_eq!(image.get_pixel(1, 0), &Rgb([255, 0, 40]));
        assert_eq!(image.get_pixel(0, 0), &Rgb([90, 90, 90]));
    }

    #[test]
    fn test_alpha_one_keeps_base() {
        let base = Array2::from_shape_fn((4, 4), |(i, j)| (i * 40 + j * 10) as f32);
        let image = overlay(&base, &checker_mask(), [255, 0, 0], 1.0).unwrap();

        for ((i, j), &v) in base.indexed_iter() {
            assert_eq!(image.get_pixel(j as u32, i as u32), &Rgb([v as u8, v as u8, v as u8]));
        }
    }

    #[test]
    fn test_half_blend_truncates() {
        let base = Array2::<f32>::from_elem((1, 1), 101.0);
        let mask = Array2::<u8>::ones((1, 1));
        let image = overlay(&base, &mask, [0, 255, 10], 0.5).unwrap();
        // 50.5 -> 50, 178.0 -> 178, 55.5 -> 55
        assert_eq!(image.get_pixel(0, 0), &Rgb([50, 178, 55]));
    }

    #[test]
    fn test_out_of_range_base_is_clipped() {
        let base = Array2::from_shape_vec((1, 3), vec![-20.0f32, 300.0, f32::NAN]).unwrap();
        let mask = Array2::<u8>::zeros((1, 3));
        let image = overlay(&base, &mask, [0, 0, 0], 0.5).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([255, 255, 255]));
        assert_eq!(image.get_pixel(2, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_nodata_cells_keep_base() {
        let base = Array2::<f32>::from_elem((1, 1), 12.0);
        let mask = Array2::<u8>::from_elem((1, 1), 255);
        let image = overlay(&base, &mask, [255, 0, 0], 0.0).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgb([12, 12, 12]));
    }

    #[test]
    fn test_shape_mismatch_and_bad_alpha() {
        let base = Array2::<f32>::zeros((3, 3));
        assert!(matches!(
            overlay(&base, &Array2::zeros((3, 2)), [0, 0, 0], 0.5),
            Err(FloodError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            overlay(&base, &Array2::zeros((3, 3)), [0, 0, 0], 1.5),
            Err(FloodError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_normalize_for_display() {
        let grid = Array2::from_shape_vec((1, 4), vec![-25.0f32, -12.5, 0.0, f32::NAN]).unwrap();
        let display = normalize_for_display(&grid);
        assert_eq!(display[[0, 0]], 0.0);
        assert!((display[[0, 1]] - 127.5).abs() < 0.01);
        assert!(display[[0, 2]] > 254.9);
        assert_eq!(display[[0, 3]], 0.0);

        let constant = Array2::<f32>::from_elem((2, 2), -8.0);
        assert!(normalize_for_display(&constant).iter().all(|&v| v == 0.0));
    }
}
