use crate::types::{BinaryMask, GeoTransform, NEGATIVE, POSITIVE};
use geo::{BoundingRect, Contains, Point, Polygon};
use ndarray::Array2;

/// Burn polygons into a `(rows, cols)` mask on the grid described by `transform`
///
/// A cell is positive when its center lies inside any polygon (holes
/// excluded). Cells whose center falls exactly on a boundary stay negative.
pub fn rasterize_polygons(
    polygons: &[Polygon<f64>],
    transform: &GeoTransform,
    shape: (usize, usize),
) -> BinaryMask {
    let (rows, cols) = shape;
    let mut mask = Array2::from_elem((rows, cols), NEGATIVE);

    let candidates: Vec<(&Polygon<f64>, geo::Rect<f64>)> = polygons
        .iter()
        .filter_map(|polygon| polygon.bounding_rect().map(|rect| (polygon, rect)))
        .collect();
    if candidates.is_empty() {
        return mask;
    }

    for ((row, col), cell) in mask.indexed_iter_mut() {
        let (x, y) = transform.pixel_center(row, col);
        let center = Point::new(x, y);
        let hit = candidates.iter().any(|(polygon, rect)| {
            x >= rect.min().x
                && x <= rect.max().x
                && y >= rect.min().y
                && y <= rect.max().y
                && polygon.contains(&center)
        });
        if hit {
            *cell = POSITIVE;
        }
    }

    log::debug!(
        "Rasterized {} polygons into {}x{} mask ({} positive cells)",
        polygons.len(),
        rows,
        cols,
        mask.iter().filter(|&&v| v == POSITIVE).count()
    );
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, LineString};

    #[test]
    fn test_rasterize_square() {
        let transform = GeoTransform::from_gdal([0.0, 1.0, 0.0, 4.0, 0.0, -1.0]);
        let square = polygon![
            (x: 1.0, y: 1.0),
            (x: 3.0, y: 1.0),
            (x: 3.0, y: 3.0),
            (x: 1.0, y: 3.0),
        ];

        let mask = rasterize_polygons(&[square], &transform, (4, 4));
        let expected = Array2::from_shape_vec(
            (4, 4),
            vec![
                0, 0, 0, 0,
                0, 1, 1, 0,
                0, 1, 1, 0,
                0, 0, 0, 0,
            ],
        )
        .unwrap();
        assert_eq!(mask, expected);
    }

    #[test]
    fn test_rasterize_respects_holes() {
        let transform = GeoTransform::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let exterior = LineString::from(vec![(0.0, 0.0), (3.0, 0.0), (3.0, 3.0), (0.0, 3.0)]);
        let hole = LineString::from(vec![(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0)]);
        let donut = Polygon::new(exterior, vec![hole]);

        let mask = rasterize_polygons(&[donut], &transform, (3, 3));
        assert_eq!(mask[[1, 1]], 0);
        assert_eq!(mask.iter().filter(|&&v| v == 1).count(), 8);
    }

    #[test]
    fn test_rasterize_nothing() {
        let transform = GeoTransform::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let mask = rasterize_polygons(&[], &transform, (2, 3));
        assert_eq!(mask.dim(), (2, 3));
        assert!(mask.iter().all(|&v| v == 0));
    }
}
