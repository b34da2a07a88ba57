//! Raster mask to polygon conversion
//!
//! Positive cells are grouped into 4-connected regions (cells touching only at
//! a corner are separate regions). Each region's boundary is traced along
//! pixel edges, giving one exterior ring plus one interior ring for every
//! enclosed pocket of non-positive cells. Vertices are pixel corners mapped
//! through the geotransform, so polygons align exactly with the raster grid.

use crate::types::{BinaryMask, Crs, GeoTransform, POSITIVE};
use geo::orient::{Direction, Orient};
use geo::{Coord, LineString, MultiPolygon, Polygon, Simplify};
use ndarray::Array2;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};

/// One traced region and its class value
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonFeature {
    pub geometry: Polygon<f64>,
    pub class_value: u8,
}

/// Ordered polygon collection in a single coordinate reference system
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonSet {
    crs: Crs,
    features: Vec<PolygonFeature>,
}

impl PolygonSet {
    pub fn new(crs: Crs) -> Self {
        Self {
            crs,
            features: Vec::new(),
        }
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn features(&self) -> &[PolygonFeature] {
        &self.features
    }

    pub fn push(&mut self, feature: PolygonFeature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PolygonFeature> {
        self.features.iter()
    }

    /// All geometries as one multipolygon
    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        MultiPolygon::new(self.features.iter().map(|f| f.geometry.clone()).collect())
    }

    /// Douglas-Peucker simplification with `epsilon` in CRS units
    ///
    /// Rings that collapse below a triangle are dropped; features whose
    /// exterior collapses are removed.
    pub fn simplify(&self, epsilon: f64) -> PolygonSet {
        let mut simplified = PolygonSet::new(self.crs.clone());
        for feature in &self.features {
            let exterior = feature.geometry.exterior().simplify(&epsilon);
            if exterior.0.len() < 4 {
                continue;
            }
            let interiors = feature
                .geometry
                .interiors()
                .iter()
                .map(|ring| ring.simplify(&epsilon))
                .filter(|ring| ring.0.len() >= 4)
                .collect();
            simplified.push(PolygonFeature {
                geometry: Polygon::new(exterior, interiors),
                class_value: feature.class_value,
            });
        }
        log::debug!(
            "Simplified {} polygons to {} (epsilon {})",
            self.len(),
            simplified.len(),
            epsilon
        );
        simplified
    }

    /// GeoJSON FeatureCollection with a `class_value` property per feature
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|feature| {
                let mut rings = vec![ring_coordinates(feature.geometry.exterior())];
                rings.extend(feature.geometry.interiors().iter().map(ring_coordinates));
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": rings,
                    },
                    "properties": {
                        "class_value": feature.class_value,
                    },
                })
            })
            .collect();

        json!({
            "type": "FeatureCollection",
            "crs": {
                "type": "name",
                "properties": { "name": self.crs.identifier },
            },
            "features": features,
        })
    }
}

fn ring_coordinates(ring: &LineString<f64>) -> Value {
    Value::Array(ring.coords().map(|c| json!([c.x, c.y])).collect())
}

/// Convert the positive cells of `mask` into polygons in `crs`
///
/// Returns an empty set when the mask has no positive cell.
pub fn vectorize(mask: &BinaryMask, transform: &GeoTransform, crs: &Crs) -> PolygonSet {
    let (rows, cols) = mask.dim();
    log::info!("Vectorizing {}x{} mask", rows, cols);

    let (labels, regions) = label_regions(mask);
    let mut polygons = PolygonSet::new(crs.clone());

    for (index, pixels) in regions.iter().enumerate() {
        let label = index as u32 + 1;
        let rings = trace_region(&labels, label, pixels);
        for geometry in assemble_polygons(rings, transform) {
            polygons.push(PolygonFeature {
                geometry,
                class_value: POSITIVE,
            });
        }
    }

    log::info!("Extracted {} polygons from {} regions", polygons.len(), regions.len());
    polygons
}

/// 4-connected labelling of positive cells in raster scan order
///
/// Label 0 marks cells outside every region; region `k` holds label `k + 1`.
fn label_regions(mask: &BinaryMask) -> (Array2<u32>, Vec<Vec<(usize, usize)>>) {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut regions = Vec::new();
    let mut queue = VecDeque::new();

    for r in 0..rows {
        for c in 0..cols {
            if mask[[r, c]] != POSITIVE || labels[[r, c]] != 0 {
                continue;
            }

            let label = regions.len() as u32 + 1;
            let mut pixels = Vec::new();
            labels[[r, c]] = label;
            queue.push_back((r, c));

            while let Some((pr, pc)) = queue.pop_front() {
                pixels.push((pr, pc));
                let neighbors = [
                    (pr.wrapping_sub(1), pc),
                    (pr + 1, pc),
                    (pr, pc.wrapping_sub(1)),
                    (pr, pc + 1),
                ];
                for (nr, nc) in neighbors {
                    if nr < rows && nc < cols && mask[[nr, nc]] == POSITIVE && labels[[nr, nc]] == 0 {
                        labels[[nr, nc]] = label;
                        queue.push_back((nr, nc));
                    }
                }
            }

            regions.push(pixels);
        }
    }

    (labels, regions)
}

/// Pixel corner `(x = col, y = row)`
type Vertex = (i64, i64);

#[derive(Debug, Clone, Copy)]
struct Edge {
    start: Vertex,
    end: Vertex,
}

impl Edge {
    fn direction(&self) -> (i64, i64) {
        (self.end.0 - self.start.0, self.end.1 - self.start.1)
    }
}

/// Closed rings (in pixel-corner coordinates) bounding one labelled region
///
/// Boundary edges are oriented with the region on their right-hand side when
/// viewed with rows growing downwards, so exteriors come out with positive
/// shoelace area and holes with negative area.
fn trace_region(labels: &Array2<u32>, label: u32, pixels: &[(usize, usize)]) -> Vec<Vec<Vertex>> {
    let (rows, cols) = labels.dim();
    let inside = |r: i64, c: i64| -> bool {
        r >= 0
            && c >= 0
            && (r as usize) < rows
            && (c as usize) < cols
            && labels[[r as usize, c as usize]] == label
    };

    let mut edges = Vec::new();
    for &(r, c) in pixels {
        let (r, c) = (r as i64, c as i64);
        if !inside(r - 1, c) {
            edges.push(Edge { start: (c, r), end: (c + 1, r) });
        }
        if !inside(r, c + 1) {
            edges.push(Edge { start: (c + 1, r), end: (c + 1, r + 1) });
        }
        if !inside(r + 1, c) {
            edges.push(Edge { start: (c + 1, r + 1), end: (c, r + 1) });
        }
        if !inside(r, c - 1) {
            edges.push(Edge { start: (c, r + 1), end: (c, r) });
        }
    }

    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::with_capacity(edges.len());
    for (index, edge) in edges.iter().enumerate() {
        outgoing.entry(edge.start).or_default().push(index);
    }

    // A corner shared by two diagonal cells of the region has two outgoing
    // edges. Turning left keeps each non-positive pocket in its own ring, so a
    // hole touching the exterior at a corner stays a separate interior ring.
    let next_edge = |current: usize| -> Option<usize> {
        let (dx, dy) = edges[current].direction();
        let candidates = outgoing.get(&edges[current].end)?;
        let preferred = [(dy, -dx), (dx, dy), (-dy, dx)];
        preferred.iter().find_map(|&dir| {
            candidates
                .iter()
                .copied()
                .find(|&candidate| edges[candidate].direction() == dir)
        })
    };

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();
    for first in 0..edges.len() {
        if used[first] {
            continue;
        }

        let mut ring_edges = Vec::new();
        let mut current = first;
        loop {
            used[current] = true;
            ring_edges.push(current);
            match next_edge(current) {
                Some(next) if next == first => break,
                Some(next) if !used[next] => current = next,
                _ => {
                    log::warn!("Unclosed boundary while tracing region {}", label);
                    break;
                }
            }
        }

        let vertices = corner_vertices(&edges, &ring_edges);
        if vertices.len() >= 4 {
            rings.push(vertices);
        }
    }

    rings
}

/// Ring vertices with collinear pixel corners removed
fn corner_vertices(edges: &[Edge], ring_edges: &[usize]) -> Vec<Vertex> {
    let n = ring_edges.len();
    (0..n)
        .filter(|&k| {
            let previous = edges[ring_edges[(k + n - 1) % n]].direction();
            previous != edges[ring_edges[k]].direction()
        })
        .map(|k| edges[ring_edges[k]].start)
        .collect()
}

fn shoelace(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|k| {
            let (x0, y0) = ring[k];
            let (x1, y1) = ring[(k + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum()
}

/// Map traced rings to CRS coordinates and group holes under their exterior
fn assemble_polygons(rings: Vec<Vec<Vertex>>, transform: &GeoTransform) -> Vec<Polygon<f64>> {
    let mut exteriors: Vec<(i64, Vec<Vertex>)> = Vec::new();
    let mut holes = Vec::new();
    for ring in rings {
        let area = shoelace(&ring);
        if area > 0 {
            exteriors.push((area, ring));
        } else if area < 0 {
            holes.push(ring);
        }
    }

    if exteriors.is_empty() {
        return Vec::new();
    }

    // A 4-connected region has a single exterior; the largest one owns the holes.
    exteriors.sort_by(|a, b| b.0.cmp(&a.0));
    let to_line = |ring: &[Vertex]| -> LineString<f64> {
        let coords: Vec<Coord<f64>> = ring
            .iter()
            .map(|&(x, y)| {
                let (gx, gy) = transform.pixel_to_geo(x as f64, y as f64);
                Coord { x: gx, y: gy }
            })
            .collect();
        LineString::from(coords)
    };

    let interiors: Vec<LineString<f64>> = holes.iter().map(|ring| to_line(ring)).collect();
    let mut polygons = Vec::with_capacity(exteriors.len());
    let mut exteriors = exteriors.into_iter();
    if let Some((_, ring)) = exteriors.next() {
        polygons.push(Polygon::new(to_line(&ring), interiors).orient(Direction::Default));
    }
    for (_, ring) in exteriors {
        log::debug!("Region produced an additional exterior ring");
        polygons.push(Polygon::new(to_line(&ring), Vec::new()).orient(Direction::Default));
    }
    polygons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rasterize::rasterize_polygons;
    use approx::assert_relative_eq;
    use geo::Area;
    use ndarray::{s, Array2};

    fn unit_transform() -> GeoTransform {
        GeoTransform::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }

    fn geo_transform() -> GeoTransform {
        GeoTransform::from_gdal([126.8, 0.001, 0.0, 37.6, 0.0, -0.001])
    }

    #[test]
    fn test_all_zero_mask_is_empty() {
        let mask = Array2::<u8>::zeros((10, 10));
        let polygons = vectorize(&mask, &geo_transform(), &Crs::wgs84());
        assert!(polygons.is_empty());
        assert_eq!(polygons.crs(), &Crs::wgs84());
    }

    #[test]
    fn test_zero_sized_mask_is_empty() {
        let mask = Array2::<u8>::zeros((0, 0));
        assert!(vectorize(&mask, &geo_transform(), &Crs::wgs84()).is_empty());
    }

    #[test]
    fn test_single_pixel_square() {
        let mut mask = Array2::<u8>::zeros((3, 3));
        mask[[1, 1]] = 1;

        let polygons = vectorize(&mask, &unit_transform(), &Crs::wgs84());
        assert_eq!(polygons.len(), 1);

        let feature = &polygons.features()[0];
        assert_eq!(feature.class_value, 1);
        assert_eq!(feature.geometry.exterior().0.len(), 5);
        assert_relative_eq!(feature.geometry.unsigned_area(), 1.0);
    }

    #[test]
    fn test_rectangle_collinear_vertices_removed() {
        let mut mask = Array2::<u8>::zeros((6, 8));
        mask.slice_mut(s![1..4, 2..7]).fill(1);

        let polygons = vectorize(&mask, &unit_transform(), &Crs::wgs84());
        assert_eq!(polygons.len(), 1);
        let geometry = &polygons.features()[0].geometry;
        assert_eq!(geometry.exterior().0.len(), 5);
        assert_relative_eq!(geometry.unsigned_area(), 15.0);
    }

    #[test]
    fn test_diagonal_cells_are_separate_regions() {
        let mut mask = Array2::<u8>::zeros((2, 2));
        mask[[0, 0]] = 1;
        mask[[1, 1]] = 1;

        let polygons = vectorize(&mask, &unit_transform(), &Crs::wgs84());
        assert_eq!(polygons.len(), 2);
        for feature in polygons.iter() {
            assert_relative_eq!(feature.geometry.unsigned_area(), 1.0);
        }
    }

    #[test]
    fn test_enclosed_zero_becomes_hole() {
        let mut mask = Array2::<u8>::ones((3, 3));
        mask[[1, 1]] = 0;

        let polygons = vectorize(&mask, &unit_transform(), &Crs::wgs84());
        assert_eq!(polygons.len(), 1);
        let geometry = &polygons.features()[0].geometry;
        assert_eq!(geometry.interiors().len(), 1);
        assert_relative_eq!(geometry.unsigned_area(), 8.0);
    }

    #[test]
    fn test_hole_touching_exterior_at_corner() {
        // The pocket at (1, 2) meets the outside cell (0, 3) at a single corner.
        let mask = Array2::from_shape_vec(
            (3, 4),
            vec![
                1, 1, 1, 0,
                1, 1, 0, 1,
                1, 1, 1, 1,
            ],
        )
        .unwrap();

        let polygons = vectorize(&mask, &unit_transform(), &Crs::wgs84());
        assert_eq!(polygons.len(), 1);
        let geometry = &polygons.features()[0].geometry;
        assert_eq!(geometry.interiors().len(), 1);
        assert_relative_eq!(geometry.unsigned_area(), 10.0);

        let restored = rasterize_polygons(&[geometry.clone()], &unit_transform(), mask.dim());
        assert_eq!(restored, mask);
    }

    #[test]
    fn test_nodata_is_not_vectorized() {
        let mut mask = Array2::<u8>::from_elem((3, 3), 255);
        mask[[0, 0]] = 1;
        let polygons = vectorize(&mask, &unit_transform(), &Crs::wgs84());
        assert_eq!(polygons.len(), 1);
        assert_relative_eq!(polygons.features()[0].geometry.unsigned_area(), 1.0);
    }

    #[test]
    fn test_geographic_coordinates_and_orientation() {
        let mut mask = Array2::<u8>::zeros((4, 4));
        mask.slice_mut(s![0..2, 0..2]).fill(1);

        let polygons = vectorize(&mask, &geo_transform(), &Crs::wgs84());
        let geometry = &polygons.features()[0].geometry;

        for coord in geometry.exterior().coords() {
            assert!(coord.x >= 126.8 - 1e-9 && coord.x <= 126.802 + 1e-9);
            assert!(coord.y <= 37.6 + 1e-9 && coord.y >= 37.598 - 1e-9);
        }
        assert!(geometry.signed_area() > 0.0);
        assert_relative_eq!(geometry.unsigned_area(), 4e-6, max_relative = 1e-6);
    }

    #[test]
    fn test_all_one_round_trip() {
        let mask = Array2::<u8>::ones((12, 9));
        let transform = geo_transform();
        let polygons = vectorize(&mask, &transform, &Crs::wgs84());
        assert_eq!(polygons.len(), 1);

        let geometries: Vec<Polygon<f64>> = polygons.iter().map(|f| f.geometry.clone()).collect();
        let restored = rasterize_polygons(&geometries, &transform, mask.dim());
        assert_eq!(restored, mask);
    }

    #[test]
    fn test_irregular_round_trip() {
        let mask = Array2::from_shape_fn((16, 16), |(i, j)| {
            let di = i as f64 - 7.5;
            let dj = j as f64 - 7.5;
            let r2 = di * di + dj * dj;
            u8::from((9.0..40.0).contains(&r2) || (i == 0 && j % 3 == 0))
        });
        let transform = geo_transform();
        let polygons = vectorize(&mask, &transform, &Crs::wgs84());

        let geometries: Vec<Polygon<f64>> = polygons.iter().map(|f| f.geometry.clone()).collect();
        let restored = rasterize_polygons(&geometries, &transform, mask.dim());
        assert_eq!(restored, mask);
    }

    #[test]
    fn test_geojson_export() {
        let mut mask = Array2::<u8>::zeros((3, 3));
        mask[[0, 0]] = 1;
        mask[[2, 2]] = 1;

        let polygons = vectorize(&mask, &geo_transform(), &Crs::wgs84());
        let geojson = polygons.to_geojson();

        assert_eq!(geojson["type"], "FeatureCollection");
        assert_eq!(geojson["crs"]["properties"]["name"], "EPSG:4326");
        let features = geojson["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["properties"]["class_value"], 1);
        assert_eq!(features[0]["geometry"]["coordinates"][0].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_simplify_keeps_rectangles() {
        let mut mask = Array2::<u8>::zeros((10, 10));
        mask.slice_mut(s![2..8, 2..8]).fill(1);
        let polygons = vectorize(&mask, &unit_transform(), &Crs::wgs84());

        let simplified = polygons.simplify(0.5);
        assert_eq!(simplified.len(), 1);
        assert_relative_eq!(simplified.features()[0].geometry.unsigned_area(), 36.0);
        assert_eq!(simplified.crs(), polygons.crs());
    }
}
