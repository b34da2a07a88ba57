use crate::types::{BinaryMask, FloodError, FloodResult, GeoTransform, NODATA};
use geo::{BoundingRect, Contains, Geometry, MultiPolygon, Point, Polygon, Rect};

/// Area of interest restricting which cells take part in the analysis
#[derive(Debug, Clone, PartialEq)]
pub struct Aoi {
    polygons: MultiPolygon<f64>,
}

impl Aoi {
    /// Keep the polygonal members of a caller-supplied geometry collection
    ///
    /// Non-polygonal members are skipped. An empty input is
    /// [`FloodError::EmptyInput`]; input without any polygon is
    /// [`FloodError::InvalidGeometryType`] naming the types found.
    pub fn from_geometries(geometries: &[Geometry<f64>]) -> FloodResult<Self> {
        if geometries.is_empty() {
            return Err(FloodError::EmptyInput(
                "No geometry supplied for the area of interest".to_string(),
            ));
        }

        let mut polygons: Vec<Polygon<f64>> = Vec::new();
        let mut skipped: Vec<&'static str> = Vec::new();
        for geometry in geometries {
            collect_polygons(geometry, &mut polygons, &mut skipped);
        }

        if polygons.is_empty() {
            skipped.sort_unstable();
            skipped.dedup();
            return Err(FloodError::InvalidGeometryType(format!(
                "expected Polygon or MultiPolygon, found {}",
                skipped.join(", ")
            )));
        }
        if !skipped.is_empty() {
            log::warn!("Ignoring {} non-polygonal AOI geometries", skipped.len());
        }

        log::debug!("AOI built from {} polygons", polygons.len());
        Ok(Self {
            polygons: MultiPolygon::new(polygons),
        })
    }

    pub fn polygons(&self) -> &MultiPolygon<f64> {
        &self.polygons
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.polygons.bounding_rect()
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.polygons.contains(&Point::new(x, y))
    }

    /// Mark cells whose center lies outside the AOI with the no-data sentinel
    pub fn apply(&self, mask: &BinaryMask, transform: &GeoTransform) -> BinaryMask {
        let rect = self.bounding_rect();
        let mut clipped = mask.clone();
        let mut excluded = 0usize;

        for ((row, col), cell) in clipped.indexed_iter_mut() {
            let (x, y) = transform.pixel_center(row, col);
            let inside = rect.map_or(false, |r| {
                x >= r.min().x && x <= r.max().x && y >= r.min().y && y <= r.max().y
            }) && self.contains_point(x, y);
            if !inside {
                *cell = NODATA;
                excluded += 1;
            }
        }

        log::info!("AOI excluded {} of {} cells", excluded, clipped.len());
        clipped
    }
}

fn collect_polygons(
    geometry: &Geometry<f64>,
    polygons: &mut Vec<Polygon<f64>>,
    skipped: &mut Vec<&'static str>,
) {
    match geometry {
        Geometry::Polygon(polygon) => polygons.push(polygon.clone()),
        Geometry::MultiPolygon(multi) => polygons.extend(multi.0.iter().cloned()),
        Geometry::Rect(rect) => polygons.push(rect.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            for member in collection.iter() {
                collect_polygons(member, polygons, skipped);
            }
        }
        other => skipped.push(geometry_type_name(other)),
    }
}

/// OGC type name of a geometry
pub fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
