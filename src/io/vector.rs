use crate::core::vectorize::PolygonSet;
use crate::types::{FloodError, FloodResult};
use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use serde_json::Value;
use std::path::Path;

/// Write a polygon set as a GeoJSON FeatureCollection
pub fn write_geojson<P: AsRef<Path>>(polygons: &PolygonSet, output_path: P) -> FloodResult<()> {
    log::info!(
        "Writing {} polygons to {}",
        polygons.len(),
        output_path.as_ref().display()
    );

    if let Some(parent) = output_path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(output_path.as_ref())?;
    serde_json::to_writer(std::io::BufWriter::new(file), &polygons.to_geojson())?;
    Ok(())
}

/// Read every geometry of a GeoJSON FeatureCollection, Feature or bare geometry
///
/// Features without geometry are skipped.
pub fn read_geojson<P: AsRef<Path>>(input_path: P) -> FloodResult<Vec<Geometry<f64>>> {
    log::info!("Reading GeoJSON from {}", input_path.as_ref().display());
    let content = std::fs::read_to_string(input_path.as_ref())?;
    let document: Value = serde_json::from_str(&content)?;
    let geometries = parse_geojson(&document)?;
    log::debug!("Read {} geometries", geometries.len());
    Ok(geometries)
}

/// Geometries of an already parsed GeoJSON document
pub fn parse_geojson(document: &Value) -> FloodResult<Vec<Geometry<f64>>> {
    match type_of(document)? {
        "FeatureCollection" => {
            let features = document["features"]
                .as_array()
                .ok_or_else(|| invalid("FeatureCollection without a features array"))?;
            let mut geometries = Vec::with_capacity(features.len());
            for feature in features {
                geometries.extend(feature_geometry(feature)?);
            }
            Ok(geometries)
        }
        "Feature" => Ok(feature_geometry(document)?.into_iter().collect()),
        _ => Ok(vec![parse_geometry(document)?]),
    }
}

fn feature_geometry(feature: &Value) -> FloodResult<Option<Geometry<f64>>> {
    match &feature["geometry"] {
        Value::Null => Ok(None),
        geometry => parse_geometry(geometry).map(Some),
    }
}

fn parse_geometry(geometry: &Value) -> FloodResult<Geometry<f64>> {
    let coordinates = &geometry["coordinates"];
    Ok(match type_of(geometry)? {
        "Point" => Geometry::Point(Point::from(position(coordinates)?)),
        "MultiPoint" => Geometry::MultiPoint(MultiPoint::new(
            positions(coordinates)?.into_iter().map(Point::from).collect(),
        )),
        "LineString" => Geometry::LineString(LineString::new(positions(coordinates)?)),
        "MultiLineString" => Geometry::MultiLineString(MultiLineString::new(
            nested(coordinates, |c| positions(c).map(LineString::new))?,
        )),
        "Polygon" => Geometry::Polygon(polygon(coordinates)?),
        "MultiPolygon" => Geometry::MultiPolygon(MultiPolygon::new(nested(coordinates, polygon)?)),
        "GeometryCollection" => Geometry::GeometryCollection(GeometryCollection::new_from(
            nested(&geometry["geometries"], parse_geometry)?,
        )),
        other => {
            return Err(FloodError::InvalidGeometryType(format!(
                "unknown GeoJSON type {}",
                other
            )))
        }
    })
}

fn type_of(object: &Value) -> FloodResult<&str> {
    object["type"]
        .as_str()
        .ok_or_else(|| invalid("object without a type member"))
}

fn invalid(message: &str) -> FloodError {
    FloodError::InvalidParameter(format!("Invalid GeoJSON: {}", message))
}

fn nested<T>(value: &Value, parse: impl Fn(&Value) -> FloodResult<T>) -> FloodResult<Vec<T>> {
    value
        .as_array()
        .ok_or_else(|| invalid("expected an array"))?
        .iter()
        .map(parse)
        .collect()
}

fn position(value: &Value) -> FloodResult<Coord<f64>> {
    match value.as_array().map(|p| (p.first(), p.get(1))) {
        Some((Some(x), Some(y))) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => Ok(Coord { x, y }),
            _ => Err(invalid("non-numeric position")),
        },
        _ => Err(invalid("position needs two numbers")),
    }
}

fn positions(value: &Value) -> FloodResult<Vec<Coord<f64>>> {
    nested(value, position)
}

fn polygon(value: &Value) -> FloodResult<Polygon<f64>> {
    let mut rings = nested(value, |c| positions(c).map(LineString::new))?.into_iter();
    let exterior = rings.next().ok_or_else(|| invalid("polygon without rings"))?;
    Ok(Polygon::new(exterior, rings.collect()))
}
