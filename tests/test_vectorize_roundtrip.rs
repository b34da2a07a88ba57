use approx::assert_relative_eq;
use floodmap::io::write_geojson;
use floodmap::synthetic::river_mask;
use floodmap::{rasterize_polygons, vectorize, Crs, GeoTransform};
use geo::Area;
use ndarray::Array2;

#[test]
fn test_river_mask_survives_vectorize_rasterize() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mask = river_mask(160, 80);
    let transform = GeoTransform::from_bounds(126.76, 37.43, 127.19, 37.61, 160, 80)
        .expect("Invalid bounds");
    let polygons = vectorize(&mask, &transform, &Crs::wgs84());
    println!("River traced into {} polygons", polygons.len());
    assert!(!polygons.is_empty());

    let geometries: Vec<_> = polygons.iter().map(|f| f.geometry.clone()).collect();
    let restored = rasterize_polygons(&geometries, &transform, mask.dim());
    assert_eq!(restored, mask);

    let pixel_area = transform.pixel_width() * transform.pixel_height();
    let positive = mask.iter().filter(|&&v| v == 1).count() as f64;
    let traced_area: f64 = geometries.iter().map(|p| p.unsigned_area()).sum();
    assert_relative_eq!(traced_area, positive * pixel_area, max_relative = 1e-6);
}

#[test]
fn test_ring_with_island_round_trips() {
    // Ring of water around a dry island, plus a detached pond
    let mut mask = Array2::<u8>::zeros((9, 9));
    for i in 1..6 {
        for j in 1..6 {
            mask[[i, j]] = 1;
        }
    }
    mask[[3, 3]] = 0;
    mask[[7, 7]] = 1;

    let transform = GeoTransform::from_gdal([500000.0, 10.0, 0.0, 4160000.0, 0.0, -10.0]);
    let polygons = vectorize(&mask, &transform, &Crs::from_epsg(32652));

    assert_eq!(polygons.len(), 2);
    let interiors: usize = polygons.iter().map(|f| f.geometry.interiors().len()).sum();
    assert_eq!(interiors, 1);

    let geometries: Vec<_> = polygons.iter().map(|f| f.geometry.clone()).collect();
    assert_eq!(rasterize_polygons(&geometries, &transform, mask.dim()), mask);

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("products").join("flood_areas.geojson");
    write_geojson(&polygons, &path).expect("Failed to write GeoJSON");

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("Missing GeoJSON"))
            .expect("Invalid GeoJSON");
    assert_eq!(written["crs"]["properties"]["name"], "EPSG:32652");
    assert_eq!(written["features"][0]["properties"]["class_value"], 1);
}
