//! End-to-end habitat scenarios through the file stores.
//!
//! Every test works in its own temporary directory: rasters are written as
//! GeoTIFF, vectors as GeoJSON with a `.prj`, and read back before checking.

use approx::assert_relative_eq;
use riverhsi_algorithms::algebra::{combine, CombineMethod, RasterMath};
use riverhsi_algorithms::conversion::{
    polygonize, raster_to_line, rasterize, Burn, RasterizeParams, DEFAULT_FIELD,
};
use riverhsi_algorithms::curve::{interpolate, SuitabilityCurve};
use riverhsi_algorithms::habitat::{composite_suitability, usable_area, DEFAULT_THRESHOLD};
use riverhsi_algorithms::reproject::{reproject_file, reproject_raster};
use riverhsi_algorithms::suitability::{CurveLibrary, LifeStage, Parameter};
use riverhsi_core::io::{self, read_geojson, write_geojson, Georeference, ScratchStore};
use riverhsi_core::raster::{GeoTransform, Raster};
use riverhsi_core::vector::{AttributeValue, Feature, VectorDataset};
use riverhsi_core::{CrsDescriptor, CRS, DEFAULT_NODATA};
use geo::{polygon, Geometry};
use ndarray::array;

/// 2x2 UTM 32N raster with 10 m pixels
fn utm_raster(values: Vec<f64>) -> Raster<f64> {
    let mut r = Raster::from_vec(values, 2, 2).unwrap();
    r.set_transform(GeoTransform::new(600000.0, 5000020.0, 10.0, -10.0));
    r.set_crs(CRS::from_epsg(32632).unwrap());
    r
}

fn assert_grid(r: &Raster<f64>, expected: &[f64]) {
    for (got, want) in r.data().iter().zip(expected) {
        if want.is_nan() {
            assert!(got.is_nan(), "expected no-data, got {got}");
        } else {
            assert_relative_eq!(*got, *want, epsilon = 1e-6);
        }
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn triangle_curve_scenario() {
    let curve = SuitabilityCurve::new(vec![0.0, 0.5, 1.0], vec![0.0, 1.0, 0.0]).unwrap();
    let scores = interpolate(&curve, &[-0.1, 0.0, 0.25, 0.5, 0.75, 1.0, 1.5]);
    assert!(scores[0].is_nan());
    assert_eq!(&scores[1..6], &[0.0, 0.5, 1.0, 0.5, 0.0]);
    assert!(scores[6].is_nan());
}

#[test]
fn geometric_mean_scenario_survives_storage() {
    let dir = tempfile::tempdir().unwrap();
    let a = utm_raster(vec![1.0, 0.0, 0.5, 0.5]);
    let b = utm_raster(vec![1.0, 1.0, 0.5, f64::NAN]);

    let (pa, pb) = (dir.path().join("a.tif"), dir.path().join("b.tif"));
    assert!(io::save(&a, &pa).is_success());
    assert!(io::save(&b, &pb).is_success());
    let a: Raster<f64> = io::load(&pa, None).unwrap();
    let b: Raster<f64> = io::load(&pb, None).unwrap();

    let chsi = combine(&[a, b], CombineMethod::GeometricMean).unwrap();
    assert_grid(&chsi, &[1.0, 0.0, 0.5, f64::NAN]);
}

#[test]
fn rasterize_square_scenario() {
    let mut ds = VectorDataset::new(CRS::from_epsg(25830).unwrap());
    ds.push(Feature::new(Geometry::Polygon(polygon![
        (x: 10.0, y: 10.0),
        (x: 30.0, y: 10.0),
        (x: 30.0, y: 30.0),
        (x: 10.0, y: 30.0),
        (x: 10.0, y: 10.0),
    ])));
    let params = RasterizeParams {
        pixel_size: 10.0,
        nodata: -9999.0,
        burn: Burn::Constant(1.0),
        extent: Some((0.0, 0.0, 40.0, 40.0)),
    };
    let raster = rasterize(&ds, &params).unwrap();

    let burned = raster.data().iter().filter(|&&v| v == 1.0).count();
    let empty = raster.data().iter().filter(|&&v| v == -9999.0).count();
    assert_eq!((burned, empty), (4, 12));
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[test]
fn full_pipeline_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let curves = dir.path().join("trout.json");
    std::fs::write(
        &curves,
        r#"{
            "velocity": {"juvenile": [{"u": 0.0, "HSI": 0.2}, {"u": 0.5, "HSI": 1.0}, {"u": 2.0, "HSI": 0.0}]},
            "depth": {"juvenile": [{"h": 0.1, "HSI": 0.0}, {"h": 1.0, "HSI": 1.0}, {"h": 3.0, "HSI": 0.5}]}
        }"#,
    )
    .unwrap();

    let velocity_path = dir.path().join("flow_velocity.tif");
    let depth_path = dir.path().join("water_depth.tif");
    let georef = Georeference::pick(Some((600000.0, 5000020.0)), (10.0, -10.0), None);
    let crs = CRS::from_epsg(32632).unwrap();
    assert!(io::create(&velocity_path, &array![[0.5, 0.25], [1.25, 3.0]], georef, &crs, DEFAULT_NODATA)
        .is_success());
    assert!(io::create(&depth_path, &array![[1.0, 1.0], [2.0, 1.0]], georef, &crs, DEFAULT_NODATA)
        .is_success());

    let library = CurveLibrary::from_path(&curves).unwrap();
    let velocity: Raster<f64> = io::load(&velocity_path, None).unwrap();
    let depth: Raster<f64> = io::load(&depth_path, None).unwrap();
    assert_eq!(velocity.name(), "flow_velocity");

    let hsi = composite_suitability(
        &[(Parameter::Velocity, &velocity), (Parameter::Depth, &depth)],
        &library,
        LifeStage::Juvenile,
        CombineMethod::GeometricMean,
    )
    .unwrap();
    // velocity 0.25 -> 0.6, 1.25 -> 0.5, 3.0 outside; depth 2.0 -> 0.75
    assert_grid(&hsi.composite, &[1.0, 0.6f64.sqrt(), (0.5f64 * 0.75).sqrt(), f64::NAN]);

    let chsi_path = dir.path().join("chsi.tif");
    assert!(io::save(&hsi.composite, &chsi_path).is_success());
    let chsi: Raster<f64> = io::load(&chsi_path, None).unwrap();
    assert_eq!(chsi.crs().code(), 32632);

    let area = usable_area(&chsi, DEFAULT_THRESHOLD).unwrap();
    assert_eq!(area.pixel_count, 3);
    assert_relative_eq!(area.area, 300.0);
    assert_eq!(area.unit, "m²");
}

#[test]
fn raster_math_keeps_intermediates_until_purge() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("__cache__");
    let mut store = ScratchStore::new(&cache);

    let depth = utm_raster(vec![1.0, 2.0, f64::NAN, 4.0]).with_name("depth");
    let velocity = utm_raster(vec![0.5, 0.5, 1.0, 0.0]).with_name("velocity");
    let froude_like = {
        let mut math = RasterMath::new(&mut store);
        let v2 = math.power(&velocity, 2.0).unwrap();
        math.divide(&v2, &depth).unwrap()
    };
    assert_grid(&froude_like, &[0.25, 0.125, f64::NAN, 0.0]);
    assert_eq!(store.files().len(), 2);
    assert!(store.files().iter().all(|p| p.exists()));

    store.purge().unwrap();
    assert!(!cache.exists());
}

// ---------------------------------------------------------------------------
// Conversion and reprojection through files
// ---------------------------------------------------------------------------

#[test]
fn polygons_and_lines_round_trip_geojson() {
    let dir = tempfile::tempdir().unwrap();
    let classes = utm_raster(vec![1.0, 1.0, 2.0, 1.0]);

    let polygons = polygonize(&classes, DEFAULT_FIELD).unwrap();
    let path = dir.path().join("classes.geojson");
    write_geojson(&polygons, &path).unwrap();
    let back = read_geojson(&path).unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back.crs().code(), 32632);
    let values: Vec<_> = back
        .iter()
        .filter_map(|f| f.get_property(DEFAULT_FIELD))
        .cloned()
        .collect();
    assert_eq!(values, vec![AttributeValue::Int(1), AttributeValue::Int(2)]);

    let lines = raster_to_line(&classes, 1.0).unwrap();
    let path = dir.path().join("thalweg.geojson");
    write_geojson(&lines, &path).unwrap();
    let back = read_geojson(&path).unwrap();
    match back.features()[0].geometry.as_ref() {
        // three pixels of value 1, all mutual neighbours
        Some(Geometry::MultiLineString(m)) => assert_eq!(m.0.len(), 3),
        other => panic!("expected multi-line, got {other:?}"),
    }
}

#[test]
fn reproject_raster_file_to_geographic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("water_depth.tif");
    let mut depth = Raster::filled(20, 20, 1.5);
    depth.set_transform(GeoTransform::new(440000.0, 4474400.0, 10.0, -10.0));
    depth.set_crs(CRS::from_epsg(32630).unwrap());
    assert!(io::save(&depth, &path).is_success());

    let out = reproject_file(&path, &CrsDescriptor::Epsg(4326)).unwrap();
    assert_eq!(out, dir.path().join("water_depth_epsg4326.tif"));
    let geographic: Raster<f64> = io::load(&out, None).unwrap();
    assert_eq!(geographic.crs().code(), 4326);
    assert_eq!(geographic.cols(), 20);

    // Madrid, roughly
    let (min_x, min_y, max_x, max_y) = geographic.bounds();
    assert!(min_x > -3.8 && max_x < -3.6, "x range {min_x}..{max_x}");
    assert!(min_y > 40.3 && max_y < 40.5, "y range {min_y}..{max_y}");

    let valid: Vec<f64> = geographic.data().iter().copied().filter(|v| !v.is_nan()).collect();
    assert!(!valid.is_empty());
    for v in valid {
        assert_relative_eq!(v, 1.5, epsilon = 1e-6);
    }

    let back = reproject_raster(&geographic, &CRS::from_epsg(32630).unwrap()).unwrap();
    assert_eq!(back.crs().code(), 32630);
}
