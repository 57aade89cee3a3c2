//! Raster regions to polygons
//!
//! Pixels are grouped into maximal 4-connected regions of equal integer
//! value. Each region becomes one polygon traced along the pixel edges, with
//! holes for enclosed pixels of other values. No-data pixels never form a
//! region.

use geo::orient::{Direction, Orient};
use geo::{Area, Coord, Geometry, LineString, Polygon};
use ndarray::Array2;
use riverhsi_core::io;
use riverhsi_core::raster::{Connectivity, Raster, RasterElement, DEFAULT_NODATA};
use riverhsi_core::vector::{AttributeValue, Feature, FieldDef, FieldKind, VectorDataset};
use riverhsi_core::{Error, Result};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

/// Attribute field that receives the region value unless told otherwise
pub const DEFAULT_FIELD: &str = "values";

/// Truncate every valid sample toward zero
///
/// No-data becomes an integer sentinel no valid cell truncates onto: the
/// raster's own no-data value when it is a whole number, else `-9999`, else
/// the lowest free value.
pub fn to_integer_raster(raster: &Raster<f64>) -> Raster<i32> {
    let taken = |candidate: i32| {
        raster
            .data()
            .iter()
            .any(|&v| !raster.is_nodata(v) && v.trunc() as i32 == candidate)
    };
    let own = raster
        .nodata()
        .filter(|v| v.is_finite() && v.fract() == 0.0)
        .and_then(i32::from_f64);
    let nodata = own
        .into_iter()
        .chain([DEFAULT_NODATA as i32])
        .chain(i32::MIN..=i32::MAX)
        .find(|&c| !taken(c))
        .unwrap_or(DEFAULT_NODATA as i32);

    let data = raster
        .data()
        .mapv(|v| if raster.is_nodata(v) { nodata } else { v.trunc() as i32 });

    let (rows, cols) = raster.shape();
    let mut out = raster.with_same_meta::<i32>(rows, cols);
    out.set_nodata(Some(nodata));
    out.set_name(format!("{}_int", raster.name()));
    // shapes match by construction
    *out.data_mut() = data;
    out
}

/// Polygonize a raster, truncating non-integer samples first
pub fn polygonize(raster: &Raster<f64>, field_name: &str) -> Result<VectorDataset> {
    polygonize_integer(&to_integer_raster(raster), field_name)
}

/// Polygonize an integer raster
pub fn polygonize_integer(raster: &Raster<i32>, field_name: &str) -> Result<VectorDataset> {
    let (labels, regions) = label_regions(raster);
    let transform = *raster.transform();

    let mut dataset = VectorDataset::with_fields(
        raster.crs().clone(),
        vec![FieldDef::new(field_name, FieldKind::Integer)],
    )
    .with_name(raster.name());

    for (index, region) in regions.iter().enumerate() {
        let id = index + 1;
        let inside = |row: isize, col: isize| {
            row >= 0
                && col >= 0
                && labels
                    .get((row as usize, col as usize))
                    .is_some_and(|&l| l == id)
        };
        let rings = trace_rings(&region.cells, inside)?;

        let (mut outers, holes): (Vec<_>, Vec<_>) =
            rings.into_iter().partition(|ring| signed_area(ring) > 0.0);
        if outers.len() > 1 {
            tracing::warn!("region {id} has {} outer rings, keeping the largest", outers.len());
            outers.sort_by(|a, b| signed_area(b).total_cmp(&signed_area(a)));
        }
        let Some(exterior) = outers.into_iter().next() else {
            return Err(Error::InvalidGeometry(format!("region {id} has no outer ring")));
        };

        let to_map = |ring: Vec<(i64, i64)>| -> LineString<f64> {
            ring.into_iter()
                .map(|(x, y)| {
                    let (mx, my) = transform.apply(x as f64, y as f64);
                    Coord { x: mx, y: my }
                })
                .collect()
        };
        // Pixel-space winding flips with the sign of the transform; exteriors
        // leave counter-clockwise and holes clockwise in map space
        let polygon = Polygon::new(to_map(exterior), holes.into_iter().map(to_map).collect())
            .orient(Direction::Default);

        dataset.push(
            Feature::new(Geometry::Polygon(polygon))
                .with_property(field_name, AttributeValue::Int(i64::from(region.value))),
        );
    }

    tracing::debug!("polygonized {} into {} regions", raster.name(), dataset.len());
    Ok(dataset)
}

/// Add a field holding each feature's planar area in dataset units
pub fn add_area_field(dataset: &mut VectorDataset, field_name: &str) {
    dataset.add_field(FieldDef::new(field_name, FieldKind::Real));
    for feature in dataset.features_mut() {
        let area = feature.geometry.as_ref().map_or(0.0, |g| g.unsigned_area());
        feature.set_property(field_name, AttributeValue::Float(area));
    }
}

/// Path of the truncated copy written next to a raster file
pub fn integer_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    path.with_file_name(format!("{stem}_int.tif"))
}

/// Load a raster file, persist its truncated copy as `<stem>_int.tif` and
/// polygonize it
pub fn polygonize_file(
    path: impl AsRef<Path>,
    band: Option<usize>,
    field_name: &str,
) -> Result<(PathBuf, VectorDataset)> {
    let path = path.as_ref();
    let raster: Raster<f64> = io::load(path, band)?;
    let integer = to_integer_raster(&raster);

    let int_path = integer_path(path);
    tracing::info!("creating integer raster {}", int_path.display());
    if !io::save(&integer, &int_path).is_success() {
        return Err(Error::Other(format!("cannot write {}", int_path.display())));
    }

    let dataset = polygonize_integer(&integer, field_name)?;
    Ok((int_path, dataset))
}

struct Region {
    value: i32,
    cells: Vec<(usize, usize)>,
}

/// Label 4-connected regions of equal value; label 0 means no-data
fn label_regions(raster: &Raster<i32>) -> (Array2<usize>, Vec<Region>) {
    let (rows, cols) = raster.shape();
    let data = raster.data();
    let mut labels = Array2::<usize>::zeros((rows, cols));
    let mut regions = Vec::new();
    let mut queue = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            let value = data[[row, col]];
            if labels[[row, col]] != 0 || raster.is_nodata(value) {
                continue;
            }
            let id = regions.len() + 1;
            let mut cells = Vec::new();
            labels[[row, col]] = id;
            queue.push_back((row, col));

            while let Some((r, c)) = queue.pop_front() {
                cells.push((r, c));
                for (nr, nc) in Connectivity::Four.neighbors(r, c, rows, cols) {
                    if labels[[nr, nc]] == 0 && data[[nr, nc]] == value {
                        labels[[nr, nc]] = id;
                        queue.push_back((nr, nc));
                    }
                }
            }
            regions.push(Region { value, cells });
        }
    }
    (labels, regions)
}

type Vertex = (i64, i64);
type Step = (i64, i64);

/// Trace the closed boundary rings of one region in pixel-corner space
///
/// Edges run with the region on their right (x right, y down), so the outer
/// ring has positive shoelace area and holes negative. Where two boundary
/// paths meet at a corner the left-most turn is taken, which keeps holes
/// that touch the outer ring at a single corner as separate rings.
fn trace_rings(
    cells: &[(usize, usize)],
    inside: impl Fn(isize, isize) -> bool,
) -> Result<Vec<Vec<Vertex>>> {
    let mut outgoing: BTreeMap<Vertex, Vec<Step>> = BTreeMap::new();
    for &(row, col) in cells {
        let (r, c) = (row as isize, col as isize);
        let (x, y) = (col as i64, row as i64);
        if !inside(r - 1, c) {
            outgoing.entry((x, y)).or_default().push((1, 0));
        }
        if !inside(r, c + 1) {
            outgoing.entry((x + 1, y)).or_default().push((0, 1));
        }
        if !inside(r + 1, c) {
            outgoing.entry((x + 1, y + 1)).or_default().push((-1, 0));
        }
        if !inside(r, c - 1) {
            outgoing.entry((x, y + 1)).or_default().push((0, -1));
        }
    }

    let mut rings = Vec::new();
    loop {
        let Some(start) = outgoing
            .iter()
            .find(|(_, steps)| !steps.is_empty())
            .map(|(&v, _)| v)
        else {
            break;
        };
        let first = take_step(&mut outgoing, start, None)
            .ok_or_else(|| Error::InvalidGeometry("boundary tracing lost its start".into()))?;
        let mut ring = vec![start];
        let mut heading = first;
        let mut at = (start.0 + first.0, start.1 + first.1);

        loop {
            if at == start && preferred(heading, outgoing.get(&at), Some(first)) == Some(first) {
                break;
            }
            let next = take_step(&mut outgoing, at, Some(heading))
                .ok_or_else(|| Error::InvalidGeometry(format!("open boundary at {at:?}")))?;
            if next != heading {
                ring.push(at);
            }
            heading = next;
            at = (at.0 + next.0, at.1 + next.1);
        }

        ring.push(start);
        rings.push(ring);
    }
    Ok(rings)
}

/// Best next step by turn priority: left, straight, right
fn preferred(heading: Step, steps: Option<&Vec<Step>>, extra: Option<Step>) -> Option<Step> {
    let (dx, dy) = heading;
    let candidates = [(dy, -dx), heading, (-dy, dx)];
    candidates.into_iter().find(|c| {
        extra == Some(*c) || steps.is_some_and(|s| s.contains(c))
    })
}

fn take_step(
    outgoing: &mut BTreeMap<Vertex, Vec<Step>>,
    at: Vertex,
    heading: Option<Step>,
) -> Option<Step> {
    let steps = outgoing.get_mut(&at)?;
    let step = match heading {
        None => *steps.first()?,
        Some(h) => preferred(h, Some(steps), None)?,
    };
    let pos = steps.iter().position(|s| *s == step)?;
    steps.swap_remove(pos);
    Some(step)
}

fn signed_area(ring: &[Vertex]) -> f64 {
    let twice: i64 = ring
        .windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum();
    twice as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use riverhsi_core::raster::GeoTransform;
    use riverhsi_core::CRS;

    fn grid(values: Vec<f64>, rows: usize, cols: usize) -> Raster<f64> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap().with_name("classes");
        r.set_transform(GeoTransform::new(100.0, 200.0, 10.0, -10.0));
        r.set_crs(CRS::from_epsg(32632).unwrap());
        r
    }

    fn polygon_of(feature: &Feature) -> &Polygon<f64> {
        match feature.geometry.as_ref() {
            Some(Geometry::Polygon(p)) => p,
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn test_to_integer_truncates() {
        let r = grid(vec![1.9, -1.9, 2.0, f64::NAN], 2, 2);
        let i = to_integer_raster(&r);
        assert_eq!(i.data().as_slice().unwrap(), &[1, -1, 2, -9999]);
        assert_eq!(i.nodata(), Some(-9999));
        assert_eq!(i.name(), "classes_int");
        assert_eq!(i.transform(), r.transform());
    }

    #[test]
    fn test_to_integer_moves_colliding_sentinel() {
        let mut r = grid(vec![0.5, 1.0, 0.0, f64::NAN], 2, 2);
        r.set_nodata(Some(0.0));
        let i = to_integer_raster(&r);
        assert_eq!(i.nodata(), Some(-9999));
        assert_eq!(i.data().as_slice().unwrap(), &[0, 1, -9999, -9999]);

        // the truncated 0 keeps its region
        let ds = polygonize(&r, DEFAULT_FIELD).unwrap();
        assert_eq!(ds.len(), 2);

        // both the own sentinel and -9999 are taken by valid cells
        let mut r = grid(vec![2.5, -9999.0, 3.0, 2.0], 2, 2);
        r.set_nodata(Some(2.0));
        let i = to_integer_raster(&r);
        assert_eq!(i.nodata(), Some(i32::MIN));
        assert!(i.is_nodata_at(1, 1).unwrap());
        assert!(!i.is_nodata_at(0, 0).unwrap());
        assert!(!i.is_nodata_at(0, 1).unwrap());
    }

    #[test]
    fn test_regions_are_four_connected() {
        // diagonal 1s are separate regions
        let r = grid(vec![1.0, 2.0, 2.0, 1.0], 2, 2);
        let ds = polygonize(&r, DEFAULT_FIELD).unwrap();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.field(DEFAULT_FIELD).unwrap().kind, FieldKind::Integer);
        for f in ds.iter() {
            assert_relative_eq!(polygon_of(f).unsigned_area(), 100.0);
        }
    }

    #[test]
    fn test_region_geometry_and_value() {
        let r = grid(vec![3.7, 3.2, 3.0, 5.0, f64::NAN, 5.0], 2, 3);
        let ds = polygonize(&r, "class").unwrap();
        assert_eq!(ds.len(), 3);

        let first = &ds.features()[0];
        assert_eq!(first.get_property("class"), Some(&AttributeValue::Int(3)));
        let p = polygon_of(first);
        assert_relative_eq!(p.unsigned_area(), 300.0);
        // north-up grid gives a counter-clockwise outer ring in map space
        assert!(p.signed_area() > 0.0);
        // collinear corners are dropped: a 3x1 strip has 4 corners
        assert_eq!(p.exterior().0.len(), 5);
        assert!(p.exterior().0.contains(&Coord { x: 100.0, y: 200.0 }));
        assert!(p.exterior().0.contains(&Coord { x: 130.0, y: 190.0 }));

        // the two 5s are not 4-connected through the no-data pixel
        let fives = ds
            .iter()
            .filter(|f| f.get_property("class") == Some(&AttributeValue::Int(5)))
            .count();
        assert_eq!(fives, 2);
        assert_eq!(ds.crs().code(), 32632);
    }

    #[test]
    fn test_enclosed_region_becomes_hole() {
        #[rustfmt::skip]
        let r = grid(vec![
            1.0, 1.0, 1.0,
            1.0, 2.0, 1.0,
            1.0, 1.0, 1.0,
        ], 3, 3);
        let ds = polygonize(&r, DEFAULT_FIELD).unwrap();
        assert_eq!(ds.len(), 2);
        let outer = polygon_of(&ds.features()[0]);
        assert_eq!(outer.interiors().len(), 1);
        assert_relative_eq!(outer.unsigned_area(), 800.0);
        let hole = Polygon::new(outer.interiors()[0].clone(), vec![]);
        assert!(hole.signed_area() < 0.0);
    }

    #[test]
    fn test_exterior_winding_independent_of_row_direction() {
        for transform in [
            GeoTransform::new(0.0, 0.0, 10.0, 10.0),
            GeoTransform::new(0.0, 30.0, 10.0, -10.0),
        ] {
            let mut r = grid(vec![1.0, 1.0, 2.0, 1.0], 2, 2);
            r.set_transform(transform);
            for f in polygonize(&r, DEFAULT_FIELD).unwrap().iter() {
                assert!(polygon_of(f).signed_area() > 0.0, "{transform:?}");
            }
        }
    }

    #[test]
    fn test_hole_touching_outer_ring_at_a_corner() {
        #[rustfmt::skip]
        let r = grid(vec![
            1.0, 1.0, 1.0,
            1.0, 0.0, 1.0,
            1.0, 1.0, 0.0,
        ], 3, 3);
        let ds = polygonize(&r, DEFAULT_FIELD).unwrap();
        let ones = polygon_of(&ds.features()[0]);
        assert_eq!(ones.interiors().len(), 1);
        assert_relative_eq!(ones.unsigned_area(), 700.0);
    }

    #[test]
    fn test_add_area_field() {
        let r = grid(vec![1.0, 1.0, 2.0, 2.0], 2, 2);
        let mut ds = polygonize(&r, DEFAULT_FIELD).unwrap();
        add_area_field(&mut ds, "area");
        assert_eq!(ds.field("area").unwrap().kind, FieldKind::Real);
        for f in ds.iter() {
            assert_eq!(f.get_property("area"), Some(&AttributeValue::Float(200.0)));
        }
    }

    #[test]
    fn test_polygonize_file_writes_integer_copy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("substrate.tif");
        assert!(io::save(&grid(vec![1.5, 1.2, 2.9, 2.1], 2, 2), &path).is_success());

        let (int_path, ds) = polygonize_file(&path, None, DEFAULT_FIELD).unwrap();
        assert_eq!(int_path, dir.path().join("substrate_int.tif"));
        assert!(int_path.exists());
        assert_eq!(ds.len(), 2);

        let reloaded: Raster<f64> = io::load(&int_path, None).unwrap();
        assert_eq!(reloaded.get(0, 0).unwrap(), 1.0);
        assert_eq!(reloaded.get(1, 1).unwrap(), 2.0);
    }
}
