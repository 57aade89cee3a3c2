//! Burn vector features into a grid
//!
//! Coverage follows the "all touched" rule: a pixel is burned when the
//! feature reaches into it at all, not only when it covers the pixel centre.
//! Thin lines and small polygons therefore never vanish from the output.

use geo::{BoundingRect, Coord, Geometry, Intersects, Rect};
use riverhsi_core::raster::{GeoTransform, Raster, DEFAULT_NODATA};
use riverhsi_core::vector::VectorDataset;
use riverhsi_core::{Error, Result};

/// Constant burned when no attribute is chosen
pub const DEFAULT_BURN: f64 = 0.0;

/// Value burned into covered pixels
#[derive(Debug, Clone, PartialEq)]
pub enum Burn {
    /// Same value for every feature
    Constant(f64),
    /// Numeric attribute of each feature; features without one are skipped
    Field(String),
}

/// Parameters for rasterization
#[derive(Debug, Clone)]
pub struct RasterizeParams {
    /// Square pixel size in dataset units
    pub pixel_size: f64,
    /// Fill value of pixels no feature touches
    pub nodata: f64,
    pub burn: Burn,
    /// Output extent `(min_x, min_y, max_x, max_y)`, dataset bounds when `None`
    pub extent: Option<(f64, f64, f64, f64)>,
}

impl Default for RasterizeParams {
    fn default() -> Self {
        Self {
            pixel_size: 10.0,
            nodata: DEFAULT_NODATA,
            burn: Burn::Constant(DEFAULT_BURN),
            extent: None,
        }
    }
}

/// Bounding box of every geometry in the dataset
pub fn dataset_extent(dataset: &VectorDataset) -> Option<(f64, f64, f64, f64)> {
    dataset
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .filter_map(|g| g.bounding_rect())
        .fold(None, |acc, r| {
            let (min, max) = (r.min(), r.max());
            Some(match acc {
                None => (min.x, min.y, max.x, max.y),
                Some((x0, y0, x1, y1)) => (x0.min(min.x), y0.min(min.y), x1.max(max.x), y1.max(max.y)),
            })
        })
}

/// Rasterize a vector dataset onto a north-up grid
///
/// The grid is anchored at the top-left of the extent and grows right and
/// down in whole pixels until the extent is covered. Later features
/// overwrite earlier ones where they overlap.
pub fn rasterize(dataset: &VectorDataset, params: &RasterizeParams) -> Result<Raster<f64>> {
    let px = params.pixel_size;
    if !(px.is_finite() && px > 0.0) {
        return Err(Error::InvalidParameter {
            name: "pixel_size",
            value: px.to_string(),
            reason: "must be a positive number".into(),
        });
    }
    if let Burn::Field(name) = &params.burn {
        if dataset.field(name).is_none() {
            return Err(Error::InvalidParameter {
                name: "burn_field",
                value: name.clone(),
                reason: "dataset has no such field".into(),
            });
        }
    }

    let (min_x, min_y, max_x, max_y) = match params.extent.or_else(|| dataset_extent(dataset)) {
        Some(extent) => extent,
        None => return Err(Error::InvalidGeometry("dataset has no geometries".into())),
    };
    if !(max_x >= min_x && max_y >= min_y) {
        return Err(Error::InvalidParameter {
            name: "extent",
            value: format!("{min_x},{min_y},{max_x},{max_y}"),
            reason: "max must not be below min".into(),
        });
    }

    let cols = pixel_count(max_x - min_x, px);
    let rows = pixel_count(max_y - min_y, px);
    let transform = GeoTransform::new(min_x, max_y, px, -px);

    let mut raster = Raster::filled(rows, cols, params.nodata);
    raster.set_transform(transform);
    raster.set_crs(dataset.crs().clone());
    raster.set_nodata(Some(params.nodata));
    raster.set_name(if dataset.name().is_empty() { "rasterized" } else { dataset.name() });

    let mut burned = 0usize;
    for (index, feature) in dataset.iter().enumerate() {
        let Some(geometry) = feature.geometry.as_ref() else {
            continue;
        };
        let value = match &params.burn {
            Burn::Constant(v) => *v,
            Burn::Field(name) => match feature.get_property(name).and_then(|a| a.as_f64()) {
                Some(v) => v,
                None => {
                    tracing::debug!("feature {index} has no numeric '{name}', skipped");
                    continue;
                }
            },
        };
        burned += burn_geometry(&mut raster, geometry, value);
    }

    tracing::debug!("rasterized {} features into {cols}x{rows} grid, {burned} pixels burned", dataset.len());
    Ok(raster)
}

/// Whole pixels needed to span `length`, at least one
fn pixel_count(length: f64, px: f64) -> usize {
    let n = length / px;
    // absorb floating-point noise so an exact multiple does not add a column
    let n = (n - 1e-9).ceil();
    (n.max(1.0)) as usize
}

/// Burn one geometry, returning the number of pixels written
fn burn_geometry(raster: &mut Raster<f64>, geometry: &Geometry<f64>, value: f64) -> usize {
    let Some(bbox) = geometry.bounding_rect() else {
        return 0;
    };
    let t = *raster.transform();
    let (rows, cols) = raster.shape();
    let px = t.pixel_width;
    let py = t.pixel_height.abs();

    // pixel window around the geometry, one pixel of slack each way
    let col0 = ((bbox.min().x - t.origin_x) / px).floor() - 1.0;
    let col1 = ((bbox.max().x - t.origin_x) / px).floor() + 1.0;
    let row0 = ((t.origin_y - bbox.max().y) / py).floor() - 1.0;
    let row1 = ((t.origin_y - bbox.min().y) / py).floor() + 1.0;
    let clamp = |v: f64, n: usize| v.max(0.0).min(n as f64 - 1.0) as usize;
    if col1 < 0.0 || row1 < 0.0 || col0 >= cols as f64 || row0 >= rows as f64 {
        return 0;
    }
    let (col0, col1) = (clamp(col0, cols), clamp(col1, cols));
    let (row0, row1) = (clamp(row0, rows), clamp(row1, rows));

    // areal features must reach into the pixel interior; a shared edge is
    // not a touch. Lines and points may touch the closed pixel.
    let areal = matches!(
        geometry,
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_)
    );
    let inset_x = if areal { px * 1e-9 } else { 0.0 };
    let inset_y = if areal { py * 1e-9 } else { 0.0 };

    let mut count = 0;
    let data = raster.data_mut();
    for row in row0..=row1 {
        for col in col0..=col1 {
            let x0 = t.origin_x + col as f64 * px;
            let y1 = t.origin_y - row as f64 * py;
            let cell = Rect::new(
                Coord { x: x0 + inset_x, y: y1 - py + inset_y },
                Coord { x: x0 + px - inset_x, y: y1 - inset_y },
            );
            if geometry.intersects(&cell) {
                data[[row, col]] = value;
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon};
    use riverhsi_core::vector::{AttributeValue, Feature, FieldDef, FieldKind};
    use riverhsi_core::CRS;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ])
    }

    #[test]
    fn test_square_burns_exactly_four_pixels() {
        let mut ds = VectorDataset::new(CRS::from_epsg(32632).unwrap());
        ds.push(Feature::new(square(10.0, 10.0, 30.0, 30.0)));

        let params = RasterizeParams {
            pixel_size: 10.0,
            nodata: -9999.0,
            burn: Burn::Constant(1.0),
            extent: Some((0.0, 0.0, 40.0, 40.0)),
        };
        let r = rasterize(&ds, &params).unwrap();
        assert_eq!(r.shape(), (4, 4));
        assert_eq!(r.crs().code(), 32632);

        let burned: Vec<(usize, usize)> = (0..4)
            .flat_map(|row| (0..4).map(move |col| (row, col)))
            .filter(|&(row, col)| r.get(row, col).unwrap() == 1.0)
            .collect();
        assert_eq!(burned, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
        let others = r.data().iter().filter(|&&v| v == -9999.0).count();
        assert_eq!(others, 12);
    }

    #[test]
    fn test_extent_defaults_to_dataset_bounds() {
        let mut ds = VectorDataset::new(CRS::wgs84());
        ds.push(Feature::new(square(100.0, 200.0, 130.0, 220.0)));

        let r = rasterize(&ds, &RasterizeParams::default()).unwrap();
        assert_eq!(r.shape(), (2, 3));
        assert_eq!(r.transform().origin_x, 100.0);
        assert_eq!(r.transform().origin_y, 220.0);
        // zero burn stays distinct from the no-data fill
        assert!(r.data().iter().all(|&v| v == DEFAULT_BURN));
    }

    #[test]
    fn test_thin_line_is_not_lost() {
        let mut ds = VectorDataset::new(CRS::wgs84());
        // diagonal through a 3x3 grid, never near a pixel centre line
        ds.push(Feature::new(Geometry::LineString(line_string![
            (x: 0.5, y: 0.5),
            (x: 29.5, y: 29.5),
        ])));
        let params = RasterizeParams {
            extent: Some((0.0, 0.0, 30.0, 30.0)),
            ..Default::default()
        };
        let r = rasterize(&ds, &params).unwrap();
        for i in 0..3 {
            assert_eq!(r.get(2 - i, i).unwrap(), DEFAULT_BURN);
        }
        assert_eq!(r.get(0, 0).unwrap(), DEFAULT_NODATA);
    }

    #[test]
    fn test_burn_field() {
        let mut ds = VectorDataset::with_fields(
            CRS::wgs84(),
            vec![FieldDef::new("depth", FieldKind::Real)],
        );
        ds.push(
            Feature::new(Geometry::Point(point!(x: 5.0, y: 5.0)))
                .with_property("depth", AttributeValue::Float(2.5)),
        );
        ds.push(Feature::new(Geometry::Point(point!(x: 15.0, y: 5.0))));
        let params = RasterizeParams {
            burn: Burn::Field("depth".into()),
            extent: Some((0.0, 0.0, 20.0, 10.0)),
            ..Default::default()
        };
        let r = rasterize(&ds, &params).unwrap();
        assert_eq!(r.get(0, 0).unwrap(), 2.5);
        assert_eq!(r.get(0, 1).unwrap(), DEFAULT_NODATA);

        let missing = RasterizeParams {
            burn: Burn::Field("velocity".into()),
            ..params
        };
        assert!(rasterize(&ds, &missing).is_err());
    }

    #[test]
    fn test_invalid_inputs() {
        let ds = VectorDataset::new(CRS::wgs84());
        assert!(rasterize(&ds, &RasterizeParams::default()).is_err());

        let mut ds = VectorDataset::new(CRS::wgs84());
        ds.push(Feature::new(square(0.0, 0.0, 1.0, 1.0)));
        let params = RasterizeParams {
            pixel_size: 0.0,
            ..Default::default()
        };
        assert!(rasterize(&ds, &params).is_err());
    }
}
