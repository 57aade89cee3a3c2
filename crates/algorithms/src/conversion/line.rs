//! Pixels of one value to line geometry
//!
//! Meant for thin trajectories such as a thalweg traced into a raster:
//! selected pixel centres are joined pairwise when they are immediate
//! neighbours, diagonals included. The pairing is quadratic in the number of
//! selected pixels.

use geo::{Coord, Geometry, Line, LineString, MultiLineString};
use riverhsi_core::raster::Raster;
use riverhsi_core::vector::{Feature, VectorDataset};
use riverhsi_core::{Error, Result};

/// Join centres of pixels equal to `target_value` into one multi-line feature
///
/// Two centres are joined when they are no farther apart than the diagonal
/// of one pixel. Returns [`Error::EmptySelection`] when no pixel matches.
pub fn raster_to_line(raster: &Raster<f64>, target_value: f64) -> Result<VectorDataset> {
    let (rows, cols) = raster.shape();
    let mut points = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            if raster.value_f64(row, col) == Some(target_value) {
                let (x, y) = raster.pixel_to_geo(col, row);
                points.push(Coord { x, y });
            }
        }
    }
    if points.is_empty() {
        return Err(Error::EmptySelection { value: target_value });
    }

    let t = raster.transform();
    let max_distance = t.pixel_width.hypot(t.pixel_height) * (1.0 + 1e-9);

    let mut segments = Vec::new();
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            if (a.x - b.x).hypot(a.y - b.y) <= max_distance {
                segments.push(LineString::from(Line::new(*a, *b)));
            }
        }
    }
    tracing::debug!(
        "{} pixels equal {target_value}, joined by {} segments",
        points.len(),
        segments.len()
    );

    let mut dataset = VectorDataset::new(raster.crs().clone()).with_name(raster.name());
    dataset.push(Feature::new(Geometry::MultiLineString(MultiLineString::new(segments))));
    Ok(dataset)
}
