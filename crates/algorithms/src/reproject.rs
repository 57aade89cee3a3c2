//! Raster and vector reprojection
//!
//! Rasters: the four source corners are projected to get the target
//! bounding box, the output grid keeps the source pixel size and every
//! output pixel centre is mapped back into the source and sampled
//! bilinearly. Vectors: every vertex is transformed, attributes are copied.

use crate::algebra::{build_grid, derived};
use geo::{Coord, MapCoords};
use riverhsi_core::crs::{self, CoordinateTransform, CrsDescriptor, CRS};
use riverhsi_core::io;
use riverhsi_core::raster::{GeoTransform, Raster};
use riverhsi_core::vector::{Feature, VectorDataset};
use riverhsi_core::{Error, Result};
use std::path::{Path, PathBuf};

/// Either kind of dataset the reprojection engine accepts
#[derive(Debug, Clone)]
pub enum Dataset {
    Raster(Raster<f64>),
    Vector(VectorDataset),
}

impl Dataset {
    pub fn crs(&self) -> &CRS {
        match self {
            Dataset::Raster(r) => r.crs(),
            Dataset::Vector(v) => v.crs(),
        }
    }
}

/// Reproject a dataset of either kind
pub fn reproject(dataset: &Dataset, target: &CRS) -> Result<Dataset> {
    match dataset {
        Dataset::Raster(r) => reproject_raster(r, target).map(Dataset::Raster),
        Dataset::Vector(v) => reproject_vector(v, target).map(Dataset::Vector),
    }
}

/// Output grid for `raster` in `target`: (transform, rows, cols)
fn target_grid(
    raster: &Raster<f64>,
    forward: &CoordinateTransform,
    target: &CRS,
) -> Result<(GeoTransform, usize, usize)> {
    let (rows, cols) = raster.shape();
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (x, y) in raster.transform().corners(cols, rows) {
        let (tx, ty) = forward.transform(x, y)?;
        min_x = min_x.min(tx);
        min_y = min_y.min(ty);
        max_x = max_x.max(tx);
        max_y = max_y.max(ty);
    }

    let width = max_x - min_x;
    let height = max_y - min_y;
    // Same units: keep the pixel size. Otherwise keep the column count.
    let pixel = if raster.crs().linear_unit() == target.linear_unit() {
        raster.cell_size()
    } else {
        width / cols as f64
    };
    if !(pixel.is_finite() && pixel > 0.0) {
        return Err(Error::Reprojection(format!(
            "cannot derive a pixel size for {}",
            target.identifier()
        )));
    }

    let out_cols = ((width / pixel).round() as usize).max(1);
    let out_rows = ((height / pixel).round() as usize).max(1);
    Ok((
        GeoTransform::new(min_x, max_y, pixel, -pixel),
        out_rows,
        out_cols,
    ))
}

/// Bilinear sample at fractional pixel position `(col, row)`, NaN outside the grid
///
/// No-data neighbours are left out and the remaining weights renormalised.
pub fn bilinear_sample(raster: &Raster<f64>, col: f64, row: f64) -> f64 {
    let (rows, cols) = raster.shape();
    if !(col >= 0.0 && row >= 0.0 && col < cols as f64 && row < rows as f64) {
        return f64::NAN;
    }

    // Pixel centres sit at half-integer positions
    let fc = (col - 0.5).clamp(0.0, (cols - 1) as f64);
    let fr = (row - 0.5).clamp(0.0, (rows - 1) as f64);
    let c0 = fc.floor() as usize;
    let r0 = fr.floor() as usize;
    let c1 = (c0 + 1).min(cols - 1);
    let r1 = (r0 + 1).min(rows - 1);
    let dx = fc - c0 as f64;
    let dy = fr - r0 as f64;

    let taps = [
        (r0, c0, (1.0 - dx) * (1.0 - dy)),
        (r0, c1, dx * (1.0 - dy)),
        (r1, c0, (1.0 - dx) * dy),
        (r1, c1, dx * dy),
    ];

    let mut sum = 0.0;
    let mut weight = 0.0;
    for (r, c, w) in taps {
        if w <= 0.0 {
            continue;
        }
        if let Some(v) = raster.value_f64(r, c) {
            sum += v * w;
            weight += w;
        }
    }
    if weight > 0.0 {
        sum / weight
    } else {
        f64::NAN
    }
}

/// Reproject a raster onto a grid in `target`
pub fn reproject_raster(raster: &Raster<f64>, target: &CRS) -> Result<Raster<f64>> {
    let forward = CoordinateTransform::new(raster.crs(), target);
    let inverse = forward.inverse();
    let (transform, rows, cols) = target_grid(raster, &forward, target)?;
    let source_transform = raster.transform();

    tracing::debug!(
        "reprojecting {} from {} to {} ({}x{} -> {}x{})",
        raster.name(),
        raster.crs().identifier(),
        target.identifier(),
        raster.cols(),
        raster.rows(),
        cols,
        rows
    );

    let data = build_grid(rows, cols, |row, col| {
        let (x, y) = transform.pixel_to_geo(col, row);
        let Ok((sx, sy)) = inverse.transform(x, y) else {
            return f64::NAN;
        };
        match source_transform.geo_to_pixel_f64(sx, sy) {
            Ok((sc, sr)) => bilinear_sample(raster, sc, sr),
            Err(_) => f64::NAN,
        }
    })?;

    // Template with the output shape; georeference is swapped in afterwards
    let mut template = raster.with_same_meta::<f64>(rows, cols);
    template.set_nodata(raster.nodata());
    let mut output = derived(&template, data, format!("{}_epsg{}", raster.name(), target.code()))?;
    output.set_transform(transform);
    output.set_crs(target.clone());
    Ok(output)
}

/// Reproject every vertex of every feature; schema and attributes are copied
pub fn reproject_vector(dataset: &VectorDataset, target: &CRS) -> Result<VectorDataset> {
    let transform = CoordinateTransform::new(dataset.crs(), target);
    let transform = &transform;

    let mut output = VectorDataset::with_fields(target.clone(), dataset.fields().to_vec())
        .with_name(format!("{}_epsg{}", dataset.name(), target.code()));

    for feature in dataset.iter() {
        let geometry = match &feature.geometry {
            Some(g) => Some(g.try_map_coords(|c: Coord<f64>| {
                transform.transform(c.x, c.y).map(|(x, y)| Coord { x, y })
            })?),
            None => None,
        };
        output.push(Feature {
            geometry,
            properties: feature.properties.clone(),
            id: feature.id.clone(),
        });
    }

    tracing::debug!(
        "reprojected {} features from {} to {}",
        output.len(),
        dataset.crs().identifier(),
        target.identifier()
    );
    Ok(output)
}

fn is_raster_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref(),
        Some("tif") | Some("tiff")
    )
}

/// Output path `<stem>_epsg<code>.<ext>` beside the source
pub fn reprojected_path(path: &Path, code: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tif".to_string());
    path.with_file_name(format!("{stem}_epsg{code}.{ext}"))
}

/// Reproject a GeoTIFF or GeoJSON file, writing the result beside it
///
/// The target must resolve exactly; there is no WGS84 fallback here.
pub fn reproject_file<P: AsRef<Path>>(path: P, target: &CrsDescriptor) -> Result<PathBuf> {
    let path = path.as_ref();
    let target = crs::try_resolve(target).map_err(|e| Error::Reprojection(e.to_string()))?;
    let out = reprojected_path(path, target.code());

    if is_raster_path(path) {
        let raster: Raster<f64> = io::load(path, None)?;
        let result = reproject_raster(&raster, &target)?;
        if !io::save(&result, &out).is_success() {
            return Err(Error::Reprojection(format!("cannot write {}", out.display())));
        }
    } else {
        let dataset = io::read_geojson(path)?;
        let result = reproject_vector(&dataset, &target)?;
        io::write_geojson(&result, &out)?;
    }

    tracing::info!("reprojected {} to {}", path.display(), target.identifier());
    Ok(out)
}
