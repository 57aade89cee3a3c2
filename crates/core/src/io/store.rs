//! Path-level raster store
//!
//! `load` reports every failure as an error. `create` and `save` are the
//! write boundary of the pipeline: they never fail, they log and report a
//! [`Status`].

use super::native::{encode_grid, read_geotiff};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement, DEFAULT_NODATA};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Outcome of a write at the pipeline boundary
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failed,
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

/// How a new grid is placed on the map
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Georeference {
    /// Upper-left corner plus north-up pixel size
    Origin {
        origin: (f64, f64),
        pixel_width: f64,
        pixel_height: f64,
    },
    /// Full affine transform
    Transform(GeoTransform),
}

impl Georeference {
    /// Prefer a full transform when one is given
    pub fn pick(
        origin: Option<(f64, f64)>,
        pixel_size: (f64, f64),
        transform: Option<GeoTransform>,
    ) -> Self {
        match (transform, origin) {
            (Some(t), _) => Georeference::Transform(t),
            (None, Some(origin)) => Georeference::Origin {
                origin,
                pixel_width: pixel_size.0,
                pixel_height: pixel_size.1,
            },
            (None, None) => Georeference::Origin {
                origin: (0.0, 0.0),
                pixel_width: pixel_size.0,
                pixel_height: pixel_size.1,
            },
        }
    }

    pub fn transform(&self) -> GeoTransform {
        match *self {
            Georeference::Origin {
                origin,
                pixel_width,
                pixel_height,
            } => GeoTransform::new(origin.0, origin.1, pixel_width, pixel_height),
            Georeference::Transform(t) => t,
        }
    }
}

/// Load one band of a raster file
///
/// Unreadable or malformed files become [`Error::Load`]; a missing band is
/// reported as [`Error::BandOutOfRange`].
pub fn load<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    match read_geotiff(path, band) {
        Ok(raster) => {
            tracing::debug!(
                "loaded {} ({}x{}, {})",
                path.display(),
                raster.cols(),
                raster.rows(),
                raster.crs().identifier()
            );
            Ok(raster)
        }
        Err(e @ Error::BandOutOfRange { .. }) => Err(e),
        Err(e) => Err(Error::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

fn try_create<T: RasterElement>(
    path: &Path,
    grid: &Array2<T>,
    georef: Georeference,
    crs: &CRS,
    nodata: f64,
) -> Result<()> {
    let transform = georef.transform();
    if transform.is_degenerate() {
        return Err(Error::DegenerateTransform);
    }
    let nodata_t = T::from_f64(nodata);
    let is_missing = |v: T| v.is_nodata(nodata_t);

    let mut writer = BufWriter::new(File::create(path)?);
    encode_grid(grid.view(), is_missing, &transform, crs, nodata, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a grid as a single-band GeoTIFF
///
/// NaN cells are written as `nodata`.
pub fn create<T, P>(path: P, grid: &Array2<T>, georef: Georeference, crs: &CRS, nodata: f64) -> Status
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    match try_create(path, grid, georef, crs, nodata) {
        Ok(()) => {
            tracing::info!("wrote {}", path.display());
            Status::Success
        }
        Err(e) => {
            tracing::error!("cannot write {}: {e}", path.display());
            Status::Failed
        }
    }
}

/// Write a raster with its own georeference, CRS and no-data value
pub fn save<T, P>(raster: &Raster<T>, path: P) -> Status
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let nodata = raster
        .nodata()
        .and_then(|v| v.to_f64())
        .filter(|v| !v.is_nan())
        .unwrap_or(DEFAULT_NODATA);
    create(
        path,
        raster.data(),
        Georeference::Transform(*raster.transform()),
        raster.crs(),
        nodata,
    )
}
