//! Georeferenced grids and their cell types

mod connectivity;
mod element;
mod geotransform;
mod grid;

pub use connectivity::Connectivity;
pub use element::{RasterElement, DEFAULT_NODATA};
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
