//! Conversion between vector features and rasters
//!
//! - Rasterize: burn features into a grid with the all-touched rule
//! - Polygonize: one polygon per 4-connected region of equal value
//! - Raster to line: join neighbouring pixels of one value into segments

mod line;
mod polygonize;
mod rasterize;

pub use line::raster_to_line;
pub use polygonize::{
    add_area_field, integer_path, polygonize, polygonize_file, polygonize_integer,
    to_integer_raster, DEFAULT_FIELD,
};
pub use rasterize::{dataset_extent, rasterize, Burn, RasterizeParams, DEFAULT_BURN};
