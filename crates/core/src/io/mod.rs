//! I/O operations for reading and writing geospatial data

mod native;
pub mod scratch;
mod store;
mod vector;

pub use native::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer,
    GeoTiffOptions,
};
pub use scratch::{ScratchStore, DEFAULT_SCRATCH_DIR};
pub use store::{create, load, save, Georeference, Status};
pub use vector::{prj_path, read_geojson, write_geojson};
