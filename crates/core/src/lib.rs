//! # RiverHSI Core
//!
//! Core types and I/O for the RiverHSI habitat suitability toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: generic georeferenced raster grid
//! - `GeoTransform`: affine transformation for georeferencing
//! - `CRS`: resolved spatial references, WKT parsing and coordinate transforms
//! - `VectorDataset`: features with a field schema
//! - GeoTIFF and GeoJSON storage, plus a scratch store for intermediates

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::{CoordinateTransform, CrsDescriptor, CRS};
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement, DEFAULT_NODATA};
pub use vector::{AttributeValue, Feature, FieldDef, FieldKind, VectorDataset};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{CoordinateTransform, CrsDescriptor, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::io::{ScratchStore, Status};
    pub use crate::raster::{GeoTransform, Raster, RasterElement, DEFAULT_NODATA};
    pub use crate::vector::{AttributeValue, Feature, FieldDef, FieldKind, VectorDataset};
}
