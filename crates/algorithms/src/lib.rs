//! # RiverHSI Algorithms
//!
//! Habitat suitability processing on top of `riverhsi_core`.
//!
//! ## Modules
//!
//! - **curve**: piecewise-linear suitability curves
//! - **suitability**: curve library and per-parameter suitability rasters
//! - **algebra**: raster arithmetic and composite index
//! - **habitat**: full pipeline and usable habitat area
//! - **reproject**: raster and vector reprojection
//! - **conversion**: rasterize, polygonize, raster to line

pub mod algebra;
pub mod conversion;
pub mod curve;
pub mod habitat;
pub(crate) mod maybe_rayon;
pub mod reproject;
pub mod suitability;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::algebra::{
        add, apply, combine, divide, multiply, power, subtract, CombineMethod, Operand, RasterMath,
        RasterOp,
    };
    pub use crate::conversion::{
        polygonize, polygonize_file, raster_to_line, rasterize, to_integer_raster, Burn,
        RasterizeParams,
    };
    pub use crate::curve::{interpolate, SuitabilityCurve};
    pub use crate::habitat::{
        composite_suitability, composite_suitability_in, usable_area, HabitatArea,
        HabitatSuitability,
    };
    pub use crate::reproject::{reproject, reproject_file, reproject_raster, reproject_vector, Dataset};
    pub use crate::suitability::{build_suitability_raster, CurveLibrary, LifeStage, Parameter};
    pub use riverhsi_core::prelude::*;
}
