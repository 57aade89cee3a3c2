//! Error types for RiverHSI

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for RiverHSI operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot load {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Band {band} out of range (dataset has {count} band(s))")]
    BandOutOfRange { band: usize, count: usize },

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Degenerate geotransform (pixel size or determinant is zero)")]
    DegenerateTransform,

    #[error("Cannot resolve spatial reference: {0}")]
    UnresolvedCrs(String),

    #[error("Reprojection failed: {0}")]
    Reprojection(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid suitability curve: {0}")]
    InvalidCurve(String),

    #[error("No pixel equals {value}")]
    EmptySelection { value: f64 },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

/// Result type alias for RiverHSI operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::BandOutOfRange { band: 3, count: 1 };
        assert!(err.to_string().contains("Band 3"));

        let err = Error::Load {
            path: PathBuf::from("depth.tif"),
            reason: "missing".into(),
        };
        assert!(err.to_string().contains("depth.tif"));
    }
}
