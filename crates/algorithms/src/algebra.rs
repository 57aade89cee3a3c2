//! Habitat suitability algebra
//!
//! Per-pixel arithmetic between a raster and another raster or a scalar,
//! and the combination of per-parameter suitability rasters into a
//! composite. No-data in any operand gives no-data in the result, and so do
//! division by zero and non-finite results.

use crate::maybe_rayon::*;
use ndarray::Array2;
use riverhsi_core::io::ScratchStore;
use riverhsi_core::raster::Raster;
use riverhsi_core::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Binary per-pixel operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

impl RasterOp {
    /// Evaluate for one pair of valid values
    pub fn eval(self, a: f64, b: f64) -> f64 {
        let v = match self {
            RasterOp::Add => a + b,
            RasterOp::Subtract => a - b,
            RasterOp::Multiply => a * b,
            RasterOp::Divide => {
                if b == 0.0 {
                    return f64::NAN;
                }
                a / b
            }
            RasterOp::Power => a.powf(b),
        };
        if v.is_finite() {
            v
        } else {
            f64::NAN
        }
    }

    /// Short name used for derived raster and scratch file names
    pub fn marker(self) -> &'static str {
        match self {
            RasterOp::Add => "add",
            RasterOp::Subtract => "sub",
            RasterOp::Multiply => "mul",
            RasterOp::Divide => "div",
            RasterOp::Power => "pow",
        }
    }
}

impl fmt::Display for RasterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

impl FromStr for RasterOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "add" | "+" => Ok(RasterOp::Add),
            "sub" | "subtract" | "-" => Ok(RasterOp::Subtract),
            "mul" | "multiply" | "*" => Ok(RasterOp::Multiply),
            "div" | "divide" | "/" => Ok(RasterOp::Divide),
            "pow" | "power" | "^" | "**" => Ok(RasterOp::Power),
            _ => Err(Error::InvalidParameter {
                name: "op",
                value: s.to_string(),
                reason: "expected add, subtract, multiply, divide or power".into(),
            }),
        }
    }
}

/// Right-hand side of a binary operation
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    Raster(&'a Raster<f64>),
    Scalar(f64),
}

impl<'a> From<&'a Raster<f64>> for Operand<'a> {
    fn from(raster: &'a Raster<f64>) -> Self {
        Operand::Raster(raster)
    }
}

impl From<f64> for Operand<'_> {
    fn from(value: f64) -> Self {
        Operand::Scalar(value)
    }
}

fn check_shape(a: &Raster<f64>, b: &Raster<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::SizeMismatch {
            er: a.rows(),
            ec: a.cols(),
            ar: b.rows(),
            ac: b.cols(),
        });
    }
    Ok(())
}

/// Fill a new grid row by row from a per-cell function
pub(crate) fn build_grid<F>(rows: usize, cols: usize, f: F) -> Result<Array2<f64>>
where
    F: Fn(usize, usize) -> f64 + Sync + Send,
{
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| (0..cols).map(|col| f(row, col)).collect::<Vec<_>>())
        .collect();
    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))
}

/// Output raster sharing `like`'s georeference, with NaN as in-memory no-data
pub(crate) fn derived(like: &Raster<f64>, data: Array2<f64>, name: String) -> Result<Raster<f64>> {
    let (rows, cols) = like.shape();
    let mut output = like.with_same_meta::<f64>(rows, cols).with_name(name);
    output.replace_data(data)?;
    // keep the file sentinel so saved results use it
    output.set_nodata(like.nodata().filter(|v| !v.is_nan()).or(Some(f64::NAN)));
    Ok(output)
}

/// Apply `op` between `a` and a raster or scalar operand
pub fn apply<'a>(a: &Raster<f64>, b: impl Into<Operand<'a>>, op: RasterOp) -> Result<Raster<f64>> {
    let b = b.into();
    let (rows, cols) = a.shape();

    let data = match b {
        Operand::Raster(b) => {
            check_shape(a, b)?;
            build_grid(rows, cols, |row, col| {
                match (a.value_f64(row, col), b.value_f64(row, col)) {
                    (Some(va), Some(vb)) => op.eval(va, vb),
                    _ => f64::NAN,
                }
            })?
        }
        Operand::Scalar(s) => build_grid(rows, cols, |row, col| match a.value_f64(row, col) {
            Some(va) if !s.is_nan() => op.eval(va, s),
            _ => f64::NAN,
        })?,
    };

    derived(a, data, format!("{}_{}", a.name(), op.marker()))
}

pub fn add<'a>(a: &Raster<f64>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
    apply(a, b, RasterOp::Add)
}

pub fn subtract<'a>(a: &Raster<f64>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
    apply(a, b, RasterOp::Subtract)
}

pub fn multiply<'a>(a: &Raster<f64>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
    apply(a, b, RasterOp::Multiply)
}

/// Division; a zero divisor gives no-data for that pixel
pub fn divide<'a>(a: &Raster<f64>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
    apply(a, b, RasterOp::Divide)
}

pub fn power<'a>(a: &Raster<f64>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
    apply(a, b, RasterOp::Power)
}

/// Algebra whose every result is persisted to a scratch store
pub struct RasterMath<'s> {
    store: &'s mut ScratchStore,
}

impl<'s> RasterMath<'s> {
    pub fn new(store: &'s mut ScratchStore) -> Self {
        Self { store }
    }

    pub fn apply<'a>(
        &mut self,
        a: &Raster<f64>,
        b: impl Into<Operand<'a>>,
        op: RasterOp,
    ) -> Result<Raster<f64>> {
        let result = apply(a, b, op)?;
        self.store.persist(&result, op.marker())
    }

    pub fn add<'a>(&mut self, a: &Raster<f64>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
        self.apply(a, b, RasterOp::Add)
    }

    pub fn subtract<'a>(&mut self, a: &Raster<f64>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
        self.apply(a, b, RasterOp::Subtract)
    }

    pub fn multiply<'a>(&mut self, a: &Raster<f64>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
        self.apply(a, b, RasterOp::Multiply)
    }

    pub fn divide<'a>(&mut self, a: &Raster<f64>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
        self.apply(a, b, RasterOp::Divide)
    }

    pub fn power<'a>(&mut self, a: &Raster<f64>, b: impl Into<Operand<'a>>) -> Result<Raster<f64>> {
        self.apply(a, b, RasterOp::Power)
    }
}

/// How per-parameter suitability rasters are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombineMethod {
    /// n-th root of the product of n rasters
    #[default]
    GeometricMean,
    /// Plain product
    Product,
}

impl FromStr for CombineMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "geometric_mean" | "geomean" => Ok(CombineMethod::GeometricMean),
            "product" => Ok(CombineMethod::Product),
            _ => Err(Error::InvalidParameter {
                name: "method",
                value: s.to_string(),
                reason: "expected geometric_mean or product".into(),
            }),
        }
    }
}

/// Combine suitability rasters pixel by pixel
///
/// All rasters must share the first raster's shape. A pixel that is no-data
/// in any input is no-data in the result.
pub fn combine(rasters: &[Raster<f64>], method: CombineMethod) -> Result<Raster<f64>> {
    let first = rasters.first().ok_or_else(|| Error::InvalidParameter {
        name: "rasters",
        value: "[]".into(),
        reason: "at least one raster is required".into(),
    })?;
    for r in &rasters[1..] {
        check_shape(first, r)?;
    }

    let (rows, cols) = first.shape();
    let n = rasters.len() as f64;
    let data = build_grid(rows, cols, |row, col| {
        let mut product = 1.0;
        for r in rasters {
            match r.value_f64(row, col) {
                Some(v) => product *= v,
                None => return f64::NAN,
            }
        }
        let v = match method {
            CombineMethod::Product => product,
            CombineMethod::GeometricMean if rasters.len() == 1 => product,
            CombineMethod::GeometricMean => product.powf(1.0 / n),
        };
        if v.is_finite() {
            v
        } else {
            f64::NAN
        }
    })?;

    tracing::debug!("combined {} rasters ({:?})", rasters.len(), method);
    derived(first, data, "chsi".to_string())
}
