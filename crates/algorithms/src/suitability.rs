//! Suitability rasters and the species curve library
//!
//! A curve library is a JSON document keyed by parameter, then life stage,
//! holding ordered records such as `{"u": 0.0198, "HSI": 0.0}`:
//!
//! ```text
//! { "velocity": { "juvenile": [ {"u": 0.0, "HSI": 0.0}, ... ] },
//!   "depth":    { "juvenile": [ {"h": 0.0, "HSI": 0.0}, ... ] } }
//! ```

use crate::algebra::{build_grid, derived};
use crate::curve::SuitabilityCurve;
use riverhsi_core::raster::Raster;
use riverhsi_core::{Error, Result};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Key of the suitability score in curve records
pub const SCORE_KEY: &str = "HSI";

/// Score every pixel of a physical-parameter raster against `curve`
///
/// The result is a new raster on the same grid; pixels that are no-data or
/// outside the curve's range are no-data.
pub fn build_suitability_raster(
    physical: &Raster<f64>,
    curve: &SuitabilityCurve,
) -> Result<Raster<f64>> {
    let (rows, cols) = physical.shape();
    let data = build_grid(rows, cols, |row, col| match physical.value_f64(row, col) {
        Some(v) => curve.score(v),
        None => f64::NAN,
    })?;
    derived(physical, data, format!("{}_hsi", physical.name()))
}

/// Physical parameter a curve is defined for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    Velocity,
    Depth,
    GrainSize,
}

impl Parameter {
    pub const ALL: [Parameter; 3] = [Parameter::Velocity, Parameter::Depth, Parameter::GrainSize];

    /// Name used as the top-level key of the curve library
    pub fn name(self) -> &'static str {
        match self {
            Parameter::Velocity => "velocity",
            Parameter::Depth => "depth",
            Parameter::GrainSize => "grain_size",
        }
    }

    /// Key of the parameter value in curve records
    pub fn key(self) -> &'static str {
        match self {
            Parameter::Velocity => "u",
            Parameter::Depth => "h",
            Parameter::GrainSize => "d",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "velocity" | "u" => Ok(Parameter::Velocity),
            "depth" | "h" => Ok(Parameter::Depth),
            "grain_size" | "d" => Ok(Parameter::GrainSize),
            _ => Err(Error::InvalidParameter {
                name: "parameter",
                value: s.to_string(),
                reason: "expected velocity, depth or grain_size".into(),
            }),
        }
    }
}

/// Fish life stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifeStage {
    Fry,
    #[default]
    Juvenile,
    Adult,
    Spawning,
}

impl LifeStage {
    pub fn name(self) -> &'static str {
        match self {
            LifeStage::Fry => "fry",
            LifeStage::Juvenile => "juvenile",
            LifeStage::Adult => "adult",
            LifeStage::Spawning => "spawning",
        }
    }
}

impl fmt::Display for LifeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LifeStage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fry" => Ok(LifeStage::Fry),
            "juvenile" => Ok(LifeStage::Juvenile),
            "adult" => Ok(LifeStage::Adult),
            "spawning" => Ok(LifeStage::Spawning),
            _ => Err(Error::InvalidParameter {
                name: "life_stage",
                value: s.to_string(),
                reason: "expected fry, juvenile, adult or spawning".into(),
            }),
        }
    }
}

/// Read-only collection of suitability curves for one species
#[derive(Debug, Clone)]
pub struct CurveLibrary {
    root: Value,
}

impl CurveLibrary {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(json)?;
        if !root.is_object() {
            return Err(Error::InvalidCurve("curve library must be a JSON object".into()));
        }
        Ok(Self { root })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Parameters the library has curves for
    pub fn parameters(&self) -> Vec<Parameter> {
        Parameter::ALL
            .into_iter()
            .filter(|p| self.root.get(p.name()).is_some())
            .collect()
    }

    /// Curve for one parameter and life stage
    ///
    /// Records are taken in file order; ordering and shape are checked by
    /// [`SuitabilityCurve::new`].
    pub fn curve(&self, parameter: Parameter, stage: LifeStage) -> Result<SuitabilityCurve> {
        let missing = |what: String| Error::InvalidCurve(what);
        let records = self
            .root
            .get(parameter.name())
            .ok_or_else(|| missing(format!("no curves for {parameter}")))?
            .get(stage.name())
            .ok_or_else(|| missing(format!("no {stage} curve for {parameter}")))?
            .as_array()
            .ok_or_else(|| missing(format!("{parameter}/{stage} is not a list")))?;

        let mut values = Vec::with_capacity(records.len());
        let mut scores = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let field = |key: &str| {
                record.get(key).and_then(Value::as_f64).ok_or_else(|| {
                    missing(format!("{parameter}/{stage} record {i} has no numeric '{key}'"))
                })
            };
            values.push(field(parameter.key())?);
            scores.push(field(SCORE_KEY)?);
        }

        SuitabilityCurve::new(values, scores)
    }
}
