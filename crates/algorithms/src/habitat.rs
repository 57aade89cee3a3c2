//! Habitat pipeline: per-parameter suitability, composite index and usable
//! area

use crate::algebra::{combine, CombineMethod};
use crate::suitability::{build_suitability_raster, CurveLibrary, LifeStage, Parameter};
use riverhsi_core::io::ScratchStore;
use riverhsi_core::raster::Raster;
use riverhsi_core::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Default threshold of the composite index for usable habitat
pub const DEFAULT_THRESHOLD: f64 = 0.4;

/// Output of [`composite_suitability`]
#[derive(Debug, Clone)]
pub struct HabitatSuitability {
    /// One suitability raster per input parameter, in input order
    pub layers: Vec<(Parameter, Raster<f64>)>,
    /// Combined index, named `chsi`
    pub composite: Raster<f64>,
}

/// Score each physical raster against its curve and combine the scores
///
/// All inputs must share one grid; mismatched shapes fail with
/// [`Error::SizeMismatch`].
pub fn composite_suitability(
    inputs: &[(Parameter, &Raster<f64>)],
    library: &CurveLibrary,
    stage: LifeStage,
    method: CombineMethod,
) -> Result<HabitatSuitability> {
    run(inputs, library, stage, method, None)
}

/// Like [`composite_suitability`], persisting every per-parameter layer in
/// `store` before combining
pub fn composite_suitability_in(
    store: &mut ScratchStore,
    inputs: &[(Parameter, &Raster<f64>)],
    library: &CurveLibrary,
    stage: LifeStage,
    method: CombineMethod,
) -> Result<HabitatSuitability> {
    run(inputs, library, stage, method, Some(store))
}

fn run(
    inputs: &[(Parameter, &Raster<f64>)],
    library: &CurveLibrary,
    stage: LifeStage,
    method: CombineMethod,
    mut store: Option<&mut ScratchStore>,
) -> Result<HabitatSuitability> {
    if inputs.is_empty() {
        return Err(Error::InvalidParameter {
            name: "inputs",
            value: "[]".into(),
            reason: "at least one physical raster is required".into(),
        });
    }

    let mut layers = Vec::with_capacity(inputs.len());
    for &(parameter, physical) in inputs {
        let curve = library.curve(parameter, stage)?;
        let (lo, hi) = curve.domain();
        tracing::debug!("{parameter} {stage} curve: {} points over [{lo}, {hi}]", curve.len());

        let mut hsi = build_suitability_raster(physical, &curve)?;
        hsi.set_name(format!("{parameter}_hsi"));
        if let Some(store) = store.as_deref_mut() {
            hsi = store.persist(&hsi, &format!("{parameter}_hsi"))?;
        }
        layers.push((parameter, hsi));
    }

    let rasters: Vec<Raster<f64>> = layers.iter().map(|(_, r)| r.clone()).collect();
    let composite = combine(&rasters, method)?;
    tracing::info!(
        "combined {} suitability layers for {stage} ({method:?})",
        layers.len()
    );
    Ok(HabitatSuitability { layers, composite })
}

/// Usable habitat area of a composite suitability raster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitatArea {
    /// Valid pixels at or above the threshold
    pub pixel_count: usize,
    /// Area of one pixel in `unit`
    pub pixel_area: f64,
    pub area: f64,
    /// Squared linear unit of the raster's reference system
    pub unit: &'static str,
    pub threshold: f64,
}

impl fmt::Display for HabitatArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} {} ({} pixels >= {})",
            self.area, self.unit, self.pixel_count, self.threshold
        )
    }
}

/// Count pixels whose index reaches `threshold` and convert to area
pub fn usable_area(chsi: &Raster<f64>, threshold: f64) -> Result<HabitatArea> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::InvalidParameter {
            name: "threshold",
            value: threshold.to_string(),
            reason: "must be within [0, 1]".into(),
        });
    }

    let pixel_count = chsi
        .data()
        .iter()
        .filter(|&&v| !chsi.is_nodata(v) && v >= threshold)
        .count();
    let pixel_area = chsi.transform().pixel_area();

    Ok(HabitatArea {
        pixel_count,
        pixel_area,
        area: pixel_count as f64 * pixel_area,
        unit: chsi.crs().linear_unit().area_symbol(),
        threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use riverhsi_core::raster::GeoTransform;
    use riverhsi_core::CRS;

    const LIBRARY: &str = r#"{
        "velocity": {"juvenile": [{"u": 0.0, "HSI": 0.0}, {"u": 1.0, "HSI": 1.0}]},
        "depth": {"juvenile": [{"h": 0.0, "HSI": 1.0}, {"h": 2.0, "HSI": 0.0}]}
    }"#;

    fn on_grid(values: Vec<f64>) -> Raster<f64> {
        let mut r = Raster::from_vec(values, 2, 2).unwrap();
        r.set_transform(GeoTransform::new(500000.0, 4000020.0, 10.0, -10.0));
        r.set_crs(CRS::from_epsg(32630).unwrap());
        r
    }

    #[test]
    fn test_composite_suitability() {
        let lib = CurveLibrary::from_json_str(LIBRARY).unwrap();
        let velocity = on_grid(vec![1.0, 0.5, 0.25, 3.0]);
        let depth = on_grid(vec![0.0, 1.0, 1.0, 1.0]);

        let hsi = composite_suitability(
            &[(Parameter::Velocity, &velocity), (Parameter::Depth, &depth)],
            &lib,
            LifeStage::Juvenile,
            CombineMethod::GeometricMean,
        )
        .unwrap();

        assert_eq!(hsi.layers.len(), 2);
        assert_eq!(hsi.layers[0].1.name(), "velocity_hsi");
        assert_eq!(hsi.composite.name(), "chsi");
        let c = &hsi.composite;
        assert_relative_eq!(c.get(0, 0).unwrap(), 1.0);
        assert_relative_eq!(c.get(0, 1).unwrap(), 0.5);
        assert_relative_eq!(c.get(1, 0).unwrap(), (0.25f64 * 0.5).sqrt());
        // velocity 3.0 is outside its curve
        assert!(c.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_composite_with_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ScratchStore::new(dir.path().join("cache"));
        let lib = CurveLibrary::from_json_str(LIBRARY).unwrap();
        let depth = on_grid(vec![0.0, 1.0, 2.0, 4.0]);

        let hsi = composite_suitability_in(
            &mut store,
            &[(Parameter::Depth, &depth)],
            &lib,
            LifeStage::Juvenile,
            CombineMethod::Product,
        )
        .unwrap();
        assert_eq!(store.files().len(), 1);
        assert_relative_eq!(hsi.composite.get(0, 1).unwrap(), 0.5, epsilon = 1e-6);
        store.purge().unwrap();
        assert!(!dir.path().join("cache").exists());
    }

    #[test]
    fn test_composite_errors() {
        let lib = CurveLibrary::from_json_str(LIBRARY).unwrap();
        assert!(composite_suitability(&[], &lib, LifeStage::Juvenile, CombineMethod::default()).is_err());

        let small = on_grid(vec![0.0; 4]);
        let big = Raster::from_vec(vec![0.0; 6], 2, 3).unwrap();
        let mismatch = composite_suitability(
            &[(Parameter::Velocity, &small), (Parameter::Depth, &big)],
            &lib,
            LifeStage::Juvenile,
            CombineMethod::default(),
        );
        assert!(matches!(mismatch, Err(Error::SizeMismatch { .. })));

        let missing = composite_suitability(
            &[(Parameter::Velocity, &small)],
            &lib,
            LifeStage::Adult,
            CombineMethod::default(),
        );
        assert!(matches!(missing, Err(Error::InvalidCurve(_))));
    }

    #[test]
    fn test_usable_area() {
        let chsi = on_grid(vec![0.4, 0.39, f64::NAN, 0.9]);
        let area = usable_area(&chsi, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(area.pixel_count, 2);
        assert_relative_eq!(area.pixel_area, 100.0);
        assert_relative_eq!(area.area, 200.0);
        assert_eq!(area.unit, "m²");
        assert_eq!(area.to_string(), "200.00 m² (2 pixels >= 0.4)");
    }

    #[test]
    fn test_usable_area_geographic_and_bounds() {
        let mut chsi = Raster::from_vec(vec![1.0, 0.0], 1, 2).unwrap();
        chsi.set_transform(GeoTransform::new(-3.7, 40.4, 0.001, -0.001));
        let area = usable_area(&chsi, 0.0).unwrap();
        assert_eq!(area.pixel_count, 2);
        assert_eq!(area.unit, "deg²");

        assert!(usable_area(&chsi, -0.1).is_err());
        assert!(usable_area(&chsi, 1.5).is_err());
        assert!(usable_area(&chsi, f64::NAN).is_err());
    }
}
