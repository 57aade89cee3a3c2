//! Piecewise-linear suitability curves
//!
//! A curve maps a physical value (depth, velocity, grain size) to a
//! suitability score. Queries outside the curve's parameter range have no
//! score: the curve is never extrapolated.

use riverhsi_core::{Error, Result};

/// Ordered control points `(value, score)`, strictly ascending by value
#[derive(Debug, Clone, PartialEq)]
pub struct SuitabilityCurve {
    values: Vec<f64>,
    scores: Vec<f64>,
}

impl SuitabilityCurve {
    /// Build a curve from parallel value and score lists
    pub fn new(values: Vec<f64>, scores: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::InvalidCurve("curve has no control points".into()));
        }
        if values.len() != scores.len() {
            return Err(Error::InvalidCurve(format!(
                "{} parameter values but {} scores",
                values.len(),
                scores.len()
            )));
        }
        if let Some(i) = values
            .iter()
            .chain(scores.iter())
            .position(|v| !v.is_finite())
        {
            return Err(Error::InvalidCurve(format!(
                "non-finite control point at index {}",
                i % values.len()
            )));
        }
        if let Some(w) = values.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::InvalidCurve(format!(
                "parameter values must be strictly ascending ({} then {})",
                w[0], w[1]
            )));
        }
        Ok(Self { values, scores })
    }

    /// Build a curve from `(value, score)` pairs
    pub fn from_points(points: &[(f64, f64)]) -> Result<Self> {
        let (values, scores) = points.iter().copied().unzip();
        Self::new(values, scores)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parameter range `(min, max)` covered by the curve
    pub fn domain(&self) -> (f64, f64) {
        (self.values[0], self.values[self.values.len() - 1])
    }

    /// Score for one query, NaN when it has none
    pub fn score(&self, x: f64) -> f64 {
        let n = self.values.len();
        // bisect-left insertion position
        let pos = self.values.partition_point(|&v| v < x);

        if pos < n && self.values[pos] == x {
            return self.scores[pos];
        }
        if pos == 0 || pos == n {
            // below the first control point, above the last, or NaN
            return f64::NAN;
        }

        let (x1, x2) = (self.values[pos - 1], self.values[pos]);
        let (y1, y2) = (self.scores[pos - 1], self.scores[pos]);
        if x2 == x1 {
            return f64::NAN;
        }
        y1 + (x - x1) / (x2 - x1) * (y2 - y1)
    }
}

/// Score every query against `curve`
pub fn interpolate(curve: &SuitabilityCurve, queries: &[f64]) -> Vec<f64> {
    queries.iter().map(|&x| curve.score(x)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> SuitabilityCurve {
        SuitabilityCurve::new(vec![0.0, 0.5, 1.0], vec![0.0, 1.0, 0.0]).unwrap()
    }

    #[test]
    fn test_triangle_scenario() {
        let scores = interpolate(&triangle(), &[-0.1, 0.0, 0.25, 0.5, 0.75, 1.0, 1.5]);
        let expected = [f64::NAN, 0.0, 0.5, 1.0, 0.5, 0.0, f64::NAN];
        for (got, want) in scores.iter().zip(expected) {
            if want.is_nan() {
                assert!(got.is_nan());
            } else {
                assert_relative_eq!(*got, want);
            }
        }
    }

    #[test]
    fn test_control_points_are_exact() {
        let curve = SuitabilityCurve::from_points(&[
            (0.0198, 0.0),
            (0.13, 0.37),
            (0.4, 1.0),
            (0.91, 0.66),
            (1.7, 0.0),
        ])
        .unwrap();
        for (&x, &y) in curve.values().iter().zip(curve.scores()) {
            assert_eq!(curve.score(x), y);
        }
    }

    #[test]
    fn test_outside_domain_is_nodata() {
        let curve = triangle();
        assert!(curve.score(-1e-12).is_nan());
        assert!(curve.score(1.0 + 1e-12).is_nan());
        assert!(curve.score(f64::NAN).is_nan());
        assert!(curve.score(f64::INFINITY).is_nan());
    }

    #[test]
    fn test_single_point_curve() {
        let curve = SuitabilityCurve::new(vec![2.0], vec![0.8]).unwrap();
        assert_eq!(curve.score(2.0), 0.8);
        assert!(curve.score(2.1).is_nan());
    }

    #[test]
    fn test_scores_are_not_clamped() {
        let curve = SuitabilityCurve::new(vec![0.0, 1.0], vec![0.0, 2.0]).unwrap();
        assert_relative_eq!(curve.score(0.75), 1.5);
    }

    #[test]
    fn test_validation() {
        assert!(SuitabilityCurve::new(vec![], vec![]).is_err());
        assert!(SuitabilityCurve::new(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(SuitabilityCurve::new(vec![0.0, 0.0], vec![1.0, 1.0]).is_err());
        assert!(SuitabilityCurve::new(vec![1.0, 0.0], vec![1.0, 1.0]).is_err());
        assert!(SuitabilityCurve::new(vec![0.0, f64::NAN], vec![1.0, 1.0]).is_err());
    }
}
