//! Pure-Rust coordinate transforms between catalog reference systems
//!
//! Transverse Mercator follows Snyder (1987, USGS Prof. Paper 1395,
//! pp. 61-64); Web Mercator is the spherical form on the WGS84 semi-major
//! axis. Coordinates are always (x, y): (easting, northing) or (lon, lat).
//! WGS84 and ETRS89 are treated as coincident, so every transform goes
//! through geographic degrees without a datum shift.

use super::catalog::{central_meridian, CrsDefinition, Ellipsoid, Projection};
use super::CRS;
use crate::error::{Error, Result};
use std::f64::consts::FRAC_PI_4;

const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// A transform from one reference system to another
///
/// Uncatalogued systems only transform to themselves; any other pairing
/// fails with `Error::Reprojection` at the first coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    source: Endpoint,
    target: Endpoint,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Endpoint {
    code: u32,
    definition: Option<CrsDefinition>,
}

impl Endpoint {
    fn of(crs: &CRS) -> Self {
        Self {
            code: crs.code(),
            definition: crs.definition().copied(),
        }
    }
}

impl CoordinateTransform {
    pub fn new(source: &CRS, target: &CRS) -> Self {
        Self {
            source: Endpoint::of(source),
            target: Endpoint::of(target),
        }
    }

    /// Whether source and target are the same system
    pub fn is_identity(&self) -> bool {
        match (self.source.definition, self.target.definition) {
            (Some(s), Some(t)) => s.projection == t.projection,
            _ => self.source.code == self.target.code,
        }
    }

    /// Transform a single (x, y) coordinate
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if self.is_identity() {
            return Ok((x, y));
        }
        let (Some(source), Some(target)) = (self.source.definition, self.target.definition) else {
            return Err(Error::Reprojection(format!(
                "no built-in projection between EPSG:{} and EPSG:{}",
                self.source.code, self.target.code
            )));
        };
        let (lon, lat) = to_geographic(&source, x, y);
        let (tx, ty) = from_geographic(&target, lon, lat);
        if !tx.is_finite() || !ty.is_finite() {
            return Err(Error::Reprojection(format!(
                "({x}, {y}) has no image in EPSG:{}",
                target.code
            )));
        }
        Ok((tx, ty))
    }

    /// The opposite transform
    pub fn inverse(&self) -> Self {
        Self {
            source: self.target,
            target: self.source,
        }
    }
}

fn to_geographic(def: &CrsDefinition, x: f64, y: f64) -> (f64, f64) {
    match def.projection {
        Projection::Geographic => (x, y),
        Projection::WebMercator => web_mercator_inverse(x, y),
        Projection::TransverseMercator { zone, north } => {
            utm_inverse(&def.datum.ellipsoid(), x, y, zone, north)
        }
    }
}

fn from_geographic(def: &CrsDefinition, lon: f64, lat: f64) -> (f64, f64) {
    match def.projection {
        Projection::Geographic => (lon, lat),
        Projection::WebMercator => web_mercator_forward(lon, lat),
        Projection::TransverseMercator { zone, north } => {
            utm_forward(&def.datum.ellipsoid(), lon, lat, zone, north)
        }
    }
}

// ── Web Mercator ─────────────────────────────────────────────────────────

fn web_mercator_forward(lon: f64, lat: f64) -> (f64, f64) {
    if lat.abs() >= 90.0 {
        return (f64::NAN, f64::NAN);
    }
    let x = WEB_MERCATOR_RADIUS * lon.to_radians();
    let y = WEB_MERCATOR_RADIUS * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

fn web_mercator_inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
    let lat = (2.0 * (y / WEB_MERCATOR_RADIUS).exp().atan() - 2.0 * FRAC_PI_4).to_degrees();
    (lon, lat)
}

// ── Transverse Mercator ──────────────────────────────────────────────────

/// Meridional arc from equator to latitude `lat` (radians), Snyder eq. 3-21
fn meridional_arc(ell: &Ellipsoid, lat: f64) -> f64 {
    let e2 = ell.e2();
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    ell.a
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

/// (lon, lat) degrees to UTM (easting, northing), Snyder eqs. 8-9 and 8-10
fn utm_forward(ell: &Ellipsoid, lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let e2 = ell.e2();
    let ep2 = e2 / (1.0 - e2);
    let lat = lat_deg.to_radians();
    let lon0 = (central_meridian(zone) as f64).to_radians();

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = ell.a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = ep2 * cos_lat * cos_lat;
    let a = cos_lat * (lon_deg.to_radians() - lon0);
    let m = meridional_arc(ell, lat);

    let a2 = a * a;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    let easting = K0
        * n
        * (a + (1.0 - t + c) * a2 * a / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a4 * a / 120.0)
        + FALSE_EASTING;

    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0));

    if north {
        (easting, northing)
    } else {
        (easting, northing + FALSE_NORTHING_SOUTH)
    }
}

/// UTM (easting, northing) to (lon, lat) degrees, Snyder eqs. 8-17 to 8-25
fn utm_inverse(ell: &Ellipsoid, easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let e2 = ell.e2();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);

    let x = easting - FALSE_EASTING;
    let y = if north { northing } else { northing - FALSE_NORTHING_SOUTH };

    // Footpoint latitude
    let m = y / K0;
    let mu = m / (ell.a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let sqrt_1_e2 = (1.0 - e2).sqrt();
    let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin1 = phi1.sin();
    let cos1 = phi1.cos();
    let tan1 = phi1.tan();
    let c1 = ep2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let w = 1.0 - e2 * sin1 * sin1;
    let n1 = ell.a / w.sqrt();
    let r1 = ell.a * (1.0 - e2) / (w * w.sqrt());
    let d = x / (n1 * K0);
    let d2 = d * d;
    let d4 = d2 * d2;
    let d6 = d4 * d2;

    let lat = phi1
        - (n1 * tan1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d4 * d
            / 120.0)
        / cos1;

    (
        central_meridian(zone) as f64 + lon.to_degrees(),
        lat.to_degrees(),
    )
}
