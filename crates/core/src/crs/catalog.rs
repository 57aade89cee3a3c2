//! Built-in EPSG catalog
//!
//! The reference systems a river survey is realistically delivered in:
//! WGS84 and ETRS89 geographic, Web Mercator, WGS84 UTM (north and south)
//! and ETRS89 UTM zones 28N-38N.

use super::wkt::WktNode;

/// Horizontal datum of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datum {
    Wgs84,
    Etrs89,
}

/// Reference ellipsoid parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis (m)
    pub a: f64,
    /// Inverse flattening
    pub inv_f: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid { a: 6_378_137.0, inv_f: 298.257_223_563 };
    pub const GRS80: Ellipsoid = Ellipsoid { a: 6_378_137.0, inv_f: 298.257_222_101 };

    /// First eccentricity squared
    pub fn e2(&self) -> f64 {
        let f = 1.0 / self.inv_f;
        2.0 * f - f * f
    }
}

impl Datum {
    pub fn ellipsoid(&self) -> Ellipsoid {
        match self {
            Datum::Wgs84 => Ellipsoid::WGS84,
            Datum::Etrs89 => Ellipsoid::GRS80,
        }
    }

    fn geographic_code(&self) -> u32 {
        match self {
            Datum::Wgs84 => 4326,
            Datum::Etrs89 => 4258,
        }
    }
}

/// Map projection of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Longitude/latitude in degrees
    Geographic,
    /// Spherical ("pseudo") Mercator
    WebMercator,
    /// Universal Transverse Mercator
    TransverseMercator { zone: u32, north: bool },
}

/// Unit of the coordinate axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearUnit {
    Degree,
    Metre,
    /// Uncatalogued system known only by its code
    Unspecified,
}

impl LinearUnit {
    /// Symbol used for areas in this unit
    pub fn area_symbol(&self) -> &'static str {
        match self {
            LinearUnit::Degree => "deg²",
            LinearUnit::Metre => "m²",
            LinearUnit::Unspecified => "units²",
        }
    }
}

/// A fully described EPSG reference system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrsDefinition {
    pub code: u32,
    pub datum: Datum,
    pub projection: Projection,
}

/// Look up an EPSG code
pub fn lookup(code: u32) -> Option<CrsDefinition> {
    let (datum, projection) = match code {
        4326 => (Datum::Wgs84, Projection::Geographic),
        4258 => (Datum::Etrs89, Projection::Geographic),
        3857 => (Datum::Wgs84, Projection::WebMercator),
        32601..=32660 => (
            Datum::Wgs84,
            Projection::TransverseMercator { zone: code - 32600, north: true },
        ),
        32701..=32760 => (
            Datum::Wgs84,
            Projection::TransverseMercator { zone: code - 32700, north: false },
        ),
        25828..=25838 => (
            Datum::Etrs89,
            Projection::TransverseMercator { zone: code - 25800, north: true },
        ),
        _ => return None,
    };
    Some(CrsDefinition { code, datum, projection })
}

fn code_for(datum: Datum, projection: Projection) -> Option<u32> {
    let code = match (datum, projection) {
        (d, Projection::Geographic) => d.geographic_code(),
        (Datum::Wgs84, Projection::WebMercator) => 3857,
        (Datum::Wgs84, Projection::TransverseMercator { zone, north: true }) => 32600 + zone,
        (Datum::Wgs84, Projection::TransverseMercator { zone, north: false }) => 32700 + zone,
        (Datum::Etrs89, Projection::TransverseMercator { zone, north: true }) => 25800 + zone,
        _ => return None,
    };
    // Round-trip through lookup so out-of-range zones are rejected.
    lookup(code).map(|d| d.code)
}

impl CrsDefinition {
    pub fn name(&self) -> String {
        let datum = match self.datum {
            Datum::Wgs84 => "WGS 84",
            Datum::Etrs89 => "ETRS89",
        };
        match self.projection {
            Projection::Geographic => datum.to_string(),
            Projection::WebMercator => format!("{datum} / Pseudo-Mercator"),
            Projection::TransverseMercator { zone, north } => {
                format!("{datum} / UTM zone {zone}{}", if north { 'N' } else { 'S' })
            }
        }
    }

    pub fn linear_unit(&self) -> LinearUnit {
        match self.projection {
            Projection::Geographic => LinearUnit::Degree,
            _ => LinearUnit::Metre,
        }
    }

    pub fn is_geographic(&self) -> bool {
        self.projection == Projection::Geographic
    }

    /// OGC WKT1 representation
    pub fn wkt(&self) -> String {
        let geogcs = geogcs_wkt(self.datum);
        match self.projection {
            Projection::Geographic => geogcs,
            Projection::WebMercator => format!(
                "PROJCS[\"{name}\",{geogcs},PROJECTION[\"Mercator_1SP\"],\
                 PARAMETER[\"central_meridian\",0],PARAMETER[\"scale_factor\",1],\
                 PARAMETER[\"false_easting\",0],PARAMETER[\"false_northing\",0],\
                 UNIT[\"metre\",1,AUTHORITY[\"EPSG\",\"9001\"]],\
                 AXIS[\"Easting\",EAST],AXIS[\"Northing\",NORTH],\
                 AUTHORITY[\"EPSG\",\"{code}\"]]",
                name = self.name(),
                code = self.code,
            ),
            Projection::TransverseMercator { zone, north } => format!(
                "PROJCS[\"{name}\",{geogcs},PROJECTION[\"Transverse_Mercator\"],\
                 PARAMETER[\"latitude_of_origin\",0],\
                 PARAMETER[\"central_meridian\",{cm}],\
                 PARAMETER[\"scale_factor\",0.9996],\
                 PARAMETER[\"false_easting\",500000],\
                 PARAMETER[\"false_northing\",{fn_}],\
                 UNIT[\"metre\",1,AUTHORITY[\"EPSG\",\"9001\"]],\
                 AXIS[\"Easting\",EAST],AXIS[\"Northing\",NORTH],\
                 AUTHORITY[\"EPSG\",\"{code}\"]]",
                name = self.name(),
                cm = central_meridian(zone),
                fn_ = if north { 0 } else { 10_000_000 },
                code = self.code,
            ),
        }
    }
}

/// Central meridian (degrees) of a UTM zone
pub fn central_meridian(zone: u32) -> i32 {
    zone as i32 * 6 - 183
}

fn geogcs_wkt(datum: Datum) -> String {
    let (name, datum_name, spheroid, sph_code, datum_code, code) = match datum {
        Datum::Wgs84 => ("WGS 84", "WGS_1984", "WGS 84", 7030, 6326, 4326),
        Datum::Etrs89 => (
            "ETRS89",
            "European_Terrestrial_Reference_System_1989",
            "GRS 1980",
            7019,
            6258,
            4258,
        ),
    };
    let e = datum.ellipsoid();
    format!(
        "GEOGCS[\"{name}\",DATUM[\"{datum_name}\",\
         SPHEROID[\"{spheroid}\",{a},{inv_f},AUTHORITY[\"EPSG\",\"{sph_code}\"]],\
         AUTHORITY[\"EPSG\",\"{datum_code}\"]],\
         PRIMEM[\"Greenwich\",0,AUTHORITY[\"EPSG\",\"8901\"]],\
         UNIT[\"degree\",0.0174532925199433,AUTHORITY[\"EPSG\",\"9122\"]],\
         AUTHORITY[\"EPSG\",\"{code}\"]]",
        a = e.a,
        inv_f = e.inv_f,
    )
}

// ── WKT matching ─────────────────────────────────────────────────────────

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn match_datum(geog: &WktNode) -> Option<Datum> {
    if let Some(datum) = geog.find(&["DATUM", "D"]) {
        let name = normalize(datum.name().unwrap_or_default());
        if name.contains("wgs84") || name.contains("wgs1984") || name.contains("worldgeodeticsystem1984") {
            return Some(Datum::Wgs84);
        }
        if name.contains("etrs89")
            || name.contains("etrs1989")
            || name.contains("europeanterrestrialreferencesystem1989")
        {
            return Some(Datum::Etrs89);
        }
    }

    let spheroid = geog.find(&["SPHEROID", "ELLIPSOID"])?;
    let a = spheroid.number(1)?;
    let inv_f = spheroid.number(2)?;
    [Datum::Wgs84, Datum::Etrs89].into_iter().find(|d| {
        let e = d.ellipsoid();
        (e.a - a).abs() < 1e-3 && (e.inv_f - inv_f).abs() < 1e-8
    })
}

fn parameter(node: &WktNode, names: &[&str]) -> Option<f64> {
    node.children()
        .chain(
            node.child(&["CONVERSION"])
                .into_iter()
                .flat_map(|c| c.children()),
        )
        .filter(|n| n.keyword.eq_ignore_ascii_case("PARAMETER"))
        .find(|n| {
            let name = normalize(n.name().unwrap_or_default());
            names.iter().any(|candidate| name == *candidate)
        })
        .and_then(|n| n.number(1))
}

fn projection_method(projcs: &WktNode) -> Option<String> {
    projcs
        .child(&["PROJECTION"])
        .or_else(|| projcs.child(&["CONVERSION"]).and_then(|c| c.child(&["METHOD"])))
        .and_then(|n| n.name())
        .map(normalize)
}

/// Parse names such as "WGS 84 / UTM zone 32N" or "WGS_1984_UTM_Zone_32N"
fn utm_zone_from_name(name: &str) -> Option<(u32, bool)> {
    let name = normalize(name);
    let rest = &name[name.find("utmzone")? + "utmzone".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let zone: u32 = digits.parse().ok()?;
    let north = match rest[digits.len()..].chars().next()? {
        'n' => true,
        's' => false,
        _ => return None,
    };
    (1..=60).contains(&zone).then_some((zone, north))
}

fn match_projected(projcs: &WktNode) -> Option<CrsDefinition> {
    let geog = projcs.child(&["GEOGCS", "BASEGEOGCRS", "BASEGEODCRS", "GEOGCRS"])?;
    let datum = match_datum(geog)?;
    let method = projection_method(projcs).unwrap_or_default();
    let name = normalize(projcs.name().unwrap_or_default());

    let projection = if method.contains("transversemercator") {
        let cm = parameter(projcs, &["centralmeridian", "longitudeofnaturalorigin"])?;
        let false_northing = parameter(projcs, &["falsenorthing"]).unwrap_or(0.0);
        let false_easting = parameter(projcs, &["falseeasting"]).unwrap_or(500_000.0);
        let scale = parameter(projcs, &["scalefactor", "scalefactoratnaturalorigin"])
            .unwrap_or(0.9996);
        if (scale - 0.9996).abs() > 1e-9 || (false_easting - 500_000.0).abs() > 1e-6 {
            return None;
        }
        let zone = (cm + 183.0) / 6.0;
        if zone.fract().abs() > 1e-9 {
            return None;
        }
        let north = if false_northing.abs() < 1e-6 {
            true
        } else if (false_northing - 10_000_000.0).abs() < 1e-6 {
            false
        } else {
            return None;
        };
        Projection::TransverseMercator { zone: zone as u32, north }
    } else if method.contains("pseudomercator")
        || method.contains("popularvisualisation")
        || method.contains("auxiliarysphere")
        || (method.contains("mercator") && (name.contains("pseudo") || name.contains("webmercator")))
    {
        Projection::WebMercator
    } else if let Some((zone, north)) = utm_zone_from_name(&name) {
        Projection::TransverseMercator { zone, north }
    } else {
        return None;
    };

    code_for(datum, projection).and_then(lookup)
}

/// Auto-identify a parsed WKT definition against the catalog, ignoring any authority
pub fn match_wkt(node: &WktNode) -> Option<CrsDefinition> {
    let keyword = node.keyword.to_ascii_uppercase();
    match keyword.as_str() {
        "GEOGCS" | "GEOGCRS" | "GEODCRS" => {
            let datum = match_datum(node)?;
            code_for(datum, Projection::Geographic).and_then(lookup)
        }
        "PROJCS" | "PROJCRS" => match_projected(node),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ranges() {
        assert_eq!(
            lookup(32632).unwrap().projection,
            Projection::TransverseMercator { zone: 32, north: true }
        );
        assert_eq!(
            lookup(32721).unwrap().projection,
            Projection::TransverseMercator { zone: 21, north: false }
        );
        assert_eq!(lookup(25833).unwrap().datum, Datum::Etrs89);
        assert!(lookup(32600).is_none());
        assert!(lookup(32661).is_none());
        assert!(lookup(2056).is_none());
    }

    #[test]
    fn test_generated_wkt_matches_itself() {
        for code in [4326, 4258, 3857, 32601, 32632, 32760, 25832] {
            let def = lookup(code).unwrap();
            let node = WktNode::parse(&def.wkt()).unwrap();
            assert_eq!(node.authority(), Some(("EPSG".into(), code)));
            assert_eq!(match_wkt(&node), Some(def), "code {code}");
        }
    }

    #[test]
    fn test_match_esri_utm_without_authority() {
        let wkt = r#"PROJCS["WGS_1984_UTM_Zone_33S",GEOGCS["GCS_WGS_1984",
            DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],
            PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],
            PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],
            PARAMETER["False_Northing",10000000.0],PARAMETER["Central_Meridian",15.0],
            PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],
            UNIT["Meter",1.0]]"#;
        let node = WktNode::parse(wkt).unwrap();
        assert_eq!(match_wkt(&node).unwrap().code, 32733);
    }

    #[test]
    fn test_match_by_spheroid_only() {
        let wkt = r#"GEOGCS["unnamed",DATUM["unknown",SPHEROID["GRS80",6378137,298.257222101]]]"#;
        let node = WktNode::parse(wkt).unwrap();
        assert_eq!(match_wkt(&node).unwrap().code, 4258);
    }

    #[test]
    fn test_unmatched_projection() {
        let wkt = r#"PROJCS["CH1903+ / LV95",GEOGCS["CH1903+",DATUM["CH1903+",
            SPHEROID["Bessel 1841",6377397.155,299.1528128]]],
            PROJECTION["Hotine_Oblique_Mercator_Azimuth_Center"]]"#;
        let node = WktNode::parse(wkt).unwrap();
        assert!(match_wkt(&node).is_none());
    }

    #[test]
    fn test_utm_zone_from_name() {
        assert_eq!(utm_zone_from_name("WGS 84 / UTM zone 32N"), Some((32, true)));
        assert_eq!(utm_zone_from_name("WGS_1984_UTM_Zone_5S"), Some((5, false)));
        assert_eq!(utm_zone_from_name("UTM zone 61N"), None);
    }
}
