//! Coordinate Reference System handling
//!
//! Every dataset carries a resolved [`CRS`]. Catalog systems know their
//! projection and can be transformed; any other EPSG code is kept as an
//! uncatalogued system that is stored and labelled faithfully but refuses
//! coordinate transforms. Unrecognised definitions degrade to WGS84 with a
//! warning; [`try_resolve`] is the strict variant.

pub mod catalog;
pub mod transform;
pub mod wkt;

pub use catalog::{CrsDefinition, Datum, LinearUnit, Projection};
pub use transform::CoordinateTransform;

use crate::error::{Error, Result};
use std::fmt;
use wkt::WktNode;

/// Range of codes the EPSG registry assigns to reference systems; 32767 is
/// GeoTIFF's "user defined"
pub const EPSG_CODE_RANGE: std::ops::Range<u32> = 1024..32767;

/// A resolved coordinate reference system
#[derive(Debug, Clone)]
pub struct CRS {
    code: u32,
    definition: Option<CrsDefinition>,
    wkt: String,
    name: Option<String>,
    unit: LinearUnit,
    geographic: bool,
}

impl CRS {
    /// Create a CRS from an EPSG code known to the catalog
    pub fn from_epsg(code: u32) -> Result<Self> {
        let definition = catalog::lookup(code)
            .ok_or_else(|| Error::UnresolvedCrs(format!("EPSG:{code} is not in the catalog")))?;
        Ok(Self::from_definition(definition))
    }

    pub fn from_definition(definition: CrsDefinition) -> Self {
        Self {
            code: definition.code,
            wkt: definition.wkt(),
            name: None,
            unit: definition.linear_unit(),
            geographic: definition.is_geographic(),
            definition: Some(definition),
        }
    }

    fn with_wkt(definition: CrsDefinition, wkt: &str) -> Self {
        Self {
            wkt: wkt.to_string(),
            ..Self::from_definition(definition)
        }
    }

    /// A registered EPSG system outside the catalog, optionally with the WKT
    /// it was read from
    ///
    /// Without WKT the definition text is the bare `EPSG:n` identifier and
    /// the axis unit is unspecified.
    pub fn uncatalogued(code: u32, wkt: Option<&str>) -> Result<Self> {
        if !EPSG_CODE_RANGE.contains(&code) {
            return Err(Error::UnresolvedCrs(format!("{code} is not an EPSG code")));
        }
        let node = wkt.and_then(|text| WktNode::parse(text).ok());
        let geographic = node.as_ref().is_some_and(is_geographic_node);
        let unit = match &node {
            Some(_) if geographic => LinearUnit::Degree,
            Some(n) => axis_unit(n),
            None => LinearUnit::Unspecified,
        };
        Ok(Self {
            code,
            definition: None,
            wkt: wkt.map_or_else(|| format!("EPSG:{code}"), str::to_string),
            name: node.as_ref().and_then(|n| n.name()).map(str::to_string),
            unit,
            geographic,
        })
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_definition(CrsDefinition {
            code: 4326,
            datum: Datum::Wgs84,
            projection: Projection::Geographic,
        })
    }

    /// Catalog definition, `None` for uncatalogued systems
    pub fn definition(&self) -> Option<&CrsDefinition> {
        self.definition.as_ref()
    }

    /// EPSG code
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Authority name, always "EPSG"
    pub fn authority(&self) -> &'static str {
        "EPSG"
    }

    /// `"EPSG:xxxx"`
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.authority(), self.code())
    }

    /// Definition text: the WKT this CRS was resolved from, the catalog's
    /// WKT1, or `EPSG:n` for a code-only uncatalogued system
    ///
    /// [`CrsDescriptor::parse`] reads any of the three back.
    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    pub fn name(&self) -> String {
        match (&self.definition, &self.name) {
            (Some(def), _) => def.name(),
            (None, Some(name)) => name.clone(),
            (None, None) => self.identifier(),
        }
    }

    pub fn linear_unit(&self) -> LinearUnit {
        self.unit
    }

    pub fn is_geographic(&self) -> bool {
        self.geographic
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        self.code == other.code
    }
}

fn is_geographic_node(node: &WktNode) -> bool {
    matches!(
        node.keyword.to_ascii_uppercase().as_str(),
        "GEOGCS" | "GEOGCRS" | "GEODCRS"
    )
}

/// Unit of the root `UNIT`/`LENGTHUNIT` of a projected definition
fn axis_unit(node: &WktNode) -> LinearUnit {
    let unit = node
        .child(&["UNIT", "LENGTHUNIT"])
        .or_else(|| node.find(&["LENGTHUNIT"]));
    match unit.and_then(|u| u.number(1)) {
        Some(factor) if (factor - 1.0).abs() < 1e-12 => LinearUnit::Metre,
        _ => LinearUnit::Unspecified,
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl PartialEq for CRS {
    fn eq(&self, other: &Self) -> bool {
        self.is_equivalent(other)
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.identifier(), self.name())
    }
}

/// An unresolved reference-system description as found in a file or on the command line
#[derive(Debug, Clone, PartialEq)]
pub enum CrsDescriptor {
    Epsg(u32),
    Wkt(String),
}

impl CrsDescriptor {
    /// Parse `"EPSG:32632"`, a bare code, or WKT text
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        let code = trimmed
            .strip_prefix("EPSG:")
            .or_else(|| trimmed.strip_prefix("epsg:"))
            .unwrap_or(trimmed);
        match code.parse::<u32>() {
            Ok(code) => CrsDescriptor::Epsg(code),
            Err(_) => CrsDescriptor::Wkt(trimmed.to_string()),
        }
    }
}

impl From<u32> for CrsDescriptor {
    fn from(code: u32) -> Self {
        CrsDescriptor::Epsg(code)
    }
}

/// Resolve a descriptor, returning an error when it names no reference system
///
/// Catalog systems come back fully described. A registered EPSG code
/// outside the catalog, bare or as the root authority of a WKT, comes back
/// uncatalogued. Any other WKT is matched against the catalog by its
/// parameters.
pub fn try_resolve(descriptor: &CrsDescriptor) -> Result<CRS> {
    match descriptor {
        CrsDescriptor::Epsg(code) => match catalog::lookup(*code) {
            Some(definition) => Ok(CRS::from_definition(definition)),
            None => CRS::uncatalogued(*code, None),
        },
        CrsDescriptor::Wkt(text) => {
            let node = WktNode::parse(text)?;
            let authority = node
                .authority()
                .filter(|(authority, _)| authority.eq_ignore_ascii_case("EPSG"))
                .map(|(_, code)| code);
            if let Some(code) = authority {
                if let Some(definition) = catalog::lookup(code) {
                    return Ok(CRS::with_wkt(definition, text));
                }
                if EPSG_CODE_RANGE.contains(&code) {
                    return CRS::uncatalogued(code, Some(text));
                }
            }
            catalog::match_wkt(&node)
                .map(|definition| CRS::with_wkt(definition, text))
                .ok_or_else(|| {
                    Error::UnresolvedCrs(format!(
                        "no catalog match for '{}'",
                        node.name().unwrap_or(&node.keyword)
                    ))
                })
        }
    }
}

/// Resolve a descriptor, falling back to WGS84 with a warning
pub fn resolve(descriptor: &CrsDescriptor) -> CRS {
    match try_resolve(descriptor) {
        Ok(crs) => crs,
        Err(e) => {
            tracing::warn!("{e}; assuming WGS84 (EPSG:4326)");
            CRS::wgs84()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_wgs84() {
        let crs = CRS::default();
        assert_eq!(crs.code(), 4326);
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_geographic());
        assert_eq!(crs.linear_unit(), LinearUnit::Degree);
    }

    #[test]
    fn test_from_epsg_unknown() {
        assert!(CRS::from_epsg(32632).is_ok());
        assert!(matches!(CRS::from_epsg(99999), Err(Error::UnresolvedCrs(_))));
    }

    #[test]
    fn test_descriptor_parse() {
        assert_eq!(CrsDescriptor::parse("EPSG:25830"), CrsDescriptor::Epsg(25830));
        assert_eq!(CrsDescriptor::parse(" 3857 "), CrsDescriptor::Epsg(3857));
        assert!(matches!(CrsDescriptor::parse("GEOGCS[\"x\"]"), CrsDescriptor::Wkt(_)));
    }

    #[test]
    fn test_resolve_authority_code() {
        let wkt = CRS::from_epsg(32630).unwrap().wkt().to_string();
        let crs = resolve(&CrsDescriptor::Wkt(wkt.clone()));
        assert_eq!(crs.code(), 32630);
        assert_eq!(crs.wkt(), wkt);
        assert_eq!(crs.linear_unit(), LinearUnit::Metre);
    }

    #[test]
    fn test_resolve_without_authority() {
        let wkt = r#"PROJCS["ETRS89 / UTM zone 30N",GEOGCS["ETRS89",
            DATUM["European_Terrestrial_Reference_System_1989",
            SPHEROID["GRS 1980",6378137,298.257222101]]],
            PROJECTION["Transverse_Mercator"],PARAMETER["central_meridian",-3],
            PARAMETER["scale_factor",0.9996],PARAMETER["false_easting",500000],
            PARAMETER["false_northing",0],UNIT["metre",1]]"#;
        assert_eq!(resolve(&CrsDescriptor::Wkt(wkt.into())).code(), 25830);
    }

    #[test]
    fn test_unrecognised_falls_back_to_wgs84() {
        let wkt = r#"LOCAL_CS["engineering grid"]"#;
        let descriptor = CrsDescriptor::Wkt(wkt.into());
        assert!(try_resolve(&descriptor).is_err());
        assert_eq!(resolve(&descriptor).code(), 4326);

        assert_eq!(resolve(&CrsDescriptor::Wkt("not wkt".into())).code(), 4326);
        assert_eq!(resolve(&CrsDescriptor::Epsg(99999)).code(), 4326);
    }

    #[test]
    fn test_registered_codes_outside_catalog_are_kept() {
        for code in [2056, 31467, 27700, 2154] {
            let crs = resolve(&CrsDescriptor::Epsg(code));
            assert_eq!(crs.code(), code);
            assert!(crs.definition().is_none());
            assert_eq!(crs.wkt(), format!("EPSG:{code}"));
            assert_eq!(CrsDescriptor::parse(crs.wkt()), CrsDescriptor::Epsg(code));
            assert_eq!(crs.linear_unit(), LinearUnit::Unspecified);
        }
    }

    #[test]
    fn test_uncatalogued_wkt_keeps_authority_and_unit() {
        let wkt = r#"PROJCS["CH1903+ / LV95",GEOGCS["CH1903+",DATUM["CH1903+",
            SPHEROID["Bessel 1841",6377397.155,299.1528128]]],
            PROJECTION["Hotine_Oblique_Mercator_Azimuth_Center"],
            UNIT["metre",1],AUTHORITY["EPSG","2056"]]"#;
        let crs = try_resolve(&CrsDescriptor::Wkt(wkt.into())).unwrap();
        assert_eq!(crs.code(), 2056);
        assert_eq!(crs.wkt(), wkt);
        assert_eq!(crs.name(), "CH1903+ / LV95");
        assert_eq!(crs.linear_unit(), LinearUnit::Metre);
        assert!(!crs.is_geographic());

        let geog = r#"GEOGCS["NAD83",DATUM["North_American_Datum_1983",
            SPHEROID["GRS 1980",6378137,298.257222101]],AUTHORITY["EPSG","4269"]]"#;
        let crs = try_resolve(&CrsDescriptor::Wkt(geog.into())).unwrap();
        assert_eq!(crs.code(), 4269);
        assert!(crs.is_geographic());
        assert_eq!(crs.linear_unit(), LinearUnit::Degree);
    }

    #[test]
    fn test_display() {
        let crs = CRS::from_epsg(32632).unwrap();
        assert_eq!(crs.to_string(), "EPSG:32632 (WGS 84 / UTM zone 32N)");
    }
}
