//! GeoJSON vector storage
//!
//! Features are stored as a GeoJSON FeatureCollection. The spatial reference
//! lives in a sibling `.prj` file holding WKT; a legacy GeoJSON `crs` member
//! is honoured when no `.prj` exists, and RFC 7946 WGS84 is assumed otherwise.

use crate::crs::{self, CrsDescriptor, CRS};
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FieldDef, VectorDataset};
use geojson::{FeatureCollection, GeoJson, JsonObject, JsonValue};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Path of the `.prj` file accompanying a vector file
pub fn prj_path(path: &Path) -> PathBuf {
    path.with_extension("prj")
}

/// Read a GeoJSON file (Feature, FeatureCollection or bare Geometry)
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<VectorDataset> {
    let path = path.as_ref();
    let load_error = |reason: String| Error::Load {
        path: path.to_path_buf(),
        reason,
    };

    let text = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
    let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| load_error(e.to_string()))?;

    let prj = prj_path(path);
    let crs = if prj.exists() {
        let text = fs::read_to_string(&prj)?;
        crs::resolve(&CrsDescriptor::parse(&text))
    } else {
        legacy_crs(&geojson).unwrap_or_else(|| {
            tracing::debug!("{} has no .prj; using WGS84", path.display());
            CRS::wgs84()
        })
    };

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut dataset = VectorDataset::new(crs).with_name(stem);

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![geojson::Feature {
            geometry: Some(g),
            ..Default::default()
        }],
    };

    for f in features {
        let feature = convert_feature(f)?;
        let mut names: Vec<_> = feature.properties.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, value) in names {
            if let Some(kind) = value.kind() {
                dataset.add_field(FieldDef::new(name.clone(), kind));
            }
        }
        dataset.push(feature);
    }

    Ok(dataset)
}

/// `{"crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32630"}}}`
fn legacy_crs(geojson: &GeoJson) -> Option<CRS> {
    let members = match geojson {
        GeoJson::FeatureCollection(fc) => fc.foreign_members.as_ref(),
        GeoJson::Feature(f) => f.foreign_members.as_ref(),
        GeoJson::Geometry(g) => g.foreign_members.as_ref(),
    }?;
    let name = members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    if name.contains("CRS84") {
        return Some(CRS::wgs84());
    }
    let code = name.rsplit(':').next()?.parse::<u32>().ok()?;
    Some(crs::resolve(&CrsDescriptor::Epsg(code)))
}

fn convert_feature(f: geojson::Feature) -> Result<Feature> {
    let geometry = match f.geometry {
        Some(g) => Some(
            geo_types::Geometry::<f64>::try_from(g)
                .map_err(|e| Error::InvalidGeometry(e.to_string()))?,
        ),
        None => None,
    };

    let properties = f
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, attribute_from_json(v)))
        .collect();

    let id = f.id.map(|id| match id {
        geojson::feature::Id::String(s) => s,
        geojson::feature::Id::Number(n) => n.to_string(),
    });

    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

fn attribute_from_json(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Int(i) => JsonValue::from(*i),
        AttributeValue::Float(v) => serde_json::Number::from_f64(*v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
    }
}

/// Write a dataset as a GeoJSON FeatureCollection plus a `.prj` with its WKT
pub fn write_geojson<P: AsRef<Path>>(dataset: &VectorDataset, path: P) -> Result<()> {
    let path = path.as_ref();

    let features = dataset
        .iter()
        .map(|feature| {
            let mut properties = JsonObject::new();
            // Schema order first, then anything the schema does not list
            for field in dataset.fields() {
                let value = feature
                    .get_property(&field.name)
                    .map(attribute_to_json)
                    .unwrap_or(JsonValue::Null);
                properties.insert(field.name.clone(), value);
            }
            for (name, value) in &feature.properties {
                if !properties.contains_key(name) {
                    properties.insert(name.clone(), attribute_to_json(value));
                }
            }

            geojson::Feature {
                bbox: None,
                geometry: feature
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: feature.id.clone().map(geojson::feature::Id::String),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let mut writer = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer(&mut writer, &collection)?;
    writer.flush()?;

    fs::write(prj_path(path), dataset.crs().wkt())?;
    Ok(())
}
