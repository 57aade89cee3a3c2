//! Vector data structures
//!
//! A [`VectorDataset`] is a list of features sharing one field schema and one
//! spatial reference. Geometries are `geo_types` values.

use crate::crs::CRS;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            AttributeValue::String(s) => s.trim().parse().ok(),
            AttributeValue::Null => None,
        }
    }

    /// Schema kind implied by this value
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Bool(_) => Some(FieldKind::Boolean),
            AttributeValue::Int(_) => Some(FieldKind::Integer),
            AttributeValue::Float(_) => Some(FieldKind::Real),
            AttributeValue::String(_) => Some(FieldKind::String),
        }
    }
}

/// Attribute column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Integer,
    Real,
    String,
    Boolean,
}

impl FieldKind {
    /// Kind able to hold values of both kinds
    pub fn widen(self, other: FieldKind) -> FieldKind {
        match (self, other) {
            (a, b) if a == b => a,
            (FieldKind::Integer, FieldKind::Real) | (FieldKind::Real, FieldKind::Integer) => {
                FieldKind::Real
            }
            _ => FieldKind::String,
        }
    }
}

/// One column of the attribute schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
    /// Optional feature ID
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Builder-style attribute
    pub fn with_property(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.set_property(key, value);
        self
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Features with a shared schema and spatial reference
#[derive(Debug, Clone, Default)]
pub struct VectorDataset {
    crs: CRS,
    fields: Vec<FieldDef>,
    features: Vec<Feature>,
    name: String,
}

impl VectorDataset {
    pub fn new(crs: CRS) -> Self {
        Self {
            crs,
            ..Default::default()
        }
    }

    /// Empty dataset with a fixed schema
    pub fn with_fields(crs: CRS, fields: Vec<FieldDef>) -> Self {
        Self {
            crs,
            fields,
            ..Default::default()
        }
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    pub fn set_crs(&mut self, crs: CRS) {
        self.crs = crs;
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Add a column; an existing column of the same name is widened instead
    pub fn add_field(&mut self, field: FieldDef) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => existing.kind = existing.kind.widen(field.kind),
            None => self.fields.push(field),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut [Feature] {
        &mut self.features
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }
}

impl IntoIterator for VectorDataset {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}
