//! Vector tables: features with optional geometry and an attribute map.

use crate::geometry::Geometry;
use crate::period::PeriodLabel;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One row of a vector table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl Feature {
    pub fn new(geometry: Option<Geometry>) -> Self {
        Self {
            geometry,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// String value of an attribute; numeric codes are rendered as text.
    pub fn get_str(&self, name: &str) -> Option<String> {
        match self.properties.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }
}

/// An ordered collection of features.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn first(&self) -> Option<&Feature> {
        self.features.first()
    }

    /// First feature whose `attribute` equals `code`.
    pub fn find_by(&self, attribute: &str, code: &str) -> Option<&Feature> {
        self.features
            .iter()
            .find(|f| f.get_str(attribute).as_deref() == Some(code))
    }

    /// Keep only features whose `attribute` is in `codes`, preserving order.
    pub fn filter_codes(&self, attribute: &str, codes: &[String]) -> FeatureCollection {
        let features = self
            .features
            .iter()
            .filter(|f| {
                f.get_str(attribute)
                    .map(|c| codes.iter().any(|allowed| *allowed == c))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        FeatureCollection { features }
    }

    /// Period columns present on the first row, in attribute order.
    pub fn period_columns(&self) -> Vec<String> {
        self.first()
            .map(|f| {
                f.properties
                    .keys()
                    .filter(|k| PeriodLabel::looks_like_label(k))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when every row carries the same set of period columns.
    pub fn has_uniform_period_columns(&self) -> bool {
        let reference = self.period_columns();
        self.features.iter().all(|f| {
            let cols: Vec<&String> = f
                .properties
                .keys()
                .filter(|k| PeriodLabel::looks_like_label(k))
                .collect();
            cols.len() == reference.len() && cols.iter().zip(&reference).all(|(a, b)| *a == b)
        })
    }
}
