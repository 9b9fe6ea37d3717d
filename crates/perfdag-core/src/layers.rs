//! Layered configuration resolution.
//!
//! Every mapping handed to a unit (task configuration, shell environment)
//! is built from an ordered list of named layers. Later layers override
//! earlier ones key by key; keys are never removed and values are not
//! validated here. A missing required key surfaces as
//! [`Error::MissingKey`] where it is read.

use crate::spec::scalar_to_string;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Resolved shell environment of a unit.
pub type EnvMap = BTreeMap<String, String>;

/// One named configuration source.
#[derive(Debug, Clone)]
pub struct Layer<V> {
    pub name: String,
    pub values: BTreeMap<String, V>,
}

impl<V> Layer<V> {
    pub fn new<K, I>(name: impl Into<String>, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Ordered layers, lowest priority first.
#[derive(Debug, Clone)]
pub struct Layers<V> {
    layers: Vec<Layer<V>>,
}

impl<V> Default for Layers<V> {
    fn default() -> Self {
        Self { layers: Vec::new() }
    }
}

impl<V: Clone> Layers<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer that overrides everything pushed so far.
    pub fn layer<K, I>(mut self, name: impl Into<String>, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.layers.push(Layer::new(name, values));
        self
    }

    pub fn push(&mut self, layer: Layer<V>) {
        self.layers.push(layer);
    }

    pub fn resolve(&self) -> BTreeMap<String, V> {
        resolve(&self.layers)
    }
}

/// Merge `layers` in order; the last layer defining a key wins.
pub fn resolve<V: Clone>(layers: &[Layer<V>]) -> BTreeMap<String, V> {
    let mut merged = BTreeMap::new();
    for layer in layers {
        let mut overridden = 0usize;
        for (key, value) in &layer.values {
            if merged.insert(key.clone(), value.clone()).is_some() {
                overridden += 1;
            }
        }
        debug!(
            layer = %layer.name,
            keys = layer.values.len(),
            overridden,
            "Applied configuration layer"
        );
    }
    merged
}

/// Resolved task configuration with typed accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMap {
    name: String,
    values: BTreeMap<String, Value>,
}

impl ConfigMap {
    pub fn new(name: impl Into<String>, values: BTreeMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Resolve `layers` into a configuration called `name`.
    pub fn from_layers(name: impl Into<String>, layers: &Layers<Value>) -> Self {
        Self::new(name, layers.resolve())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn require(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| Error::missing(&self.name, key))
    }

    /// Required scalar, rendered as a string.
    pub fn require_str(&self, key: &str) -> Result<String> {
        match self.require(key)? {
            Value::Array(_) | Value::Object(_) => Err(Error::InvalidValue {
                key: key.to_string(),
                reason: "expected a scalar".to_string(),
            }),
            value => Ok(scalar_to_string(value.clone())),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn into_values(self) -> BTreeMap<String, Value> {
        self.values
    }

    /// Sorted keys, four-space indentation.
    pub fn to_json_pretty(&self) -> Result<String> {
        use serde::Serialize;

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.values.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(|e| Error::Serialization(e.to_string()))
    }
}
