//! YAML parsing for ConfigMap payloads
//!
//! ConfigMap values such as the `visibility` block of `config-contour` are
//! YAML documents embedded in a string. They are parsed with yaml-rust2 and
//! converted to `serde_json::Value` so typed deserialization goes through
//! serde_json like everything else.

use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use yaml_rust2::{Yaml, YamlLoader};

/// A YAML document that could not be parsed or converted
#[derive(Clone, Debug, Error)]
#[error("{0}")]
pub struct YamlError(String);

/// Parse a YAML string into a serde_json::Value.
///
/// Only the first document is read. Empty input yields `Value::Null`.
pub fn parse_yaml(input: &str) -> Result<Value, YamlError> {
    let mut docs = YamlLoader::load_from_str(input).map_err(|e| YamlError(e.to_string()))?;
    if docs.is_empty() {
        return Ok(Value::Null);
    }
    to_json(docs.swap_remove(0))
}

/// Parse a YAML string straight into a typed value.
pub fn from_yaml<T: DeserializeOwned>(input: &str) -> Result<T, YamlError> {
    serde_json::from_value(parse_yaml(input)?).map_err(|e| YamlError(e.to_string()))
}

fn to_json(node: Yaml) -> Result<Value, YamlError> {
    let value = match node {
        Yaml::Null => Value::Null,
        Yaml::Boolean(b) => b.into(),
        Yaml::Integer(i) => i.into(),
        Yaml::String(s) => s.into(),
        Yaml::Real(raw) => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| YamlError(format!("invalid number {:?}", raw)))?,
        Yaml::Array(items) => Value::Array(
            items
                .into_iter()
                .map(to_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Hash(entries) => {
            let mut object = Map::with_capacity(entries.len());
            for (key, val) in entries {
                object.insert(key_string(key)?, to_json(val)?);
            }
            Value::Object(object)
        }
        Yaml::Alias(_) | Yaml::BadValue => {
            return Err(YamlError("aliases and malformed values are not supported".to_string()))
        }
    };
    Ok(value)
}

/// Object keys must be scalars; numbers and booleans are stringified.
fn key_string(key: Yaml) -> Result<String, YamlError> {
    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        other => Err(YamlError(format!("unsupported mapping key {:?}", other))),
    }
}
