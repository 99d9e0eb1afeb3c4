//! Typed configuration schemas for providers.
//!
//! Every provider registration carries a [`ConfigSchema`] describing the
//! configuration it accepts. The schema is used twice: once to validate a
//! caller's config before any instantiation is attempted (fail fast), and
//! once to normalize the config into a canonical form so that equivalent
//! configs map to the same factory cache key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{RegistryError, Result};

/// The JSON type a property must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl PropertyKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            PropertyKind::String => value.is_string(),
            PropertyKind::Integer => value.is_i64() || value.is_u64(),
            PropertyKind::Number => value.is_number(),
            PropertyKind::Boolean => value.is_boolean(),
            PropertyKind::Array => value.is_array(),
            PropertyKind::Object => value.is_object(),
        }
    }
}

/// A single property in a configuration schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PropertyKind,
    #[serde(default)]
    pub required: bool,
    /// Default used when the property is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Closed set of allowed values.
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    /// Lower bound for numeric properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound for numeric properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PropertySpec {
    /// A required property of the given kind.
    pub fn required(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
            allowed: None,
            min: None,
            max: None,
            description: None,
        }
    }

    /// An optional property with a default value.
    pub fn optional(name: impl Into<String>, kind: PropertyKind, default: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: Some(default),
            allowed: None,
            min: None,
            max: None,
            description: None,
        }
    }

    fn check(&self, value: &Value) -> Result<()> {
        if !self.kind.matches(value) {
            return Err(RegistryError::ConfigValidation(format!(
                "property '{}' has wrong type (expected {:?})",
                self.name, self.kind
            )));
        }

        if let Some(allowed) = &self.allowed {
            if !allowed.contains(value) {
                return Err(RegistryError::ConfigValidation(format!(
                    "property '{}' value {} not in allowed set",
                    self.name, value
                )));
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.min {
                if n < min {
                    return Err(RegistryError::ConfigValidation(format!(
                        "property '{}' value {} below minimum {}",
                        self.name, n, min
                    )));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    return Err(RegistryError::ConfigValidation(format!(
                        "property '{}' value {} above maximum {}",
                        self.name, n, max
                    )));
                }
            }
        }

        Ok(())
    }
}

/// A configuration schema: an ordered list of typed properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSchema {
    #[serde(default)]
    pub properties: Vec<PropertySpec>,
}

impl ConfigSchema {
    /// An empty schema that accepts any configuration.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Schema from a list of properties.
    pub fn new(properties: Vec<PropertySpec>) -> Self {
        Self { properties }
    }

    fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Validate a configuration against this schema.
    ///
    /// Checks that every required property is present (or has a default)
    /// and that present values satisfy type, enum, and range constraints.
    /// Unknown keys are allowed and passed through untouched.
    pub fn validate(&self, config: &Map<String, Value>) -> Result<()> {
        for spec in &self.properties {
            match config.get(&spec.name) {
                Some(value) => spec.check(value)?,
                None => {
                    if spec.required && spec.default.is_none() {
                        return Err(RegistryError::ConfigValidation(format!(
                            "missing required property '{}'",
                            spec.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Validate and normalize a configuration.
    ///
    /// Fills in schema defaults for absent properties and returns the
    /// resulting map. The returned map, canonicalized, is what the provider
    /// constructor receives and what the factory cache key is derived from.
    pub fn normalize(&self, config: &Map<String, Value>) -> Result<Map<String, Value>> {
        self.validate(config)?;

        let mut normalized = config.clone();
        for spec in &self.properties {
            if !normalized.contains_key(&spec.name) {
                if let Some(default) = &spec.default {
                    normalized.insert(spec.name.clone(), default.clone());
                }
            }
        }
        Ok(normalized)
    }
}

/// Rebuild a JSON value with all object keys sorted, recursively.
fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonical_value(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        other => other.clone(),
    }
}

/// Canonical string form of a configuration (sorted keys, compact JSON).
pub fn canonical_config(config: &Map<String, Value>) -> String {
    canonical_value(&Value::Object(config.clone())).to_string()
}

/// Stable fingerprint of a normalized configuration, for cache keys.
pub fn config_fingerprint(config: &Map<String, Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_config(config).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn sample_schema() -> ConfigSchema {
        ConfigSchema::new(vec![
            PropertySpec::required("token", PropertyKind::String),
            PropertySpec::optional("temperature", PropertyKind::Number, json!(0.7)),
            PropertySpec {
                name: "mode".into(),
                kind: PropertyKind::String,
                required: false,
                default: Some(json!("fast")),
                allowed: Some(vec![json!("fast"), json!("thorough")]),
                min: None,
                max: None,
                description: None,
            },
            PropertySpec {
                name: "retries".into(),
                kind: PropertyKind::Integer,
                required: false,
                default: None,
                allowed: None,
                min: Some(0.0),
                max: Some(5.0),
                description: None,
            },
        ])
    }

    #[test]
    fn test_missing_required_fails() {
        let schema = sample_schema();
        let err = schema.validate(&as_map(json!({}))).unwrap_err();
        assert!(matches!(err, RegistryError::ConfigValidation(_)));
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_wrong_type_fails() {
        let schema = sample_schema();
        let err = schema.validate(&as_map(json!({"token": 42}))).unwrap_err();
        assert!(err.to_string().contains("wrong type"));
    }

    #[test]
    fn test_enum_constraint() {
        let schema = sample_schema();
        let err = schema
            .validate(&as_map(json!({"token": "abc", "mode": "sloppy"})))
            .unwrap_err();
        assert!(err.to_string().contains("allowed set"));

        schema
            .validate(&as_map(json!({"token": "abc", "mode": "thorough"})))
            .unwrap();
    }

    #[test]
    fn test_range_constraints() {
        let schema = sample_schema();
        assert!(schema
            .validate(&as_map(json!({"token": "abc", "retries": 9})))
            .is_err());
        assert!(schema
            .validate(&as_map(json!({"token": "abc", "retries": 3})))
            .is_ok());
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let schema = sample_schema();
        let normalized = schema.normalize(&as_map(json!({"token": "abc"}))).unwrap();
        assert_eq!(normalized["temperature"], json!(0.7));
        assert_eq!(normalized["mode"], json!("fast"));
        assert_eq!(normalized["token"], json!("abc"));
        // No default for retries, stays absent
        assert!(!normalized.contains_key("retries"));
    }

    #[test]
    fn test_canonical_config_sorts_keys() {
        let a = as_map(json!({"b": 1, "a": {"y": 2, "x": 1}}));
        let b = as_map(json!({"a": {"x": 1, "y": 2}, "b": 1}));
        assert_eq!(canonical_config(&a), canonical_config(&b));
        assert_eq!(canonical_config(&a), r#"{"a":{"x":1,"y":2},"b":1}"#);
    }

    #[test]
    fn test_fingerprint_stable_under_key_order() {
        let a = as_map(json!({"token": "abc", "mode": "fast"}));
        let b = as_map(json!({"mode": "fast", "token": "abc"}));
        assert_eq!(config_fingerprint(&a), config_fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_differs_for_different_configs() {
        let a = as_map(json!({"token": "abc"}));
        let b = as_map(json!({"token": "def"}));
        assert_ne!(config_fingerprint(&a), config_fingerprint(&b));
    }

    #[test]
    fn test_empty_schema_accepts_anything() {
        let schema = ConfigSchema::empty();
        schema
            .validate(&as_map(json!({"whatever": [1, 2, 3]})))
            .unwrap();
    }

    #[test]
    fn test_schema_deserializes_from_manifest_form() {
        let schema: ConfigSchema = serde_json::from_value(json!({
            "properties": [
                {"name": "token", "type": "string", "required": true},
                {"name": "depth", "type": "integer", "min": 1, "max": 10, "default": 3}
            ]
        }))
        .unwrap();
        assert_eq!(schema.properties.len(), 2);
        assert_eq!(schema.properties[1].default, Some(json!(3)));
    }
}
