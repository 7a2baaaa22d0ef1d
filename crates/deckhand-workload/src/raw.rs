//! Raw workload variables and the coercion helpers used to read them
//!
//! `RawConfig` mirrors the module's input variables one-to-one. Each concern
//! is kept as an untyped `serde_json::Value` because its shape (flat or keyed
//! by container) is only known once the declared containers are known.
//! A `null` value is treated exactly like an absent one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ResolveError, Result};

/// Untyped workload variables, as supplied by the configuration layer
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct RawConfig {
    /// Workload name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Target namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Image string (flat) or map of container name to image (keyed)
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub image: Value,

    /// Port number to port options, flat or keyed
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub ports: Value,

    /// Readiness probe block, flat or keyed
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub readiness_probes: Value,

    /// Liveness probe block, flat or keyed
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub liveness_probes: Value,

    /// Startup probe block, flat or keyed
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub startup_probes: Value,

    /// Variable name to literal value, flat or keyed
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub environment_variables: Value,

    /// Variable name to `{secret_name, secret_key}`, flat or keyed
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub environment_variables_from_secret: Value,

    /// ConfigMap name to `{mount_path, sub_path}`, flat or keyed
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub volumes_mounts_from_config_map: Value,

    /// Secret name to `{mount_path, sub_path}`, flat or keyed
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub volumes_mounts_from_secret: Value,

    /// Workload-wide autoscaling block
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub hpa: Value,

    /// Variables the resolver does not read
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RawConfig {
    /// Build a `RawConfig` from an arbitrary JSON value (e.g. a tfvars.json document)
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ResolveError::invalid_value("$", e.to_string()))
    }

    /// Log every top-level variable the resolver ignores
    pub fn warn_unknown_variables(&self) {
        for key in self.extra.keys() {
            warn!(key = %key, "ignoring unknown variable");
        }
    }
}

/// Human-readable JSON type name, for error messages
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Append a key to a dotted path
pub(crate) fn join(path: &str, key: &str) -> String {
    format!("{}.{}", path, key)
}

/// Borrow a value as an object, or fail with the value's actual type
pub(crate) fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        ResolveError::invalid_value(path, format!("expected an object, found {}", kind_of(value)))
    })
}

/// Look up a key, treating `null` as absent
pub(crate) fn field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

/// Read a scalar as a string. Numbers and booleans are stringified the way
/// Terraform converts primitive types.
pub(crate) fn coerce_string(value: &Value, path: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ResolveError::invalid_value(
            path,
            format!("expected a string, found {}", kind_of(other)),
        )),
    }
}

/// Read a non-negative integer from a number or a numeric string.
///
/// Returns `None` when the value cannot be interpreted as one; callers map
/// that to the error kind appropriate for their concern.
pub(crate) fn as_uint(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a `u32`, failing with `InvalidValue` otherwise
pub(crate) fn coerce_u32(value: &Value, path: &str) -> Result<u32> {
    as_uint(value)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            ResolveError::invalid_value(
                path,
                format!("expected a non-negative integer, found {}", describe(value)),
            )
        })
}

/// Read a boolean from a bool or a `"true"`/`"false"` string
pub(crate) fn coerce_bool(value: &Value, path: &str) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(ResolveError::invalid_value(
            path,
            format!("expected a boolean, found {}", describe(other)),
        )),
    }
}

/// Short description of a value: scalars verbatim, containers by type
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => kind_of(other).to_string(),
    }
}

/// Log keys that the resolver does not understand. They are ignored, never fatal.
pub(crate) fn warn_unknown_keys(map: &Map<String, Value>, known: &[&str], path: &str) {
    for key in map.keys().filter(|k| !known.contains(&k.as_str())) {
        warn!(path = %path, key = %key, "ignoring unknown key");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_concerns_deserialize_as_absent() {
        let raw = RawConfig::from_value(json!({
            "name": "test-name",
            "image": "nginx",
            "ports": null,
        }))
        .expect("raw config should parse");
        assert_eq!(raw.name.as_deref(), Some("test-name"));
        assert!(raw.ports.is_null());
        assert!(raw.hpa.is_null());
    }

    #[test]
    fn unknown_variables_are_kept_aside() {
        let raw = RawConfig::from_value(json!({
            "image": "nginx",
            "readiness_probe": { "type": "exec" },
        }))
        .unwrap();
        assert_eq!(raw.image, json!("nginx"));
        assert!(raw.readiness_probes.is_null());
        assert_eq!(raw.extra.len(), 1);
        assert!(raw.extra.contains_key("readiness_probe"));
    }

    #[test]
    fn non_string_name_is_rejected() {
        let err = RawConfig::from_value(json!({ "name": 42 })).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidValue { .. }));
    }

    #[test]
    fn coerce_string_stringifies_primitives() {
        assert_eq!(coerce_string(&json!("a"), "p").unwrap(), "a");
        assert_eq!(coerce_string(&json!(8080), "p").unwrap(), "8080");
        assert_eq!(coerce_string(&json!(true), "p").unwrap(), "true");
        assert!(coerce_string(&json!({"a": 1}), "p").is_err());
    }

    #[test]
    fn uint_accepts_numbers_and_numeric_strings() {
        assert_eq!(as_uint(&json!(5000)), Some(5000));
        assert_eq!(as_uint(&json!("5000")), Some(5000));
        assert_eq!(as_uint(&json!(" 42 ")), Some(42));
        assert_eq!(as_uint(&json!(2.0)), Some(2));
        assert_eq!(as_uint(&json!(2.5)), None);
        assert_eq!(as_uint(&json!(-1)), None);
        assert_eq!(as_uint(&json!("http")), None);
    }

    #[test]
    fn coerce_bool_accepts_strings() {
        assert!(coerce_bool(&json!("true"), "hpa.enabled").unwrap());
        assert!(!coerce_bool(&json!(false), "hpa.enabled").unwrap());
        let err = coerce_bool(&json!("yes"), "hpa.enabled").unwrap_err();
        assert_eq!(
            err,
            ResolveError::invalid_value("hpa.enabled", "expected a boolean, found 'yes'")
        );
    }

    #[test]
    fn field_skips_null() {
        let map = json!({ "a": null, "b": 1 });
        let map = map.as_object().unwrap();
        assert!(field(map, "a").is_none());
        assert!(field(map, "b").is_some());
        assert!(field(map, "c").is_none());
    }
}
