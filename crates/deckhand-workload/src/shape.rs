//! Shape detection and per-container normalization
//!
//! Every per-container concern may be written in one of two shapes:
//!
//! - **Flat**: the value applies to the sole implicit container
//!   (`ports = { "5000" = { protocol = "TCP" } }`)
//! - **Keyed**: the value is nested one level under container names
//!   (`ports = { web = { "5000" = { protocol = "TCP" } } }`)
//!
//! There is no discriminator field. A value is keyed when at least one of its
//! top-level keys is a declared container name, flat otherwise. Once a value
//! is detected as keyed, every top-level key must be a declared container.
//! A container named like a concern field (`protocol`, `type`) therefore
//! switches the value to keyed shape whenever that key is present.
//! A flat `image` string declares no names, so with it every value is flat,
//! even one whose keys include the implicit container's name.
//!
//! After normalization every concern is a `container name -> raw value` map,
//! so the concern resolvers never branch on shape.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ResolveError, Result};

/// One configurable aspect of a workload, named after its input variable
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Concern {
    /// `image`
    Image,
    /// `ports`
    Ports,
    /// `readiness_probes`
    ReadinessProbes,
    /// `liveness_probes`
    LivenessProbes,
    /// `startup_probes`
    StartupProbes,
    /// `environment_variables`
    EnvironmentVariables,
    /// `environment_variables_from_secret`
    EnvironmentVariablesFromSecret,
    /// `volumes_mounts_from_config_map`
    VolumesFromConfigMap,
    /// `volumes_mounts_from_secret`
    VolumesFromSecret,
    /// `hpa`
    Hpa,
}

impl Concern {
    /// Input variable name of the concern
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Ports => "ports",
            Self::ReadinessProbes => "readiness_probes",
            Self::LivenessProbes => "liveness_probes",
            Self::StartupProbes => "startup_probes",
            Self::EnvironmentVariables => "environment_variables",
            Self::EnvironmentVariablesFromSecret => "environment_variables_from_secret",
            Self::VolumesFromConfigMap => "volumes_mounts_from_config_map",
            Self::VolumesFromSecret => "volumes_mounts_from_secret",
            Self::Hpa => "hpa",
        }
    }
}

impl fmt::Display for Concern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detected shape of a concern's raw value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// Applies to the sole implicit container
    Flat,
    /// Nested under declared container names
    Keyed,
}

/// Container names declared by `image`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainerSet {
    names: BTreeSet<String>,
    implicit: Option<String>,
    /// Names were written by the caller (keyed `image`), not substituted
    declared: bool,
}

impl ContainerSet {
    /// Containers declared by a keyed `image` map.
    ///
    /// The implicit container is the sole entry when exactly one is declared.
    pub fn keyed(names: impl IntoIterator<Item = String>) -> Self {
        let names: BTreeSet<String> = names.into_iter().collect();
        let implicit = if names.len() == 1 {
            names.iter().next().cloned()
        } else {
            None
        };
        Self {
            names,
            implicit,
            declared: true,
        }
    }

    /// The single sentinel container declared by a flat `image` string
    pub fn implicit(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            names: BTreeSet::from([name.clone()]),
            implicit: Some(name),
            declared: false,
        }
    }

    /// Whether `name` is a declared container
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Whether the names come from a keyed `image` map.
    ///
    /// A sentinel substituted for a flat `image` string is never matched
    /// against concern keys, so flat values may use it as a key of their own.
    pub fn is_declared(&self) -> bool {
        self.declared
    }

    /// Container that flat-shaped values apply to, if unambiguous
    pub fn implicit_name(&self) -> Option<&str> {
        self.implicit.as_deref()
    }

    /// Declared container names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of declared containers
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no container is declared
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Classify a concern's raw value as flat or keyed.
///
/// Only objects can be keyed, and only against container names the caller
/// declared in a keyed `image`; any other value is flat.
pub fn detect_shape(raw: &Value, containers: &ContainerSet) -> Shape {
    match raw {
        Value::Object(map)
            if containers.is_declared() && map.keys().any(|k| containers.contains(k)) =>
        {
            Shape::Keyed
        }
        _ => Shape::Flat,
    }
}

/// Normalize a concern's raw value into a `container -> value` map.
///
/// `null` and `{}` normalize to an empty map. Flat values are wrapped under
/// the implicit container; when several containers are declared there is no
/// implicit one and a flat object is reported against its first key.
pub fn normalize<'a>(
    concern: Concern,
    raw: &'a Value,
    containers: &ContainerSet,
) -> Result<BTreeMap<String, &'a Value>> {
    let mut normalized = BTreeMap::new();
    if raw.is_null() || raw.as_object().is_some_and(|m| m.is_empty()) {
        return Ok(normalized);
    }

    let shape = detect_shape(raw, containers);
    debug!(concern = %concern, shape = ?shape, "detected concern shape");

    match shape {
        Shape::Flat => {
            let Some(implicit) = containers.implicit_name() else {
                let first_key = raw
                    .as_object()
                    .and_then(|m| m.keys().next())
                    .map(String::as_str)
                    .unwrap_or_default();
                return Err(match raw {
                    Value::Object(_) => ResolveError::unknown_container(concern, first_key),
                    _ => ResolveError::invalid_value(
                        concern.as_str(),
                        "expected an object keyed by container name",
                    ),
                });
            };
            normalized.insert(implicit.to_string(), raw);
        }
        Shape::Keyed => {
            // Keyed detection guarantees an object.
            for (container, value) in raw.as_object().into_iter().flatten() {
                if !containers.contains(container) {
                    return Err(ResolveError::unknown_container(concern, container));
                }
                if !value.is_null() {
                    normalized.insert(container.clone(), value);
                }
            }
        }
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_containers() -> ContainerSet {
        ContainerSet::keyed(["test-container".to_string(), "test-container-2".to_string()])
    }

    #[test]
    fn keyed_when_any_key_is_a_container() {
        let raw = json!({ "test-container": { "5000": {} } });
        assert_eq!(detect_shape(&raw, &two_containers()), Shape::Keyed);
    }

    #[test]
    fn flat_when_no_key_is_a_container() {
        let raw = json!({ "5000": { "protocol": "TCP" } });
        assert_eq!(detect_shape(&raw, &ContainerSet::implicit("main")), Shape::Flat);
        assert_eq!(detect_shape(&json!("nginx"), &two_containers()), Shape::Flat);
    }

    #[test]
    fn container_named_like_a_field_makes_value_keyed() {
        let containers = ContainerSet::keyed(["type".to_string()]);
        let raw = json!({ "type": "tcp_socket", "tcp_socket": { "port": 80 } });
        assert_eq!(detect_shape(&raw, &containers), Shape::Keyed);
        let err = normalize(Concern::ReadinessProbes, &raw, &containers).unwrap_err();
        assert_eq!(
            err,
            ResolveError::unknown_container(Concern::ReadinessProbes, "tcp_socket")
        );
    }

    #[test]
    fn flat_value_wraps_under_implicit_container() {
        let raw = json!({ "5000": { "protocol": "TCP" } });
        let normalized = normalize(Concern::Ports, &raw, &ContainerSet::implicit("main")).unwrap();
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized["main"], &raw);
    }

    #[test]
    fn sentinel_name_is_an_ordinary_key_in_flat_values() {
        let containers = ContainerSet::implicit("main");
        assert!(!containers.is_declared());

        let raw = json!({ "main": "x", "OTHER": "y" });
        assert_eq!(detect_shape(&raw, &containers), Shape::Flat);
        let normalized = normalize(Concern::EnvironmentVariables, &raw, &containers).unwrap();
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized["main"], &raw);
    }

    #[test]
    fn flat_value_applies_to_single_keyed_container() {
        let containers = ContainerSet::keyed(["web".to_string()]);
        let raw = json!({ "SUPER_VARIABLE": "super-value" });
        let normalized = normalize(Concern::EnvironmentVariables, &raw, &containers).unwrap();
        assert_eq!(normalized["web"], &raw);
    }

    #[test]
    fn flat_value_is_ambiguous_with_several_containers() {
        let raw = json!({ "5000": { "protocol": "TCP" } });
        let err = normalize(Concern::Ports, &raw, &two_containers()).unwrap_err();
        assert_eq!(err, ResolveError::unknown_container(Concern::Ports, "5000"));
    }

    #[test]
    fn keyed_value_rejects_undeclared_container() {
        let raw = json!({
            "test-container": { "80": {} },
            "ghost": { "81": {} },
        });
        let err = normalize(Concern::Ports, &raw, &two_containers()).unwrap_err();
        assert_eq!(err, ResolveError::unknown_container(Concern::Ports, "ghost"));
    }

    #[test]
    fn keyed_value_passes_sub_values_through() {
        let raw = json!({
            "test-container": { "5000": {} },
            "test-container-2": null,
        });
        let normalized = normalize(Concern::Ports, &raw, &two_containers()).unwrap();
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized["test-container"], &json!({ "5000": {} }));
    }

    #[test]
    fn absent_and_empty_values_normalize_to_nothing() {
        let containers = two_containers();
        assert!(normalize(Concern::Ports, &Value::Null, &containers).unwrap().is_empty());
        assert!(normalize(Concern::Ports, &json!({}), &containers).unwrap().is_empty());
    }

    #[test]
    fn scalar_without_implicit_container_is_invalid() {
        let err = normalize(Concern::Ports, &json!("5000"), &two_containers()).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidValue { .. }));
    }

    #[test]
    fn keyed_set_with_one_name_is_implicit() {
        let set = ContainerSet::keyed(["only".to_string()]);
        assert_eq!(set.implicit_name(), Some("only"));
        assert_eq!(two_containers().implicit_name(), None);
        assert_eq!(two_containers().len(), 2);
    }
}
