//! WorkloadResolver: composes the concern resolvers into one `WorkloadSpec`
//!
//! Concerns are resolved in a fixed order so that a malformed input always
//! reports the same first error:
//! image → ports → probes → env → volumes → autoscaling.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::{debug, info_span};

use crate::autoscaling::resolve_autoscaling;
use crate::config::ResolverConfig;
use crate::env::resolve_env;
use crate::error::{ResolveError, Result};
use crate::image::resolve_images;
use crate::names::validate_dns_label;
use crate::ports::resolve_container_ports;
use crate::probes::{resolve_probe, ProbeCategory};
use crate::raw::RawConfig;
use crate::shape::{normalize, Concern, ContainerSet};
use crate::spec::{
    ContainerSpec, EnvBinding, PortDescriptor, ProbeDescriptor, VolumeBinding, WorkloadSpec,
};
use crate::volumes::resolve_volumes;

/// Resolves raw workload variables into a [`WorkloadSpec`].
///
/// ```rust,ignore
/// let spec = WorkloadResolver::new("test-name", "default")
///     .with_implicit_container("app")
///     .resolve(&raw)?;
/// ```
#[derive(Clone, Debug)]
pub struct WorkloadResolver<'a> {
    name: &'a str,
    namespace: &'a str,
    config: ResolverConfig,
}

/// Per-container output of one concern
type PerContainer<T> = BTreeMap<String, T>;

impl<'a> WorkloadResolver<'a> {
    /// Create a resolver for the named workload with the default configuration.
    pub fn new(name: &'a str, namespace: &'a str) -> Self {
        Self {
            name,
            namespace,
            config: ResolverConfig::default(),
        }
    }

    /// Replace the resolver configuration.
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the sentinel container name used for flat-shaped variables.
    pub fn with_implicit_container(mut self, name: impl Into<String>) -> Self {
        self.config.implicit_container = name.into();
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve the variables, failing with the first validation error.
    pub fn resolve(&self, raw: &RawConfig) -> Result<WorkloadSpec> {
        let span = info_span!("resolve_workload", name = %self.name, namespace = %self.namespace);
        let _guard = span.enter();

        raw.warn_unknown_variables();
        validate_dns_label("name", self.name)?;
        validate_dns_label("namespace", self.namespace)?;

        let (images, containers) = resolve_images(&raw.image, &self.config.implicit_container)?;
        debug!(containers = containers.len(), "declared containers");

        let mut ports = self.resolve_ports(&raw.ports, &containers)?;

        let mut probes: Vec<(ProbeCategory, PerContainer<ProbeDescriptor>)> = Vec::new();
        for category in ProbeCategory::ALL {
            let raw_probes = match category {
                ProbeCategory::Readiness => &raw.readiness_probes,
                ProbeCategory::Liveness => &raw.liveness_probes,
                ProbeCategory::Startup => &raw.startup_probes,
            };
            probes.push((category, resolve_probes(category, raw_probes, &containers)?));
        }

        let mut env = resolve_env_bindings(raw, &containers)?;
        let mut volumes = resolve_volume_bindings(raw, &containers)?;
        let autoscaling = resolve_autoscaling(&raw.hpa, &self.config)?;

        let mut resolved = BTreeMap::new();
        for (container, image) in images {
            let mut spec = ContainerSpec::new(image);
            spec.ports = ports.remove(&container).unwrap_or_default();
            for (category, by_container) in probes.iter_mut() {
                let probe = by_container.remove(&container);
                match category {
                    ProbeCategory::Readiness => spec.readiness_probe = probe,
                    ProbeCategory::Liveness => spec.liveness_probe = probe,
                    ProbeCategory::Startup => spec.startup_probe = probe,
                }
            }
            spec.env = env.remove(&container).unwrap_or_default();
            spec.volumes = volumes.remove(&container).unwrap_or_default();
            resolved.insert(container, spec);
        }

        // Whatever is left names a container that `image` never declared.
        ensure_consumed(Concern::Ports, &ports)?;
        for (category, by_container) in &probes {
            ensure_consumed(category.concern(), by_container)?;
        }
        ensure_consumed(Concern::EnvironmentVariables, &env)?;
        ensure_consumed(Concern::VolumesFromConfigMap, &volumes)?;

        let spec = WorkloadSpec {
            name: self.name.to_string(),
            namespace: self.namespace.to_string(),
            containers: resolved,
            autoscaling,
        };

        debug!(
            containers = spec.containers.len(),
            ports = spec.ports().count(),
            routes = spec.ingress_routes().count(),
            autoscaling = spec.autoscaling.enabled,
            "resolved workload"
        );
        Ok(spec)
    }

    fn resolve_ports(
        &self,
        raw: &Value,
        containers: &ContainerSet,
    ) -> Result<PerContainer<Vec<PortDescriptor>>> {
        normalize(Concern::Ports, raw, containers)?
            .into_iter()
            .map(|(container, value)| {
                let ports = resolve_container_ports(&container, value, &self.config)?;
                Ok((container, ports))
            })
            .collect()
    }
}

fn resolve_probes(
    category: ProbeCategory,
    raw: &Value,
    containers: &ContainerSet,
) -> Result<PerContainer<ProbeDescriptor>> {
    normalize(category.concern(), raw, containers)?
        .into_iter()
        .map(|(container, value)| {
            let probe = resolve_probe(&container, category, value)?;
            Ok((container, probe))
        })
        .collect()
}

fn resolve_env_bindings(
    raw: &RawConfig,
    containers: &ContainerSet,
) -> Result<PerContainer<Vec<EnvBinding>>> {
    let literals = normalize(
        Concern::EnvironmentVariables,
        &raw.environment_variables,
        containers,
    )?;
    let secrets = normalize(
        Concern::EnvironmentVariablesFromSecret,
        &raw.environment_variables_from_secret,
        containers,
    )?;

    union_keys(&literals, &secrets)
        .into_iter()
        .map(|container| {
            let bindings = resolve_env(
                container,
                literals.get(container).copied(),
                secrets.get(container).copied(),
            )?;
            Ok((container.to_string(), bindings))
        })
        .collect()
}

fn resolve_volume_bindings(
    raw: &RawConfig,
    containers: &ContainerSet,
) -> Result<PerContainer<Vec<VolumeBinding>>> {
    let config_maps = normalize(
        Concern::VolumesFromConfigMap,
        &raw.volumes_mounts_from_config_map,
        containers,
    )?;
    let secrets = normalize(
        Concern::VolumesFromSecret,
        &raw.volumes_mounts_from_secret,
        containers,
    )?;

    union_keys(&config_maps, &secrets)
        .into_iter()
        .map(|container| {
            let bindings = resolve_volumes(
                container,
                config_maps.get(container).copied(),
                secrets.get(container).copied(),
            )?;
            Ok((container.to_string(), bindings))
        })
        .collect()
}

fn union_keys<'m, A, B>(
    a: &'m BTreeMap<String, A>,
    b: &'m BTreeMap<String, B>,
) -> BTreeSet<&'m str> {
    a.keys().chain(b.keys()).map(String::as_str).collect()
}

fn ensure_consumed<T>(concern: Concern, leftover: &PerContainer<T>) -> Result<()> {
    match leftover.keys().next() {
        Some(container) => Err(ResolveError::unknown_container(concern, container)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ProbeHandler, Protocol};
    use serde_json::json;

    fn raw(value: Value) -> RawConfig {
        RawConfig::from_value(value).unwrap()
    }

    fn resolve(value: Value) -> Result<WorkloadSpec> {
        WorkloadResolver::new("test-name", "default").resolve(&raw(value))
    }

    #[test]
    fn flat_variables_resolve_to_implicit_container() {
        let spec = resolve(json!({
            "image": "training/webapp:latest",
            "ports": { "5000": { "protocol": "TCP" } },
            "readiness_probes": { "type": "tcp_socket", "tcp_socket": { "port": 5000 } },
            "environment_variables": { "SUPER_VARIABLE": "super-value" },
        }))
        .unwrap();

        assert_eq!(spec.containers.len(), 1);
        let main = spec.container("main").unwrap();
        assert_eq!(main.image, "training/webapp:latest");
        assert_eq!(main.port(5000).unwrap().protocol, Protocol::Tcp);
        assert_eq!(
            main.readiness_probe.as_ref().map(|p| &p.handler),
            Some(&ProbeHandler::TcpSocket { port: 5000 })
        );
        assert!(main.liveness_probe.is_none());
        assert!(main.env_var("SUPER_VARIABLE").is_some());
    }

    #[test]
    fn keyed_variables_resolve_per_container() {
        let spec = resolve(json!({
            "image": {
                "test-container": "training/webapp:latest",
                "test-container-2": "nginxdemos/hello",
            },
            "ports": {
                "test-container": { "5000": {} },
                "test-container-2": { "5000": {}, "80": {} },
            },
        }))
        .unwrap();

        assert_eq!(spec.container("test-container").unwrap().ports.len(), 1);
        assert_eq!(spec.container("test-container-2").unwrap().ports.len(), 2);
        assert_eq!(spec.ports().count(), 3);
    }

    #[test]
    fn single_keyed_container_accepts_flat_values() {
        let spec = resolve(json!({
            "image": { "web": "nginx" },
            "ports": { "8080": {} },
        }))
        .unwrap();
        assert!(spec.container("web").unwrap().port(8080).is_some());
    }

    #[test]
    fn undeclared_container_fails() {
        let err = resolve(json!({
            "image": { "test-container": "nginx", "test-container-2": "nginx" },
            "environment_variables": {
                "test-container": { "A": "1" },
                "ghost": { "B": "2" },
            },
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ResolveError::unknown_container(Concern::EnvironmentVariables, "ghost")
        );
    }

    #[test]
    fn first_error_follows_concern_order() {
        // Both ports and hpa are invalid; ports is resolved first.
        let err = resolve(json!({
            "image": "nginx",
            "ports": { "99999": {} },
            "hpa": { "enabled": true, "min_replicas": 3, "max_replicas": 2 },
        }))
        .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidPort { .. }));
    }

    #[test]
    fn probes_resolve_before_env() {
        let err = resolve(json!({
            "image": "nginx",
            "liveness_probes": { "type": "grpc" },
            "environment_variables": { "": "x" },
        }))
        .unwrap_err();
        assert!(matches!(err, ResolveError::UnknownProbeType { .. }));
    }

    #[test]
    fn invalid_workload_name_fails() {
        let err = WorkloadResolver::new("Test_Name", "default")
            .resolve(&raw(json!({ "image": "nginx" })))
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidName { .. }));
    }

    #[test]
    fn unknown_variables_do_not_fail() {
        let spec = resolve(json!({ "image": "nginx", "replicas": 3 })).unwrap();
        assert_eq!(spec.containers.len(), 1);
    }

    #[test]
    fn missing_image_fails() {
        assert_eq!(resolve(json!({})).unwrap_err(), ResolveError::MissingImage);
    }

    #[test]
    fn implicit_container_is_configurable() {
        let spec = WorkloadResolver::new("test-name", "default")
            .with_implicit_container("app")
            .resolve(&raw(json!({ "image": "nginx" })))
            .unwrap();
        assert!(spec.container("app").is_some());
        assert!(spec.container("main").is_none());
    }

    #[test]
    fn identity_is_carried() {
        let spec = resolve(json!({ "image": "nginx" })).unwrap();
        assert_eq!(spec.name, "test-name");
        assert_eq!(spec.namespace, "default");
        assert!(!spec.autoscaling.enabled);
    }

    #[test]
    fn leftover_entries_are_reported() {
        let mut leftover: PerContainer<Vec<PortDescriptor>> = BTreeMap::new();
        leftover.insert("ghost".to_string(), Vec::new());
        assert_eq!(
            ensure_consumed(Concern::Ports, &leftover).unwrap_err(),
            ResolveError::unknown_container(Concern::Ports, "ghost")
        );
    }
}
