//! Port and ingress resolution
//!
//! A container's port map is keyed by port number as text:
//!
//! ```text
//! "6000" = {
//!   protocol                    = "TCP"
//!   ingress                     = { "foo.example.com" = "/" }
//!   default_ingress_annotations = "traefik"
//!   ingress_annotations         = { "foo.annotations.io" = "bar" }
//!   cert_manager_issuer         = "letsencrypt-prod"
//!   path                        = "/api/v1"
//! }
//! ```
//!
//! Each entry becomes one `PortDescriptor`; each ingress host becomes one
//! `IngressRoute`. Route annotations are layered in a fixed order: default
//! set, then `ingress_annotations` (wins on collision), then the issuer.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ResolverConfig;
use crate::error::{ResolveError, Result};
use crate::names::validate_host;
use crate::raw::{as_object, coerce_string, field, join, kind_of, warn_unknown_keys};
use crate::spec::{IngressRoute, PortDescriptor, Protocol};

const PORT_KEYS: &[&str] = &[
    "protocol",
    "ingress",
    "default_ingress_annotations",
    "ingress_annotations",
    "cert_manager_issuer",
    "path",
];

/// Resolve one container's port map into descriptors sorted by port number.
pub(crate) fn resolve_container_ports(
    container: &str,
    raw: &Value,
    config: &ResolverConfig,
) -> Result<Vec<PortDescriptor>> {
    let path = join("ports", container);
    let entries = as_object(raw, &path)?;

    let mut seen: BTreeSet<u16> = BTreeSet::new();
    let mut ports = Vec::with_capacity(entries.len());

    for (key, entry) in entries {
        let port = parse_port_number(container, key)?;
        if !seen.insert(port) {
            return Err(ResolveError::DuplicatePort {
                container: container.to_string(),
                port,
            });
        }
        ports.push(resolve_port(container, key, port, entry, config)?);
    }

    ports.sort_by_key(|p| p.port);
    debug!(container = %container, count = ports.len(), "resolved ports");
    Ok(ports)
}

/// Parse a port key. Leading zeros are accepted, so `"080"` and `"80"`
/// name the same port.
fn parse_port_number(container: &str, key: &str) -> Result<u16> {
    let number: u64 = key
        .trim()
        .parse()
        .map_err(|_| ResolveError::invalid_port(container, key, "port must be a number"))?;
    match u16::try_from(number) {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ResolveError::invalid_port(
            container,
            key,
            "port must be between 1 and 65535",
        )),
    }
}

fn resolve_port(
    container: &str,
    key: &str,
    port: u16,
    entry: &Value,
    config: &ResolverConfig,
) -> Result<PortDescriptor> {
    let path = join(&join("ports", container), key);

    // `"80" = {}` and `"80" = null` both mean a plain TCP port.
    let empty = Map::new();
    let options = match entry {
        Value::Null => &empty,
        other => as_object(other, &path)?,
    };
    warn_unknown_keys(options, PORT_KEYS, &path);

    let protocol = match field(options, "protocol") {
        None => Protocol::default(),
        Some(value) => {
            let name = coerce_string(value, &join(&path, "protocol"))?;
            Protocol::parse(&name).ok_or_else(|| {
                ResolveError::invalid_port(
                    container,
                    key,
                    format!("unsupported protocol '{}', expected TCP or UDP", name),
                )
            })?
        }
    };

    let ingress = resolve_ingress(options, &path, config)?;

    Ok(PortDescriptor {
        container: container.to_string(),
        port,
        protocol,
        ingress,
    })
}

fn resolve_ingress(
    options: &Map<String, Value>,
    path: &str,
    config: &ResolverConfig,
) -> Result<Vec<IngressRoute>> {
    let Some(raw_hosts) = field(options, "ingress") else {
        let stray: Vec<&str> = PORT_KEYS[2..]
            .iter()
            .copied()
            .filter(|k| field(options, k).is_some())
            .collect();
        if !stray.is_empty() {
            warn!(path = %path, fields = ?stray, "ingress options given without ingress hosts");
        }
        return Ok(Vec::new());
    };

    let hosts = ingress_hosts(raw_hosts, &join(path, "ingress"))?;

    let path_override = field(options, "path")
        .map(|v| coerce_string(v, &join(path, "path")))
        .transpose()?
        .filter(|p| !p.is_empty());

    let certificate_issuer = field(options, "cert_manager_issuer")
        .map(|v| coerce_string(v, &join(path, "cert_manager_issuer")))
        .transpose()?
        .filter(|i| !i.is_empty());

    let annotations = merge_annotations(options, path, certificate_issuer.as_deref(), config)?;

    let mut routes = Vec::with_capacity(hosts.len());
    for (host, host_path) in hosts {
        validate_host(&host)?;
        let route_path = path_override
            .clone()
            .or(host_path.filter(|p| !p.is_empty()))
            .unwrap_or_else(|| config.default_ingress_path.clone());
        if !route_path.starts_with('/') {
            return Err(ResolveError::invalid_value(
                join(&join(path, "ingress"), &host),
                format!("path '{}' must start with '/'", route_path),
            ));
        }
        routes.push(IngressRoute {
            host,
            path: route_path,
            annotations: annotations.clone(),
            certificate_issuer: certificate_issuer.clone(),
        });
    }

    Ok(routes)
}

/// Read ingress hosts from a `host -> path` map, a list of hosts or a single host.
fn ingress_hosts(raw: &Value, path: &str) -> Result<Vec<(String, Option<String>)>> {
    match raw {
        Value::Object(map) => map
            .iter()
            .map(|(host, host_path)| {
                let host_path = match host_path {
                    Value::Null => None,
                    other => Some(coerce_string(other, &join(path, host))?),
                };
                Ok((host.clone(), host_path))
            })
            .collect(),
        Value::Array(items) => {
            let mut seen = BTreeSet::new();
            let mut hosts = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let host = coerce_string(item, &format!("{}[{}]", path, i))?;
                if !seen.insert(host.clone()) {
                    return Err(ResolveError::invalid_value(
                        path,
                        format!("duplicate ingress host '{}'", host),
                    ));
                }
                hosts.push((host, None));
            }
            Ok(hosts)
        }
        Value::String(host) => Ok(vec![(host.clone(), None)]),
        other => Err(ResolveError::invalid_value(
            path,
            format!("expected an object of host to path, found {}", kind_of(other)),
        )),
    }
}

/// Layer route annotations: default set, explicit overlay, then issuer.
fn merge_annotations(
    options: &Map<String, Value>,
    path: &str,
    certificate_issuer: Option<&str>,
    config: &ResolverConfig,
) -> Result<BTreeMap<String, String>> {
    let mut annotations = match field(options, "default_ingress_annotations") {
        None => BTreeMap::new(),
        // A bare string names an ingress class preset.
        Some(Value::String(class)) if class.is_empty() => BTreeMap::new(),
        Some(Value::String(class)) => {
            BTreeMap::from([(config.ingress_class_annotation.clone(), class.clone())])
        }
        Some(other) => string_map(other, &join(path, "default_ingress_annotations"))?,
    };

    if let Some(explicit) = field(options, "ingress_annotations") {
        annotations.extend(string_map(explicit, &join(path, "ingress_annotations"))?);
    }

    if let Some(issuer) = certificate_issuer {
        annotations.insert(config.cert_manager_annotation.clone(), issuer.to_string());
    }

    Ok(annotations)
}

fn string_map(value: &Value, path: &str) -> Result<BTreeMap<String, String>> {
    as_object(value, path)?
        .iter()
        .map(|(k, v)| Ok((k.clone(), coerce_string(v, &join(path, k))?)))
        .collect()
}
