//! Volume binding resolution
//!
//! ConfigMap- and Secret-sourced mounts are keyed by source name:
//! `test-configmap = { mount_path = "/data/myconfigmap", sub_path = "" }`.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::raw::{as_object, coerce_bool, coerce_string, field, join, warn_unknown_keys};
use crate::shape::Concern;
use crate::spec::{VolumeBinding, VolumeSource};

const MOUNT_KEYS: &[&str] = &["mount_path", "sub_path", "read_only"];

/// Resolve one container's ConfigMap and Secret mounts.
///
/// ConfigMap bindings come first, then Secret bindings, each in source order.
pub(crate) fn resolve_volumes(
    container: &str,
    config_maps: Option<&Value>,
    secrets: Option<&Value>,
) -> Result<Vec<VolumeBinding>> {
    let mut mount_paths: BTreeSet<String> = BTreeSet::new();
    let mut bindings = Vec::new();

    let sources = [
        (VolumeSource::ConfigMap, Concern::VolumesFromConfigMap, config_maps),
        (VolumeSource::Secret, Concern::VolumesFromSecret, secrets),
    ];

    for (source, concern, raw) in sources {
        let Some(raw) = raw else { continue };
        let path = join(concern.as_str(), container);
        for (source_name, mount) in as_object(raw, &path)? {
            let binding = resolve_mount(source, source_name, mount, &join(&path, source_name))?;
            if !mount_paths.insert(binding.mount_path.clone()) {
                return Err(ResolveError::DuplicateMountPath {
                    container: container.to_string(),
                    mount_path: binding.mount_path,
                });
            }
            bindings.push(binding);
        }
    }

    debug!(container = %container, count = bindings.len(), "resolved volume mounts");
    Ok(bindings)
}

fn resolve_mount(
    source: VolumeSource,
    source_name: &str,
    raw: &Value,
    path: &str,
) -> Result<VolumeBinding> {
    if source_name.is_empty() {
        return Err(ResolveError::invalid_value(path, "source name cannot be empty"));
    }

    let mount = as_object(raw, path)?;
    warn_unknown_keys(mount, MOUNT_KEYS, path);

    let mount_path = field(mount, "mount_path")
        .map(|v| coerce_string(v, &join(path, "mount_path")))
        .transpose()?
        .ok_or_else(|| ResolveError::invalid_value(join(path, "mount_path"), "field is required"))?;
    if !mount_path.starts_with('/') {
        return Err(ResolveError::invalid_value(
            join(path, "mount_path"),
            format!("mount path '{}' must be absolute", mount_path),
        ));
    }

    let sub_path = field(mount, "sub_path")
        .map(|v| coerce_string(v, &join(path, "sub_path")))
        .transpose()?
        .unwrap_or_default();
    if sub_path.starts_with('/') {
        return Err(ResolveError::invalid_value(
            join(path, "sub_path"),
            format!("sub path '{}' must be relative", sub_path),
        ));
    }

    let read_only = field(mount, "read_only")
        .map(|v| coerce_bool(v, &join(path, "read_only")))
        .transpose()?
        .unwrap_or(false);

    Ok(VolumeBinding {
        source,
        source_name: source_name.to_string(),
        mount_path,
        sub_path,
        read_only,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_map_and_secret_mounts() {
        let config_maps = json!({
            "test-configmap": { "mount_path": "/data/myconfigmap", "sub_path": "" }
        });
        let secrets = json!({
            "test-secret": { "mount_path": "/data/mysecret", "sub_path": "", "read_only": true }
        });
        let volumes = resolve_volumes("web", Some(&config_maps), Some(&secrets)).unwrap();

        assert_eq!(
            volumes,
            vec![
                VolumeBinding {
                    source: VolumeSource::ConfigMap,
                    source_name: "test-configmap".to_string(),
                    mount_path: "/data/myconfigmap".to_string(),
                    sub_path: String::new(),
                    read_only: false,
                },
                VolumeBinding {
                    source: VolumeSource::Secret,
                    source_name: "test-secret".to_string(),
                    mount_path: "/data/mysecret".to_string(),
                    sub_path: String::new(),
                    read_only: true,
                },
            ]
        );
    }

    #[test]
    fn sub_path_is_optional() {
        let secrets = json!({ "tls": { "mount_path": "/etc/tls/tls.crt", "sub_path": "tls.crt" } });
        let volumes = resolve_volumes("web", None, Some(&secrets)).unwrap();
        assert_eq!(volumes[0].sub_path, "tls.crt");

        let secrets = json!({ "tls": { "mount_path": "/etc/tls" } });
        let volumes = resolve_volumes("web", None, Some(&secrets)).unwrap();
        assert_eq!(volumes[0].sub_path, "");
    }

    #[test]
    fn duplicate_mount_path_across_sources_fails() {
        let config_maps = json!({ "app-config": { "mount_path": "/data" } });
        let secrets = json!({ "app-secret": { "mount_path": "/data" } });
        let err = resolve_volumes("web", Some(&config_maps), Some(&secrets)).unwrap_err();
        assert_eq!(
            err,
            ResolveError::DuplicateMountPath {
                container: "web".to_string(),
                mount_path: "/data".to_string(),
            }
        );
    }

    #[test]
    fn same_source_name_in_both_kinds_is_allowed() {
        let config_maps = json!({ "app": { "mount_path": "/config" } });
        let secrets = json!({ "app": { "mount_path": "/secret" } });
        let volumes = resolve_volumes("web", Some(&config_maps), Some(&secrets)).unwrap();
        assert_eq!(volumes[0].volume_name(), "configmap-app");
        assert_eq!(volumes[1].volume_name(), "secret-app");
    }

    #[test]
    fn mount_path_is_required_and_absolute() {
        let missing = json!({ "app": { "sub_path": "" } });
        let err = resolve_volumes("web", Some(&missing), None).unwrap_err();
        assert_eq!(
            err,
            ResolveError::invalid_value(
                "volumes_mounts_from_config_map.web.app.mount_path",
                "field is required"
            )
        );

        let relative = json!({ "app": { "mount_path": "data" } });
        assert!(resolve_volumes("web", Some(&relative), None).is_err());
    }

    #[test]
    fn absolute_sub_path_fails() {
        let raw = json!({ "app": { "mount_path": "/data", "sub_path": "/etc" } });
        assert!(resolve_volumes("web", Some(&raw), None).is_err());
    }
}
