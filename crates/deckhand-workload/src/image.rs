//! Image resolution
//!
//! `image` is the concern that declares the containers. A string declares the
//! single implicit container; a map declares one container per key.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{ResolveError, Result};
use crate::names::validate_dns_label;
use crate::raw::{join, kind_of};
use crate::shape::ContainerSet;

/// Characters rejected in image references
const SHELL_METACHARS: &[char] = &['`', '|', ';', '&', '$', '>', '<', '(', ')', '{', '}'];

/// Resolve `image` into per-container images and the declared container set.
pub(crate) fn resolve_images(
    raw: &Value,
    implicit_container: &str,
) -> Result<(BTreeMap<String, String>, ContainerSet)> {
    match raw {
        Value::Null => Err(ResolveError::MissingImage),
        Value::String(image) => {
            validate_dns_label("container name", implicit_container)?;
            let image = unquote(image);
            if image.is_empty() {
                return Err(ResolveError::MissingImage);
            }
            validate_image(image, implicit_container)?;
            let images = BTreeMap::from([(implicit_container.to_string(), image.to_string())]);
            Ok((images, ContainerSet::implicit(implicit_container)))
        }
        Value::Object(map) => {
            if map.is_empty() {
                return Err(ResolveError::MissingImage);
            }
            let mut images = BTreeMap::new();
            for (container, value) in map {
                validate_dns_label("container name", container)?;
                let image = value.as_str().map(unquote).ok_or_else(|| {
                    ResolveError::invalid_value(
                        join("image", container),
                        format!("expected a string, found {}", kind_of(value)),
                    )
                })?;
                validate_image(image, container)?;
                images.insert(container.clone(), image.to_string());
            }
            let containers = ContainerSet::keyed(images.keys().cloned());
            Ok((images, containers))
        }
        other => Err(ResolveError::invalid_value(
            "image",
            format!("expected a string or an object, found {}", kind_of(other)),
        )),
    }
}

/// Strip one level of literal double quotes, as left by Terraform CLI string vars
fn unquote(image: &str) -> &str {
    image
        .trim()
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or_else(|| image.trim())
}

/// Validate an image reference.
///
/// Accepts standard references (`nginx:latest`, `gcr.io/p/img@sha256:...`).
pub(crate) fn validate_image(image: &str, container: &str) -> Result<()> {
    if image.is_empty() {
        return Err(ResolveError::invalid_image(container, "image cannot be empty"));
    }

    if image.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ResolveError::invalid_image(
            container,
            format!("image '{}' contains invalid characters", image),
        ));
    }

    if image.chars().any(|c| SHELL_METACHARS.contains(&c)) {
        return Err(ResolveError::invalid_image(
            container,
            format!("image '{}' contains shell metacharacters", image),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_image_declares_implicit_container() {
        let raw = json!("training/webapp:latest");
        let (images, containers) = resolve_images(&raw, "main").unwrap();
        assert_eq!(images["main"], "training/webapp:latest");
        assert_eq!(containers.implicit_name(), Some("main"));
    }

    #[test]
    fn quoted_flat_image_is_unquoted() {
        let (images, _) = resolve_images(&json!("\"training/webapp:latest\""), "main").unwrap();
        assert_eq!(images["main"], "training/webapp:latest");
    }

    #[test]
    fn keyed_image_declares_each_container() {
        let raw = json!({
            "test-container": "training/webapp:latest",
            "test-container-2": "nginxdemos/hello",
        });
        let (images, containers) = resolve_images(&raw, "main").unwrap();
        assert_eq!(images.len(), 2);
        assert!(containers.contains("test-container-2"));
        assert!(!containers.contains("main"));
        assert_eq!(containers.implicit_name(), None);
    }

    #[test]
    fn missing_image() {
        assert_eq!(resolve_images(&Value::Null, "main").unwrap_err(), ResolveError::MissingImage);
        assert_eq!(resolve_images(&json!({}), "main").unwrap_err(), ResolveError::MissingImage);
        assert_eq!(resolve_images(&json!("\"\""), "main").unwrap_err(), ResolveError::MissingImage);
    }

    #[test]
    fn keyed_image_must_be_strings() {
        let err = resolve_images(&json!({ "web": 3 }), "main").unwrap_err();
        assert_eq!(
            err,
            ResolveError::invalid_value("image.web", "expected a string, found number")
        );
    }

    #[test]
    fn invalid_container_name() {
        let err = resolve_images(&json!({ "Web_App": "nginx" }), "main").unwrap_err();
        assert!(matches!(err, ResolveError::InvalidName { .. }));
    }

    #[test]
    fn valid_images() {
        assert!(validate_image("nginx:latest", "main").is_ok());
        assert!(validate_image("registry.example.com/app:v1.2.3", "main").is_ok());
        assert!(validate_image("gcr.io/project/image@sha256:abc123", "main").is_ok());
    }

    #[test]
    fn invalid_images() {
        assert!(validate_image("nginx latest", "main").is_err());
        assert!(validate_image("$(evil)", "main").is_err());
        assert!(validate_image("`whoami`", "main").is_err());
        assert!(validate_image("img|cat", "main").is_err());
    }
}
