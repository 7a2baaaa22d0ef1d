//! Resolution error types
//!
//! Every error is a local validation failure on the caller's variables. Each
//! variant carries enough context (concern, container, offending value) to
//! point at the exact entry that has to be fixed.

use thiserror::Error;

use crate::probes::ProbeCategory;
use crate::shape::Concern;

/// Result type alias for workload resolution
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Errors that can occur while resolving workload variables
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A keyed concern names a container that is not declared in `image`
    #[error("{concern}: unknown container '{container}' (not declared in image)")]
    UnknownContainer {
        /// Concern that referenced the container
        concern: Concern,
        /// The undeclared container name
        container: String,
    },

    /// A port key is not a number in 1..=65535, or its entry is malformed
    #[error("ports.{container}: invalid port '{port}': {reason}")]
    InvalidPort {
        /// Container owning the port
        container: String,
        /// Port key as written by the caller
        port: String,
        /// What is wrong with it
        reason: String,
    },

    /// Two port entries of one container resolve to the same number
    #[error("ports.{container}: duplicate port {port}")]
    DuplicatePort {
        /// Container owning the port
        container: String,
        /// The colliding port number
        port: u16,
    },

    /// A probe `type` names a kind with no implementation
    #[error("{category}_probes.{container}: unknown probe type '{probe_type}'")]
    UnknownProbeType {
        /// Container owning the probe
        container: String,
        /// Readiness, liveness or startup
        category: ProbeCategory,
        /// The unrecognized type
        probe_type: String,
    },

    /// A field required by the probe kind is absent or has the wrong type
    #[error("{category}_probes.{container}: missing or invalid field '{field}': {reason}")]
    MissingProbeField {
        /// Container owning the probe
        container: String,
        /// Readiness, liveness or startup
        category: ProbeCategory,
        /// Dotted field name within the probe block (e.g. `tcp_socket.port`)
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// A literal and a secret-sourced variable share a name
    #[error("environment variable '{name}' is defined more than once for container '{container}'")]
    DuplicateEnvName {
        /// Container owning the variables
        container: String,
        /// The colliding variable name
        name: String,
    },

    /// Two volume bindings of one container share a mount path
    #[error("mount path '{mount_path}' is used more than once in container '{container}'")]
    DuplicateMountPath {
        /// Container owning the mounts
        container: String,
        /// The colliding mount path
        mount_path: String,
    },

    /// Replica bounds are inconsistent
    #[error("hpa: invalid replica bounds: {reason}")]
    InvalidReplicaBounds {
        /// Configured minimum, if any
        min_replicas: Option<u32>,
        /// Configured maximum, if any
        max_replicas: Option<u32>,
        /// What is wrong with them
        reason: String,
    },

    /// A utilization target lies outside (0, 100]
    #[error("hpa.{metric}: utilization target {value} must be between 1 and 100")]
    InvalidUtilizationTarget {
        /// Field name (`target_cpu` or `target_memory`)
        metric: String,
        /// Configured value
        value: u64,
    },

    /// No image was supplied at all
    #[error("image: at least one container image is required")]
    MissingImage,

    /// An image reference is malformed
    #[error("image.{container}: {message}")]
    InvalidImage {
        /// Container the image belongs to
        container: String,
        /// What is wrong with it
        message: String,
    },

    /// A workload, namespace or container name is not a DNS label
    #[error("invalid {field} '{value}': {message}")]
    InvalidName {
        /// Which name (`name`, `namespace`, `container name`)
        field: String,
        /// The rejected value
        value: String,
        /// What is wrong with it
        message: String,
    },

    /// A value has the wrong type or an unusable content
    #[error("{path}: {message}")]
    InvalidValue {
        /// Dotted path to the value (e.g. `ports.web.5000.protocol`)
        path: String,
        /// What is wrong with it
        message: String,
    },
}

impl ResolveError {
    /// Create an unknown container error
    pub fn unknown_container(concern: Concern, container: &str) -> Self {
        Self::UnknownContainer {
            concern,
            container: container.to_string(),
        }
    }

    /// Create an invalid port error
    pub fn invalid_port(container: &str, port: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPort {
            container: container.to_string(),
            port: port.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a missing probe field error
    pub fn missing_probe_field(
        container: &str,
        category: ProbeCategory,
        field: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::MissingProbeField {
            container: container.to_string(),
            category,
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a replica bounds error
    pub fn replica_bounds(
        min_replicas: Option<u32>,
        max_replicas: Option<u32>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidReplicaBounds {
            min_replicas,
            max_replicas,
            reason: reason.into(),
        }
    }

    /// Create an invalid image error
    pub fn invalid_image(container: &str, message: impl Into<String>) -> Self {
        Self::InvalidImage {
            container: container.to_string(),
            message: message.into(),
        }
    }

    /// Create an invalid name error
    pub fn invalid_name(field: &str, value: &str, message: impl Into<String>) -> Self {
        Self::InvalidName {
            field: field.to_string(),
            value: value.to_string(),
            message: message.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Container the error is attributed to, if any
    pub fn container(&self) -> Option<&str> {
        match self {
            Self::UnknownContainer { container, .. }
            | Self::InvalidPort { container, .. }
            | Self::DuplicatePort { container, .. }
            | Self::UnknownProbeType { container, .. }
            | Self::MissingProbeField { container, .. }
            | Self::DuplicateEnvName { container, .. }
            | Self::DuplicateMountPath { container, .. }
            | Self::InvalidImage { container, .. } => Some(container),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_container_display() {
        let err = ResolveError::unknown_container(Concern::Ports, "sidecar");
        let display = err.to_string();
        assert!(display.contains("ports"));
        assert!(display.contains("sidecar"));
    }

    #[test]
    fn probe_errors_name_category_and_container() {
        let err = ResolveError::missing_probe_field(
            "web",
            ProbeCategory::Liveness,
            "tcp_socket.port",
            "field is required",
        );
        let display = err.to_string();
        assert!(display.starts_with("liveness_probes.web"));
        assert!(display.contains("tcp_socket.port"));
    }

    #[test]
    fn replica_bounds_display() {
        let err = ResolveError::replica_bounds(
            Some(3),
            Some(2),
            "min_replicas 3 exceeds max_replicas 2",
        );
        assert_eq!(
            err.to_string(),
            "hpa: invalid replica bounds: min_replicas 3 exceeds max_replicas 2"
        );
    }

    #[test]
    fn container_context() {
        let err = ResolveError::DuplicatePort {
            container: "web".to_string(),
            port: 80,
        };
        assert_eq!(err.container(), Some("web"));
        assert_eq!(ResolveError::MissingImage.container(), None);
    }
}
