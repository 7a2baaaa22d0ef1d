//! Resolver configuration
//!
//! Tunables that are not part of the caller's variables: the sentinel name
//! used for flat shapes and the annotation keys written on ingress routes.
//! Every field has a default so a partial YAML/JSON document is enough.

use serde::{Deserialize, Serialize};

/// Container name substituted when a concern is given in flat shape
pub const DEFAULT_IMPLICIT_CONTAINER: &str = "main";

/// Annotation key carrying the ingress controller class
pub const DEFAULT_INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// Annotation key carrying the cert-manager issuer
pub const DEFAULT_CERT_MANAGER_ANNOTATION: &str = "cert-manager.io/cluster-issuer";

/// Path used for ingress hosts that do not declare one
pub const DEFAULT_INGRESS_PATH: &str = "/";

/// CPU utilization target implied when autoscaling is enabled without targets
pub const DEFAULT_CPU_TARGET: u32 = 80;

/// Configuration for [`crate::WorkloadResolver`]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Sentinel container name for flat-shaped variables
    pub implicit_container: String,
    /// Annotation key set by a named ingress class preset
    pub ingress_class_annotation: String,
    /// Annotation key set from `cert_manager_issuer`
    pub cert_manager_annotation: String,
    /// Path for ingress hosts without an explicit path
    pub default_ingress_path: String,
    /// CPU target (percent) when autoscaling is enabled without any target
    pub default_cpu_target: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            implicit_container: DEFAULT_IMPLICIT_CONTAINER.to_string(),
            ingress_class_annotation: DEFAULT_INGRESS_CLASS_ANNOTATION.to_string(),
            cert_manager_annotation: DEFAULT_CERT_MANAGER_ANNOTATION.to_string(),
            default_ingress_path: DEFAULT_INGRESS_PATH.to_string(),
            default_cpu_target: DEFAULT_CPU_TARGET,
        }
    }
}
