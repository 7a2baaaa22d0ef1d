//! Canonical resolved workload model
//!
//! `WorkloadSpec` is the only output of resolution. It is uniformly keyed by
//! container name and carries no trace of the shape the variables were
//! written in. Renderers turn it into Deployment containers, Services,
//! Ingresses, a HorizontalPodAutoscaler and ConfigMap/Secret mounts.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Workload
// =============================================================================

/// Fully resolved workload
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct WorkloadSpec {
    /// Workload (Deployment) name
    pub name: String,
    /// Target namespace
    pub namespace: String,
    /// Resolved containers keyed by container name
    pub containers: BTreeMap<String, ContainerSpec>,
    /// Workload-wide autoscaling
    pub autoscaling: AutoscalingSpec,
}

impl WorkloadSpec {
    /// Look up a container by name
    pub fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.get(name)
    }

    /// All ports of all containers, in container then port order
    pub fn ports(&self) -> impl Iterator<Item = &PortDescriptor> {
        self.containers.values().flat_map(|c| c.ports.iter())
    }

    /// All ingress routes of all ports
    pub fn ingress_routes(&self) -> impl Iterator<Item = &IngressRoute> {
        self.ports().flat_map(|p| p.ingress.iter())
    }
}

/// Resolved container
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ContainerSpec {
    /// Image reference
    pub image: String,

    /// Exposed ports, sorted by port number
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortDescriptor>,

    /// Readiness probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<ProbeDescriptor>,

    /// Liveness probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<ProbeDescriptor>,

    /// Startup probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_probe: Option<ProbeDescriptor>,

    /// Environment bindings: literals first, then secret-sourced, each by name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvBinding>,

    /// Volume bindings: ConfigMaps first, then Secrets, each by source name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeBinding>,
}

impl ContainerSpec {
    /// A container with only an image
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ports: Vec::new(),
            readiness_probe: None,
            liveness_probe: None,
            startup_probe: None,
            env: Vec::new(),
            volumes: Vec::new(),
        }
    }

    /// Look up a port by number
    pub fn port(&self, port: u16) -> Option<&PortDescriptor> {
        self.ports.iter().find(|p| p.port == port)
    }

    /// Look up an env binding by name
    pub fn env_var(&self, name: &str) -> Option<&EnvBinding> {
        self.env.iter().find(|e| e.name() == name)
    }
}

// =============================================================================
// Ports and Ingress
// =============================================================================

/// Transport protocol of a port
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum Protocol {
    /// TCP (default)
    #[default]
    #[serde(rename = "TCP")]
    Tcp,
    /// UDP
    #[serde(rename = "UDP")]
    Udp,
}

impl Protocol {
    /// Kubernetes spelling of the protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }

    /// Parse a protocol name, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("tcp") {
            Some(Self::Tcp)
        } else if value.eq_ignore_ascii_case("udp") {
            Some(Self::Udp)
        } else {
            None
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved container port
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct PortDescriptor {
    /// Owning container
    pub container: String,
    /// Port number (1..=65535)
    pub port: u16,
    /// Transport protocol
    pub protocol: Protocol,
    /// Derived ingress routes, one per host; empty when not exposed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<IngressRoute>,
}

/// Derived external-access rule for one host of one port
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct IngressRoute {
    /// Host name
    pub host: String,
    /// URL path
    pub path: String,
    /// Merged annotations: defaults, then explicit, then issuer
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// cert-manager issuer, when TLS is requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_issuer: Option<String>,
}

// =============================================================================
// Probes
// =============================================================================

/// Probe kind, as written in the `type` discriminator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeKind {
    /// `tcp_socket`
    TcpSocket,
    /// `http_get`
    HttpGet,
    /// `exec`
    Exec,
}

impl ProbeKind {
    /// All supported kinds
    pub const ALL: [ProbeKind; 3] = [Self::TcpSocket, Self::HttpGet, Self::Exec];

    /// Discriminator value and sub-object key of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TcpSocket => "tcp_socket",
            Self::HttpGet => "http_get",
            Self::Exec => "exec",
        }
    }

    /// Parse a discriminator value
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

/// How a probe checks the container
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeHandler {
    /// Open a TCP connection
    TcpSocket {
        /// Target port
        port: u16,
    },
    /// Perform an HTTP GET
    HttpGet {
        /// Request path
        path: String,
        /// Target port
        port: u16,
        /// `HTTP` or `HTTPS`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scheme: Option<String>,
    },
    /// Run a command inside the container
    Exec {
        /// Command and arguments
        command: Vec<String>,
    },
}

impl ProbeHandler {
    /// Kind of the handler
    pub fn kind(&self) -> ProbeKind {
        match self {
            Self::TcpSocket { .. } => ProbeKind::TcpSocket,
            Self::HttpGet { .. } => ProbeKind::HttpGet,
            Self::Exec { .. } => ProbeKind::Exec,
        }
    }
}

/// Optional probe timing. Unset fields use the Kubernetes defaults.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ProbeTiming {
    /// Seconds before the first probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_seconds: Option<u32>,
    /// Seconds between probes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_seconds: Option<u32>,
    /// Seconds before a probe times out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,
    /// Consecutive successes to be considered healthy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_threshold: Option<u32>,
    /// Consecutive failures to be considered unhealthy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
}

impl ProbeTiming {
    /// Whether no timing field is set
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Resolved probe of one category for one container
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ProbeDescriptor {
    /// Check performed by the probe
    pub handler: ProbeHandler,
    /// Timing overrides
    #[serde(default, skip_serializing_if = "ProbeTiming::is_empty")]
    pub timing: ProbeTiming,
}

impl ProbeDescriptor {
    /// A TCP socket probe with default timing
    pub fn tcp_socket(port: u16) -> Self {
        Self {
            handler: ProbeHandler::TcpSocket { port },
            timing: ProbeTiming::default(),
        }
    }
}

// =============================================================================
// Environment and Volumes
// =============================================================================

/// Environment variable binding
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum EnvBinding {
    /// Literal value
    Literal {
        /// Variable name
        name: String,
        /// Variable value
        value: String,
    },
    /// Value read from a key of a Secret
    FromSecret {
        /// Variable name
        name: String,
        /// Secret name
        secret_name: String,
        /// Key within the Secret
        secret_key: String,
    },
}

impl EnvBinding {
    /// Variable name
    pub fn name(&self) -> &str {
        match self {
            Self::Literal { name, .. } | Self::FromSecret { name, .. } => name,
        }
    }
}

/// Kind of object a volume is sourced from
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSource {
    /// ConfigMap
    ConfigMap,
    /// Secret
    Secret,
}

impl VolumeSource {
    /// Prefix used for derived volume names
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigMap => "configmap",
            Self::Secret => "secret",
        }
    }
}

/// Volume mount sourced from a ConfigMap or Secret
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct VolumeBinding {
    /// Kind of source object
    pub source: VolumeSource,
    /// Name of the ConfigMap or Secret
    pub source_name: String,
    /// Absolute mount path inside the container
    pub mount_path: String,
    /// Sub path within the volume; empty mounts the whole volume
    #[serde(default)]
    pub sub_path: String,
    /// Mount read-only
    #[serde(default)]
    pub read_only: bool,
}

impl VolumeBinding {
    /// Pod-unique volume name for the source (`configmap-<name>`, `secret-<name>`)
    pub fn volume_name(&self) -> String {
        format!("{}-{}", self.source.as_str(), self.source_name)
    }
}

// =============================================================================
// Autoscaling
// =============================================================================

/// Resource an autoscaling target applies to
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScalingResource {
    /// CPU utilization
    Cpu,
    /// Memory utilization
    Memory,
}

/// One average-utilization target
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct UtilizationTarget {
    /// Measured resource
    pub resource: ScalingResource,
    /// Target utilization percentage (1..=100)
    pub percent: u32,
}

/// Workload-wide horizontal autoscaling. The default is disabled with no bounds.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct AutoscalingSpec {
    /// Whether an autoscaler is rendered
    pub enabled: bool,
    /// CPU utilization target (percent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cpu_percent: Option<u32>,
    /// Memory utilization target (percent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_memory_percent: Option<u32>,
    /// Lower replica bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<u32>,
    /// Upper replica bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<u32>,
}

impl AutoscalingSpec {
    /// Configured utilization targets, cpu first
    pub fn metrics(&self) -> Vec<UtilizationTarget> {
        let cpu = self.target_cpu_percent.map(|percent| UtilizationTarget {
            resource: ScalingResource::Cpu,
            percent,
        });
        let memory = self.target_memory_percent.map(|percent| UtilizationTarget {
            resource: ScalingResource::Memory,
            percent,
        });
        cpu.into_iter().chain(memory).collect()
    }
}
