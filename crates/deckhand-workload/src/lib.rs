//! Workload variable resolution for Deckhand
//!
//! Normalizes shape-shifting workload variables (each concern given either
//! flat for a single implicit container or keyed by container name) into one
//! canonical `WorkloadSpec` that renderers turn into Deployments, Services,
//! Ingresses and HorizontalPodAutoscalers.
//!
//! # Usage
//!
//! ```rust,ignore
//! let raw = RawConfig::from_value(vars)?;
//! let spec = WorkloadResolver::new("test-name", "default")
//!     .with_config(config)
//!     .resolve(&raw)?;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod error;
pub mod names;
pub mod raw;
pub mod shape;
pub mod spec;

mod autoscaling;
mod env;
mod image;
mod ports;
mod probes;
mod resolver;
mod volumes;

pub use config::ResolverConfig;
pub use error::{ResolveError, Result};
pub use probes::ProbeCategory;
pub use raw::RawConfig;
pub use resolver::WorkloadResolver;
pub use shape::{detect_shape, normalize, Concern, ContainerSet, Shape};
pub use spec::{
    AutoscalingSpec, ContainerSpec, EnvBinding, IngressRoute, PortDescriptor, ProbeDescriptor,
    ProbeHandler, ProbeKind, ProbeTiming, Protocol, ScalingResource, UtilizationTarget,
    VolumeBinding, VolumeSource, WorkloadSpec,
};
