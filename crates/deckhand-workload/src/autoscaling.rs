//! Horizontal autoscaling resolution
//!
//! `hpa` is workload-scoped: it is never keyed by container.

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ResolverConfig;
use crate::error::{ResolveError, Result};
use crate::raw::{
    as_object, as_uint, coerce_bool, coerce_u32, describe, field, join, warn_unknown_keys,
};
use crate::shape::Concern;
use crate::spec::AutoscalingSpec;

const HPA_KEYS: &[&str] = &[
    "enabled",
    "target_cpu",
    "target_memory",
    "min_replicas",
    "max_replicas",
];

/// Replica floor applied when autoscaling is enabled without `min_replicas`
const DEFAULT_MIN_REPLICAS: u32 = 1;

/// Resolve the `hpa` block. An absent block yields the disabled default.
pub(crate) fn resolve_autoscaling(raw: &Value, config: &ResolverConfig) -> Result<AutoscalingSpec> {
    if raw.is_null() {
        return Ok(AutoscalingSpec::default());
    }

    let path = Concern::Hpa.as_str();
    let block = as_object(raw, path)?;
    warn_unknown_keys(block, HPA_KEYS, path);

    let read_u32 = |key: &str| {
        field(block, key)
            .map(|v| coerce_u32(v, &join(path, key)))
            .transpose()
    };

    let enabled = field(block, "enabled")
        .map(|v| coerce_bool(v, &join(path, "enabled")))
        .transpose()?
        .unwrap_or(false);
    let target_cpu = read_target(block, "target_cpu")?;
    let target_memory = read_target(block, "target_memory")?;
    let mut min_replicas = read_u32("min_replicas")?;
    let max_replicas = read_u32("max_replicas")?;

    validate_replicas(min_replicas, max_replicas)?;

    let mut target_cpu_percent = target_cpu;
    if enabled {
        if max_replicas.is_none() {
            return Err(ResolveError::replica_bounds(
                min_replicas,
                max_replicas,
                "max_replicas is required when autoscaling is enabled",
            ));
        }
        min_replicas.get_or_insert(DEFAULT_MIN_REPLICAS);
        if target_cpu.is_none() && target_memory.is_none() {
            target_cpu_percent = Some(config.default_cpu_target);
        }
    }

    let spec = AutoscalingSpec {
        enabled,
        target_cpu_percent,
        target_memory_percent: target_memory,
        min_replicas,
        max_replicas,
    };
    debug!(
        enabled = spec.enabled,
        min_replicas = ?spec.min_replicas,
        max_replicas = ?spec.max_replicas,
        "resolved autoscaling"
    );
    Ok(spec)
}

/// Read a utilization target, rejecting anything outside 1..=100.
fn read_target(block: &Map<String, Value>, metric: &str) -> Result<Option<u32>> {
    let Some(value) = field(block, metric) else {
        return Ok(None);
    };
    let percent = as_uint(value).ok_or_else(|| {
        ResolveError::invalid_value(
            join(Concern::Hpa.as_str(), metric),
            format!("expected a non-negative integer, found {}", describe(value)),
        )
    })?;
    match u32::try_from(percent) {
        Ok(p) if (1..=100).contains(&p) => Ok(Some(p)),
        _ => Err(ResolveError::InvalidUtilizationTarget {
            metric: metric.to_string(),
            value: percent,
        }),
    }
}

fn validate_replicas(min: Option<u32>, max: Option<u32>) -> Result<()> {
    if min == Some(0) {
        return Err(ResolveError::replica_bounds(min, max, "min_replicas must be at least 1"));
    }
    if max == Some(0) {
        return Err(ResolveError::replica_bounds(min, max, "max_replicas must be at least 1"));
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(ResolveError::replica_bounds(
                min,
                max,
                format!("min_replicas ({}) exceeds max_replicas ({})", lo, hi),
            ));
        }
    }
    Ok(())
}
