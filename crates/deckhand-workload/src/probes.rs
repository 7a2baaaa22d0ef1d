//! Probe resolution
//!
//! A probe block names its kind in `type` and carries that kind's options in
//! the sub-object of the same name:
//!
//! ```text
//! { type = "tcp_socket", tcp_socket = { port = 5000 } }
//! ```
//!
//! Only the sub-object selected by `type` is read; other kind sub-objects are
//! ignored. The result is a `ProbeHandler` variant, so a descriptor can never
//! disagree with its own kind.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::raw::{as_object, as_uint, coerce_u32, describe, field, join, warn_unknown_keys};
use crate::shape::Concern;
use crate::spec::{ProbeDescriptor, ProbeHandler, ProbeKind, ProbeTiming};

const TIMING_KEYS: [&str; 5] = [
    "initial_delay_seconds",
    "period_seconds",
    "timeout_seconds",
    "success_threshold",
    "failure_threshold",
];

/// When a probe runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCategory {
    /// Gates traffic to the container
    Readiness,
    /// Restarts the container on failure
    Liveness,
    /// Holds the other probes until the container has started
    Startup,
}

impl ProbeCategory {
    /// Categories in resolution order
    pub const ALL: [ProbeCategory; 3] = [Self::Readiness, Self::Liveness, Self::Startup];

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Readiness => "readiness",
            Self::Liveness => "liveness",
            Self::Startup => "startup",
        }
    }

    /// Concern (input variable) the category is read from
    pub fn concern(&self) -> Concern {
        match self {
            Self::Readiness => Concern::ReadinessProbes,
            Self::Liveness => Concern::LivenessProbes,
            Self::Startup => Concern::StartupProbes,
        }
    }
}

impl fmt::Display for ProbeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve one container's probe block of one category.
pub(crate) fn resolve_probe(
    container: &str,
    category: ProbeCategory,
    raw: &Value,
) -> Result<ProbeDescriptor> {
    let path = join(category.concern().as_str(), container);
    let block = as_object(raw, &path)?;

    let known: Vec<&str> = ["type"]
        .into_iter()
        .chain(ProbeKind::ALL.iter().map(|k| k.as_str()))
        .chain(TIMING_KEYS)
        .collect();
    warn_unknown_keys(block, &known, &path);

    let probe_type = match field(block, "type") {
        Some(Value::String(t)) => t.as_str(),
        Some(other) => {
            return Err(ResolveError::missing_probe_field(
                container,
                category,
                "type",
                format!("expected a string, found {}", describe(other)),
            ))
        }
        None => {
            return Err(ResolveError::missing_probe_field(
                container,
                category,
                "type",
                "field is required",
            ))
        }
    };

    let kind = ProbeKind::parse(probe_type).ok_or_else(|| ResolveError::UnknownProbeType {
        container: container.to_string(),
        category,
        probe_type: probe_type.to_string(),
    })?;

    let options = match field(block, kind.as_str()) {
        Some(Value::Object(options)) => options,
        Some(other) => {
            return Err(ResolveError::missing_probe_field(
                container,
                category,
                kind.as_str(),
                format!("expected an object, found {}", describe(other)),
            ))
        }
        None => {
            return Err(ResolveError::missing_probe_field(
                container,
                category,
                kind.as_str(),
                format!("required when type is '{}'", kind.as_str()),
            ))
        }
    };

    let fields = ProbeFields {
        container,
        category,
        kind,
        options,
    };
    let handler = match kind {
        ProbeKind::TcpSocket => ProbeHandler::TcpSocket {
            port: fields.port()?,
        },
        ProbeKind::HttpGet => ProbeHandler::HttpGet {
            path: fields.http_path()?,
            port: fields.port()?,
            scheme: fields.scheme()?,
        },
        ProbeKind::Exec => ProbeHandler::Exec {
            command: fields.command()?,
        },
    };

    let timing = resolve_timing(block, &path)?;
    debug!(container = %container, category = %category, kind = kind.as_str(), "resolved probe");

    Ok(ProbeDescriptor { handler, timing })
}

/// Field readers for the selected kind's sub-object
struct ProbeFields<'a> {
    container: &'a str,
    category: ProbeCategory,
    kind: ProbeKind,
    options: &'a Map<String, Value>,
}

impl ProbeFields<'_> {
    fn missing(&self, name: &str, reason: impl Into<String>) -> ResolveError {
        ResolveError::missing_probe_field(
            self.container,
            self.category,
            &join(self.kind.as_str(), name),
            reason,
        )
    }

    fn port(&self) -> Result<u16> {
        let value = field(self.options, "port")
            .ok_or_else(|| self.missing("port", "field is required"))?;
        as_uint(value)
            .and_then(|n| u16::try_from(n).ok())
            .filter(|port| *port > 0)
            .ok_or_else(|| {
                self.missing(
                    "port",
                    format!(
                        "expected a port number between 1 and 65535, found {}",
                        describe(value)
                    ),
                )
            })
    }

    fn http_path(&self) -> Result<String> {
        match field(self.options, "path") {
            None => Ok("/".to_string()),
            Some(Value::String(path)) if path.starts_with('/') => Ok(path.clone()),
            Some(other) => Err(self.missing(
                "path",
                format!("expected an absolute path, found {}", describe(other)),
            )),
        }
    }

    fn scheme(&self) -> Result<Option<String>> {
        let Some(value) = field(self.options, "scheme") else {
            return Ok(None);
        };
        match value.as_str().map(str::to_ascii_uppercase).as_deref() {
            Some(scheme @ ("HTTP" | "HTTPS")) => Ok(Some(scheme.to_string())),
            _ => Err(self.missing(
                "scheme",
                format!("expected HTTP or HTTPS, found {}", describe(value)),
            )),
        }
    }

    fn command(&self) -> Result<Vec<String>> {
        let value = field(self.options, "command")
            .ok_or_else(|| self.missing("command", "field is required"))?;
        let command = match value {
            Value::String(cmd) => vec![cmd.clone()],
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        self.missing(
                            "command",
                            format!("expected a list of strings, found {}", describe(item)),
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            other => {
                return Err(self.missing(
                    "command",
                    format!("expected a list of strings, found {}", describe(other)),
                ))
            }
        };
        if command.iter().all(|part| part.is_empty()) {
            return Err(self.missing("command", "command cannot be empty"));
        }
        Ok(command)
    }
}

fn resolve_timing(block: &Map<String, Value>, path: &str) -> Result<ProbeTiming> {
    let read = |key: &str| {
        field(block, key)
            .map(|v| coerce_u32(v, &join(path, key)))
            .transpose()
    };
    Ok(ProbeTiming {
        initial_delay_seconds: read("initial_delay_seconds")?,
        period_seconds: read("period_seconds")?,
        timeout_seconds: read("timeout_seconds")?,
        success_threshold: read("success_threshold")?,
        failure_threshold: read("failure_threshold")?,
    })
}
