//! CLI commands

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use deckhand_workload::{RawConfig, ResolverConfig, WorkloadResolver, WorkloadSpec};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::{Error, Result};

pub mod resolve;
pub mod schema;
pub mod validate;

/// Namespace used when neither the flag nor the variables file sets one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Variables file and workload identity, shared by `resolve` and `validate`
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Variables file (.json, .yaml or .yml)
    pub vars: PathBuf,

    /// Workload name (overrides `name` in the variables file)
    #[arg(long)]
    pub name: Option<String>,

    /// Target namespace (overrides `namespace` in the variables file)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Resolver configuration file (.json, .yaml or .yml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Container name used for flat (non-keyed) variables
    #[arg(long, env = "DECKHAND_IMPLICIT_CONTAINER")]
    pub implicit_container: Option<String>,
}

impl InputArgs {
    /// Load the variables and resolve them into a workload spec.
    pub fn resolve(&self) -> Result<WorkloadSpec> {
        let raw = RawConfig::from_value(load_vars(&self.vars)?)?;

        let name = self
            .name
            .clone()
            .or_else(|| raw.name.clone())
            .ok_or_else(|| {
                Error::validation(
                    "workload name is required (--name or `name` in the variables file)",
                )
            })?;
        let namespace = self
            .namespace
            .clone()
            .or_else(|| raw.namespace.clone())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let mut config = load_config(self.config.as_deref())?;
        if let Some(ref container) = self.implicit_container {
            config.implicit_container = container.clone();
        }

        info!(
            vars = %self.vars.display(),
            name = %name,
            namespace = %namespace,
            "resolving workload"
        );
        let spec = WorkloadResolver::new(&name, &namespace)
            .with_config(config)
            .resolve(&raw)?;
        Ok(spec)
    }
}

/// Output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON (default)
    #[default]
    Json,
    /// YAML
    Yaml,
}

/// Format of an input file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    /// `.json`
    Json,
    /// `.yaml` or `.yml`
    Yaml,
}

impl FileFormat {
    /// Infer the format of an input file from its extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Ok(Self::Yaml)
            }
            _ => Err(Error::unsupported_format(path)),
        }
    }
}

/// Read a JSON or YAML file into `T`, choosing the parser by extension.
fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = FileFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), format = ?format, "loading file");
    Ok(match format {
        FileFormat::Json => serde_json::from_str(&content)?,
        FileFormat::Yaml => serde_yaml::from_str(&content)?,
    })
}

/// Load a variables file (the shape of a `*.tfvars.json` file).
pub fn load_vars(path: &Path) -> Result<serde_json::Value> {
    let vars: serde_json::Value = load_file(path)?;
    if !vars.is_object() {
        return Err(Error::validation(format!(
            "{}: variables file must contain a mapping at the top level",
            path.display()
        )));
    }
    Ok(vars)
}

/// Load the resolver configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<ResolverConfig> {
    match path {
        Some(path) => load_file(path),
        None => Ok(ResolverConfig::default()),
    }
}

/// Render a value in the requested format.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}
