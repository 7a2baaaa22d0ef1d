//! Environment variable binding resolution
//!
//! Literal variables (`NAME = "value"`) and secret-sourced variables
//! (`NAME = { secret_name, secret_key }`) share one namespace per container.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::raw::{as_object, coerce_string, field, join, kind_of};
use crate::shape::Concern;
use crate::spec::EnvBinding;

/// Resolve one container's literal and secret-sourced variables.
///
/// Literal bindings come first, then secret-sourced ones, each in name order.
pub(crate) fn resolve_env(
    container: &str,
    literals: Option<&Value>,
    secrets: Option<&Value>,
) -> Result<Vec<EnvBinding>> {
    let mut names: BTreeSet<String> = BTreeSet::new();
    let mut bindings = Vec::new();

    if let Some(raw) = literals {
        let path = join(Concern::EnvironmentVariables.as_str(), container);
        for (name, value) in as_object(raw, &path)? {
            let var_path = join(&path, name);
            validate_env_name(name, &var_path)?;
            let value = match value {
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(ResolveError::invalid_value(
                        var_path,
                        format!("expected a string, found {}", kind_of(value)),
                    ))
                }
                scalar => coerce_string(scalar, &var_path)?,
            };
            claim(&mut names, container, name)?;
            bindings.push(EnvBinding::Literal {
                name: name.clone(),
                value,
            });
        }
    }

    if let Some(raw) = secrets {
        let path = join(Concern::EnvironmentVariablesFromSecret.as_str(), container);
        for (name, value) in as_object(raw, &path)? {
            let var_path = join(&path, name);
            validate_env_name(name, &var_path)?;
            let source = as_object(value, &var_path)?;
            let required = |key: &str| {
                field(source, key)
                    .map(|v| coerce_string(v, &join(&var_path, key)))
                    .transpose()?
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        ResolveError::invalid_value(join(&var_path, key), "field is required")
                    })
            };
            let secret_name = required("secret_name")?;
            let secret_key = required("secret_key")?;
            claim(&mut names, container, name)?;
            bindings.push(EnvBinding::FromSecret {
                name: name.clone(),
                secret_name,
                secret_key,
            });
        }
    }

    debug!(container = %container, count = bindings.len(), "resolved environment");
    Ok(bindings)
}

fn claim(names: &mut BTreeSet<String>, container: &str, name: &str) -> Result<()> {
    if names.insert(name.to_string()) {
        Ok(())
    } else {
        Err(ResolveError::DuplicateEnvName {
            container: container.to_string(),
            name: name.to_string(),
        })
    }
}

/// Variable names must be non-empty and must not contain `=`.
fn validate_env_name(name: &str, path: &str) -> Result<()> {
    if name.is_empty() || name.contains('=') || name.chars().any(char::is_control) {
        return Err(ResolveError::invalid_value(
            path,
            format!("invalid environment variable name '{}'", name),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_and_secret_bindings() {
        let literals = json!({ "SUPER_VARIABLE": "super-value", "PORT": 8080, "DEBUG": false });
        let secrets = json!({
            "SUPER_SECRET": { "secret_name": "test-secret", "secret_key": "username" }
        });
        let env = resolve_env("web", Some(&literals), Some(&secrets)).unwrap();

        assert_eq!(
            env,
            vec![
                EnvBinding::Literal {
                    name: "DEBUG".into(),
                    value: "false".into(),
                },
                EnvBinding::Literal {
                    name: "PORT".into(),
                    value: "8080".into(),
                },
                EnvBinding::Literal {
                    name: "SUPER_VARIABLE".into(),
                    value: "super-value".into(),
                },
                EnvBinding::FromSecret {
                    name: "SUPER_SECRET".into(),
                    secret_name: "test-secret".into(),
                    secret_key: "username".into(),
                },
            ]
        );
    }

    #[test]
    fn collision_across_forms_fails() {
        let literals = json!({ "TOKEN": "plain" });
        let secrets = json!({ "TOKEN": { "secret_name": "s", "secret_key": "k" } });
        let err = resolve_env("web", Some(&literals), Some(&secrets)).unwrap_err();
        assert_eq!(
            err,
            ResolveError::DuplicateEnvName {
                container: "web".to_string(),
                name: "TOKEN".to_string(),
            }
        );
    }

    #[test]
    fn secret_binding_requires_name_and_key() {
        let secrets = json!({ "TOKEN": { "secret_name": "s" } });
        let err = resolve_env("web", None, Some(&secrets)).unwrap_err();
        assert_eq!(
            err,
            ResolveError::invalid_value(
                "environment_variables_from_secret.web.TOKEN.secret_key",
                "field is required"
            )
        );
    }

    #[test]
    fn secret_binding_must_be_an_object() {
        let secrets = json!({ "TOKEN": "test-secret" });
        let err = resolve_env("web", None, Some(&secrets)).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidValue { .. }));
    }

    #[test]
    fn structured_literal_value_fails() {
        let literals = json!({ "LIST": ["a", "b"] });
        let err = resolve_env("web", Some(&literals), None).unwrap_err();
        assert_eq!(
            err,
            ResolveError::invalid_value(
                "environment_variables.web.LIST",
                "expected a string, found list"
            )
        );
    }

    #[test]
    fn invalid_names_fail() {
        let literals = json!({ "A=B": "x" });
        assert!(resolve_env("web", Some(&literals), None).is_err());
        let literals = json!({ "": "x" });
        assert!(resolve_env("web", Some(&literals), None).is_err());
    }

    #[test]
    fn nothing_to_bind() {
        assert!(resolve_env("web", None, None).unwrap().is_empty());
    }
}
