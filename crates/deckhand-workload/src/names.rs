//! Kubernetes naming rules for workload, namespace, container and host names

use crate::error::{ResolveError, Result};

/// Maximum length of an RFC 1123 DNS label
pub const MAX_DNS_LABEL_LEN: usize = 63;

/// Maximum length of an RFC 1123 DNS subdomain (ingress hosts)
pub const MAX_DNS_SUBDOMAIN_LEN: usize = 253;

/// Validate an RFC 1123 DNS label: lowercase alphanumerics and `-`,
/// starting and ending with an alphanumeric, at most 63 characters.
pub fn validate_dns_label(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ResolveError::invalid_name(field, value, "cannot be empty"));
    }
    if value.len() > MAX_DNS_LABEL_LEN {
        return Err(ResolveError::invalid_name(
            field,
            value,
            format!("exceeds maximum length of {}", MAX_DNS_LABEL_LEN),
        ));
    }
    if !label_chars_valid(value) {
        return Err(ResolveError::invalid_name(
            field,
            value,
            "must consist of lowercase alphanumeric characters or '-', \
             and must start and end with an alphanumeric character",
        ));
    }
    Ok(())
}

/// Validate an ingress host: a DNS subdomain, optionally with a leading
/// `*.` wildcard label.
pub fn validate_host(value: &str) -> Result<()> {
    let host = value.strip_prefix("*.").unwrap_or(value);
    if host.is_empty() || host.len() > MAX_DNS_SUBDOMAIN_LEN {
        return Err(ResolveError::invalid_name(
            "ingress host",
            value,
            format!("must be between 1 and {} characters", MAX_DNS_SUBDOMAIN_LEN),
        ));
    }
    if !host
        .split('.')
        .all(|label| label.len() <= MAX_DNS_LABEL_LEN && label_chars_valid(label))
    {
        return Err(ResolveError::invalid_name(
            "ingress host",
            value,
            "must be a lowercase DNS name",
        ));
    }
    Ok(())
}

fn label_chars_valid(label: &str) -> bool {
    let bytes = label.as_bytes();
    let edge = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            edge(first)
                && edge(last)
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        }
        _ => false,
    }
}
