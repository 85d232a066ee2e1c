//! Checks for caller-supplied site fields.
//!
//! Values end up in the comma-separated index line and in the generated
//! server block, so anything that would break either is rejected here,
//! before any resource is touched.

use std::net::IpAddr;
use std::sync::OnceLock;

use regex::Regex;

use super::{ValidationIssue, ValidationResult};

/// Service types the template renderer knows how to produce.
pub const SUPPORTED_KINDS: &[&str] = &["proxy"];

fn server_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_*]([A-Za-z0-9_.*-]*[A-Za-z0-9_*])?$").expect("static pattern")
    })
}

/// Validates a full set of site fields for a new record.
pub fn validate_site(domain: &str, port: &str, host: &str, ip: &str) -> ValidationResult {
    let mut result = ValidationResult::new();
    validate_domain(domain, "domain", &mut result);
    validate_port(port, "port", &mut result);
    validate_backend_host(host, "host", &mut result);
    validate_ip(ip, "ip", &mut result);
    result
}

/// Validates the requested service type.
pub fn validate_kind(kind: &str, result: &mut ValidationResult) {
    if !SUPPORTED_KINDS.iter().any(|k| k.eq_ignore_ascii_case(kind)) {
        result.add(
            ValidationIssue::error("type", format!("Unsupported service type: '{}'", kind))
                .with_suggestion(format!("Supported types: {}", SUPPORTED_KINDS.join(", "))),
        );
    }
}

/// Validates a domain field: one or more whitespace-separated server names.
pub fn validate_domain(domain: &str, path: &str, result: &mut ValidationResult) {
    let names: Vec<&str> = domain.split_whitespace().collect();
    if names.is_empty() {
        result.add(ValidationIssue::error(path, "Domain is required"));
        return;
    }

    for (i, name) in names.iter().enumerate() {
        if !server_name_pattern().is_match(name) {
            result.add(
                ValidationIssue::error(
                    format!("{}[{}]", path, i),
                    format!("Invalid server name: '{}'", name),
                )
                .with_suggestion("Use letters, digits, '.', '-', '_' or a '*' wildcard"),
            );
        }
    }
}

/// Validates a backend port.
pub fn validate_port(port: &str, path: &str, result: &mut ValidationResult) {
    match port.trim().parse::<u16>() {
        Ok(0) | Err(_) => result.add(
            ValidationIssue::error(path, format!("Valid port number required, got '{}'", port))
                .with_suggestion("Port must be between 1 and 65535"),
        ),
        Ok(_) => {}
    }
}

/// Validates the backend host the proxy forwards to.
pub fn validate_backend_host(host: &str, path: &str, result: &mut ValidationResult) {
    if host.trim().is_empty() {
        result.add(ValidationIssue::error(path, "Backend host is required"));
        return;
    }
    if host.contains([',', '=', ';']) || host.chars().any(char::is_whitespace) {
        result.add(ValidationIssue::error(
            path,
            format!("Backend host contains illegal characters: '{}'", host),
        ));
    }
}

/// Validates the address written to the hosts file.
pub fn validate_ip(ip: &str, path: &str, result: &mut ValidationResult) {
    if ip.trim().parse::<IpAddr>().is_err() {
        result.add(
            ValidationIssue::error(path, format!("Invalid IP address: '{}'", ip))
                .with_suggestion("Use an IPv4 or IPv6 address such as 127.0.0.1"),
        );
    }
}
