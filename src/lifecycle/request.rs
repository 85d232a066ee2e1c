//! Caller input for create and edit.

/// Fields for a new site. Omitted optional fields take the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    /// One or more whitespace-separated server names.
    pub domain: String,
    /// Backend port.
    pub port: String,
    pub backend_host: Option<String>,
    /// Address for the hosts entry.
    pub ip: Option<String>,
    /// Service type; only `proxy` is supported.
    pub kind: Option<String>,
    /// Whether to add a hosts entry after a successful deploy.
    pub add_hosts_entry: bool,
}

/// Replacement values for an existing site. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct EditRequest {
    pub domain: Option<String>,
    pub port: Option<String>,
    pub backend_host: Option<String>,
    pub ip: Option<String>,
}

/// Treats blank strings as omitted.
pub(crate) fn provided(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
