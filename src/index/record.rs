//! Configuration record and its single-line `key=value,...` encoding.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Whether a record's enable link should exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Active,
    Inactive,
}

impl RecordStatus {
    /// Parses a stored status. Empty means active; anything unrecognized is inactive.
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "active" => RecordStatus::Active,
            _ => RecordStatus::Inactive,
        }
    }

    /// Returns the opposite status.
    pub fn toggled(self) -> Self {
        match self {
            RecordStatus::Active => RecordStatus::Inactive,
            RecordStatus::Inactive => RecordStatus::Active,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One managed site, as stored in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigurationRecord {
    /// Server names; the first token is the primary domain.
    pub domain: String,
    /// Backend port.
    pub port: String,
    /// Backend address.
    pub host: String,
    /// Service type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Address used for the hosts entry.
    pub ip: String,
    /// Generated config file.
    pub path: PathBuf,
    pub status: RecordStatus,
    /// Creation time in milliseconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    /// Keys this version does not know about, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ConfigurationRecord {
    /// Creates an active proxy record.
    pub fn new(
        domain: impl Into<String>,
        port: impl Into<String>,
        host: impl Into<String>,
        ip: impl Into<String>,
        path: impl Into<PathBuf>,
        created: i64,
    ) -> Self {
        Self {
            domain: domain.into(),
            port: port.into(),
            host: host.into(),
            kind: "proxy".to_string(),
            ip: ip.into(),
            path: path.into(),
            status: RecordStatus::Active,
            created: Some(created),
            extra: BTreeMap::new(),
        }
    }

    /// First whitespace-separated token of the domain field.
    pub fn primary_domain(&self) -> &str {
        primary_domain(&self.domain)
    }

    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }

    /// Returns the config file name, if the path has one.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// First whitespace-separated token of a domain field, or "" when there is none.
pub fn primary_domain(domain: &str) -> &str {
    domain.split_whitespace().next().unwrap_or("")
}

/// Encodes a record as a single index line.
///
/// Values are not escaped; callers keep `,` and `=` out of them.
pub fn encode(record: &ConfigurationRecord) -> String {
    let mut parts = vec![
        format!("domain={}", record.domain),
        format!("port={}", record.port),
        format!("host={}", record.host),
        format!("type={}", record.kind),
        format!("ip={}", record.ip),
        format!("path={}", record.path.display()),
        format!("status={}", record.status),
    ];

    if let Some(created) = record.created {
        parts.push(format!("created={}", created));
    }

    for (key, value) in &record.extra {
        parts.push(format!("{}={}", key, value));
    }

    parts.join(",")
}

/// Decodes an index line. Never fails: parts without `=` are dropped
/// and missing keys decode as empty values.
pub fn decode(line: &str) -> ConfigurationRecord {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();

    for part in line.split(',') {
        if let Some((key, value)) = part.split_once('=') {
            fields.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    let mut take = |key: &str| fields.remove(key).unwrap_or_default();

    let domain = take("domain");
    let port = take("port");
    let host = take("host");
    let kind = take("type");
    let ip = take("ip");
    let path = PathBuf::from(take("path"));
    let status = RecordStatus::parse(&take("status"));

    let created = match fields.get("created").map(|v| v.parse::<i64>()) {
        Some(Ok(ms)) => {
            fields.remove("created");
            Some(ms)
        }
        // Unparseable timestamps stay in `extra` so they survive a rewrite.
        Some(Err(_)) => None,
        None => None,
    };

    ConfigurationRecord {
        domain,
        port,
        host,
        kind,
        ip,
        path,
        status,
        created,
        extra: fields,
    }
}
