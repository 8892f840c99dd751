use super::error::ConfigError;
use reqwest::Url;
use std::collections::HashSet;
use std::fmt;

const MANAGED_PREFIX: &[&str] = &["api", "2.0", "mcp"];

/// How a server is reached: through the workspace (authenticated) or directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Managed,
    External,
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerKind::Managed => f.write_str("managed"),
            ServerKind::External => f.write_str("external"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub url: String,
    pub kind: ServerKind,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: ServerKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
        }
    }

    pub fn is_managed(&self) -> bool {
        self.kind == ServerKind::Managed
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn parse_server_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate a managed server path against the MCP path grammar and return it
/// with a leading slash.
///
/// Accepted shapes:
/// - `/api/2.0/mcp/functions/{catalog}/{schema}`
/// - `/api/2.0/mcp/vector-search/{catalog}/{schema}`
/// - `/api/2.0/mcp/genie/{space_id}`
/// - `/api/2.0/mcp/external/{connection}`
pub fn normalize_server_path(path: &str) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidServerPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = path.trim().trim_start_matches('/').trim_end_matches('/');
    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.len() < MANAGED_PREFIX.len() + 2 || segments[..3] != *MANAGED_PREFIX {
        return Err(invalid("expected prefix /api/2.0/mcp/<kind>/..."));
    }

    let kind = segments[3];
    let params = &segments[4..];
    let expected = match kind {
        "functions" | "vector-search" => 2,
        "genie" | "external" => 1,
        _ => return Err(invalid("unknown server kind")),
    };
    if params.len() != expected {
        return Err(invalid(match expected {
            2 => "expected exactly two segments after the server kind",
            _ => "expected exactly one segment after the server kind",
        }));
    }
    if let Some(bad) = params.iter().find(|segment| !is_valid_segment(segment)) {
        return Err(ConfigError::InvalidServerPath {
            path: path.to_string(),
            reason: format!("invalid segment '{bad}'"),
        });
    }

    Ok(format!("/{trimmed}"))
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}

/// Join the workspace URL with managed server paths.
pub fn build_managed_urls(workspace_url: &str, paths: &[String]) -> Vec<String> {
    let base = workspace_url.trim_end_matches('/');
    paths
        .iter()
        .map(|path| {
            if path.starts_with('/') {
                format!("{base}{path}")
            } else {
                format!("{base}/{path}")
            }
        })
        .collect()
}

pub(crate) fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    };
    let url = Url::parse(value).map_err(|err| invalid(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

/// Assemble the server list: managed servers first, then external ones,
/// named `server_{index}` in that order.
pub(crate) fn assemble_servers(
    workspace_url: Option<&str>,
    managed_paths: &[String],
    external_urls: &[String],
) -> Result<Vec<ServerConfig>, ConfigError> {
    let mut normalized = Vec::with_capacity(managed_paths.len());
    for path in managed_paths {
        normalized.push(normalize_server_path(path)?);
    }

    let managed = if normalized.is_empty() {
        Vec::new()
    } else {
        let host = workspace_url.ok_or(ConfigError::MissingWorkspaceUrl)?;
        build_managed_urls(host, &normalized)
    };

    for url in external_urls {
        validate_http_url("EXTERNAL_MCP_SERVERS", url)?;
    }

    let mut seen = HashSet::new();
    let mut servers = Vec::with_capacity(managed.len() + external_urls.len());
    let entries = managed
        .into_iter()
        .map(|url| (url, ServerKind::Managed))
        .chain(
            external_urls
                .iter()
                .cloned()
                .map(|url| (url, ServerKind::External)),
        );
    for (index, (url, kind)) in entries.enumerate() {
        if !seen.insert(url.trim_end_matches('/').to_string()) {
            return Err(ConfigError::DuplicateServer { url });
        }
        servers.push(ServerConfig::new(format!("server_{index}"), url, kind));
    }
    Ok(servers)
}
