use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting '{key}' (serving endpoint name)")]
    MissingModel { key: &'static str },

    #[error("no MCP servers configured - set DATABRICKS_MCP_SERVERS or EXTERNAL_MCP_SERVERS")]
    NoServers,

    #[error("no workspace URL is set (needed for managed MCP servers and the serving endpoint)")]
    MissingWorkspaceUrl,

    #[error("setting '{key}' holds an invalid URL '{value}': {reason}")]
    InvalidUrl {
        key: String,
        value: String,
        reason: String,
    },

    #[error("'{path}' is not a managed MCP server path: {reason}")]
    InvalidServerPath { path: String, reason: String },

    #[error("MCP server URL '{url}' is configured more than once")]
    DuplicateServer { url: String },

    #[error("setting '{key}' has invalid value '{value}': expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("failed to read credentials file {path:?}: {source}")]
    CredentialsIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("profile '{profile}' not found in {path:?}")]
    ProfileNotFound { profile: String, path: PathBuf },
}
