use super::credentials::Credentials;
use super::defaults::{
    DEFAULT_EXPORT_TIMEOUT_SECS, DEFAULT_MAX_ITERATIONS, DEFAULT_SYSTEM_PROMPT,
    DEFAULT_TOOL_TIMEOUT_SECS, DEFAULT_TRACKING_URI,
};
use super::error::ConfigError;
use super::keys;
use super::server::{ServerConfig, validate_http_url};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Validated, immutable application settings.
///
/// Built once at startup (see [`Settings::from_env`]) and handed to the
/// application façade; nothing else reads the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub workspace_url: Option<String>,
    pub credentials: Credentials,
    pub model: ModelSettings,
    pub servers: Vec<ServerConfig>,
    pub agent: AgentSettings,
    pub tools: ToolSettings,
    pub tracing: TracingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub name: String,
    pub endpoint_url: Option<String>,
}

impl ModelSettings {
    /// Chat-completions URL of the serving endpoint.
    pub fn chat_url(&self, workspace_url: Option<&str>) -> Option<String> {
        if let Some(url) = &self.endpoint_url {
            return Some(url.clone());
        }
        workspace_url.map(|host| {
            format!(
                "{}/serving-endpoints/{}/invocations",
                host.trim_end_matches('/'),
                self.name
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    pub system_prompt: String,
    pub max_iterations: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub timeout: Duration,
    pub require_all_servers: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            require_all_servers: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingSettings {
    pub enabled: bool,
    pub tracking_uri: String,
    pub experiment_name: Option<String>,
    pub export_timeout: Duration,
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            tracking_uri: DEFAULT_TRACKING_URI.to_string(),
            experiment_name: None,
            export_timeout: Duration::from_secs(DEFAULT_EXPORT_TIMEOUT_SECS),
        }
    }
}

impl TracingSettings {
    /// Base URL of the tracking server; `databricks` resolves to the workspace.
    pub fn tracking_base(&self, workspace_url: Option<&str>) -> Option<String> {
        let uri = self.tracking_uri.trim();
        if uri == DEFAULT_TRACKING_URI || uri.starts_with("databricks://") {
            workspace_url.map(|host| host.trim_end_matches('/').to_string())
        } else {
            Some(uri.trim_end_matches('/').to_string())
        }
    }
}

impl Settings {
    /// Load `.env`, then build settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        super::loader::load_from_env()
    }

    /// Build settings from an explicit key/value mapping.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        super::loader::load_from_map(vars)
    }

    /// Re-check the invariants that `from_map` enforces. Settings are plain
    /// data, so the façade calls this again before touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.name.trim().is_empty() {
            return Err(ConfigError::MissingModel {
                key: keys::MODEL_NAME,
            });
        }
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        if let Some(url) = &self.workspace_url {
            validate_http_url(keys::WORKSPACE_URL, url)?;
        }
        if let Some(url) = &self.model.endpoint_url {
            validate_http_url(keys::MODEL_ENDPOINT_URL, url)?;
        }
        if self.model.chat_url(self.workspace_url.as_deref()).is_none() {
            return Err(ConfigError::MissingWorkspaceUrl);
        }

        let mut seen = HashSet::new();
        for server in &self.servers {
            validate_http_url(&server.name, &server.url)?;
            if !seen.insert(server.url.trim_end_matches('/')) {
                return Err(ConfigError::DuplicateServer {
                    url: server.url.clone(),
                });
            }
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                key: keys::MAX_ITERATIONS,
                value: "0".to_string(),
                expected: "a positive integer",
            });
        }
        Ok(())
    }
}
