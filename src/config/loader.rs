use super::credentials::{Credentials, credentials_path, load_profile};
use super::defaults::DEFAULT_ENV_FILE;
use super::error::ConfigError;
use super::keys;
use super::server::{assemble_servers, parse_server_list};
use super::settings::{AgentSettings, ModelSettings, Settings, ToolSettings, TracingSettings};
use dotenvy::from_filename;
use std::collections::HashMap;
use std::env;
use std::sync::Once;
use std::time::Duration;
use tracing::{debug, info, warn};

static ENV_LOADER: Once = Once::new();

/// Ensures variables from `.env` are present in the process environment.
/// Existing variables win over the file.
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        if from_filename(DEFAULT_ENV_FILE).is_ok() {
            debug!(path = DEFAULT_ENV_FILE, "Loaded environment file");
        }
    });
}

pub(super) fn load_from_env() -> Result<Settings, ConfigError> {
    ensure_env_loaded();
    let vars: HashMap<String, String> = env::vars().collect();
    load_from_map(&vars)
}

pub(super) fn load_from_map(vars: &HashMap<String, String>) -> Result<Settings, ConfigError> {
    let lookup = |key: &str| {
        vars.get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let model_name = lookup(keys::MODEL_NAME).ok_or(ConfigError::MissingModel {
        key: keys::MODEL_NAME,
    })?;

    let mut workspace_url = lookup(keys::WORKSPACE_URL).or_else(|| lookup(keys::HOST));
    let mut credentials = Credentials {
        token: lookup(keys::TOKEN),
        profile: lookup(keys::PROFILE),
    };
    if credentials.token.is_none() {
        if let Some(profile_name) = credentials.profile.as_deref() {
            let path = credentials_path(lookup(keys::CONFIG_FILE).as_deref());
            let profile = load_profile(&path, profile_name)?;
            info!(profile = profile_name, "Using credentials from profile");
            credentials.token = profile.token;
            if workspace_url.is_none() {
                workspace_url = profile.host;
            }
        }
    }

    let managed_paths = lookup(keys::MANAGED_SERVERS)
        .map(|raw| parse_server_list(&raw))
        .unwrap_or_default();
    let external_urls = lookup(keys::EXTERNAL_SERVERS)
        .map(|raw| parse_server_list(&raw))
        .unwrap_or_default();
    if managed_paths.is_empty() && external_urls.is_empty() {
        return Err(ConfigError::NoServers);
    }
    let servers = assemble_servers(workspace_url.as_deref(), &managed_paths, &external_urls)?;
    if servers.iter().any(|server| server.is_managed()) && credentials.bearer().is_none() {
        warn!("Managed MCP servers configured without a token; requests will be unauthenticated");
    }

    let mut agent = AgentSettings::default();
    if let Some(prompt) = lookup(keys::SYSTEM_PROMPT) {
        agent.system_prompt = prompt;
    }
    if let Some(raw) = lookup(keys::MAX_ITERATIONS) {
        agent.max_iterations = parse_number(keys::MAX_ITERATIONS, &raw)?;
    }

    let mut tools = ToolSettings::default();
    if let Some(raw) = lookup(keys::TOOL_TIMEOUT) {
        tools.timeout = Duration::from_secs(parse_number(keys::TOOL_TIMEOUT, &raw)?);
    }
    if let Some(raw) = lookup(keys::REQUIRE_ALL_SERVERS) {
        tools.require_all_servers = parse_flag(keys::REQUIRE_ALL_SERVERS, &raw)?;
    }

    let mut tracing = TracingSettings::default();
    if let Some(raw) = lookup(keys::ENABLE_TRACING) {
        tracing.enabled = parse_flag(keys::ENABLE_TRACING, &raw)?;
    }
    if let Some(uri) = lookup(keys::TRACKING_URI) {
        tracing.tracking_uri = uri;
    }
    tracing.experiment_name = lookup(keys::EXPERIMENT_NAME);
    if let Some(raw) = lookup(keys::EXPORT_TIMEOUT) {
        tracing.export_timeout = Duration::from_secs(parse_number(keys::EXPORT_TIMEOUT, &raw)?);
    }

    let settings = Settings {
        workspace_url,
        credentials,
        model: ModelSettings {
            name: model_name,
            endpoint_url: lookup(keys::MODEL_ENDPOINT_URL),
        },
        servers,
        agent,
        tools,
        tracing,
    };
    settings.validate()?;

    debug!(
        model = settings.model.name.as_str(),
        servers = settings.servers.len(),
        tracing = settings.tracing.enabled,
        "Settings loaded"
    );
    Ok(settings)
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        expected: "a non-negative integer",
    })
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            expected: "true or false",
        }),
    }
}
