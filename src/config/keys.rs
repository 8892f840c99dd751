//! Environment variable names.

pub const WORKSPACE_URL: &str = "DATABRICKS_WORKSPACE_URL";
pub const HOST: &str = "DATABRICKS_HOST";
pub const TOKEN: &str = "DATABRICKS_TOKEN";
pub const PROFILE: &str = "DATABRICKS_CONFIG_PROFILE";
pub const CONFIG_FILE: &str = "DATABRICKS_CONFIG_FILE";

pub const MODEL_NAME: &str = "DATABRICKS_MODEL_NAME";
pub const MODEL_ENDPOINT_URL: &str = "DATABRICKS_MODEL_ENDPOINT_URL";

pub const MANAGED_SERVERS: &str = "DATABRICKS_MCP_SERVERS";
pub const EXTERNAL_SERVERS: &str = "EXTERNAL_MCP_SERVERS";

pub const SYSTEM_PROMPT: &str = "AGENT_SYSTEM_PROMPT";
pub const MAX_ITERATIONS: &str = "AGENT_MAX_ITERATIONS";

pub const TOOL_TIMEOUT: &str = "MCP_TOOL_TIMEOUT_SECS";
pub const REQUIRE_ALL_SERVERS: &str = "MCP_REQUIRE_ALL_SERVERS";

pub const ENABLE_TRACING: &str = "MLFLOW_ENABLE_TRACING";
pub const TRACKING_URI: &str = "MLFLOW_TRACKING_URI";
pub const EXPERIMENT_NAME: &str = "MLFLOW_EXPERIMENT_NAME";
pub const EXPORT_TIMEOUT: &str = "MLFLOW_EXPORT_TIMEOUT";
