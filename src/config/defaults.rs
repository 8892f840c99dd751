pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant with access to various tools. \
Use the tools available to you to answer questions and complete tasks.";
pub const DEFAULT_MAX_ITERATIONS: usize = 25;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TRACKING_URI: &str = "databricks";
pub const DEFAULT_EXPORT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CREDENTIALS_FILE: &str = "~/.databrickscfg";
pub const DEFAULT_ENV_FILE: &str = ".env";
