mod credentials;
mod defaults;
mod error;
pub mod keys;
mod loader;
mod server;
mod settings;

pub use credentials::{Credentials, Profile, credentials_path, load_profile};
pub use defaults::*;
pub use error::ConfigError;
pub use loader::ensure_env_loaded;
pub use server::{
    ServerConfig, ServerKind, build_managed_urls, normalize_server_path, parse_server_list,
};
pub use settings::{AgentSettings, ModelSettings, Settings, ToolSettings, TracingSettings};
