//! Workspace credentials: a bearer token taken from the environment or from a
//! named profile of the Databricks CLI configuration file.

use super::defaults::DEFAULT_CREDENTIALS_FILE;
use super::error::ConfigError;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
    pub profile: Option<String>,
}

impl Credentials {
    pub fn bearer(&self) -> Option<&str> {
        self.token.as_deref().filter(|token| !token.trim().is_empty())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("profile", &self.profile)
            .finish()
    }
}

/// One `[section]` of the credentials file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub host: Option<String>,
    pub token: Option<String>,
}

pub fn credentials_path(override_path: Option<&str>) -> PathBuf {
    let raw = override_path.unwrap_or(DEFAULT_CREDENTIALS_FILE);
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

pub fn load_profile(path: &Path, profile: &str) -> Result<Profile, ConfigError> {
    debug!(path = %path.display(), profile, "Reading credentials profile");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::CredentialsIo {
        path: path.to_path_buf(),
        source,
    })?;
    let mut sections = parse_profiles(&content);
    sections
        .remove(profile)
        .ok_or_else(|| ConfigError::ProfileNotFound {
            profile: profile.to_string(),
            path: path.to_path_buf(),
        })
}

fn parse_profiles(content: &str) -> HashMap<String, Profile> {
    let mut profiles = HashMap::new();
    let mut current: Option<String> = None;

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            let name = name.trim().to_string();
            profiles.entry(name.clone()).or_insert_with(Profile::default);
            current = Some(name);
            continue;
        }
        let (Some(section), Some((key, value))) = (current.as_ref(), line.split_once('=')) else {
            continue;
        };
        let Some(entry) = profiles.get_mut(section) else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "host" => entry.host = Some(value),
            "token" => entry.token = Some(value),
            _ => {}
        }
    }

    profiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "
# comment
[DEFAULT]
host = https://default.cloud.databricks.com
token = dapi-default

[prod]
host=https://prod.cloud.databricks.com/
token = dapi-prod
cluster_id = abc
";

    #[test]
    fn parses_named_sections() {
        let profiles = parse_profiles(SAMPLE);
        assert_eq!(profiles.len(), 2);
        let prod = &profiles["prod"];
        assert_eq!(prod.host.as_deref(), Some("https://prod.cloud.databricks.com/"));
        assert_eq!(prod.token.as_deref(), Some("dapi-prod"));
    }

    #[test]
    fn loads_profile_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(SAMPLE.as_bytes()).expect("write");

        let profile = load_profile(file.path(), "DEFAULT").expect("profile");
        assert_eq!(profile.token.as_deref(), Some("dapi-default"));

        let missing = load_profile(file.path(), "staging");
        assert!(matches!(missing, Err(ConfigError::ProfileNotFound { .. })));
    }

    #[test]
    fn missing_file_is_reported() {
        let result = load_profile(Path::new("/nonexistent/.databrickscfg"), "DEFAULT");
        assert!(matches!(result, Err(ConfigError::CredentialsIo { .. })));
    }

    #[test]
    fn debug_output_hides_token() {
        let credentials = Credentials {
            token: Some("secret".into()),
            profile: None,
        };
        assert!(!format!("{credentials:?}").contains("secret"));
        assert_eq!(credentials.bearer(), Some("secret"));
    }
}
