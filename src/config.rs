// Configuration loader
//
// Settings are layered: built-in defaults, then a TOML file, then
// environment variables, then command line flags (applied by the binary).
//
// File locations:
// `--config <path>` must exist. Without it the loader probes, in order:
// 1. `./alloy-attach.toml`
// 2. `<user config dir>/alloy-attach/config.toml`
//
// and falls back to defaults when neither exists.
//
// Environment variables:
// - `ALLOY_API_URL`: API base URL
// - `ALLOY_CLIENT_ID` / `ALLOY_CLIENT_SECRET`: client credentials
// - `ALLOY_MAX_TRIES`: attempts per call, `0` or negative for unlimited
// - `ALLOY_AUDIT_ID_FILE`: file holding the local audit id

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::invoker::{ApiSettings, RetryLimit, DEFAULT_RETRY_DELAY};

const FILE_NAME: &str = "alloy-attach.toml";
const APP_DIR: &str = "alloy-attach";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid configuration value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Client credentials for the token grant. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self { client_id: client_id.into(), client_secret: client_secret.into() }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub computer: ComputerConfig,
    pub audit: AuditConfig,
    pub attachment: AttachmentConfig,
}

#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Attempts per call; `0` or negative retries forever.
    pub max_tries: i64,
    pub retry_delay_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            client_id: None,
            client_secret: None,
            max_tries: 5,
            retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("max_tries", &self.max_tries)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .finish()
    }
}

/// Field names and value sets used to find the local computer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComputerConfig {
    pub types: Vec<String>,
    pub inactive_statuses: Vec<String>,
    pub id_field: String,
    pub audit_id_field: String,
    pub serial_field: String,
    pub type_field: String,
    pub status_field: String,
}

impl Default for ComputerConfig {
    fn default() -> Self {
        Self {
            types: vec!["Desktop".into(), "Laptop".into()],
            inactive_statuses: vec!["Inactive".into(), "Missing".into(), "Retired".into()],
            id_field: "ID".into(),
            audit_id_field: "Audit_ID".into(),
            serial_field: "Serial_Number".into(),
            type_field: "Type".into(),
            status_field: "Status".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    pub id_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttachmentConfig {
    pub description: String,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self { description: "Uploaded by alloy-attach".into() }
    }
}

impl AppConfig {
    /// Load from `path`, or from the first probed location that exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match probe_config_paths().into_iter().find(|p| p.is_file()) {
                Some(found) => Self::from_file(&found)?,
                None => {
                    tracing::debug!("no config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config = toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Overlay environment variables read through `lookup`.
    pub fn with_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("ALLOY_API_URL") {
            self.api.base_url = Some(url);
        }
        if let Some(id) = var("ALLOY_CLIENT_ID") {
            self.api.client_id = Some(id);
        }
        if let Some(secret) = var("ALLOY_CLIENT_SECRET") {
            self.api.client_secret = Some(secret);
        }
        if let Some(tries) = var("ALLOY_MAX_TRIES") {
            self.api.max_tries = tries.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "ALLOY_MAX_TRIES",
                message: format!("{}", e),
            })?;
        }
        if let Some(file) = var("ALLOY_AUDIT_ID_FILE") {
            self.audit.id_file = Some(PathBuf::from(file));
        }
        Ok(self)
    }

    /// Resolve the connection settings, failing on anything still missing.
    pub fn api_settings(&self) -> Result<ApiSettings, ConfigError> {
        let base_url = required(&self.api.base_url, "api.base_url")?;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "api.base_url",
                message: format!("expected an http(s) URL, got {:?}", base_url),
            });
        }
        let client_id = required(&self.api.client_id, "api.client_id")?;
        let client_secret = required(&self.api.client_secret, "api.client_secret")?;

        Ok(ApiSettings {
            base_url: base_url.to_string(),
            credentials: Credentials::new(client_id, client_secret),
            retry_limit: RetryLimit::from_max_tries(self.api.max_tries),
        })
    }
}

fn required<'a>(value: &'a Option<String>, key: &'static str) -> Result<&'a str, ConfigError> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).ok_or(ConfigError::Missing(key))
}

fn probe_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join(APP_DIR).join("config.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_cover_computer_search() {
        let config = AppConfig::default();
        assert_eq!(config.computer.types, vec!["Desktop", "Laptop"]);
        assert_eq!(config.computer.inactive_statuses, vec!["Inactive", "Missing", "Retired"]);
        assert_eq!(config.api.max_tries, 5);
        assert_eq!(config.api.retry_delay_secs, 10);
    }

    #[test]
    fn parses_partial_file_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[api]
base_url = "https://alloy.example.com/api"
client_id = "abc"
max_tries = 0

[computer]
types = ["Desktop", "Laptop", "Tablet"]
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();

        assert_eq!(config.api.base_url.as_deref(), Some("https://alloy.example.com/api"));
        assert_eq!(config.api.max_tries, 0);
        assert_eq!(config.computer.types.len(), 3);
        assert_eq!(config.computer.serial_field, "Serial_Number");
    }

    #[test]
    fn parse_error_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nmax_tries = \"many\"").unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/alloy-attach.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = AppConfig::default();
        config.api.base_url = Some("https://file/api".into());

        let config = config
            .with_env(env(&[
                ("ALLOY_API_URL", "https://env/api"),
                ("ALLOY_CLIENT_SECRET", "s3cret"),
                ("ALLOY_MAX_TRIES", "-1"),
                ("ALLOY_CLIENT_ID", "  "),
            ]))
            .unwrap();

        assert_eq!(config.api.base_url.as_deref(), Some("https://env/api"));
        assert_eq!(config.api.client_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.api.client_id, None);
        assert_eq!(config.api.max_tries, -1);
    }

    #[test]
    fn bad_max_tries_in_environment_is_rejected() {
        let err = AppConfig::default().with_env(env(&[("ALLOY_MAX_TRIES", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "ALLOY_MAX_TRIES", .. }));
    }

    #[test]
    fn api_settings_require_url_and_credentials() {
        let mut config = AppConfig::default();
        assert!(matches!(config.api_settings(), Err(ConfigError::Missing("api.base_url"))));

        config.api.base_url = Some("https://alloy/api".into());
        config.api.client_id = Some("id".into());
        assert!(matches!(config.api_settings(), Err(ConfigError::Missing("api.client_secret"))));

        config.api.client_secret = Some("secret".into());
        config.api.max_tries = 0;
        let settings = config.api_settings().unwrap();
        assert_eq!(settings.credentials.client_id(), "id");
        assert_eq!(settings.retry_limit, RetryLimit::Unlimited);
    }

    #[test]
    fn non_http_base_url_is_invalid() {
        let mut config = AppConfig::default();
        config.api.base_url = Some("alloy.local".into());
        config.api.client_id = Some("id".into());
        config.api.client_secret = Some("secret".into());
        assert!(matches!(config.api_settings(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let mut config = AppConfig::default();
        config.api.client_secret = Some("hunter2".into());
        assert!(!format!("{:?}", config).contains("hunter2"));
        assert!(!format!("{:?}", Credentials::new("id", "hunter2")).contains("hunter2"));
    }
}
