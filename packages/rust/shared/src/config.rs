//! Application configuration for MoodleGet.
//!
//! User config lives at `~/.moodleget/moodleget.toml`.
//! Credentials are never stored in the file; it only names the environment
//! variables that hold them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MoodleGetError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "moodleget.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".moodleget";

// ---------------------------------------------------------------------------
// Config structs (matching moodleget.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Portal location and transport settings.
    #[serde(default)]
    pub portal: PortalConfig,

    /// Where to find the login credentials.
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// `[portal]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Root URL of the Moodle site.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the session cookie set by the portal.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_cookie: default_session_cookie(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://elearning.binadarma.ac.id".into()
}
fn default_session_cookie() -> String {
    "MoodleSession".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[credentials]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Name of the env var holding the username.
    #[serde(default = "default_username_env")]
    pub username_env: String,

    /// Name of the env var holding the password (never store the password itself).
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username_env: default_username_env(),
            password_env: default_password_env(),
        }
    }
}

fn default_username_env() -> String {
    "MOODLE_USERNAME".into()
}
fn default_password_env() -> String {
    "MOODLE_PASSWORD".into()
}

// ---------------------------------------------------------------------------
// Session config (runtime, merged from config file + environment)
// ---------------------------------------------------------------------------

/// Login credentials. `Debug` never prints the password.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Runtime configuration handed to the session manager.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Root URL of the portal, without a trailing slash.
    pub base_url: Url,
    pub credentials: Credentials,
    /// Session cookie name to inject explicitly on service calls.
    pub session_cookie: String,
    pub timeout: Duration,
}

impl SessionConfig {
    /// Build a config for `base_url` with default cookie name and timeout.
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            credentials,
            session_cookie: default_session_cookie(),
            timeout: Duration::from_secs(default_timeout_secs()),
        })
    }

    /// Merge the file config with credentials read from the environment.
    pub fn from_app(config: &AppConfig) -> Result<Self> {
        let username = read_env(&config.credentials.username_env)?;
        let password = read_env(&config.credentials.password_env)?;

        Ok(Self {
            base_url: parse_base_url(&config.portal.base_url)?,
            credentials: Credentials::new(username, password),
            session_cookie: config.portal.session_cookie.clone(),
            timeout: Duration::from_secs(config.portal.timeout_secs),
        })
    }

    /// `<base>/login/index.php`
    pub fn login_url(&self) -> String {
        format!("{}/login/index.php", self.base())
    }

    /// `<base>/my/`, the dashboard used as referer.
    pub fn dashboard_url(&self) -> String {
        format!("{}/my/", self.base())
    }

    /// `<base>/lib/ajax/service.php`
    pub fn service_url(&self) -> String {
        format!("{}/lib/ajax/service.php", self.base())
    }

    fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| MoodleGetError::config(format!("invalid portal base_url '{raw}': {e}")))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(MoodleGetError::config(format!(
            "portal base_url must be http(s), got '{raw}'"
        )));
    }
    Ok(url)
}

fn read_env(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(MoodleGetError::config(format!(
            "credential not found. Set the {var_name} environment variable."
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.moodleget/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MoodleGetError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.moodleget/moodleget.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MoodleGetError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        MoodleGetError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MoodleGetError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MoodleGetError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MoodleGetError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
