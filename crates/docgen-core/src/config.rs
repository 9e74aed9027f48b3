//! Configuration management for docgen.
//!
//! Loads configuration from ${DOCGEN_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// How the backend encodes the `doc_content` field of `/api/get_doc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocEncoding {
    /// Content is the document text itself (default)
    #[default]
    Plain,
    /// Content is standard base64 of the UTF-8 document text
    Base64,
}

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for docgen configuration and session files.
    //!
    //! DOCGEN_HOME resolution order:
    //! 1. DOCGEN_HOME environment variable (if set)
    //! 2. ~/.config/docgen (default)

    use std::path::PathBuf;

    /// Returns the docgen home directory.
    ///
    /// Checks DOCGEN_HOME env var first, falls back to ~/.config/docgen.
    /// Falls back to a relative `.docgen` when no home directory is known.
    pub fn docgen_home() -> PathBuf {
        if let Ok(home) = std::env::var("DOCGEN_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".docgen"),
            |h| h.join(".config").join("docgen"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        docgen_home().join("config.toml")
    }

    /// Returns the path to the persisted session file.
    pub fn session_path() -> PathBuf {
        docgen_home().join("session.json")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the documentation backend
    pub backend_url: String,
    /// GitHub OAuth app client id
    pub github_client_id: String,
    /// Scope requested from GitHub
    pub github_scope: String,
    /// Atlassian OAuth app client id
    pub confluence_client_id: String,
    /// Redirect URI registered with both providers
    pub redirect_uri: String,
    /// Encoding of `doc_content` in backend responses
    pub doc_encoding: DocEncoding,
}

impl Config {
    pub const DEFAULT_BACKEND_URL: &'static str = "http://localhost:5000";
    pub const DEFAULT_GITHUB_SCOPE: &'static str = "repo";
    pub const DEFAULT_REDIRECT_URI: &'static str = "http://localhost:3000/";

    /// Loads configuration from the default location and applies
    /// environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&paths::config_path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Overlays `DOCGEN_*` variables onto the loaded values.
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("DOCGEN_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(id) = non_empty("DOCGEN_GITHUB_CLIENT_ID") {
            self.github_client_id = id;
        }
        if let Some(id) = non_empty("DOCGEN_CONFLUENCE_CLIENT_ID") {
            self.confluence_client_id = id;
        }
    }

    /// Host and port the redirect URI points at, for the local callback
    /// listener.
    ///
    /// # Errors
    /// Returns an error if the redirect URI is not an absolute http URL.
    pub fn redirect_listen_addr(&self) -> Result<(String, u16)> {
        let url = url::Url::parse(&self.redirect_uri)
            .with_context(|| format!("Invalid redirect_uri: {}", self.redirect_uri))?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("redirect_uri has no host: {}", self.redirect_uri))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| anyhow::anyhow!("redirect_uri has no port: {}", self.redirect_uri))?;
        let host = if host == "localhost" { "127.0.0.1" } else { host };
        Ok((host.to_string(), port))
    }

    /// Initializes a new config file with default values.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: Self::DEFAULT_BACKEND_URL.to_string(),
            github_client_id: String::new(),
            github_scope: Self::DEFAULT_GITHUB_SCOPE.to_string(),
            confluence_client_id: String::new(),
            redirect_uri: Self::DEFAULT_REDIRECT_URI.to_string(),
            doc_encoding: DocEncoding::Plain,
        }
    }
}
