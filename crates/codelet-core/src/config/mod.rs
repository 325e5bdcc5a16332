//! Persistent application configuration.
//!
//! Configuration is an explicit structure with named fields and defaults,
//! stored as a single JSON file. Remote credentials live here; they are only
//! ever read by the sync cycle and never shared mutably across threads.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::util::{is_http_url, normalize_text_option};

/// Credentials and endpoint for the WebDAV remote.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDavConfig {
    pub username: String,
    pub password: String,
    pub url: String,
}

impl fmt::Debug for WebDavConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WebDavConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("url", &self.url)
            .finish()
    }
}

impl WebDavConfig {
    /// Whether all fields are filled in.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty()
            && !self.password.trim().is_empty()
            && !self.url.trim().is_empty()
    }

    /// Cheap pre-flight check used to short-circuit a sync attempt when the
    /// credentials are known bad. No network access.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_complete() && is_http_url(self.url.trim())
    }

    /// The endpoint URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.url.trim().trim_end_matches('/').to_string()
    }
}

/// Editor mode applied when opening a snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    #[default]
    Readonly,
    Editable,
}

/// Application configuration with defaults for every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// WebDAV remote used for backup sync
    pub webdav: WebDavConfig,
    /// Syntax tag assigned to new snippets when none is given
    pub default_lang: String,
    /// Mode snippets open in
    pub editor_default_mode: EditorMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webdav: WebDavConfig::default(),
            default_lang: "text".to_string(),
            editor_default_mode: EditorMode::Readonly,
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let body = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Save configuration to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `CODELET_WEBDAV_URL`/`CODELET_WEBDAV_USERNAME`/
    /// `CODELET_WEBDAV_PASSWORD` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = env_override("CODELET_WEBDAV_URL") {
            self.webdav.url = url;
        }
        if let Some(username) = env_override("CODELET_WEBDAV_USERNAME") {
            self.webdav.username = username;
        }
        if let Some(password) = env_override("CODELET_WEBDAV_PASSWORD") {
            self.webdav.password = password;
        }
    }
}

fn env_override(name: &str) -> Option<String> {
    normalize_text_option(std::env::var(name).ok())
}
