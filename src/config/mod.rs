use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `api_url` from the config file
pub const API_URL_ENV: &str = "DISASTERSCOPE_API_URL";

const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Optional colour overrides, as `#RRGGBB` or `#RGB`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ThemeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub danger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_dim: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Backend base URL, including the `/api` prefix
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Rows fetched per history tab
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Entries shown in the recent feedback list
    #[serde(default = "default_recent_feedback_limit")]
    pub recent_feedback_limit: usize,

    /// Sent with feedback submissions (the app itself is anonymous)
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Per-request timeout. Unset means the HTTP client's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub theme: ThemeConfig,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_history_limit() -> usize {
    20
}

fn default_recent_feedback_limit() -> usize {
    crate::api::DEFAULT_RECENT_FEEDBACK_LIMIT
}

fn default_user_id() -> String {
    "anonymous".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            history_limit: default_history_limit(),
            recent_feedback_limit: default_recent_feedback_limit(),
            user_id: default_user_id(),
            timeout_secs: None,
            theme: ThemeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Directory holding config.toml
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("disasterscope");

        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }
        Ok(dir)
    }

    /// Where TUI-mode logs go, since the terminal owns stdout
    pub fn log_dir() -> PathBuf {
        dirs::cache_dir()
            .or_else(dirs::config_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join("disasterscope")
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location, or create it
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Ok(path) => Ok(Self::load_from(&path)),
            Err(_) => Ok(AppConfig::default()),
        }
    }

    /// Load from `path`. A missing file is created with defaults; an
    /// unreadable or malformed one is logged and replaced by defaults in memory.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => return config.sanitized(),
                    Err(e) => {
                        tracing::warn!("Failed to parse config {}: {}", path.display(), e);
                        return AppConfig::default();
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config {}: {}", path.display(), e);
                    return AppConfig::default();
                }
            }
        }

        let config = AppConfig::default();
        if let Err(e) = config.save_to(path) {
            tracing::warn!("Could not write default config: {}", e);
        }
        config
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&self.clone().sanitized())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Clamp values that would make requests meaningless
    fn sanitized(mut self) -> Self {
        self.api_url = self.api_url.trim().to_string();
        if self.api_url.is_empty() {
            self.api_url = default_api_url();
        }
        if self.history_limit == 0 {
            self.history_limit = default_history_limit();
        }
        if self.recent_feedback_limit == 0 {
            self.recent_feedback_limit = default_recent_feedback_limit();
        }
        if self.user_id.trim().is_empty() {
            self.user_id = default_user_id();
        }
        if self.timeout_secs == Some(0) {
            self.timeout_secs = None;
        }
        self
    }

    /// Apply overrides in precedence order: CLI flag, then environment
    pub fn with_overrides(mut self, cli_api_url: Option<&str>, env_api_url: Option<String>) -> Self {
        if let Some(url) = env_api_url.filter(|u| !u.trim().is_empty()) {
            tracing::debug!("API URL from {}: {}", API_URL_ENV, url);
            self.api_url = url.trim().to_string();
        }
        if let Some(url) = cli_api_url.filter(|u| !u.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig {
            api_url: "https://disaster.example.org/api".to_string(),
            history_limit: 50,
            recent_feedback_limit: 10,
            user_id: "field-team-3".to_string(),
            timeout_secs: Some(15),
            theme: ThemeConfig {
                danger: Some("#ff0000".to_string()),
                ..Default::default()
            },
        };

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(config, deserialized);
        assert_eq!(deserialized.timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str("api_url = \"http://10.0.0.5:8000/api\"").unwrap();
        assert_eq!(config.api_url, "http://10.0.0.5:8000/api");
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.recent_feedback_limit, 50);
        assert_eq!(config.user_id, "anonymous");
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from(&path);
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("api_url = \"http://localhost:8000/api\""));
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "history_limit = \"lots\"").unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_zero_values_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "history_limit = 0\ntimeout_secs = 0\nuser_id = \"  \"").unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.timeout_secs, None);
        assert_eq!(config.user_id, "anonymous");
    }

    #[test]
    fn test_override_precedence() {
        let base = AppConfig::default();

        let env_only = base.clone().with_overrides(None, Some("http://env:8000/api".into()));
        assert_eq!(env_only.api_url, "http://env:8000/api");

        let both = base
            .clone()
            .with_overrides(Some("http://cli:9000/api"), Some("http://env:8000/api".into()));
        assert_eq!(both.api_url, "http://cli:9000/api");

        let blank = base.with_overrides(Some("  "), Some(String::new()));
        assert_eq!(blank.api_url, DEFAULT_API_URL);
    }
}
