use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Root application configuration, loaded from `~/.config/bookinfo/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub lookup: LookupConfig,
    pub retry: RetryConfig,
    pub extraction: ExtractionConfig,
}

/// Bibliographic lookup service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub base_url: String,
    pub max_results: u32,
    pub timeout_secs: u64,
    /// Minimum spacing between two requests from this process.
    pub min_interval_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub multiplier: u32,
    pub max_delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Pages of PDF text scanned by the full-text fallback.
    pub max_pages: usize,
    pub cover_dpi: u32,
    /// Upper bound for external tools (pdftotext, pdftoppm, mutool).
    pub tool_timeout_secs: u64,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            api_key_env: "GOOGLE_BOOKS_API_KEY".to_string(),
            base_url: "https://www.googleapis.com/books/v1".to_string(),
            max_results: 5,
            timeout_secs: 30,
            min_interval_ms: 0,
            user_agent: concat!("bookinfo/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2,
            multiplier: 2,
            max_delay_secs: 10,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_pages: 5,
            cover_dpi: 200,
            tool_timeout_secs: 20,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/bookinfo/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("BOOKINFO_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("bookinfo")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(CoreError::ConfigError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.lookup.max_results == 0 {
            return Err(CoreError::ConfigError(
                "lookup.max_results must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// API key from the configured environment variable, if set and non-blank.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.lookup.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

impl ExtractionConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.lookup.max_results, 5);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.base_delay(), Duration::from_secs(2));
        assert_eq!(cfg.retry.max_delay(), Duration::from_secs(10));
        assert_eq!(cfg.extraction.max_pages, 5);
        assert_eq!(cfg.extraction.cover_dpi, 200);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.lookup.min_interval_ms = 250;
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retry]\nmax_attempts = 5\n").unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.retry.max_attempts, 5);
        assert_eq!(loaded.retry.multiplier, 2);
        assert_eq!(loaded.lookup.api_key_env, "GOOGLE_BOOKS_API_KEY");
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retry]\nmax_attempts = 0\n").unwrap();

        assert!(matches!(
            AppConfig::load_from(&path),
            Err(CoreError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg =
            AppConfig::load_from(Path::new("/tmp/nonexistent_bookinfo_config.toml")).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_api_key_missing_env_is_none() {
        let mut cfg = AppConfig::default();
        cfg.lookup.api_key_env = "BOOKINFO_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        assert_eq!(cfg.api_key(), None);
    }
}
