//! Service configuration
//!
//! Values come from the environment (optionally seeded by a `.env` file) and
//! can be overridden by CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 800;

/// Connection and session settings for the detection service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Base URL of the detection service (no trailing slash)
    pub base_url: String,

    /// User scope sent with each submission
    pub user_id: Option<String>,

    /// Where exported spreadsheets are saved
    pub export_dir: PathBuf,

    /// Delay between progress pacing points while a job is in flight
    pub progress_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_id: None,
            export_dir: default_export_dir(),
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
        }
    }
}

impl ServiceConfig {
    /// Build a config from `AVIALITY_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("AVIALITY_BASE_URL") {
            config = config.with_base_url(&url)?;
        }

        config.user_id = lookup("AVIALITY_USER_ID")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        if let Some(dir) = lookup("AVIALITY_EXPORT_DIR").filter(|d| !d.trim().is_empty()) {
            config.export_dir = PathBuf::from(dir.trim());
        }

        if let Some(ms) = lookup("AVIALITY_PROGRESS_INTERVAL_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                Error::Config(format!("AVIALITY_PROGRESS_INTERVAL_MS is not a number: {}", ms))
            })?;
            if ms == 0 {
                return Err(Error::Config(
                    "AVIALITY_PROGRESS_INTERVAL_MS must be greater than zero".to_string(),
                ));
            }
            config.progress_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Replace the base URL, validating the scheme
    pub fn with_base_url(mut self, url: &str) -> Result<Self> {
        let url = url.trim().trim_end_matches('/');
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base URL must start with http:// or https://: {}",
                url
            )));
        }
        self.base_url = url.to_string();
        Ok(self)
    }

    /// Absolute URL for a service path such as `/api/process-files`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn default_export_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = ServiceConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.user_id, None);
        assert_eq!(config.progress_interval, Duration::from_millis(800));
    }

    #[test]
    fn test_reads_all_variables() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("AVIALITY_BASE_URL", "https://deid.example.org/"),
            ("AVIALITY_USER_ID", " user-42 "),
            ("AVIALITY_EXPORT_DIR", "/tmp/exports"),
            ("AVIALITY_PROGRESS_INTERVAL_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://deid.example.org");
        assert_eq!(config.user_id.as_deref(), Some("user-42"));
        assert_eq!(config.export_dir, PathBuf::from("/tmp/exports"));
        assert_eq!(config.progress_interval, Duration::from_millis(250));
        assert_eq!(
            config.endpoint("/api/process-files"),
            "https://deid.example.org/api/process-files"
        );
    }

    #[test]
    fn test_blank_user_id_is_none() {
        let config =
            ServiceConfig::from_lookup(lookup_from(&[("AVIALITY_USER_ID", "   ")])).unwrap();
        assert_eq!(config.user_id, None);
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad_url = ServiceConfig::from_lookup(lookup_from(&[("AVIALITY_BASE_URL", "ftp://x")]));
        assert!(matches!(bad_url, Err(Error::Config(_))));

        let bad_ms = ServiceConfig::from_lookup(lookup_from(&[(
            "AVIALITY_PROGRESS_INTERVAL_MS",
            "fast",
        )]));
        assert!(matches!(bad_ms, Err(Error::Config(_))));

        let zero_ms =
            ServiceConfig::from_lookup(lookup_from(&[("AVIALITY_PROGRESS_INTERVAL_MS", "0")]));
        assert!(matches!(zero_ms, Err(Error::Config(_))));
    }
}
