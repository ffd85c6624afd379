//! Application configuration, read from a TOML file.
//!
//! ```toml
//! [app]
//! title = "Indian Ocean ARGO Explorer"
//! default_route = "/"
//!
//! [api]
//! base_url = "http://localhost:8002"
//! timeout_secs = 10
//!
//! [i18n]
//! default_language = "en"
//!
//! [shortcuts]
//! "alt+h" = "/"
//! ```
//!
//! Every field has a default, so a missing file or section is fine.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub api: ApiSection,
    pub i18n: I18nSection,
    /// Key chord (e.g. `"alt+d"`) to route path.
    pub shortcuts: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub title: String,
    /// Route used when the location has no registered component.
    pub default_route: String,
    /// Persistent slot the store is saved to.
    pub storage_slot: String,
    pub history_limit: usize,
    /// Notifications kept visible at once.
    pub max_notifications: usize,
    /// Error notifications shown per session for uncaught errors.
    pub max_error_notifications: usize,
    /// Component names that must be registered for start-up to succeed.
    pub required_components: Vec<String>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            title: "Indian Ocean ARGO Explorer".to_string(),
            default_route: "/".to_string(),
            storage_slot: "argo-app-state".to_string(),
            history_limit: 50,
            max_notifications: 5,
            max_error_notifications: 3,
            required_components: vec![
                "Home".to_string(),
                "Dashboard".to_string(),
                "Chat".to_string(),
                "Explorer".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    /// Backend base URL. Empty means offline.
    pub base_url: String,
    pub timeout_secs: u64,
    /// Timeout for natural-language queries, which run an LLM.
    pub query_timeout_secs: u64,
    /// Total attempts per request, including the first.
    pub attempts: u32,
    /// First retry delay; doubles on every further retry.
    pub backoff_ms: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout_secs: 10,
            query_timeout_secs: 45,
            attempts: 3,
            backoff_ms: 500,
        }
    }
}

impl ApiSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct I18nSection {
    pub default_language: String,
    pub supported_languages: Vec<String>,
    /// Directory of `{locale}.json` dictionaries. Optional.
    pub dir: Option<String>,
}

impl Default for I18nSection {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            supported_languages: ["en", "hi", "bn", "ta", "te"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            dir: None,
        }
    }
}

impl AppConfig {
    /// Load and validate config from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::with_default_shortcuts());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate config from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(content)?;
        if config.shortcuts.is_empty() {
            config.shortcuts = default_shortcuts();
        }
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus the standard navigation shortcuts.
    pub fn with_default_shortcuts() -> Self {
        Self {
            shortcuts: default_shortcuts(),
            ..Self::default()
        }
    }

    /// Check cross-field constraints; collects every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if !self.app.default_route.starts_with('/') {
            problems.push(format!(
                "app.default_route must start with '/', got '{}'",
                self.app.default_route
            ));
        }
        if self.app.storage_slot.trim().is_empty() {
            problems.push("app.storage_slot must not be empty".to_string());
        }
        if self.app.history_limit == 0 {
            problems.push("app.history_limit must be at least 1".to_string());
        }
        if self.app.max_notifications == 0 {
            problems.push("app.max_notifications must be at least 1".to_string());
        }
        if self.api.attempts == 0 {
            problems.push("api.attempts must be at least 1".to_string());
        }
        if self.api.timeout_secs == 0 {
            problems.push("api.timeout_secs must be at least 1".to_string());
        }
        if !self
            .i18n
            .supported_languages
            .contains(&self.i18n.default_language)
        {
            problems.push(format!(
                "i18n.default_language '{}' is not in supported_languages",
                self.i18n.default_language
            ));
        }
        for (chord, route) in &self.shortcuts {
            if crate::events::KeyChord::parse(chord).is_none() {
                problems.push(format!("shortcut '{}' is not a valid key chord", chord));
            }
            if !route.starts_with('/') {
                problems.push(format!("shortcut '{}' route must start with '/'", chord));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }
}

fn default_shortcuts() -> BTreeMap<String, String> {
    [
        ("alt+h", "/"),
        ("alt+d", "/dashboard"),
        ("alt+c", "/chat"),
        ("alt+e", "/explorer"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.app.default_route, "/");
        assert_eq!(config.app.history_limit, 50);
        assert_eq!(config.api.attempts, 3);
        assert_eq!(config.i18n.default_language, "en");
        assert_eq!(config.shortcuts.get("alt+d").map(String::as_str), Some("/dashboard"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::parse(
            r#"
            [app]
            title = "ARGO"

            [api]
            base_url = "http://argo.internal:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.app.title, "ARGO");
        assert_eq!(config.app.storage_slot, "argo-app-state");
        assert_eq!(config.api.base_url, "http://argo.internal:9000");
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn custom_shortcuts_replace_defaults() {
        let config = AppConfig::parse(
            r#"
            [shortcuts]
            "ctrl+p" = "/profiles"
            "#,
        )
        .unwrap();
        assert_eq!(config.shortcuts.len(), 1);
        assert_eq!(config.shortcuts["ctrl+p"], "/profiles");
    }

    #[test]
    fn validation_collects_every_problem() {
        let err = AppConfig::parse(
            r#"
            [app]
            default_route = "home"
            history_limit = 0

            [i18n]
            default_language = "fr"
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Invalid(problems) => {
                assert_eq!(problems.len(), 3);
                assert!(problems[0].contains("default_route"));
                assert!(problems[1].contains("history_limit"));
                assert!(problems[2].contains("'fr'"));
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn bad_shortcut_is_rejected() {
        let err = AppConfig::parse(
            r#"
            [shortcuts]
            "hyper+q" = "/"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn syntax_error_is_parse_error() {
        assert!(matches!(
            AppConfig::parse("[app\ntitle = 1").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.app.default_route, "/");
        assert_eq!(config.shortcuts.len(), 4);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("argo.toml");
        std::fs::write(&path, "[app]\ntitle = \"From file\"\n").unwrap();
        assert_eq!(AppConfig::load(&path).unwrap().app.title, "From file");
    }
}
