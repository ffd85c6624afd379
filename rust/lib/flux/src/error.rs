use thiserror::Error;

/// Failures of the persistent-storage collaborator.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("storage error: {0}")]
    Backend(String),
}

/// Errors surfaced by the fallible store persistence methods.
///
/// The non-`try_` persistence methods log these and swallow them.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("persisted slot '{0}' does not hold a JSON object")]
    Malformed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A component failed inside its render or init hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("component '{component}' failed: {message}")]
pub struct ComponentError {
    pub component: String,
    pub message: String,
}

impl ComponentError {
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Configuration could not be read or is invalid.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration:\n{}", .0.iter().map(|e| format!("- {}", e)).collect::<Vec<_>>().join("\n"))]
    Invalid(Vec<String>),
}

/// Translation dictionaries could not be loaded.
#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("failed to read translations: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid dictionary {file}: {source}")]
    Parse {
        file: String,
        source: serde_json::Error,
    },
}

/// Fatal start-up failures. Each of these aborts the bootstrap sequence and
/// replaces the page with the static start-up error view.
#[derive(Error, Debug)]
pub enum BootError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("required components are not registered: {}", .0.join(", "))]
    MissingComponents(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_error_display() {
        let err = ComponentError::new("Dashboard", "status fetch failed");
        assert_eq!(
            err.to_string(),
            "component 'Dashboard' failed: status fetch failed"
        );
    }

    #[test]
    fn missing_components_lists_names() {
        let err = BootError::MissingComponents(vec!["chat".into(), "explorer".into()]);
        assert_eq!(
            err.to_string(),
            "required components are not registered: chat, explorer"
        );
    }

    #[test]
    fn invalid_config_lists_each_problem() {
        let err = ConfigError::Invalid(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "invalid configuration:\n- a\n- b");
    }

    #[test]
    fn store_error_wraps_storage() {
        let err: StoreError = StorageError::QuotaExceeded("app".into()).into();
        assert_eq!(err.to_string(), "storage quota exceeded: app");
    }
}
