//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{AppConfig, Mode};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values that take precedence over the config file (CLI flags or env vars).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub mode: Option<Mode>,
}

impl Overrides {
    fn apply(self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(url) = self.database_url {
            config.database_url = url;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
    }
}

/// Build the effective configuration: defaults, then the optional file,
/// then overrides. The result is validated once, after all layers apply.
pub fn resolve(path: Option<&Path>, overrides: Overrides) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => AppConfig::default(),
    };
    overrides.apply(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn overrides_beat_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_url = \"sqlite:from-file.db\"\n[listener]\nport = 9000").unwrap();

        let config = resolve(
            Some(file.path()),
            Overrides {
                port: Some(7000),
                mode: Some(Mode::Development),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(config.listener.port, 7000);
        assert_eq!(config.database_url, "sqlite:from-file.db");
        assert_eq!(config.mode, Mode::Development);
    }

    #[test]
    fn invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timeouts]\nrequest_ms = 0").unwrap();

        let err = resolve(Some(file.path()), Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("timeouts.request_ms"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = resolve(Some(Path::new("/nonexistent/jqplay.toml")), Overrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
