// Configuration Management
//
// This crate handles configuration loading for the federated sign-in engine
// and its reference host. It provides:
// - Configuration structs and deserialization
// - File and environment loading logic
// - Default configuration values
//
// This keeps configuration concerns separate from protocol logic.

use std::path::Path;
use thiserror::Error;

pub mod types;

// Re-export all configuration types
pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found. Tried paths: {paths}")]
    FileNotFound { paths: String },

    #[error("Failed to read configuration file: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[from]
        source: serde_yaml::Error,
    },
}

const CONFIG_PATHS: [&str; 3] = ["config/config.yaml", "config.yaml", "config/default.yaml"];

/// Main configuration loading interface
impl AuthConfig {
    /// Load configuration from YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AuthConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_paths(&CONFIG_PATHS)
    }

    /// Load the first configuration file that exists among `paths`
    pub fn load_from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        for path in paths {
            if path.as_ref().exists() {
                return Self::load_from_file(path);
            }
        }

        Err(ConfigError::FileNotFound {
            paths: paths
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "csrf:\n  enabled: true\nproviders:\n  facebook:\n    client_id: fb\n    client_secret: shh"
        )
        .unwrap();

        let config = AuthConfig::load_from_file(file.path()).unwrap();
        assert!(config.csrf.enabled);
        assert_eq!(config.credentials_for("facebook").unwrap().client_id, "fb");
    }

    #[test]
    fn test_load_reports_all_tried_paths() {
        let dir = tempfile::tempdir().unwrap();
        let missing = [dir.path().join("a.yaml"), dir.path().join("b.yaml")];

        let err = AuthConfig::load_from_paths(&missing).unwrap_err();
        match err {
            ConfigError::FileNotFound { paths } => {
                assert!(paths.contains("a.yaml"));
                assert!(paths.contains("b.yaml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_first_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("second.yaml");
        std::fs::write(&second, "callback_base_url: \"http://localhost:3000\"\n").unwrap();

        let config =
            AuthConfig::load_from_paths(&[dir.path().join("first.yaml"), second]).unwrap();
        assert_eq!(
            config.callback_base_url.as_deref(),
            Some("http://localhost:3000")
        );
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "csrf: [not, a, map").unwrap();

        let err = AuthConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
