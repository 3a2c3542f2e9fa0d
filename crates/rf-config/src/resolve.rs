//! Configuration file resolution.
//!
//! Precedence: explicit CLI path, then `RF_CONFIG`, then the XDG config
//! directory, then built-in defaults. An explicit path that does not exist
//! is an error; the XDG location is only used when the file is present.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::snapshot::ConfigSnapshot;
use crate::validate::{validate_config, ValidationError};

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "RF_CONFIG";

/// File name inside the XDG config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

const APP_DIR: &str = "race_features";

/// Where the effective configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Cli,
    Env,
    Xdg,
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Cli => write!(f, "cli"),
            ConfigSource::Env => write!(f, "env"),
            ConfigSource::Xdg => write!(f, "xdg"),
            ConfigSource::Default => write!(f, "default"),
        }
    }
}

/// Candidate config locations, gathered before anything is read.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub cli: Option<PathBuf>,
    pub env: Option<PathBuf>,
    pub xdg: Option<PathBuf>,
}

impl ConfigPaths {
    /// Gather candidates from the process environment.
    pub fn discover(cli: Option<&Path>) -> Self {
        Self {
            cli: cli.map(Path::to_path_buf),
            env: std::env::var_os(CONFIG_ENV_VAR)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            xdg: dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE_NAME)),
        }
    }

    /// Pick the file to load, honouring precedence.
    pub fn select(&self) -> Result<Option<(ConfigSource, PathBuf)>, ValidationError> {
        if let Some(path) = &self.cli {
            return require_exists(path, ConfigSource::Cli).map(Some);
        }
        if let Some(path) = &self.env {
            return require_exists(path, ConfigSource::Env).map(Some);
        }
        if let Some(path) = &self.xdg {
            if path.is_file() {
                return Ok(Some((ConfigSource::Xdg, path.clone())));
            }
        }
        Ok(None)
    }
}

fn require_exists(path: &Path, source: ConfigSource) -> Result<(ConfigSource, PathBuf), ValidationError> {
    if path.is_file() {
        Ok((source, path.to_path_buf()))
    } else {
        Err(ValidationError::IoError(format!(
            "config file from {} not found: {}",
            source,
            path.display()
        )))
    }
}

/// Resolve, load and validate the engine configuration.
pub fn resolve_config(cli: Option<&Path>) -> Result<(EngineConfig, ConfigSnapshot), ValidationError> {
    resolve_from(&ConfigPaths::discover(cli))
}

/// Resolve from explicit candidates. Used directly by tests.
pub fn resolve_from(paths: &ConfigPaths) -> Result<(EngineConfig, ConfigSnapshot), ValidationError> {
    let (config, source, path) = match paths.select()? {
        Some((source, path)) => (EngineConfig::from_file(&path)?, source, Some(path)),
        None => (EngineConfig::default(), ConfigSource::Default, None),
    };
    validate_config(&config).into_result()?;
    let snapshot = ConfigSnapshot::capture(&config, source, path)?;
    Ok((config, snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn no_candidates_yields_defaults() {
        let (config, snapshot) = resolve_from(&ConfigPaths::default()).unwrap();
        assert_eq!(config.sanity_bound, 50);
        assert_eq!(snapshot.source, ConfigSource::Default);
        assert!(snapshot.path.is_none());
    }

    #[test]
    fn cli_beats_env_and_xdg() {
        let dir = TempDir::new().unwrap();
        let cli = write_config(&dir, "cli.json", r#"{"sanity_bound": 20}"#);
        let env = write_config(&dir, "env.json", r#"{"sanity_bound": 30}"#);
        let xdg = write_config(&dir, "xdg.json", r#"{"sanity_bound": 40}"#);
        let paths = ConfigPaths {
            cli: Some(cli.clone()),
            env: Some(env),
            xdg: Some(xdg),
        };
        let (config, snapshot) = resolve_from(&paths).unwrap();
        assert_eq!(config.sanity_bound, 20);
        assert_eq!(snapshot.source, ConfigSource::Cli);
        assert_eq!(snapshot.path, Some(cli));
    }

    #[test]
    fn env_beats_xdg() {
        let dir = TempDir::new().unwrap();
        let env = write_config(&dir, "env.json", r#"{"sanity_bound": 30}"#);
        let xdg = write_config(&dir, "xdg.json", r#"{"sanity_bound": 40}"#);
        let paths = ConfigPaths {
            cli: None,
            env: Some(env),
            xdg: Some(xdg),
        };
        let (config, snapshot) = resolve_from(&paths).unwrap();
        assert_eq!(config.sanity_bound, 30);
        assert_eq!(snapshot.source, ConfigSource::Env);
    }

    #[test]
    fn missing_xdg_file_falls_through_to_defaults() {
        let dir = TempDir::new().unwrap();
        let paths = ConfigPaths {
            cli: None,
            env: None,
            xdg: Some(dir.path().join("absent.json")),
        };
        let (_, snapshot) = resolve_from(&paths).unwrap();
        assert_eq!(snapshot.source, ConfigSource::Default);
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        let paths = ConfigPaths {
            cli: Some(dir.path().join("absent.json")),
            env: None,
            xdg: None,
        };
        assert!(matches!(
            resolve_from(&paths),
            Err(ValidationError::IoError(_))
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let cli = write_config(&dir, "bad.json", r#"{"backfill": {"batch_size": 0}}"#);
        let paths = ConfigPaths {
            cli: Some(cli),
            ..Default::default()
        };
        assert!(matches!(
            resolve_from(&paths),
            Err(ValidationError::InvalidValue { .. })
        ));
    }
}
