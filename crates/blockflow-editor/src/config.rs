use std::path::{Path, PathBuf};

use blockflow_layout::LayoutConfig;
use blockflow_store::{PollConfig, SaveConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors that can occur while reading the editor configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Toml {
    path: PathBuf,
    source: toml::de::Error,
  },
}

/// Editor settings, read from `~/.blockflow/config.toml`.
///
/// Every section is optional; omitted sections and fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
  pub layout: LayoutConfig,
  pub save: SaveConfig,
  pub poll: PollConfig,
}

impl EditorConfig {
  /// The default config location, if a home directory is known.
  pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".blockflow").join("config.toml"))
  }

  /// Read a config file. A missing file is an error.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&content, path)
  }

  /// Read a config file, falling back to defaults when it does not exist.
  pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
    match std::fs::read_to_string(path) {
      Ok(content) => Self::parse(&content, path),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no config file, using defaults");
        Ok(Self::default())
      }
      Err(source) => Err(ConfigError::Io {
        path: path.to_path_buf(),
        source,
      }),
    }
  }

  fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Toml {
      path: path.to_path_buf(),
      source,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
      &path,
      r#"
[layout]
spacing = 64.0

[poll]
max_attempts = 3
"#,
    )
    .unwrap();

    let config = EditorConfig::load(&path).unwrap();
    assert_eq!(config.layout.spacing, 64.0);
    assert_eq!(config.layout.margin_top, LayoutConfig::default().margin_top);
    assert_eq!(config.poll.max_attempts, 3);
    assert_eq!(config.poll.interval_ms, PollConfig::default().interval_ms);
    assert_eq!(config.save, SaveConfig::default());
  }

  #[test]
  fn test_empty_file_is_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "").unwrap();

    assert_eq!(EditorConfig::load(&path).unwrap(), EditorConfig::default());
  }

  #[test]
  fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    assert!(matches!(EditorConfig::load(&path), Err(ConfigError::Io { .. })));
    assert_eq!(EditorConfig::load_or_default(&path).unwrap(), EditorConfig::default());
  }

  #[test]
  fn test_malformed_file_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[layout\nspacing = ").unwrap();

    let err = EditorConfig::load_or_default(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Toml { .. }));
    assert!(err.to_string().contains("config.toml"));
  }
}
