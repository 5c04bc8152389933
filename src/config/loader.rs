//! Session config discovery and loading from TOML files.

use std::path::{Path, PathBuf};

use super::SessionConfig;

/// File name searched for in the current directory.
pub const LOCAL_CONFIG_FILE: &str = ".claude-session.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "CLAUDE_SESSION_CONFIG";

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config file {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Finds and loads a [`SessionConfig`], falling back to defaults.
///
/// Candidates are tried in order: the file named by `CLAUDE_SESSION_CONFIG`,
/// `./.claude-session.toml`, then `<config dir>/claude-session/config.toml`.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    candidates: Vec<PathBuf>,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let from_env = std::env::var_os(CONFIG_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self {
            candidates: default_candidates(from_env, dirs::config_dir()),
        }
    }

    /// Only ever consult `path`.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            candidates: vec![path],
        }
    }

    /// Load the first candidate that exists, or defaults if none does.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read, parsed, or fails
    /// validation.
    pub fn load(&self) -> Result<SessionConfig, ConfigError> {
        let Some(path) = self.find_config_file() else {
            tracing::debug!(candidates = self.candidates.len(), "No config file found, using defaults");
            return Ok(SessionConfig::default());
        };
        Self::load_from_path(path)
    }

    /// Load and validate one file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_from_path(path: &Path) -> Result<SessionConfig, ConfigError> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SessionConfig =
            toml::from_str(&content).map_err(|source| ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            })?;

        validate(&config).map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate present on disk.
    #[must_use]
    pub fn find_config_file(&self) -> Option<&Path> {
        self.candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|path| path.is_file())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn default_candidates(from_env: Option<PathBuf>, config_dir: Option<PathBuf>) -> Vec<PathBuf> {
    from_env
        .into_iter()
        .chain(std::iter::once(PathBuf::from(LOCAL_CONFIG_FILE)))
        .chain(config_dir.map(|dir| dir.join("claude-session").join("config.toml")))
        .collect()
}

fn validate(config: &SessionConfig) -> Result<(), String> {
    if config.max_turns == Some(0) {
        return Err("max_turns must be at least 1".to_string());
    }
    if config.model.as_deref().is_some_and(|model| model.trim().is_empty()) {
        return Err("model must not be empty".to_string());
    }
    if let Some((name, _)) = config
        .mcp_servers
        .iter()
        .find(|(_, server)| server.command.trim().is_empty())
    {
        return Err(format!("MCP server '{name}' has no command"));
    }
    Ok(())
}
