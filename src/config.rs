use crate::constants;
use crate::error::SetupError;
use crate::types::CandidateRepository;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, SetupError>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GithubConfig,
    pub repositories: RepositoriesConfig,
    pub acquisition: AcquisitionConfig,
    pub store: StoreConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub api_base: String,
    pub raw_base: String,
    pub timeout_seconds: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: constants::GITHUB_API_BASE.to_string(),
            raw_base: constants::GITHUB_RAW_BASE.to_string(),
            timeout_seconds: constants::DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

/// How a candidate repository is asked whether it hosts an app.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStrategy {
    /// One branch per app id
    #[default]
    Branch,
    /// Code search for the app id, files under `<id>/` on the default branch
    Search,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepositoriesConfig {
    pub candidates: Vec<CandidateRepository>,
    pub probe: ProbeStrategy,
}

impl Default for RepositoriesConfig {
    fn default() -> Self {
        Self {
            candidates: constants::DEFAULT_REPOSITORIES
                .iter()
                .filter_map(|r| r.parse().ok())
                .collect(),
            probe: ProbeStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub max_concurrency: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: constants::DEFAULT_MAX_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub api_base: String,
    pub language: String,
    pub country: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_base: constants::STORE_API_BASE.to_string(),
            language: "english".to_string(),
            country: "US".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub install_dir: Option<PathBuf>,
}

impl Config {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(path)?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.acquisition.max_concurrency == 0 {
            return Err(SetupError::Config(
                "acquisition.max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Token from the config file unless the environment provides one.
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(constants::GITHUB_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.github.token = Some(token);
            }
        }
        if let Ok(dir) = std::env::var(constants::STEAM_PATH_ENV) {
            if !dir.trim().is_empty() {
                self.client.install_dir = Some(PathBuf::from(dir));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.github.api_base, constants::GITHUB_API_BASE);
        assert_eq!(
            config.repositories.candidates.len(),
            constants::DEFAULT_REPOSITORIES.len()
        );
        assert_eq!(config.repositories.probe, ProbeStrategy::Branch);
        assert_eq!(
            config.acquisition.max_concurrency,
            constants::DEFAULT_MAX_CONCURRENCY
        );
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_toml(
            r#"
            [repositories]
            candidates = ["me/hub"]
            probe = "search"

            [acquisition]
            max_concurrency = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.repositories.candidates[0].full_name(), "me/hub");
        assert_eq!(config.repositories.probe, ProbeStrategy::Search);
        assert_eq!(config.acquisition.max_concurrency, 2);
    }

    #[test]
    fn test_invalid_repository_rejected() {
        let result = Config::from_toml(
            r#"
            [repositories]
            candidates = ["not-a-repo"]
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = Config::from_toml("[acquisition]\nmax_concurrency = 0\n");
        assert!(matches!(result, Err(SetupError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.github.token.is_none());
    }

    #[test]
    fn test_unreadable_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(dir.path());
        assert!(matches!(result, Err(SetupError::Io(_))));
    }
}
