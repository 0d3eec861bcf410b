//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use concord_domain::ConfigIssue;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable prefix; `__` separates nested keys
/// (`CONCORD_ORCHESTRATOR__MAX_PHASES=4`).
pub const ENV_PREFIX: &str = "CONCORD_";

const PROJECT_FILES: [&str; 2] = ["concord.toml", ".concord.toml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration:\n{}", format_issues(.0))]
    Invalid(Vec<ConfigIssue>),
}

fn format_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  {}", issue))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `CONCORD_*` environment variables
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./concord.toml` or `./.concord.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/concord/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, ConfigError> {
        let mut figment = Self::defaults();

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Figment seeded with the serialized defaults.
    pub fn defaults() -> Figment {
        Figment::new().merge(Serialized::defaults(FileConfig::default()))
    }

    pub fn extract(figment: Figment) -> Result<FileConfig, ConfigError> {
        figment.extract().map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// `$XDG_CONFIG_HOME/concord/config.toml`, falling back to the platform
    /// config directory.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("concord").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Config file locations in priority order, with whether each exists.
    pub fn config_sources(config_path: Option<&Path>) -> Vec<(String, PathBuf, bool)> {
        let mut sources = Vec::new();
        if let Some(path) = config_path {
            sources.push(("Explicit".to_string(), path.to_path_buf(), path.exists()));
        }
        match Self::project_config_path() {
            Some(path) => sources.push(("Project".to_string(), path, true)),
            None => sources.push(("Project".to_string(), PathBuf::from(PROJECT_FILES[0]), false)),
        }
        if let Some(path) = Self::global_config_path() {
            let exists = path.exists();
            sources.push(("Global".to_string(), path, exists));
        }
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.orchestrator.max_phases, 10);
        assert!(config.governance.enabled);
    }

    #[test]
    fn test_global_config_path() {
        if let Some(path) = ConfigLoader::global_config_path() {
            assert!(path.ends_with("concord/config.toml"));
        }
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concord.toml");
        std::fs::write(
            &path,
            "[orchestrator]\nmax_phases = 3\n\n[agents.scout]\nrole = \"researcher\"\n",
        )
        .unwrap();

        let config =
            ConfigLoader::extract(ConfigLoader::defaults().merge(Toml::file(&path))).unwrap();
        assert_eq!(config.orchestrator.max_phases, 3);
        assert_eq!(config.orchestrator.max_workers, 4);
        assert_eq!(config.agents["scout"].role.as_deref(), Some("researcher"));
    }

    #[test]
    fn test_later_sources_win() {
        let figment = ConfigLoader::defaults()
            .merge(Toml::string("[ir]\ndigest_threshold = 3\ndefault_priority = 2"))
            .merge(Toml::string("[ir]\ndigest_threshold = 7"));
        let config = ConfigLoader::extract(figment).unwrap();
        assert_eq!(config.ir.digest_threshold, 7);
        assert_eq!(config.ir.default_priority, 2);
    }

    #[test]
    fn test_type_error_is_reported() {
        let figment =
            ConfigLoader::defaults().merge(Toml::string("[orchestrator]\nmax_phases = \"many\""));
        let err = ConfigLoader::extract(figment).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_invalid_display_lists_issues() {
        let config: FileConfig =
            toml::from_str("[orchestrator]\nconfidence_threshold = 2.0").unwrap();
        let err = ConfigError::Invalid(config.validate());
        assert!(err.to_string().contains("error: orchestrator.confidence_threshold"));
    }
}
