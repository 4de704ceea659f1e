use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CoordinatorConfig, EvictionPolicyKind, Tier, TierConfig};
use crate::context::AnalyzerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Cache tier limits
    #[serde(default)]
    pub cache: CacheSettings,

    /// File analysis limits
    #[serde(default)]
    pub analysis: AnalyzerConfig,
}

/// Limits for one cache tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSettings {
    pub max_entries: usize,
    /// Entries older than this many seconds are dropped on lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    #[serde(default)]
    pub eviction: EvictionPolicyKind,
}

impl From<&TierConfig> for TierSettings {
    fn from(config: &TierConfig) -> Self {
        Self {
            max_entries: config.max_entries,
            ttl_secs: config.ttl.map(|ttl| ttl.as_secs()),
            eviction: config.eviction_policy,
        }
    }
}

impl From<&TierSettings> for TierConfig {
    fn from(settings: &TierSettings) -> Self {
        let config = TierConfig::lru(settings.max_entries).with_policy(settings.eviction);
        match settings.ttl_secs {
            Some(secs) => config.with_ttl(Duration::from_secs(secs)),
            None => config,
        }
    }
}

/// Per-tier cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    pub content: TierSettings,
    pub structure: TierSettings,
    pub model_result: TierSettings,
    pub project_summary: TierSettings,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CoordinatorConfig::default();
        Self {
            content: defaults.tier(Tier::Content).into(),
            structure: defaults.tier(Tier::Structure).into(),
            model_result: defaults.tier(Tier::ModelResult).into(),
            project_summary: defaults.tier(Tier::ProjectSummary).into(),
        }
    }
}

impl CacheSettings {
    /// Convert into the coordinator's configuration. Validation happens when
    /// the coordinator is built.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            content: (&self.content).into(),
            structure: (&self.structure).into(),
            model_result: (&self.model_result).into(),
            project_summary: (&self.project_summary).into(),
        }
    }
}

/// Load configuration from multiple sources.
///
/// Layers, later ones winning: built-in defaults, the global config file,
/// `./.localpair/config.toml`, then `LOCALPAIR_` environment variables
/// (`LOCALPAIR_CACHE__CONTENT__MAX_ENTRIES=50`). An explicit file replaces
/// both file layers and must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let global_config = get_config_dir()?.join("config.toml");
            if global_config.exists() {
                figment = figment.merge(Toml::file(&global_config));
            }

            let local_config = PathBuf::from(".localpair/config.toml");
            if local_config.exists() {
                figment = figment.merge(Toml::file(&local_config));
            }
        }
    }

    figment = figment.merge(Env::prefixed("LOCALPAIR_").split("__"));

    figment
        .extract()
        .context("Failed to load configuration")
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "localpair") {
        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;
        Ok(config_dir.to_path_buf())
    } else {
        // Fallback to home directory
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        let config_dir = PathBuf::from(home).join(".config").join("localpair");
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p,
        None => get_config_dir()?.join("config.toml"),
    };

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(path)
}

/// Write the default configuration unless one exists. Returns the path when a file was created.
pub fn init_config() -> Result<Option<PathBuf>> {
    let config_file = get_config_dir()?.join("config.toml");
    if config_file.exists() {
        return Ok(None);
    }
    save_config(&Config::default(), Some(config_file)).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheCoordinator, ConfigError};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings_match_coordinator_defaults() {
        let settings = CacheSettings::default();
        assert_eq!(settings.coordinator_config(), CoordinatorConfig::default());
        assert_eq!(settings.project_summary.ttl_secs, Some(300));
        assert_eq!(settings.content.ttl_secs, None);
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[cache.content]\nmax_entries = 5\neviction = \"fifo\"\n\n[analysis]\nlong_line_limit = 80\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.cache.content.max_entries, 5);
        assert_eq!(config.cache.content.eviction, EvictionPolicyKind::Fifo);
        assert_eq!(config.cache.structure, CacheSettings::default().structure);
        assert_eq!(config.analysis.long_line_limit, 80);
        assert_eq!(
            config.analysis.max_file_size,
            AnalyzerConfig::default().max_file_size
        );
    }

    #[test]
    fn test_saved_config_loads_back() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.cache.model_result.ttl_secs = Some(3600);

        let path = save_config(&config, Some(temp_dir.path().join("c.toml"))).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_config(Some(&temp_dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_zero_capacity_is_rejected_by_coordinator() {
        let mut settings = CacheSettings::default();
        settings.structure.max_entries = 0;

        let err = CacheCoordinator::new(settings.coordinator_config()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::ZeroCapacity {
                tier: Tier::Structure
            }
        );
    }
}
