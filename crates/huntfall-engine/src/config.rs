//! Engine-level configuration: the core sections plus the battle section.
//!
//! Both halves read from the same `huntfall-config.yaml`; the core crate
//! owns its sections (scheduler, economy, loot, infrastructure, logging)
//! and the battle crate owns its own, so this module only stitches them
//! together.

use std::path::Path;

use serde::Deserialize;

use huntfall_battle::BattleConfig;
use huntfall_core::{ConfigError, CoreConfig};

/// Default configuration file path, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "huntfall-config.yaml";

/// The `battle:` section of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
struct BattleSection {
    #[serde(default)]
    battle: BattleConfig,
}

/// The full engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Scheduler, economy, loot, infrastructure, and logging sections.
    pub core: CoreConfig,
    /// Battle engine section.
    pub battle: BattleConfig,
}

impl EngineConfig {
    /// Load the configuration file, falling back to full defaults when it
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file exists but cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            let mut config = Self::default();
            config.core.infrastructure.apply_env_overrides();
            return Ok(config);
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { source })?;
        Self::parse(&contents)
    }

    /// Parse the configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unparseable YAML or invalid loot
    /// tables.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let core = CoreConfig::parse(yaml)?;
        let battle: BattleSection = serde_yml::from_str(yaml)?;
        Ok(Self {
            core,
            battle: battle.battle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_halves_parse_from_one_document() {
        let yaml = r"
scheduler:
  batch_size: 10
battle:
  turn_timeout_secs: 30
";
        let config = EngineConfig::parse(yaml).ok().unwrap_or_default();
        assert_eq!(config.core.scheduler.batch_size, 10);
        assert_eq!(config.battle.turn_timeout_secs, 30);
        // Untouched fields keep their defaults.
        assert_eq!(config.battle.timeout_surrender_threshold, 2);
    }

    #[test]
    fn empty_document_is_fully_defaulted() {
        let config = EngineConfig::parse("{}").ok().unwrap_or_default();
        assert_eq!(config.core.scheduler.tick_interval_secs, 5);
        assert_eq!(config.battle.turn_timeout_secs, 60);
    }
}
