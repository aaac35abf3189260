//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `huntfall-config.yaml` at the
//! project root. This module defines strongly-typed structs mirroring the
//! YAML structure and a loader that reads and validates the file. Every
//! numeric balance constant in the engine -- costs, cadences, thresholds,
//! rarity weights -- is a field here, never a hardcoded invariant.

use std::path::Path;

use serde::Deserialize;

use huntfall_loot::RarityTable;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A loot table failed validation.
    #[error("invalid loot table '{table}': {source}")]
    LootTable {
        /// Which table is invalid.
        table: &'static str,
        /// The underlying table error.
        source: huntfall_loot::TableError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `huntfall-config.yaml`. All fields have
/// defaults, so an empty file (or no file) yields a runnable setup.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CoreConfig {
    /// Autohunt scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Economy settings.
    #[serde(default)]
    pub economy: EconomyConfig,

    /// Loot tables.
    #[serde(default)]
    pub loot: LootConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `DATABASE_URL` in the environment overrides
    /// `infrastructure.postgres_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::LootTable`] if a loot table is unusable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Same as [`CoreConfig::from_file`], minus the I/O case.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.infrastructure.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints (currently the loot tables).
    fn validate(&self) -> Result<(), ConfigError> {
        self.loot
            .autohunt
            .validate()
            .map_err(|source| ConfigError::LootTable {
                table: "autohunt",
                source,
            })?;
        self.loot
            .battle
            .validate()
            .map_err(|source| ConfigError::LootTable {
                table: "battle",
                source,
            })
    }
}

/// Autohunt scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between scheduler ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Maximum sessions processed per tick; the rest roll over.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// In-tick worker pool bound for concurrent session processing.
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,

    /// Cadence assigned to newly enabled sessions, in seconds.
    #[serde(default = "default_cadence_secs")]
    pub default_cadence_secs: u64,

    /// Per-cycle cost at level 1.
    #[serde(default = "default_base_cost")]
    pub base_cost: i64,

    /// Additional per-cycle cost per level above 1.
    #[serde(default = "default_cost_per_level")]
    pub cost_per_level: i64,

    /// Essence earned by every completed cycle.
    #[serde(default = "default_essence_per_cycle")]
    pub essence_per_cycle: u64,

    /// Extra essence per item dropped during a cycle.
    #[serde(default = "default_essence_per_item")]
    pub essence_per_item: u64,

    /// Essence required per squared level step.
    #[serde(default = "default_essence_level_base")]
    pub essence_level_base: u64,
}

impl SchedulerConfig {
    /// Per-cycle cost at a given session level.
    pub fn cost_for_level(&self, level: u32) -> i64 {
        let above_one = i64::from(level.saturating_sub(1));
        self.base_cost
            .saturating_add(self.cost_per_level.saturating_mul(above_one))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            batch_size: default_batch_size(),
            worker_limit: default_worker_limit(),
            default_cadence_secs: default_cadence_secs(),
            base_cost: default_base_cost(),
            cost_per_level: default_cost_per_level(),
            essence_per_cycle: default_essence_per_cycle(),
            essence_per_item: default_essence_per_item(),
            essence_level_base: default_essence_level_base(),
        }
    }
}

/// Economy settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EconomyConfig {
    /// Balance granted to accounts on first economic touch.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: i64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
        }
    }
}

/// Loot tables for the two reward paths.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LootConfig {
    /// Table drawn from by autohunt cycles and manual hunts.
    #[serde(default = "RarityTable::autohunt")]
    pub autohunt: RarityTable,

    /// Table drawn from by battle payouts and bonus drops.
    #[serde(default = "RarityTable::battle")]
    pub battle: RarityTable,
}

impl Default for LootConfig {
    fn default() -> Self {
        Self {
            autohunt: RarityTable::autohunt(),
            battle: RarityTable::battle(),
        }
    }
}

/// Infrastructure connection strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// PostgreSQL connection URL; `None` selects the in-memory stores.
    #[serde(default)]
    pub postgres_url: Option<String>,
}

impl InfrastructureConfig {
    /// Let `DATABASE_URL` in the environment win over the YAML value.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                self.postgres_url = Some(url);
            }
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON-structured log lines instead of human-readable ones.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const fn default_tick_interval_secs() -> u64 {
    5
}

const fn default_batch_size() -> usize {
    32
}

const fn default_worker_limit() -> usize {
    8
}

const fn default_cadence_secs() -> u64 {
    300
}

const fn default_base_cost() -> i64 {
    10
}

const fn default_cost_per_level() -> i64 {
    2
}

const fn default_essence_per_cycle() -> u64 {
    5
}

const fn default_essence_per_item() -> u64 {
    10
}

const fn default_essence_level_base() -> u64 {
    100
}

const fn default_starting_balance() -> i64 {
    0
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_full_defaults() {
        let config = CoreConfig::parse("{}").ok().unwrap_or_default();
        assert_eq!(config.scheduler.tick_interval_secs, 5);
        assert_eq!(config.scheduler.batch_size, 32);
        assert_eq!(config.scheduler.base_cost, 10);
        assert_eq!(config.economy.starting_balance, 0);
        assert!(!config.logging.json);
    }

    #[test]
    fn partial_sections_fill_in() {
        let yaml = r"
scheduler:
  batch_size: 50
  base_cost: 25
logging:
  level: debug
";
        let config = CoreConfig::parse(yaml).ok().unwrap_or_default();
        assert_eq!(config.scheduler.batch_size, 50);
        assert_eq!(config.scheduler.base_cost, 25);
        assert_eq!(config.scheduler.worker_limit, 8);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn cost_scales_linearly_with_level() {
        let config = SchedulerConfig::default();
        assert_eq!(config.cost_for_level(1), 10);
        assert_eq!(config.cost_for_level(2), 12);
        assert_eq!(config.cost_for_level(10), 28);
    }

    #[test]
    fn invalid_loot_table_is_rejected() {
        let yaml = r"
loot:
  autohunt:
    coins_min: 100
    coins_max: 10
    drops: []
";
        assert!(matches!(
            CoreConfig::parse(yaml),
            Err(ConfigError::LootTable {
                table: "autohunt",
                ..
            })
        ));
    }

    #[test]
    fn loot_table_overrides_parse() {
        let yaml = r"
loot:
  autohunt:
    coins_min: 1
    coins_max: 5
    drops:
      - name: Pebble
        kind:
          kind: trinket
        rarity: common
        weight: 1
";
        let config = CoreConfig::parse(yaml).ok().unwrap_or_default();
        assert_eq!(config.loot.autohunt.coins_max, 5);
        assert_eq!(
            config.loot.autohunt.drops.first().map(|d| d.name.as_str()),
            Some("Pebble"),
        );
    }
}
