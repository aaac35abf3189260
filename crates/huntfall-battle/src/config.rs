//! Battle engine configuration.
//!
//! Every balance constant here is data: deadlines, item magnitudes, reward
//! scaling, and checkpoint retry behavior all deserialize from the engine
//! configuration file and carry the documented defaults.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::creature::{CreatureTemplate, stock_templates};

/// Tunable battle engine parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BattleConfig {
    /// Seconds the turn owner has to act before the turn is forfeited.
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,

    /// Consecutive forfeited turns (per combatant) that auto-resolve the
    /// battle as that combatant's surrender.
    #[serde(default = "default_timeout_surrender_threshold")]
    pub timeout_surrender_threshold: u32,

    /// Flat weapon-attack increase from an attack tonic.
    #[serde(default = "default_attack_tonic_bonus")]
    pub attack_tonic_bonus: u32,

    /// HP restored by a salve.
    #[serde(default = "default_salve_heal")]
    pub salve_heal: u32,

    /// Base experience awarded to the winner.
    #[serde(default = "default_experience_base")]
    pub experience_base: u64,

    /// Extra experience per level of a defeated creature.
    #[serde(default = "default_experience_per_creature_level")]
    pub experience_per_creature_level: u64,

    /// Essence required per squared level step (shared with the autohunt
    /// progression curve).
    #[serde(default = "default_essence_level_base")]
    pub essence_level_base: u64,

    /// Seconds between deadline sweeps of the open battles.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Attempts to persist a checkpoint before giving up on the turn.
    #[serde(default = "default_checkpoint_attempts")]
    pub checkpoint_attempts: u32,

    /// Base backoff between checkpoint attempts, in milliseconds
    /// (multiplied by the attempt number).
    #[serde(default = "default_checkpoint_backoff_ms")]
    pub checkpoint_backoff_ms: u64,

    /// Creature templates available to PvE battles, by name.
    #[serde(default = "stock_templates")]
    pub templates: BTreeMap<String, CreatureTemplate>,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            turn_timeout_secs: default_turn_timeout_secs(),
            timeout_surrender_threshold: default_timeout_surrender_threshold(),
            attack_tonic_bonus: default_attack_tonic_bonus(),
            salve_heal: default_salve_heal(),
            experience_base: default_experience_base(),
            experience_per_creature_level: default_experience_per_creature_level(),
            essence_level_base: default_essence_level_base(),
            sweep_interval_secs: default_sweep_interval_secs(),
            checkpoint_attempts: default_checkpoint_attempts(),
            checkpoint_backoff_ms: default_checkpoint_backoff_ms(),
            templates: stock_templates(),
        }
    }
}

const fn default_turn_timeout_secs() -> u64 {
    60
}

const fn default_timeout_surrender_threshold() -> u32 {
    2
}

const fn default_attack_tonic_bonus() -> u32 {
    8
}

const fn default_salve_heal() -> u32 {
    30
}

const fn default_experience_base() -> u64 {
    25
}

const fn default_experience_per_creature_level() -> u64 {
    10
}

const fn default_essence_level_base() -> u64 {
    100
}

const fn default_sweep_interval_secs() -> u64 {
    5
}

const fn default_checkpoint_attempts() -> u32 {
    3
}

const fn default_checkpoint_backoff_ms() -> u64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = BattleConfig::default();
        assert_eq!(config.turn_timeout_secs, 60);
        assert_eq!(config.timeout_surrender_threshold, 2);
        assert_eq!(config.checkpoint_attempts, 3);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let parsed: Result<BattleConfig, _> =
            serde_json::from_str(r#"{"turn_timeout_secs": 15}"#);
        let config = parsed.ok();
        assert_eq!(config.as_ref().map(|c| c.turn_timeout_secs), Some(15));
        assert_eq!(
            config.as_ref().map(|c| c.timeout_surrender_threshold),
            Some(2),
        );
    }
}
