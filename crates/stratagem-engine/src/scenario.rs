//! Scenario settings for the scripted demo world.
//!
//! Read from the `scenario` section of `stratagem-config.yaml`. The engine
//! library ignores that section; only this binary consumes it.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::EngineError;

/// Settings for the scripted world and dispatcher.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioConfig {
    /// Seed for the world's random jitter.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of friendly units, numbered from 1.
    #[serde(default = "default_units")]
    pub units: u32,

    /// Distance of each unit's enemy at tick 0.
    #[serde(default = "default_enemy_start_dist")]
    pub enemy_start_dist: f64,

    /// Map units the enemy closes per tick.
    #[serde(default = "default_enemy_speed")]
    pub enemy_speed: f64,

    /// Maximum random deviation added to the enemy's movement each tick.
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Ticks a movement order takes to finish.
    #[serde(default = "default_move_ticks")]
    pub move_ticks: u64,

    /// Plans to submit at startup. The first command-line argument wins
    /// over this.
    #[serde(default)]
    pub plans_file: Option<PathBuf>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            units: default_units(),
            enemy_start_dist: default_enemy_start_dist(),
            enemy_speed: default_enemy_speed(),
            jitter: default_jitter(),
            move_ticks: default_move_ticks(),
            plans_file: None,
        }
    }
}

impl ScenarioConfig {
    /// Load the `scenario` section from a config file.
    ///
    /// A missing file or a file without the section yields the defaults.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| EngineError::Scenario {
            message: format!("failed to read config file: {e}"),
        })?;
        Self::parse(&contents)
    }

    /// Extract and check the `scenario` section of a YAML document.
    pub fn parse(yaml: &str) -> Result<Self, EngineError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: serde_yml::Value = serde_yml::from_str(yaml).map_err(|e| EngineError::Scenario {
            message: format!("failed to parse config YAML: {e}"),
        })?;
        let config = match raw.get("scenario") {
            Some(section) => {
                serde_yml::from_value::<Self>(section.clone()).map_err(|e| EngineError::Scenario {
                    message: format!("failed to parse scenario section: {e}"),
                })?
            }
            None => Self::default(),
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), EngineError> {
        let invalid = |message: &str| {
            Err(EngineError::Scenario {
                message: message.to_owned(),
            })
        };
        if !(self.enemy_start_dist.is_finite() && self.enemy_start_dist >= 0.0) {
            return invalid("enemy_start_dist must be a non-negative number");
        }
        if !(self.enemy_speed.is_finite() && self.enemy_speed >= 0.0) {
            return invalid("enemy_speed must be a non-negative number");
        }
        if !(self.jitter.is_finite() && self.jitter >= 0.0) {
            return invalid("jitter must be a non-negative number");
        }
        Ok(())
    }
}

const fn default_seed() -> u64 {
    7
}

const fn default_units() -> u32 {
    3
}

const fn default_enemy_start_dist() -> f64 {
    60.0
}

const fn default_enemy_speed() -> f64 {
    0.5
}

const fn default_jitter() -> f64 {
    0.2
}

const fn default_move_ticks() -> u64 {
    45
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_section_uses_defaults() {
        let config = ScenarioConfig::parse("simulation:\n  max_ticks: 10\n").unwrap();
        assert_eq!(config, ScenarioConfig::default());
    }

    #[test]
    fn section_overrides_fields() {
        let yaml = "scenario:\n  seed: 99\n  units: 5\n  plans_file: plans.json\n";
        let config = ScenarioConfig::parse(yaml).unwrap();
        assert_eq!(config.seed, 99);
        assert_eq!(config.units, 5);
        assert_eq!(config.plans_file, Some(PathBuf::from("plans.json")));
        assert_eq!(config.move_ticks, 45);
    }

    #[test]
    fn negative_speed_is_rejected() {
        let result = ScenarioConfig::parse("scenario:\n  enemy_speed: -1.0\n");
        assert!(matches!(result, Err(EngineError::Scenario { .. })));
    }
}
