//! Configuration loading and typed config structures for the engine.
//!
//! The canonical configuration lives in `stratagem-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure and a loader
//! that reads the file. Every field has a default, so an empty file (or no
//! file at all) yields the standard safety envelope.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

/// Environment variable that overrides `logging.level`.
pub const LOG_LEVEL_ENV: &str = "STRATAGEM_LOG";

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
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Tick rate and run bounds.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Safety envelope applied to every candidate plan.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Map bounds used to check position parameters.
    #[serde(default)]
    pub map: MapConfig,

    /// Per-action overrides of the built-in registry, keyed by action name.
    #[serde(default)]
    pub actions: BTreeMap<String, ActionOverride>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// The `STRATAGEM_LOG` environment variable overrides `logging.level`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.logging.apply_env_override();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }
}

/// Tick rate and run bounds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Simulation ticks per second.
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,

    /// Stop after this many ticks (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,

    /// Sleep one tick interval between ticks. Disable for headless replays.
    #[serde(default = "default_true")]
    pub realtime: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            max_ticks: 0,
            realtime: true,
        }
    }
}

/// Safety envelope for candidate plans.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of steps in one plan.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Maximum duration of a single step, in milliseconds.
    #[serde(default = "default_max_duration_ms")]
    pub max_step_duration_ms: u64,

    /// Maximum sum of all step durations, in milliseconds.
    #[serde(default = "default_max_duration_ms")]
    pub max_plan_duration_ms: u64,

    /// Speech lines longer than this many words are truncated.
    #[serde(default = "default_max_speech_words")]
    pub max_speech_words: usize,

    /// Maximum cooldown a step may request, in milliseconds.
    #[serde(default = "default_max_cooldown_ms")]
    pub max_cooldown_ms: u64,

    /// Lowest accepted step priority.
    #[serde(default)]
    pub min_priority: i32,

    /// Highest accepted step priority.
    #[serde(default = "default_max_priority")]
    pub max_priority: i32,

    /// Maximum nesting depth of a trigger expression.
    #[serde(default = "default_max_trigger_depth")]
    pub max_trigger_depth: usize,

    /// Maximum number of comparisons in a trigger expression.
    #[serde(default = "default_max_trigger_terms")]
    pub max_trigger_terms: usize,

    /// Admit triggers that reference facts outside the known vocabulary.
    ///
    /// Such triggers always evaluate to false at runtime.
    #[serde(default)]
    pub allow_unknown_facts: bool,

    /// Fail a step without a duration once it has run this long.
    ///
    /// Unset by default: a trigger-only step then waits until its trigger
    /// fires or the plan is interrupted.
    #[serde(default)]
    pub open_step_timeout_ms: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_step_duration_ms: default_max_duration_ms(),
            max_plan_duration_ms: default_max_duration_ms(),
            max_speech_words: default_max_speech_words(),
            max_cooldown_ms: default_max_cooldown_ms(),
            min_priority: 0,
            max_priority: default_max_priority(),
            max_trigger_depth: default_max_trigger_depth(),
            max_trigger_terms: default_max_trigger_terms(),
            allow_unknown_facts: false,
            open_step_timeout_ms: None,
        }
    }
}

/// Playable map bounds. Positions must satisfy `0 <= x <= width` and
/// `0 <= y <= height`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MapConfig {
    /// Map width in map units.
    #[serde(default = "default_map_extent")]
    pub width: f64,

    /// Map height in map units.
    #[serde(default = "default_map_extent")]
    pub height: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: default_map_extent(),
            height: default_map_extent(),
        }
    }
}

impl MapConfig {
    /// Whether a point lies inside the map.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }
}

/// Override of one registry entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ActionOverride {
    /// Replaces the default cooldown.
    #[serde(default)]
    pub cooldown_ms: Option<u64>,

    /// Replaces the blocking capability.
    #[serde(default)]
    pub blocking: Option<bool>,

    /// Replaces the early-interruption capability.
    #[serde(default)]
    pub interruptible: Option<bool>,
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Replace `level` with `STRATAGEM_LOG` when it is set and non-empty.
    pub fn apply_env_override(&mut self) {
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV)
            && !level.trim().is_empty()
        {
            self.level = level;
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_tick_rate_hz() -> u32 {
    30
}

const fn default_max_steps() -> usize {
    8
}

const fn default_max_duration_ms() -> u64 {
    6_000
}

const fn default_max_speech_words() -> usize {
    12
}

const fn default_max_cooldown_ms() -> u64 {
    60_000
}

const fn default_max_priority() -> i32 {
    10
}

const fn default_max_trigger_depth() -> usize {
    4
}

const fn default_max_trigger_terms() -> usize {
    8
}

const fn default_map_extent() -> f64 {
    1_000.0
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_the_standard_envelope() {
        let config = EngineConfig::default();
        assert_eq!(config.simulation.tick_rate_hz, 30);
        assert_eq!(config.limits.max_steps, 8);
        assert_eq!(config.limits.max_plan_duration_ms, 6_000);
        assert_eq!(config.limits.max_speech_words, 12);
        assert!(config.limits.open_step_timeout_ms.is_none());
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
simulation:
  tick_rate_hz: 20
  max_ticks: 600
  realtime: false

limits:
  max_steps: 5
  max_step_duration_ms: 3000
  max_plan_duration_ms: 9000
  max_speech_words: 6
  max_cooldown_ms: 10000
  min_priority: -5
  max_priority: 5
  max_trigger_depth: 3
  max_trigger_terms: 4
  allow_unknown_facts: true
  open_step_timeout_ms: 20000

map:
  width: 256.0
  height: 128.0

actions:
  attack:
    cooldown_ms: 500
  move_to:
    blocking: false

logging:
  level: "debug"
  format: "json"
"#;

        let config = EngineConfig::parse(yaml);
        assert!(config.is_ok(), "{config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.simulation.tick_rate_hz, 20);
        assert!(!config.simulation.realtime);
        assert_eq!(config.limits.max_steps, 5);
        assert_eq!(config.limits.min_priority, -5);
        assert!(config.limits.allow_unknown_facts);
        assert_eq!(config.limits.open_step_timeout_ms, Some(20_000));
        assert!(config.map.contains(256.0, 0.0));
        assert!(!config.map.contains(0.0, 128.5));
        assert_eq!(
            config.actions.get("attack").and_then(|o| o.cooldown_ms),
            Some(500)
        );
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = EngineConfig::parse("limits:\n  max_steps: 3\n");
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.limits.max_steps, 3);
        // Everything else uses defaults
        assert_eq!(config.limits.max_speech_words, 12);
        assert_eq!(config.simulation.tick_rate_hz, 30);
    }

    #[test]
    fn parse_empty_yaml() {
        let config = EngineConfig::parse("");
        assert!(config.is_ok());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("stratagem-config.yaml");
        if path.exists() {
            let config = EngineConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
