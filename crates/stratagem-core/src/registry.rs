//! The closed catalogue of actions a plan may use.
//!
//! Every action a unit can perform is registered once, at startup, with a
//! parameter schema and its capabilities. Plans naming anything outside the
//! registry are rejected by the validator, so the executor only ever
//! dispatches known actions with schema-checked parameters.
//!
//! # Capabilities
//!
//! - **blocking**: the step stays running until the dispatch collaborator
//!   reports completion (bounded by the step's duration and trigger).
//! - **interruptible**: the collaborator can stop the action early, so the
//!   executor asks it to when a plan is abandoned mid-step.
//! - **default cooldown**: applied after the step ends unless the step
//!   sets its own.

use std::collections::BTreeMap;

use serde_json::Value;
use stratagem_types::{ActionKind, EntityId, ParamValue};
use tracing::warn;

use crate::config::{ActionOverride, EngineConfig, MapConfig};

/// Errors from registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No registered action matches the name.
    #[error("action `{name}` is not registered")]
    NotFound {
        /// The name as given.
        name: String,
    },
}

/// A single parameter violation, before it is attributed to a step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// A required parameter is absent.
    #[error("missing required parameter `{name}`")]
    Missing {
        /// Parameter name.
        name: String,
    },

    /// The parameter is not in the schema.
    #[error("unexpected parameter `{name}`")]
    Unexpected {
        /// Parameter name.
        name: String,
    },

    /// The value has the wrong JSON type.
    #[error("parameter `{name}` must be {expected}")]
    InvalidType {
        /// Parameter name.
        name: String,
        /// Human-readable expected type.
        expected: &'static str,
    },

    /// The value has the right type but lies outside its bounds.
    #[error("parameter `{name}` out of range: {detail}")]
    OutOfRange {
        /// Parameter name.
        name: String,
        /// What bound was violated.
        detail: String,
    },
}

/// Type and bounds of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// A finite real number within `[min, max]`.
    Number {
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// A whole number within `[min, max]`.
    Integer {
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },
    /// Non-empty text of at most `max_len` characters.
    Text {
        /// Maximum length in characters.
        max_len: usize,
    },
    /// A boolean.
    Flag,
    /// A map position, `{"x": .., "y": ..}` or `[x, y]`, inside the map.
    Position,
    /// An entity id.
    Entity,
}

impl ParamKind {
    const fn expected(&self) -> &'static str {
        match self {
            Self::Number { .. } => "a number",
            Self::Integer { .. } => "an integer",
            Self::Text { .. } => "a string",
            Self::Flag => "a boolean",
            Self::Position => "a position {x, y}",
            Self::Entity => "an entity id",
        }
    }

    /// Convert a raw value to a typed one, checking type and bounds.
    fn convert(&self, name: &str, raw: &Value, map: &MapConfig) -> Result<ParamValue, ParamError> {
        let invalid_type = || ParamError::InvalidType {
            name: name.to_owned(),
            expected: self.expected(),
        };
        let out_of_range = |detail: String| ParamError::OutOfRange {
            name: name.to_owned(),
            detail,
        };

        match self {
            Self::Number { min, max } => {
                let n = raw.as_f64().filter(|n| n.is_finite()).ok_or_else(invalid_type)?;
                if n < *min || n > *max {
                    return Err(out_of_range(format!("{n} not in [{min}, {max}]")));
                }
                Ok(ParamValue::Number(n))
            }
            Self::Integer { min, max } => {
                let n = raw.as_i64().ok_or_else(invalid_type)?;
                if !(*min..=*max).contains(&n) {
                    return Err(out_of_range(format!("{n} not in [{min}, {max}]")));
                }
                Ok(ParamValue::Integer(n))
            }
            Self::Text { max_len } => {
                let text = raw.as_str().map(str::trim).ok_or_else(invalid_type)?;
                let len = text.chars().count();
                if len == 0 || len > *max_len {
                    return Err(out_of_range(format!("length {len} not in [1, {max_len}]")));
                }
                Ok(ParamValue::Text(text.to_owned()))
            }
            Self::Flag => raw.as_bool().map(ParamValue::Flag).ok_or_else(invalid_type),
            Self::Position => {
                let (x, y) = position_of(raw).ok_or_else(invalid_type)?;
                if !map.contains(x, y) {
                    return Err(out_of_range(format!(
                        "({x}, {y}) outside map {}x{}",
                        map.width, map.height
                    )));
                }
                Ok(ParamValue::Position { x, y })
            }
            Self::Entity => raw
                .as_u64()
                .map(|id| ParamValue::Entity(EntityId::new(id)))
                .ok_or_else(invalid_type),
        }
    }
}

fn position_of(raw: &Value) -> Option<(f64, f64)> {
    let (x, y) = match raw {
        Value::Object(fields) => (fields.get("x")?.as_f64()?, fields.get("y")?.as_f64()?),
        Value::Array(items) => match items.as_slice() {
            [x, y] => (x.as_f64()?, y.as_f64()?),
            _ => return None,
        },
        _ => return None,
    };
    (x.is_finite() && y.is_finite()).then_some((x, y))
}

/// One parameter in a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Type and bounds.
    pub kind: ParamKind,
    /// Whether the parameter must be present.
    pub required: bool,
}

impl ParamSpec {
    /// A parameter that must be present.
    pub const fn required(kind: ParamKind) -> Self {
        Self {
            kind,
            required: true,
        }
    }

    /// A parameter that may be omitted.
    pub const fn optional(kind: ParamKind) -> Self {
        Self {
            kind,
            required: false,
        }
    }
}

/// Parameter schema of one action. Parameters not listed are rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    fields: BTreeMap<String, ParamSpec>,
}

impl ParamSchema {
    /// An empty schema (the action takes no parameters).
    pub const fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn with(mut self, name: &str, spec: ParamSpec) -> Self {
        self.fields.insert(name.to_owned(), spec);
        self
    }

    /// Look up a parameter.
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.fields.get(name)
    }

    /// Check raw parameters against the schema and convert them.
    ///
    /// Violations are reported in a fixed order: unexpected names first
    /// (alphabetically), then each schema field alphabetically.
    ///
    /// # Errors
    ///
    /// Returns the first [`ParamError`] found.
    pub fn check(
        &self,
        params: &BTreeMap<String, Value>,
        map: &MapConfig,
    ) -> Result<BTreeMap<String, ParamValue>, ParamError> {
        if let Some(name) = params.keys().find(|name| !self.fields.contains_key(*name)) {
            return Err(ParamError::Unexpected { name: name.clone() });
        }

        let mut typed = BTreeMap::new();
        for (name, spec) in &self.fields {
            match params.get(name) {
                Some(raw) => {
                    typed.insert(name.clone(), spec.kind.convert(name, raw, map)?);
                }
                None if spec.required => {
                    return Err(ParamError::Missing { name: name.clone() });
                }
                None => {}
            }
        }
        Ok(typed)
    }
}

/// The capability contract of one action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    /// The action.
    pub action: ActionKind,
    /// Accepted parameters.
    pub schema: ParamSchema,
    /// Cooldown applied after the step ends when the step sets none.
    pub default_cooldown_ms: u64,
    /// Whether the step waits for the collaborator's completion signal.
    pub blocking: bool,
    /// Whether the collaborator can cancel the action early.
    pub interruptible: bool,
}

impl ActionSpec {
    fn apply_override(&mut self, over: &ActionOverride) {
        if let Some(ms) = over.cooldown_ms {
            self.default_cooldown_ms = ms;
        }
        if let Some(blocking) = over.blocking {
            self.blocking = blocking;
        }
        if let Some(interruptible) = over.interruptible {
            self.interruptible = interruptible;
        }
    }
}

/// Closed mapping from action to capability contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionRegistry {
    actions: BTreeMap<ActionKind, ActionSpec>,
}

impl ActionRegistry {
    /// An empty registry. Every plan is rejected until actions are added.
    pub const fn new() -> Self {
        Self {
            actions: BTreeMap::new(),
        }
    }

    /// Register (or replace) an action.
    ///
    /// Blocking actions are registered as interruptible; use
    /// [`register_spec`](Self::register_spec) for full control.
    pub fn register(
        &mut self,
        action: ActionKind,
        schema: ParamSchema,
        default_cooldown_ms: u64,
        blocking: bool,
    ) {
        self.register_spec(ActionSpec {
            action,
            schema,
            default_cooldown_ms,
            blocking,
            interruptible: blocking,
        });
    }

    /// Register (or replace) an action from a complete spec.
    pub fn register_spec(&mut self, spec: ActionSpec) {
        self.actions.insert(spec.action, spec);
    }

    /// Resolve a planner-supplied action name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the name matches no action
    /// or the action is not registered.
    pub fn resolve(&self, name: &str) -> Result<&ActionSpec, RegistryError> {
        ActionKind::from_name(name)
            .and_then(|kind| self.actions.get(&kind))
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_owned(),
            })
    }

    /// Look up a registered action.
    pub fn get(&self, action: ActionKind) -> Option<&ActionSpec> {
        self.actions.get(&action)
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no action is registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// The standard tactical action set.
    pub fn with_defaults() -> Self {
        let target_pos = || ParamSchema::new().with("target", ParamSpec::required(ParamKind::Position));
        let target_entity = || ParamSchema::new().with("target", ParamSpec::required(ParamKind::Entity));

        let mut registry = Self::new();
        registry.register(ActionKind::MoveTo, target_pos(), 0, true);
        registry.register_spec(ActionSpec {
            action: ActionKind::Retreat,
            schema: ParamSchema::new().with(
                "distance",
                ParamSpec::optional(ParamKind::Number {
                    min: 1.0,
                    max: 500.0,
                }),
            ),
            default_cooldown_ms: 0,
            blocking: false,
            interruptible: true,
        });
        registry.register(ActionKind::Attack, target_entity(), 1_000, false);
        registry.register(ActionKind::HoldPosition, ParamSchema::new(), 0, false);
        registry.register_spec(ActionSpec {
            action: ActionKind::Follow,
            schema: target_entity(),
            default_cooldown_ms: 0,
            blocking: false,
            interruptible: true,
        });
        registry.register(
            ActionKind::Patrol,
            target_pos().with(
                "loops",
                ParamSpec::optional(ParamKind::Integer { min: 1, max: 10 }),
            ),
            0,
            true,
        );
        registry.register(
            ActionKind::UseAbility,
            ParamSchema::new()
                .with("ability", ParamSpec::required(ParamKind::Text { max_len: 32 }))
                .with("target", ParamSpec::optional(ParamKind::Entity)),
            3_000,
            false,
        );
        registry.register(ActionKind::TakeCover, ParamSchema::new(), 0, true);
        registry.register(ActionKind::Regroup, ParamSchema::new(), 0, true);
        registry.register(ActionKind::Speak, ParamSchema::new(), 0, false);
        registry
    }

    /// Apply per-action overrides keyed by action name.
    ///
    /// Names that match no registered action are logged and ignored.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, ActionOverride>) {
        for (name, over) in overrides {
            let spec = ActionKind::from_name(name).and_then(|kind| self.actions.get_mut(&kind));
            match spec {
                Some(spec) => spec.apply_override(over),
                None => warn!(action = %name, "Ignoring override for unknown action"),
            }
        }
    }

    /// The standard action set with the configured overrides applied.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut registry = Self::with_defaults();
        registry.apply_overrides(&config.actions);
        registry
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn defaults_cover_every_action() {
        let registry = ActionRegistry::with_defaults();
        assert_eq!(registry.len(), ActionKind::ALL.len());
        for kind in ActionKind::ALL {
            assert!(registry.get(kind).is_some(), "{kind} missing");
        }
    }

    #[test]
    fn resolve_accepts_spelling_variants() {
        let registry = ActionRegistry::with_defaults();
        assert_eq!(registry.resolve("moveTo").unwrap().action, ActionKind::MoveTo);
        assert_eq!(registry.resolve("hold-position").unwrap().action, ActionKind::HoldPosition);
        assert_eq!(
            registry.resolve("self_destruct"),
            Err(RegistryError::NotFound {
                name: "self_destruct".to_owned()
            })
        );
    }

    #[test]
    fn resolve_fails_for_unregistered_kind() {
        let mut registry = ActionRegistry::new();
        registry.register(ActionKind::Speak, ParamSchema::new(), 0, false);
        assert!(registry.resolve("speak").is_ok());
        assert!(registry.resolve("attack").is_err());
    }

    #[test]
    fn capabilities() {
        let registry = ActionRegistry::with_defaults();
        let move_to = registry.get(ActionKind::MoveTo).unwrap();
        assert!(move_to.blocking && move_to.interruptible);
        let attack = registry.get(ActionKind::Attack).unwrap();
        assert!(!attack.blocking && !attack.interruptible);
        assert_eq!(attack.default_cooldown_ms, 1_000);
        assert!(registry.get(ActionKind::Retreat).unwrap().interruptible);
    }

    #[test]
    fn schema_converts_and_checks_bounds() {
        let registry = ActionRegistry::with_defaults();
        let map = MapConfig::default();
        let schema = &registry.get(ActionKind::Patrol).unwrap().schema;

        let typed = schema
            .check(&params(json!({"target": [10, 20.5], "loops": 3})), &map)
            .unwrap();
        assert_eq!(typed.get("target"), Some(&ParamValue::Position { x: 10.0, y: 20.5 }));
        assert_eq!(typed.get("loops"), Some(&ParamValue::Integer(3)));

        assert!(matches!(
            schema.check(&params(json!({"target": {"x": 10, "y": 2000}})), &map),
            Err(ParamError::OutOfRange { .. })
        ));
        assert!(matches!(
            schema.check(&params(json!({"target": {"x": 1, "y": 1}, "loops": 11})), &map),
            Err(ParamError::OutOfRange { .. })
        ));
        assert!(matches!(
            schema.check(&params(json!({"target": "north"})), &map),
            Err(ParamError::InvalidType { .. })
        ));
        assert_eq!(
            schema.check(&params(json!({})), &map),
            Err(ParamError::Missing {
                name: "target".to_owned()
            })
        );
        assert_eq!(
            schema.check(&params(json!({"target": [1, 1], "speed": 4})), &map),
            Err(ParamError::Unexpected {
                name: "speed".to_owned()
            })
        );
    }

    #[test]
    fn text_and_entity_params() {
        let registry = ActionRegistry::with_defaults();
        let map = MapConfig::default();
        let schema = &registry.get(ActionKind::UseAbility).unwrap().schema;

        let typed = schema
            .check(&params(json!({"ability": " smoke ", "target": 7})), &map)
            .unwrap();
        assert_eq!(typed.get("ability"), Some(&ParamValue::Text("smoke".to_owned())));
        assert_eq!(typed.get("target"), Some(&ParamValue::Entity(EntityId::new(7))));

        assert!(matches!(
            schema.check(&params(json!({"ability": ""})), &map),
            Err(ParamError::OutOfRange { .. })
        ));
        assert!(matches!(
            schema.check(&params(json!({"ability": "x", "target": -1})), &map),
            Err(ParamError::InvalidType { .. })
        ));
    }

    #[test]
    fn overrides_apply_by_name() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "attack".to_owned(),
            ActionOverride {
                cooldown_ms: Some(250),
                blocking: Some(true),
                interruptible: None,
            },
        );
        overrides.insert("teleport".to_owned(), ActionOverride::default());

        let mut registry = ActionRegistry::with_defaults();
        registry.apply_overrides(&overrides);

        let attack = registry.get(ActionKind::Attack).unwrap();
        assert_eq!(attack.default_cooldown_ms, 250);
        assert!(attack.blocking);
        assert!(!attack.interruptible);
        assert_eq!(registry.len(), ActionKind::ALL.len());
    }
}
