//! The plan validator: gatekeeper between untrusted planner output and the
//! executor.
//!
//! [`PlanValidator::validate`] turns a [`RawPlan`] into a [`Plan`] or
//! rejects it with the first violation found. A plan is atomic: one bad
//! step rejects the whole plan. The only rewrite ever applied is speech
//! truncation, which changes display text and never behavior.
//!
//! # Check Order
//!
//! 1. The plan has at least one step.
//! 2. The step count is within `max_steps`.
//! 3. For each step, in order: action whitelist, parameters, step
//!    duration, trigger, priority, cooldown, then speech truncation.
//! 4. The sum of step durations is within `max_plan_duration_ms`.
//!
//! Validation reads nothing but its input and configuration, so the same
//! input always yields the same result.

use stratagem_types::{BoolExpr, RawPlan, RawStep, RawTrigger};
use tracing::{debug, warn};

use crate::config::{EngineConfig, LimitsConfig, MapConfig};
use crate::plan::{Plan, PlanStep};
use crate::registry::{ActionRegistry, ParamError};
use crate::trigger::{self, TriggerLimits, TriggerParseError};

/// Why a candidate plan was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The plan has no steps.
    #[error("plan has no steps")]
    EmptyPlan,

    /// The plan has more steps than allowed.
    #[error("plan has {count} steps, maximum is {max}")]
    TooManySteps {
        /// Steps in the candidate.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A step names an action outside the registry.
    #[error("step {step}: unknown action `{action}`")]
    UnknownAction {
        /// Step index.
        step: usize,
        /// The action name as given.
        action: String,
    },

    /// A required parameter is absent.
    #[error("step {step}: missing required parameter `{param}`")]
    MissingParam {
        /// Step index.
        step: usize,
        /// Parameter name.
        param: String,
    },

    /// A parameter is not in the action's schema.
    #[error("step {step}: unexpected parameter `{param}`")]
    UnexpectedParam {
        /// Step index.
        step: usize,
        /// Parameter name.
        param: String,
    },

    /// A parameter has the wrong type.
    #[error("step {step}: parameter `{param}` must be {expected}")]
    InvalidParamType {
        /// Step index.
        step: usize,
        /// Parameter name.
        param: String,
        /// Expected type.
        expected: &'static str,
    },

    /// A parameter is outside its bounds.
    #[error("step {step}: parameter `{param}` out of range: {detail}")]
    ParamOutOfRange {
        /// Step index.
        step: usize,
        /// Parameter name.
        param: String,
        /// What bound was violated.
        detail: String,
    },

    /// A step lasts longer than allowed.
    #[error("step {step}: duration {duration_ms} ms exceeds maximum of {max_ms} ms")]
    StepDurationTooLong {
        /// Step index.
        step: usize,
        /// Requested duration.
        duration_ms: u64,
        /// Configured maximum.
        max_ms: u64,
    },

    /// The steps together last longer than allowed.
    #[error("plan duration {total_ms} ms exceeds maximum of {max_ms} ms")]
    PlanDurationTooLong {
        /// Sum of step durations (saturated).
        total_ms: u64,
        /// Configured maximum.
        max_ms: u64,
    },

    /// A trigger failed to parse.
    #[error("step {step}: invalid trigger: {source}")]
    InvalidTrigger {
        /// Step index.
        step: usize,
        /// The parse failure.
        #[source]
        source: TriggerParseError,
    },

    /// A trigger references a fact outside the known vocabulary.
    #[error("step {step}: trigger references unknown fact `{fact}`")]
    UnknownFact {
        /// Step index.
        step: usize,
        /// The fact name.
        fact: String,
    },

    /// A priority is outside the configured range.
    #[error("step {step}: priority {priority} not in [{min}, {max}]")]
    PriorityOutOfRange {
        /// Step index.
        step: usize,
        /// Requested priority.
        priority: i64,
        /// Configured minimum.
        min: i32,
        /// Configured maximum.
        max: i32,
    },

    /// A cooldown is longer than allowed.
    #[error("step {step}: cooldown {cooldown_ms} ms exceeds maximum of {max_ms} ms")]
    CooldownTooLong {
        /// Step index.
        step: usize,
        /// Requested cooldown.
        cooldown_ms: u64,
        /// Configured maximum.
        max_ms: u64,
    },
}

impl ValidationError {
    fn from_param(step: usize, err: ParamError) -> Self {
        match err {
            ParamError::Missing { name } => Self::MissingParam { step, param: name },
            ParamError::Unexpected { name } => Self::UnexpectedParam { step, param: name },
            ParamError::InvalidType { name, expected } => Self::InvalidParamType {
                step,
                param: name,
                expected,
            },
            ParamError::OutOfRange { name, detail } => Self::ParamOutOfRange {
                step,
                param: name,
                detail,
            },
        }
    }
}

/// Checks candidate plans against the registry and the safety envelope.
#[derive(Debug, Clone)]
pub struct PlanValidator {
    registry: ActionRegistry,
    limits: LimitsConfig,
    map: MapConfig,
}

impl PlanValidator {
    /// Create a validator.
    pub const fn new(registry: ActionRegistry, limits: LimitsConfig, map: MapConfig) -> Self {
        Self {
            registry,
            limits,
            map,
        }
    }

    /// Create a validator with the configured registry, limits and map.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            ActionRegistry::from_config(config),
            config.limits.clone(),
            config.map.clone(),
        )
    }

    /// The action registry plans are checked against.
    pub const fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// The safety envelope.
    pub const fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Validate a candidate plan.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] in check order.
    pub fn validate(&self, candidate: &RawPlan) -> Result<Plan, ValidationError> {
        if candidate.steps.is_empty() {
            return Err(ValidationError::EmptyPlan);
        }

        let count = candidate.steps.len();
        if count > self.limits.max_steps {
            return Err(ValidationError::TooManySteps {
                count,
                max: self.limits.max_steps,
            });
        }

        let steps = candidate
            .steps
            .iter()
            .enumerate()
            .map(|(index, raw)| self.validate_step(index, raw))
            .collect::<Result<Vec<_>, _>>()?;

        let total = steps
            .iter()
            .filter_map(|s| s.duration_ms)
            .try_fold(0_u64, u64::checked_add);
        match total {
            Some(total_ms) if total_ms <= self.limits.max_plan_duration_ms => {}
            other => {
                return Err(ValidationError::PlanDurationTooLong {
                    total_ms: other.unwrap_or(u64::MAX),
                    max_ms: self.limits.max_plan_duration_ms,
                });
            }
        }

        debug!(
            source = %candidate.source,
            steps = steps.len(),
            "Plan passed validation"
        );
        Ok(Plan::new(
            candidate.source.clone(),
            candidate.created_at,
            steps,
        ))
    }

    fn validate_step(&self, step: usize, raw: &RawStep) -> Result<PlanStep, ValidationError> {
        let spec = self
            .registry
            .resolve(&raw.action)
            .map_err(|_| ValidationError::UnknownAction {
                step,
                action: raw.action.clone(),
            })?;

        let params = spec
            .schema
            .check(&raw.params, &self.map)
            .map_err(|e| ValidationError::from_param(step, e))?;

        if let Some(duration_ms) = raw.duration_ms
            && duration_ms > self.limits.max_step_duration_ms
        {
            return Err(ValidationError::StepDurationTooLong {
                step,
                duration_ms,
                max_ms: self.limits.max_step_duration_ms,
            });
        }

        let trigger = match &raw.trigger {
            Some(raw_trigger) => Some(self.validate_trigger(step, raw_trigger)?),
            None => None,
        };

        let priority = i32::try_from(raw.priority)
            .ok()
            .filter(|p| (self.limits.min_priority..=self.limits.max_priority).contains(p))
            .ok_or(ValidationError::PriorityOutOfRange {
                step,
                priority: raw.priority,
                min: self.limits.min_priority,
                max: self.limits.max_priority,
            })?;

        if let Some(cooldown_ms) = raw.cooldown_ms
            && cooldown_ms > self.limits.max_cooldown_ms
        {
            return Err(ValidationError::CooldownTooLong {
                step,
                cooldown_ms,
                max_ms: self.limits.max_cooldown_ms,
            });
        }

        let speech = raw
            .speech
            .as_deref()
            .and_then(|text| self.truncate_speech(step, text));

        Ok(PlanStep {
            action: spec.action,
            params,
            duration_ms: raw.duration_ms,
            trigger,
            speech,
            priority,
            cooldown_ms: raw.cooldown_ms.unwrap_or(spec.default_cooldown_ms),
        })
    }

    fn validate_trigger(
        &self,
        step: usize,
        raw: &RawTrigger,
    ) -> Result<BoolExpr, ValidationError> {
        let limits = TriggerLimits {
            max_depth: self.limits.max_trigger_depth,
            max_terms: self.limits.max_trigger_terms,
        };
        let expr = trigger::parse_trigger(raw, &limits)
            .map_err(|source| ValidationError::InvalidTrigger { step, source })?;

        if !self.limits.allow_unknown_facts
            && let Some(fact) = expr.unknown_facts().first()
        {
            return Err(ValidationError::UnknownFact {
                step,
                fact: (*fact).to_owned(),
            });
        }
        Ok(expr)
    }

    /// Collapse whitespace and keep at most `max_speech_words` words.
    fn truncate_speech(&self, step: usize, text: &str) -> Option<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return None;
        }
        let max = self.limits.max_speech_words;
        if words.len() > max {
            warn!(
                step,
                words = words.len(),
                max,
                "Speech exceeds word limit, truncating"
            );
        }
        let kept: Vec<&str> = words.into_iter().take(max).collect();
        (!kept.is_empty()).then(|| kept.join(" "))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use stratagem_types::ActionKind;

    use super::*;

    fn validator() -> PlanValidator {
        PlanValidator::from_config(&EngineConfig::default())
    }

    fn move_step() -> RawStep {
        RawStep::new("move_to")
            .param("target", json!({"x": 100, "y": 200}))
            .duration_ms(500)
    }

    #[test]
    fn accepts_a_well_formed_plan() {
        let raw = RawPlan::new("test")
            .step(move_step().speech("Moving up"))
            .step(RawStep::new("retreat").trigger("enemy_dist < 10").priority(3));

        let plan = validator().validate(&raw).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.source(), "test");
        assert_eq!(plan.created_at(), raw.created_at);
        assert_eq!(plan.total_duration_ms(), 500);

        let retreat = plan.step(1).unwrap();
        assert_eq!(retreat.action, ActionKind::Retreat);
        assert_eq!(retreat.priority, 3);
        assert!(retreat.trigger.is_some());
        assert!(!retreat.is_instantaneous());
    }

    #[test]
    fn rejects_empty_and_oversized_plans() {
        assert_eq!(
            validator().validate(&RawPlan::new("test")),
            Err(ValidationError::EmptyPlan)
        );

        let mut raw = RawPlan::new("test");
        for _ in 0..9 {
            raw = raw.step(RawStep::new("hold_position"));
        }
        assert_eq!(
            validator().validate(&raw),
            Err(ValidationError::TooManySteps { count: 9, max: 8 })
        );
    }

    #[test]
    fn rejects_unknown_actions_and_bad_params() {
        let raw = RawPlan::new("test").step(move_step()).step(RawStep::new("fly"));
        assert_eq!(
            validator().validate(&raw),
            Err(ValidationError::UnknownAction {
                step: 1,
                action: "fly".to_owned()
            })
        );

        let raw = RawPlan::new("test").step(RawStep::new("move_to"));
        assert_eq!(
            validator().validate(&raw),
            Err(ValidationError::MissingParam {
                step: 0,
                param: "target".to_owned()
            })
        );

        let raw = RawPlan::new("test").step(
            RawStep::new("move_to").param("target", json!({"x": -5, "y": 0})),
        );
        assert!(matches!(
            validator().validate(&raw),
            Err(ValidationError::ParamOutOfRange { step: 0, .. })
        ));
    }

    #[test]
    fn enforces_duration_ceilings() {
        let raw = RawPlan::new("test").step(RawStep::new("hold_position").duration_ms(6_001));
        assert!(matches!(
            validator().validate(&raw),
            Err(ValidationError::StepDurationTooLong { step: 0, .. })
        ));

        let raw = RawPlan::new("test")
            .step(RawStep::new("hold_position").duration_ms(4_000))
            .step(RawStep::new("hold_position").duration_ms(2_001));
        assert_eq!(
            validator().validate(&raw),
            Err(ValidationError::PlanDurationTooLong {
                total_ms: 6_001,
                max_ms: 6_000
            })
        );
    }

    #[test]
    fn total_duration_overflow_is_rejected() {
        let limits = LimitsConfig {
            max_step_duration_ms: u64::MAX,
            max_plan_duration_ms: u64::MAX,
            ..LimitsConfig::default()
        };
        let v = PlanValidator::new(ActionRegistry::with_defaults(), limits, MapConfig::default());
        let raw = RawPlan::new("test")
            .step(RawStep::new("hold_position").duration_ms(u64::MAX))
            .step(RawStep::new("hold_position").duration_ms(1));
        assert!(matches!(
            v.validate(&raw),
            Err(ValidationError::PlanDurationTooLong { total_ms: u64::MAX, .. })
        ));
    }

    #[test]
    fn rejects_bad_triggers() {
        let raw = RawPlan::new("test").step(RawStep::new("hold_position").trigger("enemy_dist <"));
        assert!(matches!(
            validator().validate(&raw),
            Err(ValidationError::InvalidTrigger { step: 0, .. })
        ));

        let raw = RawPlan::new("test").step(RawStep::new("hold_position").trigger("morale < 3"));
        assert_eq!(
            validator().validate(&raw),
            Err(ValidationError::UnknownFact {
                step: 0,
                fact: "morale".to_owned()
            })
        );
    }

    #[test]
    fn unknown_facts_admitted_when_allowed() {
        let config = EngineConfig {
            limits: LimitsConfig {
                allow_unknown_facts: true,
                ..LimitsConfig::default()
            },
            ..EngineConfig::default()
        };
        let raw = RawPlan::new("test").step(RawStep::new("hold_position").trigger_tree(
            RawTrigger::Any {
                or: vec![RawTrigger::Text("morale < 3".to_owned())],
            },
        ));
        assert!(PlanValidator::from_config(&config).validate(&raw).is_ok());
    }

    #[test]
    fn checks_priority_and_cooldown() {
        let raw = RawPlan::new("test").step(RawStep::new("speak").priority(11));
        assert!(matches!(
            validator().validate(&raw),
            Err(ValidationError::PriorityOutOfRange { priority: 11, .. })
        ));

        let raw = RawPlan::new("test").step(RawStep::new("speak").priority(i64::MIN));
        assert!(matches!(
            validator().validate(&raw),
            Err(ValidationError::PriorityOutOfRange { .. })
        ));

        let raw = RawPlan::new("test").step(RawStep::new("attack").param("target", json!(4)).cooldown_ms(60_001));
        assert!(matches!(
            validator().validate(&raw),
            Err(ValidationError::CooldownTooLong { .. })
        ));
    }

    #[test]
    fn cooldown_falls_back_to_action_default() {
        let raw = RawPlan::new("test")
            .step(RawStep::new("attack").param("target", json!(4)))
            .step(RawStep::new("attack").param("target", json!(4)).cooldown_ms(200));
        let plan = validator().validate(&raw).unwrap();
        assert_eq!(plan.step(0).unwrap().cooldown_ms, 1_000);
        assert_eq!(plan.step(1).unwrap().cooldown_ms, 200);
    }

    #[test]
    fn truncates_long_speech() {
        let raw = RawPlan::new("test").step(
            RawStep::new("speak").speech("one two three four five six seven eight nine ten eleven twelve thirteen"),
        );
        let plan = validator().validate(&raw).unwrap();
        let speech = plan.step(0).unwrap().speech.clone().unwrap();
        assert_eq!(speech.split(' ').count(), 12);
        assert!(speech.ends_with("twelve"));

        let raw = RawPlan::new("test").step(RawStep::new("speak").speech("   "));
        assert!(validator().validate(&raw).unwrap().step(0).unwrap().speech.is_none());
    }

    #[test]
    fn validation_is_idempotent() {
        let raw = RawPlan::new("test")
            .step(move_step())
            .step(RawStep::new("fly"));
        let v = validator();
        assert_eq!(v.validate(&raw), v.validate(&raw));

        let raw = RawPlan::new("test").step(move_step());
        assert_eq!(v.validate(&raw), v.validate(&raw));
    }
}
