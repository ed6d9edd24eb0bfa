//! Startup plans: loaded from a JSON file or built in.
//!
//! The file holds a list of submissions:
//!
//! ```json
//! [{ "entity": 1, "plan": { "source": "script", "steps": [{ "action": "speak" }] } }]
//! ```

use std::path::Path;

use serde::Deserialize;
use serde_json::json;
use stratagem_core::ExecutorHandle;
use stratagem_types::{EntityId, RawPlan, RawStep};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::scripted::enemy_of;

/// One plan addressed to one entity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanSubmission {
    /// The entity that should run the plan.
    pub entity: EntityId,
    /// The candidate plan.
    pub plan: RawPlan,
}

/// Read submissions from a JSON file.
pub fn load(path: &Path) -> Result<Vec<PlanSubmission>, EngineError> {
    let plans_error = |message: String| EngineError::Plans {
        path: path.to_path_buf(),
        message,
    };
    let contents = std::fs::read_to_string(path).map_err(|e| plans_error(format!("read failed: {e}")))?;
    serde_json::from_str(&contents).map_err(|e| plans_error(format!("invalid JSON: {e}")))
}

/// The built-in demo: every unit advances, opens fire, falls back once the
/// enemy is pushed away, then reports in.
pub fn demo(units: impl Iterator<Item = EntityId>) -> Vec<PlanSubmission> {
    units
        .enumerate()
        .map(|(index, entity)| {
            let lane = f64::from(u32::try_from(index).unwrap_or(u32::MAX));
            let plan = RawPlan::new("demo")
                .step(
                    RawStep::new("move_to")
                        .param("target", json!({"x": 100.0 * lane + 200.0, "y": 300.0}))
                        .duration_ms(1_500)
                        .speech("Moving up"),
                )
                .step(
                    RawStep::new("attack")
                        .param("target", json!(enemy_of(entity).into_inner()))
                        .priority(5)
                        .speech("Engaging"),
                )
                .step(
                    RawStep::new("hold_position")
                        .trigger("enemy_dist < 15 OR health_pct < 50")
                        .duration_ms(2_500),
                )
                .step(RawStep::new("retreat").trigger("enemy_dist > 30").duration_ms(2_000))
                .step(RawStep::new("speak").speech("Position secured"));
            PlanSubmission { entity, plan }
        })
        .collect()
}

/// Submit every plan through the handle. Returns how many were accepted.
pub fn submit_all(handle: &ExecutorHandle, submissions: &[PlanSubmission]) -> usize {
    let mut accepted: usize = 0;
    for submission in submissions {
        match handle.submit_plan(submission.entity, &submission.plan) {
            Ok(plan_id) => {
                info!(entity_id = %submission.entity, %plan_id, source = %submission.plan.source, "Plan queued");
                accepted = accepted.saturating_add(1);
            }
            Err(err) => {
                warn!(entity_id = %submission.entity, error = %err, "Plan rejected");
            }
        }
    }
    accepted
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stratagem_core::{EngineConfig, PlanExecutor};

    use super::*;

    #[test]
    fn demo_plans_pass_validation() {
        let executor = PlanExecutor::from_config(&EngineConfig::default()).unwrap();
        let plans = demo((1..=4).map(EntityId::new));
        assert_eq!(plans.len(), 4);
        assert_eq!(submit_all(&executor.handle(), &plans), 4);
    }

    #[test]
    fn parses_submission_list() {
        let json = r#"[
            {"entity": 2, "plan": {"source": "script", "steps": [
                {"action": "take_cover", "duration": 800},
                {"action": "attack", "params": {"target": 1002}}
            ]}},
            {"entity": 3, "plan": {"steps": []}}
        ]"#;
        let submissions: Vec<PlanSubmission> = serde_json::from_str(json).unwrap();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].entity, EntityId::new(2));

        let executor = PlanExecutor::from_config(&EngineConfig::default()).unwrap();
        // The empty plan is rejected, the other one queued.
        assert_eq!(submit_all(&executor.handle(), &submissions), 1);
    }

    #[test]
    fn missing_file_is_a_plans_error() {
        let result = load(Path::new("/nonexistent/stratagem-plans.json"));
        assert!(matches!(result, Err(EngineError::Plans { .. })));
    }
}
