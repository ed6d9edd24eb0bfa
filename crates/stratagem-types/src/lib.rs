//! Shared type definitions for the Stratagem plan execution engine.
//!
//! This crate holds every value that crosses a boundary of the engine:
//! the untrusted plan input, the world facts read each tick, and the
//! invocations, status lines and lifecycle events the executor emits.
//! Output types flow to `TypeScript` via `ts-rs` for UI consumers.
//!
//! # Modules
//!
//! - [`ids`] -- Integer identifier newtypes ([`EntityId`], [`PlanId`])
//! - [`enums`] -- Actions, facts, comparators and lifecycle enumerations
//! - [`expr`] -- The typed trigger expression tree ([`BoolExpr`])
//! - [`params`] -- Typed action parameter values
//! - [`plan`] -- Candidate plan input ([`RawPlan`], [`RawStep`])
//! - [`world`] -- Per-tick world facts ([`WorldSnapshot`], [`WorldStateView`])
//! - [`events`] -- Executor outputs ([`ActionInvocation`], [`ExecutorEvent`])

pub mod enums;
pub mod events;
pub mod expr;
pub mod ids;
pub mod params;
pub mod plan;
pub mod world;

// Re-export all public types at crate root for convenience.
pub use enums::{
    ActionKind, Comparator, CompletionCause, ExecutionPhase, FACT_EPSILON, Fact, FailReason,
    InterruptCause, SkipReason, StepOutcome,
};
pub use events::{ActionInvocation, ExecutorEvent, StatusMessage};
pub use expr::{BoolExpr, FactRef};
pub use ids::{EntityId, PlanId};
pub use params::ParamValue;
pub use plan::{RawPlan, RawStep, RawTrigger};
pub use world::{WorldSnapshot, WorldStateView};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the observer-facing types.

    #[test]
    fn export_bindings() {
        // ts-rs writes the files to `bindings/` relative to the crate root
        // when `export_all` runs.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::EntityId::export_all();
        let _ = crate::ids::PlanId::export_all();

        // Enums
        let _ = crate::enums::ActionKind::export_all();
        let _ = crate::enums::StepOutcome::export_all();
        let _ = crate::enums::ExecutionPhase::export_all();
        let _ = crate::enums::InterruptCause::export_all();
        let _ = crate::enums::SkipReason::export_all();
        let _ = crate::enums::FailReason::export_all();
        let _ = crate::enums::CompletionCause::export_all();

        // Values
        let _ = crate::params::ParamValue::export_all();
        let _ = crate::world::WorldStateView::export_all();

        // Outputs
        let _ = crate::events::ActionInvocation::export_all();
        let _ = crate::events::StatusMessage::export_all();
        let _ = crate::events::ExecutorEvent::export_all();
    }
}
