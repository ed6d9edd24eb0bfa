//! Plan validation and execution for the Stratagem engine.
//!
//! This crate turns untrusted tactical plans into per-unit behavior, one
//! simulation tick at a time:
//!
//! - [`validation`] -- Checks candidate plans against the action registry
//!   and the safety envelope
//! - [`trigger`] -- Parses trigger text once and evaluates the typed tree
//! - [`registry`] -- The closed catalogue of actions and their schemas
//! - [`executor`] -- Per-entity step state machines advanced each tick
//! - [`state`] -- The per-entity execution record
//! - [`dispatch`] / [`provider`] -- Seams to the action and world subsystems
//! - [`runner`] / [`control`] -- The async tick loop and its controls
//! - [`clock`] -- Tick counting and millisecond conversion
//! - [`config`] -- Configuration loading
//! - [`stats`] -- Executor counters

pub mod clock;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod executor;
pub mod plan;
pub mod provider;
pub mod registry;
pub mod runner;
pub mod state;
pub mod stats;
pub mod trigger;
pub mod validation;

pub use clock::{ClockError, SimClock};
pub use config::{ConfigError, EngineConfig, LimitsConfig};
pub use control::{RunControl, RunEndReason};
pub use dispatch::{ActionDispatcher, DispatchError, InvocationHandle, InvocationStatus, RecordingDispatcher};
pub use executor::{ExecutorHandle, PlanExecutor, TickError, TickReport};
pub use plan::{Plan, PlanStep};
pub use provider::{StaticFactProvider, WorldFactProvider};
pub use registry::{ActionRegistry, ActionSpec, ParamKind, ParamSchema, ParamSpec, RegistryError};
pub use runner::{NoOpCallback, RunResult, RunnerError, TickCallback, run_executor};
pub use state::{ExecutionState, StateCorruption};
pub use stats::ExecutorStats;
pub use trigger::{TriggerEvaluationError, TriggerParseError};
pub use validation::{PlanValidator, ValidationError};
