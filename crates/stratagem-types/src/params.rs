//! Typed action parameter values.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::EntityId;

/// A validated action parameter.
///
/// Raw JSON parameters are converted into these values by the validator
/// according to the per-action schema, so the dispatch collaborator never
/// sees untyped input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ParamValue {
    /// A real number.
    Number(f64),
    /// A whole number.
    Integer(i64),
    /// Free text.
    Text(String),
    /// A boolean flag.
    Flag(bool),
    /// A map position.
    Position {
        /// Horizontal coordinate.
        x: f64,
        /// Vertical coordinate.
        y: f64,
    },
    /// Another entity in the simulation.
    Entity(EntityId),
}

impl ParamValue {
    /// Short type name for diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Integer(_) => "integer",
            Self::Text(_) => "text",
            Self::Flag(_) => "flag",
            Self::Position { .. } => "position",
            Self::Entity(_) => "entity",
        }
    }

    /// The value as a real number, if numeric.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The value as a position, if it is one.
    pub const fn as_position(&self) -> Option<(f64, f64)> {
        match self {
            Self::Position { x, y } => Some((*x, *y)),
            _ => None,
        }
    }

    /// The value as an entity reference, if it is one.
    pub const fn as_entity(&self) -> Option<EntityId> {
        match self {
            Self::Entity(id) => Some(*id),
            _ => None,
        }
    }
}
