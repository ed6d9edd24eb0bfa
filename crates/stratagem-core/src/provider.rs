//! The seam through which the simulation supplies world facts.

use stratagem_types::{EntityId, WorldSnapshot, WorldStateView};

/// Produces the world facts for one tick.
///
/// The executor calls [`snapshot`](Self::snapshot) exactly once per tick,
/// before evaluating any trigger, and evaluates every entity of that tick
/// against the returned value.
pub trait WorldFactProvider: Send {
    /// Build the snapshot for `tick`.
    fn snapshot(&mut self, tick: u64) -> WorldSnapshot;
}

/// A provider that returns fixed facts, editable between ticks.
#[derive(Debug, Clone, Default)]
pub struct StaticFactProvider {
    snapshot: WorldSnapshot,
    calls: u64,
}

impl StaticFactProvider {
    /// A provider reporting no entities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an entity's facts.
    pub fn set_view(&mut self, entity_id: EntityId, view: WorldStateView) {
        self.snapshot.entities.insert(entity_id, view);
    }

    /// Mutable access to an entity's facts, if reported.
    pub fn view_mut(&mut self, entity_id: EntityId) -> Option<&mut WorldStateView> {
        self.snapshot.entities.get_mut(&entity_id)
    }

    /// Stop reporting an entity.
    pub fn remove(&mut self, entity_id: EntityId) {
        self.snapshot.entities.remove(&entity_id);
    }

    /// How many snapshots have been taken.
    pub const fn calls(&self) -> u64 {
        self.calls
    }
}

impl WorldFactProvider for StaticFactProvider {
    fn snapshot(&mut self, tick: u64) -> WorldSnapshot {
        self.calls = self.calls.saturating_add(1);
        let mut snapshot = self.snapshot.clone();
        snapshot.tick = tick;
        snapshot
    }
}
