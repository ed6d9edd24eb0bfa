//! Read-only world facts delivered to the executor once per tick.
//!
//! The simulation builds one [`WorldSnapshot`] per tick through its fact
//! provider; the executor evaluates every trigger of that tick against the
//! same snapshot and never mutates it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::Fact;
use crate::ids::EntityId;

/// Facts about one entity at the current tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldStateView {
    /// Own health as a percentage (0--100).
    pub health_pct: f64,
    /// Distance to the nearest enemy, if any enemy is sensed.
    pub enemy_dist: Option<f64>,
    /// Distance to the nearest ally, if any ally is sensed.
    pub ally_dist: Option<f64>,
    /// Enemies in sensing range.
    pub enemy_count: u32,
    /// Allies in sensing range.
    pub ally_count: u32,
    /// Energy level, for units that have one.
    pub energy: Option<f64>,
    /// Ammunition level, for units that have one.
    pub ammo: Option<f64>,
    /// Whether the entity is still alive.
    pub alive: bool,
}

impl Default for WorldStateView {
    fn default() -> Self {
        Self {
            health_pct: 100.0,
            enemy_dist: None,
            ally_dist: None,
            enemy_count: 0,
            ally_count: 0,
            energy: None,
            ammo: None,
            alive: true,
        }
    }
}

impl WorldStateView {
    /// Look up a world fact.
    ///
    /// Returns `None` when the entity has no value for the fact (no enemy
    /// sensed, no ammo pool). [`Fact::Time`] is not a world fact: it is
    /// owned by the executor's step clock, so it is always `None` here.
    pub fn fact(&self, fact: Fact) -> Option<f64> {
        match fact {
            Fact::HealthPct => Some(self.health_pct),
            Fact::EnemyDist => self.enemy_dist,
            Fact::AllyDist => self.ally_dist,
            Fact::EnemyCount => Some(f64::from(self.enemy_count)),
            Fact::AllyCount => Some(f64::from(self.ally_count)),
            Fact::Energy => self.energy,
            Fact::Ammo => self.ammo,
            Fact::Time => None,
        }
    }
}

/// Facts for every entity at one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// The tick the snapshot was taken at.
    pub tick: u64,
    /// Per-entity facts.
    pub entities: BTreeMap<EntityId, WorldStateView>,
}

impl WorldSnapshot {
    /// Create an empty snapshot for the given tick.
    pub const fn new(tick: u64) -> Self {
        Self {
            tick,
            entities: BTreeMap::new(),
        }
    }

    /// Add or replace an entity's facts.
    #[must_use]
    pub fn with_entity(mut self, entity_id: EntityId, view: WorldStateView) -> Self {
        self.entities.insert(entity_id, view);
        self
    }

    /// Facts for one entity, if the simulation reported it.
    pub fn view(&self, entity_id: EntityId) -> Option<&WorldStateView> {
        self.entities.get(&entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_facts_are_unavailable_when_absent() {
        let view = WorldStateView::default();
        assert_eq!(view.fact(Fact::HealthPct), Some(100.0));
        assert_eq!(view.fact(Fact::EnemyDist), None);
        assert_eq!(view.fact(Fact::Ammo), None);
        assert_eq!(view.fact(Fact::Time), None);
    }

    #[test]
    fn counts_convert_to_numbers() {
        let view = WorldStateView {
            ally_count: 3,
            ..WorldStateView::default()
        };
        assert_eq!(view.fact(Fact::AllyCount), Some(3.0));
    }

    #[test]
    fn snapshot_lookup() {
        let snapshot = WorldSnapshot::new(4).with_entity(EntityId::new(1), WorldStateView::default());
        assert!(snapshot.view(EntityId::new(1)).is_some());
        assert!(snapshot.view(EntityId::new(2)).is_none());
    }
}
