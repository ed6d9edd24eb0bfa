//! A scripted stand-in for the simulation: a fact provider and an action
//! dispatcher that share one order book.
//!
//! Each friendly unit faces a single enemy that closes in at a fixed speed
//! plus seeded jitter. Orders change how the gap evolves: retreating opens
//! it, holding or taking cover slows the approach, attacking knocks the
//! enemy back while ammunition lasts. An enemy in contact range deals
//! damage every tick until the unit dies.
//!
//! There is no pathfinding or line of sight. Movement orders simply finish
//! after a configured number of ticks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stratagem_core::{ActionDispatcher, DispatchError, InvocationHandle, WorldFactProvider};
use stratagem_types::{ActionInvocation, ActionKind, EntityId, ParamValue, WorldSnapshot, WorldStateView};
use tracing::{debug, info};

use crate::scenario::ScenarioConfig;

/// Enemy ids are the unit id offset by this value.
pub const ENEMY_ID_BASE: u64 = 1_000;

/// Distance at which an enemy starts dealing damage.
const CONTACT_RANGE: f64 = 5.0;

/// Health lost per tick in contact.
const CONTACT_DAMAGE: f64 = 0.5;

/// Maximum distance at which an attack connects.
const ATTACK_RANGE: f64 = 40.0;

/// Distance an enemy is pushed back by a connecting attack.
const KNOCKBACK: f64 = 15.0;

/// Starting ammunition per unit.
const START_AMMO: f64 = 30.0;

/// Build a world and its dispatcher from scenario settings.
pub fn build(config: &ScenarioConfig) -> (ScriptedWorld, SimDispatcher) {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let orders = Arc::new(Mutex::new(Orders::default()));

    let mut units = BTreeMap::new();
    {
        let mut book = lock(&orders);
        for raw in 1..=u64::from(config.units) {
            let id = EntityId::new(raw);
            let spread = sample(&mut rng, config.jitter);
            units.insert(id, Unit::new((config.enemy_start_dist + spread).max(0.0)));
            book.targets.insert(id);
            book.targets.insert(enemy_of(id));
        }
    }

    info!(
        units = units.len(),
        seed = config.seed,
        enemy_speed = config.enemy_speed,
        move_ticks = config.move_ticks,
        "Scripted world created"
    );

    let world = ScriptedWorld {
        units,
        rng,
        enemy_speed: config.enemy_speed,
        jitter: config.jitter,
        orders: Arc::clone(&orders),
    };
    let dispatcher = SimDispatcher {
        move_ticks: config.move_ticks,
        orders,
    };
    (world, dispatcher)
}

/// The enemy facing a friendly unit.
pub const fn enemy_of(unit: EntityId) -> EntityId {
    EntityId::new(unit.into_inner().saturating_add(ENEMY_ID_BASE))
}

// ---------------------------------------------------------------------------
// Shared order book
// ---------------------------------------------------------------------------

/// A movement order in progress.
#[derive(Debug)]
struct Movement {
    entity_id: EntityId,
    handle: InvocationHandle,
    done_at: u64,
}

/// Orders issued by the dispatcher and consumed by the world.
#[derive(Debug, Default)]
struct Orders {
    moving: Vec<Movement>,
    /// Continuous behavior per unit.
    stance: BTreeMap<EntityId, ActionKind>,
    /// Entities that attacks and follow orders may target.
    targets: BTreeSet<EntityId>,
    /// Units that fired since the last snapshot.
    fired: BTreeSet<EntityId>,
}

impl Orders {
    fn finish_moves(&mut self, tick: u64) {
        self.moving.retain(|movement| {
            if movement.done_at > tick {
                return true;
            }
            if movement.handle.completed(true) {
                debug!(entity_id = %movement.entity_id, tick, "Movement finished");
            }
            false
        });
    }
}

fn lock(orders: &Mutex<Orders>) -> MutexGuard<'_, Orders> {
    orders.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sample(rng: &mut StdRng, jitter: f64) -> f64 {
    if jitter > 0.0 {
        rng.random_range(-jitter..=jitter)
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Unit {
    health_pct: f64,
    enemy_dist: f64,
    ammo: f64,
    alive: bool,
}

impl Unit {
    const fn new(enemy_dist: f64) -> Self {
        Self {
            health_pct: 100.0,
            enemy_dist,
            ammo: START_AMMO,
            alive: true,
        }
    }

    fn step(&mut self, stance: Option<ActionKind>, fired: bool, speed: f64, jitter: f64) {
        let closing = match stance {
            Some(ActionKind::Retreat) => -speed,
            Some(ActionKind::HoldPosition | ActionKind::TakeCover) => speed * 0.5,
            _ => speed,
        };
        self.enemy_dist = (self.enemy_dist - closing + jitter).max(0.0);

        if fired && self.ammo >= 1.0 {
            self.ammo -= 1.0;
            if self.enemy_dist <= ATTACK_RANGE {
                self.enemy_dist += KNOCKBACK;
            }
        }

        if self.enemy_dist <= CONTACT_RANGE {
            let damage = if stance == Some(ActionKind::TakeCover) {
                CONTACT_DAMAGE * 0.5
            } else {
                CONTACT_DAMAGE
            };
            self.health_pct = (self.health_pct - damage).max(0.0);
            if self.health_pct <= 0.0 {
                self.alive = false;
            }
        }
    }

    fn view(&self, ally_count: u32) -> WorldStateView {
        WorldStateView {
            health_pct: self.health_pct,
            enemy_dist: self.alive.then_some(self.enemy_dist),
            ally_dist: None,
            enemy_count: u32::from(self.alive),
            ally_count,
            energy: None,
            ammo: Some(self.ammo),
            alive: self.alive,
        }
    }
}

/// Fact provider for the scripted scenario.
pub struct ScriptedWorld {
    units: BTreeMap<EntityId, Unit>,
    rng: StdRng,
    enemy_speed: f64,
    jitter: f64,
    orders: Arc<Mutex<Orders>>,
}

impl ScriptedWorld {
    /// Units still alive.
    pub fn alive_count(&self) -> usize {
        self.units.values().filter(|u| u.alive).count()
    }

    /// Ids of every unit, dead or alive.
    pub fn unit_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.units.keys().copied()
    }
}

impl WorldFactProvider for ScriptedWorld {
    fn snapshot(&mut self, tick: u64) -> WorldSnapshot {
        let mut book = lock(&self.orders);
        book.finish_moves(tick);
        let fired = std::mem::take(&mut book.fired);

        let alive = u32::try_from(self.alive_count()).unwrap_or(u32::MAX);
        let mut snapshot = WorldSnapshot::new(tick);

        for (id, unit) in &mut self.units {
            if unit.alive {
                let jitter = sample(&mut self.rng, self.jitter);
                unit.step(book.stance.get(id).copied(), fired.contains(id), self.enemy_speed, jitter);
                if !unit.alive {
                    info!(entity_id = %id, tick, "Unit killed");
                    book.targets.remove(id);
                    book.stance.remove(id);
                }
            }
            snapshot
                .entities
                .insert(*id, unit.view(alive.saturating_sub(u32::from(unit.alive))));
        }
        snapshot
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Action dispatcher for the scripted scenario.
///
/// Movement orders (`move_to`, `patrol`, `regroup`, `take_cover`) finish
/// after a fixed number of ticks. Continuous orders (`retreat`, `follow`,
/// `hold_position`) set the unit's stance and never report completion.
/// Attacks, abilities and speech finish immediately.
pub struct SimDispatcher {
    move_ticks: u64,
    orders: Arc<Mutex<Orders>>,
}

impl ActionDispatcher for SimDispatcher {
    fn dispatch(&mut self, invocation: ActionInvocation) -> Result<InvocationHandle, DispatchError> {
        let mut book = lock(&self.orders);

        if let Some(ParamValue::Entity(target)) = invocation.params.get("target")
            && !book.targets.contains(target)
        {
            return Err(DispatchError::TargetMissing { target: *target });
        }

        let entity_id = invocation.entity_id;
        let handle = InvocationHandle::new();
        match invocation.action {
            ActionKind::MoveTo | ActionKind::Patrol | ActionKind::Regroup | ActionKind::TakeCover => {
                if invocation.action == ActionKind::TakeCover {
                    book.stance.insert(entity_id, ActionKind::TakeCover);
                } else {
                    book.stance.remove(&entity_id);
                }
                book.moving.push(Movement {
                    entity_id,
                    handle: handle.clone(),
                    done_at: invocation.issued_at_tick.saturating_add(self.move_ticks),
                });
            }
            ActionKind::Retreat | ActionKind::Follow | ActionKind::HoldPosition => {
                book.stance.insert(entity_id, invocation.action);
            }
            ActionKind::Attack => {
                book.fired.insert(entity_id);
                handle.completed(true);
            }
            ActionKind::UseAbility | ActionKind::Speak => {
                handle.completed(true);
            }
        }

        debug!(
            %entity_id,
            plan_id = %invocation.plan_id,
            step_index = invocation.step_index,
            action = %invocation.action,
            tick = invocation.issued_at_tick,
            "Action dispatched"
        );
        Ok(handle)
    }

    fn cancel(&mut self, entity_id: EntityId, action: ActionKind, handle: &InvocationHandle) {
        let mut book = lock(&self.orders);
        book.moving.retain(|movement| movement.entity_id != entity_id);
        book.stance.remove(&entity_id);
        handle.completed(false);
        debug!(%entity_id, %action, "Action cancelled");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use stratagem_core::InvocationStatus;
    use stratagem_types::PlanId;

    use super::*;

    fn calm() -> ScenarioConfig {
        ScenarioConfig {
            units: 2,
            jitter: 0.0,
            move_ticks: 3,
            ..ScenarioConfig::default()
        }
    }

    fn invocation(entity: u64, action: ActionKind, tick: u64) -> ActionInvocation {
        ActionInvocation {
            entity_id: EntityId::new(entity),
            plan_id: PlanId::new(1),
            step_index: 0,
            action,
            params: BTreeMap::new(),
            priority: 0,
            issued_at_tick: tick,
        }
    }

    fn enemy_dist(snapshot: &WorldSnapshot, entity: u64) -> f64 {
        snapshot
            .view(EntityId::new(entity))
            .and_then(|v| v.enemy_dist)
            .unwrap()
    }

    #[test]
    fn unknown_target_is_missing() {
        let (_world, mut dispatcher) = build(&calm());
        let mut attack = invocation(1, ActionKind::Attack, 0);
        attack
            .params
            .insert("target".to_owned(), ParamValue::Entity(EntityId::new(77)));
        assert_eq!(
            dispatcher.dispatch(attack).unwrap_err(),
            DispatchError::TargetMissing {
                target: EntityId::new(77)
            }
        );

        let mut attack = invocation(1, ActionKind::Attack, 0);
        attack
            .params
            .insert("target".to_owned(), ParamValue::Entity(enemy_of(EntityId::new(1))));
        assert!(dispatcher.dispatch(attack).is_ok());
    }

    #[test]
    fn movement_finishes_after_configured_ticks() {
        let (mut world, mut dispatcher) = build(&calm());
        let handle = dispatcher.dispatch(invocation(1, ActionKind::MoveTo, 0)).unwrap();

        world.snapshot(1);
        world.snapshot(2);
        assert_eq!(handle.status(), InvocationStatus::Pending);
        world.snapshot(3);
        assert_eq!(handle.status(), InvocationStatus::Succeeded);
    }

    #[test]
    fn cancel_fails_the_handle_and_clears_orders() {
        let (mut world, mut dispatcher) = build(&calm());
        let handle = dispatcher.dispatch(invocation(1, ActionKind::Regroup, 0)).unwrap();
        dispatcher.cancel(EntityId::new(1), ActionKind::Regroup, &handle);
        world.snapshot(10);
        assert_eq!(handle.status(), InvocationStatus::Failed);
    }

    #[test]
    fn retreat_opens_the_gap() {
        let (mut world, mut dispatcher) = build(&calm());
        dispatcher.dispatch(invocation(1, ActionKind::Retreat, 0)).unwrap();

        let first = world.snapshot(0);
        let second = world.snapshot(1);
        assert!(enemy_dist(&second, 1) > enemy_dist(&first, 1));
        assert!(enemy_dist(&second, 2) < enemy_dist(&first, 2));
    }

    #[test]
    fn same_seed_same_world() {
        let config = ScenarioConfig {
            jitter: 1.0,
            ..ScenarioConfig::default()
        };
        let (mut a, _) = build(&config);
        let (mut b, _) = build(&config);
        for tick in 0..50 {
            assert_eq!(a.snapshot(tick), b.snapshot(tick));
        }
    }

    #[test]
    fn contact_kills_and_removes_target() {
        let config = ScenarioConfig {
            units: 1,
            enemy_start_dist: 0.0,
            enemy_speed: 0.0,
            jitter: 0.0,
            ..ScenarioConfig::default()
        };
        let (mut world, mut dispatcher) = build(&config);
        // 100 health at 0.5 per tick.
        for tick in 0..200 {
            world.snapshot(tick);
        }
        assert_eq!(world.alive_count(), 0);
        let last = world.snapshot(200);
        assert!(!last.view(EntityId::new(1)).unwrap().alive);

        let mut follow = invocation(2, ActionKind::Follow, 200);
        follow
            .params
            .insert("target".to_owned(), ParamValue::Entity(EntityId::new(1)));
        assert!(dispatcher.dispatch(follow).is_err());
    }
}
