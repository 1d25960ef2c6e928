//! Authoritative unit behavior: movement, pathing, combat, death.
//!
//! Each unit carries a closed set of behavior states. All decisions happen
//! here on the authority; observers only ever see the compact state tags
//! emitted through [`UnitEvent`]. Paths, waypoint indices and target
//! handles never leave this process.

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use shared::math::yaw_from_direction;
use shared::{
    Health, ParticipantId, UnitId, UnitStateTag, Vec3, AGGRO_RADIUS, ATTACK_CYCLE_SECONDS,
    ATTACK_RESOLVE_FRACTION, DAMAGE_MAX, DAMAGE_MIN, HIT_CHANCE, STOPPING_DISTANCE,
    UNIT_MAX_HEALTH, UNIT_MOVE_SPEED,
};
use std::cmp::Ordering;
use std::collections::HashMap;

const DEFEAT_IMPULSE_STRENGTH: f32 = 4.0;
const DEFEAT_TORQUE_MAX: f32 = 2.0;

/// Where an interrupted unit resumes once its attack ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnState {
    Idle,
    FollowPath,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnitState {
    Idle,
    GoToLocation {
        dest: Vec3,
    },
    FollowPath,
    Attack {
        target: UnitId,
        return_state: ReturnState,
        cycle_elapsed: f32,
        resolved: bool,
    },
    Dead,
}

impl UnitState {
    pub fn tag(&self) -> UnitStateTag {
        match self {
            UnitState::Idle => UnitStateTag::Idle,
            UnitState::GoToLocation { .. } => UnitStateTag::GoToLocation,
            UnitState::FollowPath => UnitStateTag::FollowPath,
            UnitState::Attack { .. } => UnitStateTag::Attack,
            UnitState::Dead => UnitStateTag::Dead,
        }
    }
}

/// Facts produced by unit updates, drained once per tick by the network
/// layer. `WaypointReached` stays server-local; the rest become broadcasts.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitEvent {
    StateChanged {
        unit_id: UnitId,
        old_state: UnitStateTag,
        new_state: UnitStateTag,
    },
    WaypointReached {
        unit_id: UnitId,
        index: usize,
    },
    DefeatImpulse {
        unit_id: UnitId,
        impulse: Vec3,
        torque: Vec3,
    },
}

#[derive(Debug)]
pub struct Unit {
    pub id: UnitId,
    pub owner: ParticipantId,
    pub team_id: u8,
    pub position: Vec3,
    pub yaw: f32,
    pub velocity: Vec3,
    pub health: Health,
    /// Set from spawn until the unit first arrives at its production
    /// destination; collision/occupancy logic must see it before the
    /// first physics step.
    pub in_transit: bool,
    state: UnitState,
    // Authority-only path data, never replicated.
    path: Vec<Vec3>,
    path_index: usize,
}

impl Unit {
    pub fn new(id: UnitId, owner: ParticipantId, team_id: u8, position: Vec3) -> Self {
        Self {
            id,
            owner,
            team_id,
            position,
            yaw: 0.0,
            velocity: Vec3::default(),
            health: Health::new(UNIT_MAX_HEALTH),
            in_transit: false,
            state: UnitState::Idle,
            path: Vec::new(),
            path_index: 0,
        }
    }

    /// Spawn-time contract with the production facility: marks the unit
    /// in transit before any physics step can observe it, then heads for
    /// the production destination.
    pub fn initialize(&mut self, destination: Vec3, events: &mut Vec<UnitEvent>) {
        self.in_transit = true;
        self.transition(
            UnitState::GoToLocation {
                dest: destination,
            },
            events,
        );
    }

    pub fn state_tag(&self) -> UnitStateTag {
        self.state.tag()
    }

    pub fn is_dead(&self) -> bool {
        matches!(self.state, UnitState::Dead) || self.health.is_depleted()
    }

    pub fn path_index(&self) -> usize {
        self.path_index
    }

    pub fn path_len(&self) -> usize {
        self.path.len()
    }

    /// Canonical transition function: exit, swap, enter, emit. Dead is
    /// terminal; transitions out of it are ignored.
    pub fn transition(&mut self, new_state: UnitState, events: &mut Vec<UnitEvent>) {
        if matches!(self.state, UnitState::Dead) {
            return;
        }

        let old_tag = self.state.tag();
        self.exit_state();
        self.state = new_state;
        self.enter_state();
        let new_tag = self.state.tag();

        events.push(UnitEvent::StateChanged {
            unit_id: self.id,
            old_state: old_tag,
            new_state: new_tag,
        });
    }

    fn exit_state(&mut self) {
        self.velocity = Vec3::default();
    }

    fn enter_state(&mut self) {
        if matches!(self.state, UnitState::Dead) {
            self.velocity = Vec3::default();
        }
    }

    /// Accepts a validated path command and starts following it from the
    /// first waypoint. Ignored for dead units.
    pub fn assign_path(&mut self, points: Vec<Vec3>, events: &mut Vec<UnitEvent>) {
        if self.is_dead() {
            return;
        }
        self.path = points;
        self.path_index = 0;
        self.transition(UnitState::FollowPath, events);
    }

    /// Engages `target`, remembering where to resume afterwards. Entering
    /// combat against an already-dead target resolves to the return state
    /// immediately, within the same tick.
    pub fn begin_attack(&mut self, target: UnitId, target_alive: bool, events: &mut Vec<UnitEvent>) {
        if self.is_dead() {
            return;
        }

        let return_state = match self.state {
            UnitState::FollowPath => ReturnState::FollowPath,
            _ => ReturnState::Idle,
        };

        if !target_alive {
            debug!("{} refused attack on dead target {}", self.id, target);
            self.return_to(return_state, events);
            return;
        }

        self.transition(
            UnitState::Attack {
                target,
                return_state,
                cycle_elapsed: 0.0,
                resolved: false,
            },
            events,
        );
    }

    fn return_to(&mut self, return_state: ReturnState, events: &mut Vec<UnitEvent>) {
        match return_state {
            ReturnState::FollowPath if self.path_index < self.path.len() => {
                if self.state.tag() != UnitStateTag::FollowPath {
                    self.transition(UnitState::FollowPath, events);
                }
            }
            _ => {
                if self.state.tag() != UnitStateTag::Idle {
                    self.transition(UnitState::Idle, events);
                }
            }
        }
    }

    /// Advances one fixed physics step. `others` holds every other unit in
    /// the world; combat resolution mutates targets through it.
    pub fn fixed_update(
        &mut self,
        dt: f32,
        others: &mut HashMap<UnitId, Unit>,
        rng: &mut StdRng,
        events: &mut Vec<UnitEvent>,
    ) {
        match &self.state {
            UnitState::Idle | UnitState::Dead => {
                self.velocity = Vec3::default();
            }

            UnitState::GoToLocation { dest } => {
                let dest = *dest;
                if self.move_toward(dest, dt) {
                    self.in_transit = false;
                    self.transition(UnitState::Idle, events);
                }
            }

            UnitState::FollowPath => {
                let goal = match self.path.get(self.path_index) {
                    Some(point) => *point,
                    None => {
                        self.transition(UnitState::Idle, events);
                        return;
                    }
                };

                if self.move_toward(goal, dt) {
                    events.push(UnitEvent::WaypointReached {
                        unit_id: self.id,
                        index: self.path_index,
                    });
                    self.path_index += 1;
                    if self.path_index >= self.path.len() {
                        self.transition(UnitState::Idle, events);
                    }
                }
            }

            UnitState::Attack {
                target,
                return_state,
                cycle_elapsed,
                resolved,
            } => {
                let target_id = *target;
                let return_state = *return_state;
                let mut elapsed = *cycle_elapsed;
                let mut has_resolved = *resolved;

                self.velocity = Vec3::default();

                // Target validity is checked every tick, not only at
                // cycle boundaries.
                let target_position = match others.get(&target_id) {
                    Some(t) if !t.is_dead() => t.position,
                    _ => {
                        self.return_to(return_state, events);
                        return;
                    }
                };
                self.yaw = yaw_from_direction(&self.position.planar_direction_to(&target_position));

                elapsed += dt;
                let mut target_died = false;

                if !has_resolved && elapsed >= ATTACK_CYCLE_SECONDS * ATTACK_RESOLVE_FRACTION {
                    has_resolved = true;
                    target_died = self.resolve_hit(target_id, others, rng, events);
                }

                if elapsed >= ATTACK_CYCLE_SECONDS {
                    elapsed -= ATTACK_CYCLE_SECONDS;
                    has_resolved = false;
                }

                if let UnitState::Attack {
                    cycle_elapsed,
                    resolved,
                    ..
                } = &mut self.state
                {
                    *cycle_elapsed = elapsed;
                    *resolved = has_resolved;
                }

                if target_died {
                    self.return_to(return_state, events);
                }
            }
        }
    }

    /// One hit/miss/damage resolution. Returns true when this hit killed
    /// the target; the defeat impulse fires here, on the killing hit only.
    fn resolve_hit(
        &mut self,
        target_id: UnitId,
        others: &mut HashMap<UnitId, Unit>,
        rng: &mut StdRng,
        events: &mut Vec<UnitEvent>,
    ) -> bool {
        if rng.gen::<f32>() >= HIT_CHANCE {
            return false;
        }

        let damage = rng.gen_range(DAMAGE_MIN..=DAMAGE_MAX);
        let Some(target) = others.get_mut(&target_id) else {
            return false;
        };

        if !target.health.take_damage(damage) {
            return false;
        }

        let impulse = self
            .position
            .planar_direction_to(&target.position)
            .scale(DEFEAT_IMPULSE_STRENGTH);
        let torque = Vec3::new(
            rng.gen_range(-DEFEAT_TORQUE_MAX..=DEFEAT_TORQUE_MAX),
            rng.gen_range(-DEFEAT_TORQUE_MAX..=DEFEAT_TORQUE_MAX),
            rng.gen_range(-DEFEAT_TORQUE_MAX..=DEFEAT_TORQUE_MAX),
        );

        target.transition(UnitState::Dead, events);
        events.push(UnitEvent::DefeatImpulse {
            unit_id: target_id,
            impulse,
            torque,
        });
        true
    }

    fn move_toward(&mut self, goal: Vec3, dt: f32) -> bool {
        if self.position.planar_distance(&goal) <= STOPPING_DISTANCE {
            self.velocity = Vec3::default();
            return true;
        }

        let direction = self.position.planar_direction_to(&goal);
        self.velocity = direction.scale(UNIT_MOVE_SPEED);
        self.position = self.position.add(&self.velocity.scale(dt));
        self.yaw = yaw_from_direction(&direction);
        false
    }
}

/// Range and target-selection policy, queried by the decision tick for
/// every unit that can acquire a target. The tie-break rule is not a
/// settled product decision, so it stays behind this trait.
pub trait TargetPolicy: Send {
    fn acquire(&self, unit: &Unit, candidates: &[&Unit]) -> Option<UnitId>;
}

/// Default policy: the closest living enemy inside the aggro radius,
/// distance ties broken by lower unit id for determinism.
pub struct ClosestEnemy {
    pub radius: f32,
}

impl Default for ClosestEnemy {
    fn default() -> Self {
        Self {
            radius: AGGRO_RADIUS,
        }
    }
}

impl TargetPolicy for ClosestEnemy {
    fn acquire(&self, unit: &Unit, candidates: &[&Unit]) -> Option<UnitId> {
        candidates
            .iter()
            .filter(|c| c.team_id != unit.team_id && !c.is_dead())
            .map(|c| (unit.position.planar_distance(&c.position), c.id))
            .filter(|(distance, _)| *distance <= self.radius)
            .min_by(|(da, ia), (db, ib)| {
                da.partial_cmp(db)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| ia.cmp(ib))
            })
            .map(|(_, id)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn unit_at(id: u32, team: u8, x: f32, z: f32) -> Unit {
        Unit::new(
            UnitId(id),
            ParticipantId(team as u32),
            team,
            Vec3::new(x, 0.0, z),
        )
    }

    fn state_changes(events: &[UnitEvent]) -> Vec<(UnitStateTag, UnitStateTag)> {
        events
            .iter()
            .filter_map(|e| match e {
                UnitEvent::StateChanged {
                    old_state,
                    new_state,
                    ..
                } => Some((*old_state, *new_state)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_new_unit_is_idle_and_healthy() {
        let unit = unit_at(1, 1, 0.0, 0.0);
        assert_eq!(unit.state_tag(), UnitStateTag::Idle);
        assert_eq!(unit.health.current(), UNIT_MAX_HEALTH);
        assert!(!unit.in_transit);
    }

    #[test]
    fn test_initialize_sets_in_transit_before_movement() {
        let mut unit = unit_at(1, 1, 0.0, 0.0);
        let mut events = Vec::new();

        unit.initialize(Vec3::new(5.0, 0.0, 0.0), &mut events);
        assert!(unit.in_transit);
        assert_eq!(unit.state_tag(), UnitStateTag::GoToLocation);
    }

    #[test]
    fn test_go_to_location_arrives_and_idles() {
        let mut unit = unit_at(1, 1, 0.0, 0.0);
        let mut events = Vec::new();
        let mut others = HashMap::new();
        let mut rng = rng();

        unit.initialize(Vec3::new(1.0, 0.0, 0.0), &mut events);

        let dt = 1.0 / 60.0;
        for _ in 0..120 {
            unit.fixed_update(dt, &mut others, &mut rng, &mut events);
        }

        assert_eq!(unit.state_tag(), UnitStateTag::Idle);
        assert!(!unit.in_transit);
        assert!(unit.position.planar_distance(&Vec3::new(1.0, 0.0, 0.0)) <= STOPPING_DISTANCE);
    }

    #[test]
    fn test_follow_path_visits_every_waypoint_then_idles() {
        let mut unit = unit_at(1, 1, 0.0, 0.0);
        let mut events = Vec::new();
        let mut others = HashMap::new();
        let mut rng = rng();

        let points = vec![
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(2.0, 0.0, 1.0),
        ];
        unit.assign_path(points.clone(), &mut events);
        assert_eq!(unit.state_tag(), UnitStateTag::FollowPath);

        let dt = 1.0 / 60.0;
        for _ in 0..600 {
            unit.fixed_update(dt, &mut others, &mut rng, &mut events);
            if unit.state_tag() == UnitStateTag::Idle {
                break;
            }
        }

        let waypoints: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                UnitEvent::WaypointReached { index, .. } => Some(*index),
                _ => None,
            })
            .collect();

        assert_eq!(waypoints, vec![0, 1, 2]);
        assert_eq!(unit.state_tag(), UnitStateTag::Idle);
    }

    #[test]
    fn test_assign_path_ignored_when_dead() {
        let mut unit = unit_at(1, 1, 0.0, 0.0);
        let mut events = Vec::new();

        unit.transition(UnitState::Dead, &mut events);
        unit.assign_path(
            vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
            &mut events,
        );

        assert_eq!(unit.state_tag(), UnitStateTag::Dead);
    }

    #[test]
    fn test_dead_is_terminal() {
        let mut unit = unit_at(1, 1, 0.0, 0.0);
        let mut events = Vec::new();

        unit.transition(UnitState::Dead, &mut events);
        unit.transition(UnitState::Idle, &mut events);

        assert_eq!(unit.state_tag(), UnitStateTag::Dead);
        // Only the single transition into Dead was announced.
        assert_eq!(state_changes(&events).len(), 1);
    }

    #[test]
    fn test_begin_attack_with_dead_target_stays_out_of_attack() {
        let mut unit = unit_at(1, 1, 0.0, 0.0);
        let mut events = Vec::new();

        unit.begin_attack(UnitId(9), false, &mut events);

        assert_eq!(unit.state_tag(), UnitStateTag::Idle);
        assert!(state_changes(&events)
            .iter()
            .all(|(_, new)| *new != UnitStateTag::Attack));
    }

    #[test]
    fn test_attack_kills_target_and_returns_to_path() {
        let mut attacker = unit_at(1, 1, 0.0, 0.0);
        let mut events = Vec::new();
        let mut rng = rng();

        let mut others = HashMap::new();
        others.insert(UnitId(2), unit_at(2, 2, 1.0, 0.0));

        // Mid-path interruption: remember FollowPath and the current index.
        attacker.assign_path(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(5.0, 0.0, 0.0),
                Vec3::new(5.0, 0.0, 5.0),
            ],
            &mut events,
        );
        attacker.path_index = 1;
        attacker.begin_attack(UnitId(2), true, &mut events);
        assert_eq!(attacker.state_tag(), UnitStateTag::Attack);

        let dt = 1.0 / 60.0;
        for _ in 0..(60 * 30) {
            attacker.fixed_update(dt, &mut others, &mut rng, &mut events);
            if attacker.state_tag() != UnitStateTag::Attack {
                break;
            }
        }

        // Target died, attacker resumed the stored path at its old index.
        assert_eq!(others[&UnitId(2)].state_tag(), UnitStateTag::Dead);
        assert_eq!(attacker.state_tag(), UnitStateTag::FollowPath);
        assert_eq!(attacker.path_index(), 1);

        let impulses = events
            .iter()
            .filter(|e| matches!(e, UnitEvent::DefeatImpulse { .. }))
            .count();
        assert_eq!(impulses, 1);

        let deaths = state_changes(&events)
            .iter()
            .filter(|(_, new)| *new == UnitStateTag::Dead)
            .count();
        assert_eq!(deaths, 1);
    }

    #[test]
    fn test_attack_resolves_once_per_cycle() {
        let mut attacker = unit_at(1, 1, 0.0, 0.0);
        let mut events = Vec::new();
        let mut rng = rng();

        let mut target = unit_at(2, 2, 1.0, 0.0);
        // Deep pool so the target survives the observed cycles.
        target.health = Health::new(1_000_000.0);
        let mut others = HashMap::new();
        others.insert(UnitId(2), target);

        attacker.begin_attack(UnitId(2), true, &mut events);

        // One full cycle in small steps: health may drop at most once.
        let dt = ATTACK_CYCLE_SECONDS / 20.0;
        let mut drops = 0;
        let mut last_health = others[&UnitId(2)].health.current();
        for _ in 0..20 {
            attacker.fixed_update(dt, &mut others, &mut rng, &mut events);
            let health = others[&UnitId(2)].health.current();
            if health < last_health {
                drops += 1;
                last_health = health;
            }
        }

        assert!(drops <= 1);
    }

    #[test]
    fn test_attack_preempted_when_target_despawns() {
        let mut attacker = unit_at(1, 1, 0.0, 0.0);
        let mut events = Vec::new();
        let mut rng = rng();
        let mut others = HashMap::new();
        others.insert(UnitId(2), unit_at(2, 2, 1.0, 0.0));

        attacker.begin_attack(UnitId(2), true, &mut events);
        others.remove(&UnitId(2));

        attacker.fixed_update(1.0 / 60.0, &mut others, &mut rng, &mut events);
        assert_eq!(attacker.state_tag(), UnitStateTag::Idle);
    }

    #[test]
    fn test_closest_enemy_prefers_distance_then_lower_id() {
        let unit = unit_at(1, 1, 0.0, 0.0);
        let near = unit_at(5, 2, 1.0, 0.0);
        let far = unit_at(3, 2, 3.0, 0.0);
        let tied = unit_at(4, 2, 1.0, 0.0);
        let friendly = unit_at(6, 1, 0.5, 0.0);

        let policy = ClosestEnemy::default();
        let picked = policy.acquire(&unit, &[&far, &near, &tied, &friendly]);

        // Near and tied are equidistant; the lower id wins.
        assert_eq!(picked, Some(UnitId(4)));
    }

    #[test]
    fn test_closest_enemy_respects_radius_and_death() {
        let unit = unit_at(1, 1, 0.0, 0.0);
        let out_of_range = unit_at(2, 2, AGGRO_RADIUS + 1.0, 0.0);
        let mut dead = unit_at(3, 2, 1.0, 0.0);
        let mut sink = Vec::new();
        dead.transition(UnitState::Dead, &mut sink);

        let policy = ClosestEnemy::default();
        assert_eq!(policy.acquire(&unit, &[&out_of_range, &dead]), None);
    }
}
