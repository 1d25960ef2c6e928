//! Authoritative game state: the single writer of all gameplay truth.

use crate::ownership::OwnershipRegistry;
use crate::session::{SessionEvent, SessionMachine};
use crate::unit::{ClosestEnemy, TargetPolicy, Unit, UnitEvent};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    Color, ParticipantId, SessionPhase, UnitId, UnitStateTag, UnitTransform, Vec3,
    MIN_PATH_POINTS, UNITS_PER_PARTICIPANT,
};
use std::collections::HashMap;

/// A production facility slot: where a participant's units appear and
/// where they are sent right after spawning.
#[derive(Debug, Clone, Copy)]
pub struct SpawnPoint {
    pub position: Vec3,
    pub rally: Option<Vec3>,
}

/// Everything the network layer turns into broadcasts at the end of a
/// tick. Collected during the tick, drained once, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Unit(UnitEvent),
    Session(SessionEvent),
    UnitSpawned {
        unit_id: UnitId,
        owner: ParticipantId,
        position: Vec3,
        color: Color,
        team_id: u8,
    },
    UnitDespawned {
        unit_id: UnitId,
    },
    HealthChanged {
        unit_id: UnitId,
        current: f32,
        max: f32,
    },
}

/// Win predicate supplied by the surrounding gameplay layer. Evaluated by
/// the decision tick while the match runs; `Some(outcome)` ends it, and
/// the inner `None` is a draw.
pub trait WinCondition: Send {
    fn evaluate(&self, units: &HashMap<UnitId, Unit>) -> Option<Option<ParticipantId>>;
}

/// Default predicate: the match ends when at most one team still has
/// living units.
pub struct LastTeamStanding;

impl WinCondition for LastTeamStanding {
    fn evaluate(&self, units: &HashMap<UnitId, Unit>) -> Option<Option<ParticipantId>> {
        let mut living: Vec<&Unit> = units.values().filter(|u| !u.is_dead()).collect();
        living.sort_by_key(|u| u.id);

        let mut teams: Vec<u8> = living.iter().map(|u| u.team_id).collect();
        teams.sort_unstable();
        teams.dedup();

        match teams.len() {
            0 => Some(None),
            1 => Some(Some(living[0].owner)),
            _ => None,
        }
    }
}

/// Recovery hook for units whose owner disconnected mid-session. The
/// exact product policy is unsettled; this is the extension point.
pub trait DisconnectPolicy: Send {
    fn on_orphaned(
        &self,
        orphans: &[UnitId],
        units: &mut HashMap<UnitId, Unit>,
        events: &mut Vec<GameEvent>,
    );
}

/// Default policy: orphaned units are despawned so nothing waits on an
/// ownerless army.
pub struct DespawnOrphans;

impl DisconnectPolicy for DespawnOrphans {
    fn on_orphaned(
        &self,
        orphans: &[UnitId],
        units: &mut HashMap<UnitId, Unit>,
        events: &mut Vec<GameEvent>,
    ) {
        for unit_id in orphans {
            if units.remove(unit_id).is_some() {
                events.push(GameEvent::UnitDespawned { unit_id: *unit_id });
            }
        }
    }
}

pub struct GameState {
    pub tick: u32,
    units: HashMap<UnitId, Unit>,
    next_unit_id: u32,
    registry: OwnershipRegistry,
    machine: SessionMachine,
    spawn_points: Vec<SpawnPoint>,
    rng: StdRng,
    target_policy: Box<dyn TargetPolicy>,
    win_condition: Box<dyn WinCondition>,
    disconnect_policy: Box<dyn DisconnectPolicy>,
    /// Set when required wiring was absent at startup; spawning refuses
    /// rather than crashing the process.
    disabled: bool,
    events: Vec<GameEvent>,
}

impl GameState {
    pub fn new(seed: u64, spawn_points: Vec<SpawnPoint>) -> Self {
        let disabled = spawn_points.is_empty();
        if disabled {
            error!("No spawn points configured; unit spawning is disabled");
        }

        Self {
            tick: 0,
            units: HashMap::new(),
            next_unit_id: 1,
            registry: OwnershipRegistry::new(),
            machine: SessionMachine::new(),
            spawn_points,
            rng: StdRng::seed_from_u64(seed),
            target_policy: Box::new(ClosestEnemy::default()),
            win_condition: Box::new(LastTeamStanding),
            disconnect_policy: Box::new(DespawnOrphans),
            disabled,
            events: Vec::new(),
        }
    }

    pub fn set_target_policy(&mut self, policy: Box<dyn TargetPolicy>) {
        self.target_policy = policy;
    }

    pub fn set_win_condition(&mut self, condition: Box<dyn WinCondition>) {
        self.win_condition = condition;
    }

    pub fn set_disconnect_policy(&mut self, policy: Box<dyn DisconnectPolicy>) {
        self.disconnect_policy = policy;
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    pub fn is_paused(&self) -> bool {
        self.machine.is_paused()
    }

    pub fn winner(&self) -> Option<Option<ParticipantId>> {
        self.machine.winner()
    }

    pub fn unit(&self, unit_id: UnitId) -> Option<&Unit> {
        self.units.get(&unit_id)
    }

    pub fn unit_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self.units.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn units_owned_by(&self, participant: ParticipantId) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self
            .units
            .values()
            .filter(|u| u.owner == participant)
            .map(|u| u.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn living_units_owned_by(&self, participant: ParticipantId) -> Vec<UnitId> {
        self.units_owned_by(participant)
            .into_iter()
            .filter(|id| self.units.get(id).map(|u| !u.is_dead()).unwrap_or(false))
            .collect()
    }

    /// Spawns a participant's squad at their facility slot and rallies it
    /// out. Each unit's owner is assigned exactly once, here.
    pub fn spawn_squad(&mut self, participant: ParticipantId, team_id: u8, color: Color) -> bool {
        if self.disabled {
            error!("Spawning disabled, refusing squad for {}", participant);
            return false;
        }
        if self.phase() != SessionPhase::WaitingForPlayers {
            warn!(
                "Spawn request from {} outside WaitingForPlayers, dropped",
                participant
            );
            return false;
        }
        if !self.units_owned_by(participant).is_empty() {
            warn!("{} already has a squad, dropped spawn request", participant);
            return false;
        }

        let slot = self.spawn_points[(participant.0 as usize - 1) % self.spawn_points.len()];

        for i in 0..UNITS_PER_PARTICIPANT {
            let unit_id = UnitId(self.next_unit_id);
            self.next_unit_id += 1;

            let position = Vec3::new(
                slot.position.x + i as f32 * 1.0,
                slot.position.y,
                slot.position.z,
            );
            let mut unit = Unit::new(unit_id, participant, team_id, position);

            let destination = match slot.rally {
                Some(rally) => Vec3::new(rally.x + i as f32 * 1.0, rally.y, rally.z),
                None => {
                    warn!(
                        "No production destination for {}, spawning {} in place",
                        participant, unit_id
                    );
                    position
                }
            };

            self.events.push(GameEvent::UnitSpawned {
                unit_id,
                owner: participant,
                position,
                color,
                team_id,
            });

            let mut unit_events = Vec::new();
            unit.initialize(destination, &mut unit_events);
            self.push_unit_events(unit_events);

            self.registry.assign(unit_id, participant);
            self.units.insert(unit_id, unit);
        }

        info!(
            "Spawned {} units for {} at slot ({:.1}, {:.1})",
            UNITS_PER_PARTICIPANT, participant, slot.position.x, slot.position.z
        );
        true
    }

    /// Starts the match once everyone required is present and spawned.
    pub fn try_start_match(&mut self, participant_count: usize, required: usize, all_spawned: bool) {
        if self.phase() != SessionPhase::WaitingForPlayers {
            return;
        }
        if participant_count >= required && all_spawned {
            let mut session_events = Vec::new();
            self.machine.start_match(&mut session_events);
            self.push_session_events(session_events);
        }
    }

    /// Applies a path command. The ownership check runs before anything
    /// else; a failed check drops the command without partial effects.
    pub fn submit_path(&mut self, issuer: ParticipantId, unit_id: UnitId, points: Vec<Vec3>) {
        if !self.registry.is_owned_by(unit_id, issuer) {
            warn!(
                "Dropped path command from {} for {}: not the owner",
                issuer, unit_id
            );
            return;
        }
        if points.len() < MIN_PATH_POINTS {
            warn!(
                "Dropped path command from {} for {}: {} points",
                issuer,
                unit_id,
                points.len()
            );
            return;
        }
        if !self.machine.simulation_running() {
            warn!(
                "Dropped path command from {} in {:?}",
                issuer,
                self.phase()
            );
            return;
        }

        let Some(unit) = self.units.get_mut(&unit_id) else {
            warn!("Dropped path command for missing {}", unit_id);
            return;
        };
        if unit.is_dead() {
            warn!("Dropped path command for dead {}", unit_id);
            return;
        }

        let mut unit_events = Vec::new();
        unit.assign_path(points, &mut unit_events);
        self.push_unit_events(unit_events);
    }

    pub fn pause(&mut self) {
        let mut session_events = Vec::new();
        self.machine.pause(&mut session_events);
        self.push_session_events(session_events);
    }

    pub fn resume(&mut self) {
        let mut session_events = Vec::new();
        self.machine.resume(&mut session_events);
        self.push_session_events(session_events);
    }

    /// Fixed-timestep simulation step: movement and combat for every
    /// unit, in unit-id order. Frozen while paused or after game over.
    pub fn fixed_update(&mut self, dt: f32) {
        if !self.machine.simulation_running() {
            return;
        }

        self.tick = self.tick.wrapping_add(1);

        let mut unit_events = Vec::new();
        for unit_id in self.unit_ids() {
            // Take the unit out so combat can mutate its target through
            // the remaining map.
            let Some(mut unit) = self.units.remove(&unit_id) else {
                continue;
            };
            unit.fixed_update(dt, &mut self.units, &mut self.rng, &mut unit_events);
            self.units.insert(unit_id, unit);
        }
        self.push_unit_events(unit_events);

        self.flush_health_changes();
    }

    /// Health broadcasts are derived from the replication dirty flags so
    /// every mutation in a tick collapses into one update per unit.
    fn flush_health_changes(&mut self) {
        let mut normalize = Vec::new();
        for (unit_id, unit) in self.units.iter_mut() {
            if unit.health.take_dirty() {
                self.events.push(GameEvent::HealthChanged {
                    unit_id: *unit_id,
                    current: unit.health.current(),
                    max: unit.health.max(),
                });
            }
            if unit.health.is_depleted() && unit.state_tag() != UnitStateTag::Dead {
                normalize.push(*unit_id);
            }
        }

        // health == 0 implies Dead, even for damage applied outside the
        // combat path.
        let mut unit_events = Vec::new();
        for unit_id in normalize {
            if let Some(unit) = self.units.get_mut(&unit_id) {
                unit.transition(crate::unit::UnitState::Dead, &mut unit_events);
            }
        }
        self.push_unit_events(unit_events);
    }

    /// Decision-rate step: target acquisition and the win check.
    pub fn decision_update(&mut self) {
        if self.phase() != SessionPhase::Playing {
            return;
        }

        let mut engagements: Vec<(UnitId, UnitId)> = Vec::new();
        for unit_id in self.unit_ids() {
            let Some(unit) = self.units.get(&unit_id) else {
                continue;
            };
            if !matches!(
                unit.state_tag(),
                UnitStateTag::Idle | UnitStateTag::FollowPath
            ) {
                continue;
            }

            let candidates: Vec<&Unit> = self
                .units
                .values()
                .filter(|other| other.id != unit_id)
                .collect();
            if let Some(target) = self.target_policy.acquire(unit, &candidates) {
                engagements.push((unit_id, target));
            }
        }

        let mut unit_events = Vec::new();
        for (attacker_id, target_id) in engagements {
            let target_alive = self
                .units
                .get(&target_id)
                .map(|t| !t.is_dead())
                .unwrap_or(false);
            if let Some(attacker) = self.units.get_mut(&attacker_id) {
                attacker.begin_attack(target_id, target_alive, &mut unit_events);
            }
        }
        self.push_unit_events(unit_events);

        if let Some(outcome) = self.win_condition.evaluate(&self.units) {
            let mut session_events = Vec::new();
            self.machine.declare_winner(outcome, &mut session_events);
            self.push_session_events(session_events);
        }
    }

    /// Tears down a departed participant: ownership is released and the
    /// recovery hook decides what happens to the orphaned units.
    pub fn disconnect(&mut self, participant: ParticipantId) {
        let orphans = self.registry.remove_participant(participant);
        if orphans.is_empty() {
            return;
        }
        self.disconnect_policy
            .on_orphaned(&orphans, &mut self.units, &mut self.events);
    }

    pub fn snapshot(&self) -> Vec<UnitTransform> {
        let mut units: Vec<UnitTransform> = self
            .units
            .values()
            .map(|u| UnitTransform {
                unit_id: u.id,
                position: u.position,
                yaw: u.yaw,
            })
            .collect();
        units.sort_by_key(|t| t.unit_id);
        units
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn push_unit_events(&mut self, unit_events: Vec<UnitEvent>) {
        self.events.extend(unit_events.into_iter().map(GameEvent::Unit));
    }

    fn push_session_events(&mut self, session_events: Vec<SessionEvent>) {
        self.events
            .extend(session_events.into_iter().map(GameEvent::Session));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn two_slot_points() -> Vec<SpawnPoint> {
        vec![
            SpawnPoint {
                position: Vec3::new(-5.0, 0.0, 0.0),
                rally: Some(Vec3::new(-3.0, 0.0, 0.0)),
            },
            SpawnPoint {
                position: Vec3::new(5.0, 0.0, 0.0),
                rally: Some(Vec3::new(3.0, 0.0, 0.0)),
            },
        ]
    }

    fn started_game() -> GameState {
        let mut game = GameState::new(3, two_slot_points());
        game.spawn_squad(ParticipantId(1), 1, Color(255, 0, 0));
        game.spawn_squad(ParticipantId(2), 2, Color(0, 0, 255));
        game.try_start_match(2, 2, true);
        game
    }

    #[test]
    fn test_spawn_assigns_ownership_once() {
        let mut game = GameState::new(1, two_slot_points());
        assert!(game.spawn_squad(ParticipantId(1), 1, Color(255, 0, 0)));

        let owned = game.units_owned_by(ParticipantId(1));
        assert_eq!(owned.len(), UNITS_PER_PARTICIPANT);

        // A second spawn request is dropped.
        assert!(!game.spawn_squad(ParticipantId(1), 1, Color(255, 0, 0)));
        assert_eq!(
            game.units_owned_by(ParticipantId(1)).len(),
            UNITS_PER_PARTICIPANT
        );
    }

    #[test]
    fn test_spawn_disabled_without_spawn_points() {
        let mut game = GameState::new(1, Vec::new());
        assert!(!game.spawn_squad(ParticipantId(1), 1, Color(255, 0, 0)));
        assert!(game.unit_ids().is_empty());
    }

    #[test]
    fn test_missing_rally_degrades_to_spawn_position() {
        let mut game = GameState::new(
            1,
            vec![SpawnPoint {
                position: Vec3::new(2.0, 0.0, 2.0),
                rally: None,
            }],
        );
        assert!(game.spawn_squad(ParticipantId(1), 1, Color(255, 0, 0)));

        // Units arrive at their in-place destination on the next step.
        game.fixed_update(DT);
        for unit_id in game.unit_ids() {
            assert_eq!(game.unit(unit_id).unwrap().state_tag(), UnitStateTag::Idle);
        }
    }

    #[test]
    fn test_path_command_from_non_owner_never_mutates() {
        let mut game = started_game();
        let victim = game.units_owned_by(ParticipantId(1))[0];
        let before = game.unit(victim).unwrap().state_tag();

        game.submit_path(
            ParticipantId(2),
            victim,
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 1.0)],
        );

        assert_eq!(game.unit(victim).unwrap().state_tag(), before);
        assert_eq!(game.unit(victim).unwrap().path_len(), 0);
    }

    #[test]
    fn test_single_point_path_rejected() {
        let mut game = started_game();
        let unit_id = game.units_owned_by(ParticipantId(1))[0];
        let before = game.unit(unit_id).unwrap().state_tag();

        game.submit_path(ParticipantId(1), unit_id, vec![Vec3::new(0.0, 0.0, 0.0)]);

        assert_eq!(game.unit(unit_id).unwrap().state_tag(), before);
    }

    #[test]
    fn test_valid_path_command_applies() {
        let mut game = started_game();
        let unit_id = game.units_owned_by(ParticipantId(1))[0];

        game.submit_path(
            ParticipantId(1),
            unit_id,
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 1.0)],
        );

        assert_eq!(
            game.unit(unit_id).unwrap().state_tag(),
            UnitStateTag::FollowPath
        );
    }

    #[test]
    fn test_match_starts_only_when_all_spawned() {
        let mut game = GameState::new(5, two_slot_points());
        game.spawn_squad(ParticipantId(1), 1, Color(255, 0, 0));

        game.try_start_match(2, 2, false);
        assert_eq!(game.phase(), SessionPhase::WaitingForPlayers);

        game.spawn_squad(ParticipantId(2), 2, Color(0, 0, 255));
        game.try_start_match(2, 2, true);
        assert_eq!(game.phase(), SessionPhase::Playing);
    }

    #[test]
    fn test_paused_clock_freezes_simulation() {
        let mut game = started_game();
        game.pause();
        let tick_before = game.tick;

        game.fixed_update(DT);
        game.fixed_update(DT);

        assert_eq!(game.tick, tick_before);
        game.resume();
        game.fixed_update(DT);
        assert_eq!(game.tick, tick_before + 1);
    }

    #[test]
    fn test_combat_runs_to_a_winner() {
        let mut game = started_game();

        // Drive both squads into the middle so they engage.
        for participant in [ParticipantId(1), ParticipantId(2)] {
            for unit_id in game.units_owned_by(participant) {
                game.submit_path(
                    participant,
                    unit_id,
                    vec![
                        game.unit(unit_id).unwrap().position,
                        Vec3::new(0.0, 0.0, 0.0),
                    ],
                );
            }
        }

        for _ in 0..(60 * 120) {
            game.fixed_update(DT);
            game.decision_update();
            if game.phase() == SessionPhase::GameOver {
                break;
            }
        }

        assert_eq!(game.phase(), SessionPhase::GameOver);
        let outcome = game.winner().expect("winner decided");
        if let Some(winner) = outcome {
            assert!(!game.living_units_owned_by(winner).is_empty());
        }
    }

    #[test]
    fn test_game_over_broadcast_events_emitted_once() {
        let mut game = started_game();
        game.drain_events();

        // Flatten one side so the win check fires.
        for unit_id in game.units_owned_by(ParticipantId(2)) {
            if let Some(unit) = game.units.get_mut(&unit_id) {
                unit.health.take_damage(10_000.0);
            }
        }
        game.fixed_update(DT);
        game.decision_update();
        game.decision_update();

        let events = game.drain_events();
        let game_overs = events
            .iter()
            .filter(|e| matches!(e, GameEvent::Session(SessionEvent::GameOver { .. })))
            .count();
        assert_eq!(game_overs, 1);

        let winner = match events
            .iter()
            .find(|e| matches!(e, GameEvent::Session(SessionEvent::GameOver { .. })))
        {
            Some(GameEvent::Session(SessionEvent::GameOver { winner })) => *winner,
            _ => None,
        };
        assert_eq!(winner, Some(ParticipantId(1)));
    }

    #[test]
    fn test_disconnect_despawns_orphans_by_default() {
        let mut game = started_game();
        game.drain_events();

        game.disconnect(ParticipantId(2));

        assert!(game.units_owned_by(ParticipantId(2)).is_empty());
        let events = game.drain_events();
        let despawns = events
            .iter()
            .filter(|e| matches!(e, GameEvent::UnitDespawned { .. }))
            .count();
        assert_eq!(despawns, UNITS_PER_PARTICIPANT);
    }

    #[test]
    fn test_health_changes_flushed_once_per_tick() {
        let mut game = started_game();
        game.drain_events();

        let unit_id = game.units_owned_by(ParticipantId(1))[0];
        if let Some(unit) = game.units.get_mut(&unit_id) {
            unit.health.take_damage(10.0);
            unit.health.take_damage(10.0);
        }
        game.fixed_update(DT);

        let events = game.drain_events();
        let health_updates = events
            .iter()
            .filter(|e| matches!(e, GameEvent::HealthChanged { unit_id: id, .. } if *id == unit_id))
            .count();
        assert_eq!(health_updates, 1);
    }
}
