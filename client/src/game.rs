use log::debug;
use shared::{
    Broadcast, Color, ParticipantId, SessionPhase, UnitId, UnitStateTag, Vec3,
};
use std::collections::HashMap;

/// Presentation-only reconstruction of a unit's behavior state. Built
/// from the broadcast tag and the separately replicated transform - never
/// from authority-only data like paths or target handles, which this
/// process does not receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationState {
    Idle,
    GoToLocation,
    FollowPath,
    Attack,
    Dead,
}

impl PresentationState {
    pub fn from_tag(tag: UnitStateTag) -> Self {
        match tag {
            UnitStateTag::Idle => PresentationState::Idle,
            UnitStateTag::GoToLocation => PresentationState::GoToLocation,
            UnitStateTag::FollowPath => PresentationState::FollowPath,
            UnitStateTag::Attack => PresentationState::Attack,
            UnitStateTag::Dead => PresentationState::Dead,
        }
    }
}

/// Read-only mirror of one replicated unit.
#[derive(Debug, Clone)]
pub struct MirrorUnit {
    pub unit_id: UnitId,
    pub owner: ParticipantId,
    pub color: Color,
    pub team_id: u8,
    pub position: Vec3,
    pub yaw: f32,
    pub health_current: f32,
    pub health_max: f32,
    pub state: PresentationState,
    /// Most recent defeat impulse, kept for the presentation layer to
    /// play back once.
    pub pending_impulse: Option<(Vec3, Vec3)>,
}

/// The observer's view of the world, populated exclusively by broadcasts.
/// Nothing here is ever written by local decisions; the authority is
/// trusted by construction.
#[derive(Debug, Default)]
pub struct WorldMirror {
    pub tick: u32,
    pub phase: Option<SessionPhase>,
    pub winner: Option<Option<ParticipantId>>,
    units: HashMap<UnitId, MirrorUnit>,
}

impl WorldMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit(&self, unit_id: UnitId) -> Option<&MirrorUnit> {
        self.units.get(&unit_id)
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn units_owned_by(&self, participant: ParticipantId) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self
            .units
            .values()
            .filter(|u| u.owner == participant)
            .map(|u| u.unit_id)
            .collect();
        ids.sort();
        ids
    }

    /// Takes the pending defeat impulse for a unit, if any, so effects
    /// play exactly once.
    pub fn take_impulse(&mut self, unit_id: UnitId) -> Option<(Vec3, Vec3)> {
        self.units
            .get_mut(&unit_id)
            .and_then(|u| u.pending_impulse.take())
    }

    /// Applies one world-related broadcast. Updates referencing units
    /// this mirror has never seen are skipped with a debug note; a later
    /// snapshot or spawn repairs the view.
    pub fn apply(&mut self, broadcast: &Broadcast) {
        match broadcast {
            Broadcast::UnitSpawned {
                unit_id,
                owner,
                position,
                color,
                team_id,
            } => {
                self.units.insert(
                    *unit_id,
                    MirrorUnit {
                        unit_id: *unit_id,
                        owner: *owner,
                        color: *color,
                        team_id: *team_id,
                        position: *position,
                        yaw: 0.0,
                        health_current: 0.0,
                        health_max: 0.0,
                        state: PresentationState::Idle,
                        pending_impulse: None,
                    },
                );
            }

            Broadcast::UnitDespawned { unit_id } => {
                self.units.remove(unit_id);
            }

            Broadcast::UnitStateChanged {
                unit_id, new_state, ..
            } => match self.units.get_mut(unit_id) {
                Some(unit) => unit.state = PresentationState::from_tag(*new_state),
                None => debug!("State change for unknown {}", unit_id),
            },

            Broadcast::HealthChanged {
                entity_id,
                current,
                max,
            } => match self.units.get_mut(entity_id) {
                Some(unit) => {
                    unit.health_current = *current;
                    unit.health_max = *max;
                }
                None => debug!("Health change for unknown {}", entity_id),
            },

            Broadcast::DefeatImpulse {
                unit_id,
                impulse,
                torque,
            } => {
                if let Some(unit) = self.units.get_mut(unit_id) {
                    unit.pending_impulse = Some((*impulse, *torque));
                }
            }

            Broadcast::WorldSnapshot { tick, units } => {
                self.tick = *tick;
                for transform in units {
                    if let Some(unit) = self.units.get_mut(&transform.unit_id) {
                        unit.position = transform.position;
                        unit.yaw = transform.yaw;
                    } else {
                        debug!("Snapshot transform for unknown {}", transform.unit_id);
                    }
                }
            }

            Broadcast::SessionPhaseChanged { new_phase, .. } => {
                self.phase = Some(*new_phase);
            }

            Broadcast::GameOver { winner } => {
                self.phase = Some(SessionPhase::GameOver);
                self.winner = Some(*winner);
            }

            // Lobby and connection broadcasts are handled elsewhere.
            _ => {}
        }
    }
}
