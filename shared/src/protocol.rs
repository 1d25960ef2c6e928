use crate::math::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct ParticipantId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct UnitId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u8, pub u8, pub u8);

/// Compact behavior tag replicated to observers in place of the
/// authority's full state payload (paths, target handles stay server-side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitStateTag {
    Idle,
    GoToLocation,
    FollowPath,
    Attack,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    WaitingForPlayers,
    Playing,
    GameOver,
    Paused,
}

impl SessionPhase {
    /// Phases whose entry is broadcast to observers. Playing is excluded:
    /// its turn sub-phase lives locally on each client.
    pub fn is_network_relevant(&self) -> bool {
        matches!(
            self,
            SessionPhase::WaitingForPlayers | SessionPhase::Paused | SessionPhase::GameOver
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyMember {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub is_ready: bool,
    pub is_host: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitTransform {
    pub unit_id: UnitId,
    pub position: Vec3,
    pub yaw: f32,
}

/// Observer-to-authority intent. The issuing participant is resolved from
/// the source address on receipt, never from the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    Connect {
        client_version: u32,
        payload: String,
    },
    CreateSession {
        name: String,
        is_private: bool,
    },
    JoinSession {
        code: String,
    },
    LeaveSession,
    ToggleReady,
    StartCountdown,
    CancelCountdown,
    RequestSpawn,
    SubmitPath {
        unit_id: UnitId,
        points: Vec<Vec3>,
    },
    Pause,
    Resume,
    Disconnect,
}

/// Authority-to-observer fact, applied unconditionally on receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Broadcast {
    Connected {
        participant_id: ParticipantId,
    },
    ConnectionDenied {
        reason: String,
    },
    SessionInfo {
        code: String,
        name: String,
    },

    MemberJoined {
        member: LobbyMember,
    },
    MemberLeft {
        index: u32,
    },
    MemberDataChanged {
        index: u32,
        member: LobbyMember,
    },
    MembershipDeleted,
    LobbyDataChanged {
        countdown_active: bool,
    },
    CountdownTick {
        seconds_remaining: u32,
    },
    CountdownComplete,

    SessionPhaseChanged {
        old_phase: SessionPhase,
        new_phase: SessionPhase,
    },
    GameOver {
        winner: Option<ParticipantId>,
    },

    UnitSpawned {
        unit_id: UnitId,
        owner: ParticipantId,
        position: Vec3,
        color: Color,
        team_id: u8,
    },
    UnitStateChanged {
        unit_id: UnitId,
        old_state: UnitStateTag,
        new_state: UnitStateTag,
    },
    HealthChanged {
        entity_id: UnitId,
        current: f32,
        max: f32,
    },
    DefeatImpulse {
        unit_id: UnitId,
        impulse: Vec3,
        torque: Vec3,
    },
    UnitDespawned {
        unit_id: UnitId,
    },
    WorldSnapshot {
        tick: u32,
        units: Vec<UnitTransform>,
    },

    Disconnected {
        reason: String,
    },
}
