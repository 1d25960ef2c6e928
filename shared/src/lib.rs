pub mod math;
pub mod protocol;
pub mod replication;

pub use math::Vec3;
pub use protocol::{
    Broadcast, Color, Command, LobbyMember, ParticipantId, SessionPhase, UnitId, UnitStateTag,
    UnitTransform,
};
pub use replication::{Health, Replicated, ReplicatedView};

pub const PROTOCOL_VERSION: u32 = 1;

pub const UNIT_MOVE_SPEED: f32 = 2.5;
pub const STOPPING_DISTANCE: f32 = 0.1;
pub const UNIT_MAX_HEALTH: f32 = 100.0;

pub const ATTACK_RANGE: f32 = 1.5;
pub const AGGRO_RADIUS: f32 = 6.0;
pub const ATTACK_CYCLE_SECONDS: f32 = 1.0;
pub const ATTACK_RESOLVE_FRACTION: f32 = 0.5;
pub const HIT_CHANCE: f32 = 0.8;
pub const DAMAGE_MIN: f32 = 8.0;
pub const DAMAGE_MAX: f32 = 20.0;

pub const MIN_PATH_POINTS: usize = 2;
pub const UNITS_PER_PARTICIPANT: usize = 3;

pub const MIN_LOBBY_MEMBERS: usize = 2;
pub const COUNTDOWN_SECONDS: u32 = 3;
pub const SESSION_CODE_LEN: usize = 6;
