//! Bot participants: server-driven players that pick pre-authored paths.

use crate::game::GameState;
use crate::paths::PathLibrary;
use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use shared::{ParticipantId, SessionPhase, UnitId, Vec3};
use std::time::{Duration, Instant};

const THINK_MIN_SECONDS: f32 = 1.0;
const THINK_MAX_SECONDS: f32 = 3.0;

/// Drives one bot participant. A bot "thinks" for a randomized delay,
/// then orders a random living unit down a random pre-authored path. The
/// order goes through the same command validation as any human's.
pub struct BotController {
    pub participant_id: ParticipantId,
    next_think: Instant,
}

impl BotController {
    pub fn new(participant_id: ParticipantId, rng: &mut StdRng) -> Self {
        let mut bot = Self {
            participant_id,
            next_think: Instant::now(),
        };
        bot.schedule(rng);
        bot
    }

    fn schedule(&mut self, rng: &mut StdRng) {
        let delay = rng.gen_range(THINK_MIN_SECONDS..=THINK_MAX_SECONDS);
        self.next_think = Instant::now() + Duration::from_secs_f32(delay);
    }

    /// Polls the thinking timer. The world may have changed while the
    /// timer ran, so every precondition is re-checked here on expiry
    /// before any order is produced.
    pub fn think(
        &mut self,
        now: Instant,
        game: &GameState,
        library: &PathLibrary,
        rng: &mut StdRng,
    ) -> Option<(UnitId, Vec<Vec3>)> {
        if now < self.next_think {
            return None;
        }
        self.schedule(rng);

        if game.phase() != SessionPhase::Playing {
            return None;
        }
        let units = game.living_units_owned_by(self.participant_id);
        if units.is_empty() {
            return None;
        }

        let unit_id = units[rng.gen_range(0..units.len())];
        let path = library.pick_random(rng)?.clone();
        debug!(
            "Bot {} orders {} down a {}-point path",
            self.participant_id,
            unit_id,
            path.len()
        );
        Some((unit_id, path))
    }
}
