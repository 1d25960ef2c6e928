//! Local, unreplicated turn cycle for the Playing phase.
//!
//! Each client runs its own copy of this cycle; nothing here is ever sent
//! to the authority or to other clients. The delays are plain timers that
//! re-validate the session phase when they expire, since the match may
//! have ended while they ran.

use log::debug;
use shared::{ParticipantId, SessionPhase};
use std::time::{Duration, Instant};

const TURN_END_DELAY: Duration = Duration::from_secs(2);
const REMOTE_TURN_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnSubPhase {
    PlayerTurn,
    DrawingPath,
    PlayerTurnEnd,
}

/// Cycles PlayerTurn -> DrawingPath -> PlayerTurnEnd through every
/// participant in order. The local participant's turn advances through
/// explicit drawing calls from the input layer; remote participants'
/// turns advance on a watch delay.
pub struct TurnCycle {
    local_id: ParticipantId,
    order: Vec<ParticipantId>,
    current: usize,
    sub_phase: TurnSubPhase,
    deadline: Option<Instant>,
    active: bool,
}

impl TurnCycle {
    pub fn new(local_id: ParticipantId) -> Self {
        Self {
            local_id,
            order: Vec::new(),
            current: 0,
            sub_phase: TurnSubPhase::PlayerTurn,
            deadline: None,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn sub_phase(&self) -> TurnSubPhase {
        self.sub_phase
    }

    pub fn current_participant(&self) -> Option<ParticipantId> {
        if !self.active {
            return None;
        }
        self.order.get(self.current).copied()
    }

    pub fn is_local_turn(&self) -> bool {
        self.current_participant() == Some(self.local_id)
    }

    /// Starts the cycle over the given participant order, beginning with
    /// the first entry's PlayerTurn.
    pub fn start(&mut self, order: Vec<ParticipantId>, now: Instant) {
        if order.is_empty() {
            return;
        }
        debug!("Turn cycle started over {} participants", order.len());
        self.order = order;
        self.current = 0;
        self.active = true;
        self.enter_player_turn(now);
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.deadline = None;
    }

    fn enter_player_turn(&mut self, now: Instant) {
        self.sub_phase = TurnSubPhase::PlayerTurn;
        // Remote turns are watched, not played; they advance on a delay.
        self.deadline = if self.is_local_turn() {
            None
        } else {
            Some(now + REMOTE_TURN_DELAY)
        };
    }

    /// Input layer hook: the local player started drawing a path. Only
    /// legal during the local player's own PlayerTurn.
    pub fn begin_drawing(&mut self) -> bool {
        if !self.active || !self.is_local_turn() || self.sub_phase != TurnSubPhase::PlayerTurn {
            return false;
        }
        self.sub_phase = TurnSubPhase::DrawingPath;
        true
    }

    /// Input layer hook: drawing finished (the captured points go to the
    /// authority separately). Arms the turn-end delay.
    pub fn finish_drawing(&mut self, now: Instant) -> bool {
        if !self.active || self.sub_phase != TurnSubPhase::DrawingPath {
            return false;
        }
        self.sub_phase = TurnSubPhase::PlayerTurnEnd;
        self.deadline = Some(now + TURN_END_DELAY);
        true
    }

    /// Polls the cycle's timers. The session phase is re-checked on every
    /// expiry: a timer armed during play must not advance a cycle whose
    /// match has since ended.
    pub fn poll(&mut self, now: Instant, phase: Option<SessionPhase>) {
        if !self.active {
            return;
        }
        if matches!(phase, Some(SessionPhase::GameOver)) {
            self.stop();
            return;
        }
        if matches!(phase, Some(SessionPhase::Paused)) {
            return;
        }

        let Some(deadline) = self.deadline else {
            return;
        };
        if now < deadline {
            return;
        }
        self.deadline = None;

        match self.sub_phase {
            // A remote participant's watched turn ran out.
            TurnSubPhase::PlayerTurn => {
                self.sub_phase = TurnSubPhase::PlayerTurnEnd;
                self.deadline = Some(now + TURN_END_DELAY);
            }
            TurnSubPhase::DrawingPath => {}
            TurnSubPhase::PlayerTurnEnd => {
                self.current = (self.current + 1) % self.order.len();
                self.enter_player_turn(now);
            }
        }
    }
}
