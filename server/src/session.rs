//! Session-level flow: WaitingForPlayers -> Playing -> GameOver, with a
//! Paused side-branch that resumes into whatever phase it interrupted.

use log::{info, warn};
use shared::{ParticipantId, SessionPhase};

/// Facts emitted by phase transitions. `PhaseChanged` always fires;
/// `NetworkPhase` only for the subset of phases observers are told about.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged {
        old_phase: SessionPhase,
        new_phase: SessionPhase,
    },
    NetworkPhase {
        old_phase: SessionPhase,
        new_phase: SessionPhase,
    },
    GameOver {
        winner: Option<ParticipantId>,
    },
}

/// The authoritative session automaton. All phase swaps funnel through
/// [`SessionMachine::transition`], which runs the exit handler of the old
/// phase, swaps, runs the enter handler of the new phase, and emits
/// notifications - in that order.
pub struct SessionMachine {
    phase: SessionPhase,
    resume_phase: Option<SessionPhase>,
    outcome: Option<Option<ParticipantId>>,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::WaitingForPlayers,
            resume_phase: None,
            outcome: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.phase == SessionPhase::Paused
    }

    /// The simulation clock only advances while units can act: during
    /// spawn-in and play, never while paused or after the match ends.
    pub fn simulation_running(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::WaitingForPlayers | SessionPhase::Playing
        )
    }

    pub fn winner(&self) -> Option<Option<ParticipantId>> {
        self.outcome
    }

    fn is_valid_edge(&self, to: SessionPhase) -> bool {
        use SessionPhase::*;
        match (self.phase, to) {
            (WaitingForPlayers, Playing) => true,
            (Playing, GameOver) => true,
            (WaitingForPlayers, Paused) | (Playing, Paused) => true,
            (Paused, resumed) => self.resume_phase == Some(resumed),
            (GameOver, WaitingForPlayers) => true,
            _ => false,
        }
    }

    /// Single transition function for every phase swap. Rejects edges not
    /// in the automaton.
    fn transition(&mut self, to: SessionPhase, events: &mut Vec<SessionEvent>) -> bool {
        if to == self.phase || !self.is_valid_edge(to) {
            warn!("Rejected session transition {:?} -> {:?}", self.phase, to);
            return false;
        }

        let old_phase = self.phase;
        self.exit_phase();
        self.phase = to;
        self.enter_phase();

        events.push(SessionEvent::PhaseChanged {
            old_phase,
            new_phase: to,
        });
        if to.is_network_relevant() {
            events.push(SessionEvent::NetworkPhase {
                old_phase,
                new_phase: to,
            });
        }

        info!("Session phase {:?} -> {:?}", old_phase, to);
        true
    }

    fn exit_phase(&mut self) {
        match self.phase {
            SessionPhase::Paused => {
                self.resume_phase = None;
            }
            _ => {}
        }
    }

    fn enter_phase(&mut self) {
        match self.phase {
            SessionPhase::WaitingForPlayers => {
                self.outcome = None;
            }
            _ => {}
        }
    }

    /// WaitingForPlayers -> Playing, once every connected participant has
    /// a spawned squad.
    pub fn start_match(&mut self, events: &mut Vec<SessionEvent>) -> bool {
        self.transition(SessionPhase::Playing, events)
    }

    pub fn pause(&mut self, events: &mut Vec<SessionEvent>) -> bool {
        if !self.simulation_running() {
            warn!("Pause requested in {:?}, ignored", self.phase);
            return false;
        }
        self.resume_phase = Some(self.phase);
        self.transition(SessionPhase::Paused, events)
    }

    /// Resumes into the exact phase recorded when the pause began.
    pub fn resume(&mut self, events: &mut Vec<SessionEvent>) -> bool {
        if self.phase != SessionPhase::Paused {
            warn!("Resume requested in {:?}, ignored", self.phase);
            return false;
        }
        let Some(resumed) = self.resume_phase else {
            warn!("Paused with no recorded resume phase");
            return false;
        };
        self.transition(resumed, events)
    }

    /// Decides the match outcome. The winner is set at most once per
    /// session; later calls are ignored.
    pub fn declare_winner(
        &mut self,
        winner: Option<ParticipantId>,
        events: &mut Vec<SessionEvent>,
    ) -> bool {
        if self.outcome.is_some() {
            warn!("Winner already decided, ignoring");
            return false;
        }
        if !self.transition(SessionPhase::GameOver, events) {
            return false;
        }
        self.outcome = Some(winner);
        events.push(SessionEvent::GameOver { winner });
        true
    }

    /// GameOver -> WaitingForPlayers for a rematch; clears the outcome.
    pub fn rematch(&mut self, events: &mut Vec<SessionEvent>) -> bool {
        if self.phase != SessionPhase::GameOver {
            warn!("Rematch requested in {:?}, ignored", self.phase);
            return false;
        }
        self.transition(SessionPhase::WaitingForPlayers, events)
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}
