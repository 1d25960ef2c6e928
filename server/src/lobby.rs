//! Authoritative lobby membership for the hosted session.
//!
//! The server owns the member list and the shared countdown flag; every
//! change goes out as an index-based incremental patch. Observers (the
//! client-side lobby coordinator) rebuild their snapshot purely from these
//! patches - there is no full re-fetch.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use shared::{LobbyMember, ParticipantId, COUNTDOWN_SECONDS, SESSION_CODE_LEN};

// Ambiguous glyphs (0/O, 1/I) left out of join codes.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Incremental membership patches, broadcast in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum LobbyEvent {
    MemberJoined { member: LobbyMember },
    MemberLeft { index: u32 },
    MemberDataChanged { index: u32, member: LobbyMember },
    MembershipDeleted,
    CountdownChanged { active: bool },
    CountdownTick { seconds_remaining: u32 },
    CountdownComplete,
}

pub struct LobbyService {
    code: String,
    name: String,
    is_private: bool,
    members: Vec<LobbyMember>,
    countdown_active: bool,
    countdown_remaining: u32,
    created: bool,
}

impl LobbyService {
    pub fn new() -> Self {
        Self {
            code: String::new(),
            name: String::new(),
            is_private: false,
            members: Vec::new(),
            countdown_active: false,
            countdown_remaining: 0,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_private(&self) -> bool {
        self.is_private
    }

    pub fn members(&self) -> &[LobbyMember] {
        &self.members
    }

    pub fn countdown_active(&self) -> bool {
        self.countdown_active
    }

    pub fn host_id(&self) -> Option<ParticipantId> {
        self.members
            .iter()
            .find(|m| m.is_host)
            .map(|m| m.participant_id)
    }

    pub fn is_member(&self, participant: ParticipantId) -> bool {
        self.member_index(participant).is_some()
    }

    fn member_index(&self, participant: ParticipantId) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.participant_id == participant)
    }

    /// Creates the session lobby and returns its join code. One session
    /// per server process.
    pub fn create(&mut self, name: String, is_private: bool, rng: &mut StdRng) -> Option<String> {
        if self.created {
            warn!("Session already created, rejecting create request");
            return None;
        }

        self.code = (0..SESSION_CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        self.name = name;
        self.is_private = is_private;
        self.created = true;

        info!("Session '{}' created with code {}", self.name, self.code);
        Some(self.code.clone())
    }

    /// Adds a member. The first member in is the host. Bots join already
    /// ready.
    pub fn join(
        &mut self,
        participant_id: ParticipantId,
        display_name: String,
        is_ready: bool,
        events: &mut Vec<LobbyEvent>,
    ) -> bool {
        if !self.created {
            warn!("{} tried to join before the session exists", participant_id);
            return false;
        }
        if self.is_member(participant_id) {
            warn!("{} is already a lobby member", participant_id);
            return false;
        }

        let member = LobbyMember {
            participant_id,
            display_name,
            is_ready,
            is_host: self.members.is_empty(),
        };
        self.members.push(member.clone());
        events.push(LobbyEvent::MemberJoined { member });
        true
    }

    /// Removes a member. A departing host tears the whole membership
    /// down; everyone else produces an index patch.
    pub fn leave(&mut self, participant_id: ParticipantId, events: &mut Vec<LobbyEvent>) {
        let Some(index) = self.member_index(participant_id) else {
            return;
        };

        if self.members[index].is_host {
            info!("Host {} left, deleting membership", participant_id);
            self.members.clear();
            self.countdown_active = false;
            self.countdown_remaining = 0;
            self.created = false;
            events.push(LobbyEvent::MembershipDeleted);
            return;
        }

        self.members.remove(index);
        events.push(LobbyEvent::MemberLeft {
            index: index as u32,
        });
    }

    /// Flips a member's ready flag. Rejected while a countdown runs: the
    /// product rule is that readiness cannot be withdrawn once the start
    /// sequence is underway.
    pub fn toggle_ready(&mut self, participant_id: ParticipantId, events: &mut Vec<LobbyEvent>) {
        if self.countdown_active {
            warn!(
                "{} tried to toggle ready during countdown, rejected",
                participant_id
            );
            return;
        }

        let Some(index) = self.member_index(participant_id) else {
            warn!("{} toggled ready without being a member", participant_id);
            return;
        };

        self.members[index].is_ready = !self.members[index].is_ready;
        events.push(LobbyEvent::MemberDataChanged {
            index: index as u32,
            member: self.members[index].clone(),
        });
    }

    /// Writes the shared countdown flag. Host-only; a second start while
    /// one is running is an idempotent no-op.
    pub fn start_countdown(&mut self, requester: ParticipantId, events: &mut Vec<LobbyEvent>) {
        if self.host_id() != Some(requester) {
            warn!("{} requested countdown start but is not host", requester);
            return;
        }
        if self.countdown_active {
            warn!("Countdown already active, ignoring start request");
            return;
        }

        self.countdown_active = true;
        self.countdown_remaining = COUNTDOWN_SECONDS;
        events.push(LobbyEvent::CountdownChanged { active: true });
        events.push(LobbyEvent::CountdownTick {
            seconds_remaining: COUNTDOWN_SECONDS,
        });
    }

    /// Clears the shared countdown flag. Host-only.
    pub fn cancel_countdown(&mut self, requester: ParticipantId, events: &mut Vec<LobbyEvent>) {
        if self.host_id() != Some(requester) {
            warn!("{} requested countdown cancel but is not host", requester);
            return;
        }
        if !self.countdown_active {
            return;
        }

        self.countdown_active = false;
        self.countdown_remaining = 0;
        events.push(LobbyEvent::CountdownChanged { active: false });
    }

    /// Advances the countdown by one second. Returns true on the tick
    /// that completes it.
    pub fn tick_second(&mut self, events: &mut Vec<LobbyEvent>) -> bool {
        if !self.countdown_active {
            return false;
        }

        self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
        if self.countdown_remaining == 0 {
            self.countdown_active = false;
            events.push(LobbyEvent::CountdownChanged { active: false });
            events.push(LobbyEvent::CountdownComplete);
            return true;
        }

        events.push(LobbyEvent::CountdownTick {
            seconds_remaining: self.countdown_remaining,
        });
        false
    }

    /// Lobby-scope ready flags are reset when the session launches.
    pub fn reset_ready(&mut self, events: &mut Vec<LobbyEvent>) {
        for index in 0..self.members.len() {
            if self.members[index].is_ready {
                self.members[index].is_ready = false;
                events.push(LobbyEvent::MemberDataChanged {
                    index: index as u32,
                    member: self.members[index].clone(),
                });
            }
        }
    }
}

impl Default for LobbyService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn created_lobby() -> (LobbyService, StdRng) {
        let mut rng = StdRng::seed_from_u64(11);
        let mut lobby = LobbyService::new();
        lobby.create("test".to_string(), false, &mut rng);
        (lobby, rng)
    }

    #[test]
    fn test_create_generates_code() {
        let (lobby, _) = created_lobby();
        assert!(lobby.is_created());
        assert_eq!(lobby.code().len(), SESSION_CODE_LEN);
        assert!(lobby
            .code()
            .bytes()
            .all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_create_twice_rejected() {
        let (mut lobby, mut rng) = created_lobby();
        assert!(lobby.create("again".to_string(), true, &mut rng).is_none());
    }

    #[test]
    fn test_first_joiner_is_host() {
        let (mut lobby, _) = created_lobby();
        let mut events = Vec::new();

        lobby.join(ParticipantId(1), "alice".to_string(), false, &mut events);
        lobby.join(ParticipantId(2), "bob".to_string(), false, &mut events);

        assert_eq!(lobby.host_id(), Some(ParticipantId(1)));
        assert!(!lobby.members()[1].is_host);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_leave_emits_index_patch() {
        let (mut lobby, _) = created_lobby();
        let mut events = Vec::new();
        lobby.join(ParticipantId(1), "alice".to_string(), false, &mut events);
        lobby.join(ParticipantId(2), "bob".to_string(), false, &mut events);
        events.clear();

        lobby.leave(ParticipantId(2), &mut events);
        assert_eq!(events, vec![LobbyEvent::MemberLeft { index: 1 }]);
        assert_eq!(lobby.members().len(), 1);
    }

    #[test]
    fn test_host_leaving_deletes_membership() {
        let (mut lobby, _) = created_lobby();
        let mut events = Vec::new();
        lobby.join(ParticipantId(1), "alice".to_string(), false, &mut events);
        lobby.join(ParticipantId(2), "bob".to_string(), false, &mut events);
        events.clear();

        lobby.leave(ParticipantId(1), &mut events);
        assert_eq!(events, vec![LobbyEvent::MembershipDeleted]);
        assert!(lobby.members().is_empty());
        assert!(!lobby.is_created());
    }

    #[test]
    fn test_toggle_ready_patches_member_data() {
        let (mut lobby, _) = created_lobby();
        let mut events = Vec::new();
        lobby.join(ParticipantId(1), "alice".to_string(), false, &mut events);
        events.clear();

        lobby.toggle_ready(ParticipantId(1), &mut events);
        match &events[0] {
            LobbyEvent::MemberDataChanged { index, member } => {
                assert_eq!(*index, 0);
                assert!(member.is_ready);
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_unready_rejected_during_countdown() {
        let (mut lobby, _) = created_lobby();
        let mut events = Vec::new();
        lobby.join(ParticipantId(1), "alice".to_string(), false, &mut events);
        lobby.toggle_ready(ParticipantId(1), &mut events);
        lobby.start_countdown(ParticipantId(1), &mut events);
        events.clear();

        lobby.toggle_ready(ParticipantId(1), &mut events);
        assert!(events.is_empty());
        assert!(lobby.members()[0].is_ready);
    }

    #[test]
    fn test_countdown_start_is_host_only_and_idempotent() {
        let (mut lobby, _) = created_lobby();
        let mut events = Vec::new();
        lobby.join(ParticipantId(1), "alice".to_string(), false, &mut events);
        lobby.join(ParticipantId(2), "bob".to_string(), false, &mut events);
        events.clear();

        lobby.start_countdown(ParticipantId(2), &mut events);
        assert!(!lobby.countdown_active());

        lobby.start_countdown(ParticipantId(1), &mut events);
        assert!(lobby.countdown_active());
        events.clear();

        // Double-start: no-op, no extra flag write.
        lobby.start_countdown(ParticipantId(1), &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn test_countdown_ticks_to_completion() {
        let (mut lobby, _) = created_lobby();
        let mut events = Vec::new();
        lobby.join(ParticipantId(1), "alice".to_string(), false, &mut events);
        lobby.start_countdown(ParticipantId(1), &mut events);
        events.clear();

        let mut completed = false;
        for _ in 0..COUNTDOWN_SECONDS {
            completed = lobby.tick_second(&mut events);
        }

        assert!(completed);
        assert!(!lobby.countdown_active());
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, LobbyEvent::CountdownComplete))
                .count(),
            1
        );
    }

    #[test]
    fn test_cancel_clears_flag() {
        let (mut lobby, _) = created_lobby();
        let mut events = Vec::new();
        lobby.join(ParticipantId(1), "alice".to_string(), false, &mut events);
        lobby.start_countdown(ParticipantId(1), &mut events);
        events.clear();

        lobby.cancel_countdown(ParticipantId(1), &mut events);
        assert!(!lobby.countdown_active());
        assert_eq!(
            events,
            vec![LobbyEvent::CountdownChanged { active: false }]
        );

        // Ticking after cancel does nothing.
        events.clear();
        assert!(!lobby.tick_second(&mut events));
        assert!(events.is_empty());
    }

    #[test]
    fn test_reset_ready_on_launch() {
        let (mut lobby, _) = created_lobby();
        let mut events = Vec::new();
        lobby.join(ParticipantId(1), "alice".to_string(), true, &mut events);
        lobby.join(ParticipantId(2), "bob".to_string(), true, &mut events);
        events.clear();

        lobby.reset_ready(&mut events);
        assert_eq!(events.len(), 2);
        assert!(lobby.members().iter().all(|m| !m.is_ready));
    }
}
