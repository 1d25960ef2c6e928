//! Participant connection management for the authoritative server
//!
//! This module handles the server-side roster of session participants:
//! - Connection approval and participant id assignment
//! - Color and team assignment at approval time
//! - Connection health monitoring and automatic timeout cleanup
//! - Bot participants, which occupy roster slots without a socket address
//!
//! The roster is the single source of truth for "who is in this session";
//! the ownership registry and lobby membership both key off the ids handed
//! out here.

use log::info;
use shared::{Color, ParticipantId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

const COLOR_PALETTE: [Color; 8] = [
    Color(66, 135, 245),
    Color(235, 64, 52),
    Color(50, 168, 82),
    Color(148, 66, 245),
    Color(245, 152, 66),
    Color(66, 227, 245),
    Color(227, 66, 200),
    Color(245, 221, 66),
];

/// A participant approved into the session.
///
/// Human participants carry the socket address their commands arrive from
/// and a last-seen timestamp for timeout detection. Bot participants have
/// neither; they are driven by the server's own tick loop.
#[derive(Debug)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub color: Color,
    pub team_id: u8,
    pub is_bot: bool,
    pub addr: Option<SocketAddr>,
    pub last_seen: Instant,
    /// Set once this participant's squad has been spawned during
    /// WaitingForPlayers.
    pub spawned: bool,
}

impl Participant {
    pub fn refresh_last_seen(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        !self.is_bot && self.last_seen.elapsed() > timeout
    }
}

/// Roster of all approved participants, humans and bots.
///
/// Enforces the session capacity limit and hands out stable participant
/// ids. Ids start from 1 and are never reused within a process lifetime.
pub struct ParticipantRoster {
    participants: HashMap<ParticipantId, Participant>,
    next_id: u32,
    max_participants: usize,
}

impl ParticipantRoster {
    pub fn new(max_participants: usize) -> Self {
        Self {
            participants: HashMap::new(),
            next_id: 1,
            max_participants,
        }
    }

    /// Approves a connecting human participant. Returns None when the
    /// session is at capacity. Color and team are assigned here, once,
    /// from the participant id.
    pub fn approve(&mut self, addr: SocketAddr, display_name: String) -> Option<ParticipantId> {
        if self.participants.len() >= self.max_participants {
            return None;
        }

        let id = self.allocate_id();
        info!("Participant {} ({}) approved from {}", id, display_name, addr);
        self.participants.insert(
            id,
            Participant {
                id,
                display_name,
                color: Self::color_for(id),
                team_id: (id.0 % u8::MAX as u32) as u8,
                is_bot: false,
                addr: Some(addr),
                last_seen: Instant::now(),
                spawned: false,
            },
        );

        Some(id)
    }

    /// Adds a bot participant. Bots count toward capacity like anyone else.
    pub fn add_bot(&mut self, display_name: String) -> Option<ParticipantId> {
        if self.participants.len() >= self.max_participants {
            return None;
        }

        let id = self.allocate_id();
        info!("Bot participant {} ({}) added", id, display_name);
        self.participants.insert(
            id,
            Participant {
                id,
                display_name,
                color: Self::color_for(id),
                team_id: (id.0 % u8::MAX as u32) as u8,
                is_bot: true,
                addr: None,
                last_seen: Instant::now(),
                spawned: false,
            },
        );

        Some(id)
    }

    fn allocate_id(&mut self) -> ParticipantId {
        let id = ParticipantId(self.next_id);
        self.next_id += 1;
        id
    }

    fn color_for(id: ParticipantId) -> Color {
        COLOR_PALETTE[(id.0 as usize - 1) % COLOR_PALETTE.len()]
    }

    pub fn remove(&mut self, id: ParticipantId) -> bool {
        if let Some(participant) = self.participants.remove(&id) {
            info!("Participant {} ({}) removed", id, participant.display_name);
            true
        } else {
            false
        }
    }

    /// Resolves the participant a packet belongs to from its source
    /// address. Commands never carry their issuer explicitly.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<ParticipantId> {
        self.participants
            .iter()
            .find(|(_, p)| p.addr == Some(addr))
            .map(|(id, _)| *id)
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn get_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(&id)
    }

    pub fn refresh_last_seen(&mut self, id: ParticipantId) {
        if let Some(participant) = self.participants.get_mut(&id) {
            participant.refresh_last_seen();
        }
    }

    /// Checks for and removes timed-out human participants, returning
    /// their ids and last known addresses so the session layers can tear
    /// down their state and send a final notice.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<(ParticipantId, SocketAddr)> {
        let timed_out: Vec<(ParticipantId, SocketAddr)> = self
            .participants
            .iter()
            .filter(|(_, p)| p.is_timed_out(timeout))
            .filter_map(|(id, p)| p.addr.map(|addr| (*id, addr)))
            .collect();

        for (id, _) in &timed_out {
            self.remove(*id);
        }

        timed_out
    }

    /// All human participant addresses, for broadcast distribution.
    pub fn addrs(&self) -> Vec<(ParticipantId, SocketAddr)> {
        self.participants
            .iter()
            .filter_map(|(id, p)| p.addr.map(|addr| (*id, addr)))
            .collect()
    }

    pub fn ids(&self) -> Vec<ParticipantId> {
        self.participants.keys().copied().collect()
    }

    pub fn bot_ids(&self) -> Vec<ParticipantId> {
        self.participants
            .iter()
            .filter(|(_, p)| p.is_bot)
            .map(|(id, _)| *id)
            .collect()
    }

    /// True once every roster participant has had their squad spawned.
    pub fn all_spawned(&self) -> bool {
        !self.participants.is_empty() && self.participants.values().all(|p| p.spawned)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
