//! Lobby coordinator: the local membership mirror and the single
//! countdown decision point.
//!
//! The snapshot is reconciled exclusively from incremental patches pushed
//! by the membership service - never rebuilt by re-fetching, which would
//! race with the event stream. Every reconciliation re-broadcasts the
//! merged snapshot to local subscribers, then runs one decision function.
//! Funnelling both the local player's own actions (which arrive back as
//! echoed patches) and remote changes through that one function is what
//! prevents a countdown from starting twice or being cancelled spuriously
//! when a local toggle and its asynchronous confirmation overlap.

use log::{debug, info, warn};
use shared::{LobbyMember, ParticipantId, MIN_LOBBY_MEMBERS};

/// Incremental patches from the membership service, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum MembershipEvent {
    MemberJoined { member: LobbyMember },
    MemberLeft { index: u32 },
    MemberDataChanged { index: u32, member: LobbyMember },
    MembershipDeleted,
    CountdownChanged { active: bool },
}

/// What the decision point wants sent to the service, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownAction {
    Start,
    Cancel,
}

/// Merged snapshot handed to local subscribers after each reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct LobbySnapshot {
    pub members: Vec<LobbyMember>,
    pub local_member_id: ParticipantId,
    pub is_local_host: bool,
    pub countdown_active: bool,
}

type Subscriber = Box<dyn FnMut(&LobbySnapshot) + Send>;

/// Explicitly constructed at client start and torn down at exit; owns the
/// membership snapshot exclusively. Reconciliation is only ever invoked
/// serially from the client's event loop.
pub struct LobbyCoordinator {
    local_id: ParticipantId,
    members: Vec<LobbyMember>,
    countdown_active: bool,
    was_all_ready: bool,
    subscribers: Vec<Subscriber>,
}

impl LobbyCoordinator {
    pub fn new(local_id: ParticipantId) -> Self {
        Self {
            local_id,
            members: Vec::new(),
            countdown_active: false,
            was_all_ready: false,
            subscribers: Vec::new(),
        }
    }

    /// Teardown contract: drops subscribers and the cached snapshot.
    pub fn shutdown(&mut self) {
        self.subscribers.clear();
        self.members.clear();
        self.countdown_active = false;
        self.was_all_ready = false;
    }

    pub fn subscribe(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    pub fn members(&self) -> &[LobbyMember] {
        &self.members
    }

    pub fn countdown_active(&self) -> bool {
        self.countdown_active
    }

    pub fn is_local_host(&self) -> bool {
        self.members
            .iter()
            .any(|m| m.participant_id == self.local_id && m.is_host)
    }

    pub fn display_name_of(&self, participant: ParticipantId) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.participant_id == participant)
            .map(|m| m.display_name.as_str())
    }

    pub fn snapshot(&self) -> LobbySnapshot {
        LobbySnapshot {
            members: self.members.clone(),
            local_member_id: self.local_id,
            is_local_host: self.is_local_host(),
            countdown_active: self.countdown_active,
        }
    }

    fn all_ready(&self) -> bool {
        self.members.len() >= MIN_LOBBY_MEMBERS && self.members.iter().all(|m| m.is_ready)
    }

    /// Reconciles one patch into the snapshot, notifies subscribers, then
    /// runs the countdown decision point. An index patch that refers to a
    /// slot this mirror does not have is logged and skipped; the snapshot
    /// as a whole is kept.
    pub fn reconcile(&mut self, event: MembershipEvent) -> Option<CountdownAction> {
        let is_departure = matches!(
            event,
            MembershipEvent::MemberLeft { .. } | MembershipEvent::MembershipDeleted
        );

        match event {
            MembershipEvent::MemberJoined { member } => {
                debug!("Member {} joined the lobby", member.participant_id);
                self.members.push(member);
            }

            MembershipEvent::MemberLeft { index } => {
                let index = index as usize;
                if index < self.members.len() {
                    let member = self.members.remove(index);
                    debug!("Member {} left the lobby", member.participant_id);
                } else {
                    warn!("Skipping member-left patch with index {}", index);
                }
            }

            MembershipEvent::MemberDataChanged { index, member } => {
                let index = index as usize;
                if index < self.members.len() {
                    self.members[index] = member;
                } else {
                    warn!("Skipping member-data patch with index {}", index);
                }
            }

            MembershipEvent::MembershipDeleted => {
                info!("Lobby membership deleted");
                self.members.clear();
                self.countdown_active = false;
            }

            MembershipEvent::CountdownChanged { active } => {
                // The host's own flag write arrives back through here
                // like everyone else's; nothing is special-cased locally.
                self.countdown_active = active;
            }
        }

        let snapshot = self.snapshot();
        for subscriber in &mut self.subscribers {
            subscriber(&snapshot);
        }

        self.evaluate_countdown(is_departure)
    }

    /// The single countdown decision point. Start fires only on the
    /// transition into all-ready; cancel only when a departure breaks
    /// readiness while the countdown runs. Transient unready events never
    /// cancel an active countdown - readiness cannot be withdrawn once
    /// the start sequence is underway, and that rule is a precondition
    /// here, not something re-validated.
    fn evaluate_countdown(&mut self, is_departure: bool) -> Option<CountdownAction> {
        let all_ready = self.all_ready();

        let action = if !self.is_local_host() {
            None
        } else if !self.countdown_active {
            if all_ready && !self.was_all_ready {
                info!("All members ready, starting countdown");
                Some(CountdownAction::Start)
            } else {
                None
            }
        } else if is_departure && !all_ready {
            info!("Lost a ready member, cancelling countdown");
            Some(CountdownAction::Cancel)
        } else {
            None
        };

        self.was_all_ready = all_ready;
        action
    }
}
