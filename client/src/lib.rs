//! # Session Observer Library
//!
//! This library provides the observer-side implementation for the
//! Skirmish multiplayer session. It connects to the authority, mirrors
//! replicated state, and submits intent; it never executes gameplay logic
//! locally and never speculates about what the authority will decide.
//!
//! ## Architecture Overview
//!
//! The client is a pure observer. Broadcasts from the authority are
//! applied unconditionally - the authority is trusted by construction -
//! and everything the local player does travels to the server as a
//! command that may be silently dropped if it fails validation there.
//! There is no prediction, no rollback and no reconciliation: the
//! replicated mirror IS the client's world.
//!
//! ### Presentation States
//! Unit behavior arrives as compact state tags. The client rebuilds a
//! presentation-only state object from the tag plus the separately
//! replicated transform; authority-only data (paths, waypoint indices,
//! target handles) never reaches this process, and no presentation state
//! may assume access to it.
//!
//! ### The Lobby Coordinator
//! Membership lives in an external service mirrored through incremental
//! patch events. The coordinator reconciles each patch into a local
//! snapshot and runs a single decision function afterwards - the one
//! place where a countdown may be started or cancelled. The host's own
//! actions echo back through the same patch stream as everyone else's,
//! which is what keeps an immediate local toggle and its asynchronous
//! confirmation from double-firing the countdown.
//!
//! ### The Local Turn Cycle
//! During play each client runs its own PlayerTurn / DrawingPath /
//! PlayerTurnEnd cycle across all participants. It is deliberately not
//! replicated: two clients may disagree about whose turn it is without
//! any gameplay consequence, because turns only gate local input capture.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The read-only world mirror: unit transforms, health, presentation
//! states, session phase and the decided winner.
//!
//! ### Lobby Module (`lobby`)
//! The membership snapshot mirror, patch reconciliation, subscriber
//! notification and the countdown decision point.
//!
//! ### Turn Module (`turn`)
//! The local turn sub-phase cycle with its watch and turn-end delays.
//!
//! ### Network Module (`network`)
//! UDP connection handling, the broadcast dispatch loop, and the command
//! surface (`submit_path`, `toggle_ready`, session create/join/leave)
//! offered to the input layer.

pub mod game;
pub mod lobby;
pub mod network;
pub mod turn;
