//! # Session Authority Library
//!
//! This library provides the authoritative server implementation for the
//! Skirmish multiplayer session. It owns every piece of gameplay truth:
//! unit behavior, session flow, lobby membership and the countdown that
//! launches a match. Clients observe; this process decides.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the only real copy of the game. Unit movement, combat
//! resolution, health mutation and session phase changes all happen here,
//! on a fixed-timestep tick, and are replicated outward as facts. Clients
//! never speculatively execute gameplay logic.
//!
//! ### Command Validation
//! Every inbound command is resolved to a participant from its source
//! address, then checked against the ownership registry before anything
//! is applied. A command that fails validation is dropped and logged -
//! never partially applied, never surfaced to the issuer beyond silence.
//!
//! ### Fact Broadcasting
//! At the end of every tick the server drains the tick's collected events
//! (state-tag changes, health updates, spawns, despawns, session phase
//! changes) and a world transform snapshot to all connected observers.
//! Everything applied within one tick goes out before the next tick runs.
//!
//! ## Architecture Design
//!
//! ### Single-Writer Event Loop
//! All authoritative mutation happens inside one `tokio::select!` loop.
//! Socket reads, timeout sweeps and countdown timers run as separate
//! tasks but only communicate with the loop through channels, so no two
//! mutations can ever interleave. Cosmetic delays (bot "thinking") are
//! timers that re-validate their preconditions on expiry and then issue
//! ordinary commands through the same validation path.
//!
//! ### Two-Rate Tick
//! Movement and combat advance at the fixed physics rate. Decision-level
//! work - target acquisition through a pluggable policy, the win-condition
//! check - runs as a separate pass each loop iteration. Pausing the
//! session freezes the simulation clock without stopping the loop.
//!
//! ## Module Organization
//!
//! ### Unit Module (`unit`)
//! The per-unit behavior state machine (Idle, GoToLocation, FollowPath,
//! Attack, Dead) with its single transition function, the attack cycle
//! with once-per-cycle resolution, and the target-selection policy trait.
//!
//! ### Game Module (`game`)
//! The authoritative world: units, ownership, spawn contract, command
//! application, the fixed/decision update split and per-tick event
//! collection.
//!
//! ### Session Module (`session`)
//! The session phase automaton (WaitingForPlayers, Playing, GameOver,
//! Paused) with its canonical transition function and the subset of
//! phases that observers are told about.
//!
//! ### Lobby Module (`lobby`)
//! Authoritative membership for the hosted session, emitted as
//! index-based incremental patches, plus the shared countdown flag and
//! its per-second ticking.
//!
//! ### Ownership Module (`ownership`)
//! The unit-to-participant registry: assigned once at spawn, consulted on
//! every command, drained on disconnect.
//!
//! ### Participants Module (`participants`)
//! Connection approval, address resolution, color/team assignment,
//! timeout detection, and bot roster slots.
//!
//! ### Network Module (`network`)
//! UDP socket management, packet decode, the main loop, and the mapping
//! from collected events to wire broadcasts.
//!
//! ### Supporting Modules
//! `paths` loads the pre-authored path library used by bots; `bot` drives
//! bot participants through the normal command path.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         tick_duration: Duration::from_millis(33), // 30Hz
//!         max_participants: 12,
//!         required_participants: 2,
//!         bot_count: 1,
//!         seed: 7,
//!         path_file: None,
//!     };
//!
//!     let mut server = Server::new("127.0.0.1:8080", config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod game;
pub mod lobby;
pub mod network;
pub mod ownership;
pub mod participants;
pub mod paths;
pub mod session;
pub mod unit;
