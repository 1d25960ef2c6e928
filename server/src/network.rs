//! Server network layer handling UDP communications and game loop coordination

use crate::bot::BotController;
use crate::game::{GameEvent, GameState, SpawnPoint};
use crate::lobby::{LobbyEvent, LobbyService};
use crate::participants::ParticipantRoster;
use crate::paths::PathLibrary;
use crate::session::SessionEvent;
use crate::unit::UnitEvent;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{Broadcast, Command, ParticipantId, Vec3, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        command: Command,
        addr: SocketAddr,
    },
    ClientTimeout {
        participant_id: ParticipantId,
        addr: SocketAddr,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        broadcast: Broadcast,
        addr: SocketAddr,
    },
    BroadcastPacket {
        broadcast: Broadcast,
        exclude: Option<ParticipantId>,
    },
}

/// Server startup configuration, fed from the command line.
pub struct ServerConfig {
    pub tick_duration: Duration,
    pub max_participants: usize,
    pub required_participants: usize,
    pub bot_count: usize,
    pub seed: u64,
    pub path_file: Option<PathBuf>,
}

/// Facility slots arranged in a ring: spawn positions on the outer
/// radius, rally destinations pulled toward the center.
pub fn default_spawn_points(count: usize) -> Vec<SpawnPoint> {
    let count = count.max(1);
    (0..count)
        .map(|i| {
            let angle = (i as f32 / count as f32) * std::f32::consts::TAU;
            let (sin, cos) = angle.sin_cos();
            SpawnPoint {
                position: Vec3::new(cos * 10.0, 0.0, sin * 10.0),
                rally: Some(Vec3::new(cos * 6.0, 0.0, sin * 6.0)),
            }
        })
        .collect()
}

/// Maps a tick's collected game events onto the wire. Events with no
/// observer-facing counterpart (waypoint bookkeeping, the generic local
/// phase notification) map to None.
pub fn event_to_broadcast(event: GameEvent) -> Option<Broadcast> {
    match event {
        GameEvent::Unit(UnitEvent::StateChanged {
            unit_id,
            old_state,
            new_state,
        }) => Some(Broadcast::UnitStateChanged {
            unit_id,
            old_state,
            new_state,
        }),
        GameEvent::Unit(UnitEvent::WaypointReached { .. }) => None,
        GameEvent::Unit(UnitEvent::DefeatImpulse {
            unit_id,
            impulse,
            torque,
        }) => Some(Broadcast::DefeatImpulse {
            unit_id,
            impulse,
            torque,
        }),
        GameEvent::Session(SessionEvent::PhaseChanged { .. }) => None,
        GameEvent::Session(SessionEvent::NetworkPhase {
            old_phase,
            new_phase,
        }) => Some(Broadcast::SessionPhaseChanged {
            old_phase,
            new_phase,
        }),
        GameEvent::Session(SessionEvent::GameOver { winner }) => {
            Some(Broadcast::GameOver { winner })
        }
        GameEvent::UnitSpawned {
            unit_id,
            owner,
            position,
            color,
            team_id,
        } => Some(Broadcast::UnitSpawned {
            unit_id,
            owner,
            position,
            color,
            team_id,
        }),
        GameEvent::UnitDespawned { unit_id } => Some(Broadcast::UnitDespawned { unit_id }),
        GameEvent::HealthChanged {
            unit_id,
            current,
            max,
        } => Some(Broadcast::HealthChanged {
            entity_id: unit_id,
            current,
            max,
        }),
    }
}

fn lobby_event_to_broadcast(event: LobbyEvent) -> Broadcast {
    match event {
        LobbyEvent::MemberJoined { member } => Broadcast::MemberJoined { member },
        LobbyEvent::MemberLeft { index } => Broadcast::MemberLeft { index },
        LobbyEvent::MemberDataChanged { index, member } => {
            Broadcast::MemberDataChanged { index, member }
        }
        LobbyEvent::MembershipDeleted => Broadcast::MembershipDeleted,
        LobbyEvent::CountdownChanged { active } => Broadcast::LobbyDataChanged {
            countdown_active: active,
        },
        LobbyEvent::CountdownTick { seconds_remaining } => {
            Broadcast::CountdownTick { seconds_remaining }
        }
        LobbyEvent::CountdownComplete => Broadcast::CountdownComplete,
    }
}

/// Main server coordinating networking, lobby and game simulation.
///
/// All authoritative mutation happens inside `run`'s single loop: socket
/// reads, timeouts and timers are funneled in through channels, so no
/// command or membership event ever touches game state from a concurrent
/// callback.
pub struct Server {
    socket: Arc<UdpSocket>,
    roster: Arc<RwLock<ParticipantRoster>>,
    game: GameState,
    lobby: LobbyService,
    bots: Vec<BotController>,
    library: PathLibrary,
    rng: StdRng,
    tick_duration: Duration,
    required_participants: usize,
    bot_count: usize,
    /// Set by countdown completion; spawn requests are refused before it.
    launched: bool,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        config: ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let library = PathLibrary::load(config.path_file.as_deref());

        Ok(Server {
            socket,
            roster: Arc::new(RwLock::new(ParticipantRoster::new(config.max_participants))),
            game: GameState::new(config.seed, default_spawn_points(config.max_participants)),
            lobby: LobbyService::new(),
            bots: Vec::new(),
            library,
            rng: StdRng::seed_from_u64(config.seed.wrapping_add(1)),
            tick_duration: config.tick_duration,
            required_participants: config.required_participants,
            bot_count: config.bot_count,
            launched: false,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 4096];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(command) = deserialize::<Command>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { command, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let roster = Arc::clone(&self.roster);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { broadcast, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &broadcast, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { broadcast, exclude } => {
                        let addrs = {
                            let roster_guard = roster.read().await;
                            roster_guard.addrs()
                        };

                        for (participant_id, addr) in addrs {
                            if Some(participant_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &broadcast, addr).await
                            {
                                error!("Failed to send to {}: {}", participant_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors participant timeouts
    async fn spawn_timeout_checker(&self) {
        let roster = Arc::clone(&self.roster);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut roster_guard = roster.write().await;
                    roster_guard.check_timeouts(CLIENT_TIMEOUT)
                };

                for (participant_id, addr) in timed_out {
                    if let Err(e) =
                        server_tx.send(ServerMessage::ClientTimeout { participant_id, addr })
                    {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        broadcast: &Broadcast,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(broadcast)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, broadcast: Broadcast, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { broadcast, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, broadcast: Broadcast, exclude: Option<ParticipantId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { broadcast, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    fn flush_lobby_events(&self, events: Vec<LobbyEvent>) {
        for event in events {
            self.broadcast_packet(lobby_event_to_broadcast(event), None);
        }
    }

    fn flush_game_events(&mut self) {
        for event in self.game.drain_events() {
            if let Some(broadcast) = event_to_broadcast(event) {
                self.broadcast_packet(broadcast, None);
            }
        }
    }

    /// Processes one inbound command. The issuer is resolved from the
    /// source address; anything that fails validation is dropped here,
    /// with nothing applied.
    async fn handle_command(&mut self, command: Command, addr: SocketAddr) {
        match command {
            Command::Connect {
                client_version,
                payload,
            } => {
                self.handle_connect(client_version, payload, addr).await;
            }
            other => {
                let participant_id = {
                    let roster = self.roster.read().await;
                    roster.find_by_addr(addr)
                };
                let Some(participant_id) = participant_id else {
                    warn!("Dropped command from unknown address {}", addr);
                    return;
                };
                {
                    let mut roster = self.roster.write().await;
                    roster.refresh_last_seen(participant_id);
                }
                self.handle_participant_command(participant_id, other, addr)
                    .await;
            }
        }
    }

    async fn handle_participant_command(
        &mut self,
        participant_id: ParticipantId,
        command: Command,
        addr: SocketAddr,
    ) {
        match command {
            // Connect is routed before participant resolution.
            Command::Connect { .. } => {}

            Command::CreateSession { name, is_private } => {
                self.handle_create_session(participant_id, name, is_private)
                    .await;
            }

            Command::JoinSession { code } => {
                self.handle_join_session(participant_id, code, addr).await;
            }

            Command::LeaveSession => {
                let mut events = Vec::new();
                self.lobby.leave(participant_id, &mut events);
                self.flush_lobby_events(events);
            }

            Command::ToggleReady => {
                let mut events = Vec::new();
                self.lobby.toggle_ready(participant_id, &mut events);
                self.flush_lobby_events(events);
            }

            Command::StartCountdown => {
                let mut events = Vec::new();
                self.lobby.start_countdown(participant_id, &mut events);
                self.flush_lobby_events(events);
            }

            Command::CancelCountdown => {
                let mut events = Vec::new();
                self.lobby.cancel_countdown(participant_id, &mut events);
                self.flush_lobby_events(events);
            }

            Command::RequestSpawn => {
                self.handle_request_spawn(participant_id).await;
            }

            Command::SubmitPath { unit_id, points } => {
                self.game.submit_path(participant_id, unit_id, points);
            }

            Command::Pause => {
                if self.lobby.host_id() == Some(participant_id) {
                    self.game.pause();
                } else {
                    warn!("Dropped pause from non-host {}", participant_id);
                }
            }

            Command::Resume => {
                if self.lobby.host_id() == Some(participant_id) {
                    self.game.resume();
                } else {
                    warn!("Dropped resume from non-host {}", participant_id);
                }
            }

            Command::Disconnect => {
                self.teardown_participant(participant_id).await;
            }
        }
    }

    /// Connection handshake. Approval assigns identity explicitly; unit
    /// entities are constructed later by the spawn flow, never as an
    /// automatic side effect of approval.
    async fn handle_connect(&mut self, client_version: u32, payload: String, addr: SocketAddr) {
        info!(
            "Participant connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Broadcast::ConnectionDenied {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // Remove existing connection if present
        let existing = {
            let roster = self.roster.read().await;
            roster.find_by_addr(addr)
        };
        if let Some(existing_id) = existing {
            info!("Removing existing participant {} from {}", existing_id, addr);
            self.teardown_participant(existing_id).await;
        }

        let approved = {
            let mut roster = self.roster.write().await;
            roster.approve(addr, payload)
        };

        match approved {
            Some(participant_id) => {
                self.send_packet(Broadcast::Connected { participant_id }, addr);
            }
            None => {
                self.send_packet(
                    Broadcast::ConnectionDenied {
                        reason: "Session full".to_string(),
                    },
                    addr,
                );
            }
        }
    }

    async fn handle_create_session(
        &mut self,
        participant_id: ParticipantId,
        name: String,
        is_private: bool,
    ) {
        let Some(code) = self.lobby.create(name.clone(), is_private, &mut self.rng) else {
            warn!("Dropped create-session from {}", participant_id);
            return;
        };

        let addr = {
            let roster = self.roster.read().await;
            roster.get(participant_id).and_then(|p| p.addr)
        };
        if let Some(addr) = addr {
            self.send_packet(Broadcast::SessionInfo { code, name }, addr);
        }

        let display_name = {
            let roster = self.roster.read().await;
            roster
                .get(participant_id)
                .map(|p| p.display_name.clone())
                .unwrap_or_default()
        };

        let mut events = Vec::new();
        self.lobby
            .join(participant_id, display_name, false, &mut events);

        // Bots fill in behind the host, already ready.
        for i in 0..self.bot_count {
            let bot_name = format!("bot-{}", i + 1);
            let bot_id = {
                let mut roster = self.roster.write().await;
                roster.add_bot(bot_name.clone())
            };
            if let Some(bot_id) = bot_id {
                self.lobby.join(bot_id, bot_name, true, &mut events);
                self.bots.push(BotController::new(bot_id, &mut self.rng));
            }
        }

        self.flush_lobby_events(events);
    }

    async fn handle_join_session(
        &mut self,
        participant_id: ParticipantId,
        code: String,
        addr: SocketAddr,
    ) {
        if !self.lobby.is_created() || self.lobby.code() != code {
            warn!("{} tried to join with bad code {}", participant_id, code);
            self.send_packet(
                Broadcast::ConnectionDenied {
                    reason: "Unknown session code".to_string(),
                },
                addr,
            );
            return;
        }

        self.send_packet(
            Broadcast::SessionInfo {
                code: self.lobby.code().to_string(),
                name: self.lobby.name().to_string(),
            },
            addr,
        );

        // Replay the membership to the joiner as the same incremental
        // patches everyone else saw; there is no snapshot fetch.
        for member in self.lobby.members() {
            self.send_packet(
                Broadcast::MemberJoined {
                    member: member.clone(),
                },
                addr,
            );
        }

        let display_name = {
            let roster = self.roster.read().await;
            roster
                .get(participant_id)
                .map(|p| p.display_name.clone())
                .unwrap_or_default()
        };

        let mut events = Vec::new();
        self.lobby
            .join(participant_id, display_name, false, &mut events);
        self.flush_lobby_events(events);
    }

    async fn handle_request_spawn(&mut self, participant_id: ParticipantId) {
        if !self.launched {
            warn!("Dropped spawn request from {} before launch", participant_id);
            return;
        }

        let details = {
            let roster = self.roster.read().await;
            roster.get(participant_id).map(|p| (p.team_id, p.color))
        };
        let Some((team_id, color)) = details else {
            return;
        };

        if self.game.spawn_squad(participant_id, team_id, color) {
            let mut roster = self.roster.write().await;
            if let Some(participant) = roster.get_mut(participant_id) {
                participant.spawned = true;
            }
        }

        self.try_start_match().await;
    }

    /// Spawns every bot squad; bots have no client to send RequestSpawn.
    async fn spawn_bot_squads(&mut self) {
        let bot_details = {
            let roster = self.roster.read().await;
            roster
                .bot_ids()
                .into_iter()
                .filter_map(|id| roster.get(id).map(|p| (id, p.team_id, p.color)))
                .collect::<Vec<_>>()
        };

        for (bot_id, team_id, color) in bot_details {
            if self.game.spawn_squad(bot_id, team_id, color) {
                let mut roster = self.roster.write().await;
                if let Some(participant) = roster.get_mut(bot_id) {
                    participant.spawned = true;
                }
            }
        }

        self.try_start_match().await;
    }

    async fn try_start_match(&mut self) {
        let (count, all_spawned) = {
            let roster = self.roster.read().await;
            (roster.len(), roster.all_spawned())
        };
        self.game
            .try_start_match(count, self.required_participants, all_spawned);
    }

    async fn teardown_participant(&mut self, participant_id: ParticipantId) {
        {
            let mut roster = self.roster.write().await;
            roster.remove(participant_id);
        }

        let mut events = Vec::new();
        self.lobby.leave(participant_id, &mut events);
        self.flush_lobby_events(events);

        self.game.disconnect(participant_id);
    }

    /// Countdown completion launches the session: ready flags reset,
    /// bot squads spawn, humans are expected to request theirs.
    async fn handle_countdown_complete(&mut self) {
        info!("Countdown complete, launching session");
        self.launched = true;

        let mut events = Vec::new();
        self.lobby.reset_ready(&mut events);
        self.flush_lobby_events(events);

        self.spawn_bot_squads().await;
    }

    /// Advances simulation and drains the tick's events to the wire. All
    /// transitions applied this tick go out before the next tick runs.
    async fn advance_tick(&mut self, dt: f32) {
        self.game.fixed_update(dt);
        self.game.decision_update();

        let now = Instant::now();
        let mut orders = Vec::new();
        for bot in &mut self.bots {
            if let Some((unit_id, points)) = bot.think(now, &self.game, &self.library, &mut self.rng)
            {
                orders.push((bot.participant_id, unit_id, points));
            }
        }
        for (bot_id, unit_id, points) in orders {
            self.game.submit_path(bot_id, unit_id, points);
        }

        self.flush_game_events();

        let participant_count = {
            let roster = self.roster.read().await;
            roster.addrs().len()
        };
        if participant_count > 0 {
            self.broadcast_packet(
                Broadcast::WorldSnapshot {
                    tick: self.game.tick,
                    units: self.game.snapshot(),
                },
                None,
            );
        }

        // Periodic performance monitoring
        if self.game.tick > 0 && self.game.tick % 60 == 0 {
            debug!(
                "Tick {}: {} participants, {} units, phase {:?}",
                self.game.tick,
                participant_count,
                self.game.unit_ids().len(),
                self.game.phase()
            );
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.tick_duration);
        let mut countdown_interval = interval(Duration::from_secs(1));
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { command, addr }) => {
                            self.handle_command(command, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { participant_id, addr }) => {
                            info!("Participant {} timed out", participant_id);
                            self.send_packet(
                                Broadcast::Disconnected {
                                    reason: "Connection timed out".to_string(),
                                },
                                addr,
                            );
                            // The roster entry is already gone; release the rest.
                            let mut events = Vec::new();
                            self.lobby.leave(participant_id, &mut events);
                            self.flush_lobby_events(events);
                            self.game.disconnect(participant_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    self.advance_tick(dt).await;
                },

                // Lobby countdown runs on wall-clock seconds
                _ = countdown_interval.tick() => {
                    if self.lobby.countdown_active() {
                        let mut events = Vec::new();
                        let completed = self.lobby.tick_second(&mut events);
                        self.flush_lobby_events(events);
                        if completed {
                            self.handle_countdown_complete().await;
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{SessionPhase, UnitId, UnitStateTag};
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::sync::mpsc;

    #[test]
    fn test_server_message_creation() {
        let command = Command::ToggleReady;
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);

        let msg = ServerMessage::PacketReceived {
            command: command.clone(),
            addr,
        };

        match msg {
            ServerMessage::PacketReceived { command: c, addr: a } => {
                assert_eq!(a, addr);
                assert!(matches!(c, Command::ToggleReady));
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_game_message_broadcast_exclude() {
        let msg = GameMessage::BroadcastPacket {
            broadcast: Broadcast::CountdownComplete,
            exclude: Some(ParticipantId(5)),
        };

        match msg {
            GameMessage::BroadcastPacket { exclude, .. } => {
                assert_eq!(exclude, Some(ParticipantId(5)));
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_channel_communication() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);

        let msg = ServerMessage::PacketReceived {
            command: Command::RequestSpawn,
            addr,
        };
        assert!(tx.send(msg).is_ok());

        match rx.try_recv() {
            Ok(ServerMessage::PacketReceived { command, .. }) => {
                assert!(matches!(command, Command::RequestSpawn));
            }
            _ => panic!("Unexpected message"),
        }
    }

    #[test]
    fn test_event_mapping_filters_internal_events() {
        let internal = GameEvent::Unit(UnitEvent::WaypointReached {
            unit_id: UnitId(1),
            index: 0,
        });
        assert!(event_to_broadcast(internal).is_none());

        let local_phase = GameEvent::Session(SessionEvent::PhaseChanged {
            old_phase: SessionPhase::WaitingForPlayers,
            new_phase: SessionPhase::Playing,
        });
        assert!(event_to_broadcast(local_phase).is_none());
    }

    #[test]
    fn test_event_mapping_state_changes() {
        let event = GameEvent::Unit(UnitEvent::StateChanged {
            unit_id: UnitId(2),
            old_state: UnitStateTag::Idle,
            new_state: UnitStateTag::Attack,
        });

        match event_to_broadcast(event) {
            Some(Broadcast::UnitStateChanged {
                unit_id,
                old_state,
                new_state,
            }) => {
                assert_eq!(unit_id, UnitId(2));
                assert_eq!(old_state, UnitStateTag::Idle);
                assert_eq!(new_state, UnitStateTag::Attack);
            }
            other => panic!("Unexpected mapping {:?}", other),
        }
    }

    #[test]
    fn test_event_mapping_network_phase() {
        let event = GameEvent::Session(SessionEvent::NetworkPhase {
            old_phase: SessionPhase::Playing,
            new_phase: SessionPhase::GameOver,
        });

        match event_to_broadcast(event) {
            Some(Broadcast::SessionPhaseChanged {
                old_phase,
                new_phase,
            }) => {
                assert_eq!(old_phase, SessionPhase::Playing);
                assert_eq!(new_phase, SessionPhase::GameOver);
            }
            other => panic!("Unexpected mapping {:?}", other),
        }
    }

    #[test]
    fn test_default_spawn_points_form_distinct_slots() {
        let points = default_spawn_points(8);
        assert_eq!(points.len(), 8);

        for (i, a) in points.iter().enumerate() {
            assert!(a.rally.is_some());
            for b in points.iter().skip(i + 1) {
                assert!(a.position.planar_distance(&b.position) > 1.0);
            }
        }
    }

    #[test]
    fn test_command_roundtrip_through_wire_format() {
        let commands = vec![
            Command::Connect {
                client_version: PROTOCOL_VERSION,
                payload: "tester".to_string(),
            },
            Command::SubmitPath {
                unit_id: UnitId(1),
                points: vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)],
            },
            Command::ToggleReady,
            Command::Disconnect,
        ];

        for command in commands {
            let serialized = serialize(&command).unwrap();
            let deserialized: Result<Command, _> = deserialize(&serialized);
            assert!(deserialized.is_ok());
        }
    }

    #[test]
    fn test_address_validation() {
        let valid_addrs = vec![
            "127.0.0.1:8080",
            "0.0.0.0:0",
            "192.168.1.1:9090",
            "[::1]:8080",
        ];

        for addr_str in valid_addrs {
            assert!(
                addr_str.parse::<SocketAddr>().is_ok(),
                "Failed to parse address: {}",
                addr_str
            );
        }

        let invalid_addrs = vec!["invalid", "127.0.0.1:99999", "256.256.256.256:8080", ""];

        for addr_str in invalid_addrs {
            assert!(
                addr_str.parse::<SocketAddr>().is_err(),
                "Should fail to parse: {}",
                addr_str
            );
        }
    }
}
