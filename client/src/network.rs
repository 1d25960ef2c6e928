use crate::game::WorldMirror;
use crate::lobby::{CountdownAction, LobbyCoordinator, MembershipEvent};
use crate::turn::TurnCycle;
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{Broadcast, Command, ParticipantId, SessionPhase, UnitId, Vec3, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::interval;

/// Client behavior configuration, fed from the command line.
pub struct ClientConfig {
    pub display_name: String,
    /// Create a session on connect: (name, is_private).
    pub create_session: Option<(String, bool)>,
    /// Join an existing session by code on connect.
    pub join_code: Option<String>,
    /// Mark ready automatically once in the lobby.
    pub auto_ready: bool,
}

/// Maps lobby-related broadcasts onto coordinator patches. World and
/// connection broadcasts map to None and are handled elsewhere.
fn membership_event(broadcast: &Broadcast) -> Option<MembershipEvent> {
    match broadcast {
        Broadcast::MemberJoined { member } => Some(MembershipEvent::MemberJoined {
            member: member.clone(),
        }),
        Broadcast::MemberLeft { index } => Some(MembershipEvent::MemberLeft { index: *index }),
        Broadcast::MemberDataChanged { index, member } => {
            Some(MembershipEvent::MemberDataChanged {
                index: *index,
                member: member.clone(),
            })
        }
        Broadcast::MembershipDeleted => Some(MembershipEvent::MembershipDeleted),
        Broadcast::LobbyDataChanged { countdown_active } => {
            Some(MembershipEvent::CountdownChanged {
                active: *countdown_active,
            })
        }
        _ => None,
    }
}

/// Observer-side connection to the authority. Receives broadcasts,
/// maintains the world mirror and lobby snapshot, and offers the command
/// surface the input layer drives. Never mutates gameplay state locally.
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    config: ClientConfig,
    participant_id: Option<ParticipantId>,
    connected: bool,
    session_code: Option<String>,
    ready_sent: bool,

    pub mirror: WorldMirror,
    coordinator: Option<LobbyCoordinator>,
    turn: Option<TurnCycle>,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        config: ClientConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            config,
            participant_id: None,
            connected: false,
            session_code: None,
            ready_sent: false,
            mirror: WorldMirror::new(),
            coordinator: None,
            turn: None,
        })
    }

    pub fn participant_id(&self) -> Option<ParticipantId> {
        self.participant_id
    }

    pub fn session_code(&self) -> Option<&str> {
        self.session_code.as_deref()
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let command = Command::Connect {
            client_version: PROTOCOL_VERSION,
            payload: self.config.display_name.clone(),
        };
        self.send_command(&command).await
    }

    async fn send_command(&self, command: &Command) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(command)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Input-layer surface: submit a locally captured path for an owned
    /// unit. The authority re-validates ownership and length.
    pub async fn submit_path(
        &mut self,
        unit_id: UnitId,
        points: Vec<Vec3>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(turn) = &mut self.turn {
            turn.finish_drawing(Instant::now());
        }
        self.send_command(&Command::SubmitPath { unit_id, points })
            .await
    }

    pub async fn toggle_ready(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.send_command(&Command::ToggleReady).await
    }

    pub async fn leave_session(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.send_command(&Command::LeaveSession).await
    }

    async fn on_connected(&mut self, participant_id: ParticipantId) {
        info!("Connected! Participant ID: {}", participant_id);
        self.participant_id = Some(participant_id);
        self.connected = true;
        self.coordinator = Some(LobbyCoordinator::new(participant_id));
        self.turn = Some(TurnCycle::new(participant_id));

        let follow_up = if let Some((name, is_private)) = self.config.create_session.take() {
            Some(Command::CreateSession { name, is_private })
        } else {
            self.config
                .join_code
                .take()
                .map(|code| Command::JoinSession { code })
        };

        if let Some(command) = follow_up {
            if let Err(e) = self.send_command(&command).await {
                error!("Error sending session command: {}", e);
            }
        }
    }

    async fn on_membership_event(&mut self, event: MembershipEvent) {
        let action = match &mut self.coordinator {
            Some(coordinator) => coordinator.reconcile(event),
            None => None,
        };

        match action {
            Some(CountdownAction::Start) => {
                if let Err(e) = self.send_command(&Command::StartCountdown).await {
                    error!("Error starting countdown: {}", e);
                }
            }
            Some(CountdownAction::Cancel) => {
                if let Err(e) = self.send_command(&Command::CancelCountdown).await {
                    error!("Error cancelling countdown: {}", e);
                }
            }
            None => {}
        }

        // Auto-ready once our own membership shows up, before any
        // countdown is running.
        if self.config.auto_ready && !self.ready_sent {
            let in_lobby = self
                .coordinator
                .as_ref()
                .map(|c| {
                    c.members()
                        .iter()
                        .any(|m| Some(m.participant_id) == self.participant_id)
                        && !c.countdown_active()
                })
                .unwrap_or(false);
            if in_lobby {
                self.ready_sent = true;
                if let Err(e) = self.toggle_ready().await {
                    error!("Error sending ready: {}", e);
                }
            }
        }
    }

    fn on_unit_spawned(&mut self, owner: ParticipantId) {
        // The local squad spawning is the cue that play begins for this
        // client: the turn cycle starts over the lobby's member order.
        if Some(owner) != self.participant_id {
            return;
        }

        let order: Vec<ParticipantId> = self
            .coordinator
            .as_ref()
            .map(|c| c.members().iter().map(|m| m.participant_id).collect())
            .unwrap_or_default();
        let order = if order.is_empty() { vec![owner] } else { order };

        if let Some(turn) = &mut self.turn {
            if !turn.is_active() {
                turn.start(order, Instant::now());
            }
        }
    }

    async fn handle_broadcast(&mut self, broadcast: Broadcast) {
        if let Some(event) = membership_event(&broadcast) {
            self.on_membership_event(event).await;
            return;
        }

        match broadcast {
            Broadcast::Connected { participant_id } => {
                self.on_connected(participant_id).await;
            }

            Broadcast::ConnectionDenied { reason } => {
                warn!("Connection denied: {}", reason);
                self.connected = false;
            }

            Broadcast::SessionInfo { code, name } => {
                info!("Session '{}' with join code {}", name, code);
                self.session_code = Some(code);
            }

            Broadcast::CountdownTick { seconds_remaining } => {
                info!("Match starts in {}s", seconds_remaining);
            }

            Broadcast::CountdownComplete => {
                info!("Countdown complete, requesting spawn");
                if let Err(e) = self.send_command(&Command::RequestSpawn).await {
                    error!("Error requesting spawn: {}", e);
                }
            }

            Broadcast::UnitSpawned { owner, .. } => {
                self.mirror.apply(&broadcast);
                self.on_unit_spawned(owner);
            }

            Broadcast::SessionPhaseChanged {
                old_phase,
                new_phase,
            } => {
                info!("Session phase {:?} -> {:?}", old_phase, new_phase);
                self.mirror.apply(&broadcast);
            }

            Broadcast::GameOver { winner } => {
                self.mirror.apply(&broadcast);
                if let Some(turn) = &mut self.turn {
                    turn.stop();
                }

                // Winners arrive as opaque ids; the display name is
                // resolved from the local snapshot.
                match winner {
                    Some(id) => {
                        let name = self
                            .coordinator
                            .as_ref()
                            .and_then(|c| c.display_name_of(id))
                            .unwrap_or("unknown")
                            .to_string();
                        info!("Game over: {} wins", name);
                    }
                    None => info!("Game over: draw"),
                }
            }

            Broadcast::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
            }

            other => {
                self.mirror.apply(&other);
            }
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut turn_interval = interval(Duration::from_millis(100));
        let mut buffer = [0u8; 8192];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if let Ok(broadcast) = deserialize::<Broadcast>(&buffer[0..len]) {
                                self.handle_broadcast(broadcast).await;
                            } else {
                                warn!("Failed to deserialize broadcast");
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = turn_interval.tick() => {
                    if let Some(turn) = &mut self.turn {
                        turn.poll(Instant::now(), self.mirror.phase);
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    break;
                },
            }

            if self.mirror.phase == Some(SessionPhase::GameOver) {
                break;
            }
        }

        if self.connected {
            let _ = self.send_command(&Command::Disconnect).await;
        }
        if let Some(coordinator) = &mut self.coordinator {
            coordinator.shutdown();
        }

        Ok(())
    }
}
