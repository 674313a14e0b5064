//! Server network layer handling UDP communications and the tick driver

use crate::client_manager::ClientManager;
use crate::config::GameConfig;
use crate::entity_store::WorldSnapshot;
use crate::error::GameError;
use crate::game::{GameCommand, GameState};
use crate::lifecycle::{GameEvent, PALETTE};
use bincode::{deserialize, serialize, serialized_size};
use log::{debug, error, info, warn};
use shared::{Direction, Packet, Snake, Vector2, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<u32>,
    },
}

/// Main server coordinating networking and game simulation
///
/// The `run` loop is the only writer of the game state: inbound packets
/// and ticks are handled one at a time by the same `select!`, so a tick
/// never observes a half-applied intent and two ticks never overlap.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: GameConfig, max_clients: usize) -> Result<Self, BoxError> {
        let game_state = GameState::new(config)?;
        check_datagram_budget(game_state.config(), max_clients)?;
        let tick_duration = game_state.config().tick_duration();

        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            game_state,
            tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle for stopping the run loop from another task
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
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
    ///
    /// Broadcasts are encoded once and the same bytes go to every client.
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let data = match encode(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode broadcast: {}", e);
                                continue;
                            }
                        };

                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), BoxError> {
        let data = encode(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    async fn send_to_client(&self, packet: Packet, client_id: u32) {
        let addr = {
            let clients = self.clients.read().await;
            clients.get_addr(client_id)
        };

        match addr {
            Some(addr) => self.send_packet(packet, addr),
            None => debug!("Dropping packet for departed client {}", client_id),
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<u32>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Translates inbound packets into game commands
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    let response = Packet::Disconnected {
                        reason: "Protocol version mismatch".to_string(),
                    };
                    self.send_packet(response, addr);
                    return;
                }

                // Remove existing connection if present
                let existing_client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(existing_id) = existing_client_id {
                    info!("Replacing existing client {} from {}", existing_id, addr);
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&existing_id);
                    self.game_state.submit(GameCommand::Leave {
                        client_id: existing_id,
                    });
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };

                if let Some(client_id) = client_id {
                    self.game_state.submit(GameCommand::Join { client_id });
                    self.send_packet(Packet::Connected { client_id }, addr);
                } else {
                    let response = Packet::Disconnected {
                        reason: "Server full".to_string(),
                    };
                    self.send_packet(response, addr);
                }
            }

            Packet::Turn { turn } => {
                if let Some(client_id) = self.touch_client(addr).await {
                    self.game_state.submit(GameCommand::Turn { client_id, turn });
                }
            }

            Packet::Heartbeat => {
                self.touch_client(addr).await;
            }

            Packet::Disconnect => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&client_id);
                    self.game_state.submit(GameCommand::Leave { client_id });
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Refreshes liveness for the client at `addr` and returns its id
    async fn touch_client(&self, addr: SocketAddr) -> Option<u32> {
        let mut clients = self.clients.write().await;
        let client_id = clients.find_client_by_addr(addr)?;
        clients.touch(client_id);
        Some(client_id)
    }

    /// Routes one tick's lifecycle events to their recipients
    async fn dispatch_events(&self, events: Vec<GameEvent>) {
        for event in events {
            match event {
                GameEvent::Joined {
                    snake,
                    players,
                    food,
                } => {
                    let client_id = snake.id;
                    self.broadcast_packet(
                        Packet::NewPlayer {
                            snake: snake.clone(),
                        },
                        Some(client_id),
                    );
                    let init = Packet::Init {
                        client_id,
                        snake,
                        players,
                        food,
                    };
                    self.send_to_client(init, client_id).await;
                }
                GameEvent::Respawned { snake } => {
                    self.broadcast_packet(Packet::NewPlayer { snake }, None);
                }
                GameEvent::Died { client_id, score } => {
                    self.broadcast_packet(Packet::PlayerDied { client_id, score }, None);
                }
                GameEvent::Countdown {
                    client_id,
                    seconds_remaining,
                } => {
                    let packet = Packet::Countdown {
                        client_id,
                        seconds_remaining,
                    };
                    self.send_to_client(packet, client_id).await;
                }
                GameEvent::Left { client_id } => {
                    self.broadcast_packet(Packet::PlayerLeft { client_id }, None);
                }
            }
        }
    }

    /// Broadcasts the published snapshot to all connected clients
    async fn broadcast_game_state(&self, snapshot: &WorldSnapshot) {
        let client_count = {
            let clients = self.clients.read().await;
            clients.len()
        };

        if client_count == 0 {
            return;
        }

        let packet = Packet::GameState {
            tick: snapshot.tick,
            timestamp: get_timestamp(),
            players: snapshot.players.clone(),
            food: snapshot.food.clone(),
        };

        self.broadcast_packet(packet, None);
    }

    /// Runs one tick, then hands its events and snapshot to the sender task
    async fn run_tick(&mut self) {
        let started = Instant::now();
        let report = self.game_state.tick();
        let tick = report.snapshot.tick;

        self.dispatch_events(report.events).await;
        self.broadcast_game_state(&report.snapshot).await;

        let elapsed = started.elapsed();
        if elapsed > self.tick_duration {
            warn!(
                "Tick {} overran: {:?} > {:?}",
                tick, elapsed, self.tick_duration
            );
        }

        // Periodic performance monitoring
        if tick % 100 == 0 && self.game_state.player_count() > 0 {
            debug!(
                "Tick {}: {} players, {} snakes alive, step took {:?}",
                tick,
                self.game_state.player_count(),
                report.snapshot.players.len(),
                elapsed
            );
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), BoxError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Server started successfully ({:?} per tick)",
            self.tick_duration
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.game_state.submit(GameCommand::Leave { client_id });
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.run_tick().await;
                },
            }
        }

        Ok(())
    }
}

/// Largest `Init` a world of this shape can produce: every cell holds a
/// segment or a food item, spread over as many snakes as clients can connect.
fn worst_case_init(config: &GameConfig, max_clients: usize) -> Packet {
    let size = config.grid_size;
    let mut cells = (0..size).flat_map(move |y| (0..size).map(move |x| Vector2::new(x, y)));
    let color = PALETTE
        .iter()
        .max_by_key(|color| color.len())
        .copied()
        .unwrap_or_default()
        .to_string();

    let food: Vec<Vector2> = cells.by_ref().take(config.food_count).collect();
    let segments = config.cell_count() - food.len();
    let snakes = max_clients.clamp(1, segments.max(1));

    let mut players = Vec::with_capacity(snakes);
    for i in 0..snakes {
        let length = if i + 1 == snakes { segments - i } else { 1 };
        let body: Vec<Vector2> = cells.by_ref().take(length).collect();
        players.push(Snake::new(u32::MAX, u32::MAX, color.clone(), Direction::Up, body));
    }

    let snake = Snake::new(
        u32::MAX,
        u32::MAX,
        color,
        Direction::Up,
        vec![Vector2::default(); config.start_length],
    );

    Packet::Init {
        client_id: u32::MAX,
        snake,
        players,
        food,
    }
}

/// Rejects worlds whose snapshots could outgrow a single datagram.
pub fn check_datagram_budget(config: &GameConfig, max_clients: usize) -> Result<(), GameError> {
    let packet = worst_case_init(config, max_clients);
    let bytes = serialized_size(&packet)
        .map_err(|e| GameError::InvalidConfig(format!("cannot size snapshot: {}", e)))?;

    if bytes > MAX_DATAGRAM_SIZE as u64 {
        return Err(GameError::InvalidConfig(format!(
            "a full {}x{} grid with {} clients needs {} bytes per snapshot, limit is {}",
            config.grid_size, config.grid_size, max_clients, bytes, MAX_DATAGRAM_SIZE
        )));
    }
    Ok(())
}

fn encode(packet: &Packet) -> Result<Vec<u8>, BoxError> {
    let data = serialize(packet)?;
    if data.len() > MAX_DATAGRAM_SIZE {
        return Err(format!("packet of {} bytes exceeds datagram limit", data.len()).into());
    }
    Ok(data)
}

// Current wall-clock time in milliseconds
fn get_timestamp() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    millis.min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_GRID_SIZE;
    use shared::Turn;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_config() -> GameConfig {
        GameConfig {
            ticks_per_second: 50,
            seed: Some(17),
            ..GameConfig::default()
        }
    }

    async fn test_server() -> Server {
        tokio_test::assert_ok!(Server::new("127.0.0.1:0", test_config(), 4).await)
    }

    fn local(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    #[test]
    fn test_client_timeout_message() {
        let msg = ServerMessage::ClientTimeout { client_id: 42 };

        match msg {
            ServerMessage::ClientTimeout { client_id } => assert_eq!(client_id, 42),
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_encode_rejects_oversized_packets() {
        let packet = Packet::Disconnected {
            reason: "x".repeat(MAX_DATAGRAM_SIZE + 1),
        };
        assert!(encode(&packet).is_err());
        assert!(encode(&Packet::Heartbeat).is_ok());
    }

    #[test]
    fn test_full_world_at_max_grid_fits_in_datagram() {
        let config = GameConfig {
            grid_size: MAX_GRID_SIZE,
            food_count: 1,
            start_length: MAX_GRID_SIZE as usize,
            ..GameConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(check_datagram_budget(&config, 32), Ok(()));

        let packet = worst_case_init(&config, 32);
        match &packet {
            Packet::Init { players, food, .. } => {
                let segments: usize = players.iter().map(Snake::len).sum();
                assert_eq!(segments + food.len(), config.cell_count());
                assert_eq!(players.len(), 32);
            }
            other => panic!("Unexpected packet: {:?}", other),
        }
        assert!(encode(&packet).is_ok());

        // The same world as a per-tick broadcast
        if let Packet::Init { players, food, .. } = packet {
            let state = Packet::GameState {
                tick: u64::MAX,
                timestamp: u64::MAX,
                players,
                food,
            };
            assert!(encode(&state).is_ok());
        }
    }

    #[test]
    fn test_too_many_clients_for_full_grid_is_rejected() {
        let config = GameConfig {
            grid_size: MAX_GRID_SIZE,
            ..GameConfig::default()
        };
        assert!(matches!(
            check_datagram_budget(&config, 1_000),
            Err(GameError::InvalidConfig(_))
        ));
        assert_eq!(check_datagram_budget(&GameConfig::default(), 1_000), Ok(()));
    }

    #[tokio::test]
    async fn test_oversized_world_fails_startup() {
        let config = GameConfig {
            grid_size: MAX_GRID_SIZE,
            seed: Some(1),
            ..GameConfig::default()
        };
        assert!(Server::new("127.0.0.1:0", config, 1_000).await.is_err());
    }

    #[test]
    fn test_timestamp_is_recent() {
        // 2020-01-01 in milliseconds
        assert!(get_timestamp() > 1_577_836_800_000);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_startup() {
        let config = GameConfig {
            food_count: 0,
            ..test_config()
        };
        assert!(Server::new("127.0.0.1:0", config, 4).await.is_err());
    }

    #[tokio::test]
    async fn test_connect_queues_join_and_acknowledges() {
        let mut server = test_server().await;

        server
            .handle_packet(Packet::Connect { client_version: PROTOCOL_VERSION }, local(4000))
            .await;

        match server.game_rx.try_recv() {
            Ok(GameMessage::SendPacket {
                packet: Packet::Connected { client_id },
                addr,
            }) => {
                assert_eq!(client_id, 1);
                assert_eq!(addr, local(4000));
            }
            other => panic!("Unexpected message: {:?}", other),
        }

        let report = server.game_state.tick();
        assert_eq!(report.snapshot.players.len(), 1);
    }

    #[tokio::test]
    async fn test_version_mismatch_is_refused() {
        let mut server = test_server().await;

        server
            .handle_packet(Packet::Connect { client_version: 99 }, local(4001))
            .await;

        match server.game_rx.try_recv() {
            Ok(GameMessage::SendPacket {
                packet: Packet::Disconnected { reason },
                ..
            }) => assert_eq!(reason, "Protocol version mismatch"),
            other => panic!("Unexpected message: {:?}", other),
        }
        assert!(server.clients.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_server_full_is_refused() {
        let mut server = tokio_test::assert_ok!(Server::new("127.0.0.1:0", test_config(), 1).await);

        for port in [4002, 4003] {
            server
                .handle_packet(Packet::Connect { client_version: PROTOCOL_VERSION }, local(port))
                .await;
        }

        let _connected = server.game_rx.try_recv().unwrap();
        match server.game_rx.try_recv() {
            Ok(GameMessage::SendPacket {
                packet: Packet::Disconnected { reason },
                addr,
            }) => {
                assert_eq!(reason, "Server full");
                assert_eq!(addr, local(4003));
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_turn_from_unknown_address_is_ignored() {
        let mut server = test_server().await;

        server
            .handle_packet(
                Packet::Turn {
                    turn: Turn::Absolute(Direction::Up),
                },
                local(4004),
            )
            .await;

        assert!(server.game_rx.try_recv().is_err());
        assert_eq!(server.game_state.player_count(), 0);
    }

    #[tokio::test]
    async fn test_tick_dispatches_init_and_state() {
        let mut server = test_server().await;
        server
            .handle_packet(Packet::Connect { client_version: PROTOCOL_VERSION }, local(4005))
            .await;
        let _connected = server.game_rx.try_recv().unwrap();

        server.run_tick().await;

        let mut saw_init = false;
        let mut saw_state = false;
        while let Ok(message) = server.game_rx.try_recv() {
            match message {
                GameMessage::SendPacket {
                    packet: Packet::Init { client_id, snake, .. },
                    ..
                } => {
                    assert_eq!(client_id, 1);
                    assert_eq!(snake.display_number, 1);
                    saw_init = true;
                }
                GameMessage::BroadcastPacket {
                    packet: Packet::GameState { tick, players, .. },
                    ..
                } => {
                    assert_eq!(tick, 1);
                    assert_eq!(players.len(), 1);
                    saw_state = true;
                }
                GameMessage::BroadcastPacket {
                    packet: Packet::NewPlayer { .. },
                    exclude,
                } => assert_eq!(exclude, Some(1)),
                other => panic!("Unexpected message: {:?}", other),
            }
        }

        assert!(saw_init);
        assert!(saw_state);
    }

    #[tokio::test]
    async fn test_disconnect_releases_client() {
        let mut server = test_server().await;
        server
            .handle_packet(Packet::Connect { client_version: PROTOCOL_VERSION }, local(4006))
            .await;
        server.run_tick().await;

        server.handle_packet(Packet::Disconnect, local(4006)).await;
        assert!(server.clients.read().await.is_empty());

        let report = server.game_state.tick();
        assert!(report.events.contains(&GameEvent::Left { client_id: 1 }));
        assert!(report.snapshot.players.is_empty());
    }
}
