use crate::connection::Connection;
use crate::game::ClientGameState;
use crate::input::{Autopilot, InputManager};
use log::{debug, error, info, warn};
use shared::{Packet, MAX_TIMESTEP};
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, MissedTickBehavior};

const RECV_BUFFER_SIZE: usize = 2048;

/// Client tunables
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub tick_duration: Duration,
    /// How often unanswered handshake requests are repeated
    pub resend_interval: Duration,
    /// Drive input headlessly instead of waiting for a renderer
    pub autopilot: bool,
    pub seed: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs_f64(1.0 / 60.0),
            resend_interval: Duration::from_millis(200),
            autopilot: true,
            seed: 0,
        }
    }
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    connection: Connection,
    game_state: ClientGameState,
    input_manager: InputManager,
    autopilot: Option<Autopilot>,
    config: ClientConfig,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        config: ClientConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr: SocketAddr = server_addr.parse()?;
        let bind_addr = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        info!("Client bound to {}", socket.local_addr()?);

        Ok(Client {
            socket,
            server_addr,
            connection: Connection::new(config.resend_interval),
            game_state: ClientGameState::new(config.seed),
            input_manager: InputManager::new(),
            autopilot: config.autopilot.then(|| Autopilot::new(config.seed)),
            config,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    /// The narrow ingestion call for whatever is producing input
    pub fn input_manager(&mut self) -> &mut InputManager {
        &mut self.input_manager
    }

    async fn send_packet(&self, packet: &Packet) {
        let data = match packet.encode() {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode {:?}: {}", packet.opcode(), e);
                return;
            }
        };
        if let Err(e) = self.socket.send_to(&data, self.server_addr).await {
            error!("Failed to send packet: {}", e);
        }
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::World { part, data } => {
                if self.connection.on_world(part) && !self.game_state.load_chunk(part, &data) {
                    warn!("Map part {} did not load", part);
                }
            }
            Packet::ClientInfo { player_id } => {
                if self.connection.on_client_info(player_id) {
                    self.game_state.set_local_player(player_id);
                }
            }
            Packet::PlayerUpdate(update) => {
                if self.connection.is_established() {
                    self.game_state.apply_server_state(&update);
                }
            }
            other => {
                debug!("Ignoring client-bound opcode {}", other.opcode());
            }
        }
    }

    /// Reads every pending datagram without blocking
    fn drain_socket(&mut self) -> usize {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let mut received = 0;

        loop {
            match self.socket.try_recv_from(&mut buffer) {
                Ok((len, addr)) => {
                    if addr != self.server_addr {
                        debug!("Ignoring datagram from {}", addr);
                        continue;
                    }
                    received += 1;
                    match Packet::decode(&buffer[..len]) {
                        Ok(packet) => self.handle_packet(packet),
                        Err(e) => debug!("Dropping datagram: {}", e),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    break;
                }
            }
        }

        received
    }

    /// One frame: receive, handshake or send input, simulate
    pub async fn tick(&mut self, dt: f32, now: Instant) {
        self.drain_socket();

        if !self.connection.is_established() {
            for request in self.connection.poll_requests(now) {
                self.send_packet(&request).await;
            }
            return;
        }

        if let Some(autopilot) = self.autopilot.as_mut() {
            autopilot.drive(&mut self.input_manager, dt);
        }
        let input = self.input_manager.sample();
        self.game_state.predict(&input);
        self.send_packet(&Packet::Update(input)).await;

        let mut dt = dt;
        if dt > MAX_TIMESTEP {
            warn!(
                "Large delta time detected ({:.3}s), capping to {:.3}s",
                dt, MAX_TIMESTEP
            );
            dt = MAX_TIMESTEP;
        }
        self.game_state.update(dt);
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to {}", self.server_addr);

        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        loop {
            tick_interval.tick().await;

            let now = Instant::now();
            let dt = now.duration_since(last_tick).as_secs_f32();
            last_tick = now;

            self.tick(dt, now).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::map::CHUNK_SIZE;
    use shared::InputState;
    use tokio::time::timeout;

    async fn peer_pair() -> (Client, UdpSocket) {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let config = ClientConfig {
            autopilot: false,
            ..ClientConfig::default()
        };
        (Client::new(&addr, config).await.unwrap(), server)
    }

    async fn recv(socket: &UdpSocket) -> (Packet, SocketAddr) {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let (len, from) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .expect("nothing received")
            .unwrap();
        (Packet::decode(&buffer[..len]).unwrap(), from)
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.resend_interval, Duration::from_millis(200));
        assert!(config.autopilot);
    }

    #[test]
    fn test_bad_server_address() {
        let result = tokio_test::block_on(Client::new("nowhere", ClientConfig::default()));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_first_tick_requests_map() {
        let (mut client, server) = peer_pair().await;

        client.tick(0.016, Instant::now()).await;

        for part in 0..4 {
            let (packet, _) = recv(&server).await;
            assert_eq!(packet, Packet::GetWorld { part });
        }
    }

    #[tokio::test]
    async fn test_handshake_packets_update_state() {
        let (mut client, _server) = peer_pair().await;

        for part in 0..4u8 {
            client.handle_packet(Packet::World {
                part,
                data: vec![0; CHUNK_SIZE],
            });
        }
        assert!(client.connection().map_complete());

        client.handle_packet(Packet::ClientInfo { player_id: 1 });
        assert_eq!(client.connection().player_id(), Some(1));
        assert_eq!(client.game_state().local_id(), Some(1));

        // A stray server-bound opcode changes nothing.
        client.handle_packet(Packet::Update(InputState::default()));
        assert_eq!(client.game_state().updates_applied(), 0);
    }

    #[tokio::test]
    async fn test_sends_input_once_joined() {
        let (mut client, server) = peer_pair().await;
        client.handle_packet(Packet::ClientInfo { player_id: 0 });
        client.input_manager().set_keys(shared::keys::FORWARD);

        client.tick(0.016, Instant::now()).await;

        match recv(&server).await.0 {
            Packet::Update(input) => assert_eq!(input.keys, shared::keys::FORWARD),
            other => panic!("unexpected {:?}", other),
        }
    }
}
