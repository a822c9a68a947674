//! Server network layer: UDP socket, per-tick datagram drain and the
//! fixed-cadence state broadcast

use crate::game::GameState;
use crate::session::SessionManager;
use log::{debug, error, info, warn};
use shared::{Packet, MAX_PLAYERS, MAX_TIMESTEP};
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, MissedTickBehavior};

/// Largest datagram the protocol produces is a 258-byte WORLD reply
const RECV_BUFFER_SIZE: usize = 2048;

/// Server tunables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Frame cap for the simulation loop
    pub tick_duration: Duration,
    /// How often PLAYERUPDATE packets go out
    pub broadcast_interval: Duration,
    /// Silence after which a session is torn down
    pub session_timeout: Duration,
    pub max_sessions: usize,
    /// Level generation seed
    pub seed: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs_f64(1.0 / 60.0),
            broadcast_interval: Duration::from_millis(50),
            session_timeout: Duration::from_millis(5000),
            max_sessions: MAX_PLAYERS,
            seed: 0,
        }
    }
}

/// Authoritative server: owns the socket, the sessions and the world
pub struct Server {
    socket: UdpSocket,
    sessions: SessionManager,
    game: GameState,
    config: ServerConfig,
    last_broadcast: Instant,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind(addr).await?;
        info!("Server listening on {}", socket.local_addr()?);

        Ok(Server {
            socket,
            sessions: SessionManager::new(config.max_sessions, config.session_timeout),
            game: GameState::new(config.seed),
            config,
            last_broadcast: Instant::now(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    async fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        let data = match packet.encode() {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode packet for {}: {}", addr, e);
                return;
            }
        };
        if let Err(e) = self.socket.send_to(&data, addr).await {
            error!("Failed to send packet to {}: {}", addr, e);
        }
    }

    /// Reads every pending datagram without blocking and answers each one
    ///
    /// Returns the number of datagrams read.
    async fn drain_socket(&mut self, now: Instant) -> usize {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let mut received = 0;

        loop {
            match self.socket.try_recv_from(&mut buffer) {
                Ok((len, addr)) => {
                    received += 1;
                    let replies =
                        self.sessions
                            .handle_datagram(&mut self.game, addr, &buffer[..len], now);
                    for (to, packet) in replies {
                        self.send_packet(&packet, to).await;
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

    async fn broadcast_state(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_broadcast) < self.config.broadcast_interval {
            return;
        }
        self.last_broadcast = now;

        for (addr, packet) in self.sessions.broadcast_packets(&self.game) {
            self.send_packet(&packet, addr).await;
        }
    }

    /// One loop iteration: receive, expire sessions, simulate, broadcast
    pub async fn tick(&mut self, dt: f32, now: Instant) {
        self.drain_socket(now).await;
        self.sessions.check_timeouts(&mut self.game, now);

        let mut dt = dt;
        if dt > MAX_TIMESTEP {
            warn!(
                "Large delta time detected ({:.3}s), capping to {:.3}s",
                dt, MAX_TIMESTEP
            );
            dt = MAX_TIMESTEP;
        }
        self.game.update(dt);

        self.broadcast_state(now).await;

        if self.game.tick() % 600 == 0 && !self.sessions.is_empty() {
            debug!(
                "Tick {}: {} sessions, {} zeds",
                self.game.tick(),
                self.sessions.len(),
                self.game.world.zeds.count()
            );
        }
    }

    /// Runs the frame-capped loop until the task is dropped
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The first tick fires immediately.
        tick_interval.tick().await;
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tick_interval.tick().await;

            let now = Instant::now();
            let dt = now.duration_since(last_tick).as_secs_f32();
            last_tick = now;

            self.tick(dt, now).await;
        }
    }
}
