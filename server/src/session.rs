//! Session management for the authoritative server
//!
//! Maps peer addresses to player slots and drives each slot through its
//! lifecycle:
//! - Free: no peer
//! - Connecting: the peer is downloading the map
//! - Active: the peer asked for its client info and owns a player
//!
//! Any valid datagram from an unknown address claims the first free slot
//! and is then processed as if the peer were already known. A slot with no
//! traffic for the timeout is freed and its player removed.

use crate::game::GameState;
use log::{debug, info, trace};
use shared::{Packet, MAX_PLAYERS};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Free,
    Connecting,
    Active,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub addr: Option<SocketAddr>,
    pub state: SessionState,
    /// Last time any valid packet arrived from this peer
    pub last_seen: Instant,
}

impl Session {
    fn free(now: Instant) -> Self {
        Self {
            addr: None,
            state: SessionState::Free,
            last_seen: now,
        }
    }

    /// True if nothing has been heard from the peer for longer than `timeout`
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }
}

/// Fixed table of session slots, one per player slot
pub struct SessionManager {
    sessions: Vec<Session>,
    timeout: Duration,
}

impl SessionManager {
    /// Creates a manager with `max_sessions` slots, capped at the number
    /// of player slots.
    pub fn new(max_sessions: usize, timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            sessions: (0..max_sessions.min(MAX_PLAYERS))
                .map(|_| Session::free(now))
                .collect(),
            timeout,
        }
    }

    /// Finds the slot owned by a peer address
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<usize> {
        self.sessions.iter().position(|s| s.addr == Some(addr))
    }

    pub fn session(&self, slot: usize) -> Option<&Session> {
        self.sessions.get(slot)
    }

    pub fn state(&self, slot: usize) -> SessionState {
        self.sessions
            .get(slot)
            .map_or(SessionState::Free, |s| s.state)
    }

    /// Claims the first free slot for a new peer
    ///
    /// Returns None when every slot is taken.
    pub fn connect(&mut self, addr: SocketAddr, now: Instant) -> Option<usize> {
        let slot = self
            .sessions
            .iter()
            .position(|s| s.state == SessionState::Free)?;
        self.sessions[slot] = Session {
            addr: Some(addr),
            state: SessionState::Connecting,
            last_seen: now,
        };
        info!("Peer {} connecting in slot {}", addr, slot);
        Some(slot)
    }

    /// Frees a slot and removes its player
    pub fn disconnect(&mut self, slot: usize, game: &mut GameState) {
        let Some(session) = self.sessions.get_mut(slot) else {
            return;
        };
        if session.state == SessionState::Free {
            return;
        }
        let was_active = session.state == SessionState::Active;
        if let Some(addr) = session.addr {
            info!("Peer {} in slot {} disconnected", addr, slot);
        }
        *session = Session::free(session.last_seen);
        if was_active {
            game.remove_player(slot);
        }
    }

    /// Processes one datagram and returns the replies to send
    ///
    /// Malformed datagrams are dropped before any slot is claimed.
    pub fn handle_datagram(
        &mut self,
        game: &mut GameState,
        addr: SocketAddr,
        bytes: &[u8],
        now: Instant,
    ) -> Vec<(SocketAddr, Packet)> {
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Dropping datagram from {}: {}", addr, e);
                return Vec::new();
            }
        };

        let slot = match self.find_by_addr(addr) {
            Some(slot) => slot,
            None => match self.connect(addr, now) {
                Some(slot) => slot,
                None => {
                    debug!("No free slot for {}, dropping packet", addr);
                    return Vec::new();
                }
            },
        };

        let session = &mut self.sessions[slot];
        session.last_seen = now;
        let mut replies = Vec::new();

        match packet {
            Packet::Update(input) => {
                if session.state == SessionState::Active {
                    game.apply_input(slot, &input);
                }
            }
            Packet::GetWorld { part } => {
                if session.state == SessionState::Connecting {
                    match game.world_chunk(part) {
                        Some(chunk) => replies.push((addr, chunk)),
                        None => debug!("Peer {} asked for bad map part {}", addr, part),
                    }
                }
            }
            Packet::GetClientInfo => {
                if session.state == SessionState::Connecting {
                    session.state = SessionState::Active;
                    game.add_player(slot);
                    info!("Peer {} active as player {}", addr, slot);
                }
                // Repeated requests get the same answer; the first reply may have been lost.
                replies.push((addr, Packet::ClientInfo { player_id: slot as u8 }));
            }
            other => {
                trace!("Ignoring server-bound {:?} from {}", other.opcode(), addr);
            }
        }

        replies
    }

    /// Frees every slot that has gone quiet
    ///
    /// Returns the freed slots.
    pub fn check_timeouts(&mut self, game: &mut GameState, now: Instant) -> Vec<usize> {
        let timed_out: Vec<usize> = self
            .sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| s.state != SessionState::Free && s.is_timed_out(now, self.timeout))
            .map(|(slot, _)| slot)
            .collect();

        for &slot in &timed_out {
            info!("Slot {} timed out", slot);
            self.disconnect(slot, game);
        }

        timed_out
    }

    /// Every active player's state, addressed to every active peer
    pub fn broadcast_packets(&self, game: &GameState) -> Vec<(SocketAddr, Packet)> {
        let updates = game.player_updates();
        self.active_addrs()
            .flat_map(|addr| {
                updates
                    .iter()
                    .map(move |update| (addr, Packet::PlayerUpdate(*update)))
            })
            .collect()
    }

    pub fn active_addrs(&self) -> impl Iterator<Item = SocketAddr> + '_ {
        self.sessions
            .iter()
            .filter(|s| s.state == SessionState::Active)
            .filter_map(|s| s.addr)
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.state != SessionState::Free)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
