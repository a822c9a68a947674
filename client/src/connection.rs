//! Client side of the join handshake
//!
//! Until the server assigns a player id the client keeps asking: first for
//! every map chunk it has not received, then, once the map is complete, for
//! its client info. Requests repeat on a fixed interval so a lost datagram
//! in either direction only delays the join.

use log::{debug, info};
use shared::map::CHUNK_COUNT;
use shared::{Packet, MAX_PLAYERS};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Connection {
    downloaded: [bool; CHUNK_COUNT],
    player_id: Option<u8>,
    last_request: Option<Instant>,
    resend_interval: Duration,
}

impl Connection {
    pub fn new(resend_interval: Duration) -> Self {
        Self {
            downloaded: [false; CHUNK_COUNT],
            player_id: None,
            last_request: None,
            resend_interval,
        }
    }

    pub fn player_id(&self) -> Option<u8> {
        self.player_id
    }

    pub fn is_established(&self) -> bool {
        self.player_id.is_some()
    }

    pub fn has_part(&self, part: usize) -> bool {
        self.downloaded.get(part).copied().unwrap_or(false)
    }

    pub fn map_complete(&self) -> bool {
        self.downloaded.iter().all(|&done| done)
    }

    /// Requests to send now, if any are due
    ///
    /// The first call always fires; later calls wait out the resend
    /// interval. Nothing is sent once a player id is assigned.
    pub fn poll_requests(&mut self, now: Instant) -> Vec<Packet> {
        if self.is_established() {
            return Vec::new();
        }
        if let Some(last) = self.last_request {
            if now.saturating_duration_since(last) < self.resend_interval {
                return Vec::new();
            }
        }
        self.last_request = Some(now);

        if self.map_complete() {
            return vec![Packet::GetClientInfo];
        }
        (0..CHUNK_COUNT)
            .filter(|&part| !self.downloaded[part])
            .map(|part| Packet::GetWorld { part: part as u8 })
            .collect()
    }

    /// Marks a chunk received; false for duplicates and bad indices
    pub fn on_world(&mut self, part: u8) -> bool {
        match self.downloaded.get_mut(part as usize) {
            Some(done) if !*done => {
                *done = true;
                debug!("Map part {} received", part);
                true
            }
            _ => false,
        }
    }

    /// Records the assigned id; only the first valid assignment counts
    pub fn on_client_info(&mut self, player_id: u8) -> bool {
        if self.player_id.is_some() {
            return false;
        }
        if player_id as usize >= MAX_PLAYERS {
            debug!("Ignoring out of range player id {}", player_id);
            return false;
        }
        self.player_id = Some(player_id);
        info!("Joined as player {}", player_id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_missing_parts() {
        let mut connection = Connection::new(Duration::from_millis(200));
        let now = Instant::now();
        connection.on_world(1);

        let requests = connection.poll_requests(now);
        assert_eq!(
            requests,
            vec![
                Packet::GetWorld { part: 0 },
                Packet::GetWorld { part: 2 },
                Packet::GetWorld { part: 3 },
            ]
        );
    }

    #[test]
    fn test_resend_interval() {
        let mut connection = Connection::new(Duration::from_millis(200));
        let now = Instant::now();

        assert_eq!(connection.poll_requests(now).len(), 4);
        assert!(connection
            .poll_requests(now + Duration::from_millis(199))
            .is_empty());
        assert_eq!(
            connection
                .poll_requests(now + Duration::from_millis(200))
                .len(),
            4
        );
    }

    #[test]
    fn test_client_info_after_map() {
        let mut connection = Connection::new(Duration::from_millis(200));
        for part in 0..CHUNK_COUNT as u8 {
            assert!(connection.on_world(part));
        }
        assert!(connection.map_complete());

        assert_eq!(
            connection.poll_requests(Instant::now()),
            vec![Packet::GetClientInfo]
        );
    }

    #[test]
    fn test_stops_once_assigned() {
        let mut connection = Connection::new(Duration::from_millis(200));
        let now = Instant::now();
        assert!(connection.on_client_info(3));
        assert!(!connection.on_client_info(5));

        assert_eq!(connection.player_id(), Some(3));
        assert!(connection.poll_requests(now).is_empty());
        assert!(connection
            .poll_requests(now + Duration::from_secs(10))
            .is_empty());
    }

    #[test]
    fn test_out_of_range_id_ignored() {
        let mut connection = Connection::new(Duration::from_millis(200));
        let now = Instant::now();
        for part in 0..CHUNK_COUNT as u8 {
            connection.on_world(part);
        }

        assert!(!connection.on_client_info(200));
        assert!(!connection.on_client_info(MAX_PLAYERS as u8));
        assert!(!connection.is_established());
        assert_eq!(connection.poll_requests(now), vec![Packet::GetClientInfo]);

        assert!(connection.on_client_info(1));
        assert_eq!(connection.player_id(), Some(1));
    }

    #[test]
    fn test_duplicate_and_bad_parts() {
        let mut connection = Connection::new(Duration::from_millis(200));
        assert!(connection.on_world(0));
        assert!(!connection.on_world(0));
        assert!(!connection.on_world(4));
        assert!(connection.has_part(0));
        assert!(!connection.has_part(9));
    }
}
