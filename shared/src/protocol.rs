//! Wire format: one opcode byte followed by a fixed-size payload.
//!
//! Struct payloads go through bincode with big-endian fixed-width
//! integers, which lays them out byte for byte as declared. The map chunk
//! in WORLD is copied raw. Decoding tolerates trailing bytes but rejects
//! short datagrams.

use crate::entities::{Body, Player, Presence};
use crate::map::CHUNK_SIZE;
use crate::InputState;
use bincode::Options;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI, TAU};
use thiserror::Error;

pub mod opcode {
    pub const UPDATE: u8 = 1;
    pub const GET_WORLD: u8 = 2;
    pub const GET_CLIENT_INFO: u8 = 3;
    pub const WORLD: u8 = 4;
    pub const CLIENT_INFO: u8 = 5;
    pub const PLAYER_UPDATE: u8 = 6;
}

/// Counts per world unit for positions: [0, 512) spans the u16 range.
pub const POSITION_SCALE: f32 = 128.0;
/// Counts per world unit for velocities.
pub const VELOCITY_SCALE: f32 = 4.0;

const ANGLE_STEPS: f32 = 65536.0;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("empty datagram")]
    Empty,
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    #[error("opcode {opcode} needs {expected} bytes, got {actual}")]
    Truncated {
        opcode: u8,
        expected: usize,
        actual: usize,
    },
    #[error("map chunk must be 256 bytes, got {0}")]
    BadChunk(usize),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Replicated state of one player, quantized for the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    pub player_id: u8,
    pub keys: u8,
    pub health: i8,
    pub ammo: i8,
    pub position: [u16; 3],
    pub velocity: [i16; 3],
    pub aim_yaw: u16,
    pub aim_pitch: u16,
}

impl PlayerUpdate {
    pub fn from_player(player_id: u8, player: &Player) -> Self {
        let pos = player.body.pos;
        let vel = player.body.vel;
        Self {
            player_id,
            keys: player.keys,
            health: player.health,
            ammo: player.ammo,
            position: [
                quantize_position(pos.x),
                quantize_position(pos.y),
                quantize_position(pos.z),
            ],
            velocity: [
                quantize_velocity(vel.x),
                quantize_velocity(vel.y),
                quantize_velocity(vel.z),
            ],
            aim_yaw: quantize_yaw(player.yaw),
            aim_pitch: quantize_pitch(player.pitch),
        }
    }

    pub fn position(&self) -> Vec3 {
        let [x, y, z] = self.position.map(dequantize_position);
        Vec3::new(x, y, z)
    }

    pub fn velocity(&self) -> Vec3 {
        let [x, y, z] = self.velocity.map(dequantize_velocity);
        Vec3::new(x, y, z)
    }

    /// Overwrites the player with this state. No blending.
    ///
    /// Only the floor is known here, so a player replicated standing on a
    /// corpse arrives ungrounded; the next step's resolution lands it again.
    pub fn apply_to(&self, player: &mut Player) {
        let pos = self.position();
        player.presence = Presence::Active;
        player.body = Body {
            pos,
            vel: self.velocity(),
            grounded: pos.y <= 0.0,
        };
        player.keys = self.keys;
        player.health = self.health;
        player.ammo = self.ammo;
        player.yaw = dequantize_yaw(self.aim_yaw);
        player.pitch = dequantize_pitch(self.aim_pitch);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Update(InputState),
    GetWorld { part: u8 },
    GetClientInfo,
    World { part: u8, data: Vec<u8> },
    ClientInfo { player_id: u8 },
    PlayerUpdate(PlayerUpdate),
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

impl Packet {
    pub fn opcode(&self) -> u8 {
        match self {
            Packet::Update(_) => opcode::UPDATE,
            Packet::GetWorld { .. } => opcode::GET_WORLD,
            Packet::GetClientInfo => opcode::GET_CLIENT_INFO,
            Packet::World { .. } => opcode::WORLD,
            Packet::ClientInfo { .. } => opcode::CLIENT_INFO,
            Packet::PlayerUpdate(_) => opcode::PLAYER_UPDATE,
        }
    }

    /// Total datagram size for an opcode, opcode byte included.
    pub fn wire_size(op: u8) -> Option<usize> {
        match op {
            opcode::UPDATE => Some(6),
            opcode::GET_WORLD => Some(2),
            opcode::GET_CLIENT_INFO => Some(1),
            opcode::WORLD => Some(2 + CHUNK_SIZE),
            opcode::CLIENT_INFO => Some(2),
            opcode::PLAYER_UPDATE => Some(21),
            _ => None,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let mut out = Vec::with_capacity(Self::wire_size(self.opcode()).unwrap_or(1));
        out.push(self.opcode());
        match self {
            Packet::Update(input) => codec().serialize_into(&mut out, input)?,
            Packet::GetWorld { part } => out.push(*part),
            Packet::GetClientInfo => {}
            Packet::World { part, data } => {
                if data.len() != CHUNK_SIZE {
                    return Err(PacketError::BadChunk(data.len()));
                }
                out.push(*part);
                out.extend_from_slice(data);
            }
            Packet::ClientInfo { player_id } => out.push(*player_id),
            Packet::PlayerUpdate(update) => codec().serialize_into(&mut out, update)?,
        }
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, PacketError> {
        let (&op, payload) = bytes.split_first().ok_or(PacketError::Empty)?;
        let expected = Self::wire_size(op).ok_or(PacketError::UnknownOpcode(op))?;
        if bytes.len() < expected {
            return Err(PacketError::Truncated {
                opcode: op,
                expected,
                actual: bytes.len(),
            });
        }

        let packet = match op {
            opcode::UPDATE => Packet::Update(codec().deserialize(payload)?),
            opcode::GET_WORLD => Packet::GetWorld { part: payload[0] },
            opcode::GET_CLIENT_INFO => Packet::GetClientInfo,
            opcode::WORLD => Packet::World {
                part: payload[0],
                data: payload[1..=CHUNK_SIZE].to_vec(),
            },
            opcode::CLIENT_INFO => Packet::ClientInfo {
                player_id: payload[0],
            },
            opcode::PLAYER_UPDATE => Packet::PlayerUpdate(codec().deserialize(payload)?),
            other => return Err(PacketError::UnknownOpcode(other)),
        };
        Ok(packet)
    }
}

pub fn quantize_position(v: f32) -> u16 {
    (v * POSITION_SCALE).round().clamp(0.0, u16::MAX as f32) as u16
}

pub fn dequantize_position(q: u16) -> f32 {
    q as f32 / POSITION_SCALE
}

pub fn quantize_velocity(v: f32) -> i16 {
    (v * VELOCITY_SCALE)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

pub fn dequantize_velocity(q: i16) -> f32 {
    q as f32 / VELOCITY_SCALE
}

/// [0, 2pi) onto the full u16 range; any input angle is wrapped first.
pub fn quantize_yaw(yaw: f32) -> u16 {
    let steps = (yaw.rem_euclid(TAU) / TAU * ANGLE_STEPS).round() as u32;
    (steps % 65536) as u16
}

pub fn dequantize_yaw(q: u16) -> f32 {
    q as f32 * TAU / ANGLE_STEPS
}

/// [-pi/2, pi/2] onto the u16 range, clamped.
pub fn quantize_pitch(pitch: f32) -> u16 {
    ((pitch + FRAC_PI_2) / PI * ANGLE_STEPS)
        .round()
        .clamp(0.0, u16::MAX as f32) as u16
}

pub fn dequantize_pitch(q: u16) -> f32 {
    q as f32 / ANGLE_STEPS * PI - FRAC_PI_2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;
    use assert_approx_eq::assert_approx_eq;

    fn sample_update() -> PlayerUpdate {
        PlayerUpdate {
            player_id: 3,
            keys: keys::FORWARD | keys::FIRE,
            health: -5,
            ammo: 120,
            position: [0x1234, 0, 0xFFFF],
            velocity: [-4, 40, 0],
            aim_yaw: 0xABCD,
            aim_pitch: 0x8000,
        }
    }

    #[test]
    fn test_packet_sizes() {
        let packets = [
            Packet::Update(InputState::default()),
            Packet::GetWorld { part: 2 },
            Packet::GetClientInfo,
            Packet::World {
                part: 1,
                data: vec![0; CHUNK_SIZE],
            },
            Packet::ClientInfo { player_id: 7 },
            Packet::PlayerUpdate(sample_update()),
        ];
        let sizes: Vec<usize> = packets.iter().map(|p| p.encode().unwrap().len()).collect();
        assert_eq!(sizes, vec![6, 2, 1, 258, 2, 21]);
    }

    #[test]
    fn test_update_layout_is_big_endian() {
        let bytes = Packet::Update(InputState {
            keys: 0x41,
            aim_yaw: 0x0102,
            aim_pitch: 0xA0B0,
        })
        .encode()
        .unwrap();
        assert_eq!(bytes, vec![opcode::UPDATE, 0x41, 0x01, 0x02, 0xA0, 0xB0]);
    }

    #[test]
    fn test_player_update_layout() {
        let bytes = Packet::PlayerUpdate(sample_update()).encode().unwrap();
        assert_eq!(
            bytes,
            vec![
                opcode::PLAYER_UPDATE,
                3,
                0x21,
                0xFB,
                120,
                0x12, 0x34, 0x00, 0x00, 0xFF, 0xFF,
                0xFF, 0xFC, 0x00, 0x28, 0x00, 0x00,
                0xAB, 0xCD,
                0x80, 0x00,
            ]
        );
        assert_eq!(Packet::decode(&bytes).unwrap(), Packet::PlayerUpdate(sample_update()));
    }

    #[test]
    fn test_world_chunk_passes_through_raw() {
        let data: Vec<u8> = (0..CHUNK_SIZE).map(|i| (i % 7) as u8).collect();
        let bytes = Packet::World { part: 3, data: data.clone() }.encode().unwrap();
        assert_eq!(bytes[1], 3);
        assert_eq!(&bytes[2..], &data[..]);

        match Packet::decode(&bytes).unwrap() {
            Packet::World { part, data: decoded } => {
                assert_eq!(part, 3);
                assert_eq!(decoded, data);
            }
            other => panic!("unexpected packet {:?}", other),
        }

        let err = Packet::World { part: 0, data: vec![1; 10] }.encode().unwrap_err();
        assert!(matches!(err, PacketError::BadChunk(10)));
    }

    #[test]
    fn test_decode_rejects_short_and_unknown() {
        assert!(matches!(Packet::decode(&[]), Err(PacketError::Empty)));
        assert!(matches!(Packet::decode(&[99, 1, 2]), Err(PacketError::UnknownOpcode(99))));
        assert!(matches!(
            Packet::decode(&[opcode::UPDATE, 1, 2]),
            Err(PacketError::Truncated { opcode: 1, expected: 6, actual: 3 })
        ));
        assert!(matches!(
            Packet::decode(&[opcode::WORLD, 0, 0, 0]),
            Err(PacketError::Truncated { expected: 258, .. })
        ));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let decoded = Packet::decode(&[opcode::CLIENT_INFO, 4, 0xEE, 0xEE]).unwrap();
        assert_eq!(decoded, Packet::ClientInfo { player_id: 4 });
        assert_eq!(Packet::decode(&[opcode::GET_CLIENT_INFO, 9]).unwrap(), Packet::GetClientInfo);
    }

    #[test]
    fn test_position_quantization_error_bound() {
        let bound = 512.0 / 65536.0;
        let mut v = 0.0f32;
        while v < 512.0 {
            let back = dequantize_position(quantize_position(v));
            assert!((back - v).abs() <= bound, "{} -> {}", v, back);
            v += 0.371;
        }
        assert_eq!(quantize_position(-3.0), 0);
        assert_eq!(quantize_position(900.0), u16::MAX);
    }

    #[test]
    fn test_velocity_quantization() {
        assert_eq!(quantize_velocity(-1.0), -4);
        assert_approx_eq!(dequantize_velocity(quantize_velocity(12.3)), 12.25, 1e-6);
        assert_eq!(quantize_velocity(1.0e6), i16::MAX);
        assert_eq!(quantize_velocity(-1.0e6), i16::MIN);
    }

    #[test]
    fn test_angle_quantization_error_bound() {
        let yaw_bound = TAU / 65536.0;
        let mut a = 0.0f32;
        while a < TAU {
            let back = dequantize_yaw(quantize_yaw(a));
            // Wrap-aware difference.
            let diff = (back - a).rem_euclid(TAU);
            let diff = diff.min(TAU - diff);
            assert!(diff <= yaw_bound, "yaw {} -> {}", a, back);
            a += 0.0137;
        }
        assert_eq!(quantize_yaw(-FRAC_PI_2), quantize_yaw(3.0 * FRAC_PI_2));

        let pitch_bound = PI / 65536.0;
        let mut p = -FRAC_PI_2;
        while p <= FRAC_PI_2 {
            let back = dequantize_pitch(quantize_pitch(p));
            assert!((back - p).abs() <= pitch_bound + 1e-6, "pitch {} -> {}", p, back);
            p += 0.0071;
        }
        assert_eq!(quantize_pitch(0.0), 32768);
    }

    #[test]
    fn test_player_update_round_trip_through_player() {
        let mut player = Player::default();
        player.respawn();
        player.body.vel = Vec3::new(-10.0, 8.0, 2.5);
        player.yaw = 1.25;
        player.pitch = -0.4;
        player.keys = keys::JUMP;

        let update = PlayerUpdate::from_player(5, &player);
        let mut copy = Player::default();
        update.apply_to(&mut copy);

        assert!(copy.is_active());
        assert_eq!(copy.body.pos, player.body.pos);
        assert_eq!(copy.body.vel, player.body.vel);
        assert_eq!(copy.health, 100);
        assert_eq!(copy.ammo, 30);
        assert_eq!(copy.keys, keys::JUMP);
        assert_approx_eq!(copy.yaw, 1.25, 1e-3);
        assert_approx_eq!(copy.pitch, -0.4, 1e-3);
    }
}
