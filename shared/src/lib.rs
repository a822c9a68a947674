//! Simulation core shared by the server and the client.
//!
//! Both processes run the exact same step over the same data: a fixed
//! 32x32 cell map, fixed-capacity entity stores and a per-cell intrusive
//! index of zeds. The server's copy is authoritative; the client runs the
//! same step for its own view and overwrites players from server updates.

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub mod collision;
pub mod entities;
pub mod map;
pub mod protocol;
pub mod shapes;
pub mod simulation;
pub mod spatial;

pub use collision::{resolve_character, sweep_bullet, Contact, Mover, Sweep};
pub use entities::{Body, Bullet, Particle, Player, PlayerStore, Presence, SlotArena, Zed, ZedState, ZedStore};
pub use map::MapGrid;
pub use protocol::{Packet, PacketError, PlayerUpdate};
pub use simulation::World;

pub const CELL_SIZE: f32 = 16.0;
pub const GRID_SIZE: usize = 32;
pub const WORLD_SIZE: f32 = CELL_SIZE * GRID_SIZE as f32;
/// Bullets above this height have left the playable volume.
pub const WORLD_HEIGHT: f32 = 48.0;

pub const MAX_PLAYERS: usize = 8;
pub const MAX_ZEDS: usize = 4096;
pub const MAX_BULLETS: usize = 64;
pub const MAX_PARTICLES: usize = 1024;

pub const GRAVITY: f32 = 25.0;
pub const WALK_SPEED: f32 = 10.0;
pub const ZED_SPEED: f32 = WALK_SPEED * 1.5;
pub const JUMP_VELOCITY: f32 = 8.0;
pub const BULLET_SPEED: f32 = 70.0;
pub const MAX_TIMESTEP: f32 = 0.05;

pub const PLAYER_RADIUS: f32 = 0.8;
pub const ZED_RADIUS: f32 = 0.8;
pub const CHARACTER_HEIGHT: f32 = 2.8;
pub const EYE_HEIGHT: f32 = 2.5;

pub const CEILING_HEIGHT: f32 = 15.0;
pub const DOOR_HEIGHT: f32 = 6.0;
pub const DOOR_GAP_MIN: f32 = 4.0;
pub const DOOR_GAP_MAX: f32 = 8.0;
/// Feet within this distance below a corpse's top land on it.
pub const LANDING_BAND: f32 = 0.3;

pub const ZED_RANGE: f32 = 32.0;
pub const ZED_DAMAGE: i8 = 30;
pub const SHOOT_DELAY: f32 = 0.2;

pub const MAX_HEALTH: i8 = 100;
pub const MAX_AMMO: i8 = 120;
pub const START_AMMO: i8 = 30;
pub const HEALTH_PICKUP: i8 = 25;
pub const AMMO_PICKUP: i8 = 30;

pub const SPAWN_POINT: Vec3 = Vec3::new(248.0, 0.0, 248.0);

/// Input bits carried in the `keys` byte of UPDATE and PLAYERUPDATE.
pub mod keys {
    pub const FORWARD: u8 = 0x01;
    pub const BACK: u8 = 0x02;
    pub const LEFT: u8 = 0x04;
    pub const RIGHT: u8 = 0x08;
    pub const JUMP: u8 = 0x10;
    pub const FIRE: u8 = 0x20;
    pub const USE: u8 = 0x40;
}

/// One tick of player input as it travels on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    pub keys: u8,
    pub aim_yaw: u16,
    pub aim_pitch: u16,
}

impl InputState {
    pub fn is_down(&self, key: u8) -> bool {
        self.keys & key != 0
    }
}
