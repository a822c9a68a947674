use crate::level::Level;
use log::info;
use shared::map::CHUNK_COUNT;
use shared::{InputState, Packet, PlayerUpdate, World, MAX_PLAYERS};

/// Authoritative world plus the operations the session layer drives.
pub struct GameState {
    pub world: World,
}

impl GameState {
    pub fn new(seed: u64) -> Self {
        let level = Level::generate(seed);
        let mut world = World::new(level.map, seed);
        world.zeds = level.zeds;
        Self { world }
    }

    pub fn add_player(&mut self, slot: usize) {
        if self.world.spawn_player(slot) {
            info!("Player {} spawned", slot);
        }
    }

    pub fn remove_player(&mut self, slot: usize) {
        self.world.remove_player(slot);
        info!("Removed player {}", slot);
    }

    pub fn apply_input(&mut self, slot: usize, input: &InputState) {
        self.world
            .set_input(slot, input.keys, input.aim_yaw, input.aim_pitch);
    }

    pub fn update(&mut self, dt: f32) {
        self.world.step(dt);
    }

    pub fn tick(&self) -> u64 {
        self.world.tick
    }

    /// WORLD reply for one map chunk, or `None` for a bad part index.
    pub fn world_chunk(&self, part: u8) -> Option<Packet> {
        if part as usize >= CHUNK_COUNT {
            return None;
        }
        let data = self.world.map.chunk(part as usize)?.to_vec();
        Some(Packet::World { part, data })
    }

    /// One update per active player.
    pub fn player_updates(&self) -> Vec<PlayerUpdate> {
        (0..MAX_PLAYERS)
            .filter_map(|slot| self.world.player_update(slot))
            .collect()
    }
}
