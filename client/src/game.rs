use log::{debug, trace};
use shared::map::CHUNK_COUNT;
use shared::{InputState, MapGrid, Player, PlayerUpdate, World};

/// Client copy of the world
///
/// The map arrives in chunks during the handshake. After that the client
/// runs the shared step locally every frame, feeding its own input to the
/// local player, and replaces any player's state outright whenever the
/// server's copy arrives.
pub struct ClientGameState {
    pub world: World,
    local_id: Option<usize>,
    updates_applied: u64,
}

impl ClientGameState {
    pub fn new(seed: u64) -> Self {
        Self {
            world: World::new(MapGrid::new(), seed),
            local_id: None,
            updates_applied: 0,
        }
    }

    pub fn load_chunk(&mut self, part: u8, data: &[u8]) -> bool {
        if part as usize >= CHUNK_COUNT {
            return false;
        }
        self.world.map.load_chunk(part as usize, data)
    }

    /// Takes control of a player slot and spawns it locally
    pub fn set_local_player(&mut self, id: u8) {
        let id = id as usize;
        if self.world.spawn_player(id) {
            self.local_id = Some(id);
        } else {
            debug!("Server assigned out-of-range player id {}", id);
        }
    }

    pub fn local_id(&self) -> Option<usize> {
        self.local_id
    }

    pub fn local_player(&self) -> Option<&Player> {
        self.players().find(|(id, _)| Some(*id) == self.local_id).map(|(_, p)| p)
    }

    /// Overwrites a player with the server's state
    pub fn apply_server_state(&mut self, update: &PlayerUpdate) -> bool {
        let applied = self.world.apply_player_update(update);
        if applied {
            self.updates_applied += 1;
        } else {
            trace!("Ignoring update for player {}", update.player_id);
        }
        applied
    }

    pub fn updates_applied(&self) -> u64 {
        self.updates_applied
    }

    /// Feeds this frame's input to the local player
    pub fn predict(&mut self, input: &InputState) {
        if let Some(id) = self.local_id {
            self.world
                .set_input(id, input.keys, input.aim_yaw, input.aim_pitch);
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.world.step(dt);
    }

    pub fn map(&self) -> &MapGrid {
        &self.world.map
    }

    /// Every player currently in the game, for drawing
    pub fn players(&self) -> impl Iterator<Item = (usize, &Player)> {
        self.world.players.active()
    }
}
