//! Fixed-capacity entity stores addressed by slot index.
//!
//! Zeds live in a pre-sized slot array threaded into the per-cell
//! [`SpatialIndex`]; players sit one per connection slot; bullets and
//! particles use a generic tombstoned arena.

use crate::map::cell_of;
use crate::shapes::Obb;
use crate::spatial::{CellIter, CellLink, Linked, SpatialIndex};
use crate::{MAX_HEALTH, MAX_PLAYERS, MAX_ZEDS, SPAWN_POINT, START_AMMO};
use glam::Vec3;

/// Kinematic state shared by everything that walks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Body {
    pub pos: Vec3,
    pub vel: Vec3,
    pub grounded: bool,
}

impl Body {
    pub fn at(pos: Vec3) -> Self {
        Self {
            pos,
            vel: Vec3::ZERO,
            grounded: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ZedState {
    /// Free slot.
    #[default]
    None,
    Dead,
    Wandering,
    Attacking,
    Health,
    Ammo,
}

impl ZedState {
    pub fn is_alive(self) -> bool {
        matches!(self, ZedState::Wandering | ZedState::Attacking)
    }

    pub fn is_pickup(self) -> bool {
        matches!(self, ZedState::Health | ZedState::Ammo)
    }

    /// States that take part in neighbour queries and therefore live in
    /// the spatial index.
    pub fn is_indexed(self) -> bool {
        matches!(self, ZedState::Dead | ZedState::Wandering | ZedState::Attacking)
    }
}

const LIVING_HALF_EXTENTS: Vec3 = Vec3::new(0.4, 1.4, 0.8);
const CORPSE_HALF_EXTENTS: Vec3 = Vec3::new(1.4, 0.4, 0.8);

#[derive(Debug, Clone, Default)]
pub struct Zed {
    pub state: ZedState,
    pub body: Body,
    pub yaw: f32,
    /// Player slot being chased while attacking.
    pub target: Option<usize>,
    link: CellLink,
}

impl Linked for Zed {
    fn link(&self) -> &CellLink {
        &self.link
    }

    fn link_mut(&mut self) -> &mut CellLink {
        &mut self.link
    }
}

impl Zed {
    pub fn cell(&self) -> (i32, i32) {
        (cell_of(self.body.pos.x), cell_of(self.body.pos.z))
    }

    /// Cell the index currently files this zed under.
    pub fn indexed_cell(&self) -> Option<(i32, i32)> {
        self.link.linked.then_some((self.link.ix, self.link.iz))
    }

    /// Collision box: an upright slab while alive, lying flat once dead.
    pub fn obb(&self) -> Obb {
        let half = if self.state == ZedState::Dead {
            CORPSE_HALF_EXTENTS
        } else {
            LIVING_HALF_EXTENTS
        };
        Obb::from_yaw(self.body.pos + Vec3::Y * half.y, self.yaw, half)
    }

    /// Unit heading on the ground plane.
    pub fn heading(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), 0.0, self.yaw.sin())
    }
}

/// What a bullet did to a zed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    Killed,
    Removed,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct ZedStore {
    zeds: Vec<Zed>,
    index: SpatialIndex,
}

impl Default for ZedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ZedStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_ZEDS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            zeds: vec![Zed::default(); capacity],
            index: SpatialIndex::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.zeds.len()
    }

    pub fn count(&self) -> usize {
        self.zeds.iter().filter(|z| z.state != ZedState::None).count()
    }

    pub fn get(&self, id: usize) -> Option<&Zed> {
        self.zeds.get(id).filter(|z| z.state != ZedState::None)
    }

    /// Occupied slots with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Zed)> {
        self.zeds
            .iter()
            .enumerate()
            .filter(|(_, z)| z.state != ZedState::None)
    }

    pub fn ids(&self) -> Vec<usize> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Takes the first free slot. Returns `None` when full or when asked to
    /// spawn a free-slot state.
    pub fn spawn(&mut self, state: ZedState, pos: Vec3, yaw: f32) -> Option<usize> {
        if state == ZedState::None {
            return None;
        }
        let id = self.zeds.iter().position(|z| z.state == ZedState::None)?;
        self.zeds[id] = Zed {
            state,
            body: Body::at(pos),
            yaw,
            target: None,
            link: CellLink::default(),
        };
        if state.is_indexed() {
            let (ix, iz) = self.zeds[id].cell();
            self.index.insert(&mut self.zeds, id, ix, iz);
        }
        Some(id)
    }

    /// Releases a slot, unlinking it from its cell.
    pub fn free(&mut self, id: usize) {
        if id >= self.zeds.len() {
            return;
        }
        self.index.remove(&mut self.zeds, id);
        self.zeds[id] = Zed::default();
    }

    /// Changes state, keeping index membership in step with it.
    pub fn set_state(&mut self, id: usize, state: ZedState) {
        if state == ZedState::None {
            self.free(id);
            return;
        }
        let Some(zed) = self.zeds.get_mut(id) else {
            return;
        };
        if zed.state == ZedState::None {
            return;
        }
        zed.state = state;
        if state != ZedState::Attacking {
            zed.target = None;
        }
        if state.is_indexed() {
            let (ix, iz) = zed.cell();
            self.index.rebucket(&mut self.zeds, id, ix, iz);
        } else {
            self.index.remove(&mut self.zeds, id);
        }
    }

    /// Starts chasing `player`.
    pub fn attack(&mut self, id: usize, player: usize) {
        self.set_state(id, ZedState::Attacking);
        if let Some(zed) = self.zeds.get_mut(id) {
            zed.target = Some(player);
        }
    }

    pub fn set_yaw(&mut self, id: usize, yaw: f32) {
        if let Some(zed) = self.zeds.get_mut(id) {
            zed.yaw = yaw;
        }
    }

    /// Bullet impact: the living die, the dead are removed.
    pub fn hit(&mut self, id: usize) -> HitOutcome {
        match self.get(id).map(|z| z.state) {
            Some(ZedState::Wandering | ZedState::Attacking) => {
                self.set_state(id, ZedState::Dead);
                if let Some(zed) = self.zeds.get_mut(id) {
                    zed.body.vel = Vec3::ZERO;
                }
                HitOutcome::Killed
            }
            Some(ZedState::Dead) => {
                self.free(id);
                HitOutcome::Removed
            }
            _ => HitOutcome::Ignored,
        }
    }

    /// Sets a position and reconciles the cell list with it.
    pub fn move_to(&mut self, id: usize, pos: Vec3) {
        let Some(zed) = self.zeds.get_mut(id) else {
            return;
        };
        if zed.state == ZedState::None {
            return;
        }
        zed.body.pos = pos;
        self.rebucket(id);
    }

    pub fn set_body(&mut self, id: usize, body: Body) {
        let Some(zed) = self.zeds.get_mut(id) else {
            return;
        };
        if zed.state == ZedState::None {
            return;
        }
        zed.body = body;
        self.rebucket(id);
    }

    /// Moves the zed to the list of the cell its position is in, if that
    /// changed since the last call.
    pub fn rebucket(&mut self, id: usize) -> bool {
        match self.zeds.get(id) {
            Some(zed) if zed.state.is_indexed() => {
                let (ix, iz) = zed.cell();
                self.index.rebucket(&mut self.zeds, id, ix, iz)
            }
            _ => false,
        }
    }

    pub fn head(&self, ix: i32, iz: i32) -> Option<usize> {
        self.index.head(ix, iz)
    }

    pub fn next_in_cell(&self, id: usize) -> Option<usize> {
        self.zeds.get(id).and_then(|z| z.link.next)
    }

    pub fn iter_cell(&self, ix: i32, iz: i32) -> CellIter<'_, Zed> {
        self.index.iter(&self.zeds, ix, iz)
    }

    pub fn clear(&mut self) {
        self.index.clear(&mut self.zeds);
        self.zeds.iter_mut().for_each(|z| *z = Zed::default());
    }

    /// Index lists are well formed and hold exactly the indexed states.
    pub fn is_consistent(&self) -> bool {
        self.index.is_consistent(&self.zeds)
            && self
                .zeds
                .iter()
                .all(|z| z.link.linked == z.state.is_indexed())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Presence {
    #[default]
    Absent,
    Connecting,
    Active,
}

#[derive(Debug, Clone, Default)]
pub struct Player {
    pub presence: Presence,
    pub body: Body,
    pub yaw: f32,
    pub pitch: f32,
    /// Seconds until the next shot is allowed.
    pub shoot_delay: f32,
    pub health: i8,
    pub ammo: i8,
    pub keys: u8,
    pub prev_keys: u8,
}

impl Player {
    pub fn is_active(&self) -> bool {
        self.presence == Presence::Active
    }

    /// Back to the spawn point with starting stats.
    pub fn respawn(&mut self) {
        self.body = Body::at(SPAWN_POINT);
        self.health = MAX_HEALTH;
        self.ammo = START_AMMO;
        self.shoot_delay = 0.0;
    }

    pub fn is_down(&self, key: u8) -> bool {
        self.keys & key != 0
    }

    /// Key went down since the previous tick.
    pub fn pressed(&self, key: u8) -> bool {
        self.keys & key != 0 && self.prev_keys & key == 0
    }

    /// Unit look direction.
    pub fn aim(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(cy * cp, sp, sy * cp)
    }
}

#[derive(Debug, Clone)]
pub struct PlayerStore {
    players: Vec<Player>,
}

impl Default for PlayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerStore {
    pub fn new() -> Self {
        Self {
            players: vec![Player::default(); MAX_PLAYERS],
        }
    }

    /// Slots outside `[0, MAX_PLAYERS)` read as `None`.
    pub fn get(&self, id: usize) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Player)> {
        self.players.iter().enumerate()
    }

    pub fn active(&self) -> impl Iterator<Item = (usize, &Player)> {
        self.iter().filter(|(_, p)| p.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Marks the slot as joined and respawns it.
    pub fn activate(&mut self, id: usize) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.presence = Presence::Active;
                player.respawn();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: usize) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                *player = Player::default();
                true
            }
            None => false,
        }
    }

    /// Nearest active player within `range` on the ground plane.
    pub fn nearest_active(&self, pos: Vec3, range: f32) -> Option<(usize, f32)> {
        self.active()
            .map(|(id, p)| {
                let dx = p.body.pos.x - pos.x;
                let dz = p.body.pos.z - pos.z;
                (id, dx * dx + dz * dz)
            })
            .filter(|&(_, d2)| d2 < range * range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Fixed-capacity slot array with `None` tombstones.
#[derive(Debug, Clone)]
pub struct SlotArena<T> {
    slots: Vec<Option<T>>,
}

impl<T> SlotArena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Fills the first free slot, or hands the value back when full.
    pub fn insert(&mut self, value: T) -> Result<usize, T> {
        match self.slots.iter().position(Option::is_none) {
            Some(id) => {
                self.slots[id] = Some(value);
                Ok(id)
            }
            None => Err(value),
        }
    }

    pub fn remove(&mut self, id: usize) -> Option<T> {
        self.slots.get_mut(id).and_then(Option::take)
    }

    pub fn get(&self, id: usize) -> Option<&T> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, s)| s.as_ref().map(|v| (id, v)))
    }

    pub fn ids(&self) -> Vec<usize> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bullet {
    pub pos: Vec3,
    pub vel: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub pos: Vec3,
    pub vel: Vec3,
    /// Seconds left.
    pub age: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_spawn_indexes_only_queried_states() {
        let mut zeds = ZedStore::with_capacity(8);
        let walker = zeds.spawn(ZedState::Wandering, Vec3::new(40.0, 0.0, 40.0), 0.0).unwrap();
        let medkit = zeds.spawn(ZedState::Health, Vec3::new(40.0, 0.0, 40.0), 0.0).unwrap();

        assert_eq!(zeds.iter_cell(2, 2).collect::<Vec<_>>(), vec![walker]);
        assert!(zeds.get(medkit).unwrap().indexed_cell().is_none());
        assert!(zeds.is_consistent());
        assert!(zeds.spawn(ZedState::None, Vec3::ZERO, 0.0).is_none());
    }

    #[test]
    fn test_spawn_fails_when_full() {
        let mut zeds = ZedStore::with_capacity(2);
        assert_eq!(zeds.spawn(ZedState::Ammo, Vec3::ZERO, 0.0), Some(0));
        assert_eq!(zeds.spawn(ZedState::Ammo, Vec3::ZERO, 0.0), Some(1));
        assert_eq!(zeds.spawn(ZedState::Ammo, Vec3::ZERO, 0.0), None);

        zeds.free(0);
        assert_eq!(zeds.spawn(ZedState::Wandering, Vec3::new(20.0, 0.0, 20.0), 0.0), Some(0));
        assert_eq!(zeds.count(), 2);
    }

    #[test]
    fn test_hit_kills_then_removes() {
        let mut zeds = ZedStore::with_capacity(4);
        let id = zeds.spawn(ZedState::Attacking, Vec3::new(100.0, 0.0, 100.0), 0.0).unwrap();

        assert_eq!(zeds.hit(id), HitOutcome::Killed);
        assert_eq!(zeds.get(id).unwrap().state, ZedState::Dead);
        assert_eq!(zeds.head(6, 6), Some(id));

        assert_eq!(zeds.hit(id), HitOutcome::Removed);
        assert!(zeds.get(id).is_none());
        assert_eq!(zeds.head(6, 6), None);
        assert_eq!(zeds.hit(id), HitOutcome::Ignored);
        assert!(zeds.is_consistent());
    }

    #[test]
    fn test_move_to_rebuckets() {
        let mut zeds = ZedStore::with_capacity(4);
        let id = zeds.spawn(ZedState::Wandering, Vec3::new(20.0, 0.0, 20.0), 0.0).unwrap();

        zeds.move_to(id, Vec3::new(36.0, 0.0, 20.0));
        assert_eq!(zeds.get(id).unwrap().indexed_cell(), Some((2, 1)));
        assert_eq!(zeds.head(1, 1), None);
        assert!(!zeds.rebucket(id));
        assert!(zeds.is_consistent());
    }

    #[test]
    fn test_random_zed_traffic_keeps_index_consistent() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut zeds = ZedStore::with_capacity(128);
        let states = [ZedState::Wandering, ZedState::Attacking, ZedState::Dead, ZedState::Health];

        for _ in 0..4000 {
            let id = rng.gen_range(0..128);
            let pos = Vec3::new(rng.gen_range(16.0..80.0), 0.0, rng.gen_range(16.0..80.0));
            match rng.gen_range(0..5) {
                0 => {
                    zeds.spawn(states[rng.gen_range(0..states.len())], pos, 0.0);
                }
                1 => zeds.free(id),
                2 => zeds.move_to(id, pos),
                3 => zeds.set_state(id, states[rng.gen_range(0..states.len())]),
                _ => {
                    zeds.hit(id);
                }
            }
        }

        assert!(zeds.is_consistent());
        for (id, zed) in zeds.iter() {
            if zed.state.is_indexed() {
                assert_eq!(zed.indexed_cell(), Some(zed.cell()), "zed {}", id);
            }
        }
    }

    #[test]
    fn test_corpse_box_lies_flat() {
        let mut zeds = ZedStore::with_capacity(1);
        let id = zeds.spawn(ZedState::Wandering, Vec3::new(50.0, 0.0, 50.0), 0.3).unwrap();
        assert_approx_eq!(zeds.get(id).unwrap().obb().top(), 2.8, 1e-5);

        zeds.hit(id);
        assert_approx_eq!(zeds.get(id).unwrap().obb().top(), 0.8, 1e-5);
    }

    #[test]
    fn test_player_store_guards_ids() {
        let mut players = PlayerStore::new();
        assert!(players.get(MAX_PLAYERS).is_none());
        assert!(players.get_mut(usize::MAX).is_none());
        assert!(!players.activate(MAX_PLAYERS));

        assert!(players.activate(3));
        let p = players.get(3).unwrap();
        assert!(p.is_active());
        assert_eq!(p.health, 100);
        assert_eq!(p.ammo, 30);
        assert_eq!(p.body.pos, SPAWN_POINT);
        assert_eq!(players.active_count(), 1);

        assert!(players.remove(3));
        assert_eq!(players.active_count(), 0);
    }

    #[test]
    fn test_nearest_active_player() {
        let mut players = PlayerStore::new();
        players.activate(0);
        players.activate(1);
        players.get_mut(1).unwrap().body.pos = Vec3::new(260.0, 0.0, 248.0);

        let near = players.nearest_active(Vec3::new(262.0, 0.0, 248.0), 32.0);
        assert_eq!(near.map(|(id, _)| id), Some(1));
        assert!(players.nearest_active(Vec3::new(400.0, 0.0, 400.0), 32.0).is_none());
    }

    #[test]
    fn test_player_aim_and_edges() {
        let mut player = Player::default();
        player.yaw = FRAC_PI_2;
        let aim = player.aim();
        assert_approx_eq!(aim.z, 1.0, 1e-6);
        assert_approx_eq!(aim.x, 0.0, 1e-6);

        player.keys = keys::USE;
        assert!(player.pressed(keys::USE));
        player.prev_keys = keys::USE;
        assert!(!player.pressed(keys::USE));
        assert!(player.is_down(keys::USE));
    }

    #[test]
    fn test_slot_arena() {
        let mut arena: SlotArena<u32> = SlotArena::with_capacity(2);
        assert!(arena.is_empty());
        assert_eq!(arena.insert(10), Ok(0));
        assert_eq!(arena.insert(11), Ok(1));
        assert_eq!(arena.insert(12), Err(12));

        assert_eq!(arena.remove(0), Some(10));
        assert_eq!(arena.remove(0), None);
        assert_eq!(arena.insert(13), Ok(0));
        assert_eq!(arena.ids(), vec![0, 1]);
        assert_eq!(arena.get(5), None);

        arena.clear();
        assert_eq!(arena.len(), 0);
    }
}
