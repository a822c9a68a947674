//! Procedural level: buildings, doorways, pickup caches and the initial
//! zed population.

use glam::Vec3;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::map::{DOOR_X, DOOR_Z, INSIDE};
use shared::{MapGrid, ZedState, ZedStore, CELL_SIZE, GRID_SIZE};
use std::f32::consts::TAU;

/// Row and column kept free of buildings; the spawn point sits on it.
const STREET: i32 = 15;
const BUILDING_PASSES: usize = 3;
const SECOND_DOOR_CHANCE: f64 = 0.20;
const CACHE_CHANCE: f64 = 0.125;
const HEALTH_CACHE_CHANCE: f64 = 0.25;
/// No zed starts closer than this (Manhattan, in cells) to the spawn cell.
const SPAWN_CLEARANCE: i32 = 3;

pub struct Level {
    pub map: MapGrid,
    pub zeds: ZedStore,
}

impl Level {
    pub fn generate(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut map = MapGrid::new();
        let mut zeds = ZedStore::new();

        place_buildings(&mut map, &mut rng);
        place_doors(&mut map, &mut rng);
        let caches = place_caches(&map, &mut zeds, &mut rng);
        let hostiles = place_zeds(&mut zeds, &mut rng);

        info!(
            "Generated level from seed {}: {} pickups, {} zeds",
            seed, caches, hostiles
        );
        Self { map, zeds }
    }
}

fn interior() -> impl Iterator<Item = (i32, i32)> {
    let last = GRID_SIZE as i32 - 1;
    (1..last).flat_map(move |iz| (1..last).map(move |ix| (ix, iz)))
}

fn place_buildings(map: &mut MapGrid, rng: &mut StdRng) {
    for _ in 0..BUILDING_PASSES {
        for (ix, iz) in interior() {
            if ix == STREET || iz == STREET || !rng.gen_bool(0.5) {
                continue;
            }
            let at = |dx: i32, dz: i32| map.is_inside(ix + dx, iz + dz);
            // Reject one-cell walls between buildings and diagonal-only touches.
            let sandwiched = (at(0, -1) && at(0, 1)) || (at(-1, 0) && at(1, 0));
            let diagonal = (at(-1, -1) && !at(0, -1) && !at(-1, 0))
                || (at(1, -1) && !at(0, -1) && !at(1, 0))
                || (at(-1, 1) && !at(0, 1) && !at(-1, 0))
                || (at(1, 1) && !at(0, 1) && !at(1, 0));
            if sandwiched || diagonal {
                continue;
            }
            map.insert_flags(ix, iz, INSIDE);
        }
    }
}

fn random_door(map: &mut MapGrid, rng: &mut StdRng, ix: i32, iz: i32) {
    match rng.gen_range(0..4) {
        0 => map.insert_flags(ix, iz, DOOR_X),
        1 => map.insert_flags(ix, iz, DOOR_Z),
        2 => map.insert_flags(ix - 1, iz, DOOR_X),
        _ => map.insert_flags(ix, iz - 1, DOOR_Z),
    }
}

fn place_doors(map: &mut MapGrid, rng: &mut StdRng) {
    for (ix, iz) in interior() {
        if !map.is_inside(ix, iz) {
            continue;
        }
        random_door(map, rng, ix, iz);
        if rng.gen_bool(SECOND_DOOR_CHANCE) {
            random_door(map, rng, ix, iz);
        }
    }
}

/// Small square clusters of health or ammo in some building cells.
fn place_caches(map: &MapGrid, zeds: &mut ZedStore, rng: &mut StdRng) -> usize {
    let mut placed = 0;
    for (ix, iz) in interior() {
        if !map.is_inside(ix, iz) || !rng.gen_bool(CACHE_CHANCE) {
            continue;
        }
        let kind = if rng.gen_bool(HEALTH_CACHE_CHANCE) {
            ZedState::Health
        } else {
            ZedState::Ammo
        };
        let size = rng.gen_range(0..=2) + rng.gen_range(0..=2);
        let half = CELL_SIZE * 0.5 - size as f32 * 0.5;
        let (x0, z0) = (ix as f32 * CELL_SIZE + half, iz as f32 * CELL_SIZE + half);
        for jz in 0..size {
            for jx in 0..size {
                let pos = Vec3::new(x0 + jx as f32, 0.0, z0 + jz as f32);
                if zeds.spawn(kind, pos, 0.0).is_some() {
                    placed += 1;
                }
            }
        }
    }
    placed
}

/// One wanderer at the centre of every cell away from the spawn.
fn place_zeds(zeds: &mut ZedStore, rng: &mut StdRng) -> usize {
    let mut placed = 0;
    for (ix, iz) in interior() {
        if (ix - STREET).abs() + (iz - STREET).abs() < SPAWN_CLEARANCE {
            continue;
        }
        let pos = Vec3::new(
            ix as f32 * CELL_SIZE + CELL_SIZE * 0.5,
            0.0,
            iz as f32 * CELL_SIZE + CELL_SIZE * 0.5,
        );
        if zeds.spawn(ZedState::Wandering, pos, rng.gen_range(0.0..TAU)).is_some() {
            placed += 1;
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::map::cell_of;
    use shared::SPAWN_POINT;

    #[test]
    fn test_generation_is_deterministic() {
        let a = Level::generate(42);
        let b = Level::generate(42);
        assert_eq!(a.map, b.map);
        assert_eq!(a.zeds.count(), b.zeds.count());
    }

    #[test]
    fn test_border_and_street_stay_open() {
        let level = Level::generate(7);
        let last = GRID_SIZE as i32 - 1;
        for i in 0..GRID_SIZE as i32 {
            assert!(!level.map.is_inside(i, 0));
            assert!(!level.map.is_inside(i, last));
            assert!(!level.map.is_inside(0, i));
            assert!(!level.map.is_inside(last, i));
            assert!(!level.map.is_inside(STREET, i));
            assert!(!level.map.is_inside(i, STREET));
        }
    }

    #[test]
    fn test_every_building_has_a_door() {
        let level = Level::generate(3);
        for (ix, iz) in interior() {
            if level.map.is_inside(ix, iz) {
                let doors = level.map.has_door_x(ix, iz)
                    || level.map.has_door_z(ix, iz)
                    || level.map.has_door_x(ix - 1, iz)
                    || level.map.has_door_z(ix, iz - 1);
                assert!(doors, "cell ({}, {}) has no door", ix, iz);
            }
        }
    }

    #[test]
    fn test_no_zeds_near_spawn() {
        let level = Level::generate(11);
        let spawn = (cell_of(SPAWN_POINT.x), cell_of(SPAWN_POINT.z));
        for (_, zed) in level.zeds.iter() {
            if zed.state == ZedState::Wandering {
                let (ix, iz) = zed.cell();
                assert!((ix - spawn.0).abs() + (iz - spawn.1).abs() >= SPAWN_CLEARANCE);
            }
        }
        assert!(level.zeds.is_consistent());
    }

    #[test]
    fn test_zed_population() {
        let level = Level::generate(5);
        let wanderers = level
            .zeds
            .iter()
            .filter(|(_, z)| z.state == ZedState::Wandering)
            .count();
        // 30x30 interior cells minus the 13 within clearance of the spawn.
        assert_eq!(wanderers, 30 * 30 - 13);
    }
}
