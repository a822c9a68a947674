//! Character resolution against zeds, corpses and cell walls, and bullet
//! sweeps against walls and zed boxes.
//!
//! Both queries only look at a 2x2 block of cells: the actor's own cell
//! plus the neighbours on the side of each axis the actor is closer to.
//! Something hugging the far corner of a diagonal neighbour can be missed;
//! that is accepted in exchange for touching four lists instead of nine.

use crate::entities::{Body, ZedState, ZedStore};
use crate::map::{cell_of, MapGrid};
use crate::shapes::{circle_separation, in_door_gap, wall_correction, Obb};
use crate::{
    CEILING_HEIGHT, CELL_SIZE, CHARACTER_HEIGHT, DOOR_HEIGHT, LANDING_BAND, WORLD_HEIGHT,
    WORLD_SIZE, ZED_RADIUS,
};
use glam::Vec3;

/// Worst thing that happened to a character this call, ordered by
/// severity so outcomes combine with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Contact {
    #[default]
    None,
    Wall,
    BlockSide,
    Agent,
}

/// Who is being resolved. Zeds skip themselves and are rebucketed after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mover {
    Player(usize),
    Zed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    Clear,
    Wall,
    Zed(usize),
}

/// Bisection stops once a piece is this short or this deep.
const MIN_SPLIT_LENGTH: f32 = 1e-3;
const MAX_SPLIT_DEPTH: u32 = 24;

/// The actor's cell and its three nearest neighbours.
pub fn neighbourhood(pos: Vec3) -> [(i32, i32); 4] {
    let ix = cell_of(pos.x);
    let iz = cell_of(pos.z);
    let half = CELL_SIZE * 0.5;
    let jx = if pos.x - ix as f32 * CELL_SIZE < half { ix - 1 } else { ix + 1 };
    let jz = if pos.z - iz as f32 * CELL_SIZE < half { iz - 1 } else { iz + 1 };
    [(ix, iz), (jx, iz), (ix, jz), (jx, jz)]
}

/// Resolves one character against world bounds, nearby zeds and the walls
/// of its cell, mutating `body` in place.
///
/// Living zeds are pushed apart from the character, each taking half the
/// penetration. Corpses are solid boxes whose top can be stood on when the
/// feet arrive within the landing band while not moving upward. For a
/// [`Mover::Zed`] the final body is written back and the zed rebucketed.
pub fn resolve_character(
    map: &MapGrid,
    zeds: &mut ZedStore,
    mover: Mover,
    body: &mut Body,
    radius: f32,
) -> Contact {
    let mut contact = Contact::None;

    let lo = CELL_SIZE + radius;
    let hi = WORLD_SIZE - CELL_SIZE - radius;
    let clamped_x = body.pos.x.clamp(lo, hi);
    let clamped_z = body.pos.z.clamp(lo, hi);
    if clamped_x != body.pos.x || clamped_z != body.pos.z {
        body.pos.x = clamped_x;
        body.pos.z = clamped_z;
        contact = Contact::Wall;
    }

    let own_id = match mover {
        Mover::Zed(id) => Some(id),
        Mover::Player(_) => None,
    };

    for (cx, cz) in neighbourhood(body.pos) {
        let mut cursor = zeds.head(cx, cz);
        while let Some(id) = cursor {
            // Read the link first; pushing a zed may move it to another list.
            cursor = zeds.next_in_cell(id);
            if Some(id) == own_id {
                continue;
            }
            let Some(zed) = zeds.get(id) else {
                continue;
            };

            let state = zed.state;
            match state {
                ZedState::Wandering | ZedState::Attacking => {
                    if (zed.body.pos.y - body.pos.y).abs() >= CHARACTER_HEIGHT {
                        continue;
                    }
                    let other = zed.body.pos;
                    if let Some((normal, depth)) = circle_separation(body.pos, other, radius + ZED_RADIUS) {
                        let push = normal * (depth * 0.5);
                        body.pos += push;
                        zeds.move_to(id, other - push);
                        contact = contact.max(Contact::Agent);
                    }
                }
                ZedState::Dead => {
                    if let Some(side) = resolve_corpse(&zed.obb(), body, radius) {
                        contact = contact.max(side);
                    }
                }
                _ => {}
            }
        }
    }

    let push = wall_correction(map, body.pos, radius);
    if push != Vec3::ZERO {
        body.pos += push;
        contact = contact.max(Contact::Wall);
    }

    if let Mover::Zed(id) = mover {
        zeds.set_body(id, *body);
    }

    contact
}

/// Character against one corpse box. `Some(BlockSide)` when pushed off a
/// side, `Some(None)` when landed on top, `None` without contact.
fn resolve_corpse(corpse: &Obb, body: &mut Body, radius: f32) -> Option<Contact> {
    let half_height = CHARACTER_HEIGHT * 0.5;
    let me = Obb::axis_aligned(
        body.pos + Vec3::Y * half_height,
        Vec3::new(radius, half_height, radius),
    );
    if !me.intersects_obb(corpse) {
        return None;
    }

    let top = corpse.top();
    if body.pos.y <= top && body.pos.y >= top - LANDING_BAND && body.vel.y <= 0.0 {
        body.pos.y = top;
        body.vel.y = 0.0;
        body.grounded = true;
        return Some(Contact::None);
    }

    // Out along the shallower horizontal axis of the corpse's footprint,
    // grown by the character radius.
    let local = corpse.to_local(body.pos);
    let depth_x = corpse.half_extents.x + radius - local.x.abs();
    let depth_z = corpse.half_extents.z + radius - local.z.abs();
    if depth_x <= 0.0 || depth_z <= 0.0 {
        return None;
    }
    let local_push = if depth_x < depth_z {
        Vec3::new(depth_x * local.x.signum(), 0.0, 0.0)
    } else {
        Vec3::new(0.0, 0.0, depth_z * local.z.signum())
    };
    let mut push = corpse.basis * local_push;
    push.y = 0.0;
    body.pos += push;
    Some(Contact::BlockSide)
}

fn outside_world(p: Vec3) -> bool {
    p.x < CELL_SIZE
        || p.x > WORLD_SIZE - CELL_SIZE
        || p.z < CELL_SIZE
        || p.z > WORLD_SIZE - CELL_SIZE
        || p.y < 0.0
        || p.y > WORLD_HEIGHT
}

/// Sweeps one tick of bullet travel from `origin` by `delta`.
///
/// A segment that leaves the world is swept up to the boundary first, so a
/// zed or wall struck on the way out still counts; otherwise it is `Wall`.
pub fn sweep_bullet(map: &MapGrid, zeds: &ZedStore, origin: Vec3, delta: Vec3) -> Sweep {
    if outside_world(origin) {
        return Sweep::Wall;
    }
    if !outside_world(origin + delta) {
        return sweep_segment(map, zeds, origin, delta, 0);
    }
    match sweep_segment(map, zeds, origin, clip_to_world(origin, delta), 0) {
        Sweep::Clear => Sweep::Wall,
        hit => hit,
    }
}

/// Shortens `delta` so that `origin + delta` lies on the world boundary.
/// `origin` must be inside.
fn clip_to_world(origin: Vec3, delta: Vec3) -> Vec3 {
    let low = Vec3::new(CELL_SIZE, 0.0, CELL_SIZE);
    let high = Vec3::new(WORLD_SIZE - CELL_SIZE, WORLD_HEIGHT, WORLD_SIZE - CELL_SIZE);
    let end = origin + delta;

    let mut t = 1.0f32;
    for axis in 0..3 {
        if end[axis] < low[axis] {
            t = t.min((low[axis] - origin[axis]) / delta[axis]);
        } else if end[axis] > high[axis] {
            t = t.min((high[axis] - origin[axis]) / delta[axis]);
        }
    }
    (delta * t.max(0.0)).clamp(low - origin, high - origin)
}

fn sweep_segment(map: &MapGrid, zeds: &ZedStore, origin: Vec3, delta: Vec3, depth: u32) -> Sweep {
    let end = origin + delta;

    let from = (cell_of(origin.x), cell_of(origin.z));
    let to = (cell_of(end.x), cell_of(end.z));
    let crossings = (to.0 - from.0).abs() + (to.1 - from.1).abs();

    if crossings > 1 {
        if depth < MAX_SPLIT_DEPTH && delta.length_squared() > MIN_SPLIT_LENGTH * MIN_SPLIT_LENGTH {
            let half = delta * 0.5;
            return match sweep_segment(map, zeds, origin, half, depth + 1) {
                Sweep::Clear => sweep_segment(map, zeds, origin + half, half, depth + 1),
                hit => hit,
            };
        }
        // Threading a cell corner exactly; any building there stops it.
        if map.is_inside(from.0, from.1) || map.is_inside(to.0, to.1) {
            return Sweep::Wall;
        }
    } else if crossings == 1 && crossing_blocks(map, origin, end, from, to) {
        return Sweep::Wall;
    }

    for (cx, cz) in neighbourhood(end) {
        for id in zeds.iter_cell(cx, cz) {
            if let Some(zed) = zeds.get(id) {
                if zed.obb().intersects_segment(origin, delta) {
                    return Sweep::Zed(id);
                }
            }
        }
    }
    Sweep::Clear
}

/// A segment stepping between two edge-adjacent cells: is the shared face
/// solid where it is crossed?
fn crossing_blocks(map: &MapGrid, origin: Vec3, end: Vec3, from: (i32, i32), to: (i32, i32)) -> bool {
    if !map.is_inside(from.0, from.1) && !map.is_inside(to.0, to.1) {
        return false;
    }

    let (hit, transverse, door) = if from.0 != to.0 {
        let low = from.0.min(to.0);
        let plane = (low + 1) as f32 * CELL_SIZE;
        let hit = origin.lerp(end, (plane - origin.x) / (end.x - origin.x));
        (hit, hit.z - from.1 as f32 * CELL_SIZE, map.has_door_x(low, from.1))
    } else {
        let low = from.1.min(to.1);
        let plane = (low + 1) as f32 * CELL_SIZE;
        let hit = origin.lerp(end, (plane - origin.z) / (end.z - origin.z));
        (hit, hit.x - from.0 as f32 * CELL_SIZE, map.has_door_z(from.0, low))
    };

    if door && hit.y < DOOR_HEIGHT && in_door_gap(transverse) {
        return false;
    }
    hit.y <= CEILING_HEIGHT
}
