//! One world and the per-tick step that advances it.
//!
//! The server runs this authoritatively. The client runs the same step
//! over its downloaded map, and player updates from the server overwrite
//! whatever the local step produced.

use crate::collision::{resolve_character, sweep_bullet, Contact, Mover, Sweep};
use crate::entities::{Body, Bullet, HitOutcome, Particle, PlayerStore, SlotArena, ZedState, ZedStore};
use crate::keys;
use crate::map::MapGrid;
use crate::protocol::{dequantize_pitch, dequantize_yaw, PlayerUpdate};
use crate::{
    AMMO_PICKUP, BULLET_SPEED, EYE_HEIGHT, GRAVITY, HEALTH_PICKUP, JUMP_VELOCITY, MAX_AMMO,
    MAX_BULLETS, MAX_HEALTH, MAX_PARTICLES, MAX_PLAYERS, MAX_TIMESTEP, PLAYER_RADIUS, SHOOT_DELAY,
    WALK_SPEED, ZED_DAMAGE, ZED_RADIUS, ZED_RANGE, ZED_SPEED,
};
use glam::{Vec2, Vec3};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Planar distance at which a zed touches a player.
const TOUCH_DISTANCE: f32 = PLAYER_RADIUS + ZED_RADIUS;
/// Planar distance within which USE grabs a pickup.
const PICKUP_DISTANCE: f32 = 1.6;
const PICKUP_SPIN: f32 = 3.0;
const MUZZLE_OFFSET: f32 = 0.75;
const MUZZLE_DROP: f32 = 0.3;
const BULLET_LIFT: f32 = 0.15 * GRAVITY;
const TRAIL_SPACING: f32 = 1.0;
const TRAIL_LIFETIME: f32 = 0.4;
const IMPACT_LIFETIME: f32 = 0.6;
const GORE_PARTICLES: usize = 12;
const GORE_LIFETIME: f32 = 1.2;

pub struct World {
    pub map: MapGrid,
    pub zeds: ZedStore,
    pub players: PlayerStore,
    pub bullets: SlotArena<Bullet>,
    pub particles: SlotArena<Particle>,
    pub tick: u64,
    rng: StdRng,
}

impl World {
    pub fn new(map: MapGrid, seed: u64) -> Self {
        Self {
            map,
            zeds: ZedStore::new(),
            players: PlayerStore::new(),
            bullets: SlotArena::with_capacity(MAX_BULLETS),
            particles: SlotArena::with_capacity(MAX_PARTICLES),
            tick: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Advances everything by `dt` seconds, clamped to the max timestep.
    pub fn step(&mut self, dt: f32) {
        let dt = dt.clamp(0.0, MAX_TIMESTEP);
        self.tick += 1;

        for id in 0..MAX_PLAYERS {
            self.update_player(id, dt);
        }
        self.update_zeds(dt);
        self.update_bullets(dt);
        self.update_particles(dt);
    }

    /// Joins a player slot at the spawn point with full stats.
    pub fn spawn_player(&mut self, id: usize) -> bool {
        self.players.activate(id)
    }

    /// Frees the slot and stops every zed chasing it.
    pub fn remove_player(&mut self, id: usize) {
        if !self.players.remove(id) {
            return;
        }
        let chasing: Vec<usize> = self
            .zeds
            .iter()
            .filter(|(_, z)| z.target == Some(id))
            .map(|(zid, _)| zid)
            .collect();
        for &zid in &chasing {
            self.zeds.set_state(zid, ZedState::Wandering);
        }
        debug!("Removed player {} ({} zeds released)", id, chasing.len());
    }

    /// Input for one player: key bits and quantized look angles.
    pub fn set_input(&mut self, id: usize, keys: u8, aim_yaw: u16, aim_pitch: u16) {
        if let Some(player) = self.players.get_mut(id) {
            if player.is_active() {
                player.keys = keys;
                player.yaw = dequantize_yaw(aim_yaw);
                player.pitch = dequantize_pitch(aim_pitch);
            }
        }
    }

    pub fn player_update(&self, id: usize) -> Option<PlayerUpdate> {
        let player = self.players.get(id).filter(|p| p.is_active())?;
        Some(PlayerUpdate::from_player(id as u8, player))
    }

    /// Replaces a player's state with the server's copy.
    pub fn apply_player_update(&mut self, update: &PlayerUpdate) -> bool {
        match self.players.get_mut(update.player_id as usize) {
            Some(player) => {
                update.apply_to(player);
                true
            }
            None => false,
        }
    }

    fn update_player(&mut self, id: usize, dt: f32) {
        let Some(player) = self.players.get_mut(id) else {
            return;
        };
        if !player.is_active() {
            return;
        }

        let forward = axis(player.keys, keys::FORWARD, keys::BACK);
        let strafe = axis(player.keys, keys::RIGHT, keys::LEFT);
        let (sin, cos) = player.yaw.sin_cos();
        let wish = Vec2::new(forward * cos - strafe * sin, strafe * cos + forward * sin).normalize_or_zero();

        let mut body = player.body;
        body.vel.x = wish.x * WALK_SPEED;
        body.vel.z = wish.y * WALK_SPEED;
        if player.is_down(keys::JUMP) && body.grounded {
            body.vel.y = JUMP_VELOCITY;
        }
        integrate(&mut body, dt);
        player.shoot_delay = (player.shoot_delay - dt).max(0.0);

        resolve_character(&self.map, &mut self.zeds, Mover::Player(id), &mut body, PLAYER_RADIUS);

        let Some(player) = self.players.get_mut(id) else {
            return;
        };
        player.body = body;
        let wants_pickup = player.pressed(keys::USE);
        let wants_fire = player.is_down(keys::FIRE) && player.ammo > 0 && player.shoot_delay <= 0.0;
        player.prev_keys = player.keys;

        if wants_pickup {
            self.try_pickup(id);
        }
        if wants_fire {
            self.fire(id);
        }
    }

    /// Grabs the first pickup within reach that the player has room for.
    /// The pickup is removed, so a second call finds nothing.
    pub fn try_pickup(&mut self, id: usize) -> bool {
        let Some(player) = self.players.get(id).filter(|p| p.is_active()) else {
            return false;
        };
        let pos = player.body.pos;
        let (health, ammo) = (player.health, player.ammo);

        let found = self.zeds.iter().find_map(|(zid, zed)| {
            let useful = match zed.state {
                ZedState::Health => health < MAX_HEALTH,
                ZedState::Ammo => ammo < MAX_AMMO,
                _ => false,
            };
            let dx = zed.body.pos.x - pos.x;
            let dz = zed.body.pos.z - pos.z;
            (useful && dx * dx + dz * dz < PICKUP_DISTANCE * PICKUP_DISTANCE).then_some((zid, zed.state))
        });
        let Some((zid, kind)) = found else {
            return false;
        };

        let Some(player) = self.players.get_mut(id) else {
            return false;
        };
        match kind {
            ZedState::Health => player.health = capped_add(player.health, HEALTH_PICKUP, MAX_HEALTH),
            _ => player.ammo = capped_add(player.ammo, AMMO_PICKUP, MAX_AMMO),
        }
        self.zeds.free(zid);
        debug!("Player {} picked up {:?} from zed {}", id, kind, zid);
        true
    }

    fn fire(&mut self, id: usize) {
        let Some(player) = self.players.get_mut(id) else {
            return;
        };
        player.ammo -= 1;
        player.shoot_delay = SHOOT_DELAY;

        let aim = player.aim();
        let pos = player.body.pos + Vec3::Y * (EYE_HEIGHT - MUZZLE_DROP) + aim * MUZZLE_OFFSET;
        let vel = aim * BULLET_SPEED + Vec3::Y * BULLET_LIFT;
        if self.bullets.insert(Bullet { pos, vel }).is_err() {
            trace!("Bullet store full, shot from player {} dropped", id);
        }
    }

    fn update_bullets(&mut self, dt: f32) {
        for id in self.bullets.ids() {
            let Some(bullet) = self.bullets.get_mut(id) else {
                continue;
            };
            bullet.vel.y -= GRAVITY * dt;
            let origin = bullet.pos;
            let delta = bullet.vel * dt;

            match sweep_bullet(&self.map, &self.zeds, origin, delta) {
                Sweep::Clear => {
                    bullet.pos = origin + delta;
                    self.emit_trail(origin, delta);
                }
                Sweep::Wall => {
                    self.bullets.remove(id);
                    self.emit(origin, Vec3::ZERO, IMPACT_LIFETIME);
                }
                Sweep::Zed(zid) => {
                    self.bullets.remove(id);
                    let at = self.zeds.get(zid).map(|z| z.body.pos + Vec3::Y);
                    match (self.zeds.hit(zid), at) {
                        (HitOutcome::Killed, Some(at)) => self.emit(at, Vec3::ZERO, IMPACT_LIFETIME),
                        (HitOutcome::Removed, Some(at)) => self.emit_gore(at),
                        _ => {}
                    }
                }
            }
        }
    }

    fn emit_trail(&mut self, origin: Vec3, delta: Vec3) {
        let length = delta.length();
        if length <= 0.0 {
            return;
        }
        let dir = delta / length;
        let mut travelled = 0.0;
        while travelled < length {
            self.emit(origin + dir * travelled, Vec3::ZERO, TRAIL_LIFETIME);
            travelled += TRAIL_SPACING;
        }
    }

    fn emit_gore(&mut self, at: Vec3) {
        for _ in 0..GORE_PARTICLES {
            let vel = Vec3::new(
                self.rng.gen_range(-4.0..4.0),
                self.rng.gen_range(2.0..8.0),
                self.rng.gen_range(-4.0..4.0),
            );
            self.emit(at, vel, GORE_LIFETIME);
        }
    }

    fn emit(&mut self, pos: Vec3, vel: Vec3, age: f32) {
        // Cosmetic; dropped silently when the store is full.
        let _ = self.particles.insert(Particle { pos, vel, age });
    }

    fn update_particles(&mut self, dt: f32) {
        for id in self.particles.ids() {
            let expired = match self.particles.get_mut(id) {
                Some(p) => {
                    p.age -= dt;
                    if p.vel != Vec3::ZERO {
                        p.vel.y -= GRAVITY * dt;
                        p.pos += p.vel * dt;
                        if p.pos.y < 0.0 {
                            p.pos.y = 0.0;
                            p.vel = Vec3::ZERO;
                        }
                    }
                    p.age <= 0.0
                }
                None => false,
            };
            if expired {
                self.particles.remove(id);
            }
        }
    }

    fn update_zeds(&mut self, dt: f32) {
        for id in self.zeds.ids() {
            let Some((state, yaw, mut body)) = self.zeds.get(id).map(|z| (z.state, z.yaw, z.body)) else {
                continue;
            };
            match state {
                ZedState::Wandering => self.update_wandering(id, dt),
                ZedState::Attacking => self.update_attacking(id, dt),
                ZedState::Health | ZedState::Ammo => {
                    self.zeds.set_yaw(id, (yaw + PICKUP_SPIN * dt).rem_euclid(TAU));
                }
                ZedState::Dead => {
                    // Corpses of zeds shot mid-jump fall to the ground.
                    if body.pos.y > 0.0 {
                        integrate(&mut body, dt);
                        self.zeds.set_body(id, body);
                    }
                }
                ZedState::None => {}
            }
        }
    }

    /// Moves a zed along its heading and resolves it.
    fn walk_zed(&mut self, id: usize, dt: f32) -> Option<(Contact, Body)> {
        let zed = self.zeds.get(id)?;
        let heading = zed.heading();
        let mut body = zed.body;
        body.vel.x = heading.x * ZED_SPEED;
        body.vel.z = heading.z * ZED_SPEED;
        integrate(&mut body, dt);
        let contact = resolve_character(&self.map, &mut self.zeds, Mover::Zed(id), &mut body, ZED_RADIUS);
        Some((contact, body))
    }

    fn update_wandering(&mut self, id: usize, dt: f32) {
        let Some((contact, body)) = self.walk_zed(id, dt) else {
            return;
        };

        match contact {
            Contact::Wall | Contact::Agent => match self.players.nearest_active(body.pos, ZED_RANGE) {
                Some((target, _)) => {
                    self.zeds.attack(id, target);
                    self.face_player(id, target);
                }
                None => self.turn_randomly(id),
            },
            Contact::BlockSide => {
                if body.grounded {
                    let mut body = body;
                    body.vel.y = JUMP_VELOCITY;
                    body.grounded = false;
                    self.zeds.set_body(id, body);
                }
            }
            Contact::None => {
                if let Some((pid, d2)) = self.players.nearest_active(body.pos, TOUCH_DISTANCE) {
                    let Some(player_pos) = self.players.get(pid).map(|p| p.body.pos) else {
                        return;
                    };
                    let away = Vec3::new(body.pos.x - player_pos.x, 0.0, body.pos.z - player_pos.z);
                    let push = away.normalize_or_zero() * (TOUCH_DISTANCE - d2.sqrt());
                    self.zeds.move_to(id, body.pos + push);
                    self.turn_randomly(id);
                }
            }
        }
    }

    fn update_attacking(&mut self, id: usize, dt: f32) {
        let target = self.zeds.get(id).and_then(|z| z.target);
        let Some(target) = target.filter(|&t| self.players.get(t).is_some_and(|p| p.is_active())) else {
            self.zeds.set_state(id, ZedState::Wandering);
            self.turn_randomly(id);
            return;
        };

        self.face_player(id, target);
        let Some((contact, body)) = self.walk_zed(id, dt) else {
            return;
        };

        let Some(player) = self.players.get_mut(target) else {
            return;
        };
        let dx = player.body.pos.x - body.pos.x;
        let dz = player.body.pos.z - body.pos.z;
        if dx * dx + dz * dz < TOUCH_DISTANCE * TOUCH_DISTANCE {
            player.health = player.health.saturating_sub(ZED_DAMAGE);
            if player.health < 0 {
                debug!("Player {} killed by zed {}", target, id);
                player.respawn();
            }
            self.zeds.set_state(id, ZedState::Wandering);
            self.turn_randomly(id);
        } else if matches!(contact, Contact::Wall | Contact::BlockSide) {
            self.zeds.set_state(id, ZedState::Wandering);
            self.turn_randomly(id);
        }
    }

    fn face_player(&mut self, id: usize, player: usize) {
        let (Some(zed), Some(player)) = (self.zeds.get(id), self.players.get(player)) else {
            return;
        };
        let to = player.body.pos - zed.body.pos;
        self.zeds.set_yaw(id, to.z.atan2(to.x));
    }

    fn turn_randomly(&mut self, id: usize) {
        let yaw = self.rng.gen_range(0.0..TAU);
        self.zeds.set_yaw(id, yaw);
    }
}

fn axis(keys: u8, positive: u8, negative: u8) -> f32 {
    let mut v = 0.0;
    if keys & positive != 0 {
        v += 1.0;
    }
    if keys & negative != 0 {
        v -= 1.0;
    }
    v
}

/// Gravity and motion for one tick, with the ground at y = 0.
fn integrate(body: &mut Body, dt: f32) {
    body.vel.y -= GRAVITY * dt;
    body.pos += body.vel * dt;
    body.grounded = false;
    if body.pos.y <= 0.0 {
        body.pos.y = 0.0;
        body.vel.y = 0.0;
        body.grounded = true;
    }
}

fn capped_add(value: i8, amount: i8, cap: i8) -> i8 {
    (value as i16 + amount as i16).min(cap as i16) as i8
}
