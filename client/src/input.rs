//! Input ingestion: key bits plus look deltas become the per-tick
//! `InputState` sent to the server and fed to local prediction

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::keys;
use shared::protocol::{quantize_pitch, quantize_yaw};
use shared::InputState;
use std::f32::consts::{PI, TAU};

/// Pitch stops just short of straight up or down
pub const PITCH_LIMIT: f32 = 0.49 * PI;

/// Accumulates look direction and held keys for the local player
#[derive(Debug, Clone, Default)]
pub struct InputManager {
    keys: u8,
    yaw: f32,
    pitch: f32,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the held-key bitmask
    pub fn set_keys(&mut self, keys: u8) {
        self.keys = keys;
    }

    pub fn press(&mut self, key: u8) {
        self.keys |= key;
    }

    pub fn release(&mut self, key: u8) {
        self.keys &= !key;
    }

    /// Applies a look delta in radians. Yaw wraps, pitch clamps.
    pub fn look(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw = (self.yaw + d_yaw).rem_euclid(TAU);
        self.pitch = (self.pitch + d_pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// This tick's input in wire form
    pub fn sample(&self) -> InputState {
        InputState {
            keys: self.keys,
            aim_yaw: quantize_yaw(self.yaw),
            aim_pitch: quantize_pitch(self.pitch),
        }
    }
}

/// Headless driver used when no renderer feeds the input manager
///
/// Walks forward, turns every so often and sprinkles in jumps and shots.
pub struct Autopilot {
    rng: StdRng,
    turn_in: f32,
    turn_rate: f32,
}

impl Autopilot {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            turn_in: 0.0,
            turn_rate: 0.0,
        }
    }

    pub fn drive(&mut self, input: &mut InputManager, dt: f32) {
        self.turn_in -= dt;
        if self.turn_in <= 0.0 {
            self.turn_in = self.rng.gen_range(1.0..3.0);
            self.turn_rate = self.rng.gen_range(-1.5..1.5);
        }
        input.look(self.turn_rate * dt, -input.pitch() * dt.min(1.0));

        let mut held = keys::FORWARD;
        if self.rng.gen_bool(0.02) {
            held |= keys::JUMP;
        }
        if self.rng.gen_bool(0.05) {
            held |= keys::FIRE;
        }
        if self.rng.gen_bool(0.1) {
            held |= keys::USE;
        }
        input.set_keys(held);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::protocol::{dequantize_pitch, dequantize_yaw};

    #[test]
    fn test_yaw_wraps() {
        let mut input = InputManager::new();
        input.look(-0.5, 0.0);
        assert_approx_eq!(input.yaw(), TAU - 0.5, 1e-5);

        input.look(1.0, 0.0);
        assert_approx_eq!(input.yaw(), 0.5, 1e-5);
    }

    #[test]
    fn test_pitch_clamps() {
        let mut input = InputManager::new();
        input.look(0.0, 10.0);
        assert_approx_eq!(input.pitch(), PITCH_LIMIT, 1e-6);
        input.look(0.0, -20.0);
        assert_approx_eq!(input.pitch(), -PITCH_LIMIT, 1e-6);
    }

    #[test]
    fn test_sample_quantizes() {
        let mut input = InputManager::new();
        input.press(keys::FORWARD);
        input.press(keys::FIRE);
        input.release(keys::FIRE);
        input.look(1.0, 0.25);

        let state = input.sample();
        assert_eq!(state.keys, keys::FORWARD);
        assert_approx_eq!(dequantize_yaw(state.aim_yaw), 1.0, 1e-3);
        assert_approx_eq!(dequantize_pitch(state.aim_pitch), 0.25, 1e-3);
    }

    #[test]
    fn test_autopilot_walks() {
        let mut input = InputManager::new();
        let mut autopilot = Autopilot::new(7);
        for _ in 0..100 {
            autopilot.drive(&mut input, 1.0 / 60.0);
            assert!(input.sample().is_down(keys::FORWARD));
            assert!(input.pitch().abs() <= PITCH_LIMIT);
        }
    }
}
