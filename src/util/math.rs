//! Scalar and vector helpers shared by the simulation

use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

/// Frame-rate independent blend factor for an exponential approach at `rate` per second
pub fn exp_blend(rate: f32, dt: f32) -> f32 {
    1.0 - (-rate * dt).exp()
}

/// Exponential decay multiplier for `rate` per second
pub fn exp_decay(rate: f32, dt: f32) -> f32 {
    (-rate * dt).exp()
}

/// Signed smallest angle from `from` to `to`, in (-PI, PI]
pub fn shortest_angle(from: f32, to: f32) -> f32 {
    let mut delta = (to - from).rem_euclid(TAU);
    if delta > PI {
        delta -= TAU;
    }
    delta
}

/// Wrap an angle into (-PI, PI]
pub fn wrap_angle(angle: f32) -> f32 {
    shortest_angle(0.0, angle)
}

/// View direction for a yaw/pitch pair. Yaw 0 looks down -Z, positive pitch looks up.
pub fn view_direction(yaw: f32, pitch: f32) -> Vec3 {
    let (sy, cy) = yaw.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    Vec3::new(-sy * cp, sp, -cy * cp)
}

/// Horizontal forward/right basis for a yaw
pub fn yaw_basis(yaw: f32) -> (Vec3, Vec3) {
    let (sy, cy) = yaw.sin_cos();
    (Vec3::new(-sy, 0.0, -cy), Vec3::new(cy, 0.0, -sy))
}

/// Yaw that faces along `dir` (inverse of [`yaw_basis`] forward)
pub fn yaw_towards(dir: Vec3) -> f32 {
    (-dir.x).atan2(-dir.z)
}

pub fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

pub fn to_xz(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Move `current` toward `target` by at most `max_step`
pub fn move_towards(current: Vec3, target: Vec3, max_step: f32) -> Vec3 {
    let delta = target - current;
    let dist = delta.length();
    if dist <= max_step || dist <= f32::EPSILON {
        target
    } else {
        current + delta / dist * max_step
    }
}
