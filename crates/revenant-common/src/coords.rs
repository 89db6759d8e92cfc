//! Coordinate and angle helpers.
//!
//! World space is Z-up, as in the legacy engine: `x`/`y` span the ground
//! plane and yaw is measured in degrees counter-clockwise from `+x`.

use glam::{Vec2, Vec3};

/// Distance between two points projected onto the ground plane.
#[must_use]
pub fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    flat(b - a).length()
}

/// Drops the vertical component of a vector.
#[must_use]
pub fn flat(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.y)
}

/// Wraps an angle in degrees into `[0, 360)`.
#[must_use]
pub fn angle_mod(degrees: f32) -> f32 {
    degrees.rem_euclid(360.0)
}

/// Yaw in degrees of a direction vector. Zero-length vectors give 0.
#[must_use]
pub fn vec_to_yaw(v: Vec3) -> f32 {
    if v.x == 0.0 && v.y == 0.0 {
        return 0.0;
    }
    angle_mod(v.y.atan2(v.x).to_degrees())
}

/// Unit forward vector on the ground plane for a yaw in degrees.
#[must_use]
pub fn yaw_forward(yaw: f32) -> Vec3 {
    let r = yaw.to_radians();
    Vec3::new(r.cos(), r.sin(), 0.0)
}

/// Signed shortest rotation from `current` to `ideal`, in `(-180, 180]`.
#[must_use]
pub fn yaw_delta(current: f32, ideal: f32) -> f32 {
    let mut delta = angle_mod(ideal) - angle_mod(current);
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta <= -180.0 {
        delta += 360.0;
    }
    delta
}

/// Turns `current` toward `ideal` by at most `speed` degrees.
#[must_use]
pub fn change_yaw(current: f32, ideal: f32, speed: f32) -> f32 {
    let delta = yaw_delta(current, ideal);
    if delta.abs() <= speed {
        angle_mod(ideal)
    } else {
        angle_mod(current + speed.copysign(delta))
    }
}
