//! Vector math, orientation helpers and the terrain height field

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};
use std::ops::{Add, AddAssign, Mul, MulAssign, Sub};

use serde::{Deserialize, Serialize};

/// Plain 3D vector used for positions, velocities and Euler rotations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Unit vector in the same direction, or zero for a degenerate vector
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            Self::ZERO
        } else {
            self * (1.0 / len)
        }
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl MulAssign<f32> for Vec3 {
    fn mul_assign(&mut self, rhs: f32) {
        *self = *self * rhs;
    }
}

/// Forward unit vector for a rotation (x = pitch, y = yaw)
pub fn forward(rotation: Vec3) -> Vec3 {
    let (pitch, yaw) = (rotation.x, rotation.y);
    Vec3::new(yaw.sin() * pitch.cos(), -pitch.sin(), yaw.cos() * pitch.cos())
}

/// Rotate a local-space offset into world space.
///
/// Roll is applied about the local forward axis first, then pitch, then yaw,
/// so that `rotate_local(Vec3::new(0.0, 0.0, 1.0), r) == forward(r)`.
pub fn rotate_local(local: Vec3, rotation: Vec3) -> Vec3 {
    let (pitch, yaw, roll) = (rotation.x, rotation.y, rotation.z);

    // Roll about Z
    let (sr, cr) = roll.sin_cos();
    let v = Vec3::new(local.x * cr - local.y * sr, local.x * sr + local.y * cr, local.z);

    // Pitch about X (positive pitch tilts the nose down)
    let (sp, cp) = pitch.sin_cos();
    let v = Vec3::new(v.x, v.y * cp - v.z * sp, v.y * sp + v.z * cp);

    rotate_y(v, yaw)
}

/// Rotate a vector about the vertical axis by `yaw`.
/// `rotate_y(v, -yaw)` undoes `rotate_y(v, yaw)`.
pub fn rotate_y(v: Vec3, yaw: f32) -> Vec3 {
    let (sy, cy) = yaw.sin_cos();
    Vec3::new(v.x * cy + v.z * sy, v.y, -v.x * sy + v.z * cy)
}

/// Point on the segment `start..end` nearest to `point`
pub fn closest_point_on_segment(start: Vec3, end: Vec3, point: Vec3) -> Vec3 {
    let d = end - start;
    let len_sq = d.length_squared();
    if len_sq <= f32::EPSILON {
        return start;
    }
    let t = ((point - start).dot(d) / len_sq).clamp(0.0, 1.0);
    start + d * t
}

/// Wrap an angle into (-π, π]
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

pub const MAX_PITCH: f32 = FRAC_PI_2;
pub const MAX_ROLL: f32 = FRAC_PI_4;

/// Deterministic terrain height at a world (x, z) position
pub fn terrain_height(x: f32, z: f32) -> f32 {
    (x * 0.01).sin() * 10.0 + (z * 0.01).cos() * 10.0 + ((x + z) * 0.005).sin() * 5.0
}

/// Axis-aligned box described by its center and half extents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl Aabb {
    pub fn contains(&self, point: Vec3) -> bool {
        let d = point - self.center;
        d.x.abs() <= self.half_extents.x
            && d.y.abs() <= self.half_extents.y
            && d.z.abs() <= self.half_extents.z
    }

    /// Closest point on or inside the box to `point`
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let min = self.center - self.half_extents;
        let max = self.center + self.half_extents;
        Vec3::new(
            point.x.clamp(min.x, max.x),
            point.y.clamp(min.y, max.y),
            point.z.clamp(min.z, max.z),
        )
    }

    /// First point where the segment `start..end` enters the box, using the
    /// slab method. A segment starting inside the box enters at `start`.
    pub fn segment_entry(&self, start: Vec3, end: Vec3) -> Option<Vec3> {
        if self.contains(start) {
            return Some(start);
        }

        let min = self.center - self.half_extents;
        let max = self.center + self.half_extents;
        let d = end - start;
        let mut t_enter = 0.0_f32;
        let mut t_exit = 1.0_f32;

        for (s, d, lo, hi) in [
            (start.x, d.x, min.x, max.x),
            (start.y, d.y, min.y, max.y),
            (start.z, d.z, min.z, max.z),
        ] {
            if d.abs() <= f32::EPSILON {
                // Parallel to this slab: must already lie within it
                if s < lo || s > hi {
                    return None;
                }
                continue;
            }
            let (mut t0, mut t1) = ((lo - s) / d, (hi - s) / d);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }

        Some(start + d * t_enter)
    }
}
