//! Destructible billboards: hit decals, damage, debris and world placement

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{BillboardConfig, WorldConfig};

use super::entity::{Entity, EntityBase, EntityId};
use super::math::{rotate_y, terrain_height, Aabb, Vec3};

/// Bullet-hole decal on a billboard face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletHole {
    /// Impact point relative to the billboard center
    pub offset: Vec3,
    pub created_at: u64,
}

/// Fragment thrown out when a billboard is destroyed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debris {
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation_speed: Vec3,
    pub size: f32,
    pub lifetime_ms: u64,
}

/// Static destructible scenery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Billboard {
    #[serde(flatten)]
    pub base: EntityBase,
    pub width: f32,
    pub height: f32,
    pub thickness: f32,
    pub health: f32,
    pub max_health: f32,
    pub is_destroyed: bool,
    pub bullet_holes: VecDeque<BulletHole>,
    pub max_bullet_holes: usize,
}

impl Entity for Billboard {
    fn base(&self) -> &EntityBase {
        &self.base
    }
}

impl Billboard {
    pub fn new(id: EntityId, position: Vec3, yaw: f32, cfg: &BillboardConfig, now: u64) -> Self {
        Self {
            base: EntityBase::new(id, position, now).with_rotation(Vec3::new(0.0, yaw, 0.0)),
            width: cfg.width,
            height: cfg.height,
            thickness: cfg.thickness,
            health: cfg.max_health,
            max_health: cfg.max_health,
            is_destroyed: false,
            bullet_holes: VecDeque::with_capacity(cfg.max_bullet_holes),
            max_bullet_holes: cfg.max_bullet_holes,
        }
    }

    /// Rotation about the vertical axis; the board face points along local z
    pub fn yaw(&self) -> f32 {
        self.base.rotation.y
    }

    /// Collision volume in the board's own frame: width on x, height on y,
    /// thickness on z, centered on the origin
    pub fn local_bounds(&self) -> Aabb {
        Aabb {
            center: Vec3::ZERO,
            half_extents: Vec3::new(self.width / 2.0, self.height / 2.0, self.thickness / 2.0),
        }
    }

    /// World point to board-local coordinates
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        rotate_y(point - self.base.position, -self.yaw())
    }

    /// Board-local coordinates to a world point
    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.base.position + rotate_y(local, self.yaw())
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        !self.is_destroyed && self.local_bounds().contains(self.to_local(point))
    }

    /// World point where the segment `start..end` first enters the board
    pub fn segment_entry(&self, start: Vec3, end: Vec3) -> Option<Vec3> {
        if self.is_destroyed {
            return None;
        }
        self.local_bounds()
            .segment_entry(self.to_local(start), self.to_local(end))
            .map(|local| self.to_world(local))
    }

    /// Record a decal at a world-space hit point, evicting the oldest past the cap
    pub fn add_bullet_hole(&mut self, point: Vec3, now: u64) -> bool {
        if self.is_destroyed || self.max_bullet_holes == 0 {
            return false;
        }
        while self.bullet_holes.len() >= self.max_bullet_holes {
            self.bullet_holes.pop_front();
        }
        self.bullet_holes.push_back(BulletHole {
            offset: point - self.base.position,
            created_at: now,
        });
        self.base.updated_at = now;
        true
    }

    /// Apply damage; returns true only on the hit that destroys the billboard
    pub fn take_damage(&mut self, amount: f32, now: u64) -> bool {
        if self.is_destroyed {
            return false;
        }
        self.health = (self.health - amount.max(0.0)).max(0.0);
        self.base.updated_at = now;
        if self.health <= 0.0 {
            self.is_destroyed = true;
            self.base.deactivate(now);
            return true;
        }
        false
    }

    /// Procedural fragments spread over the board face
    pub fn generate_debris<R: Rng>(&self, rng: &mut R, count: usize) -> Vec<Debris> {
        (0..count)
            .map(|_| {
                let local = Vec3::new(
                    rng.gen_range(-0.5..=0.5) * self.width,
                    rng.gen_range(-0.5..=0.5) * self.height,
                    rng.gen_range(-0.5..=0.5) * self.thickness,
                );
                Debris {
                    position: self.to_world(local),
                    velocity: Vec3::new(
                        rng.gen_range(-15.0..=15.0),
                        rng.gen_range(5.0..=25.0),
                        rng.gen_range(-15.0..=15.0),
                    ),
                    rotation_speed: Vec3::new(
                        rng.gen_range(-5.0..=5.0),
                        rng.gen_range(-5.0..=5.0),
                        rng.gen_range(-5.0..=5.0),
                    ),
                    size: rng.gen_range(0.5..=3.0),
                    lifetime_ms: rng.gen_range(2000..=5000),
                }
            })
            .collect()
    }
}

/// Terrain height spread across the corners and center of a footprint
fn terrain_variance(x: f32, z: f32, half_width: f32) -> f32 {
    let samples = [
        terrain_height(x, z),
        terrain_height(x - half_width, z - half_width),
        terrain_height(x + half_width, z - half_width),
        terrain_height(x - half_width, z + half_width),
        terrain_height(x + half_width, z + half_width),
    ];
    let min = samples.iter().copied().fold(f32::INFINITY, f32::min);
    let max = samples.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    max - min
}

/// Place billboards on flat ground with a minimum spacing.
///
/// Returns fewer than `cfg.count` billboards if the attempt budget runs out.
/// Ids are assigned in placement order, so the result is sorted by id.
pub fn generate_billboards<R: Rng>(
    rng: &mut R,
    cfg: &BillboardConfig,
    world: &WorldConfig,
    now: u64,
) -> Vec<Billboard> {
    let mut placed: Vec<Billboard> = Vec::with_capacity(cfg.count);
    let limit = (world.half_extent() - cfg.width).max(0.0);
    let mut attempts = 0;

    while placed.len() < cfg.count && attempts < cfg.placement_attempts {
        attempts += 1;
        let x = rng.gen_range(-limit..=limit);
        let z = rng.gen_range(-limit..=limit);

        if terrain_variance(x, z, cfg.width / 2.0) > cfg.max_terrain_variance {
            continue;
        }

        let too_close = placed.iter().any(|b| {
            let dx = b.base.position.x - x;
            let dz = b.base.position.z - z;
            (dx * dx + dz * dz).sqrt() < cfg.min_spacing
        });
        if too_close {
            continue;
        }

        let y = terrain_height(x, z) + cfg.elevation + cfg.height / 2.0;
        let yaw = rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI);
        let id = format!("billboard_{:03}", placed.len());
        placed.push(Billboard::new(id, Vec3::new(x, y, z), yaw, cfg, now));
    }

    if placed.len() < cfg.count {
        warn!(
            placed = placed.len(),
            requested = cfg.count,
            attempts,
            "Could not place every billboard"
        );
    } else {
        debug!(placed = placed.len(), attempts, "Billboards placed");
    }

    placed
}
