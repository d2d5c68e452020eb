//! Vehicle vs scenery collision response

use crate::config::CollisionConfig;

use super::billboard::Billboard;
use super::math::{rotate_y, Aabb, Vec3};
use super::vehicle::Vehicle;

/// Stateless collision helpers used by the vehicle pass
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Check if a sphere touches or penetrates a box
    pub fn sphere_overlaps_box(center: Vec3, radius: f32, aabb: &Aabb) -> bool {
        (center - aabb.closest_point(center)).length_squared() < radius * radius
    }

    /// Separating normal and the surface point it starts from.
    /// For a center inside the box the nearest face wins.
    fn separation(center: Vec3, aabb: &Aabb) -> (Vec3, Vec3) {
        let closest = aabb.closest_point(center);
        let delta = center - closest;
        if delta.length_squared() > 1e-8 {
            return (delta.normalized(), closest);
        }

        let local = center - aabb.center;
        let h = aabb.half_extents;
        let penetration = [
            h.x - local.x.abs(),
            h.y - local.y.abs(),
            h.z - local.z.abs(),
        ];
        let sign = |v: f32| if v < 0.0 { -1.0 } else { 1.0 };

        let axis = if penetration[0] <= penetration[1] && penetration[0] <= penetration[2] {
            0
        } else if penetration[1] <= penetration[2] {
            1
        } else {
            2
        };

        let mut surface = center;
        let normal = match axis {
            0 => {
                surface.x = aabb.center.x + sign(local.x) * h.x;
                Vec3::new(sign(local.x), 0.0, 0.0)
            }
            1 => {
                surface.y = aabb.center.y + sign(local.y) * h.y;
                Vec3::new(0.0, sign(local.y), 0.0)
            }
            _ => {
                surface.z = aabb.center.z + sign(local.z) * h.z;
                Vec3::new(0.0, 0.0, sign(local.z))
            }
        };
        (normal, surface)
    }

    /// Resolve a sphere out of a box.
    ///
    /// Returns the new (position, velocity), or `None` when there is no
    /// overlap. The sphere ends `radius + margin` from the box along the
    /// normal and the inward velocity component is reflected, scaled by
    /// `restitution`.
    pub fn push_out_of_box(
        center: Vec3,
        velocity: Vec3,
        radius: f32,
        aabb: &Aabb,
        margin: f32,
        restitution: f32,
    ) -> Option<(Vec3, Vec3)> {
        if !Self::sphere_overlaps_box(center, radius, aabb) {
            return None;
        }

        let (normal, surface) = Self::separation(center, aabb);
        let position = surface + normal * (radius + margin);

        let inward = velocity.dot(normal);
        let velocity = if inward < 0.0 {
            velocity - normal * ((1.0 + restitution) * inward)
        } else {
            velocity
        };

        Some((position, velocity))
    }

    /// Push a vehicle out of every intact billboard it overlaps.
    /// Each board is resolved in its own yawed frame. Returns true if the
    /// vehicle was moved.
    pub fn resolve_vehicle_billboards(
        vehicle: &mut Vehicle,
        billboards: &[Billboard],
        cfg: &CollisionConfig,
    ) -> bool {
        let mut moved = false;
        for billboard in billboards.iter().filter(|b| !b.is_destroyed) {
            let yaw = billboard.yaw();
            if let Some((position, velocity)) = Self::push_out_of_box(
                billboard.to_local(vehicle.base.position),
                rotate_y(vehicle.base.velocity, -yaw),
                cfg.vehicle_body_radius,
                &billboard.local_bounds(),
                cfg.push_out_margin,
                cfg.restitution,
            ) {
                vehicle.base.position = billboard.to_world(position);
                vehicle.base.velocity = rotate_y(velocity, yaw);
                moved = true;
            }
        }
        moved
    }
}
