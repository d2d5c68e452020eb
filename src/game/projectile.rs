//! Fired rounds: straight-line flight with range-based expiry

use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityBase, EntityId};
use super::math::Vec3;
use super::weapon::WeaponType;

/// Active projectile in the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projectile {
    #[serde(flatten)]
    pub base: EntityBase,
    pub owner_id: EntityId,
    pub weapon_type: WeaponType,
    pub damage: f32,
    pub range: f32,
    pub distance_traveled: f32,
    /// Position before the most recent step; hit tests sweep from here
    pub previous_position: Vec3,
}

impl Entity for Projectile {
    fn base(&self) -> &EntityBase {
        &self.base
    }
}

impl Projectile {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: EntityId,
        owner_id: EntityId,
        weapon_type: WeaponType,
        position: Vec3,
        rotation: Vec3,
        velocity: Vec3,
        damage: f32,
        range: f32,
        now: u64,
    ) -> Self {
        Self {
            base: EntityBase::new(id, position, now)
                .with_rotation(rotation)
                .with_velocity(velocity),
            owner_id,
            weapon_type,
            damage,
            range,
            distance_traveled: 0.0,
            previous_position: position,
        }
    }

    /// Advance the projectile; returns false once it has outrun its range
    pub fn update(&mut self, dt: f32, now: u64) -> bool {
        if !self.base.active {
            return false;
        }

        let step = self.base.velocity * dt;
        self.previous_position = self.base.position;
        self.base.position += step;
        self.distance_traveled += step.length();
        self.base.updated_at = now;

        if self.distance_traveled > self.range {
            self.base.deactivate(now);
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet(range: f32) -> Projectile {
        Projectile::new(
            "bullet_1".to_string(),
            "p1".to_string(),
            WeaponType::MachineGun,
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 100.0),
            10.0,
            range,
            0,
        )
    }

    #[test]
    fn test_distance_is_monotonic_and_expires_past_range() {
        let mut p = bullet(25.0);
        let mut last = 0.0;
        // 10 units per step: 10, 20 alive; 30 > 25 expires
        assert!(p.update(0.1, 100));
        assert!(p.distance_traveled >= last);
        last = p.distance_traveled;
        assert!(p.update(0.1, 200));
        assert!(p.distance_traveled >= last);
        assert!(!p.update(0.1, 300));
        assert!(!p.base.active);
        assert!((p.base.position.z - 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_exactly_at_range_is_still_alive() {
        let mut p = bullet(10.0);
        p.base.velocity = Vec3::new(0.0, 0.0, 10.0);
        assert!(p.update(1.0, 1000));
        assert!(!p.update(0.001, 1001));
    }

    #[test]
    fn test_update_keeps_the_swept_segment() {
        let mut p = bullet(500.0);
        assert_eq!(p.previous_position, p.base.position);
        p.update(0.05, 50);
        p.update(0.05, 100);
        assert!((p.previous_position.z - 5.0).abs() < 1e-4);
        assert!((p.base.position.z - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_inactive_projectile_does_not_move() {
        let mut p = bullet(100.0);
        p.base.deactivate(0);
        assert!(!p.update(1.0, 10));
        assert_eq!(p.base.position, Vec3::ZERO);
    }

    #[test]
    fn test_projectile_serde_round_trip() {
        let mut p = bullet(500.0);
        p.update(0.5, 500);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"distanceTraveled\""));
        assert!(json.contains("\"previousPosition\""));
        let back: Projectile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
