//! Weapons, projectile spawning and projectile-vs-world hit detection

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::billboard::Billboard;
use super::entity::{EntityId, Entity};
use super::math::{closest_point_on_segment, forward, rotate_local, Vec3};
use super::projectile::Projectile;
use super::vehicle::Vehicle;

/// Weapon families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponType {
    MachineGun,
    Cannon,
}

/// Ballistic stats per weapon type
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Damage per hit
    pub damage: f32,
    /// Projectile speed (units per second)
    pub projectile_speed: f32,
    /// Distance a projectile may travel before expiring
    pub range: f32,
    /// Spawn point in the vehicle's local frame (+z is the nose)
    pub muzzle_offset: Vec3,
}

impl WeaponStats {
    pub fn for_type(weapon_type: WeaponType) -> Self {
        match weapon_type {
            WeaponType::MachineGun => Self {
                damage: 10.0,
                projectile_speed: 400.0,
                range: 600.0,
                muzzle_offset: Vec3::new(0.0, -0.5, 4.0),
            },
            WeaponType::Cannon => Self {
                damage: 40.0,
                projectile_speed: 250.0,
                range: 900.0,
                muzzle_offset: Vec3::new(0.0, -1.0, 5.5),
            },
        }
    }
}

/// One player's instance of a weapon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weapon {
    pub owner_id: EntityId,
    pub weapon_type: WeaponType,
    pub damage: f32,
    pub projectile_speed: f32,
    pub range: f32,
    pub cooldown_ms: u64,
    pub last_fired_at: Option<u64>,
}

impl Weapon {
    pub fn new(owner_id: EntityId, weapon_type: WeaponType, cooldown_ms: u64) -> Self {
        let stats = WeaponStats::for_type(weapon_type);
        Self {
            owner_id,
            weapon_type,
            damage: stats.damage,
            projectile_speed: stats.projectile_speed,
            range: stats.range,
            cooldown_ms,
            last_fired_at: None,
        }
    }

    /// Check if the cooldown has elapsed
    pub fn can_fire(&self, now: u64) -> bool {
        match self.last_fired_at {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.cooldown_ms,
        }
    }
}

/// Projectile contact found during collision detection
#[derive(Debug, Clone, PartialEq)]
pub enum Collision {
    Vehicle {
        projectile_id: EntityId,
        shooter_id: EntityId,
        /// Player owning the struck vehicle
        target_player_id: EntityId,
        damage: f32,
        point: Vec3,
    },
    Billboard {
        projectile_id: EntityId,
        shooter_id: EntityId,
        billboard_id: EntityId,
        damage: f32,
        point: Vec3,
    },
}

impl Collision {
    pub fn projectile_id(&self) -> &str {
        match self {
            Collision::Vehicle { projectile_id, .. } | Collision::Billboard { projectile_id, .. } => {
                projectile_id
            }
        }
    }
}

/// Owns every weapon instance and every live projectile
#[derive(Debug, Default)]
pub struct WeaponSystem {
    weapons: HashMap<(EntityId, WeaponType), Weapon>,
    projectiles: Vec<Projectile>,
    next_projectile_id: u64,
}

impl WeaponSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give a player a weapon, replacing any previous instance of that type
    pub fn equip(&mut self, owner_id: &str, weapon_type: WeaponType, cooldown_ms: u64) -> Weapon {
        let weapon = Weapon::new(owner_id.to_string(), weapon_type, cooldown_ms);
        self.weapons
            .insert((owner_id.to_string(), weapon_type), weapon.clone());
        weapon
    }

    pub fn weapons_for(&self, owner_id: &str) -> Vec<Weapon> {
        let mut weapons: Vec<Weapon> = self
            .weapons
            .values()
            .filter(|w| w.owner_id == owner_id)
            .cloned()
            .collect();
        weapons.sort_by_key(|w| w.weapon_type);
        weapons
    }

    /// Drop a player's weapons and in-flight projectiles.
    /// Returns the ids of the removed projectiles.
    pub fn remove_player(&mut self, owner_id: &str) -> Vec<EntityId> {
        self.weapons.retain(|(owner, _), _| owner != owner_id);
        let mut removed = Vec::new();
        self.projectiles.retain(|p| {
            if p.owner_id == owner_id {
                removed.push(p.base.id.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Fire a weapon from a vehicle pose.
    ///
    /// Returns `None` when the player has no such weapon or it is cooling down.
    pub fn fire_weapon(
        &mut self,
        owner_id: &str,
        weapon_type: WeaponType,
        position: Vec3,
        rotation: Vec3,
        now: u64,
    ) -> Option<Projectile> {
        let weapon = self
            .weapons
            .get_mut(&(owner_id.to_string(), weapon_type))?;
        if !weapon.can_fire(now) {
            return None;
        }
        // Stamp before building the projectile so a second request this tick fails
        weapon.last_fired_at = Some(now);

        let stats = WeaponStats::for_type(weapon_type);
        let spawn = position + rotate_local(stats.muzzle_offset, rotation);
        let velocity = forward(rotation) * weapon.projectile_speed;

        self.next_projectile_id += 1;
        let projectile = Projectile::new(
            format!("bullet_{}", self.next_projectile_id),
            owner_id.to_string(),
            weapon_type,
            spawn,
            rotation,
            velocity,
            weapon.damage,
            weapon.range,
            now,
        );
        self.projectiles.push(projectile.clone());
        Some(projectile)
    }

    /// Advance all projectiles and sweep the ones past their range
    pub fn update_projectiles(&mut self, dt: f32, now: u64) -> Vec<EntityId> {
        let mut expired = Vec::new();
        for projectile in self.projectiles.iter_mut() {
            if !projectile.update(dt, now) {
                expired.push(projectile.base.id.clone());
            }
        }
        self.projectiles.retain(|p| p.base.active);
        expired
    }

    /// Find at most one contact per projectile.
    ///
    /// Each projectile is swept over the segment it covered during the last
    /// step, so fast rounds cannot skip thin targets. Projectiles are visited
    /// in spawn order; for each, vehicles are checked before billboards, both
    /// in the order given.
    pub fn check_collisions<'a, V>(
        &self,
        vehicles: V,
        billboards: &[Billboard],
        hit_radius: f32,
    ) -> Vec<Collision>
    where
        V: IntoIterator<Item = &'a Vehicle>,
    {
        let vehicles: Vec<&Vehicle> = vehicles.into_iter().filter(|v| v.is_active()).collect();
        let hit_radius_sq = hit_radius * hit_radius;
        let mut collisions = Vec::new();

        for projectile in self.projectiles.iter().filter(|p| p.is_active()) {
            let start = projectile.previous_position;
            let end = projectile.position();

            let vehicle_hit = vehicles
                .iter()
                .filter(|v| v.player_id != projectile.owner_id)
                .find_map(|v| {
                    let closest = closest_point_on_segment(start, end, v.position());
                    ((v.position() - closest).length_squared() <= hit_radius_sq).then_some((v, closest))
                });
            if let Some((vehicle, point)) = vehicle_hit {
                collisions.push(Collision::Vehicle {
                    projectile_id: projectile.id().to_string(),
                    shooter_id: projectile.owner_id.clone(),
                    target_player_id: vehicle.player_id.clone(),
                    damage: projectile.damage,
                    point,
                });
                continue;
            }

            let billboard_hit = billboards
                .iter()
                .find_map(|b| b.segment_entry(start, end).map(|point| (b, point)));
            if let Some((billboard, point)) = billboard_hit {
                collisions.push(Collision::Billboard {
                    projectile_id: projectile.id().to_string(),
                    shooter_id: projectile.owner_id.clone(),
                    billboard_id: billboard.id().to_string(),
                    damage: projectile.damage,
                    point,
                });
            }
        }

        collisions
    }

    /// Remove a projectile after it has been resolved against a target
    pub fn remove_projectile(&mut self, projectile_id: &str) -> Option<Projectile> {
        let idx = self
            .projectiles
            .iter()
            .position(|p| p.base.id == projectile_id)?;
        let mut projectile = self.projectiles.remove(idx);
        projectile.base.active = false;
        Some(projectile)
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::vehicle::VehicleType;

    fn system_with(owner: &str, cooldown_ms: u64) -> WeaponSystem {
        let mut ws = WeaponSystem::new();
        ws.equip(owner, WeaponType::MachineGun, cooldown_ms);
        ws
    }

    #[test]
    fn test_fire_within_cooldown_yields_one_projectile() {
        let mut ws = system_with("p1", 100);
        assert!(ws
            .fire_weapon("p1", WeaponType::MachineGun, Vec3::ZERO, Vec3::ZERO, 1000)
            .is_some());
        assert!(ws
            .fire_weapon("p1", WeaponType::MachineGun, Vec3::ZERO, Vec3::ZERO, 1050)
            .is_none());
        assert_eq!(ws.projectiles().len(), 1);
        assert!(ws
            .fire_weapon("p1", WeaponType::MachineGun, Vec3::ZERO, Vec3::ZERO, 1100)
            .is_some());
        assert_eq!(ws.projectiles().len(), 2);
    }

    #[test]
    fn test_fire_without_weapon_is_ignored() {
        let mut ws = system_with("p1", 100);
        assert!(ws
            .fire_weapon("p2", WeaponType::MachineGun, Vec3::ZERO, Vec3::ZERO, 0)
            .is_none());
        assert!(ws
            .fire_weapon("p1", WeaponType::Cannon, Vec3::ZERO, Vec3::ZERO, 0)
            .is_none());
    }

    #[test]
    fn test_projectile_spawns_at_rotated_muzzle() {
        let mut ws = system_with("p1", 0);
        let yaw_right = Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0);
        let p = ws
            .fire_weapon("p1", WeaponType::MachineGun, Vec3::new(10.0, 50.0, 0.0), yaw_right, 0)
            .unwrap();
        // Muzzle +z rotates onto +x when yawed by 90 degrees
        assert!((p.base.position.x - 14.0).abs() < 1e-4);
        assert!((p.base.position.y - 49.5).abs() < 1e-4);
        assert!(p.base.position.z.abs() < 1e-4);
        assert!((p.base.velocity.x - 400.0).abs() < 1e-2);
        assert_eq!(p.owner_id, "p1");
    }

    #[test]
    fn test_update_projectiles_reports_expired() {
        let mut ws = system_with("p1", 0);
        ws.fire_weapon("p1", WeaponType::MachineGun, Vec3::ZERO, Vec3::ZERO, 0);
        // 400 u/s over 600 range: alive after 1s, gone after 2s
        assert!(ws.update_projectiles(1.0, 1000).is_empty());
        let expired = ws.update_projectiles(1.0, 2000);
        assert_eq!(expired, vec!["bullet_1".to_string()]);
        assert!(ws.projectiles().is_empty());
    }

    #[test]
    fn test_owner_is_never_hit_by_own_projectile() {
        let cfg = GameConfig::default();
        let mut ws = system_with("p1", 0);
        let shooter = Vehicle::new("p1".to_string(), VehicleType::Fighter, Vec3::ZERO, 0);
        ws.fire_weapon("p1", WeaponType::MachineGun, Vec3::ZERO, Vec3::ZERO, 0);
        let hits = ws.check_collisions([&shooter], &[], cfg.collision.projectile_hit_radius);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_one_collision_per_projectile_vehicle_first() {
        let cfg = GameConfig::default();
        let mut ws = system_with("p1", 0);
        let p = ws
            .fire_weapon("p1", WeaponType::MachineGun, Vec3::new(0.0, 50.0, 0.0), Vec3::ZERO, 0)
            .unwrap();
        let at = p.base.position;
        let a = Vehicle::new("p2".to_string(), VehicleType::Fighter, at, 0);
        let b = Vehicle::new("p3".to_string(), VehicleType::Fighter, at, 0);
        let board = Billboard::new("billboard_000".to_string(), at, 0.0, &cfg.billboards, 0);

        let hits = ws.check_collisions([&a, &b], &[board], cfg.collision.projectile_hit_radius);
        assert_eq!(hits.len(), 1);
        assert!(matches!(
            &hits[0],
            Collision::Vehicle { target_player_id, .. } if target_player_id == "p2"
        ));
    }

    #[test]
    fn test_inactive_vehicle_is_not_hit() {
        let cfg = GameConfig::default();
        let mut ws = system_with("p1", 0);
        ws.fire_weapon("p1", WeaponType::MachineGun, Vec3::ZERO, Vec3::ZERO, 0);
        let at = ws.projectiles()[0].base.position;
        let mut target = Vehicle::new("p2".to_string(), VehicleType::Fighter, at, 0);
        target.destroy(0);
        assert!(ws
            .check_collisions([&target], &[], cfg.collision.projectile_hit_radius)
            .is_empty());
    }

    #[test]
    fn test_fast_step_through_vehicle_is_a_hit() {
        let cfg = GameConfig::default();
        let mut ws = system_with("p1", 0);
        ws.fire_weapon("p1", WeaponType::MachineGun, Vec3::new(0.0, 50.5, 0.0), Vec3::ZERO, 0);
        // Bullet starts at z=4; a 50 ms step carries it to z=24 past a target at z=14
        let target = Vehicle::new("p2".to_string(), VehicleType::Fighter, Vec3::new(0.0, 50.0, 14.0), 0);
        assert!(ws.check_collisions([&target], &[], cfg.collision.projectile_hit_radius).is_empty());
        ws.update_projectiles(0.05, 50);

        let hits = ws.check_collisions([&target], &[], cfg.collision.projectile_hit_radius);
        assert_eq!(hits.len(), 1);
        match &hits[0] {
            Collision::Vehicle { target_player_id, point, .. } => {
                assert_eq!(target_player_id, "p2");
                assert!((point.z - 14.0).abs() < 1e-3);
            }
            other => panic!("unexpected collision {other:?}"),
        }
    }

    #[test]
    fn test_step_across_thin_board_hits_near_face() {
        let cfg = GameConfig::default();
        let mut ws = system_with("p1", 0);
        ws.fire_weapon("p1", WeaponType::MachineGun, Vec3::new(0.0, 50.5, 0.0), Vec3::ZERO, 0);
        let board = Billboard::new(
            "billboard_000".to_string(),
            Vec3::new(0.0, 50.0, 8.0),
            0.0,
            &cfg.billboards,
            0,
        );
        // One 16 ms step carries the bullet from z=4 to z=10.4, clean over the 7..9 slab
        ws.update_projectiles(0.016, 16);
        let p = &ws.projectiles()[0];
        assert!(!board.contains_point(p.previous_position));
        assert!(!board.contains_point(p.base.position));

        let hits = ws.check_collisions(std::iter::empty(), &[board], cfg.collision.projectile_hit_radius);
        assert_eq!(hits.len(), 1);
        match &hits[0] {
            Collision::Billboard { billboard_id, point, .. } => {
                assert_eq!(billboard_id, "billboard_000");
                assert!((point.z - 7.0).abs() < 1e-3);
            }
            other => panic!("unexpected collision {other:?}"),
        }
    }

    #[test]
    fn test_remove_player_drops_weapons_and_projectiles() {
        let mut ws = system_with("p1", 0);
        ws.equip("p2", WeaponType::Cannon, 500);
        ws.fire_weapon("p1", WeaponType::MachineGun, Vec3::ZERO, Vec3::ZERO, 0);
        ws.fire_weapon("p2", WeaponType::Cannon, Vec3::ZERO, Vec3::ZERO, 0);
        let removed = ws.remove_player("p1");
        assert_eq!(removed, vec!["bullet_1".to_string()]);
        assert!(ws.weapons_for("p1").is_empty());
        assert_eq!(ws.weapons_for("p2").len(), 1);
        assert_eq!(ws.projectiles().len(), 1);
    }
}
