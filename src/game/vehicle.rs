//! Vehicle flight physics, health and respawn

use serde::{Deserialize, Serialize};

use crate::config::WorldConfig;

use super::entity::{random_id, Entity, EntityBase, EntityId};
use super::math::{forward, terrain_height, wrap_angle, Vec3, MAX_PITCH, MAX_ROLL};
use super::weapon::WeaponType;

/// Vehicle types available to players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    /// Agile, light armour
    Fighter,
    /// Slow gunship with a heavy cannon
    Heavy,
    /// Balanced profile used for development
    Test,
}

impl Default for VehicleType {
    fn default() -> Self {
        Self::Fighter
    }
}

/// Vehicle physics and combat constants per vehicle type
#[derive(Debug, Clone, Copy)]
pub struct VehicleStats {
    pub max_health: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    /// Yaw rate in radians per second
    pub turn_rate: f32,
    pub pitch_rate: f32,
    pub roll_rate: f32,
    /// Shots per second of the primary weapon
    pub fire_rate: f32,
    pub primary_weapon: WeaponType,
}

impl VehicleStats {
    pub fn for_type(vehicle_type: VehicleType) -> Self {
        match vehicle_type {
            VehicleType::Fighter => Self {
                max_health: 100.0,
                max_speed: 120.0,
                acceleration: 60.0,
                turn_rate: 1.8,
                pitch_rate: 1.5,
                roll_rate: 2.5,
                fire_rate: 10.0,
                primary_weapon: WeaponType::MachineGun,
            },
            VehicleType::Heavy => Self {
                max_health: 200.0,
                max_speed: 80.0,
                acceleration: 35.0,
                turn_rate: 1.0,
                pitch_rate: 0.9,
                roll_rate: 1.5,
                fire_rate: 1.5,
                primary_weapon: WeaponType::Cannon,
            },
            VehicleType::Test => Self {
                max_health: 50.0,
                max_speed: 100.0,
                acceleration: 50.0,
                turn_rate: 1.5,
                pitch_rate: 1.5,
                roll_rate: 1.5,
                fire_rate: 5.0,
                primary_weapon: WeaponType::MachineGun,
            },
        }
    }

    /// Minimum milliseconds between two shots of the primary weapon
    pub fn fire_cooldown_ms(&self) -> u64 {
        (1000.0 / self.fire_rate.max(0.001)).round() as u64
    }
}

/// Held control input. Axes are expected in [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleInput {
    #[serde(default)]
    pub thrust: f32,
    #[serde(default)]
    pub pitch: f32,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub roll: f32,
    #[serde(default)]
    pub vertical: f32,
    #[serde(default)]
    pub fire: bool,
}

impl VehicleInput {
    /// Clamp every axis into [-1, 1], zeroing non-finite values
    pub fn sanitized(self) -> Self {
        let axis = |v: f32| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        Self {
            thrust: axis(self.thrust),
            pitch: axis(self.pitch),
            yaw: axis(self.yaw),
            roll: axis(self.roll),
            vertical: axis(self.vertical),
            fire: self.fire,
        }
    }
}

/// Result of applying damage to a vehicle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// Vehicle was inactive; nothing changed
    Ignored,
    /// Health reduced, vehicle still flying
    Damaged { health: f32 },
    /// Health reached zero on this hit
    Lethal,
}

/// A player's vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    #[serde(flatten)]
    pub base: EntityBase,
    pub player_id: EntityId,
    pub vehicle_type: VehicleType,
    pub health: f32,
    pub max_health: f32,
    pub angular_velocity: Vec3,
    pub input: VehicleInput,
}

impl Entity for Vehicle {
    fn base(&self) -> &EntityBase {
        &self.base
    }
}

impl Vehicle {
    pub fn new(player_id: EntityId, vehicle_type: VehicleType, position: Vec3, now: u64) -> Self {
        let stats = VehicleStats::for_type(vehicle_type);
        Self {
            base: EntityBase::new(random_id("vehicle"), position, now),
            player_id,
            vehicle_type,
            health: stats.max_health,
            max_health: stats.max_health,
            angular_velocity: Vec3::ZERO,
            input: VehicleInput::default(),
        }
    }

    pub fn stats(&self) -> VehicleStats {
        VehicleStats::for_type(self.vehicle_type)
    }

    /// Integrate one physics step from the held input
    pub fn update(&mut self, dt: f32, world: &WorldConfig, air_resistance: f32, now: u64) {
        if !self.base.active {
            return;
        }

        let stats = self.stats();
        let input = self.input;

        // Thrust along the nose, vertical lift independent of attitude
        let mut velocity = self.base.velocity;
        velocity += forward(self.base.rotation) * (input.thrust * stats.acceleration * dt);
        velocity.y += input.vertical * stats.acceleration * dt;
        velocity *= air_resistance;

        // Uniform rescale keeps the direction of travel
        let speed = velocity.length();
        if speed > stats.max_speed {
            velocity *= stats.max_speed / speed;
        }

        self.angular_velocity = Vec3::new(
            input.pitch * stats.pitch_rate,
            input.yaw * stats.turn_rate,
            input.roll * stats.roll_rate,
        );
        let rotation = self.base.rotation + self.angular_velocity * dt;
        self.base.rotation = Vec3::new(
            rotation.x.clamp(-MAX_PITCH, MAX_PITCH),
            wrap_angle(rotation.y),
            rotation.z.clamp(-MAX_ROLL, MAX_ROLL),
        );

        self.base.position += velocity * dt;
        self.base.velocity = velocity;
        self.enforce_bounds(world);
        self.base.updated_at = now;
    }

    /// Clamp to the world cuboid and the terrain floor. The outward velocity
    /// component on a clamped axis is zeroed.
    fn enforce_bounds(&mut self, world: &WorldConfig) {
        let limit = world.half_extent();
        let pos = &mut self.base.position;
        let vel = &mut self.base.velocity;

        if pos.x > limit {
            pos.x = limit;
            vel.x = vel.x.min(0.0);
        } else if pos.x < -limit {
            pos.x = -limit;
            vel.x = vel.x.max(0.0);
        }

        if pos.z > limit {
            pos.z = limit;
            vel.z = vel.z.min(0.0);
        } else if pos.z < -limit {
            pos.z = -limit;
            vel.z = vel.z.max(0.0);
        }

        if pos.y > world.max_altitude {
            pos.y = world.max_altitude;
            vel.y = vel.y.min(0.0);
        }

        let floor = terrain_height(pos.x, pos.z) + world.min_flight_altitude;
        if pos.y < floor {
            pos.y = floor;
            vel.y = vel.y.max(0.0);
        }
    }

    /// Apply damage. Inactive vehicles are unaffected.
    pub fn take_damage(&mut self, amount: f32) -> DamageOutcome {
        if !self.base.active {
            return DamageOutcome::Ignored;
        }
        self.health = (self.health - amount.max(0.0)).clamp(0.0, self.max_health);
        if self.health <= 0.0 {
            DamageOutcome::Lethal
        } else {
            DamageOutcome::Damaged {
                health: self.health,
            }
        }
    }

    /// Take the vehicle out of play; returns false if it was already out
    pub fn destroy(&mut self, now: u64) -> bool {
        if !self.base.deactivate(now) {
            return false;
        }
        self.health = 0.0;
        self.base.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
        self.input = VehicleInput::default();
        true
    }

    /// True for an inactive vehicle whose health has already been refilled
    pub fn is_restored(&self) -> bool {
        !self.base.active && self.health >= self.max_health
    }

    /// Put the vehicle back into play at `position` with full health
    pub fn respawn(&mut self, position: Vec3, now: u64) {
        self.base.position = position;
        self.base.rotation = Vec3::ZERO;
        self.base.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
        self.input = VehicleInput::default();
        self.health = self.max_health;
        self.base.active = true;
        self.base.updated_at = now;
    }
}
