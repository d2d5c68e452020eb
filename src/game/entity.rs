//! Fields and lifecycle shared by every simulated object

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::math::Vec3;

/// Opaque entity identifier
pub type EntityId = String;

/// Random, globally unique id with a readable prefix
pub fn random_id(prefix: &str) -> EntityId {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Common entity state.
///
/// Entities are created by their owning system, mutated only by that system,
/// and removed by clearing `active` and sweeping on the next pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityBase {
    pub id: EntityId,
    pub position: Vec3,
    /// Euler angles: x = pitch, y = yaw, z = roll
    pub rotation: Vec3,
    pub velocity: Vec3,
    pub active: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

impl EntityBase {
    pub fn new(id: EntityId, position: Vec3, now: u64) -> Self {
        Self {
            id,
            position,
            rotation: Vec3::ZERO,
            velocity: Vec3::ZERO,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Mark for removal; returns false if already inactive
    pub fn deactivate(&mut self, now: u64) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.updated_at = now;
        true
    }
}

/// Anything carrying an [`EntityBase`]
pub trait Entity {
    fn base(&self) -> &EntityBase;

    fn id(&self) -> &str {
        &self.base().id
    }

    fn is_active(&self) -> bool {
        self.base().active
    }

    fn position(&self) -> Vec3 {
        self.base().position
    }
}

/// Clone the active entities of a collection, preserving iteration order
pub fn active_clones<'a, T, I>(items: I) -> Vec<T>
where
    T: Entity + Clone + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items.into_iter().filter(|e| e.is_active()).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deactivate_is_idempotent() {
        let mut base = EntityBase::new("e_1".to_string(), Vec3::ZERO, 10);
        assert!(base.deactivate(20));
        assert!(!base.deactivate(30));
        assert_eq!(base.updated_at, 20);
    }

    #[test]
    fn test_random_ids_are_prefixed_and_unique() {
        let a = random_id("vehicle");
        let b = random_id("vehicle");
        assert!(a.starts_with("vehicle_"));
        assert_ne!(a, b);
    }
}
