//! Time-bounded visual event records

use serde::{Deserialize, Serialize};

use crate::config::EffectConfig;

use super::entity::{Entity, EntityBase, EntityId};
use super::math::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Explosion,
    MuzzleFlash,
    Impact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    #[serde(flatten)]
    pub base: EntityBase,
    pub kind: EffectKind,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f32>,
}

impl Entity for Effect {
    fn base(&self) -> &EntityBase {
        &self.base
    }
}

impl Effect {
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.base.created_at) >= self.duration_ms
    }
}

/// Creates effects on gameplay events and sweeps them when they age out
#[derive(Debug)]
pub struct EffectSystem {
    config: EffectConfig,
    effects: Vec<Effect>,
    next_id: u64,
}

impl EffectSystem {
    pub fn new(config: EffectConfig) -> Self {
        Self {
            config,
            effects: Vec::new(),
            next_id: 0,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn(
        &mut self,
        kind: EffectKind,
        position: Vec3,
        rotation: Vec3,
        duration_ms: u64,
        radius: Option<f32>,
        intensity: Option<f32>,
        now: u64,
    ) -> Effect {
        self.next_id += 1;
        let id: EntityId = format!("effect_{}", self.next_id);
        let effect = Effect {
            base: EntityBase::new(id, position, now).with_rotation(rotation),
            kind,
            duration_ms,
            radius,
            intensity,
        };
        self.effects.push(effect.clone());
        effect
    }

    pub fn create_explosion(&mut self, position: Vec3, radius: f32, now: u64) -> Effect {
        let duration = self.config.explosion_duration_ms;
        self.spawn(
            EffectKind::Explosion,
            position,
            Vec3::ZERO,
            duration,
            Some(radius),
            Some(1.0),
            now,
        )
    }

    pub fn create_muzzle_flash(&mut self, position: Vec3, rotation: Vec3, now: u64) -> Effect {
        let duration = self.config.muzzle_flash_duration_ms;
        self.spawn(EffectKind::MuzzleFlash, position, rotation, duration, None, Some(0.8), now)
    }

    pub fn create_impact_effect(&mut self, position: Vec3, now: u64) -> Effect {
        let duration = self.config.impact_duration_ms;
        self.spawn(EffectKind::Impact, position, Vec3::ZERO, duration, Some(1.0), None, now)
    }

    /// Remove and return the ids of effects whose age reached their duration.
    /// An effect is reported at most once.
    pub fn update(&mut self, now: u64) -> Vec<EntityId> {
        let mut removed = Vec::new();
        for effect in self.effects.iter_mut() {
            if effect.is_expired(now) && effect.base.deactivate(now) {
                removed.push(effect.base.id.clone());
            }
        }
        self.effects.retain(|e| e.base.active);
        removed
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    fn system() -> EffectSystem {
        EffectSystem::new(GameConfig::default().effects)
    }

    #[test]
    fn test_effect_expires_exactly_at_duration() {
        let mut fx = system();
        let flash = fx.create_muzzle_flash(Vec3::ZERO, Vec3::ZERO, 1000);
        assert!(fx.update(1000 + flash.duration_ms - 1).is_empty());
        assert_eq!(fx.update(1000 + flash.duration_ms), vec![flash.base.id.clone()]);
        assert!(fx.effects().is_empty());
    }

    #[test]
    fn test_expiry_is_reported_once() {
        let mut fx = system();
        fx.create_impact_effect(Vec3::ZERO, 0);
        assert_eq!(fx.update(10_000).len(), 1);
        assert!(fx.update(20_000).is_empty());
    }

    #[test]
    fn test_effects_expire_independently() {
        let mut fx = system();
        let boom = fx.create_explosion(Vec3::ZERO, 20.0, 0);
        let flash = fx.create_muzzle_flash(Vec3::ZERO, Vec3::ZERO, 0);
        let removed = fx.update(flash.duration_ms);
        assert_eq!(removed, vec![flash.base.id]);
        assert_eq!(fx.effects().len(), 1);
        assert_eq!(fx.effects()[0].base.id, boom.base.id);
        assert_eq!(boom.radius, Some(20.0));
    }

    #[test]
    fn test_effect_serde_round_trip() {
        let mut fx = system();
        let boom = fx.create_explosion(Vec3::new(1.0, 2.0, 3.0), 20.0, 77);
        let json = serde_json::to_string(&boom).unwrap();
        assert!(json.contains("\"durationMs\""));
        let back: Effect = serde_json::from_str(&json).unwrap();
        assert_eq!(back, boom);
    }
}
