//! Outbound events handed to the broadcast boundary

use serde::{Deserialize, Serialize};

use super::billboard::Debris;
use super::effects::Effect;
use super::entity::EntityId;
use super::math::Vec3;
use super::player::Player;
use super::projectile::Projectile;
use super::snapshot::GameStateSnapshot;
use super::vehicle::Vehicle;

/// Why a projectile left the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BulletRemoval {
    /// Travelled past its range
    Range,
    /// Struck a vehicle or billboard
    Hit,
    /// Owner disconnected
    OwnerLeft,
}

/// Everything the simulation tells the outside world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameEvent {
    GameStarted {
        tick: u64,
        player_count: usize,
    },
    GameEnded {
        tick: u64,
        reason: String,
    },
    GameStateUpdate(GameStateSnapshot),
    PlayerJoined {
        player: Player,
    },
    PlayerLeft {
        player_id: EntityId,
    },
    BulletCreated {
        projectile: Projectile,
    },
    BulletDestroyed {
        projectile_id: EntityId,
        reason: BulletRemoval,
    },
    MuzzleFlash {
        player_id: EntityId,
        effect: Effect,
    },
    ExplosionCreated {
        effect: Effect,
    },
    EffectsRemoved {
        effect_ids: Vec<EntityId>,
    },
    VehicleDestroyed {
        vehicle_id: EntityId,
        player_id: EntityId,
        killer_id: Option<EntityId>,
        position: Vec3,
        should_hide: bool,
    },
    VehicleRespawned {
        vehicle: Vehicle,
        should_show: bool,
    },
    BillboardDestroyed {
        billboard_id: EntityId,
        position: Vec3,
        destroyed_by: EntityId,
        debris: Vec<Debris>,
    },
}

impl GameEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::GameStarted { .. } => "gameStarted",
            GameEvent::GameEnded { .. } => "gameEnded",
            GameEvent::GameStateUpdate(_) => "gameStateUpdate",
            GameEvent::PlayerJoined { .. } => "playerJoined",
            GameEvent::PlayerLeft { .. } => "playerLeft",
            GameEvent::BulletCreated { .. } => "bulletCreated",
            GameEvent::BulletDestroyed { .. } => "bulletDestroyed",
            GameEvent::MuzzleFlash { .. } => "muzzleFlash",
            GameEvent::ExplosionCreated { .. } => "explosionCreated",
            GameEvent::EffectsRemoved { .. } => "effectsRemoved",
            GameEvent::VehicleDestroyed { .. } => "vehicleDestroyed",
            GameEvent::VehicleRespawned { .. } => "vehicleRespawned",
            GameEvent::BillboardDestroyed { .. } => "billboardDestroyed",
        }
    }
}
