//! Authoritative simulation orchestrator

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GameConfig;

use super::billboard::{generate_billboards, Billboard};
use super::effects::EffectSystem;
use super::entity::{random_id, EntityId};
use super::events::{BulletRemoval, GameEvent};
use super::math::{terrain_height, Vec3};
use super::physics::PhysicsSystem;
use super::player::{ColorPool, Player};
use super::snapshot::{GameStateSnapshot, SnapshotBuilder, WorldView};
use super::vehicle::{DamageOutcome, Vehicle, VehicleInput, VehicleType};
use super::weapon::{Collision, Weapon, WeaponSystem};

/// Game lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Fewer than the minimum number of players
    Waiting,
    /// Physics, weapons and collisions are live
    Playing,
}

/// Reasons a join request is turned away
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Game is full")]
    GameFull,

    #[error("No player color available")]
    NoColorAvailable,

    #[error("Game server unavailable")]
    Unavailable,
}

impl JoinError {
    /// Machine-readable reason for the wire
    pub fn code(&self) -> &'static str {
        match self {
            JoinError::GameFull => "game_full",
            JoinError::NoColorAvailable => "no_color_available",
            JoinError::Unavailable => "unavailable",
        }
    }
}

/// Everything a newly joined player needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAccepted {
    pub player: Player,
    pub vehicle: Vehicle,
    pub weapons: Vec<Weapon>,
    pub snapshot: GameStateSnapshot,
}

/// Deferred respawn, drained inside the tick
#[derive(Debug, Clone)]
struct PendingRespawn {
    player_id: EntityId,
    vehicle_id: EntityId,
    due_at: u64,
}

/// Owns every entity collection and runs the per-tick sequence.
///
/// All time is passed in as unix milliseconds so ticks can be replayed.
pub struct GameManager {
    config: GameConfig,
    phase: GamePhase,
    tick: u64,
    last_tick_at: Option<u64>,
    players: BTreeMap<EntityId, Player>,
    /// Keyed by owning player id
    vehicles: BTreeMap<EntityId, Vehicle>,
    weapons: WeaponSystem,
    /// Sorted by id
    billboards: Vec<Billboard>,
    effects: EffectSystem,
    colors: ColorPool,
    respawns: Vec<PendingRespawn>,
    rng: ChaCha8Rng,
    snapshot_builder: SnapshotBuilder,
    /// Events produced since the last drain
    outbox: Vec<GameEvent>,
}

impl GameManager {
    pub fn new(config: GameConfig, now: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let billboards = generate_billboards(&mut rng, &config.billboards, &config.world, now);

        info!(
            billboards = billboards.len(),
            seed = config.seed,
            "World generated"
        );

        Self {
            phase: GamePhase::Waiting,
            tick: 0,
            last_tick_at: None,
            players: BTreeMap::new(),
            vehicles: BTreeMap::new(),
            weapons: WeaponSystem::new(),
            billboards,
            effects: EffectSystem::new(config.effects.clone()),
            colors: ColorPool::new(&config.player_colors),
            respawns: Vec::new(),
            rng,
            snapshot_builder: SnapshotBuilder::new(config.snapshot_interval_ticks),
            outbox: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    pub fn vehicle(&self, player_id: &str) -> Option<&Vehicle> {
        self.vehicles.get(player_id)
    }

    pub fn weapons(&self) -> &WeaponSystem {
        &self.weapons
    }

    pub fn billboards(&self) -> &[Billboard] {
        &self.billboards
    }

    pub fn effects(&self) -> &EffectSystem {
        &self.effects
    }

    pub fn available_colors(&self) -> &ColorPool {
        &self.colors
    }

    /// Take the events queued outside a tick (joins, leaves, phase changes)
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Full world state as of now
    pub fn snapshot(&self, now: u64) -> GameStateSnapshot {
        SnapshotBuilder::build(
            WorldView {
                phase: self.phase,
                tick: self.tick,
                players: self.players.values(),
                vehicles: self.vehicles.values(),
                projectiles: self.weapons.projectiles(),
                effects: self.effects.effects(),
                billboards: &self.billboards,
            },
            now,
        )
    }

    // ========================================================================
    // Inbound operations
    // ========================================================================

    /// Admit a player, spawning their vehicle and weapon
    pub fn join_game(
        &mut self,
        player_name: &str,
        vehicle_type: VehicleType,
        now: u64,
    ) -> Result<JoinAccepted, JoinError> {
        if self.players.len() >= self.config.max_players {
            return Err(JoinError::GameFull);
        }
        let color = self.colors.take().ok_or(JoinError::NoColorAvailable)?;

        let player_id = random_id("player");
        let spawn = self.sample_spawn_point();
        let vehicle = Vehicle::new(player_id.clone(), vehicle_type, spawn, now);
        let stats = vehicle.stats();
        self.weapons
            .equip(&player_id, stats.primary_weapon, stats.fire_cooldown_ms());

        let name = player_name.trim();
        let player = Player {
            id: player_id.clone(),
            name: if name.is_empty() {
                format!("Pilot-{}", &player_id[player_id.len() - 4..])
            } else {
                name.to_string()
            },
            vehicle_id: vehicle.base.id.clone(),
            vehicle_type,
            color,
            score: 0,
            kills: 0,
            deaths: 0,
            joined_at: now,
        };

        self.players.insert(player_id.clone(), player.clone());
        self.vehicles.insert(player_id.clone(), vehicle.clone());
        self.outbox.push(GameEvent::PlayerJoined {
            player: player.clone(),
        });

        info!(
            player_id = %player_id,
            name = %player.name,
            vehicle_type = ?vehicle_type,
            player_count = self.players.len(),
            "Player joined"
        );

        self.update_phase();

        Ok(JoinAccepted {
            player,
            vehicle,
            weapons: self.weapons.weapons_for(&player_id),
            snapshot: self.snapshot(now),
        })
    }

    /// Store held input for a player's vehicle. Unknown players and vehicles
    /// awaiting respawn are ignored.
    pub fn handle_input(&mut self, player_id: &str, input: VehicleInput) -> bool {
        match self.vehicles.get_mut(player_id) {
            Some(vehicle) if vehicle.base.active => {
                vehicle.input = input;
                true
            }
            _ => false,
        }
    }

    /// Remove a player with their vehicle, weapons, projectiles and pending respawn
    pub fn disconnect(&mut self, player_id: &str) -> bool {
        let Some(player) = self.players.remove(player_id) else {
            return false;
        };

        self.vehicles.remove(player_id);
        self.respawns.retain(|r| r.player_id != player_id);
        for projectile_id in self.weapons.remove_player(player_id) {
            self.outbox.push(GameEvent::BulletDestroyed {
                projectile_id,
                reason: BulletRemoval::OwnerLeft,
            });
        }
        self.colors.release(player.color);
        self.outbox.push(GameEvent::PlayerLeft {
            player_id: player_id.to_string(),
        });

        info!(
            player_id = %player_id,
            player_count = self.players.len(),
            "Player left"
        );

        self.update_phase();
        true
    }

    /// Respawn a player's vehicle at `position`, or at a random spawn point.
    /// Only an inactive vehicle can be respawned.
    pub fn respawn_player(&mut self, player_id: &str, position: Option<Vec3>, now: u64) -> bool {
        if !self
            .vehicles
            .get(player_id)
            .is_some_and(|v| !v.base.active)
        {
            return false;
        }
        let position = position
            .filter(|p| p.is_finite())
            .unwrap_or_else(|| self.sample_spawn_point());
        let Some(vehicle) = self.vehicles.get_mut(player_id) else {
            return false;
        };
        vehicle.respawn(position, now);

        debug!(player_id = %player_id, "Vehicle respawned");
        self.outbox.push(GameEvent::VehicleRespawned {
            vehicle: vehicle.clone(),
            should_show: true,
        });
        true
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Run one simulation step and return every event it produced,
    /// ending with the snapshot when one is due.
    pub fn tick(&mut self, now: u64) -> Vec<GameEvent> {
        let dt = match self.last_tick_at {
            Some(last) => (now.saturating_sub(last) as f32 / 1000.0).min(self.config.max_tick_delta),
            None => 1.0 / self.config.tick_rate.max(1) as f32,
        };
        self.last_tick_at = Some(now);
        self.tick += 1;

        self.process_respawns(now);

        if self.phase == GamePhase::Playing {
            self.update_vehicles(dt, now);
            self.update_projectiles(dt, now);
        }

        let expired = self.effects.update(now);
        if !expired.is_empty() {
            self.outbox.push(GameEvent::EffectsRemoved {
                effect_ids: expired,
            });
        }

        if self.phase == GamePhase::Playing {
            let collisions = self.weapons.check_collisions(
                self.vehicles.values(),
                &self.billboards,
                self.config.collision.projectile_hit_radius,
            );
            for collision in collisions {
                self.resolve_collision(collision, now);
            }
        }

        if self.snapshot_builder.should_send() {
            let snapshot = self.snapshot(now);
            self.outbox.push(GameEvent::GameStateUpdate(snapshot));
        }

        std::mem::take(&mut self.outbox)
    }

    fn update_phase(&mut self) {
        let count = self.players.len();
        match self.phase {
            GamePhase::Waiting if count >= self.config.min_players_to_start => {
                self.phase = GamePhase::Playing;
                self.snapshot_builder.force_next();
                self.outbox.push(GameEvent::GameStarted {
                    tick: self.tick,
                    player_count: count,
                });
                info!(tick = self.tick, player_count = count, "Game started");
            }
            GamePhase::Playing if count < self.config.min_players_to_start => {
                self.phase = GamePhase::Waiting;
                self.snapshot_builder.force_next();
                self.outbox.push(GameEvent::GameEnded {
                    tick: self.tick,
                    reason: "not_enough_players".to_string(),
                });
                info!(tick = self.tick, player_count = count, "Game ended");
            }
            _ => {}
        }
    }

    fn process_respawns(&mut self, now: u64) {
        if self.respawns.is_empty() {
            return;
        }
        let (due, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.respawns)
                .into_iter()
                .partition(|r| r.due_at <= now);
        self.respawns = pending;

        for entry in due {
            // Stale if the player left or the vehicle came back some other way
            let current = self
                .vehicles
                .get(&entry.player_id)
                .is_some_and(|v| v.base.id == entry.vehicle_id && !v.base.active);
            if !current {
                debug!(player_id = %entry.player_id, "Dropping stale respawn");
                continue;
            }
            self.respawn_player(&entry.player_id, None, now);
        }
    }

    fn update_vehicles(&mut self, dt: f32, now: u64) {
        for vehicle in self.vehicles.values_mut() {
            if !vehicle.base.active {
                continue;
            }

            vehicle.update(dt, &self.config.world, self.config.air_resistance, now);
            PhysicsSystem::resolve_vehicle_billboards(
                vehicle,
                &self.billboards,
                &self.config.collision,
            );

            if !vehicle.input.fire {
                continue;
            }
            let weapon_type = vehicle.stats().primary_weapon;
            if let Some(projectile) = self.weapons.fire_weapon(
                &vehicle.player_id,
                weapon_type,
                vehicle.base.position,
                vehicle.base.rotation,
                now,
            ) {
                let flash = self.effects.create_muzzle_flash(
                    projectile.base.position,
                    projectile.base.rotation,
                    now,
                );
                self.outbox.push(GameEvent::BulletCreated { projectile });
                self.outbox.push(GameEvent::MuzzleFlash {
                    player_id: vehicle.player_id.clone(),
                    effect: flash,
                });
            }
        }
    }

    fn update_projectiles(&mut self, dt: f32, now: u64) {
        for projectile_id in self.weapons.update_projectiles(dt, now) {
            self.outbox.push(GameEvent::BulletDestroyed {
                projectile_id,
                reason: BulletRemoval::Range,
            });
        }
    }

    fn resolve_collision(&mut self, collision: Collision, now: u64) {
        // Already consumed by an earlier collision this tick
        if self
            .weapons
            .remove_projectile(collision.projectile_id())
            .is_none()
        {
            return;
        }
        self.outbox.push(GameEvent::BulletDestroyed {
            projectile_id: collision.projectile_id().to_string(),
            reason: BulletRemoval::Hit,
        });

        match collision {
            Collision::Vehicle {
                shooter_id,
                target_player_id,
                damage,
                point,
                ..
            } => {
                self.effects.create_impact_effect(point, now);
                self.damage_vehicle(&target_player_id, Some(&shooter_id), damage, now);
            }
            Collision::Billboard {
                shooter_id,
                billboard_id,
                damage,
                point,
                ..
            } => {
                self.effects.create_impact_effect(point, now);
                self.damage_billboard(&billboard_id, &shooter_id, damage, point, now);
            }
        }
    }

    /// Apply damage to a player's vehicle, destroying it at zero health.
    /// Returns true if this call destroyed the vehicle.
    pub fn damage_vehicle(
        &mut self,
        target_player_id: &str,
        shooter_id: Option<&str>,
        damage: f32,
        now: u64,
    ) -> bool {
        let Some(vehicle) = self.vehicles.get_mut(target_player_id) else {
            return false;
        };
        // Inactive at full health means it is already back from a respawn cycle
        if vehicle.is_restored() {
            return false;
        }
        if vehicle.take_damage(damage) != DamageOutcome::Lethal {
            return false;
        }
        if !vehicle.destroy(now) {
            return false;
        }

        let vehicle_id = vehicle.base.id.clone();
        let position = vehicle.base.position;

        if let Some(victim) = self.players.get_mut(target_player_id) {
            victim.deaths += 1;
        }
        let killer_id = shooter_id
            .filter(|id| *id != target_player_id)
            .map(str::to_string);
        if let Some(killer) = killer_id.as_deref().and_then(|id| self.players.get_mut(id)) {
            killer.kills += 1;
            killer.score += self.config.kill_score;
        }

        let explosion = self
            .effects
            .create_explosion(position, self.config.effects.explosion_radius, now);
        self.outbox.push(GameEvent::ExplosionCreated { effect: explosion });
        self.outbox.push(GameEvent::VehicleDestroyed {
            vehicle_id: vehicle_id.clone(),
            player_id: target_player_id.to_string(),
            killer_id: killer_id.clone(),
            position,
            should_hide: true,
        });

        if !self.respawns.iter().any(|r| r.player_id == target_player_id) {
            self.respawns.push(PendingRespawn {
                player_id: target_player_id.to_string(),
                vehicle_id,
                due_at: now + self.config.respawn_delay_ms,
            });
        }

        info!(
            player_id = %target_player_id,
            killer_id = ?killer_id,
            "Vehicle destroyed"
        );
        true
    }

    fn damage_billboard(
        &mut self,
        billboard_id: &str,
        shooter_id: &str,
        damage: f32,
        point: Vec3,
        now: u64,
    ) {
        let Some(idx) = self.billboards.iter().position(|b| b.base.id == billboard_id) else {
            return;
        };

        let billboard = &mut self.billboards[idx];
        billboard.add_bullet_hole(point, now);
        if !billboard.take_damage(damage, now) {
            return;
        }

        // Destroyed billboards leave the world for good
        let billboard = self.billboards.remove(idx);
        let debris = billboard.generate_debris(&mut self.rng, self.config.billboards.debris_count);
        let position = billboard.base.position;

        if let Some(shooter) = self.players.get_mut(shooter_id) {
            shooter.score += self.config.billboard_score;
        }

        let explosion = self.effects.create_explosion(
            position,
            self.config.effects.billboard_explosion_radius,
            now,
        );
        self.outbox.push(GameEvent::ExplosionCreated { effect: explosion });
        self.outbox.push(GameEvent::BillboardDestroyed {
            billboard_id: billboard_id.to_string(),
            position,
            destroyed_by: shooter_id.to_string(),
            debris,
        });

        info!(
            billboard_id = %billboard_id,
            shooter_id = %shooter_id,
            remaining = self.billboards.len(),
            "Billboard destroyed"
        );
    }

    /// Random point in the spawn ring, never below the terrain floor
    fn sample_spawn_point(&mut self) -> Vec3 {
        let spawn = &self.config.spawn;
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = self.rng.gen_range(spawn.min_distance..=spawn.max_distance);
        let x = angle.cos() * distance;
        let z = angle.sin() * distance;
        let floor = terrain_height(x, z) + self.config.world.min_flight_altitude;
        let y = self
            .rng
            .gen_range(spawn.min_altitude..=spawn.max_altitude)
            .max(floor);
        Vec3::new(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::weapon::WeaponType;

    const T0: u64 = 1_000_000;

    fn test_config() -> GameConfig {
        let mut config = GameConfig::default();
        config.billboards.count = 0;
        config
    }

    fn count<F: Fn(&GameEvent) -> bool>(events: &[GameEvent], pred: F) -> usize {
        events.iter().filter(|e| pred(e)).count()
    }

    /// Two players in a live game, outbox drained
    fn playing_manager() -> (GameManager, EntityId, EntityId) {
        let mut manager = GameManager::new(test_config(), T0);
        let a = manager.join_game("Alpha", VehicleType::Fighter, T0).unwrap();
        let b = manager.join_game("Bravo", VehicleType::Heavy, T0).unwrap();
        manager.drain_events();
        (manager, a.player.id, b.player.id)
    }

    #[test]
    fn test_join_returns_vehicle_and_weapon() {
        let mut manager = GameManager::new(test_config(), T0);
        let accepted = manager.join_game("  Ace  ", VehicleType::Heavy, T0).unwrap();

        assert_eq!(accepted.player.name, "Ace");
        assert_eq!(accepted.vehicle.player_id, accepted.player.id);
        assert_eq!(accepted.weapons.len(), 1);
        assert_eq!(accepted.weapons[0].weapon_type, WeaponType::Cannon);
        assert_eq!(accepted.snapshot.players.len(), 1);
        assert_eq!(manager.phase(), GamePhase::Waiting);

        let events = manager.drain_events();
        assert_eq!(count(&events, |e| matches!(e, GameEvent::PlayerJoined { .. })), 1);
    }

    #[test]
    fn test_blank_name_gets_generated() {
        let mut manager = GameManager::new(test_config(), T0);
        let accepted = manager.join_game("   ", VehicleType::Fighter, T0).unwrap();
        assert!(accepted.player.name.starts_with("Pilot-"));
    }

    #[test]
    fn test_second_join_starts_game_once() {
        let mut manager = GameManager::new(test_config(), T0);
        manager.join_game("Alpha", VehicleType::Fighter, T0).unwrap();
        manager.join_game("Bravo", VehicleType::Fighter, T0).unwrap();
        manager.join_game("Charlie", VehicleType::Fighter, T0).unwrap();

        let events = manager.drain_events();
        assert_eq!(manager.phase(), GamePhase::Playing);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::GameStarted { .. })), 1);
    }

    #[test]
    fn test_join_rejected_when_full() {
        let mut config = test_config();
        config.max_players = 2;
        let mut manager = GameManager::new(config, T0);
        manager.join_game("Alpha", VehicleType::Fighter, T0).unwrap();
        manager.join_game("Bravo", VehicleType::Fighter, T0).unwrap();

        let err = manager
            .join_game("Charlie", VehicleType::Fighter, T0)
            .unwrap_err();
        assert_eq!(err, JoinError::GameFull);
        assert_eq!(manager.player_count(), 2);
    }

    #[test]
    fn test_join_rejected_without_color() {
        let mut config = test_config();
        config.player_colors = vec!["#ffffff".to_string()];
        let mut manager = GameManager::new(config, T0);
        manager.join_game("Alpha", VehicleType::Fighter, T0).unwrap();

        let err = manager
            .join_game("Bravo", VehicleType::Fighter, T0)
            .unwrap_err();
        assert_eq!(err, JoinError::NoColorAvailable);
        assert_eq!(err.code(), "no_color_available");
    }

    #[test]
    fn test_disconnect_ends_game_once_and_returns_color() {
        let (mut manager, a, b) = playing_manager();
        let color = manager.player(&a).unwrap().color.clone();
        assert!(!manager.available_colors().contains(&color));

        assert!(manager.disconnect(&a));
        assert!(!manager.disconnect(&a));
        assert!(manager.disconnect(&b));

        let events = manager.drain_events();
        assert_eq!(manager.phase(), GamePhase::Waiting);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::GameEnded { .. })), 1);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::PlayerLeft { .. })), 2);
        assert!(manager.available_colors().contains(&color));
        assert!(manager.vehicle(&a).is_none());
    }

    #[test]
    fn test_disconnect_removes_owned_projectiles() {
        let (mut manager, a, _) = playing_manager();
        manager.handle_input(
            &a,
            VehicleInput {
                fire: true,
                ..Default::default()
            },
        );
        manager.tick(T0);
        assert_eq!(manager.weapons().projectiles().len(), 1);

        manager.disconnect(&a);
        let events = manager.drain_events();
        assert!(manager.weapons().projectiles().is_empty());
        assert_eq!(
            count(&events, |e| matches!(
                e,
                GameEvent::BulletDestroyed {
                    reason: BulletRemoval::OwnerLeft,
                    ..
                }
            )),
            1
        );
    }

    #[test]
    fn test_lethal_damage_destroys_then_respawns() {
        let (mut manager, a, b) = playing_manager();
        manager.vehicles.get_mut(&b).unwrap().health = 10.0;

        assert!(manager.damage_vehicle(&b, Some(&a), 15.0, T0));
        let events = manager.drain_events();
        assert_eq!(
            count(&events, |e| matches!(
                e,
                GameEvent::VehicleDestroyed {
                    should_hide: true,
                    ..
                }
            )),
            1
        );
        assert_eq!(count(&events, |e| matches!(e, GameEvent::ExplosionCreated { .. })), 1);

        let vehicle = manager.vehicle(&b).unwrap();
        assert!(!vehicle.base.active);
        assert_eq!(vehicle.health, 0.0);
        assert_eq!(manager.player(&a).unwrap().kills, 1);
        assert_eq!(manager.player(&a).unwrap().score, manager.config().kill_score);
        assert_eq!(manager.player(&b).unwrap().deaths, 1);

        // Input is ignored while destroyed
        assert!(!manager.handle_input(&b, VehicleInput::default()));

        // Not yet due
        let events = manager.tick(T0 + 10);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::VehicleRespawned { .. })), 0);

        let due = T0 + manager.config().respawn_delay_ms;
        let events = manager.tick(due);
        assert_eq!(
            count(&events, |e| matches!(
                e,
                GameEvent::VehicleRespawned {
                    should_show: true,
                    ..
                }
            )),
            1
        );
        let vehicle = manager.vehicle(&b).unwrap();
        assert!(vehicle.base.active);
        assert_eq!(vehicle.health, vehicle.max_health);
    }

    #[test]
    fn test_double_hit_destroys_once() {
        let (mut manager, a, b) = playing_manager();
        manager.vehicles.get_mut(&b).unwrap().health = 10.0;

        assert!(manager.damage_vehicle(&b, Some(&a), 15.0, T0));
        assert!(!manager.damage_vehicle(&b, Some(&a), 15.0, T0));

        let events = manager.drain_events();
        assert_eq!(count(&events, |e| matches!(e, GameEvent::VehicleDestroyed { .. })), 1);
        assert_eq!(manager.respawns.len(), 1);
        assert_eq!(manager.player(&a).unwrap().kills, 1);
        assert_eq!(manager.player(&b).unwrap().deaths, 1);

        let due = T0 + manager.config().respawn_delay_ms;
        let events = manager.tick(due);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::VehicleRespawned { .. })), 1);
    }

    #[test]
    fn test_full_health_vehicle_is_never_destroyed_by_small_hit() {
        let (mut manager, a, b) = playing_manager();
        assert!(!manager.damage_vehicle(&b, Some(&a), 5.0, T0));
        let vehicle = manager.vehicle(&b).unwrap();
        assert!(vehicle.base.active);
        assert_eq!(vehicle.health, vehicle.max_health - 5.0);
        assert!(manager.drain_events().is_empty());
    }

    #[test]
    fn test_self_kill_does_not_score() {
        let (mut manager, a, _) = playing_manager();
        assert!(manager.damage_vehicle(&a, Some(&a), 10_000.0, T0));

        let player = manager.player(&a).unwrap();
        assert_eq!(player.kills, 0);
        assert_eq!(player.score, 0);
        assert_eq!(player.deaths, 1);

        let events = manager.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::VehicleDestroyed { killer_id: None, .. }
        )));
    }

    #[test]
    fn test_stale_respawn_dropped_after_disconnect() {
        let (mut manager, a, b) = playing_manager();
        manager.damage_vehicle(&b, Some(&a), 10_000.0, T0);
        manager.disconnect(&b);
        manager.drain_events();

        let due = T0 + manager.config().respawn_delay_ms;
        let events = manager.tick(due);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::VehicleRespawned { .. })), 0);
        assert!(manager.respawns.is_empty());
    }

    #[test]
    fn test_manual_respawn_only_for_inactive_vehicle() {
        let (mut manager, a, b) = playing_manager();
        assert!(!manager.respawn_player(&b, None, T0));

        manager.damage_vehicle(&b, Some(&a), 10_000.0, T0);
        let spot = Vec3::new(10.0, 120.0, 10.0);
        assert!(manager.respawn_player(&b, Some(spot), T0 + 1));
        assert_eq!(manager.vehicle(&b).unwrap().base.position, spot);

        // The scheduled entry is now stale
        manager.drain_events();
        let due = T0 + manager.config().respawn_delay_ms;
        let events = manager.tick(due);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::VehicleRespawned { .. })), 0);
    }

    #[test]
    fn test_respawn_ignores_non_finite_position() {
        let (mut manager, a, b) = playing_manager();
        manager.damage_vehicle(&b, Some(&a), 10_000.0, T0);
        let bad = Vec3::new(f32::NAN, 100.0, 0.0);
        assert!(manager.respawn_player(&b, Some(bad), T0 + 1));

        let position = manager.vehicle(&b).unwrap().base.position;
        assert!(position.is_finite());
        assert!(position.y >= manager.config().spawn.min_altitude);
    }

    #[test]
    fn test_held_fire_respects_cooldown() {
        let (mut manager, a, _) = playing_manager();
        manager.handle_input(
            &a,
            VehicleInput {
                fire: true,
                ..Default::default()
            },
        );

        let events = manager.tick(T0);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::BulletCreated { .. })), 1);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::MuzzleFlash { .. })), 1);

        let events = manager.tick(T0 + 16);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::BulletCreated { .. })), 0);

        let events = manager.tick(T0 + 200);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::BulletCreated { .. })), 1);
    }

    #[test]
    fn test_no_fire_while_waiting() {
        let mut manager = GameManager::new(test_config(), T0);
        let a = manager.join_game("Solo", VehicleType::Fighter, T0).unwrap();
        manager.handle_input(
            &a.player.id,
            VehicleInput {
                fire: true,
                ..Default::default()
            },
        );
        let events = manager.tick(T0);
        assert_eq!(count(&events, |e| matches!(e, GameEvent::BulletCreated { .. })), 0);
        assert!(manager.weapons().projectiles().is_empty());
    }

    /// Billboard centered at (0, 100, 0) and a bullet spawned inside it
    fn billboard_target(manager: &mut GameManager, shooter: &str, health: f32) {
        let mut billboard = Billboard::new(
            "billboard_000".to_string(),
            Vec3::new(0.0, 100.0, 0.0),
            0.0,
            &manager.config.billboards,
            T0,
        );
        billboard.health = health;
        manager.billboards.push(billboard);

        // Muzzle offset (0, -0.5, 4) puts the bullet at the board center
        manager
            .weapons
            .fire_weapon(shooter, WeaponType::MachineGun, Vec3::new(0.0, 100.5, -4.0), Vec3::ZERO, T0)
            .unwrap();
        // Zero delta so nothing moves before collision checks
        manager.last_tick_at = Some(T0);
    }

    #[test]
    fn test_bullet_hits_billboard() {
        let (mut manager, a, _) = playing_manager();
        billboard_target(&mut manager, &a, 200.0);

        let events = manager.tick(T0);
        assert_eq!(
            count(&events, |e| matches!(
                e,
                GameEvent::BulletDestroyed {
                    reason: BulletRemoval::Hit,
                    ..
                }
            )),
            1
        );
        assert_eq!(count(&events, |e| matches!(e, GameEvent::VehicleDestroyed { .. })), 0);
        assert!(manager.weapons().projectiles().is_empty());

        let billboard = &manager.billboards()[0];
        assert_eq!(billboard.bullet_holes.len(), 1);
        assert_eq!(billboard.health, 190.0);
        assert!(manager.vehicles.values().all(|v| v.health == v.max_health));
    }

    #[test]
    fn test_billboard_destroyed_scores_shooter() {
        let (mut manager, a, _) = playing_manager();
        billboard_target(&mut manager, &a, 5.0);

        let events = manager.tick(T0);
        let destroyed = events.iter().find_map(|e| match e {
            GameEvent::BillboardDestroyed {
                billboard_id,
                destroyed_by,
                debris,
                ..
            } => Some((billboard_id.clone(), destroyed_by.clone(), debris.len())),
            _ => None,
        });
        assert_eq!(
            destroyed,
            Some((
                "billboard_000".to_string(),
                a.clone(),
                manager.config().billboards.debris_count
            ))
        );
        assert!(manager.billboards().is_empty());
        assert_eq!(
            manager.player(&a).unwrap().score,
            manager.config().billboard_score
        );
    }

    /// Move every vehicle well clear of the firing lanes near the origin
    fn park_vehicles(manager: &mut GameManager) {
        for (i, vehicle) in manager.vehicles.values_mut().enumerate() {
            vehicle.base.position = Vec3::new(600.0, 100.0, 600.0 - 100.0 * i as f32);
            vehicle.base.velocity = Vec3::ZERO;
        }
    }

    /// Tick `ticks` frames of 16 ms after `T0`, collecting every event
    fn run_frames(manager: &mut GameManager, ticks: u64) -> Vec<GameEvent> {
        manager.last_tick_at = Some(T0);
        (1..=ticks).flat_map(|i| manager.tick(T0 + 16 * i)).collect()
    }

    fn hits(events: &[GameEvent]) -> usize {
        count(events, |e| {
            matches!(
                e,
                GameEvent::BulletDestroyed {
                    reason: BulletRemoval::Hit,
                    ..
                }
            )
        })
    }

    #[test]
    fn test_distant_shot_hits_thin_billboard_at_any_offset() {
        for z in [46.0, 47.0, 48.0, 49.0, 50.0, 51.0, 75.0] {
            let (mut manager, a, _) = playing_manager();
            park_vehicles(&mut manager);
            manager.billboards.push(Billboard::new(
                "billboard_000".to_string(),
                Vec3::new(0.0, 100.0, z),
                0.0,
                &manager.config.billboards,
                T0,
            ));
            // Muzzle puts the bullet at (0, 100, 4), 6.4 units per frame along +z
            manager
                .weapons
                .fire_weapon(&a, WeaponType::MachineGun, Vec3::new(0.0, 100.5, 0.0), Vec3::ZERO, T0)
                .unwrap();

            let events = run_frames(&mut manager, 60);
            assert_eq!(hits(&events), 1, "board at z={z}");
            assert!(manager.weapons().projectiles().is_empty());

            let billboard = &manager.billboards()[0];
            assert_eq!(billboard.bullet_holes.len(), 1, "board at z={z}");
            let hole = billboard.bullet_holes[0].offset;
            assert!((hole.z + 1.0).abs() < 1e-3, "hole {hole:?} for board at z={z}");
            assert!(hole.x.abs() < 1e-3 && hole.y.abs() < 1e-3);
            assert_eq!(billboard.health, 190.0);
            assert!(manager.vehicles.values().all(|v| v.health == v.max_health));
        }
    }

    #[test]
    fn test_shot_across_turned_billboard_hits_thin_side() {
        let (mut manager, a, _) = playing_manager();
        park_vehicles(&mut manager);
        manager.billboards.push(Billboard::new(
            "billboard_000".to_string(),
            Vec3::new(0.0, 100.0, 0.0),
            std::f32::consts::FRAC_PI_2,
            &manager.config.billboards,
            T0,
        ));
        // Yawed a quarter turn the bullet starts at (-46, 100, 0) heading along +x
        let yaw = Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0);
        manager
            .weapons
            .fire_weapon(&a, WeaponType::MachineGun, Vec3::new(-50.0, 100.5, 0.0), yaw, T0)
            .unwrap();

        let events = run_frames(&mut manager, 30);
        assert_eq!(hits(&events), 1);

        // The turned board is 2 units thick along x, not 40 wide
        let hole = manager.billboards()[0].bullet_holes[0].offset;
        assert!((hole.x + 1.0).abs() < 1e-2, "hole {hole:?}");
        assert!(hole.z.abs() < 1e-2);
    }

    #[test]
    fn test_tick_emits_snapshot_last() {
        let (mut manager, _, _) = playing_manager();
        let events = manager.tick(T0);
        assert!(matches!(events.last(), Some(GameEvent::GameStateUpdate(_))));
        assert_eq!(manager.tick_count(), 1);
    }

    #[test]
    fn test_same_seed_same_world() {
        let mut config = GameConfig::default();
        config.billboards.count = 6;
        let first = GameManager::new(config.clone(), T0);
        let second = GameManager::new(config, T0);
        assert_eq!(first.billboards(), second.billboards());
    }
}
