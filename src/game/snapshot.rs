//! World snapshot building

use serde::{Deserialize, Serialize};

use super::billboard::Billboard;
use super::effects::Effect;
use super::entity::active_clones;
use super::manager::GamePhase;
use super::player::Player;
use super::projectile::Projectile;
use super::vehicle::Vehicle;

/// Full authoritative world state. Inactive entities are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSnapshot {
    pub phase: GamePhase,
    pub tick: u64,
    pub timestamp: u64,
    pub players: Vec<Player>,
    pub vehicles: Vec<Vehicle>,
    pub projectiles: Vec<Projectile>,
    pub effects: Vec<Effect>,
    pub billboards: Vec<Billboard>,
}

/// Borrowed view of the world used to build a snapshot
pub struct WorldView<'a, P, V>
where
    P: IntoIterator<Item = &'a Player>,
    V: IntoIterator<Item = &'a Vehicle>,
{
    pub phase: GamePhase,
    pub tick: u64,
    pub players: P,
    pub vehicles: V,
    pub projectiles: &'a [Projectile],
    pub effects: &'a [Effect],
    pub billboards: &'a [Billboard],
}

/// Decides when to broadcast and builds snapshots
pub struct SnapshotBuilder {
    /// Ticks since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        let snapshot_interval = snapshot_interval.max(1);
        Self {
            // First tick always broadcasts
            ticks_since_snapshot: snapshot_interval - 1,
            snapshot_interval,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for important events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    pub fn build<'a, P, V>(view: WorldView<'a, P, V>, timestamp: u64) -> GameStateSnapshot
    where
        P: IntoIterator<Item = &'a Player>,
        V: IntoIterator<Item = &'a Vehicle>,
    {
        GameStateSnapshot {
            phase: view.phase,
            tick: view.tick,
            timestamp,
            players: view.players.into_iter().cloned().collect(),
            vehicles: active_clones(view.vehicles),
            projectiles: active_clones(view.projectiles),
            effects: active_clones(view.effects),
            billboards: view
                .billboards
                .iter()
                .filter(|b| !b.is_destroyed)
                .cloned()
                .collect(),
        }
    }
}
