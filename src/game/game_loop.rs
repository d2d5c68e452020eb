//! Fixed-rate loop task that owns the GameManager

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::GameConfig;
use crate::util::time::{unix_millis, Timer};

use super::entity::EntityId;
use super::events::GameEvent;
use super::manager::{GameManager, GamePhase, JoinAccepted, JoinError};
use super::vehicle::{VehicleInput, VehicleType};

/// Requests arriving from connections, applied at the start of a tick
#[derive(Debug)]
pub enum GameCommand {
    Join {
        player_name: String,
        vehicle_type: VehicleType,
        reply: oneshot::Sender<Result<JoinAccepted, JoinError>>,
    },
    Input {
        player_id: EntityId,
        input: VehicleInput,
    },
    Disconnect {
        player_id: EntityId,
    },
}

/// Counters published by the loop for health reporting
#[derive(Debug, Default)]
pub struct LoopStats {
    player_count: AtomicUsize,
    tick: AtomicU64,
    playing: AtomicBool,
    failed_ticks: AtomicU64,
}

impl LoopStats {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    pub fn phase(&self) -> GamePhase {
        if self.playing.load(Ordering::Relaxed) {
            GamePhase::Playing
        } else {
            GamePhase::Waiting
        }
    }

    pub fn failed_ticks(&self) -> u64 {
        self.failed_ticks.load(Ordering::Relaxed)
    }

    fn publish(&self, manager: &GameManager) {
        self.player_count
            .store(manager.player_count(), Ordering::Relaxed);
        self.tick.store(manager.tick_count(), Ordering::Relaxed);
        self.playing
            .store(manager.phase() == GamePhase::Playing, Ordering::Relaxed);
    }
}

/// Cloneable handle used by connections to talk to the loop
#[derive(Clone)]
pub struct GameHandle {
    command_tx: mpsc::Sender<GameCommand>,
    events_tx: broadcast::Sender<GameEvent>,
    stats: Arc<LoopStats>,
}

impl GameHandle {
    /// Ask the loop to admit a player; resolved on the next tick
    pub async fn join(
        &self,
        player_name: String,
        vehicle_type: VehicleType,
    ) -> Result<JoinAccepted, JoinError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(GameCommand::Join {
                player_name,
                vehicle_type,
                reply,
            })
            .await
            .map_err(|_| JoinError::Unavailable)?;
        rx.await.map_err(|_| JoinError::Unavailable)?
    }

    /// Queue held input; dropped silently if the loop is gone
    pub async fn send_input(&self, player_id: EntityId, input: VehicleInput) {
        if self
            .command_tx
            .send(GameCommand::Input { player_id, input })
            .await
            .is_err()
        {
            debug!("Game loop closed, input dropped");
        }
    }

    pub async fn disconnect(&self, player_id: EntityId) {
        if self
            .command_tx
            .send(GameCommand::Disconnect { player_id })
            .await
            .is_err()
        {
            debug!("Game loop closed, disconnect dropped");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events_tx.subscribe()
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }
}

/// The authoritative game loop
pub struct GameLoop {
    manager: GameManager,
    command_rx: mpsc::Receiver<GameCommand>,
    events_tx: broadcast::Sender<GameEvent>,
    stats: Arc<LoopStats>,
    tick_duration: Duration,
}

impl GameLoop {
    pub fn new(config: GameConfig) -> (Self, GameHandle) {
        let (command_tx, command_rx) = mpsc::channel(1024);
        let (events_tx, _) = broadcast::channel(256);
        let stats = Arc::new(LoopStats::default());

        let handle = GameHandle {
            command_tx,
            events_tx: events_tx.clone(),
            stats: stats.clone(),
        };

        let tick_duration = Duration::from_micros(config.tick_micros());
        let game_loop = Self {
            manager: GameManager::new(config, unix_millis()),
            command_rx,
            events_tx,
            stats,
            tick_duration,
        };

        (game_loop, handle)
    }

    /// Run until every handle has been dropped
    pub async fn run(mut self) {
        info!(
            tick_ms = self.tick_duration.as_millis() as u64,
            "Game loop started"
        );

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            if !self.process_commands() {
                break;
            }

            let timer = Timer::new();
            let now = unix_millis();
            match catch_unwind(AssertUnwindSafe(|| self.manager.tick(now))) {
                Ok(events) => self.broadcast(events),
                Err(_) => {
                    self.stats.failed_ticks.fetch_add(1, Ordering::Relaxed);
                    error!(tick = self.manager.tick_count(), "Tick failed, continuing");
                }
            }

            self.stats.publish(&self.manager);

            let elapsed = timer.elapsed_micros();
            if elapsed > self.tick_duration.as_micros() as u64 {
                warn!(
                    tick = self.manager.tick_count(),
                    elapsed_us = elapsed,
                    "Tick overran its interval"
                );
            }
        }

        info!("Game loop stopped");
    }

    /// Drain queued commands. Returns false once all senders are gone.
    fn process_commands(&mut self) -> bool {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.apply(command),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn apply(&mut self, command: GameCommand) {
        let now = unix_millis();
        match command {
            GameCommand::Join {
                player_name,
                vehicle_type,
                reply,
            } => {
                let result = self.manager.join_game(&player_name, vehicle_type, now);
                // Requester hung up before the reply: undo the join
                if let Err(Ok(accepted)) = reply.send(result) {
                    self.manager.disconnect(&accepted.player.id);
                }
            }
            GameCommand::Input { player_id, input } => {
                self.manager.handle_input(&player_id, input);
            }
            GameCommand::Disconnect { player_id } => {
                self.manager.disconnect(&player_id);
            }
        }
        let events = self.manager.drain_events();
        self.broadcast(events);
    }

    fn broadcast(&self, events: Vec<GameEvent>) {
        for event in events {
            // No subscribers is fine
            let _ = self.events_tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> GameConfig {
        let mut config = GameConfig::default();
        config.billboards.count = 2;
        config.tick_rate = 100;
        config
    }

    #[tokio::test]
    async fn test_join_through_handle() {
        let (game_loop, handle) = GameLoop::new(small_config());
        let task = tokio::spawn(game_loop.run());

        let mut events = handle.subscribe();
        let accepted = tokio_test::assert_ok!(handle.join("Ace".to_string(), VehicleType::Fighter).await);
        assert_eq!(accepted.player.name, "Ace");
        assert_eq!(accepted.weapons.len(), 1);

        // Snapshots from earlier ticks may arrive first
        let joined = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(GameEvent::PlayerJoined { player }) = events.recv().await {
                    return player;
                }
            }
        })
        .await
        .expect("playerJoined should be broadcast");
        assert_eq!(joined.id, accepted.player.id);

        drop(events);
        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_loop_stops_when_handles_dropped() {
        let (game_loop, handle) = GameLoop::new(small_config());
        drop(handle);
        tokio::time::timeout(Duration::from_secs(2), game_loop.run())
            .await
            .expect("loop should stop");
    }
}
