//! Application state shared across routes

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::game::{GameHandle, GameLoop};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game: GameHandle,
}

impl AppState {
    /// Build the state and spawn the game loop that backs it.
    /// The loop stops once every clone of the state is dropped.
    pub fn new(config: Config) -> (Self, JoinHandle<()>) {
        let config = Arc::new(config);

        let (game_loop, game) = GameLoop::new(config.game.clone());
        let loop_task = tokio::spawn(game_loop.run());

        (Self { config, game }, loop_task)
    }
}
