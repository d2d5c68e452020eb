//! Game simulation modules

pub mod billboard;
pub mod effects;
pub mod entity;
pub mod events;
pub mod game_loop;
pub mod manager;
pub mod math;
pub mod physics;
pub mod player;
pub mod projectile;
pub mod snapshot;
pub mod vehicle;
pub mod weapon;

pub use events::{BulletRemoval, GameEvent};
pub use game_loop::{GameCommand, GameHandle, GameLoop};
pub use manager::{GameManager, GamePhase, JoinAccepted, JoinError};
pub use vehicle::{VehicleInput, VehicleType};
