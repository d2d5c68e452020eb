//! Aerial Combat Server - authoritative simulation for multiplayer vehicle combat
//!
//! The [`game`] module holds the simulation core: entities, physics, weapons,
//! collision resolution and the fixed-rate loop. The remaining modules are the
//! service boundary around it:
//! - WebSocket protocol and connection handling
//! - HTTP health endpoint
//! - Configuration and shared utilities

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
