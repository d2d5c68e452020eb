//! WebSocket boundary: wire protocol and connection handling

pub mod handler;
pub mod protocol;
