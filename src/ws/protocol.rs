//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::manager::{JoinAccepted, JoinError};
use crate::game::player::Player;
use crate::game::snapshot::GameStateSnapshot;
use crate::game::vehicle::Vehicle;
use crate::game::weapon::Weapon;
use crate::game::{GameEvent, VehicleInput, VehicleType};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Request to enter the game
    JoinGame {
        #[serde(default)]
        player_name: String,
        #[serde(default = "default_vehicle_type")]
        vehicle_type: VehicleType,
    },

    /// Held control input, replaces the previous input
    PlayerInput { inputs: VehicleInput },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the game but keep the connection
    Leave,
}

fn default_vehicle_type() -> VehicleType {
    VehicleType::Fighter
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { server_time: u64 },

    /// Outcome of a joinGame request
    JoinResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        player: Option<Player>,
        #[serde(skip_serializing_if = "Option::is_none")]
        vehicle: Option<Vehicle>,
        #[serde(skip_serializing_if = "Option::is_none")]
        weapons: Option<Vec<Weapon>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        snapshot: Option<GameStateSnapshot>,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },

    /// Error message
    Error { code: String, message: String },
}

impl ServerMsg {
    pub fn join_result(result: Result<JoinAccepted, JoinError>) -> Self {
        match result {
            Ok(accepted) => ServerMsg::JoinResult {
                success: true,
                reason: None,
                player: Some(accepted.player),
                vehicle: Some(accepted.vehicle),
                weapons: Some(accepted.weapons),
                snapshot: Some(accepted.snapshot),
            },
            Err(e) => ServerMsg::JoinResult {
                success: false,
                reason: Some(e.code().to_string()),
                player: None,
                vehicle: None,
                weapons: None,
                snapshot: None,
            },
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Serialize a server message or a broadcast game event to a text frame
pub fn encode<T: Serialize>(msg: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

/// Everything a connection writes to its socket
#[derive(Debug, Clone)]
pub enum Outbound {
    Direct(ServerMsg),
    Event(GameEvent),
}

impl Outbound {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Outbound::Direct(msg) => encode(msg),
            Outbound::Event(event) => encode(event),
        }
    }
}
