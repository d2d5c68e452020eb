//! Player identity, scoring and the color pool

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::entity::EntityId;
use super::vehicle::VehicleType;

/// Connected player bound to one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: EntityId,
    pub name: String,
    pub vehicle_id: EntityId,
    pub vehicle_type: VehicleType,
    pub color: String,
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,
    pub joined_at: u64,
}

/// Finite set of colors; each connected player holds a distinct one
#[derive(Debug, Clone)]
pub struct ColorPool {
    available: VecDeque<String>,
}

impl ColorPool {
    pub fn new(colors: &[String]) -> Self {
        let mut available = VecDeque::with_capacity(colors.len());
        for color in colors {
            if !available.contains(color) {
                available.push_back(color.clone());
            }
        }
        Self { available }
    }

    pub fn take(&mut self) -> Option<String> {
        self.available.pop_front()
    }

    /// Return a color to the back of the pool
    pub fn release(&mut self, color: String) {
        if !self.available.contains(&color) {
            self.available.push_back(color);
        }
    }

    pub fn contains(&self, color: &str) -> bool {
        self.available.iter().any(|c| c == color)
    }
}
