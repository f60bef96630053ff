//! Server status snapshot for presence-style consumers

use crate::clock::GameTime;
use crate::player::PlayerRecord;
use serde::{Deserialize, Serialize};

/// Game clock plus who is online
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStatus {
    #[serde(rename = "gametime")]
    pub game_time: GameTime,
    /// Number of players online
    pub players: usize,
    /// Display names, in list order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub online: Vec<String>,
}

impl GameStatus {
    pub fn new(game_time: GameTime, players: &[PlayerRecord]) -> Self {
        Self {
            game_time,
            players: players.len(),
            online: players.iter().map(|p| p.name.clone()).collect(),
        }
    }
}
