//! Player records parsed from `lp` (list players) output
//!
//! A body line looks like
//! `0. id=171, Bob, pos=(-1361.5, 35.0, -231.2), rot=(0, 90, 0), health=100, ...`.
//! The leading `<n>. ` index is discarded, the field at position 1 is the
//! display name, and every other field is a `key=value` pair.

use crate::error::{ConsoleError, Result};
use crate::fields::split_fields;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Platform id prefix for Steam accounts
pub const STEAM_PREFIX: &str = "Steam_";

/// World position of a player
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One player as reported by the console
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlayerRecord {
    /// In-game entity id
    pub id: i64,
    /// Display name
    pub name: String,
    pub position: Position,
    pub health: i32,
    pub deaths: i32,
    /// Zombie kills
    pub zombies: i32,
    /// Player kills
    pub players: i32,
    pub score: i32,
    pub level: i32,
    /// Platform identity, e.g. `Steam_76561199027850677`
    pub platform_id: String,
    /// Cross-platform identity, e.g. `EOS_0002fb4f...`
    pub cross_id: String,
    pub ip: String,
    /// Round trip time in milliseconds
    pub ping: i32,
}

impl PlayerRecord {
    /// Steam id without its platform prefix, if this is a Steam account
    pub fn steam_id(&self) -> Option<&str> {
        self.platform_id.strip_prefix(STEAM_PREFIX)
    }

    /// Render the record in the `lp` body layout
    pub fn to_console_line(&self, index: usize) -> String {
        let Position { x, y, z } = self.position;
        format!(
            "{}. id={}, {}, pos=({}, {}, {}), health={}, deaths={}, zombies={}, players={}, score={}, level={}, pltfmid={}, crossid={}, ip={}, ping={}",
            index,
            self.id,
            self.name,
            x,
            y,
            z,
            self.health,
            self.deaths,
            self.zombies,
            self.players,
            self.score,
            self.level,
            self.platform_id,
            self.cross_id,
            self.ip,
            self.ping
        )
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "id" => self.id = lenient_int(key, value),
            "pos" => self.position = parse_position(value),
            "health" => self.health = lenient_int(key, value),
            "deaths" => self.deaths = lenient_int(key, value),
            "zombies" => self.zombies = lenient_int(key, value),
            "players" => self.players = lenient_int(key, value),
            "score" => self.score = lenient_int(key, value),
            "level" => self.level = lenient_int(key, value),
            "pltfmid" => self.platform_id = value.to_string(),
            "crossid" => self.cross_id = value.to_string(),
            "ip" => self.ip = value.to_string(),
            "ping" => self.ping = lenient_int(key, value),
            // Unknown keys (rot, remote, ...) are skipped so newer servers keep parsing
            _ => {}
        }
    }
}

/// Parse one body line of `lp` output.
///
/// Unknown keys are ignored and malformed numbers fall back to zero. A field
/// that is neither the name slot nor a `key=value` pair fails the whole line.
pub fn parse_player_line(line: &str) -> Result<PlayerRecord> {
    let line = line.trim();
    let body = strip_list_index(line).trim_start();
    if body.is_empty() {
        return Err(ConsoleError::player_parse(line));
    }

    let mut player = PlayerRecord::default();
    let mut named = false;

    for (i, field) in split_fields(body).into_iter().enumerate() {
        // Live servers print `id=` first and the name second; a bare first
        // field is the name as well.
        if !named && (i == 1 || (i == 0 && !field.contains('='))) {
            player.name = field;
            named = true;
            continue;
        }

        let Some((key, value)) = field.split_once('=') else {
            return Err(ConsoleError::player_parse(field.as_str()));
        };
        player.apply(key.trim(), value.trim());
    }

    Ok(player)
}

/// Drop a leading `<digits>.` list index. The dot must end the line or be
/// followed by whitespace.
fn strip_list_index(line: &str) -> &str {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return line;
    }
    match line[digits..].strip_prefix('.') {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest,
        _ => line,
    }
}

/// Take the leading signed integer of `value`, or zero if there is none
fn lenient_int<T: FromStr + Default>(key: &str, value: &str) -> T {
    let sign = usize::from(value.starts_with(['-', '+']));
    let digits = value[sign..].bytes().take_while(u8::is_ascii_digit).count();

    match value[..sign + digits].parse() {
        Ok(n) => n,
        Err(_) => {
            warn!("Non-numeric value for '{}': '{}', using 0", key, value);
            T::default()
        }
    }
}

/// Parse `(x, y, z)`, keeping components read before the first bad one
fn parse_position(value: &str) -> Position {
    let mut position = Position::default();

    let Some(inner) = value.strip_prefix('(') else {
        warn!("Malformed position '{}', using origin", value);
        return position;
    };
    let inner = inner.trim_end().trim_end_matches(')');

    let slots = [&mut position.x, &mut position.y, &mut position.z];
    for (slot, part) in slots.into_iter().zip(inner.split(',')) {
        match part.trim().parse::<f64>() {
            Ok(v) => *slot = v,
            Err(_) => {
                warn!("Malformed position component '{}' in '{}'", part.trim(), value);
                break;
            }
        }
    }

    position
}
