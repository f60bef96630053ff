//! In-game clock parsed from `gt` (get time) output

use crate::error::{ConsoleError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// In-game clock snapshot
///
/// Hours and minutes are taken as reported; they are not range checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTime {
    pub days: u64,
    pub hours: u32,
    pub minutes: u32,
}

/// Parse a `Day <d>, <h>:<m>` line. Either all three numbers parse or the
/// whole line is rejected.
pub fn parse_game_time(line: &str) -> Result<GameTime> {
    let line = line.trim();
    let invalid = |what: &str| ConsoleError::Format(format!("{}: '{}'", what, line));

    let (day_part, clock_part) = line
        .split_once(',')
        .ok_or_else(|| invalid("expected 'Day <d>, <h>:<m>'"))?;

    let days = day_part
        .trim()
        .strip_prefix("Day ")
        .and_then(|d| d.trim().parse::<u64>().ok())
        .ok_or_else(|| invalid("failed to parse days"))?;

    let (hours, minutes) = clock_part
        .trim()
        .split_once(':')
        .and_then(|(h, m)| Some((h.trim().parse::<u32>().ok()?, m.trim().parse::<u32>().ok()?)))
        .ok_or_else(|| invalid("failed to parse hours and minutes"))?;

    Ok(GameTime {
        days,
        hours,
        minutes,
    })
}

impl FromStr for GameTime {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        parse_game_time(s)
    }
}

impl fmt::Display for GameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Day {}, {:02}:{:02}", self.days, self.hours, self.minutes)
    }
}
