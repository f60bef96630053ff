//! # sdtd-core
//!
//! Typed records and text parsers for the 7 Days to Die telnet console.
//!
//! The console answers in loosely formatted text. This crate turns it into:
//! - [`PlayerRecord`]s from `lp` body lines
//! - [`GameTime`] from the `gt` clock line
//! - [`GameStatus`] snapshots built from both
//!
//! Everything here is pure; the connection lives in `sdtd-telnet`.

pub mod clock;
pub mod error;
pub mod fields;
pub mod player;
pub mod status;

pub use clock::{GameTime, parse_game_time};
pub use error::{ConsoleError, Result};
pub use fields::split_fields;
pub use player::{PlayerRecord, Position, parse_player_line};
pub use status::GameStatus;
