//! Telnet console client for 7 Days to Die
//!
//! Talks to a dedicated server's remote console port:
//!
//! - **Session**: login handshake, command framing and logout over one
//!   line-oriented stream
//! - **Client**: `list_players`, `game_time` and `status`, each on a fresh
//!   session that is always closed afterwards
//! - **Transport**: the [`Connector`] seam, with TCP as the default

mod client;
mod config;
pub mod session;
mod transport;

pub use client::{StatusProvider, TelnetConsole};
pub use config::{DEFAULT_ADDRESS, TelnetConfig};
pub use session::{CancelSignal, Command, Session, SessionState};
pub use transport::{Connector, TcpConnector};
