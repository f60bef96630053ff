//! High-level console client
//!
//! Every operation opens its own [`Session`], runs one command and closes
//! the session again, whether the command succeeded or not. Nothing is
//! shared between calls, so a [`TelnetConsole`] can be used from several
//! tasks at once.

use crate::config::TelnetConfig;
use crate::session::{CancelSignal, Session};
use crate::transport::{Connector, TcpConnector};
use async_trait::async_trait;
use sdtd_core::{GameStatus, GameTime, PlayerRecord, Result};

/// Source of server status snapshots
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Fetch the current game clock and online players
    async fn status(&self) -> Result<GameStatus>;
}

/// Client for the 7 Days to Die telnet console
pub struct TelnetConsole<C = TcpConnector> {
    config: TelnetConfig,
    connector: C,
    cancel: Option<CancelSignal>,
}

impl TelnetConsole<TcpConnector> {
    /// Create a client that dials over TCP
    pub fn new(config: TelnetConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> TelnetConsole<C> {
    /// Create a client with a custom connector
    pub fn with_connector(config: TelnetConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            cancel: None,
        }
    }

    /// Abort pending operations once `cancel` reads `true`
    pub fn with_cancellation(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &TelnetConfig {
        &self.config
    }

    /// List online players
    pub async fn list_players(&self) -> Result<Vec<PlayerRecord>> {
        let mut session = self.open().await?;
        let players = session.list_players().await;
        session.close().await;
        players
    }

    /// Get the in-game time
    pub async fn game_time(&self) -> Result<GameTime> {
        let mut session = self.open().await?;
        let time = session.game_time().await;
        session.close().await;
        time
    }

    async fn open(&self) -> Result<Session<C::Stream>> {
        Session::open(&self.connector, &self.config, self.cancel.clone()).await
    }
}

#[async_trait]
impl<C: Connector> StatusProvider for TelnetConsole<C> {
    async fn status(&self) -> Result<GameStatus> {
        let time = self.game_time().await?;
        let players = self.list_players().await?;
        Ok(GameStatus::new(time, &players))
    }
}
