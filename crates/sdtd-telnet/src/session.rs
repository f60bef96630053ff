//! Telnet console session for 7 Days to Die
//!
//! The console is a plain line protocol:
//!
//! ```text
//! server: Please enter password:
//! client: <password>
//! server: Logon successful.
//! client: lp
//! server: ... INF Executing command 'lp' by Telnet from 10.8.0.1:52594
//! server: 0. id=171, Bob, pos=(...), ...
//! server: Total of 1 in the game
//! client: exit
//! ```
//!
//! A [`Session`] walks `Idle -> Connecting -> Authenticating -> Ready ->
//! Executing -> Draining -> Ready` and ends in `Closing -> Closed`. Any I/O or
//! protocol failure moves it to `Failed`. [`Session::close`] consumes the
//! session, so a connection is closed exactly once.

use crate::config::TelnetConfig;
use crate::transport::Connector;
use sdtd_core::{
    ConsoleError, GameTime, PlayerRecord, Result, parse_game_time, parse_player_line,
};
use std::future::Future;
use std::time::Duration;
use tokio::io::{
    self, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Substring of the server's reply to a correct password
pub const LOGIN_MARKER: &str = "Logon successful.";
/// Substring of the line that ends `lp` output
pub const LIST_END_MARKER: &str = "Total of ";
/// Sent before closing the connection
pub const LOGOUT_COMMAND: &str = "exit";

/// Cancellation signal; the session aborts once it reads `true`
pub type CancelSignal = watch::Receiver<bool>;

/// Console commands issued by this client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `lp`: list online players
    ListPlayers,
    /// `gt`: get the in-game time
    GetTime,
}

impl Command {
    /// Get the command line sent to the server
    pub fn as_str(self) -> &'static str {
        match self {
            Command::ListPlayers => "lp",
            Command::GetTime => "gt",
        }
    }

    /// Marker the server logs once it starts executing this command
    pub fn echo_marker(self) -> String {
        format!("Executing command '{}' by Telnet", self.as_str())
    }
}

/// Lifecycle states of a console session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Authenticating,
    Ready,
    Executing,
    Draining,
    Closing,
    Closed,
    Failed,
}

/// An authenticated console connection
pub struct Session<S> {
    /// Server address, for logs and errors
    address: String,
    reader: BufReader<ReadHalf<S>>,
    /// Unbuffered, so a failed write leaves nothing behind for logout
    writer: WriteHalf<S>,
    state: SessionState,
    /// Bound on each read or write
    io_timeout: Duration,
    cancel: Option<CancelSignal>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Connect and log in.
    ///
    /// If the login fails the connection is closed before the error is
    /// returned.
    pub async fn open<C>(
        connector: &C,
        config: &TelnetConfig,
        mut cancel: Option<CancelSignal>,
    ) -> Result<Self>
    where
        C: Connector<Stream = S>,
    {
        debug!(
            "Console {}: {:?} -> {:?}",
            config.address,
            SessionState::Idle,
            SessionState::Connecting
        );
        info!("Connecting to console at {}", config.address);

        let stream = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => return Err(ConsoleError::Cancelled),
            stream = connector.connect(&config.address, config.connect_timeout) => stream?,
        };

        let (read_half, write_half) = io::split(stream);
        let mut session = Self {
            address: config.address.clone(),
            reader: BufReader::new(read_half),
            writer: write_half,
            state: SessionState::Connecting,
            io_timeout: config.read_timeout,
            cancel,
        };

        session.transition(SessionState::Authenticating);
        if let Err(e) = session.authenticate(&config.password).await {
            session.close().await;
            return Err(e);
        }

        Ok(session)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Server address this session talks to
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Run `lp` and parse every player line up to the `Total of` sentinel.
    /// A malformed line fails the whole listing.
    pub async fn list_players(&mut self) -> Result<Vec<PlayerRecord>> {
        self.execute(Command::ListPlayers).await?;
        self.transition(SessionState::Draining);

        let mut players = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.contains(LIST_END_MARKER) {
                debug!("End of player list: {}", line);
                break;
            }

            debug!("line:'{}'", line);
            match parse_player_line(&line) {
                Ok(player) => players.push(player),
                Err(e) => return self.fail(e),
            }
        }

        self.transition(SessionState::Ready);
        Ok(players)
    }

    /// Run `gt` and parse the single clock line that follows
    pub async fn game_time(&mut self) -> Result<GameTime> {
        self.execute(Command::GetTime).await?;
        self.transition(SessionState::Draining);

        let line = self.read_line().await?;
        debug!("line:'{}'", line);

        match parse_game_time(&line) {
            Ok(time) => {
                self.transition(SessionState::Ready);
                Ok(time)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Log out and close the connection.
    ///
    /// Logout is best effort and ignores cancellation; errors here are only
    /// logged.
    pub async fn close(mut self) {
        self.transition(SessionState::Closing);

        let limit = self.io_timeout;
        let writer = &mut self.writer;
        let logout = async move {
            writer.write_all(format!("{}\n", LOGOUT_COMMAND).as_bytes()).await?;
            writer.flush().await?;
            writer.shutdown().await
        };

        match tokio::time::timeout(limit, logout).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Logout from {} failed: {}", self.address, e),
            Err(_) => debug!("Logout from {} timed out after {:?}", self.address, limit),
        }

        self.transition(SessionState::Closed);
        info!("Console session to {} closed", self.address);
    }

    async fn authenticate(&mut self, password: &str) -> Result<()> {
        let banner = self.read_line().await?;
        debug!("Console banner: {}", banner);

        self.write_line(password).await?;

        let response = self.read_line().await?;
        if !response.contains(LOGIN_MARKER) {
            warn!("Console login rejected by {}", self.address);
            return self.fail(ConsoleError::Auth(format!(
                "{} answered '{}'",
                self.address, response
            )));
        }

        self.transition(SessionState::Ready);
        info!("Console authenticated at {}", self.address);
        Ok(())
    }

    /// Send `command` and skip lines until the server echoes it
    async fn execute(&mut self, command: Command) -> Result<()> {
        if self.state != SessionState::Ready {
            return Err(ConsoleError::NotReady(format!(
                "cannot send '{}' while session is {:?}",
                command.as_str(),
                self.state
            )));
        }

        self.transition(SessionState::Executing);
        debug!("Console exec: {}", command.as_str());
        self.write_line(command.as_str()).await?;

        let marker = command.echo_marker();
        loop {
            let line = self.read_line().await?;
            if line.contains(&marker) {
                return Ok(());
            }
            debug!("Skipping console line: {}", line);
        }
    }

    /// Read one line without its terminator
    async fn read_line(&mut self) -> Result<String> {
        let limit = self.io_timeout;
        let mut line = String::new();

        let read = guard(&mut self.cancel, limit, self.reader.read_line(&mut line)).await;
        match read {
            Ok(0) => {
                let err = ConsoleError::Read(format!("{} closed the connection", self.address));
                self.fail(err)
            }
            Ok(_) => Ok(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(interrupt) => {
                let err = interrupt.into_error(&self.address, limit, ConsoleError::Read);
                self.fail(err)
            }
        }
    }

    /// Write one line and flush it
    async fn write_line(&mut self, line: &str) -> Result<()> {
        let limit = self.io_timeout;
        let writer = &mut self.writer;
        let framed = format!("{}\n", line);

        let write = guard(&mut self.cancel, limit, async move {
            writer.write_all(framed.as_bytes()).await?;
            writer.flush().await
        })
        .await;

        match write {
            Ok(()) => Ok(()),
            Err(interrupt) => {
                let err = interrupt.into_error(&self.address, limit, ConsoleError::Write);
                self.fail(err)
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Console {}: {:?} -> {:?}", self.address, self.state, next);
        self.state = next;
    }

    fn fail<T>(&mut self, err: ConsoleError) -> Result<T> {
        debug!("Console {} failed: {}", self.address, err);
        self.transition(SessionState::Failed);
        Err(err)
    }
}

/// Why a guarded I/O call did not complete
enum Interrupt {
    Cancelled,
    TimedOut,
    Io(io::Error),
}

impl Interrupt {
    fn into_error(
        self,
        address: &str,
        limit: Duration,
        kind: fn(String) -> ConsoleError,
    ) -> ConsoleError {
        match self {
            Interrupt::Cancelled => ConsoleError::Cancelled,
            Interrupt::TimedOut => kind(format!("timed out after {:?} on {}", limit, address)),
            Interrupt::Io(e) => kind(format!("{}: {}", address, e)),
        }
    }
}

/// Run `op` under a fresh timeout, aborting early on cancellation
async fn guard<T>(
    cancel: &mut Option<CancelSignal>,
    limit: Duration,
    op: impl Future<Output = io::Result<T>>,
) -> std::result::Result<T, Interrupt> {
    tokio::select! {
        biased;
        _ = cancelled(cancel) => Err(Interrupt::Cancelled),
        res = tokio::time::timeout(limit, op) => match res {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Interrupt::Io(e)),
            Err(_) => Err(Interrupt::TimedOut),
        },
    }
}

/// Resolves once the signal reads `true`; never resolves without a signal
/// or after its sender is gone
async fn cancelled(cancel: &mut Option<CancelSignal>) {
    let fired = match cancel {
        Some(rx) => rx.wait_for(|&c| c).await.is_ok(),
        None => false,
    };
    if !fired {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::scripted::{DuplexConnector, MockConnector};
    use tokio_test::io::Builder;

    const BANNER: &[u8] = b"*** Connected with 7DTD server.\r\n";
    const LOGON_OK: &[u8] = b"Logon successful.\r\n";

    fn config() -> TelnetConfig {
        TelnetConfig::with_credentials("mock:8081", "secret")
    }

    fn logged_in() -> Builder {
        let mut builder = Builder::new();
        builder.read(BANNER).write(b"secret\n").read(LOGON_OK);
        builder
    }

    /// Serve the handshake on the far end of a pipe, then collect every
    /// line the client sends until it closes.
    async fn pipe_server(
        server: tokio::io::DuplexStream,
        login_reply: Option<&'static str>,
    ) -> Vec<String> {
        let (read_half, mut write_half) = tokio::io::split(server);
        let mut lines = tokio::io::BufReader::new(read_half).lines();
        let mut received = Vec::new();

        let _ = write_half.write_all(BANNER).await;
        while let Ok(Some(line)) = lines.next_line().await {
            if received.is_empty() {
                if let Some(reply) = login_reply {
                    let _ = write_half.write_all(reply.as_bytes()).await;
                }
            }
            received.push(line);
        }
        received
    }

    #[test]
    fn test_command_markers() {
        assert_eq!(Command::ListPlayers.as_str(), "lp");
        assert_eq!(Command::GetTime.as_str(), "gt");
        assert_eq!(
            Command::GetTime.echo_marker(),
            "Executing command 'gt' by Telnet"
        );
    }

    #[tokio::test]
    async fn test_list_players() {
        let mock = logged_in()
            .write(b"lp\n")
            .read(b"2024-06-30T09:55:58 17445.1 INF Time: 290.02m FPS: 31.2\r\n")
            .read(b"2024-06-30T09:55:59 17446.408 INF Executing command 'lp' by Telnet from 10.8.0.1:52594\r\n")
            .read(b"0. id=171, Bob, pos=(1.5, -2.0, 3.25), health=80, pltfmid=Steam_123\r\n1. id=172, Ann, level=12\r\n")
            .read(b"Total of 2 in the game\r\n")
            .write(b"exit\n")
            .build();
        let connector = MockConnector::new(mock);

        let mut session = Session::open(&connector, &config(), None).await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        let players = session.list_players().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        session.close().await;

        assert_eq!(players.len(), 2);
        assert_eq!(players[0].name, "Bob");
        assert_eq!(players[0].id, 171);
        assert_eq!(players[0].position.z, 3.25);
        assert_eq!(players[1].name, "Ann");
        assert_eq!(players[1].level, 12);
    }

    #[tokio::test]
    async fn test_empty_player_list() {
        let mock = logged_in()
            .write(b"lp\n")
            .read(b"INF Executing command 'lp' by Telnet from 127.0.0.1:1\r\nTotal of 0 in the game\r\n")
            .write(b"exit\n")
            .build();
        let connector = MockConnector::new(mock);

        let mut session = Session::open(&connector, &config(), None).await.unwrap();
        let players = session.list_players().await.unwrap();
        session.close().await;

        assert!(players.is_empty());
    }

    #[tokio::test]
    async fn test_game_time() {
        let mock = logged_in()
            .write(b"gt\n")
            .read(b"2024-06-30T09:55:59 17446.408 INF Executing command 'gt' by Telnet from 10.8.0.1:52594\r\n")
            .read(b"Day 17, 15:27\r\n")
            .write(b"exit\n")
            .build();
        let connector = MockConnector::new(mock);

        let mut session = Session::open(&connector, &config(), None).await.unwrap();
        let time = session.game_time().await.unwrap();
        session.close().await;

        assert_eq!(
            time,
            GameTime {
                days: 17,
                hours: 15,
                minutes: 27
            }
        );
    }

    #[tokio::test]
    async fn test_commands_share_one_session() {
        let mock = logged_in()
            .write(b"gt\n")
            .read(b"INF Executing command 'gt' by Telnet\r\nDay 1, 06:00\r\n")
            .write(b"lp\n")
            .read(b"INF Executing command 'lp' by Telnet\r\nTotal of 0 in the game\r\n")
            .write(b"exit\n")
            .build();
        let connector = MockConnector::new(mock);

        let mut session = Session::open(&connector, &config(), None).await.unwrap();
        assert_eq!(session.game_time().await.unwrap().hours, 6);
        assert!(session.list_players().await.unwrap().is_empty());
        session.close().await;
    }

    #[tokio::test]
    async fn test_rejected_login_is_an_auth_error() {
        let mock = Builder::new()
            .read(BANNER)
            .write(b"secret\n")
            .read(b"Password incorrect, please enter password:\r\n")
            .write(b"exit\n")
            .build();
        let connector = MockConnector::new(mock);

        let result = Session::open(&connector, &config(), None).await;
        assert!(matches!(result, Err(ConsoleError::Auth(_))));
    }

    #[tokio::test]
    async fn test_parse_error_aborts_listing() {
        let mock = logged_in()
            .write(b"lp\n")
            .read(b"INF Executing command 'lp' by Telnet\r\n0. id=1, A\r\n1. X, badfield\r\n2. id=3, C\r\nTotal of 3 in the game\r\n")
            .write(b"exit\n")
            .build();
        let connector = MockConnector::new(mock);

        let mut session = Session::open(&connector, &config(), None).await.unwrap();
        let result = session.list_players().await;
        assert_eq!(session.state(), SessionState::Failed);
        session.close().await;

        match result {
            Err(ConsoleError::PlayerParse { fragment }) => assert_eq!(fragment, "badfield"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_clock_line_is_a_format_error() {
        let mock = logged_in()
            .write(b"gt\n")
            .read(b"INF Executing command 'gt' by Telnet\r\nUnknown command gt\r\n")
            .write(b"exit\n")
            .build();
        let connector = MockConnector::new(mock);

        let mut session = Session::open(&connector, &config(), None).await.unwrap();
        let result = session.game_time().await;
        session.close().await;

        assert!(matches!(result, Err(ConsoleError::Format(_))));
    }

    #[tokio::test]
    async fn test_read_error_while_draining() {
        let mock = logged_in()
            .write(b"lp\n")
            .read(b"INF Executing command 'lp' by Telnet\r\n0. id=1, A\r\n")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .write(b"exit\n")
            .build();
        let connector = MockConnector::new(mock);

        let mut session = Session::open(&connector, &config(), None).await.unwrap();
        let result = session.list_players().await;
        session.close().await;

        assert!(matches!(result, Err(ConsoleError::Read(_))), "got {:?}", result);
    }

    #[tokio::test]
    async fn test_failed_session_refuses_commands() {
        let mock = logged_in()
            .write(b"gt\n")
            .read(b"INF Executing command 'gt' by Telnet\r\nnot a clock\r\n")
            .write(b"exit\n")
            .build();
        let connector = MockConnector::new(mock);

        let mut session = Session::open(&connector, &config(), None).await.unwrap();
        assert!(session.game_time().await.is_err());
        assert!(matches!(
            session.list_players().await,
            Err(ConsoleError::NotReady(_))
        ));
        session.close().await;
    }

    #[tokio::test]
    async fn test_write_error_fails_session_and_still_logs_out() {
        let mock = logged_in()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"))
            .write(b"exit\n")
            .build();
        let connector = MockConnector::new(mock);

        let mut session = Session::open(&connector, &config(), None).await.unwrap();
        let result = session.list_players().await;
        assert_eq!(session.state(), SessionState::Failed);
        session.close().await;

        match result {
            Err(ConsoleError::Write(msg)) => assert!(msg.contains("pipe"), "{}", msg),
            other => panic!("expected write error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deadline_is_renewed_per_read() {
        let (connector, server) = DuplexConnector::pair();
        let server_task = tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(server);
            let mut lines = tokio::io::BufReader::new(read_half).lines();
            let mut received = Vec::new();

            write_half.write_all(BANNER).await.unwrap();
            received.push(lines.next_line().await.unwrap().unwrap());
            write_half.write_all(LOGON_OK).await.unwrap();
            received.push(lines.next_line().await.unwrap().unwrap());

            let slow = [
                "INF Executing command 'lp' by Telnet\r\n",
                "0. id=1, A\r\n",
                "1. id=2, B\r\n",
                "2. id=3, C\r\n",
                "Total of 3 in the game\r\n",
            ];
            for line in slow {
                tokio::time::sleep(Duration::from_millis(70)).await;
                write_half.write_all(line.as_bytes()).await.unwrap();
            }
            while let Ok(Some(line)) = lines.next_line().await {
                received.push(line);
            }
            received
        });

        let mut config = config();
        config.read_timeout = Duration::from_millis(150);

        let mut session = Session::open(&connector, &config, None).await.unwrap();
        let players = session.list_players().await.unwrap();
        session.close().await;

        // 350ms in total, well past a single 150ms deadline
        assert_eq!(players.len(), 3);
        assert_eq!(server_task.await.unwrap(), vec!["secret", "lp", "exit"]);
    }

    #[tokio::test]
    async fn test_server_hangup_is_a_read_error() {
        let (connector, server) = DuplexConnector::pair();
        let server_task = tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(server);
            let mut lines = tokio::io::BufReader::new(read_half).lines();
            write_half.write_all(BANNER).await.unwrap();
            let password = lines.next_line().await.unwrap();
            // Drop both halves without answering
            password
        });

        let result = Session::open(&connector, &config(), None).await;
        assert!(matches!(result, Err(ConsoleError::Read(_))), "got {:?}", result.err());
        assert_eq!(server_task.await.unwrap().as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_silent_server_times_out_and_still_logs_out() {
        let (connector, server) = DuplexConnector::pair();
        let server_task = tokio::spawn(pipe_server(server, Some("Logon successful.\r\n")));

        let mut config = config();
        config.read_timeout = Duration::from_millis(100);

        let mut session = Session::open(&connector, &config, None).await.unwrap();
        let result = session.list_players().await;
        session.close().await;

        match result {
            Err(ConsoleError::Read(msg)) => assert!(msg.contains("timed out"), "{}", msg),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(server_task.await.unwrap(), vec!["secret", "lp", "exit"]);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_read() {
        let (connector, server) = DuplexConnector::pair();
        let server_task = tokio::spawn(pipe_server(server, None));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = cancel_tx.send(true);
        });

        let result = Session::open(&connector, &config(), Some(cancel_rx)).await;
        assert!(matches!(result, Err(ConsoleError::Cancelled)));
        assert_eq!(server_task.await.unwrap(), vec!["secret", "exit"]);
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_connect() {
        let (connector, _server) = DuplexConnector::pair();
        let (_cancel_tx, cancel_rx) = watch::channel(true);

        let result = Session::open(&connector, &config(), Some(cancel_rx)).await;
        assert!(matches!(result, Err(ConsoleError::Cancelled)));
        // The pipe was never taken
        assert!(connector.connect("mock:8081", Duration::from_secs(1)).await.is_ok());
    }
}
