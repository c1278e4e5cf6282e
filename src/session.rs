//! RTM connection lifecycle
//!
//! `Connecting → Streaming → Backoff → Connecting …` until the process is
//! stopped. Every failure is retried; identical consecutive failures are
//! logged once.

use crate::error::{Result, SlackvError, error_equals};
use crate::logging::log_error;
use crate::slack::socket::{self, WsMessage, WsReader, WsWriter};
use crate::slack::{EventHandler, SlackClient};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const INITIAL_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 15;

/// Idle time after which an RTM ping is sent; a second idle period is fatal
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Doubling retry delay between a floor and a ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    current: Duration,
    floor: Duration,
    ceiling: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            current: floor,
            floor,
            ceiling,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn advance(&mut self) {
        self.current = (self.current * 2).min(self.ceiling);
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(INITIAL_BACKOFF_SECS),
            Duration::from_secs(MAX_BACKOFF_SECS),
        )
    }
}

/// Retry bookkeeping that survives across connections
#[derive(Debug, Default)]
pub struct ConnectionState {
    backoff: Backoff,
    last_error: Option<SlackvError>,
}

impl ConnectionState {
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn last_error(&self) -> Option<&SlackvError> {
        self.last_error.as_ref()
    }

    /// Record a failure. Returns `true` when it differs from the previous one.
    pub fn remember(&mut self, err: SlackvError) -> bool {
        if error_equals(Some(&err), self.last_error.as_ref()) {
            return false;
        }
        self.last_error = Some(err);
        true
    }

    pub fn succeeded(&mut self) {
        self.backoff.reset();
        self.last_error = None;
    }
}

pub struct RtmStream {
    writer: WsWriter,
    reader: WsReader,
}

pub enum SessionState {
    Connecting,
    Streaming(RtmStream),
    Backoff(SlackvError),
}

/// Drives the connection state machine and feeds frames to the handler
pub struct SessionRunner<W> {
    client: Arc<SlackClient>,
    handler: EventHandler<SlackClient, W>,
    conn: ConnectionState,
    keepalive: Duration,
    next_ping_id: u64,
}

impl<W: Write> SessionRunner<W> {
    pub fn new(client: Arc<SlackClient>, handler: EventHandler<SlackClient, W>) -> Self {
        Self {
            client,
            handler,
            conn: ConnectionState::default(),
            keepalive: KEEPALIVE_INTERVAL,
            next_ping_id: 1,
        }
    }

    /// Override the idle interval before a ping is sent
    pub fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive = interval;
        self
    }

    pub fn handler(&self) -> &EventHandler<SlackClient, W> {
        &self.handler
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.conn
    }

    /// Run forever. Only fails if the initial status line cannot be written.
    pub async fn run(mut self) -> Result<()> {
        self.handler.notice("Connecting...")?;

        let mut state = SessionState::Connecting;
        loop {
            state = self.step(state).await;
        }
    }

    /// Perform one transition of the state machine
    pub async fn step(&mut self, state: SessionState) -> SessionState {
        match state {
            SessionState::Connecting => match self.connect().await {
                Ok(stream) => {
                    self.conn.succeeded();
                    SessionState::Streaming(stream)
                }
                Err(e) => SessionState::Backoff(e),
            },
            SessionState::Streaming(mut stream) => {
                let err = self.stream(&mut stream).await;
                if let Err(e) = stream.writer.close().await {
                    tracing::debug!(error = %e, "Failed to close WebSocket cleanly");
                }
                self.handler.cache().log_stats();
                SessionState::Backoff(err)
            }
            SessionState::Backoff(err) => {
                let wait = self.conn.backoff.current();
                let message = err.to_string();
                if self.conn.remember(err) {
                    if let Some(err) = self.conn.last_error() {
                        log_error("rtm_session", err);
                    }
                } else {
                    tracing::debug!(error = %message, "Same failure as before");
                }
                tracing::info!(wait_secs = wait.as_secs(), "Reconnecting");

                tokio::time::sleep(wait).await;
                self.conn.backoff.advance();
                SessionState::Connecting
            }
        }
    }

    async fn connect(&mut self) -> Result<RtmStream> {
        let session = self.client.rtm_connect().await?;
        if let Some(me) = &session.self_info {
            tracing::info!(user_id = %me.id, user = %me.name, "Authenticated");
        }
        if let Some(team) = &session.team {
            tracing::info!(team_id = %team.id, team = %team.name, domain = %team.domain, "Joined team");
        }

        let (writer, reader) = socket::connect(&session.url, self.client.timeout()).await?;
        tracing::info!("RTM WebSocket connected");
        Ok(RtmStream { writer, reader })
    }

    /// Preload, then process frames until the stream fails
    async fn stream(&mut self, stream: &mut RtmStream) -> SlackvError {
        match self.receive(stream).await {
            Ok(()) => SlackvError::ConnectionClosed("stream ended".to_string()),
            Err(e) => e,
        }
    }

    /// Load user groups. A refusal from Slack (free plan, missing scope)
    /// only disables subteam expansion; transport failures are retried.
    async fn preload(&mut self) -> Result<()> {
        match self.handler.preload().await {
            Ok(_) => Ok(()),
            Err(SlackvError::SlackApi(message)) => {
                tracing::warn!(error = %message, "User groups unavailable, continuing without them");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn receive(&mut self, stream: &mut RtmStream) -> Result<()> {
        self.preload().await?;

        let mut awaiting_pong = false;
        loop {
            let message = match tokio::time::timeout(self.keepalive, stream.reader.recv()).await {
                Ok(Some(message)) => message?,
                Ok(None) => return Ok(()),
                Err(_) if awaiting_pong => {
                    return Err(SlackvError::Timeout("RTM stream went silent".to_string()));
                }
                Err(_) => {
                    self.ping(&mut stream.writer).await?;
                    awaiting_pong = true;
                    continue;
                }
            };
            awaiting_pong = false;

            match message {
                WsMessage::Text(text) => self.handler.handle_frame(&text).await?,
                WsMessage::Close { code, reason } => {
                    return Err(SlackvError::ConnectionClosed(format!(
                        "code {}: {}",
                        code, reason
                    )));
                }
                WsMessage::Other => {}
            }
        }
    }

    async fn ping(&mut self, writer: &mut WsWriter) -> Result<()> {
        let id = self.next_ping_id;
        self.next_ping_id += 1;
        tracing::debug!(id, "Stream idle, sending ping");
        let ping = serde_json::json!({ "id": id, "type": "ping" });
        writer.send_text(ping.to_string()).await
    }
}
