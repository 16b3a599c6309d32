//! Remote calls to the game server with serialization and bounded retry

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::protocol::{self, MessageStream, ProtocolError};
use shared::{
    Command, CommandPayload, PlayerId, PlayerState, Request, Response, Sequence, WorldTable,
    MAX_ATTEMPTS, RETRY_BACKOFF,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] ProtocolError),

    #[error("server reported failure: {0}")]
    Remote(String),

    #[error("unexpected response to {method}: {response:?}")]
    UnexpectedResponse {
        method: &'static str,
        response: Response,
    },

    #[error("{method} failed after {attempts} attempts")]
    Exhausted { method: &'static str, attempts: u32 },
}

/// One request/response exchange with the server.
#[async_trait]
pub trait Transport: Send {
    async fn call(&mut self, request: &Request) -> Result<Response, RpcError>;
}

/// TCP transport that dials lazily and redials after any failure.
pub struct TcpTransport {
    server_addr: String,
    connection: Option<MessageStream>,
}

impl TcpTransport {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            connection: None,
        }
    }

    /// Dials immediately, so an unreachable server is reported up front.
    pub async fn connect(server_addr: impl Into<String>) -> Result<Self, RpcError> {
        let mut transport = Self::new(server_addr);
        transport.ensure_connected().await?;
        Ok(transport)
    }

    async fn ensure_connected(&mut self) -> Result<(), RpcError> {
        if self.connection.is_none() {
            let stream = TcpStream::connect(&self.server_addr)
                .await
                .map_err(ProtocolError::from)?;
            stream.set_nodelay(true).map_err(ProtocolError::from)?;
            info!("Connected to {}", self.server_addr);
            self.connection = Some(protocol::framed(stream));
        }
        Ok(())
    }

    async fn exchange(&mut self, request: &Request) -> Result<Response, RpcError> {
        self.ensure_connected().await?;
        let framed = self
            .connection
            .as_mut()
            .ok_or(ProtocolError::ConnectionClosed)?;

        framed.send(protocol::encode(request)?).await.map_err(ProtocolError::from)?;
        let frame = framed
            .next()
            .await
            .ok_or(ProtocolError::ConnectionClosed)?
            .map_err(ProtocolError::from)?;

        Ok(protocol::decode(&frame)?)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn call(&mut self, request: &Request) -> Result<Response, RpcError> {
        match self.exchange(request).await {
            Ok(Response::Failed { reason }) => Err(RpcError::Remote(reason)),
            Ok(response) => Ok(response),
            Err(e) => {
                // The stream may hold half a frame; start over on the next call.
                self.connection = None;
                Err(e)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// One attempt, no backoff.
    pub fn single() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, RETRY_BACKOFF)
    }
}

/// Serializes all calls from this client and retries failed ones.
///
/// The transport sits behind an async mutex that is held for a whole retry
/// loop, so at most one call is on the wire at a time and calls go out in the
/// order they asked for the lock. Sequence numbers come from a separate
/// counter: one per logical command, shared by all of its retries.
pub struct RemoteCaller<T> {
    transport: Mutex<T>,
    last_sequence: AtomicU32,
    policy: RetryPolicy,
}

impl<T: Transport> RemoteCaller<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport: Mutex::new(transport),
            last_sequence: AtomicU32::new(0),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Calls with the caller's default retry policy.
    pub async fn call(&self, request: Request) -> Result<Response, RpcError> {
        self.call_with(request, self.policy).await
    }

    pub async fn call_with(&self, request: Request, policy: RetryPolicy) -> Result<Response, RpcError> {
        let method = request.method();
        let mut transport = self.transport.lock().await;

        for attempt in 1..=policy.max_attempts {
            match transport.call(&request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(
                        "RPC {} failed: {}. Attempt {}/{}",
                        method, e, attempt, policy.max_attempts
                    );
                    if attempt < policy.max_attempts {
                        sleep(policy.backoff).await;
                    }
                }
            }
        }

        warn!("Giving up on {} after {} attempts", method, policy.max_attempts);
        Err(RpcError::Exhausted {
            method,
            attempts: policy.max_attempts,
        })
    }

    /// Joins the game. A single attempt: there is no session to resume yet.
    pub async fn connect(&self) -> Result<(PlayerId, WorldTable), RpcError> {
        match self.call_with(Request::Connect, RetryPolicy::single()).await? {
            Response::Connected {
                player_id,
                all_players,
            } => Ok((player_id, all_players)),
            response => Err(RpcError::UnexpectedResponse {
                method: "Connect",
                response,
            }),
        }
    }

    pub async fn get_state(&self, policy: RetryPolicy) -> Result<WorldTable, RpcError> {
        match self.call_with(Request::GetState, policy).await? {
            Response::State { all_players } => Ok(all_players),
            response => Err(RpcError::UnexpectedResponse {
                method: "GetState",
                response,
            }),
        }
    }

    /// Allocates the next sequence number. The counter wraps to 0 after
    /// `u32::MAX` commands; the server drops anything at or below its last
    /// accepted number, so a session that long stops moving.
    pub fn next_sequence(&self) -> Sequence {
        self.last_sequence.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Builds a command stamped with a fresh sequence number. Stamping happens
    /// here, when the command is issued, so later commands always carry
    /// higher numbers even if they reach the wire first.
    pub fn command(&self, player_id: PlayerId, payload: CommandPayload) -> Command {
        Command {
            player_id,
            sequence: self.next_sequence(),
            payload,
        }
    }

    pub fn move_command(&self, player_id: PlayerId, position: PlayerState) -> Command {
        self.command(player_id, CommandPayload::Move(position))
    }

    /// Delivers a command with retries. Every retry resends the same
    /// sequence number.
    pub async fn submit(&self, command: Command) -> Result<(), RpcError> {
        let request = Request::from(command);
        let method = request.method();

        match self.call(request).await? {
            Response::Ack => {
                debug!("{} #{} acknowledged", method, command.sequence);
                Ok(())
            }
            response => Err(RpcError::UnexpectedResponse { method, response }),
        }
    }
}
