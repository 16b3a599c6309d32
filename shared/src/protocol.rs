//! Request/response messages exchanged between clients and the game server
//!
//! Every call is one `Request` frame answered by exactly one `Response` frame.
//! Frames are bincode payloads behind a length prefix on a TCP stream.

use crate::{PlayerId, PlayerState, Sequence, WorldTable};
use bincode::{deserialize, serialize};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

pub use tokio_util::bytes::Bytes;

/// Largest frame either side accepts. A full table costs about 12 bytes
/// per player, so this fits well over a million players.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

pub type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Request {
    Connect,
    UpdateState {
        player_id: PlayerId,
        new_x: i32,
        new_y: i32,
        sequence: Sequence,
    },
    GetState,
    Disconnect {
        player_id: PlayerId,
        sequence: Sequence,
    },
}

impl Request {
    /// Name of the remote operation, used in logs.
    pub fn method(&self) -> &'static str {
        match self {
            Request::Connect => "Connect",
            Request::UpdateState { .. } => "UpdateState",
            Request::GetState => "GetState",
            Request::Disconnect { .. } => "Disconnect",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Response {
    Connected {
        player_id: PlayerId,
        all_players: WorldTable,
    },
    Ack,
    State {
        all_players: WorldTable,
    },
    Failed {
        reason: String,
    },
}

/// A mutating command for one player, tagged with the sequence number that
/// lets the server discard duplicates. Retries of a command resend the same
/// value, sequence number included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub player_id: PlayerId,
    pub sequence: Sequence,
    pub payload: CommandPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPayload {
    Move(PlayerState),
    Leave,
}

impl From<Command> for Request {
    fn from(command: Command) -> Self {
        match command.payload {
            CommandPayload::Move(position) => Request::UpdateState {
                player_id: command.player_id,
                new_x: position.x,
                new_y: position.y,
                sequence: command.sequence,
            },
            CommandPayload::Leave => Request::Disconnect {
                player_id: command.player_id,
                sequence: command.sequence,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by peer")]
    ConnectionClosed,
}

pub fn encode<T: Serialize>(message: &T) -> Result<Bytes, ProtocolError> {
    Ok(Bytes::from(serialize(message)?))
}

pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, ProtocolError> {
    Ok(deserialize(frame)?)
}

/// Wraps a TCP stream in the length-delimited framing used by both sides.
pub fn framed(stream: TcpStream) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec();
    Framed::new(stream, codec)
}
