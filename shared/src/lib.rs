use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub mod actor;
pub mod map;
pub mod protocol;

pub use actor::{ActorError, ActorHandle, Responder};
pub use protocol::{Command, CommandPayload, Request, Response};

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:12345";
pub const DEFAULT_PORT: u16 = 12345;
pub const DEFAULT_SPAWN: PlayerState = PlayerState { x: 1, y: 1 };
pub const MAX_ATTEMPTS: u32 = 3;
pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);
pub const RECONCILE_INTERVAL: Duration = Duration::from_millis(100);

pub type PlayerId = u32;
pub type Sequence = u32;

/// Position of every connected player, keyed by player id.
pub type WorldTable = HashMap<PlayerId, PlayerState>;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PlayerState {
    pub x: i32,
    pub y: i32,
}

impl PlayerState {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Moves by `(dx, dy)`, clamping at the edges of the `i32` range.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
