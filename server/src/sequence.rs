//! Per-player sequence tracking for idempotent command acceptance
//!
//! Clients tag every mutating command with a sequence number that grows by
//! one per logical command and stays the same across retries. The guard
//! remembers the highest number accepted for each registered player and
//! turns anything at or below it into a no-op. This is what lets a client
//! resend a command whose reply was lost without the server applying it a
//! second time, and what makes late, reordered deliveries harmless.

use log::debug;
use shared::{PlayerId, Sequence};
use std::collections::HashMap;

/// Outcome of running a command through the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No sequence record exists for the player.
    UnknownPlayer,
    /// The sequence number is not newer than the last accepted one.
    Stale { last_accepted: Sequence },
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }
}

/// Last accepted sequence number per registered player
#[derive(Debug, Default)]
pub struct SequenceGuard {
    last_accepted: HashMap<PlayerId, Sequence>,
}

impl SequenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the record for a newly connected player, starting at 0.
    pub fn register(&mut self, player_id: PlayerId) {
        self.last_accepted.insert(player_id, 0);
    }

    /// Deletes the record of a departed player. Returns false if none existed.
    pub fn forget(&mut self, player_id: PlayerId) -> bool {
        self.last_accepted.remove(&player_id).is_some()
    }

    /// Admits `sequence` for `player_id` if it is newer than anything accepted
    /// so far, recording it as the new high-water mark.
    pub fn admit(&mut self, player_id: PlayerId, sequence: Sequence) -> Admission {
        let Some(last_accepted) = self.last_accepted.get_mut(&player_id) else {
            debug!("Command {} for unknown player {} ignored", sequence, player_id);
            return Admission::Dropped(DropReason::UnknownPlayer);
        };

        if sequence <= *last_accepted {
            debug!(
                "Command {} for player {} ignored (last accepted {})",
                sequence, player_id, last_accepted
            );
            return Admission::Dropped(DropReason::Stale {
                last_accepted: *last_accepted,
            });
        }

        *last_accepted = sequence;
        Admission::Accepted
    }

    pub fn last_accepted(&self, player_id: PlayerId) -> Option<Sequence> {
        self.last_accepted.get(&player_id).copied()
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.last_accepted.contains_key(&player_id)
    }

    pub fn len(&self) -> usize {
        self.last_accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_accepted.is_empty()
    }
}
