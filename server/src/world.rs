//! Authoritative world table owned by the server's state actor
//!
//! `World` holds the canonical player positions, the sequence records that
//! gate updates to them and the id counter for new connections. It is only
//! ever touched from inside its actor task: handlers reach it by submitting a
//! [`WorldCommand`], and each command performs its admission check and its
//! mutation in a single step so no duplicate can slip in between the two.

use crate::sequence::{Admission, SequenceGuard};
use log::info;
use shared::actor::{Actor, Responder};
use shared::{PlayerId, PlayerState, Sequence, WorldTable};

/// Commands accepted by the world actor, one per game service operation.
#[derive(Debug)]
pub enum WorldCommand {
    Connect {
        reply: Responder<(PlayerId, WorldTable)>,
    },
    UpdateState {
        player_id: PlayerId,
        position: PlayerState,
        sequence: Sequence,
        reply: Responder<Admission>,
    },
    GetState {
        reply: Responder<WorldTable>,
    },
    Disconnect {
        player_id: PlayerId,
        sequence: Sequence,
        reply: Responder<Admission>,
    },
}

#[derive(Debug)]
pub struct World {
    players: WorldTable,
    sequences: SequenceGuard,
    next_player_id: PlayerId,
    spawn: PlayerState,
}

impl World {
    /// Creates an empty world. New players start at `spawn` until their
    /// client reports a position.
    pub fn new(spawn: PlayerState) -> Self {
        Self {
            players: WorldTable::new(),
            sequences: SequenceGuard::new(),
            next_player_id: 1,
            spawn,
        }
    }

    /// Registers a new player and returns its id with a copy of the table.
    pub fn connect(&mut self) -> (PlayerId, WorldTable) {
        let player_id = self.next_player_id;
        self.next_player_id += 1;

        self.players.insert(player_id, self.spawn);
        self.sequences.register(player_id);
        self.check_invariants();

        let snapshot = self.snapshot();
        info!("[RPC] Connect -> ID: {}, players: {:?}", player_id, snapshot);
        (player_id, snapshot)
    }

    /// Overwrites the player's position if `sequence` is admitted.
    /// No legality check: clients are authoritative over their own moves.
    pub fn update_state(
        &mut self,
        player_id: PlayerId,
        position: PlayerState,
        sequence: Sequence,
    ) -> Admission {
        let admission = self.sequences.admit(player_id, sequence);
        if admission.is_accepted() {
            self.players.insert(player_id, position);
        }
        admission
    }

    /// Removes the player and its sequence record if `sequence` is admitted.
    pub fn disconnect(&mut self, player_id: PlayerId, sequence: Sequence) -> Admission {
        info!("[RPC] Disconnect <- ID: {}", player_id);

        let admission = self.sequences.admit(player_id, sequence);
        if admission.is_accepted() {
            self.players.remove(&player_id);
            self.sequences.forget(player_id);
            self.check_invariants();
            info!("Removed player {}", player_id);
        }
        admission
    }

    pub fn snapshot(&self) -> WorldTable {
        self.players.clone()
    }

    pub fn last_sequence(&self, player_id: PlayerId) -> Option<Sequence> {
        self.sequences.last_accepted(player_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    fn check_invariants(&self) {
        debug_assert_eq!(self.players.len(), self.sequences.len());
        debug_assert!(self.players.keys().all(|id| self.sequences.contains(*id)));
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(shared::DEFAULT_SPAWN)
    }
}

impl Actor for World {
    type Message = WorldCommand;

    fn handle(&mut self, command: WorldCommand) {
        // A caller that gave up waiting is not an error for the world.
        match command {
            WorldCommand::Connect { reply } => {
                let _ = reply.send(self.connect());
            }
            WorldCommand::UpdateState {
                player_id,
                position,
                sequence,
                reply,
            } => {
                let _ = reply.send(self.update_state(player_id, position, sequence));
            }
            WorldCommand::GetState { reply } => {
                let _ = reply.send(self.snapshot());
            }
            WorldCommand::Disconnect {
                player_id,
                sequence,
                reply,
            } => {
                let _ = reply.send(self.disconnect(player_id, sequence));
            }
        }
    }
}
