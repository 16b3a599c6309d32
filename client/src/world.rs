//! Client-side mirror of the world with local movement rules

use log::{debug, trace};
use shared::actor::Actor;
use shared::map::GameMap;
use shared::{PlayerId, PlayerState, Responder, WorldTable};
use std::sync::Arc;

/// What the renderer draws: the map plus a copy of every known position.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalView {
    pub map: Arc<GameMap>,
    pub player_id: PlayerId,
    pub players: WorldTable,
}

impl LocalView {
    pub fn local_position(&self) -> Option<PlayerState> {
        self.players.get(&self.player_id).copied()
    }
}

#[derive(Debug)]
pub enum LocalCommand {
    /// Try to move the local player one step. Replies with the new position,
    /// or `None` if the move was refused.
    Move {
        dx: i32,
        dy: i32,
        reply: Responder<Option<PlayerState>>,
    },
    /// Replace the mirror with a server snapshot.
    Reconcile {
        players: WorldTable,
        reply: Responder<()>,
    },
    View {
        reply: Responder<LocalView>,
    },
}

pub struct LocalWorld {
    map: Arc<GameMap>,
    player_id: PlayerId,
    players: WorldTable,
}

impl LocalWorld {
    pub fn new(map: Arc<GameMap>, player_id: PlayerId, players: WorldTable) -> Self {
        Self {
            map,
            player_id,
            players,
        }
    }

    pub fn position(&self) -> Option<PlayerState> {
        self.players.get(&self.player_id).copied()
    }

    /// A cell can be entered if it is inside the map, not solid and not
    /// occupied by another player.
    pub fn can_enter(&self, target: PlayerState) -> bool {
        if !self.map.is_walkable(target.x, target.y) {
            return false;
        }

        !self
            .players
            .iter()
            .any(|(id, position)| *id != self.player_id && *position == target)
    }

    pub fn try_move(&mut self, dx: i32, dy: i32) -> Option<PlayerState> {
        let current = self.position()?;
        let target = current.offset(dx, dy);

        if !self.can_enter(target) {
            trace!("Move to {} blocked", target);
            return None;
        }

        self.players.insert(self.player_id, target);
        Some(target)
    }

    /// Takes the server's table wholesale. If the snapshot predates our own
    /// announcement it will not contain us yet, so our entry is kept.
    pub fn reconcile(&mut self, mut players: WorldTable) {
        if !players.contains_key(&self.player_id) {
            if let Some(position) = self.position() {
                debug!("Snapshot lacks player {}, keeping local entry", self.player_id);
                players.insert(self.player_id, position);
            }
        }
        self.players = players;
    }

    pub fn view(&self) -> LocalView {
        LocalView {
            map: Arc::clone(&self.map),
            player_id: self.player_id,
            players: self.players.clone(),
        }
    }
}

impl Actor for LocalWorld {
    type Message = LocalCommand;

    fn handle(&mut self, message: LocalCommand) {
        match message {
            LocalCommand::Move { dx, dy, reply } => {
                let _ = reply.send(self.try_move(dx, dy));
            }
            LocalCommand::Reconcile { players, reply } => {
                self.reconcile(players);
                let _ = reply.send(());
            }
            LocalCommand::View { reply } => {
                let _ = reply.send(self.view());
            }
        }
    }
}
