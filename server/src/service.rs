//! Game service: the four remote operations, each executed as one world
//! actor submission.

use crate::sequence::Admission;
use crate::world::WorldCommand;
use log::warn;
use shared::{ActorError, ActorHandle, PlayerId, PlayerState, Request, Response, Sequence, WorldTable};

#[derive(Clone)]
pub struct GameService {
    world: ActorHandle<WorldCommand>,
}

impl GameService {
    pub fn new(world: ActorHandle<WorldCommand>) -> Self {
        Self { world }
    }

    pub async fn connect(&self) -> Result<(PlayerId, WorldTable), ActorError> {
        self.world
            .submit(|reply| WorldCommand::Connect { reply })
            .await
    }

    pub async fn update_state(
        &self,
        player_id: PlayerId,
        new_x: i32,
        new_y: i32,
        sequence: Sequence,
    ) -> Result<Admission, ActorError> {
        self.world
            .submit(|reply| WorldCommand::UpdateState {
                player_id,
                position: PlayerState::new(new_x, new_y),
                sequence,
                reply,
            })
            .await
    }

    pub async fn get_state(&self) -> Result<WorldTable, ActorError> {
        self.world
            .submit(|reply| WorldCommand::GetState { reply })
            .await
    }

    pub async fn disconnect(
        &self,
        player_id: PlayerId,
        sequence: Sequence,
    ) -> Result<Admission, ActorError> {
        self.world
            .submit(|reply| WorldCommand::Disconnect {
                player_id,
                sequence,
                reply,
            })
            .await
    }

    /// Runs one request and builds its reply. Dropped commands still
    /// answer `Ack`; only an unavailable world produces `Failed`.
    pub async fn handle(&self, request: Request) -> Response {
        let method = request.method();

        let result = match request {
            Request::Connect => self
                .connect()
                .await
                .map(|(player_id, all_players)| Response::Connected {
                    player_id,
                    all_players,
                }),
            Request::UpdateState {
                player_id,
                new_x,
                new_y,
                sequence,
            } => self
                .update_state(player_id, new_x, new_y, sequence)
                .await
                .map(|_| Response::Ack),
            Request::GetState => self
                .get_state()
                .await
                .map(|all_players| Response::State { all_players }),
            Request::Disconnect {
                player_id,
                sequence,
            } => self
                .disconnect(player_id, sequence)
                .await
                .map(|_| Response::Ack),
        };

        result.unwrap_or_else(|e| {
            warn!("{} failed: {}", method, e);
            Response::Failed {
                reason: e.to_string(),
            }
        })
    }
}
