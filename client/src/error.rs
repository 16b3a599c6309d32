use crate::rpc::RpcError;
use shared::map::MapError;
use shared::ActorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("remote call failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("local world unavailable: {0}")]
    Actor(#[from] ActorError),

    #[error("map error: {0}")]
    Map(#[from] MapError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
