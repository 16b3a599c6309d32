use crate::error::ClientError;
use crate::input::InputAction;
use crate::reconciler::Reconciler;
use crate::rendering::Renderer;
use crate::rpc::{RemoteCaller, RetryPolicy, TcpTransport, Transport};
use crate::world::{LocalCommand, LocalView, LocalWorld};
use log::{error, info, warn};
use shared::map::GameMap;
use shared::{actor, ActorHandle, CommandPayload, PlayerId, PlayerState, DEFAULT_SERVER_ADDR, RECONCILE_INTERVAL};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub map: Arc<GameMap>,
    pub reconcile_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            map: Arc::new(GameMap::default()),
            reconcile_interval: RECONCILE_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }
}

/// A connected client: the remote caller, the local world actor, the redraw
/// signal and the background reconciler.
pub struct Client<T> {
    player_id: PlayerId,
    caller: Arc<RemoteCaller<T>>,
    world: ActorHandle<LocalCommand>,
    world_task: JoinHandle<LocalWorld>,
    redraw: Arc<Notify>,
    shutdown_tx: watch::Sender<bool>,
    reconciler_task: JoinHandle<()>,
}

impl Client<TcpTransport> {
    /// Dials the server and joins the game. Both failures are fatal.
    pub async fn connect(config: ClientConfig, renderer: Box<dyn Renderer>) -> Result<Self, ClientError> {
        info!("Connecting to server at {}...", config.server_addr);
        let transport = TcpTransport::connect(config.server_addr.clone()).await?;
        Self::start(transport, config, renderer).await
    }
}

impl<T: Transport + 'static> Client<T> {
    /// Joins the game over `transport`, announces the map's spawn position
    /// and starts reconciling.
    pub async fn start(
        transport: T,
        config: ClientConfig,
        renderer: Box<dyn Renderer>,
    ) -> Result<Self, ClientError> {
        let caller = Arc::new(RemoteCaller::new(transport, config.retry));

        let (player_id, mut players) = caller.connect().await?;
        info!("Connected! Player ID: {}", player_id);

        // The server only knows a placeholder spawn; the map decides.
        let spawn = config.map.spawn();
        players.insert(player_id, spawn);
        let announce = caller.move_command(player_id, spawn);
        if let Err(e) = caller.submit(announce).await {
            warn!("Failed to announce spawn position {}: {}", spawn, e);
        }

        let (world, world_task) = actor::spawn(
            LocalWorld::new(Arc::clone(&config.map), player_id, players),
            64,
        );

        let redraw = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reconciler = Reconciler::new(
            Arc::clone(&caller),
            world.clone(),
            renderer,
            Arc::clone(&redraw),
            config.reconcile_interval,
        );
        let reconciler_task = tokio::spawn(reconciler.run(shutdown_rx));
        redraw.notify_one();

        Ok(Client {
            player_id,
            caller,
            world,
            world_task,
            redraw,
            shutdown_tx,
            reconciler_task,
        })
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub async fn view(&self) -> Result<LocalView, ClientError> {
        Ok(self.world.submit(|reply| LocalCommand::View { reply }).await?)
    }

    /// Moves the local player if the target cell is free, then reports the
    /// new position to the server in the background.
    pub async fn move_by(&self, dx: i32, dy: i32) -> Result<Option<PlayerState>, ClientError> {
        let moved = self
            .world
            .submit(|reply| LocalCommand::Move { dx, dy, reply })
            .await?;

        if let Some(position) = moved {
            self.redraw.notify_one();

            let command = self.caller.move_command(self.player_id, position);
            let caller = Arc::clone(&self.caller);
            tokio::spawn(async move {
                if let Err(e) = caller.submit(command).await {
                    warn!("Position {} #{} was not delivered: {}", position, command.sequence, e);
                }
            });
        }

        Ok(moved)
    }

    /// Applies one input action. Returns `false` once the client should stop.
    pub async fn handle_input(&self, action: InputAction) -> Result<bool, ClientError> {
        match action {
            InputAction::Move { dx, dy } => {
                self.move_by(dx, dy).await?;
                Ok(true)
            }
            InputAction::Quit => Ok(false),
        }
    }

    /// Processes input until `Quit` or until the input channel closes.
    pub async fn run(&self, mut actions: mpsc::Receiver<InputAction>) -> Result<(), ClientError> {
        info!("Controls: w/a/s/d + Enter to move, q to quit");

        while let Some(action) = actions.recv().await {
            if !self.handle_input(action).await? {
                break;
            }
        }

        Ok(())
    }

    /// Stops the reconciler, leaves the game and stops the local world.
    /// Leaving is best effort: a server that cannot be reached is only logged.
    pub async fn shutdown(self) -> Result<LocalView, ClientError> {
        info!("Shutting down client...");

        self.shutdown_tx.send_replace(true);
        if let Err(e) = self.reconciler_task.await {
            error!("Reconciler task failed: {}", e);
        }

        let leave = self.caller.command(self.player_id, CommandPayload::Leave);
        match self.caller.submit(leave).await {
            Ok(()) => info!("Disconnected player {}", self.player_id),
            Err(e) => warn!("Failed to disconnect player {}: {}", self.player_id, e),
        }

        self.world.shutdown();
        Ok(self.world_task.await?.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::LogRenderer;
    use crate::rpc::RpcError;
    use async_trait::async_trait;
    use server::service::GameService;
    use server::world::World;
    use shared::{Request, Response, WorldTable};

    /// Calls the game service directly, without a socket.
    struct InProcess(GameService);

    #[async_trait]
    impl Transport for InProcess {
        async fn call(&mut self, request: &Request) -> Result<Response, RpcError> {
            match self.0.handle(request.clone()).await {
                Response::Failed { reason } => Err(RpcError::Remote(reason)),
                response => Ok(response),
            }
        }
    }

    fn game_service() -> GameService {
        let (world, _task) = actor::spawn(World::default(), 64);
        GameService::new(world)
    }

    fn config() -> ClientConfig {
        ClientConfig {
            reconcile_interval: Duration::from_millis(10),
            retry: RetryPolicy::new(3, Duration::from_millis(5)),
            ..ClientConfig::default()
        }
    }

    async fn start(service: &GameService) -> Client<InProcess> {
        Client::start(InProcess(service.clone()), config(), Box::new(LogRenderer::new()))
            .await
            .unwrap()
    }

    async fn server_table(service: &GameService) -> WorldTable {
        service.get_state().await.unwrap()
    }

    #[tokio::test]
    async fn test_start_announces_map_spawn() {
        let service = game_service();
        let client = start(&service).await;

        assert_eq!(client.player_id(), 1);
        let spawn = GameMap::default().spawn();
        assert_eq!(server_table(&service).await.get(&1), Some(&spawn));
        assert_eq!(client.view().await.unwrap().local_position(), Some(spawn));
    }

    #[tokio::test]
    async fn test_move_reaches_server() {
        let service = game_service();
        let client = start(&service).await;

        let moved = client.move_by(1, 0).await.unwrap();
        assert_eq!(moved, Some(PlayerState::new(2, 1)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server_table(&service).await.get(&1), Some(&PlayerState::new(2, 1)));
    }

    #[tokio::test]
    async fn test_blocked_move_sends_nothing() {
        let service = game_service();
        let client = start(&service).await;

        assert_eq!(client.move_by(-1, 0).await.unwrap(), None);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(server_table(&service).await.get(&1), Some(&PlayerState::new(1, 1)));
    }

    #[tokio::test]
    async fn test_clients_see_each_other() {
        let service = game_service();
        let first = start(&service).await;
        let second = start(&service).await;

        // second spawns on top of the first one's cell and steps away
        assert_eq!(second.move_by(0, 1).await.unwrap(), Some(PlayerState::new(1, 2)));
        tokio::time::sleep(Duration::from_millis(60)).await;

        let view = first.view().await.unwrap();
        assert_eq!(view.players.len(), 2);
        assert_eq!(view.players.get(&second.player_id()), Some(&PlayerState::new(1, 2)));

        // the cell below is now taken
        assert_eq!(first.move_by(0, 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_run_stops_on_quit() {
        let service = game_service();
        let client = start(&service).await;

        let (tx, rx) = mpsc::channel(8);
        tx.send(InputAction::Move { dx: 1, dy: 0 }).await.unwrap();
        tx.send(InputAction::Quit).await.unwrap();
        tx.send(InputAction::Move { dx: 1, dy: 0 }).await.unwrap();

        client.run(rx).await.unwrap();
        // let a reconcile tick pick up the delivered position
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            client.view().await.unwrap().local_position(),
            Some(PlayerState::new(2, 1))
        );
    }

    #[tokio::test]
    async fn test_shutdown_leaves_game() {
        let service = game_service();
        let client = start(&service).await;
        client.move_by(1, 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let last_view = client.shutdown().await.unwrap();

        assert_eq!(last_view.local_position(), Some(PlayerState::new(2, 1)));
        assert!(server_table(&service).await.is_empty());
    }

    #[tokio::test]
    async fn test_start_fails_when_server_unavailable() {
        let (world, task) = actor::spawn(World::default(), 8);
        world.shutdown();
        task.await.unwrap();

        let result = Client::start(
            InProcess(GameService::new(world)),
            config(),
            Box::new(LogRenderer::new()),
        )
        .await;
        assert!(matches!(result, Err(ClientError::Rpc(_))));
    }
}
