//! Integration tests for the position synchronization components
//!
//! These tests start a real server on a loopback port and talk to it over TCP.

use client::network::{Client, ClientConfig};
use client::rendering::LogRenderer;
use client::rpc::{RemoteCaller, RetryPolicy, RpcError, TcpTransport};
use futures_util::{SinkExt, StreamExt};
use server::network::Server;
use server::service::GameService;
use server::world::World;
use shared::protocol::{self, MessageStream};
use shared::{actor, ActorHandle, PlayerState, Request, Response, WorldTable};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::copy_bidirectional;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::time::sleep;
use tokio_util::bytes::Bytes;
use tokio_test::{assert_err, assert_ok};

struct TestServer {
    addr: SocketAddr,
    service: GameService,
    world: ActorHandle<server::world::WorldCommand>,
    shutdown: watch::Sender<bool>,
}

impl TestServer {
    async fn start() -> Self {
        let (world, _task) = actor::spawn(World::default(), 1024);
        let service = GameService::new(world.clone());
        let server = Server::bind("127.0.0.1:0", service.clone()).await.unwrap();
        let addr = server.local_addr().unwrap();

        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(server.run(shutdown_rx));

        TestServer {
            addr,
            service,
            world,
            shutdown,
        }
    }

    fn caller(&self) -> RemoteCaller<TcpTransport> {
        RemoteCaller::new(TcpTransport::new(self.addr.to_string()), fast_retry())
    }

    async fn table(&self) -> WorldTable {
        self.service.get_state().await.unwrap()
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(20))
}

async fn raw_connection(addr: SocketAddr) -> MessageStream {
    protocol::framed(TcpStream::connect(addr).await.unwrap())
}

async fn roundtrip(framed: &mut MessageStream, request: &Request) -> Response {
    framed.send(protocol::encode(request).unwrap()).await.unwrap();
    let frame = framed.next().await.unwrap().unwrap();
    protocol::decode(&frame).unwrap()
}

fn update(player_id: u32, x: i32, y: i32, sequence: u32) -> Request {
    Request::UpdateState {
        player_id,
        new_x: x,
        new_y: y,
        sequence,
    }
}

/// GAME SERVICE OVER THE WIRE
mod service_tests {
    use super::*;

    /// Connect, move, replay the move, leave
    #[tokio::test]
    async fn connect_update_replay_disconnect_scenario() {
        let server = TestServer::start().await;
        let mut framed = raw_connection(server.addr).await;

        match roundtrip(&mut framed, &Request::Connect).await {
            Response::Connected {
                player_id,
                all_players,
            } => {
                assert_eq!(player_id, 1);
                assert_eq!(all_players, WorldTable::from([(1, PlayerState::new(1, 1))]));
            }
            other => panic!("Unexpected response: {:?}", other),
        }

        assert_eq!(roundtrip(&mut framed, &update(1, 5, 7, 1)).await, Response::Ack);
        assert_eq!(server.table().await, WorldTable::from([(1, PlayerState::new(5, 7))]));

        // replay is acknowledged and changes nothing
        assert_eq!(roundtrip(&mut framed, &update(1, 5, 7, 1)).await, Response::Ack);
        assert_eq!(server.table().await, WorldTable::from([(1, PlayerState::new(5, 7))]));

        let leave = Request::Disconnect {
            player_id: 1,
            sequence: 2,
        };
        assert_eq!(roundtrip(&mut framed, &leave).await, Response::Ack);
        assert!(server.table().await.is_empty());
    }

    /// Many clients connecting at once all get distinct ids
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_connects_unique_ids() {
        let server = TestServer::start().await;

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let addr = server.addr;
            tasks.push(tokio::spawn(async move {
                let mut framed = raw_connection(addr).await;
                match roundtrip(&mut framed, &Request::Connect).await {
                    Response::Connected { player_id, .. } => player_id,
                    other => panic!("Unexpected response: {:?}", other),
                }
            }));
        }

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), 32);
        assert_eq!(server.table().await.len(), 32);
    }

    /// A newer update delivered before an older one wins
    #[tokio::test]
    async fn out_of_order_delivery() {
        let server = TestServer::start().await;
        let mut framed = raw_connection(server.addr).await;
        roundtrip(&mut framed, &Request::Connect).await;

        assert_eq!(roundtrip(&mut framed, &update(1, 9, 9, 5)).await, Response::Ack);
        assert_eq!(roundtrip(&mut framed, &update(1, 2, 2, 3)).await, Response::Ack);

        assert_eq!(server.table().await.get(&1), Some(&PlayerState::new(9, 9)));
    }

    /// Whatever order the updates arrive in, the highest sequence sticks
    #[tokio::test]
    async fn shuffled_delivery_converges() {
        use rand::seq::SliceRandom;

        let server = TestServer::start().await;
        let mut framed = raw_connection(server.addr).await;
        roundtrip(&mut framed, &Request::Connect).await;

        let mut sequences: Vec<u32> = (1..=30).collect();
        sequences.shuffle(&mut rand::thread_rng());

        for sequence in sequences {
            let x = sequence as i32;
            assert_eq!(roundtrip(&mut framed, &update(1, x, -x, sequence)).await, Response::Ack);
        }

        assert_eq!(server.table().await.get(&1), Some(&PlayerState::new(30, -30)));
    }

    /// Undecodable frames are answered with a failure and the connection survives
    #[tokio::test]
    async fn malformed_frame_handling() {
        let server = TestServer::start().await;
        let mut framed = raw_connection(server.addr).await;

        // a response is not a valid request
        let wrong_kind = bincode::serialize(&Response::Ack).unwrap();
        framed.send(Bytes::from(wrong_kind)).await.unwrap();
        let frame = framed.next().await.unwrap().unwrap();
        let response: Response = protocol::decode(&frame).unwrap();
        assert!(matches!(response, Response::Failed { .. }));

        assert!(matches!(
            roundtrip(&mut framed, &Request::Connect).await,
            Response::Connected { player_id: 1, .. }
        ));
    }

    /// A stopped world answers with failures instead of hanging
    #[tokio::test]
    async fn world_shutdown_reported_as_failure() {
        let server = TestServer::start().await;
        let mut framed = raw_connection(server.addr).await;

        server.world.shutdown();
        sleep(Duration::from_millis(20)).await;

        assert!(matches!(
            roundtrip(&mut framed, &Request::GetState).await,
            Response::Failed { .. }
        ));
    }
}

/// REMOTE CALLER AGAINST REAL SOCKETS
mod caller_tests {
    use super::*;

    /// An unreachable server is tried exactly three times, then the call returns
    #[tokio::test]
    async fn retry_bound_against_closed_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let caller = RemoteCaller::new(TcpTransport::new(addr.to_string()), fast_retry());
        let start = Instant::now();

        match assert_err!(caller.get_state(fast_retry()).await) {
            RpcError::Exhausted { method, attempts } => {
                assert_eq!(method, "GetState");
                assert_eq!(attempts, 3);
            }
            other => panic!("Unexpected error: {:?}", other),
        }

        // two backoffs, none after the final attempt
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(40));
        assert!(elapsed < Duration::from_secs(5));
    }

    /// Forwards every accepted connection to `upstream`. The first one is
    /// severed when `cut` fires; later ones are piped until either side closes.
    async fn start_relay(upstream: SocketAddr, cut: oneshot::Receiver<()>) -> (SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            let mut cut = Some(cut);
            while let Ok((mut inbound, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut outbound = TcpStream::connect(upstream).await.unwrap();
                let cut = cut.take();

                tokio::spawn(async move {
                    match cut {
                        Some(cut) => {
                            tokio::select! {
                                _ = copy_bidirectional(&mut inbound, &mut outbound) => {}
                                _ = cut => {}
                            }
                        }
                        None => {
                            let _ = copy_bidirectional(&mut inbound, &mut outbound).await;
                        }
                    }
                });
            }
        });

        (addr, accepted)
    }

    /// The transport redials after its connection is severed mid-session
    #[tokio::test]
    async fn redial_after_connection_loss() {
        let server = TestServer::start().await;
        let (cut_tx, cut_rx) = oneshot::channel();
        let (relay_addr, accepted) = start_relay(server.addr, cut_rx).await;

        let caller = RemoteCaller::new(TcpTransport::new(relay_addr.to_string()), fast_retry());
        let (player_id, _) = assert_ok!(caller.connect().await);
        assert_eq!(accepted.load(Ordering::SeqCst), 1);

        cut_tx.send(()).unwrap();
        sleep(Duration::from_millis(30)).await;

        // the first attempt hits the dead socket, a retry dials again and the
        // command still applies under its original sequence number
        let command = caller.move_command(player_id, PlayerState::new(4, 4));
        assert_ok!(caller.submit(command).await);
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
        assert_eq!(server.table().await.get(&player_id), Some(&PlayerState::new(4, 4)));

        // the redialed connection is reused for later commands
        let next = caller.move_command(player_id, PlayerState::new(5, 4));
        assert_eq!(next.sequence, command.sequence + 1);
        assert_ok!(caller.submit(next).await);
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    /// Sequence numbers increase by one per command
    #[tokio::test]
    async fn sequence_numbers_per_command() {
        let server = TestServer::start().await;
        let caller = server.caller();
        let (player_id, _) = assert_ok!(caller.connect().await);

        for step in 1..=5 {
            let command = caller.move_command(player_id, PlayerState::new(step, step));
            assert_eq!(command.sequence, step as u32);
            assert_ok!(caller.submit(command).await);
        }

        assert_eq!(server.table().await.get(&player_id), Some(&PlayerState::new(5, 5)));
    }
}

/// FULL CLIENTS AGAINST A REAL SERVER
mod client_tests {
    use super::*;

    fn config(addr: SocketAddr) -> ClientConfig {
        ClientConfig {
            server_addr: addr.to_string(),
            reconcile_interval: Duration::from_millis(20),
            retry: fast_retry(),
            ..ClientConfig::default()
        }
    }

    /// Two clients move and see each other through reconciliation
    #[tokio::test]
    async fn two_clients_converge() {
        let server = TestServer::start().await;
        let first = Client::connect(config(server.addr), Box::new(LogRenderer::new()))
            .await
            .unwrap();
        let second = Client::connect(config(server.addr), Box::new(LogRenderer::new()))
            .await
            .unwrap();

        assert_eq!(first.move_by(1, 0).await.unwrap(), Some(PlayerState::new(2, 1)));
        assert_eq!(second.move_by(0, 1).await.unwrap(), Some(PlayerState::new(1, 2)));
        sleep(Duration::from_millis(150)).await;

        let expected = WorldTable::from([
            (first.player_id(), PlayerState::new(2, 1)),
            (second.player_id(), PlayerState::new(1, 2)),
        ]);
        assert_eq!(server.table().await, expected);
        assert_eq!(first.view().await.unwrap().players, expected);
        assert_eq!(second.view().await.unwrap().players, expected);

        first.shutdown().await.unwrap();
        second.shutdown().await.unwrap();
        assert!(server.table().await.is_empty());
    }

    /// Connecting to nothing is fatal
    #[tokio::test]
    async fn connect_fails_without_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = Client::connect(config(addr), Box::new(LogRenderer::new())).await;
        assert!(result.is_err());
    }

    /// Shutdown still completes when the server has gone away
    #[tokio::test]
    async fn shutdown_without_server_is_bounded() {
        let server = TestServer::start().await;
        let client = Client::connect(config(server.addr), Box::new(LogRenderer::new()))
            .await
            .unwrap();

        server.shutdown.send(true).unwrap();
        sleep(Duration::from_millis(30)).await;

        let start = Instant::now();
        let view = client.shutdown().await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(view.player_id, 1);
    }
}
