//! Server network layer handling TCP connections and request dispatch

use crate::service::GameService;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::protocol::{self, Bytes, MessageStream, ProtocolError, MAX_FRAME_LENGTH};
use shared::{Request, Response};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

/// Accepts client connections and serves their requests against the game service
pub struct Server {
    listener: TcpListener,
    service: GameService,
}

impl Server {
    pub async fn bind(addr: &str, service: GameService) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server { listener, service })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Each connection is served on its own task until the
    /// peer hangs up or `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Server started successfully");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Server shutting down");
                        break;
                    }
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr, shutdown.clone()),
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr, shutdown: watch::Receiver<bool>) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        let service = self.service.clone();
        tokio::spawn(async move {
            info!("Connection opened from {}", addr);
            serve_connection(protocol::framed(stream), addr, service, shutdown).await;
            info!("Connection from {} closed", addr);
        });
    }
}

/// Answers each request frame with exactly one response frame, in order.
async fn serve_connection(
    mut framed: MessageStream,
    addr: SocketAddr,
    service: GameService,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let frame = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            frame = framed.next() => frame,
        };

        let response = match frame {
            None => break,
            Some(Err(e)) => {
                warn!("Error reading from {}: {}", addr, e);
                break;
            }
            Some(Ok(bytes)) => match protocol::decode::<Request>(&bytes) {
                Ok(request) => {
                    debug!("{} <- {:?}", addr, request);
                    service.handle(request).await
                }
                Err(e) => {
                    warn!("Failed to decode request from {}: {}", addr, e);
                    Response::Failed {
                        reason: "malformed request".to_string(),
                    }
                }
            },
        };

        let bytes = match encode_response(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode response for {}: {}", addr, e);
                break;
            }
        };

        if let Err(e) = framed.send(bytes).await {
            error!("Failed to send response to {}: {}", addr, e);
            break;
        }
    }
}

/// Encodes `response`, swapping it for a `Failed` reply if it would not fit
/// in one frame, so the peer always gets an answer.
fn encode_response(response: &Response) -> Result<Bytes, ProtocolError> {
    let bytes = protocol::encode(response)?;
    if bytes.len() <= MAX_FRAME_LENGTH {
        return Ok(bytes);
    }

    warn!(
        "Response of {} bytes exceeds the {} byte frame limit",
        bytes.len(),
        MAX_FRAME_LENGTH
    );
    protocol::encode(&Response::Failed {
        reason: "response too large".to_string(),
    })
}
