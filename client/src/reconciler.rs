//! Periodic pull of the server's table into the local mirror

use crate::error::ClientError;
use crate::rendering::Renderer;
use crate::rpc::{RemoteCaller, RetryPolicy, Transport};
use crate::world::LocalCommand;
use log::{debug, info};
use shared::ActorHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::{interval, MissedTickBehavior};

/// Owns the renderer. Every tick it fetches GetState and replaces the local
/// mirror; in between, a redraw can be requested through `redraw`.
pub struct Reconciler<T> {
    caller: Arc<RemoteCaller<T>>,
    world: ActorHandle<LocalCommand>,
    renderer: Box<dyn Renderer>,
    redraw: Arc<Notify>,
    period: Duration,
    policy: RetryPolicy,
}

impl<T: Transport + 'static> Reconciler<T> {
    pub fn new(
        caller: Arc<RemoteCaller<T>>,
        world: ActorHandle<LocalCommand>,
        renderer: Box<dyn Renderer>,
        redraw: Arc<Notify>,
        period: Duration,
    ) -> Self {
        Self {
            caller,
            world,
            renderer,
            redraw,
            period,
            // a missed tick is superseded by the next one
            policy: RetryPolicy::single(),
        }
    }

    /// One GetState round trip followed by a full replace of the mirror.
    pub async fn reconcile_once(&mut self) -> Result<(), ClientError> {
        let players = self.caller.get_state(self.policy).await?;
        self.world
            .submit(|reply| LocalCommand::Reconcile { players, reply })
            .await?;
        Ok(())
    }

    async fn draw(&mut self) -> Result<(), ClientError> {
        let view = self.world.submit(|reply| LocalCommand::View { reply }).await?;
        self.renderer.render(&view);
        Ok(())
    }

    /// Runs until `shutdown` flips or the local world goes away.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let drawn = tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }

                _ = self.redraw.notified() => self.draw().await,

                _ = ticker.tick() => match self.reconcile_once().await {
                    Ok(()) => self.draw().await,
                    Err(e) => {
                        debug!("Skipping reconcile tick: {}", e);
                        continue;
                    }
                },
            };

            if let Err(e) = drawn {
                debug!("Stopping reconciler: {}", e);
                break;
            }
        }

        info!("Reconciler stopped");
    }
}
