//! Single-owner state actor
//!
//! An actor owns a piece of mutable state on one tokio task and applies the
//! commands it receives strictly one at a time, in the order they were queued.
//! Callers never see the state directly: they build a typed command carrying a
//! `oneshot` responder, queue it through an [`ActorHandle`] and wait for the
//! reply.
//!
//! Shutdown is a separate signal from the mailbox. Once it fires the loop
//! stops, commands still queued are dropped (their callers get
//! [`ActorError::Shutdown`]) and later submissions fail the same way.

use log::debug;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Reply half handed to the actor inside each command.
pub type Responder<T> = oneshot::Sender<T>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ActorError {
    #[error("actor has shut down")]
    Shutdown,
}

/// State that can be driven by an actor task.
pub trait Actor: Send + 'static {
    type Message: Send + 'static;

    /// Applies one command. Runs to completion before the next one starts.
    fn handle(&mut self, message: Self::Message);
}

/// Cloneable entry point to a running actor.
pub struct ActorHandle<M> {
    mailbox: mpsc::Sender<M>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl<M> Clone for ActorHandle<M> {
    fn clone(&self) -> Self {
        Self {
            mailbox: self.mailbox.clone(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl<M: Send + 'static> ActorHandle<M> {
    /// Queues a command and waits until the actor has executed it.
    ///
    /// `make` receives the responder the actor will answer on and returns the
    /// command to queue.
    pub async fn submit<T>(&self, make: impl FnOnce(Responder<T>) -> M) -> Result<T, ActorError> {
        if self.is_shut_down() {
            return Err(ActorError::Shutdown);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.mailbox
            .send(make(reply_tx))
            .await
            .map_err(|_| ActorError::Shutdown)?;

        reply_rx.await.map_err(|_| ActorError::Shutdown)
    }

    /// Signals the actor loop to stop. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow() || self.mailbox.is_closed()
    }
}

/// Starts `actor` on its own task.
///
/// `capacity` bounds the mailbox; submitters wait for room once it is full.
/// The join handle yields the final state after shutdown.
pub fn spawn<A: Actor>(actor: A, capacity: usize) -> (ActorHandle<A::Message>, JoinHandle<A>) {
    let (mailbox_tx, mailbox_rx) = mpsc::channel(capacity.max(1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = ActorHandle {
        mailbox: mailbox_tx,
        shutdown: Arc::new(shutdown_tx),
    };

    let task = tokio::spawn(run(actor, mailbox_rx, shutdown_rx));
    (handle, task)
}

async fn run<A: Actor>(
    mut actor: A,
    mut mailbox: mpsc::Receiver<A::Message>,
    mut shutdown: watch::Receiver<bool>,
) -> A {
    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }

            message = mailbox.recv() => match message {
                Some(message) => actor.handle(message),
                None => break,
            },
        }
    }

    // Dropping queued commands drops their responders, which wakes the
    // waiting callers with `ActorError::Shutdown`.
    mailbox.close();
    while mailbox.try_recv().is_ok() {}
    debug!("Actor loop stopped");

    actor
}
