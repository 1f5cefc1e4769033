//! Connection registry and broadcast fan-out
//!
//! The [`Hub`] owns the set of live connections. Register, unregister and
//! broadcast requests from every connection arrive on a single intake channel
//! and are applied one at a time by [`Hub::run`], so the registry has exactly
//! one writer and needs no lock. Because the intake is FIFO, a connection
//! registered before a broadcast is submitted receives it and one registered
//! afterwards does not.
//!
//! Enqueuing onto a connection's outbound queue never waits: a peer whose
//! queue is full is dropped from the registry instead of stalling delivery to
//! everyone else. Dropping the registry's sender closes that queue, which is
//! the writer pump's signal to say goodbye and stop.

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// Registry key, unique for the lifetime of the process
pub type ConnectionId = u64;

/// One serialized message, shared by every queue it is fanned out to
pub type Payload = Arc<[u8]>;

/// Sending half of a connection's bounded outbound queue
pub type OutboundSender = mpsc::Sender<Payload>;

/// Requests serviced by the hub loop
#[derive(Debug)]
pub enum HubCommand {
    Register {
        id: ConnectionId,
        sender: OutboundSender,
    },
    Unregister {
        id: ConnectionId,
    },
    Broadcast {
        payload: Payload,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable submit side of the hub
#[derive(Clone)]
pub struct HubHandle {
    intake: mpsc::UnboundedSender<HubCommand>,
    next_id: Arc<AtomicU64>,
}

impl HubHandle {
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register(&self, id: ConnectionId, sender: OutboundSender) {
        self.submit(HubCommand::Register { id, sender });
    }

    pub fn unregister(&self, id: ConnectionId) {
        self.submit(HubCommand::Unregister { id });
    }

    /// Queues `payload` for every connection registered at the time the hub
    /// gets to this request.
    pub fn broadcast(&self, payload: impl Into<Payload>) {
        self.submit(HubCommand::Broadcast {
            payload: payload.into(),
        });
    }

    /// Number of registered connections, as seen by the hub loop after every
    /// previously submitted request. Returns 0 if the hub has stopped.
    pub async fn connection_count(&self) -> usize {
        let (reply, response) = oneshot::channel();
        self.submit(HubCommand::Count { reply });
        response.await.unwrap_or(0)
    }

    fn submit(&self, command: HubCommand) {
        if let Err(e) = self.intake.send(command) {
            error!("Hub is gone, dropping {:?}", e.0);
        }
    }
}

/// Single consumer owning the connection registry
pub struct Hub {
    connections: HashMap<ConnectionId, OutboundSender>,
    intake: mpsc::UnboundedReceiver<HubCommand>,
}

impl Hub {
    pub fn new() -> (Hub, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Hub {
            connections: HashMap::new(),
            intake: rx,
        };
        let handle = HubHandle {
            intake: tx,
            next_id: Arc::new(AtomicU64::new(1)),
        };
        (hub, handle)
    }

    /// Starts the hub loop on the runtime and returns its handle.
    pub fn spawn() -> HubHandle {
        let (hub, handle) = Hub::new();
        tokio::spawn(hub.run());
        handle
    }

    /// Services intake until every [`HubHandle`] has been dropped.
    pub async fn run(mut self) {
        while let Some(command) = self.intake.recv().await {
            self.handle(command);
        }
        debug!("Hub stopped with {} connections", self.connections.len());
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { id, sender } => {
                self.connections.insert(id, sender);
                info!(
                    "Connection {} registered ({} live)",
                    id,
                    self.connections.len()
                );
            }
            HubCommand::Unregister { id } => {
                // Dropping the sender closes the queue.
                if self.connections.remove(&id).is_some() {
                    info!(
                        "Connection {} unregistered ({} live)",
                        id,
                        self.connections.len()
                    );
                } else {
                    debug!("Connection {} already gone", id);
                }
            }
            HubCommand::Broadcast { payload } => self.broadcast(payload),
            HubCommand::Count { reply } => {
                let _ = reply.send(self.connections.len());
            }
        }
    }

    fn broadcast(&mut self, payload: Payload) {
        let mut dropped = Vec::new();

        for (id, sender) in &self.connections {
            match sender.try_send(Arc::clone(&payload)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Connection {} is lagging, dropping it", id);
                    dropped.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Connection {} writer has stopped", id);
                    dropped.push(*id);
                }
            }
        }

        for id in dropped {
            self.connections.remove(&id);
        }
    }
}
