//! The hub control loop, sole owner of the client registry.
//!
//! Every registry mutation and every fan-out happens inside [`Hub::run`].
//! Other tasks talk to it through a cloneable [`HubHandle`] that only ever
//! enqueues commands; submissions never block.

use chrono::{DateTime, Utc};
use hubcast_core::{HubcastError, Payload, Result};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::outbound::{outbound_queue, OutboundReceiver, OutboundSender, PushError};

/// Unique client identifier. Display names are not unique.
pub type ClientId = uuid::Uuid;

/// Registry entry: identity plus the sending half of the client's queue.
#[derive(Debug)]
pub struct Member {
    pub id: ClientId,
    pub name: String,
    pub outbound: OutboundSender,
}

impl Member {
    pub fn new(name: impl Into<String>, outbound: OutboundSender) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name: name.into(),
            outbound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberInfo {
    pub id: ClientId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub clients: usize,
    pub joins: u64,
    pub leaves: u64,
    pub broadcasts: u64,
    pub evictions: u64,
    pub started_at: DateTime<Utc>,
}

/// Commands accepted by the control loop, processed in arrival order.
#[derive(Debug)]
pub enum HubCommand {
    Join(Member),
    Leave(ClientId),
    Broadcast {
        payload: Payload,
        origin: Option<ClientId>,
    },
    Stats(oneshot::Sender<HubStats>),
    Members(oneshot::Sender<Vec<MemberInfo>>),
}

pub struct Hub {
    registry: HashMap<ClientId, Member>,
    commands: mpsc::UnboundedReceiver<HubCommand>,
    joins: u64,
    leaves: u64,
    broadcasts: u64,
    evictions: u64,
    started_at: DateTime<Utc>,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            registry: HashMap::new(),
            commands: rx,
            joins: 0,
            leaves: 0,
            broadcasts: 0,
            evictions: 0,
            started_at: Utc::now(),
        };
        (hub, HubHandle { tx })
    }

    /// Create a hub and run its loop on a background task.
    pub fn spawn() -> HubHandle {
        let (hub, handle) = Self::new();
        tokio::spawn(hub.run());
        handle
    }

    /// Serve commands until every [`HubHandle`] has been dropped.
    pub async fn run(mut self) {
        info!("hub control loop started");
        while let Some(cmd) = self.commands.recv().await {
            self.handle(cmd);
        }
        info!(clients = self.registry.len(), "hub control loop stopped");
    }

    fn handle(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Join(member) => self.join(member),
            HubCommand::Leave(id) => self.leave(id),
            HubCommand::Broadcast { payload, origin } => {
                self.broadcasts += 1;
                self.fan_out(payload, origin);
            }
            HubCommand::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
            HubCommand::Members(reply) => {
                let members = self
                    .registry
                    .values()
                    .map(|m| MemberInfo {
                        id: m.id,
                        name: m.name.clone(),
                    })
                    .collect();
                let _ = reply.send(members);
            }
        }
    }

    fn join(&mut self, member: Member) {
        if self.registry.contains_key(&member.id) {
            debug!(client = %member.id, "duplicate join ignored");
            return;
        }
        let id = member.id;
        let notice = Payload::system(format!("{} joined", member.name));
        self.registry.insert(id, member);
        self.joins += 1;
        info!(client = %id, clients = self.registry.len(), "client joined");
        self.fan_out(notice, Some(id));
    }

    fn leave(&mut self, id: ClientId) {
        let Some(member) = self.registry.remove(&id) else {
            debug!(client = %id, "leave for unknown client ignored");
            return;
        };
        member.outbound.close();
        self.leaves += 1;
        info!(client = %id, name = %member.name, clients = self.registry.len(), "client left");
        self.fan_out(Payload::system(format!("{} left", member.name)), None);
    }

    /// Offer `payload` to every member except `exclude`. Members whose queue
    /// is full are evicted on the spot, without a "left" notice.
    fn fan_out(&mut self, payload: Payload, exclude: Option<ClientId>) {
        let mut slow = Vec::new();
        for (id, member) in &self.registry {
            if Some(*id) == exclude {
                continue;
            }
            match member.outbound.try_push(payload.clone()) {
                Ok(()) => {}
                Err(PushError::Full) => slow.push(*id),
                // writer already gone; its own Leave is on the way
                Err(PushError::Disconnected) => {
                    debug!(client = %id, "queue receiver gone, skipped");
                }
            }
        }
        for id in slow {
            if let Some(member) = self.registry.remove(&id) {
                member.outbound.close();
                self.evictions += 1;
                warn!(
                    client = %id,
                    name = %member.name,
                    clients = self.registry.len(),
                    "evicted slow client"
                );
            }
        }
    }

    fn stats(&self) -> HubStats {
        HubStats {
            clients: self.registry.len(),
            joins: self.joins,
            leaves: self.leaves,
            broadcasts: self.broadcasts,
            evictions: self.evictions,
            started_at: self.started_at,
        }
    }
}

/// Cheap, cloneable submission side of the hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    fn submit(&self, cmd: HubCommand) -> Result<()> {
        self.tx.send(cmd).map_err(|_| HubcastError::HubUnavailable)
    }

    /// Queue a Join for `member`.
    pub fn register(&self, member: Member) -> Result<()> {
        self.submit(HubCommand::Join(member))
    }

    /// Queue a Leave. Unknown ids are ignored by the hub.
    pub fn unregister(&self, id: ClientId) -> Result<()> {
        self.submit(HubCommand::Leave(id))
    }

    /// Queue a broadcast to every member except `origin`.
    pub fn broadcast(&self, payload: Payload, origin: Option<ClientId>) -> Result<()> {
        self.submit(HubCommand::Broadcast { payload, origin })
    }

    /// Broadcast a `[system]` notice to every member.
    pub fn notify(&self, text: impl AsRef<str>) -> Result<()> {
        self.broadcast(Payload::system(text), None)
    }

    pub async fn stats(&self) -> Result<HubStats> {
        let (reply, rx) = oneshot::channel();
        self.submit(HubCommand::Stats(reply))?;
        rx.await.map_err(|_| HubcastError::HubUnavailable)
    }

    pub async fn members(&self) -> Result<Vec<MemberInfo>> {
        let (reply, rx) = oneshot::channel();
        self.submit(HubCommand::Members(reply))?;
        rx.await.map_err(|_| HubcastError::HubUnavailable)
    }

    /// Register a receive-only member and hand back its queue.
    ///
    /// Dropping the returned [`Subscription`] unregisters it.
    pub fn subscribe(&self, name: impl Into<String>, capacity: usize) -> Result<Subscription> {
        let (tx, rx) = outbound_queue(capacity);
        let member = Member::new(name, tx);
        let id = member.id;
        self.register(member)?;
        Ok(Subscription {
            id,
            hub: self.clone(),
            receiver: rx,
        })
    }
}

/// Membership held by a listener that never sends (e.g. an SSE stream).
pub struct Subscription {
    id: ClientId,
    hub: HubHandle,
    receiver: OutboundReceiver,
}

impl Subscription {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Next payload, or `None` once the hub has closed this member's queue.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.hub.unregister(self.id);
    }
}
