//! A connected peer: one task reading from its connection into the hub, one
//! task writing its outbound queue (plus heartbeat pings) to the connection.
//!
//! The two pumps share a `CancellationToken`. Whichever stops first cancels
//! it, so the other follows within one scheduling step. The read pump always
//! submits the client's Leave on the way out.

use hubcast_core::{HeartbeatPolicy, HubcastConfig, Liveness, Payload, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionReader, ConnectionWriter, Frame};
use crate::hub::{ClientId, HubHandle, Member};
use crate::outbound::{outbound_queue, OutboundReceiver};

/// Per-client limits and timing.
#[derive(Debug, Clone, Copy)]
pub struct ClientSettings {
    pub outbound_capacity: usize,
    pub max_message_bytes: usize,
    pub heartbeat: HeartbeatPolicy,
}

impl ClientSettings {
    pub fn from_config(config: &HubcastConfig) -> Result<Self> {
        Ok(Self {
            outbound_capacity: config.hub.outbound_capacity,
            max_message_bytes: config.hub.max_message_bytes,
            heartbeat: config.heartbeat.policy()?,
        })
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: hubcast_core::config::OUTBOUND_CAPACITY,
            max_message_bytes: hubcast_core::config::MAX_MESSAGE_BYTES,
            heartbeat: HeartbeatPolicy::default(),
        }
    }
}

/// Why the read pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadExit {
    PeerClosed,
    Transport(String),
    TooLarge { size: usize },
    /// No pong arrived before the read deadline.
    Dead,
    Cancelled,
    Aborted,
}

/// Why the write pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteExit {
    /// The hub closed the outbound queue (leave or eviction).
    QueueClosed,
    Transport(String),
    Timeout,
    Cancelled,
    Aborted,
}

/// Handles to a running client's pumps.
pub struct ClientTasks {
    id: ClientId,
    cancel: CancellationToken,
    read: JoinHandle<ReadExit>,
    write: JoinHandle<WriteExit>,
}

impl ClientTasks {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Stop both pumps; the client leaves the hub.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for both pumps to finish.
    pub async fn wait(self) -> (ReadExit, WriteExit) {
        let read = self.read.await.unwrap_or(ReadExit::Aborted);
        let write = self.write.await.unwrap_or(WriteExit::Aborted);
        (read, write)
    }
}

/// Register a new client with the hub and start its pumps.
///
/// `cancel` is the governing context: cancelling it (or any parent token)
/// stops both pumps and the client leaves the hub.
pub fn spawn_client<C: Connection>(
    hub: &HubHandle,
    name: impl Into<String>,
    conn: C,
    settings: &ClientSettings,
    cancel: CancellationToken,
) -> Result<ClientTasks> {
    let name = name.into();
    let (tx, rx) = outbound_queue(settings.outbound_capacity);
    let member = Member::new(name.clone(), tx);
    let id = member.id;
    hub.register(member)?;

    let (reader, writer) = conn.split();
    let (probe_tx, probe_rx) = watch::channel(0u64);

    let write = tokio::spawn(
        WritePump {
            id,
            writer,
            outbound: rx,
            policy: settings.heartbeat,
            probes: probe_tx,
            cancel: cancel.clone(),
        }
        .run(),
    );
    let read = tokio::spawn(
        ReadPump {
            id,
            name,
            reader,
            hub: hub.clone(),
            policy: settings.heartbeat,
            max_message_bytes: settings.max_message_bytes,
            probes: probe_rx,
            cancel: cancel.clone(),
        }
        .run(),
    );

    Ok(ClientTasks {
        id,
        cancel,
        read,
        write,
    })
}

struct ReadPump<R> {
    id: ClientId,
    name: String,
    reader: R,
    hub: HubHandle,
    policy: HeartbeatPolicy,
    max_message_bytes: usize,
    /// Bumped by the write pump each time a ping goes out.
    probes: watch::Receiver<u64>,
    cancel: CancellationToken,
}

impl<R: ConnectionReader> ReadPump<R> {
    async fn run(mut self) -> ReadExit {
        let mut liveness = Liveness::new(Instant::now().into_std(), &self.policy);
        let mut probes_open = true;

        let exit = loop {
            let deadline = Instant::from_std(liveness.deadline());
            tokio::select! {
                _ = self.cancel.cancelled() => break ReadExit::Cancelled,

                _ = tokio::time::sleep_until(deadline) => {
                    if liveness.expire(Instant::now().into_std()) {
                        warn!(client = %self.id, name = %self.name, "no pong before read deadline");
                        break ReadExit::Dead;
                    }
                }

                changed = self.probes.changed(), if probes_open => match changed {
                    Ok(()) => liveness.probe_sent(),
                    Err(_) => probes_open = false,
                },

                frame = self.reader.recv() => match frame {
                    None | Some(Ok(Frame::Close)) => break ReadExit::PeerClosed,
                    Some(Err(e)) => break ReadExit::Transport(e.to_string()),
                    Some(Ok(Frame::Pong)) => liveness.acknowledge(Instant::now().into_std()),
                    Some(Ok(Frame::Ping)) => {}
                    Some(Ok(Frame::Data(bytes))) => {
                        if bytes.len() > self.max_message_bytes {
                            warn!(
                                client = %self.id,
                                size = bytes.len(),
                                max = self.max_message_bytes,
                                "message too large"
                            );
                            break ReadExit::TooLarge { size: bytes.len() };
                        }
                        self.forward(&bytes);
                    }
                },
            }
        };

        if self.hub.unregister(self.id).is_err() {
            debug!(client = %self.id, "hub gone before leave");
        }
        self.cancel.cancel();
        info!(client = %self.id, name = %self.name, reason = ?exit, "read pump stopped");
        exit
    }

    fn forward(&self, raw: &[u8]) {
        match Payload::chat(&self.name, raw) {
            Ok(payload) => {
                debug!(client = %self.id, bytes = raw.len(), "message received");
                if self.hub.broadcast(payload, Some(self.id)).is_err() {
                    debug!(client = %self.id, "hub gone, message dropped");
                }
            }
            Err(e) => warn!(client = %self.id, error = %e, "ignoring malformed message"),
        }
    }
}

struct WritePump<W> {
    id: ClientId,
    writer: W,
    outbound: OutboundReceiver,
    policy: HeartbeatPolicy,
    probes: watch::Sender<u64>,
    cancel: CancellationToken,
}

impl<W: ConnectionWriter> WritePump<W> {
    async fn run(mut self) -> WriteExit {
        let period = self.policy.ping_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.send_close().await;
                    break WriteExit::Cancelled;
                }

                next = self.outbound.recv() => match next {
                    None => {
                        self.send_close().await;
                        break WriteExit::QueueClosed;
                    }
                    Some(first) => {
                        let batch = self.outbound.coalesce(first);
                        if let Err(exit) = self.write(Frame::Data(batch.into_bytes())).await {
                            break exit;
                        }
                    }
                },

                _ = ticker.tick() => {
                    if let Err(exit) = self.write(Frame::Ping).await {
                        break exit;
                    }
                    self.probes.send_modify(|n| *n += 1);
                }
            }
        };

        self.cancel.cancel();
        let _ = self.writer.close().await;
        debug!(client = %self.id, reason = ?exit, "write pump stopped");
        exit
    }

    async fn write(&mut self, frame: Frame) -> std::result::Result<(), WriteExit> {
        match timeout(self.policy.write_timeout(), self.writer.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(WriteExit::Transport(e.to_string())),
            Err(_) => {
                warn!(client = %self.id, "write deadline exceeded");
                Err(WriteExit::Timeout)
            }
        }
    }

    async fn send_close(&mut self) {
        let _ = timeout(self.policy.write_timeout(), self.writer.send(Frame::Close)).await;
    }
}
