//! Per-client bounded outbound queue.
//!
//! The hub holds the only [`OutboundSender`]; closing it consumes the value,
//! so a queue can be closed exactly once and only by its owner. The write
//! pump holds the [`OutboundReceiver`] and treats "closed and drained" as its
//! terminal read.

use hubcast_core::Payload;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PushError {
    /// The consumer is too slow; the queue is at capacity.
    #[error("outbound queue full")]
    Full,
    /// The consumer has already gone away.
    #[error("outbound queue receiver dropped")]
    Disconnected,
}

/// Create a queue holding at most `capacity` pending payloads.
pub fn outbound_queue(capacity: usize) -> (OutboundSender, OutboundReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (OutboundSender { tx }, OutboundReceiver { rx })
}

#[derive(Debug)]
pub struct OutboundSender {
    tx: mpsc::Sender<Payload>,
}

impl OutboundSender {
    /// Non-blocking enqueue.
    pub fn try_push(&self, payload: Payload) -> Result<(), PushError> {
        self.tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PushError::Full,
            mpsc::error::TrySendError::Closed(_) => PushError::Disconnected,
        })
    }

    /// Close the queue. Payloads already queued are still delivered.
    pub fn close(self) {
        drop(self.tx);
    }
}

#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::Receiver<Payload>,
}

impl OutboundReceiver {
    /// Next payload, or `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }

    /// Payload waiting right now, if any.
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.rx.try_recv().ok()
    }

    /// Merge `first` with every payload already waiting, without blocking.
    pub fn coalesce(&mut self, first: Payload) -> Payload {
        let mut rest = Vec::new();
        while let Some(next) = self.try_recv() {
            rest.push(next);
        }
        Payload::coalesce(first, rest)
    }
}
