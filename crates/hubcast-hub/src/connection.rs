use async_trait::async_trait;
use bytes::Bytes;
use hubcast_core::Result;

/// Discrete unit exchanged with a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Application message. Text vs. binary framing is the transport's call.
    Data(Bytes),
    /// Liveness probe.
    Ping,
    /// Liveness acknowledgement.
    Pong,
    /// Orderly termination.
    Close,
}

/// Duplex message channel provided by a transport (WebSocket, in-memory, …).
///
/// A connection is split once so each direction can be driven by its own
/// task. Deadlines are applied by the caller around `recv` and `send`.
pub trait Connection: Send + 'static {
    type Reader: ConnectionReader;
    type Writer: ConnectionWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}

#[async_trait]
pub trait ConnectionReader: Send + 'static {
    /// Next inbound frame; `None` once the peer is gone.
    async fn recv(&mut self) -> Option<Result<Frame>>;
}

#[async_trait]
pub trait ConnectionWriter: Send + 'static {
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Flush and release the underlying transport.
    async fn close(&mut self) -> Result<()>;
}
