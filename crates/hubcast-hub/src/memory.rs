//! In-process [`Connection`] backed by channels.
//!
//! The [`MemoryPeer`] side plays the remote end: it injects inbound frames
//! and observes what the client writes. With `auto_pong` every ping written
//! by the client is answered immediately, like a well-behaved browser.

use async_trait::async_trait;
use bytes::Bytes;
use hubcast_core::{HubcastError, Result};
use std::collections::VecDeque;
use tokio::sync::mpsc;

use crate::connection::{Connection, ConnectionReader, ConnectionWriter, Frame};

type Inbound = Result<Frame>;

pub struct MemoryConnection {
    reader: MemoryReader,
    writer: MemoryWriter,
}

impl MemoryConnection {
    pub fn pair(auto_pong: bool) -> (MemoryConnection, MemoryPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Inbound>();
        let (out_tx, out_rx) = mpsc::unbounded_channel::<Frame>();
        let pong = auto_pong.then(|| in_tx.downgrade());
        let conn = MemoryConnection {
            reader: MemoryReader { rx: in_rx },
            writer: MemoryWriter {
                tx: out_tx,
                pong,
                closed: false,
            },
        };
        let peer = MemoryPeer {
            inbound: Some(in_tx),
            outbound: out_rx,
            lines: VecDeque::new(),
            pings: 0,
        };
        (conn, peer)
    }
}

impl Connection for MemoryConnection {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> (MemoryReader, MemoryWriter) {
        (self.reader, self.writer)
    }
}

pub struct MemoryReader {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl ConnectionReader for MemoryReader {
    async fn recv(&mut self) -> Option<Result<Frame>> {
        self.rx.recv().await
    }
}

pub struct MemoryWriter {
    tx: mpsc::UnboundedSender<Frame>,
    pong: Option<mpsc::WeakUnboundedSender<Inbound>>,
    closed: bool,
}

#[async_trait]
impl ConnectionWriter for MemoryWriter {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        if self.closed {
            return Err(HubcastError::Transport("connection closed".to_string()));
        }
        if frame == Frame::Ping {
            if let Some(inbound) = self.pong.as_ref().and_then(|w| w.upgrade()) {
                let _ = inbound.send(Ok(Frame::Pong));
            }
        }
        self.tx
            .send(frame)
            .map_err(|_| HubcastError::Transport("peer dropped".to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Remote end of a [`MemoryConnection`].
pub struct MemoryPeer {
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
    outbound: mpsc::UnboundedReceiver<Frame>,
    lines: VecDeque<String>,
    pings: usize,
}

impl MemoryPeer {
    /// Deliver a text message to the client.
    pub fn say(&self, text: &str) {
        self.send_frame(Frame::Data(Bytes::copy_from_slice(text.as_bytes())));
    }

    pub fn send_frame(&self, frame: Frame) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Ok(frame));
        }
    }

    /// Make the client's next read fail with a transport error.
    pub fn fail(&self, reason: &str) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Err(HubcastError::Transport(reason.to_string())));
        }
    }

    /// Disappear without a close frame; the client's next read sees EOF.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Next raw frame written by the client.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Next line of application data, splitting coalesced frames and skipping
    /// pings. `None` after a close frame or once the client is gone.
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.lines.pop_front() {
                return Some(line);
            }
            match self.outbound.recv().await? {
                Frame::Data(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    self.lines.extend(text.split('\n').map(str::to_string));
                }
                Frame::Ping => self.pings += 1,
                Frame::Pong => {}
                Frame::Close => return None,
            }
        }
    }

    /// Pings observed so far by [`MemoryPeer::next_line`].
    pub fn pings(&self) -> usize {
        self.pings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn auto_pong_answers_pings() {
        let (conn, mut peer) = MemoryConnection::pair(true);
        let (mut reader, mut writer) = conn.split();

        writer.send(Frame::Ping).await.unwrap();
        assert_eq!(reader.recv().await.unwrap().unwrap(), Frame::Pong);
        assert_eq!(peer.recv_frame().await, Some(Frame::Ping));
    }

    #[tokio::test]
    async fn coalesced_frame_splits_into_lines() {
        let (conn, mut peer) = MemoryConnection::pair(false);
        let (_reader, mut writer) = conn.split();

        writer.send(Frame::Data(Bytes::from_static(b"a\nb"))).await.unwrap();
        writer.send(Frame::Close).await.unwrap();

        assert_eq!(peer.next_line().await.as_deref(), Some("a"));
        assert_eq!(peer.next_line().await.as_deref(), Some("b"));
        assert_eq!(peer.next_line().await, None);
    }

    #[tokio::test]
    async fn hang_up_ends_reads() {
        let (conn, mut peer) = MemoryConnection::pair(true);
        let (mut reader, _writer) = conn.split();
        peer.hang_up();
        assert!(reader.recv().await.is_none());
    }

    #[tokio::test]
    async fn writes_fail_after_close() {
        let (conn, _peer) = MemoryConnection::pair(false);
        let (_reader, mut writer) = conn.split();
        writer.close().await.unwrap();
        assert!(writer.send(Frame::Ping).await.is_err());
    }
}
