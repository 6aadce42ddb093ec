//! [`Connection`] over an axum WebSocket.
//!
//! Text and binary messages both become [`Frame::Data`]. Outbound data goes
//! out as text when it is valid UTF-8, binary otherwise. Control frames carry
//! no payload.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use hubcast_core::{HubcastError, Result};
use hubcast_hub::{Connection, ConnectionReader, ConnectionWriter, Frame};

pub struct WsConnection {
    socket: WebSocket,
}

impl WsConnection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl Connection for WsConnection {
    type Reader = WsReader;
    type Writer = WsWriter;

    fn split(self) -> (WsReader, WsWriter) {
        let (sink, stream) = self.socket.split();
        (WsReader { stream }, WsWriter { sink })
    }
}

pub struct WsReader {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl ConnectionReader for WsReader {
    async fn recv(&mut self) -> Option<Result<Frame>> {
        match self.stream.next().await? {
            Ok(msg) => Some(Ok(frame_from_message(msg))),
            Err(e) => Some(Err(HubcastError::Transport(e.to_string()))),
        }
    }
}

pub struct WsWriter {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl ConnectionWriter for WsWriter {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.sink
            .send(message_from_frame(frame))
            .await
            .map_err(|e| HubcastError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.sink
            .close()
            .await
            .map_err(|e| HubcastError::Transport(e.to_string()))
    }
}

fn frame_from_message(msg: Message) -> Frame {
    match msg {
        Message::Text(text) => Frame::Data(Bytes::copy_from_slice(text.as_str().as_bytes())),
        Message::Binary(bytes) => Frame::Data(bytes),
        Message::Ping(_) => Frame::Ping,
        Message::Pong(_) => Frame::Pong,
        Message::Close(_) => Frame::Close,
    }
}

fn message_from_frame(frame: Frame) -> Message {
    match frame {
        Frame::Data(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Message::Text(text.into()),
            Err(_) => Message::Binary(bytes),
        },
        Frame::Ping => Message::Ping(Bytes::new()),
        Frame::Pong => Message::Pong(Bytes::new()),
        Frame::Close => Message::Close(None),
    }
}
