//! HTTP and WebSocket front door for the hubcast hub.

pub mod app;
pub mod http;
pub mod params;
pub mod ws;
