//! Fan-out message hub.
//!
//! A single [`Hub`] task owns the registry of connected clients. Each client
//! runs a read pump and a write pump (see [`client`]) over any transport that
//! implements [`Connection`]. Clients that fall behind are evicted instead of
//! slowing everyone else down.

pub mod client;
pub mod connection;
pub mod hub;
pub mod memory;
pub mod outbound;

pub use client::{spawn_client, ClientSettings, ClientTasks, ReadExit, WriteExit};
pub use connection::{Connection, ConnectionReader, ConnectionWriter, Frame};
pub use hub::{ClientId, Hub, HubCommand, HubHandle, HubStats, Member, MemberInfo, Subscription};
pub use outbound::{outbound_queue, OutboundReceiver, OutboundSender, PushError};
