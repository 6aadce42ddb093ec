//! Shared building blocks for hubcast: configuration, errors, heartbeat
//! timing and payload formatting.

pub mod config;
pub mod error;
pub mod heartbeat;
pub mod payload;

pub use config::HubcastConfig;
pub use error::{HubcastError, Result};
pub use heartbeat::{HeartbeatPolicy, Liveness, LivenessState};
pub use payload::Payload;
