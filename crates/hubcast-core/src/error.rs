use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubcastError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Hub is no longer running")]
    HubUnavailable,
}

impl HubcastError {
    /// Short error code string, used in HTTP error bodies and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            HubcastError::Config(_) => "CONFIG_ERROR",
            HubcastError::Transport(_) => "TRANSPORT_ERROR",
            HubcastError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            HubcastError::HubUnavailable => "HUB_UNAVAILABLE",
        }
    }
}

pub type Result<T> = std::result::Result<T, HubcastError>;
