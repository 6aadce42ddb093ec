use bytes::{Bytes, BytesMut};
use std::fmt;

use crate::error::{HubcastError, Result};

/// Separator placed between payloads merged into one transmission unit.
pub const COALESCE_SEPARATOR: u8 = b'\n';

/// Replace line breaks with spaces and trim, so the result never contains
/// [`COALESCE_SEPARATOR`].
pub fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ").trim().to_string()
}

/// One logical message. Cloning shares the underlying buffer.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Payload(Bytes);

impl Payload {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// `[system] <text>` notice emitted by the hub itself, on one line.
    pub fn system(text: impl AsRef<str>) -> Self {
        Self(Bytes::from(format!("[system] {}", single_line(text.as_ref()))))
    }

    /// Validate a raw inbound message and prefix it with the sender's name.
    ///
    /// Sender and text both go through [`single_line`], so a chat line never
    /// contains [`COALESCE_SEPARATOR`]. Rejects bytes that are not UTF-8 and
    /// messages that end up empty.
    pub fn chat(sender: &str, raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| HubcastError::MalformedPayload(format!("not valid UTF-8: {e}")))?;
        let text = single_line(text);
        if text.is_empty() {
            return Err(HubcastError::MalformedPayload("empty message".to_string()));
        }
        let sender = single_line(sender);
        Ok(Self(Bytes::from(format!("{sender}: {text}"))))
    }

    /// Merge payloads into one unit, preserving their order.
    pub fn coalesce(first: Payload, rest: impl IntoIterator<Item = Payload>) -> Payload {
        let mut rest = rest.into_iter().peekable();
        if rest.peek().is_none() {
            return first;
        }
        let mut buf = BytesMut::from(first.0.as_ref());
        for next in rest {
            buf.extend_from_slice(&[COALESCE_SEPARATOR]);
            buf.extend_from_slice(&next.0);
        }
        Self(buf.freeze())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Text view, when the payload is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({:?})", String::from_utf8_lossy(&self.0))
    }
}
