use hubcast_core::config::DEFAULT_CLIENT_NAME;
use hubcast_core::payload::single_line;
use serde::Deserialize;

/// Query string accepted by `/ws` and `/events`.
#[derive(Debug, Default, Deserialize)]
pub struct JoinParams {
    pub name: Option<String>,
}

impl JoinParams {
    /// Display name on a single trimmed line, `anon` when missing or blank.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(single_line) {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_CLIENT_NAME.to_string(),
        }
    }
}
