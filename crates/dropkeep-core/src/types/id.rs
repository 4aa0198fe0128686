//! Job identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque job identifier derived from the source message.
///
/// The transport adapter decides the format; the engine only compares and
/// displays it. It travels in cancel callbacks, so it must not contain
/// whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier for a message in a chat.
    pub fn from_message(chat_id: i64, message_id: i64) -> Self {
        Self(format!("{chat_id}:{message_id}"))
    }

    /// Borrow the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
