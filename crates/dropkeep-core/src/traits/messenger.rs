//! Messaging abstraction used for requester and operator notifications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A chat that can receive messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatRef(pub i64);

/// A message previously sent or received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    /// Chat the message lives in.
    pub chat: ChatRef,
    /// Message id within the chat.
    pub id: i64,
}

impl MessageRef {
    /// Build a reference.
    pub fn new(chat: ChatRef, id: i64) -> Self {
        Self { chat, id }
    }
}

/// What pressing a button does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonAction {
    /// Open a link.
    Url(String),
    /// Send callback data back to the bot.
    Callback(String),
}

/// One inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Label.
    pub text: String,
    /// Action.
    pub action: ButtonAction,
}

impl Button {
    /// Link button.
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Url(url.into()),
        }
    }

    /// Callback button.
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }
}

/// Inline keyboard attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Keyboard {
    /// Button rows.
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// Keyboard with a single button.
    pub fn single(button: Button) -> Self {
        Self {
            rows: vec![vec![button]],
        }
    }
}

/// Best-effort notification failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The messaging service rejected the call.
    #[error("messaging service error: {0}")]
    Service(String),
    /// The call did not finish in time.
    #[error("notification timed out")]
    Timeout,
    /// No destination is configured.
    #[error("no destination configured")]
    Disabled,
}

/// Sends and edits text messages.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send `text` to `chat`, optionally as a reply.
    async fn send_message(
        &self,
        chat: &ChatRef,
        text: &str,
        keyboard: Option<&Keyboard>,
        reply_to: Option<i64>,
    ) -> Result<MessageRef, NotifyError>;

    /// Replace the text (and keyboard) of an existing message.
    async fn edit_message(
        &self,
        message: &MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), NotifyError>;
}
