//! Best-effort notifications to requesters and the operator channel.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use dropkeep_core::traits::{ChatRef, Keyboard, MessageRef, Messenger, NotifyError};

/// What happened to an operator notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message was sent.
    Sent,
    /// No operator channel is configured; nothing to send.
    Disabled,
    /// Sending failed or timed out.
    Failed,
}

impl Delivery {
    /// Whether there is nothing left to retry.
    pub fn is_settled(self) -> bool {
        !matches!(self, Delivery::Failed)
    }
}

/// Wraps a [`Messenger`] so that every call is bounded by a timeout and
/// failures are logged instead of returned.
#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn Messenger>,
    operator: Option<ChatRef>,
    timeout: Duration,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("operator", &self.operator)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Notifier {
    /// Create a notifier. An `operator_chat_id` of `0` disables operator notices.
    pub fn new(messenger: Arc<dyn Messenger>, operator_chat_id: i64, timeout: Duration) -> Self {
        let operator = (operator_chat_id != 0).then_some(ChatRef(operator_chat_id));
        Self {
            messenger,
            operator,
            timeout,
        }
    }

    /// Send a message; `None` when it could not be delivered.
    pub async fn send(
        &self,
        chat: ChatRef,
        text: &str,
        keyboard: Option<&Keyboard>,
        reply_to: Option<i64>,
    ) -> Option<MessageRef> {
        let call = self.messenger.send_message(&chat, text, keyboard, reply_to);
        match self.bounded(call).await {
            Ok(msg) => Some(msg),
            Err(e) => {
                warn!(chat = chat.0, error = %e, "Failed to send message");
                None
            }
        }
    }

    /// Edit a message; `false` when the edit failed.
    pub async fn edit(&self, message: MessageRef, text: &str, keyboard: Option<&Keyboard>) -> bool {
        let call = self.messenger.edit_message(&message, text, keyboard);
        match self.bounded(call).await {
            Ok(()) => true,
            Err(e) => {
                warn!(chat = message.chat.0, message_id = message.id, error = %e, "Failed to edit message");
                false
            }
        }
    }

    /// Replace the text of `status` or, when there is none or the edit
    /// fails, reply to `request` with it.
    pub async fn replace_or_reply(
        &self,
        status: Option<MessageRef>,
        request: MessageRef,
        text: &str,
    ) -> Option<MessageRef> {
        if let Some(msg) = status {
            if self.edit(msg, text, None).await {
                return Some(msg);
            }
        }
        self.send(request.chat, text, None, Some(request.id)).await
    }

    /// Send a notice to the operator channel.
    pub async fn operator(&self, text: &str, keyboard: Option<&Keyboard>) -> Delivery {
        let Some(chat) = self.operator else {
            debug!(text, "Operator channel disabled, notice not sent");
            return Delivery::Disabled;
        };
        match self.send(chat, text, keyboard, None).await {
            Some(_) => Delivery::Sent,
            None => Delivery::Failed,
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, NotifyError>>,
    ) -> Result<T, NotifyError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| NotifyError::Timeout)?
    }
}
