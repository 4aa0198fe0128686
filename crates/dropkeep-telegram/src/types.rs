//! Bot API wire types.
//!
//! Only the fields the adapter reads are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

use dropkeep_core::traits::{ButtonAction, Keyboard};
use dropkeep_core::types::media::{AuthorInfo, ChatInfo, MediaInfo, MediaKind};

/// Envelope of every Bot API response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Payload on success.
    pub result: Option<T>,
    /// Human-readable error on failure.
    pub description: Option<String>,
}

/// One incoming update from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update id; the next poll starts after it.
    pub update_id: i64,
    /// New message in a private chat or group.
    pub message: Option<Message>,
    /// New post in a channel.
    pub channel_post: Option<Message>,
    /// Inline button press.
    pub callback_query: Option<CallbackQuery>,
}

/// A Telegram user or bot.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl User {
    /// First and last name joined with a space.
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// A chat: private, group, supergroup or channel.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub username: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

/// Shared shape of `video` and `animation`.
#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Audio {
    pub file_id: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

/// A message, or a channel post.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub document: Option<Document>,
    pub photo: Option<Vec<PhotoSize>>,
    pub video: Option<Video>,
    pub animation: Option<Video>,
    pub audio: Option<Audio>,
    pub voice: Option<serde_json::Value>,
    pub video_note: Option<serde_json::Value>,
    pub sticker: Option<serde_json::Value>,
    pub location: Option<serde_json::Value>,
    pub contact: Option<serde_json::Value>,
    pub poll: Option<serde_json::Value>,
}

/// The downloadable file carried by a message.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub kind: MediaKind,
    pub file_id: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub resolution: Option<(u32, u32)>,
}

impl Message {
    /// The file to store, if the message carries a supported one.
    ///
    /// Animations are also delivered with a `document` field, so they are
    /// checked first.
    pub fn attachment(&self) -> Option<Attachment> {
        if let Some(a) = &self.animation {
            return Some(Attachment {
                kind: MediaKind::Animation,
                file_id: a.file_id.clone(),
                file_name: a.file_name.clone(),
                file_size: a.file_size,
                resolution: Some((a.width, a.height)),
            });
        }
        if let Some(d) = &self.document {
            return Some(Attachment {
                kind: MediaKind::Document,
                file_id: d.file_id.clone(),
                file_name: d.file_name.clone(),
                file_size: d.file_size,
                resolution: None,
            });
        }
        if let Some(v) = &self.video {
            return Some(Attachment {
                kind: MediaKind::Video,
                file_id: v.file_id.clone(),
                file_name: v.file_name.clone(),
                file_size: v.file_size,
                resolution: Some((v.width, v.height)),
            });
        }
        if let Some(a) = &self.audio {
            return Some(Attachment {
                kind: MediaKind::Audio,
                file_id: a.file_id.clone(),
                file_name: a.file_name.clone(),
                file_size: a.file_size,
                resolution: None,
            });
        }
        // Sizes are listed smallest first.
        let largest = self
            .photo
            .as_ref()?
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))?;
        Some(Attachment {
            kind: MediaKind::Photo,
            file_id: largest.file_id.clone(),
            file_name: None,
            file_size: largest.file_size,
            resolution: Some((largest.width, largest.height)),
        })
    }

    /// Whether the message carries content the bot does not store.
    pub fn has_unsupported_media(&self) -> bool {
        self.voice.is_some()
            || self.video_note.is_some()
            || self.sticker.is_some()
            || self.location.is_some()
            || self.contact.is_some()
            || self.poll.is_some()
    }

    /// Engine-facing view of the message and its attachment.
    pub fn media_info(&self, attachment: &Attachment) -> MediaInfo {
        let author = match &self.from {
            Some(user) => AuthorInfo {
                id: Some(user.id),
                username: user.username.clone(),
                display_name: Some(user.full_name()).filter(|n| !n.is_empty()),
            },
            None => AuthorInfo {
                id: None,
                username: None,
                display_name: self.chat.title.clone(),
            },
        };
        MediaInfo {
            caption: self.caption.clone(),
            media_kind: attachment.kind,
            file_name: attachment.file_name.clone(),
            chat: ChatInfo {
                id: self.chat.id,
                username: self.chat.username.clone(),
            },
            author,
            resolution: attachment.resolution,
            file_size: attachment.file_size,
        }
    }
}

/// Inline button press.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// Result of `getFile`.
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    pub file_size: Option<u64>,
    /// Relative download path, valid for at least an hour.
    pub file_path: Option<String>,
}

/// Request body for `getUpdates`.
#[derive(Debug, Clone, Serialize)]
pub struct GetUpdatesRequest {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: Vec<&'static str>,
}

/// Which message a new message answers.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyParameters {
    pub message_id: i64,
    pub allow_sending_without_reply: bool,
}

/// Request body for `sendMessage`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_parameters: Option<ReplyParameters>,
}

/// Request body for `editMessageText`.
///
/// Omitting `reply_markup` removes the message's inline keyboard.
#[derive(Debug, Clone, Serialize)]
pub struct EditMessageTextRequest {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

/// Request body for `answerCallbackQuery`.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerCallbackQueryRequest {
    pub callback_query_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Request body for `getFile`.
#[derive(Debug, Clone, Serialize)]
pub struct GetFileRequest {
    pub file_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl From<&Keyboard> for InlineKeyboardMarkup {
    fn from(keyboard: &Keyboard) -> Self {
        let inline_keyboard = keyboard
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|button| {
                        let (url, callback_data) = match &button.action {
                            ButtonAction::Url(url) => (Some(url.clone()), None),
                            ButtonAction::Callback(data) => (None, Some(data.clone())),
                        };
                        InlineKeyboardButton {
                            text: button.text.clone(),
                            url,
                            callback_data,
                        }
                    })
                    .collect()
            })
            .collect();
        Self { inline_keyboard }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropkeep_core::traits::Button;

    fn message(json: serde_json::Value) -> Message {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_document_attachment() {
        let msg = message(serde_json::json!({
            "message_id": 7,
            "chat": {"id": -100, "type": "channel", "username": "drops", "title": "Drops"},
            "caption": "weekly dump",
            "document": {"file_id": "BQAD", "file_name": "dump.tar", "file_size": 2048}
        }));
        let attachment = msg.attachment().unwrap();
        assert_eq!(attachment.kind, MediaKind::Document);
        assert_eq!(attachment.file_name.as_deref(), Some("dump.tar"));

        let info = msg.media_info(&attachment);
        assert_eq!(info.chat.username.as_deref(), Some("drops"));
        assert_eq!(info.author.display_name.as_deref(), Some("Drops"));
        assert_eq!(info.file_size, Some(2048));
        assert_eq!(info.client_key(), "unknown");
    }

    #[test]
    fn test_photo_uses_largest_size() {
        let msg = message(serde_json::json!({
            "message_id": 1,
            "chat": {"id": 5, "type": "private"},
            "from": {"id": 5, "is_bot": false, "first_name": "Ann", "last_name": "Lee", "username": "ann"},
            "photo": [
                {"file_id": "small", "width": 90, "height": 60},
                {"file_id": "big", "width": 1280, "height": 853, "file_size": 99}
            ]
        }));
        let attachment = msg.attachment().unwrap();
        assert_eq!(attachment.file_id, "big");
        assert_eq!(attachment.resolution, Some((1280, 853)));

        let info = msg.media_info(&attachment);
        assert_eq!(info.author_display(), "Ann Lee");
        assert_eq!(info.client_key(), "@ann");
        assert_eq!(info.resolution_label().as_deref(), Some("1280×853"));
    }

    #[test]
    fn test_animation_wins_over_document() {
        let msg = message(serde_json::json!({
            "message_id": 2,
            "chat": {"id": 5, "type": "private"},
            "animation": {"file_id": "anim", "width": 320, "height": 240, "file_name": "cat.mp4"},
            "document": {"file_id": "anim", "file_name": "cat.mp4"}
        }));
        assert_eq!(msg.attachment().unwrap().kind, MediaKind::Animation);
    }

    #[test]
    fn test_sticker_is_unsupported() {
        let msg = message(serde_json::json!({
            "message_id": 3,
            "chat": {"id": 5, "type": "private"},
            "sticker": {"file_id": "x"}
        }));
        assert!(msg.attachment().is_none());
        assert!(msg.has_unsupported_media());
    }

    #[test]
    fn test_keyboard_serialization() {
        let keyboard = Keyboard::single(Button::callback("Stop", "stop 1:2"));
        let markup = InlineKeyboardMarkup::from(&keyboard);
        assert_eq!(
            serde_json::to_value(&markup).unwrap(),
            serde_json::json!({"inline_keyboard": [[{"text": "Stop", "callback_data": "stop 1:2"}]]})
        );
    }
}
