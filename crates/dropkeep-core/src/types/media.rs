//! The narrow view of an inbound media message the engine depends on.

use serde::{Deserialize, Serialize};

/// What kind of attachment the message carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Generic document.
    #[default]
    Document,
    /// Compressed photo.
    Photo,
    /// Video.
    Video,
    /// Audio track.
    Audio,
    /// GIF-like animation.
    Animation,
}

/// The chat a message was posted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChatInfo {
    /// Chat id.
    pub id: i64,
    /// Public handle, when the chat has one.
    pub username: Option<String>,
}

/// The account that posted a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuthorInfo {
    /// User id, absent for anonymous channel posts.
    pub id: Option<i64>,
    /// Username without the `@`.
    pub username: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
}

/// Attributes of an inbound media message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MediaInfo {
    /// Caption attached to the media.
    pub caption: Option<String>,
    /// Attachment kind.
    pub media_kind: MediaKind,
    /// Original file name, when the sender's client provided one.
    pub file_name: Option<String>,
    /// Source chat.
    pub chat: ChatInfo,
    /// Author of the message.
    pub author: AuthorInfo,
    /// Pixel dimensions for photos and videos.
    pub resolution: Option<(u32, u32)>,
    /// Size announced by the transport.
    pub file_size: Option<u64>,
}

impl MediaInfo {
    /// Metrics key for the author: `@username`, `id:N` or `unknown`.
    pub fn client_key(&self) -> String {
        match (&self.author.username, self.author.id) {
            (Some(name), _) if !name.is_empty() => format!("@{name}"),
            (_, Some(id)) => format!("id:{id}"),
            _ => "unknown".to_string(),
        }
    }

    /// Chat handle used in operator notices.
    pub fn channel_handle(&self) -> String {
        self.chat
            .username
            .clone()
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// How the author is named in operator notices.
    pub fn author_display(&self) -> String {
        if let Some(name) = self.author.display_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        if let Some(name) = self.author.username.as_deref().filter(|n| !n.is_empty()) {
            return format!("@{name}");
        }
        match self.author.id {
            Some(id) => id.to_string(),
            None => "unknown".to_string(),
        }
    }

    /// `"1920×1080"` when known.
    pub fn resolution_label(&self) -> Option<String> {
        self.resolution.map(|(w, h)| format!("{w}×{h}"))
    }

    /// Deep link that opens a private chat with the author.
    pub fn contact_url(&self) -> Option<String> {
        contact_url_for(&self.client_key())
    }
}

/// Deep link for a client key produced by [`MediaInfo::client_key`].
pub fn contact_url_for(client_key: &str) -> Option<String> {
    if let Some(name) = client_key.strip_prefix('@') {
        return Some(format!("https://t.me/{name}"));
    }
    let id: i64 = client_key.strip_prefix("id:")?.parse().ok()?;
    Some(format!("tg://user?id={id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_key_precedence() {
        let mut media = MediaInfo::default();
        assert_eq!(media.client_key(), "unknown");
        media.author.id = Some(7);
        assert_eq!(media.client_key(), "id:7");
        media.author.username = Some("bob".into());
        assert_eq!(media.client_key(), "@bob");
    }

    #[test]
    fn test_contact_url() {
        assert_eq!(contact_url_for("@bob").as_deref(), Some("https://t.me/bob"));
        assert_eq!(contact_url_for("id:42").as_deref(), Some("tg://user?id=42"));
        assert_eq!(contact_url_for("unknown"), None);
    }
}
