//! Telegram Bot API configuration.

use serde::{Deserialize, Serialize};

/// Bot credentials, operator channel and access control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather.
    #[serde(default)]
    pub bot_token: String,
    /// Bot API base URL.
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
    /// Chat receiving operator notices; `0` disables them.
    #[serde(default)]
    pub operator_chat_id: i64,
    /// Usernames (with or without `@`) or numeric ids allowed to upload.
    #[serde(default)]
    pub admins: Vec<String>,
    /// Accept uploads from anyone.
    #[serde(default)]
    pub public_mode: bool,
    /// Seconds a text message is kept as the description of the next upload.
    #[serde(default = "default_description_ttl")]
    pub description_ttl_secs: u64,
    /// Long-poll timeout for `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl TelegramConfig {
    /// Whether `user` (username or numeric id) may enqueue uploads.
    pub fn is_allowed(&self, username: Option<&str>, user_id: i64) -> bool {
        if self.public_mode {
            return true;
        }
        let id = user_id.to_string();
        self.admins.iter().any(|entry| {
            let entry = entry.trim();
            if entry == id {
                return true;
            }
            match username {
                Some(name) => entry
                    .trim_start_matches('@')
                    .eq_ignore_ascii_case(name.trim_start_matches('@')),
                None => false,
            }
        })
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base_url: default_api_base(),
            operator_chat_id: 0,
            admins: Vec::new(),
            public_mode: false,
            description_ttl_secs: default_description_ttl(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_description_ttl() -> u64 {
    180
}

fn default_poll_timeout() -> u64 {
    30
}
