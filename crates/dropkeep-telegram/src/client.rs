//! Thin Bot API client over `reqwest`.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use dropkeep_core::config::TelegramConfig;

use crate::error::TelegramError;
use crate::types::{
    AnswerCallbackQueryRequest, ApiResponse, EditMessageTextRequest, File, GetFileRequest,
    GetUpdatesRequest, Message, SendMessageRequest, Update, User,
};

/// Timeout for ordinary API calls; long polls add their own wait on top.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for one bot token.
#[derive(Clone)]
pub struct BotClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for BotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl BotClient {
    /// Create a client with a fresh connection pool.
    ///
    /// No overall timeout is set on the pool: file downloads may run far
    /// longer than any API call, so each call sets its own.
    pub fn new(config: &TelegramConfig) -> Result<Self, TelegramError> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self::with_client(config, client))
    }

    /// Create a client reusing an existing `reqwest::Client`.
    pub fn with_client(config: &TelegramConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base_url, self.token, file_path)
    }

    async fn call<Req, Res>(
        &self,
        method: &str,
        request: &Req,
        timeout: Duration,
    ) -> Result<Res, TelegramError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        debug!(method, "calling Bot API");
        let response = self
            .client
            .post(self.method_url(method))
            .json(request)
            .timeout(timeout)
            .send()
            .await?;
        interpret_response(method, response).await
    }

    /// Identity of the bot; doubles as a token check.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({}), REQUEST_TIMEOUT)
            .await
    }

    /// Long-poll for updates after `offset`, waiting up to `timeout_secs`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: vec!["message", "channel_post", "callback_query"],
        };
        let wait = REQUEST_TIMEOUT + Duration::from_secs(timeout_secs);
        self.call("getUpdates", &request, wait).await
    }

    pub async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<Message, TelegramError> {
        self.call("sendMessage", request, REQUEST_TIMEOUT).await
    }

    pub async fn edit_message_text(
        &self,
        request: &EditMessageTextRequest,
    ) -> Result<(), TelegramError> {
        // The result is the edited message, or `true` for inline messages.
        let _: serde_json::Value = self
            .call("editMessageText", request, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        let request = AnswerCallbackQueryRequest {
            callback_query_id: callback_query_id.to_string(),
            text: text.map(str::to_string),
        };
        let _: bool = self
            .call("answerCallbackQuery", &request, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Resolve a file id into a downloadable path.
    pub async fn get_file(&self, file_id: &str) -> Result<File, TelegramError> {
        let request = GetFileRequest {
            file_id: file_id.to_string(),
        };
        self.call("getFile", &request, REQUEST_TIMEOUT).await
    }

    /// Start downloading a file; the body is read by the caller.
    pub async fn download(&self, file_path: &str) -> Result<reqwest::Response, TelegramError> {
        let response = self.client.get(self.file_url(file_path)).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Telegram file download rate limited");
            return Err(TelegramError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelegramError::Api(format!("HTTP {status}: {body}")));
        }
        Ok(response)
    }
}

async fn interpret_response<T: DeserializeOwned>(
    method: &str,
    response: reqwest::Response,
) -> Result<T, TelegramError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        warn!(method, "Telegram API rate limit hit");
        return Err(TelegramError::RateLimited);
    }

    let body = response.text().await?;
    let parsed: ApiResponse<T> = match serde_json::from_str(&body) {
        Ok(parsed) => parsed,
        Err(_) if !status.is_success() => {
            return Err(TelegramError::Api(format!("HTTP {status}: {body}")));
        }
        Err(e) => {
            return Err(TelegramError::InvalidPayload(format!(
                "{method} returned unexpected body: {e}"
            )));
        }
    };

    if !parsed.ok {
        let description = parsed
            .description
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(TelegramError::Api(description));
    }
    parsed
        .result
        .ok_or_else(|| TelegramError::InvalidPayload(format!("{method} returned no result")))
}
