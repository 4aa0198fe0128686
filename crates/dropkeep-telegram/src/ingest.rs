//! Update polling and routing of incoming messages to the engine.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

use dropkeep_core::config::TelegramConfig;
use dropkeep_core::traits::{CancelOutcome, ChatRef, IngestSink, MessageRef, OriginRef};
use dropkeep_core::types::id::JobId;
use dropkeep_core::types::job::JobSpec;
use dropkeep_worker::Notifier;
use dropkeep_worker::messages::{self, STOP_CALLBACK_PREFIX};

use crate::client::BotClient;
use crate::types::{Attachment, CallbackQuery, Message, Update};

/// Pause after a failed `getUpdates` call.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Upper bound of per-chat entries kept in each cache.
const CACHE_CAPACITY: u64 = 10_000;

/// Answer to send for a callback query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAnswer {
    pub query_id: String,
    pub text: Option<&'static str>,
}

/// Pick the stored file name: a `>` caption, then the original name, then a
/// name derived from the message.
pub fn pick_filename(
    caption: Option<&str>,
    original: Option<&str>,
    chat_id: i64,
    message_id: i64,
) -> String {
    if let Some(name) = caption
        .map(str::trim)
        .and_then(|c| c.strip_prefix('>'))
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        return name.to_string();
    }
    match original.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => format!("File-{chat_id}-{message_id}"),
    }
}

/// A caption is a description unless it names the file.
pub fn caption_description(caption: Option<&str>) -> Option<String> {
    let caption = caption.map(str::trim).filter(|c| !c.is_empty())?;
    (!caption.starts_with('>')).then(|| caption.to_string())
}

/// Split `/cmd@bot args` into a lowercase command and its arguments.
pub fn parse_command(text: &str) -> Option<(String, &str)> {
    let rest = text.trim_start().strip_prefix('/')?;
    let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let command = head.split('@').next().unwrap_or(head);
    if command.is_empty() {
        return None;
    }
    Some((command.to_ascii_lowercase(), args.trim()))
}

/// Routes updates: commands, description texts, uploads and stop buttons.
pub struct Dispatcher {
    sink: Arc<dyn IngestSink>,
    notifier: Notifier,
    config: TelegramConfig,
    /// Last free text per chat, attached to the next upload.
    descriptions: Cache<i64, String>,
    /// Subfolder chosen with `/use`, per chat.
    folders: Cache<i64, String>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("public_mode", &self.config.public_mode)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn IngestSink>, notifier: Notifier, config: TelegramConfig) -> Self {
        let descriptions = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(Duration::from_secs(config.description_ttl_secs))
            .build();
        let folders = Cache::builder().max_capacity(CACHE_CAPACITY).build();
        Self {
            sink,
            notifier,
            config,
            descriptions,
            folders,
        }
    }

    /// Handle one update; callback queries yield the answer to send.
    pub async fn handle(&self, update: Update) -> Option<CallbackAnswer> {
        if let Some(query) = update.callback_query {
            return Some(self.handle_callback(query).await);
        }
        if let Some(message) = update.message.or(update.channel_post) {
            self.handle_message(message).await;
        }
        None
    }

    fn is_allowed(&self, message: &Message) -> bool {
        self.config
            .is_allowed(message.chat.username.as_deref(), message.chat.id)
            || message
                .from
                .as_ref()
                .is_some_and(|u| self.config.is_allowed(u.username.as_deref(), u.id))
    }

    async fn reply(&self, message: &Message, text: &str) {
        self.notifier
            .send(ChatRef(message.chat.id), text, None, Some(message.message_id))
            .await;
    }

    async fn handle_message(&self, message: Message) {
        let allowed = self.is_allowed(&message);

        if let Some(text) = message.text.as_deref() {
            if let Some((command, args)) = parse_command(text) {
                if !allowed {
                    self.reply(&message, &messages::not_admin()).await;
                    return;
                }
                self.handle_command(&message, &command, args).await;
            } else if allowed && !text.trim().is_empty() {
                debug!(chat = message.chat.id, "Cached description text");
                self.descriptions
                    .insert(message.chat.id, text.trim().to_string())
                    .await;
            }
            return;
        }

        if let Some(attachment) = message.attachment() {
            if !allowed {
                info!(chat = message.chat.id, "Upload refused for non-admin");
                self.reply(&message, &messages::not_admin()).await;
                return;
            }
            self.ingest(&message, attachment).await;
            return;
        }

        if allowed && message.has_unsupported_media() {
            self.reply(&message, &messages::unsupported_media()).await;
        }
    }

    async fn handle_command(&self, message: &Message, command: &str, args: &str) {
        let chat = message.chat.id;
        let text = match command {
            "start" => messages::start_text(),
            "help" => messages::help_text(),
            "use" => {
                let folder = args.trim_matches('/').trim();
                if folder.is_empty() {
                    messages::folder_missing()
                } else {
                    self.folders.insert(chat, folder.to_string()).await;
                    messages::folder_set(folder)
                }
            }
            "leave" => {
                self.folders.invalidate(&chat).await;
                messages::folder_reset()
            }
            "get" => messages::folder_current(self.folders.get(&chat).await.as_deref()),
            other => {
                debug!(chat, command = other, "Ignoring unknown command");
                return;
            }
        };
        self.reply(message, &text).await;
    }

    async fn ingest(&self, message: &Message, attachment: Attachment) {
        let chat = message.chat.id;
        let filename = pick_filename(
            message.caption.as_deref(),
            attachment.file_name.as_deref(),
            chat,
            message.message_id,
        );
        let description = match self.descriptions.remove(&chat).await {
            Some(text) => Some(text),
            None => caption_description(message.caption.as_deref()),
        };

        let spec = JobSpec {
            id: JobId::from_message(chat, message.message_id),
            filename,
            subfolder: self.folders.get(&chat).await,
            origin: OriginRef::new(attachment.file_id.clone()),
            media: message.media_info(&attachment),
            description,
            requester: MessageRef::new(ChatRef(chat), message.message_id),
        };
        match self.sink.enqueue(spec).await {
            Ok(id) => debug!(job_id = %id, "Upload handed to engine"),
            Err(e) => info!(chat, message_id = message.message_id, error = %e, "Upload not queued"),
        }
    }

    async fn handle_callback(&self, query: CallbackQuery) -> CallbackAnswer {
        let data = query.data.as_deref().unwrap_or_default();
        let Some(raw_id) = data.strip_prefix(STOP_CALLBACK_PREFIX) else {
            debug!(data, "Ignoring unknown callback");
            return CallbackAnswer {
                query_id: query.id,
                text: None,
            };
        };

        // Stop buttons only act on jobs requested from the chat they live in.
        let id = JobId::new(raw_id.trim());
        let same_chat = query.message.as_ref().is_some_and(|m| {
            id.as_str()
                .split_once(':')
                .is_some_and(|(chat, _)| chat == m.chat.id.to_string())
        });
        let found = if same_chat {
            info!(job_id = %id, user = query.from.id, "Stop requested");
            self.sink.request_cancel(&id).await != CancelOutcome::Unknown
        } else {
            warn!(job_id = %id, user = query.from.id, "Stop request from another chat ignored");
            false
        };
        CallbackAnswer {
            query_id: query.id,
            text: Some(messages::stop_answer(found)),
        }
    }
}

/// Long-polls `getUpdates` and feeds the [`Dispatcher`].
#[derive(Debug)]
pub struct UpdatePoller {
    client: BotClient,
    dispatcher: Dispatcher,
    poll_timeout_secs: u64,
}

impl UpdatePoller {
    pub fn new(client: BotClient, dispatcher: Dispatcher, poll_timeout_secs: u64) -> Self {
        Self {
            client,
            dispatcher,
            poll_timeout_secs,
        }
    }

    /// Poll until the cancel signal flips to `true`.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        info!("Update poller started");
        let mut offset = 0;

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                result = self.client.get_updates(offset, self.poll_timeout_secs) => match result {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            self.dispatch(update).await;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to fetch updates");
                        time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }
        info!("Update poller stopped");
    }

    async fn dispatch(&self, update: Update) {
        let Some(answer) = self.dispatcher.handle(update).await else {
            return;
        };
        if let Err(e) = self
            .client
            .answer_callback_query(&answer.query_id, answer.text)
            .await
        {
            warn!(error = %e, "Failed to answer callback query");
        }
    }
}
