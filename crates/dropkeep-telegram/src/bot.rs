//! [`Transport`] and [`Messenger`] implementations over the Bot API.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use dropkeep_core::traits::{
    ChatRef, FetchOutcome, Keyboard, MessageRef, Messenger, NotifyError, OriginRef,
    ProgressControl, ProgressObserver, TransferError, Transport,
};

use crate::client::BotClient;
use crate::error::TelegramError;
use crate::markup::{self, PARSE_MODE};
use crate::types::{
    EditMessageTextRequest, InlineKeyboardMarkup, ReplyParameters, SendMessageRequest,
};

/// The bot as seen by the engine: it downloads files and sends messages.
#[derive(Debug, Clone)]
pub struct TelegramBot {
    client: BotClient,
}

impl TelegramBot {
    pub fn new(client: BotClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &BotClient {
        &self.client
    }
}

#[async_trait]
impl Transport for TelegramBot {
    #[instrument(skip(self, observer), fields(file_id = %origin.file_id))]
    async fn fetch(
        &self,
        origin: &OriginRef,
        dest: &Path,
        observer: &mut dyn ProgressObserver,
    ) -> Result<FetchOutcome, TransferError> {
        let file = self.client.get_file(&origin.file_id).await?;
        let Some(file_path) = file.file_path else {
            return Err(TransferError::Remote(
                "file is not available for download".into(),
            ));
        };
        let response = self.client.download(&file_path).await?;
        let total = file
            .file_size
            .or_else(|| response.content_length())
            .unwrap_or(0);
        debug!(total, "download started");

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TelegramError::from));
        write_chunks(chunks, dest, total, observer).await
    }
}

/// Stream `chunks` into `dest`, consulting `observer` after every chunk.
async fn write_chunks<S>(
    chunks: S,
    dest: &Path,
    total: u64,
    observer: &mut dyn ProgressObserver,
) -> Result<FetchOutcome, TransferError>
where
    S: futures::Stream<Item = Result<Bytes, TelegramError>> + Send,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut out = tokio::fs::File::create(dest).await?;
    let mut received: u64 = 0;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        out.write_all(&chunk).await?;
        received += chunk.len() as u64;
        if observer.on_progress(received, total) == ProgressControl::Abort {
            out.flush().await?;
            return Ok(FetchOutcome::Aborted);
        }
    }
    out.flush().await?;

    if total > 0 && received != total {
        return Err(TransferError::Incomplete {
            expected: total,
            received,
        });
    }
    Ok(FetchOutcome::Completed(dest.to_path_buf()))
}

#[async_trait]
impl Messenger for TelegramBot {
    async fn send_message(
        &self,
        chat: &ChatRef,
        text: &str,
        keyboard: Option<&Keyboard>,
        reply_to: Option<i64>,
    ) -> Result<MessageRef, NotifyError> {
        let request = SendMessageRequest {
            chat_id: chat.0,
            text: markup::to_html(text),
            parse_mode: Some(PARSE_MODE),
            reply_markup: keyboard.map(InlineKeyboardMarkup::from),
            reply_parameters: reply_to.map(|message_id| ReplyParameters {
                message_id,
                allow_sending_without_reply: true,
            }),
        };
        let sent = self.client.send_message(&request).await?;
        Ok(MessageRef::new(ChatRef(sent.chat.id), sent.message_id))
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), NotifyError> {
        let request = EditMessageTextRequest {
            chat_id: message.chat.0,
            message_id: message.id,
            text: markup::to_html(text),
            parse_mode: Some(PARSE_MODE),
            reply_markup: keyboard.map(InlineKeyboardMarkup::from),
        };
        self.client.edit_message_text(&request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{MockBotApi, config};

    /// Records every observation and aborts after `abort_after` calls.
    struct Recorder {
        seen: Vec<(u64, u64)>,
        abort_after: Option<usize>,
    }

    impl ProgressObserver for Recorder {
        fn on_progress(&mut self, received: u64, total: u64) -> ProgressControl {
            self.seen.push((received, total));
            match self.abort_after {
                Some(n) if self.seen.len() >= n => ProgressControl::Abort,
                _ => ProgressControl::Continue,
            }
        }
    }

    fn stream(
        parts: Vec<Result<Bytes, TelegramError>>,
    ) -> impl futures::Stream<Item = Result<Bytes, TelegramError>> + Send {
        futures::stream::iter(parts)
    }

    #[tokio::test]
    async fn test_writes_all_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let mut observer = Recorder { seen: vec![], abort_after: None };

        let parts = vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"world"))];
        let outcome = write_chunks(stream(parts), &dest, 11, &mut observer).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Completed(dest.clone()));
        assert_eq!(observer.seen, vec![(6, 11), (11, 11)]);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_abort_stops_at_chunk_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let mut observer = Recorder { seen: vec![], abort_after: Some(1) };

        let parts = vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"def"))];
        let outcome = write_chunks(stream(parts), &dest, 6, &mut observer).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Aborted);
        assert_eq!(observer.seen.len(), 1);
    }

    #[tokio::test]
    async fn test_short_stream_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let mut observer = Recorder { seen: vec![], abort_after: None };

        let parts = vec![Ok(Bytes::from_static(b"abc"))];
        let err = write_chunks(stream(parts), &dest, 10, &mut observer).await.unwrap_err();
        assert!(matches!(err, TransferError::Incomplete { expected: 10, received: 3 }));
    }

    #[tokio::test]
    async fn test_stream_error_fails_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let mut observer = Recorder { seen: vec![], abort_after: None };

        let parts = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(TelegramError::Api("connection dropped".into())),
        ];
        let err = write_chunks(stream(parts), &dest, 10, &mut observer).await.unwrap_err();
        assert!(matches!(err, TransferError::Remote(_)));
    }

    #[tokio::test]
    async fn test_fetch_without_file_path_fails() {
        let server = MockBotApi::start().await;
        let bot = TelegramBot::new(BotClient::new(&config(&server.base_url)).unwrap());
        let dir = tempfile::tempdir().unwrap();
        let mut observer = Recorder { seen: vec![], abort_after: None };

        let origin = OriginRef::new("BQAD");
        let dest = dir.path().join("x");
        let (result, _) = tokio::join!(
            bot.fetch(&origin, &dest, &mut observer),
            server.respond_once(200, br#"{"ok":true,"result":{"file_id":"BQAD","file_size":5}}"#)
        );
        assert!(matches!(result.unwrap_err(), TransferError::Remote(_)));
    }

    #[tokio::test]
    async fn test_send_message_renders_html() {
        let server = MockBotApi::start().await;
        let bot = TelegramBot::new(BotClient::new(&config(&server.base_url)).unwrap());

        let (result, raw) = tokio::join!(
            bot.send_message(&ChatRef(9), "**Done** `a.txt`", None, Some(4)),
            server.respond_once(
                200,
                br#"{"ok":true,"result":{"message_id":10,"chat":{"id":9,"type":"private"}}}"#,
            )
        );
        assert_eq!(result.unwrap(), MessageRef::new(ChatRef(9), 10));
        assert!(raw.contains(r#""parse_mode":"HTML""#));
        assert!(raw.contains("<b>Done</b> <code>a.txt</code>"));
        assert!(raw.contains(r#""reply_parameters":{"message_id":4"#));
    }
}
