use dropkeep_core::traits::{NotifyError, TransferError};
use thiserror::Error;

/// Errors specific to the Telegram adapter.
///
/// These are internal errors that get converted into [`TransferError`] or
/// [`NotifyError`] at the trait boundary.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// An HTTP-level transport error occurred.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Bot API answered with `ok: false` or a non-success status.
    #[error("Telegram API error: {0}")]
    Api(String),

    /// The Bot API answered with something we could not interpret.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The Bot API answered HTTP 429 (Too Many Requests).
    #[error("rate limited by Telegram")]
    RateLimited,

    /// Writing a downloaded file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TelegramError> for TransferError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::Http(e) => TransferError::Network(e.to_string()),
            TelegramError::Api(msg) | TelegramError::InvalidPayload(msg) => {
                TransferError::Remote(msg)
            }
            TelegramError::RateLimited => TransferError::Remote("rate limited".into()),
            TelegramError::Io(e) => TransferError::Io(e),
        }
    }
}

impl From<TelegramError> for NotifyError {
    fn from(err: TelegramError) -> Self {
        NotifyError::Service(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_maps_to_remote() {
        let err: TransferError = TelegramError::Api("file is too big".into()).into();
        assert!(matches!(err, TransferError::Remote(ref m) if m == "file is too big"));
    }

    #[test]
    fn test_io_error_keeps_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full");
        let err: TransferError = TelegramError::Io(io).into();
        assert!(matches!(err, TransferError::Io(ref e) if e.kind() == std::io::ErrorKind::StorageFull));
    }

    #[test]
    fn test_rate_limited_maps_to_service_error() {
        let err: NotifyError = TelegramError::RateLimited.into();
        assert!(matches!(err, NotifyError::Service(ref m) if m == "rate limited by Telegram"));
    }

    #[test]
    fn test_error_display() {
        let err = TelegramError::Api("Bad Request: chat not found".into());
        assert_eq!(err.to_string(), "Telegram API error: Bad Request: chat not found");
    }
}
