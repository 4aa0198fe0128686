//! Seams between the engine and its external collaborators.

pub mod ingest;
pub mod messenger;
pub mod transport;

pub use ingest::{CancelOutcome, IngestSink};
pub use messenger::{Button, ButtonAction, ChatRef, Keyboard, MessageRef, Messenger, NotifyError};
pub use transport::{FetchOutcome, OriginRef, ProgressControl, ProgressObserver, TransferError, Transport};
