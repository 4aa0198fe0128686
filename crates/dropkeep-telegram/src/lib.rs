//! Telegram adapter for Dropkeep.
//!
//! Implements the engine's [`Transport`](dropkeep_core::traits::Transport)
//! and [`Messenger`](dropkeep_core::traits::Messenger) traits over the
//! [Bot API](https://core.telegram.org/bots/api), and runs the update
//! poller that turns incoming files, commands and stop buttons into engine
//! calls.

pub mod bot;
pub mod client;
pub mod error;
pub mod ingest;
pub mod markup;
pub mod types;

pub use bot::TelegramBot;
pub use client::BotClient;
pub use error::TelegramError;
pub use ingest::{Dispatcher, UpdatePoller};
