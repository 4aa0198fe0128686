//! # dropkeep-core
//!
//! Core crate for Dropkeep. Contains the configuration schema, the job
//! model and its state machine, typed identifiers, metric events, the
//! collaborator traits (transport, messenger, ingestion), and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other Dropkeep crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
