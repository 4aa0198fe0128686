//! Core type definitions used across the Dropkeep workspace.

pub mod format;
pub mod id;
pub mod job;
pub mod media;
pub mod week;

pub use id::JobId;
pub use job::{Job, JobOutcome, JobSpec, JobState};
pub use media::{AuthorInfo, ChatInfo, MediaInfo, MediaKind};
pub use week::IsoWeekKey;
