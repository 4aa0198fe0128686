//! # dropkeep-storage
//!
//! The storage root of Dropkeep: confining requested names to the root,
//! listing stored files with their age and warning markers, and reporting
//! the capacity of the filesystem that holds them.

pub mod local;
pub mod resolver;
pub mod usage;

pub use local::{LocalStore, StoredFile, MARKER_SUFFIX};
pub use resolver::{PathResolver, ResolvedTarget};
pub use usage::DiskUsage;
