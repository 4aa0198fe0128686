//! Job scheduling and background tasks for Dropkeep.
//!
//! This crate provides:
//! - The job store shared by the scheduler, the workers and the engine
//! - A worker runner that promotes queued jobs under a concurrency cap
//! - The download worker (transfer, antivirus scan, retention registration)
//! - The retention sweeper and the weekly report job
//! - A cron scheduler for the periodic tasks

pub mod engine;
pub mod executor;
pub mod jobs;
pub mod messages;
pub mod notify;
pub mod progress;
pub mod runner;
pub mod scheduler;
pub mod store;

pub use engine::Engine;
pub use executor::{JobExecutor, JobHandler};
pub use notify::{Delivery, Notifier};
pub use runner::WorkerRunner;
pub use scheduler::CronScheduler;
pub use store::SchedulerState;
