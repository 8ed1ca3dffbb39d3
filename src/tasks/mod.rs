//! Background Tasks Module
//!
//! Work that runs beside request handling.
//!
//! # Tasks
//! - Cleanup: sweeps expired entries out of the in-memory store
//! - Warming: pre-populates cache strategies in batches, on startup and on
//!   cron schedules

mod cleanup;
mod cron;
mod scheduler;
mod warmer;

pub use cleanup::spawn_cleanup_task;
pub use cron::CronSchedule;
pub use scheduler::{ScheduledJobInfo, WarmScheduler};
pub use warmer::{CacheWarmer, WarmConfig, WarmReport, WarmSource, WarmerStats};
