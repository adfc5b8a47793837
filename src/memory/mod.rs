//! Mastery model: the spaced-repetition rule and the scheduler that applies it.

pub mod record;
pub mod rule;
pub mod scheduler;

pub use record::{LastResult, MasteryRecord};
pub use rule::{interval_for_streak, next_record};
pub use scheduler::{ReviewScheduler, SchedulerError};
