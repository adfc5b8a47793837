pub mod config;
pub mod logging;
pub mod memory;
pub mod onboarding;
pub mod seed;
pub mod services;
pub mod session;
pub mod store;

pub use services::{LearningLoop, LoopError};
