pub mod learning_loop;

pub use learning_loop::{new_session_id, LearningLoop, LoopError};
