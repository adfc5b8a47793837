use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LastResult {
    Correct,
    Incorrect,
}

impl LastResult {
    pub fn from_correct(is_correct: bool) -> Self {
        if is_correct {
            Self::Correct
        } else {
            Self::Incorrect
        }
    }
}

/// Per user × content item scheduling state. Written only by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryRecord {
    pub card_id: String,
    pub last_result: LastResult,
    pub consecutive_correct: u32,
    pub interval_minutes: i64,
    pub due_at: DateTime<Utc>,
    pub review_count: u32,
    pub lapses: u32,
    pub last_reviewed_at: DateTime<Utc>,
    /// Optimistic-concurrency token, bumped by the store on every write.
    #[serde(default)]
    pub version: u64,
}

impl MasteryRecord {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }
}
