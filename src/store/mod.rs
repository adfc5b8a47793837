//! Collaborator contracts the session core reads and writes through.
//!
//! Any backing technology can implement these; `memory_store` provides an
//! in-process implementation used by the demo binary and the tests.

pub mod memory_store;

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::MasteryRecord;
use crate::onboarding::OnboardingSubmission;
use crate::session::{AttemptLog, ContentItem};

pub use memory_store::InMemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transient backend failure. The core never retries these itself.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("version conflict on {user_id}/{card_id}: expected {expected:?}, found {actual:?}")]
    VersionConflict {
        user_id: String,
        card_id: String,
        expected: Option<u64>,
        actual: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueItem {
    pub card_id: String,
    pub due_at: DateTime<Utc>,
    pub consecutive_correct: u32,
}

impl From<&MasteryRecord> for DueItem {
    fn from(record: &MasteryRecord) -> Self {
        Self {
            card_id: record.card_id.clone(),
            due_at: record.due_at,
            consecutive_correct: record.consecutive_correct,
        }
    }
}

pub trait ContentCatalog: Send + Sync {
    /// Items of a lesson in teaching order; `None` when the lesson does not exist.
    fn get_lesson_items(
        &self,
        lesson_id: &str,
    ) -> impl Future<Output = Result<Option<Vec<ContentItem>>, StoreError>> + Send;

    /// Resolves item ids; unknown ids are left out of the result.
    fn get_items(
        &self,
        item_ids: &[String],
    ) -> impl Future<Output = Result<Vec<ContentItem>, StoreError>> + Send;
}

pub trait MasteryStore: Send + Sync {
    fn get_due_items(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<DueItem>, StoreError>> + Send;

    fn get_mastery(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> impl Future<Output = Result<Option<MasteryRecord>, StoreError>> + Send;

    /// Writes `record` only if the stored version still equals
    /// `expected_version` (`None` = no record may exist yet) and returns the
    /// record as stored, with its new version.
    fn upsert_mastery(
        &self,
        user_id: &str,
        card_id: &str,
        record: &MasteryRecord,
        expected_version: Option<u64>,
    ) -> impl Future<Output = Result<MasteryRecord, StoreError>> + Send;
}

pub trait OnboardingSink: Send + Sync {
    fn save(
        &self,
        user_id: &str,
        submission: &OnboardingSubmission,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn latest(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<OnboardingSubmission>, StoreError>> + Send;
}

pub trait AttemptSink: Send + Sync {
    fn append(&self, attempt: &AttemptLog) -> impl Future<Output = Result<(), StoreError>> + Send;
}
