use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::record::MasteryRecord;
use super::rule::next_record;
use crate::config::SchedulerConfig;
use crate::store::{MasteryStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("mastery for {card_id} kept changing underneath; gave up after {attempts} attempts")]
    Contention { card_id: String, attempts: u32 },
}

/// Sole writer of mastery records. Each update is a read-compute-write that
/// only lands if nobody else wrote the same `(user, card)` in between.
pub struct ReviewScheduler<M> {
    store: Arc<M>,
    config: SchedulerConfig,
}

impl<M: MasteryStore> ReviewScheduler<M> {
    pub fn new(store: Arc<M>, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub async fn record_outcome(
        &self,
        user_id: &str,
        card_id: &str,
        is_correct: bool,
    ) -> Result<MasteryRecord, SchedulerError> {
        self.record_outcome_at(user_id, card_id, is_correct, Utc::now())
            .await
    }

    pub async fn record_outcome_at(
        &self,
        user_id: &str,
        card_id: &str,
        is_correct: bool,
        now: DateTime<Utc>,
    ) -> Result<MasteryRecord, SchedulerError> {
        let max_attempts = self.config.max_conflict_retries.saturating_add(1);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let previous = self.store.get_mastery(user_id, card_id).await?;
            let expected_version = previous.as_ref().map(|r| r.version);
            let next = next_record(previous.as_ref(), card_id, is_correct, now, &self.config);

            match self
                .store
                .upsert_mastery(user_id, card_id, &next, expected_version)
                .await
            {
                Ok(stored) => {
                    tracing::debug!(
                        user_id,
                        card_id,
                        is_correct,
                        streak = stored.consecutive_correct,
                        interval_minutes = stored.interval_minutes,
                        due_at = %stored.due_at,
                        "mastery updated"
                    );
                    return Ok(stored);
                }
                Err(StoreError::VersionConflict { .. }) if attempts < max_attempts => {
                    tracing::warn!(user_id, card_id, attempts, "mastery version conflict, retrying");
                }
                Err(StoreError::VersionConflict { .. }) => {
                    return Err(SchedulerError::Contention {
                        card_id: card_id.to_string(),
                        attempts,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
