use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{
    AttemptSink, ContentCatalog, DueItem, MasteryStore, OnboardingSink, StoreError,
};
use crate::memory::MasteryRecord;
use crate::onboarding::OnboardingSubmission;
use crate::session::{AttemptLog, ContentItem};

type MasteryKey = (String, String);

/// Process-local implementation of every collaborator contract.
///
/// Mastery writes are compare-and-swap on the record version under a single
/// write lock, so a read-modify-write that raced another writer is rejected
/// instead of silently overwriting it.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    lessons: RwLock<HashMap<String, Vec<String>>>,
    items: RwLock<HashMap<String, ContentItem>>,
    mastery: RwLock<HashMap<MasteryKey, MasteryRecord>>,
    onboarding: RwLock<HashMap<String, OnboardingSubmission>>,
    attempts: RwLock<Vec<AttemptLog>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_lesson(&self, lesson_id: &str, items: Vec<ContentItem>) {
        let ids = items.iter().map(|item| item.id.clone()).collect();
        {
            let mut catalog = self.items.write();
            for item in items {
                catalog.insert(item.id.clone(), item);
            }
        }
        self.lessons.write().insert(lesson_id.to_string(), ids);
    }

    pub fn lesson_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lessons.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Simulates a backend outage: every call fails with `Unavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    pub fn attempts(&self) -> Vec<AttemptLog> {
        self.attempts.read().clone()
    }

    pub fn attempts_for_session(&self, session_id: &str) -> Vec<AttemptLog> {
        self.attempts
            .read()
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn mastery_snapshot(&self, user_id: &str, card_id: &str) -> Option<MasteryRecord> {
        self.mastery
            .read()
            .get(&(user_id.to_string(), card_id.to_string()))
            .cloned()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

impl ContentCatalog for InMemoryStore {
    async fn get_lesson_items(&self, lesson_id: &str) -> Result<Option<Vec<ContentItem>>, StoreError> {
        self.ensure_available()?;
        let lessons = self.lessons.read();
        let Some(ids) = lessons.get(lesson_id) else {
            return Ok(None);
        };
        let items = self.items.read();
        Ok(Some(ids.iter().filter_map(|id| items.get(id).cloned()).collect()))
    }

    async fn get_items(&self, item_ids: &[String]) -> Result<Vec<ContentItem>, StoreError> {
        self.ensure_available()?;
        let items = self.items.read();
        Ok(item_ids.iter().filter_map(|id| items.get(id).cloned()).collect())
    }
}

impl MasteryStore for InMemoryStore {
    async fn get_due_items(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<DueItem>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .mastery
            .read()
            .iter()
            .filter(|((owner, _), record)| owner == user_id && record.is_due(now))
            .map(|(_, record)| DueItem::from(record))
            .collect())
    }

    async fn get_mastery(&self, user_id: &str, card_id: &str) -> Result<Option<MasteryRecord>, StoreError> {
        self.ensure_available()?;
        Ok(self.mastery_snapshot(user_id, card_id))
    }

    async fn upsert_mastery(
        &self,
        user_id: &str,
        card_id: &str,
        record: &MasteryRecord,
        expected_version: Option<u64>,
    ) -> Result<MasteryRecord, StoreError> {
        self.ensure_available()?;
        let mut mastery = self.mastery.write();
        let key = (user_id.to_string(), card_id.to_string());
        let actual = mastery.get(&key).map(|r| r.version);
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                user_id: user_id.to_string(),
                card_id: card_id.to_string(),
                expected: expected_version,
                actual,
            });
        }

        let mut stored = record.clone();
        stored.card_id = card_id.to_string();
        stored.version = actual.map_or(1, |v| v + 1);
        mastery.insert(key, stored.clone());
        Ok(stored)
    }
}

impl OnboardingSink for InMemoryStore {
    async fn save(&self, user_id: &str, submission: &OnboardingSubmission) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.onboarding
            .write()
            .insert(user_id.to_string(), submission.clone());
        Ok(())
    }

    async fn latest(&self, user_id: &str) -> Result<Option<OnboardingSubmission>, StoreError> {
        self.ensure_available()?;
        Ok(self.onboarding.read().get(user_id).cloned())
    }
}

impl AttemptSink for InMemoryStore {
    async fn append(&self, attempt: &AttemptLog) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.attempts.write().push(attempt.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::LastResult;
    use chrono::{Duration, TimeZone};

    fn record(card_id: &str, due_at: DateTime<Utc>) -> MasteryRecord {
        MasteryRecord {
            card_id: card_id.to_string(),
            last_result: LastResult::Correct,
            consecutive_correct: 1,
            interval_minutes: 10,
            due_at,
            review_count: 1,
            lapses: 0,
            last_reviewed_at: due_at - Duration::minutes(10),
            version: 0,
        }
    }

    #[tokio::test]
    async fn upsert_enforces_expected_version() {
        let store = InMemoryStore::new();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        let first = store.upsert_mastery("u1", "w1", &record("w1", now), None).await.unwrap();
        assert_eq!(first.version, 1);

        let conflict = store.upsert_mastery("u1", "w1", &record("w1", now), None).await;
        assert!(matches!(
            conflict,
            Err(StoreError::VersionConflict { actual: Some(1), .. })
        ));

        let second = store
            .upsert_mastery("u1", "w1", &record("w1", now), Some(1))
            .await
            .unwrap();
        assert_eq!(second.version, 2);
    }

    #[tokio::test]
    async fn due_items_are_scoped_to_user_and_time() {
        let store = InMemoryStore::new();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        store
            .upsert_mastery("u1", "past", &record("past", now - Duration::hours(1)), None)
            .await
            .unwrap();
        store
            .upsert_mastery("u1", "future", &record("future", now + Duration::hours(1)), None)
            .await
            .unwrap();
        store
            .upsert_mastery("u2", "other", &record("other", now - Duration::hours(1)), None)
            .await
            .unwrap();

        let due = store.get_due_items("u1", now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].card_id, "past");
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.get_lesson_items("any").await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert_eq!(store.get_lesson_items("any").await.unwrap(), None);
    }
}
