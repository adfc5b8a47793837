//! Session plan construction for lessons and reviews.
//!
//! Plans are deterministic for a given session id, content and signals: the
//! only randomness is a ChaCha stream seeded from SHA-256 of the session id.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use super::types::{
    Card, CardBody, CardKind, ChoiceOption, ContentItem, PlanKind, SessionPlan,
};
use super::SessionError;
use crate::config::PlanConfig;
use crate::onboarding::OnboardingSignals;
use crate::store::{ContentCatalog, DueItem, MasteryStore};

pub const TEACH_SUFFIX: &str = ":teach";

pub struct SessionPlanBuilder<C, M> {
    catalog: Arc<C>,
    mastery: Arc<M>,
    config: PlanConfig,
}

impl<C: ContentCatalog, M: MasteryStore> SessionPlanBuilder<C, M> {
    pub fn new(catalog: Arc<C>, mastery: Arc<M>, config: PlanConfig) -> Self {
        Self {
            catalog,
            mastery,
            config,
        }
    }

    pub async fn build_lesson_plan(
        &self,
        user_id: &str,
        session_id: &str,
        lesson_id: &str,
        signals: &OnboardingSignals,
    ) -> Result<SessionPlan, SessionError> {
        self.build_lesson_plan_at(user_id, session_id, lesson_id, signals, Utc::now())
            .await
    }

    /// Teach cards for every item the user has never been scored on, followed
    /// by one practice card per item in catalog order.
    pub async fn build_lesson_plan_at(
        &self,
        user_id: &str,
        session_id: &str,
        lesson_id: &str,
        signals: &OnboardingSignals,
        now: DateTime<Utc>,
    ) -> Result<SessionPlan, SessionError> {
        let items = self
            .catalog
            .get_lesson_items(lesson_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("lesson {lesson_id}")))?;

        let mut unseen = Vec::new();
        for item in &items {
            if self.mastery.get_mastery(user_id, &item.id).await?.is_none() {
                unseen.push(item);
            }
        }

        let mut rng = session_rng(session_id);
        let mut cards: Vec<Card> = unseen.iter().map(|item| teach_card(item)).collect();
        cards.extend(practice_cards(&items, signals, &self.config, &mut rng));

        tracing::info!(
            user_id,
            session_id,
            lesson_id,
            items = items.len(),
            teach = unseen.len(),
            cards = cards.len(),
            "lesson plan built"
        );

        Ok(SessionPlan {
            id: session_id.to_string(),
            user_id: user_id.to_string(),
            kind: PlanKind::Learn,
            lesson_id: Some(lesson_id.to_string()),
            cards,
            created_at: now,
        })
    }

    pub async fn build_review_plan(
        &self,
        user_id: &str,
        session_id: &str,
        signals: &OnboardingSignals,
    ) -> Result<SessionPlan, SessionError> {
        self.build_review_plan_at(user_id, session_id, signals, Utc::now())
            .await
    }

    /// Due items, most overdue first. Items whose content is gone from the
    /// catalog are dropped before the limit applies, so they never crowd out
    /// reviewable ones. An empty plan means nothing reviewable is due.
    pub async fn build_review_plan_at(
        &self,
        user_id: &str,
        session_id: &str,
        signals: &OnboardingSignals,
        now: DateTime<Utc>,
    ) -> Result<SessionPlan, SessionError> {
        let due = self.mastery.get_due_items(user_id, now).await?;
        let limit = review_limit(&self.config, signals);
        let ordered = order_due_items(due, now, usize::MAX);

        let mut cards = Vec::new();
        if !ordered.is_empty() {
            let ids: Vec<String> = ordered.iter().map(|d| d.card_id.clone()).collect();
            let mut by_id: HashMap<String, ContentItem> = self
                .catalog
                .get_items(&ids)
                .await?
                .into_iter()
                .map(|item| (item.id.clone(), item))
                .collect();

            let mut items = Vec::with_capacity(limit.min(ordered.len()));
            for due_item in &ordered {
                if items.len() >= limit {
                    break;
                }
                match by_id.remove(&due_item.card_id) {
                    Some(item) => items.push(item),
                    None => tracing::warn!(
                        user_id,
                        card_id = %due_item.card_id,
                        "due item missing from catalog, skipped"
                    ),
                }
            }

            let mut rng = session_rng(session_id);
            cards = practice_cards(&items, signals, &self.config, &mut rng);
        }

        tracing::info!(user_id, session_id, cards = cards.len(), "review plan built");

        Ok(SessionPlan {
            id: session_id.to_string(),
            user_id: user_id.to_string(),
            kind: PlanKind::Review,
            lesson_id: None,
            cards,
            created_at: now,
        })
    }
}

/// Most overdue first; equal due times put the weakest streak first, then card id.
pub fn order_due_items(mut due: Vec<DueItem>, now: DateTime<Utc>, limit: usize) -> Vec<DueItem> {
    due.retain(|d| d.due_at <= now);
    due.sort_by(|a, b| {
        a.due_at
            .cmp(&b.due_at)
            .then(a.consecutive_correct.cmp(&b.consecutive_correct))
            .then_with(|| a.card_id.cmp(&b.card_id))
    });
    due.truncate(limit);
    due
}

pub fn review_limit(config: &PlanConfig, signals: &OnboardingSignals) -> usize {
    let scaled = config.review_session_limit as f64 * signals.session_size_multiplier.max(0.0);
    (scaled.round() as usize).max(1)
}

/// How many of `n` practice cards are free-response. Non-decreasing in the
/// challenge weight.
pub fn free_response_count(n: usize, challenge_weight: f64, config: &PlanConfig) -> usize {
    let weight = if challenge_weight.is_nan() {
        0.5
    } else {
        challenge_weight.clamp(0.0, 1.0)
    };
    let share = (config.free_response_base + config.free_response_span * weight).clamp(0.0, 1.0);
    ((n as f64 * share).round() as usize).min(n)
}

pub fn session_rng(session_id: &str) -> ChaCha8Rng {
    let digest = Sha256::digest(session_id.as_bytes());
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    ChaCha8Rng::seed_from_u64(u64::from_le_bytes(seed))
}

fn practice_cards(
    items: &[ContentItem],
    signals: &OnboardingSignals,
    config: &PlanConfig,
    rng: &mut ChaCha8Rng,
) -> Vec<Card> {
    let free_count = free_response_count(items.len(), signals.challenge_weight, config);
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.shuffle(rng);
    let mut free = vec![false; items.len()];
    for &idx in order.iter().take(free_count) {
        free[idx] = true;
    }

    let mut to_target = true;
    items
        .iter()
        .zip(free)
        .map(|(item, is_free)| {
            let kind = if is_free {
                free_response_kind(item, &mut to_target)
            } else {
                recognition_kind(item, signals)
            };
            practice_card(item, kind, rng)
        })
        .collect()
}

fn free_response_kind(item: &ContentItem, to_target: &mut bool) -> CardKind {
    if item.cloze.is_some() {
        return CardKind::FillBlank;
    }
    let kind = if *to_target {
        CardKind::TranslateToTarget
    } else {
        CardKind::TranslateFromTarget
    };
    *to_target = !*to_target;
    kind
}

fn recognition_kind(item: &ContentItem, signals: &OnboardingSignals) -> CardKind {
    if item.audio_ref.is_some() && signals.prefers_audio {
        CardKind::Listening
    } else if !item.distractors.is_empty() {
        CardKind::MultipleChoice
    } else {
        CardKind::TranslateFromTarget
    }
}

fn teach_card(item: &ContentItem) -> Card {
    Card {
        id: format!("{}{TEACH_SUFFIX}", item.id),
        item_id: item.id.clone(),
        prompt: format!("New word: {}", item.term),
        body: CardBody::Teach {
            term: item.term.clone(),
            translation: item.translation.clone(),
        },
    }
}

fn practice_card(item: &ContentItem, kind: CardKind, rng: &mut ChaCha8Rng) -> Card {
    let (prompt, body) = match kind {
        CardKind::MultipleChoice => {
            let mut texts: Vec<&str> = Vec::with_capacity(item.distractors.len() + 1);
            texts.push(&item.translation);
            for distractor in &item.distractors {
                if !texts.contains(&distractor.as_str()) {
                    texts.push(distractor);
                }
            }
            texts.shuffle(rng);
            let options: Vec<ChoiceOption> = texts
                .iter()
                .enumerate()
                .map(|(idx, text)| ChoiceOption {
                    id: format!("opt-{}", idx + 1),
                    text: (*text).to_string(),
                })
                .collect();
            let correct_option_id = options
                .iter()
                .find(|opt| opt.text == item.translation)
                .map(|opt| opt.id.clone())
                .unwrap_or_default();
            (
                format!("What does \"{}\" mean?", item.term),
                CardBody::MultipleChoice {
                    options,
                    correct_option_id,
                },
            )
        }
        CardKind::FillBlank => match &item.cloze {
            Some(cloze) => (
                "Fill in the blank".to_string(),
                CardBody::FillBlank {
                    text: cloze.text.clone(),
                    answer: cloze.answer.clone(),
                },
            ),
            None => translate_to_target(item),
        },
        CardKind::TranslateToTarget => translate_to_target(item),
        CardKind::Listening => match &item.audio_ref {
            Some(audio_ref) => (
                "Type what you hear".to_string(),
                CardBody::Listening {
                    audio_ref: audio_ref.clone(),
                    expected: item.term.clone(),
                },
            ),
            None => translate_from_target(item),
        },
        CardKind::TranslateFromTarget | CardKind::Teach => translate_from_target(item),
    };

    Card {
        id: item.id.clone(),
        item_id: item.id.clone(),
        prompt,
        body,
    }
}

fn translate_to_target(item: &ContentItem) -> (String, CardBody) {
    (
        format!("Translate \"{}\"", item.translation),
        CardBody::TranslateToTarget {
            source: item.translation.clone(),
            expected: item.term.clone(),
        },
    )
}

fn translate_from_target(item: &ContentItem) -> (String, CardBody) {
    (
        format!("Translate \"{}\"", item.term),
        CardBody::TranslateFromTarget {
            source: item.term.clone(),
            expected: item.translation.clone(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{LastResult, MasteryRecord};
    use crate::store::InMemoryStore;
    use chrono::{Duration, TimeZone};

    fn item(id: &str) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            term: format!("{id}-term"),
            translation: format!("{id}-gloss"),
            distractors: vec!["alpha".to_string(), "beta".to_string()],
            cloze: None,
            audio_ref: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 18, 0, 0).unwrap()
    }

    fn builder(store: &Arc<InMemoryStore>) -> SessionPlanBuilder<InMemoryStore, InMemoryStore> {
        SessionPlanBuilder::new(Arc::clone(store), Arc::clone(store), PlanConfig::default())
    }

    fn record(card_id: &str, due_at: DateTime<Utc>, streak: u32) -> MasteryRecord {
        MasteryRecord {
            card_id: card_id.to_string(),
            last_result: LastResult::Correct,
            consecutive_correct: streak,
            interval_minutes: 10,
            due_at,
            review_count: streak,
            lapses: 0,
            last_reviewed_at: due_at - Duration::minutes(10),
            version: 0,
        }
    }

    #[tokio::test]
    async fn unknown_lesson_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let err = builder(&store)
            .build_lesson_plan("u1", "s1", "missing", &OnboardingSignals::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn empty_lesson_yields_empty_plan() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_lesson("empty", Vec::new());
        let plan = builder(&store)
            .build_lesson_plan("u1", "s1", "empty", &OnboardingSignals::default())
            .await
            .unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.kind, PlanKind::Learn);
    }

    #[tokio::test]
    async fn seen_items_get_no_teach_card() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_lesson("l1", vec![item("a"), item("b"), item("c")]);
        store
            .upsert_mastery("u1", "b", &record("b", now(), 3), None)
            .await
            .unwrap();

        let plan = builder(&store)
            .build_lesson_plan("u1", "s1", "l1", &OnboardingSignals::default())
            .await
            .unwrap();

        let teach: Vec<&str> = plan
            .cards
            .iter()
            .filter(|c| c.kind() == CardKind::Teach)
            .map(|c| c.item_id.as_str())
            .collect();
        assert_eq!(teach, vec!["a", "c"]);
        assert_eq!(plan.cards.len(), 5);
        assert!(plan.cards[..2].iter().all(|c| c.kind() == CardKind::Teach));
        let practice: Vec<&str> = plan.cards[2..].iter().map(|c| c.id.as_str()).collect();
        assert_eq!(practice, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn same_session_id_gives_same_plan() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_lesson("l1", (0..8).map(|i| item(&format!("w{i}"))).collect());
        let signals = OnboardingSignals::default();

        let first = builder(&store).build_lesson_plan("u1", "s-42", "l1", &signals).await.unwrap();
        let second = builder(&store).build_lesson_plan("u1", "s-42", "l1", &signals).await.unwrap();
        assert_eq!(first.cards, second.cards);
    }

    #[test]
    fn free_response_share_grows_with_weight() {
        let config = PlanConfig::default();
        let counts: Vec<usize> = [0.0, 0.25, 0.5, 0.8, 1.0]
            .iter()
            .map(|w| free_response_count(10, *w, &config))
            .collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(counts[0], 2);
        assert_eq!(counts[4], 8);
    }

    #[test]
    fn higher_weight_yields_more_free_response_cards() {
        let items: Vec<ContentItem> = (0..10).map(|i| item(&format!("w{i}"))).collect();
        let config = PlanConfig::default();
        let count_free = |weight: f64| {
            let signals = OnboardingSignals {
                challenge_weight: weight,
                ..OnboardingSignals::default()
            };
            practice_cards(&items, &signals, &config, &mut session_rng("s"))
                .iter()
                .filter(|c| c.kind().is_free_response())
                .count()
        };
        assert!(count_free(0.25) < count_free(0.8));
    }

    #[test]
    fn multiple_choice_marks_translation_as_correct() {
        let card = practice_card(&item("w"), CardKind::MultipleChoice, &mut session_rng("s"));
        let CardBody::MultipleChoice {
            options,
            correct_option_id,
        } = &card.body
        else {
            panic!("expected multiple choice");
        };
        assert_eq!(options.len(), 3);
        let correct = options.iter().find(|o| &o.id == correct_option_id).unwrap();
        assert_eq!(correct.text, "w-gloss");
    }

    #[test]
    fn review_order_most_overdue_then_weakest() {
        let t0 = now();
        let due = vec![
            DueItem { card_id: "A".into(), due_at: t0, consecutive_correct: 3 },
            DueItem { card_id: "B".into(), due_at: t0 - Duration::minutes(5), consecutive_correct: 0 },
            DueItem { card_id: "C".into(), due_at: t0 - Duration::minutes(1), consecutive_correct: 1 },
            DueItem { card_id: "D".into(), due_at: t0, consecutive_correct: 1 },
        ];
        let ordered: Vec<String> = order_due_items(due, t0, 10).into_iter().map(|d| d.card_id).collect();
        assert_eq!(ordered, vec!["B", "C", "D", "A"]);
    }

    #[tokio::test]
    async fn review_plan_respects_limit_and_skips_missing_content() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_lesson("l1", vec![item("a"), item("b"), item("c")]);
        for (idx, id) in ["a", "b", "c", "gone"].iter().enumerate() {
            let due_at = now() - Duration::minutes(10 * (idx as i64 + 1));
            store.upsert_mastery("u1", id, &record(id, due_at, 1), None).await.unwrap();
        }

        let config = PlanConfig {
            review_session_limit: 3,
            ..PlanConfig::default()
        };
        let builder = SessionPlanBuilder::new(Arc::clone(&store), Arc::clone(&store), config);
        let plan = builder
            .build_review_plan_at("u1", "r1", &OnboardingSignals::default(), now())
            .await
            .unwrap();

        // "gone" is the most overdue but has no content; the next due item fills its slot.
        let ids: Vec<&str> = plan.cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(plan.kind, PlanKind::Review);
        assert_eq!(plan.teach_count(), 0);
    }

    #[tokio::test]
    async fn orphaned_due_items_do_not_hide_reviewable_ones() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_lesson("l1", vec![item("a")]);
        store
            .upsert_mastery("u1", "gone", &record("gone", now() - Duration::hours(5), 1), None)
            .await
            .unwrap();
        store
            .upsert_mastery("u1", "a", &record("a", now() - Duration::hours(1), 1), None)
            .await
            .unwrap();

        let config = PlanConfig {
            review_session_limit: 1,
            ..PlanConfig::default()
        };
        let builder = SessionPlanBuilder::new(Arc::clone(&store), Arc::clone(&store), config);
        let plan = builder
            .build_review_plan_at("u1", "r1", &OnboardingSignals::default(), now())
            .await
            .unwrap();

        assert_eq!(plan.cards.len(), 1);
        assert_eq!(plan.cards[0].item_id, "a");
    }

    #[tokio::test]
    async fn lesson_plan_uses_supplied_clock() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_lesson("l1", vec![item("a")]);
        let plan = builder(&store)
            .build_lesson_plan_at("u1", "s1", "l1", &OnboardingSignals::default(), now())
            .await
            .unwrap();
        assert_eq!(plan.created_at, now());
    }

    #[tokio::test]
    async fn nothing_due_is_an_empty_plan() {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_mastery("u1", "a", &record("a", now() + Duration::hours(2), 2), None)
            .await
            .unwrap();
        let plan = builder(&store)
            .build_review_plan_at("u1", "r1", &OnboardingSignals::default(), now())
            .await
            .unwrap();
        assert!(plan.is_empty());
    }
}
