use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::config::LoopConfig;
use crate::memory::{ReviewScheduler, SchedulerError};
use crate::onboarding::{
    self, build_submission, normalize, rederive, EntryDestination, OnboardingSignals,
    OnboardingSubmission, RawAnswers, ValidationError,
};
use crate::session::{
    Answer, CardKind, Resolution, SessionError, SessionPlan, SessionPlanBuilder, SessionRunner,
    SubmitOutcome,
};
use crate::store::{AttemptSink, ContentCatalog, MasteryStore, OnboardingSink, StoreError};

#[derive(Debug, Error)]
pub enum LoopError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Onboarding → plan → run → schedule, wired against one backing store.
pub struct LearningLoop<S> {
    store: Arc<S>,
    builder: SessionPlanBuilder<S, S>,
    scheduler: ReviewScheduler<S>,
    config: LoopConfig,
}

impl<S> LearningLoop<S>
where
    S: ContentCatalog + MasteryStore + OnboardingSink + AttemptSink,
{
    pub fn new(store: Arc<S>, config: LoopConfig) -> Self {
        Self {
            builder: SessionPlanBuilder::new(Arc::clone(&store), Arc::clone(&store), config.plan.clone()),
            scheduler: ReviewScheduler::new(Arc::clone(&store), config.scheduler.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &ReviewScheduler<S> {
        &self.scheduler
    }

    pub async fn submit_onboarding(
        &self,
        user_id: &str,
        raw: &RawAnswers,
    ) -> Result<OnboardingSubmission, LoopError> {
        let answers = normalize(raw).map_err(|err| {
            tracing::info!(user_id, fields = err.fields.len(), "onboarding answers rejected");
            err
        })?;
        let submission = build_submission(&answers);
        self.store.save(user_id, &submission).await?;

        tracing::info!(
            user_id,
            version = submission.version,
            tags = ?submission.tags,
            challenge_weight = submission.signals.challenge_weight,
            "onboarding submission saved"
        );
        Ok(submission)
    }

    pub async fn entry_destination(&self, user_id: &str) -> Result<EntryDestination, LoopError> {
        let completed = self.store.latest(user_id).await?.is_some();
        Ok(onboarding::entry_destination(completed))
    }

    /// Signals for plan building. Stale schema versions are re-derived and
    /// written back; users who skipped onboarding get the defaults.
    pub async fn signals_for(&self, user_id: &str) -> Result<OnboardingSignals, LoopError> {
        let Some(stored) = self.store.latest(user_id).await? else {
            return Ok(OnboardingSignals::default());
        };
        match rederive(&stored) {
            Some(fresh) => {
                self.store.save(user_id, &fresh).await?;
                tracing::info!(user_id, from_version = stored.version, "onboarding signals re-derived");
                Ok(fresh.signals)
            }
            None => Ok(stored.signals),
        }
    }

    pub async fn start_lesson(&self, user_id: &str, lesson_id: &str) -> Result<SessionRunner, LoopError> {
        self.start_lesson_at(user_id, lesson_id, Utc::now()).await
    }

    pub async fn start_lesson_at(
        &self,
        user_id: &str,
        lesson_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionRunner, LoopError> {
        let signals = self.signals_for(user_id).await?;
        let session_id = new_session_id();
        let plan = self
            .builder
            .build_lesson_plan_at(user_id, &session_id, lesson_id, &signals, now)
            .await?;
        self.start_runner(plan, now)
    }

    pub async fn start_review(&self, user_id: &str) -> Result<SessionRunner, LoopError> {
        self.start_review_at(user_id, Utc::now()).await
    }

    pub async fn start_review_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionRunner, LoopError> {
        let signals = self.signals_for(user_id).await?;
        let session_id = new_session_id();
        let plan = self
            .builder
            .build_review_plan_at(user_id, &session_id, &signals, now)
            .await?;
        self.start_runner(plan, now)
    }

    pub fn start_runner(&self, plan: SessionPlan, now: DateTime<Utc>) -> Result<SessionRunner, LoopError> {
        let mut runner = SessionRunner::new(plan, self.config.session.clone());
        runner.start_at(now)?;
        Ok(runner)
    }

    pub async fn submit_answer(
        &self,
        runner: &mut SessionRunner,
        answer: Answer,
    ) -> Result<SubmitOutcome, LoopError> {
        self.submit_answer_at(runner, answer, Utc::now()).await
    }

    /// Evaluates one answer, persists its attempt and, when the card
    /// resolved, updates mastery once for it. Teach cards never touch
    /// mastery. The runner only advances after both writes succeed; on a
    /// store failure it stays on the same card so the answer can be
    /// resubmitted. A retry after a failed mastery write appends the attempt
    /// again.
    pub async fn submit_answer_at(
        &self,
        runner: &mut SessionRunner,
        answer: Answer,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, LoopError> {
        let (next, outcome) = runner.evaluate_at(answer, now)?;
        self.store.append(&outcome.attempt).await?;

        if let Resolution::Resolved(resolved) = &outcome.resolution {
            tracing::debug!(
                session_id = %outcome.attempt.session_id,
                card_id = %resolved.card_id,
                is_correct = resolved.is_correct,
                attempts = resolved.attempts,
                "card resolved"
            );
            if resolved.kind != CardKind::Teach {
                self.scheduler
                    .record_outcome_at(&outcome.attempt.user_id, &resolved.item_id, resolved.is_correct, now)
                    .await?;
            }
        }

        runner.commit(next);

        if let Some(summary) = &outcome.summary {
            tracing::info!(
                session_id = %outcome.attempt.session_id,
                user_id = %outcome.attempt.user_id,
                xp = summary.total_xp,
                correct = summary.correct,
                incorrect = summary.incorrect,
                taught = summary.taught,
                "session completed"
            );
        }

        Ok(outcome)
    }
}

pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}
