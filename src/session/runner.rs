//! Session runner state machine.
//!
//! `NotStarted -> InProgress -> Completed`. The state is a plain value; the
//! transition functions take it by reference and return the successor, so a
//! failed transition never leaves a half-updated state behind and the state
//! can be persisted between submissions for crash recovery.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Answer, AttemptLog, Card, CardBody, CardKind, ErrorType, SessionPlan};
use super::SessionError;
use crate::config::SessionPolicy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindTally {
    pub correct: u32,
    pub incorrect: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub total_xp: u32,
    /// Practice cards resolved correctly.
    pub correct: u32,
    /// Practice cards that ran out of retries.
    pub incorrect: u32,
    pub taught: u32,
    pub attempts: u32,
    pub by_kind: BTreeMap<CardKind, KindTally>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub cursor: usize,
    pub attempts_for_current_card: u32,
    pub presented_at: DateTime<Utc>,
    pub summary: SessionSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RunnerState {
    NotStarted,
    InProgress(Progress),
    Completed { summary: SessionSummary },
}

impl RunnerState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotStarted => "notStarted",
            Self::InProgress(_) => "inProgress",
            Self::Completed { .. } => "completed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCard {
    pub card_id: String,
    pub item_id: String,
    pub kind: CardKind,
    pub is_correct: bool,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Resolution {
    /// Same card is presented again.
    #[serde(rename_all = "camelCase")]
    Retry { attempts_remaining: u32 },
    Resolved(ResolvedCard),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub attempt: AttemptLog,
    pub resolution: Resolution,
    /// Present once the last card has been resolved.
    pub summary: Option<SessionSummary>,
}

pub fn start(
    state: &RunnerState,
    plan: &SessionPlan,
    now: DateTime<Utc>,
) -> Result<RunnerState, SessionError> {
    if !matches!(state, RunnerState::NotStarted) {
        return Err(SessionError::InvalidState {
            expected: "notStarted",
            actual: state.name(),
        });
    }

    if plan.cards.is_empty() {
        return Ok(RunnerState::Completed {
            summary: SessionSummary::default(),
        });
    }

    Ok(RunnerState::InProgress(Progress {
        cursor: 0,
        attempts_for_current_card: 0,
        presented_at: now,
        summary: SessionSummary::default(),
    }))
}

pub fn submit_answer(
    state: &RunnerState,
    plan: &SessionPlan,
    answer: Answer,
    now: DateTime<Utc>,
    policy: &SessionPolicy,
) -> Result<(RunnerState, SubmitOutcome), SessionError> {
    let RunnerState::InProgress(progress) = state else {
        return Err(SessionError::InvalidState {
            expected: "inProgress",
            actual: state.name(),
        });
    };
    let card = plan.cards.get(progress.cursor).ok_or_else(|| {
        SessionError::NotFound(format!("card at position {} of session {}", progress.cursor, plan.id))
    })?;

    let (is_correct, error_type) = evaluate(card, &answer)?;
    let attempt_number = progress.attempts_for_current_card + 1;
    let attempt = AttemptLog {
        session_id: plan.id.clone(),
        user_id: plan.user_id.clone(),
        card_id: card.id.clone(),
        item_id: card.item_id.clone(),
        kind: card.kind(),
        attempt_number,
        answer,
        is_correct,
        elapsed_ms: (now - progress.presented_at).num_milliseconds().max(0),
        error_type,
        timestamp: now,
    };

    let mut summary = progress.summary.clone();
    summary.attempts += 1;

    let retry_cap = policy.retry_cap.max(1);
    if !is_correct && attempt_number < retry_cap {
        let next = RunnerState::InProgress(Progress {
            cursor: progress.cursor,
            attempts_for_current_card: attempt_number,
            presented_at: now,
            summary,
        });
        let outcome = SubmitOutcome {
            attempt,
            resolution: Resolution::Retry {
                attempts_remaining: retry_cap - attempt_number,
            },
            summary: None,
        };
        return Ok((next, outcome));
    }

    tally(&mut summary, card.kind(), is_correct, attempt_number, policy);
    let resolved = ResolvedCard {
        card_id: card.id.clone(),
        item_id: card.item_id.clone(),
        kind: card.kind(),
        is_correct,
        attempts: attempt_number,
    };

    let cursor = progress.cursor + 1;
    let (next, finished) = if cursor >= plan.cards.len() {
        (
            RunnerState::Completed {
                summary: summary.clone(),
            },
            Some(summary),
        )
    } else {
        (
            RunnerState::InProgress(Progress {
                cursor,
                attempts_for_current_card: 0,
                presented_at: now,
                summary,
            }),
            None,
        )
    };

    Ok((
        next,
        SubmitOutcome {
            attempt,
            resolution: Resolution::Resolved(resolved),
            summary: finished,
        },
    ))
}

/// Correctness per card kind: exact option id for multiple choice,
/// trimmed case-insensitive text for typed answers.
pub fn evaluate(card: &Card, answer: &Answer) -> Result<(bool, Option<ErrorType>), SessionError> {
    match (&card.body, answer) {
        (CardBody::Teach { .. }, Answer::Acknowledge) => Ok((true, None)),
        (CardBody::MultipleChoice { correct_option_id, .. }, Answer::Choice(choice)) => {
            if choice == correct_option_id {
                Ok((true, None))
            } else {
                Ok((false, Some(ErrorType::WrongOption)))
            }
        }
        (CardBody::FillBlank { answer: expected, .. }, Answer::Text(given))
        | (CardBody::TranslateToTarget { expected, .. }, Answer::Text(given))
        | (CardBody::TranslateFromTarget { expected, .. }, Answer::Text(given))
        | (CardBody::Listening { expected, .. }, Answer::Text(given)) => Ok(text_match(expected, given)),
        _ => Err(SessionError::AnswerShape {
            card_id: card.id.clone(),
            kind: card.kind(),
        }),
    }
}

fn text_match(expected: &str, given: &str) -> (bool, Option<ErrorType>) {
    let given = given.trim();
    if given.is_empty() {
        return (false, Some(ErrorType::EmptyAnswer));
    }
    if given.to_lowercase() == expected.trim().to_lowercase() {
        (true, None)
    } else {
        (false, Some(ErrorType::WrongText))
    }
}

fn tally(
    summary: &mut SessionSummary,
    kind: CardKind,
    is_correct: bool,
    attempt_number: u32,
    policy: &SessionPolicy,
) {
    let entry = summary.by_kind.entry(kind).or_default();
    if is_correct {
        entry.correct += 1;
    } else {
        entry.incorrect += 1;
    }

    if kind == CardKind::Teach {
        summary.taught += 1;
        summary.total_xp += policy.xp_teach;
        return;
    }

    if is_correct {
        summary.correct += 1;
        summary.total_xp += if attempt_number == 1 {
            policy.xp_first_try
        } else {
            policy.xp_retry
        };
    } else {
        summary.incorrect += 1;
    }
}

/// Owns a plan and its runner state. Taking `&mut self` for every
/// transition means one submission is evaluated at a time.
#[derive(Debug, Clone)]
pub struct SessionRunner {
    plan: SessionPlan,
    state: RunnerState,
    policy: SessionPolicy,
}

impl SessionRunner {
    pub fn new(plan: SessionPlan, policy: SessionPolicy) -> Self {
        Self {
            plan,
            state: RunnerState::NotStarted,
            policy,
        }
    }

    /// Rebuilds a runner from a persisted state.
    pub fn resume(plan: SessionPlan, state: RunnerState, policy: SessionPolicy) -> Self {
        Self { plan, state, policy }
    }

    pub fn plan(&self) -> &SessionPlan {
        &self.plan
    }

    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        match &self.state {
            RunnerState::Completed { summary } => Some(summary),
            _ => None,
        }
    }

    pub fn current_card(&self) -> Option<&Card> {
        match &self.state {
            RunnerState::InProgress(progress) => self.plan.cards.get(progress.cursor),
            _ => None,
        }
    }

    pub fn start(&mut self) -> Result<&RunnerState, SessionError> {
        self.start_at(Utc::now())
    }

    pub fn start_at(&mut self, now: DateTime<Utc>) -> Result<&RunnerState, SessionError> {
        self.state = start(&self.state, &self.plan, now)?;
        tracing::debug!(session_id = %self.plan.id, state = self.state.name(), "session started");
        Ok(&self.state)
    }

    pub fn submit_answer(&mut self, answer: Answer) -> Result<SubmitOutcome, SessionError> {
        self.submit_answer_at(answer, Utc::now())
    }

    pub fn submit_answer_at(
        &mut self,
        answer: Answer,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, SessionError> {
        let (next, outcome) = self.evaluate_at(answer, now)?;
        self.commit(next);
        Ok(outcome)
    }

    /// Evaluates an answer without moving the runner. The returned state is
    /// applied with [`SessionRunner::commit`] once the outcome is persisted.
    pub fn evaluate_at(
        &self,
        answer: Answer,
        now: DateTime<Utc>,
    ) -> Result<(RunnerState, SubmitOutcome), SessionError> {
        submit_answer(&self.state, &self.plan, answer, now, &self.policy)
    }

    pub fn commit(&mut self, next: RunnerState) {
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::{ChoiceOption, PlanKind};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
    }

    fn plan(cards: Vec<Card>) -> SessionPlan {
        SessionPlan {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            kind: PlanKind::Learn,
            lesson_id: Some("l1".to_string()),
            cards,
            created_at: t0(),
        }
    }

    fn teach(id: &str) -> Card {
        Card {
            id: format!("{id}:teach"),
            item_id: id.to_string(),
            prompt: "New word".to_string(),
            body: CardBody::Teach {
                term: "gato".to_string(),
                translation: "cat".to_string(),
            },
        }
    }

    fn choice(id: &str) -> Card {
        Card {
            id: id.to_string(),
            item_id: id.to_string(),
            prompt: "Pick".to_string(),
            body: CardBody::MultipleChoice {
                options: vec![
                    ChoiceOption { id: "opt-1".into(), text: "dog".into() },
                    ChoiceOption { id: "opt-2".into(), text: "cat".into() },
                ],
                correct_option_id: "opt-2".to_string(),
            },
        }
    }

    fn fill(id: &str) -> Card {
        Card {
            id: id.to_string(),
            item_id: id.to_string(),
            prompt: "Fill".to_string(),
            body: CardBody::FillBlank {
                text: "El ___ duerme".to_string(),
                answer: "Gato".to_string(),
            },
        }
    }

    fn runner(cards: Vec<Card>) -> SessionRunner {
        let mut runner = SessionRunner::new(plan(cards), SessionPolicy::default());
        runner.start_at(t0()).unwrap();
        runner
    }

    #[test]
    fn empty_plan_completes_immediately() {
        let mut runner = SessionRunner::new(plan(Vec::new()), SessionPolicy::default());
        let state = runner.start_at(t0()).unwrap();
        assert!(state.is_completed());
        assert_eq!(runner.summary().unwrap().attempts, 0);
    }

    #[test]
    fn submit_before_start_is_invalid() {
        let mut runner = SessionRunner::new(plan(vec![choice("a")]), SessionPolicy::default());
        let err = runner.submit_answer_at(Answer::Choice("opt-2".into()), t0()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { actual: "notStarted", .. }));
    }

    #[test]
    fn start_twice_is_invalid() {
        let mut runner = runner(vec![choice("a")]);
        assert!(matches!(
            runner.start_at(t0()),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn retry_cap_limits_logged_attempts() {
        let mut runner = runner(vec![choice("a"), choice("b")]);

        let first = runner.submit_answer_at(Answer::Choice("opt-1".into()), t0()).unwrap();
        assert_eq!(first.resolution, Resolution::Retry { attempts_remaining: 1 });
        assert_eq!(first.attempt.error_type, Some(ErrorType::WrongOption));

        let second = runner.submit_answer_at(Answer::Choice("opt-1".into()), t0()).unwrap();
        assert!(matches!(
            second.resolution,
            Resolution::Resolved(ResolvedCard { is_correct: false, attempts: 2, .. })
        ));

        // The third wrong answer lands on the next card, not a third attempt on "a".
        let third = runner.submit_answer_at(Answer::Choice("opt-1".into()), t0()).unwrap();
        assert_eq!(third.attempt.card_id, "b");
        assert_eq!(third.attempt.attempt_number, 1);
    }

    #[test]
    fn typed_answers_ignore_case_and_whitespace() {
        let mut runner = runner(vec![fill("a")]);
        let outcome = runner.submit_answer_at(Answer::Text("  gATO ".into()), t0()).unwrap();
        assert!(outcome.attempt.is_correct);
        assert!(runner.is_completed());
    }

    #[test]
    fn empty_text_is_flagged() {
        let mut runner = runner(vec![fill("a")]);
        let outcome = runner.submit_answer_at(Answer::Text("   ".into()), t0()).unwrap();
        assert_eq!(outcome.attempt.error_type, Some(ErrorType::EmptyAnswer));
    }

    #[test]
    fn wrong_answer_shape_leaves_state_untouched() {
        let mut runner = runner(vec![choice("a")]);
        let before = runner.state().clone();
        let err = runner.submit_answer_at(Answer::Text("cat".into()), t0()).unwrap_err();
        assert!(matches!(err, SessionError::AnswerShape { kind: CardKind::MultipleChoice, .. }));
        assert_eq!(runner.state(), &before);
    }

    #[test]
    fn elapsed_measured_from_presentation() {
        let mut runner = runner(vec![choice("a"), choice("b")]);
        let first = runner
            .submit_answer_at(Answer::Choice("opt-1".into()), t0() + Duration::milliseconds(1500))
            .unwrap();
        assert_eq!(first.attempt.elapsed_ms, 1500);

        let retry = runner
            .submit_answer_at(Answer::Choice("opt-2".into()), t0() + Duration::milliseconds(2000))
            .unwrap();
        assert_eq!(retry.attempt.elapsed_ms, 500);
        assert_eq!(retry.attempt.attempt_number, 2);
    }

    #[test]
    fn completion_summary_and_terminal_state() {
        let mut runner = runner(vec![teach("a"), choice("a"), fill("b")]);
        runner.submit_answer_at(Answer::Acknowledge, t0()).unwrap();
        runner.submit_answer_at(Answer::Choice("opt-2".into()), t0()).unwrap();
        runner.submit_answer_at(Answer::Text("perro".into()), t0()).unwrap();
        let last = runner.submit_answer_at(Answer::Text("gato".into()), t0()).unwrap();

        let summary = last.summary.expect("summary on completion");
        assert_eq!(summary.taught, 1);
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.incorrect, 0);
        assert_eq!(summary.attempts, 4);
        assert_eq!(summary.total_xp, 2 + 10 + 5);
        assert_eq!(summary.by_kind[&CardKind::FillBlank], KindTally { correct: 1, incorrect: 0 });

        let err = runner.submit_answer_at(Answer::Acknowledge, t0()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { actual: "completed", .. }));
    }

    #[test]
    fn state_round_trips_for_recovery() {
        let mut runner = runner(vec![choice("a"), choice("b")]);
        runner.submit_answer_at(Answer::Choice("opt-1".into()), t0()).unwrap();

        let saved = serde_json::to_string(runner.state()).unwrap();
        let restored: RunnerState = serde_json::from_str(&saved).unwrap();
        let mut resumed = SessionRunner::resume(runner.plan().clone(), restored, SessionPolicy::default());

        let outcome = resumed.submit_answer_at(Answer::Choice("opt-2".into()), t0()).unwrap();
        assert_eq!(outcome.attempt.attempt_number, 2);
        assert_eq!(resumed.current_card().unwrap().id, "b");
    }

    #[test]
    fn evaluating_leaves_state_until_committed() {
        let mut runner = SessionRunner::new(plan(vec![choice("c1"), choice("c2")]), SessionPolicy::default());
        runner.start_at(t0()).unwrap();
        let before = runner.state().clone();

        let (next, outcome) = runner
            .evaluate_at(Answer::Choice("opt-2".to_string()), t0() + Duration::seconds(2))
            .unwrap();
        assert!(matches!(outcome.resolution, Resolution::Resolved(_)));
        assert_eq!(runner.state(), &before);
        assert_eq!(runner.current_card().map(|c| c.id.as_str()), Some("c1"));

        runner.commit(next);
        assert_eq!(runner.current_card().map(|c| c.id.as_str()), Some("c2"));
    }
}
