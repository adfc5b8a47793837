//! Session plans, cards, and the runner that plays a plan through.

pub mod plan;
pub mod runner;
pub mod types;

use thiserror::Error;

use crate::store::StoreError;

pub use plan::SessionPlanBuilder;
pub use runner::{
    KindTally, Progress, Resolution, ResolvedCard, RunnerState, SessionRunner, SessionSummary,
    SubmitOutcome,
};
pub use types::{
    Answer, AttemptLog, Card, CardBody, CardKind, ChoiceOption, Cloze, ContentItem, ErrorType,
    PlanKind, SessionPlan,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("runner is {actual}, operation requires {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("answer does not fit {kind:?} card {card_id}")]
    AnswerShape { card_id: String, kind: CardKind },
    #[error(transparent)]
    Store(#[from] StoreError),
}
