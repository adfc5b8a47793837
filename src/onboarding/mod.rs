//! Onboarding signal mapper: raw answers to `{version, tags, signals}`.

pub mod answers;
pub mod selection;
pub mod signals;

use serde::{Deserialize, Serialize};

pub use answers::{
    normalize, Answer, Difficulty, FeedbackLevel, FieldError, FieldIssue, Gamification,
    LearningStyle, Motivation, OnboardingAnswers, Pacing, QuestionKey, RawAnswers,
    ValidationError, MAX_LEARNING_STYLES,
};
pub use selection::compute_next_selection;
pub use signals::{
    build_submission, needs_rederivation, rederive, OnboardingSignals, OnboardingSubmission,
    ONBOARDING_SCHEMA_VERSION,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryDestination {
    OnboardingWelcome,
    Home,
}

/// Where a signed-in user lands: onboarding until a submission exists, home after.
pub fn entry_destination(onboarding_complete: bool) -> EntryDestination {
    if onboarding_complete {
        EntryDestination::Home
    } else {
        EntryDestination::OnboardingWelcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_onboarding_routes_to_welcome() {
        assert_eq!(entry_destination(false), EntryDestination::OnboardingWelcome);
        assert_eq!(entry_destination(true), EntryDestination::Home);
    }
}
