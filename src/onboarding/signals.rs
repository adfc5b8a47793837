use serde::{Deserialize, Serialize};

use super::answers::{
    Answer, Difficulty, FeedbackLevel, Gamification, LearningStyle, OnboardingAnswers, Pacing,
};

/// Bumped whenever answer shapes or lookup tables change, so stored
/// submissions from older schemas can be found and re-derived.
pub const ONBOARDING_SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_DAILY_GOAL_MINUTES: u32 = 10;

impl Difficulty {
    pub fn challenge_weight(&self) -> f64 {
        match self {
            Self::Easy => 0.25,
            Self::Balanced => 0.5,
            Self::Hard => 0.8,
        }
    }
}

impl Pacing {
    pub fn session_size_multiplier(&self) -> f64 {
        match self {
            Self::Relaxed => 0.75,
            Self::Steady => 1.0,
            Self::Intense => 1.5,
        }
    }
}

impl FeedbackLevel {
    pub fn verbosity(&self) -> u8 {
        match self {
            Self::Minimal => 0,
            Self::Standard => 1,
            Self::Detailed => 2,
        }
    }
}

impl Gamification {
    pub fn intensity(&self) -> f64 {
        match self {
            Self::Off => 0.0,
            Self::Light => 0.5,
            Self::Full => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingSignals {
    /// 0.0..=1.0, higher means more free-response practice.
    pub challenge_weight: f64,
    pub pacing: Pacing,
    pub session_size_multiplier: f64,
    pub feedback_verbosity: u8,
    pub gamification_intensity: f64,
    pub prefers_audio: bool,
    pub daily_goal_minutes: u32,
}

impl Default for OnboardingSignals {
    fn default() -> Self {
        Self {
            challenge_weight: Difficulty::Balanced.challenge_weight(),
            pacing: Pacing::Steady,
            session_size_multiplier: Pacing::Steady.session_size_multiplier(),
            feedback_verbosity: FeedbackLevel::Standard.verbosity(),
            gamification_intensity: Gamification::Light.intensity(),
            prefers_audio: false,
            daily_goal_minutes: DEFAULT_DAILY_GOAL_MINUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingSubmission {
    pub version: u32,
    pub answers: OnboardingAnswers,
    pub tags: Vec<String>,
    pub signals: OnboardingSignals,
}

/// Derives tags and signals from normalized answers. Pure: identical answers
/// always produce an identical submission.
pub fn build_submission(answers: &OnboardingAnswers) -> OnboardingSubmission {
    OnboardingSubmission {
        version: ONBOARDING_SCHEMA_VERSION,
        answers: answers.clone(),
        tags: build_tags(answers),
        signals: build_signals(answers),
    }
}

pub fn build_tags(answers: &OnboardingAnswers) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut push = |tag: String| {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    };

    for answer in answers.iter() {
        match answer {
            Answer::Motivation(m) => push(format!("goal:{}", m.as_str())),
            Answer::Difficulty(d) => push(format!("challenge:{}", d.as_str())),
            Answer::LearningStyles(styles) => {
                for style in styles {
                    push(format!("style:{}", style.as_str()));
                }
            }
            Answer::Pacing(p) => push(format!("pace:{}", p.as_str())),
            Answer::Feedback(f) => push(format!("feedback:{}", f.as_str())),
            Answer::Gamification(g) => push(format!("gamification:{}", g.as_str())),
            Answer::DailyGoalMinutes(_) => {}
        }
    }

    tags
}

pub fn build_signals(answers: &OnboardingAnswers) -> OnboardingSignals {
    let defaults = OnboardingSignals::default();
    let pacing = answers.pacing().unwrap_or(defaults.pacing);

    OnboardingSignals {
        challenge_weight: answers
            .difficulty()
            .map(|d| d.challenge_weight())
            .unwrap_or(defaults.challenge_weight),
        pacing,
        session_size_multiplier: pacing.session_size_multiplier(),
        feedback_verbosity: answers
            .feedback()
            .map(|f| f.verbosity())
            .unwrap_or(defaults.feedback_verbosity),
        gamification_intensity: answers
            .gamification()
            .map(|g| g.intensity())
            .unwrap_or(defaults.gamification_intensity),
        prefers_audio: answers.learning_styles().contains(&LearningStyle::Auditory),
        daily_goal_minutes: answers
            .daily_goal_minutes()
            .unwrap_or(defaults.daily_goal_minutes),
    }
}

pub fn needs_rederivation(version: u32) -> bool {
    version < ONBOARDING_SCHEMA_VERSION
}

/// Recomputes a stored submission under the current schema. Returns `None`
/// when the stored copy is already current.
pub fn rederive(stored: &OnboardingSubmission) -> Option<OnboardingSubmission> {
    if !needs_rederivation(stored.version) {
        return None;
    }
    tracing::debug!(
        from_version = stored.version,
        to_version = ONBOARDING_SCHEMA_VERSION,
        "re-deriving onboarding signals"
    );
    Some(build_submission(&stored.answers))
}
