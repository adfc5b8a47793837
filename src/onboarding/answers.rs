//! Onboarding question schema and normalization of raw client answers.
//!
//! Raw answers arrive as a JSON object keyed by question id. `normalize` turns
//! them into a closed list of [`Answer`] variants, preserving the insertion
//! order of the raw object so that derived tags keep the order the client
//! answered in.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub type RawAnswers = Map<String, Value>;

/// Multi-select learning styles beyond this count are dropped, oldest kept.
pub const MAX_LEARNING_STYLES: usize = 2;

pub const DAILY_GOAL_CHOICES: [u32; 4] = [5, 10, 15, 20];

macro_rules! answer_choice {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

answer_choice!(
    /// Why the learner is studying; drives `goal:*` tags.
    Motivation {
        Travel => "travel",
        Career => "career",
        School => "school",
        Culture => "culture",
        Family => "family",
        Brain => "brain",
    }
);

answer_choice!(Difficulty {
    Easy => "easy",
    Balanced => "balanced",
    Hard => "hard",
});

answer_choice!(LearningStyle {
    Visual => "visual",
    Auditory => "auditory",
    Reading => "reading",
    Kinesthetic => "kinesthetic",
});

answer_choice!(Pacing {
    Relaxed => "relaxed",
    Steady => "steady",
    Intense => "intense",
});

answer_choice!(FeedbackLevel {
    Minimal => "minimal",
    Standard => "standard",
    Detailed => "detailed",
});

answer_choice!(Gamification {
    Off => "off",
    Light => "light",
    Full => "full",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionKey {
    Motivation,
    Difficulty,
    LearningStyles,
    Pacing,
    Feedback,
    Gamification,
    DailyGoalMinutes,
}

impl QuestionKey {
    pub const ALL: [QuestionKey; 7] = [
        QuestionKey::Motivation,
        QuestionKey::Difficulty,
        QuestionKey::LearningStyles,
        QuestionKey::Pacing,
        QuestionKey::Feedback,
        QuestionKey::Gamification,
        QuestionKey::DailyGoalMinutes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Motivation => "motivation",
            Self::Difficulty => "difficulty",
            Self::LearningStyles => "learningStyles",
            Self::Pacing => "pacing",
            Self::Feedback => "feedback",
            Self::Gamification => "gamification",
            Self::DailyGoalMinutes => "dailyGoalMinutes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == s)
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Self::Motivation)
    }
}

/// One normalized answer. The variant set is closed so every consumer has to
/// handle each question explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "question", content = "value", rename_all = "camelCase")]
pub enum Answer {
    Motivation(Motivation),
    Difficulty(Difficulty),
    LearningStyles(Vec<LearningStyle>),
    Pacing(Pacing),
    Feedback(FeedbackLevel),
    Gamification(Gamification),
    DailyGoalMinutes(u32),
}

impl Answer {
    pub fn key(&self) -> QuestionKey {
        match self {
            Self::Motivation(_) => QuestionKey::Motivation,
            Self::Difficulty(_) => QuestionKey::Difficulty,
            Self::LearningStyles(_) => QuestionKey::LearningStyles,
            Self::Pacing(_) => QuestionKey::Pacing,
            Self::Feedback(_) => QuestionKey::Feedback,
            Self::Gamification(_) => QuestionKey::Gamification,
            Self::DailyGoalMinutes(_) => QuestionKey::DailyGoalMinutes,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OnboardingAnswers {
    answers: Vec<Answer>,
}

impl OnboardingAnswers {
    pub fn iter(&self) -> impl Iterator<Item = &Answer> {
        self.answers.iter()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn motivation(&self) -> Option<Motivation> {
        self.answers.iter().find_map(|a| match a {
            Answer::Motivation(m) => Some(*m),
            _ => None,
        })
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        self.answers.iter().find_map(|a| match a {
            Answer::Difficulty(d) => Some(*d),
            _ => None,
        })
    }

    pub fn learning_styles(&self) -> &[LearningStyle] {
        self.answers
            .iter()
            .find_map(|a| match a {
                Answer::LearningStyles(styles) => Some(styles.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn pacing(&self) -> Option<Pacing> {
        self.answers.iter().find_map(|a| match a {
            Answer::Pacing(p) => Some(*p),
            _ => None,
        })
    }

    pub fn feedback(&self) -> Option<FeedbackLevel> {
        self.answers.iter().find_map(|a| match a {
            Answer::Feedback(f) => Some(*f),
            _ => None,
        })
    }

    pub fn gamification(&self) -> Option<Gamification> {
        self.answers.iter().find_map(|a| match a {
            Answer::Gamification(g) => Some(*g),
            _ => None,
        })
    }

    pub fn daily_goal_minutes(&self) -> Option<u32> {
        self.answers.iter().find_map(|a| match a {
            Answer::DailyGoalMinutes(m) => Some(*m),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldIssue {
    #[error("required answer is missing")]
    Missing,
    #[error("expected {0}")]
    WrongType(&'static str),
    #[error("'{0}' is not an accepted value")]
    OutOfDomain(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {issue}")]
pub struct FieldError {
    pub field: &'static str,
    pub issue: FieldIssue,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid onboarding answers: {}", describe(.fields))]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

fn describe(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validates and coerces raw answers. Every offending field is reported, not
/// only the first one; unknown question ids are skipped.
pub fn normalize(raw: &RawAnswers) -> Result<OnboardingAnswers, ValidationError> {
    let mut answers = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();

    for (name, value) in raw {
        let Some(key) = QuestionKey::parse(name) else {
            tracing::debug!(question = %name, "ignoring unknown onboarding question");
            continue;
        };
        if value.is_null() {
            continue;
        }
        match parse_answer(key, value) {
            Ok(answer) => answers.push(answer),
            Err(issue) => errors.push(FieldError {
                field: key.as_str(),
                issue,
            }),
        }
    }

    for key in QuestionKey::ALL.iter().filter(|k| k.is_required()) {
        let answered = answers.iter().any(|a| a.key() == *key);
        let already_reported = errors.iter().any(|e| e.field == key.as_str());
        if !answered && !already_reported {
            errors.push(FieldError {
                field: key.as_str(),
                issue: FieldIssue::Missing,
            });
        }
    }

    if errors.is_empty() {
        Ok(OnboardingAnswers { answers })
    } else {
        Err(ValidationError { fields: errors })
    }
}

fn parse_answer(key: QuestionKey, value: &Value) -> Result<Answer, FieldIssue> {
    match key {
        QuestionKey::Motivation => {
            let text = match value {
                Value::Object(obj) => obj
                    .get("key")
                    .and_then(Value::as_str)
                    .ok_or(FieldIssue::WrongType("object with a string 'key'"))?,
                Value::String(s) => s.as_str(),
                _ => return Err(FieldIssue::WrongType("object with a string 'key'")),
            };
            choice(text, Motivation::parse).map(Answer::Motivation)
        }
        QuestionKey::Difficulty => choice(as_text(value)?, Difficulty::parse).map(Answer::Difficulty),
        QuestionKey::Pacing => choice(as_text(value)?, Pacing::parse).map(Answer::Pacing),
        QuestionKey::Feedback => choice(as_text(value)?, FeedbackLevel::parse).map(Answer::Feedback),
        QuestionKey::Gamification => {
            choice(as_text(value)?, Gamification::parse).map(Answer::Gamification)
        }
        QuestionKey::LearningStyles => parse_learning_styles(value).map(Answer::LearningStyles),
        QuestionKey::DailyGoalMinutes => {
            let minutes = match value {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            }
            .ok_or(FieldIssue::WrongType("whole number of minutes"))?;
            DAILY_GOAL_CHOICES
                .iter()
                .copied()
                .find(|choice| u64::from(*choice) == minutes)
                .map(Answer::DailyGoalMinutes)
                .ok_or_else(|| FieldIssue::OutOfDomain(minutes.to_string()))
        }
    }
}

fn as_text(value: &Value) -> Result<&str, FieldIssue> {
    value.as_str().ok_or(FieldIssue::WrongType("string"))
}

fn choice<T>(text: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T, FieldIssue> {
    parse(text).ok_or_else(|| FieldIssue::OutOfDomain(text.trim().to_string()))
}

fn parse_learning_styles(value: &Value) -> Result<Vec<LearningStyle>, FieldIssue> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::String(_) => vec![value],
        _ => return Err(FieldIssue::WrongType("array of strings")),
    };

    let mut styles: Vec<LearningStyle> = Vec::new();
    for item in items {
        let style = choice(as_text(item)?, LearningStyle::parse)?;
        if !styles.contains(&style) {
            styles.push(style);
        }
    }
    // Over-selection is a UX affordance, not an integrity problem: keep the first picks.
    styles.truncate(MAX_LEARNING_STYLES);
    Ok(styles)
}
