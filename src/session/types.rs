use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A content item as served by the catalog. Its id is the key mastery is
/// tracked under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    /// Target-language form.
    pub term: String,
    /// Learner's-language gloss.
    pub translation: String,
    #[serde(default)]
    pub distractors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloze: Option<Cloze>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cloze {
    /// Sentence with the gap marked as `___`.
    pub text: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardKind {
    Teach,
    MultipleChoice,
    FillBlank,
    TranslateToTarget,
    TranslateFromTarget,
    Listening,
}

impl CardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teach => "teach",
            Self::MultipleChoice => "multipleChoice",
            Self::FillBlank => "fillBlank",
            Self::TranslateToTarget => "translateToTarget",
            Self::TranslateFromTarget => "translateFromTarget",
            Self::Listening => "listening",
        }
    }

    pub fn is_free_response(&self) -> bool {
        matches!(
            self,
            Self::FillBlank | Self::TranslateToTarget | Self::TranslateFromTarget
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CardBody {
    #[serde(rename_all = "camelCase")]
    Teach { term: String, translation: String },
    #[serde(rename_all = "camelCase")]
    MultipleChoice {
        options: Vec<ChoiceOption>,
        correct_option_id: String,
    },
    #[serde(rename_all = "camelCase")]
    FillBlank { text: String, answer: String },
    #[serde(rename_all = "camelCase")]
    TranslateToTarget { source: String, expected: String },
    #[serde(rename_all = "camelCase")]
    TranslateFromTarget { source: String, expected: String },
    #[serde(rename_all = "camelCase")]
    Listening { audio_ref: String, expected: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Stable across sessions for the same content item and role.
    pub id: String,
    pub item_id: String,
    pub prompt: String,
    #[serde(flatten)]
    pub body: CardBody,
}

impl Card {
    pub fn kind(&self) -> CardKind {
        match self.body {
            CardBody::Teach { .. } => CardKind::Teach,
            CardBody::MultipleChoice { .. } => CardKind::MultipleChoice,
            CardBody::FillBlank { .. } => CardKind::FillBlank,
            CardBody::TranslateToTarget { .. } => CardKind::TranslateToTarget,
            CardBody::TranslateFromTarget { .. } => CardKind::TranslateFromTarget,
            CardBody::Listening { .. } => CardKind::Listening,
        }
    }

    /// The answer that resolves this card as correct.
    pub fn expected_answer(&self) -> Answer {
        match &self.body {
            CardBody::Teach { .. } => Answer::Acknowledge,
            CardBody::MultipleChoice {
                correct_option_id, ..
            } => Answer::Choice(correct_option_id.clone()),
            CardBody::FillBlank { answer, .. } => Answer::Text(answer.clone()),
            CardBody::TranslateToTarget { expected, .. }
            | CardBody::TranslateFromTarget { expected, .. }
            | CardBody::Listening { expected, .. } => Answer::Text(expected.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanKind {
    Learn,
    Review,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPlan {
    pub id: String,
    pub user_id: String,
    pub kind: PlanKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,
    pub cards: Vec<Card>,
    pub created_at: DateTime<Utc>,
}

impl SessionPlan {
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn teach_count(&self) -> usize {
        self.cards.iter().filter(|c| c.kind() == CardKind::Teach).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Answer {
    /// Option id for multiple-choice cards.
    Choice(String),
    Text(String),
    /// Dismissal of a teach card.
    Acknowledge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    WrongOption,
    EmptyAnswer,
    WrongText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptLog {
    pub session_id: String,
    pub user_id: String,
    pub card_id: String,
    pub item_id: String,
    pub kind: CardKind,
    pub attempt_number: u32,
    pub answer: Answer,
    pub is_correct: bool,
    pub elapsed_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    pub timestamp: DateTime<Utc>,
}
