use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use danci_session_core::config::Config;
use danci_session_core::logging::{init_tracing, LogSettings};
use danci_session_core::seed::{seed_demo_catalog, DEMO_GREETINGS_LESSON};
use danci_session_core::session::{Answer, Card, SessionRunner};
use danci_session_core::store::InMemoryStore;
use danci_session_core::{LearningLoop, LoopError};

const DEMO_USER: &str = "demo-user";

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&LogSettings::from_env(&config.log_level));

    let store = Arc::new(InMemoryStore::new());
    seed_demo_catalog(&store);
    let learning = LearningLoop::new(Arc::clone(&store), config.loop_config.clone());

    if let Err(err) = run_demo(&learning).await {
        tracing::error!(error = %err, "demo walkthrough failed");
        std::process::exit(1);
    }

    tracing::info!(attempts = store.attempts().len(), "demo walkthrough complete");
}

async fn run_demo(learning: &LearningLoop<InMemoryStore>) -> Result<(), LoopError> {
    let destination = learning.entry_destination(DEMO_USER).await?;
    tracing::info!(?destination, "before onboarding");

    let raw = json!({
        "motivation": { "key": "travel" },
        "difficulty": "balanced",
        "learningStyles": ["auditory", "visual"],
        "pacing": "steady"
    });
    let answers = raw.as_object().cloned().unwrap_or_default();
    let submission = learning.submit_onboarding(DEMO_USER, &answers).await?;
    tracing::info!(tags = ?submission.tags, "onboarding done");

    let start = Utc::now();
    let mut lesson = learning
        .start_lesson_at(DEMO_USER, DEMO_GREETINGS_LESSON, start)
        .await?;
    // Miss the first practice card once to show a retry.
    let miss_at = lesson.plan().teach_count();
    play(learning, &mut lesson, start, Some(miss_at)).await?;

    let review_at = start + Duration::days(1);
    let mut review = learning.start_review_at(DEMO_USER, review_at).await?;
    if review.is_completed() {
        tracing::info!("nothing due for review");
    } else {
        play(learning, &mut review, review_at, None).await?;
    }

    Ok(())
}

async fn play(
    learning: &LearningLoop<InMemoryStore>,
    runner: &mut SessionRunner,
    start: chrono::DateTime<Utc>,
    miss_at: Option<usize>,
) -> Result<(), LoopError> {
    let mut step = 0usize;
    let mut at = start;
    while let Some(card) = runner.current_card().cloned() {
        at += Duration::seconds(4);
        let answer = if miss_at == Some(step) {
            wrong_answer(&card)
        } else {
            card.expected_answer()
        };

        let outcome = learning.submit_answer_at(runner, answer, at).await?;
        tracing::info!(
            card_id = %outcome.attempt.card_id,
            kind = outcome.attempt.kind.as_str(),
            attempt = outcome.attempt.attempt_number,
            correct = outcome.attempt.is_correct,
            "answered"
        );
        step += 1;
    }

    if let Some(summary) = runner.summary() {
        tracing::info!(
            session_id = %runner.plan().id,
            xp = summary.total_xp,
            correct = summary.correct,
            incorrect = summary.incorrect,
            "session summary"
        );
    }
    Ok(())
}

fn wrong_answer(card: &Card) -> Answer {
    match card.expected_answer() {
        Answer::Choice(_) => Answer::Choice("opt-missing".to_string()),
        Answer::Text(_) => Answer::Text("no idea".to_string()),
        Answer::Acknowledge => Answer::Acknowledge,
    }
}
