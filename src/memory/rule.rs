//! Spaced-repetition rule.
//!
//! The interval depends on the correctness streak only:
//! - streak 0 or 1: minimum interval
//! - streak n > 1: `min × growth^(n-1)`, capped at the maximum
//!
//! so each further correct answer multiplies the previous interval by the
//! growth factor, a miss drops back to the minimum, and a first observation
//! can never schedule a long gap.

use chrono::{DateTime, Duration, Utc};

use super::record::{LastResult, MasteryRecord};
use crate::config::{SchedulerConfig, INTERVAL_CEILING_MINUTES};

pub fn interval_for_streak(consecutive_correct: u32, config: &SchedulerConfig) -> i64 {
    let min = config.min_interval_minutes.clamp(1, INTERVAL_CEILING_MINUTES);
    let max = config.max_interval_minutes.clamp(min, INTERVAL_CEILING_MINUTES);
    if consecutive_correct <= 1 {
        return min;
    }

    let exponent = i32::try_from(consecutive_correct - 1).unwrap_or(i32::MAX);
    let scaled = min as f64 * config.growth_factor.max(1.0).powi(exponent);
    if !scaled.is_finite() || scaled >= max as f64 {
        max
    } else {
        (scaled.round() as i64).clamp(min, max)
    }
}

/// Computes the record that follows `previous` after one resolved card.
/// Pure: the same history replayed from scratch yields the same record.
pub fn next_record(
    previous: Option<&MasteryRecord>,
    card_id: &str,
    is_correct: bool,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> MasteryRecord {
    let (consecutive_correct, interval_minutes) = match previous {
        None => (u32::from(is_correct), interval_for_streak(0, config)),
        Some(prev) if is_correct => {
            let streak = prev.consecutive_correct.saturating_add(1);
            (streak, interval_for_streak(streak, config))
        }
        Some(_) => (0, interval_for_streak(0, config)),
    };

    let review_count = previous.map_or(0, |p| p.review_count).saturating_add(1);
    let lapses = previous.map_or(0, |p| p.lapses) + u32::from(!is_correct && previous.is_some());

    MasteryRecord {
        card_id: card_id.to_string(),
        last_result: LastResult::from_correct(is_correct),
        consecutive_correct,
        interval_minutes,
        due_at: now + Duration::minutes(interval_minutes),
        review_count,
        lapses,
        last_reviewed_at: now,
        version: previous.map_or(0, |p| p.version),
    }
}
