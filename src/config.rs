use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub loop_config: LoopConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            log_level,
            loop_config: LoopConfig::from_env(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopConfig {
    pub scheduler: SchedulerConfig,
    pub session: SessionPolicy,
    pub plan: PlanConfig,
}

impl LoopConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`; unparsable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = parse_var::<u32>(&lookup, "SESSION_RETRY_CAP") {
            config.session.retry_cap = val.max(1);
        }
        if let Some(val) = parse_var::<usize>(&lookup, "REVIEW_SESSION_LIMIT") {
            config.plan.review_session_limit = val.max(1);
        }
        if let Some(val) = parse_var::<i64>(&lookup, "SCHEDULER_MIN_INTERVAL_MINUTES") {
            config.scheduler.min_interval_minutes = val.clamp(1, INTERVAL_CEILING_MINUTES);
        }
        if let Some(val) = parse_var::<f64>(&lookup, "SCHEDULER_GROWTH_FACTOR") {
            if val.is_finite() {
                config.scheduler.growth_factor = val.max(1.0);
            }
        }
        if let Some(val) = parse_var::<i64>(&lookup, "SCHEDULER_MAX_INTERVAL_DAYS") {
            config.scheduler.max_interval_minutes =
                val.max(1).saturating_mul(24 * 60).min(INTERVAL_CEILING_MINUTES);
        }
        if let Some(val) = parse_var::<u32>(&lookup, "SCHEDULER_MAX_CONFLICT_RETRIES") {
            config.scheduler.max_conflict_retries = val;
        }

        config.scheduler.max_interval_minutes = config
            .scheduler
            .max_interval_minutes
            .max(config.scheduler.min_interval_minutes);
        config
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse::<T>().ok())
}

/// Upper bound for any review interval, about ten years.
pub const INTERVAL_CEILING_MINUTES: i64 = 3650 * 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    pub min_interval_minutes: i64,
    pub growth_factor: f64,
    pub max_interval_minutes: i64,
    pub max_conflict_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval_minutes: 10,
            growth_factor: 2.5,
            max_interval_minutes: 180 * 24 * 60,
            max_conflict_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPolicy {
    /// Attempts allowed per card before the runner moves on regardless of correctness.
    pub retry_cap: u32,
    pub xp_first_try: u32,
    pub xp_retry: u32,
    pub xp_teach: u32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            retry_cap: 2,
            xp_first_try: 10,
            xp_retry: 5,
            xp_teach: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanConfig {
    pub review_session_limit: usize,
    pub free_response_base: f64,
    pub free_response_span: f64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            review_session_limit: 20,
            free_response_base: 0.2,
            free_response_span: 0.6,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let config = LoopConfig::default();
        assert_eq!(config.session.retry_cap, 2);
        assert!(config.scheduler.max_interval_minutes >= config.scheduler.min_interval_minutes);
        assert!(config.scheduler.growth_factor >= 1.0);
        assert!(config.plan.free_response_base + config.plan.free_response_span <= 1.0);
    }

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn overrides_apply_and_bad_values_fall_back() {
        let config = LoopConfig::from_lookup(lookup(&[
            ("SESSION_RETRY_CAP", " 3 "),
            ("REVIEW_SESSION_LIMIT", "not-a-number"),
            ("SCHEDULER_GROWTH_FACTOR", "0.5"),
        ]));
        assert_eq!(config.session.retry_cap, 3);
        assert_eq!(config.plan.review_session_limit, 20);
        assert_eq!(config.scheduler.growth_factor, 1.0);
    }

    #[test]
    fn huge_interval_settings_are_capped() {
        let config = LoopConfig::from_lookup(lookup(&[
            ("SCHEDULER_MAX_INTERVAL_DAYS", "9223372036854775807"),
            ("SCHEDULER_MIN_INTERVAL_MINUTES", "9223372036854775807"),
        ]));
        assert_eq!(config.scheduler.max_interval_minutes, INTERVAL_CEILING_MINUTES);
        assert_eq!(config.scheduler.min_interval_minutes, INTERVAL_CEILING_MINUTES);
    }
}
