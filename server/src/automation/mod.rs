pub mod dispatcher;
pub mod engine;
pub mod matcher;
pub mod safety;
pub mod template;

use crate::server_config::{cfg, SafetyConfig};

/// Engine knobs resolved once at startup. Held explicitly by the engine
/// instead of read ambiently, so tests can swap them freely.
#[derive(Debug, Clone)]
pub struct AutomationSettings {
    pub max_send_attempts: i32,
    pub backoff_base_secs: i64,
    pub backoff_cap_secs: i64,
    pub max_concurrent_sends: usize,
    pub email_max_age_days: i64,
    pub safety: SafetyConfig,
}

impl AutomationSettings {
    pub fn from_config() -> Self {
        Self {
            max_send_attempts: cfg.automation.max_send_attempts,
            backoff_base_secs: cfg.automation.backoff_base_secs,
            backoff_cap_secs: cfg.automation.backoff_cap_secs,
            max_concurrent_sends: cfg.automation.max_concurrent_sends,
            email_max_age_days: cfg.settings.email_max_age_days,
            safety: cfg.safety.clone(),
        }
    }
}

/// Exponential backoff delay for the given attempt, capped.
pub(crate) fn backoff_delay_secs(base_secs: i64, cap_secs: i64, attempt: i32) -> i64 {
    let factor = 2_i64.saturating_pow(attempt.max(0) as u32);
    base_secs.saturating_mul(factor).min(cap_secs)
}
