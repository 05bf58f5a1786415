use std::sync::atomic::Ordering::Relaxed;
use std::sync::{atomic::AtomicBool, Arc};
use tokio::time::Duration;

use leaky_bucket::RateLimiter;

use crate::server_config::cfg;

#[derive(Clone)]
pub struct RateLimiters {
    send: Arc<RateLimiter>,
    backoff: Arc<AtomicBool>,
    backoff_duration: Duration,
}

impl RateLimiters {
    pub fn new(send_limit_per_sec: usize, send_interval_ms: usize, send_refill: usize) -> Self {
        let send = RateLimiter::builder()
            .initial(1)
            .interval(Duration::from_millis(send_interval_ms as u64))
            .max(send_limit_per_sec)
            .refill(send_refill)
            .build();

        Self {
            send: Arc::new(send),
            backoff: Arc::new(AtomicBool::new(false)),
            backoff_duration: Duration::from_secs(60),
        }
    }

    pub fn from_env() -> Self {
        let send_limit_per_sec = cfg.send_limits.rate_limit_per_sec;
        let send_interval_ms = cfg.send_limits.refill_interval_ms;
        let send_refill = cfg.send_limits.refill_amount;
        Self::new(send_limit_per_sec, send_interval_ms, send_refill)
    }

    pub async fn acquire_one(&self) {
        if self.backoff.load(Relaxed) {
            tokio::time::sleep(self.backoff_duration).await;
        }
        self.send.acquire_one().await;
    }

    /// Pauses sends for the backoff window. Tripped when the provider
    /// answers 429.
    pub fn trigger_backoff(&self) {
        tracing::info!("Triggering backoff...");
        self.backoff.store(true, Relaxed);
        let self_ = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(self_.backoff_duration).await;
            tracing::info!("Backoff expired");
            self_.backoff.store(false, Relaxed);
        });
    }
}
