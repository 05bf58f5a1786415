use std::panic::AssertUnwindSafe;

use chrono::Utc;
use futures::FutureExt;

use crate::automation::engine::AutomationEngine;

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Unknown panic".to_string())
}

/// One scheduled pass of the auto reply sweep. Panics inside the sweep are
/// caught so a bad pass never takes the scheduler down with it.
pub async fn run_reply_sweep(engine: AutomationEngine) {
    let result = AssertUnwindSafe(async {
        if let Err(e) = engine.run_reply_sweep().await {
            tracing::error!("Reply sweep failed: {:?}", e);
        }
    })
    .catch_unwind()
    .await;

    if let Err(panic) = result {
        tracing::error!("Reply sweep panicked, recovering: {}", panic_message(panic));
    }
}

/// One scheduled invocation of the follow up driver.
pub async fn run_follow_up_tick(engine: AutomationEngine) {
    let result = AssertUnwindSafe(async {
        match engine.tick(Utc::now().into()).await {
            Ok(outcomes) if !outcomes.is_empty() => {
                tracing::info!("Follow up tick completed {} tasks", outcomes.len());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Follow up tick failed: {:?}", e);
            }
        }
    })
    .catch_unwind()
    .await;

    if let Err(panic) = result {
        tracing::error!(
            "Follow up tick panicked, recovering: {}",
            panic_message(panic)
        );
    }
}
