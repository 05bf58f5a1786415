use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use lettre::Message;

use crate::automation::AutomationSettings;
use crate::db_core::prelude::*;
use crate::mail::transport::{MailTransport, SendError, SendReceipt};
use crate::server_config::SafetyConfig;

#[derive(Debug, Clone)]
pub struct RecordedSend {
    pub access_token: String,
    pub thread_id: Option<String>,
    pub formatted: String,
}

/// Transport double that records every send and replays scripted results.
/// Defaults to success once the script runs out.
pub struct StubTransport {
    pub sends: Mutex<Vec<RecordedSend>>,
    results: Mutex<VecDeque<Result<SendReceipt, SendError>>>,
}

impl StubTransport {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            sends: Mutex::new(vec![]),
            results: Mutex::new(VecDeque::new()),
        })
    }

    pub fn with_results(results: Vec<Result<SendReceipt, SendError>>) -> Arc<Self> {
        Arc::new(Self {
            sends: Mutex::new(vec![]),
            results: Mutex::new(results.into()),
        })
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }
}

#[async_trait]
impl MailTransport for StubTransport {
    async fn send(
        &self,
        access_token: &str,
        message: &Message,
        thread_id: Option<&str>,
    ) -> Result<SendReceipt, SendError> {
        self.sends.lock().unwrap().push(RecordedSend {
            access_token: access_token.to_string(),
            thread_id: thread_id.map(str::to_string),
            formatted: String::from_utf8_lossy(&message.formatted()).to_string(),
        });

        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SendReceipt::default()))
    }
}

pub fn test_settings() -> AutomationSettings {
    AutomationSettings {
        max_send_attempts: 3,
        backoff_base_secs: 0,
        backoff_cap_secs: 0,
        max_concurrent_sends: 2,
        email_max_age_days: 7,
        safety: SafetyConfig {
            blocked_sender_keywords: vec!["no-reply".to_string(), "mailer-daemon".to_string()],
            blocked_sender_domains: vec!["mailchimp.com".to_string()],
            auto_generated_subject_phrases: vec!["out of office".to_string()],
        },
    }
}

pub fn test_log_entry(id: i32, user_id: i32, outcome: AutomationOutcome) -> automation_log::Model {
    automation_log::Model {
        id,
        user_id,
        rule_id: None,
        task_id: None,
        email_id: None,
        outcome,
        message: None,
        created_at: Utc::now().into(),
    }
}

pub fn test_user(id: i32, email: &str, with_token: bool) -> user::Model {
    let now = Utc::now().into();
    user::Model {
        id,
        email: email.to_string(),
        display_name: None,
        access_token: with_token.then(|| "test-token".to_string()),
        last_email_sync_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_email(id: i32, user_id: i32, sender: &str, subject: &str) -> inbound_email::Model {
    let now = Utc::now().into();
    inbound_email::Model {
        id,
        user_id,
        gmail_id: format!("gmail-{id}"),
        thread_id: None,
        sender: sender.to_string(),
        subject: subject.to_string(),
        body_text: Some("hello".to_string()),
        received_at: now,
        processed: false,
        processed_at: None,
        created_at: now,
    }
}

pub fn test_rule(id: i32, user_id: i32, conditions: serde_json::Value) -> auto_reply_rule::Model {
    let now = Utc::now().into();
    auto_reply_rule::Model {
        id,
        user_id,
        name: format!("rule-{id}"),
        priority: 1,
        is_enabled: true,
        conditions,
        reply_subject: None,
        reply_body: "Thanks {{ sender_name }}, got it.".to_string(),
        created_at: now,
        updated_at: now,
    }
}

pub fn test_task(id: i32, user_id: i32, retry_count: i32) -> follow_up_task::Model {
    let now: DateTimeWithTimeZone = Utc::now().into();
    follow_up_task::Model {
        id,
        user_id,
        email_id: None,
        thread_id: None,
        recipient: "client@example.com".to_string(),
        subject: "Checking in".to_string(),
        content: "Just following up.".to_string(),
        due_at: now,
        status: FollowUpStatus::Pending,
        retry_count,
        next_attempt_at: now,
        last_error: None,
        sent_at: None,
        created_at: now,
        updated_at: now,
    }
}
