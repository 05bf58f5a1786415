use std::time::Duration;

use crate::{
    db_core::prelude::*,
    error::AppResult,
    mail::{
        compose::{self, ReplyContext},
        transport::{MailTransport, SendError},
    },
    model::{automation_log::AppendLogEntry, automation_log::AutomationLogCtrl, inbound_email::InboundEmailCtrl},
};

use super::{backoff_delay_secs, matcher::EmailView, template, AutomationSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Skipped(String),
    Failed(String),
}

/// Sends the matched rule's reply for a triggering email, at most once.
///
/// The processed flag acts as a compare-and-set gate: the email is claimed
/// before any send, so two concurrent dispatches for the same email produce
/// exactly one sent outcome. Transient delivery errors are retried in place
/// with capped exponential backoff; a permanent error or retry exhaustion
/// lands a failed log entry and requires a manual re-trigger.
pub async fn dispatch(
    conn: &DatabaseConnection,
    transport: &dyn MailTransport,
    settings: &AutomationSettings,
    user: &user::Model,
    rule: &auto_reply_rule::Model,
    email: &inbound_email::Model,
) -> AppResult<DispatchOutcome> {
    let view = EmailView::from(email);

    if let Some(reason) = super::safety::suppression_reason(&settings.safety, view.sender, view.subject)
    {
        if !InboundEmailCtrl::claim_processed(conn, email.id).await? {
            tracing::debug!("Email {} already claimed, skipping", email.id);
            return Ok(DispatchOutcome::Skipped("already processed".to_string()));
        }
        AutomationLogCtrl::append(
            conn,
            user.id,
            AppendLogEntry {
                rule_id: Some(rule.id),
                task_id: None,
                email_id: Some(email.id),
                outcome: AutomationOutcome::Skipped,
                message: Some(reason.clone()),
            },
        )
        .await?;
        return Ok(DispatchOutcome::Skipped(reason));
    }

    let Some(access_token) = user.access_token.as_deref() else {
        return Ok(DispatchOutcome::Skipped(
            "user has no mail access".to_string(),
        ));
    };

    // Claim before sending. Losing the race here is a safe no-op.
    if !InboundEmailCtrl::claim_processed(conn, email.id).await? {
        tracing::debug!("Email {} already claimed, skipping", email.id);
        return Ok(DispatchOutcome::Skipped("already processed".to_string()));
    }

    let send_result = attempt_send(transport, settings, access_token, user, rule, email).await;

    match send_result {
        Ok(()) => {
            AutomationLogCtrl::append(
                conn,
                user.id,
                AppendLogEntry {
                    rule_id: Some(rule.id),
                    task_id: None,
                    email_id: Some(email.id),
                    outcome: AutomationOutcome::Sent,
                    message: None,
                },
            )
            .await?;
            Ok(DispatchOutcome::Sent)
        }
        Err(error) => {
            tracing::warn!(
                "Auto reply for email {} (rule {}) failed: {}",
                email.id,
                rule.id,
                error
            );
            AutomationLogCtrl::append(
                conn,
                user.id,
                AppendLogEntry {
                    rule_id: Some(rule.id),
                    task_id: None,
                    email_id: Some(email.id),
                    outcome: AutomationOutcome::Failed,
                    message: Some(error.clone()),
                },
            )
            .await?;
            Ok(DispatchOutcome::Failed(error))
        }
    }
}

async fn attempt_send(
    transport: &dyn MailTransport,
    settings: &AutomationSettings,
    access_token: &str,
    user: &user::Model,
    rule: &auto_reply_rule::Model,
    email: &inbound_email::Model,
) -> Result<(), String> {
    let view = EmailView::from(email);

    let body = template::render_reply(&rule.reply_body, &view, &user.email)
        .map_err(|e| format!("template render failed: {e}"))?;
    let (_, sender_address) = template::split_sender(view.sender);
    let subject = rule
        .reply_subject
        .clone()
        .unwrap_or_else(|| email.subject.clone());

    let message = compose::build_reply(
        &user.email,
        &sender_address,
        &subject,
        &body,
        &ReplyContext {
            in_reply_to: None,
            references: None,
            thread_id: email.thread_id.clone(),
        },
    )
    .map_err(|e| e.to_string())?;

    let mut attempt = 0;
    loop {
        match transport
            .send(access_token, &message, email.thread_id.as_deref())
            .await
        {
            Ok(_) => return Ok(()),
            Err(SendError::Permanent(msg)) => return Err(msg),
            Err(SendError::Transient(msg)) => {
                attempt += 1;
                if attempt >= settings.max_send_attempts {
                    return Err(format!(
                        "retries exhausted after {} attempts: {}",
                        attempt, msg
                    ));
                }
                let delay =
                    backoff_delay_secs(settings.backoff_base_secs, settings.backoff_cap_secs, attempt - 1);
                tracing::info!(
                    "Transient send failure for email {}, retrying in {}s: {}",
                    email.id,
                    delay,
                    msg
                );
                tokio::time::sleep(Duration::from_secs(delay as u64)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    use super::*;
    use crate::mail::transport::SendError;
    use crate::testing::common::{
        test_email, test_log_entry, test_rule, test_settings, test_user, StubTransport,
    };

    fn contains_condition() -> serde_json::Value {
        json!([{"field": "subject", "operator": "contains", "value": "invoice"}])
    }

    #[tokio::test]
    async fn test_dispatch_sends_reply_and_logs_sent() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_log_entry(1, 1, AutomationOutcome::Sent)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let transport = StubTransport::succeeding();
        let user = test_user(1, "me@example.com", true);
        let rule = test_rule(3, 1, contains_condition());
        let email = test_email(9, 1, "Jane Doe <jane@example.com>", "Invoice 42");

        let outcome = dispatch(&conn, transport.as_ref(), &test_settings(), &user, &rule, &email)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent);
        assert_eq!(transport.send_count(), 1);

        let sends = transport.sends.lock().unwrap();
        assert!(sends[0].formatted.contains("To: jane@example.com"));
        assert!(sends[0].formatted.contains("Subject: Re: Invoice 42"));
        assert!(sends[0].formatted.contains("Thanks Jane Doe, got it."));
    }

    #[tokio::test]
    async fn test_dispatch_skips_already_processed_email() {
        // The compare-and-set on the processed flag matches zero rows, so a
        // concurrent dispatch already owns this email.
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let transport = StubTransport::succeeding();
        let user = test_user(1, "me@example.com", true);
        let rule = test_rule(3, 1, contains_condition());
        let email = test_email(9, 1, "jane@example.com", "Invoice 42");

        let outcome = dispatch(&conn, transport.as_ref(), &test_settings(), &user, &rule, &email)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Skipped("already processed".to_string())
        );
        assert_eq!(transport.send_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_retries_transient_failures() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_log_entry(1, 1, AutomationOutcome::Sent)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let transport = StubTransport::with_results(vec![
            Err(SendError::Transient("mail provider hiccup".to_string())),
            Ok(Default::default()),
        ]);
        let user = test_user(1, "me@example.com", true);
        let rule = test_rule(3, 1, contains_condition());
        let email = test_email(9, 1, "jane@example.com", "Invoice 42");

        let outcome = dispatch(&conn, transport.as_ref(), &test_settings(), &user, &rule, &email)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent);
        assert_eq!(transport.send_count(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_permanent_failure_does_not_retry() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_log_entry(1, 1, AutomationOutcome::Failed)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let transport = StubTransport::with_results(vec![Err(SendError::Permanent(
            "invalid recipient".to_string(),
        ))]);
        let user = test_user(1, "me@example.com", true);
        let rule = test_rule(3, 1, contains_condition());
        let email = test_email(9, 1, "jane@example.com", "Invoice 42");

        let outcome = dispatch(&conn, transport.as_ref(), &test_settings(), &user, &rule, &email)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Failed("invalid recipient".to_string())
        );
        assert_eq!(transport.send_count(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_suppresses_machine_senders() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_log_entry(1, 1, AutomationOutcome::Skipped)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let transport = StubTransport::succeeding();
        let user = test_user(1, "me@example.com", true);
        let rule = test_rule(3, 1, contains_condition());
        let email = test_email(9, 1, "no-reply@shop.com", "Invoice 42");

        let outcome = dispatch(&conn, transport.as_ref(), &test_settings(), &user, &rule, &email)
            .await
            .unwrap();

        assert!(matches!(outcome, DispatchOutcome::Skipped(_)));
        assert_eq!(transport.send_count(), 0);
    }
}
