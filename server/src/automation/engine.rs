use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};

use crate::{
    db_core::prelude::*,
    error::AppResult,
    mail::{
        compose,
        transport::{MailTransport, SendError},
    },
    model::{
        auto_reply_rule::AutoReplyRuleCtrl,
        automation_log::{AppendLogEntry, AutomationLogCtrl},
        follow_up_task::{CreateFollowUpTask, FollowUpTaskCtrl},
        inbound_email::InboundEmailCtrl,
        user::UserCtrl,
    },
    rate_limiters::RateLimiters,
};

use super::{backoff_delay_secs, dispatcher, matcher, AutomationSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Sent,
    Retrying,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub task_id: i32,
    pub outcome: TaskOutcome,
}

/// Process-wide automation state: rule matching over inbound mail and the
/// follow up task driver. Constructed once at startup and shared behind
/// cheap clones.
#[derive(Clone)]
pub struct AutomationEngine {
    conn: DatabaseConnection,
    transport: Arc<dyn MailTransport>,
    rate_limiters: RateLimiters,
    settings: AutomationSettings,
}

impl AutomationEngine {
    pub fn new(
        conn: DatabaseConnection,
        transport: Arc<dyn MailTransport>,
        rate_limiters: RateLimiters,
        settings: AutomationSettings,
    ) -> Self {
        Self {
            conn,
            transport,
            rate_limiters,
            settings,
        }
    }

    /// Startup hook: surfaces the workload the engine is resuming with.
    pub async fn init(&self) -> AppResult<()> {
        let enabled_rules = AutoReplyRule::find()
            .filter(auto_reply_rule::Column::IsEnabled.eq(true))
            .count(&self.conn)
            .await?;
        let pending_tasks = FollowUpTask::find()
            .filter(follow_up_task::Column::Status.eq(FollowUpStatus::Pending))
            .count(&self.conn)
            .await?;

        tracing::info!(
            "Automation engine ready: {} enabled rules, {} pending follow ups",
            enabled_rules,
            pending_tasks
        );

        Ok(())
    }

    /// Teardown hook. Log appends are written synchronously, so there is
    /// nothing to flush beyond announcing the stop.
    pub async fn shutdown(&self) {
        tracing::info!("Automation engine shutting down");
    }

    pub fn evaluate<'a>(
        &self,
        rules: &'a [auto_reply_rule::Model],
        email: &matcher::EmailView,
    ) -> Option<&'a auto_reply_rule::Model> {
        matcher::evaluate(rules, email)
    }

    /// One pass of the auto reply sweep across every user with mail access.
    pub async fn run_reply_sweep(&self) -> AppResult<()> {
        let users = UserCtrl::all_with_mail_access(&self.conn).await?;
        tracing::info!("Running reply sweep for {} users", users.len());

        for user in &users {
            if let Err(e) = self.process_user_emails(user).await {
                tracing::error!("Reply sweep failed for user {}: {:?}", user.email, e);
            }
        }

        Ok(())
    }

    /// Matches each unprocessed email against the user's enabled rules and
    /// dispatches the winning rule, with bounded send concurrency.
    pub async fn process_user_emails(&self, user: &user::Model) -> AppResult<()> {
        let rules = AutoReplyRuleCtrl::all_enabled_for_user(&self.conn, user.id).await?;
        if rules.is_empty() {
            return Ok(());
        }

        let cutoff = (Utc::now() - Duration::days(self.settings.email_max_age_days)).into();
        let emails = InboundEmailCtrl::unprocessed_for_user(&self.conn, user.id, cutoff).await?;
        if emails.is_empty() {
            return Ok(());
        }

        let rules = &rules;
        stream::iter(emails)
            .for_each_concurrent(self.settings.max_concurrent_sends, |email| async move {
                let view = matcher::EmailView::from(&email);
                match matcher::evaluate(rules, &view) {
                    Some(rule) => {
                        self.rate_limiters.acquire_one().await;
                        match dispatcher::dispatch(
                            &self.conn,
                            self.transport.as_ref(),
                            &self.settings,
                            user,
                            rule,
                            &email,
                        )
                        .await
                        {
                            Ok(outcome) => {
                                tracing::debug!(
                                    "Dispatched email {} via rule {}: {:?}",
                                    email.id,
                                    rule.id,
                                    outcome
                                );
                            }
                            Err(e) => {
                                tracing::error!("Dispatch failed for email {}: {:?}", email.id, e);
                            }
                        }
                    }
                    None => {
                        // No rule fired; close the email out so the next
                        // sweep does not re-evaluate it.
                        if let Err(e) =
                            InboundEmailCtrl::claim_processed(&self.conn, email.id).await
                        {
                            tracing::error!("Failed to close out email {}: {:?}", email.id, e);
                        }
                    }
                }
            })
            .await;

        Ok(())
    }

    pub async fn schedule_follow_up(
        &self,
        user_id: i32,
        task: CreateFollowUpTask,
    ) -> AppResult<follow_up_task::Model> {
        let created = FollowUpTaskCtrl::create(&self.conn, user_id, task).await?;
        tracing::info!(
            "Scheduled follow up {} for user {} due at {}",
            created.id,
            user_id,
            created.due_at
        );

        Ok(created)
    }

    /// Cancels a pending follow up. Returns false when the task already
    /// reached a terminal status or is mid-send in an overlapping tick.
    pub async fn cancel_follow_up(&self, user_id: i32, task_id: i32) -> AppResult<bool> {
        let cancelled = FollowUpTaskCtrl::cancel(&self.conn, user_id, task_id).await?;
        if cancelled {
            AutomationLogCtrl::append(
                &self.conn,
                user_id,
                AppendLogEntry {
                    rule_id: None,
                    task_id: Some(task_id),
                    email_id: None,
                    outcome: AutomationOutcome::Cancelled,
                    message: None,
                },
            )
            .await?;
        }

        Ok(cancelled)
    }

    /// One driver invocation: selects every pending task due at `now` and
    /// executes the due set to completion with bounded concurrency. Safe to
    /// overlap with other ticks; the conditional status claim keeps each
    /// task's send at most once.
    pub async fn tick(&self, now: DateTimeWithTimeZone) -> AppResult<Vec<TickOutcome>> {
        let due = FollowUpTaskCtrl::due_pending(&self.conn, now).await?;
        if due.is_empty() {
            return Ok(vec![]);
        }

        tracing::info!("Tick: {} follow up tasks due", due.len());

        let outcomes = stream::iter(due)
            .map(|task| {
                let task_id = task.id;
                async move {
                    match self.execute_due_task(task, now).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::error!("Follow up task {} errored: {:?}", task_id, e);
                            TickOutcome {
                                task_id,
                                outcome: TaskOutcome::Skipped,
                            }
                        }
                    }
                }
            })
            .buffer_unordered(self.settings.max_concurrent_sends)
            .collect::<Vec<_>>()
            .await;

        Ok(outcomes)
    }

    async fn execute_due_task(
        &self,
        task: follow_up_task::Model,
        now: DateTimeWithTimeZone,
    ) -> AppResult<TickOutcome> {
        // Claim the task before sending. A cancellation or an overlapping
        // tick that got here first makes this a no-op.
        if !FollowUpTaskCtrl::claim_for_send(&self.conn, task.id).await? {
            tracing::debug!("Follow up task {} no longer pending, skipping", task.id);
            return Ok(TickOutcome {
                task_id: task.id,
                outcome: TaskOutcome::Skipped,
            });
        }

        let user = UserCtrl::get_by_id(&self.conn, task.user_id).await?;
        let Some(access_token) = user.access_token.as_deref() else {
            let error = "user has no mail access";
            FollowUpTaskCtrl::mark_failed(&self.conn, task.id, task.retry_count, error).await?;
            self.log_task_outcome(&task, AutomationOutcome::Failed, Some(error.to_string()))
                .await?;
            return Ok(TickOutcome {
                task_id: task.id,
                outcome: TaskOutcome::Failed,
            });
        };

        let message =
            match compose::build_follow_up(&user.email, &task.recipient, &task.subject, &task.content)
            {
                Ok(message) => message,
                Err(e) => {
                    let error = e.to_string();
                    FollowUpTaskCtrl::mark_failed(&self.conn, task.id, task.retry_count, &error)
                        .await?;
                    self.log_task_outcome(&task, AutomationOutcome::Failed, Some(error)).await?;
                    return Ok(TickOutcome {
                        task_id: task.id,
                        outcome: TaskOutcome::Failed,
                    });
                }
            };

        self.rate_limiters.acquire_one().await;

        match self
            .transport
            .send(access_token, &message, task.thread_id.as_deref())
            .await
        {
            Ok(_) => {
                FollowUpTaskCtrl::mark_sent(&self.conn, task.id).await?;
                self.log_task_outcome(&task, AutomationOutcome::Sent, None).await?;
                Ok(TickOutcome {
                    task_id: task.id,
                    outcome: TaskOutcome::Sent,
                })
            }
            Err(SendError::Transient(msg)) => {
                let retry_count = task.retry_count + 1;
                if retry_count >= self.settings.max_send_attempts {
                    let error = format!("retries exhausted after {} attempts: {}", retry_count, msg);
                    FollowUpTaskCtrl::mark_failed(&self.conn, task.id, retry_count, &error).await?;
                    self.log_task_outcome(&task, AutomationOutcome::Failed, Some(error)).await?;
                    Ok(TickOutcome {
                        task_id: task.id,
                        outcome: TaskOutcome::Failed,
                    })
                } else {
                    let delay = backoff_delay_secs(
                        self.settings.backoff_base_secs,
                        self.settings.backoff_cap_secs,
                        task.retry_count,
                    );
                    let next_attempt_at = now + Duration::seconds(delay);
                    FollowUpTaskCtrl::release_for_retry(
                        &self.conn,
                        task.id,
                        retry_count,
                        next_attempt_at,
                        &msg,
                    )
                    .await?;
                    self.log_task_outcome(
                        &task,
                        AutomationOutcome::Failed,
                        Some(format!(
                            "transient failure (attempt {} of {}), retrying: {}",
                            retry_count, self.settings.max_send_attempts, msg
                        )),
                    )
                    .await?;
                    Ok(TickOutcome {
                        task_id: task.id,
                        outcome: TaskOutcome::Retrying,
                    })
                }
            }
            Err(SendError::Permanent(msg)) => {
                FollowUpTaskCtrl::mark_failed(&self.conn, task.id, task.retry_count, &msg).await?;
                self.log_task_outcome(&task, AutomationOutcome::Failed, Some(msg)).await?;
                Ok(TickOutcome {
                    task_id: task.id,
                    outcome: TaskOutcome::Failed,
                })
            }
        }
    }

    async fn log_task_outcome(
        &self,
        task: &follow_up_task::Model,
        outcome: AutomationOutcome,
        message: Option<String>,
    ) -> AppResult<()> {
        AutomationLogCtrl::append(
            &self.conn,
            task.user_id,
            AppendLogEntry {
                rule_id: None,
                task_id: Some(task.id),
                email_id: task.email_id,
                outcome,
                message,
            },
        )
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;
    use crate::mail::transport::{SendError, SendReceipt};
    use crate::rate_limiters::RateLimiters;
    use crate::testing::common::{
        test_log_entry, test_settings, test_task, test_user, StubTransport,
    };

    fn engine(conn: DatabaseConnection, transport: Arc<StubTransport>) -> AutomationEngine {
        AutomationEngine::new(
            conn,
            transport,
            RateLimiters::new(100, 10, 100),
            test_settings(),
        )
    }

    #[tokio::test]
    async fn test_tick_with_nothing_due_is_a_no_op() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<follow_up_task::Model>::new()])
            .into_connection();
        let transport = StubTransport::succeeding();

        let outcomes = engine(conn, transport.clone()).tick(Utc::now().into()).await.unwrap();

        assert!(outcomes.is_empty());
        assert_eq!(transport.send_count(), 0);
    }

    #[tokio::test]
    async fn test_tick_sends_due_task() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_task(7, 1, 0)]])
            .append_query_results([vec![test_user(1, "me@example.com", true)]])
            .append_query_results([vec![test_log_entry(1, 1, AutomationOutcome::Sent)]])
            .append_exec_results([
                // claim pending -> sent
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                // sent_at stamp
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();
        let transport = StubTransport::succeeding();

        let outcomes = engine(conn, transport.clone()).tick(Utc::now().into()).await.unwrap();

        assert_eq!(
            outcomes,
            vec![TickOutcome {
                task_id: 7,
                outcome: TaskOutcome::Sent
            }]
        );
        assert_eq!(transport.send_count(), 1);

        let sends = transport.sends.lock().unwrap();
        assert_eq!(sends[0].access_token, "test-token");
        assert!(sends[0].formatted.contains("To: client@example.com"));
        assert!(sends[0].formatted.contains("Subject: Checking in"));
    }

    #[tokio::test]
    async fn test_tick_skips_task_claimed_elsewhere() {
        // Claim update matches zero rows: the task was cancelled or another
        // tick got there first. No send may happen.
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_task(7, 1, 0)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let transport = StubTransport::succeeding();

        let outcomes = engine(conn, transport.clone()).tick(Utc::now().into()).await.unwrap();

        assert_eq!(
            outcomes,
            vec![TickOutcome {
                task_id: 7,
                outcome: TaskOutcome::Skipped
            }]
        );
        assert_eq!(transport.send_count(), 0);
    }

    #[tokio::test]
    async fn test_tick_transient_failure_releases_for_retry() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_task(7, 1, 0)]])
            .append_query_results([vec![test_user(1, "me@example.com", true)]])
            .append_query_results([vec![test_log_entry(1, 1, AutomationOutcome::Failed)]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                // revert sent -> pending with retry bookkeeping
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();
        let transport = StubTransport::with_results(vec![Err(SendError::Transient(
            "mail provider hiccup".to_string(),
        ))]);

        let outcomes = engine(conn, transport.clone()).tick(Utc::now().into()).await.unwrap();

        assert_eq!(
            outcomes,
            vec![TickOutcome {
                task_id: 7,
                outcome: TaskOutcome::Retrying
            }]
        );
        assert_eq!(transport.send_count(), 1);
    }

    #[tokio::test]
    async fn test_tick_exhausted_retries_mark_failed() {
        // retry_count is already at max - 1, so one more transient failure
        // makes the task terminal.
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_task(7, 1, 2)]])
            .append_query_results([vec![test_user(1, "me@example.com", true)]])
            .append_query_results([vec![test_log_entry(1, 1, AutomationOutcome::Failed)]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();
        let transport = StubTransport::with_results(vec![Err(SendError::Transient(
            "mail provider hiccup".to_string(),
        ))]);

        let outcomes = engine(conn, transport.clone()).tick(Utc::now().into()).await.unwrap();

        assert_eq!(
            outcomes,
            vec![TickOutcome {
                task_id: 7,
                outcome: TaskOutcome::Failed
            }]
        );
    }

    #[tokio::test]
    async fn test_tick_permanent_failure_marks_failed_without_retry() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_task(7, 1, 0)]])
            .append_query_results([vec![test_user(1, "me@example.com", true)]])
            .append_query_results([vec![test_log_entry(1, 1, AutomationOutcome::Failed)]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();
        let transport = StubTransport::with_results(vec![Err(SendError::Permanent(
            "invalid recipient".to_string(),
        ))]);

        let outcomes = engine(conn, transport.clone()).tick(Utc::now().into()).await.unwrap();

        assert_eq!(
            outcomes,
            vec![TickOutcome {
                task_id: 7,
                outcome: TaskOutcome::Failed
            }]
        );
        assert_eq!(transport.send_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_follow_up_reports_missed_cancel() {
        // Task already terminal: the conditional update matches nothing and
        // no log entry is appended.
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let transport = StubTransport::succeeding();

        let cancelled = engine(conn, transport).cancel_follow_up(1, 7).await.unwrap();

        assert!(!cancelled);
    }

    #[tokio::test]
    async fn test_cancel_follow_up_logs_cancellation() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![test_log_entry(1, 1, AutomationOutcome::Cancelled)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let transport = StubTransport::succeeding();

        let cancelled = engine(conn, transport).cancel_follow_up(1, 7).await.unwrap();

        assert!(cancelled);
    }
}
