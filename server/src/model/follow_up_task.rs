use anyhow::Context;

use crate::{
    db_core::prelude::*,
    error::{AppError, AppResult},
};

pub struct FollowUpTaskCtrl;

pub struct CreateFollowUpTask {
    pub email_id: Option<i32>,
    pub thread_id: Option<String>,
    pub recipient: String,
    pub subject: String,
    pub content: String,
    pub due_at: DateTimeWithTimeZone,
}

impl FollowUpTaskCtrl {
    pub async fn create(
        conn: &DatabaseConnection,
        user_id: i32,
        task: CreateFollowUpTask,
    ) -> AppResult<follow_up_task::Model> {
        if task.recipient.trim().is_empty() {
            return Err(AppError::BadRequest("Recipient is required".to_string()));
        }

        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        let active_model = follow_up_task::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(user_id),
            email_id: ActiveValue::Set(task.email_id),
            thread_id: ActiveValue::Set(task.thread_id),
            recipient: ActiveValue::Set(task.recipient),
            subject: ActiveValue::Set(task.subject),
            content: ActiveValue::Set(task.content),
            due_at: ActiveValue::Set(task.due_at),
            status: ActiveValue::Set(FollowUpStatus::Pending),
            retry_count: ActiveValue::Set(0),
            next_attempt_at: ActiveValue::Set(task.due_at),
            last_error: ActiveValue::Set(None),
            sent_at: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        let created = FollowUpTask::insert(active_model)
            .exec_with_returning(conn)
            .await
            .context("Error creating follow up task")?;

        Ok(created)
    }

    pub async fn get_by_id(
        conn: &DatabaseConnection,
        user_id: i32,
        task_id: i32,
    ) -> AppResult<follow_up_task::Model> {
        let task = FollowUpTask::find_by_id(task_id)
            .filter(follow_up_task::Column::UserId.eq(user_id))
            .one(conn)
            .await
            .context("Error fetching follow up task")?
            .ok_or(AppError::NotFound("Follow up task not found".to_string()))?;

        Ok(task)
    }

    pub async fn all_for_user(
        conn: &DatabaseConnection,
        user_id: i32,
    ) -> AppResult<Vec<follow_up_task::Model>> {
        let tasks = FollowUpTask::find()
            .filter(follow_up_task::Column::UserId.eq(user_id))
            .order_by_asc(follow_up_task::Column::DueAt)
            .all(conn)
            .await
            .context("Error fetching follow up tasks")?;

        Ok(tasks)
    }

    /// Tasks eligible for this tick: pending, due, and past their retry
    /// backoff window. Ordered by due timestamp ascending.
    pub async fn due_pending(
        conn: &DatabaseConnection,
        now: DateTimeWithTimeZone,
    ) -> AppResult<Vec<follow_up_task::Model>> {
        let tasks = FollowUpTask::find()
            .filter(follow_up_task::Column::Status.eq(FollowUpStatus::Pending))
            .filter(follow_up_task::Column::DueAt.lte(now))
            .filter(follow_up_task::Column::NextAttemptAt.lte(now))
            .order_by_asc(follow_up_task::Column::DueAt)
            .all(conn)
            .await
            .context("Error fetching due follow up tasks")?;

        Ok(tasks)
    }

    /// Conditional pending -> sent transition, claiming the task before the
    /// send goes out. Returns false when the task was cancelled or claimed by
    /// an overlapping tick in the meantime.
    pub async fn claim_for_send(conn: &DatabaseConnection, task_id: i32) -> AppResult<bool> {
        let result = FollowUpTask::update_many()
            .col_expr(
                follow_up_task::Column::Status,
                Expr::value(FollowUpStatus::Sent),
            )
            .col_expr(
                follow_up_task::Column::UpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(chrono::Utc::now())),
            )
            .filter(follow_up_task::Column::Id.eq(task_id))
            .filter(follow_up_task::Column::Status.eq(FollowUpStatus::Pending))
            .exec(conn)
            .await
            .context("Error claiming follow up task")?;

        Ok(result.rows_affected == 1)
    }

    pub async fn mark_sent(conn: &DatabaseConnection, task_id: i32) -> AppResult<()> {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        FollowUpTask::update_many()
            .col_expr(follow_up_task::Column::SentAt, Expr::value(Some(now)))
            .col_expr(follow_up_task::Column::UpdatedAt, Expr::value(now))
            .filter(follow_up_task::Column::Id.eq(task_id))
            .filter(follow_up_task::Column::Status.eq(FollowUpStatus::Sent))
            .exec(conn)
            .await
            .context("Error marking follow up task sent")?;

        Ok(())
    }

    /// Releases a claimed task back to pending after a transient failure,
    /// recording the retry and the next eligible attempt time.
    pub async fn release_for_retry(
        conn: &DatabaseConnection,
        task_id: i32,
        retry_count: i32,
        next_attempt_at: DateTimeWithTimeZone,
        error: &str,
    ) -> AppResult<()> {
        FollowUpTask::update_many()
            .col_expr(
                follow_up_task::Column::Status,
                Expr::value(FollowUpStatus::Pending),
            )
            .col_expr(
                follow_up_task::Column::RetryCount,
                Expr::value(retry_count),
            )
            .col_expr(
                follow_up_task::Column::NextAttemptAt,
                Expr::value(next_attempt_at),
            )
            .col_expr(
                follow_up_task::Column::LastError,
                Expr::value(Some(error.to_string())),
            )
            .col_expr(
                follow_up_task::Column::UpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(chrono::Utc::now())),
            )
            .filter(follow_up_task::Column::Id.eq(task_id))
            .filter(follow_up_task::Column::Status.eq(FollowUpStatus::Sent))
            .exec(conn)
            .await
            .context("Error releasing follow up task for retry")?;

        Ok(())
    }

    pub async fn mark_failed(
        conn: &DatabaseConnection,
        task_id: i32,
        retry_count: i32,
        error: &str,
    ) -> AppResult<()> {
        FollowUpTask::update_many()
            .col_expr(
                follow_up_task::Column::Status,
                Expr::value(FollowUpStatus::Failed),
            )
            .col_expr(
                follow_up_task::Column::RetryCount,
                Expr::value(retry_count),
            )
            .col_expr(
                follow_up_task::Column::LastError,
                Expr::value(Some(error.to_string())),
            )
            .col_expr(
                follow_up_task::Column::UpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(chrono::Utc::now())),
            )
            .filter(follow_up_task::Column::Id.eq(task_id))
            .exec(conn)
            .await
            .context("Error marking follow up task failed")?;

        Ok(())
    }

    /// Conditional pending -> cancelled transition. Returns false when the
    /// task already reached a terminal status or is mid-send.
    pub async fn cancel(
        conn: &DatabaseConnection,
        user_id: i32,
        task_id: i32,
    ) -> AppResult<bool> {
        let result = FollowUpTask::update_many()
            .col_expr(
                follow_up_task::Column::Status,
                Expr::value(FollowUpStatus::Cancelled),
            )
            .col_expr(
                follow_up_task::Column::UpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(chrono::Utc::now())),
            )
            .filter(follow_up_task::Column::Id.eq(task_id))
            .filter(follow_up_task::Column::UserId.eq(user_id))
            .filter(follow_up_task::Column::Status.eq(FollowUpStatus::Pending))
            .exec(conn)
            .await
            .context("Error cancelling follow up task")?;

        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    use super::*;

    #[tokio::test]
    async fn test_due_pending_selects_on_due_and_backoff_windows() {
        // A task due in the future, or still inside its retry backoff window,
        // must not be picked up by the driver. The selection pushes both
        // bounds into the query rather than filtering in memory.
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<follow_up_task::Model>::new()])
            .into_connection();

        FollowUpTaskCtrl::due_pending(&conn, Utc::now().into())
            .await
            .unwrap();

        // Statement SQL shows up quote-escaped in the log's debug output.
        let log = format!("{:?}", conn.into_transaction_log());
        assert!(log.contains(r#"\"follow_up_task\".\"due_at\" <= "#), "{log}");
        assert!(
            log.contains(r#"\"follow_up_task\".\"next_attempt_at\" <= "#),
            "{log}"
        );
        assert!(log.contains(r#"\"follow_up_task\".\"status\" = "#), "{log}");
        assert!(
            log.contains(r#"ORDER BY \"follow_up_task\".\"due_at\" ASC"#),
            "{log}"
        );
    }
}
