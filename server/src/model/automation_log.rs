use anyhow::Context;

use crate::{db_core::prelude::*, error::AppResult};

pub struct AutomationLogCtrl;

pub struct AppendLogEntry {
    pub rule_id: Option<i32>,
    pub task_id: Option<i32>,
    pub email_id: Option<i32>,
    pub outcome: AutomationOutcome,
    pub message: Option<String>,
}

impl AutomationLogCtrl {
    /// The log is append-only. Entries are never updated or deleted.
    pub async fn append(
        conn: &DatabaseConnection,
        user_id: i32,
        entry: AppendLogEntry,
    ) -> AppResult<automation_log::Model> {
        let active_model = automation_log::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(user_id),
            rule_id: ActiveValue::Set(entry.rule_id),
            task_id: ActiveValue::Set(entry.task_id),
            email_id: ActiveValue::Set(entry.email_id),
            outcome: ActiveValue::Set(entry.outcome),
            message: ActiveValue::Set(entry.message),
            created_at: ActiveValue::Set(chrono::Utc::now().into()),
        };

        let created = AutomationLog::insert(active_model)
            .exec_with_returning(conn)
            .await
            .context("Error appending automation log entry")?;

        Ok(created)
    }

    pub async fn list_for_user(
        conn: &DatabaseConnection,
        user_id: i32,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<automation_log::Model>> {
        let entries = AutomationLog::find()
            .filter(automation_log::Column::UserId.eq(user_id))
            .order_by_desc(automation_log::Column::CreatedAt)
            .order_by_desc(automation_log::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(conn)
            .await
            .context("Error fetching automation log")?;

        Ok(entries)
    }
}
