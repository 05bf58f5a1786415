use axum::{
    extract::{Path, State},
    Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use entity::follow_up_task;

use crate::{
    automation::engine::AutomationEngine,
    db_core::prelude::DateTimeWithTimeZone,
    error::AppJsonResult,
    model::{
        follow_up_task::{CreateFollowUpTask, FollowUpTaskCtrl},
        user::UserCtrl,
    },
};

/// # GET /users/:user_id/follow_ups
pub async fn list(
    State(conn): State<DatabaseConnection>,
    Path(user_id): Path<i32>,
) -> AppJsonResult<Vec<follow_up_task::Model>> {
    let tasks = FollowUpTaskCtrl::all_for_user(&conn, user_id).await?;

    Ok(Json(tasks))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleFollowUpBody {
    pub email_id: Option<i32>,
    pub thread_id: Option<String>,
    pub recipient: String,
    pub subject: String,
    pub content: String,
    pub due_at: DateTimeWithTimeZone,
}

/// # POST /users/:user_id/follow_ups
pub async fn schedule(
    State(conn): State<DatabaseConnection>,
    State(engine): State<AutomationEngine>,
    Path(user_id): Path<i32>,
    Json(body): Json<ScheduleFollowUpBody>,
) -> AppJsonResult<follow_up_task::Model> {
    let user = UserCtrl::get_by_id(&conn, user_id).await?;

    let task = engine
        .schedule_follow_up(
            user.id,
            CreateFollowUpTask {
                email_id: body.email_id,
                thread_id: body.thread_id,
                recipient: body.recipient,
                subject: body.subject,
                content: body.content,
                due_at: body.due_at,
            },
        )
        .await?;

    Ok(Json(task))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelFollowUpResponse {
    pub cancelled: bool,
}

/// # POST /users/:user_id/follow_ups/:task_id/cancel
///
/// Returns `cancelled: false` when the task already reached a terminal
/// status, including a send that won the race.
pub async fn cancel(
    State(conn): State<DatabaseConnection>,
    State(engine): State<AutomationEngine>,
    Path((user_id, task_id)): Path<(i32, i32)>,
) -> AppJsonResult<CancelFollowUpResponse> {
    // 404 for unknown tasks, a plain false for terminal ones.
    FollowUpTaskCtrl::get_by_id(&conn, user_id, task_id).await?;

    let cancelled = engine.cancel_follow_up(user_id, task_id).await?;

    Ok(Json(CancelFollowUpResponse { cancelled }))
}
