use axum::{
    extract::{Path, Query, State},
    Json,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use entity::automation_log;

use crate::{error::AppJsonResult, model::automation_log::AutomationLogCtrl};

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 200;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// # GET /users/:user_id/automation/log
pub async fn list(
    State(conn): State<DatabaseConnection>,
    Path(user_id): Path<i32>,
    Query(query): Query<LogQuery>,
) -> AppJsonResult<Vec<automation_log::Model>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let entries = AutomationLogCtrl::list_for_user(&conn, user_id, limit, offset).await?;

    Ok(Json(entries))
}
