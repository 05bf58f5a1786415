use axum::{
    extract::{Path, State},
    Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use entity::auto_reply_rule;

use crate::{
    error::AppJsonResult,
    model::{
        auto_reply_rule::{AutoReplyRuleCtrl, CreateAutoReplyRule, UpdateAutoReplyRule},
        user::UserCtrl,
    },
};

/// # GET /users/:user_id/automation/rules
pub async fn list(
    State(conn): State<DatabaseConnection>,
    Path(user_id): Path<i32>,
) -> AppJsonResult<Vec<auto_reply_rule::Model>> {
    let rules = AutoReplyRuleCtrl::all_for_user(&conn, user_id).await?;

    Ok(Json(rules))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleBody {
    pub name: String,
    pub priority: i32,
    pub conditions: serde_json::Value,
    pub reply_subject: Option<String>,
    pub reply_body: String,
}

/// # POST /users/:user_id/automation/rules
pub async fn create(
    State(conn): State<DatabaseConnection>,
    Path(user_id): Path<i32>,
    Json(body): Json<CreateRuleBody>,
) -> AppJsonResult<auto_reply_rule::Model> {
    let user = UserCtrl::get_by_id(&conn, user_id).await?;

    let rule = AutoReplyRuleCtrl::create(
        &conn,
        user.id,
        CreateAutoReplyRule {
            name: body.name,
            priority: body.priority,
            conditions: body.conditions,
            reply_subject: body.reply_subject,
            reply_body: body.reply_body,
        },
    )
    .await?;

    Ok(Json(rule))
}

// Distinguishes an absent replySubject (keep) from an explicit null (clear).
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleBody {
    pub name: Option<String>,
    pub priority: Option<i32>,
    pub conditions: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "double_option")]
    pub reply_subject: Option<Option<String>>,
    pub reply_body: Option<String>,
}

/// # PUT /users/:user_id/automation/rules/:rule_id
pub async fn update(
    State(conn): State<DatabaseConnection>,
    Path((user_id, rule_id)): Path<(i32, i32)>,
    Json(body): Json<UpdateRuleBody>,
) -> AppJsonResult<auto_reply_rule::Model> {
    let rule = AutoReplyRuleCtrl::update(
        &conn,
        user_id,
        rule_id,
        UpdateAutoReplyRule {
            name: body.name,
            priority: body.priority,
            conditions: body.conditions,
            reply_subject: body.reply_subject,
            reply_body: body.reply_body,
        },
    )
    .await?;

    Ok(Json(rule))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRuleBody {
    pub is_enabled: bool,
}

/// # POST /users/:user_id/automation/rules/:rule_id/toggle
pub async fn toggle(
    State(conn): State<DatabaseConnection>,
    Path((user_id, rule_id)): Path<(i32, i32)>,
    Json(body): Json<ToggleRuleBody>,
) -> AppJsonResult<auto_reply_rule::Model> {
    let rule = AutoReplyRuleCtrl::set_enabled(&conn, user_id, rule_id, body.is_enabled).await?;

    Ok(Json(rule))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRuleResponse {
    pub deleted: bool,
}

/// # DELETE /users/:user_id/automation/rules/:rule_id
pub async fn delete(
    State(conn): State<DatabaseConnection>,
    Path((user_id, rule_id)): Path<(i32, i32)>,
) -> AppJsonResult<DeleteRuleResponse> {
    AutoReplyRuleCtrl::delete(&conn, user_id, rule_id).await?;

    Ok(Json(DeleteRuleResponse { deleted: true }))
}
