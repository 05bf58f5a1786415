use axum::{
    extract::{Path, State},
    Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::{
    db_core::prelude::DateTimeWithTimeZone,
    error::AppJsonResult,
    model::{
        inbound_email::{CreateInboundEmail, InboundEmailCtrl},
        user::UserCtrl,
    },
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestEmailBody {
    pub gmail_id: String,
    pub thread_id: Option<String>,
    pub sender: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub received_at: DateTimeWithTimeZone,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestBody {
    pub emails: Vec<IngestEmailBody>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    /// Batch size as received; duplicates inside it are dropped by the
    /// upsert without being counted separately.
    pub received: usize,
}

/// # POST /users/:user_id/emails
///
/// Ingests a batch of synced inbound messages. Duplicates (same gmail id)
/// are skipped silently; the automation sweep picks new ones up on its next
/// pass.
pub async fn ingest(
    State(conn): State<DatabaseConnection>,
    Path(user_id): Path<i32>,
    Json(body): Json<IngestBody>,
) -> AppJsonResult<IngestResponse> {
    let user = UserCtrl::get_by_id(&conn, user_id).await?;

    let received = body.emails.len();
    let emails = body
        .emails
        .into_iter()
        .map(|email| CreateInboundEmail {
            gmail_id: email.gmail_id,
            thread_id: email.thread_id,
            sender: email.sender,
            subject: email.subject,
            body_text: email.body_text,
            received_at: email.received_at,
        })
        .collect();

    InboundEmailCtrl::insert_many(&conn, user.id, emails).await?;
    UserCtrl::set_last_email_sync_at(&conn, user.id, chrono::Utc::now().into()).await?;

    Ok(Json(IngestResponse { received }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetriggerResponse {
    pub reset: bool,
}

/// # POST /users/:user_id/emails/:email_id/retrigger
///
/// Manual re-trigger after a failed dispatch: reopens the processed flag so
/// the next sweep evaluates the email again.
pub async fn retrigger(
    State(conn): State<DatabaseConnection>,
    Path((user_id, email_id)): Path<(i32, i32)>,
) -> AppJsonResult<RetriggerResponse> {
    InboundEmailCtrl::get_by_id(&conn, user_id, email_id).await?;

    let reset = InboundEmailCtrl::reset_processed(&conn, user_id, email_id).await?;

    Ok(Json(RetriggerResponse { reset }))
}
