use anyhow::Context;
use sea_orm::sea_query::OnConflict;

use crate::{
    db_core::prelude::*,
    error::{AppError, AppResult},
};

pub struct InboundEmailCtrl;

pub struct CreateInboundEmail {
    pub gmail_id: String,
    pub thread_id: Option<String>,
    pub sender: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub received_at: DateTimeWithTimeZone,
}

impl InboundEmailCtrl {
    /// Inserts newly synced messages, silently skipping ones already stored.
    pub async fn insert_many(
        conn: &DatabaseConnection,
        user_id: i32,
        emails: Vec<CreateInboundEmail>,
    ) -> AppResult<()> {
        if emails.is_empty() {
            return Ok(());
        }

        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        let models: Vec<inbound_email::ActiveModel> = emails
            .into_iter()
            .map(|email| inbound_email::ActiveModel {
                id: ActiveValue::NotSet,
                user_id: ActiveValue::Set(user_id),
                gmail_id: ActiveValue::Set(email.gmail_id),
                thread_id: ActiveValue::Set(email.thread_id),
                sender: ActiveValue::Set(email.sender),
                subject: ActiveValue::Set(email.subject),
                body_text: ActiveValue::Set(email.body_text),
                received_at: ActiveValue::Set(email.received_at),
                processed: ActiveValue::Set(false),
                processed_at: ActiveValue::Set(None),
                created_at: ActiveValue::Set(now),
            })
            .collect();

        InboundEmail::insert_many(models)
            .on_conflict(
                OnConflict::columns([
                    inbound_email::Column::UserId,
                    inbound_email::Column::GmailId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .do_nothing()
            .exec(conn)
            .await
            .context("Error inserting inbound emails")?;

        Ok(())
    }

    pub async fn get_by_id(
        conn: &DatabaseConnection,
        user_id: i32,
        email_id: i32,
    ) -> AppResult<inbound_email::Model> {
        let email = InboundEmail::find_by_id(email_id)
            .filter(inbound_email::Column::UserId.eq(user_id))
            .one(conn)
            .await
            .context("Error fetching inbound email")?
            .ok_or(AppError::NotFound("Email not found".to_string()))?;

        Ok(email)
    }

    pub async fn unprocessed_for_user(
        conn: &DatabaseConnection,
        user_id: i32,
        not_older_than: DateTimeWithTimeZone,
    ) -> AppResult<Vec<inbound_email::Model>> {
        let emails = InboundEmail::find()
            .filter(inbound_email::Column::UserId.eq(user_id))
            .filter(inbound_email::Column::Processed.eq(false))
            .filter(inbound_email::Column::ReceivedAt.gte(not_older_than))
            .order_by_asc(inbound_email::Column::ReceivedAt)
            .all(conn)
            .await
            .context("Error fetching unprocessed emails")?;

        Ok(emails)
    }

    /// Compare-and-set on the processed flag. Returns false when another
    /// caller already claimed this email, so at most one send can happen.
    pub async fn claim_processed(conn: &DatabaseConnection, email_id: i32) -> AppResult<bool> {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        let result = InboundEmail::update_many()
            .col_expr(inbound_email::Column::Processed, Expr::value(true))
            .col_expr(inbound_email::Column::ProcessedAt, Expr::value(Some(now)))
            .filter(inbound_email::Column::Id.eq(email_id))
            .filter(inbound_email::Column::Processed.eq(false))
            .exec(conn)
            .await
            .context("Error claiming inbound email")?;

        Ok(result.rows_affected == 1)
    }

    /// Manual re-trigger after a failed dispatch reopens the email for the
    /// next sweep.
    pub async fn reset_processed(
        conn: &DatabaseConnection,
        user_id: i32,
        email_id: i32,
    ) -> AppResult<bool> {
        let result = InboundEmail::update_many()
            .col_expr(inbound_email::Column::Processed, Expr::value(false))
            .col_expr(
                inbound_email::Column::ProcessedAt,
                Expr::value(None::<DateTimeWithTimeZone>),
            )
            .filter(inbound_email::Column::Id.eq(email_id))
            .filter(inbound_email::Column::UserId.eq(user_id))
            .filter(inbound_email::Column::Processed.eq(true))
            .exec(conn)
            .await
            .context("Error resetting inbound email")?;

        Ok(result.rows_affected == 1)
    }
}
