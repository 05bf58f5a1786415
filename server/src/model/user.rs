use anyhow::Context;

use crate::{
    db_core::prelude::*,
    error::{AppError, AppResult},
};

pub struct UserCtrl;

impl UserCtrl {
    pub async fn create(conn: &DatabaseConnection, email: &str) -> AppResult<user::Model> {
        let now = chrono::Utc::now().into();
        let active_model = user::ActiveModel {
            id: ActiveValue::NotSet,
            email: ActiveValue::Set(email.to_string()),
            display_name: ActiveValue::NotSet,
            access_token: ActiveValue::NotSet,
            last_email_sync_at: ActiveValue::NotSet,
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        let insert_result = User::insert(active_model).exec(conn).await;

        match insert_result {
            Ok(_) => {
                let user = Self::get_by_email(conn, email).await?;
                Ok(user)
            }
            Err(db_err)
                if matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
            {
                Self::get_by_email(conn, email).await
            }
            Err(e) => Err(e).context("Error creating user")?,
        }
    }

    pub async fn get_by_email(conn: &DatabaseConnection, email: &str) -> AppResult<user::Model> {
        let user = User::find()
            .filter(user::Column::Email.eq(email))
            .one(conn)
            .await
            .context("Error fetching user by email")?
            .ok_or(AppError::NotFound("User not found".to_string()))?;

        Ok(user)
    }

    pub async fn get_by_id(conn: &DatabaseConnection, user_id: i32) -> AppResult<user::Model> {
        let user = User::find_by_id(user_id)
            .one(conn)
            .await
            .context("Error fetching user by id")?
            .ok_or(AppError::NotFound("User not found".to_string()))?;

        Ok(user)
    }

    /// Users eligible for automation, i.e. those holding a mail access token.
    pub async fn all_with_mail_access(conn: &DatabaseConnection) -> AppResult<Vec<user::Model>> {
        let users = User::find()
            .filter(user::Column::AccessToken.is_not_null())
            .all(conn)
            .await
            .context("Error fetching users with mail access")?;

        Ok(users)
    }

    pub async fn set_last_email_sync_at(
        conn: &DatabaseConnection,
        user_id: i32,
        synced_at: DateTimeWithTimeZone,
    ) -> AppResult<()> {
        User::update(user::ActiveModel {
            id: ActiveValue::Set(user_id),
            last_email_sync_at: ActiveValue::Set(Some(synced_at)),
            updated_at: ActiveValue::Set(chrono::Utc::now().into()),
            ..Default::default()
        })
        .exec(conn)
        .await
        .context("Error updating last sync timestamp")?;

        Ok(())
    }
}
