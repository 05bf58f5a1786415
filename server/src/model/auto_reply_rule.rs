use anyhow::Context;

use crate::{
    automation::{matcher, template},
    db_core::prelude::*,
    error::{AppError, AppResult},
};

pub struct AutoReplyRuleCtrl;

pub struct CreateAutoReplyRule {
    pub name: String,
    pub priority: i32,
    pub conditions: serde_json::Value,
    pub reply_subject: Option<String>,
    pub reply_body: String,
}

pub struct UpdateAutoReplyRule {
    pub name: Option<String>,
    pub priority: Option<i32>,
    pub conditions: Option<serde_json::Value>,
    pub reply_subject: Option<Option<String>>,
    pub reply_body: Option<String>,
}

/// Malformed predicates and templates are rejected here so the matcher only
/// ever sees rules that parse.
fn validate_rule(conditions: &serde_json::Value, reply_body: &str) -> AppResult<()> {
    matcher::parse_conditions(conditions)
        .map_err(|e| AppError::BadRequest(format!("Invalid rule conditions: {}", e)))?;
    template::validate_template(reply_body)
        .map_err(|e| AppError::BadRequest(format!("Invalid reply template: {}", e)))?;

    Ok(())
}

impl AutoReplyRuleCtrl {
    pub async fn create(
        conn: &DatabaseConnection,
        user_id: i32,
        rule: CreateAutoReplyRule,
    ) -> AppResult<auto_reply_rule::Model> {
        validate_rule(&rule.conditions, &rule.reply_body)?;

        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        let active_model = auto_reply_rule::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(user_id),
            name: ActiveValue::Set(rule.name),
            priority: ActiveValue::Set(rule.priority),
            is_enabled: ActiveValue::Set(true),
            conditions: ActiveValue::Set(rule.conditions),
            reply_subject: ActiveValue::Set(rule.reply_subject),
            reply_body: ActiveValue::Set(rule.reply_body),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        let created = AutoReplyRule::insert(active_model)
            .exec_with_returning(conn)
            .await
            .context("Error creating auto reply rule")?;

        Ok(created)
    }

    pub async fn update(
        conn: &DatabaseConnection,
        user_id: i32,
        rule_id: i32,
        update: UpdateAutoReplyRule,
    ) -> AppResult<auto_reply_rule::Model> {
        let existing = Self::get_by_id(conn, user_id, rule_id).await?;

        let conditions = update.conditions.unwrap_or_else(|| existing.conditions.clone());
        let reply_body = update.reply_body.unwrap_or_else(|| existing.reply_body.clone());
        validate_rule(&conditions, &reply_body)?;

        let mut active_model: auto_reply_rule::ActiveModel = existing.into();
        if let Some(name) = update.name {
            active_model.name = ActiveValue::Set(name);
        }
        if let Some(priority) = update.priority {
            active_model.priority = ActiveValue::Set(priority);
        }
        if let Some(reply_subject) = update.reply_subject {
            active_model.reply_subject = ActiveValue::Set(reply_subject);
        }
        active_model.conditions = ActiveValue::Set(conditions);
        active_model.reply_body = ActiveValue::Set(reply_body);
        active_model.updated_at = ActiveValue::Set(chrono::Utc::now().into());

        let updated = active_model
            .update(conn)
            .await
            .context("Error updating auto reply rule")?;

        Ok(updated)
    }

    pub async fn set_enabled(
        conn: &DatabaseConnection,
        user_id: i32,
        rule_id: i32,
        is_enabled: bool,
    ) -> AppResult<auto_reply_rule::Model> {
        let existing = Self::get_by_id(conn, user_id, rule_id).await?;

        let mut active_model: auto_reply_rule::ActiveModel = existing.into();
        active_model.is_enabled = ActiveValue::Set(is_enabled);
        active_model.updated_at = ActiveValue::Set(chrono::Utc::now().into());

        let updated = active_model
            .update(conn)
            .await
            .context("Error toggling auto reply rule")?;

        Ok(updated)
    }

    pub async fn delete(conn: &DatabaseConnection, user_id: i32, rule_id: i32) -> AppResult<()> {
        let result = AutoReplyRule::delete_many()
            .filter(auto_reply_rule::Column::Id.eq(rule_id))
            .filter(auto_reply_rule::Column::UserId.eq(user_id))
            .exec(conn)
            .await
            .context("Error deleting auto reply rule")?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Rule not found".to_string()));
        }

        Ok(())
    }

    pub async fn get_by_id(
        conn: &DatabaseConnection,
        user_id: i32,
        rule_id: i32,
    ) -> AppResult<auto_reply_rule::Model> {
        let rule = AutoReplyRule::find_by_id(rule_id)
            .filter(auto_reply_rule::Column::UserId.eq(user_id))
            .one(conn)
            .await
            .context("Error fetching auto reply rule")?
            .ok_or(AppError::NotFound("Rule not found".to_string()))?;

        Ok(rule)
    }

    pub async fn all_for_user(
        conn: &DatabaseConnection,
        user_id: i32,
    ) -> AppResult<Vec<auto_reply_rule::Model>> {
        let rules = AutoReplyRule::find()
            .filter(auto_reply_rule::Column::UserId.eq(user_id))
            .order_by_asc(auto_reply_rule::Column::Priority)
            .order_by_asc(auto_reply_rule::Column::CreatedAt)
            .order_by_asc(auto_reply_rule::Column::Id)
            .all(conn)
            .await
            .context("Error fetching auto reply rules")?;

        Ok(rules)
    }

    /// Enabled rules in match order: lowest priority number first, ties broken
    /// by earliest creation, then id.
    pub async fn all_enabled_for_user(
        conn: &DatabaseConnection,
        user_id: i32,
    ) -> AppResult<Vec<auto_reply_rule::Model>> {
        let rules = AutoReplyRule::find()
            .filter(auto_reply_rule::Column::UserId.eq(user_id))
            .filter(auto_reply_rule::Column::IsEnabled.eq(true))
            .order_by_asc(auto_reply_rule::Column::Priority)
            .order_by_asc(auto_reply_rule::Column::CreatedAt)
            .order_by_asc(auto_reply_rule::Column::Id)
            .all(conn)
            .await
            .context("Error fetching enabled auto reply rules")?;

        Ok(rules)
    }
}
