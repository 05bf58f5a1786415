use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::db_core::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    Sender,
    Subject,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Contains,
    Equals,
    StartsWith,
    Regex,
}

/// One predicate clause. A rule's conditions are a conjunction of these,
/// evaluated by a small interpreter rather than anything dynamic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: ConditionField,
    pub operator: ConditionOperator,
    pub value: String,
}

/// Parses and validates a conditions document at rule creation time. The
/// matcher itself never rejects input; anything malformed simply fails to
/// match.
pub fn parse_conditions(value: &serde_json::Value) -> Result<Vec<Condition>, String> {
    let conditions: Vec<Condition> =
        serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;

    if conditions.is_empty() {
        return Err("at least one condition is required".to_string());
    }

    for condition in &conditions {
        if condition.value.is_empty() {
            return Err("condition value must not be empty".to_string());
        }
        if condition.operator == ConditionOperator::Regex {
            RegexBuilder::new(&condition.value)
                .case_insensitive(true)
                .build()
                .map_err(|e| format!("invalid regex pattern: {e}"))?;
        }
    }

    Ok(conditions)
}

/// Borrowed view of the email fields the matcher inspects.
#[derive(Debug, Clone, Copy)]
pub struct EmailView<'a> {
    pub sender: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
}

impl<'a> From<&'a inbound_email::Model> for EmailView<'a> {
    fn from(email: &'a inbound_email::Model) -> Self {
        Self {
            sender: &email.sender,
            subject: &email.subject,
            body: email.body_text.as_deref().unwrap_or(""),
        }
    }
}

fn field_value<'a>(field: ConditionField, email: &EmailView<'a>) -> &'a str {
    match field {
        ConditionField::Sender => email.sender,
        ConditionField::Subject => email.subject,
        ConditionField::Body => email.body,
    }
}

fn condition_matches(condition: &Condition, email: &EmailView) -> bool {
    let haystack = field_value(condition.field, email).to_lowercase();
    let needle = condition.value.to_lowercase();

    match condition.operator {
        ConditionOperator::Contains => haystack.contains(&needle),
        ConditionOperator::Equals => haystack == needle,
        ConditionOperator::StartsWith => haystack.starts_with(&needle),
        ConditionOperator::Regex => RegexBuilder::new(&condition.value)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(field_value(condition.field, email)))
            .unwrap_or(false),
    }
}

/// True when every condition of an enabled rule holds for the email.
/// Disabled rules and unparseable condition documents never match.
pub fn rule_matches(rule: &auto_reply_rule::Model, email: &EmailView) -> bool {
    if !rule.is_enabled {
        return false;
    }

    let Ok(conditions) = serde_json::from_value::<Vec<Condition>>(rule.conditions.clone()) else {
        return false;
    };

    if conditions.is_empty() {
        return false;
    }

    conditions
        .iter()
        .all(|condition| condition_matches(condition, email))
}

/// Returns the single winning rule for an email, or none. Lower priority
/// number wins; ties go to the rule created earliest, then the lowest id.
/// Pure over its inputs, so repeated calls agree.
pub fn evaluate<'a>(
    rules: &'a [auto_reply_rule::Model],
    email: &EmailView,
) -> Option<&'a auto_reply_rule::Model> {
    rules
        .iter()
        .filter(|rule| rule_matches(rule, email))
        .min_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;

    fn mk_rule(
        id: i32,
        priority: i32,
        created_offset_secs: i64,
        conditions: serde_json::Value,
    ) -> auto_reply_rule::Model {
        let created_at = (Utc::now() + Duration::seconds(created_offset_secs)).into();
        auto_reply_rule::Model {
            id,
            user_id: 1,
            name: format!("rule-{id}"),
            priority,
            is_enabled: true,
            conditions,
            reply_subject: None,
            reply_body: "Thanks, got it.".to_string(),
            created_at,
            updated_at: created_at,
        }
    }

    fn email<'a>(sender: &'a str, subject: &'a str, body: &'a str) -> EmailView<'a> {
        EmailView {
            sender,
            subject,
            body,
        }
    }

    #[test]
    fn test_lower_priority_number_wins() {
        let rules = vec![
            mk_rule(
                1,
                1,
                0,
                json!([{"field": "subject", "operator": "contains", "value": "invoice"}]),
            ),
            mk_rule(
                2,
                2,
                0,
                json!([{"field": "sender", "operator": "contains", "value": "boss@x.com"}]),
            ),
        ];
        let email = email("boss@x.com", "invoice due", "please pay");

        let matched = evaluate(&rules, &email).unwrap();
        assert_eq!(matched.id, 1);
        assert_eq!(matched.priority, 1);
    }

    #[test]
    fn test_tie_break_earliest_created_then_id() {
        let cond = json!([{"field": "subject", "operator": "contains", "value": "hello"}]);
        let rules = vec![
            mk_rule(5, 1, 100, cond.clone()),
            mk_rule(3, 1, -100, cond.clone()),
            mk_rule(4, 1, -100, cond),
        ];
        let email = email("a@b.com", "hello there", "");

        let matched = evaluate(&rules, &email).unwrap();
        assert_eq!(matched.id, 3);
    }

    #[test]
    fn test_evaluate_is_pure() {
        let rules = vec![mk_rule(
            1,
            1,
            0,
            json!([{"field": "body", "operator": "contains", "value": "urgent"}]),
        )];
        let email = email("a@b.com", "hi", "this is URGENT");

        let first = evaluate(&rules, &email).map(|r| r.id);
        let second = evaluate(&rules, &email).map(|r| r.id);
        assert_eq!(first, Some(1));
        assert_eq!(first, second);
    }

    #[test]
    fn test_disabled_rule_never_matches() {
        let mut rule = mk_rule(
            1,
            1,
            0,
            json!([{"field": "subject", "operator": "contains", "value": "hello"}]),
        );
        rule.is_enabled = false;
        let rules = vec![rule];
        let email = email("a@b.com", "hello", "");

        assert!(evaluate(&rules, &email).is_none());
    }

    #[test]
    fn test_conditions_are_conjunctive() {
        let rules = vec![mk_rule(
            1,
            1,
            0,
            json!([
                {"field": "subject", "operator": "contains", "value": "invoice"},
                {"field": "sender", "operator": "contains", "value": "billing@"}
            ]),
        )];

        assert!(evaluate(&rules, &email("billing@acme.com", "Invoice 42", "")).is_some());
        assert!(evaluate(&rules, &email("sales@acme.com", "Invoice 42", "")).is_none());
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let rules = vec![mk_rule(
            1,
            1,
            0,
            json!([{"field": "subject", "operator": "starts_with", "value": "RE:"}]),
        )];
        let email = email("a@b.com", "re: project", "");

        assert!(evaluate(&rules, &email).is_some());
    }

    #[test]
    fn test_equals_operator() {
        let rules = vec![mk_rule(
            1,
            1,
            0,
            json!([{"field": "sender", "operator": "equals", "value": "Boss@X.com"}]),
        )];

        assert!(evaluate(&rules, &email("boss@x.com", "hi", "")).is_some());
        assert!(evaluate(&rules, &email("notboss@x.com", "hi", "")).is_none());
    }

    #[test]
    fn test_regex_operator() {
        let rules = vec![mk_rule(
            1,
            1,
            0,
            json!([{"field": "subject", "operator": "regex", "value": r"invoice\s+#\d+"}]),
        )];

        assert!(evaluate(&rules, &email("a@b.com", "Invoice #123 due", "")).is_some());
        assert!(evaluate(&rules, &email("a@b.com", "invoice due", "")).is_none());
    }

    #[test]
    fn test_malformed_conditions_count_as_non_match() {
        let rules = vec![
            mk_rule(1, 1, 0, json!({"not": "an array"})),
            mk_rule(
                2,
                1,
                0,
                json!([{"field": "subject", "operator": "regex", "value": "("}]),
            ),
            mk_rule(3, 1, 0, json!([])),
        ];
        let email = email("a@b.com", "anything", "anything");

        assert!(evaluate(&rules, &email).is_none());
    }

    #[test]
    fn test_parse_conditions_rejects_bad_input() {
        assert!(parse_conditions(&json!([])).is_err());
        assert!(parse_conditions(&json!({"field": "subject"})).is_err());
        assert!(parse_conditions(
            &json!([{"field": "subject", "operator": "contains", "value": ""}])
        )
        .is_err());
        assert!(
            parse_conditions(&json!([{"field": "subject", "operator": "regex", "value": "("}]))
                .is_err()
        );
        assert!(parse_conditions(
            &json!([{"field": "subject", "operator": "contains", "value": "ok"}])
        )
        .is_ok());
    }
}
