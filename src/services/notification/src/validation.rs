//! Request admission checks
//!
//! Field-level rules come from the `validator` derives on the request types;
//! the cross-field rules live here. A request that fails any check has no side
//! effects.

use crate::config::SchedulerConfig;
use crate::error::{NotificationError, Result};
use fanout_shared::{NotificationRequest, NotificationType};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use validator::Validate;

static RECIPIENT_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._@\-]{1,255}$").expect("recipient id pattern is valid")
});

/// Validate a request as of `now`
pub fn validate_request(
    request: &NotificationRequest,
    scheduler: &SchedulerConfig,
    now: DateTime<Utc>,
) -> Result<()> {
    match (&request.content, &request.template) {
        (Some(_), Some(_)) => {
            return Err(NotificationError::validation(
                "content",
                "exactly one of content or template must be provided, not both",
            ))
        }
        (None, None) => {
            return Err(NotificationError::validation(
                "content",
                "exactly one of content or template must be provided",
            ))
        }
        _ => {}
    }

    request.validate()?;

    if let Some(invalid) = request
        .recipients
        .iter()
        .find(|id| !RECIPIENT_ID.is_match(id))
    {
        return Err(NotificationError::validation(
            "recipients",
            format!(
                "invalid recipient id '{}': expected 1-255 characters of letters, digits, '.', '_', '@' or '-'",
                invalid
            ),
        ));
    }

    if request.notification_type == NotificationType::Email {
        let has_sender = request
            .from
            .as_ref()
            .map(|from| !from.email.trim().is_empty())
            .unwrap_or(false);
        if !has_sender {
            return Err(NotificationError::validation(
                "from.email",
                "is required for email notifications",
            ));
        }
    } else if request.from.is_some() {
        return Err(NotificationError::validation(
            "from",
            "is only allowed for email notifications",
        ));
    }

    if let Some(scheduled_at) = request.scheduled_at {
        if scheduled_at <= now {
            return Err(NotificationError::scheduling(format!(
                "scheduled_at {} is not in the future",
                scheduled_at.to_rfc3339()
            )));
        }
        if scheduled_at > now + scheduler.max_horizon() {
            return Err(NotificationError::validation(
                "scheduled_at",
                format!(
                    "must be within {} days from now",
                    scheduler.max_horizon_days
                ),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> NotificationRequest {
        serde_json::from_value(value).unwrap()
    }

    fn check(value: serde_json::Value) -> Result<()> {
        validate_request(&request(value), &SchedulerConfig::default(), Utc::now())
    }

    fn field_of(result: Result<()>) -> String {
        match result {
            Err(NotificationError::Validation { field, .. }) => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_content_and_template_are_exclusive() {
        let both = check(json!({
            "type": "chat",
            "content": {"text": "hi"},
            "template": {"id": "tpl", "version": 1, "data": {"name": "x"}},
            "recipients": ["user-001"]
        }));
        assert_eq!(field_of(both), "content");

        let neither = check(json!({"type": "chat", "recipients": ["user-001"]}));
        assert_eq!(field_of(neither), "content");
    }

    #[test]
    fn test_email_requires_sender() {
        let result = check(json!({
            "type": "email",
            "content": {"subject": "Hi", "email_body": "Hello"},
            "recipients": ["user-001"]
        }));
        assert_eq!(field_of(result), "from.email");

        let invalid_sender = check(json!({
            "type": "email",
            "content": {"subject": "Hi", "email_body": "Hello"},
            "recipients": ["user-001"],
            "from": {"email": "not-an-address"}
        }));
        assert_eq!(field_of(invalid_sender), "from.email");
    }

    #[test]
    fn test_sender_rejected_for_non_email() {
        let chat = check(json!({
            "type": "chat",
            "content": {"text": "hi"},
            "recipients": ["user-001"],
            "from": {"email": "a@b.com"}
        }));
        assert_eq!(field_of(chat), "from");

        let push = check(json!({
            "type": "mobile-in-app",
            "content": {"title": "Build", "body": "Green"},
            "recipients": ["user-001"],
            "from": {"email": "a@b.com"}
        }));
        assert_eq!(field_of(push), "from");
    }

    #[test]
    fn test_recipient_ids() {
        let empty = check(json!({"type": "chat", "content": {"text": "hi"}, "recipients": []}));
        assert_eq!(field_of(empty), "recipients");

        let bad_charset = check(json!({
            "type": "chat",
            "content": {"text": "hi"},
            "recipients": ["user-001", "drop table;"]
        }));
        assert_eq!(field_of(bad_charset), "recipients");

        let ok = check(json!({
            "type": "chat",
            "content": {"text": "hi"},
            "recipients": ["user-001", "ops.team@example.com"]
        }));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_template_reference_shape() {
        let result = check(json!({
            "type": "chat",
            "template": {"id": "tpl", "version": 0, "data": {"name": "x"}},
            "recipients": ["user-001"]
        }));
        assert_eq!(field_of(result), "template.version");
    }

    #[test]
    fn test_schedule_window() {
        let now = Utc::now();
        let config = SchedulerConfig::default();
        let mut req = request(json!({
            "type": "chat",
            "content": {"text": "hi"},
            "recipients": ["user-001"]
        }));

        req.scheduled_at = Some(now - chrono::Duration::minutes(1));
        assert!(matches!(
            validate_request(&req, &config, now),
            Err(NotificationError::Scheduling { .. })
        ));

        req.scheduled_at = Some(now + chrono::Duration::days(400));
        assert_eq!(field_of(validate_request(&req, &config, now)), "scheduled_at");

        req.scheduled_at = Some(now + chrono::Duration::hours(1));
        assert!(validate_request(&req, &config, now).is_ok());
    }
}
