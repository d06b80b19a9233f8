//! Template rendering
//!
//! Substitutes `{{name}}` placeholders in every string field of a template's
//! content. Required variables are checked before anything is rendered, and
//! placeholders without a matching variable are left in the output verbatim.

use fanout_shared::{NotificationType, Template, TemplateStatus};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template {id} version {version} not found")]
    NotFound { id: String, version: u32 },

    #[error("missing required template variable: {name}")]
    MissingTemplateVariable { name: String },

    #[error("template type {template_type} does not match notification type {notification_type}")]
    TemplateTypeMismatch {
        template_type: NotificationType,
        notification_type: NotificationType,
    },

    #[error("template {id} is not active")]
    Inactive { id: String },

    #[error("invalid template content: {message}")]
    InvalidContent { message: String },
}

/// Content fields each notification type's template must provide
pub fn required_content_fields(notification_type: NotificationType) -> &'static [&'static str] {
    match notification_type {
        NotificationType::Email => &["subject", "body"],
        NotificationType::Chat => &["text"],
        NotificationType::MobileInApp => &["title", "body"],
    }
}

/// Check that `content` has the shape expected for `notification_type`
pub fn validate_content_shape(
    notification_type: NotificationType,
    content: &BTreeMap<String, String>,
) -> Result<(), TemplateError> {
    for field in required_content_fields(notification_type) {
        if !content.contains_key(*field) {
            return Err(TemplateError::InvalidContent {
                message: format!("{} templates require a '{}' field", notification_type, field),
            });
        }
    }
    Ok(())
}

/// Every name in `required` must be present in `variables`
pub fn validate_required_variables(
    required: &BTreeSet<String>,
    variables: &HashMap<String, serde_json::Value>,
) -> Result<(), TemplateError> {
    match required.iter().find(|name| !variables.contains_key(*name)) {
        Some(name) => Err(TemplateError::MissingTemplateVariable { name: name.clone() }),
        None => Ok(()),
    }
}

/// Substitute placeholders in every field of `content`
pub fn render(
    content: &BTreeMap<String, String>,
    variables: &HashMap<String, serde_json::Value>,
) -> BTreeMap<String, String> {
    content
        .iter()
        .map(|(field, text)| (field.clone(), render_str(text, variables)))
        .collect()
}

/// Substitute placeholders in a single string
pub fn render_str(text: &str, variables: &HashMap<String, serde_json::Value>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => stringify(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Default string form of a template variable
fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Type check, required-variable check and render, in that order
pub fn render_template(
    template: &Template,
    notification_type: NotificationType,
    variables: &HashMap<String, serde_json::Value>,
) -> Result<BTreeMap<String, String>, TemplateError> {
    if template.notification_type != notification_type {
        return Err(TemplateError::TemplateTypeMismatch {
            template_type: template.notification_type,
            notification_type,
        });
    }

    if template.status != TemplateStatus::Active {
        return Err(TemplateError::Inactive {
            id: template.id.clone(),
        });
    }

    validate_required_variables(&template.required_variables, variables)?;

    Ok(render(&template.content, variables))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn vars(value: serde_json::Value) -> HashMap<String, serde_json::Value> {
        serde_json::from_value(value).unwrap()
    }

    fn welcome_template() -> Template {
        Template {
            id: "tpl-welcome".to_string(),
            name: "welcome".to_string(),
            version: 1,
            notification_type: NotificationType::Email,
            content: BTreeMap::from([
                ("subject".to_string(), "Welcome {{name}}".to_string()),
                (
                    "body".to_string(),
                    "Hi {{name}}, you joined from {{platform}}.".to_string(),
                ),
            ]),
            required_variables: BTreeSet::from(["name".to_string(), "platform".to_string()]),
            description: None,
            status: TemplateStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_substitutes_known_variables() {
        let rendered = render_str("Hello {{name}}!", &vars(json!({"name": "Jane"})));
        assert_eq!(rendered, "Hello Jane!");
    }

    #[test]
    fn test_unknown_placeholder_left_literal() {
        let rendered = render_str("Hello {{name}} from {{city}}", &vars(json!({"name": "Jane"})));
        assert_eq!(rendered, "Hello Jane from {{city}}");
    }

    #[test]
    fn test_non_string_values_stringified() {
        let rendered = render_str(
            "{{count}} items, urgent={{urgent}}, ratio={{ratio}}",
            &vars(json!({"count": 3, "urgent": true, "ratio": 0.5})),
        );
        assert_eq!(rendered, "3 items, urgent=true, ratio=0.5");
    }

    #[test]
    fn test_whitespace_inside_braces() {
        let rendered = render_str("Hi {{ name }}", &vars(json!({"name": "Jane"})));
        assert_eq!(rendered, "Hi Jane");
    }

    #[test]
    fn test_missing_required_variable_blocks_rendering() {
        let template = welcome_template();
        let result = render_template(
            &template,
            NotificationType::Email,
            &vars(json!({"name": "Jane"})),
        );
        assert_eq!(
            result,
            Err(TemplateError::MissingTemplateVariable {
                name: "platform".to_string()
            })
        );
    }

    #[test]
    fn test_type_mismatch() {
        let template = welcome_template();
        let result = render_template(
            &template,
            NotificationType::Chat,
            &vars(json!({"name": "Jane", "platform": "ios"})),
        );
        assert!(matches!(
            result,
            Err(TemplateError::TemplateTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_archived_template_not_rendered() {
        let mut template = welcome_template();
        template.status = TemplateStatus::Archived;

        let result = render_template(
            &template,
            NotificationType::Email,
            &vars(json!({"name": "Jane", "platform": "ios"})),
        );
        assert_eq!(
            result,
            Err(TemplateError::Inactive {
                id: "tpl-welcome".to_string()
            })
        );
    }

    #[test]
    fn test_render_template_every_field() {
        let template = welcome_template();
        let rendered = render_template(
            &template,
            NotificationType::Email,
            &vars(json!({"name": "Jane", "platform": "ios"})),
        )
        .unwrap();

        assert_eq!(rendered["subject"], "Welcome Jane");
        assert_eq!(rendered["body"], "Hi Jane, you joined from ios.");
    }

    #[test]
    fn test_content_shape() {
        let chat = BTreeMap::from([("text".to_string(), "hi".to_string())]);
        assert!(validate_content_shape(NotificationType::Chat, &chat).is_ok());
        assert!(validate_content_shape(NotificationType::MobileInApp, &chat).is_err());
    }
}
