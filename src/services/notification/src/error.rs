//! Error handling for the notification fan-out service
//!
//! `NotificationError` is the service-level error surfaced to callers. The
//! renderer, queues and scheduler each have a narrower error type that converts
//! into it.

use crate::queue::QueueError;
use crate::renderer::TemplateError;
use crate::scheduler::SchedulerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Result type alias for notification service operations
pub type Result<T> = std::result::Result<T, NotificationError>;

/// Main error type for the notification service
#[derive(Error, Debug)]
pub enum NotificationError {
    /// Malformed request, rejected before any processing
    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    /// Template lookup or rendering failed; nothing was dispatched
    #[error("Template processing failed: {source}")]
    TemplateProcessing {
        #[source]
        source: TemplateError,
    },

    /// Directory lookup resolved none of the requested recipients
    #[error("No valid recipients: none of {requested} recipient(s) could be resolved")]
    NoValidRecipients { requested: usize },

    /// A delivery queue is at capacity
    #[error("Queue full: {channel}")]
    QueueFull { channel: String },

    /// A delivery queue has no consumers left
    #[error("Queue closed: {channel}")]
    QueueClosed { channel: String },

    /// Fire time rejected or job bookkeeping failed
    #[error("Scheduling error: {message}")]
    Scheduling { message: String },

    /// Email delivery errors
    #[error("Email error: {message}")]
    Email { message: String },

    /// Chat delivery errors
    #[error("Chat error: {message}")]
    Chat { message: String },

    /// Push notification errors
    #[error("Push notification error: {message}")]
    Push { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Shared-secret check failed
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Not found errors
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// Timeout errors
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Network/connection errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Local I/O errors (fallback delivery logs)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// External service errors
    #[error("External service error: {service}: {message}")]
    ExternalService { service: String, message: String },

    /// Internal service errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl NotificationError {
    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            NotificationError::Validation { .. } => StatusCode::BAD_REQUEST,
            NotificationError::TemplateProcessing { .. } => StatusCode::BAD_REQUEST,
            NotificationError::NoValidRecipients { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            NotificationError::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
            NotificationError::QueueClosed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            NotificationError::Scheduling { .. } => StatusCode::BAD_REQUEST,
            NotificationError::Email { .. } => StatusCode::BAD_GATEWAY,
            NotificationError::Chat { .. } => StatusCode::BAD_GATEWAY,
            NotificationError::Push { .. } => StatusCode::BAD_GATEWAY,
            NotificationError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            NotificationError::Auth { .. } => StatusCode::UNAUTHORIZED,
            NotificationError::NotFound { .. } => StatusCode::NOT_FOUND,
            NotificationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            NotificationError::Network { .. } => StatusCode::BAD_GATEWAY,
            NotificationError::Serialization { .. } => StatusCode::BAD_REQUEST,
            NotificationError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            NotificationError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
            NotificationError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            NotificationError::Validation { .. } => "VALIDATION_ERROR",
            NotificationError::TemplateProcessing { .. } => "TEMPLATE_PROCESSING_FAILED",
            NotificationError::NoValidRecipients { .. } => "NO_VALID_RECIPIENTS",
            NotificationError::QueueFull { .. } => "QUEUE_FULL",
            NotificationError::QueueClosed { .. } => "QUEUE_CLOSED",
            NotificationError::Scheduling { .. } => "SCHEDULING_ERROR",
            NotificationError::Email { .. } => "EMAIL_ERROR",
            NotificationError::Chat { .. } => "CHAT_ERROR",
            NotificationError::Push { .. } => "PUSH_ERROR",
            NotificationError::Config { .. } => "CONFIG_ERROR",
            NotificationError::Auth { .. } => "AUTH_ERROR",
            NotificationError::NotFound { .. } => "NOT_FOUND",
            NotificationError::Timeout { .. } => "TIMEOUT",
            NotificationError::Network { .. } => "NETWORK_ERROR",
            NotificationError::Serialization { .. } => "SERIALIZATION_ERROR",
            NotificationError::Io { .. } => "IO_ERROR",
            NotificationError::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            NotificationError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for NotificationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status.as_u16()
            }
        }));

        (status, body).into_response()
    }
}

// Conversion implementations for internal and external error types

impl From<TemplateError> for NotificationError {
    fn from(err: TemplateError) -> Self {
        NotificationError::TemplateProcessing { source: err }
    }
}

impl From<QueueError> for NotificationError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Full { channel } => NotificationError::QueueFull {
                channel: channel.to_string(),
            },
            QueueError::Closed { channel } => NotificationError::QueueClosed {
                channel: channel.to_string(),
            },
        }
    }
}

impl From<SchedulerError> for NotificationError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::JobNotFound { job_id } => NotificationError::NotFound {
                resource: format!("scheduled job {}", job_id),
            },
            other => NotificationError::Scheduling {
                message: other.to_string(),
            },
        }
    }
}

impl From<lettre::error::Error> for NotificationError {
    fn from(err: lettre::error::Error) -> Self {
        NotificationError::Email {
            message: err.to_string(),
        }
    }
}

impl From<lettre::transport::smtp::Error> for NotificationError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        NotificationError::Email {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotificationError::Timeout {
                operation: "HTTP request".to_string(),
            }
        } else if err.is_connect() {
            NotificationError::Network {
                message: err.to_string(),
            }
        } else {
            NotificationError::ExternalService {
                service: "HTTP".to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for NotificationError {
    fn from(err: std::io::Error) -> Self {
        NotificationError::Io {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for NotificationError {
    fn from(err: config::ConfigError) -> Self {
        NotificationError::Config {
            message: err.to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for NotificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        NotificationError::Push {
            message: format!("provider token error: {}", err),
        }
    }
}

impl From<validator::ValidationErrors> for NotificationError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields = Vec::new();
        let mut messages = Vec::new();

        collect_validation_errors("", &err, &mut fields, &mut messages);

        let field = if fields.len() == 1 {
            fields.remove(0)
        } else {
            "multiple".to_string()
        };

        NotificationError::Validation {
            field,
            message: messages.join("; "),
        }
    }
}

/// Flattens nested validator errors into dotted field paths (`from.email`)
fn collect_validation_errors(
    prefix: &str,
    errors: &validator::ValidationErrors,
    fields: &mut Vec<String>,
    messages: &mut Vec<String>,
) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            validator::ValidationErrorsKind::Field(field_errors) => {
                let details: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                messages.push(format!("{}: {}", path, details.join(", ")));
                fields.push(path);
            }
            validator::ValidationErrorsKind::Struct(inner) => {
                collect_validation_errors(&path, inner, fields, messages);
            }
            validator::ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_validation_errors(
                        &format!("{}[{}]", path, index),
                        inner,
                        fields,
                        messages,
                    );
                }
            }
        }
    }
}

// Utility functions for creating specific error types

impl NotificationError {
    /// Create a validation error
    pub fn validation<S1: Into<String>, S2: Into<String>>(field: S1, message: S2) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a scheduling error
    pub fn scheduling<S: Into<String>>(message: S) -> Self {
        Self::Scheduling {
            message: message.into(),
        }
    }

    /// Create an email error
    pub fn email<S: Into<String>>(message: S) -> Self {
        Self::Email {
            message: message.into(),
        }
    }

    /// Create a chat error
    pub fn chat<S: Into<String>>(message: S) -> Self {
        Self::Chat {
            message: message.into(),
        }
    }

    /// Create a push notification error
    pub fn push<S: Into<String>>(message: S) -> Self {
        Self::Push {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an external service error
    pub fn external_service<S1: Into<String>, S2: Into<String>>(service: S1, message: S2) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_shared::{DeliveryChannel, NotificationRequest};
    use validator::Validate;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            NotificationError::validation("field", "message").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            NotificationError::NoValidRecipients { requested: 1 }.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            NotificationError::not_found("resource").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            NotificationError::auth("bad key").status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_template_error_is_client_error() {
        let error: NotificationError = TemplateError::MissingTemplateVariable {
            name: "platform".to_string(),
        }
        .into();

        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.error_code(), "TEMPLATE_PROCESSING_FAILED");
        assert!(error.to_string().contains("platform"));
    }

    #[test]
    fn test_queue_error_conversion() {
        let error: NotificationError = QueueError::Full {
            channel: DeliveryChannel::IosPush,
        }
        .into();
        assert!(matches!(error, NotificationError::QueueFull { ref channel } if channel == "ios-push"));
    }

    #[test]
    fn test_nested_validation_field_path() {
        let request: NotificationRequest = serde_json::from_value(serde_json::json!({
            "type": "email",
            "content": {"subject": "Hi", "body": "Hello"},
            "recipients": ["user-001"],
            "from": {"email": "not-an-address"}
        }))
        .unwrap();

        let error: NotificationError = request.validate().unwrap_err().into();
        match error {
            NotificationError::Validation { field, .. } => assert_eq!(field, "from.email"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_error_display() {
        let error = NotificationError::email("Connection refused");
        assert_eq!(error.to_string(), "Email error: Connection refused");
    }

    #[test]
    fn test_from_conversions() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json");
        assert!(json_error.is_err());
        let notification_error: NotificationError = json_error.unwrap_err().into();
        assert!(matches!(
            notification_error,
            NotificationError::Serialization { .. }
        ));
    }
}
