//! Request, response and template types exchanged with callers

use crate::types::core::{NotificationStatus, NotificationType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use validator::Validate;

/// Free-form named content fields carried by a request
pub type ContentMap = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// NOTIFICATION REQUESTS
// ============================================================================

/// One inbound request fanned out to every listed recipient
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NotificationRequest {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentMap>,

    #[validate]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateReference>,

    #[validate(length(min = 1, message = "at least one recipient is required"))]
    pub recipients: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,

    #[validate]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<SenderAddress>,
}

/// Sender identity for email notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SenderAddress {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Reference to a stored template plus the variables to render it with
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TemplateReference {
    #[validate(length(min = 1, max = 255, message = "template id is required"))]
    pub id: String,

    #[validate(range(min = 1, message = "version must be a positive integer"))]
    pub version: u32,

    #[validate(length(min = 1, message = "template data must not be empty"))]
    pub data: HashMap<String, serde_json::Value>,
}

/// Outcome returned to the caller of a notification request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: String,
    pub status: NotificationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStatusResponse {
    pub id: String,
    pub status: NotificationStatus,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// TEMPLATES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Active,
    Archived,
}

/// An immutable, versioned template. Lookups are always by (id, version).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub version: u32,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub content: BTreeMap<String, String>,
    pub required_variables: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TemplateStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTemplateRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[serde(rename = "type")]
    pub notification_type: NotificationType,

    pub content: BTreeMap<String, String>,

    #[serde(default)]
    pub required_variables: BTreeSet<String>,

    #[validate(length(max = 1000))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body for publishing the next version of an existing template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishTemplateVersionRequest {
    pub content: BTreeMap<String, String>,
    #[serde(default)]
    pub required_variables: BTreeSet<String>,
}
