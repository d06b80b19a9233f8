//! Request handlers for the notification service
//!
//! HTTP handlers for the notification service API:
//! - Notification admission, status and cancellation
//! - Template creation and versioning
//! - Health and metrics

use crate::error::{NotificationError, Result};
use crate::manager::NotificationManager;
use fanout_shared::{
    CreateTemplateRequest, NotificationRequest, NotificationStatus, PublishTemplateVersionRequest,
};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

/// Unwrap a JSON body, reporting malformed input in the service's error format
fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| NotificationError::validation("body", rejection.body_text()))
}

pub mod notifications_handler {
    use super::*;

    /// Admit a notification request
    pub async fn create_notification(
        State(manager): State<Arc<NotificationManager>>,
        body: std::result::Result<Json<NotificationRequest>, JsonRejection>,
    ) -> Result<impl IntoResponse> {
        let request = json_body(body)?;
        info!(
            notification_type = %request.notification_type,
            recipients = request.recipients.len(),
            "Received notification request"
        );

        match manager.process(request).await {
            Ok(response) => {
                info!(
                    notification_id = %response.id,
                    status = %response.status,
                    "Notification request accepted"
                );
                let status = match response.status {
                    NotificationStatus::Scheduled => StatusCode::ACCEPTED,
                    _ => StatusCode::OK,
                };
                Ok((status, Json(response)))
            }
            Err(e) => {
                error!("Failed to process notification: {}", e);
                Err(e)
            }
        }
    }

    pub async fn get_notification_status(
        State(manager): State<Arc<NotificationManager>>,
        Path(id): Path<String>,
    ) -> Result<impl IntoResponse> {
        Ok(Json(manager.get_status(&id).await?))
    }

    /// Cancel a scheduled notification before it fires
    pub async fn cancel_notification(
        State(manager): State<Arc<NotificationManager>>,
        Path(id): Path<String>,
    ) -> Result<impl IntoResponse> {
        info!(notification_id = %id, "Cancelling notification");
        Ok(Json(manager.cancel_notification(&id).await?))
    }
}

pub mod templates_handler {
    use super::*;

    pub async fn create_template(
        State(manager): State<Arc<NotificationManager>>,
        body: std::result::Result<Json<CreateTemplateRequest>, JsonRejection>,
    ) -> Result<impl IntoResponse> {
        let request = json_body(body)?;
        let template = manager.create_template(request).await?;
        Ok((StatusCode::CREATED, Json(template)))
    }

    /// Publish the next version of a template
    pub async fn publish_version(
        State(manager): State<Arc<NotificationManager>>,
        Path(id): Path<String>,
        body: std::result::Result<Json<PublishTemplateVersionRequest>, JsonRejection>,
    ) -> Result<impl IntoResponse> {
        let request = json_body(body)?;
        let template = manager.publish_template_version(&id, request).await?;
        Ok((StatusCode::CREATED, Json(template)))
    }

    pub async fn list_versions(
        State(manager): State<Arc<NotificationManager>>,
        Path(id): Path<String>,
    ) -> Result<impl IntoResponse> {
        Ok(Json(manager.list_template_versions(&id).await?))
    }

    pub async fn get_version(
        State(manager): State<Arc<NotificationManager>>,
        Path((id, version)): Path<(String, u32)>,
    ) -> Result<impl IntoResponse> {
        Ok(Json(manager.get_template(&id, version).await?))
    }

    pub async fn archive_version(
        State(manager): State<Arc<NotificationManager>>,
        Path((id, version)): Path<(String, u32)>,
    ) -> Result<impl IntoResponse> {
        Ok(Json(manager.archive_template_version(&id, version).await?))
    }
}

/// Health check handler
pub async fn health_handler(
    State(manager): State<Arc<NotificationManager>>,
) -> impl IntoResponse {
    Json(manager.health_check().await)
}

/// Prometheus text exposition
pub async fn metrics_handler(
    State(manager): State<Arc<NotificationManager>>,
) -> Result<impl IntoResponse> {
    let body = manager.metrics().export_metrics()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
