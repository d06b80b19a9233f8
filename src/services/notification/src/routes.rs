//! Routes module for the notification service
//!
//! HTTP routes for the notification service:
//! - Notification admission, status and cancellation
//! - Template management
//! - Health and metrics endpoints

use crate::auth::{require_api_key, ApiKey};
use crate::config::NotificationConfig;
use crate::handlers::{health_handler, metrics_handler, notifications_handler, templates_handler};
use crate::manager::NotificationManager;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Build the main router for the notification service
pub fn create_router(
    notification_manager: Arc<NotificationManager>,
    config: &NotificationConfig,
) -> Router {
    let api_key: ApiKey = config.server.api_key.as_deref().map(Arc::from);
    let api_router = create_api_router(Arc::clone(&notification_manager), api_key);
    let health_router = create_health_router(notification_manager, config.metrics.enabled);

    Router::new()
        .merge(api_router)
        .merge(health_router)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.timeout_seconds,
                )))
                .into_inner(),
        )
}

/// Create API routes for REST endpoints
fn create_api_router(notification_manager: Arc<NotificationManager>, api_key: ApiKey) -> Router {
    Router::new()
        // Notification endpoints
        .route(
            "/api/v1/notifications",
            post(notifications_handler::create_notification),
        )
        .route(
            "/api/v1/notifications/:id",
            delete(notifications_handler::cancel_notification),
        )
        .route(
            "/api/v1/notifications/:id/status",
            get(notifications_handler::get_notification_status),
        )
        // Template endpoints
        .route(
            "/api/v1/templates",
            post(templates_handler::create_template),
        )
        .route(
            "/api/v1/templates/:id/versions",
            post(templates_handler::publish_version).get(templates_handler::list_versions),
        )
        .route(
            "/api/v1/templates/:id/versions/:version",
            get(templates_handler::get_version),
        )
        .route(
            "/api/v1/templates/:id/versions/:version/archive",
            post(templates_handler::archive_version),
        )
        .route_layer(middleware::from_fn_with_state(api_key, require_api_key))
        .with_state(notification_manager)
}

/// Create health and metrics routes
fn create_health_router(
    notification_manager: Arc<NotificationManager>,
    metrics_enabled: bool,
) -> Router {
    let router = Router::new().route("/health", get(health_handler));
    let router = if metrics_enabled {
        router.route("/metrics", get(metrics_handler))
    } else {
        router
    };
    router.with_state(notification_manager)
}
