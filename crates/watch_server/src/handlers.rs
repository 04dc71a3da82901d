use actix_web::{HttpResponse, Result, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use drop_dispatch::{NotificationRecord, PushToken, ToastEntry, WatchError, WatchStats};

use crate::watch_manager::WatchManager;

/// Response structure for the status endpoint
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Whether the background poll loop is running
    pub running: bool,
    /// Poller health and dispatch counters
    pub stats: WatchStats,
}

/// Response structure for the toast listing
#[derive(Debug, Serialize)]
pub struct ToastsResponse {
    /// Active toasts, oldest first
    pub toasts: Vec<ToastEntry>,
    /// Number of active toasts
    pub total: usize,
}

/// Response structure for the banner state
#[derive(Debug, Serialize)]
pub struct BannerResponse {
    /// Whether a banner is currently showing
    pub visible: bool,
    /// Drop ids on the banner
    pub drop_ids: Vec<String>,
}

/// Response structure for the bell notification listing
#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    /// Notification records, newest first
    pub notifications: Vec<NotificationRecord>,
    /// Total record count
    pub total: usize,
    /// Unread record count
    pub unread: usize,
}

/// Request structure for registering a push token
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterPushTokenRequest {
    /// Device token issued by the push provider
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    /// Originating platform
    #[validate(custom(function = "validate_platform"))]
    pub platform: String,
}

/// Reports poller health and dispatch counters
pub async fn get_status(manager: web::Data<WatchManager>) -> Result<HttpResponse, WatchError> {
    Ok(HttpResponse::Ok().json(StatusResponse {
        running: manager.is_running(),
        stats: manager.stats().await,
    }))
}

/// Triggers an immediate poll cycle (the became-active signal)
pub async fn request_refresh(manager: web::Data<WatchManager>) -> Result<HttpResponse, WatchError> {
    if manager.request_refresh() {
        Ok(HttpResponse::Accepted().json(serde_json::json!({
            "status": "refresh scheduled"
        })))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "error": "executor_not_running",
            "message": "The watch executor is not running"
        })))
    }
}

/// Lists the currently active toasts
pub async fn get_toasts(manager: web::Data<WatchManager>) -> Result<HttpResponse, WatchError> {
    let now = Utc::now();
    let dispatch = manager.dispatch().lock().await;
    let toasts = dispatch.toasts().active(now);

    Ok(HttpResponse::Ok().json(ToastsResponse {
        total: toasts.len(),
        toasts,
    }))
}

/// Reports the current banner state
pub async fn get_banner(manager: web::Data<WatchManager>) -> Result<HttpResponse, WatchError> {
    let now = Utc::now();
    let dispatch = manager.dispatch().lock().await;
    let drop_ids = dispatch.banner().visible_ids(now).to_vec();

    Ok(HttpResponse::Ok().json(BannerResponse {
        visible: !drop_ids.is_empty(),
        drop_ids,
    }))
}

/// Lists bell notifications, newest first
pub async fn get_notifications(
    manager: web::Data<WatchManager>,
) -> Result<HttpResponse, WatchError> {
    let dispatch = manager.dispatch().lock().await;
    let bell = dispatch.bell();
    let notifications: Vec<NotificationRecord> = bell.records().cloned().collect();

    Ok(HttpResponse::Ok().json(NotificationsResponse {
        total: notifications.len(),
        unread: bell.unread_count(),
        notifications,
    }))
}

/// Marks one notification read
pub async fn mark_notification_read(
    manager: web::Data<WatchManager>,
    path: web::Path<String>,
) -> Result<HttpResponse, WatchError> {
    let id = path.into_inner();
    let mut dispatch = manager.dispatch().lock().await;

    if !dispatch.bell_mut().mark_read(&id).await {
        return Err(WatchError::NotFound);
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "read" })))
}

/// Marks every notification read
pub async fn mark_all_notifications_read(
    manager: web::Data<WatchManager>,
) -> Result<HttpResponse, WatchError> {
    let mut dispatch = manager.dispatch().lock().await;
    dispatch.bell_mut().mark_all_read().await;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "all read" })))
}

/// Dismisses one notification
pub async fn dismiss_notification(
    manager: web::Data<WatchManager>,
    path: web::Path<String>,
) -> Result<HttpResponse, WatchError> {
    let id = path.into_inner();
    let mut dispatch = manager.dispatch().lock().await;

    if !dispatch.bell_mut().dismiss(&id).await {
        return Err(WatchError::NotFound);
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Clears the whole notification list
pub async fn clear_notifications(
    manager: web::Data<WatchManager>,
) -> Result<HttpResponse, WatchError> {
    let mut dispatch = manager.dispatch().lock().await;
    dispatch.bell_mut().clear_all().await;

    Ok(HttpResponse::NoContent().finish())
}

/// Registers a device push token with the drops API
pub async fn register_push_token(
    manager: web::Data<WatchManager>,
    request: web::Json<RegisterPushTokenRequest>,
) -> Result<HttpResponse, WatchError> {
    request
        .validate()
        .map_err(|e| WatchError::Validation(format!("Validation error: {}", e)))?;

    manager.push().register_token(PushToken {
        token: request.token.clone(),
        platform: request.platform.clone(),
    });

    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "status": "registration scheduled"
    })))
}

/// Custom validation function for the push platform
fn validate_platform(platform: &str) -> Result<(), validator::ValidationError> {
    match platform {
        "ios" | "android" | "web" => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_platform")),
    }
}
