use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::domain::policy::unread_count;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::Ticket;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", patch(mark_all_read))
        .route("/notifications/{id}/read", patch(mark_read))
}

/// Уведомления = купленные билеты; непрочитанные подсвечиваются
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let tickets = Ticket::list_for_user(&state.db, user.id).await?;
    let unread = unread_count(&tickets);
    let message = (unread == 0).then_some("There are no new notifications 😊");

    Ok(Json(json!({
        "success": true,
        "notifications": tickets,
        "unread_count": unread,
        "message": message,
    })))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    if !Ticket::mark_read(&state.db, id, user.id).await? {
        return Err(AppError::not_found("Notification not found"));
    }
    Ok(Json(json!({ "success": true })))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let updated = Ticket::mark_all_read(&state.db, user.id).await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}
