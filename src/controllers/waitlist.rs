use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::domain::validation::{WaitlistRequest, WAITLIST_FULL};
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::waitlist::JoinOutcome;
use crate::models::{Event, WaitlistEntry};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/waitlist", post(join_waitlist))
        .route("/waitlist/{event_id}", get(list_waitlist).delete(leave_waitlist))
}

/// POST /api/waitlist — доступно и гостям, нужен email или телефон
async fn join_waitlist(
    State(state): State<Arc<AppState>>,
    user: Option<AuthUser>,
    Json(req): Json<WaitlistRequest>,
) -> AppResult<impl IntoResponse> {
    let contact = req.check()?;
    let outcome = WaitlistEntry::join(
        &state.db,
        req.event_id,
        user.as_ref().map(|u| u.id),
        contact.email.as_deref(),
        contact.phone.as_deref(),
        state.config.booking.waitlist_capacity,
    )
    .await?;
    let entry = match outcome {
        JoinOutcome::Joined(entry) => entry,
        JoinOutcome::Full => return Err(AppError::conflict(WAITLIST_FULL)),
        JoinOutcome::NoEvent => return Err(AppError::not_found("Event not found")),
    };
    tracing::info!("Waitlist entry {} added for event {}", entry.id, entry.event_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Thank you for joining the waitlist! We will notify you if tickets become available.",
            "entry": entry,
        })),
    ))
}

/// GET /api/waitlist/{event_id} — для организатора события и администратора
async fn list_waitlist(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    user.require_event_manager()?;
    let event = Event::find_by_id(&state.db, event_id)
        .await?
        .ok_or_else(|| AppError::not_found("Event not found"))?;
    if !user.is_admin() && !event.is_owned_by(&user.email) {
        return Err(AppError::Forbidden);
    }

    let entries = WaitlistEntry::list_for_event(&state.db, event_id).await?;
    Ok(Json(json!({
        "success": true,
        "capacity": state.config.booking.waitlist_capacity,
        "entries": entries,
    })))
}

/// DELETE /api/waitlist/{event_id}
async fn leave_waitlist(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let removed = WaitlistEntry::remove(&state.db, event_id, user.id, &user.email).await?;
    if removed == 0 {
        return Err(AppError::not_found("You are not on the waitlist for this event."));
    }
    Ok(Json(json!({
        "success": true,
        "message": "You have successfully left the waitlist.",
    })))
}
