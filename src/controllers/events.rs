use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::pricing::CategoryTable;
use crate::domain::seat_map::{self, Seat, SeatSelection};
use crate::domain::validation::{EventForm, DATE_TAKEN};
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::Event;
use crate::search_client::{EventPage, EventSearch};
use crate::AppState;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(search_events).post(create_event))
        .route("/events/{id}", get(get_event).put(update_event))
        .route("/events/{id}/seats", get(get_seat_map))
        .route("/events/{id}/seats/hold", post(hold_seats))
        .route("/events/{id}/seats/release", post(release_seats))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub query: Option<String>,
    pub date: Option<String>,
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

async fn load_event(state: &AppState, id: i64) -> AppResult<Event> {
    Event::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Event not found"))
}

fn can_edit(user: &AuthUser, event: &Event) -> bool {
    user.is_admin() || event.is_owned_by(&user.email)
}

/// GET /api/events
pub async fn search_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> AppResult<Response> {
    let date = match params.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => Some(
            NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|_| AppError::validation("Date must be in YYYY-MM-DD format."))?,
        ),
        None => None,
    };
    let search = EventSearch::new(params.query.as_deref(), date, params.page, params.page_size);

    // 1. Ключ кеша из нормализованных параметров
    let cache_key = state
        .cache
        .listing_key(
            &search.query,
            &date.map(|d| d.to_string()).unwrap_or_default(),
            search.page,
            search.page_size,
        )
        .await;

    // 2. Cache hit
    if let Some(cached_json) = state.cache.get_cached_listing(&cache_key).await {
        return Ok((
            [(header::CONTENT_TYPE, "application/json"), (X_CACHE, "HIT")],
            cached_json,
        )
            .into_response());
    }

    // 3. Cache miss: идём в базу
    let (events, total) = state.search_client.search_events(&search).await?;
    let body = EventPage::new(events, total, &search);

    // 4. Сохраняем в кеш
    let json_str = serde_json::to_string(&body).map_err(|e| AppError::Internal(e.into()))?;
    state.cache.cache_listing(&cache_key, &json_str).await;

    Ok((
        [(header::CONTENT_TYPE, "application/json"), (X_CACHE, "MISS")],
        json_str,
    )
        .into_response())
}

/// GET /api/events/{id}
async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    user: Option<AuthUser>,
) -> AppResult<impl IntoResponse> {
    let event = load_event(&state, id).await?;
    let include_promos = user.as_ref().is_some_and(|u| can_edit(u, &event));
    Ok(Json(json!({ "success": true, "event": event.view(include_promos) })))
}

/// POST /api/events
async fn create_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(form): Json<EventForm>,
) -> AppResult<impl IntoResponse> {
    user.require_event_manager()?;
    let form = form.check()?;

    if Event::date_taken(&state.db, form.date, None).await? {
        return Err(AppError::conflict(DATE_TAKEN));
    }

    let event = Event::insert(&state.db, &form, &user.email).await?;
    state.cache.invalidate_events().await;
    tracing::info!("Event {} '{}' created by {}", event.id, event.title, user.email);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Event created successfully!",
            "event": event.view(true),
        })),
    ))
}

/// PUT /api/events/{id}
async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    user: AuthUser,
    Json(form): Json<EventForm>,
) -> AppResult<impl IntoResponse> {
    user.require_event_manager()?;
    let existing = load_event(&state, id).await?;
    if !can_edit(&user, &existing) {
        return Err(AppError::Forbidden);
    }
    let form = form.check()?;

    if Event::date_taken(&state.db, form.date, Some(id)).await? {
        return Err(AppError::conflict(DATE_TAKEN));
    }

    let event = Event::update(&state.db, id, &form)
        .await?
        .ok_or_else(|| AppError::not_found("Event not found"))?;
    state.cache.invalidate_events().await;
    tracing::info!("Event {} updated by {}", id, user.email);

    Ok(Json(json!({ "success": true, "event": event.view(true) })))
}

// --- Схема зала и холды ---

#[derive(Debug, Serialize)]
struct SeatView<'a> {
    #[serde(flatten)]
    seat: &'a Seat,
    held: bool,
}

#[derive(Debug, Serialize)]
struct SeatMapResponse<'a> {
    success: bool,
    event_id: i64,
    lower_foyer: Vec<Vec<SeatView<'a>>>,
    balcony: Vec<Vec<SeatView<'a>>>,
    categories: CategoryTable,
    available_seats: i64,
}

fn seat_rows<'a>(rows: &'a [Vec<Seat>], held: &HashSet<String>) -> Vec<Vec<SeatView<'a>>> {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|seat| SeatView { held: !seat.booked && held.contains(&seat.id), seat })
                .collect()
        })
        .collect()
}

/// GET /api/events/{id}/seats
async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let event = load_event(&state, id).await?;
    let map = seat_map::generate(&event.seat_configuration, &event.booked_seats);
    let held = state.cache.held_seats(id).await;

    let body = SeatMapResponse {
        success: true,
        event_id: id,
        lower_foyer: seat_rows(map.lower_foyer(), &held),
        balcony: seat_rows(map.balcony(), &held),
        categories: seat_map::category_table(&event.ticket_categories),
        available_seats: event.available_seats(),
    };
    Ok(Json(serde_json::to_value(&body).map_err(|e| AppError::Internal(e.into()))?))
}

#[derive(Debug, Deserialize)]
struct SeatsRequest {
    #[serde(default)]
    seats: Vec<String>,
}

/// POST /api/events/{id}/seats/hold
async fn hold_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    user: AuthUser,
    Json(req): Json<SeatsRequest>,
) -> AppResult<impl IntoResponse> {
    let event = load_event(&state, id).await?;
    let map = seat_map::generate(&event.seat_configuration, &event.booked_seats);
    let requested: Vec<SeatSelection> = req.seats.iter().map(|s| SeatSelection::regular(s)).collect();
    let seats: Vec<String> = map.resolve(&requested)?.into_iter().map(|s| s.seat).collect();

    let ttl = state.config.booking.seat_hold_seconds;
    let conflicts = state.cache.hold_seats(id, &seats, user.id, ttl).await?;
    if !conflicts.is_empty() {
        return Err(AppError::conflict(format!(
            "Seats already held by another customer: {}",
            conflicts.join(", ")
        )));
    }

    Ok(Json(json!({ "success": true, "held": seats, "expires_in": ttl })))
}

/// POST /api/events/{id}/seats/release
async fn release_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    user: AuthUser,
    Json(req): Json<SeatsRequest>,
) -> AppResult<impl IntoResponse> {
    let released = state.cache.release_seats(id, &req.seats, user.id).await?;
    Ok(Json(json!({ "success": true, "released": released })))
}
