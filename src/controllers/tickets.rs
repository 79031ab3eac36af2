//! tickets.rs
//!
//! Оформление заказа и электронные билеты:
//! - `POST /tickets/quote` считает сумму с промокодом, ничего не сохраняя;
//! - `POST /tickets` покупает места (оплата симулируется) и выдаёт e-ticket;
//! - `POST /tickets/{id}/cancel` отменяет билет не позднее окна отмены.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::domain::policy::seat_type_summary;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::Ticket;
use crate::services::booking::{self, PurchaseRequest};
use crate::services::payment::PaymentMethod;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets", get(list_tickets).post(purchase))
        .route("/tickets/quote", post(quote))
        .route("/tickets/{id}", get(get_ticket))
        .route("/tickets/{id}/cancel", post(cancel))
}

fn ticket_json(ticket: &Ticket) -> serde_json::Value {
    json!({
        "ticket": ticket,
        "seat_summary": seat_type_summary(&ticket.seat_details, &ticket.category_table),
    })
}

#[derive(Debug, Deserialize)]
struct QuoteRequest {
    event_id: i64,
    #[serde(default)]
    seats: String,
    promo_code: Option<String>,
}

/// POST /api/tickets/quote
async fn quote(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuoteRequest>,
) -> AppResult<impl IntoResponse> {
    let order = booking::quote(&state, req.event_id, &req.seats, req.promo_code.as_deref()).await?;
    Ok(Json(json!({
        "success": true,
        "quote": order.quote,
        "seat_summary": seat_type_summary(&order.selections, &order.table),
    })))
}

#[derive(Debug, Deserialize)]
struct PurchaseBody {
    event_id: i64,
    #[serde(default)]
    seats: String,
    promo_code: Option<String>,
    payment_method: String,
}

/// POST /api/tickets
async fn purchase(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<PurchaseBody>,
) -> AppResult<impl IntoResponse> {
    let payment_method: PaymentMethod = body
        .payment_method
        .parse()
        .map_err(|e: crate::services::payment::PaymentError| AppError::validation(e.to_string()))?;

    let req = PurchaseRequest {
        event_id: body.event_id,
        seat_data: body.seats,
        promo_code: body.promo_code,
        payment_method,
    };
    let ticket = booking::purchase(&state, user.id, &req).await?;

    let mut payload = ticket_json(&ticket);
    payload["success"] = json!(true);
    payload["message"] = json!("Payment successful! Ticket saved 🎉");
    Ok((StatusCode::CREATED, Json(payload)))
}

/// GET /api/tickets
async fn list_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let tickets = Ticket::list_for_user(&state.db, user.id).await?;
    Ok(Json(json!({ "success": true, "tickets": tickets })))
}

/// GET /api/tickets/{id}
async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let ticket = Ticket::find_for_user(&state.db, id, user.id)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket not found"))?;

    let mut payload = ticket_json(&ticket);
    payload["success"] = json!(true);
    Ok(Json(payload))
}

/// POST /api/tickets/{id}/cancel
async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let ticket = booking::cancel(&state, user.id, id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Booking cancelled successfully!",
        "ticket_id": ticket.id,
        "released_seats": ticket.seats,
    })))
}
