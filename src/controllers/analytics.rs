//! analytics.rs
//!
//! Отчёты для панелей организатора и администратора зала.
//! Агрегация целиком в `domain::reports`; здесь только загрузка данных.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::domain::reports::{self, ReportInput, ReportType, Viewer};
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{Event, Ticket};
use crate::AppState;

/// Определяет маршруты, связанные с аналитикой.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/reports", get(get_report))
}

#[derive(Debug, Deserialize)]
struct ReportQuery {
    #[serde(rename = "type")]
    report_type: String,
    #[serde(default)]
    period: String,
}

/// GET /api/reports?type=revenue&period=weekly
async fn get_report(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportQuery>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    user.require_event_manager()?;
    let report_type: ReportType = params
        .report_type
        .parse()
        .map_err(|e: reports::UnknownReportType| AppError::validation(e.to_string()))?;

    let events = Event::all(&state.db).await?;
    let tickets = Ticket::all(&state.db).await?;
    let viewer = Viewer { email: &user.email, role: user.role };
    let input = ReportInput { events: &events, tickets: &tickets, now: Utc::now().naive_utc() };

    let report = reports::generate(report_type, &params.period, &viewer, &input);
    tracing::debug!(
        "Report {:?}/{} for {}: {} points",
        report_type,
        params.period,
        user.email,
        report.series.len()
    );

    Ok(Json(json!({ "success": true, "report": report })))
}
