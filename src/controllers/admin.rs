use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::json;
use std::sync::Arc;

use super::auth::create_user;
use crate::domain::validation::SignupRequest;
use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin/users", post(register_user))
}

/// POST /api/admin/users — администратор зала заводит пользователя с любой ролью
async fn register_user(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Json(req): Json<SignupRequest>,
) -> AppResult<impl IntoResponse> {
    admin.require_admin()?;
    let role = req.check()?;
    let user = create_user(&state, &req, role).await?;
    tracing::info!("Admin {} registered {} as {}", admin.email, user.email, user.role);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Registration successful!",
            "user": user,
        })),
    ))
}
