//! auth.rs
//!
//! Регистрация, вход по email или телефону, выход и сброс пароля.
//!
//! После входа клиент получает токен в ответе и в cookie `session`;
//! `redirect` подсказывает, на какую страницу вести пользователя по его роли.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::validation::{
    ForgotPasswordRequest, LoginRequest, PhoneLoginRequest, ResetPasswordRequest, SignupRequest,
    EMAIL_TAKEN,
};
use crate::error::{AppError, AppResult};
use crate::middleware::session::{expired_session_cookie, issue_token, session_cookie};
use crate::middleware::AuthUser;
use crate::models::{Role, User};
use crate::AppState;

const RESET_TOKEN_TTL_SECONDS: u64 = 3600;
const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent.";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/login/phone", post(login_phone))
        .route("/logout", post(logout))
        .route("/check-auth", get(check_auth))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/{token}", post(reset_password))
}

// --- Вспомогательные функции ---

fn hash_password(password: &str) -> AppResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| AppError::Internal(e.into()))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Создаёт пользователя с уже проверенной ролью
pub(crate) async fn create_user(state: &AppState, req: &SignupRequest, role: Role) -> AppResult<User> {
    let email = req.email.trim().to_lowercase();
    if User::find_by_email(&email, &state.db).await?.is_some() {
        return Err(AppError::conflict(EMAIL_TAKEN));
    }

    let password_hash = hash_password(&req.password)?;
    let optional = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let phone = optional(&req.phone);
    let organization = optional(&req.organization);

    let user = User::insert(
        &state.db,
        req.name.trim(),
        &email,
        &password_hash,
        role,
        phone.as_deref(),
        organization.as_deref(),
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::conflict(EMAIL_TAKEN)
        } else {
            AppError::Database(e)
        }
    })?;

    info!("Registered user {} with role {}", user.email, user.role);
    Ok(user)
}

/// Ответ на успешный вход: токен, пользователь, страница по роли + cookie
fn login_response(state: &AppState, user: User) -> AppResult<impl IntoResponse> {
    let token = issue_token(&user, &state.config.jwt).map_err(|e| AppError::Internal(e.into()))?;
    let cookie = session_cookie(
        &token,
        state.config.jwt.expires_in_hours * 3600,
        state.config.is_production(),
    );
    info!("User {} logged in", user.email);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "success": true,
            "message": format!("Welcome, {}!", user.name),
            "token": token,
            "redirect": user.role.landing_page(),
            "user": user,
        })),
    ))
}

// --- Регистрация и вход ---

/// POST /api/auth/signup
async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> AppResult<impl IntoResponse> {
    let role = req.check()?;
    // Администратора зала создаёт только другой администратор
    if role == Role::AuditoriumAdmin {
        return Err(AppError::Forbidden);
    }
    let user = create_user(&state, &req, role).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Registration successful! Please login.",
            "user": user,
        })),
    ))
}

/// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    req.check()?;
    let user = User::find_by_email(&req.email.trim().to_lowercase(), &state.db)
        .await?
        .filter(|u| u.verify_password(&req.password))
        .ok_or_else(|| AppError::Credentials("Email or password is incorrect / not registered.".into()))?;

    login_response(&state, user)
}

/// POST /api/auth/login/phone
async fn login_phone(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PhoneLoginRequest>,
) -> AppResult<impl IntoResponse> {
    req.check()?;
    let user = User::find_by_phone(req.phone.trim(), &state.db)
        .await?
        .filter(|u| u.verify_password(&req.password))
        .ok_or_else(|| {
            AppError::Credentials("Phone number or password is incorrect / not registered.".into())
        })?;

    login_response(&state, user)
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    if let Some(claims) = &user.session {
        state.cache.revoke_session(&claims.jti, claims.remaining_seconds()).await?;
    }
    info!("User {} logged out", user.email);

    Ok((
        [(header::SET_COOKIE, expired_session_cookie())],
        Json(json!({ "success": true, "message": "Logged out" })),
    ))
}

/// GET /api/auth/check-auth
async fn check_auth(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let user = User::find_by_id(user.id, &state.db)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(json!({ "success": true, "user": user })))
}

// --- Сброс пароля ---

/// POST /api/auth/forgot-password
///
/// Ответ одинаковый независимо от того, есть ли такой аккаунт.
async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    req.check()?;
    let email = req.email.trim().to_lowercase();

    match User::find_by_email(&email, &state.db).await? {
        Some(user) => {
            let token = Uuid::new_v4().simple().to_string();
            state
                .cache
                .store_reset_token(&token, &user.email, RESET_TOKEN_TTL_SECONDS)
                .await?;
            // Почты нет: ссылку видно в логах
            info!("Password reset link for {}: /reset-password/{}", user.email, token);
        }
        None => warn!("Password reset requested for unknown email {}", email),
    }

    Ok(Json(json!({ "success": true, "message": FORGOT_PASSWORD_MESSAGE })))
}

/// POST /api/auth/reset-password/{token}
async fn reset_password(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    req.check(&token)?;

    let email = state
        .cache
        .take_reset_token(&token)
        .await?
        .ok_or_else(|| AppError::validation("Password reset link is invalid or has expired."))?;

    let password_hash = hash_password(&req.password)?;
    if !User::update_password(&state.db, &email, &password_hash).await? {
        return Err(AppError::not_found("User not found"));
    }
    info!("Password reset for {}", email);

    Ok(Json(json!({
        "success": true,
        "message": "Your password has been reset successfully.",
    })))
}
