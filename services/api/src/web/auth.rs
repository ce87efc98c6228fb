//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, provider sign-in,
//! password reset, logout, and account deletion. Credential checks are
//! delegated to the identity provider port; this layer owns the session
//! cookie and the lazily mirrored profile document.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use storyincolor_core::domain::{AuthUser, ProjectStatus, UserProfile};
use storyincolor_core::notify::NotificationKind;
use storyincolor_core::ports::PortError;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::web::middleware::CurrentUser;
use crate::web::state::{AppState, AUTH_SESSION_DAYS};
use crate::web::error_response;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ProviderSignInRequest {
    pub token: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: String,
    pub email: String,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn session_cookie(token: &str) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        token,
        Duration::days(AUTH_SESSION_DAYS).num_seconds()
    )
}

/// Mirror profile fields into the document store. Best-effort: a failure here
/// must not fail the sign-in itself.
async fn mirror_profile(state: &Arc<AppState>, user: &AuthUser) {
    let profile = UserProfile {
        user_id: user.id.clone(),
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        deleted: false,
        deleted_at: None,
    };
    if let Err(err) = state.projects.upsert_user_profile(&profile).await {
        warn!(user_id = user.id.as_str(), error = %err, "Failed to mirror user profile");
    }
}

/// Fire-and-forget welcome notification. Failure is logged and swallowed;
/// it must never fail the sign-up.
fn send_welcome(state: &Arc<AppState>, user: &AuthUser) {
    let notifier = state.notifier.clone();
    let payload = json!({
        "userId": user.id.clone(),
        "email": user.email.clone(),
    });
    tokio::spawn(async move {
        if let Err(err) = notifier.dispatch(NotificationKind::Welcome, payload).await {
            error!(error = %err, "Error sending welcome email");
        }
    });
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 401, description = "The identity provider rejected the request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Create the account at the identity provider
    let user = state
        .identity
        .sign_up(&req.email, &req.password)
        .await
        .map_err(error_response)?;

    // 2. Mirror the profile document
    mirror_profile(&state, &user).await;

    // 3. Welcome email, fire-and-forget
    send_welcome(&state, &user);

    // 4. Create the session cookie
    let token = state.auth_sessions.create(&user.id, user.email.as_deref());

    let response = AuthResponse {
        user_id: user.id,
        email: user.email.unwrap_or_default(),
    };
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&token))],
        Json(response),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = state
        .identity
        .sign_in(&req.email, &req.password)
        .await
        .map_err(|err| {
            error!(error = %err, "Failed to sign in");
            (
                StatusCode::UNAUTHORIZED,
                "Invalid email or password".to_string(),
            )
        })?;

    mirror_profile(&state, &user).await;

    let token = state.auth_sessions.create(&user.id, user.email.as_deref());
    let response = AuthResponse {
        user_id: user.id,
        email: user.email.unwrap_or_default(),
    };
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&token))],
        Json(response),
    ))
}

/// POST /auth/provider - Sign in with the federated provider.
/// Only first-time users receive the welcome email.
pub async fn provider_sign_in_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProviderSignInRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .identity
        .sign_in_with_provider(&req.token)
        .await
        .map_err(error_response)?;

    mirror_profile(&state, &outcome.user).await;

    if outcome.is_new_user {
        send_welcome(&state, &outcome.user);
    } else {
        info!("Existing user login - no welcome email sent");
    }

    let token = state
        .auth_sessions
        .create(&outcome.user.id, outcome.user.email.as_deref());
    let response = AuthResponse {
        user_id: outcome.user.id,
        email: outcome.user.email.unwrap_or_default(),
    };
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&token))],
        Json(response),
    ))
}

/// POST /auth/reset-password - Send a password reset to the given address
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .identity
        .reset_password(&req.email)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::OK)
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Extract session cookie
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    // 2. Parse session token from cookie
    let token = cookie_header
        .split(';')
        .find_map(|c| {
            let c = c.trim();
            c.strip_prefix("session=")
        })
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    // 3. Drop the session
    state.auth_sessions.remove(token);

    // 4. Clear cookie
    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

/// DELETE /auth/account - Soft-delete the caller's account.
///
/// Storage is cleaned up best-effort, every project is soft-deleted, and the
/// profile document keeps a deleted flag + timestamp rather than being
/// removed, preserving referential history.
pub async fn delete_account_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Best-effort storage cleanup for everything the user owns
    let prefix = format!("users/{}/", user.id);
    if let Err(err) = state.assets.delete_all(&prefix).await {
        warn!(user_id = user.id.as_str(), error = %err, "Storage cleanup failed during account deletion");
    }

    // 2. Soft-delete every project, whatever its status
    for status in [
        ProjectStatus::Draft,
        ProjectStatus::Preview,
        ProjectStatus::PaymentPending,
        ProjectStatus::Ordered,
    ] {
        let projects = state
            .projects
            .list_projects_by_status(&user.id, status)
            .await
            .map_err(error_response)?;
        for project in projects {
            match state.projects.soft_delete_project(&user.id, &project.id).await {
                Ok(()) | Err(PortError::NotFound(_)) => {}
                Err(err) => return Err(error_response(err)),
            }
        }
    }

    // 3. Mark the profile document deleted
    state
        .projects
        .soft_delete_user(&user.id)
        .await
        .map_err(error_response)?;

    info!(user_id = user.id.as_str(), "Account soft-deleted");
    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}
