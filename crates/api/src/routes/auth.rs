//! Authentication routes

use axum::{
    extract::{Extension, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{clear_token_cookie, AuthUser, TOKEN_COOKIE},
    directory,
    error::{ApiError, ApiResult},
    state::AppState,
};

use super::users::UserResponse;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `Set-Cookie` value carrying the issued token
fn token_cookie(token: &str, max_age_seconds: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{TOKEN_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Login with email and password
///
/// On success, sets the token as an HTTP-only cookie and returns the
/// sanitized user. Unknown email and wrong password are indistinguishable
/// in both the response and, thanks to the floor below, response timing.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    let start = std::time::Instant::now();
    const MIN_RESPONSE_TIME: std::time::Duration = std::time::Duration::from_millis(500);

    let result = login_inner(&state, &req).await;

    // Ensure minimum response time to prevent timing attacks
    let elapsed = start.elapsed();
    if elapsed < MIN_RESPONSE_TIME {
        tokio::time::sleep(MIN_RESPONSE_TIME - elapsed).await;
    }

    result
}

/// Inner login logic (extracted for timing protection wrapper)
async fn login_inner(state: &AppState, req: &LoginRequest) -> ApiResult<Response> {
    // Reject incomplete credentials before touching the directory or hasher
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let email = req.email.trim().to_lowercase();

    let outcome = state
        .auth
        .login(&email, &req.password)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let cookie = token_cookie(
        &outcome.token,
        state.auth.token_expiry_seconds(),
        state.config.cookie_secure,
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            user: UserResponse::from(outcome.user),
        }),
    )
        .into_response())
}

/// Logout: discard the token cookie
///
/// Succeeds regardless of whether the caller held a valid token; with
/// stateless tokens there is nothing server-side to revoke.
pub async fn logout() -> Response {
    (
        [(header::SET_COOKIE, clear_token_cookie())],
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
        .into_response()
}

/// Get current user profile
pub async fn profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<UserResponse>> {
    let user = directory::find_by_id(&state.pool, auth_user.id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(UserResponse::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_cookie_attributes() {
        let cookie = token_cookie("abc123", 3600, false);
        assert!(cookie.starts_with("token=abc123;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(!cookie.contains("Secure"));

        let cookie = token_cookie("abc123", 3600, true);
        assert!(cookie.ends_with("; Secure"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_token_cookie();
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
