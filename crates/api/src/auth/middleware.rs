//! Authentication middleware for Axum

use axum::{
    extract::{Request, State},
    http::{
        header::{self, AUTHORIZATION, COOKIE},
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use super::service::AuthService;

/// Cookie used for token transport when the Authorization header is absent
pub const TOKEN_COOKIE: &str = "token";

/// Resolved identity attached to the request by `require_auth`.
/// Built from the freshly loaded directory record, not the token claims,
/// so a revoked admin flag takes effect immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
}

/// State needed for authentication
#[derive(Clone)]
pub struct AuthState {
    pub auth: AuthService,
}

/// Where the bearer token was found; a rejected cookie token also gets the
/// cookie cleared so clients are not stuck with a permanently invalid one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSource {
    Header,
    Cookie,
}

fn extract_token_from_cookie(request: &Request) -> Option<String> {
    request
        .headers()
        .get(COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| {
            for cookie in cookies.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("token=") {
                    return Some(token.to_string());
                }
            }
            None
        })
}

/// Extract bearer token from Authorization header or cookie.
/// The header takes precedence when both are present.
fn extract_bearer_token(request: &Request) -> Option<(String, TokenSource)> {
    if let Some(header) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = header.strip_prefix("Bearer ") {
            return Some((token.to_string(), TokenSource::Header));
        }
    }

    extract_token_from_cookie(request).map(|token| (token, TokenSource::Cookie))
}

/// `Set-Cookie` value that discards the token cookie
pub fn clear_token_cookie() -> String {
    format!("{TOKEN_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn reject_invalid_token(source: TokenSource) -> Response {
    let mut response = AuthError::InvalidToken.into_response();
    if source == TokenSource::Cookie {
        if let Ok(value) = HeaderValue::from_str(&clear_token_cookie()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Middleware that requires authentication.
///
/// Verifies the token, resolves the subject against the directory, and
/// attaches the resulting [`AuthUser`] to the request extensions. A gate,
/// not a transform: the request body is never touched.
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let (token, source) = match extract_bearer_token(&request) {
        Some(found) => found,
        None => {
            tracing::warn!(path = %path, "require_auth: no token in header or cookie");
            return AuthError::MissingAuth.into_response();
        }
    };

    let claims = match auth_state.auth.verify_token(&token) {
        Some(claims) => claims,
        None => {
            tracing::warn!(path = %path, "require_auth: token verification failed");
            return reject_invalid_token(source);
        }
    };

    // A valid signature is not enough: the account may have been deleted
    // after the token was issued
    let user = match auth_state.auth.resolve_claims(&claims).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(path = %path, subject = %claims.sub, "require_auth: subject no longer exists");
            return AuthError::InvalidToken.into_response();
        }
        Err(e) => {
            tracing::error!(path = %path, error = ?e, "require_auth: directory lookup failed");
            return AuthError::DatabaseError.into_response();
        }
    };

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        email: user.email,
        is_admin: user.is_admin,
    });
    next.run(request).await
}

/// Middleware restricting a route to administrators.
/// Must be layered after `require_auth`; rejects as unauthenticated if the
/// identity is missing.
pub async fn require_admin(request: Request, next: Next) -> Response {
    match request.extensions().get::<AuthUser>() {
        None => AuthError::MissingAuth.into_response(),
        Some(user) if !user.is_admin => {
            tracing::warn!(user_id = %user.id, "require_admin: administrator rights required");
            AuthError::AdminRequired.into_response()
        }
        Some(_) => next.run(request).await,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Administrator rights required")]
    AdminRequired,
    #[error("Database error")]
    DatabaseError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            AuthError::AdminRequired => {
                (StatusCode::FORBIDDEN, "Administrator rights required")
            }
            AuthError::DatabaseError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtManager;
    use axum::{body::Body, middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    fn request_with_headers(headers: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_extract_bearer_token_header() {
        let request = request_with_headers(&[("authorization", "Bearer abc123")]);
        let (token, source) = extract_bearer_token(&request).unwrap();
        assert_eq!(token, "abc123");
        assert_eq!(source, TokenSource::Header);
    }

    #[test]
    fn test_extract_bearer_token_cookie_fallback() {
        let request = request_with_headers(&[("cookie", "theme=dark; token=abc123")]);
        let (token, source) = extract_bearer_token(&request).unwrap();
        assert_eq!(token, "abc123");
        assert_eq!(source, TokenSource::Cookie);
    }

    #[test]
    fn test_extract_bearer_token_header_wins_over_cookie() {
        let request = request_with_headers(&[
            ("authorization", "Bearer from-header"),
            ("cookie", "token=from-cookie"),
        ]);
        let (token, source) = extract_bearer_token(&request).unwrap();
        assert_eq!(token, "from-header");
        assert_eq!(source, TokenSource::Header);
    }

    #[test]
    fn test_extract_bearer_token_absent() {
        let request = request_with_headers(&[("authorization", "Basic dXNlcg==")]);
        assert!(extract_bearer_token(&request).is_none());

        let request = request_with_headers(&[]);
        assert!(extract_bearer_token(&request).is_none());
    }

    /// Auth state backed by a pool that never connects; any query would fail,
    /// so reaching the directory shows up as a 500 instead of a 401
    fn offline_auth_state() -> AuthState {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://nobody@localhost:1/unreachable")
            .unwrap();
        AuthState {
            auth: AuthService::new(pool, JwtManager::new("test-secret-key-at-least-32-chars!", 60)),
        }
    }

    fn protected_router(auth_state: AuthState) -> Router {
        Router::new()
            .route("/protected", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(auth_state, require_auth))
    }

    #[tokio::test]
    async fn test_require_auth_missing_token_rejects_without_directory() {
        let app = protected_router(offline_auth_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_auth_corrupt_cookie_token_clears_cookie() {
        let app = protected_router(offline_auth_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("cookie", "token=corrupt.token.value")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .unwrap();
        assert!(set_cookie.starts_with("token=;"));
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_require_auth_corrupt_header_token_keeps_cookie() {
        let app = protected_router(offline_auth_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("authorization", "Bearer corrupt.token.value")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    fn admin_router() -> Router {
        Router::new()
            .route("/admin", get(|| async { "ok" }))
            .layer(middleware::from_fn(require_admin))
    }

    fn test_auth_user(is_admin: bool) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            is_admin,
        }
    }

    #[tokio::test]
    async fn test_require_admin_without_identity() {
        let app = admin_router();

        let response = app
            .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_admin_rejects_non_admin_with_forbidden() {
        let app = admin_router().layer(Extension(test_auth_user(false)));

        let response = app
            .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_require_admin_allows_admin() {
        let app = admin_router().layer(Extension(test_auth_user(true)));

        let response = app
            .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_end_to_end_login_and_protected_request() {
        use crate::auth::password::hash_password;
        use crate::directory::{self, NewUser};
        use time::macros::date;

        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        let auth = AuthService::new(
            pool.clone(),
            JwtManager::new("test-secret-key-at-least-32-chars!", 60),
        );

        let email = format!("alice-{}@example.com", Uuid::new_v4());
        let alice = directory::insert_user(
            &pool,
            &NewUser {
                gender: "female".to_string(),
                firstname: "Alice".to_string(),
                lastname: "Martin".to_string(),
                email: email.clone(),
                password_hash: hash_password("correct-secret").expect("hashing failed"),
                phone: "+33612345678".to_string(),
                birthdate: date!(1990 - 05 - 14),
                city: "Lyon".to_string(),
                country: "France".to_string(),
                photo: "https://example.com/alice.jpg".to_string(),
                category: "Technique".to_string(),
                is_admin: false,
            },
        )
        .await
        .expect("Failed to create test user");

        // Wrong secret fails and issues no token
        let failed = auth
            .login(&email, "wrong-secret")
            .await
            .expect("login query failed");
        assert!(failed.is_none());

        // Correct secret yields a token
        let outcome = auth
            .login(&email, "correct-secret")
            .await
            .expect("login query failed")
            .expect("expected a successful login");

        // A request bearing that token reaches the handler with Alice resolved
        let app = Router::new()
            .route(
                "/protected",
                get(|Extension(user): Extension<AuthUser>| async move { user.email }),
            )
            .layer(middleware::from_fn_with_state(
                AuthState { auth: auth.clone() },
                require_auth,
            ));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("authorization", format!("Bearer {}", outcome.token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&body), email);

        directory::delete_user(&pool, alice.id).await.ok();
    }
}
