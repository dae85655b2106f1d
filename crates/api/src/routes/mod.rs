//! API routes

pub mod auth;
pub mod health;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{
    auth::{require_admin, require_auth},
    state::AppState,
};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    // Health check route (at root level for infrastructure monitoring)
    let health_routes = Router::new().route("/health", get(health::health));

    // Public API routes (no auth required) - under /api/v1
    let public_api_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout));

    // Routes any authenticated user can reach
    let member_api_routes = Router::new()
        .route("/auth/profile", get(auth::profile))
        .route("/profile", put(users::update_profile))
        .route("/users", get(users::list_users))
        .route("/users/:user_id", get(users::get_user));

    // Directory mutations are restricted to administrators
    let admin_api_routes = Router::new()
        .route("/users", post(users::create_user))
        .route("/users/:user_id", put(users::update_user))
        .route("/users/:user_id", delete(users::delete_user))
        .route_layer(middleware::from_fn(require_admin));

    // Apply auth middleware to everything behind the gate
    let protected_api_routes = member_api_routes
        .merge(admin_api_routes)
        .layer(middleware::from_fn_with_state(auth_state, require_auth));

    // Combine API routes under /api/v1 prefix
    let api_v1_routes = Router::new()
        .merge(public_api_routes)
        .merge(protected_api_routes);

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_v1_routes)
        // Global request body size limit to prevent oversized payloads
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}
