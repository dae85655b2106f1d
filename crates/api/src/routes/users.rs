//! User management routes

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::{hash_password, AuthUser},
    directory::{self, NewUser, UserChanges, UserRecord},
    error::{ApiError, ApiResult},
    state::AppState,
};

const VALID_GENDERS: &[&str] = &["male", "female"];
const VALID_CATEGORIES: &[&str] = &["Marketing", "Client", "Technique"];
const MIN_PASSWORD_LENGTH: usize = 6;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub gender: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub birthdate: Date,
    pub city: String,
    pub country: String,
    pub photo: String,
    pub category: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Profile fields a user may change about themselves; every field optional
#[derive(Debug, Default, Deserialize)]
pub struct ProfileFields {
    pub gender: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub birthdate: Option<Date>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub photo: Option<String>,
    pub category: Option<String>,
}

/// Admin update: profile fields plus the administrator flag
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(flatten)]
    pub fields: ProfileFields,
    pub is_admin: Option<bool>,
}

/// Sanitized user view; never carries the password hash
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub gender: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
    pub birthdate: Date,
    pub city: String,
    pub country: String,
    pub photo: String,
    pub category: String,
    pub is_admin: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            gender: user.gender,
            firstname: user.firstname,
            lastname: user.lastname,
            email: user.email,
            phone: user.phone,
            birthdate: user.birthdate,
            city: user.city,
            country: user.country,
            photo: user.photo,
            category: user.category,
            is_admin: user.is_admin,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: i64,
}

// =============================================================================
// Validation Helpers
// =============================================================================

/// Simplified RFC 5322 shape check; the store is the authority on uniqueness
fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > 254 {
        return false;
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }

    let (local, domain) = (parts[0], parts[1]);
    if local.is_empty() || domain.is_empty() {
        return false;
    }

    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn validate_gender(gender: &str) -> ApiResult<()> {
    if !VALID_GENDERS.contains(&gender) {
        return Err(ApiError::Validation(format!(
            "Invalid gender. Must be one of: {}",
            VALID_GENDERS.join(", ")
        )));
    }
    Ok(())
}

fn validate_category(category: &str) -> ApiResult<()> {
    if !VALID_CATEGORIES.contains(&category) {
        return Err(ApiError::Validation(format!(
            "Invalid category. Must be one of: {}",
            VALID_CATEGORIES.join(", ")
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> ApiResult<()> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

fn validate_name(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Merge a partial update onto an existing record, validating supplied
/// fields and re-hashing the password when one is given
async fn merge_changes(
    pool: &PgPool,
    existing: &UserRecord,
    fields: ProfileFields,
    is_admin: bool,
) -> ApiResult<UserChanges> {
    if let Some(ref gender) = fields.gender {
        validate_gender(gender)?;
    }
    if let Some(ref category) = fields.category {
        validate_category(category)?;
    }
    if let Some(ref firstname) = fields.firstname {
        validate_name("firstname", firstname)?;
    }
    if let Some(ref lastname) = fields.lastname {
        validate_name("lastname", lastname)?;
    }

    let email = match fields.email {
        Some(raw) => {
            let email = raw.trim().to_lowercase();
            if !is_valid_email(&email) {
                return Err(ApiError::Validation("Invalid email address".to_string()));
            }
            if email != existing.email {
                if let Some(other) = directory::find_by_email(pool, &email).await? {
                    if other.id != existing.id {
                        return Err(ApiError::EmailAlreadyExists);
                    }
                }
            }
            email
        }
        None => existing.email.clone(),
    };

    let password_hash = match fields.password {
        Some(password) => {
            validate_password(&password)?;
            let hash = hash_password(&password).map_err(|e| {
                tracing::error!(error = ?e, "Password hashing failed");
                ApiError::Internal
            })?;
            Some(hash)
        }
        None => None,
    };

    Ok(UserChanges {
        gender: fields.gender.unwrap_or_else(|| existing.gender.clone()),
        firstname: fields
            .firstname
            .unwrap_or_else(|| existing.firstname.clone()),
        lastname: fields.lastname.unwrap_or_else(|| existing.lastname.clone()),
        email,
        password_hash,
        phone: fields.phone.unwrap_or_else(|| existing.phone.clone()),
        birthdate: fields.birthdate.unwrap_or(existing.birthdate),
        city: fields.city.unwrap_or_else(|| existing.city.clone()),
        country: fields.country.unwrap_or_else(|| existing.country.clone()),
        photo: fields.photo.unwrap_or_else(|| existing.photo.clone()),
        category: fields.category.unwrap_or_else(|| existing.category.clone()),
        is_admin,
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// List all directory users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<UserListResponse>> {
    let users = directory::find_all(&state.pool).await?;
    let total = users.len() as i64;

    Ok(Json(UserListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
        total,
    }))
}

/// Get a specific user by ID
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    let user = directory::find_by_id(&state.pool, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(UserResponse::from(user)))
}

/// Create a new directory user (admin only)
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    validate_gender(&req.gender)?;
    validate_category(&req.category)?;
    validate_name("firstname", &req.firstname)?;
    validate_name("lastname", &req.lastname)?;
    validate_password(&req.password)?;

    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }

    if directory::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(ApiError::EmailAlreadyExists);
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!(error = ?e, "Password hashing failed");
        ApiError::Internal
    })?;

    let new_user = NewUser {
        gender: req.gender,
        firstname: req.firstname,
        lastname: req.lastname,
        email,
        password_hash,
        phone: req.phone,
        birthdate: req.birthdate,
        city: req.city,
        country: req.country,
        photo: req.photo,
        category: req.category,
        is_admin: req.is_admin,
    };

    // The unique index backs up the lookup above against concurrent creates;
    // a 23505 from the insert maps to the same conflict error
    let user = directory::insert_user(&state.pool, &new_user).await?;

    tracing::info!(user_id = %user.id, "User created");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Update any user (admin only); may change the administrator flag
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let existing = directory::find_by_id(&state.pool, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let is_admin = req.is_admin.unwrap_or(existing.is_admin);
    let changes = merge_changes(&state.pool, &existing, req.fields, is_admin).await?;

    let user = directory::update_user(&state.pool, user_id, &changes)
        .await?
        .ok_or(ApiError::NotFound)?;

    tracing::info!(user_id = %user.id, "User updated");
    Ok(Json(UserResponse::from(user)))
}

/// Update the caller's own profile; the administrator flag is not theirs to set
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(fields): Json<ProfileFields>,
) -> ApiResult<Json<UserResponse>> {
    let existing = directory::find_by_id(&state.pool, auth_user.id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let changes = merge_changes(&state.pool, &existing, fields, existing.is_admin).await?;

    let user = directory::update_user(&state.pool, auth_user.id, &changes)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    tracing::info!(user_id = %user.id, "Profile updated");
    Ok(Json(UserResponse::from(user)))
}

/// Remove a user from the directory (admin only)
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    // Locking yourself out is never what was meant
    if auth_user.id == user_id {
        return Err(ApiError::BadRequest("Cannot delete yourself".to_string()));
    }

    let deleted = directory::delete_user(&state.pool, user_id).await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }

    tracing::info!(user_id = %user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+tag@sub.example.org"));

        assert!(!is_valid_email(""));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("alice@nodot"));
        assert!(!is_valid_email("alice@.example.com"));
        assert!(!is_valid_email("a@b@c.com"));
    }

    #[test]
    fn test_gender_and_category_membership() {
        assert!(validate_gender("male").is_ok());
        assert!(validate_gender("female").is_ok());
        assert!(validate_gender("other").is_err());
        assert!(validate_gender("").is_err());

        assert!(validate_category("Marketing").is_ok());
        assert!(validate_category("Client").is_ok());
        assert!(validate_category("Technique").is_ok());
        assert!(validate_category("marketing").is_err());
        assert!(validate_category("Sales").is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("12345").is_err());
        assert!(validate_password("").is_err());
    }
}
