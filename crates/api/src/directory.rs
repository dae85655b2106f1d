//! User directory queries
//!
//! Persistence layer for user identity records. Lookups never return the
//! password hash except [`find_by_email_for_auth`], which exists solely for
//! credential verification.

use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// A user identity record as exposed to the rest of the application.
/// Deliberately carries no password hash.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
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

/// Row type for authentication lookups (includes the stored hash)
#[derive(Debug, FromRow)]
struct UserAuthRow {
    id: Uuid,
    gender: String,
    firstname: String,
    lastname: String,
    email: String,
    password_hash: String,
    phone: String,
    birthdate: Date,
    city: String,
    country: String,
    photo: String,
    category: String,
    is_admin: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl UserAuthRow {
    fn into_parts(self) -> (UserRecord, String) {
        (
            UserRecord {
                id: self.id,
                gender: self.gender,
                firstname: self.firstname,
                lastname: self.lastname,
                email: self.email,
                phone: self.phone,
                birthdate: self.birthdate,
                city: self.city,
                country: self.country,
                photo: self.photo,
                category: self.category,
                is_admin: self.is_admin,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            self.password_hash,
        )
    }
}

/// Fields for a new user record; the password arrives pre-hashed
#[derive(Debug)]
pub struct NewUser {
    pub gender: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    pub birthdate: Date,
    pub city: String,
    pub country: String,
    pub photo: String,
    pub category: String,
    pub is_admin: bool,
}

/// Full set of post-merge column values for an update.
/// `password_hash` is only written when a new password was supplied.
#[derive(Debug)]
pub struct UserChanges {
    pub gender: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub phone: String,
    pub birthdate: Date,
    pub city: String,
    pub country: String,
    pub photo: String,
    pub category: String,
    pub is_admin: bool,
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, gender, firstname, lastname, email, phone, birthdate,
               city, country, photo, category, is_admin, created_at, updated_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Case-insensitive email lookup, hash excluded
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, gender, firstname, lastname, email, phone, birthdate,
               city, country, photo, category, is_admin, created_at, updated_at
        FROM users
        WHERE LOWER(email) = LOWER($1)
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

/// Case-insensitive email lookup including the stored password hash.
/// Only the authentication service should call this.
pub async fn find_by_email_for_auth(
    pool: &PgPool,
    email: &str,
) -> Result<Option<(UserRecord, String)>, sqlx::Error> {
    let row: Option<UserAuthRow> = sqlx::query_as(
        r#"
        SELECT id, gender, firstname, lastname, email, password_hash, phone,
               birthdate, city, country, photo, category, is_admin,
               created_at, updated_at
        FROM users
        WHERE LOWER(email) = LOWER($1)
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(UserAuthRow::into_parts))
}

pub async fn find_all(pool: &PgPool) -> Result<Vec<UserRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, gender, firstname, lastname, email, phone, birthdate,
               city, country, photo, category, is_admin, created_at, updated_at
        FROM users
        ORDER BY lastname, firstname
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn count_users(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

pub async fn insert_user(pool: &PgPool, user: &NewUser) -> Result<UserRecord, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO users (gender, firstname, lastname, email, password_hash,
                           phone, birthdate, city, country, photo, category, is_admin)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id, gender, firstname, lastname, email, phone, birthdate,
                  city, country, photo, category, is_admin, created_at, updated_at
        "#,
    )
    .bind(&user.gender)
    .bind(&user.firstname)
    .bind(&user.lastname)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.phone)
    .bind(user.birthdate)
    .bind(&user.city)
    .bind(&user.country)
    .bind(&user.photo)
    .bind(&user.category)
    .bind(user.is_admin)
    .fetch_one(pool)
    .await
}

pub async fn update_user(
    pool: &PgPool,
    id: Uuid,
    changes: &UserChanges,
) -> Result<Option<UserRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE users
        SET gender = $2,
            firstname = $3,
            lastname = $4,
            email = $5,
            password_hash = COALESCE($6, password_hash),
            phone = $7,
            birthdate = $8,
            city = $9,
            country = $10,
            photo = $11,
            category = $12,
            is_admin = $13,
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, gender, firstname, lastname, email, phone, birthdate,
                  city, country, photo, category, is_admin, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(&changes.gender)
    .bind(&changes.firstname)
    .bind(&changes.lastname)
    .bind(&changes.email)
    .bind(changes.password_hash.as_deref())
    .bind(&changes.phone)
    .bind(changes.birthdate)
    .bind(&changes.city)
    .bind(&changes.country)
    .bind(&changes.photo)
    .bind(&changes.category)
    .bind(changes.is_admin)
    .fetch_optional(pool)
    .await
}

pub async fn delete_user(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}
