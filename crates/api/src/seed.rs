//! Startup seeding
//!
//! Populates the directory from a JSON file when the users table is empty,
//! so a fresh deployment has an administrator to log in with. Idempotent:
//! a non-empty table skips seeding entirely.

use serde::Deserialize;
use sqlx::PgPool;
use time::Date;

use crate::auth::hash_password;
use crate::directory::{self, NewUser};

/// A seed entry; `password` is the plain initial password, hashed on insert
#[derive(Debug, Deserialize)]
struct SeedUser {
    gender: String,
    firstname: String,
    lastname: String,
    email: String,
    password: String,
    phone: String,
    birthdate: Date,
    city: String,
    country: String,
    photo: String,
    category: String,
    #[serde(default)]
    is_admin: bool,
}

pub async fn ensure_seed_data(pool: &PgPool, seed_file: &str) -> anyhow::Result<()> {
    let count = directory::count_users(pool).await?;
    if count > 0 {
        tracing::info!(user_count = count, "Users table is not empty, skipping seed");
        return Ok(());
    }

    let contents = match tokio::fs::read_to_string(seed_file).await {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(path = seed_file, error = ?e, "Seed file not readable, skipping seed");
            return Ok(());
        }
    };

    let seed_users: Vec<SeedUser> = serde_json::from_str(&contents)?;
    if seed_users.is_empty() {
        tracing::info!(path = seed_file, "No users in seed file");
        return Ok(());
    }

    let mut inserted = 0usize;
    for seed_user in seed_users {
        let email = seed_user.email.trim().to_lowercase();

        let password_hash = match hash_password(&seed_user.password) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::error!(email = %email, error = ?e, "Skipping seed user, hashing failed");
                continue;
            }
        };

        let new_user = NewUser {
            gender: seed_user.gender,
            firstname: seed_user.firstname,
            lastname: seed_user.lastname,
            email: email.clone(),
            password_hash,
            phone: seed_user.phone,
            birthdate: seed_user.birthdate,
            city: seed_user.city,
            country: seed_user.country,
            photo: seed_user.photo,
            category: seed_user.category,
            is_admin: seed_user.is_admin,
        };

        match directory::insert_user(pool, &new_user).await {
            Ok(_) => inserted += 1,
            Err(e) => {
                tracing::error!(email = %email, error = ?e, "Skipping seed user, insert failed");
            }
        }
    }

    tracing::info!(count = inserted, "Users seeded successfully");
    Ok(())
}
