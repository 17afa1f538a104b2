//! User directory: local profiles for externally authenticated users.

use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{NewUserProfile, UpdateProfileRequest, User},
    utils::jwt::Claims,
};

/// Creates the caller's profile from token claims the first time they are seen.
///
/// Existing profiles are never overwritten here; edits go through `update_profile`.
pub async fn ensure_user(pool: &SqlitePool, claims: &Claims) -> Result<(), AppError> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ?")
        .bind(&claims.sub)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Ok(());
    }

    let profile = NewUserProfile::from_display_name(
        claims.name.as_deref(),
        claims.email.clone(),
        claims.picture.clone(),
    );
    let now = Utc::now();

    let inserted = sqlx::query(
        r#"
        INSERT INTO users (id, first_name, last_name, email, profile_picture, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&claims.sub)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.email)
    .bind(&profile.profile_picture)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    if inserted > 0 {
        tracing::info!("Registered profile for user {}", claims.sub);
    }
    Ok(())
}

pub async fn get_user(pool: &SqlitePool, user_id: &str) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, first_name, last_name, email, profile_picture, created_at, updated_at
        FROM users WHERE id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Partial profile update; absent fields keep their value.
pub async fn update_profile(
    pool: &SqlitePool,
    user_id: &str,
    payload: UpdateProfileRequest,
) -> Result<User, AppError> {
    payload.validate()?;

    let first_name = payload.first_name.map(|s| s.trim().to_string());
    if first_name.as_deref() == Some("") {
        return Err(AppError::BadRequest("First name cannot be empty".to_string()));
    }
    let last_name = payload.last_name.map(|s| s.trim().to_string());

    let result = sqlx::query(
        r#"
        UPDATE users
        SET first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            profile_picture = COALESCE(?, profile_picture),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(first_name)
    .bind(last_name)
    .bind(payload.profile_picture)
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    get_user(pool, user_id).await
}
