//! Story shelf: image stories that expire after a fixed lifetime.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::story::{CreateStoryRequest, StoryView},
};

const STORY_VIEW_SELECT: &str = r#"
    SELECT
        s.id, s.image_url, s.created_at,
        s.author_id,
        u.first_name AS author_first_name,
        u.last_name AS author_last_name,
        u.profile_picture AS author_profile_picture
    FROM stories s
    LEFT JOIN users u ON u.id = s.author_id
"#;

pub async fn create_story(
    pool: &SqlitePool,
    user_id: &str,
    payload: CreateStoryRequest,
) -> Result<StoryView, AppError> {
    payload.validate()?;
    let image_url = payload.image_url.trim();

    let story_id: i64 = sqlx::query_scalar(
        "INSERT INTO stories (author_id, image_url, created_at) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(user_id)
    .bind(image_url)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    tracing::info!("User {} posted story {}", user_id, story_id);

    let sql = format!("{STORY_VIEW_SELECT} WHERE s.id = ?");
    let story = sqlx::query_as::<_, StoryView>(&sql)
        .bind(story_id)
        .fetch_one(pool)
        .await?;
    Ok(story)
}

/// Stories younger than `ttl`, newest first.
pub async fn list_stories(pool: &SqlitePool, ttl: Duration) -> Result<Vec<StoryView>, AppError> {
    let cutoff = Utc::now() - ttl;
    let sql = format!("{STORY_VIEW_SELECT} WHERE s.created_at > ? ORDER BY s.created_at DESC, s.id DESC");
    let stories = sqlx::query_as::<_, StoryView>(&sql)
        .bind(cutoff)
        .fetch_all(pool)
        .await?;
    Ok(stories)
}

/// Hard-deletes stories older than `ttl`. Returns how many were removed.
pub async fn purge_expired(pool: &SqlitePool, ttl: Duration) -> Result<u64, AppError> {
    let cutoff = Utc::now() - ttl;
    let removed = sqlx::query("DELETE FROM stories WHERE created_at <= ?")
        .bind(cutoff)
        .execute(pool)
        .await?
        .rows_affected();

    if removed > 0 {
        tracing::info!("Purged {} expired stories", removed);
    }
    Ok(removed)
}
