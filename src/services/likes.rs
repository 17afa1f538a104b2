//! Like ledger: one row per (user, target), toggled between active and soft-deleted.

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};

use super::{claim_target, counters, ensure_visible, retry_on_conflict};
use crate::{
    error::AppError,
    models::{
        like::{LikeToggle, LikesSummary, TargetType},
        user::UserSummary,
    },
};

/// Likes `target` for `user_id`, or unlikes it if the user already does.
///
/// Unlike soft-deletes the ledger row; a later like reactivates the same row.
pub async fn toggle_like(
    pool: &SqlitePool,
    user_id: &str,
    target_type: TargetType,
    target_id: i64,
) -> Result<LikeToggle, AppError> {
    retry_on_conflict("toggle_like", || {
        toggle_like_once(pool, user_id, target_type, target_id)
    })
    .await
}

async fn toggle_like_once(
    pool: &SqlitePool,
    user_id: &str,
    target_type: TargetType,
    target_id: i64,
) -> Result<LikeToggle, AppError> {
    let mut tx = pool.begin().await?;

    claim_target(&mut tx, target_type, target_id).await?;
    ensure_visible(&mut *tx, user_id, target_type, target_id).await?;

    let active_like: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT id FROM likes
        WHERE user_id = ? AND target_type = ? AND target_id = ? AND is_deleted = 0
        "#,
    )
    .bind(user_id)
    .bind(target_type.as_str())
    .bind(target_id)
    .fetch_optional(&mut *tx)
    .await?;

    let now = Utc::now();
    let is_liked = match active_like {
        Some(like_id) => {
            sqlx::query("UPDATE likes SET is_deleted = 1, updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(like_id)
                .execute(&mut *tx)
                .await?;
            counters::adjust_likes(&mut tx, target_type, target_id, -1).await?;
            false
        }
        None => {
            // Reactivates a previously unliked row instead of inserting a second one.
            sqlx::query(
                r#"
                INSERT INTO likes (user_id, target_type, target_id, is_deleted, created_at, updated_at)
                VALUES (?, ?, ?, 0, ?, ?)
                ON CONFLICT (user_id, target_type, target_id)
                DO UPDATE SET is_deleted = 0, updated_at = excluded.updated_at
                "#,
            )
            .bind(user_id)
            .bind(target_type.as_str())
            .bind(target_id)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            counters::adjust_likes(&mut tx, target_type, target_id, 1).await?;
            true
        }
    };

    let likes_count = counters::likes_count(&mut tx, target_type, target_id).await?;
    let liked_by = likers(&mut *tx, target_type, target_id).await?;

    tx.commit().await?;

    tracing::debug!(
        "{} {} {} {} (likes_count={})",
        user_id,
        if is_liked { "liked" } else { "unliked" },
        target_type,
        target_id,
        likes_count
    );

    Ok(LikeToggle {
        is_liked,
        likes_count,
        liked_by,
    })
}

/// Active likes on a live target the viewer may see, annotated for `viewer_id`.
pub async fn get_likes(
    pool: &SqlitePool,
    viewer_id: &str,
    target_type: TargetType,
    target_id: i64,
) -> Result<LikesSummary, AppError> {
    ensure_visible(pool, viewer_id, target_type, target_id).await?;

    let liked_by = likers(pool, target_type, target_id).await?;
    let is_liked = liked_by.iter().any(|u| u.id == viewer_id);

    Ok(LikesSummary {
        likes_count: liked_by.len() as i64,
        is_liked,
        liked_by,
    })
}

/// Users with an active like on the target, most recent first.
pub(crate) async fn likers<'e, E>(
    executor: E,
    target_type: TargetType,
    target_id: i64,
) -> Result<Vec<UserSummary>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let users = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT
            l.user_id AS id,
            COALESCE(u.first_name, 'User') AS first_name,
            COALESCE(u.last_name, '') AS last_name,
            COALESCE(u.profile_picture, '') AS profile_picture
        FROM likes l
        LEFT JOIN users u ON u.id = l.user_id
        WHERE l.target_type = ? AND l.target_id = ? AND l.is_deleted = 0
        ORDER BY l.updated_at DESC, l.id DESC
        "#,
    )
    .bind(target_type.as_str())
    .bind(target_id)
    .fetch_all(executor)
    .await?;

    Ok(users)
}
