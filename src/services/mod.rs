//! Engagement operations. Each mutating operation is one storage transaction.
//!
//! Write transactions start by claiming the target row with a no-op UPDATE, so SQLite
//! hands out the write lock before anything is read and concurrent writers queue on
//! the busy timeout instead of failing a lock upgrade.

pub mod comments;
pub mod counters;
pub mod likes;
pub mod posts;
pub mod stories;
pub mod users;

use std::future::Future;

use sqlx::{Executor, Sqlite, SqliteConnection};

use crate::{
    error::AppError,
    models::{like::TargetType, post::PostRecord},
};

/// Runs `attempt`, and runs it once more if the store reported a write conflict.
/// A second conflict is surfaced to the caller as a transient failure.
pub(crate) async fn retry_on_conflict<T, F, Fut>(operation: &str, mut attempt: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    match attempt().await {
        Err(AppError::Conflict(msg)) => {
            tracing::warn!("{} hit a write conflict ({}), retrying once", operation, msg);
            attempt().await
        }
        other => other,
    }
}

pub(crate) fn not_found(target_type: TargetType) -> AppError {
    AppError::NotFound(format!("{} not found", target_type))
}

/// Takes the write lock on a live post or comment inside `conn`'s transaction.
pub(crate) async fn claim_target(
    conn: &mut SqliteConnection,
    target_type: TargetType,
    target_id: i64,
) -> Result<(), AppError> {
    let sql = match target_type {
        TargetType::Post => "UPDATE posts SET is_deleted = is_deleted WHERE id = ? AND is_deleted = 0",
        TargetType::Comment => {
            "UPDATE comments SET is_deleted = is_deleted WHERE id = ? AND is_deleted = 0"
        }
    };

    let result = sqlx::query(sql).bind(target_id).execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(not_found(target_type));
    }
    Ok(())
}

/// Checks that a live post or comment exists and that `viewer_id` may see the post it
/// belongs to. Private posts are visible to their author only.
pub(crate) async fn ensure_visible<'e, E>(
    executor: E,
    viewer_id: &str,
    target_type: TargetType,
    target_id: i64,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = match target_type {
        TargetType::Post => {
            "SELECT id, author_id, visibility FROM posts WHERE id = ? AND is_deleted = 0"
        }
        TargetType::Comment => {
            r#"
            SELECT p.id, p.author_id, p.visibility
            FROM comments c
            JOIN posts p ON p.id = c.post_id
            WHERE c.id = ? AND c.is_deleted = 0 AND p.is_deleted = 0
            "#
        }
    };

    let post = sqlx::query_as::<_, PostRecord>(sql)
        .bind(target_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| not_found(target_type))?;

    if !post.is_visible_to(viewer_id) {
        return Err(forbidden_post());
    }
    Ok(())
}

pub(crate) fn forbidden_post() -> AppError {
    AppError::Forbidden("You do not have permission to view this post".to_string())
}
