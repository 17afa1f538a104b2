//! Counter maintenance for `likes_count`, `comments_count` and `replies_count`.
//!
//! Nothing outside this module writes those columns. Live updates are in-place SQL
//! arithmetic on the target row; [`reconcile`] rebuilds every counter from the
//! like and comment records.

use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::{error::AppError, models::like::TargetType};

/// Which counter a comment insert or removal moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentParent {
    /// Top-level comment: `posts.comments_count`.
    Post(i64),
    /// Reply: the parent's `comments.replies_count`.
    Comment(i64),
}

/// Adds `delta` to a post's or comment's `likes_count`, flooring at zero.
pub async fn adjust_likes(
    conn: &mut SqliteConnection,
    target_type: TargetType,
    target_id: i64,
    delta: i64,
) -> Result<(), AppError> {
    let sql = match target_type {
        TargetType::Post => "UPDATE posts SET likes_count = MAX(likes_count + ?, 0) WHERE id = ?",
        TargetType::Comment => {
            "UPDATE comments SET likes_count = MAX(likes_count + ?, 0) WHERE id = ?"
        }
    };

    sqlx::query(sql)
        .bind(delta)
        .bind(target_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Adds `delta` to the counter that tracks comments under `parent`.
pub async fn adjust_comment_count(
    conn: &mut SqliteConnection,
    parent: CommentParent,
    delta: i64,
) -> Result<(), AppError> {
    let (sql, id) = match parent {
        CommentParent::Post(id) => (
            "UPDATE posts SET comments_count = MAX(comments_count + ?, 0) WHERE id = ?",
            id,
        ),
        CommentParent::Comment(id) => (
            "UPDATE comments SET replies_count = MAX(replies_count + ?, 0) WHERE id = ?",
            id,
        ),
    };

    sqlx::query(sql).bind(delta).bind(id).execute(&mut *conn).await?;
    Ok(())
}

/// Current stored `likes_count` of a target.
pub async fn likes_count(
    conn: &mut SqliteConnection,
    target_type: TargetType,
    target_id: i64,
) -> Result<i64, AppError> {
    let sql = match target_type {
        TargetType::Post => "SELECT likes_count FROM posts WHERE id = ?",
        TargetType::Comment => "SELECT likes_count FROM comments WHERE id = ?",
    };

    let count = sqlx::query_scalar::<_, i64>(sql)
        .bind(target_id)
        .fetch_optional(&mut *conn)
        .await?
        .unwrap_or(0);
    Ok(count)
}

/// Zeroes the counters of a comment and all of its replies. Used by the delete cascade,
/// after every like on those rows has been deactivated.
pub async fn clear_comment_counters(
    conn: &mut SqliteConnection,
    comment_id: i64,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE comments SET likes_count = 0, replies_count = 0
        WHERE id = ? OR parent_comment_id = ?
        "#,
    )
    .bind(comment_id)
    .bind(comment_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Zeroes the counters of a post and every comment on it.
pub async fn clear_post_counters(conn: &mut SqliteConnection, post_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE comments SET likes_count = 0, replies_count = 0 WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("UPDATE posts SET likes_count = 0, comments_count = 0 WHERE id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// A stored counter that disagrees with the records it summarizes.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct CounterDrift {
    /// 'post' or 'comment'.
    pub entity: String,
    pub id: i64,
    /// Column name, e.g. 'likes_count'.
    pub counter: String,
    pub stored: i64,
    pub actual: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub post_likes_fixed: u64,
    pub post_comments_fixed: u64,
    pub comment_likes_fixed: u64,
    pub comment_replies_fixed: u64,
}

impl ReconcileReport {
    pub fn total(&self) -> u64 {
        self.post_likes_fixed
            + self.post_comments_fixed
            + self.comment_likes_fixed
            + self.comment_replies_fixed
    }
}

const LIVE_POST_LIKES: &str = "SELECT COUNT(*) FROM likes l \
     WHERE l.target_type = 'Post' AND l.target_id = posts.id AND l.is_deleted = 0";
const LIVE_POST_COMMENTS: &str = "SELECT COUNT(*) FROM comments c \
     WHERE c.post_id = posts.id AND c.parent_comment_id IS NULL AND c.is_deleted = 0";
const LIVE_COMMENT_LIKES: &str = "SELECT COUNT(*) FROM likes l \
     WHERE l.target_type = 'Comment' AND l.target_id = comments.id AND l.is_deleted = 0";
const LIVE_COMMENT_REPLIES: &str = "SELECT COUNT(*) FROM comments r \
     WHERE r.parent_comment_id = comments.id AND r.is_deleted = 0";

/// Lists every counter whose stored value differs from its live count. Read only.
pub async fn find_drift(pool: &SqlitePool) -> Result<Vec<CounterDrift>, AppError> {
    let sql = format!(
        r#"
        SELECT entity, id, counter, stored, actual FROM (
            SELECT 'post' AS entity, posts.id AS id, 'likes_count' AS counter,
                   posts.likes_count AS stored, ({LIVE_POST_LIKES}) AS actual
            FROM posts
            UNION ALL
            SELECT 'post', posts.id, 'comments_count', posts.comments_count, ({LIVE_POST_COMMENTS})
            FROM posts
            UNION ALL
            SELECT 'comment', comments.id, 'likes_count', comments.likes_count, ({LIVE_COMMENT_LIKES})
            FROM comments
            UNION ALL
            SELECT 'comment', comments.id, 'replies_count', comments.replies_count, ({LIVE_COMMENT_REPLIES})
            FROM comments
        )
        WHERE stored <> actual
        ORDER BY entity, id, counter
        "#
    );

    let drift = sqlx::query_as::<_, CounterDrift>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(drift)
}

/// Rewrites every drifted counter from the source records in one transaction.
///
/// Idempotent: a second run right after the first reports zero corrections.
pub async fn reconcile(pool: &SqlitePool) -> Result<ReconcileReport, AppError> {
    let mut tx = pool.begin().await?;

    let report = ReconcileReport {
        post_likes_fixed: rebuild_counter(&mut tx, "posts", "likes_count", LIVE_POST_LIKES).await?,
        post_comments_fixed: rebuild_counter(&mut tx, "posts", "comments_count", LIVE_POST_COMMENTS)
            .await?,
        comment_likes_fixed: rebuild_counter(&mut tx, "comments", "likes_count", LIVE_COMMENT_LIKES)
            .await?,
        comment_replies_fixed: rebuild_counter(
            &mut tx,
            "comments",
            "replies_count",
            LIVE_COMMENT_REPLIES,
        )
        .await?,
    };

    tx.commit().await?;

    if report.total() > 0 {
        tracing::warn!("Counter reconciliation corrected drift: {:?}", report);
    } else {
        tracing::info!("Counter reconciliation found no drift");
    }
    Ok(report)
}

async fn rebuild_counter(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    live: &str,
) -> Result<u64, AppError> {
    let sql = format!("UPDATE {table} SET {column} = ({live}) WHERE {column} <> ({live})");
    let result = sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}
