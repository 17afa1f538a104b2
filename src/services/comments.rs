//! Comment tree: top-level comments on a post plus exactly one level of replies.

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use validator::Validate;

use super::{
    claim_target,
    counters::{self, CommentParent},
    ensure_visible, retry_on_conflict,
};
use crate::{
    error::AppError,
    models::{
        comment::{
            CommentDeletion, CommentRecord, CommentView, CreateCommentRequest,
            MAX_COMMENT_CONTENT_CHARS, UpdateCommentRequest,
        },
        like::TargetType,
        page::{Page, PageParams, Pagination},
    },
    utils::html::normalize_content,
};

pub const DEFAULT_COMMENTS_PAGE_SIZE: i64 = 20;
pub const DEFAULT_REPLIES_PAGE_SIZE: i64 = 10;

/// Shared projection; the first placeholder is the viewer id used for `is_liked`.
const COMMENT_VIEW_SELECT: &str = r#"
    SELECT
        c.id, c.post_id, c.parent_comment_id, c.content,
        c.likes_count, c.replies_count, c.created_at, c.updated_at,
        c.author_id,
        u.first_name AS author_first_name,
        u.last_name AS author_last_name,
        u.profile_picture AS author_profile_picture,
        EXISTS (
            SELECT 1 FROM likes l
            WHERE l.target_type = 'Comment' AND l.target_id = c.id
              AND l.user_id = ? AND l.is_deleted = 0
        ) AS is_liked
    FROM comments c
    LEFT JOIN users u ON u.id = c.author_id
"#;

/// Creates a comment, or a reply when `parent_comment_id` is set.
///
/// Replies must target a live top-level comment of the same post.
pub async fn create_comment(
    pool: &SqlitePool,
    user_id: &str,
    payload: CreateCommentRequest,
) -> Result<CommentView, AppError> {
    payload.validate()?;
    let content = normalize_content(&payload.content, MAX_COMMENT_CONTENT_CHARS)?;

    let comment = retry_on_conflict("create_comment", || {
        insert_comment(pool, user_id, &payload, &content)
    })
    .await?;

    tracing::info!(
        "User {} commented {} on post {} (parent: {:?})",
        user_id,
        comment.id,
        payload.post_id,
        payload.parent_comment_id
    );
    Ok(comment)
}

async fn insert_comment(
    pool: &SqlitePool,
    user_id: &str,
    payload: &CreateCommentRequest,
    content: &str,
) -> Result<CommentView, AppError> {
    let mut tx = pool.begin().await?;

    claim_target(&mut tx, TargetType::Post, payload.post_id).await?;
    ensure_visible(&mut *tx, user_id, TargetType::Post, payload.post_id).await?;

    let parent = match payload.parent_comment_id {
        Some(parent_id) => {
            let parent = fetch_active_comment(&mut *tx, parent_id)
                .await?
                .ok_or(AppError::NotFound("Parent comment not found".to_string()))?;

            if parent.post_id != payload.post_id {
                return Err(AppError::BadRequest(
                    "Parent comment belongs to a different post".to_string(),
                ));
            }
            if parent.is_reply() {
                return Err(AppError::BadRequest(
                    "Replies cannot be nested more than one level".to_string(),
                ));
            }
            CommentParent::Comment(parent_id)
        }
        None => CommentParent::Post(payload.post_id),
    };

    let now = Utc::now();
    let comment_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO comments (post_id, author_id, content, parent_comment_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(payload.post_id)
    .bind(user_id)
    .bind(content)
    .bind(payload.parent_comment_id)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    counters::adjust_comment_count(&mut tx, parent, 1).await?;

    let comment = load_comment(&mut *tx, user_id, comment_id).await?;
    tx.commit().await?;
    Ok(comment)
}

/// Top-level comments of a live post the viewer may see, newest first.
pub async fn get_comments(
    pool: &SqlitePool,
    viewer_id: &str,
    post_id: i64,
    params: PageParams,
) -> Result<Page<CommentView>, AppError> {
    ensure_visible(pool, viewer_id, TargetType::Post, post_id).await?;
    let (page, limit, offset) = params.resolve(DEFAULT_COMMENTS_PAGE_SIZE);

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM comments
        WHERE post_id = ? AND parent_comment_id IS NULL AND is_deleted = 0
        "#,
    )
    .bind(post_id)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "{COMMENT_VIEW_SELECT} \
         WHERE c.post_id = ? AND c.parent_comment_id IS NULL AND c.is_deleted = 0 \
         ORDER BY c.created_at DESC, c.id DESC \
         LIMIT ? OFFSET ?"
    );
    let items = sqlx::query_as::<_, CommentView>(&sql)
        .bind(viewer_id)
        .bind(post_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(Page {
        items,
        pagination: Pagination::new(page, limit, total),
    })
}

/// Replies to a live comment, oldest first.
pub async fn get_replies(
    pool: &SqlitePool,
    viewer_id: &str,
    comment_id: i64,
    params: PageParams,
) -> Result<Page<CommentView>, AppError> {
    ensure_visible(pool, viewer_id, TargetType::Comment, comment_id).await?;
    let (page, limit, offset) = params.resolve(DEFAULT_REPLIES_PAGE_SIZE);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM comments WHERE parent_comment_id = ? AND is_deleted = 0",
    )
    .bind(comment_id)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "{COMMENT_VIEW_SELECT} \
         WHERE c.parent_comment_id = ? AND c.is_deleted = 0 \
         ORDER BY c.created_at ASC, c.id ASC \
         LIMIT ? OFFSET ?"
    );
    let items = sqlx::query_as::<_, CommentView>(&sql)
        .bind(viewer_id)
        .bind(comment_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(Page {
        items,
        pagination: Pagination::new(page, limit, total),
    })
}

/// Replaces a comment's text. Author only; counters are untouched.
pub async fn update_comment(
    pool: &SqlitePool,
    user_id: &str,
    comment_id: i64,
    payload: UpdateCommentRequest,
) -> Result<CommentView, AppError> {
    let content = normalize_content(&payload.content, MAX_COMMENT_CONTENT_CHARS)?;

    retry_on_conflict("update_comment", || {
        update_comment_once(pool, user_id, comment_id, &content)
    })
    .await
}

async fn update_comment_once(
    pool: &SqlitePool,
    user_id: &str,
    comment_id: i64,
    content: &str,
) -> Result<CommentView, AppError> {
    let mut tx = pool.begin().await?;
    claim_target(&mut tx, TargetType::Comment, comment_id).await?;

    let comment = fetch_active_comment(&mut *tx, comment_id)
        .await?
        .ok_or_else(|| super::not_found(TargetType::Comment))?;
    if comment.author_id != user_id {
        return Err(AppError::Forbidden(
            "You do not have permission to update this comment".to_string(),
        ));
    }

    sqlx::query("UPDATE comments SET content = ?, updated_at = ? WHERE id = ?")
        .bind(content)
        .bind(Utc::now())
        .bind(comment_id)
        .execute(&mut *tx)
        .await?;

    let comment = load_comment(&mut *tx, user_id, comment_id).await?;
    tx.commit().await?;
    Ok(comment)
}

/// Soft-deletes a comment together with its replies and every like on them.
///
/// Author only. Runs as one transaction: replies first, then the comment, then the
/// parent counter (post `comments_count` or parent `replies_count`).
pub async fn delete_comment(
    pool: &SqlitePool,
    user_id: &str,
    comment_id: i64,
) -> Result<CommentDeletion, AppError> {
    let deletion = retry_on_conflict("delete_comment", || {
        delete_comment_once(pool, user_id, comment_id)
    })
    .await?;

    tracing::info!(
        "User {} deleted comment {} ({} replies, {} likes removed)",
        user_id,
        comment_id,
        deletion.replies_removed,
        deletion.likes_removed
    );
    Ok(deletion)
}

async fn delete_comment_once(
    pool: &SqlitePool,
    user_id: &str,
    comment_id: i64,
) -> Result<CommentDeletion, AppError> {
    let mut tx = pool.begin().await?;
    claim_target(&mut tx, TargetType::Comment, comment_id).await?;

    let comment = fetch_active_comment(&mut *tx, comment_id)
        .await?
        .ok_or_else(|| super::not_found(TargetType::Comment))?;
    if comment.author_id != user_id {
        return Err(AppError::Forbidden(
            "You do not have permission to delete this comment".to_string(),
        ));
    }

    let now = Utc::now();

    let likes_removed = sqlx::query(
        r#"
        UPDATE likes SET is_deleted = 1, updated_at = ?
        WHERE target_type = 'Comment' AND is_deleted = 0
          AND target_id IN (
              SELECT id FROM comments
              WHERE (id = ? OR parent_comment_id = ?) AND is_deleted = 0
          )
        "#,
    )
    .bind(now)
    .bind(comment_id)
    .bind(comment_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    counters::clear_comment_counters(&mut tx, comment_id).await?;

    let replies_removed = sqlx::query(
        r#"
        UPDATE comments SET is_deleted = 1, deleted_at = ?, updated_at = ?
        WHERE parent_comment_id = ? AND is_deleted = 0
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(comment_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("UPDATE comments SET is_deleted = 1, deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(comment_id)
        .execute(&mut *tx)
        .await?;

    let parent = match comment.parent_comment_id {
        Some(parent_id) => CommentParent::Comment(parent_id),
        None => CommentParent::Post(comment.post_id),
    };
    counters::adjust_comment_count(&mut tx, parent, -1).await?;

    tx.commit().await?;

    Ok(CommentDeletion {
        comment_id,
        replies_removed,
        likes_removed,
    })
}

pub(crate) async fn fetch_active_comment<'e, E>(
    executor: E,
    comment_id: i64,
) -> Result<Option<CommentRecord>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let comment = sqlx::query_as::<_, CommentRecord>(
        r#"
        SELECT id, post_id, author_id, parent_comment_id
        FROM comments
        WHERE id = ? AND is_deleted = 0
        "#,
    )
    .bind(comment_id)
    .fetch_optional(executor)
    .await?;
    Ok(comment)
}

/// One live comment as seen by `viewer_id`.
pub async fn load_comment<'e, E>(
    executor: E,
    viewer_id: &str,
    comment_id: i64,
) -> Result<CommentView, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{COMMENT_VIEW_SELECT} WHERE c.id = ? AND c.is_deleted = 0");
    sqlx::query_as::<_, CommentView>(&sql)
        .bind(viewer_id)
        .bind(comment_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| super::not_found(TargetType::Comment))
}
