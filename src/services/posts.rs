//! Post store: CRUD, visibility filtering, feed assembly and the post delete cascade.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use super::{claim_target, counters, retry_on_conflict};
use crate::{
    error::AppError,
    models::{
        like::TargetType,
        page::{Page, PageParams, Pagination},
        post::{
            CreatePostRequest, MAX_POST_CONTENT_CHARS, PostDeletion, PostRecord, PostView,
            UpdatePostRequest, Visibility,
        },
        user::UserSummary,
    },
    utils::html::normalize_content,
};

pub const DEFAULT_FEED_PAGE_SIZE: i64 = 10;

/// Number of likers previewed on each feed item.
pub const RECENT_LIKERS_PREVIEW: i64 = 3;

/// Shared projection; the first placeholder is the viewer id used for `is_liked`.
const POST_VIEW_SELECT: &str = r#"
    SELECT
        p.id, p.content, p.image_url, p.visibility,
        p.likes_count, p.comments_count, p.created_at, p.updated_at,
        p.author_id,
        u.first_name AS author_first_name,
        u.last_name AS author_last_name,
        u.profile_picture AS author_profile_picture,
        EXISTS (
            SELECT 1 FROM likes l
            WHERE l.target_type = 'Post' AND l.target_id = p.id
              AND l.user_id = ? AND l.is_deleted = 0
        ) AS is_liked
    FROM posts p
    LEFT JOIN users u ON u.id = p.author_id
"#;

pub async fn create_post(
    pool: &SqlitePool,
    user_id: &str,
    mut payload: CreatePostRequest,
) -> Result<PostView, AppError> {
    // A blank image field means "no image".
    payload.image_url = payload
        .image_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());
    payload.validate()?;

    let content = normalize_content(&payload.content, MAX_POST_CONTENT_CHARS)?;
    let visibility = match payload.visibility.as_deref() {
        Some(raw) => raw.parse::<Visibility>()?,
        None => Visibility::default(),
    };

    let mut tx = pool.begin().await?;
    let now = Utc::now();
    let post_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO posts (author_id, content, image_url, visibility, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(&content)
    .bind(&payload.image_url)
    .bind(visibility.as_str())
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::from(e)
    })?;

    let post = load_post(&mut *tx, user_id, post_id).await?;
    tx.commit().await?;

    tracing::info!("User {} created post {}", user_id, post_id);
    Ok(post)
}

/// A single live post. Private posts are only visible to their author.
pub async fn get_post(pool: &SqlitePool, viewer_id: &str, post_id: i64) -> Result<PostView, AppError> {
    let post = fetch_active_post(pool, post_id)
        .await?
        .ok_or_else(|| super::not_found(TargetType::Post))?;

    if !post.is_visible_to(viewer_id) {
        return Err(super::forbidden_post());
    }

    let mut view = load_post(pool, viewer_id, post_id).await?;
    attach_recent_likers(pool, std::slice::from_mut(&mut view)).await?;
    Ok(view)
}

/// Edits content and/or visibility. Author only.
pub async fn update_post(
    pool: &SqlitePool,
    user_id: &str,
    post_id: i64,
    payload: UpdatePostRequest,
) -> Result<PostView, AppError> {
    let content = payload
        .content
        .as_deref()
        .map(|raw| normalize_content(raw, MAX_POST_CONTENT_CHARS))
        .transpose()?;
    let visibility = payload
        .visibility
        .as_deref()
        .map(str::parse::<Visibility>)
        .transpose()?;

    let mut view = retry_on_conflict("update_post", || {
        update_post_once(pool, user_id, post_id, content.as_deref(), visibility)
    })
    .await?;
    attach_recent_likers(pool, std::slice::from_mut(&mut view)).await?;
    Ok(view)
}

async fn update_post_once(
    pool: &SqlitePool,
    user_id: &str,
    post_id: i64,
    content: Option<&str>,
    visibility: Option<Visibility>,
) -> Result<PostView, AppError> {
    let mut tx = pool.begin().await?;
    claim_target(&mut tx, TargetType::Post, post_id).await?;

    let post = fetch_active_post(&mut *tx, post_id)
        .await?
        .ok_or_else(|| super::not_found(TargetType::Post))?;
    if post.author_id != user_id {
        return Err(AppError::Forbidden(
            "You do not have permission to update this post".to_string(),
        ));
    }

    sqlx::query(
        r#"
        UPDATE posts
        SET content = COALESCE(?, content),
            visibility = COALESCE(?, visibility),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(content)
    .bind(visibility.map(|v| v.as_str()))
    .bind(Utc::now())
    .bind(post_id)
    .execute(&mut *tx)
    .await?;

    let view = load_post(&mut *tx, user_id, post_id).await?;
    tx.commit().await?;
    Ok(view)
}

/// The viewer's feed: live posts that are public or their own, newest first.
pub async fn list_feed(
    pool: &SqlitePool,
    viewer_id: &str,
    params: PageParams,
) -> Result<Page<PostView>, AppError> {
    let (page, limit, offset) = params.resolve(DEFAULT_FEED_PAGE_SIZE);

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM posts
        WHERE is_deleted = 0 AND (visibility = 'public' OR author_id = ?)
        "#,
    )
    .bind(viewer_id)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "{POST_VIEW_SELECT} \
         WHERE p.is_deleted = 0 AND (p.visibility = 'public' OR p.author_id = ?) \
         ORDER BY p.created_at DESC, p.id DESC \
         LIMIT ? OFFSET ?"
    );
    let mut items = sqlx::query_as::<_, PostView>(&sql)
        .bind(viewer_id)
        .bind(viewer_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list feed: {:?}", e);
            AppError::from(e)
        })?;

    attach_recent_likers(pool, &mut items).await?;

    Ok(Page {
        items,
        pagination: Pagination::new(page, limit, total),
    })
}

/// Soft-deletes a post and cascades to its comments, their replies, and every like
/// on the post or those comments. Author only; one transaction.
pub async fn delete_post(
    pool: &SqlitePool,
    user_id: &str,
    post_id: i64,
) -> Result<PostDeletion, AppError> {
    let deletion =
        retry_on_conflict("delete_post", || delete_post_once(pool, user_id, post_id)).await?;

    tracing::info!(
        "User {} deleted post {} ({} comments, {} likes removed)",
        user_id,
        post_id,
        deletion.comments_removed,
        deletion.likes_removed
    );
    Ok(deletion)
}

async fn delete_post_once(
    pool: &SqlitePool,
    user_id: &str,
    post_id: i64,
) -> Result<PostDeletion, AppError> {
    let mut tx = pool.begin().await?;
    claim_target(&mut tx, TargetType::Post, post_id).await?;

    let post = fetch_active_post(&mut *tx, post_id)
        .await?
        .ok_or_else(|| super::not_found(TargetType::Post))?;
    if post.author_id != user_id {
        return Err(AppError::Forbidden(
            "You do not have permission to delete this post".to_string(),
        ));
    }

    let now = Utc::now();

    let likes_removed = sqlx::query(
        r#"
        UPDATE likes SET is_deleted = 1, updated_at = ?
        WHERE is_deleted = 0
          AND (
              (target_type = 'Post' AND target_id = ?)
              OR (target_type = 'Comment'
                  AND target_id IN (SELECT id FROM comments WHERE post_id = ?))
          )
        "#,
    )
    .bind(now)
    .bind(post_id)
    .bind(post_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    counters::clear_post_counters(&mut tx, post_id).await?;

    let comments_removed = sqlx::query(
        r#"
        UPDATE comments SET is_deleted = 1, deleted_at = ?, updated_at = ?
        WHERE post_id = ? AND is_deleted = 0
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(post_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("UPDATE posts SET is_deleted = 1, deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(PostDeletion {
        post_id,
        comments_removed,
        likes_removed,
    })
}

pub(crate) async fn fetch_active_post<'e, E>(
    executor: E,
    post_id: i64,
) -> Result<Option<PostRecord>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let post = sqlx::query_as::<_, PostRecord>(
        "SELECT id, author_id, visibility FROM posts WHERE id = ? AND is_deleted = 0",
    )
    .bind(post_id)
    .fetch_optional(executor)
    .await?;
    Ok(post)
}

async fn load_post<'e, E>(executor: E, viewer_id: &str, post_id: i64) -> Result<PostView, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{POST_VIEW_SELECT} WHERE p.id = ? AND p.is_deleted = 0");
    sqlx::query_as::<_, PostView>(&sql)
        .bind(viewer_id)
        .bind(post_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| super::not_found(TargetType::Post))
}

#[derive(FromRow)]
struct RecentLiker {
    target_id: i64,
    #[sqlx(flatten)]
    user: UserSummary,
}

/// Fills `recent_likers` for every post in one query.
async fn attach_recent_likers(pool: &SqlitePool, posts: &mut [PostView]) -> Result<(), AppError> {
    if posts.is_empty() {
        return Ok(());
    }

    let mut builder = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT target_id, id, first_name, last_name, profile_picture FROM (
            SELECT
                l.target_id,
                l.user_id AS id,
                COALESCE(u.first_name, 'User') AS first_name,
                COALESCE(u.last_name, '') AS last_name,
                COALESCE(u.profile_picture, '') AS profile_picture,
                ROW_NUMBER() OVER (
                    PARTITION BY l.target_id ORDER BY l.updated_at DESC, l.id DESC
                ) AS rn
            FROM likes l
            LEFT JOIN users u ON u.id = l.user_id
            WHERE l.target_type = 'Post' AND l.is_deleted = 0 AND l.target_id IN (
        "#,
    );

    let mut separated = builder.separated(",");
    for post in posts.iter() {
        separated.push_bind(post.id);
    }
    separated.push_unseparated(")) WHERE rn <= ");
    builder.push_bind(RECENT_LIKERS_PREVIEW);
    builder.push(" ORDER BY target_id, rn");

    let rows: Vec<RecentLiker> = builder.build_query_as().fetch_all(pool).await?;

    let mut by_post: HashMap<i64, Vec<UserSummary>> = HashMap::new();
    for row in rows {
        by_post.entry(row.target_id).or_default().push(row.user);
    }
    for post in posts.iter_mut() {
        post.recent_likers = by_post.remove(&post.id).unwrap_or_default();
    }
    Ok(())
}
