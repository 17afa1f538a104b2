use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        comment::{CreateCommentRequest, UpdateCommentRequest},
        page::PageParams,
    },
    services::comments,
    utils::jwt::AuthUser,
};

/// Add a comment to a post, or a reply when `parent_comment_id` is given.
pub async fn create_comment(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let comment = comments::create_comment(&pool, &user.id, payload).await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Top-level comments of a post (newest first).
pub async fn list_comments(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    Path(post_id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = comments::get_comments(&pool, &user.id, post_id, params).await?;

    Ok(Json(json!({
        "comments": page.items,
        "pagination": page.pagination,
    })))
}

/// Replies to a comment (oldest first).
pub async fn list_replies(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    Path(comment_id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = comments::get_replies(&pool, &user.id, comment_id, params).await?;

    Ok(Json(json!({
        "replies": page.items,
        "pagination": page.pagination,
    })))
}

pub async fn update_comment(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let comment = comments::update_comment(&pool, &user.id, id, payload).await?;
    Ok(Json(comment))
}

/// Delete a comment, its replies and their likes.
/// Requires: Author.
pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let deletion = comments::delete_comment(&pool, &user.id, id).await?;

    Ok(Json(json!({
        "message": "Comment deleted successfully",
        "deleted": deletion,
    })))
}
