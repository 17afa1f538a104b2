// tests/engagement_tests.rs

use engagement_store::{
    config::Config,
    db,
    error::AppError,
    models::{
        comment::{CommentView, CreateCommentRequest, UpdateCommentRequest},
        like::TargetType,
        page::PageParams,
        post::{CreatePostRequest, UpdatePostRequest, Visibility},
        story::CreateStoryRequest,
    },
    services::{comments, counters, likes, posts, stories},
};
use sqlx::SqlitePool;

/// Fresh in-memory database with migrations applied.
async fn test_pool() -> SqlitePool {
    db::connect_in_memory()
        .await
        .expect("Failed to open in-memory database")
}

/// File-backed database with a real connection pool, for tests that need parallel writers.
async fn shared_pool() -> SqlitePool {
    let path = std::env::temp_dir().join(format!("engagement-{}.db", uuid::Uuid::new_v4()));
    let config = Config {
        database_url: format!("sqlite://{}", path.display()),
        jwt_secret: "engagement_test_secret".to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        db_max_connections: 8,
        story_ttl_hours: 24,
        reconcile_on_startup: false,
        cors_origins: Vec::new(),
    };

    let pool = db::connect(&config).await.expect("Failed to open database file");
    db::migrate(&pool).await.expect("Failed to migrate database");
    pool
}

fn user() -> String {
    uuid::Uuid::new_v4().to_string()
}

async fn new_post(pool: &SqlitePool, author: &str, visibility: Option<&str>) -> i64 {
    posts::create_post(
        pool,
        author,
        CreatePostRequest {
            content: "Hello BuddyScript".to_string(),
            image_url: None,
            visibility: visibility.map(str::to_string),
        },
    )
    .await
    .expect("Failed to create post")
    .id
}

async fn new_comment(
    pool: &SqlitePool,
    author: &str,
    post_id: i64,
    parent_comment_id: Option<i64>,
) -> Result<CommentView, AppError> {
    comments::create_comment(
        pool,
        author,
        CreateCommentRequest {
            post_id,
            content: "Nice one".to_string(),
            parent_comment_id,
        },
    )
    .await
}

async fn active_likes_on_comments(pool: &SqlitePool, ids: &[i64]) -> i64 {
    let mut total = 0;
    for id in ids {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM likes WHERE target_type = 'Comment' AND target_id = ? AND is_deleted = 0",
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap();
        total += count;
    }
    total
}

async fn post_counters(pool: &SqlitePool, post_id: i64) -> (i64, i64) {
    sqlx::query_as("SELECT likes_count, comments_count FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn comment_counters(pool: &SqlitePool, comment_id: i64) -> (i64, i64) {
    sqlx::query_as("SELECT likes_count, replies_count FROM comments WHERE id = ?")
        .bind(comment_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn assert_no_drift(pool: &SqlitePool) {
    let drift = counters::find_drift(pool).await.unwrap();
    assert!(drift.is_empty(), "unexpected counter drift: {:?}", drift);
}

#[tokio::test]
async fn toggling_twice_restores_original_state() {
    let pool = test_pool().await;
    let (author, fan) = (user(), user());
    let post_id = new_post(&pool, &author, None).await;

    let liked = likes::toggle_like(&pool, &fan, TargetType::Post, post_id)
        .await
        .unwrap();
    assert!(liked.is_liked);
    assert_eq!(liked.likes_count, 1);
    assert_eq!(liked.liked_by.len(), 1);
    assert_eq!(liked.liked_by[0].id, fan);

    let unliked = likes::toggle_like(&pool, &fan, TargetType::Post, post_id)
        .await
        .unwrap();
    assert!(!unliked.is_liked);
    assert_eq!(unliked.likes_count, 0);
    assert!(unliked.liked_by.is_empty());

    // A third toggle reuses the same ledger row.
    let again = likes::toggle_like(&pool, &fan, TargetType::Post, post_id)
        .await
        .unwrap();
    assert!(again.is_liked);
    assert_eq!(again.likes_count, 1);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE user_id = ?")
        .bind(&fan)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    assert_no_drift(&pool).await;
}

#[tokio::test]
async fn get_likes_reports_viewer_state() {
    let pool = test_pool().await;
    let (author, fan, other) = (user(), user(), user());
    let post_id = new_post(&pool, &author, None).await;
    let comment = new_comment(&pool, &author, post_id, None).await.unwrap();

    likes::toggle_like(&pool, &fan, TargetType::Comment, comment.id)
        .await
        .unwrap();

    let for_fan = likes::get_likes(&pool, &fan, TargetType::Comment, comment.id)
        .await
        .unwrap();
    assert_eq!(for_fan.likes_count, 1);
    assert!(for_fan.is_liked);

    let for_other = likes::get_likes(&pool, &other, TargetType::Comment, comment.id)
        .await
        .unwrap();
    assert!(!for_other.is_liked);
    assert_eq!(for_other.liked_by[0].first_name, "User");

    let viewed = comments::load_comment(&pool, &fan, comment.id).await.unwrap();
    assert!(viewed.is_liked);
    assert_eq!(viewed.likes_count, 1);
}

#[tokio::test]
async fn liking_a_missing_target_is_not_found() {
    let pool = test_pool().await;

    let result = likes::toggle_like(&pool, &user(), TargetType::Post, 9999).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let result = likes::get_likes(&pool, &user(), TargetType::Comment, 9999).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn replies_cannot_be_nested() {
    let pool = test_pool().await;
    let author = user();
    let post_id = new_post(&pool, &author, None).await;
    let other_post = new_post(&pool, &author, None).await;

    let top = new_comment(&pool, &author, post_id, None).await.unwrap();
    let reply = new_comment(&pool, &user(), post_id, Some(top.id)).await.unwrap();
    assert_eq!(reply.parent_comment_id, Some(top.id));

    let nested = new_comment(&pool, &author, post_id, Some(reply.id)).await;
    assert!(matches!(nested, Err(AppError::BadRequest(_))));

    let cross_post = new_comment(&pool, &author, other_post, Some(top.id)).await;
    assert!(matches!(cross_post, Err(AppError::BadRequest(_))));

    let missing_parent = new_comment(&pool, &author, post_id, Some(9999)).await;
    assert!(matches!(missing_parent, Err(AppError::NotFound(_))));

    // Rejected replies leave counters alone.
    assert_eq!(comment_counters(&pool, top.id).await, (0, 1));
    assert_eq!(post_counters(&pool, post_id).await, (0, 1));
    assert_no_drift(&pool).await;
}

#[tokio::test]
async fn deleting_a_comment_cascades_to_replies_and_likes() {
    let pool = test_pool().await;
    let (author, replier) = (user(), user());
    let post_id = new_post(&pool, &author, None).await;

    let keep = new_comment(&pool, &author, post_id, None).await.unwrap();
    let top = new_comment(&pool, &author, post_id, None).await.unwrap();
    let mut replies = Vec::new();
    for _ in 0..3 {
        replies.push(new_comment(&pool, &replier, post_id, Some(top.id)).await.unwrap().id);
    }

    let fans = [user(), user()];
    for fan in &fans {
        likes::toggle_like(&pool, fan, TargetType::Comment, top.id)
            .await
            .unwrap();
    }
    likes::toggle_like(&pool, &author, TargetType::Comment, replies[0])
        .await
        .unwrap();
    likes::toggle_like(&pool, &replier, TargetType::Comment, replies[1])
        .await
        .unwrap();
    likes::toggle_like(&pool, &replier, TargetType::Comment, keep.id)
        .await
        .unwrap();

    assert_eq!(post_counters(&pool, post_id).await.1, 2);

    let deletion = comments::delete_comment(&pool, &author, top.id).await.unwrap();
    assert_eq!(deletion.replies_removed, 3);
    assert_eq!(deletion.likes_removed, 4);

    let mut cascaded = replies.clone();
    cascaded.push(top.id);
    assert_eq!(active_likes_on_comments(&pool, &cascaded).await, 0);
    assert_eq!(active_likes_on_comments(&pool, &[keep.id]).await, 1);

    assert_eq!(post_counters(&pool, post_id).await.1, 1);

    let replies_page = comments::get_replies(&pool, &author, top.id, PageParams::default()).await;
    assert!(matches!(replies_page, Err(AppError::NotFound(_))));

    let remaining = comments::get_comments(&pool, &author, post_id, PageParams::default())
        .await
        .unwrap();
    assert_eq!(remaining.pagination.total, 1);
    assert_eq!(remaining.items[0].id, keep.id);

    assert_no_drift(&pool).await;
}

#[tokio::test]
async fn deleting_a_reply_decrements_its_parent() {
    let pool = test_pool().await;
    let (author, replier) = (user(), user());
    let post_id = new_post(&pool, &author, None).await;
    let top = new_comment(&pool, &author, post_id, None).await.unwrap();
    let reply = new_comment(&pool, &replier, post_id, Some(top.id)).await.unwrap();

    comments::delete_comment(&pool, &replier, reply.id).await.unwrap();

    assert_eq!(comment_counters(&pool, top.id).await, (0, 0));
    assert_eq!(post_counters(&pool, post_id).await, (0, 1));
    assert_no_drift(&pool).await;
}

#[tokio::test]
async fn only_the_author_can_delete() {
    let pool = test_pool().await;
    let (author, intruder) = (user(), user());
    let post_id = new_post(&pool, &author, None).await;
    let comment = new_comment(&pool, &author, post_id, None).await.unwrap();
    likes::toggle_like(&pool, &intruder, TargetType::Post, post_id)
        .await
        .unwrap();
    likes::toggle_like(&pool, &intruder, TargetType::Comment, comment.id)
        .await
        .unwrap();

    let result = comments::delete_comment(&pool, &intruder, comment.id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = posts::delete_post(&pool, &intruder, post_id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = posts::update_post(
        &pool,
        &intruder,
        post_id,
        UpdatePostRequest {
            content: Some("hijacked".to_string()),
            visibility: None,
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = comments::update_comment(
        &pool,
        &intruder,
        comment.id,
        UpdateCommentRequest {
            content: "hijacked".to_string(),
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    // Nothing changed.
    let post = posts::get_post(&pool, &author, post_id).await.unwrap();
    assert_eq!(post.content, "Hello BuddyScript");
    assert_eq!(post.likes_count, 1);
    assert_eq!(post.comments_count, 1);
    let comment = comments::load_comment(&pool, &author, comment.id).await.unwrap();
    assert_eq!(comment.content, "Nice one");
    assert_eq!(comment.likes_count, 1);
    assert_no_drift(&pool).await;
}

#[tokio::test]
async fn comment_thread_scenario() {
    let pool = test_pool().await;
    let (a, b) = (user(), user());
    let post_id = new_post(&pool, &a, None).await;

    let c1 = new_comment(&pool, &a, post_id, None).await.unwrap();
    let c2 = new_comment(&pool, &b, post_id, Some(c1.id)).await.unwrap();
    likes::toggle_like(&pool, &b, TargetType::Comment, c1.id)
        .await
        .unwrap();

    assert_eq!(comment_counters(&pool, c1.id).await, (1, 1));
    assert_eq!(post_counters(&pool, post_id).await.1, 1);

    comments::delete_comment(&pool, &a, c1.id).await.unwrap();

    assert_eq!(post_counters(&pool, post_id).await.1, 0);
    assert_eq!(active_likes_on_comments(&pool, &[c1.id]).await, 0);

    let c2_deleted: bool = sqlx::query_scalar("SELECT is_deleted FROM comments WHERE id = ?")
        .bind(c2.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(c2_deleted);

    let result = comments::load_comment(&pool, &b, c2.id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_no_drift(&pool).await;
}

#[tokio::test]
async fn deleting_a_post_cascades_everything() {
    let pool = test_pool().await;
    let (author, fan) = (user(), user());
    let post_id = new_post(&pool, &author, None).await;
    let survivor = new_post(&pool, &author, None).await;

    let top = new_comment(&pool, &fan, post_id, None).await.unwrap();
    let reply = new_comment(&pool, &author, post_id, Some(top.id)).await.unwrap();
    likes::toggle_like(&pool, &fan, TargetType::Post, post_id)
        .await
        .unwrap();
    likes::toggle_like(&pool, &author, TargetType::Comment, top.id)
        .await
        .unwrap();
    likes::toggle_like(&pool, &fan, TargetType::Comment, reply.id)
        .await
        .unwrap();
    likes::toggle_like(&pool, &fan, TargetType::Post, survivor)
        .await
        .unwrap();

    let deletion = posts::delete_post(&pool, &author, post_id).await.unwrap();
    assert_eq!(deletion.comments_removed, 2);
    assert_eq!(deletion.likes_removed, 3);

    assert!(matches!(
        posts::get_post(&pool, &author, post_id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        likes::toggle_like(&pool, &fan, TargetType::Post, post_id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        new_comment(&pool, &fan, post_id, None).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        posts::delete_post(&pool, &author, post_id).await,
        Err(AppError::NotFound(_))
    ));

    let survivor_view = posts::get_post(&pool, &fan, survivor).await.unwrap();
    assert_eq!(survivor_view.likes_count, 1);
    assert!(survivor_view.is_liked);

    assert_no_drift(&pool).await;
    let report = counters::reconcile(&pool).await.unwrap();
    assert_eq!(report.total(), 0);
}

#[tokio::test]
async fn reconcile_repairs_corrupted_counters() {
    let pool = test_pool().await;
    let author = user();
    let post_id = new_post(&pool, &author, None).await;
    let top = new_comment(&pool, &author, post_id, None).await.unwrap();
    new_comment(&pool, &user(), post_id, Some(top.id)).await.unwrap();
    likes::toggle_like(&pool, &user(), TargetType::Post, post_id)
        .await
        .unwrap();

    sqlx::query("UPDATE posts SET likes_count = 7 WHERE id = ?")
        .bind(post_id)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE comments SET replies_count = 0 WHERE id = ?")
        .bind(top.id)
        .execute(&pool)
        .await
        .unwrap();

    let drift = counters::find_drift(&pool).await.unwrap();
    assert_eq!(drift.len(), 2);
    assert!(drift.iter().any(|d| d.entity == "post"
        && d.counter == "likes_count"
        && d.stored == 7
        && d.actual == 1));

    let report = counters::reconcile(&pool).await.unwrap();
    assert_eq!(report.post_likes_fixed, 1);
    assert_eq!(report.comment_replies_fixed, 1);
    assert_eq!(report.total(), 2);

    assert_eq!(post_counters(&pool, post_id).await, (1, 1));
    assert_eq!(comment_counters(&pool, top.id).await, (0, 1));
    assert_no_drift(&pool).await;

    let second = counters::reconcile(&pool).await.unwrap();
    assert_eq!(second.total(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_toggles_from_different_users_all_count() {
    let pool = shared_pool().await;
    let post_id = new_post(&pool, &user(), None).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            likes::toggle_like(&pool, &user(), TargetType::Post, post_id).await
        }));
    }
    for handle in handles {
        let toggle = handle.await.unwrap().unwrap();
        assert!(toggle.is_liked);
    }

    assert_eq!(post_counters(&pool, post_id).await.0, 8);
    assert_no_drift(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_users_liking_at_once_count_twice() {
    let pool = shared_pool().await;
    let post_id = new_post(&pool, &user(), None).await;
    let (u1, u2) = (user(), user());

    let (r1, r2) = tokio::join!(
        likes::toggle_like(&pool, &u1, TargetType::Post, post_id),
        likes::toggle_like(&pool, &u2, TargetType::Post, post_id),
    );
    assert!(r1.unwrap().is_liked);
    assert!(r2.unwrap().is_liked);

    let post = posts::get_post(&pool, &u1, post_id).await.unwrap();
    assert_eq!(post.likes_count, 2);
    assert_eq!(post.recent_likers.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_user_concurrent_toggles_never_double_like() {
    let pool = shared_pool().await;
    let post_id = new_post(&pool, &user(), None).await;
    let fan = user();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let (pool, fan) = (pool.clone(), fan.clone());
        handles.push(tokio::spawn(async move {
            likes::toggle_like(&pool, &fan, TargetType::Post, post_id).await
        }));
    }
    let mut liked = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_liked {
            liked += 1;
        }
    }
    // Four serialized toggles: like, unlike, like, unlike.
    assert_eq!(liked, 2);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE user_id = ?")
        .bind(&fan)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(post_counters(&pool, post_id).await.0, 0);
    assert_no_drift(&pool).await;
}

#[tokio::test]
async fn private_posts_are_hidden_from_others() {
    let pool = test_pool().await;
    let (author, stranger) = (user(), user());
    let public_id = new_post(&pool, &author, None).await;
    let private_id = new_post(&pool, &author, Some("private")).await;

    let own_feed = posts::list_feed(&pool, &author, PageParams::default())
        .await
        .unwrap();
    let own_ids: Vec<i64> = own_feed.items.iter().map(|p| p.id).collect();
    assert_eq!(own_ids, vec![private_id, public_id]);

    let stranger_feed = posts::list_feed(&pool, &stranger, PageParams::default())
        .await
        .unwrap();
    assert_eq!(stranger_feed.pagination.total, 1);
    assert_eq!(stranger_feed.items[0].id, public_id);

    let result = posts::get_post(&pool, &stranger, private_id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let opened = posts::update_post(
        &pool,
        &author,
        private_id,
        UpdatePostRequest {
            content: None,
            visibility: Some("public".to_string()),
        },
    )
    .await
    .unwrap();
    assert_eq!(opened.visibility, Visibility::Public);
    assert!(posts::get_post(&pool, &stranger, private_id).await.is_ok());
}

#[tokio::test]
async fn private_post_engagement_is_author_only() {
    let pool = test_pool().await;
    let (author, stranger) = (user(), user());
    let post_id = new_post(&pool, &author, Some("private")).await;
    let comment = new_comment(&pool, &author, post_id, None).await.unwrap();

    let result = comments::get_comments(&pool, &stranger, post_id, PageParams::default()).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    let result = comments::get_replies(&pool, &stranger, comment.id, PageParams::default()).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    let result = new_comment(&pool, &stranger, post_id, None).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    let result = new_comment(&pool, &stranger, post_id, Some(comment.id)).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    for (target_type, target_id) in [(TargetType::Post, post_id), (TargetType::Comment, comment.id)] {
        let result = likes::get_likes(&pool, &stranger, target_type, target_id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        let result = likes::toggle_like(&pool, &stranger, target_type, target_id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE user_id = ?")
        .bind(&stranger)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
    assert_eq!(post_counters(&pool, post_id).await, (0, 1));

    // The author still has full access.
    let listed = comments::get_comments(&pool, &author, post_id, PageParams::default())
        .await
        .unwrap();
    assert_eq!(listed.items.len(), 1);
    new_comment(&pool, &author, post_id, Some(comment.id)).await.unwrap();
    assert_eq!(
        comments::get_replies(&pool, &author, comment.id, PageParams::default())
            .await
            .unwrap()
            .items
            .len(),
        1
    );
    let toggle = likes::toggle_like(&pool, &author, TargetType::Comment, comment.id)
        .await
        .unwrap();
    assert!(toggle.is_liked);
    let summary = likes::get_likes(&pool, &author, TargetType::Comment, comment.id)
        .await
        .unwrap();
    assert_eq!(summary.likes_count, 1);
    assert!(summary.is_liked);
    assert_no_drift(&pool).await;
}

#[tokio::test]
async fn feed_shows_recent_likers_newest_first() {
    let pool = test_pool().await;
    let author = user();
    let post_id = new_post(&pool, &author, None).await;

    let fans: Vec<String> = (0..5).map(|_| user()).collect();
    for fan in &fans {
        likes::toggle_like(&pool, fan, TargetType::Post, post_id)
            .await
            .unwrap();
    }

    let feed = posts::list_feed(&pool, &fans[0], PageParams::default())
        .await
        .unwrap();
    let post = &feed.items[0];
    assert_eq!(post.likes_count, 5);
    assert!(post.is_liked);
    let recent: Vec<&str> = post.recent_likers.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(recent, vec![fans[4].as_str(), fans[3].as_str(), fans[2].as_str()]);
}

#[tokio::test]
async fn comments_paginate_newest_first_and_replies_oldest_first() {
    let pool = test_pool().await;
    let author = user();
    let post_id = new_post(&pool, &author, None).await;

    let mut top_ids = Vec::new();
    for _ in 0..3 {
        top_ids.push(new_comment(&pool, &author, post_id, None).await.unwrap().id);
    }
    let mut reply_ids = Vec::new();
    for _ in 0..3 {
        reply_ids.push(
            new_comment(&pool, &author, post_id, Some(top_ids[0]))
                .await
                .unwrap()
                .id,
        );
    }

    let first = comments::get_comments(&pool, &author, post_id, PageParams::new(1, 2))
        .await
        .unwrap();
    let ids: Vec<i64> = first.items.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![top_ids[2], top_ids[1]]);
    assert_eq!(first.pagination.total, 3);
    assert_eq!(first.pagination.pages, 2);

    let second = comments::get_comments(&pool, &author, post_id, PageParams::new(2, 2))
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].id, top_ids[0]);
    assert_eq!(second.items[0].replies_count, 3);

    let replies = comments::get_replies(&pool, &author, top_ids[0], PageParams::default())
        .await
        .unwrap();
    let ids: Vec<i64> = replies.items.iter().map(|c| c.id).collect();
    assert_eq!(ids, reply_ids);
}

#[tokio::test]
async fn content_is_trimmed_and_validated() {
    let pool = test_pool().await;
    let author = user();

    let blank = posts::create_post(
        &pool,
        &author,
        CreatePostRequest {
            content: "   ".to_string(),
            image_url: None,
            visibility: None,
        },
    )
    .await;
    assert!(matches!(blank, Err(AppError::BadRequest(_))));

    let bad_visibility = posts::create_post(
        &pool,
        &author,
        CreatePostRequest {
            content: "hi".to_string(),
            image_url: None,
            visibility: Some("friends".to_string()),
        },
    )
    .await;
    assert!(matches!(bad_visibility, Err(AppError::BadRequest(_))));

    let bad_image = posts::create_post(
        &pool,
        &author,
        CreatePostRequest {
            content: "hi".to_string(),
            image_url: Some("javascript:alert(1)".to_string()),
            visibility: None,
        },
    )
    .await;
    assert!(matches!(bad_image, Err(AppError::BadRequest(_))));

    let post = posts::create_post(
        &pool,
        &author,
        CreatePostRequest {
            content: "  padded  ".to_string(),
            image_url: Some("https://cdn.example.com/a.png".to_string()),
            visibility: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(post.content, "padded");
    assert_eq!(post.image_url.as_deref(), Some("https://cdn.example.com/a.png"));
    assert_eq!(post.visibility, Visibility::Public);

    let too_long = comments::create_comment(
        &pool,
        &author,
        CreateCommentRequest {
            post_id: post.id,
            content: "x".repeat(2001),
            parent_comment_id: None,
        },
    )
    .await;
    assert!(matches!(too_long, Err(AppError::BadRequest(_))));

    let blank_image = posts::create_post(
        &pool,
        &author,
        CreatePostRequest {
            content: "no picture".to_string(),
            image_url: Some("   ".to_string()),
            visibility: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(blank_image.image_url, None);

    // Markup that sanitizes away to nothing is empty content.
    let markup_only = comments::create_comment(
        &pool,
        &author,
        CreateCommentRequest {
            post_id: post.id,
            content: "<script>alert(1)</script>".to_string(),
            parent_comment_id: None,
        },
    )
    .await;
    assert!(matches!(markup_only, Err(AppError::BadRequest(_))));

    // Within the limit as typed, over it once escaped.
    let grows_when_escaped = comments::create_comment(
        &pool,
        &author,
        CreateCommentRequest {
            post_id: post.id,
            content: "<".repeat(2000),
            parent_comment_id: None,
        },
    )
    .await;
    assert!(matches!(grows_when_escaped, Err(AppError::BadRequest(_))));

    let escaped = comments::create_comment(
        &pool,
        &author,
        CreateCommentRequest {
            post_id: post.id,
            content: "a < b".to_string(),
            parent_comment_id: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(escaped.content, "a &lt; b");

    let comment = new_comment(&pool, &author, post.id, None).await.unwrap();
    let edited = comments::update_comment(
        &pool,
        &author,
        comment.id,
        UpdateCommentRequest {
            content: "  edited  ".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(edited.content, "edited");
    assert_eq!(edited.likes_count, 0);
}

#[tokio::test]
async fn stories_expire_after_ttl() {
    let pool = test_pool().await;
    let author = user();

    let story = stories::create_story(
        &pool,
        &author,
        CreateStoryRequest {
            image_url: "https://cdn.example.com/story.jpg".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(story.author.id, author);

    let day = chrono::Duration::hours(24);
    let shelf = stories::list_stories(&pool, day).await.unwrap();
    assert_eq!(shelf.len(), 1);
    assert_eq!(shelf[0].id, story.id);

    assert_eq!(stories::purge_expired(&pool, day).await.unwrap(), 0);
    assert_eq!(
        stories::purge_expired(&pool, chrono::Duration::zero()).await.unwrap(),
        1
    );
    assert!(stories::list_stories(&pool, day).await.unwrap().is_empty());

    let missing_image = stories::create_story(
        &pool,
        &author,
        CreateStoryRequest {
            image_url: String::new(),
        },
    )
    .await;
    assert!(matches!(missing_image, Err(AppError::BadRequest(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn commenting_while_the_post_is_deleted_reports_what_was_stored() {
    let pool = shared_pool().await;
    let (author, commenter) = (user(), user());

    for _ in 0..6 {
        let post_id = new_post(&pool, &author, None).await;

        let (created, deleted) = tokio::join!(
            new_comment(&pool, &commenter, post_id, None),
            posts::delete_post(&pool, &author, post_id),
        );
        deleted.unwrap();

        let stored: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ? AND author_id = ?")
                .bind(post_id)
                .bind(&commenter)
                .fetch_one(&pool)
                .await
                .unwrap();
        match created {
            Ok(comment) => {
                assert_eq!(stored, 1);
                assert_eq!(comment.post_id, post_id);
            }
            Err(AppError::NotFound(_)) => assert_eq!(stored, 0),
            Err(other) => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(post_counters(&pool, post_id).await, (0, 0));
    }
    assert_no_drift(&pool).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_edits_by_the_author_all_land() {
    let pool = shared_pool().await;
    let author = user();
    let post_id = new_post(&pool, &author, None).await;
    let comment_id = new_comment(&pool, &author, post_id, None).await.unwrap().id;

    let edits: Vec<String> = (0..6).map(|i| format!("edit {}", i)).collect();
    let mut handles = Vec::new();
    for edit in &edits {
        let (pool, author, edit) = (pool.clone(), author.clone(), edit.clone());
        handles.push(tokio::spawn(async move {
            let post = posts::update_post(
                &pool,
                &author,
                post_id,
                UpdatePostRequest {
                    content: Some(edit.clone()),
                    visibility: None,
                },
            )
            .await?;
            let comment = comments::update_comment(
                &pool,
                &author,
                comment_id,
                UpdateCommentRequest { content: edit },
            )
            .await?;
            Ok::<_, AppError>((post.content, comment.content))
        }));
    }
    for handle in handles {
        let (post_content, comment_content) = handle.await.unwrap().unwrap();
        assert!(edits.contains(&post_content));
        assert!(edits.contains(&comment_content));
    }

    let post = posts::get_post(&pool, &author, post_id).await.unwrap();
    assert!(edits.contains(&post.content));
    assert_eq!(post.comments_count, 1);
    let comment = comments::load_comment(&pool, &author, comment_id).await.unwrap();
    assert!(edits.contains(&comment.content));
    assert_no_drift(&pool).await;
}
