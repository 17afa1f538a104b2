// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, comments, likes, posts, profile, stories},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Every `/api` route sits behind `auth_middleware`; admin routes also need the admin role.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let post_routes = Router::new()
        .route("/", get(posts::list_feed).post(posts::create_post))
        .route(
            "/{id}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        );

    let comment_routes = Router::new()
        .route("/", post(comments::create_comment))
        .route("/post/{post_id}", get(comments::list_comments))
        .route("/{id}/replies", get(comments::list_replies))
        .route(
            "/{id}",
            put(comments::update_comment).delete(comments::delete_comment),
        );

    let like_routes = Router::new()
        .route("/toggle", post(likes::toggle_like))
        .route("/{target_type}/{target_id}", get(likes::get_likes));

    let story_routes =
        Router::new().route("/", get(stories::list_stories).post(stories::create_story));

    let user_routes = Router::new().route("/me", get(profile::get_me).put(profile::update_me));

    // Inner layer runs after auth has injected the claims.
    let admin_routes = Router::new()
        .route("/counters/drift", get(admin::counter_drift))
        .route("/counters/reconcile", post(admin::reconcile_counters))
        .layer(middleware::from_fn(admin_middleware));

    let api_routes = Router::new()
        .nest("/posts", post_routes)
        .nest("/comments", comment_routes)
        .nest("/likes", like_routes)
        .nest("/stories", story_routes)
        .nest("/users", user_routes)
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/", get(|| async { "BuddyScript API is running" }))
        .nest("/api", api_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
