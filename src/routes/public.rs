use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get},
};

/// Public Router Module
///
/// Endpoints reachable without credentials. A valid token still identifies the caller
/// (soft gate), which lets authors see their own inactive posts; a malformed header or
/// a bad token is rejected before any handler runs.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /posts
        // Active posts plus the caller's own inactive posts.
        .route("/posts", get(handlers::get_posts))
        // DELETE /posts/{post_id}
        // Deliberately left without an ownership gate; see DESIGN.md.
        .route("/posts/{post_id}", delete(handlers::delete_post))
        .route("/users", get(handlers::get_users))
        .route("/tags", get(handlers::get_tags))
        // GET /tags/{tag_name}/posts
        // Same visibility rules as GET /posts.
        .route("/tags/{tag_name}/posts", get(handlers::get_posts_by_tag))
}
