use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{patch, post},
};

/// Authenticated Router Module
///
/// Write endpoints. The router is wrapped in the hard-gate middleware in `create_router`,
/// and each handler also takes `AuthUser` so the identity it acts on is explicit.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /posts
        // The author is always the authenticated caller, never a body field.
        .route("/posts", post(handlers::create_post))
        // PATCH /posts/{post_id}
        // Owner-only partial update.
        .route("/posts/{post_id}", patch(handlers::update_post))
}
