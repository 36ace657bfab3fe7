use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::Post,
};

/// A post is visible when it is active, or when the viewer is its author.
pub fn is_visible(post: &Post, viewer: Option<&AuthUser>) -> bool {
    post.active || viewer.is_some_and(|user| user.id == post.author.id)
}

/// visible_posts
///
/// Stable filter over whatever the store returned: input order is kept and nothing
/// is paginated or truncated.
pub fn visible_posts(posts: Vec<Post>, viewer: Option<&AuthUser>) -> Vec<Post> {
    posts
        .into_iter()
        .filter(|post| is_visible(post, viewer))
        .collect()
}

/// ensure_owner
///
/// Ownership gate for mutating a post.
pub fn ensure_owner(post: &Post, user: &AuthUser) -> ApiResult<()> {
    if post.author.id == user.id {
        Ok(())
    } else {
        Err(ApiError::UnauthorizedUser)
    }
}
