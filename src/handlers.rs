use crate::{
    access::{ensure_owner, visible_posts},
    auth::{AuthUser, MaybeUser},
    error::{ApiError, ApiResult, ErrorBody},
    models::{
        CreatePostRequest, Post, PostResponse, PostsResponse, TagsResponse, UpdatePostRequest,
        UsersResponse,
    },
    repository::RepositoryState,
};
use axum::{
    Json,
    extract::{Path, State},
};

// --- Posts ---

/// get_posts
///
/// [Public Route] Lists every post the requester may see: all active posts, plus the
/// requester's own inactive posts when authenticated.
#[utoipa::path(
    get,
    path = "/posts",
    responses(
        (status = 200, description = "Visible posts", body = PostsResponse),
        (status = 401, description = "Malformed header or invalid token", body = ErrorBody)
    )
)]
pub async fn get_posts(
    MaybeUser(viewer): MaybeUser,
    State(repo): State<RepositoryState>,
) -> ApiResult<Json<PostsResponse>> {
    let all_posts = repo.get_all_posts().await?;
    let posts = visible_posts(all_posts, viewer.as_ref());
    Ok(Json(PostsResponse { posts }))
}

/// create_post
///
/// [Authenticated Route] Creates a post owned by the requester. `tags` may be a
/// whitespace-delimited string or an array.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 200, description = "Created", body = Post),
        (status = 400, description = "Missing title or store refused the post", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn create_post(
    AuthUser { id, .. }: AuthUser,
    State(repo): State<RepositoryState>,
    Json(payload): Json<CreatePostRequest>,
) -> ApiResult<Json<Post>> {
    let new_post = payload.into_new_post(id).ok_or(ApiError::PostCreation)?;

    match repo.create_post(new_post).await? {
        Some(post) => {
            tracing::info!(post_id = post.id, author_id = id, "post created");
            Ok(Json(post))
        }
        None => Err(ApiError::PostCreation),
    }
}

/// update_post
///
/// [Authenticated Route] Applies a partial update to a post the requester owns.
///
/// *Authorization*: the stored author is compared with the requester before anything is
/// written; a mismatch fails with `UnauthorizedUserError` and leaves the store untouched.
#[utoipa::path(
    patch,
    path = "/posts/{post_id}",
    params(("post_id" = i32, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = PostResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_post(
    user: AuthUser,
    State(repo): State<RepositoryState>,
    Path(post_id): Path<i32>,
    Json(payload): Json<UpdatePostRequest>,
) -> ApiResult<Json<PostResponse>> {
    let original = repo
        .get_post_by_id(post_id)
        .await?
        .ok_or(ApiError::PostNotFound)?;

    if let Err(e) = ensure_owner(&original, &user) {
        tracing::warn!(post_id, user_id = user.id, "rejected update of a post owned by someone else");
        return Err(e);
    }

    let changes = payload.into_changes();
    if changes.is_empty() {
        return Ok(Json(PostResponse { post: original }));
    }

    let post = repo
        .update_post(post_id, changes)
        .await?
        .ok_or(ApiError::PostNotFound)?;

    Ok(Json(PostResponse { post }))
}

/// delete_post
///
/// [Public Route] Deletes a post by id and returns it.
///
/// *Note*: no ownership check is applied, matching the behavior this API has always had.
/// The requester (if any) is logged so deletions stay attributable.
#[utoipa::path(
    delete,
    path = "/posts/{post_id}",
    params(("post_id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted", body = PostResponse),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_post(
    MaybeUser(requester): MaybeUser,
    State(repo): State<RepositoryState>,
    Path(post_id): Path<i32>,
) -> ApiResult<Json<PostResponse>> {
    let requester_id = requester.as_ref().map(|user| user.id);

    match repo.delete_post(post_id).await? {
        Some(post) => {
            tracing::info!(post_id, ?requester_id, author_id = post.author.id, "post deleted");
            Ok(Json(PostResponse { post }))
        }
        None => Err(ApiError::PostNotFound),
    }
}

// --- Users & Tags ---

/// get_users
///
/// [Public Route] Lists all users.
#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "Users", body = UsersResponse))
)]
pub async fn get_users(State(repo): State<RepositoryState>) -> ApiResult<Json<UsersResponse>> {
    let users = repo.get_all_users().await?;
    Ok(Json(UsersResponse { users }))
}

/// get_tags
///
/// [Public Route] Lists every tag that has ever been used.
#[utoipa::path(
    get,
    path = "/tags",
    responses((status = 200, description = "Tags", body = TagsResponse))
)]
pub async fn get_tags(State(repo): State<RepositoryState>) -> ApiResult<Json<TagsResponse>> {
    let tags = repo.get_all_tags().await?;
    Ok(Json(TagsResponse { tags }))
}

/// get_posts_by_tag
///
/// [Public Route] Posts carrying the given tag, with the same visibility rules as
/// `GET /posts`.
#[utoipa::path(
    get,
    path = "/tags/{tag_name}/posts",
    params(("tag_name" = String, Path, description = "Tag name")),
    responses((status = 200, description = "Tagged posts", body = PostsResponse))
)]
pub async fn get_posts_by_tag(
    MaybeUser(viewer): MaybeUser,
    State(repo): State<RepositoryState>,
    Path(tag_name): Path<String>,
) -> ApiResult<Json<PostsResponse>> {
    let tagged = repo.get_posts_by_tag_name(&tag_name).await?;
    let posts = visible_posts(tagged, viewer.as_ref());
    Ok(Json(PostsResponse { posts }))
}
