use async_trait::async_trait;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use blog_api::{
    InMemoryRepository,
    auth::{AuthUser, MaybeUser},
    error::{ApiError, ErrorKind, RepoResult},
    handlers,
    models::{
        CreatePostRequest, NewPost, Post, PostChanges, Tag, TagsInput, UpdatePostRequest, User,
    },
    repository::{Repository, RepositoryState},
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::test;

// --- TEST UTILITIES ---

struct Fixture {
    repo: Arc<InMemoryRepository>,
    albert: User,
    sandra: User,
}

impl Fixture {
    async fn new() -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let albert = repo.add_user("albert", "Al Bert", "Sydney, Australia").await;
        let sandra = repo.add_user("sandra", "Just Sandra", "Ain't tellin'").await;
        Self {
            repo,
            albert,
            sandra,
        }
    }

    fn state(&self) -> State<RepositoryState> {
        State(self.repo.clone() as RepositoryState)
    }

    async fn create(&self, author: &User, title: &str, content: &str, tags: Option<TagsInput>) -> Post {
        let Json(post) = handlers::create_post(
            as_auth(author),
            self.state(),
            Json(CreatePostRequest {
                title: Some(title.to_string()),
                content: Some(content.to_string()),
                tags,
            }),
        )
        .await
        .unwrap();
        post
    }
}

fn as_auth(user: &User) -> AuthUser {
    AuthUser::from(user.clone())
}

fn ids(posts: &[Post]) -> Vec<i32> {
    posts.iter().map(|post| post.id).collect()
}

// --- GET /posts ---

#[test]
async fn test_get_posts_hides_inactive_posts_from_others() {
    let fx = Fixture::new().await;
    let first = fx.create(&fx.albert, "First Post", "hello", None).await;
    let hidden = fx.create(&fx.albert, "Draft", "wip", None).await;
    let third = fx.create(&fx.sandra, "How does this work?", "?", None).await;
    assert!(fx.repo.set_post_active(hidden.id, false).await);

    let Json(anonymous) = handlers::get_posts(MaybeUser(None), fx.state()).await.unwrap();
    assert_eq!(ids(&anonymous.posts), vec![first.id, third.id]);

    let Json(as_sandra) = handlers::get_posts(MaybeUser(Some(as_auth(&fx.sandra))), fx.state())
        .await
        .unwrap();
    assert_eq!(ids(&as_sandra.posts), vec![first.id, third.id]);

    let Json(as_albert) = handlers::get_posts(MaybeUser(Some(as_auth(&fx.albert))), fx.state())
        .await
        .unwrap();
    assert_eq!(ids(&as_albert.posts), vec![first.id, hidden.id, third.id]);
}

// --- POST /posts ---

#[test]
async fn test_create_post_with_duplicate_tags_in_string() {
    let fx = Fixture::new().await;
    let post = fx
        .create(&fx.albert, "T", "C", Some(TagsInput::Text("a b b".to_string())))
        .await;

    assert_eq!(post.author.id, fx.albert.id);
    assert_eq!(post.tag_names(), vec!["a", "b"]);

    let Json(tags) = handlers::get_tags(fx.state()).await.unwrap();
    let names: Vec<&str> = tags.tags.iter().map(|tag| tag.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
async fn test_create_post_reuses_existing_tags() {
    let fx = Fixture::new().await;
    let first = fx
        .create(&fx.albert, "One", "", Some(TagsInput::List(vec!["#happy".into()])))
        .await;
    let second = fx
        .create(
            &fx.sandra,
            "Two",
            "",
            Some(TagsInput::List(vec!["#happy".into(), "#worst-day-ever".into()])),
        )
        .await;

    assert_eq!(first.tags[0].id, second.tags[0].id);
    let Json(tags) = handlers::get_tags(fx.state()).await.unwrap();
    assert_eq!(tags.tags.len(), 2);
}

#[test]
async fn test_create_post_requires_title() {
    let fx = Fixture::new().await;

    for title in [None, Some("".to_string()), Some("   ".to_string())] {
        let result = handlers::create_post(
            as_auth(&fx.albert),
            fx.state(),
            Json(CreatePostRequest {
                title,
                ..CreatePostRequest::default()
            }),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PostCreation);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}

#[test]
async fn test_create_post_for_vanished_author_fails() {
    let fx = Fixture::new().await;
    let ghost = AuthUser {
        id: 99,
        username: "ghost".to_string(),
    };

    let result = handlers::create_post(
        ghost,
        fx.state(),
        Json(CreatePostRequest {
            title: Some("Boo".to_string()),
            ..CreatePostRequest::default()
        }),
    )
    .await;

    assert!(matches!(result, Err(ApiError::PostCreation)));
}

// --- PATCH /posts/{post_id} ---

#[test]
async fn test_update_with_only_tags_keeps_title_and_content() {
    let fx = Fixture::new().await;
    let post = fx
        .create(&fx.albert, "T", "C", Some(TagsInput::Text("old keep".to_string())))
        .await;

    let Json(updated) = handlers::update_post(
        as_auth(&fx.albert),
        fx.state(),
        Path(post.id),
        Json(UpdatePostRequest {
            tags: Some(TagsInput::List(vec!["keep".into(), "new".into()])),
            ..UpdatePostRequest::default()
        }),
    )
    .await
    .unwrap();

    assert_eq!(updated.post.title, "T");
    assert_eq!(updated.post.content, "C");
    assert_eq!(updated.post.tag_names(), vec!["keep", "new"]);
}

#[test]
async fn test_update_ignores_blank_title() {
    let fx = Fixture::new().await;
    let post = fx.create(&fx.albert, "T", "C", None).await;

    let Json(updated) = handlers::update_post(
        as_auth(&fx.albert),
        fx.state(),
        Path(post.id),
        Json(UpdatePostRequest {
            title: Some("".to_string()),
            content: Some("New content".to_string()),
            ..UpdatePostRequest::default()
        }),
    )
    .await
    .unwrap();

    assert_eq!(updated.post.title, "T");
    assert_eq!(updated.post.content, "New content");
}

#[test]
async fn test_update_with_empty_content_keeps_stored_content() {
    let fx = Fixture::new().await;
    let post = fx.create(&fx.albert, "T", "C", None).await;

    let Json(updated) = handlers::update_post(
        as_auth(&fx.albert),
        fx.state(),
        Path(post.id),
        Json(UpdatePostRequest {
            content: Some("".to_string()),
            ..UpdatePostRequest::default()
        }),
    )
    .await
    .unwrap();

    assert_eq!(updated.post.title, "T");
    assert_eq!(updated.post.content, "C");

    let stored = fx.repo.get_post_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(stored.content, "C");
}

#[test]
async fn test_update_by_other_user_is_rejected_and_store_untouched() {
    let fx = Fixture::new().await;
    let post = fx.create(&fx.albert, "T", "C", None).await;
    assert_eq!(fx.albert.id, 1);
    assert_eq!(fx.sandra.id, 2);

    let result = handlers::update_post(
        as_auth(&fx.sandra),
        fx.state(),
        Path(post.id),
        Json(UpdatePostRequest {
            title: Some("X".to_string()),
            ..UpdatePostRequest::default()
        }),
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnauthorizedUser);
    assert_eq!(err.to_string(), "You cannot update a post that is not yours");
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

    let stored = fx.repo.get_post_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "T");
    assert_eq!(stored.content, "C");
}

#[test]
async fn test_update_missing_post_is_not_found() {
    let fx = Fixture::new().await;

    let result = handlers::update_post(
        as_auth(&fx.albert),
        fx.state(),
        Path(404),
        Json(UpdatePostRequest::default()),
    )
    .await;

    assert!(matches!(result, Err(ApiError::PostNotFound)));
}

/// Records every write so a test can assert that nothing was attempted.
struct SpyRepo {
    inner: InMemoryRepository,
    writes: AtomicUsize,
}

#[async_trait]
impl Repository for SpyRepo {
    async fn get_user_by_id(&self, id: i32) -> RepoResult<Option<User>> {
        self.inner.get_user_by_id(id).await
    }
    async fn get_all_users(&self) -> RepoResult<Vec<User>> {
        self.inner.get_all_users().await
    }
    async fn create_post(&self, post: NewPost) -> RepoResult<Option<Post>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.create_post(post).await
    }
    async fn get_post_by_id(&self, id: i32) -> RepoResult<Option<Post>> {
        self.inner.get_post_by_id(id).await
    }
    async fn update_post(&self, id: i32, changes: PostChanges) -> RepoResult<Option<Post>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update_post(id, changes).await
    }
    async fn delete_post(&self, id: i32) -> RepoResult<Option<Post>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_post(id).await
    }
    async fn get_all_posts(&self) -> RepoResult<Vec<Post>> {
        self.inner.get_all_posts().await
    }
    async fn get_all_tags(&self) -> RepoResult<Vec<Tag>> {
        self.inner.get_all_tags().await
    }
    async fn get_posts_by_tag_name(&self, name: &str) -> RepoResult<Vec<Post>> {
        self.inner.get_posts_by_tag_name(name).await
    }
}

#[test]
async fn test_rejected_update_never_reaches_the_store() {
    let spy = Arc::new(SpyRepo {
        inner: InMemoryRepository::new(),
        writes: AtomicUsize::new(0),
    });
    let owner = spy.inner.add_user("albert", "Al Bert", "Sydney").await;
    let intruder = spy.inner.add_user("sandra", "Just Sandra", "Nowhere").await;
    let post = spy
        .create_post(NewPost {
            author_id: owner.id,
            title: "T".into(),
            content: "C".into(),
            tags: vec![],
        })
        .await
        .unwrap()
        .unwrap();
    let writes_before = spy.writes.load(Ordering::SeqCst);

    let result = handlers::update_post(
        as_auth(&intruder),
        State(spy.clone() as RepositoryState),
        Path(post.id),
        Json(UpdatePostRequest {
            title: Some("X".into()),
            content: Some("Y".into()),
            tags: Some(TagsInput::Text("z".into())),
        }),
    )
    .await;

    assert!(matches!(result, Err(ApiError::UnauthorizedUser)));
    assert_eq!(spy.writes.load(Ordering::SeqCst), writes_before);
}

// --- DELETE /posts/{post_id} ---

#[test]
async fn test_delete_returns_post_then_not_found() {
    let fx = Fixture::new().await;
    let post = fx.create(&fx.albert, "T", "C", None).await;

    // Anonymous deletion is allowed (no ownership gate on delete).
    let Json(deleted) = handlers::delete_post(MaybeUser(None), fx.state(), Path(post.id))
        .await
        .unwrap();
    assert_eq!(deleted.post.id, post.id);

    let again = handlers::delete_post(MaybeUser(None), fx.state(), Path(post.id)).await;
    let err = again.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PostNotFound);
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
}

// --- Users & Tags ---

#[test]
async fn test_get_users_lists_everyone() {
    let fx = Fixture::new().await;
    let Json(users) = handlers::get_users(fx.state()).await.unwrap();
    let names: Vec<&str> = users.users.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["albert", "sandra"]);
}

#[test]
async fn test_posts_by_tag_apply_visibility() {
    let fx = Fixture::new().await;
    let open = fx
        .create(&fx.albert, "Open", "", Some(TagsInput::Text("#happy".into())))
        .await;
    let draft = fx
        .create(&fx.albert, "Draft", "", Some(TagsInput::Text("#happy #draft".into())))
        .await;
    fx.create(&fx.sandra, "Other", "", Some(TagsInput::Text("#sad".into())))
        .await;
    fx.repo.set_post_active(draft.id, false).await;

    let Json(anonymous) =
        handlers::get_posts_by_tag(MaybeUser(None), fx.state(), Path("#happy".to_string()))
            .await
            .unwrap();
    assert_eq!(ids(&anonymous.posts), vec![open.id]);

    let Json(owner) = handlers::get_posts_by_tag(
        MaybeUser(Some(as_auth(&fx.albert))),
        fx.state(),
        Path("#happy".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(ids(&owner.posts), vec![open.id, draft.id]);

    let Json(unknown) =
        handlers::get_posts_by_tag(MaybeUser(None), fx.state(), Path("#nope".to_string()))
            .await
            .unwrap();
    assert!(unknown.posts.is_empty());
}

// --- Store failures ---

struct BrokenRepo;

#[async_trait]
impl Repository for BrokenRepo {
    async fn get_user_by_id(&self, _id: i32) -> RepoResult<Option<User>> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn get_all_users(&self) -> RepoResult<Vec<User>> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn create_post(&self, _post: NewPost) -> RepoResult<Option<Post>> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn get_post_by_id(&self, _id: i32) -> RepoResult<Option<Post>> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn update_post(&self, _id: i32, _changes: PostChanges) -> RepoResult<Option<Post>> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn delete_post(&self, _id: i32) -> RepoResult<Option<Post>> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn get_all_posts(&self) -> RepoResult<Vec<Post>> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn get_all_tags(&self) -> RepoResult<Vec<Tag>> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
    async fn get_posts_by_tag_name(&self, _name: &str) -> RepoResult<Vec<Post>> {
        Err(sqlx::Error::PoolTimedOut.into())
    }
}

#[test]
async fn test_store_failure_surfaces_as_500() {
    let state = State(Arc::new(BrokenRepo) as RepositoryState);

    let err = handlers::get_posts(MaybeUser(None), state).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Database);
    assert_eq!(
        err.into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
