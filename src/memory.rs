use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::RepoResult;
use crate::models::{Author, NewPost, Post, PostChanges, Tag, User};
use crate::repository::Repository;

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory. It honors the same contract as the
/// Postgres store (unique tag names, wholesale tag replacement, delete returning the
/// removed post) and keeps tags in the order they were first attached. Backs the test
/// suites, which exercise handlers and the router without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

#[derive(Default)]
struct Store {
    users: Vec<User>,
    posts: Vec<StoredPost>,
    tags: Vec<Tag>,
    last_user_id: i32,
    last_post_id: i32,
    last_tag_id: i32,
}

struct StoredPost {
    id: i32,
    author_id: i32,
    title: String,
    content: String,
    active: bool,
    tag_ids: Vec<i32>,
}

impl Store {
    fn tag_id(&mut self, name: &str) -> i32 {
        if let Some(tag) = self.tags.iter().find(|tag| tag.name == name) {
            return tag.id;
        }
        self.last_tag_id += 1;
        self.tags.push(Tag {
            id: self.last_tag_id,
            name: name.to_string(),
        });
        self.last_tag_id
    }

    fn tag_ids(&mut self, names: &[String]) -> Vec<i32> {
        let mut ids: Vec<i32> = Vec::with_capacity(names.len());
        for name in names {
            let id = self.tag_id(name);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    fn hydrate(&self, stored: &StoredPost) -> Option<Post> {
        let author = self
            .users
            .iter()
            .find(|user| user.id == stored.author_id)
            .map(Author::from)?;

        let tags = stored
            .tag_ids
            .iter()
            .filter_map(|id| self.tags.iter().find(|tag| tag.id == *id).cloned())
            .collect();

        Some(Post {
            id: stored.id,
            author,
            title: stored.title.clone(),
            content: stored.content.clone(),
            active: stored.active,
            tags,
        })
    }

    fn post(&self, id: i32) -> Option<Post> {
        self.posts
            .iter()
            .find(|post| post.id == id)
            .and_then(|post| self.hydrate(post))
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user and returns it with its assigned id (ids start at 1).
    pub async fn add_user(&self, username: &str, name: &str, location: &str) -> User {
        let mut store = self.store.write().await;
        store.last_user_id += 1;
        let user = User {
            id: store.last_user_id,
            username: username.to_string(),
            name: name.to_string(),
            location: location.to_string(),
            active: true,
        };
        store.users.push(user.clone());
        user
    }

    /// Flips a post's `active` flag. Returns false when the post does not exist.
    pub async fn set_post_active(&self, id: i32, active: bool) -> bool {
        let mut store = self.store.write().await;
        match store.posts.iter_mut().find(|post| post.id == id) {
            Some(post) => {
                post.active = active;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user_by_id(&self, id: i32) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|user| user.id == id).cloned())
    }

    async fn get_all_users(&self) -> RepoResult<Vec<User>> {
        Ok(self.store.read().await.users.clone())
    }

    async fn create_post(&self, post: NewPost) -> RepoResult<Option<Post>> {
        let mut store = self.store.write().await;

        // Mirrors the foreign key on posts.authorId.
        if !store.users.iter().any(|user| user.id == post.author_id) {
            return Ok(None);
        }

        let tag_ids = store.tag_ids(&post.tags);
        store.last_post_id += 1;
        let id = store.last_post_id;
        store.posts.push(StoredPost {
            id,
            author_id: post.author_id,
            title: post.title,
            content: post.content,
            active: true,
            tag_ids,
        });

        Ok(store.post(id))
    }

    async fn get_post_by_id(&self, id: i32) -> RepoResult<Option<Post>> {
        Ok(self.store.read().await.post(id))
    }

    async fn update_post(&self, id: i32, changes: PostChanges) -> RepoResult<Option<Post>> {
        let mut store = self.store.write().await;

        if !store.posts.iter().any(|post| post.id == id) {
            return Ok(None);
        }
        let tag_ids = changes.tags.as_deref().map(|names| store.tag_ids(names));

        let Some(stored) = store.posts.iter_mut().find(|post| post.id == id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            stored.title = title;
        }
        if let Some(content) = changes.content {
            stored.content = content;
        }
        if let Some(tag_ids) = tag_ids {
            stored.tag_ids = tag_ids;
        }

        Ok(store.post(id))
    }

    async fn delete_post(&self, id: i32) -> RepoResult<Option<Post>> {
        let mut store = self.store.write().await;
        let post = store.post(id);
        store.posts.retain(|stored| stored.id != id);
        Ok(post)
    }

    async fn get_all_posts(&self) -> RepoResult<Vec<Post>> {
        let store = self.store.read().await;
        Ok(store
            .posts
            .iter()
            .filter_map(|post| store.hydrate(post))
            .collect())
    }

    async fn get_all_tags(&self) -> RepoResult<Vec<Tag>> {
        Ok(self.store.read().await.tags.clone())
    }

    async fn get_posts_by_tag_name(&self, name: &str) -> RepoResult<Vec<Post>> {
        let store = self.store.read().await;
        let Some(tag) = store.tags.iter().find(|tag| tag.name == name) else {
            return Ok(vec![]);
        };

        Ok(store
            .posts
            .iter()
            .filter(|post| post.tag_ids.contains(&tag.id))
            .filter_map(|post| store.hydrate(post))
            .collect())
    }
}
