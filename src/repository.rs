use crate::error::RepoResult;
use crate::models::{Author, NewPost, Post, PostChanges, Tag, User};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::sync::Arc;

/// Repository Trait
///
/// The persistence contract the handlers and the Token Verifier depend on. Every method
/// reports store failures as `RepositoryError`; nothing is swallowed here.
///
/// **Send + Sync + async_trait** are required to share `Arc<dyn Repository>` across
/// Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user_by_id(&self, id: i32) -> RepoResult<Option<User>>;
    async fn get_all_users(&self) -> RepoResult<Vec<User>>;

    // --- Posts ---
    // Returns None when the store did not produce a post.
    async fn create_post(&self, post: NewPost) -> RepoResult<Option<Post>>;
    async fn get_post_by_id(&self, id: i32) -> RepoResult<Option<Post>>;
    // Applies only the fields present in `changes`; supplied tags replace the old set.
    async fn update_post(&self, id: i32, changes: PostChanges) -> RepoResult<Option<Post>>;
    // Returns the deleted post, or None when nothing matched.
    async fn delete_post(&self, id: i32) -> RepoResult<Option<Post>>;
    async fn get_all_posts(&self) -> RepoResult<Vec<Post>>;

    // --- Tags ---
    async fn get_all_tags(&self) -> RepoResult<Vec<Tag>>;
    async fn get_posts_by_tag_name(&self, name: &str) -> RepoResult<Vec<Post>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostRow
///
/// A bare `posts` row before the author and tags are attached.
#[derive(Debug, FromRow)]
struct PostRow {
    id: i32,
    author_id: i32,
    title: String,
    content: String,
    active: bool,
}

const POST_COLUMNS: &str = r#"p.id, p."authorId" AS author_id, p.title, p.content, p.active"#;

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Post and tag writes for one request run inside a
/// single transaction; tag names rely on the `UNIQUE(name)` constraint for idempotency.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: PostRow) -> RepoResult<Post> {
        let author = sqlx::query_as::<_, Author>(
            "SELECT id, username, name, location FROM users WHERE id = $1",
        )
        .bind(row.author_id)
        .fetch_one(&self.pool)
        .await?;

        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name
            FROM tags t
            JOIN post_tags pt ON pt."tagId" = t.id
            WHERE pt."postId" = $1
            ORDER BY pt.position, t.id
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Post {
            id: row.id,
            author,
            title: row.title,
            content: row.content,
            active: row.active,
            tags,
        })
    }

    async fn hydrate_all(&self, rows: Vec<PostRow>) -> RepoResult<Vec<Post>> {
        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            posts.push(self.hydrate(row).await?);
        }
        Ok(posts)
    }

    /// Creates any missing tags and links all of `names` to the post, recording each
    /// name's index in `post_tags.position`.
    async fn attach_tags(
        tx: &mut Transaction<'_, Postgres>,
        post_id: i32,
        names: &[String],
    ) -> RepoResult<()> {
        if names.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO tags (name) SELECT * FROM UNNEST($1::text[]) ON CONFLICT (name) DO NOTHING",
        )
        .bind(names)
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO post_tags ("postId", "tagId", position)
            SELECT $1, t.id, n.ord::int
            FROM UNNEST($2::text[]) WITH ORDINALITY AS n(name, ord)
            JOIN tags t ON t.name = n.name
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(names)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user_by_id(&self, id: i32) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, name, location, active FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_all_users(&self) -> RepoResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, name, location, active FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// create_post
    ///
    /// Inserts the post and its tag links in one transaction, then reads it back hydrated.
    /// An author that no longer exists trips the `authorId` foreign key; that is reported
    /// as `None` rather than a store failure.
    async fn create_post(&self, post: NewPost) -> RepoResult<Option<Post>> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_scalar::<_, i32>(
            r#"INSERT INTO posts ("authorId", title, content) VALUES ($1, $2, $3) RETURNING id"#,
        )
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.content)
        .fetch_one(&mut *tx)
        .await;

        let post_id = match inserted {
            Ok(id) => id,
            Err(e) if is_foreign_key_violation(&e) => {
                tracing::warn!(author_id = post.author_id, "post author does not exist");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        Self::attach_tags(&mut tx, post_id, &post.tags).await?;
        tx.commit().await?;

        self.get_post_by_id(post_id).await
    }

    async fn get_post_by_id(&self, id: i32) -> RepoResult<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// update_post
    ///
    /// Uses `COALESCE` so that `None` fields keep their stored value. When tags are
    /// supplied, every existing link is dropped and the new set is attached in the
    /// supplied order. The author column is never written.
    async fn update_post(&self, id: i32, changes: PostChanges) -> RepoResult<Option<Post>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title),
                content = COALESCE($3, content)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.content)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(tags) = changes.tags {
            sqlx::query(r#"DELETE FROM post_tags WHERE "postId" = $1"#)
                .bind(id)
                .execute(&mut *tx)
                .await?;

            Self::attach_tags(&mut tx, id, &tags).await?;
        }

        tx.commit().await?;

        self.get_post_by_id(id).await
    }

    /// delete_post
    ///
    /// Reads the post first so the deleted record can be returned; `post_tags` rows go
    /// with it through the foreign-key cascade.
    async fn delete_post(&self, id: i32) -> RepoResult<Option<Post>> {
        let Some(post) = self.get_post_by_id(id).await? else {
            return Ok(None);
        };

        let deleted = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok((deleted.rows_affected() > 0).then_some(post))
    }

    async fn get_all_posts(&self) -> RepoResult<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p ORDER BY p.id"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_all(rows).await
    }

    async fn get_all_tags(&self) -> RepoResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    async fn get_posts_by_tag_name(&self, name: &str) -> RepoResult<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            JOIN post_tags pt ON pt."postId" = p.id
            JOIN tags t ON t.id = pt."tagId"
            WHERE t.name = $1
            ORDER BY p.id
            "#
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_all(rows).await
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_foreign_key_violation())
}
