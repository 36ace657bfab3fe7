use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A row of the `users` table as exposed by the API. The password column is never
/// selected, so it cannot leak through serialization.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq, Default)]
#[ts(export)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub name: String,
    pub location: String,
    pub active: bool,
}

/// Author
///
/// The owner summary embedded in every post.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq, Default)]
#[ts(export)]
pub struct Author {
    pub id: i32,
    pub username: String,
    pub name: String,
    pub location: String,
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            location: user.location.clone(),
        }
    }
}

/// Tag
///
/// A unique tag name. Tags are created the first time a post uses them.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq, Default)]
#[ts(export)]
pub struct Tag {
    pub id: i32,
    pub name: String,
}

/// Post
///
/// A post hydrated with its author and tags. The author never changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Default)]
#[ts(export)]
pub struct Post {
    pub id: i32,
    pub author: Author,
    pub title: String,
    pub content: String,
    // Inactive posts are only visible to their author.
    pub active: bool,
    pub tags: Vec<Tag>,
}

impl Post {
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }
}

// --- Store Inputs ---

/// NewPost
///
/// Everything the repository needs to insert a post. `tags` is already parsed and
/// deduplicated.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub author_id: i32,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// PostChanges
///
/// Field-level update. `None` means "leave as is"; `Some` replaces the value
/// (for `tags`, replaces the whole association set).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl PostChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.tags.is_none()
    }
}

// --- Request Payloads (Input Schemas) ---

/// TagsInput
///
/// Clients may send tags either as one whitespace-delimited string (`"a b c"`) or as
/// an array of names.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(untagged)]
#[ts(export)]
pub enum TagsInput {
    Text(String),
    List(Vec<String>),
}

impl TagsInput {
    /// Normalizes either form into an ordered list of distinct, non-empty names.
    pub fn into_names(self) -> Vec<String> {
        match self {
            TagsInput::Text(raw) => parse_tags(&raw),
            TagsInput::List(names) => dedup_names(names.iter().map(|name| name.trim())),
        }
    }
}

/// parse_tags
///
/// Splits on any run of whitespace, drops empty tokens and keeps the first occurrence
/// of each name. `"a b b"` yields `["a", "b"]`.
pub fn parse_tags(raw: &str) -> Vec<String> {
    dedup_names(raw.split_whitespace())
}

fn dedup_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names.filter(|name| !name.is_empty()) {
        if !out.iter().any(|seen| seen == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// CreatePostRequest
///
/// Input payload for `POST /posts`. `content` defaults to an empty string and `tags`
/// to none.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub tags: Option<TagsInput>,
}

impl CreatePostRequest {
    /// Returns `None` when the title is missing or blank.
    pub fn into_new_post(self, author_id: i32) -> Option<NewPost> {
        let title = self.title.filter(|title| !title.trim().is_empty())?;

        Some(NewPost {
            author_id,
            title,
            content: self.content.unwrap_or_default(),
            tags: self.tags.map(TagsInput::into_names).unwrap_or_default(),
        })
    }
}

/// UpdatePostRequest
///
/// Partial update payload for `PATCH /posts/{post_id}`. Absent (or `null`) fields are
/// left untouched, and so are an empty `content` or a blank (whitespace-only) title:
/// callers resend the full value to change a field.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagsInput>,
}

impl UpdatePostRequest {
    pub fn into_changes(self) -> PostChanges {
        PostChanges {
            title: self.title.filter(|title| !title.trim().is_empty()),
            content: self.content.filter(|content| !content.is_empty()),
            tags: self.tags.map(TagsInput::into_names),
        }
    }
}

// --- Response Envelopes ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostsResponse {
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostResponse {
    pub post: Post,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TagsResponse {
    pub tags: Vec<Tag>,
}
