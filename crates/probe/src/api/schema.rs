//! Wire types for the Conduit REST API.
//!
//! Every response field is optional so that "field absent" is something a
//! test can assert on instead of a decode failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{"user": {...}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserEnvelope {
    /// Wrapped user
    pub user: Option<User>,
}

/// Authenticated user as returned by login, registration and `/user`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct User {
    /// Login email
    pub email: Option<String>,
    /// JWT
    pub token: Option<String>,
    /// Display name
    pub username: Option<String>,
    /// Profile bio
    pub bio: Option<String>,
    /// Avatar URL
    pub image: Option<String>,
}

/// `{"profile": {...}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileEnvelope {
    /// Wrapped profile
    pub profile: Option<Profile>,
}

/// Public profile, also used for article and comment authors
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Profile {
    /// Display name
    pub username: Option<String>,
    /// Profile bio
    pub bio: Option<String>,
    /// Avatar URL
    pub image: Option<String>,
    /// Whether the caller follows this profile
    pub following: Option<bool>,
}

/// `{"article": {...}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleEnvelope {
    /// Wrapped article
    pub article: Option<Article>,
}

/// `{"articles": [...], "articlesCount": n}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlesEnvelope {
    /// Page of articles
    #[serde(default)]
    pub articles: Vec<Article>,
    /// Total matching the query, across all pages
    pub articles_count: Option<u64>,
}

/// Article resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// URL slug derived from the title
    pub slug: Option<String>,
    /// Title
    pub title: Option<String>,
    /// Short description
    pub description: Option<String>,
    /// Markdown body
    pub body: Option<String>,
    /// Tags
    pub tag_list: Option<Vec<String>>,
    /// Creation timestamp, ISO-8601
    pub created_at: Option<String>,
    /// Last update timestamp, ISO-8601
    pub updated_at: Option<String>,
    /// Whether the caller favorited it
    pub favorited: Option<bool>,
    /// Number of favorites
    pub favorites_count: Option<u64>,
    /// Author profile
    pub author: Option<Profile>,
}

/// `{"comment": {...}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentEnvelope {
    /// Wrapped comment
    pub comment: Option<Comment>,
}

/// `{"comments": [...]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentsEnvelope {
    /// Comments on one article
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// Comment resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Identifier; a UUID string or an integer depending on the backend
    pub id: Option<serde_json::Value>,
    /// Comment text
    pub body: Option<String>,
    /// Creation timestamp
    pub created_at: Option<String>,
    /// Last update timestamp
    pub updated_at: Option<String>,
    /// Author profile
    pub author: Option<Profile>,
    /// Likes on this comment
    pub likes_count: Option<u64>,
    /// Dislikes on this comment
    pub dislikes_count: Option<u64>,
    /// The caller's reaction, `LIKE` or `DISLIKE`
    pub current_user_reaction: Option<String>,
}

impl Comment {
    /// Identifier rendered as a string
    #[must_use]
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// `{"tags": [...]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagsEnvelope {
    /// All tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// `{"errors": {"field": ["message"]}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorsEnvelope {
    /// Messages grouped by field
    #[serde(default)]
    pub errors: std::collections::BTreeMap<String, Vec<String>>,
}

/// Article payload for create and for the editor form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDraft {
    /// Title
    pub title: String,
    /// Short description
    pub description: String,
    /// Markdown body
    pub body: String,
    /// Tags
    pub tag_list: Vec<String>,
}

impl ArticleDraft {
    /// Draft with a title unique to this run, so parallel tests never collide
    #[must_use]
    pub fn unique(prefix: &str) -> Self {
        let title = unique_name(prefix);
        Self {
            description: format!("Description for {title}"),
            body: format!("Body for {title}"),
            title,
            tag_list: Vec::new(),
        }
    }

    /// Add a tag
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag_list.push(tag.into());
        self
    }
}

/// Partial article update; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArticleUpdate {
    /// New title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Partial user update for `PUT /user`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserUpdate {
    /// New email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New username
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// New password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// New bio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// New avatar URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// `prefix-<8 hex chars>`
#[must_use]
pub fn unique_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &id[..8])
}

/// Slug of the article in a single-article body
#[must_use]
pub fn extract_slug(body: &str) -> Option<String> {
    serde_json::from_str::<ArticleEnvelope>(body)
        .ok()?
        .article?
        .slug
}

/// `createdAt` of the article or comment in a single-resource body
#[must_use]
pub fn extract_created_at(body: &str) -> Option<String> {
    if let Some(article) = serde_json::from_str::<ArticleEnvelope>(body)
        .ok()
        .and_then(|e| e.article)
    {
        return article.created_at;
    }
    serde_json::from_str::<CommentEnvelope>(body)
        .ok()?
        .comment?
        .created_at
}

/// `updatedAt` of the article or comment in a single-resource body
#[must_use]
pub fn extract_updated_at(body: &str) -> Option<String> {
    if let Some(article) = serde_json::from_str::<ArticleEnvelope>(body)
        .ok()
        .and_then(|e| e.article)
    {
        return article.updated_at;
    }
    serde_json::from_str::<CommentEnvelope>(body)
        .ok()?
        .comment?
        .updated_at
}

/// Identifier of the comment in a single-comment body
#[must_use]
pub fn extract_comment_id(body: &str) -> Option<String> {
    serde_json::from_str::<CommentEnvelope>(body)
        .ok()?
        .comment?
        .id_string()
}

/// Parse an ISO-8601 / RFC 3339 timestamp
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whether `value` is an ISO-8601 timestamp with an offset or `Z`
#[must_use]
pub fn is_iso8601(value: &str) -> bool {
    parse_timestamp(value).is_some()
}
