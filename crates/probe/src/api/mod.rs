//! Direct REST access to the Conduit backend.
//!
//! Used for fast, deterministic setup and for authorization checks the UI
//! cannot express. Every mutating call takes an explicit `token`; `None`
//! sends the request unauthenticated. Any HTTP status comes back as an
//! [`ApiResponse`]; only transport failures are errors. Nothing is retried.

mod response;
mod schema;

pub use response::ApiResponse;
pub use schema::{
    extract_comment_id, extract_created_at, extract_slug, extract_updated_at, is_iso8601,
    parse_timestamp, unique_name, Article, ArticleDraft, ArticleEnvelope, ArticleUpdate,
    ArticlesEnvelope, Comment, CommentEnvelope, CommentsEnvelope, ErrorsEnvelope, Profile,
    ProfileEnvelope, TagsEnvelope, User, UserEnvelope, UserUpdate,
};

use crate::config::EnvironmentConfig;
use crate::result::{ProbeError, ProbeResult};
use parking_lot::RwLock;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde_json::{json, Value};
use std::time::Duration;

/// Filters for `GET /articles`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleQuery {
    /// Only articles with this tag
    pub tag: Option<String>,
    /// Only articles by this author
    pub author: Option<String>,
    /// Only articles favorited by this user
    pub favorited: Option<String>,
    /// Page size
    pub limit: Option<u32>,
    /// Page offset
    pub offset: Option<u32>,
}

impl ArticleQuery {
    /// Append the set filters to `url` as form-encoded query pairs
    fn append_to(&self, url: &mut Url) {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in [
            ("tag", self.tag.as_deref()),
            ("author", self.author.as_deref()),
            ("favorited", self.favorited.as_deref()),
        ] {
            if let Some(v) = value {
                pairs.append_pair(key, v);
            }
        }
        if let Some(limit) = self.limit {
            pairs.append_pair("limit", &limit.to_string());
        }
        if let Some(offset) = self.offset {
            pairs.append_pair("offset", &offset.to_string());
        }
        drop(pairs);
        if url.query() == Some("") {
            url.set_query(None);
        }
    }
}

/// HTTP client for one test execution.
///
/// Holds its own bearer token after [`login`](Self::login); clones of the
/// underlying connection pool are cheap but tokens are never shared.
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Client for `base_url` with a per-request timeout
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> ProbeResult<Self> {
        let base_url = base_url.as_ref();
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ProbeError::config(format!("API origin {base_url:?} is not a base URL")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("conduit-probe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    /// Client for the configured API origin
    pub fn from_config(config: &EnvironmentConfig) -> ProbeResult<Self> {
        Self::new(&config.api_url, config.timeouts.http())
    }

    /// API origin this client talks to
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Token issued by the last successful login, if any
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// Replace the held token
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    /// Drop the held token
    pub fn clear_token(&self) {
        self.set_token(None);
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// `POST /users/login`. Stores and returns the token.
    ///
    /// Any non-2xx answer is an [`ProbeError::Auth`] carrying the raw status
    /// and body.
    pub async fn login(&self, email: &str, password: &str) -> ProbeResult<String> {
        let body = json!({"user": {"email": email, "password": password}});
        let resp = self
            .send(Method::POST, &["users", "login"], Some(body), None)
            .await?;
        let token = Self::token_from(&resp)?;
        tracing::info!(email, "logged in via API");
        self.set_token(Some(token.clone()));
        Ok(token)
    }

    /// `POST /users`. Stores and returns the token of the new account.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> ProbeResult<String> {
        let resp = self.register_raw(username, email, password).await?;
        let token = Self::token_from(&resp)?;
        tracing::info!(username, "registered via API");
        self.set_token(Some(token.clone()));
        Ok(token)
    }

    /// `POST /users` without interpreting the outcome
    pub async fn register_raw(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ProbeResult<ApiResponse> {
        let body = json!({"user": {"username": username, "email": email, "password": password}});
        self.send(Method::POST, &["users"], Some(body), None).await
    }

    /// `POST /users/login` without interpreting the outcome
    pub async fn login_raw(&self, email: &str, password: &str) -> ProbeResult<ApiResponse> {
        let body = json!({"user": {"email": email, "password": password}});
        self.send(Method::POST, &["users", "login"], Some(body), None)
            .await
    }

    fn token_from(resp: &ApiResponse) -> ProbeResult<String> {
        if !resp.is_success() {
            return Err(ProbeError::Auth {
                status: resp.status(),
                body: resp.body().to_string(),
            });
        }
        resp.json::<UserEnvelope>()
            .ok()
            .and_then(|env| env.user)
            .and_then(|user| user.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProbeError::Auth {
                status: resp.status(),
                body: format!("response carried no token: {}", resp.body()),
            })
    }

    /// `GET /user`
    pub async fn current_user(&self, token: Option<&str>) -> ProbeResult<ApiResponse> {
        self.send(Method::GET, &["user"], None, token).await
    }

    /// `PUT /user`
    pub async fn update_user(
        &self,
        update: &UserUpdate,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        let body = json!({ "user": update });
        self.send(Method::PUT, &["user"], Some(body), token).await
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// `GET /profiles/:username`
    pub async fn get_profile(&self, username: &str, token: Option<&str>) -> ProbeResult<ApiResponse> {
        let path = ["profiles", username];
        self.send(Method::GET, &path, None, token).await
    }

    /// `POST /profiles/:username/follow`
    pub async fn follow_user(&self, username: &str, token: Option<&str>) -> ProbeResult<ApiResponse> {
        let path = ["profiles", username, "follow"];
        self.send(Method::POST, &path, None, token).await
    }

    /// `DELETE /profiles/:username/follow`
    pub async fn unfollow_user(
        &self,
        username: &str,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        let path = ["profiles", username, "follow"];
        self.send(Method::DELETE, &path, None, token).await
    }

    // =========================================================================
    // Articles
    // =========================================================================

    /// `POST /articles`
    pub async fn create_article(
        &self,
        draft: &ArticleDraft,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        let body = json!({ "article": draft });
        self.send(Method::POST, &["articles"], Some(body), token)
            .await
    }

    /// `PUT /articles/:slug`
    pub async fn update_article(
        &self,
        slug: &str,
        update: &ArticleUpdate,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        let body = json!({ "article": update });
        let path = ["articles", slug];
        self.send(Method::PUT, &path, Some(body), token).await
    }

    /// `DELETE /articles/:slug`
    pub async fn delete_article(&self, slug: &str, token: Option<&str>) -> ProbeResult<ApiResponse> {
        let path = ["articles", slug];
        self.send(Method::DELETE, &path, None, token).await
    }

    /// `GET /articles/:slug`
    pub async fn get_article(&self, slug: &str, token: Option<&str>) -> ProbeResult<ApiResponse> {
        let path = ["articles", slug];
        self.send(Method::GET, &path, None, token).await
    }

    /// `GET /articles` with filters and pagination
    pub async fn list_articles(
        &self,
        query: &ArticleQuery,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        let mut url = self.endpoint(&["articles"])?;
        query.append_to(&mut url);
        self.send_url(Method::GET, url, None, token).await
    }

    /// `GET /articles/feed`
    pub async fn feed(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        let query = ArticleQuery {
            limit,
            offset,
            ..ArticleQuery::default()
        };
        let mut url = self.endpoint(&["articles", "feed"])?;
        query.append_to(&mut url);
        self.send_url(Method::GET, url, None, token).await
    }

    /// `POST /articles/:slug/favorite`
    pub async fn favorite_article(
        &self,
        slug: &str,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        let path = ["articles", slug, "favorite"];
        self.send(Method::POST, &path, None, token).await
    }

    /// `DELETE /articles/:slug/favorite`
    pub async fn unfavorite_article(
        &self,
        slug: &str,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        let path = ["articles", slug, "favorite"];
        self.send(Method::DELETE, &path, None, token).await
    }

    /// `GET /tags`
    pub async fn tags(&self) -> ProbeResult<ApiResponse> {
        self.send(Method::GET, &["tags"], None, None).await
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// `POST /articles/:slug/comments`
    pub async fn add_comment(
        &self,
        slug: &str,
        body: &str,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        let payload = json!({"comment": {"body": body}});
        let path = ["articles", slug, "comments"];
        self.send(Method::POST, &path, Some(payload), token).await
    }

    /// `GET /articles/:slug/comments`
    pub async fn get_comments(&self, slug: &str, token: Option<&str>) -> ProbeResult<ApiResponse> {
        let path = ["articles", slug, "comments"];
        self.send(Method::GET, &path, None, token).await
    }

    /// `DELETE /articles/:slug/comments/:id`
    pub async fn delete_comment(
        &self,
        slug: &str,
        comment_id: &str,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        let path = ["articles", slug, "comments", comment_id];
        self.send(Method::DELETE, &path, None, token).await
    }

    /// `POST /articles/:slug/comments/:id/like`
    pub async fn like_comment(
        &self,
        slug: &str,
        comment_id: &str,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        self.react(Method::POST, slug, comment_id, "like", token).await
    }

    /// `DELETE /articles/:slug/comments/:id/like`
    pub async fn unlike_comment(
        &self,
        slug: &str,
        comment_id: &str,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        self.react(Method::DELETE, slug, comment_id, "like", token)
            .await
    }

    /// `POST /articles/:slug/comments/:id/dislike`
    pub async fn dislike_comment(
        &self,
        slug: &str,
        comment_id: &str,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        self.react(Method::POST, slug, comment_id, "dislike", token)
            .await
    }

    /// `DELETE /articles/:slug/comments/:id/dislike`
    pub async fn undislike_comment(
        &self,
        slug: &str,
        comment_id: &str,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        self.react(Method::DELETE, slug, comment_id, "dislike", token)
            .await
    }

    async fn react(
        &self,
        method: Method,
        slug: &str,
        comment_id: &str,
        reaction: &str,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        let path = ["articles", slug, "comments", comment_id, reaction];
        self.send(method, &path, None, token).await
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Origin plus `segments`, each percent-encoded as one path segment
    fn endpoint(&self, segments: &[&str]) -> ProbeResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ProbeError::config(format!("API origin {} is not a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Value>,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        let url = self.endpoint(segments)?;
        self.send_url(method, url, body, token).await
    }

    async fn send_url(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
        token: Option<&str>,
    ) -> ProbeResult<ApiResponse> {
        let mut request = self.http.request(method.clone(), url.clone());
        let token = token.filter(|t| !t.is_empty());
        if let Some(t) = token {
            request = request.header(AUTHORIZATION, format!("Token {t}"));
        }
        if let Some(b) = body {
            request = request.json(&b);
        }

        tracing::debug!(%method, %url, authenticated = token.is_some(), "api request");
        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let text = response.text().await?;
        tracing::debug!(%method, %url, status, "api response");
        Ok(ApiResponse::new(status, text, content_type))
    }
}
