//! In-process Conduit REST stub for integration tests.
//!
//! Implements the subset of the RealWorld API the harness talks to, with
//! the same status codes: 401 without a token, 403 for non-owners, 404 for
//! unknown slugs, 422 for validation failures. Tokens are unsigned JWTs whose
//! `sub` is the numeric user id.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use conduit_probe::auth::subject_of;
use conduit_probe::{EnvironmentConfig, UserCredentials};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Password of every seeded user
pub const PASSWORD: &str = "password123";

#[derive(Debug, Clone)]
struct UserRow {
    id: u64,
    username: String,
    email: String,
    password: String,
    bio: Option<String>,
    image: Option<String>,
    following: BTreeSet<u64>,
}

#[derive(Debug, Clone)]
struct ArticleRow {
    slug: String,
    title: String,
    description: String,
    body: String,
    tags: Vec<String>,
    author: u64,
    created_at: String,
    updated_at: String,
    favorited_by: BTreeSet<u64>,
}

#[derive(Debug, Clone)]
struct CommentRow {
    id: u64,
    slug: String,
    body: String,
    author: u64,
    created_at: String,
    likes: BTreeSet<u64>,
    dislikes: BTreeSet<u64>,
}

#[derive(Debug, Default)]
struct Db {
    next_id: u64,
    users: Vec<UserRow>,
    articles: Vec<ArticleRow>,
    comments: Vec<CommentRow>,
}

type App = Arc<Mutex<Db>>;

/// Running stub server
#[derive(Debug)]
pub struct Stub {
    /// Origin, e.g. `http://127.0.0.1:41234`
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for Stub {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl Stub {
    /// Bind an ephemeral port and seed `alice` and `bob`
    pub async fn start() -> Self {
        let app: App = Arc::default();
        {
            let mut db = app.lock();
            for name in ["alice", "bob"] {
                insert_user(&mut db, name, &format!("{name}@example.com"), PASSWORD);
            }
        }

        let router = Router::new()
            .route("/users", post(register))
            .route("/users/login", post(login))
            .route("/user", get(current_user).put(update_user))
            .route("/profiles/{username}", get(get_profile))
            .route("/profiles/{username}/follow", post(follow).delete(unfollow))
            .route("/articles", get(list_articles).post(create_article))
            .route("/articles/feed", get(feed))
            .route(
                "/articles/{slug}",
                get(get_article).put(update_article).delete(delete_article),
            )
            .route("/articles/{slug}/favorite", post(favorite).delete(unfavorite))
            .route("/articles/{slug}/comments", get(list_comments).post(add_comment))
            .route("/articles/{slug}/comments/{id}", axum::routing::delete(delete_comment))
            .route("/articles/{slug}/comments/{id}/{reaction}", post(react).delete(unreact))
            .route("/tags", get(tags))
            .with_state(app);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Self {
            base_url: format!("http://{addr}"),
            handle,
        }
    }

    /// Config pointing the API channel at this stub, with both seeded users
    pub fn config(&self) -> EnvironmentConfig {
        let mut config = EnvironmentConfig::default();
        config.api_url = self.base_url.clone();
        config.timeouts.http_ms = 2_000;
        for name in ["alice", "bob"] {
            config.users.insert(
                name.to_string(),
                UserCredentials {
                    email: format!("{name}@example.com"),
                    password: PASSWORD.to_string(),
                    username: Some(name.to_string()),
                },
            );
        }
        config
    }
}

/// Unsigned token the stub accepts for user `id`
pub fn token_for(id: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS512","typ":"JWT"}"#);
    let iat = Utc::now().timestamp();
    let claims = URL_SAFE_NO_PAD.encode(format!(
        r#"{{"sub":"{id}","iat":{iat},"exp":{}}}"#,
        iat + 86_400
    ));
    format!("{header}.{claims}.stub")
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn insert_user(db: &mut Db, username: &str, email: &str, password: &str) -> u64 {
    db.next_id += 1;
    let id = db.next_id;
    db.users.push(UserRow {
        id,
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        bio: None,
        image: None,
        following: BTreeSet::new(),
    });
    id
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn unprocessable(field: &str, message: &str) -> Response {
    reply(
        StatusCode::UNPROCESSABLE_ENTITY,
        json!({"errors": {field: [message]}}),
    )
}

fn caller(db: &Db, headers: &HeaderMap) -> Option<u64> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let token = value.strip_prefix("Token ")?;
    let id: u64 = subject_of(token)?.parse().ok()?;
    db.users.iter().any(|u| u.id == id).then_some(id)
}

fn user_by_id(db: &Db, id: u64) -> Option<&UserRow> {
    db.users.iter().find(|u| u.id == id)
}

fn user_json(user: &UserRow) -> Value {
    json!({"user": {
        "email": user.email,
        "token": token_for(user.id),
        "username": user.username,
        "bio": user.bio,
        "image": user.image,
    }})
}

fn profile_json(db: &Db, id: u64, viewer: Option<u64>) -> Value {
    let Some(user) = user_by_id(db, id) else {
        return Value::Null;
    };
    let following = viewer
        .and_then(|v| user_by_id(db, v))
        .is_some_and(|v| v.following.contains(&id));
    json!({
        "username": user.username,
        "bio": user.bio,
        "image": user.image,
        "following": following,
    })
}

fn article_json(db: &Db, article: &ArticleRow, viewer: Option<u64>) -> Value {
    json!({
        "slug": article.slug,
        "title": article.title,
        "description": article.description,
        "body": article.body,
        "tagList": article.tags,
        "createdAt": article.created_at,
        "updatedAt": article.updated_at,
        "favorited": viewer.is_some_and(|v| article.favorited_by.contains(&v)),
        "favoritesCount": article.favorited_by.len(),
        "author": profile_json(db, article.author, viewer),
    })
}

fn comment_json(db: &Db, comment: &CommentRow, viewer: Option<u64>) -> Value {
    let reaction = viewer.and_then(|v| {
        if comment.likes.contains(&v) {
            Some("LIKE")
        } else if comment.dislikes.contains(&v) {
            Some("DISLIKE")
        } else {
            None
        }
    });
    json!({
        "id": comment.id.to_string(),
        "body": comment.body,
        "createdAt": comment.created_at,
        "updatedAt": comment.created_at,
        "author": profile_json(db, comment.author, viewer),
        "likesCount": comment.likes.len(),
        "dislikesCount": comment.dislikes.len(),
        "currentUserReaction": reaction,
    })
}

fn field<'a>(body: &'a Value, root: &str, key: &str) -> Option<&'a str> {
    body.get(root)?.get(key)?.as_str()
}

// =============================================================================
// Users
// =============================================================================

async fn register(State(app): State<App>, Json(body): Json<Value>) -> Response {
    let mut db = app.lock();
    let username = field(&body, "user", "username").unwrap_or_default();
    let email = field(&body, "user", "email").unwrap_or_default();
    let password = field(&body, "user", "password").unwrap_or_default();
    if username.is_empty() {
        return unprocessable("username", "can't be empty");
    }
    if email.is_empty() || !email.contains('@') {
        return unprocessable("email", "should be an email");
    }
    if password.is_empty() {
        return unprocessable("password", "can't be empty");
    }
    if db.users.iter().any(|u| u.username == username) {
        return unprocessable("username", "duplicated username");
    }
    if db.users.iter().any(|u| u.email == email) {
        return unprocessable("email", "duplicated email");
    }
    let id = insert_user(&mut db, username, email, password);
    let user = user_by_id(&db, id).cloned().unwrap();
    reply(StatusCode::CREATED, user_json(&user))
}

async fn login(State(app): State<App>, Json(body): Json<Value>) -> Response {
    let db = app.lock();
    let email = field(&body, "user", "email").unwrap_or_default();
    let password = field(&body, "user", "password").unwrap_or_default();
    match db.users.iter().find(|u| u.email == email) {
        Some(user) if user.password == password => reply(StatusCode::OK, user_json(user)),
        _ => unprocessable("email or password", "is invalid"),
    }
}

async fn current_user(State(app): State<App>, headers: HeaderMap) -> Response {
    let db = app.lock();
    match caller(&db, &headers).and_then(|id| user_by_id(&db, id)) {
        Some(user) => reply(StatusCode::OK, user_json(user)),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn update_user(
    State(app): State<App>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut db = app.lock();
    let Some(id) = caller(&db, &headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if let Some(email) = field(&body, "user", "email") {
        if db.users.iter().any(|u| u.email == email && u.id != id) {
            return unprocessable("email", "duplicated email");
        }
    }
    if let Some(username) = field(&body, "user", "username") {
        if db.users.iter().any(|u| u.username == username && u.id != id) {
            return unprocessable("username", "duplicated username");
        }
    }
    let user = db.users.iter_mut().find(|u| u.id == id).unwrap();
    if let Some(v) = field(&body, "user", "email") {
        user.email = v.to_string();
    }
    if let Some(v) = field(&body, "user", "username") {
        user.username = v.to_string();
    }
    if let Some(v) = field(&body, "user", "password") {
        user.password = v.to_string();
    }
    if let Some(v) = field(&body, "user", "bio") {
        user.bio = Some(v.to_string());
    }
    if let Some(v) = field(&body, "user", "image") {
        user.image = Some(v.to_string());
    }
    let user = user.clone();
    reply(StatusCode::OK, user_json(&user))
}

// =============================================================================
// Profiles
// =============================================================================

fn user_id_by_name(db: &Db, username: &str) -> Option<u64> {
    db.users.iter().find(|u| u.username == username).map(|u| u.id)
}

async fn get_profile(
    State(app): State<App>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Response {
    let db = app.lock();
    let viewer = caller(&db, &headers);
    match user_id_by_name(&db, &username) {
        Some(id) => reply(StatusCode::OK, json!({"profile": profile_json(&db, id, viewer)})),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn set_following(app: &App, username: &str, headers: &HeaderMap, follow: bool) -> Response {
    let mut db = app.lock();
    let Some(viewer) = caller(&db, headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(target) = user_id_by_name(&db, username) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let me = db.users.iter_mut().find(|u| u.id == viewer).unwrap();
    if follow {
        me.following.insert(target);
    } else {
        me.following.remove(&target);
    }
    reply(
        StatusCode::OK,
        json!({"profile": profile_json(&db, target, Some(viewer))}),
    )
}

async fn follow(State(app): State<App>, Path(username): Path<String>, headers: HeaderMap) -> Response {
    set_following(&app, &username, &headers, true)
}

async fn unfollow(
    State(app): State<App>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Response {
    set_following(&app, &username, &headers, false)
}

// =============================================================================
// Articles
// =============================================================================

fn paginate(db: &Db, rows: Vec<&ArticleRow>, params: &HashMap<String, String>, viewer: Option<u64>) -> Response {
    let offset = params.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit = params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(20);
    let count = rows.len();
    let articles: Vec<Value> = rows
        .into_iter()
        .rev()
        .skip(offset)
        .take(limit)
        .map(|a| article_json(db, a, viewer))
        .collect();
    reply(
        StatusCode::OK,
        json!({"articles": articles, "articlesCount": count}),
    )
}

async fn list_articles(
    State(app): State<App>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let db = app.lock();
    let viewer = caller(&db, &headers);
    let author = params.get("author").map(|name| user_id_by_name(&db, name));
    let favorited = params.get("favorited").map(|name| user_id_by_name(&db, name));
    let rows: Vec<&ArticleRow> = db
        .articles
        .iter()
        .filter(|a| params.get("tag").map_or(true, |t| a.tags.contains(t)))
        .filter(|a| author.map_or(true, |id| id == Some(a.author)))
        .filter(|a| favorited.map_or(true, |id| id.is_some_and(|id| a.favorited_by.contains(&id))))
        .collect();
    paginate(&db, rows, &params, viewer)
}

async fn feed(
    State(app): State<App>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let db = app.lock();
    let Some(viewer) = caller(&db, &headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let following = user_by_id(&db, viewer)
        .map(|u| u.following.clone())
        .unwrap_or_default();
    let rows: Vec<&ArticleRow> = db
        .articles
        .iter()
        .filter(|a| following.contains(&a.author))
        .collect();
    paginate(&db, rows, &params, Some(viewer))
}

async fn create_article(
    State(app): State<App>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut db = app.lock();
    let Some(author) = caller(&db, &headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let title = field(&body, "article", "title").unwrap_or_default();
    if title.trim().is_empty() {
        return unprocessable("title", "can't be empty");
    }
    let slug = slugify(title);
    if db.articles.iter().any(|a| a.slug == slug) {
        return unprocessable("title", "article name exists");
    }
    let tags = body["article"]["tagList"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let stamp = now();
    let article = ArticleRow {
        slug,
        title: title.to_string(),
        description: field(&body, "article", "description")
            .unwrap_or_default()
            .to_string(),
        body: field(&body, "article", "body").unwrap_or_default().to_string(),
        tags,
        author,
        created_at: stamp.clone(),
        updated_at: stamp,
        favorited_by: BTreeSet::new(),
    };
    let payload = json!({"article": article_json(&db, &article, Some(author))});
    db.articles.push(article);
    reply(StatusCode::CREATED, payload)
}

async fn get_article(
    State(app): State<App>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Response {
    let db = app.lock();
    let viewer = caller(&db, &headers);
    match db.articles.iter().find(|a| a.slug == slug) {
        Some(article) => reply(
            StatusCode::OK,
            json!({"article": article_json(&db, article, viewer)}),
        ),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Authorization for owner-only article operations
fn owned_article_index(db: &Db, slug: &str, headers: &HeaderMap) -> Result<(usize, u64), StatusCode> {
    let viewer = caller(db, headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let index = db
        .articles
        .iter()
        .position(|a| a.slug == slug)
        .ok_or(StatusCode::NOT_FOUND)?;
    if db.articles[index].author != viewer {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok((index, viewer))
}

async fn update_article(
    State(app): State<App>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut db = app.lock();
    let (index, viewer) = match owned_article_index(&db, &slug, &headers) {
        Ok(found) => found,
        Err(status) => return status.into_response(),
    };
    let article = &mut db.articles[index];
    if let Some(v) = field(&body, "article", "title") {
        article.title = v.to_string();
    }
    if let Some(v) = field(&body, "article", "description") {
        article.description = v.to_string();
    }
    if let Some(v) = field(&body, "article", "body") {
        article.body = v.to_string();
    }
    article.updated_at = now();
    let article = article.clone();
    reply(
        StatusCode::OK,
        json!({"article": article_json(&db, &article, Some(viewer))}),
    )
}

async fn delete_article(
    State(app): State<App>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut db = app.lock();
    match owned_article_index(&db, &slug, &headers) {
        Ok((index, _)) => {
            db.articles.remove(index);
            db.comments.retain(|c| c.slug != slug);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(status) => status.into_response(),
    }
}

fn set_favorite(app: &App, slug: &str, headers: &HeaderMap, favorite: bool) -> Response {
    let mut db = app.lock();
    let Some(viewer) = caller(&db, headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(index) = db.articles.iter().position(|a| a.slug == slug) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let article = &mut db.articles[index];
    if favorite {
        article.favorited_by.insert(viewer);
    } else {
        article.favorited_by.remove(&viewer);
    }
    let article = article.clone();
    reply(
        StatusCode::OK,
        json!({"article": article_json(&db, &article, Some(viewer))}),
    )
}

async fn favorite(State(app): State<App>, Path(slug): Path<String>, headers: HeaderMap) -> Response {
    set_favorite(&app, &slug, &headers, true)
}

async fn unfavorite(
    State(app): State<App>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Response {
    set_favorite(&app, &slug, &headers, false)
}

async fn tags(State(app): State<App>) -> Response {
    let db = app.lock();
    let tags: BTreeSet<&str> = db
        .articles
        .iter()
        .flat_map(|a| a.tags.iter().map(String::as_str))
        .collect();
    reply(StatusCode::OK, json!({"tags": tags}))
}

// =============================================================================
// Comments
// =============================================================================

async fn list_comments(
    State(app): State<App>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Response {
    let db = app.lock();
    if !db.articles.iter().any(|a| a.slug == slug) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let viewer = caller(&db, &headers);
    let comments: Vec<Value> = db
        .comments
        .iter()
        .filter(|c| c.slug == slug)
        .map(|c| comment_json(&db, c, viewer))
        .collect();
    reply(StatusCode::OK, json!({"comments": comments}))
}

async fn add_comment(
    State(app): State<App>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut db = app.lock();
    let Some(author) = caller(&db, &headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if !db.articles.iter().any(|a| a.slug == slug) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let text = field(&body, "comment", "body").unwrap_or_default();
    if text.trim().is_empty() {
        return unprocessable("body", "can't be empty");
    }
    db.next_id += 1;
    let comment = CommentRow {
        id: db.next_id,
        slug,
        body: text.to_string(),
        author,
        created_at: now(),
        likes: BTreeSet::new(),
        dislikes: BTreeSet::new(),
    };
    let payload = json!({"comment": comment_json(&db, &comment, Some(author))});
    db.comments.push(comment);
    reply(StatusCode::CREATED, payload)
}

async fn delete_comment(
    State(app): State<App>,
    Path((slug, id)): Path<(String, u64)>,
    headers: HeaderMap,
) -> Response {
    let mut db = app.lock();
    let Some(viewer) = caller(&db, &headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(index) = db.comments.iter().position(|c| c.slug == slug && c.id == id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let article_author = db
        .articles
        .iter()
        .find(|a| a.slug == slug)
        .map(|a| a.author);
    if db.comments[index].author != viewer && article_author != Some(viewer) {
        return StatusCode::FORBIDDEN.into_response();
    }
    db.comments.remove(index);
    StatusCode::NO_CONTENT.into_response()
}

fn set_reaction(app: &App, slug: &str, id: u64, reaction: &str, headers: &HeaderMap, on: bool) -> Response {
    let mut db = app.lock();
    let Some(viewer) = caller(&db, headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(index) = db.comments.iter().position(|c| c.slug == slug && c.id == id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let comment = &mut db.comments[index];
    match (reaction, on) {
        ("like", true) => {
            comment.dislikes.remove(&viewer);
            comment.likes.insert(viewer);
        }
        ("like", false) => {
            comment.likes.remove(&viewer);
        }
        ("dislike", true) => {
            comment.likes.remove(&viewer);
            comment.dislikes.insert(viewer);
        }
        ("dislike", false) => {
            comment.dislikes.remove(&viewer);
        }
        _ => return StatusCode::NOT_FOUND.into_response(),
    }
    let comment = comment.clone();
    reply(
        StatusCode::OK,
        json!({"comment": comment_json(&db, &comment, Some(viewer))}),
    )
}

async fn react(
    State(app): State<App>,
    Path((slug, id, reaction)): Path<(String, u64, String)>,
    headers: HeaderMap,
) -> Response {
    set_reaction(&app, &slug, id, &reaction, &headers, true)
}

async fn unreact(
    State(app): State<App>,
    Path((slug, id, reaction)): Path<(String, u64, String)>,
    headers: HeaderMap,
) -> Response {
    set_reaction(&app, &slug, id, &reaction, &headers, false)
}
