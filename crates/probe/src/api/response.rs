//! Immutable HTTP response snapshot.

use super::schema::ErrorsEnvelope;
use crate::result::ProbeResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

#[allow(clippy::expect_used)]
static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}")
        .expect("valid uuid regex")
});

#[allow(clippy::expect_used)]
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid email regex")
});

/// Markers of server internals leaking into a response body (lowercase)
const SENSITIVE_MARKERS: &[&str] = &[
    "stacktrace",
    "exception",
    "at io.spring",
    "at java.",
    "at org.",
    "/home/",
    "/usr/",
    "jdbc:",
    "password",
];

/// Status, body and content type of one API call.
///
/// Constructed once by [`crate::ApiClient`]; every helper reads, none
/// mutates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: u16,
    body: String,
    content_type: Option<String>,
}

impl ApiResponse {
    /// Snapshot a response
    pub fn new(status: u16, body: impl Into<String>, content_type: Option<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type,
        }
    }

    /// HTTP status code
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Raw body text
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// `Content-Type` header, if any
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// 2xx
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Whether the content type is JSON
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
    }

    /// Decode the body
    pub fn json<T: DeserializeOwned>(&self) -> ProbeResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Whether the body leaks stack traces, exception names, filesystem
    /// paths, JDBC URLs, the word "password", or a UUID
    #[must_use]
    pub fn contains_sensitive_info(&self) -> bool {
        let lower = self.body.to_lowercase();
        SENSITIVE_MARKERS.iter().any(|m| lower.contains(m)) || UUID_RE.is_match(&self.body)
    }

    /// Whether the body contains anything shaped like an email address
    #[must_use]
    pub fn contains_email_address(&self) -> bool {
        EMAIL_RE.is_match(&self.body)
    }

    /// Validation messages from an `{"errors": {...}}` body, as `field message`
    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        serde_json::from_str::<ErrorsEnvelope>(&self.body)
            .map(|env| {
                env.errors
                    .into_iter()
                    .flat_map(|(field, msgs)| {
                        msgs.into_iter().map(move |m| format!("{field} {m}"))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ApiResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const PREVIEW: usize = 200;
        let preview: String = self.body.chars().take(PREVIEW).collect();
        write!(f, "HTTP {} {}", self.status, preview)
    }
}
