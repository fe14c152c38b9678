//! Driver abstraction over a real (or simulated) browser.
//!
//! Elements are addressed by CSS selector plus index into the match list and
//! read back as [`ElementState`] snapshots, so no driver handle ever outlives
//! the call that produced it. All methods take `&self`; implementations use
//! interior mutability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for raw driver calls
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors reported by a [`BrowserDriver`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The element was re-rendered between lookup and use
    #[error("stale element for '{selector}'")]
    StaleElement {
        /// Selector that matched the stale element
        selector: String,
    },

    /// No element at the requested index
    #[error("no element #{index} for '{selector}'")]
    NotFound {
        /// Selector queried
        selector: String,
        /// Index requested
        index: usize,
    },

    /// Navigation failed or raced with another navigation
    #[error("navigation to {url} failed: {message}")]
    Navigation {
        /// Target URL
        url: String,
        /// Error message
        message: String,
    },

    /// Script evaluation failed
    #[error("script failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Protocol-level failure
    #[error("protocol error: {message}")]
    Protocol {
        /// Error message
        message: String,
    },

    /// The browser was already closed
    #[error("browser session is closed")]
    Closed,
}

impl DriverError {
    /// Whether one immediate retry may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StaleElement { .. } | Self::Navigation { .. })
    }
}

/// Snapshot of one matched element
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementState {
    /// Lowercase tag name
    pub tag: String,
    /// Rendered text
    pub text: String,
    /// Inner HTML
    pub inner_html: String,
    /// Class list
    pub classes: Vec<String>,
    /// Form value, for inputs and textareas
    pub value: Option<String>,
    /// `href` attribute
    pub href: Option<String>,
    /// Whether it occupies layout space
    pub visible: bool,
    /// Whether it is not disabled
    pub enabled: bool,
}

impl ElementState {
    /// Visible, enabled, empty element
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            visible: true,
            enabled: true,
            ..Self::default()
        }
    }

    /// Set text; inner HTML becomes the escaped text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self.inner_html = escape_html(&self.text);
        self
    }

    /// Set inner HTML verbatim
    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.inner_html = html.into();
        self
    }

    /// Add a class
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Set `href`
    #[must_use]
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// Set form value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Mark as hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark as disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether the class list contains `class`
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Trimmed text
    #[must_use]
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

/// Minimal HTML escaping for text content
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Browser operations the harness needs
#[async_trait]
pub trait BrowserDriver: Send + Sync + std::fmt::Debug {
    /// Load `url` and wait for the document to be ready
    async fn navigate(&self, url: &str) -> DriverResult<()>;

    /// Current location
    async fn current_url(&self) -> DriverResult<String>;

    /// Serialized DOM
    async fn page_source(&self) -> DriverResult<String>;

    /// Snapshot every element matching `selector`, in document order
    async fn query_all(&self, selector: &str) -> DriverResult<Vec<ElementState>>;

    /// Click the `index`-th match
    async fn click(&self, selector: &str, index: usize) -> DriverResult<()>;

    /// Replace the value of the `index`-th match by typing `text`
    async fn fill(&self, selector: &str, index: usize, text: &str) -> DriverResult<()>;

    /// Press Enter with the `index`-th match focused
    async fn press_enter(&self, selector: &str, index: usize) -> DriverResult<()>;

    /// `localStorage.getItem(key)`
    async fn local_storage_get(&self, key: &str) -> DriverResult<Option<String>>;

    /// `localStorage.setItem(key, value)`
    async fn local_storage_set(&self, key: &str, value: &str) -> DriverResult<()>;

    /// `localStorage.clear()`
    async fn local_storage_clear(&self) -> DriverResult<()>;

    /// Delete all cookies
    async fn clear_cookies(&self) -> DriverResult<()>;

    /// Reload the current page
    async fn reload(&self) -> DriverResult<()>;

    /// History back
    async fn back(&self) -> DriverResult<()>;

    /// PNG screenshot of the viewport
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;

    /// Shut the browser down; later calls fail with [`DriverError::Closed`]
    async fn close(&self) -> DriverResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    mod element_tests {
        use super::*;

        #[test]
        fn test_new_is_visible_and_enabled() {
            let el = ElementState::new("button");
            assert!(el.visible);
            assert!(el.enabled);
            assert_eq!(el.tag, "button");
        }

        #[test]
        fn test_with_text_escapes_inner_html() {
            let el = ElementState::new("p").with_text("<script>alert(1)</script>");
            assert_eq!(el.text, "<script>alert(1)</script>");
            assert_eq!(el.inner_html, "&lt;script&gt;alert(1)&lt;/script&gt;");
        }

        #[test]
        fn test_builders() {
            let el = ElementState::new("a")
                .with_class("nav-link")
                .with_href("/user/settings")
                .hidden()
                .disabled();
            assert!(el.has_class("nav-link"));
            assert!(!el.has_class("active"));
            assert_eq!(el.href.as_deref(), Some("/user/settings"));
            assert!(!el.visible && !el.enabled);
        }

        #[test]
        fn test_deserializes_browser_snapshot() {
            let el: ElementState = serde_json::from_str(
                r#"{"tag":"button","text":" Follow bob ","innerHtml":"<i></i> Follow bob","classes":["btn"],"visible":true,"enabled":true}"#,
            )
            .unwrap_or_default();
            assert_eq!(el.trimmed_text(), "Follow bob");
            assert_eq!(el.value, None);
        }
    }

    #[test]
    fn test_transient_errors() {
        assert!(DriverError::StaleElement {
            selector: "x".to_string()
        }
        .is_transient());
        assert!(DriverError::Navigation {
            url: "u".to_string(),
            message: "m".to_string()
        }
        .is_transient());
        assert!(!DriverError::Closed.is_transient());
        assert!(!DriverError::NotFound {
            selector: "x".to_string(),
            index: 0
        }
        .is_transient());
    }
}
