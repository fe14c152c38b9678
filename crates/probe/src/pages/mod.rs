//! Page Object Model for the Conduit web client.
//!
//! One type per view, borrowing a [`BrowserSession`]. Each method is one
//! user-observable action or query. Actions that kick off an asynchronous
//! state change (follow, favorite, comment, publish) only return once the UI
//! shows the new state, or fail with a timeout.
//!
//! Selectors are public associated constants so scripted pages can be built
//! against the same strings.

mod article;
mod editor;
mod home;
mod login;
mod navbar;
mod pagination;
mod profile;
mod register;
mod settings;

pub use article::ArticlePage;
pub use editor::EditorPage;
pub use home::{ArticlePreview, FeedState, HomePage};
pub use login::LoginPage;
pub use navbar::NavBar;
pub use pagination::Pagination;
pub use profile::ProfilePage;
pub use register::RegisterPage;
pub use settings::{SettingsForm, SettingsOutcome, SettingsPage};

use crate::browser::BrowserSession;
use crate::result::ProbeResult;
use async_trait::async_trait;

/// Shared behavior of every page object
#[async_trait]
pub trait PageObject: Send + Sync {
    /// Route pattern, e.g. `/profile/:username`
    fn url_pattern(&self) -> &str;

    /// Session the page reads from
    fn session(&self) -> &BrowserSession;

    /// Page name for logs
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether the page's landmark elements are rendered
    async fn is_loaded(&self) -> ProbeResult<bool>;

    /// Wait for [`is_loaded`](Self::is_loaded) within the page-load budget
    async fn wait_until_loaded(&self) -> ProbeResult<()> {
        let options = crate::wait::WaitOptions::page_load(self.session().timeouts());
        let description = format!("{} to load", self.page_name());
        crate::wait::wait_until(&description, &options, move || self.is_loaded()).await
    }
}

/// Digits of a button label such as `Favorite Article (3)`
pub(crate) fn count_in(label: &str) -> u64 {
    let digits: String = label.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Error list items under the form
pub(crate) const ERROR_MESSAGES: &str = "ul.error-messages li";
