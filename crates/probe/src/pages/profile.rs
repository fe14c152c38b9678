//! Profile view at `/profile/:username`.

use super::PageObject;
use crate::browser::BrowserSession;
use crate::result::{ProbeError, ProbeResult};
use crate::wait::Observation;
use async_trait::async_trait;

/// Public profile of one user
#[derive(Debug, Clone, Copy)]
pub struct ProfilePage<'a> {
    session: &'a BrowserSession,
}

impl<'a> ProfilePage<'a> {
    /// Username heading
    pub const USERNAME: &'static str = ".user-info h4";
    /// Bio paragraph
    pub const BIO: &'static str = ".user-info p";
    /// Avatar
    pub const IMAGE: &'static str = ".user-info .user-img";
    /// Follow/unfollow button (other users only)
    pub const FOLLOW_BUTTON: &'static str = ".user-info .btn.action-btn";
    /// "Edit Profile Settings" link (own profile only)
    pub const EDIT_SETTINGS: &'static str = ".user-info a[href='/user/settings']";
    /// "My Articles" / "Favorited Articles" tabs
    pub const TABS: &'static str = ".articles-toggle .nav-link";
    /// Article previews under the active tab
    pub const ARTICLE_TITLES: &'static str = ".article-preview h1";
    /// Shown for unknown users
    pub const ERROR: &'static str = ".error-message";

    /// Page object over `session`
    #[must_use]
    pub const fn new(session: &'a BrowserSession) -> Self {
        Self { session }
    }

    /// Route for `username`
    #[must_use]
    pub fn path(username: &str) -> String {
        format!("/profile/{username}")
    }

    /// Navigate to a profile and wait for the header
    pub async fn open(&self, username: &str) -> ProbeResult<()> {
        self.session.open(&Self::path(username)).await?;
        self.session.wait_for_visible(Self::USERNAME).await
    }

    /// Displayed username
    pub async fn username(&self) -> ProbeResult<String> {
        Ok(self.session.text_of(Self::USERNAME).await?.unwrap_or_default())
    }

    /// Displayed bio, empty if none
    pub async fn bio(&self) -> ProbeResult<String> {
        Ok(self.session.text_of(Self::BIO).await?.unwrap_or_default())
    }

    /// Whether this is the viewer's own profile
    pub async fn is_own_profile(&self) -> ProbeResult<bool> {
        self.session.is_visible(Self::EDIT_SETTINGS).await
    }

    /// Label of the follow button, e.g. `Follow bob`
    pub async fn follow_button_text(&self) -> ProbeResult<String> {
        Ok(self
            .session
            .text_of(Self::FOLLOW_BUTTON)
            .await?
            .unwrap_or_default())
    }

    /// Whether the viewer follows this user
    pub async fn is_following(&self) -> ProbeResult<bool> {
        Ok(self.follow_button_text().await?.contains("Unfollow"))
    }

    /// Follow; no click if already following
    pub async fn follow(&self) -> ProbeResult<()> {
        self.set_following(true).await
    }

    /// Unfollow; no click if not following
    pub async fn unfollow(&self) -> ProbeResult<()> {
        self.set_following(false).await
    }

    async fn set_following(&self, follow: bool) -> ProbeResult<()> {
        if !self.session.is_visible(Self::FOLLOW_BUTTON).await? {
            return Err(ProbeError::ui_interaction(
                if follow { "follow" } else { "unfollow" },
                Self::FOLLOW_BUTTON,
                "no follow button on this profile",
            ));
        }
        if self.is_following().await? == follow {
            tracing::debug!(follow, "follow state already reached");
            return Ok(());
        }
        self.session.click(Self::FOLLOW_BUTTON).await?;
        let page = *self;
        self.session
            .wait_for("follow button to flip", move || async move {
                let label = page.follow_button_text().await?;
                Ok(Observation::when(label.contains("Unfollow") == follow, label))
            })
            .await?;
        tracing::info!(follow, "profile follow state changed");
        Ok(())
    }

    /// Titles under the active tab
    pub async fn article_titles(&self) -> ProbeResult<Vec<String>> {
        self.session.texts(Self::ARTICLE_TITLES).await
    }

    /// Switch to the "Favorited Articles" tab and wait for it to be active
    pub async fn open_favorites(&self) -> ProbeResult<()> {
        self.switch_tab("Favorited").await
    }

    /// Switch back to "My Articles"
    pub async fn open_own_articles(&self) -> ProbeResult<()> {
        self.switch_tab("My").await
    }

    async fn switch_tab(&self, label: &str) -> ProbeResult<()> {
        self.session.click_text(Self::TABS, label).await?;
        let session = self.session;
        session
            .wait_for("profile tab to activate", move || async move {
                let tabs = session.query(Self::TABS).await?;
                let active = tabs
                    .iter()
                    .any(|t| t.text.contains(label) && t.has_class("active"));
                Ok(Observation::when(active, format!("{} tab(s)", tabs.len())))
            })
            .await
    }

    /// Whether the page reports an unknown user
    pub async fn is_not_found(&self) -> ProbeResult<bool> {
        if self.session.is_visible(Self::ERROR).await? {
            return Ok(true);
        }
        Ok(self.username().await?.is_empty())
    }
}

#[async_trait]
impl PageObject for ProfilePage<'_> {
    fn url_pattern(&self) -> &str {
        "/profile/:username"
    }

    fn session(&self) -> &BrowserSession {
        self.session
    }

    async fn is_loaded(&self) -> ProbeResult<bool> {
        self.session.is_visible(Self::USERNAME).await
    }
}
