//! Top navigation, present on every page.

use super::PageObject;
use crate::browser::BrowserSession;
use crate::result::ProbeResult;
use async_trait::async_trait;

/// Navigation bar
#[derive(Debug, Clone, Copy)]
pub struct NavBar<'a> {
    session: &'a BrowserSession,
}

impl<'a> NavBar<'a> {
    /// Bar container
    pub const CONTAINER: &'static str = "nav.navbar";
    /// Home link
    pub const HOME: &'static str = "a.navbar-brand";
    /// "Sign in" (signed out)
    pub const SIGN_IN: &'static str = "a[href='/user/login']";
    /// "Sign up" (signed out)
    pub const SIGN_UP: &'static str = "a[href='/user/register']";
    /// "New Article" (signed in)
    pub const NEW_ARTICLE: &'static str = "a[href='/editor/new']";
    /// "Settings" (signed in)
    pub const SETTINGS: &'static str = "a[href='/user/settings']";
    /// Own profile link (signed in)
    pub const PROFILE: &'static str = "a[href^='/profile/']";

    /// Page object over `session`
    #[must_use]
    pub const fn new(session: &'a BrowserSession) -> Self {
        Self { session }
    }

    /// Whether signed-in links are shown
    pub async fn is_logged_in(&self) -> ProbeResult<bool> {
        self.session.is_visible(Self::SETTINGS).await
    }

    /// Username shown in the bar, if signed in
    pub async fn username(&self) -> ProbeResult<Option<String>> {
        Ok(self
            .session
            .text_of(Self::PROFILE)
            .await?
            .filter(|name| !name.is_empty()))
    }

    /// Click through to settings
    pub async fn go_to_settings(&self) -> ProbeResult<String> {
        self.session.click(Self::SETTINGS).await?;
        self.session.wait_for_url_contains("/settings").await
    }

    /// Click through to the editor
    pub async fn go_to_editor(&self) -> ProbeResult<String> {
        self.session.click(Self::NEW_ARTICLE).await?;
        self.session.wait_for_url_contains("/editor").await
    }

    /// Click through to the viewer's own profile
    pub async fn go_to_profile(&self) -> ProbeResult<String> {
        self.session.click(Self::PROFILE).await?;
        self.session.wait_for_url_contains("/profile/").await
    }
}

#[async_trait]
impl PageObject for NavBar<'_> {
    fn url_pattern(&self) -> &str {
        "*"
    }

    fn session(&self) -> &BrowserSession {
        self.session
    }

    async fn is_loaded(&self) -> ProbeResult<bool> {
        Ok(self.session.is_visible(Self::HOME).await?
            || self.session.is_visible(Self::CONTAINER).await?)
    }
}
