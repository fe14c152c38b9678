//! One logical user across both channels.
//!
//! A [`Session`] pairs an [`ApiClient`] with an optional [`BrowserSession`].
//! Each channel carries its own copy of the auth token: the client holds it in
//! memory, the browser in local storage under [`STORAGE_KEY`]. Nothing keeps
//! the two in sync implicitly. Callers move a token across with
//! [`mirror_token_to_browser`](Session::mirror_token_to_browser) or
//! [`adopt_browser_token`](Session::adopt_browser_token), and
//! [`reconcile`](Session::reconcile) checks that both still identify the same
//! user.
//!
//! [`STORAGE_KEY`]: crate::auth::STORAGE_KEY

use crate::api::{ApiClient, UserEnvelope};
use crate::auth::{same_subject, subject_of, StoredUser};
use crate::browser::BrowserSession;
use crate::config::EnvironmentConfig;
use crate::pages::LoginPage;
use crate::result::{ProbeError, ProbeResult};

/// API client plus optional browser for one test
#[derive(Debug)]
pub struct Session {
    config: EnvironmentConfig,
    api: ApiClient,
    browser: Option<BrowserSession>,
}

impl Session {
    /// API-only session
    pub fn new(config: &EnvironmentConfig) -> ProbeResult<Self> {
        Ok(Self {
            config: config.clone(),
            api: ApiClient::from_config(config)?,
            browser: None,
        })
    }

    /// Attach a browser
    #[must_use]
    pub fn with_browser(mut self, browser: BrowserSession) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Session with a freshly launched chromium
    #[cfg(feature = "browser")]
    pub async fn launch(config: &EnvironmentConfig) -> ProbeResult<Self> {
        let browser = BrowserSession::launch(config).await?;
        Ok(Self::new(config)?.with_browser(browser))
    }

    /// Resolved configuration
    #[must_use]
    pub const fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// REST channel
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Browser channel
    pub fn browser(&self) -> ProbeResult<&BrowserSession> {
        self.browser
            .as_ref()
            .ok_or_else(|| ProbeError::invalid_state("session has no browser attached"))
    }

    /// Whether a browser is attached
    #[must_use]
    pub const fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    /// Token held by the API client
    #[must_use]
    pub fn api_token(&self) -> Option<String> {
        self.api.token()
    }

    /// Token in the browser's local storage; `None` without a browser
    pub async fn browser_token(&self) -> ProbeResult<Option<String>> {
        match &self.browser {
            Some(browser) => browser.stored_token().await,
            None => Ok(None),
        }
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Log the named test user in over REST
    pub async fn login_api(&self, user: &str) -> ProbeResult<String> {
        let creds = self.config.user(user)?;
        self.api.login(&creds.email, &creds.password).await
    }

    /// Log the named test user in through the sign-in form
    pub async fn login_ui(&self, user: &str) -> ProbeResult<StoredUser> {
        let creds = self.config.user(user)?;
        let page = LoginPage::new(self.browser()?);
        page.open().await?;
        let stored = page.login(&creds.email, &creds.password).await?;
        if let (Some(expected), Some(actual)) = (&creds.username, &stored.username) {
            if !expected.eq_ignore_ascii_case(actual) {
                return Err(ProbeError::assertion(format!(
                    "UI login as {user} stored user {actual}"
                )));
            }
        }
        Ok(stored)
    }

    // =========================================================================
    // Token transfer
    // =========================================================================

    /// Write the API token into the browser and reload so the client picks
    /// it up.
    ///
    /// The stored record is enriched from `GET /user` when that succeeds; a
    /// bare `{token}` is written otherwise.
    pub async fn mirror_token_to_browser(&self) -> ProbeResult<()> {
        let token = self
            .api
            .token()
            .ok_or_else(|| ProbeError::invalid_state("API client holds no token to mirror"))?;
        let browser = self.browser()?;

        let mut record = StoredUser::with_token(token.clone());
        match self.api.current_user(Some(&token)).await {
            Ok(resp) if resp.is_success() => {
                if let Some(user) = resp.json::<UserEnvelope>().ok().and_then(|e| e.user) {
                    record.username = user.username;
                    record.email = user.email;
                    record.bio = user.bio;
                    record.image = user.image;
                }
            }
            Ok(resp) => tracing::debug!(status = resp.status(), "current user lookup rejected"),
            Err(e) => tracing::debug!(error = %e, "current user lookup failed"),
        }

        // Local storage is origin-scoped; be on the app origin before writing
        if !browser.current_url().await?.starts_with(browser.base_url()) {
            browser.open("/").await?;
        }
        browser.set_stored_user(&record).await?;
        browser.reload().await?;
        tracing::info!(user = ?record.username, "mirrored API token into browser");
        Ok(())
    }

    /// Copy the browser's token onto the API client
    pub async fn adopt_browser_token(&self) -> ProbeResult<String> {
        let token = self
            .browser()?
            .stored_token()
            .await?
            .ok_or_else(|| ProbeError::invalid_state("browser holds no token to adopt"))?;
        self.api.set_token(Some(token.clone()));
        tracing::debug!("adopted browser token");
        Ok(token)
    }

    /// Make the API client's token authoritative in both channels
    pub async fn adopt_api_token(&self) -> ProbeResult<String> {
        self.mirror_token_to_browser().await?;
        self.api
            .token()
            .ok_or_else(|| ProbeError::invalid_state("API client holds no token"))
    }

    /// The token both channels agree on.
    ///
    /// With a token on one side only, that token is returned. With both, they
    /// must identify the same subject and the API token is returned. Tokens
    /// for different users fail with [`ProbeError::TokenMismatch`].
    pub async fn reconcile(&self) -> ProbeResult<String> {
        let api = self.api.token();
        let browser = self.browser_token().await?;
        match (api, browser) {
            (None, None) => Err(ProbeError::invalid_state(
                "neither channel holds a token",
            )),
            (Some(token), None) | (None, Some(token)) => Ok(token),
            (Some(api), Some(browser)) if same_subject(&api, &browser) => Ok(api),
            (Some(api), Some(browser)) => Err(ProbeError::TokenMismatch {
                api_subject: subject_of(&api),
                browser_subject: subject_of(&browser),
            }),
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Drop both tokens without closing the browser
    pub async fn logout_everywhere(&self) -> ProbeResult<()> {
        self.api.clear_token();
        if let Some(browser) = &self.browser {
            browser.clear_session().await?;
        }
        Ok(())
    }

    /// Close the browser and drop the API token
    pub async fn close(&self) -> ProbeResult<()> {
        self.api.clear_token();
        if let Some(browser) = &self.browser {
            browser.close().await?;
        }
        Ok(())
    }
}
