//! Sign-up form at `/user/register`.

use super::{PageObject, ERROR_MESSAGES};
use crate::auth::StoredUser;
use crate::browser::BrowserSession;
use crate::result::ProbeResult;
use crate::wait::Observation;
use async_trait::async_trait;

/// Sign-up form
#[derive(Debug, Clone, Copy)]
pub struct RegisterPage<'a> {
    session: &'a BrowserSession,
}

impl<'a> RegisterPage<'a> {
    /// Route
    pub const PATH: &'static str = "/user/register";
    /// Username input
    pub const USERNAME: &'static str = "input[placeholder='Username']";
    /// Email input
    pub const EMAIL: &'static str = "input[placeholder='Email']";
    /// Password input
    pub const PASSWORD: &'static str = "input[placeholder='Password']";
    /// Submit button
    pub const SUBMIT: &'static str = "button[type='submit']";
    /// Validation errors
    pub const ERRORS: &'static str = ERROR_MESSAGES;

    /// Page object over `session`
    #[must_use]
    pub const fn new(session: &'a BrowserSession) -> Self {
        Self { session }
    }

    /// Navigate here and wait for the form
    pub async fn open(&self) -> ProbeResult<()> {
        self.session.open(Self::PATH).await?;
        self.session.wait_for_visible(Self::USERNAME).await
    }

    /// Fill and submit without waiting
    pub async fn submit(&self, username: &str, email: &str, password: &str) -> ProbeResult<()> {
        self.session.fill(Self::USERNAME, username).await?;
        self.session.fill(Self::EMAIL, email).await?;
        self.session.fill(Self::PASSWORD, password).await?;
        self.session.click(Self::SUBMIT).await
    }

    /// Register and wait until the new user is signed in
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ProbeResult<StoredUser> {
        self.submit(username, email, password).await?;
        let session = self.session;
        session
            .wait_for("registered user in local storage", move || async move {
                Ok(match session.stored_user().await? {
                    Some(user) if !user.token.is_empty() => Observation::Ready(user),
                    _ => Observation::Pending(format!(
                        "errors: {:?}",
                        session.texts(Self::ERRORS).await?
                    )),
                })
            })
            .await
    }

    /// Currently shown error messages
    pub async fn error_messages(&self) -> ProbeResult<Vec<String>> {
        self.session.texts(Self::ERRORS).await
    }
}

#[async_trait]
impl PageObject for RegisterPage<'_> {
    fn url_pattern(&self) -> &str {
        Self::PATH
    }

    fn session(&self) -> &BrowserSession {
        self.session
    }

    async fn is_loaded(&self) -> ProbeResult<bool> {
        self.session.is_visible(Self::USERNAME).await
    }
}
