//! Sign-in form at `/user/login`.

use super::{PageObject, ERROR_MESSAGES};
use crate::auth::StoredUser;
use crate::browser::BrowserSession;
use crate::result::{ProbeError, ProbeResult};
use crate::wait::Observation;
use async_trait::async_trait;

/// Sign-in form
#[derive(Debug, Clone, Copy)]
pub struct LoginPage<'a> {
    session: &'a BrowserSession,
}

impl<'a> LoginPage<'a> {
    /// Route
    pub const PATH: &'static str = "/user/login";
    /// Email input
    pub const EMAIL: &'static str = "input[placeholder='Email']";
    /// Password input
    pub const PASSWORD: &'static str = "input[placeholder='Password']";
    /// Submit button
    pub const SUBMIT: &'static str = "button[type='submit']";
    /// Page heading ("Sign in")
    pub const HEADING: &'static str = "h1.text-xs-center";
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
        self.session.wait_for_visible(Self::EMAIL).await
    }

    /// Fill and submit without waiting for any outcome
    pub async fn submit(&self, email: &str, password: &str) -> ProbeResult<()> {
        self.session.fill(Self::EMAIL, email).await?;
        self.session.fill(Self::PASSWORD, password).await?;
        self.session.click(Self::SUBMIT).await
    }

    /// Sign in and wait until the client has stored the record for `email`.
    ///
    /// A token already in storage when the form is submitted does not count
    /// unless the stored record names `email`.
    pub async fn login(&self, email: &str, password: &str) -> ProbeResult<StoredUser> {
        let previous = self.session.stored_token().await?;
        self.submit(email, password).await?;
        let session = self.session;
        let previous = previous.as_deref();
        let user = session
            .wait_for("signed-in user in local storage", move || async move {
                let pending = match session.stored_user().await? {
                    Some(user) => match not_signed_in_as(&user, email, previous) {
                        None => return Ok(Observation::Ready(user)),
                        Some(reason) => reason,
                    },
                    None => "no user stored".to_string(),
                };
                let errors = session.texts(Self::ERRORS).await?;
                Ok(Observation::Pending(if errors.is_empty() {
                    pending
                } else {
                    format!("{pending}; form errors: {errors:?}")
                }))
            })
            .await?;
        tracing::info!(email, "logged in via UI");
        Ok(user)
    }

    /// Submit credentials that should be rejected; returns the shown errors
    pub async fn login_expecting_error(
        &self,
        email: &str,
        password: &str,
    ) -> ProbeResult<Vec<String>> {
        self.submit(email, password).await?;
        let session = self.session;
        let errors = session
            .wait_for("login error messages", move || async move {
                let errors = session.texts(Self::ERRORS).await?;
                Ok(if errors.is_empty() {
                    Observation::Pending("no errors rendered".to_string())
                } else {
                    Observation::Ready(errors)
                })
            })
            .await?;
        if session.stored_token().await?.is_some() {
            return Err(ProbeError::assertion(
                "rejected login still stored a token",
            ));
        }
        Ok(errors)
    }

    /// Currently shown error messages
    pub async fn error_messages(&self) -> ProbeResult<Vec<String>> {
        self.session.texts(Self::ERRORS).await
    }

    /// Whether any error message contains `fragment` (case-insensitive)
    pub async fn has_error_containing(&self, fragment: &str) -> ProbeResult<bool> {
        let needle = fragment.to_lowercase();
        Ok(self
            .error_messages()
            .await?
            .iter()
            .any(|m| m.to_lowercase().contains(&needle)))
    }
}

/// Why `user` is not yet the session for `email`, or `None` once it is
fn not_signed_in_as(user: &StoredUser, email: &str, previous: Option<&str>) -> Option<String> {
    if user.token.is_empty() {
        return Some("stored user has no token".to_string());
    }
    match &user.email {
        Some(stored) if stored.eq_ignore_ascii_case(email) => None,
        Some(stored) => Some(format!("stored user is {stored}")),
        None if previous == Some(user.token.as_str()) => {
            Some("token unchanged since submit".to_string())
        }
        None => None,
    }
}

#[async_trait]
impl PageObject for LoginPage<'_> {
    fn url_pattern(&self) -> &str {
        Self::PATH
    }

    fn session(&self) -> &BrowserSession {
        self.session
    }

    async fn is_loaded(&self) -> ProbeResult<bool> {
        Ok(self.session.is_visible(Self::EMAIL).await?
            && self.session.is_visible(Self::SUBMIT).await?)
    }
}
