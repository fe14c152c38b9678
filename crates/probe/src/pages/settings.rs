//! Account settings at `/user/settings`.

use super::{PageObject, ERROR_MESSAGES};
use crate::browser::BrowserSession;
use crate::result::ProbeResult;
use crate::wait::Observation;
use async_trait::async_trait;

/// Fields to change; `None` leaves the input as rendered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsForm {
    /// Avatar URL
    pub image: Option<String>,
    /// Username
    pub username: Option<String>,
    /// Bio
    pub bio: Option<String>,
    /// Email
    pub email: Option<String>,
    /// New password
    pub password: Option<String>,
}

impl SettingsForm {
    /// Change only the bio
    #[must_use]
    pub fn bio(bio: impl Into<String>) -> Self {
        Self {
            bio: Some(bio.into()),
            ..Self::default()
        }
    }

    /// Change only the username
    #[must_use]
    pub fn username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    /// Change only the email
    #[must_use]
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }
}

/// What the client did with a submitted form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsOutcome {
    /// Saved; the client navigated to the profile
    Saved {
        /// Profile URL landed on
        url: String,
    },
    /// Rejected with validation errors
    Rejected(Vec<String>),
}

impl SettingsOutcome {
    /// Whether the update was accepted
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Settings form
#[derive(Debug, Clone, Copy)]
pub struct SettingsPage<'a> {
    session: &'a BrowserSession,
}

impl<'a> SettingsPage<'a> {
    /// Route
    pub const PATH: &'static str = "/user/settings";
    /// Page container
    pub const CONTAINER: &'static str = ".settings-page";
    /// Avatar URL input
    pub const IMAGE: &'static str = "input[placeholder='URL of profile picture']";
    /// Username input
    pub const USERNAME: &'static str = "input[placeholder='Username']";
    /// Bio textarea
    pub const BIO: &'static str = "textarea[placeholder='Short bio about you']";
    /// Email input
    pub const EMAIL: &'static str = "input[placeholder='Email']";
    /// New password input
    pub const PASSWORD: &'static str = "input[placeholder='New Password']";
    /// "Update Settings"
    pub const SUBMIT: &'static str = "button.btn-primary";
    /// "Or click here to logout."
    pub const LOGOUT: &'static str = "button.btn-outline-danger";
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

    /// Current value of each input
    pub async fn current(&self) -> ProbeResult<SettingsForm> {
        Ok(SettingsForm {
            image: self.value_of(Self::IMAGE).await?,
            username: self.value_of(Self::USERNAME).await?,
            bio: self.value_of(Self::BIO).await?,
            email: self.value_of(Self::EMAIL).await?,
            password: None,
        })
    }

    async fn value_of(&self, selector: &str) -> ProbeResult<Option<String>> {
        Ok(self
            .session
            .query(selector)
            .await?
            .into_iter()
            .next()
            .and_then(|e| e.value))
    }

    /// Fill the set fields and submit without waiting
    pub async fn submit(&self, form: &SettingsForm) -> ProbeResult<()> {
        let fields = [
            (Self::IMAGE, &form.image),
            (Self::USERNAME, &form.username),
            (Self::BIO, &form.bio),
            (Self::EMAIL, &form.email),
            (Self::PASSWORD, &form.password),
        ];
        for (selector, value) in fields {
            if let Some(value) = value {
                self.session.fill(selector, value).await?;
            }
        }
        self.session.click(Self::SUBMIT).await
    }

    /// Submit and wait for either the profile redirect or error messages
    pub async fn update(&self, form: &SettingsForm) -> ProbeResult<SettingsOutcome> {
        self.submit(form).await?;
        let session = self.session;
        let outcome = session
            .wait_for("settings to save or be rejected", move || async move {
                let url = session.current_url().await?;
                if url.contains("/profile/") {
                    return Ok(Observation::Ready(SettingsOutcome::Saved { url }));
                }
                let errors = session.texts(Self::ERRORS).await?;
                Ok(if errors.is_empty() {
                    Observation::Pending(url)
                } else {
                    Observation::Ready(SettingsOutcome::Rejected(errors))
                })
            })
            .await?;
        tracing::info!(saved = outcome.is_saved(), "settings submitted");
        Ok(outcome)
    }

    /// Currently shown error messages
    pub async fn error_messages(&self) -> ProbeResult<Vec<String>> {
        self.session.texts(Self::ERRORS).await
    }

    /// Log out and wait until the stored token is gone
    pub async fn logout(&self) -> ProbeResult<()> {
        self.session.click(Self::LOGOUT).await?;
        let session = self.session;
        session
            .wait_for("token to be cleared", move || async move {
                Ok(match session.stored_token().await? {
                    None => Observation::Ready(()),
                    Some(_) => Observation::Pending("token still stored".to_string()),
                })
            })
            .await
    }
}

#[async_trait]
impl PageObject for SettingsPage<'_> {
    fn url_pattern(&self) -> &str {
        Self::PATH
    }

    fn session(&self) -> &BrowserSession {
        self.session
    }

    async fn is_loaded(&self) -> ProbeResult<bool> {
        Ok(self.session.is_visible(Self::CONTAINER).await?
            || self.session.is_visible(Self::USERNAME).await?)
    }
}
