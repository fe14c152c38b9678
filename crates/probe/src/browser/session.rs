//! Browser session: driver plus retry policy plus waits.

use super::driver::{BrowserDriver, DriverError, ElementState};
use crate::auth::{StoredUser, STORAGE_KEY};
use crate::config::{join_url, EnvironmentConfig, Timeouts};
use crate::result::{ProbeError, ProbeResult};
use crate::wait::{wait_for, wait_until, Observation, WaitOptions};
use std::future::Future;
use std::sync::Arc;

/// Run a driver call; retry once on a transient failure, then surface a
/// [`ProbeError::UiInteraction`].
macro_rules! retry_once {
    ($action:expr, $selector:expr, $call:expr) => {{
        match $call.await {
            Ok(value) => Ok(value),
            Err(first) if first.is_transient() => {
                tracing::warn!(action = $action, selector = $selector, error = %first, "retrying once");
                $call
                    .await
                    .map_err(|e| ProbeError::ui_interaction($action, $selector, e.to_string()))
            }
            Err(e) => Err(ProbeError::ui_interaction($action, $selector, e.to_string())),
        }
    }};
}

/// One browser, one logical user, one test.
#[derive(Debug, Clone)]
pub struct BrowserSession {
    driver: Arc<dyn BrowserDriver>,
    base_url: String,
    timeouts: Timeouts,
}

impl BrowserSession {
    /// Session over an existing driver
    pub fn new(driver: Arc<dyn BrowserDriver>, config: &EnvironmentConfig) -> Self {
        Self {
            driver,
            base_url: config.base_url.clone(),
            timeouts: config.timeouts.clone(),
        }
    }

    /// Launch chromium with the configured settings
    #[cfg(feature = "browser")]
    pub async fn launch(config: &EnvironmentConfig) -> ProbeResult<Self> {
        let driver = super::cdp::CdpDriver::launch(&config.browser).await?;
        Ok(Self::new(Arc::new(driver), config))
    }

    /// Underlying driver
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn BrowserDriver> {
        &self.driver
    }

    /// UI origin
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Configured timeouts
    #[must_use]
    pub const fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Absolute URL for an application route
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Navigate to an application route such as `/article/some-slug`
    pub async fn open(&self, path: &str) -> ProbeResult<()> {
        let url = self.url(path);
        tracing::debug!(%url, "open");
        retry_once!("navigate", url.as_str(), self.driver.navigate(&url))
    }

    /// Current location
    pub async fn current_url(&self) -> ProbeResult<String> {
        Ok(self.driver.current_url().await?)
    }

    /// Serialized DOM
    pub async fn page_source(&self) -> ProbeResult<String> {
        Ok(self.driver.page_source().await?)
    }

    /// Reload the current page
    pub async fn reload(&self) -> ProbeResult<()> {
        retry_once!("reload", "<page>", self.driver.reload())
    }

    /// History back
    pub async fn back(&self) -> ProbeResult<()> {
        retry_once!("back", "<page>", self.driver.back())
    }

    // =========================================================================
    // Elements
    // =========================================================================

    /// Snapshots of every match
    pub async fn query(&self, selector: &str) -> ProbeResult<Vec<ElementState>> {
        retry_once!("query", selector, self.driver.query_all(selector))
    }

    /// Number of matches
    pub async fn count(&self, selector: &str) -> ProbeResult<usize> {
        Ok(self.query(selector).await?.len())
    }

    /// Trimmed text of every match
    pub async fn texts(&self, selector: &str) -> ProbeResult<Vec<String>> {
        Ok(self
            .query(selector)
            .await?
            .iter()
            .map(|e| e.trimmed_text().to_string())
            .collect())
    }

    /// Trimmed text of the first match, if any
    pub async fn text_of(&self, selector: &str) -> ProbeResult<Option<String>> {
        Ok(self
            .query(selector)
            .await?
            .first()
            .map(|e| e.trimmed_text().to_string()))
    }

    /// Whether any match is visible
    pub async fn is_visible(&self, selector: &str) -> ProbeResult<bool> {
        Ok(self.query(selector).await?.iter().any(|e| e.visible))
    }

    /// Index of the first match whose text contains `fragment`
    pub async fn index_of_text(&self, selector: &str, fragment: &str) -> ProbeResult<Option<usize>> {
        Ok(self
            .query(selector)
            .await?
            .iter()
            .position(|e| e.text.contains(fragment)))
    }

    /// Click the first match
    pub async fn click(&self, selector: &str) -> ProbeResult<()> {
        self.click_nth(selector, 0).await
    }

    /// Click the `index`-th match
    pub async fn click_nth(&self, selector: &str, index: usize) -> ProbeResult<()> {
        retry_once!("click", selector, self.driver.click(selector, index))
    }

    /// Click the first match whose text contains `fragment`
    pub async fn click_text(&self, selector: &str, fragment: &str) -> ProbeResult<()> {
        let index = self.index_of_text(selector, fragment).await?.ok_or_else(|| {
            ProbeError::ui_interaction(
                "click",
                selector,
                format!("no element with text containing {fragment:?}"),
            )
        })?;
        self.click_nth(selector, index).await
    }

    /// Replace the value of the first match
    pub async fn fill(&self, selector: &str, text: &str) -> ProbeResult<()> {
        retry_once!("fill", selector, self.driver.fill(selector, 0, text))
    }

    /// Press Enter on the first match
    pub async fn press_enter(&self, selector: &str) -> ProbeResult<()> {
        retry_once!("press_enter", selector, self.driver.press_enter(selector, 0))
    }

    // =========================================================================
    // Waits
    // =========================================================================

    /// Wait for an asynchronous state change using the state-change budget
    pub async fn wait_for<T, F, Fut>(&self, description: &str, check: F) -> ProbeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProbeResult<Observation<T>>>,
    {
        wait_for(description, &WaitOptions::state_change(&self.timeouts), check).await
    }

    /// Wait with explicit options
    pub async fn wait_for_with<T, F, Fut>(
        &self,
        description: &str,
        options: &WaitOptions,
        check: F,
    ) -> ProbeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProbeResult<Observation<T>>>,
    {
        wait_for(description, options, check).await
    }

    /// Wait until a selector has a visible match, using the page-load budget
    pub async fn wait_for_visible(&self, selector: &str) -> ProbeResult<()> {
        let description = format!("{selector} to be visible");
        wait_until(&description, &WaitOptions::page_load(&self.timeouts), move || {
            self.is_visible(selector)
        })
        .await
    }

    /// Wait until any match's text contains `fragment`
    pub async fn wait_for_text(&self, selector: &str, fragment: &str) -> ProbeResult<()> {
        let description = format!("{selector} to contain {fragment:?}");
        self.wait_for(&description, move || async move {
            let texts = self.texts(selector).await?;
            let found = texts.iter().any(|t| t.contains(fragment));
            Ok(Observation::when(found, format!("{texts:?}")))
        })
        .await
    }

    /// Wait until the current URL contains `fragment`
    pub async fn wait_for_url_contains(&self, fragment: &str) -> ProbeResult<String> {
        let description = format!("URL to contain {fragment:?}");
        wait_for(
            &description,
            &WaitOptions::page_load(&self.timeouts),
            move || async move {
                let url = self.current_url().await?;
                Ok(if url.contains(fragment) {
                    Observation::Ready(url)
                } else {
                    Observation::Pending(url)
                })
            },
        )
        .await
    }

    // =========================================================================
    // Authentication state
    // =========================================================================

    /// Write the signed-in user record directly into local storage
    pub async fn set_stored_user(&self, user: &StoredUser) -> ProbeResult<()> {
        let value = user.to_storage_value()?;
        Ok(self.driver.local_storage_set(STORAGE_KEY, &value).await?)
    }

    /// Simulate a signed-in (or bad-token) state without a UI login
    pub async fn set_local_storage_token(&self, token: &str) -> ProbeResult<()> {
        self.set_stored_user(&StoredUser::with_token(token)).await
    }

    /// The signed-in user record, if one is stored
    pub async fn stored_user(&self) -> ProbeResult<Option<StoredUser>> {
        match self.driver.local_storage_get(STORAGE_KEY).await? {
            Some(value) if !value.is_empty() => Ok(Some(StoredUser::from_storage_value(&value)?)),
            _ => Ok(None),
        }
    }

    /// The stored token, if any
    pub async fn stored_token(&self) -> ProbeResult<Option<String>> {
        Ok(self
            .stored_user()
            .await?
            .map(|u| u.token)
            .filter(|t| !t.is_empty()))
    }

    /// Wait until the client has stored a token (after a UI login)
    pub async fn wait_for_stored_token(&self) -> ProbeResult<String> {
        wait_for(
            "token in local storage",
            &WaitOptions::page_load(&self.timeouts),
            move || async move {
                Ok(match self.stored_token().await? {
                    Some(token) => Observation::Ready(token),
                    None => Observation::Pending("no token stored".to_string()),
                })
            },
        )
        .await
    }

    /// Drop local storage and cookies: the unauthenticated state
    pub async fn clear_session(&self) -> ProbeResult<()> {
        self.driver.local_storage_clear().await?;
        self.driver.clear_cookies().await?;
        tracing::debug!("cleared browser session");
        Ok(())
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// PNG of the viewport
    pub async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
        Ok(self.driver.screenshot().await?)
    }

    /// Close the browser
    pub async fn close(&self) -> ProbeResult<()> {
        match self.driver.close().await {
            Ok(()) | Err(DriverError::Closed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
