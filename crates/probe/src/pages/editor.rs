//! Article editor at `/editor/new` and `/editor/:slug`.

use super::{PageObject, ERROR_MESSAGES};
use crate::api::ArticleDraft;
use crate::browser::BrowserSession;
use crate::result::ProbeResult;
use crate::wait::Observation;
use async_trait::async_trait;

/// New/edit article form
#[derive(Debug, Clone, Copy)]
pub struct EditorPage<'a> {
    session: &'a BrowserSession,
}

impl<'a> EditorPage<'a> {
    /// Route for a new article
    pub const NEW_PATH: &'static str = "/editor/new";
    /// Title input
    pub const TITLE: &'static str = "input[placeholder='Article Title']";
    /// Description input
    pub const DESCRIPTION: &'static str = "input[placeholder=\"What's this article about?\"]";
    /// Markdown body
    pub const BODY: &'static str = "textarea[placeholder='Write your article (in markdown)']";
    /// Tag input; Enter commits a tag
    pub const TAG_INPUT: &'static str = "input[placeholder='Enter tags']";
    /// Committed tags
    pub const TAGS: &'static str = ".tag-list .tag-pill";
    /// "Publish Article"
    pub const SUBMIT: &'static str = "button[type='submit']";
    /// Validation errors
    pub const ERRORS: &'static str = ERROR_MESSAGES;

    /// Page object over `session`
    #[must_use]
    pub const fn new(session: &'a BrowserSession) -> Self {
        Self { session }
    }

    /// Open an empty editor
    pub async fn open_new(&self) -> ProbeResult<()> {
        self.session.open(Self::NEW_PATH).await?;
        self.session.wait_for_visible(Self::TITLE).await
    }

    /// Open the editor for an existing article
    pub async fn open_existing(&self, slug: &str) -> ProbeResult<()> {
        self.session.open(&format!("/editor/{slug}")).await?;
        self.session.wait_for_visible(Self::TITLE).await
    }

    /// Fill every field of `draft` and commit its tags
    pub async fn fill(&self, draft: &ArticleDraft) -> ProbeResult<()> {
        self.session.fill(Self::TITLE, &draft.title).await?;
        self.session.fill(Self::DESCRIPTION, &draft.description).await?;
        self.session.fill(Self::BODY, &draft.body).await?;
        for tag in &draft.tag_list {
            self.add_tag(tag).await?;
        }
        Ok(())
    }

    /// Type a tag and press Enter; waits for the pill
    pub async fn add_tag(&self, tag: &str) -> ProbeResult<()> {
        self.session.fill(Self::TAG_INPUT, tag).await?;
        self.session.press_enter(Self::TAG_INPUT).await?;
        self.session.wait_for_text(Self::TAGS, tag).await
    }

    /// Committed tags
    pub async fn tags(&self) -> ProbeResult<Vec<String>> {
        self.session.texts(Self::TAGS).await
    }

    /// Publish `draft` and wait for the article route; returns the slug
    pub async fn publish(&self, draft: &ArticleDraft) -> ProbeResult<String> {
        self.fill(draft).await?;
        self.session.click(Self::SUBMIT).await?;
        let url = self.session.wait_for_url_contains("/article/").await?;
        let slug = url
            .rsplit_once("/article/")
            .map(|(_, s)| s.trim_end_matches('/').to_string())
            .unwrap_or_default();
        tracing::info!(%slug, title = %draft.title, "published via UI");
        Ok(slug)
    }

    /// Publish `draft` expecting validation errors; returns them
    pub async fn publish_expecting_error(&self, draft: &ArticleDraft) -> ProbeResult<Vec<String>> {
        self.fill(draft).await?;
        self.session.click(Self::SUBMIT).await?;
        let session = self.session;
        session
            .wait_for("editor error messages", move || async move {
                let errors = session.texts(Self::ERRORS).await?;
                Ok(if errors.is_empty() {
                    Observation::Pending(session.current_url().await?)
                } else {
                    Observation::Ready(errors)
                })
            })
            .await
    }

    /// Currently shown error messages
    pub async fn error_messages(&self) -> ProbeResult<Vec<String>> {
        self.session.texts(Self::ERRORS).await
    }

    /// Whether the browser is still on an editor route
    pub async fn is_on_editor(&self) -> ProbeResult<bool> {
        Ok(self.session.current_url().await?.contains("/editor"))
    }
}

#[async_trait]
impl PageObject for EditorPage<'_> {
    fn url_pattern(&self) -> &str {
        "/editor/:slug"
    }

    fn session(&self) -> &BrowserSession {
        self.session
    }

    async fn is_loaded(&self) -> ProbeResult<bool> {
        Ok(self.session.is_visible(Self::TITLE).await?
            && self.session.is_visible(Self::SUBMIT).await?)
    }
}
