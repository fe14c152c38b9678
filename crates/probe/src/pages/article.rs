//! Article view at `/article/:slug`.

use super::{count_in, PageObject};
use crate::browser::BrowserSession;
use crate::result::ProbeResult;
use crate::wait::Observation;
use async_trait::async_trait;

/// Marker of the delete icon on comments the viewer owns
const TRASH_ICON: &str = "ion-trash-a";

/// Single article with its comments
#[derive(Debug, Clone, Copy)]
pub struct ArticlePage<'a> {
    session: &'a BrowserSession,
}

impl<'a> ArticlePage<'a> {
    /// Title in the banner
    pub const TITLE: &'static str = ".banner h1";
    /// Rendered body paragraphs
    pub const BODY: &'static str = ".article-content p";
    /// Author meta block
    pub const META: &'static str = ".article-meta";
    /// Author name link
    pub const AUTHOR: &'static str = ".article-meta .author";
    /// Tag pills
    pub const TAGS: &'static str = ".tag-list .tag-pill";
    /// Follow / favorite buttons in the meta block
    pub const META_BUTTONS: &'static str = ".article-meta button";
    /// Edit link (author only)
    pub const EDIT_LINK: &'static str = ".article-meta a[href*='/editor/']";
    /// Delete button (author only)
    pub const DELETE_BUTTON: &'static str = ".article-meta button.btn-outline-danger";
    /// Comment textarea
    pub const COMMENT_INPUT: &'static str = ".comment-form textarea";
    /// Comment submit button
    pub const COMMENT_SUBMIT: &'static str = ".comment-form button[type='submit']";
    /// One card per comment
    pub const COMMENT_CARDS: &'static str = ".card.comment";
    /// Comment text, one per card
    pub const COMMENT_TEXT: &'static str = ".card.comment .card-text";
    /// Delete icons, only on the viewer's own comments
    pub const COMMENT_DELETE: &'static str = ".card.comment .mod-options i.ion-trash-a";

    /// Page object over `session`
    #[must_use]
    pub const fn new(session: &'a BrowserSession) -> Self {
        Self { session }
    }

    /// Route for `slug`
    #[must_use]
    pub fn path(slug: &str) -> String {
        format!("/article/{slug}")
    }

    /// Navigate to the article and wait for its title
    pub async fn open(&self, slug: &str) -> ProbeResult<()> {
        self.session.open(&Self::path(slug)).await?;
        self.session.wait_for_visible(Self::TITLE).await
    }

    /// Slug from the current URL
    pub async fn slug(&self) -> ProbeResult<Option<String>> {
        let url = self.session.current_url().await?;
        Ok(url
            .rsplit_once("/article/")
            .map(|(_, slug)| slug.trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty()))
    }

    /// Title text
    pub async fn title(&self) -> ProbeResult<String> {
        Ok(self.session.text_of(Self::TITLE).await?.unwrap_or_default())
    }

    /// Body text, paragraphs joined by newlines
    pub async fn body(&self) -> ProbeResult<String> {
        Ok(self.session.texts(Self::BODY).await?.join("\n"))
    }

    /// Author display name
    pub async fn author(&self) -> ProbeResult<String> {
        Ok(self.session.text_of(Self::AUTHOR).await?.unwrap_or_default())
    }

    /// Tag names
    pub async fn tags(&self) -> ProbeResult<Vec<String>> {
        self.session.texts(Self::TAGS).await
    }

    // =========================================================================
    // Follow
    // =========================================================================

    /// Label of the follow button, empty when absent (own article)
    pub async fn follow_button_text(&self) -> ProbeResult<String> {
        Ok(self
            .meta_button("ollow")
            .await?
            .unwrap_or_default())
    }

    /// Whether the viewer follows the author
    pub async fn is_following_author(&self) -> ProbeResult<bool> {
        Ok(self.follow_button_text().await?.contains("Unfollow"))
    }

    /// Follow the author; no click if already following
    pub async fn follow_author(&self) -> ProbeResult<()> {
        self.set_following(true).await
    }

    /// Unfollow the author; no click if not following
    pub async fn unfollow_author(&self) -> ProbeResult<()> {
        self.set_following(false).await
    }

    async fn set_following(&self, follow: bool) -> ProbeResult<()> {
        if self.is_following_author().await? == follow {
            tracing::debug!(follow, "follow state already reached");
            return Ok(());
        }
        self.session.click_text(Self::META_BUTTONS, "ollow").await?;
        let page = *self;
        let description = if follow {
            "author to be followed"
        } else {
            "author to be unfollowed"
        };
        self.session
            .wait_for(description, move || async move {
                let label = page.follow_button_text().await?;
                Ok(Observation::when(label.contains("Unfollow") == follow, label))
            })
            .await
    }

    // =========================================================================
    // Favorite
    // =========================================================================

    /// Label of the favorite button
    pub async fn favorite_button_text(&self) -> ProbeResult<String> {
        Ok(self
            .meta_button("avorite")
            .await?
            .unwrap_or_default())
    }

    /// Whether the viewer has favorited the article
    pub async fn is_favorited(&self) -> ProbeResult<bool> {
        let buttons = self.session.query(Self::META_BUTTONS).await?;
        Ok(buttons
            .iter()
            .find(|b| b.text.contains("avorite"))
            .is_some_and(|b| b.text.contains("Unfavorite") || b.has_class("btn-primary")))
    }

    /// Count shown on the favorite button
    pub async fn favorite_count(&self) -> ProbeResult<u64> {
        Ok(count_in(&self.favorite_button_text().await?))
    }

    /// Favorite the article; a second call leaves state and count untouched.
    /// Returns the count once the UI shows the article as favorited.
    pub async fn favorite(&self) -> ProbeResult<u64> {
        self.set_favorited(true).await
    }

    /// Remove the favorite; no click if not favorited
    pub async fn unfavorite(&self) -> ProbeResult<u64> {
        self.set_favorited(false).await
    }

    async fn set_favorited(&self, favorited: bool) -> ProbeResult<u64> {
        if self.is_favorited().await? == favorited {
            tracing::debug!(favorited, "favorite state already reached");
            return self.favorite_count().await;
        }
        self.session
            .click_text(Self::META_BUTTONS, "avorite")
            .await?;
        let page = *self;
        let description = if favorited {
            "article to be favorited"
        } else {
            "article to be unfavorited"
        };
        self.session
            .wait_for(description, move || async move {
                if page.is_favorited().await? == favorited {
                    Ok(Observation::Ready(page.favorite_count().await?))
                } else {
                    Ok(Observation::Pending(page.favorite_button_text().await?))
                }
            })
            .await
    }

    async fn meta_button(&self, fragment: &str) -> ProbeResult<Option<String>> {
        Ok(self
            .session
            .query(Self::META_BUTTONS)
            .await?
            .into_iter()
            .find(|b| b.text.contains(fragment))
            .map(|b| b.trimmed_text().to_string()))
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Post a comment and wait until it is rendered somewhere in the list
    pub async fn post_comment(&self, text: &str) -> ProbeResult<()> {
        self.session.fill(Self::COMMENT_INPUT, text).await?;
        self.session.click(Self::COMMENT_SUBMIT).await?;
        let needle = text.trim();
        let page = *self;
        self.session
            .wait_for("posted comment to render", move || async move {
                let texts = page.comment_texts().await?;
                let shown = texts.iter().any(|t| t.contains(needle));
                Ok(Observation::when(
                    shown,
                    format!("{} comment(s) rendered", texts.len()),
                ))
            })
            .await
    }

    /// Rendered text of every comment
    pub async fn comment_texts(&self) -> ProbeResult<Vec<String>> {
        self.session.texts(Self::COMMENT_TEXT).await
    }

    /// Inner HTML of every comment body
    pub async fn comment_html(&self) -> ProbeResult<Vec<String>> {
        Ok(self
            .session
            .query(Self::COMMENT_TEXT)
            .await?
            .into_iter()
            .map(|e| e.inner_html)
            .collect())
    }

    /// Number of comments shown
    pub async fn comment_count(&self) -> ProbeResult<usize> {
        self.session.count(Self::COMMENT_TEXT).await
    }

    /// Whether any comment body contains a live `<script>` element
    pub async fn has_executable_script_in_comments(&self) -> ProbeResult<bool> {
        Ok(self
            .comment_html()
            .await?
            .iter()
            .any(|html| html.to_ascii_lowercase().contains("<script")))
    }

    /// Delete the viewer's comment whose text contains `text` and wait for it
    /// to disappear
    pub async fn delete_comment(&self, text: &str) -> ProbeResult<()> {
        let cards = self.session.query(Self::COMMENT_CARDS).await?;
        let texts = self.comment_texts().await?;
        let target = texts.iter().position(|t| t.contains(text)).ok_or_else(|| {
            crate::ProbeError::ui_interaction(
                "delete_comment",
                Self::COMMENT_TEXT,
                format!("no comment containing {text:?}"),
            )
        })?;
        let owned_before = |i: usize| {
            cards
                .iter()
                .take(i)
                .filter(|c| c.inner_html.contains(TRASH_ICON))
                .count()
        };
        if !cards
            .get(target)
            .is_some_and(|c| c.inner_html.contains(TRASH_ICON))
        {
            return Err(crate::ProbeError::ui_interaction(
                "delete_comment",
                Self::COMMENT_DELETE,
                "comment has no delete control for this viewer",
            ));
        }
        self.session
            .click_nth(Self::COMMENT_DELETE, owned_before(target))
            .await?;
        let page = *self;
        let matching = |texts: &[String]| texts.iter().filter(|t| t.contains(text)).count();
        let before = matching(texts.as_slice());
        self.session
            .wait_for("comment to be removed", move || async move {
                let left = matching(page.comment_texts().await?.as_slice());
                Ok(Observation::when(
                    left < before,
                    format!("{left} comment(s) containing {text:?}"),
                ))
            })
            .await
    }

    // =========================================================================
    // Ownership
    // =========================================================================

    /// Whether the edit link is shown
    pub async fn can_edit(&self) -> ProbeResult<bool> {
        self.session.is_visible(Self::EDIT_LINK).await
    }

    /// Whether the delete button is shown
    pub async fn can_delete(&self) -> ProbeResult<bool> {
        self.session.is_visible(Self::DELETE_BUTTON).await
    }

    /// Delete the article and wait to be routed away from it
    pub async fn delete_article(&self) -> ProbeResult<()> {
        self.session.click(Self::DELETE_BUTTON).await?;
        let session = self.session;
        session
            .wait_for("navigation away from the article", move || async move {
                let url = session.current_url().await?;
                Ok(Observation::when(!url.contains("/article/"), url))
            })
            .await
    }

    /// Whether the page shows a not-found state
    pub async fn is_not_found(&self) -> ProbeResult<bool> {
        let source = self.session.page_source().await?;
        Ok(source.contains("404")
            || source.contains("Not Found")
            || source.contains("Can't load"))
    }
}

#[async_trait]
impl PageObject for ArticlePage<'_> {
    fn url_pattern(&self) -> &str {
        "/article/:slug"
    }

    fn session(&self) -> &BrowserSession {
        self.session
    }

    async fn is_loaded(&self) -> ProbeResult<bool> {
        Ok(self.session.is_visible(Self::TITLE).await?
            && self.session.is_visible(Self::META).await?)
    }
}
