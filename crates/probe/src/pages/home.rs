//! Home page: global/personal feed plus popular tags.

use super::{count_in, PageObject, Pagination};
use crate::browser::BrowserSession;
use crate::result::{ProbeError, ProbeResult};
use crate::wait::Observation;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Text of the placeholder card in a feed without articles
const EMPTY_FEED_MARKER: &str = "No articles are here";

/// Date formats used by the common Conduit clients
const PREVIEW_DATE_FORMATS: &[&str] = &["%B %d, %Y", "%a %b %d %Y", "%Y-%m-%d"];

/// What a feed shows once loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// This many previews
    Articles(usize),
    /// The "No articles are here... yet." placeholder
    Empty,
}

/// One article card in a feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticlePreview {
    /// Position in the feed
    pub index: usize,
    /// Title
    pub title: String,
    /// Author name
    pub author: String,
    /// Description line
    pub description: String,
    /// Count on the heart button
    pub favorite_count: u64,
    /// Whether the viewer has favorited it
    pub favorited: bool,
}

/// Home page
#[derive(Debug, Clone, Copy)]
pub struct HomePage<'a> {
    session: &'a BrowserSession,
}

impl<'a> HomePage<'a> {
    /// Route
    pub const PATH: &'static str = "/";
    /// Page container
    pub const CONTAINER: &'static str = ".home-page";
    /// Popular tags in the sidebar
    pub const POPULAR_TAGS: &'static str = ".sidebar .tag-list .tag-pill";
    /// "Your Feed" / "Global Feed" / "#tag" tabs
    pub const FEED_TABS: &'static str = ".feed-toggle .nav-link";
    /// Preview titles
    pub const PREVIEW_TITLES: &'static str = ".article-preview h1";
    /// Preview authors
    pub const PREVIEW_AUTHORS: &'static str = ".article-preview .author";
    /// Preview descriptions
    pub const PREVIEW_DESCRIPTIONS: &'static str = ".article-preview .preview-link p";
    /// Heart buttons
    pub const PREVIEW_FAVORITE: &'static str = ".article-preview button";
    /// Links into the article
    pub const PREVIEW_LINKS: &'static str = ".article-preview .preview-link";
    /// Preview cards, including the empty-feed placeholder
    pub const PREVIEWS: &'static str = ".article-preview";
    /// Publication date on each preview
    pub const PREVIEW_DATES: &'static str = ".article-preview .date";

    /// Page object over `session`
    #[must_use]
    pub const fn new(session: &'a BrowserSession) -> Self {
        Self { session }
    }

    /// Navigate here and wait for the page container
    pub async fn open(&self) -> ProbeResult<()> {
        self.session.open(Self::PATH).await?;
        self.session.wait_for_visible(Self::CONTAINER).await
    }

    /// Popular tags as shown
    pub async fn tags(&self) -> ProbeResult<Vec<String>> {
        self.session.texts(Self::POPULAR_TAGS).await
    }

    /// Whether any popular tag is listed twice
    pub async fn has_duplicate_tags(&self) -> ProbeResult<bool> {
        let tags = self.tags().await?;
        let mut seen = HashSet::new();
        Ok(!tags.iter().all(|t| seen.insert(t.as_str())))
    }

    /// Click a popular tag and wait for its feed tab
    pub async fn filter_by_tag(&self, tag: &str) -> ProbeResult<()> {
        self.session.click_text(Self::POPULAR_TAGS, tag).await?;
        self.session.wait_for_text(Self::FEED_TABS, tag).await
    }

    /// Open the home page filtered to `tag`
    pub async fn open_with_tag(&self, tag: &str) -> ProbeResult<()> {
        self.open().await?;
        self.filter_by_tag(tag).await
    }

    /// Switch to the tab whose label contains `label`
    pub async fn select_feed(&self, label: &str) -> ProbeResult<()> {
        self.session.click_text(Self::FEED_TABS, label).await?;
        let session = self.session;
        session
            .wait_for("feed tab to activate", move || async move {
                let tabs = session.query(Self::FEED_TABS).await?;
                let active = tabs
                    .iter()
                    .any(|t| t.text.contains(label) && t.has_class("active"));
                Ok(Observation::when(active, format!("{} tab(s)", tabs.len())))
            })
            .await
    }

    /// Titles in the current feed
    pub async fn article_titles(&self) -> ProbeResult<Vec<String>> {
        self.session.texts(Self::PREVIEW_TITLES).await
    }

    /// Wait until at least one preview is rendered
    pub async fn wait_for_articles(&self) -> ProbeResult<usize> {
        let session = self.session;
        session
            .wait_for("article previews", move || async move {
                let n = session.count(Self::PREVIEW_TITLES).await?;
                Ok(if n > 0 {
                    Observation::Ready(n)
                } else {
                    Observation::Pending("no previews".to_string())
                })
            })
            .await
    }

    /// Whether the feed shows the empty-state placeholder
    pub async fn is_feed_empty(&self) -> ProbeResult<bool> {
        Ok(self
            .session
            .texts(Self::PREVIEWS)
            .await?
            .iter()
            .any(|t| t.contains(EMPTY_FEED_MARKER)))
    }

    /// Wait until the feed shows either previews or the empty placeholder
    pub async fn wait_for_feed(&self) -> ProbeResult<FeedState> {
        let page = *self;
        self.session
            .wait_for("feed to load", move || async move {
                let n = page.session.count(Self::PREVIEW_TITLES).await?;
                if n > 0 {
                    return Ok(Observation::Ready(FeedState::Articles(n)));
                }
                if page.is_feed_empty().await? {
                    return Ok(Observation::Ready(FeedState::Empty));
                }
                Ok(Observation::Pending("feed still loading".to_string()))
            })
            .await
    }

    /// Publication dates of the previews, top to bottom
    pub async fn preview_dates(&self) -> ProbeResult<Vec<NaiveDate>> {
        self.session
            .texts(Self::PREVIEW_DATES)
            .await?
            .iter()
            .map(|text| {
                parse_preview_date(text).ok_or_else(|| {
                    ProbeError::assertion(format!("unrecognized preview date {text:?}"))
                })
            })
            .collect()
    }

    /// Whether the feed lists newer articles first
    pub async fn dates_descending(&self) -> ProbeResult<bool> {
        let dates = self.preview_dates().await?;
        Ok(dates.windows(2).all(|pair| pair[0] >= pair[1]))
    }

    /// Pagination bar under the feed
    #[must_use]
    pub const fn pagination(&self) -> Pagination<'a> {
        Pagination::new(self.session)
    }

    /// Every preview in the current feed
    pub async fn previews(&self) -> ProbeResult<Vec<ArticlePreview>> {
        let titles = self.session.texts(Self::PREVIEW_TITLES).await?;
        let authors = self.session.texts(Self::PREVIEW_AUTHORS).await?;
        let descriptions = self.session.texts(Self::PREVIEW_DESCRIPTIONS).await?;
        let buttons = self.session.query(Self::PREVIEW_FAVORITE).await?;
        Ok(titles
            .into_iter()
            .enumerate()
            .map(|(index, title)| {
                let button = buttons.get(index);
                ArticlePreview {
                    index,
                    title,
                    author: authors.get(index).cloned().unwrap_or_default(),
                    description: descriptions.get(index).cloned().unwrap_or_default(),
                    favorite_count: button.map_or(0, |b| count_in(&b.text)),
                    favorited: button.is_some_and(|b| b.has_class("btn-primary")),
                }
            })
            .collect())
    }

    /// Preview whose title equals `title`
    pub async fn preview(&self, title: &str) -> ProbeResult<Option<ArticlePreview>> {
        Ok(self
            .previews()
            .await?
            .into_iter()
            .find(|p| p.title == title))
    }

    async fn require_preview(&self, title: &str) -> ProbeResult<ArticlePreview> {
        self.preview(title).await?.ok_or_else(|| {
            ProbeError::ui_interaction(
                "find_preview",
                Self::PREVIEW_TITLES,
                format!("no article titled {title:?} in feed"),
            )
        })
    }

    /// Favorite from the feed; no click if already favorited
    pub async fn favorite_preview(&self, title: &str) -> ProbeResult<ArticlePreview> {
        self.set_preview_favorited(title, true).await
    }

    /// Unfavorite from the feed; no click if not favorited
    pub async fn unfavorite_preview(&self, title: &str) -> ProbeResult<ArticlePreview> {
        self.set_preview_favorited(title, false).await
    }

    async fn set_preview_favorited(
        &self,
        title: &str,
        favorited: bool,
    ) -> ProbeResult<ArticlePreview> {
        let current = self.require_preview(title).await?;
        if current.favorited == favorited {
            return Ok(current);
        }
        self.session
            .click_nth(Self::PREVIEW_FAVORITE, current.index)
            .await?;
        let page = *self;
        self.session
            .wait_for("preview favorite state", move || async move {
                let preview = page.require_preview(title).await?;
                Ok(if preview.favorited == favorited {
                    Observation::Ready(preview)
                } else {
                    Observation::Pending(format!("count {}", preview.favorite_count))
                })
            })
            .await
    }

    /// Follow the preview link and wait for the article route
    pub async fn open_article(&self, title: &str) -> ProbeResult<String> {
        let preview = self.require_preview(title).await?;
        self.session
            .click_nth(Self::PREVIEW_LINKS, preview.index)
            .await?;
        self.session.wait_for_url_contains("/article/").await
    }
}

fn parse_preview_date(text: &str) -> Option<NaiveDate> {
    PREVIEW_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text.trim(), format).ok())
}

#[async_trait]
impl PageObject for HomePage<'_> {
    fn url_pattern(&self) -> &str {
        Self::PATH
    }

    fn session(&self) -> &BrowserSession {
        self.session
    }

    async fn is_loaded(&self) -> ProbeResult<bool> {
        self.session.is_visible(Self::CONTAINER).await
    }
}
