//! Numbered pagination bar under article lists.

use crate::browser::BrowserSession;
use crate::result::{ProbeError, ProbeResult};
use crate::wait::Observation;

/// Page links below a feed or profile list
#[derive(Debug, Clone, Copy)]
pub struct Pagination<'a> {
    session: &'a BrowserSession,
}

impl<'a> Pagination<'a> {
    /// Every page item
    pub const ITEMS: &'static str = ".pagination .page-item";
    /// The highlighted page item
    pub const ACTIVE: &'static str = ".pagination .page-item.active";

    /// Pagination over `session`
    #[must_use]
    pub const fn new(session: &'a BrowserSession) -> Self {
        Self { session }
    }

    /// Whether the bar is rendered (lists that fit one page have none)
    pub async fn is_displayed(&self) -> ProbeResult<bool> {
        self.session.is_visible(Self::ITEMS).await
    }

    /// Numbers shown on the bar, in order
    pub async fn page_numbers(&self) -> ProbeResult<Vec<u32>> {
        Ok(self
            .session
            .texts(Self::ITEMS)
            .await?
            .iter()
            .filter_map(|t| t.parse().ok())
            .collect())
    }

    /// Number of numbered pages
    pub async fn page_count(&self) -> ProbeResult<usize> {
        Ok(self.page_numbers().await?.len())
    }

    /// Highlighted page; 1 when nothing is highlighted
    pub async fn current_page(&self) -> ProbeResult<u32> {
        Ok(self
            .session
            .text_of(Self::ACTIVE)
            .await?
            .and_then(|t| t.parse().ok())
            .unwrap_or(1))
    }

    /// Click page `number` and wait until it is the highlighted one
    pub async fn go_to_page(&self, number: u32) -> ProbeResult<()> {
        if self.current_page().await? == number {
            return Ok(());
        }
        let label = number.to_string();
        let index = self
            .session
            .texts(Self::ITEMS)
            .await?
            .iter()
            .position(|t| *t == label)
            .ok_or_else(|| {
                ProbeError::ui_interaction(
                    "go_to_page",
                    Self::ITEMS,
                    format!("no page {number} on the bar"),
                )
            })?;
        self.session.click_nth(Self::ITEMS, index).await?;
        let page = *self;
        let description = format!("page {number} to become active");
        self.session
            .wait_for(&description, move || async move {
                let current = page.current_page().await?;
                Ok(Observation::when(
                    current == number,
                    format!("page {current} active"),
                ))
            })
            .await?;
        tracing::debug!(page = number, "changed page");
        Ok(())
    }

    /// Go one page forward
    pub async fn next(&self) -> ProbeResult<()> {
        let current = self.current_page().await?;
        self.go_to_page(current + 1).await
    }

    /// Go one page back; fails on the first page
    pub async fn previous(&self) -> ProbeResult<()> {
        match self.current_page().await? {
            0 | 1 => Err(ProbeError::ui_interaction(
                "previous_page",
                Self::ITEMS,
                "already on the first page",
            )),
            current => self.go_to_page(current - 1).await,
        }
    }
}
