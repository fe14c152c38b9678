//! Chromium driver over the DevTools protocol.

use super::driver::{BrowserDriver, DriverError, DriverResult, ElementState};
use crate::config::BrowserSettings;
use crate::result::{ProbeError, ProbeResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::network::ClearBrowserCookiesParams;
use chromiumoxide::page::{Page as CdpPage, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

/// Snapshot script; `%SELECTOR%` is replaced with a JSON string literal
const QUERY_SCRIPT: &str = r"(() => Array.from(document.querySelectorAll(%SELECTOR%)).map(e => ({
    tag: e.tagName.toLowerCase(),
    text: (e.innerText ?? e.textContent ?? ''),
    innerHtml: e.innerHTML,
    classes: Array.from(e.classList),
    value: ('value' in e && typeof e.value === 'string') ? e.value : null,
    href: e.getAttribute('href'),
    visible: !!(e.offsetWidth || e.offsetHeight || e.getClientRects().length),
    enabled: !e.disabled
})))()";

/// Chromium instance with one page
#[derive(Debug)]
pub struct CdpDriver {
    browser: Mutex<Option<CdpBrowser>>,
    page: CdpPage,
    handle: tokio::task::JoinHandle<()>,
}

impl CdpDriver {
    /// Launch chromium and open a blank page
    pub async fn launch(settings: &BrowserSettings) -> ProbeResult<Self> {
        let mut builder = CdpConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height);

        if !settings.headless {
            builder = builder.with_head();
        }

        if settings.no_sandbox {
            builder = builder.no_sandbox();
        }

        if let Some(ref path) = settings.chromium_path {
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder.build().map_err(|e| ProbeError::BrowserLaunch { message: e })?;

        let (browser, mut handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| ProbeError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ProbeError::BrowserLaunch {
                message: e.to_string(),
            })?;

        tracing::info!(headless = settings.headless, "launched chromium");
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            handle,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> DriverResult<T> {
        let result = self.page.evaluate(script).await.map_err(script_error)?;
        result.into_value().map_err(|e| DriverError::Script {
            message: e.to_string(),
        })
    }

    async fn nth(
        &self,
        selector: &str,
        index: usize,
    ) -> DriverResult<chromiumoxide::element::Element> {
        let mut elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| element_error(selector, &e))?;
        if index >= elements.len() {
            return Err(DriverError::NotFound {
                selector: selector.to_string(),
                index,
            });
        }
        Ok(elements.swap_remove(index))
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn script_error(e: chromiumoxide::error::CdpError) -> DriverError {
    DriverError::Script {
        message: e.to_string(),
    }
}

/// Node lookups that race a re-render surface as "no node" protocol errors
fn element_error(selector: &str, e: &chromiumoxide::error::CdpError) -> DriverError {
    let message = e.to_string();
    let lower = message.to_ascii_lowercase();
    if lower.contains("node") || lower.contains("detached") || lower.contains("stale") {
        DriverError::StaleElement {
            selector: selector.to_string(),
        }
    } else {
        DriverError::Protocol { message }
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        tracing::debug!(url, "navigate");
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        let url = self.page.url().await.map_err(|e| DriverError::Protocol {
            message: e.to_string(),
        })?;
        Ok(url.unwrap_or_default())
    }

    async fn page_source(&self) -> DriverResult<String> {
        self.page.content().await.map_err(|e| DriverError::Protocol {
            message: e.to_string(),
        })
    }

    async fn query_all(&self, selector: &str) -> DriverResult<Vec<ElementState>> {
        let script = QUERY_SCRIPT.replace("%SELECTOR%", &js_string(selector));
        self.eval(&script).await
    }

    async fn click(&self, selector: &str, index: usize) -> DriverResult<()> {
        tracing::debug!(selector, index, "click");
        let element = self.nth(selector, index).await?;
        element
            .click()
            .await
            .map_err(|e| element_error(selector, &e))?;
        Ok(())
    }

    async fn fill(&self, selector: &str, index: usize, text: &str) -> DriverResult<()> {
        tracing::debug!(selector, index, "fill");
        let clear = format!(
            "(() => {{ const e = document.querySelectorAll({sel})[{index}]; if (!e) return false; e.focus(); e.value = ''; e.dispatchEvent(new Event('input', {{ bubbles: true }})); return true; }})()",
            sel = js_string(selector),
        );
        if !self.eval::<bool>(&clear).await? {
            return Err(DriverError::NotFound {
                selector: selector.to_string(),
                index,
            });
        }
        let element = self.nth(selector, index).await?;
        element
            .click()
            .await
            .map_err(|e| element_error(selector, &e))?;
        element
            .type_str(text)
            .await
            .map_err(|e| element_error(selector, &e))?;
        Ok(())
    }

    async fn press_enter(&self, selector: &str, index: usize) -> DriverResult<()> {
        let element = self.nth(selector, index).await?;
        element
            .press_key("Enter")
            .await
            .map_err(|e| element_error(selector, &e))?;
        Ok(())
    }

    async fn local_storage_get(&self, key: &str) -> DriverResult<Option<String>> {
        #[derive(serde::Deserialize)]
        struct Item {
            value: Option<String>,
        }
        // Wrapped so a missing key comes back as an object, not a bare null
        let script = format!(
            "(() => ({{ value: window.localStorage.getItem({}) }}))()",
            js_string(key)
        );
        let item: Item = self.eval(&script).await?;
        Ok(item.value)
    }

    async fn local_storage_set(&self, key: &str, value: &str) -> DriverResult<()> {
        let script = format!(
            "(() => {{ window.localStorage.setItem({}, {}); return true; }})()",
            js_string(key),
            js_string(value)
        );
        self.eval::<bool>(&script).await.map(|_| ())
    }

    async fn local_storage_clear(&self) -> DriverResult<()> {
        self.eval::<bool>("(() => { window.localStorage.clear(); return true; })()")
            .await
            .map(|_| ())
    }

    async fn clear_cookies(&self) -> DriverResult<()> {
        self.page
            .execute(ClearBrowserCookiesParams::default())
            .await
            .map_err(|e| DriverError::Protocol {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn reload(&self) -> DriverResult<()> {
        self.page.reload().await.map_err(|e| DriverError::Navigation {
            url: "<reload>".to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    async fn back(&self) -> DriverResult<()> {
        self.eval::<bool>("(() => { history.back(); return true; })()")
            .await
            .map(|_| ())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        self.page
            .screenshot(ScreenshotParams::builder().build())
            .await
            .map_err(|e| DriverError::Protocol {
                message: e.to_string(),
            })
    }

    async fn close(&self) -> DriverResult<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        let result = browser.close().await;
        let _ = browser.wait().await;
        self.handle.abort();
        tracing::info!("closed chromium");
        result.map(|_| ()).map_err(|e| DriverError::Protocol {
            message: e.to_string(),
        })
    }
}
