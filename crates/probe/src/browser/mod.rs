//! Browser control.
//!
//! [`BrowserDriver`] is the seam between the harness and a browser engine.
//! [`CdpDriver`] drives chromium (feature `browser`); [`MockDriver`] is a
//! scripted in-memory page. [`BrowserSession`] layers the retry policy,
//! condition waits, and local-storage auth helpers on top of either.

#[cfg(feature = "browser")]
#[allow(
    clippy::missing_errors_doc,
    clippy::significant_drop_tightening,
    clippy::redundant_clone
)]
mod cdp;
mod driver;
mod mock;
mod session;

#[cfg(feature = "browser")]
pub use cdp::CdpDriver;
pub use driver::{escape_html, BrowserDriver, DriverError, DriverResult, ElementState};
pub use mock::{ActionHandler, MockDom, MockDriver, RouteHandler};
pub use session::BrowserSession;
