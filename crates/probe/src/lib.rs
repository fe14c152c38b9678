//! conduit-probe: end-to-end test harness for RealWorld (Conduit) apps.
//!
//! Two channels reach the application under test: the REST API through
//! [`ApiClient`] and the web UI through a [`BrowserSession`] plus page
//! objects. A [`Session`] pairs them for one logical user, and every test
//! runs through the [`lifecycle`] state machine into a shared [`Reporter`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ EnvironmentConfig│  defaults < YAML file < TEST_* env vars
//! └────────┬─────────┘
//!          │
//!   ┌──────┴──────┐         ┌──────────────────────────────┐
//!   │  ApiClient  │         │ BrowserSession               │
//!   │ (reqwest)   │         │  retry-once + wait_for       │
//!   └──────┬──────┘         │  ┌──────────┐ ┌────────────┐ │
//!          │                │  │CdpDriver │ │ MockDriver │ │
//!          │                │  └──────────┘ └────────────┘ │
//!          │                └──────────────┬───────────────┘
//!          │                        pages::{Login, Article, ...}
//!          └──────────── Session ──────────┘
//!                           │
//!                 TestLifecycle ──▶ Reporter ──▶ HTML + JSON
//! ```
//!
//! # Example
//!
//! ```ignore
//! use conduit_probe::prelude::*;
//!
//! let config = EnvironmentConfig::global()?;
//! let suite = Suite::new(Reporter::new());
//! suite.run("login returns a token", |ctx| async move {
//!     let api = ApiClient::from_config(config)?;
//!     let creds = config.user("alice")?;
//!     let token = api.login(&creds.email, &creds.password).await?;
//!     ctx.check(!token.is_empty(), "token issued")
//! }).await?;
//! suite.reporter().flush(&config.report_dir)?;
//! ```

#![warn(missing_docs)]

/// REST client and response schema
pub mod api;

/// Local-storage user record and token helpers
pub mod auth;

/// Browser driver seam, mock and CDP drivers, session
pub mod browser;

/// Layered environment configuration
pub mod config;

/// Test state machine and runners
pub mod lifecycle;

/// Tracing subscriber setup
pub mod logging;

/// Page objects for the Conduit web client
pub mod pages;

/// Run reporting
pub mod reporter;

mod result;

/// Dual-channel session
pub mod session;

/// Condition waits
pub mod wait;

pub use api::{ApiClient, ApiResponse, ArticleDraft, ArticleQuery};
pub use auth::{StoredUser, TokenClaims, TokenFixture};
pub use browser::{BrowserDriver, BrowserSession, DriverError, ElementState, MockDriver};
pub use config::{BrowserSettings, EnvironmentConfig, Timeouts, UserCredentials};
pub use lifecycle::{run_test, run_ui_test, Suite, TestContext, TestLifecycle, TestState};
pub use reporter::{ReportArtifacts, Reporter, TestReport, TestStatus};
pub use result::{ProbeError, ProbeResult};
pub use session::Session;
pub use wait::{wait_for, wait_until, Observation, WaitOptions};

/// Everything a scenario file usually needs
pub mod prelude {
    pub use super::api::*;
    pub use super::auth::{same_subject, subject_of, StoredUser, TokenClaims, TokenFixture};
    pub use super::browser::{BrowserSession, ElementState, MockDriver};
    pub use super::config::*;
    pub use super::lifecycle::*;
    pub use super::pages::*;
    pub use super::reporter::*;
    pub use super::result::{ProbeError, ProbeResult};
    pub use super::session::Session;
    pub use super::wait::*;
}
