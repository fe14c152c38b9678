//! Environment configuration.
//!
//! Resolved once per process from three layers, later layers winning:
//!
//! 1. built-in defaults
//! 2. a YAML file (`--config`, `TEST_CONFIG`, or `conduit-probe.yaml`)
//! 3. `TEST_*` environment variables (`TEST_USERS__ALICE__EMAIL`)
//!
//! The resolved value is immutable. [`EnvironmentConfig::global`] caches it
//! for the lifetime of the process.

use crate::result::{ProbeError, ProbeResult};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default UI origin
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Default REST API origin
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// File picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "conduit-probe.yaml";

/// Environment variable naming the config file
pub const CONFIG_PATH_VAR: &str = "TEST_CONFIG";

/// Prefix of the environment layer
pub const ENV_PREFIX: &str = "TEST";

/// Top-level keys the environment layer may set
const ENV_KEYS: &[&str] = &[
    "BASE_URL",
    "API_URL",
    "REPORT_DIR",
    "TIMEOUTS",
    "BROWSER",
    "USERS",
];

static GLOBAL: OnceCell<EnvironmentConfig> = OnceCell::new();

/// Timeouts used by waits and HTTP calls, all in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    /// Budget for locating elements that should already be there
    pub implicit_wait_ms: u64,
    /// Budget for a page (or route) to finish loading
    pub page_load_ms: u64,
    /// Budget for an asynchronous UI state change (follow, favorite, comment)
    pub state_change_ms: u64,
    /// Poll interval for every condition wait
    pub poll_interval_ms: u64,
    /// Per-request HTTP timeout
    pub http_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            implicit_wait_ms: 5_000,
            page_load_ms: 15_000,
            state_change_ms: 5_000,
            poll_interval_ms: 100,
            http_ms: 10_000,
        }
    }
}

impl Timeouts {
    /// HTTP timeout as a Duration
    #[must_use]
    pub const fn http(&self) -> Duration {
        Duration::from_millis(self.http_ms)
    }
}

/// Browser launch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserSettings {
    /// Run without a visible window
    pub headless: bool,
    /// Explicit chromium executable
    pub chromium_path: Option<PathBuf>,
    /// Viewport width in pixels
    pub viewport_width: u32,
    /// Viewport height in pixels
    pub viewport_height: u32,
    /// Disable the chromium sandbox (containers)
    pub no_sandbox: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            viewport_width: 1920,
            viewport_height: 1080,
            no_sandbox: false,
        }
    }
}

/// Credentials for one named test user
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserCredentials {
    /// Login email
    pub email: String,
    /// Login password
    pub password: String,
    /// Display name, used to open `/profile/:username`
    pub username: Option<String>,
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("email", &self.email)
            .field("password", &"***")
            .field("username", &self.username)
            .finish()
    }
}

/// Fully resolved harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// UI origin, e.g. `http://localhost:3000`
    pub base_url: String,
    /// REST API origin, e.g. `http://localhost:8080`
    pub api_url: String,
    /// Wait and HTTP timeouts
    pub timeouts: Timeouts,
    /// Browser launch settings
    pub browser: BrowserSettings,
    /// Named test users (`a`, `b`, ...)
    pub users: BTreeMap<String, UserCredentials>,
    /// Where reports and screenshots are written
    pub report_dir: PathBuf,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            timeouts: Timeouts::default(),
            browser: BrowserSettings::default(),
            users: BTreeMap::new(),
            report_dir: PathBuf::from("target/conduit-probe"),
        }
    }
}

impl EnvironmentConfig {
    /// Resolve configuration from the real process environment.
    ///
    /// The file layer is the explicit `path`, else `TEST_CONFIG`, else
    /// `conduit-probe.yaml` if it exists in the working directory.
    pub fn load(path: Option<&Path>) -> ProbeResult<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var_os(CONFIG_PATH_VAR)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                    default.exists().then_some(default)
                }),
        };
        Self::from_sources(file.as_deref(), std::env::vars())
    }

    /// Resolve configuration from an optional file and an explicit set of
    /// environment variables.
    ///
    /// Variables are `TEST_<KEY>`, with `__` between nested keys:
    /// `TEST_API_URL`, `TEST_TIMEOUTS__HTTP_MS`, `TEST_BROWSER__HEADLESS`,
    /// `TEST_USERS__ALICE__PASSWORD`. Other `TEST_*` variables are ignored.
    pub fn from_sources<I>(file: Option<&Path>, env: I) -> ProbeResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: config::Map<String, String> = env
            .into_iter()
            .filter(|(key, _)| is_config_var(key))
            .collect();

        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }
        let mut config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .ignore_empty(true)
                    .source(Some(vars)),
            )
            .build()
            .and_then(|built| built.try_deserialize())
            .map_err(|e| ProbeError::config(e.to_string()))?;
        // Environment keys arrive lowercased; file keys keep their case
        config.users = std::mem::take(&mut config.users)
            .into_iter()
            .map(|(name, creds)| (name.to_ascii_lowercase(), creds))
            .collect();

        config.validate()?;
        tracing::debug!(
            base_url = %config.base_url,
            api_url = %config.api_url,
            users = config.users.len(),
            "resolved environment config"
        );
        Ok(config)
    }

    /// Parse the file layer on top of the defaults
    pub fn from_yaml(text: &str) -> ProbeResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(text).map_err(|e| ProbeError::config(format!("invalid YAML: {e}")))
    }

    /// Process-wide configuration, resolved on first use
    pub fn global() -> ProbeResult<&'static Self> {
        GLOBAL.get_or_try_init(|| Self::load(None))
    }

    /// Install an already resolved configuration as the process-wide one.
    ///
    /// Fails if [`global`](Self::global) or `install` already ran.
    pub fn install(config: Self) -> ProbeResult<&'static Self> {
        GLOBAL
            .set(config)
            .map_err(|_| ProbeError::config("environment config already initialised"))?;
        Self::global()
    }

    /// Check the required keys and cross-field constraints
    pub fn validate(&self) -> ProbeResult<()> {
        for (key, value) in [("base_url", &self.base_url), ("api_url", &self.api_url)] {
            if value.trim().is_empty() {
                return Err(ProbeError::config(format!("{key} is required")));
            }
            let url = reqwest::Url::parse(value)
                .map_err(|e| ProbeError::config(format!("{key} {value:?} is not a URL: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ProbeError::config(format!(
                    "{key} must use http or https, got {}",
                    url.scheme()
                )));
            }
        }
        for (name, user) in &self.users {
            if user.email.is_empty() || user.password.is_empty() {
                return Err(ProbeError::config(format!(
                    "user '{name}' needs both email and password"
                )));
            }
        }
        let t = &self.timeouts;
        if t.poll_interval_ms == 0 {
            return Err(ProbeError::config("poll_interval_ms must be greater than zero"));
        }
        if t.poll_interval_ms >= t.state_change_ms {
            return Err(ProbeError::config(
                "poll_interval_ms must be smaller than state_change_ms",
            ));
        }
        Ok(())
    }

    /// Credentials of a named user, or a fatal config error if absent
    pub fn user(&self, name: &str) -> ProbeResult<&UserCredentials> {
        self.users
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| ProbeError::config(format!("test user '{name}' is not configured")))
    }

    /// Absolute UI URL for an application route
    #[must_use]
    pub fn ui_url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Absolute API URL for an endpoint
    #[must_use]
    pub fn api_endpoint(&self, path: &str) -> String {
        join_url(&self.api_url, path)
    }

    /// Copy with passwords replaced, for display
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for user in copy.users.values_mut() {
            user.password = "***".to_string();
        }
        copy
    }
}

/// Join an origin and a route without doubling or dropping the slash
#[must_use]
pub fn join_url(origin: &str, path: &str) -> String {
    let origin = origin.trim_end_matches('/');
    if path.is_empty() {
        return origin.to_string();
    }
    if path.starts_with('/') {
        format!("{origin}{path}")
    } else {
        format!("{origin}/{path}")
    }
}

/// Whether an environment variable addresses a configuration key
fn is_config_var(key: &str) -> bool {
    let Some(rest) = key
        .strip_prefix(ENV_PREFIX)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };
    let rest = rest.to_ascii_uppercase();
    ENV_KEYS.iter().any(|k| rest == *k || rest.starts_with(&format!("{k}__")))
}
