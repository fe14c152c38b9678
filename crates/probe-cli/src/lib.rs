//! conduit-probe CLI library
//!
//! Argument definitions, terminal output and the built-in smoke scenarios
//! behind the `conduit-probe` binary.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod error;
mod output;
mod scenarios;

pub use commands::{Cli, ColorArg, Commands, ConfigArgs, ConfigFormat, SmokeArgs};
pub use error::{CliError, CliResult};
pub use output::{summary_line, ProgressReporter};
pub use scenarios::{run_smoke, SmokeSummary};

use conduit_probe::EnvironmentConfig;

/// Resolved configuration with passwords masked, in the requested format
pub fn render_config(config: &EnvironmentConfig, format: ConfigFormat) -> CliResult<String> {
    let redacted = config.redacted();
    Ok(match format {
        ConfigFormat::Yaml => serde_yaml_ng::to_string(&redacted)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&redacted)?,
    })
}
