//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// conduit-probe: end-to-end smoke runner for RealWorld (Conduit) apps
#[derive(Parser, Debug)]
#[command(name = "conduit-probe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only failures and the summary)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Color output (auto, always, never)
    #[arg(long, value_enum, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Configuration file (defaults to TEST_CONFIG, then ./conduit-probe.yaml)
    #[arg(short, long, global = true, env = "TEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the resolved configuration with passwords redacted
    Config(ConfigArgs),

    /// Run the built-in smoke scenarios against a live deployment
    Smoke(SmokeArgs),
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "yaml")]
    pub format: ConfigFormat,
}

/// Arguments for the smoke command
#[derive(Parser, Debug)]
pub struct SmokeArgs {
    /// Configured user that owns the fixtures
    #[arg(short, long, default_value = "alice")]
    pub user: String,

    /// Second user for authorization checks; those scenarios are skipped
    /// when absent from the configuration
    #[arg(long, default_value = "bob")]
    pub other_user: String,

    /// Also run the browser scenario (requires the `browser` feature)
    #[arg(long)]
    pub ui: bool,

    /// Report directory (overrides `report_dir` from the configuration)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the summary as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Serialization of the `config` command
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML, the configuration file format
    #[default]
    Yaml,
    /// JSON
    Json,
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl ColorArg {
    /// Resolve against the attached terminal
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::colors_enabled_stderr(),
        }
    }
}
