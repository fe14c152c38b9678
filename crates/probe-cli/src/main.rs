//! conduit-probe: smoke runner for RealWorld (Conduit) deployments
//!
//! ## Usage
//!
//! ```bash
//! conduit-probe config                      # Show the resolved configuration
//! conduit-probe smoke                       # REST smoke scenarios
//! conduit-probe smoke --ui                  # ...plus the browser scenario
//! conduit-probe -c staging.yaml smoke -o out --json
//! ```
//!
//! Exit status is 0 when every scenario passed or was skipped, 1 when a
//! scenario failed, and 2 when the run could not start.

use clap::Parser;
use conduit_probe::logging::{self, LogFormat};
use conduit_probe::EnvironmentConfig;
use conduit_probe_cli::{
    render_config, run_smoke, summary_line, Cli, CliError, CliResult, Commands, ConfigArgs,
    ProgressReporter, SmokeArgs,
};
use std::process::ExitCode;
use std::time::Duration;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init(format, cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_test_failure() => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = EnvironmentConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Config(args) => run_config(&config, &args),
        Commands::Smoke(args) => {
            let out = ProgressReporter::new(cli.color.should_color(), cli.quiet);
            run_smoke_command(&config, &args, out)
        }
    }
}

fn run_config(config: &EnvironmentConfig, args: &ConfigArgs) -> CliResult<()> {
    print!("{}", render_config(config, args.format)?);
    Ok(())
}

fn run_smoke_command(
    config: &EnvironmentConfig,
    args: &SmokeArgs,
    mut out: ProgressReporter,
) -> CliResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(run_smoke(config, args, &mut out))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !out.quiet || !summary.is_success() {
        println!(
            "{}",
            summary_line(
                summary.passed,
                summary.failed,
                summary.skipped,
                Duration::from_millis(summary.duration_ms),
                out.use_color,
            )
        );
        out.info(&format!("HTML report: {}", summary.html_report.display()));
        out.info(&format!("JSON report: {}", summary.json_report.display()));
    }

    if summary.is_success() {
        Ok(())
    } else {
        Err(CliError::SmokeFailed {
            failed: summary.failed,
            total: summary.total,
        })
    }
}
