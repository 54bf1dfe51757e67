//! K2S CLI - Kinesis to object storage buffering tool.

use anyhow::Result;
use clap::{Parser, Subcommand};
use k2s_core::config::LogFormat;
use k2s_core::{Config, InvocationFailure};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit codes for CLI operations.
///
/// Following Unix conventions:
/// - 0: Success
/// - 1-127: Application errors
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// Configuration error (invalid config file, bad override, failed validation)
    ConfigError = 1,
    /// Storage error (flush failure, sink setup, listing)
    StorageError = 4,
    /// General runtime error
    RuntimeError = 10,
}

impl ExitCode {
    /// Map an error to an exit code.
    ///
    /// Core errors are matched by variant; anything else falls back to
    /// inspecting the message.
    fn from_error(error: &anyhow::Error) -> Self {
        if error.downcast_ref::<InvocationFailure>().is_some() {
            return ExitCode::StorageError;
        }

        if let Some(core) = error.downcast_ref::<k2s_core::Error>() {
            return match core {
                k2s_core::Error::Config(_) => ExitCode::ConfigError,
                k2s_core::Error::Flush(_) | k2s_core::Error::Storage(_) => ExitCode::StorageError,
                _ => ExitCode::RuntimeError,
            };
        }

        let error_str = error.to_string().to_lowercase();
        if error_str.contains("config") || error_str.contains("toml") {
            ExitCode::ConfigError
        } else if error_str.contains("storage") || error_str.contains("s3") {
            ExitCode::StorageError
        } else {
            ExitCode::RuntimeError
        }
    }
}

mod commands;

#[derive(Parser)]
#[command(name = "k2s")]
#[command(about = "Buffer Kinesis records into windows and flush them to object storage", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one invocation over an event document
    Ingest(commands::ingest::IngestArgs),

    /// Validate configuration
    Validate,

    /// List artifacts in the sink
    Audit {
        /// Key prefix to list (defaults to the configured prefix)
        #[arg(long)]
        prefix: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let exit_code = run_cli().await;
    std::process::exit(exit_code as i32);
}

/// Main CLI execution logic with proper error handling.
async fn run_cli() -> ExitCode {
    let cli = Cli::parse();

    // Log settings come from the config file when it parses; otherwise defaults
    let monitoring = cli
        .config
        .as_deref()
        .and_then(|path| Config::from_file(path).ok())
        .map(|config| config.monitoring)
        .unwrap_or_default();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new(monitoring.log_level.as_str()),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // stdout carries command output, logs go to stderr
    match monitoring.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }

    let result = execute_command(cli).await;

    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            if !logged_at_source(&e) {
                tracing::error!(error = %e, "Command failed");
            }
            ExitCode::from_error(&e)
        }
    }
}

/// Flush failures are logged by the engine when it aborts the invocation.
fn logged_at_source(error: &anyhow::Error) -> bool {
    error.downcast_ref::<InvocationFailure>().is_some()
}

/// Execute the CLI command.
async fn execute_command(cli: Cli) -> Result<()> {
    // Validation is left to each command so command-line overrides land first
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest(args) => {
            commands::ingest::run(config, args).await?;
        }

        Commands::Validate => {
            commands::validate::run(&config)?;
        }

        Commands::Audit { prefix } => {
            commands::audit::run(config, prefix).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k2s_core::FlushError;

    #[test]
    fn test_exit_code_from_core_errors() {
        let config = anyhow::Error::new(k2s_core::Error::Config("missing".into()));
        assert_eq!(ExitCode::from_error(&config), ExitCode::ConfigError);

        let storage = anyhow::Error::new(k2s_core::Error::Storage("denied".into()));
        assert_eq!(ExitCode::from_error(&storage), ExitCode::StorageError);

        let failure = anyhow::Error::new(InvocationFailure {
            error: k2s_core::Error::Flush(FlushError::Serialization("bad".into())),
            records_processed: 1,
            flushes_performed: 0,
            malformed_records: 0,
        });
        assert_eq!(ExitCode::from_error(&failure), ExitCode::StorageError);
    }

    #[test]
    fn test_exit_code_fallback() {
        let other = anyhow::anyhow!("event document is empty");
        assert_eq!(ExitCode::from_error(&other), ExitCode::RuntimeError);

        let config = anyhow::anyhow!("bad config value");
        assert_eq!(ExitCode::from_error(&config), ExitCode::ConfigError);
    }

    #[test]
    fn test_only_unlogged_errors_reported() {
        let failure = anyhow::Error::new(InvocationFailure {
            error: k2s_core::Error::Storage("denied".into()),
            records_processed: 0,
            flushes_performed: 0,
            malformed_records: 0,
        });
        assert!(logged_at_source(&failure));

        let config = anyhow::Error::new(k2s_core::Error::Config("missing".into()));
        assert!(!logged_at_source(&config));
        assert!(!logged_at_source(&anyhow::anyhow!("event document is empty")));
    }

    #[test]
    fn test_cli_parses_ingest() {
        let cli = Cli::try_parse_from([
            "k2s",
            "--config",
            "k2s.toml",
            "ingest",
            "--event",
            "-",
            "--size-threshold",
            "2048",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("k2s.toml")));
        match cli.command {
            Commands::Ingest(args) => {
                assert_eq!(args.event.as_deref(), Some(std::path::Path::new("-")));
                assert_eq!(args.size_threshold, Some(2048));
                assert_eq!(args.time_threshold, None);
            }
            _ => panic!("expected ingest"),
        }
    }
}
