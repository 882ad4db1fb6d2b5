//! skiff - Boot-safe one-way object storage mirror.

use clap::Parser;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use skiff::cli::output;
use skiff::cli::{execute, Cli};
use skiff::core::config::{Config, LogFormat};
use skiff::core::constants;
use skiff::error::{ConfigError, Error};

fn main() {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(cli.verbose, None);
            fail(&e);
        }
    };
    init_tracing(
        cli.verbose,
        Some((config.paths.log_file.as_path(), config.log_format)),
    );

    match execute(&cli, &config) {
        Ok(code) => std::process::exit(code),
        Err(e) => fail(&e),
    }
}

fn fail(e: &Error) -> ! {
    let suggestion = match e {
        Error::Config(ConfigError::NotFound(_)) => {
            Some("pass --config or set SKIFF_CONFIG".to_string())
        }
        Error::Config(_) => Some("run: skiff check".to_string()),
        Error::Sync(skiff::error::SyncError::Spawn { tool, .. }) => {
            Some(format!("is {} installed? run: skiff bootstrap", tool))
        }
        _ => None,
    };

    output::error(&e.to_string());
    if let Some(hint) = suggestion {
        output::hint(&hint);
    }
    std::process::exit(e.exit_code());
}

/// Stderr logging, plus an append-only log file shared by every invocation.
fn init_tracing(verbose: bool, log_file: Option<(&Path, LogFormat)>) {
    let filter = EnvFilter::try_from_env(constants::LOG_ENV).unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("skiff=debug")
        } else {
            EnvFilter::new("skiff=info")
        }
    });

    let file = log_file.and_then(|(path, format)| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some((Mutex::new(file), format)),
            Err(e) => {
                output::warn(&format!("cannot open log file {}: {}", path.display(), e));
                None
            }
        }
    });
    let (text_file, json_file) = match file {
        Some((writer, LogFormat::Text)) => (Some(writer), None),
        Some((writer, LogFormat::Json)) => (None, Some(writer)),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(text_file.map(|w| fmt::layer().with_ansi(false).with_writer(w)))
        .with(json_file.map(|w| fmt::layer().json().with_writer(w)))
        .init();
}
