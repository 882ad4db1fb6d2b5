//! Command-line interface.

pub mod bootstrap;
pub mod check;
pub mod enable;
pub mod notify;
pub mod output;
pub mod run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::core::broker::OciCliSecretStore;
use crate::core::config::Config;
use crate::core::constants;
use crate::core::mirror::{Engine, Mirror, NativeMirror, RcloneMirror};
use crate::core::notify::OciCliPublisher;
use crate::error::Result;

/// skiff - Boot-safe one-way object storage mirror.
#[derive(Parser)]
#[command(
    name = "skiff",
    about = "Boot-safe one-way object storage mirror driven by short-lived vault credentials",
    version
)]
pub struct Cli {
    /// Configuration file
    #[arg(
        short,
        long,
        global = true,
        env = constants::CONFIG_ENV,
        default_value = constants::DEFAULT_CONFIG_PATH
    )]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Fetch credentials and mirror the source to the destination once
    Run,

    /// Wait for readiness, install tools, register the schedule, run once
    Bootstrap,

    /// Install and start the deferred bootstrap unit
    Enable,

    /// Publish a failure alert for a finished run
    Notify {
        /// Exit code of the run being reported
        #[arg(long, allow_hyphen_values = true)]
        exit_code: String,
        /// Alert message
        #[arg(long, short)]
        message: Option<String>,
    },

    /// Validate the configuration and show what a run would do
    Check,
}

/// Execute a command and return the process exit code.
pub fn execute(cli: &Cli, config: &Config) -> Result<i32> {
    match &cli.command {
        Command::Run => run::execute(config),
        Command::Bootstrap => bootstrap::execute(config, &cli.config),
        Command::Enable => enable::execute(config, &cli.config),
        Command::Notify { exit_code, message } => {
            notify::execute(config, exit_code, message.as_deref())
        }
        Command::Check => check::execute(config, &cli.config),
    }
}

/// Collaborators every run needs, built from configuration.
pub(crate) struct Services {
    pub store: OciCliSecretStore,
    pub publisher: OciCliPublisher,
    pub mirror: Box<dyn Mirror>,
}

impl Services {
    pub(crate) fn from_config(config: &Config) -> Self {
        let mirror: Box<dyn Mirror> = match config.sync.engine {
            Engine::Rclone => Box::new(
                RcloneMirror::new(&config.tools.rclone)
                    .with_config(config.paths.rclone_config.clone())
                    .with_upload_backend(&config.sync.upload_backend),
            ),
            Engine::Native => Box::new(config.remotes.iter().fold(
                NativeMirror::new(),
                |mirror, (name, remote)| mirror.with_local_root(name, &remote.root),
            )),
        };

        Self {
            store: OciCliSecretStore::new(&config.tools.oci),
            publisher: OciCliPublisher::new(&config.tools.oci),
            mirror,
        }
    }
}
