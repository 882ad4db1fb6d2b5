//! Constants used throughout skiff.
//!
//! Centralizes default paths, environment variable names, and exit codes.

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/skiff/skiff.toml";

/// Environment variable overriding the configuration path.
pub const CONFIG_ENV: &str = "SKIFF_CONFIG";

/// Environment variable holding the tracing filter.
pub const LOG_ENV: &str = "SKIFF_LOG";

/// Default append-only log file shared by every invocation.
pub const DEFAULT_LOG_FILE: &str = "/var/log/skiff.log";

/// Default run lock path.
pub const DEFAULT_LOCK_FILE: &str = "/run/skiff.lock";

/// Default cron.d file for the periodic trigger.
pub const DEFAULT_CRON_FILE: &str = "/etc/cron.d/skiff";

/// Default systemd unit directory.
pub const DEFAULT_SYSTEMD_DIR: &str = "/etc/systemd/system";

/// Name of the deferred bootstrap unit and of the periodic timer units.
pub const BOOTSTRAP_UNIT: &str = "skiff-bootstrap";
pub const TIMER_UNIT: &str = "skiff-sync";

/// Environment variable selecting the OCI CLI authentication mode.
pub const OCI_AUTH_ENV: &str = "OCI_CLI_AUTH";

/// Environment variable naming the rclone remote definitions file.
pub const RCLONE_CONFIG_ENV: &str = "RCLONE_CONFIG";

/// rclone's official installer, used when no `[[bootstrap.install]]` is configured.
pub const RCLONE_INSTALL_SCRIPT: &str = "curl -fsSL https://rclone.org/install.sh | bash";

/// Default chunk size for multipart uploads (64 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

/// Default number of concurrent chunk uploads.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;

/// Default interval between periodic runs, in minutes.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 30;

/// Staging directory for in-flight multipart uploads in filesystem stores.
pub const STAGING_DIR: &str = ".skiff-staging";

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// Secret content was unusable (sysexits `EX_DATAERR`).
pub const EXIT_DATA: i32 = 65;
/// Local I/O failure (sysexits `EX_IOERR`).
pub const EXIT_IO: i32 = 74;
/// Another run holds the lock (sysexits `EX_TEMPFAIL`).
pub const EXIT_ALREADY_RUNNING: i32 = 75;
/// Configuration problem (sysexits `EX_CONFIG`).
pub const EXIT_CONFIG: i32 = 78;
/// Run aborted by a panic.
pub const EXIT_PANIC: i32 = 101;
/// External tool could not be started.
pub const EXIT_TOOL_MISSING: i32 = 127;
