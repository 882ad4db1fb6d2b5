//! skiff - Boot-safe one-way object storage mirror.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── run           # One mirror pass
//! │   ├── bootstrap     # Deferred launcher
//! │   ├── enable        # Install the deferred unit
//! │   ├── notify        # Alert entry point for shell traps
//! │   └── check         # Validate and show the plan
//! └── core/             # Core library components
//!     ├── config        # skiff.toml management
//!     ├── broker        # Secret fetch and decode
//!     ├── credential    # Zeroizing credential values
//!     ├── mirror/       # One-way mirror engines
//!     │   ├── mod       # Mirror trait
//!     │   ├── rclone    # rclone driver
//!     │   ├── native    # In-process checksum engine
//!     │   └── store     # Object store trait and backends
//!     ├── notify        # Failure alerts
//!     ├── lock          # Run lock
//!     ├── run           # Run pipeline and exit trap
//!     └── bootstrap/    # Readiness, install, schedule, deferred unit
//! ```
//!
//! # Features
//!
//! - Credentials fetched per run, held in zeroizing memory, injected into
//!   the transfer process only
//! - Checksum-based one-way mirror with bounded multipart concurrency
//! - Exactly one alert per failed run, none on success
//! - Idempotent bootstrap that survives the first-boot time budget

pub mod cli;
pub mod core;
pub mod error;
