//! Core library components.
//!
//! The reusable orchestration logic: credential brokering, mirroring,
//! failure alerts, the run pipeline, and the bootstrap launcher.

pub mod bootstrap;
pub mod broker;
pub mod config;
pub mod constants;
pub mod credential;
pub mod exec;
pub mod lock;
pub mod mirror;
pub mod notify;
pub mod run;
pub mod types;
