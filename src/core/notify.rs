//! Failure notifier.
//!
//! Publishes a short alert to a messaging topic when a run ends with a
//! non-zero exit code. Delivery is best effort: a failed publish is logged
//! and dropped, and [`Notifier::notify_if_failed`] has no error to return.

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::core::constants;
use crate::core::exec;
use crate::core::types::TopicRef;
use crate::error::NotificationError;

/// One failed run, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub exit_code: i32,
    pub host: String,
    pub message: String,
    pub topic: TopicRef,
    pub at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn title(&self) -> String {
        format!("skiff sync failed on {}", self.host)
    }

    pub fn body(&self) -> String {
        format!(
            "{}\n\nhost: {}\nexit code: {}\ntime: {}\n",
            self.message,
            self.host,
            self.exit_code,
            self.at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Delivers alerts to a topic.
pub trait Publisher {
    fn publish(&self, event: &AlertEvent) -> Result<(), NotificationError>;
}

/// Publisher backed by the OCI CLI (`oci ons message publish`).
#[derive(Debug, Clone)]
pub struct OciCliPublisher {
    binary: PathBuf,
}

impl OciCliPublisher {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Publisher for OciCliPublisher {
    fn publish(&self, event: &AlertEvent) -> Result<(), NotificationError> {
        let auth = event.topic.auth.as_str();
        let output = Command::new(&self.binary)
            .args(["ons", "message", "publish", "--topic-id"])
            .arg(&event.topic.id)
            .arg("--title")
            .arg(event.title())
            .arg("--body")
            .arg(event.body())
            .args(["--auth", auth])
            .env(constants::OCI_AUTH_ENV, auth)
            .stdin(Stdio::null())
            .output()
            .map_err(NotificationError::Spawn)?;

        if !output.status.success() {
            return Err(NotificationError::Rejected {
                code: exec::exit_code(output.status),
                reason: exec::last_line(&output.stderr),
            });
        }
        Ok(())
    }
}

/// Parse an exit code handed over as text (e.g. from a shell trap's `$?`).
///
/// Only well-formed non-negative integers are accepted.
pub fn parse_exit_code(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Decides whether to alert and hands the event to a [`Publisher`].
pub struct Notifier<'a> {
    publisher: &'a dyn Publisher,
}

impl<'a> Notifier<'a> {
    pub fn new(publisher: &'a dyn Publisher) -> Self {
        Self { publisher }
    }

    /// Alert if `exit_code` is non-zero and a topic is configured.
    ///
    /// Returns whether an alert was actually delivered, for logging and
    /// tests; callers must not treat `false` as a failure.
    pub fn notify_if_failed(
        &self,
        exit_code: i32,
        host: &str,
        topic: Option<&TopicRef>,
        message: &str,
    ) -> bool {
        if exit_code <= 0 {
            return false;
        }
        let Some(topic) = topic else {
            debug!(exit_code, "no notification topic configured, not alerting");
            return false;
        };

        let event = AlertEvent {
            exit_code,
            host: host.to_string(),
            message: message.to_string(),
            topic: topic.clone(),
            at: Utc::now(),
        };

        match self.publisher.publish(&event) {
            Ok(()) => {
                info!(exit_code, topic = %topic.id, "failure alert published");
                true
            }
            Err(e) => {
                warn!(exit_code, topic = %topic.id, error = %e, "failed to publish failure alert");
                false
            }
        }
    }
}
