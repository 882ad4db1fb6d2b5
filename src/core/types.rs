//! Domain value types.
//!
//! Small validated types shared by the broker, mirror, notifier, and
//! bootstrap launcher. All are immutable once built from configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, SyncError};

/// Ambient (keyless) identity used for secret store and topic calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Identity of the compute instance.
    #[default]
    InstancePrincipal,
    /// Identity of the enclosing function or job resource.
    ResourcePrincipal,
}

impl AuthMode {
    /// Value understood by the OCI CLI `--auth` flag and `OCI_CLI_AUTH`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InstancePrincipal => "instance_principal",
            Self::ResourcePrincipal => "resource_principal",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a stored secret plus the mode used to fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub id: String,
    pub auth: AuthMode,
}

impl SecretRef {
    pub fn new(id: impl Into<String>, auth: AuthMode) -> Self {
        Self {
            id: id.into(),
            auth,
        }
    }
}

/// Notification topic identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRef {
    pub id: String,
    pub auth: AuthMode,
}

/// A `remote:container[/prefix]` address.
///
/// The remote name is resolved against rclone's remote definitions (or the
/// `[remotes]` table for the native engine). The prefix never has leading or
/// trailing slashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    pub remote: String,
    pub container: String,
    pub prefix: Option<String>,
}

impl FromStr for RemotePath {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SyncError::InvalidRemote(s.to_string());

        let (remote, path) = s.split_once(':').ok_or_else(invalid)?;
        if remote.is_empty()
            || !remote
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid());
        }

        let path = path.trim_matches('/');
        let (container, prefix) = match path.split_once('/') {
            Some((c, p)) => (c, Some(p)),
            None => (path, None),
        };
        if container.is_empty() || prefix.is_some_and(|p| p.split('/').any(|seg| seg.is_empty()))
        {
            return Err(invalid());
        }

        Ok(Self {
            remote: remote.to_string(),
            container: container.to_string(),
            prefix: prefix.map(str::to_string),
        })
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.remote, self.container)?;
        if let Some(prefix) = &self.prefix {
            write!(f, "/{}", prefix)?;
        }
        Ok(())
    }
}

/// A byte count written with an optional binary suffix (`64M`, `512Ki`, `1G`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn bytes(&self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Invalid(format!("invalid size: {:?}", s));
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, suffix) = s.split_at(split);
        let value: u64 = digits.parse().map_err(|_| invalid())?;

        let multiplier: u64 = match suffix.trim_end_matches('B').trim_end_matches('i') {
            "" => 1,
            "K" | "k" => 1 << 10,
            "M" | "m" => 1 << 20,
            "G" | "g" => 1 << 30,
            _ => return Err(invalid()),
        };

        value
            .checked_mul(multiplier)
            .filter(|v| *v > 0)
            .map(ByteSize)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for ByteSize {
    /// Renders in the largest binary unit that divides evenly, as rclone accepts it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(u64, &str); 3] = [(1 << 30, "G"), (1 << 20, "M"), (1 << 10, "K")];
        for (size, unit) in UNITS {
            if self.0 >= size && self.0 % size == 0 {
                return write!(f, "{}{}", self.0 / size, unit);
            }
        }
        write!(f, "{}B", self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(0) => Err(serde::de::Error::custom("size must be greater than zero")),
            Raw::Int(n) => Ok(ByteSize(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Interval between periodic runs, in whole minutes.
///
/// Only intervals expressible by both cron and systemd calendar syntax are
/// accepted: a minute step below an hour, whole hours below a
/// day, or exactly one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    minutes: u32,
}

impl Interval {
    pub fn from_minutes(minutes: u32) -> Result<Self, ConfigError> {
        let ok = matches!(minutes, 1..=59)
            || (minutes >= 60 && minutes % 60 == 0 && minutes / 60 < 24)
            || minutes == 24 * 60;
        if !ok {
            return Err(ConfigError::Invalid(format!(
                "interval_minutes must be 1-59, a whole number of hours, or 1440 (got {})",
                minutes
            )));
        }
        Ok(Self { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    /// Five-field cron expression.
    pub fn cron_expr(&self) -> String {
        match self.minutes {
            m if m < 60 => format!("*/{} * * * *", m),
            1440 => "0 0 * * *".to_string(),
            m => format!("0 */{} * * *", m / 60),
        }
    }

    /// systemd `OnCalendar=` expression.
    pub fn on_calendar(&self) -> String {
        match self.minutes {
            m if m < 60 => format!("*:0/{}", m),
            1440 => "daily".to_string(),
            m => format!("0/{}:00", m / 60),
        }
    }
}
