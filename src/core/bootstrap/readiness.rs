//! Readiness wait.
//!
//! Replaces a blind boot-time sleep: wait an optional minimum delay, then
//! poll a probe until it reports ready or the maximum wait elapses.

use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Something that can tell whether the machine is ready for work.
pub trait Probe {
    fn describe(&self) -> String;
    fn is_ready(&self) -> bool;
}

/// Ready once a TCP connection to `address` succeeds.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Probe for TcpProbe {
    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }

    fn is_ready(&self) -> bool {
        // Name resolution failing counts as not ready: DNS is part of what we wait for.
        let addrs = match self.address.to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                trace!(address = %self.address, error = %e, "probe address did not resolve");
                return false;
            }
        };
        addrs
            .into_iter()
            .any(|addr| TcpStream::connect_timeout(&addr, self.connect_timeout).is_ok())
    }
}

/// How long to defer and how to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub min_delay: Duration,
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

/// Block until `probe` is ready or `policy.max_wait` has elapsed since the
/// minimum delay ended.
///
/// Returns `false` on timeout. Callers log and proceed; a late network is
/// reported by the steps that need it.
pub fn wait_until_ready(probe: &dyn Probe, policy: &ReadinessPolicy) -> bool {
    if !policy.min_delay.is_zero() {
        debug!(delay_ms = policy.min_delay.as_millis() as u64, "deferring");
        thread::sleep(policy.min_delay);
    }

    let target = probe.describe();
    let started = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        if probe.is_ready() {
            info!(probe = %target, attempts, "ready");
            return true;
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.max_wait {
            warn!(
                probe = %target,
                attempts,
                waited_ms = elapsed.as_millis() as u64,
                "readiness wait timed out, proceeding"
            );
            return false;
        }
        thread::sleep(policy.poll_interval.min(policy.max_wait - elapsed));
    }
}
