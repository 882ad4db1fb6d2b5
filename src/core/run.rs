//! Run orchestration.
//!
//! One run is a fixed, fail-fast pipeline:
//!
//! ```text
//! Start ─▶ Lock ─▶ FetchCredential[1..n] ─▶ Sync ─▶ Exit
//!   │                                                ▲
//!   └── ExitTrap armed ── fires exactly once ────────┘
//! ```
//!
//! Finding another run in progress is the one way out that disarms the
//! trap. The first failing step decides the exit code. The trap hands that code
//! to the notifier whether the run succeeded, failed at any step, or
//! unwound from a panic; the notifier only alerts on non-zero codes.

use std::fmt;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::core::broker::{CredentialBroker, SecretStore};
use crate::core::constants;
use crate::core::credential::CredentialSet;
use crate::core::lock::RunLock;
use crate::core::mirror::{Mirror, SyncJob, SyncReport};
use crate::core::notify::{Notifier, Publisher};
use crate::core::types::{SecretRef, TopicRef};
use crate::error::{Error, LockError};

/// A secret to fetch and the environment variable it is exported as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSpec {
    pub env: String,
    pub secret: SecretRef,
}

/// Everything a run needs from configuration.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub credentials: Vec<CredentialSpec>,
    pub job: SyncJob,
    pub host: String,
    pub topic: Option<TopicRef>,
    /// `None` disables the run lock.
    pub lock_file: Option<PathBuf>,
}

/// Pipeline step, for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Lock,
    FetchCredential(String),
    Sync,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Lock => f.write_str("acquiring run lock"),
            Step::FetchCredential(env) => write!(f, "fetching {}", env),
            Step::Sync => f.write_str("sync"),
        }
    }
}

/// Result of one run.
#[derive(Debug)]
pub struct RunOutcome {
    pub exit_code: i32,
    /// The failing step and its error, if any.
    pub failure: Option<(Step, Error)>,
    pub report: Option<SyncReport>,
    pub alerted: bool,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == constants::EXIT_SUCCESS
    }
}

/// Calls the notifier exactly once: explicitly via [`ExitTrap::fire`], or
/// from `Drop` if the run unwinds before reaching it.
struct ExitTrap<'a> {
    notifier: Notifier<'a>,
    host: &'a str,
    topic: Option<&'a TopicRef>,
    fired: bool,
}

impl<'a> ExitTrap<'a> {
    fn arm(publisher: &'a dyn Publisher, host: &'a str, topic: Option<&'a TopicRef>) -> Self {
        Self {
            notifier: Notifier::new(publisher),
            host,
            topic,
            fired: false,
        }
    }

    /// Leave without notifying.
    fn disarm(mut self) {
        self.fired = true;
    }

    fn fire(mut self, exit_code: i32, message: &str) -> bool {
        self.fired = true;
        self.notifier
            .notify_if_failed(exit_code, self.host, self.topic, message)
    }
}

impl Drop for ExitTrap<'_> {
    fn drop(&mut self) {
        if !self.fired {
            self.notifier.notify_if_failed(
                constants::EXIT_PANIC,
                self.host,
                self.topic,
                "run aborted unexpectedly",
            );
        }
    }
}

/// Composes broker, mirror, and notifier into a run.
pub struct Runner<'a> {
    store: &'a dyn SecretStore,
    mirror: &'a dyn Mirror,
    publisher: &'a dyn Publisher,
}

impl<'a> Runner<'a> {
    pub fn new(
        store: &'a dyn SecretStore,
        mirror: &'a dyn Mirror,
        publisher: &'a dyn Publisher,
    ) -> Self {
        Self {
            store,
            mirror,
            publisher,
        }
    }

    /// Execute one run and report its exit code.
    ///
    /// A run that finds another one in progress exits with
    /// `EXIT_ALREADY_RUNNING` and does not alert: the run holding the lock
    /// reports its own outcome.
    pub fn execute(&self, plan: &RunPlan) -> RunOutcome {
        let trap = ExitTrap::arm(self.publisher, &plan.host, plan.topic.as_ref());

        let _lock = match plan.lock_file.as_deref().map(RunLock::acquire).transpose() {
            Ok(lock) => lock,
            Err(e @ LockError::AlreadyRunning(_)) => {
                trap.disarm();
                let err = Error::from(e);
                warn!(error = %err, "run skipped");
                return RunOutcome {
                    exit_code: err.exit_code(),
                    failure: None,
                    report: None,
                    alerted: false,
                };
            }
            Err(e) => return failed(trap, Step::Lock, e.into()),
        };

        info!(
            engine = self.mirror.name(),
            source = %plan.job.source,
            destination = %plan.job.destination,
            "run started"
        );

        match self.pipeline(plan) {
            Ok(report) => {
                info!("run finished");
                let alerted = trap.fire(constants::EXIT_SUCCESS, "sync completed");
                RunOutcome {
                    exit_code: constants::EXIT_SUCCESS,
                    failure: None,
                    report: Some(report),
                    alerted,
                }
            }
            Err((step, err)) => failed(trap, step, err),
        }
    }

    fn pipeline(&self, plan: &RunPlan) -> Result<SyncReport, (Step, Error)> {
        let broker = CredentialBroker::new(self.store);
        let mut credentials = CredentialSet::new();

        for spec in &plan.credentials {
            let credential = broker
                .fetch(&spec.secret)
                .map_err(|e| (Step::FetchCredential(spec.env.clone()), e.into()))?;
            credentials.insert(spec.env.clone(), credential);
        }

        self.mirror
            .sync(&plan.job, &credentials)
            .map_err(|e| (Step::Sync, e.into()))
    }
}

fn failed(trap: ExitTrap<'_>, step: Step, err: Error) -> RunOutcome {
    let exit_code = err.exit_code();
    error!(step = %step, exit_code, error = %err, "run failed");
    let alerted = trap.fire(exit_code, &format!("{} failed: {}", step, err));
    RunOutcome {
        exit_code,
        failure: Some((step, err)),
        report: None,
        alerted,
    }
}
