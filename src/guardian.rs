use crate::config::GuardConfig;
use crate::diagnostics;
use crate::notify::Notifier;
use crate::probe::{Probe, ProbeOutcome};
use crate::restart_log;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Longest grace delay before the first probe; shorter poll intervals
/// shorten it further.
const MAX_GRACE_DELAY: Duration = Duration::from_secs(5);

/// How much of the aggregated diagnostics output goes into the timeout
/// notification.
const DIAGNOSTICS_PREFIX_CHARS: usize = 1500;

/// Terminal outcome of a guardian run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Healthy,
    TimedOut,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Healthy => 0,
            RunOutcome::TimedOut => 1,
        }
    }
}

/// Poll the probe until it reports healthy or the deadline elapses.
///
/// Waits `min(5s, poll_interval)` before the first probe so the gateway
/// has a moment to begin its restart. Elapsed time is wall-clock from
/// loop start; the deadline check reuses the elapsed value computed at
/// the top of the iteration, so a probe that straddles the deadline
/// still gets its answer honored.
pub async fn poll_until_settled<P: Probe>(
    probe: &P,
    poll_interval: Duration,
    timeout: Duration,
) -> RunOutcome {
    let start = Instant::now();
    tokio::time::sleep(MAX_GRACE_DELAY.min(poll_interval)).await;

    loop {
        let elapsed = start.elapsed();

        match probe.check().await {
            ProbeOutcome::Healthy => return RunOutcome::Healthy,
            outcome => {
                debug!(
                    ?outcome,
                    elapsed_secs = elapsed.as_secs(),
                    "gateway not healthy yet"
                );
            }
        }

        if elapsed > timeout {
            return RunOutcome::TimedOut;
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// The watchdog: owns the immutable config, the resolved openclaw
/// binary, and the notifier, and drives one run to a terminal state.
pub struct Guardian {
    config: GuardConfig,
    oc_bin: Option<PathBuf>,
    notifier: Notifier,
}

impl Guardian {
    pub fn new(config: GuardConfig, oc_bin: Option<PathBuf>, notifier: Notifier) -> Self {
        Self {
            config,
            oc_bin,
            notifier,
        }
    }

    /// Run the loop and perform the terminal actions for its outcome:
    /// append a log entry, notify, remove the lock file. Returns the
    /// process exit code (0 healthy, 1 timed out).
    pub async fn run<P: Probe>(&self, probe: &P) -> i32 {
        let timeout_secs = self.config.guardian.timeout;
        let poll_interval = Duration::from_secs(self.config.guardian.poll_interval);
        info!(
            timeout_secs,
            poll_interval_secs = self.config.guardian.poll_interval,
            "guardian started"
        );

        let outcome =
            poll_until_settled(probe, poll_interval, Duration::from_secs(timeout_secs)).await;

        match outcome {
            RunOutcome::Healthy => {
                info!("gateway is healthy after restart");
                self.log_outcome("ok", "gateway healthy");
                let message = "✅ OpenClaw restart succeeded.\nGateway is healthy and ready.";
                self.notifier.dispatch(message).await;
            }
            RunOutcome::TimedOut => {
                warn!(timeout_secs, "gateway did not become healthy in time");
                self.log_outcome(
                    "timeout",
                    &format!("gateway not healthy after {timeout_secs}s"),
                );
                let diag = diagnostics::collect(
                    self.oc_bin.as_deref(),
                    &self.config.guardian.diagnostics,
                )
                .await;
                let message = format!(
                    "❌ OpenClaw restart timed out ({timeout_secs}s).\n\
                     Gateway did not become healthy.\n\n\
                     Diagnostics:\n{}",
                    prefix_chars(&diag, DIAGNOSTICS_PREFIX_CHARS)
                );
                self.notifier.dispatch(&message).await;
            }
        }

        cleanup_lock(&self.config.paths.lock_file);
        outcome.exit_code()
    }

    fn log_outcome(&self, result: &str, note: &str) {
        if let Err(e) = restart_log::append(&self.config.paths.restart_log, result, note) {
            warn!(
                error = %e,
                path = %self.config.paths.restart_log.display(),
                "failed to append restart log entry"
            );
        }
    }
}

/// Remove the lock file; a missing file is not an error.
fn cleanup_lock(lock_path: &Path) {
    if let Err(e) = std::fs::remove_file(lock_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(error = %e, path = %lock_path.display(), "failed to remove lock file");
        }
    }
}

fn prefix_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
