use std::{io, sync::Arc, time::Duration};

use futures::future;
use tokio::time::Instant;

use crate::{
    constants::{DRAIN_TIMEOUT, KILL_GRACE_PERIOD},
    core::{
        capture::Capture,
        domain::{ResolvedRunConfig, RunConfig, RunDefaults, RunResult},
        report::Outcome,
        sandbox::SandboxSpec,
        traits::{
            launcher::{SandboxLauncher, SandboxProcess},
            runner::SubmissionRunner,
        },
    },
};

#[derive(Clone, Debug)]
pub struct SupervisorSettings {
    pub defaults: RunDefaults,
    pub grace_period: Duration,
    /// How long to keep reading output after the process is gone.
    pub drain_timeout: Duration,
    /// Per-stream cap on captured bytes, `None` for unbounded.
    pub capture_limit: Option<usize>,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            defaults: RunDefaults::default(),
            grace_period: KILL_GRACE_PERIOD,
            drain_timeout: DRAIN_TIMEOUT,
            capture_limit: None,
        }
    }
}

/// Launches one sandbox per run, enforces the timeout and turns whatever
/// happened into a [`RunResult`].
#[derive(Clone, Debug)]
pub struct Supervisor {
    launcher: Arc<dyn SandboxLauncher>,
    settings: SupervisorSettings,
}

#[async_trait::async_trait]
impl SubmissionRunner for Supervisor {
    #[tracing::instrument(skip_all)]
    async fn run(&self, config: RunConfig) -> RunResult {
        let config = config.resolve(&self.settings.defaults);
        let instance = config.instance_name.clone();

        let started = Instant::now();
        let outcome = self.supervise(&config).await;
        let result = RunResult::from_outcome(outcome, started.elapsed());

        tracing::info!(
            instance = %instance,
            success = result.success,
            exit_code = result.exit_code,
            timed_out = result.timed_out,
            score = ?result.score,
            elapsed = result.execution_time_seconds,
            "Run finished"
        );
        result
    }
}

impl Supervisor {
    pub fn new(launcher: Arc<dyn SandboxLauncher>, settings: SupervisorSettings) -> Self {
        Self { launcher, settings }
    }

    async fn supervise(&self, config: &ResolvedRunConfig) -> Outcome {
        let spec = SandboxSpec::from_config(config);
        tracing::debug!(?spec, "Launching sandbox");

        let mut process = match self.launcher.launch(&spec).await {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(instance = %spec.instance_name, error = %e, "Failed to launch sandbox");
                return Outcome::LaunchFailed {
                    message: format!("Failed to launch sandbox: {e}"),
                };
            }
        };

        let stdout_stream = process.take_stdout();
        let stderr_stream = process.take_stderr();
        let mut stdout = Capture::new(self.settings.capture_limit);
        let mut stderr = Capture::new(self.settings.capture_limit);

        let observation = {
            let drain = future::join(
                stdout.fill(stdout_stream, "stdout"),
                stderr.fill(stderr_stream, "stderr"),
            );
            tokio::pin!(drain);
            let exit = watch_exit(
                &mut *process,
                config.timeout(),
                self.settings.grace_period,
            );
            tokio::pin!(exit);

            let mut drained = false;
            let observation = loop {
                tokio::select! {
                    observation = &mut exit => break observation,
                    _ = &mut drain, if !drained => drained = true,
                }
            };

            // Grandchildren may still hold the pipes open.
            if !drained
                && tokio::time::timeout(self.settings.drain_timeout, &mut drain)
                    .await
                    .is_err()
            {
                tracing::warn!(
                    instance = %spec.instance_name,
                    "Sandbox output still open after exit, dropping the rest"
                );
            }
            observation
        };

        match observation.status {
            Err(e) => {
                tracing::error!(instance = %spec.instance_name, error = %e, "Failed to wait for sandbox");
                Outcome::LaunchFailed {
                    message: format!("Failed to wait for sandbox: {e}"),
                }
            }
            Ok(_) if observation.stage != TerminationStage::Running => Outcome::TimedOut {
                timeout_seconds: config.timeout_seconds.get(),
                stdout,
            },
            Ok(exit_code) => Outcome::Exited {
                exit_code,
                stdout,
                stderr,
            },
        }
    }
}

/// Where the timeout escalation stood when the process exited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationStage {
    Running,
    TimeoutSignaled,
    ForceKilled,
}

#[derive(Debug)]
pub struct ExitObservation {
    pub status: io::Result<i32>,
    pub stage: TerminationStage,
}

/// Waits for `process` to exit. After `timeout` it is sent SIGTERM, and
/// after a further `grace` SIGKILL. Pending timers die with the exit.
///
/// A duration too large to be represented as an [`Instant`] never expires.
pub async fn watch_exit(
    process: &mut dyn SandboxProcess,
    timeout: Duration,
    grace: Duration,
) -> ExitObservation {
    let mut stage = TerminationStage::Running;
    let mut deadline = Instant::now().checked_add(timeout);

    loop {
        let timer = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => future::pending().await,
            }
        };

        tokio::select! {
            status = process.wait() => return ExitObservation { status, stage },
            () = timer => match stage {
                TerminationStage::Running => {
                    tracing::warn!(?timeout, "Sandbox timed out, sending SIGTERM");
                    if let Err(e) = process.terminate() {
                        tracing::warn!(error = %e, "Failed to send SIGTERM");
                    }
                    stage = TerminationStage::TimeoutSignaled;
                    deadline = Instant::now().checked_add(grace);
                }
                TerminationStage::TimeoutSignaled => {
                    tracing::warn!(?grace, "Sandbox ignored SIGTERM, sending SIGKILL");
                    if let Err(e) = process.kill() {
                        tracing::warn!(error = %e, "Failed to send SIGKILL");
                    }
                    stage = TerminationStage::ForceKilled;
                    deadline = None;
                }
                TerminationStage::ForceKilled => deadline = None,
            },
        }
    }
}
