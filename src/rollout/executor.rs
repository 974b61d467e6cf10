// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sequential execution of a rollout plan
//!
//! Each `kubectl` child is awaited before the next one is spawned. Its
//! standard streams are inherited so the operator sees kubectl's own output.

use std::process::ExitStatus;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::{Invocation, Manifest, RolloutPlan};

/// Exit status reported when `kubectl` could not be started at all
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Executor for rollout plans
pub struct RolloutExecutor {
    /// Whether to run in dry-run mode (no actual execution)
    dry_run: bool,
}

/// What happened to a single invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// kubectl exited successfully
    Applied,
    /// Dry run; nothing was executed
    Planned,
    /// kubectl exited unsuccessfully
    Failed { exit_code: i32 },
    /// kubectl could not be started
    SpawnFailed { message: String },
}

/// Result of executing a single invocation
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub manifest: Manifest,
    pub command_line: String,
    pub status: StepStatus,
    pub duration_ms: u64,
}

impl StepOutcome {
    pub fn success(&self) -> bool {
        matches!(self.status, StepStatus::Applied | StepStatus::Planned)
    }

    /// Process exit status this step maps to
    pub fn exit_code(&self) -> i32 {
        match &self.status {
            StepStatus::Applied | StepStatus::Planned => 0,
            StepStatus::Failed { exit_code } => *exit_code,
            StepStatus::SpawnFailed { .. } => SPAWN_FAILURE_EXIT_CODE,
        }
    }
}

/// Result of executing a complete plan
#[derive(Debug, Clone)]
pub struct RolloutReport {
    /// Namespace the plan targeted
    pub namespace: String,
    /// One entry per invocation that was attempted, in order
    pub steps: Vec<StepOutcome>,
    /// Total duration
    pub total_duration_ms: u64,
}

impl RolloutReport {
    /// True when every attempted step succeeded
    pub fn success(&self) -> bool {
        self.steps.iter().all(StepOutcome::success)
    }

    /// Zero on success, otherwise the failing step's exit status
    pub fn exit_code(&self) -> i32 {
        self.steps
            .iter()
            .find(|step| !step.success())
            .map(StepOutcome::exit_code)
            .unwrap_or(0)
    }

    /// The step that stopped the rollout, if any
    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|step| !step.success())
    }

    pub fn applied(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Applied)
            .count()
    }
}

impl RolloutExecutor {
    /// Create a new executor
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Execute a plan, stopping at the first failure
    pub async fn execute(&self, plan: &RolloutPlan) -> RolloutReport {
        let start_time = Instant::now();
        let namespace = plan.environment().namespace().to_string();
        let mut steps = Vec::with_capacity(plan.invocations().len());

        info!(
            namespace = %namespace,
            manifests = plan.invocations().len(),
            dry_run = self.dry_run,
            "Starting rollout"
        );

        for invocation in plan.invocations() {
            let outcome = self.execute_invocation(invocation).await;
            let stop = !outcome.success();

            if stop {
                error!(
                    manifest = %outcome.manifest,
                    namespace = %namespace,
                    status = outcome.exit_code(),
                    "Manifest failed to apply"
                );
            }

            steps.push(outcome);

            if stop {
                warn!("Stopping rollout due to failure");
                break;
            }
        }

        let report = RolloutReport {
            namespace,
            steps,
            total_duration_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            namespace = %report.namespace,
            success = report.success(),
            duration_ms = report.total_duration_ms,
            applied = report.applied(),
            "Rollout finished"
        );

        report
    }

    async fn execute_invocation(&self, invocation: &Invocation) -> StepOutcome {
        let start_time = Instant::now();
        let command_line = invocation.command_line();

        let status = if self.dry_run {
            info!(manifest = %invocation.manifest, "[DRY RUN] {}", command_line);
            StepStatus::Planned
        } else {
            info!(
                manifest = %invocation.manifest,
                path = %invocation.path.display(),
                "Applying manifest"
            );
            debug!(command = %command_line, "Spawning kubectl");

            match Command::new(&invocation.program)
                .args(&invocation.args)
                .status()
                .await
            {
                Ok(status) if status.success() => StepStatus::Applied,
                Ok(status) => StepStatus::Failed {
                    exit_code: exit_code_of(status),
                },
                Err(e) => StepStatus::SpawnFailed {
                    message: format!(
                        "failed to run {}: {}",
                        invocation.program.display(),
                        e
                    ),
                },
            }
        };

        StepOutcome {
            manifest: invocation.manifest,
            command_line,
            status,
            duration_ms: start_time.elapsed().as_millis() as u64,
        }
    }
}

/// Map a child's exit status to the status this process should exit with
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
