use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::channel::{RemoteChannel, Termination};
use crate::error::{ErrorCode, Result};
use crate::step::{DeploymentStep, StepPlan};
use crate::target::DeploymentTarget;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StepFailure {
    NonZeroExit { exit_code: i32 },
    Timeout { after_secs: u64 },
    ConnectionFailed { message: String },
}

impl StepFailure {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            StepFailure::NonZeroExit { .. } => ErrorCode::RemoteCommandFailed,
            StepFailure::Timeout { .. } => ErrorCode::RemoteCommandTimeout,
            StepFailure::ConnectionFailed { .. } => ErrorCode::SshConnectFailed,
        }
    }
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepFailure::NonZeroExit { exit_code } => write!(f, "exited with status {}", exit_code),
            StepFailure::Timeout { after_secs } => write!(f, "timed out after {} seconds", after_secs),
            StepFailure::ConnectionFailed { message } => write!(f, "connection failed: {}", message),
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Record of one executed step. Never modified after creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub position: usize,
    pub description: String,
    pub command: String,
    pub exit_code: Option<i32>,
    pub output: String,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PipelineStatus {
    Succeeded,
    FailedAt {
        position: usize,
        failure: StepFailure,
    },
    /// The target refused the connectivity check; no step was dispatched.
    ConnectionFailed { message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub outcomes: Vec<StepOutcome>,
    pub success: bool,
    pub status: PipelineStatus,
}

impl PipelineResult {
    pub fn failed_step(&self) -> Option<&StepOutcome> {
        match self.status {
            PipelineStatus::FailedAt { .. } => self.outcomes.last(),
            _ => None,
        }
    }

    /// Error code describing why the run failed, `None` on success.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match &self.status {
            PipelineStatus::Succeeded => None,
            PipelineStatus::FailedAt { failure, .. } => Some(failure.error_code()),
            PipelineStatus::ConnectionFailed { .. } => Some(ErrorCode::SshConnectFailed),
        }
    }
}

/// Render every step without executing anything.
pub fn plan(steps: &[DeploymentStep], target: &DeploymentTarget) -> Vec<StepPlan> {
    steps.iter().map(|step| step.plan(target)).collect()
}

/// Check connectivity, then run the steps.
pub fn run_with_preflight(
    steps: &[DeploymentStep],
    target: &DeploymentTarget,
    channel: &dyn RemoteChannel,
    connect_timeout: Duration,
) -> PipelineResult {
    log_status!("deploy", "Connecting via {}", channel.describe());
    if let Err(err) = channel.preflight(connect_timeout) {
        let message = match err.detail_error() {
            Some(detail) => format!("{}: {}", err.message, detail),
            None => err.message.clone(),
        };
        log_status!("deploy", "{}", message);
        return PipelineResult {
            outcomes: Vec::new(),
            success: false,
            status: PipelineStatus::ConnectionFailed { message },
        };
    }
    run(steps, target, channel)
}

/// Run `steps` in declared order, stopping at the first failure.
///
/// Nothing after a failed step is dispatched and nothing already applied is
/// undone.
pub fn run(
    steps: &[DeploymentStep],
    target: &DeploymentTarget,
    channel: &dyn RemoteChannel,
) -> PipelineResult {
    let total = steps.len();
    let mut outcomes = Vec::with_capacity(total);

    for step in steps {
        log_status!("deploy", "[{}/{}] {}", step.position, total, step.description);
        let outcome = execute_step(step, target, channel);

        if let Some(failure) = outcome.failure.clone() {
            log_status!("deploy", "[{}/{}] failed: {}", step.position, total, failure);
            let position = outcome.position;
            outcomes.push(outcome);
            return PipelineResult {
                outcomes,
                success: false,
                status: PipelineStatus::FailedAt { position, failure },
            };
        }

        outcomes.push(outcome);
    }

    PipelineResult {
        outcomes,
        success: true,
        status: PipelineStatus::Succeeded,
    }
}

/// Run advisory checks after a successful pipeline. Every check runs; their
/// results never change the deployment outcome.
pub fn run_status_checks(
    checks: &[DeploymentStep],
    target: &DeploymentTarget,
    channel: &dyn RemoteChannel,
) -> Vec<StepOutcome> {
    checks
        .iter()
        .map(|check| {
            log_status!("status", "{}", check.description);
            execute_step(check, target, channel)
        })
        .collect()
}

fn execute_step(
    step: &DeploymentStep,
    target: &DeploymentTarget,
    channel: &dyn RemoteChannel,
) -> StepOutcome {
    let rendered = step.render(target);
    let result: Result<_> =
        channel.execute_with_input(&rendered.command, rendered.stdin_file.as_deref(), step.timeout);

    let (exit_code, output, duration, failure) = match result {
        Ok(out) => {
            let failure = match out.termination {
                Termination::Exited(0) => None,
                Termination::Exited(code) => Some(StepFailure::NonZeroExit { exit_code: code }),
                Termination::TimedOut => Some(StepFailure::Timeout {
                    after_secs: step.timeout.as_secs(),
                }),
            };
            (out.exit_code(), out.output, out.duration, failure)
        }
        Err(err) => {
            let output = err
                .details
                .get("output")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let message = err
                .detail_error()
                .map(str::to_string)
                .unwrap_or_else(|| err.message.clone());
            (
                None,
                output,
                Duration::ZERO,
                Some(StepFailure::ConnectionFailed { message }),
            )
        }
    };

    StepOutcome {
        position: step.position,
        description: step.description.clone(),
        command: rendered.command,
        exit_code,
        output,
        duration,
        success: failure.is_none(),
        failure,
    }
}
