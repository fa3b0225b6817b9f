use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::channel::{self, RemoteChannel};
use crate::config::Deployment;
use crate::error::{Error, ErrorCode, Result};
use crate::health::{self, HealthCheckResult, HealthProbe, HttpProbe};
use crate::pipeline::{self, PipelineResult, StepOutcome};
use crate::target::DeploymentTarget;

#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Skip the post-deploy HTTP probe even when one is configured.
    pub skip_health: bool,
    /// Skip advisory status checks.
    pub skip_status_checks: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub transport: String,
    pub target: DeploymentTarget,
    pub pipeline: PipelineResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub status_checks: Vec<StepOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthCheckResult>,
}

impl DeployReport {
    /// Success is decided by the pipeline alone; checks and probes are advisory.
    pub fn success(&self) -> bool {
        self.pipeline.success
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.pipeline.error_code()
    }
}

/// Open the configured channel and run the whole deployment.
pub fn execute(deployment: &Deployment, options: &DeployOptions) -> Result<DeployReport> {
    let channel = channel::open(
        &deployment.transport,
        &deployment.target,
        deployment.connect_timeout,
    )?;
    Ok(run(deployment, channel.as_ref(), &HttpProbe, options))
}

/// Pipeline first; status checks and the health probe only after it succeeded.
pub fn run(
    deployment: &Deployment,
    channel: &dyn RemoteChannel,
    probe: &dyn HealthProbe,
    options: &DeployOptions,
) -> DeployReport {
    let started_at = Utc::now();

    let pipeline = pipeline::run_with_preflight(
        &deployment.steps,
        &deployment.target,
        channel,
        deployment.connect_timeout,
    );

    let mut status_checks = Vec::new();
    let mut health = None;

    if pipeline.success {
        if !options.skip_status_checks {
            status_checks =
                pipeline::run_status_checks(&deployment.status_checks, &deployment.target, channel);
        }
        if !options.skip_health {
            health = deployment
                .health
                .as_ref()
                .map(|spec| health::verify(spec, probe));
        }
    }

    DeployReport {
        run_id: Uuid::new_v4(),
        started_at,
        finished_at: Utc::now(),
        transport: channel.describe(),
        target: deployment.target.clone(),
        pipeline,
        status_checks,
        health,
    }
}

/// Run only the configured health check, without touching the target.
pub fn probe(deployment: &Deployment, probe: &dyn HealthProbe) -> Result<HealthCheckResult> {
    let spec = deployment.health.as_ref().ok_or_else(|| {
        Error::config_missing_key("health", None)
            .with_hint("Add a \"health\" section with at least a port or url")
    })?;
    Ok(health::verify(spec, probe))
}
