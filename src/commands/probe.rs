use clap::Args;
use serde::Serialize;

use redeploy::deploy;
use redeploy::health::{HealthCheckResult, HttpProbe};
use redeploy::report;

use super::{CmdResult, GlobalArgs};
use crate::output::TextReport;

#[derive(Args, Debug, Default)]
pub struct ProbeArgs {
    /// Skip the configured grace period
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutput {
    pub command: String,
    pub health: HealthCheckResult,
}

impl TextReport for ProbeOutput {
    fn to_text(&self) -> String {
        report::render_health(&self.health)
    }
}

/// Probe the service without deploying. Always exits 0 once a probe ran:
/// the classification is advisory.
pub fn run(args: ProbeArgs, global: &GlobalArgs) -> CmdResult<ProbeOutput> {
    let (_, mut deployment) = global.load_deployment()?;
    if args.no_wait {
        if let Some(spec) = deployment.health.as_mut() {
            spec.grace = std::time::Duration::ZERO;
        }
    }

    let health = deploy::probe(&deployment, &HttpProbe)?;

    Ok((
        ProbeOutput {
            command: "deploy.probe".to_string(),
            health,
        },
        0,
    ))
}
