use clap::Args;
use serde::Serialize;

use redeploy::channel;
use redeploy::pipeline;
use redeploy::report;
use redeploy::step::StepPlan;

use super::{CmdResult, GlobalArgs};
use crate::output::TextReport;

#[derive(Args, Debug, Default)]
pub struct PlanArgs {
    /// Include the advisory status checks in the listing
    #[arg(long)]
    pub with_status_checks: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutput {
    pub command: String,
    pub config_path: String,
    pub target: String,
    pub transport: String,
    pub steps: Vec<StepPlan>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub status_checks: Vec<StepPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_url: Option<String>,
}

impl TextReport for PlanOutput {
    fn to_text(&self) -> String {
        let mut text = report::render_plan(&self.target, &self.transport, &self.steps);
        if !self.status_checks.is_empty() {
            text.push_str("\nStatus checks (advisory):\n");
            text.push_str(&report::render_plan(&self.target, &self.transport, &self.status_checks));
        }
        if let Some(url) = &self.health_url {
            text.push_str(&format!("\nHealth probe: GET {}\n", url));
        }
        text
    }
}

/// List what `deploy` would run, without connecting to the target.
pub fn run(args: PlanArgs, global: &GlobalArgs) -> CmdResult<PlanOutput> {
    let (config_path, deployment) = global.load_deployment()?;
    let channel = channel::open(
        &deployment.transport,
        &deployment.target,
        deployment.connect_timeout,
    )?;

    let status_checks = if args.with_status_checks {
        pipeline::plan(&deployment.status_checks, &deployment.target)
    } else {
        Vec::new()
    };

    Ok((
        PlanOutput {
            command: "deploy.plan".to_string(),
            config_path: config_path.to_string_lossy().to_string(),
            target: deployment.target.address(),
            transport: channel.describe(),
            steps: pipeline::plan(&deployment.steps, &deployment.target),
            status_checks,
            health_url: deployment.health.as_ref().map(|h| h.url.clone()),
        },
        0,
    ))
}
