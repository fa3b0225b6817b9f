use clap::Args;
use serde::Serialize;

use redeploy::deploy::{self, DeployOptions, DeployReport};
use redeploy::report;

use super::{CmdResult, GlobalArgs};
use crate::output::{exit_code_for_error, TextReport};

#[derive(Args, Debug, Default)]
pub struct DeployArgs {
    /// Do not probe the service after the pipeline succeeds
    #[arg(long)]
    pub skip_health: bool,

    /// Do not run the advisory status checks
    #[arg(long)]
    pub skip_status_checks: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutput {
    pub command: String,
    pub config_path: String,
    pub success: bool,
    pub report: DeployReport,
}

impl TextReport for DeployOutput {
    fn to_text(&self) -> String {
        report::render(&self.report)
    }
}

pub fn run(args: DeployArgs, global: &GlobalArgs) -> CmdResult<DeployOutput> {
    let (config_path, deployment) = global.load_deployment()?;

    let options = DeployOptions {
        skip_health: args.skip_health,
        skip_status_checks: args.skip_status_checks,
    };
    let report = deploy::execute(&deployment, &options)?;

    let exit_code = report.error_code().map(exit_code_for_error).unwrap_or(0);

    Ok((
        DeployOutput {
            command: "deploy.run".to_string(),
            config_path: config_path.to_string_lossy().to_string(),
            success: report.success(),
            report,
        },
        exit_code,
    ))
}
