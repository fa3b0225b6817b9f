use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{deploy, plan, probe};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "redeploy")]
#[command(version = VERSION)]
#[command(about = "Push an update to a remote host, restart the service and verify it")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    /// Defaults to `deploy` when omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the deployment pipeline and verify the service
    Deploy(deploy::DeployArgs),
    /// Show the rendered steps without executing them
    #[command(visible_alias = "dry-run")]
    Plan(plan::PlanArgs),
    /// Run only the health probe against the configured endpoint
    Probe(probe::ProbeArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Deploy(deploy::DeployArgs::default()));

    let exit_code = commands::run(command, &cli.global);
    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
