use clap::{Args, ValueEnum};
use std::path::PathBuf;

use redeploy::config::{self, Deployment};

use crate::output::ResponseMode;

pub type CmdResult<T> = redeploy::Result<(T, i32)>;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Path to the deployment config (JSON or TOML)
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

impl GlobalArgs {
    pub fn response_mode(&self) -> ResponseMode {
        match self.output {
            OutputFormat::Text => ResponseMode::Text,
            OutputFormat::Json => ResponseMode::Json,
        }
    }

    /// Load and resolve the deployment configuration once for this run.
    pub fn load_deployment(&self) -> redeploy::Result<(PathBuf, Deployment)> {
        let (path, deployment) = config::load_deployment(self.config.as_deref())?;
        crate::tty::status(&format!("Using configuration {}", path.display()));
        Ok((path, deployment))
    }
}

pub mod deploy;
pub mod plan;
pub mod probe;

/// Dispatch a command to its handler and print its result.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::emit($module::run($args, $global), $global.response_mode())
    };
}

pub(crate) fn run(command: crate::Commands, global: &GlobalArgs) -> i32 {
    match command {
        crate::Commands::Deploy(args) => dispatch!(args, global, deploy),
        crate::Commands::Plan(args) => dispatch!(args, global, plan),
        crate::Commands::Probe(args) => dispatch!(args, global, probe),
    }
}
