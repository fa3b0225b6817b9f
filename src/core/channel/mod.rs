//! Remote execution channels.
//!
//! A channel runs one command at a time on the deployment target and returns
//! its combined output and how it terminated. Connection and authentication
//! problems are the only errors; a non-zero exit or a timeout is a normal
//! [`ChannelOutput`] that the pipeline turns into a failed step.

mod gcloud;
mod local;
mod process;
mod ssh;

pub use gcloud::GcloudChannel;
pub use local::LocalChannel;
pub use ssh::SshChannel;

use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::config::Transport;
use crate::error::{Error, Result};
use crate::target::{CredentialRef, DeploymentTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "code")]
pub enum Termination {
    Exited(i32),
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct ChannelOutput {
    pub termination: Termination,
    /// stdout and stderr interleaved in arrival order.
    pub output: String,
    pub duration: Duration,
}

impl ChannelOutput {
    pub fn exit_code(&self) -> Option<i32> {
        match self.termination {
            Termination::Exited(code) => Some(code),
            Termination::TimedOut => None,
        }
    }
}

/// Deadline policy shared by every transport: the bound is exclusive, so a
/// command has to finish strictly before `timeout` to count as exited.
pub fn within_deadline(elapsed: Duration, timeout: Duration) -> bool {
    elapsed < timeout
}

pub trait RemoteChannel {
    /// Human label of the transport and destination. Never includes credentials.
    fn describe(&self) -> String;

    /// Run `command`, feeding `stdin_file` to it when given.
    ///
    /// Blocks until the command exits or `timeout` elapses. Never retries.
    fn execute_with_input(
        &self,
        command: &str,
        stdin_file: Option<&Path>,
        timeout: Duration,
    ) -> Result<ChannelOutput>;

    fn execute(&self, command: &str, timeout: Duration) -> Result<ChannelOutput> {
        self.execute_with_input(command, None, timeout)
    }

    /// Verify that the target accepts a session before any step runs.
    fn preflight(&self, timeout: Duration) -> Result<()> {
        let out = self.execute("true", timeout)?;
        match out.termination {
            Termination::Exited(0) => Ok(()),
            Termination::Exited(code) => Err(Error::ssh_connect_failed(
                self.describe(),
                format!("connectivity check exited with status {}", code),
                out.output,
            )),
            Termination::TimedOut => Err(Error::ssh_connect_failed(
                self.describe(),
                format!("connectivity check timed out after {}s", timeout.as_secs()),
                out.output,
            )),
        }
    }
}

/// Build the channel selected by configuration.
///
/// An ssh transport pointed at this machine runs commands directly, but only
/// for a plain `localhost:22` target with no user or identity file. Anything
/// else on a loopback address may be a forwarded port and goes through ssh.
pub fn open(
    transport: &Transport,
    target: &DeploymentTarget,
    connect_timeout: Duration,
) -> Result<Box<dyn RemoteChannel>> {
    match transport {
        Transport::Local => Ok(Box::new(LocalChannel::new())),
        Transport::Ssh if runs_locally(target) => {
            log_status!(
                "channel",
                "Target '{}' is localhost, using local execution",
                target.host
            );
            Ok(Box::new(LocalChannel::new()))
        }
        Transport::Ssh => Ok(Box::new(SshChannel::new(target, connect_timeout)?)),
        Transport::Gcloud(settings) => Ok(Box::new(GcloudChannel::new(
            settings.clone(),
            target,
            connect_timeout,
        ))),
    }
}

fn runs_locally(target: &DeploymentTarget) -> bool {
    target.is_local()
        && target.port == 22
        && target.user.is_empty()
        && target.credential == CredentialRef::Agent
}
