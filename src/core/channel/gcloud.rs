use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::ssh;
use super::{process, ChannelOutput, RemoteChannel, Termination};
use crate::config::GcloudSettings;
use crate::error::{Error, Result};
use crate::target::DeploymentTarget;

/// Prefix gcloud puts on its own errors (auth, unknown instance, bad zone).
const GCLOUD_ERROR_MARKER: &str = "ERROR: (gcloud.";

/// Runs commands through `gcloud compute ssh`, the cloud-managed SSH proxy.
pub struct GcloudChannel {
    settings: GcloudSettings,
    user: String,
    connect_timeout: Duration,
}

impl GcloudChannel {
    pub fn new(settings: GcloudSettings, target: &DeploymentTarget, connect_timeout: Duration) -> Self {
        Self {
            settings,
            user: target.user.clone(),
            connect_timeout,
        }
    }

    fn destination(&self) -> String {
        if self.user.is_empty() {
            self.settings.instance.clone()
        } else {
            format!("{}@{}", self.user, self.settings.instance)
        }
    }

    pub(crate) fn build_args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "compute".to_string(),
            "ssh".to_string(),
            self.destination(),
            format!("--zone={}", self.settings.zone),
        ];

        if let Some(project) = &self.settings.project {
            args.push(format!("--project={}", project));
        }

        args.extend([
            "--quiet".to_string(),
            format!("--command={}", command),
            "--".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
        ]);

        args
    }
}

impl RemoteChannel for GcloudChannel {
    fn describe(&self) -> String {
        format!(
            "gcloud compute ssh {} (zone {})",
            self.destination(),
            self.settings.zone
        )
    }

    fn execute_with_input(
        &self,
        command: &str,
        stdin_file: Option<&Path>,
        timeout: Duration,
    ) -> Result<ChannelOutput> {
        let mut cmd = Command::new(&self.settings.gcloud_path);
        cmd.args(self.build_args(command));

        let out = process::run(cmd, stdin_file, timeout).map_err(|e| {
            Error::ssh_connect_failed(self.describe(), format!("gcloud error: {}", e), "")
                .with_hint("Install the Google Cloud SDK or set transport.gcloudPath")
        })?;

        if is_connection_failure(&out) {
            return Err(Error::ssh_connect_failed(
                self.describe(),
                "gcloud could not open an SSH session",
                out.output,
            ));
        }

        Ok(out)
    }
}

fn is_connection_failure(out: &ChannelOutput) -> bool {
    if ssh::is_connection_failure(out) {
        return true;
    }
    match out.termination {
        Termination::Exited(code) if code != 0 => out.output.contains(GCLOUD_ERROR_MARKER),
        _ => false,
    }
}
