use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::{process, ChannelOutput, RemoteChannel, Termination};
use crate::error::{Error, Result};
use crate::target::{CredentialRef, DeploymentTarget};

/// ssh reserves this exit status for its own failures (auth, network).
const SSH_CONNECTION_EXIT: i32 = 255;

pub struct SshChannel {
    pub host: String,
    pub user: String,
    pub port: u16,
    identity_file: Option<String>,
    connect_timeout: Duration,
}

impl SshChannel {
    pub fn new(target: &DeploymentTarget, connect_timeout: Duration) -> Result<Self> {
        let identity_file = match &target.credential {
            CredentialRef::IdentityFile(path) => {
                let expanded = shellexpand::tilde(&path.to_string_lossy()).to_string();
                if !Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(expanded));
                }
                Some(expanded)
            }
            CredentialRef::Agent => None,
        };

        Ok(Self {
            host: target.host.clone(),
            user: target.user.clone(),
            port: target.port,
            identity_file,
            connect_timeout,
        })
    }

    pub(crate) fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Never stop at a password or host-key prompt; keepalives catch
        // stalled connections that the step timeout would otherwise absorb.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        if self.user.is_empty() {
            args.push(self.host.clone());
        } else {
            args.push(format!("{}@{}", self.user, self.host));
        }
        args.push(command.to_string());

        args
    }
}

impl RemoteChannel for SshChannel {
    fn describe(&self) -> String {
        if self.user.is_empty() {
            format!("ssh {}:{}", self.host, self.port)
        } else {
            format!("ssh {}@{}:{}", self.user, self.host, self.port)
        }
    }

    fn execute_with_input(
        &self,
        command: &str,
        stdin_file: Option<&Path>,
        timeout: Duration,
    ) -> Result<ChannelOutput> {
        let mut cmd = Command::new("ssh");
        cmd.args(self.build_ssh_args(command));

        let out = process::run(cmd, stdin_file, timeout).map_err(|e| {
            Error::ssh_connect_failed(self.describe(), format!("SSH error: {}", e), "")
                .with_hint("Make sure the OpenSSH client is installed and on PATH")
        })?;

        if is_connection_failure(&out) {
            return Err(Error::ssh_connect_failed(
                self.describe(),
                "ssh exited with status 255",
                out.output,
            ));
        }

        Ok(out)
    }
}

/// True when ssh itself failed rather than the remote command.
pub(super) fn is_connection_failure(out: &ChannelOutput) -> bool {
    out.termination == Termination::Exited(SSH_CONNECTION_EXIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exited(code: i32) -> ChannelOutput {
        ChannelOutput {
            termination: Termination::Exited(code),
            output: String::new(),
            duration: Duration::from_millis(5),
        }
    }

    fn channel(port: u16, identity_file: Option<&str>) -> SshChannel {
        SshChannel {
            host: "10.12.40.105".to_string(),
            user: "deploy".to_string(),
            port,
            identity_file: identity_file.map(str::to_string),
            connect_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn args_run_in_batch_mode_with_command_last() {
        let args = channel(22, None).build_ssh_args("git pull origin main");
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=10".to_string()));
        assert!(!args.contains(&"-p".to_string()));
        assert_eq!(args[args.len() - 2], "deploy@10.12.40.105");
        assert_eq!(args[args.len() - 1], "git pull origin main");
    }

    #[test]
    fn args_include_port_and_identity() {
        let args = channel(2222, Some("/keys/deploy")).build_ssh_args("true");
        assert_eq!(&args[..4], &["-i", "/keys/deploy", "-p", "2222"]);
    }

    #[test]
    fn description_hides_identity_file() {
        let description = channel(22, Some("/keys/deploy")).describe();
        assert_eq!(description, "ssh deploy@10.12.40.105:22");
    }

    #[test]
    fn status_255_is_a_connection_failure() {
        assert!(is_connection_failure(&exited(255)));
    }

    #[test]
    fn other_statuses_belong_to_the_remote_command() {
        assert!(!is_connection_failure(&exited(0)));
        assert!(!is_connection_failure(&exited(1)));
        assert!(!is_connection_failure(&exited(254)));
        assert!(!is_connection_failure(&ChannelOutput {
            termination: Termination::TimedOut,
            output: String::new(),
            duration: Duration::from_secs(1),
        }));
    }

    #[test]
    fn missing_identity_file_is_rejected() {
        let target = DeploymentTarget {
            host: "example.org".to_string(),
            user: "deploy".to_string(),
            port: 22,
            credential: CredentialRef::IdentityFile("/nonexistent/redeploy_key".into()),
            remote_dir: None,
        };
        let err = SshChannel::new(&target, Duration::from_secs(5))
            .err()
            .expect("identity file should be checked");
        assert_eq!(err.code, crate::error::ErrorCode::SshIdentityFileNotFound);
    }
}
