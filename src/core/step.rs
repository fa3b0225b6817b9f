use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::target::DeploymentTarget;
use crate::utils::shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    Normal,
    Elevated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// A command line for the remote shell. Opaque to the pipeline.
    Command(String),
    /// Stream a local file to `remote_path` over the channel's stdin.
    Upload {
        local_path: PathBuf,
        remote_path: String,
    },
}

/// One ordered unit of remote work. Built once from configuration and never
/// modified while the pipeline runs.
#[derive(Debug, Clone)]
pub struct DeploymentStep {
    /// 1-based position in the declared order.
    pub position: usize,
    pub description: String,
    pub action: StepAction,
    pub timeout: Duration,
    pub privilege: Privilege,
    /// Prefix the command with `cd <remote_dir> &&` when the target has one.
    pub in_remote_dir: bool,
}

/// The fully rendered form of a step, as handed to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStep {
    pub command: String,
    pub stdin_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepPlan {
    pub position: usize,
    pub description: String,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_from: Option<String>,
    pub timeout_secs: u64,
    pub privilege: Privilege,
}

impl DeploymentStep {
    pub fn render(&self, target: &DeploymentTarget) -> RenderedStep {
        let (base, stdin_file) = match &self.action {
            StepAction::Command(command) => (command.clone(), None),
            StepAction::Upload {
                local_path,
                remote_path,
            } => (
                format!("cat > {}", shell::quote_path(remote_path)),
                Some(local_path.clone()),
            ),
        };

        let located = match &target.remote_dir {
            Some(dir) if self.in_remote_dir && self.depends_on_cwd() => {
                shell::in_directory(dir, &base)
            }
            _ => base,
        };

        let command = match self.privilege {
            Privilege::Normal => located,
            Privilege::Elevated => shell::elevated(&located),
        };

        RenderedStep {
            command,
            stdin_file,
        }
    }

    /// Commands always run relative to the working directory; uploads only
    /// when the destination is a relative path.
    fn depends_on_cwd(&self) -> bool {
        match &self.action {
            StepAction::Command(_) => true,
            StepAction::Upload { remote_path, .. } => !remote_path.starts_with('/'),
        }
    }

    pub fn plan(&self, target: &DeploymentTarget) -> StepPlan {
        let rendered = self.render(target);
        StepPlan {
            position: self.position,
            description: self.description.clone(),
            command: rendered.command,
            upload_from: rendered
                .stdin_file
                .map(|p| p.to_string_lossy().to_string()),
            timeout_secs: self.timeout.as_secs(),
            privilege: self.privilege,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::CredentialRef;

    fn target(remote_dir: Option<&str>) -> DeploymentTarget {
        DeploymentTarget {
            host: "example.org".to_string(),
            user: "deploy".to_string(),
            port: 22,
            credential: CredentialRef::Agent,
            remote_dir: remote_dir.map(str::to_string),
        }
    }

    fn command_step(command: &str, privilege: Privilege) -> DeploymentStep {
        DeploymentStep {
            position: 1,
            description: "step".to_string(),
            action: StepAction::Command(command.to_string()),
            timeout: Duration::from_secs(60),
            privilege,
            in_remote_dir: true,
        }
    }

    #[test]
    fn command_runs_inside_remote_dir() {
        let step = command_step("npm install --production", Privilege::Normal);
        let rendered = step.render(&target(Some("/opt/app")));
        assert_eq!(rendered.command, "cd '/opt/app' && npm install --production");
        assert_eq!(rendered.stdin_file, None);
    }

    #[test]
    fn command_without_remote_dir_is_unchanged() {
        let step = command_step("uptime", Privilege::Normal);
        assert_eq!(step.render(&target(None)).command, "uptime");
    }

    #[test]
    fn elevated_command_wraps_directory_change() {
        let step = command_step("systemctl restart app", Privilege::Elevated);
        assert_eq!(
            step.render(&target(Some("/opt/app"))).command,
            "sudo -n sh -c 'cd '\\''/opt/app'\\'' && systemctl restart app'"
        );
    }

    #[test]
    fn upload_reads_local_file_into_remote_path() {
        let step = DeploymentStep {
            position: 1,
            description: "Copy server.js".to_string(),
            action: StepAction::Upload {
                local_path: PathBuf::from("server.js"),
                remote_path: "/tmp/server.js".to_string(),
            },
            timeout: Duration::from_secs(120),
            privilege: Privilege::Normal,
            in_remote_dir: true,
        };
        let rendered = step.render(&target(Some("/opt/app")));
        assert_eq!(rendered.command, "cat > '/tmp/server.js'");
        assert_eq!(rendered.stdin_file, Some(PathBuf::from("server.js")));

        let plan = step.plan(&target(None));
        assert_eq!(plan.upload_from.as_deref(), Some("server.js"));
        assert_eq!(plan.timeout_secs, 120);
    }

    #[test]
    fn relative_upload_lands_in_remote_dir() {
        let mut step = DeploymentStep {
            position: 2,
            description: "Copy env".to_string(),
            action: StepAction::Upload {
                local_path: PathBuf::from(".env.production"),
                remote_path: ".env".to_string(),
            },
            timeout: Duration::from_secs(30),
            privilege: Privilege::Normal,
            in_remote_dir: true,
        };
        assert_eq!(
            step.render(&target(Some("/opt/app"))).command,
            "cd '/opt/app' && cat > '.env'"
        );

        step.in_remote_dir = false;
        assert_eq!(step.render(&target(Some("/opt/app"))).command, "cat > '.env'");
    }
}
