#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::time::Duration;

use redeploy::channel::{ChannelOutput, RemoteChannel, Termination};
use redeploy::config::{Deployment, Transport};
use redeploy::health::{HealthCheckSpec, HealthProbe, ProbeResponse};
use redeploy::step::{DeploymentStep, Privilege, StepAction};
use redeploy::target::{CredentialRef, DeploymentTarget};
use redeploy::{Error, Result};

/// Channel that answers from a fixed script and records what was dispatched.
/// The connectivity check (`true`) is answered separately.
pub struct ScriptedChannel {
    pub preflight: Option<Error>,
    replies: RefCell<Vec<Result<ChannelOutput>>>,
    pub dispatched: RefCell<Vec<String>>,
}

impl ScriptedChannel {
    pub fn new(mut replies: Vec<Result<ChannelOutput>>) -> Self {
        replies.reverse();
        Self {
            preflight: None,
            replies: RefCell::new(replies),
            dispatched: RefCell::new(Vec::new()),
        }
    }

    pub fn unreachable(err: Error) -> Self {
        let mut channel = Self::new(Vec::new());
        channel.preflight = Some(err);
        channel
    }

    pub fn step_commands(&self) -> Vec<String> {
        self.dispatched
            .borrow()
            .iter()
            .filter(|c| c.as_str() != "true")
            .cloned()
            .collect()
    }
}

impl RemoteChannel for ScriptedChannel {
    fn describe(&self) -> String {
        "scripted channel".to_string()
    }

    fn execute_with_input(
        &self,
        command: &str,
        _stdin_file: Option<&Path>,
        _timeout: Duration,
    ) -> Result<ChannelOutput> {
        self.dispatched.borrow_mut().push(command.to_string());
        if command == "true" {
            return match &self.preflight {
                Some(err) => Err(err.clone()),
                None => Ok(exited(0, "")),
            };
        }
        self.replies
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| Ok(exited(0, "")))
    }
}

pub struct CountingProbe {
    pub response: std::result::Result<ProbeResponse, String>,
    pub calls: Cell<u32>,
}

impl CountingProbe {
    pub fn body(body: &str) -> Self {
        Self {
            response: Ok(ProbeResponse {
                status: 200,
                body: body.to_string(),
            }),
            calls: Cell::new(0),
        }
    }
}

impl HealthProbe for CountingProbe {
    fn fetch(&self, _url: &str, _timeout: Duration) -> std::result::Result<ProbeResponse, String> {
        self.calls.set(self.calls.get() + 1);
        self.response.clone()
    }
}

pub fn exited(code: i32, output: &str) -> ChannelOutput {
    ChannelOutput {
        termination: Termination::Exited(code),
        output: output.to_string(),
        duration: Duration::from_millis(10),
    }
}

pub fn target() -> DeploymentTarget {
    DeploymentTarget {
        host: "10.12.40.105".to_string(),
        user: "deploy".to_string(),
        port: 22,
        credential: CredentialRef::Agent,
        remote_dir: Some("/opt/app".to_string()),
    }
}

pub fn steps(count: usize) -> Vec<DeploymentStep> {
    (1..=count)
        .map(|position| DeploymentStep {
            position,
            description: format!("step {}", position),
            action: StepAction::Command(format!("echo step-{}", position)),
            timeout: Duration::from_secs(30),
            privilege: Privilege::Normal,
            in_remote_dir: false,
        })
        .collect()
}

pub fn health_spec(url: &str) -> HealthCheckSpec {
    HealthCheckSpec {
        url: url.to_string(),
        marker: "Hospital Militar".to_string(),
        grace: Duration::ZERO,
        timeout: Duration::from_secs(2),
        attempts: 1,
        interval: Duration::ZERO,
    }
}

pub fn deployment(step_count: usize, health: Option<HealthCheckSpec>) -> Deployment {
    Deployment {
        target: target(),
        transport: Transport::Ssh,
        connect_timeout: Duration::from_secs(5),
        steps: steps(step_count),
        status_checks: Vec::new(),
        health,
    }
}
