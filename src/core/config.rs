//! Deployment configuration.
//!
//! One file (JSON or TOML) describes the target, the transport, the ordered
//! steps and the health check. It is loaded once at process start, patched
//! with environment overrides and resolved into a [`Deployment`] that the
//! pipeline and the health verifier borrow for the whole run.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::health::HealthCheckSpec;
use crate::paths;
use crate::step::{DeploymentStep, Privilege, StepAction};
use crate::target::{CredentialRef, DeploymentTarget};
use crate::utils::template::{self, TemplateVars};

pub const ENV_HOST: &str = "REDEPLOY_HOST";
pub const ENV_USER: &str = "REDEPLOY_USER";
pub const ENV_IDENTITY_FILE: &str = "REDEPLOY_IDENTITY_FILE";
pub const ENV_REMOTE_DIR: &str = "REDEPLOY_REMOTE_DIR";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    pub target: TargetConfig,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_step_timeout")]
    pub default_step_timeout_secs: u64,
    pub steps: Vec<StepConfig>,
    /// Advisory commands run after a successful pipeline.
    #[serde(default)]
    pub status_checks: Vec<StepConfig>,
    #[serde(default)]
    pub health: Option<HealthConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub identity_file: Option<String>,
    #[serde(default)]
    pub remote_dir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Ssh,
    Gcloud(GcloudSettings),
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcloudSettings {
    pub instance: String,
    pub zone: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_gcloud_path")]
    pub gcloud_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub upload: Option<UploadConfig>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub elevated: bool,
    #[serde(default = "default_true")]
    pub in_remote_dir: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfig {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub marker: String,
    #[serde(default = "default_grace")]
    pub grace_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_step_timeout() -> u64 {
    120
}

fn default_gcloud_path() -> String {
    "gcloud".to_string()
}

fn default_true() -> bool {
    true
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

fn default_grace() -> u64 {
    3
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_attempts() -> u32 {
    1
}

fn default_interval() -> u64 {
    2
}

/// A fully resolved deployment, built once per run.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub target: DeploymentTarget,
    pub transport: Transport,
    pub connect_timeout: Duration,
    pub steps: Vec<DeploymentStep>,
    pub status_checks: Vec<DeploymentStep>,
    pub health: Option<HealthCheckSpec>,
}

// ============================================================================
// Loading
// ============================================================================

/// Find the configuration file: the explicit path if given, otherwise the
/// first existing search candidate.
pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string());
        if !expanded.is_file() {
            return Err(Error::config_not_found(vec![expanded
                .to_string_lossy()
                .to_string()]));
        }
        return Ok(expanded);
    }

    let candidates = paths::search_candidates();
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| {
            Error::config_not_found(
                candidates
                    .iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect(),
            )
        })
}

pub fn load(path: &Path) -> Result<DeployConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;
    parse(&raw, path)
}

/// Parse configuration text. The format follows the file extension; anything
/// other than `.toml` is read as JSON.
pub fn parse(raw: &str, path: &Path) -> Result<DeployConfig> {
    let display = path.to_string_lossy().to_string();
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(raw).map_err(|e| Error::config_parse_failed(display, e.to_string()))
    } else {
        serde_json::from_str(raw).map_err(|e| Error::config_parse_failed(display, e.to_string()))
    }
}

/// Locate, load, override from the process environment and resolve.
pub fn load_deployment(explicit: Option<&Path>) -> Result<(PathBuf, Deployment)> {
    let path = locate(explicit)?;
    let mut config = load(&path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let deployment = config.resolve(base_dir)?;
    Ok((path, deployment))
}

// ============================================================================
// Resolution
// ============================================================================

impl DeployConfig {
    /// Replace target fields with values from the environment. Empty values
    /// are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get(ENV_HOST) {
            self.target.host = host;
        }
        if let Some(user) = get(ENV_USER) {
            self.target.user = user;
        }
        if let Some(identity_file) = get(ENV_IDENTITY_FILE) {
            self.target.identity_file = Some(identity_file);
        }
        if let Some(remote_dir) = get(ENV_REMOTE_DIR) {
            self.target.remote_dir = Some(remote_dir);
        }
    }

    /// Validate and build the runtime model. Relative upload sources are
    /// resolved against `base_dir`.
    pub fn resolve(&self, base_dir: &Path) -> Result<Deployment> {
        let target = self.resolve_target()?;

        if self.steps.is_empty() {
            return Err(Error::config_missing_key("steps", None)
                .with_hint("Declare at least one step, e.g. {\"command\": \"git pull\"}"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(Error::config_invalid_value(
                "connectTimeoutSecs",
                Some("0".to_string()),
                "must be greater than zero",
            ));
        }
        if self.default_step_timeout_secs == 0 {
            return Err(Error::config_invalid_value(
                "defaultStepTimeoutSecs",
                Some("0".to_string()),
                "must be greater than zero",
            ));
        }
        if let Transport::Gcloud(settings) = &self.transport {
            if settings.instance.trim().is_empty() || settings.zone.trim().is_empty() {
                return Err(Error::config_invalid_value(
                    "transport",
                    None,
                    "gcloud transport needs both instance and zone",
                ));
            }
        }

        let steps = self.resolve_steps("steps", &self.steps, &target, base_dir)?;
        let status_checks =
            self.resolve_steps("statusChecks", &self.status_checks, &target, base_dir)?;
        let health = self
            .health
            .as_ref()
            .map(|h| resolve_health(h, &target))
            .transpose()?;

        Ok(Deployment {
            target,
            transport: self.transport.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            steps,
            status_checks,
            health,
        })
    }

    fn resolve_target(&self) -> Result<DeploymentTarget> {
        let t = &self.target;
        if t.host.trim().is_empty() {
            return Err(Error::config_missing_key("target.host", None)
                .with_hint(format!("Set it in the config file or via {}", ENV_HOST)));
        }

        let credential = match &t.identity_file {
            Some(path) if !path.trim().is_empty() => {
                CredentialRef::IdentityFile(PathBuf::from(shellexpand::tilde(path).to_string()))
            }
            _ => CredentialRef::Agent,
        };

        Ok(DeploymentTarget {
            host: t.host.trim().to_string(),
            user: t.user.trim().to_string(),
            port: t.port,
            credential,
            remote_dir: t
                .remote_dir
                .as_ref()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        })
    }

    fn resolve_steps(
        &self,
        field: &str,
        configs: &[StepConfig],
        target: &DeploymentTarget,
        base_dir: &Path,
    ) -> Result<Vec<DeploymentStep>> {
        configs
            .iter()
            .enumerate()
            .map(|(idx, config)| {
                let key = format!("{}[{}]", field, idx);
                let action = resolve_action(&key, config, target, base_dir)?;

                let timeout_secs = config
                    .timeout_secs
                    .unwrap_or(self.default_step_timeout_secs);
                if timeout_secs == 0 {
                    return Err(Error::config_invalid_value(
                        format!("{}.timeoutSecs", key),
                        Some("0".to_string()),
                        "must be greater than zero",
                    ));
                }

                let description = config
                    .description
                    .as_ref()
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| default_description(&action));

                Ok(DeploymentStep {
                    position: idx + 1,
                    description,
                    action,
                    timeout: Duration::from_secs(timeout_secs),
                    privilege: if config.elevated {
                        Privilege::Elevated
                    } else {
                        Privilege::Normal
                    },
                    in_remote_dir: config.in_remote_dir,
                })
            })
            .collect()
    }
}

fn template_vars(target: &DeploymentTarget) -> Vec<(&'static str, String)> {
    vec![
        (TemplateVars::HOST, target.host.clone()),
        (TemplateVars::USER, target.user.clone()),
        (TemplateVars::PORT, target.port.to_string()),
        (
            TemplateVars::REMOTE_DIR,
            target.remote_dir.clone().unwrap_or_default(),
        ),
    ]
}

fn render_for(target: &DeploymentTarget, text: &str) -> String {
    let vars = template_vars(target);
    let pairs: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
    template::render(text, &pairs)
}

fn resolve_action(
    key: &str,
    config: &StepConfig,
    target: &DeploymentTarget,
    base_dir: &Path,
) -> Result<StepAction> {
    match (&config.command, &config.upload) {
        (Some(command), None) => {
            if command.trim().is_empty() {
                return Err(Error::config_invalid_value(
                    format!("{}.command", key),
                    None,
                    "command must not be empty",
                ));
            }
            if target.remote_dir.is_none() && template::is_present(command, TemplateVars::REMOTE_DIR) {
                return Err(Error::config_missing_key("target.remoteDir", None)
                    .with_hint(format!("{}.command uses {{{{remoteDir}}}}", key)));
            }
            Ok(StepAction::Command(render_for(target, command.trim())))
        }
        (None, Some(upload)) => {
            let local = PathBuf::from(shellexpand::tilde(&upload.from).to_string());
            let local_path = if local.is_absolute() {
                local
            } else {
                base_dir.join(local)
            };
            if !local_path.is_file() {
                return Err(Error::config_invalid_value(
                    format!("{}.upload.from", key),
                    Some(local_path.to_string_lossy().to_string()),
                    "local file does not exist",
                ));
            }
            if upload.to.trim().is_empty() {
                return Err(Error::config_invalid_value(
                    format!("{}.upload.to", key),
                    None,
                    "remote path must not be empty",
                ));
            }
            Ok(StepAction::Upload {
                local_path,
                remote_path: render_for(target, upload.to.trim()),
            })
        }
        (Some(_), Some(_)) => Err(Error::config_invalid_value(
            key,
            None,
            "a step takes either command or upload, not both",
        )),
        (None, None) => Err(Error::config_missing_key(format!("{}.command", key), None)),
    }
}

fn default_description(action: &StepAction) -> String {
    match action {
        StepAction::Command(command) => command.clone(),
        StepAction::Upload {
            local_path,
            remote_path,
        } => format!("Upload {} to {}", local_path.display(), remote_path),
    }
}

/// IPv6 literals need brackets inside a URL authority.
fn url_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

fn resolve_health(config: &HealthConfig, target: &DeploymentTarget) -> Result<HealthCheckSpec> {
    if config.timeout_secs == 0 {
        return Err(Error::config_invalid_value(
            "health.timeoutSecs",
            Some("0".to_string()),
            "must be greater than zero",
        ));
    }
    if config.attempts == 0 {
        return Err(Error::config_invalid_value(
            "health.attempts",
            Some("0".to_string()),
            "must be at least 1",
        ));
    }

    let url = match &config.url {
        Some(url) if !url.trim().is_empty() => render_for(target, url.trim()),
        _ => {
            let scheme = config.scheme.trim().to_lowercase();
            let port = config.port.unwrap_or(if scheme == "https" { 443 } else { 80 });
            let path = if config.path.starts_with('/') {
                config.path.clone()
            } else {
                format!("/{}", config.path)
            };
            format!("{}://{}:{}{}", scheme, url_host(&target.host), port, path)
        }
    };

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Error::config_invalid_value(
            "health.url",
            Some(url),
            "health probe URL must use http or https",
        ));
    }

    Ok(HealthCheckSpec {
        url,
        marker: config.marker.clone(),
        grace: Duration::from_secs(config.grace_secs),
        timeout: Duration::from_secs(config.timeout_secs),
        attempts: config.attempts,
        interval: Duration::from_secs(config.interval_secs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const SAMPLE: &str = r#"{
        "target": {
            "host": "10.12.40.105",
            "user": "sistema",
            "remoteDir": "/opt/hmasp/chat"
        },
        "steps": [
            { "description": "Pull code", "command": "git pull origin main" },
            { "command": "npm install --production", "timeoutSecs": 300 },
            { "description": "Restart", "command": "systemctl restart chat", "elevated": true, "inRemoteDir": false }
        ],
        "statusChecks": [
            { "command": "systemctl status chat --no-pager | head -20", "elevated": true }
        ],
        "health": { "port": 3000, "marker": "Hospital Militar" }
    }"#;

    fn sample() -> DeployConfig {
        parse(SAMPLE, Path::new("redeploy.json")).unwrap()
    }

    #[test]
    fn resolves_steps_in_declared_order() {
        let deployment = sample().resolve(Path::new(".")).unwrap();
        let positions: Vec<usize> = deployment.steps.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(deployment.steps[1].description, "npm install --production");
        assert_eq!(deployment.steps[0].timeout, Duration::from_secs(120));
        assert_eq!(deployment.steps[1].timeout, Duration::from_secs(300));
        assert_eq!(deployment.steps[2].privilege, Privilege::Elevated);
        assert!(!deployment.steps[2].in_remote_dir);
        assert_eq!(deployment.status_checks.len(), 1);
        assert_eq!(deployment.transport, Transport::Ssh);
    }

    #[test]
    fn derives_health_url_from_target() {
        let deployment = sample().resolve(Path::new(".")).unwrap();
        let health = deployment.health.unwrap();
        assert_eq!(health.url, "http://10.12.40.105:3000/");
        assert_eq!(health.marker, "Hospital Militar");
        assert_eq!(health.grace, Duration::from_secs(3));
        assert_eq!(health.attempts, 1);
    }

    #[test]
    fn brackets_ipv6_host_in_derived_health_url() {
        let raw = r#"{
            "target": { "host": "fd00::12" },
            "steps": [ { "command": "true" } ],
            "health": { "port": 3000, "path": "status" }
        }"#;
        let deployment = parse(raw, Path::new("c.json"))
            .unwrap()
            .resolve(Path::new("."))
            .unwrap();
        assert_eq!(deployment.health.unwrap().url, "http://[fd00::12]:3000/status");
        assert_eq!(url_host("10.12.40.105"), "10.12.40.105");
        assert_eq!(url_host("[::1]"), "[::1]");
    }

    #[test]
    fn env_overrides_replace_target_fields() {
        let mut config = sample();
        config.apply_env_overrides(|key| match key {
            ENV_HOST => Some("192.168.0.9".to_string()),
            ENV_IDENTITY_FILE => Some("/keys/deploy".to_string()),
            ENV_USER => Some("   ".to_string()),
            _ => None,
        });
        let deployment = config.resolve(Path::new(".")).unwrap();
        assert_eq!(deployment.target.host, "192.168.0.9");
        assert_eq!(deployment.target.user, "sistema");
        assert_eq!(
            deployment.target.credential,
            CredentialRef::IdentityFile(PathBuf::from("/keys/deploy"))
        );
    }

    #[test]
    fn renders_templates_at_load_time() {
        let raw = r#"{
            "target": { "host": "app.internal", "remoteDir": "/srv/app" },
            "steps": [ { "command": "ls {{remoteDir}} && echo {{host}}", "inRemoteDir": false } ],
            "health": { "url": "https://{{host}}/health" }
        }"#;
        let deployment = parse(raw, Path::new("c.json"))
            .unwrap()
            .resolve(Path::new("."))
            .unwrap();
        assert_eq!(
            deployment.steps[0].action,
            StepAction::Command("ls /srv/app && echo app.internal".to_string())
        );
        assert_eq!(deployment.health.unwrap().url, "https://app.internal/health");
    }

    #[test]
    fn rejects_zero_timeouts() {
        let raw = r#"{ "target": { "host": "h" }, "steps": [ { "command": "true", "timeoutSecs": 0 } ] }"#;
        let err = parse(raw, Path::new("c.json"))
            .unwrap()
            .resolve(Path::new("."))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
        assert_eq!(err.details["key"], "steps[0].timeoutSecs");
    }

    #[test]
    fn rejects_empty_step_list() {
        let raw = r#"{ "target": { "host": "h" }, "steps": [] }"#;
        let err = parse(raw, Path::new("c.json"))
            .unwrap()
            .resolve(Path::new("."))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigMissingKey);
    }

    #[test]
    fn rejects_step_with_command_and_upload() {
        let raw = r#"{ "target": { "host": "h" }, "steps": [
            { "command": "true", "upload": { "from": "a", "to": "/tmp/a" } }
        ] }"#;
        let err = parse(raw, Path::new("c.json"))
            .unwrap()
            .resolve(Path::new("."))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
    }

    #[test]
    fn upload_source_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("server.js"), "// app").unwrap();
        let raw = r#"{ "target": { "host": "h" }, "steps": [
            { "upload": { "from": "server.js", "to": "/tmp/server.js" } }
        ] }"#;
        let deployment = parse(raw, Path::new("c.json"))
            .unwrap()
            .resolve(dir.path())
            .unwrap();
        match &deployment.steps[0].action {
            StepAction::Upload {
                local_path,
                remote_path,
            } => {
                assert_eq!(local_path, &dir.path().join("server.js"));
                assert_eq!(remote_path, "/tmp/server.js");
            }
            other => panic!("unexpected action {:?}", other),
        }
        assert_eq!(
            deployment.steps[0].description,
            format!("Upload {} to /tmp/server.js", dir.path().join("server.js").display())
        );
    }

    #[test]
    fn parses_gcloud_transport_from_toml() {
        let raw = r#"
            connectTimeoutSecs = 15

            [target]
            host = "136.118.10.24"

            [transport]
            type = "gcloud"
            instance = "app-server"
            zone = "us-west1-b"

            [[steps]]
            description = "Restart service"
            command = "systemctl restart app"
            elevated = true
        "#;
        let deployment = parse(raw, Path::new("redeploy.toml"))
            .unwrap()
            .resolve(Path::new("."))
            .unwrap();
        match deployment.transport {
            Transport::Gcloud(settings) => {
                assert_eq!(settings.instance, "app-server");
                assert_eq!(settings.gcloud_path, "gcloud");
                assert_eq!(settings.project, None);
            }
            other => panic!("unexpected transport {:?}", other),
        }
        assert_eq!(deployment.connect_timeout, Duration::from_secs(15));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let err = parse("{ not json", Path::new("broken.json")).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigParseFailed);
        assert_eq!(err.details["path"], "broken.json");
    }

    #[test]
    fn explicit_missing_config_is_not_found() {
        let err = locate(Some(Path::new("/nonexistent/redeploy.json"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
    }
}
