//! Post-deployment health probe.
//!
//! Advisory only: the verifier never fails a deployment and never returns an
//! error. Every problem ends up in the [`HealthCheckResult`] classification.

use serde::Serialize;
use std::thread;
use std::time::Duration;

const SNIPPET_CHARS: usize = 200;
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckSpec {
    pub url: String,
    /// Substring expected in the response body. Empty matches any response.
    pub marker: String,
    pub grace: Duration,
    pub timeout: Duration,
    pub attempts: u32,
    pub interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Confirmed,
    RespondingUnconfirmed,
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

pub trait HealthProbe {
    /// One bounded request. `Err` means no response at all (refused,
    /// unresolvable, timed out).
    fn fetch(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, String>;
}

#[derive(Debug, Default)]
pub struct HttpProbe;

impl HealthProbe for HttpProbe {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, String> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(format!("redeploy/{}", VERSION))
            .timeout(timeout)
            .build()
            .map_err(|e| format!("create HTTP client: {}", e))?;

        let response = client.get(url).send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();

        Ok(ProbeResponse { status, body })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub url: String,
    pub reachable: bool,
    pub marker_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
}

pub fn classify(response: &Result<ProbeResponse, String>, marker: &str) -> HealthStatus {
    match response {
        Err(_) => HealthStatus::Unreachable,
        Ok(resp) if resp.body.contains(marker) => HealthStatus::Confirmed,
        Ok(_) => HealthStatus::RespondingUnconfirmed,
    }
}

/// Wait out the grace period, then probe until confirmed or out of attempts.
pub fn verify(spec: &HealthCheckSpec, probe: &dyn HealthProbe) -> HealthCheckResult {
    if !spec.grace.is_zero() {
        log_status!("health", "Waiting {}s for the service to start", spec.grace.as_secs());
        thread::sleep(spec.grace);
    }

    let attempts = spec.attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        log_status!("health", "Probing {} (attempt {}/{})", spec.url, attempt, attempts);

        let response = probe.fetch(&spec.url, spec.timeout);
        let status = classify(&response, &spec.marker);

        if status == HealthStatus::Confirmed || attempt >= attempts {
            return build_result(spec, response, status, attempt);
        }

        if !spec.interval.is_zero() {
            thread::sleep(spec.interval);
        }
    }
}

fn build_result(
    spec: &HealthCheckSpec,
    response: Result<ProbeResponse, String>,
    status: HealthStatus,
    attempts: u32,
) -> HealthCheckResult {
    match response {
        Ok(resp) => HealthCheckResult {
            status,
            url: spec.url.clone(),
            reachable: true,
            marker_found: status == HealthStatus::Confirmed,
            http_status: Some(resp.status),
            snippet: Some(resp.body.chars().take(SNIPPET_CHARS).collect()),
            error: None,
            attempts,
        },
        Err(error) => HealthCheckResult {
            status,
            url: spec.url.clone(),
            reachable: false,
            marker_found: false,
            http_status: None,
            snippet: None,
            error: Some(error),
            attempts,
        },
    }
}
