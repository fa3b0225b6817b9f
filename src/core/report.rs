//! Human-readable rendering of deployment results.

use std::fmt::Write;
use std::time::Duration;

use crate::deploy::DeployReport;
use crate::health::{HealthCheckResult, HealthStatus};
use crate::pipeline::{PipelineStatus, StepOutcome};
use crate::step::StepPlan;

const RULE: &str = "============================================================";

pub fn render(report: &DeployReport) -> String {
    let mut out = String::new();
    let total_steps = report.pipeline.outcomes.len();

    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  Deploying to {}", report.target.address());
    let _ = writeln!(out, "  via {}", report.transport);
    let _ = writeln!(out, "  run {}", report.run_id);
    let _ = writeln!(out, "{}", RULE);

    for outcome in &report.pipeline.outcomes {
        render_outcome(&mut out, outcome, outcome.success);
    }

    match &report.pipeline.status {
        PipelineStatus::Succeeded => {
            let _ = writeln!(out);
            let _ = writeln!(out, "Deployment succeeded ({} steps)", total_steps);
        }
        PipelineStatus::FailedAt { position, failure } => {
            let _ = writeln!(out);
            let _ = writeln!(out, "Deployment FAILED at step {}: {}", position, failure);
            let _ = writeln!(out, "No further steps were run and nothing was rolled back.");
        }
        PipelineStatus::ConnectionFailed { message } => {
            let _ = writeln!(out);
            let _ = writeln!(out, "Deployment FAILED before any step ran");
            let _ = writeln!(out, "  {}", message);
        }
    }

    if !report.status_checks.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Status checks (advisory):");
        for outcome in &report.status_checks {
            render_outcome(&mut out, outcome, false);
        }
    }

    if let Some(health) = &report.health {
        let _ = writeln!(out);
        out.push_str(&render_health(health));
    }

    out
}

fn render_outcome(out: &mut String, outcome: &StepOutcome, quiet: bool) {
    let verdict = match &outcome.failure {
        None => "ok".to_string(),
        Some(failure) => format!("FAILED: {}", failure),
    };
    let _ = writeln!(
        out,
        "[{}] {} ... {} ({})",
        outcome.position,
        outcome.description,
        verdict,
        format_duration(outcome.duration)
    );

    if quiet {
        return;
    }

    let _ = writeln!(out, "    $ {}", outcome.command);
    if outcome.output.trim().is_empty() {
        let _ = writeln!(out, "    (no output)");
    } else {
        for line in outcome.output.trim_end().lines() {
            let _ = writeln!(out, "    | {}", line);
        }
    }
}

pub fn render_health(health: &HealthCheckResult) -> String {
    let mut out = String::new();
    match health.status {
        HealthStatus::Confirmed => {
            let _ = writeln!(out, "Health: confirmed at {}", health.url);
        }
        HealthStatus::RespondingUnconfirmed => {
            let _ = writeln!(
                out,
                "Health: service responded{} but the expected marker was not found",
                health
                    .http_status
                    .map(|s| format!(" (HTTP {})", s))
                    .unwrap_or_default()
            );
            let _ = writeln!(out, "  It may still be starting; check {} in a few seconds", health.url);
        }
        HealthStatus::Unreachable => {
            let _ = writeln!(
                out,
                "Health: unreachable ({})",
                health.error.as_deref().unwrap_or("no response")
            );
            let _ = writeln!(out, "  Check {} manually", health.url);
        }
    }
    if health.attempts > 1 {
        let _ = writeln!(out, "  after {} attempts", health.attempts);
    }
    out
}

pub fn render_plan(address: &str, transport: &str, plans: &[StepPlan]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Plan for {} via {} ({} steps, nothing executed)", address, transport, plans.len());
    for plan in plans {
        let _ = writeln!(
            out,
            "[{}] {} (timeout {}s)",
            plan.position, plan.description, plan.timeout_secs
        );
        if let Some(from) = &plan.upload_from {
            let _ = writeln!(out, "    < {}", from);
        }
        let _ = writeln!(out, "    $ {}", plan.command);
    }
    out
}

fn format_duration(duration: Duration) -> String {
    format!("{:.1}s", duration.as_secs_f64())
}
