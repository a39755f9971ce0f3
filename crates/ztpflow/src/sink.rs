//! Report output

use std::fmt::Write as _;

use clap::ValueEnum;
use tokio::sync::broadcast;
use ztpflow_actions::OutcomeStatus;
use ztpflow_core::{ExecutionReport, PlannedStage, ProgressEvent, StageState};
use ztpflow_inventory::{HostGroupResolver, Inventory};

/// How results are printed on stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable
    #[default]
    Text,
    /// JSON document
    Json,
}

/// Render a run report
///
/// # Errors
/// Returns error if JSON serialization fails
pub fn render_report(report: &ExecutionReport, format: OutputFormat) -> eyre::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(report)?);
    }

    let mut out = String::new();
    for stage in &report.stages {
        let marker = match stage.state {
            StageState::Skipped => "SKIP",
            _ if stage.status == OutcomeStatus::Success => " OK ",
            _ if stage.error_code == "1" => "FAIL",
            _ => "WARN",
        };
        writeln!(
            out,
            "[{marker}] {:<20} {} (attempts: {}, error: {})",
            stage.id, stage.status, stage.attempts, stage.error_code
        )?;
        if !stage.description.is_empty() {
            writeln!(out, "       {}", stage.description)?;
        }
        for line in &stage.output {
            writeln!(out, "       {line}")?;
        }
    }
    if report.aborted {
        writeln!(out, "run aborted before all stages ran")?;
    }
    writeln!(
        out,
        "verdict: {} ({} stages in {:.1}s)",
        report.verdict(),
        report.stages.len(),
        report.elapsed().num_milliseconds() as f64 / 1000.0
    )?;
    Ok(out)
}

/// Render a dry-run plan
///
/// # Errors
/// Returns error if JSON serialization fails
pub fn render_plan(plan: &[PlannedStage], format: OutputFormat) -> eyre::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(plan)?);
    }

    let mut out = String::new();
    for (i, stage) in plan.iter().enumerate() {
        writeln!(
            out,
            "{}. {} -> {} ({:?}, up to {} attempts)",
            i + 1,
            stage.id,
            stage.action,
            stage.cardinality,
            stage.max_attempts
        )?;
        if let Some(dep) = &stage.requires {
            writeln!(out, "   requires: {dep}")?;
        }
        writeln!(out, "   hosts: {}", stage.hosts.join(", "))?;
    }
    Ok(out)
}

/// Render inventory groups
///
/// # Errors
/// Returns error if JSON serialization fails
pub fn render_hosts(inventory: &Inventory, format: OutputFormat) -> eyre::Result<String> {
    let groups: Vec<(String, Vec<String>)> = inventory
        .group_names()
        .into_iter()
        .map(|g| {
            let hosts = inventory.resolve(&g).unwrap_or_default();
            (g, hosts)
        })
        .collect();

    if format == OutputFormat::Json {
        let map: serde_json::Map<String, serde_json::Value> = groups
            .into_iter()
            .map(|(g, hosts)| (g, serde_json::Value::from(hosts)))
            .collect();
        return Ok(serde_json::to_string_pretty(&map)?);
    }

    let mut out = String::new();
    for (group, hosts) in groups {
        writeln!(out, "{group}: {}", hosts.join(", "))?;
    }
    Ok(out)
}

/// Print progress lines on stderr until the run finishes
pub async fn follow_progress(mut rx: broadcast::Receiver<ProgressEvent>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                eprintln!("... {n} progress events dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };

        match event {
            ProgressEvent::StageStarted { stage, hosts } => {
                eprintln!("==> {stage} on {}", hosts.join(", "));
            }
            ProgressEvent::AttemptFinished {
                stage,
                host,
                attempt,
                status,
            } if attempt > 1 || status != OutcomeStatus::Success => {
                let host = host.as_deref().unwrap_or("fabric");
                eprintln!("    {stage} [{host}] attempt {attempt}: {status}");
            }
            ProgressEvent::StageSkipped { stage, reason } => {
                eprintln!("==> {stage} skipped: {reason}");
            }
            ProgressEvent::RunAborted { next_stage } => {
                eprintln!("==> aborted before {}", next_stage.as_deref().unwrap_or("end"));
            }
            ProgressEvent::RunFinished { .. } => return,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use ztpflow_core::StageReport;

    use super::*;

    fn report() -> ExecutionReport {
        let entry = |id: &str, state, status, error_code: &str| StageReport {
            id: id.to_string(),
            description: String::new(),
            state,
            status,
            error_code: error_code.to_string(),
            attempts: 1,
            changed: false,
            output: vec![format!("spine1: {id}")],
            hosts: vec!["spine1".to_string()],
        };
        let now = Utc::now();
        ExecutionReport {
            stages: vec![
                entry("initial-setup", StageState::Completed, OutcomeStatus::Success, "0"),
                entry("l3-setup", StageState::Completed, OutcomeStatus::FatalFailure, "1"),
                entry("vrrp-setup", StageState::Skipped, OutcomeStatus::Skipped, "0"),
            ],
            started_at: now,
            finished_at: now,
            aborted: false,
        }
    }

    #[test]
    fn test_text_report() {
        let text = render_report(&report(), OutputFormat::Text).unwrap();
        assert!(text.contains("[ OK ] initial-setup"));
        assert!(text.contains("[FAIL] l3-setup"));
        assert!(text.contains("[SKIP] vrrp-setup"));
        assert!(text.contains("verdict: fatal"));
    }

    #[test]
    fn test_json_report() {
        let json = render_report(&report(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["stages"][1]["error_code"], "1");
        assert_eq!(value["aborted"], false);
    }

    #[test]
    fn test_hosts_listing() {
        let inventory = Inventory::from_toml_str(
            "[[host]]\nname = \"spine1\"\ngroups = [\"spine\"]\n\n[[host]]\nname = \"leaf1\"\ngroups = [\"leaf\"]\n",
        )
        .unwrap();
        let text = render_hosts(&inventory, OutputFormat::Text).unwrap();
        assert_eq!(text, "all: spine1, leaf1\nspine: spine1\nleaf: leaf1\n");
    }
}
