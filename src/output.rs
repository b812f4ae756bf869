// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::expr::ConfigPoint;
use crate::store::DeploymentRecord;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    #[default]
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({elapsed:.1}s)");
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.emit(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
                deployment: None,
                points: None,
            }),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                    deployment: None,
                    points: None,
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print one deployment, with its pending points when it is waiting.
    pub fn deployment(&self, record: &DeploymentRecord, pending: &[ConfigPoint]) {
        match self.mode {
            OutputMode::Normal => {
                println!("Deployment:  {}", record.id);
                println!("Environment: {}", record.environment_id);
                println!("Status:      {}", record.status);
                println!(
                    "Progress:    {}/{} services",
                    record.state.service_index.min(record.plan.services.len()),
                    record.plan.services.len()
                );
                if let Some(previous) = &record.previous_deployment_id {
                    println!("Previous:    {previous}");
                }
                self.points(pending);
            }
            OutputMode::Quiet => println!("{} {}", record.id, record.status),
            OutputMode::Json => {
                let status = record.status.to_string();
                self.emit(&JsonEvent {
                    event: "deployment",
                    message: &status,
                    duration_secs: self.duration(),
                    deployment: Some(record),
                    points: (!pending.is_empty()).then_some(pending),
                });
            }
        }
    }

    /// One line per deployment.
    pub fn deployments(&self, records: &[DeploymentRecord]) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                for record in records {
                    println!(
                        "{}\t{}\t{}\t{}",
                        record.id,
                        record.environment_id,
                        record.status,
                        record.created_at.to_rfc3339()
                    );
                }
            }
            OutputMode::Json => {
                for record in records {
                    let status = record.status.to_string();
                    self.emit(&JsonEvent {
                        event: "deployment",
                        message: &status,
                        duration_secs: None,
                        deployment: Some(record),
                        points: None,
                    });
                }
            }
        }
    }

    fn points(&self, pending: &[ConfigPoint]) {
        if pending.is_empty() {
            return;
        }
        println!("Waiting for configuration:");
        for point in pending {
            match &point.description {
                Some(description) => println!(
                    "  {}/{} ({}, {}): {description}",
                    point.module_name, point.identifier, point.name, point.kind
                ),
                None => println!(
                    "  {}/{} ({}, {})",
                    point.module_name, point.identifier, point.name, point.kind
                ),
            }
        }
    }

    fn emit(&self, event: &JsonEvent<'_>) {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{json}");
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deployment: Option<&'a DeploymentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    points: Option<&'a [ConfigPoint]>,
}
