//! Doctor command rendering
//!
//! Prints health reports produced by the monitor for the terminal.

use crate::health::{HealthReport, OverallStatus, QuickHealth};
use colored::Colorize;

/// One rendered report line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

/// Flatten a report into display lines, components in name order
pub fn report_lines(report: &HealthReport) -> Vec<ReportLine> {
    report
        .components
        .iter()
        .map(|(name, component)| {
            let message = match (&component.error, &component.detail) {
                (Some(error), _) => error.clone(),
                (None, Some(detail)) => detail.clone(),
                (None, None) => String::new(),
            };
            ReportLine {
                name: name.clone(),
                passed: component.healthy,
                message,
            }
        })
        .collect()
}

fn status_label(status: OverallStatus) -> String {
    match status {
        OverallStatus::Healthy => status.name().green().bold().to_string(),
        OverallStatus::Degraded => status.name().yellow().bold().to_string(),
        OverallStatus::Unhealthy | OverallStatus::Emergency => {
            status.name().red().bold().to_string()
        }
    }
}

/// Display a full health report
pub fn display_report(report: &HealthReport) {
    println!("\n{}\n", "cyclekeeper health check".bold());
    println!("{:<20} {}", "Component", "Status");
    println!("{}", "=".repeat(60));

    for line in report_lines(report) {
        let status = if line.passed {
            "PASS".green()
        } else {
            "FAIL".red()
        };
        println!("{:<20} {} {}", line.name, status, line.message.dimmed());
    }

    println!("{}", "=".repeat(60));
    println!(
        "Overall: {}   score {:.0}/100",
        status_label(report.overall_status),
        report.health_score
    );
    if let Some(reason) = &report.emergency_reason {
        println!("Reason:  {}", reason.red());
    }
    println!();
}

/// Display a quick check result
pub fn display_quick(quick: &QuickHealth) {
    let verdict = if quick.healthy {
        "healthy".green().bold()
    } else {
        "unhealthy".red().bold()
    };
    println!("\nQuick check: {} ({} probes)", verdict, quick.checked.len());
    for name in &quick.failing {
        println!("  {} {}", "FAIL".red(), name);
    }
    println!();
}
