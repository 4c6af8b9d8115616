//! Human-readable rendering of engine reports.
//!
//! Tables are plain fixed-width text; color is applied to section headers
//! and status markers only, so column alignment never has to account for
//! escape sequences. JSON output mode bypasses this module entirely.

use chrono::Utc;
use colored::Colorize;
use foreman_core::{ConflictRecord, Timestamp};
use foreman_engine::{DashboardReport, Resolution, StatusReport};
use std::fmt::Write;
use std::path::Path;

/// Render a fixed-width table with a header row and separator.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut out = String::new();
    let mut line = String::new();
    for (i, header) in headers.iter().enumerate() {
        let _ = write!(line, "{:<width$}  ", header, width = widths[i]);
    }
    out.push_str(line.trim_end());
    out.push('\n');

    let mut rule = String::new();
    for width in &widths {
        let _ = write!(rule, "{}  ", "-".repeat(*width));
    }
    out.push_str(rule.trim_end());
    out.push('\n');

    for row in rows {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            let _ = write!(line, "{:<width$}  ", cell, width = widths[i]);
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Compact "how long ago" formatting for timestamps.
pub fn fmt_ago(at: Timestamp) -> String {
    let secs = (Utc::now() - at).num_seconds().max(0);
    match secs {
        0..=59 => format!("{}s ago", secs),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h {}m ago", secs / 3_600, (secs % 3_600) / 60),
        _ => format!("{}d ago", secs / 86_400),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// The `status` view: active instances plus the lock table.
pub fn status(report: &StatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Orchestration Status".cyan().bold());

    let active: Vec<_> = report.instances.iter().filter(|w| w.is_active()).collect();
    if active.is_empty() {
        let _ = writeln!(out, "{}", "No active worker instances".yellow());
    } else {
        let _ = writeln!(out, "Active instances: {}", active.len());
        let rows: Vec<Vec<String>> = active
            .iter()
            .map(|w| {
                vec![
                    w.id.clone(),
                    truncate(w.task.as_deref().unwrap_or("No task"), 40),
                    w.files.len().to_string(),
                    fmt_ago(w.started_at),
                    fmt_ago(w.heartbeat_baseline()),
                ]
            })
            .collect();
        out.push_str(&table(
            &["Instance", "Task", "Files", "Started", "Heartbeat"],
            &rows,
        ));
    }

    if !report.locks.is_empty() {
        let _ = writeln!(out, "\n{}", "File Locks".cyan().bold());
        let rows: Vec<Vec<String>> = report
            .locks
            .iter()
            .map(|l| {
                vec![
                    l.file.clone(),
                    l.instance.clone(),
                    fmt_ago(l.locked_at),
                ]
            })
            .collect();
        out.push_str(&table(&["File", "Locked By", "Since"], &rows));
    }
    out
}

/// The `dashboard` view: counters, active work, recent conflicts, hints.
pub fn dashboard(report: &DashboardReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Foreman Dashboard".cyan().bold());

    let rows = vec![
        vec!["Active".to_string(), report.active_count.to_string()],
        vec!["Completed".to_string(), report.completed_count.to_string()],
        vec!["Total Tasks".to_string(), report.task_count.to_string()],
        vec!["Locked Files".to_string(), report.locked_files.to_string()],
    ];
    out.push_str(&table(&["Metric", "Value"], &rows));

    let _ = writeln!(out, "\n{}", "=== Active Work ===".cyan());
    if report.active.is_empty() {
        let _ = writeln!(out, "  No active instances");
    } else {
        for worker in &report.active {
            let _ = writeln!(out, "  {} {}", "●".green(), worker.id);
            if let Some(task) = &worker.task {
                let _ = writeln!(out, "    Task: {}", task.yellow());
            }
            if !worker.files.is_empty() {
                let files: Vec<String> = worker.files.iter().map(|f| basename(f)).collect();
                let _ = writeln!(out, "    Files: {}", files.join(", "));
            }
            let _ = writeln!(out, "    Started: {}", fmt_ago(worker.started_at));
        }
    }

    if !report.recent_conflicts.is_empty() {
        let _ = writeln!(out, "\n{}", "=== Recent Conflicts ===".red());
        for conflict in &report.recent_conflicts {
            let _ = writeln!(
                out,
                "  {} ({} vs {})",
                conflict.file, conflict.instances[0], conflict.instances[1]
            );
        }
    }

    let _ = writeln!(out, "\n{}", "=== Commands ===".magenta());
    let _ = writeln!(
        out,
        "  foreman assign --task \"Building feature X\" --files src/feature.rs"
    );
    let _ = writeln!(out, "  foreman release --instance agent_abc123_42");
    let _ = writeln!(out, "  foreman conflicts --resolve");
    let _ = writeln!(out, "  foreman dashboard --watch");
    out
}

/// The `conflicts` view.
pub fn conflicts(records: &[ConflictRecord]) -> String {
    if records.is_empty() {
        return format!("{}\n", "No conflicts detected".green());
    }
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Conflicts detected!".red().bold());
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|c| {
            vec![
                c.file.clone(),
                format!("{} vs {}", c.instances[0], c.instances[1]),
            ]
        })
        .collect();
    out.push_str(&table(&["File", "Conflicting Instances"], &rows));
    out
}

/// Summary of what `conflicts --resolve` settled.
pub fn resolutions(settled: &[Resolution]) -> String {
    let mut out = String::new();
    for resolution in settled {
        let _ = writeln!(
            out,
            "  {} {} yields {} to {}",
            "→".cyan(),
            resolution.released,
            resolution.file,
            resolution.retained
        );
    }
    out
}
