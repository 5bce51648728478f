use crate::dashboard::{
    HistoryPanel, HistoryState, OrchestrationPanel, PanelState, StatsPage, TableSection, TableState,
};
use crate::format::format_count;

const TITLE: &str = "Janus";

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn render_orchestration(panels: &[OrchestrationPanel]) -> String {
    let mut lines = vec![format!("# {TITLE}"), "## Orchestration".to_string()];
    for panel in panels {
        lines.push(String::new());
        render_panel(&mut lines, panel);
    }
    finish(lines)
}

fn render_panel(lines: &mut Vec<String>, panel: &OrchestrationPanel) {
    let wf = &panel.workflow;
    lines.push(format!("### {}", wf.title));
    match &panel.state {
        PanelState::Error { message } => {
            lines.push("Failed to fetch workflow runs from GitHub.".to_string());
            lines.push(format!("    {message}"));
        }
        PanelState::NoRuns => {
            lines.push(format!("No workflow runs found for {}.", wf.workflow_id));
        }
        PanelState::Run { run } => {
            let status = run.status.as_deref().unwrap_or("unknown");
            let run_number = run
                .run_number
                .map_or_else(|| "unknown".to_string(), |n| n.to_string());
            lines.push(format!("Repository: {}", wf.full_name()));
            lines.push(format!("Workflow: {}", run.name.as_deref().unwrap_or("Unknown")));
            lines.push(format!("Status: {} {status}", run.display_status.icon()));
            lines.push(format!(
                "Conclusion: {}",
                run.conclusion.as_deref().unwrap_or("unknown")
            ));
            lines.push(format!("Run number: {run_number}"));
            lines.push(format!(
                "Started: {}",
                run.run_started_at.as_deref().unwrap_or("unknown")
            ));
            if let Some(duration) = &run.duration {
                lines.push(format!("Duration: {duration}"));
            }
            if let Some(url) = &run.html_url {
                lines.push(format!("[Open run]({url})"));
            }
        }
    }
}

/// One line per run, newest first.
pub fn render_history(panels: &[HistoryPanel]) -> String {
    let mut lines = vec![format!("# {TITLE}"), "## Run history".to_string()];
    for panel in panels {
        let wf = &panel.workflow;
        lines.push(String::new());
        lines.push(format!("### {}", wf.title));
        match &panel.state {
            HistoryState::Error { message } => {
                lines.push("Failed to fetch workflow runs from GitHub.".to_string());
                lines.push(format!("    {message}"));
            }
            HistoryState::Runs { runs } if runs.is_empty() => {
                lines.push(format!("No workflow runs found for {}.", wf.workflow_id));
            }
            HistoryState::Runs { runs } => {
                for run in runs {
                    let number = run
                        .run_number
                        .map_or_else(|| "?".to_string(), |n| n.to_string());
                    let outcome = run
                        .conclusion
                        .as_deref()
                        .or(run.status.as_deref())
                        .unwrap_or("unknown");
                    let mut line = format!(
                        "#{number} {} {outcome}, started {}",
                        run.display_status.icon(),
                        run.started
                    );
                    if let Some(duration) = &run.duration {
                        line.push_str(&format!(", took {duration}"));
                    }
                    lines.push(line);
                }
            }
        }
    }
    finish(lines)
}

pub fn render_stats(page: &StatsPage) -> String {
    let mut lines = vec![
        format!("# {TITLE}"),
        "## Database Stats".to_string(),
        String::new(),
    ];
    match page {
        StatsPage::ConfigIncomplete { missing } => {
            lines.push("Database env vars are not fully configured.".to_string());
            lines.push(format!("    {}", missing.join(", ")));
        }
        StatsPage::ConnectionFailed { message } => {
            lines.push("Database connection status".to_string());
            lines.push("Database connection failed.".to_string());
            lines.push(format!("    {message}"));
        }
        StatsPage::Ready { tables } => {
            lines.push("Database connection status".to_string());
            lines.push("Database connection is alive.".to_string());
            lines.push(String::new());
            lines.push("## Staging metrics".to_string());
            for section in tables {
                render_table(&mut lines, section);
            }
        }
    }
    finish(lines)
}

fn render_table(lines: &mut Vec<String>, section: &TableSection) {
    match &section.state {
        TableState::Metrics {
            row_count,
            ranges,
            volume,
        } => {
            lines.push(format!("{} rows: {}", section.table, format_count(*row_count)));
            for range in ranges {
                lines.push(format!("{}: {} -> {}", range.label, range.earliest, range.latest));
            }
            if let Some(volume) = volume {
                lines.push(format!("Daily volume by {}:", volume.column));
                if volume.days.is_empty() {
                    lines.push("    no rows".to_string());
                }
                for day in &volume.days {
                    lines.push(format!("    {}: {}", day.day, format_count(day.count)));
                }
            }
        }
        TableState::Error { message } => {
            lines.push(format!("Failed to fetch metrics for {}.", section.table));
            lines.push(format!("    {message}"));
        }
    }
}
