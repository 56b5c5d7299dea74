//! Plain-text rendering of results, jobs, history and targets for the terminal.

use crate::config::DatabaseTarget;
use crate::db::QueryResult;
use crate::persistence::{HistoryPage, ScheduledJob};

/// Formats a table as a string for display.
pub fn format_table(headers: &[String], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut output = String::new();

    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    output.push_str(&header_line.join(" │ "));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    output.push_str(&separator.join("─┼─"));
    output.push('\n');

    for row in rows {
        let row_line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = width)
            })
            .collect();
        output.push_str(&row_line.join(" │ "));
        output.push('\n');
    }

    output.trim_end().to_string()
}

/// Renders a query result followed by its shape and timing.
pub fn render_result(result: &QueryResult) -> String {
    let headers: Vec<String> = result.columns.iter().map(|c| c.name.clone()).collect();
    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_display_string()).collect())
        .collect();

    let mut output = format_table(&headers, &rows);
    if !output.is_empty() {
        output.push('\n');
    }
    output.push_str(&format!(
        "{}\nExecution time: {:.3}s",
        result.shape(),
        result.execution_time.as_secs_f64()
    ));
    output
}

pub fn render_jobs(jobs: &[ScheduledJob]) -> String {
    if jobs.is_empty() {
        return "No scheduled queries.".to_string();
    }

    let headers = ["Query", "Interval (s)", "Next run", "Output prefix", "Database"]
        .map(String::from)
        .to_vec();
    let rows: Vec<Vec<String>> = jobs
        .iter()
        .map(|job| {
            vec![
                job.query.clone(),
                job.interval.to_string(),
                job.next_run.format("%Y-%m-%d %H:%M:%S").to_string(),
                job.output_prefix.clone(),
                job.target_name.clone(),
            ]
        })
        .collect();
    format_table(&headers, &rows)
}

/// Renders a history page. `page` is zero-based.
pub fn render_history(page: &HistoryPage, page_index: u32) -> String {
    let headers = ["Timestamp", "Database", "Query"].map(String::from).to_vec();
    let rows: Vec<Vec<String>> = page
        .rows
        .iter()
        .map(|r| vec![r.timestamp.clone(), r.database.clone(), r.query.clone()])
        .collect();

    let mut output = format_table(&headers, &rows);
    output.push('\n');
    output.push_str(&format!(
        "Page {} of {} ({} queries)",
        page_index + 1,
        page.total_pages.max(1),
        page.total_count
    ));
    output
}

pub fn render_targets(targets: &[DatabaseTarget]) -> String {
    if targets.is_empty() {
        return "No database targets configured.".to_string();
    }

    let headers = ["Name", "Connection", "TLS"].map(String::from).to_vec();
    let rows: Vec<Vec<String>> = targets
        .iter()
        .map(|t| {
            let tls = match (&t.ssl_ca, t.requires_ssl) {
                (Some(_), true) => "verify-ca",
                (Some(_), false) => "preferred",
                (None, _) => "off",
            };
            vec![t.name.clone(), t.display_string(), tls.to_string()]
        })
        .collect();
    format_table(&headers, &rows)
}
