use crate::categories::Registry;
use crate::disk::DiskInfo;
use crate::elevation::ElevatedExecutionSession;
use crate::engine::EngineSnapshot;
use crate::ledger::{CleanSummary, CleanupLedgerEntry};
use crate::state::CategoryRunState;
use crate::theme::Theme;
use serde::Serialize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Quiet,   // Only errors
    Normal,  // Standard output
    Verbose, // Per-path details
}

impl OutputMode {
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            OutputMode::Quiet
        } else if verbose > 0 {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }
}

/// Truncate a string to a maximum display width (adds ellipsis if needed).
fn truncate_to_width(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }

    let ellipsis = "…";
    let target = max_width.saturating_sub(UnicodeWidthStr::width(ellipsis));

    let mut out = String::new();
    let mut w = 0usize;
    for ch in s.chars() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if w + cw > target {
            break;
        }
        out.push(ch);
        w += cw;
    }
    out.push_str(ellipsis);
    out
}

/// Pad/truncate plain content to a display width. Styling is applied after
/// padding so escape codes never count towards the width.
fn pad_right_to_width(s: &str, width: usize) -> String {
    let truncated = truncate_to_width(s, width);
    let w = UnicodeWidthStr::width(truncated.as_str());
    format!("{}{}", truncated, " ".repeat(width.saturating_sub(w)))
}

type Cell = (String, fn(&str) -> String);

fn plain(text: &str) -> String {
    text.to_string()
}

fn table_row(cells: &[Cell], widths: &[usize]) -> String {
    let mut row = String::from("│");
    for ((content, style), width) in cells.iter().zip(widths) {
        row.push(' ');
        row.push_str(&style(&pad_right_to_width(content, *width)));
        row.push_str(" │");
    }
    row
}

fn table_separator(widths: &[usize], left: &str, mid: &str, right: &str) -> String {
    let mut sep = left.to_string();
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            sep.push_str(mid);
        }
        sep.push_str(&"─".repeat(width + 2));
    }
    sep.push_str(right);
    sep
}

/// Box-drawn table; column widths fit the widest plain cell.
fn render_table(headers: &[&str], rows: &[Vec<Cell>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| UnicodeWidthStr::width(*h)).collect();
    for row in rows {
        for (i, (content, _)) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(UnicodeWidthStr::width(content.as_str())).min(48);
            }
        }
    }

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| (h.to_string(), Theme::header as fn(&str) -> String))
        .collect();
    let mut lines = vec![
        table_separator(&widths, "┌", "┬", "┐"),
        table_row(&header_cells, &widths),
        table_separator(&widths, "├", "┼", "┤"),
    ];
    lines.extend(rows.iter().map(|row| table_row(row, &widths)));
    lines.push(table_separator(&widths, "└", "┴", "┘"));
    lines
}

/// Category rows as rendered after a scan or clean.
pub fn render_rows(registry: &Registry, rows: &[CategoryRunState]) -> Vec<String> {
    let body: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| {
            let name = registry
                .lookup(&row.id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| row.id.clone());
            let mark = if row.checked { "[x]" } else { "[ ]" };
            let status = row.status;
            vec![
                (mark.to_string(), plain as fn(&str) -> String),
                (format!("{} {}", row.id, name), plain),
                (row.file_count.to_string(), plain),
                (row.size_human(), Theme::size),
                (
                    format!("{:?}", status).to_lowercase(),
                    if status == crate::state::CategoryStatus::Error {
                        Theme::error
                    } else {
                        plain
                    },
                ),
            ]
        })
        .collect();
    render_table(&["", "Category", "Files", "Size", "Status"], &body)
}

pub fn print_rows(registry: &Registry, rows: &[CategoryRunState], mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }
    for line in render_rows(registry, rows) {
        println!("{}", line);
    }
    for row in rows {
        if let Some(message) = &row.error_message {
            println!("  {} {}: {}", Theme::error("!"), row.id, message);
        }
        if mode == OutputMode::Verbose {
            for detail in &row.path_details {
                println!(
                    "  {} {} {}",
                    Theme::muted("└─"),
                    Theme::muted(&detail.path.display().to_string()),
                    bytesize::to_string(detail.size_bytes, false)
                );
            }
        }
    }
}

pub fn print_registry(registry: &Registry) {
    let body: Vec<Vec<Cell>> = registry
        .iter()
        .map(|c| {
            vec![
                (c.id.clone(), plain as fn(&str) -> String),
                (c.name.clone(), plain),
                (c.kind.as_str().to_string(), plain),
                (format!("{:?}", c.safety_tier).to_lowercase(), plain),
                (if c.default_checked { "yes" } else { "no" }.to_string(), plain),
                (if c.requires_elevation { "yes" } else { "no" }.to_string(), plain),
            ]
        })
        .collect();
    let headers = ["Id", "Name", "Kind", "Tier", "Checked", "Admin"];
    for line in render_table(&headers, &body) {
        println!("{}", line);
    }
}

pub fn print_ledger(entries: &[CleanupLedgerEntry], summary: &CleanSummary, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }
    println!();
    println!("{}", Theme::header("Cleanup ledger"));
    println!("{}", Theme::divider_bold(60));
    for entry in entries {
        let detail = match (&entry.error_message, entry.skip_reason) {
            (Some(message), _) => Theme::error(message),
            (None, Some(reason)) => Theme::muted(reason.label()),
            (None, None) => format!(
                "{} in {} paths",
                Theme::size(&bytesize::to_string(entry.bytes_freed, false)),
                entry.paths_affected
            ),
        };
        println!(
            "  {:<4} {:<8} {}",
            entry.category_id,
            Theme::outcome(entry.outcome),
            detail
        );
    }
    println!("{}", Theme::divider(60));
    println!(
        "  Freed {} ({} cleaned, {} failed, {} skipped)",
        Theme::size(&bytesize::to_string(summary.bytes_freed, false)),
        summary.cleaned,
        summary.failed,
        summary.skipped
    );
}

pub fn print_session(session: &ElevatedExecutionSession) {
    let state = format!("{:?}", session.state);
    println!(
        "  Session {} ({}): {}",
        session.id,
        session.topic,
        Theme::header(&state)
    );
    if let Some(failure) = &session.failure {
        println!("  {} {}", Theme::error("!"), failure.message);
    }
}

/// One-line usage bar for the volume being cleaned.
pub fn render_disk_line(info: &DiskInfo) -> String {
    const BAR_WIDTH: usize = 20;
    let filled = ((info.used_percent() / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));
    format!(
        "  Disk [{}] {} free of {}",
        Theme::disk(info.level(), &bar),
        bytesize::to_string(info.free, false),
        bytesize::to_string(info.total, false)
    )
}

#[derive(Serialize)]
struct JsonReport<'a, T: Serialize> {
    version: &'static str,
    #[serde(flatten)]
    body: &'a T,
}

/// Pretty JSON of any read-model value, tagged with the crate version.
pub fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION"),
        body: value,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub fn print_json(snapshot: &EngineSnapshot) -> anyhow::Result<()> {
    println!("{}", to_json(snapshot)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::Registry;
    use crate::selection::SelectionModel;
    use std::collections::BTreeMap;

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("short", 10), "short");
        let cut = truncate_to_width("Windows Update cache", 8);
        assert_eq!(UnicodeWidthStr::width(cut.as_str()), 8);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_rows_table_has_one_line_per_category() {
        colored::control::set_override(false);
        let registry = Registry::builtin();
        let model = SelectionModel::seed(&registry, &BTreeMap::new());
        let lines = render_rows(&registry, model.rows());

        assert_eq!(lines.len(), registry.len() + 4);
        assert!(lines[3].contains("[x]"));
        assert!(lines[3].contains("System temp files"));
        let widths: Vec<usize> = lines
            .iter()
            .map(|l| UnicodeWidthStr::width(l.as_str()))
            .collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_json_is_versioned() {
        #[derive(Serialize)]
        struct Body {
            page: &'static str,
        }
        let json = to_json(&Body { page: "initial" }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["page"], "initial");
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_disk_line_fills_bar_by_usage() {
        colored::control::set_override(false);
        let line = render_disk_line(&DiskInfo::from_total_free(100, 25));
        assert!(line.contains(&format!("[{}{}]", "█".repeat(15), "░".repeat(5))));
        assert!(line.contains("25 B free of 100 B"));
    }
}
