//! Output formatting for the run summary

use autoblast::aggregator::BatchFailure;
use autoblast::RunSummary;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use std::time::Duration;

/// Format a duration in human-readable form
///
/// Examples:
/// - 0.4s -> "0.4s"
/// - 75s -> "1m 15s"
/// - 3725s -> "1h 2m"
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

fn build_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }
    table
}

/// Print a table with styled headers
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    println!("{}", build_table(headers, rows));
}

/// Key/value rows describing a finished run.
pub fn summary_rows(summary: &RunSummary) -> Vec<Vec<String>> {
    let mut rows = vec![
        vec!["Input".to_string(), summary.input.display().to_string()],
        vec![
            "Records".to_string(),
            format!(
                "{} of {} rows ({} incomplete, {} duplicate)",
                summary.records,
                summary.total_rows,
                summary.dropped_incomplete,
                summary.dropped_duplicates
            ),
        ],
        vec![
            "Batches".to_string(),
            format!("{} of {} completed", summary.completed_batches, summary.batches),
        ],
        vec!["Rows written".to_string(), summary.rows_written.to_string()],
        vec!["Skipped lines".to_string(), summary.skipped_lines.to_string()],
        vec![
            "Warnings removed".to_string(),
            summary.filtered_lines.to_string(),
        ],
        vec![
            "Elapsed".to_string(),
            format_duration(Duration::from_secs_f64(summary.elapsed_secs.max(0.0))),
        ],
        vec!["Output".to_string(), summary.output.display().to_string()],
    ];
    if let Some(retry) = &summary.retry_manifest {
        rows.push(vec!["Retry file".to_string(), retry.display().to_string()]);
    }
    rows
}

fn failure_rows(kind: &str, failures: &[BatchFailure]) -> Vec<Vec<String>> {
    failures
        .iter()
        .map(|f| {
            vec![
                f.batch_index.to_string(),
                kind.to_string(),
                f.record_count.to_string(),
                f.reason.clone(),
            ]
        })
        .collect()
}

pub fn print_summary(summary: &RunSummary) {
    print_table(&["", "Run"], summary_rows(summary));

    if summary.is_partial() {
        let mut rows = failure_rows("timed out", &summary.timed_out);
        rows.extend(failure_rows("failed", &summary.failed));
        rows.sort_by_key(|r| r[0].parse::<usize>().unwrap_or(usize::MAX));
        println!();
        print_table(&["Batch", "Status", "Records", "Reason"], rows);
        if let Some(retry) = &summary.retry_manifest {
            println!();
            println!(
                "Re-run the unfinished records with: autoblast {} --id-column id",
                retry.display()
            );
        }
    }
}
