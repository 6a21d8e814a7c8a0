//! Report rendering and terminal progress.

use std::fmt::Write as _;
use std::io::Write;

use actions_usage_core::{JobTally, Progress, ProgressSink, RunRow, UsageReport};

const NAME_WIDTH: usize = 20;
const EVENT_WIDTH: usize = 13;
const REPO_WIDTH: usize = 15;
const SOURCE_WIDTH: usize = 40;
const RULE_WIDTH: usize = 137;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Cut `value` to at most `max` characters.
pub fn truncate(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// `DD d HH h` for runs older than a day, `HH h MM m` otherwise.
pub fn format_age(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let days = minutes / MINUTES_PER_DAY;
    let hours = (minutes % MINUTES_PER_DAY) / 60;
    if days > 0 {
        format!("{days:02} d {hours:02} h")
    } else {
        format!("{hours:02} h {:02} m", minutes % 60)
    }
}

fn tally_columns(tally: &JobTally) -> String {
    format!(
        "{:>3}q / {:>3}r / {:>3}c",
        tally.queued, tally.in_progress, tally.completed
    )
}

fn row_line(row: &RunRow) -> String {
    format!(
        "{:>3}.  {:>10}  {}  {:>20}  {:>13}  {:<15}  {:>9}  {}",
        row.sequence,
        row.run_id,
        tally_columns(&row.tally),
        truncate(&row.workflow_name, NAME_WIDTH),
        truncate(&row.event, EVENT_WIDTH),
        truncate(&row.repository, REPO_WIDTH),
        format_age(row.age_minutes),
        truncate(&row.source, SOURCE_WIDTH),
    )
}

/// Fixed-width table: header, rule, one line per run, totals.
pub fn render_table(report: &UsageReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4}  {:>10}  {:>18}  {:>20}  {:>13}  {:<15}  {:<9}  {}",
        "", "wf id", "queue/  run / comp", "name", "event", "repo", "created", "source"
    );
    let _ = writeln!(out, "{:>4}  {}", "", "-".repeat(RULE_WIDTH));
    for row in &report.rows {
        let _ = writeln!(out, "{}", row_line(row));
    }
    let _ = writeln!(
        out,
        "{:>4}  {:>10}  {}",
        "",
        "Total:",
        tally_columns(&report.totals)
    );
    out
}

pub fn render_json(report: &UsageReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Prints one `.` per repository (plus an `e` per retry) and one `.` per run.
pub struct MarkerProgress<W: Write> {
    out: W,
}

impl<W: Write> MarkerProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        // Write failures never abort the scan.
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}

impl<W: Write> ProgressSink for MarkerProgress<W> {
    fn report(&mut self, event: Progress) {
        match event {
            Progress::ScanStarted { organization, .. } => {
                self.emit(&format!(
                    "Finding workflows running on all repositories on {organization}\n"
                ));
            }
            Progress::RepositoryScanned { retries, .. } => {
                let mut marks = String::from(".");
                marks.extend(std::iter::repeat('e').take(retries as usize));
                self.emit(&marks);
            }
            Progress::AnalysisStarted { .. } => self.emit("\n\nAnalyzing jobs\n"),
            Progress::RunAnalyzed { .. } => self.emit("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_row() -> RunRow {
        RunRow {
            sequence: 1,
            run_id: 1001,
            tally: JobTally::new(0, 1, 2),
            workflow_name: "Build".to_string(),
            event: "push".to_string(),
            repository: "api".to_string(),
            age_minutes: 75,
            source: "acme/api:main".to_string(),
        }
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("release-pipeline", 7), "release");
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate("déploiement", 3), "dép");
        assert_eq!(truncate("", 5), "");
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(0), "00 h 00 m");
        assert_eq!(format_age(75), "01 h 15 m");
        assert_eq!(format_age(1439), "23 h 59 m");
        assert_eq!(format_age(1440), "01 d 00 h");
        assert_eq!(format_age(3 * 1440 + 125), "03 d 02 h");
        assert_eq!(format_age(-5), "00 h 00 m");
    }

    #[test]
    fn test_row_layout() {
        assert_eq!(
            row_line(&sample_row()),
            "  1.        1001    0q /   1r /   2c                 Build           push  api              01 h 15 m  acme/api:main"
        );
    }

    #[test]
    fn test_long_fields_are_cut() {
        let mut row = sample_row();
        row.workflow_name = "Integration tests on every supported platform".to_string();
        row.repository = "a-very-long-repository-name".to_string();
        row.source = "x".repeat(60);

        let line = row_line(&row);
        assert!(line.contains("Integration tests on"));
        assert!(!line.contains("every supported"));
        assert!(line.contains("a-very-long-rep "));
        assert!(line.ends_with(&"x".repeat(SOURCE_WIDTH)));
        assert!(!line.ends_with(&"x".repeat(SOURCE_WIDTH + 1)));
    }

    #[test]
    fn test_render_table() {
        let report = UsageReport {
            organization: "acme".to_string(),
            generated_at: Utc::now(),
            rows: vec![sample_row()],
            totals: JobTally::new(0, 1, 2),
        };

        let table = render_table(&report);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("wf id"));
        assert!(lines[0].ends_with("source"));
        assert_eq!(lines[1].trim().len(), RULE_WIDTH);
        assert_eq!(lines[2], row_line(&sample_row()));
        assert_eq!(lines[3], "          Total:    0q /   1r /   2c");
        assert_eq!(lines.iter().filter(|l| l.trim_start().starts_with("---")).count(), 1);
    }

    #[test]
    fn test_render_json() {
        let report = UsageReport {
            organization: "acme".to_string(),
            generated_at: Utc::now(),
            rows: vec![sample_row()],
            totals: JobTally::new(0, 1, 2),
        };

        let json: serde_json::Value = serde_json::from_str(&render_json(&report).unwrap()).unwrap();
        assert_eq!(json["organization"], "acme");
        assert_eq!(json["rows"][0]["run_id"], 1001);
        assert_eq!(json["totals"]["completed"], 2);
    }

    #[test]
    fn test_marker_progress() {
        let mut sink = MarkerProgress::new(Vec::new());
        sink.report(Progress::ScanStarted {
            organization: "acme".to_string(),
            repositories: 2,
        });
        sink.report(Progress::RepositoryScanned {
            repository: "acme/api".to_string(),
            retries: 0,
        });
        sink.report(Progress::RepositoryScanned {
            repository: "acme/web".to_string(),
            retries: 3,
        });
        sink.report(Progress::AnalysisStarted { runs: 2 });
        sink.report(Progress::RunAnalyzed {
            sequence: 1,
            run_id: 7,
        });
        sink.report(Progress::RunAnalyzed {
            sequence: 2,
            run_id: 8,
        });

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            "Finding workflows running on all repositories on acme\n..eee\n\nAnalyzing jobs\n.."
        );
    }
}
