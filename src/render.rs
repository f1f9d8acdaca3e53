//! Rendering of compilation issues with source snippets, using ariadne.

use std::io::Write;
use std::ops::Range;

use ariadne::{Color, Label, Report, ReportKind, Source};
use celrt_core::api::Severity;

use crate::compilation::Issue;
use crate::error::Error;

const SOURCE_ID: &str = "<input>";

/// Render issues to a String without color codes (useful for tests and logs).
pub fn render_issues_to_string(source: &str, issues: &[Issue]) -> String {
    let mut buf = Vec::new();
    render_issues_to_writer(source, issues, &mut buf, false).ok();
    String::from_utf8_lossy(&buf).to_string()
}

/// Render an error. Compilation errors show each issue against the source;
/// anything else is a single line.
pub fn render_error_to(
    source: &str,
    error: &Error,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    match error {
        Error::Compilation { issues, .. } if !issues.is_empty() => {
            render_issues_to_writer(source, issues, writer, use_color)
        }
        other => writeln!(writer, "{}", other),
    }
}

pub fn render_issues_to_writer(
    source: &str,
    issues: &[Issue],
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    for issue in issues {
        let (kind, color) = match issue.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
            Severity::Info => (ReportKind::Advice, Color::Cyan),
        };
        let span = issue
            .location
            .map(|l| char_span(source, l.line, l.column))
            .unwrap_or(0..0);

        let mut report = Report::build(kind, (SOURCE_ID, span.clone()))
            .with_message(&issue.message)
            .with_config(ariadne::Config::default().with_color(use_color));
        if issue.location.is_some() {
            report = report.with_label(
                Label::new((SOURCE_ID, span))
                    .with_message(&issue.message)
                    .with_color(color),
            );
        }
        report
            .finish()
            .write((SOURCE_ID, Source::from(source)), &mut *writer)?;
    }
    Ok(())
}

/// Character range of one code point at a 1-based line and column, clamped
/// to the source.
fn char_span(source: &str, line: u32, column: u32) -> Range<usize> {
    let mut offset = 0;
    for (index, text) in source.split('\n').enumerate() {
        let length = text.chars().count();
        if index + 1 == line as usize {
            let start = offset + (column.saturating_sub(1) as usize).min(length);
            return start..start + 1;
        }
        offset += length + 1;
    }
    let end = source.chars().count();
    end..end
}
