//! Console output for violations and the final verdict

use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};

use crate::scanner::ScanSummary;
use crate::walker::{ErrorSink, Segment, ValidationError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Serialize)]
struct JsonViolation<'e> {
    file: Option<&'e str>,
    context: &'e [Segment],
    member: &'e str,
    detail: String,
}

#[derive(Serialize)]
struct JsonSummary {
    passed: bool,
    error_count: usize,
    files_scanned: usize,
    duration_ms: u128,
}

/// Writes each violation as soon as the walker reports it.
pub struct Reporter<W: Write> {
    out: W,
    format: OutputFormat,
    color: bool,
    emitted: usize,
}

impl Reporter<io::Stdout> {
    pub fn stdout(format: OutputFormat) -> Self {
        let color = colored::control::SHOULD_COLORIZE.should_colorize();
        Self::new(io::stdout(), format, color)
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: OutputFormat, color: bool) -> Self {
        Self {
            out,
            format,
            color,
            emitted: 0,
        }
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_error(&mut self, error: &ValidationError) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                let line = error.to_string();
                if self.color {
                    writeln!(self.out, "{} {}", "✗".red().bold(), line.red())
                } else {
                    writeln!(self.out, "{line}")
                }
            }
            OutputFormat::Json => {
                let record = JsonViolation {
                    file: error.context.file(),
                    context: error.context.segments(),
                    member: &error.member,
                    detail: error.violation.to_string(),
                };
                writeln!(self.out, "{}", serde_json::to_string(&record)?)
            }
        }
    }

    /// Final verdict. The pass summary is only written when `verbose_on_success` is set.
    pub fn finish(&mut self, summary: &ScanSummary, verbose_on_success: bool) -> io::Result<()> {
        let duration_ms = summary.duration.as_millis();

        match self.format {
            OutputFormat::Json => {
                let record = JsonSummary {
                    passed: summary.passed(),
                    error_count: summary.error_count,
                    files_scanned: summary.files_scanned,
                    duration_ms,
                };
                writeln!(self.out, "{}", serde_json::to_string(&record)?)?;
            }
            OutputFormat::Text if summary.passed() => {
                if verbose_on_success {
                    let line = format!(
                        "Validation passed: {} file(s) scanned in {} ms",
                        summary.files_scanned, duration_ms
                    );
                    if self.color {
                        writeln!(self.out, "{} {}", "✓".green().bold(), line.green())?;
                    } else {
                        writeln!(self.out, "{line}")?;
                    }
                }
            }
            OutputFormat::Text => {
                let line = format!(
                    "Validation failed: {} error(s) in {} file(s) scanned in {} ms",
                    summary.error_count, summary.files_scanned, duration_ms
                );
                if self.color {
                    writeln!(self.out, "{}", line.red().bold())?;
                } else {
                    writeln!(self.out, "{line}")?;
                }
            }
        }

        self.out.flush()
    }
}

impl<W: Write> ErrorSink for Reporter<W> {
    fn emit(&mut self, error: ValidationError) {
        self.emitted += 1;
        if let Err(err) = self.write_error(&error) {
            tracing::warn!("Failed to write diagnostic: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::{ContextPath, Violation};
    use std::time::Duration;

    fn error() -> ValidationError {
        ValidationError {
            context: ContextPath::for_file("res://Scenes/Level.tscn")
                .child(Segment::Node {
                    path: "Level/Player".into(),
                })
                .child(Segment::Element {
                    field: "items".into(),
                    index: 2,
                }),
            member: "icon".into(),
            violation: Violation::AssignmentRequired,
        }
    }

    fn summary(error_count: usize) -> ScanSummary {
        ScanSummary {
            error_count,
            files_scanned: 3,
            duration: Duration::from_millis(42),
        }
    }

    fn output(reporter: Reporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_text_failure_report() {
        let mut reporter = Reporter::new(Vec::new(), OutputFormat::Text, false);
        reporter.emit(error());
        reporter.finish(&summary(1), true).unwrap();

        assert_eq!(reporter.emitted(), 1);
        assert_eq!(
            output(reporter),
            "res://Scenes/Level.tscn :: Level/Player > items[2] :: icon -> Assignment required\n\
             Validation failed: 1 error(s) in 3 file(s) scanned in 42 ms\n"
        );
    }

    #[test]
    fn test_text_success_is_optional() {
        let mut quiet = Reporter::new(Vec::new(), OutputFormat::Text, false);
        quiet.finish(&summary(0), false).unwrap();
        assert_eq!(output(quiet), "");

        let mut verbose = Reporter::new(Vec::new(), OutputFormat::Text, false);
        verbose.finish(&summary(0), true).unwrap();
        assert_eq!(output(verbose), "Validation passed: 3 file(s) scanned in 42 ms\n");
    }

    #[test]
    fn test_json_lines() {
        let mut reporter = Reporter::new(Vec::new(), OutputFormat::Json, false);
        reporter.emit(error());
        reporter.finish(&summary(1), false).unwrap();

        let text = output(reporter);
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["file"], "res://Scenes/Level.tscn");
        assert_eq!(lines[0]["member"], "icon");
        assert_eq!(lines[0]["detail"], "Assignment required");
        assert_eq!(lines[0]["context"][2]["kind"], "element");
        assert_eq!(lines[0]["context"][2]["index"], 2);
        assert_eq!(lines[1]["passed"], false);
        assert_eq!(lines[1]["error_count"], 1);
    }
}
