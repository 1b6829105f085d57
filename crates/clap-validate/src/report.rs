//! Test results, tallying, and the human and JSON reporting sinks.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use colored::{ColoredString, Colorize};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Success,
    Failed,
    Crashed,
    Skipped,
    Warning,
}

impl TestStatus {
    fn tag(self) -> ColoredString {
        match self {
            TestStatus::Success => "PASS".green().bold(),
            TestStatus::Failed => "FAIL".red().bold(),
            TestStatus::Crashed => "CRASH".red().bold(),
            TestStatus::Skipped => "SKIP".dimmed(),
            TestStatus::Warning => "WARN".yellow().bold(),
        }
    }
}

/// The result of running a single test case.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub description: String,
    pub status: TestStatus,
    pub details: Option<String>,
}

impl TestResult {
    pub fn is_failed_or_warning(&self) -> bool {
        matches!(
            self.status,
            TestStatus::Failed | TestStatus::Crashed | TestStatus::Warning
        )
    }

    fn print(&self) {
        println!("    [{}] {}", self.status.tag(), self.name);
        if let Some(details) = &self.details {
            println!("           {details}");
        } else if self.is_failed_or_warning() {
            // A failure with no diagnostic at least shows what was asserted.
            println!("           {}", self.description);
        }
    }
}

/// Aggregated counts over every result the reporter saw. Crashes count as
/// failures.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct Tally {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub warnings: u32,
}

impl Tally {
    pub fn record(&mut self, status: TestStatus) {
        match status {
            TestStatus::Success => self.passed += 1,
            TestStatus::Failed | TestStatus::Crashed => self.failed += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::Warning => self.warnings += 1,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.failed > 0 {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }

    fn print(&self) {
        println!();
        println!("Summary:");
        println!("  Passed:   {}", self.passed);
        println!("  Failed:   {}", self.failed);
        println!("  Skipped:  {}", self.skipped);
        println!("  Warnings: {}", self.warnings);
    }
}

#[derive(Debug, Serialize)]
struct JsonResult {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    plugin_id: Option<String>,
    test: String,
    status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug, Serialize)]
struct JsonReport {
    results: Vec<JsonResult>,
    summary: Tally,
}

/// Collects results as they are produced. Human output is printed
/// immediately; JSON output is accumulated and serialized once at the end
/// since a JSON document cannot be emitted piecemeal.
pub struct Reporter {
    json: bool,
    only_failed: bool,
    results: Vec<JsonResult>,
    tally: Tally,
}

impl Reporter {
    pub fn new(json: bool, only_failed: bool) -> Self {
        Self {
            json,
            only_failed,
            results: Vec::new(),
            tally: Tally::default(),
        }
    }

    /// A section heading, printed in human mode only.
    pub fn heading(&self, text: &str) {
        if !self.json {
            println!("{text}");
        }
    }

    pub fn push(&mut self, path: &Path, plugin_id: Option<&str>, result: &TestResult) {
        self.tally.record(result.status);
        if self.json {
            self.results.push(JsonResult {
                path: path.display().to_string(),
                plugin_id: plugin_id.map(str::to_owned),
                test: result.name.clone(),
                status: result.status,
                details: result.details.clone(),
            });
        } else if !self.only_failed || result.is_failed_or_warning() {
            result.print();
        }
    }

    /// A library that could not be loaded at all. The path is skipped for
    /// further tests and the failure is reflected in the tally.
    pub fn load_error(&mut self, path: &Path, err: &anyhow::Error) {
        self.tally.record(TestStatus::Failed);
        error!(path = %path.display(), "could not load the plugin library: {err:#}");
        if !self.json {
            println!("  Error loading library: {err:#}");
        }
    }

    pub fn finish(self) -> Result<ExitCode> {
        if self.json {
            let report = JsonReport {
                results: self.results,
                summary: self.tally,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            self.tally.print();
        }

        Ok(self.tally.exit_code())
    }
}
