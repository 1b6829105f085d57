//! The `validate` command: runs the conformance test suite over one or more
//! plug-in libraries.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use clap_host::ClapLibrary;
use tracing::debug;

use crate::report::Reporter;
use crate::tests::{self, TestFilter};

#[derive(Args, Debug)]
pub struct ValidateSettings {
    /// Paths to one or more .clap plug-ins to validate
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Only test the plug-in with the given ID
    #[arg(long, value_name = "ID")]
    pub plugin_id: Option<String>,

    /// Only run tests whose name matches this case-insensitive regex. An
    /// invalid regex matches as a literal substring instead.
    #[arg(long, value_name = "PATTERN")]
    pub test: Option<String>,

    /// Run the tests that do not match the test filter instead
    #[arg(long)]
    pub invert_filter: bool,

    /// Print the results as JSON
    #[arg(long)]
    pub json: bool,

    /// Only print failed tests
    #[arg(long)]
    pub only_failed: bool,

    /// Run the tests inside this process. This is currently the only
    /// supported mode.
    #[arg(long)]
    pub in_process: bool,
}

pub fn run(settings: &ValidateSettings) -> Result<ExitCode> {
    if !settings.in_process {
        debug!("out-of-process validation is not available yet, running in-process");
    }

    let filter = TestFilter::new(settings.test.as_deref(), settings.invert_filter);
    let mut reporter = Reporter::new(settings.json, settings.only_failed);

    for path in &settings.paths {
        reporter.heading(&format!("\nValidating: {}", path.display()));

        reporter.heading("  Library tests:");
        for case in tests::library::TESTS {
            if !filter.matches(case.name) {
                continue;
            }
            let result = tests::run_library_test(case.name, path);
            reporter.push(path, None, &result);
        }

        // One load for all of the path's plugin tests. A library that cannot
        // be loaded is reported once and skipped.
        let library = match ClapLibrary::load(path) {
            Ok(library) => library,
            Err(err) => {
                reporter.load_error(path, &err);
                continue;
            }
        };
        let metadata = match library.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                reporter.load_error(path, &err);
                continue;
            }
        };
        if !metadata.version_is_compatible() {
            reporter.heading(&format!(
                "  Skipping: incompatible CLAP version {}.{}.{}",
                metadata.version_major, metadata.version_minor, metadata.version_revision
            ));
            continue;
        }

        for plugin_metadata in &metadata.plugins {
            if let Some(only_id) = &settings.plugin_id {
                if &plugin_metadata.id != only_id {
                    continue;
                }
            }

            reporter.heading(&format!(
                "  Plugin: {} ({})",
                plugin_metadata.name, plugin_metadata.id
            ));
            for case in tests::plugin::TESTS {
                if !filter.matches(case.name) {
                    continue;
                }
                let result = tests::run_plugin_test(case.name, &library, &plugin_metadata.id);
                reporter.push(path, Some(&plugin_metadata.id), &result);
            }
        }
    }

    reporter.finish()
}
