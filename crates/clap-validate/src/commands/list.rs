//! The `list` command: installed plug-ins, available tests, and presets.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Subcommand;
use clap_host::ClapLibrary;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::search;
use crate::tests;
use crate::util;

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// List all installed CLAP plug-ins
    Plugins {
        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all available test cases
    Tests {
        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },
    /// List presets for all installed CLAP plug-ins
    Presets {
        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: &ListCommand) -> Result<ExitCode> {
    match command {
        ListCommand::Plugins { json } => list_plugins(*json),
        ListCommand::Tests { json } => list_tests(*json),
        ListCommand::Presets { json } => list_presets(*json),
    }
}

#[derive(Debug, Serialize)]
struct InstalledPlugin {
    path: String,
    id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vendor: Option<String>,
}

fn list_plugins(json: bool) -> Result<ExitCode> {
    let paths = search::installed_plugins();
    let mut plugins = Vec::new();
    let mut had_load_errors = false;

    for path in &paths {
        let metadata = ClapLibrary::load(path).and_then(|library| library.metadata());
        match metadata {
            Ok(metadata) => {
                for plugin in metadata.plugins {
                    plugins.push(InstalledPlugin {
                        path: path.display().to_string(),
                        id: plugin.id,
                        name: plugin.name,
                        version: plugin.version,
                        vendor: plugin.vendor,
                    });
                }
            }
            Err(err) => {
                had_load_errors = true;
                warn!(path = %path.display(), "could not scan the plugin: {err:#}");
                eprintln!("Warning: could not scan {}: {err:#}", path.display());
            }
        }
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "plugins": plugins }))?
        );
    } else {
        println!("Installed CLAP plugins:");
        println!();
        for plugin in &plugins {
            print!("  {}", plugin.name);
            if let Some(version) = &plugin.version {
                print!(" v{version}");
            }
            if let Some(vendor) = &plugin.vendor {
                print!(" by {vendor}");
            }
            println!();
            println!("    ID: {}", plugin.id);
            println!("    Path: {}", plugin.path);
            println!();
        }
        if plugins.is_empty() {
            println!("  No plugins found.");
        }
    }

    if had_load_errors {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn list_tests(json: bool) -> Result<ExitCode> {
    if json {
        let mut library_tests = serde_json::Map::new();
        for case in tests::library::TESTS {
            library_tests.insert(case.name.to_owned(), json!(case.description));
        }
        let mut plugin_tests = serde_json::Map::new();
        for case in tests::plugin::TESTS {
            plugin_tests.insert(case.name.to_owned(), json!(case.description));
        }

        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "plugin-library-tests": library_tests,
                "plugin-tests": plugin_tests,
            }))?
        );
    } else {
        println!("Plugin library tests:");
        for case in tests::library::TESTS {
            println!("  {}", case.name);
            println!("    {}", case.description);
            println!();
        }

        println!("Plugin tests:");
        for case in tests::plugin::TESTS {
            println!("  {}", case.name);
            println!("    {}", case.description);
            println!();
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn list_presets(json: bool) -> Result<ExitCode> {
    // Preset indexing will keep its on-disk artifacts here once implemented.
    let scratch_dir = util::validator_temp_dir()
        .context("could not create the validator's temporary directory")?;
    debug!(dir = %scratch_dir.display(), "preset index scratch directory");

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "presets": [],
                "note": "preset discovery is not implemented yet",
            }))?
        );
    } else {
        println!("Preset discovery is not implemented yet.");
    }

    Ok(ExitCode::SUCCESS)
}
