//! Descriptor and feature metadata tests.

use std::collections::HashSet;

use anyhow::{Context, Result};
use clap_host::ClapLibrary;

use super::{check_host_callbacks, instantiate};
use crate::tests::TestOutcome;

/// The five main CLAP plug-in categories; every plug-in must belong to at
/// least one of them.
const MAIN_CATEGORY_FEATURES: [&str; 5] = [
    "instrument",
    "audio-effect",
    "note-effect",
    "note-detector",
    "analyzer",
];

pub(super) fn test_descriptor_consistency(
    library: &ClapLibrary,
    plugin_id: &str,
) -> Result<TestOutcome> {
    let metadata = library.metadata()?;
    let factory_metadata = metadata
        .plugin(plugin_id)
        .with_context(|| format!("the factory does not list a plugin with ID '{plugin_id}'"))?;

    let (host, plugin) = instantiate(library, plugin_id)?;
    let instance_descriptor = plugin.descriptor()?;

    if instance_descriptor.id != factory_metadata.id {
        return Ok(TestOutcome::failed(format!(
            "the factory reports the plugin ID '{}' but the instance's descriptor says '{}'",
            factory_metadata.id, instance_descriptor.id
        )));
    }
    if instance_descriptor.name != factory_metadata.name {
        return Ok(TestOutcome::failed(format!(
            "the factory reports the plugin name '{}' but the instance's descriptor says '{}'",
            factory_metadata.name, instance_descriptor.name
        )));
    }

    Ok(check_host_callbacks(&host, TestOutcome::success()))
}

pub(super) fn test_features_categories(
    library: &ClapLibrary,
    plugin_id: &str,
) -> Result<TestOutcome> {
    let metadata = library.metadata()?;
    let plugin_metadata = metadata
        .plugin(plugin_id)
        .with_context(|| format!("the factory does not list a plugin with ID '{plugin_id}'"))?;

    let has_main_category = plugin_metadata
        .features
        .iter()
        .any(|feature| MAIN_CATEGORY_FEATURES.contains(&feature.as_str()));
    if has_main_category {
        Ok(TestOutcome::success())
    } else {
        Ok(TestOutcome::failed(format!(
            "the plugin's features [{}] do not include any of the main categories ({})",
            plugin_metadata.features.join(", "),
            MAIN_CATEGORY_FEATURES.join(", ")
        )))
    }
}

pub(super) fn test_features_duplicates(
    library: &ClapLibrary,
    plugin_id: &str,
) -> Result<TestOutcome> {
    let metadata = library.metadata()?;
    let plugin_metadata = metadata
        .plugin(plugin_id)
        .with_context(|| format!("the factory does not list a plugin with ID '{plugin_id}'"))?;

    let mut seen = HashSet::new();
    for feature in &plugin_metadata.features {
        if !seen.insert(feature.as_str()) {
            return Ok(TestOutcome::failed(format!(
                "the feature '{feature}' appears more than once in the plugin's features array"
            )));
        }
    }

    Ok(TestOutcome::success())
}
