//! Parameter conversion, fuzzing, and event namespace tests.

use std::collections::HashSet;

use anyhow::Result;
use clap_host::ffi::events::CLAP_CORE_EVENT_SPACE_ID;
use clap_host::ffi::process::CLAP_PROCESS_ERROR;
use clap_host::{AudioPortConfig, ClapLibrary, OutOfPlaceAudioBuffers, ParamInfo, PluginEvent};
use rand::Rng;

use super::{
    check_host_callbacks, instantiate, process_once, random_param_value, read_param_values,
    BLOCK_SIZE, SAMPLE_RATE,
};
use crate::tests::TestOutcome;

/// Deterministic, implementation-defined tolerance for value→text→value
/// round-trips.
const TEXT_CONVERSION_TOLERANCE: f64 = 1e-6;

/// Random parameter permutations and random audio buffers per permutation for
/// the fuzzing test.
const FUZZ_RUNS: usize = 50;
const BUFFERS_PER_RUN: usize = 5;

/// An event space ID no plug-in should ever act upon.
const WRONG_EVENT_SPACE_ID: u16 = 0xB33F;

pub(super) fn test_param_conversions(
    library: &ClapLibrary,
    plugin_id: &str,
) -> Result<TestOutcome> {
    let (host, plugin) = instantiate(library, plugin_id)?;
    let Some(params) = plugin.params() else {
        return Ok(TestOutcome::skipped(
            "the plugin does not support the params extension",
        ));
    };
    let infos = params.all_info()?;
    if infos.is_empty() {
        return Ok(TestOutcome::skipped("the plugin has no parameters"));
    }

    let mut seen_ids = HashSet::new();
    for info in &infos {
        if !seen_ids.insert(info.id) {
            return Ok(TestOutcome::failed(format!(
                "the parameter ID {} is used by more than one parameter",
                info.id
            )));
        }
    }

    let (supported, unsupported): (Vec<&ParamInfo>, Vec<&ParamInfo>) = infos
        .iter()
        .partition(|info| params.value_to_text(info.id, info.default_value).is_some());
    if !supported.is_empty() && !unsupported.is_empty() {
        return Ok(TestOutcome::failed(format!(
            "value to text conversion works for the parameter '{}' but not for '{}'; conversions \
             should be supported for either all or none of the parameters",
            supported[0].name, unsupported[0].name
        )));
    }
    if supported.is_empty() {
        return Ok(check_host_callbacks(
            &host,
            TestOutcome::skipped("the plugin does not support text conversions"),
        ));
    }

    for info in supported {
        for value in [info.min_value, info.default_value, info.max_value] {
            let Some(text) = params.value_to_text(info.id, value) else {
                return Ok(TestOutcome::failed(format!(
                    "value_to_text() failed for the parameter '{}' with value {value}",
                    info.name
                )));
            };
            let Some(roundtripped) = params.text_to_value(info.id, &text) else {
                return Ok(TestOutcome::failed(format!(
                    "text_to_value() failed for the parameter '{}' with the text '{text}' it \
                     produced itself",
                    info.name
                )));
            };
            if (roundtripped - value).abs() > TEXT_CONVERSION_TOLERANCE {
                return Ok(TestOutcome::failed(format!(
                    "the value {value} for the parameter '{}' became {roundtripped} after \
                     converting it to '{text}' and back",
                    info.name
                )));
            }

            let Some(restringed) = params.value_to_text(info.id, roundtripped) else {
                return Ok(TestOutcome::failed(format!(
                    "value_to_text() failed for the parameter '{}' with the round-tripped value \
                     {roundtripped}",
                    info.name
                )));
            };
            if restringed != text {
                return Ok(TestOutcome::failed(format!(
                    "the text conversion for the parameter '{}' is not stable: '{text}' became \
                     '{restringed}'",
                    info.name
                )));
            }
        }
    }

    Ok(check_host_callbacks(&host, TestOutcome::success()))
}

pub(super) fn test_param_fuzz_basic(library: &ClapLibrary, plugin_id: &str) -> Result<TestOutcome> {
    let (host, mut plugin) = instantiate(library, plugin_id)?;
    let infos = match plugin.params() {
        Some(params) => params.all_info()?,
        None => {
            return Ok(TestOutcome::skipped(
                "the plugin does not support the params extension",
            ))
        }
    };
    let ports = AudioPortConfig::from_plugin(&plugin)?;

    plugin.activate(SAMPLE_RATE, BLOCK_SIZE, BLOCK_SIZE)?;
    plugin.start_processing()?;

    let mut buffers = OutOfPlaceAudioBuffers::new(&ports, BLOCK_SIZE);
    let mut rng = rand::thread_rng();
    let mut steady_time: i64 = 0;
    for _ in 0..FUZZ_RUNS {
        let events: Vec<PluginEvent> = infos
            .iter()
            .map(|info| {
                PluginEvent::param_value(
                    0,
                    CLAP_CORE_EVENT_SPACE_ID,
                    info.id,
                    info.cookie,
                    random_param_value(&mut rng, info),
                )
            })
            .collect();

        for buffer_index in 0..BUFFERS_PER_RUN {
            buffers.fill_inputs_with(|_, _, _| rng.gen_range(-1.0..=1.0));
            // The parameter permutation applies with the first buffer of the
            // run and the plugin keeps processing with those values.
            let events = if buffer_index == 0 { events.as_slice() } else { &[] };
            let status = process_once(&mut plugin, &mut buffers, events, steady_time);
            if status == CLAP_PROCESS_ERROR {
                return Ok(TestOutcome::failed(
                    "process() returned an error status while fuzzing parameter values",
                ));
            }
            if let Some(sample) = buffers.find_non_finite_output() {
                return Ok(TestOutcome::failed(sample.to_string()));
            }

            steady_time += i64::from(BLOCK_SIZE);
        }
    }

    plugin.stop_processing()?;
    plugin.deactivate()?;

    Ok(check_host_callbacks(&host, TestOutcome::success()))
}

pub(super) fn test_param_set_wrong_namespace(
    library: &ClapLibrary,
    plugin_id: &str,
) -> Result<TestOutcome> {
    let (host, mut plugin) = instantiate(library, plugin_id)?;
    let infos = match plugin.params() {
        Some(params) => params.all_info()?,
        None => {
            return Ok(TestOutcome::skipped(
                "the plugin does not support the params extension",
            ))
        }
    };
    if infos.is_empty() {
        return Ok(TestOutcome::skipped("the plugin has no parameters"));
    }

    let initial_values = read_param_values(&plugin, &infos)?;
    let ports = AudioPortConfig::from_plugin(&plugin)?;

    plugin.activate(SAMPLE_RATE, BLOCK_SIZE, BLOCK_SIZE)?;
    plugin.start_processing()?;

    let events: Vec<PluginEvent> = infos
        .iter()
        .zip(&initial_values)
        .map(|(info, &current)| {
            PluginEvent::param_value(
                0,
                WRONG_EVENT_SPACE_ID,
                info.id,
                info.cookie,
                nudged_value(info, current),
            )
        })
        .collect();

    let mut buffers = OutOfPlaceAudioBuffers::new(&ports, BLOCK_SIZE);
    buffers.fill_inputs_ramp();
    process_once(&mut plugin, &mut buffers, &events, 0);

    plugin.stop_processing()?;
    plugin.deactivate()?;

    let current_values = read_param_values(&plugin, &infos)?;
    for (info, (&initial, &current)) in
        infos.iter().zip(initial_values.iter().zip(&current_values))
    {
        if current != initial {
            return Ok(TestOutcome::failed(format!(
                "the parameter '{}' changed from {initial} to {current} after a PARAM_VALUE event \
                 with the event space ID 0x{WRONG_EVENT_SPACE_ID:04X}; events from unknown \
                 namespaces must be ignored",
                info.name
            )));
        }
    }

    Ok(check_host_callbacks(&host, TestOutcome::success()))
}

/// A value that observably differs from `current` so a plug-in that skips the
/// namespace check actually moves.
fn nudged_value(info: &ParamInfo, current: f64) -> f64 {
    let midpoint = (info.min_value + info.max_value) / 2.0;
    let target = if (midpoint - current).abs() > f64::EPSILON {
        midpoint
    } else {
        info.max_value
    };

    if info.is_stepped() {
        target.round()
    } else {
        target
    }
}
