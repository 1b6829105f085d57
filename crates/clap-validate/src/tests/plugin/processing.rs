//! Audio and note processing tests.

use anyhow::Result;
use clap_host::ffi::process::CLAP_PROCESS_ERROR;
use clap_host::{AudioPortConfig, ClapLibrary, OutOfPlaceAudioBuffers, PluginEvent};

use super::{check_host_callbacks, instantiate, process_once, BLOCK_SIZE, SAMPLE_RATE};
use crate::tests::TestOutcome;

pub(super) fn test_process_audio_basic(
    library: &ClapLibrary,
    plugin_id: &str,
) -> Result<TestOutcome> {
    let (host, mut plugin) = instantiate(library, plugin_id)?;
    let ports = AudioPortConfig::from_plugin(&plugin)?;

    plugin.activate(SAMPLE_RATE, BLOCK_SIZE, BLOCK_SIZE)?;
    plugin.start_processing()?;

    let mut buffers = OutOfPlaceAudioBuffers::new(&ports, BLOCK_SIZE);
    buffers.fill_inputs_ramp();
    let status = process_once(&mut plugin, &mut buffers, &[], 0);

    plugin.stop_processing()?;
    plugin.deactivate()?;

    if status == CLAP_PROCESS_ERROR {
        return Ok(TestOutcome::failed("process() returned an error status"));
    }
    if let Some(sample) = buffers.find_non_finite_output() {
        return Ok(TestOutcome::failed(sample.to_string()));
    }

    Ok(check_host_callbacks(&host, TestOutcome::success()))
}

pub(super) fn test_process_note_basic(
    library: &ClapLibrary,
    plugin_id: &str,
) -> Result<TestOutcome> {
    let (host, mut plugin) = instantiate(library, plugin_id)?;
    if plugin.note_ports().is_none() {
        return Ok(TestOutcome::skipped(
            "the plugin does not support the note ports extension",
        ));
    }
    let ports = AudioPortConfig::from_plugin(&plugin)?;

    plugin.activate(SAMPLE_RATE, BLOCK_SIZE, BLOCK_SIZE)?;
    plugin.start_processing()?;

    let mut buffers = OutOfPlaceAudioBuffers::new(&ports, BLOCK_SIZE);
    buffers.fill_inputs_ramp();
    let status = process_once(&mut plugin, &mut buffers, &[], 0);

    plugin.stop_processing()?;
    plugin.deactivate()?;

    if status == CLAP_PROCESS_ERROR {
        return Ok(TestOutcome::failed("process() returned an error status"));
    }
    if let Some(sample) = buffers.find_non_finite_output() {
        return Ok(TestOutcome::failed(sample.to_string()));
    }

    Ok(check_host_callbacks(&host, TestOutcome::success()))
}

pub(super) fn test_process_note_inconsistent(
    library: &ClapLibrary,
    plugin_id: &str,
) -> Result<TestOutcome> {
    let (host, mut plugin) = instantiate(library, plugin_id)?;
    if plugin.note_ports().is_none() {
        return Ok(TestOutcome::skipped(
            "the plugin does not support the note ports extension",
        ));
    }
    let ports = AudioPortConfig::from_plugin(&plugin)?;

    plugin.activate(SAMPLE_RATE, BLOCK_SIZE, BLOCK_SIZE)?;
    plugin.start_processing()?;

    // Deliberately mismatched and malformed note event sequences. A robust
    // plug-in shrugs these off without corrupting its voice state.
    let events = vec![
        PluginEvent::note_on(0, 0, 0, 64, 0.78),
        PluginEvent::note_off(16, 0, 0, 64, 0.5),
        // A second note-off for a note that already ended.
        PluginEvent::note_off(17, 0, 0, 64, 0.5),
        // A note-off for a note that never started.
        PluginEvent::note_off(32, 0, 0, 41, 0.0),
        // A note on a port index the plugin does not have.
        PluginEvent::note_on(64, 13, 0, 64, 0.9),
        PluginEvent::note_on(96, 0, 0, 127, 1.0),
        // Out-of-range channel and key values.
        PluginEvent::note_on(128, 0, 16, 200, 0.5),
        // A raw MIDI note-off for a note that was started as a CLAP event.
        PluginEvent::midi(160, 0, [0x80, 96, 64]),
    ];

    let mut buffers = OutOfPlaceAudioBuffers::new(&ports, BLOCK_SIZE);
    buffers.fill_inputs_ramp();
    let status = process_once(&mut plugin, &mut buffers, &events, 0);

    plugin.stop_processing()?;
    plugin.deactivate()?;

    if status == CLAP_PROCESS_ERROR {
        return Ok(TestOutcome::failed(
            "process() returned an error status for inconsistent but well-formed note events",
        ));
    }
    if let Some(sample) = buffers.find_non_finite_output() {
        return Ok(TestOutcome::failed(sample.to_string()));
    }

    Ok(check_host_callbacks(&host, TestOutcome::success()))
}
