use std::ffi::{c_void, CStr};
use std::marker::PhantomData;
use std::ptr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap_sys::ext::audio_ports::{clap_plugin_audio_ports, CLAP_EXT_AUDIO_PORTS};
use clap_sys::ext::note_ports::{clap_plugin_note_ports, CLAP_EXT_NOTE_PORTS};
use clap_sys::ext::params::{clap_plugin_params, CLAP_EXT_PARAMS};
use clap_sys::ext::state::{clap_plugin_state, CLAP_EXT_STATE};
use clap_sys::plugin::clap_plugin;
use clap_sys::process::{clap_process, clap_process_status, CLAP_PROCESS_ERROR};
use thiserror::Error;

use crate::audio::ProcessData;
use crate::ext::{AudioPortsExt, NotePortsExt, ParamsExt, StateExt};
use crate::host::ValidatorHost;
use crate::library::{ClapLibrary, PluginMetadata};

/// Activation and processing status of a plug-in instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
    Inactive,
    ActiveAndSleeping,
    ActiveAndProcessing,
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("the plug-in has not been initialized")]
    NotInitialized,
    #[error("the plug-in's init() returned false")]
    InitFailed,
    #[error("the plug-in's activate() returned false")]
    ActivationFailed,
    #[error("the plug-in's start_processing() returned false")]
    StartProcessingFailed,
    #[error("cannot call {operation}() while the plug-in is {status:?}")]
    InvalidTransition {
        operation: &'static str,
        status: PluginStatus,
    },
    #[error("the plug-in does not expose {0}()")]
    MissingFunction(&'static str),
}

/// A single plug-in instance created through a library's plugin factory.
///
/// The wrapper enforces the CLAP lifecycle: transitions to an adjacent state
/// that is already current are silent no-ops, forbidden jumps fail without
/// touching the plug-in, and teardown cascades through
/// stop-processing → deactivate → destroy. The borrow on the library
/// guarantees no instance outlives the shared object it came from.
pub struct Plugin<'lib> {
    plugin: *const clap_plugin,
    host: Arc<ValidatorHost>,
    id: String,
    status: PluginStatus,
    initialized: bool,
    _library: PhantomData<&'lib ClapLibrary>,
}

impl<'lib> Plugin<'lib> {
    /// # Safety
    ///
    /// `plugin` must be a live instance created against `host`, and the
    /// library it came from must outlive the returned wrapper.
    pub(crate) unsafe fn new(
        plugin: *const clap_plugin,
        host: Arc<ValidatorHost>,
        id: &str,
    ) -> Plugin<'lib> {
        host.set_current_plugin(plugin);
        Plugin {
            plugin,
            host,
            id: id.to_owned(),
            status: PluginStatus::Inactive,
            initialized: false,
            _library: PhantomData,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> PluginStatus {
        self.status
    }

    pub fn host(&self) -> &Arc<ValidatorHost> {
        &self.host
    }

    fn plugin(&self) -> &clap_plugin {
        unsafe { &*self.plugin }
    }

    /// Initialize the plug-in. Required before anything else; calling it a
    /// second time is a no-op.
    pub fn init(&mut self) -> Result<(), PluginError> {
        if self.initialized {
            return Ok(());
        }

        let init = self.plugin().init.ok_or(PluginError::MissingFunction("init"))?;
        if !unsafe { init(self.plugin) } {
            return Err(PluginError::InitFailed);
        }

        self.initialized = true;
        Ok(())
    }

    pub fn activate(
        &mut self,
        sample_rate: f64,
        min_frames: u32,
        max_frames: u32,
    ) -> Result<(), PluginError> {
        if !self.initialized {
            return Err(PluginError::NotInitialized);
        }
        match self.status {
            PluginStatus::ActiveAndSleeping => return Ok(()),
            PluginStatus::ActiveAndProcessing => {
                return Err(PluginError::InvalidTransition {
                    operation: "activate",
                    status: self.status,
                })
            }
            PluginStatus::Inactive => (),
        }

        let activate = self
            .plugin()
            .activate
            .ok_or(PluginError::MissingFunction("activate"))?;
        if !unsafe { activate(self.plugin, sample_rate, min_frames, max_frames) } {
            return Err(PluginError::ActivationFailed);
        }

        self.status = PluginStatus::ActiveAndSleeping;
        Ok(())
    }

    pub fn deactivate(&mut self) -> Result<(), PluginError> {
        match self.status {
            PluginStatus::Inactive => return Ok(()),
            PluginStatus::ActiveAndProcessing => {
                return Err(PluginError::InvalidTransition {
                    operation: "deactivate",
                    status: self.status,
                })
            }
            PluginStatus::ActiveAndSleeping => (),
        }

        if let Some(deactivate) = self.plugin().deactivate {
            unsafe { deactivate(self.plugin) };
        }

        self.status = PluginStatus::Inactive;
        Ok(())
    }

    /// A null `start_processing` on the plug-in side means the plug-in does
    /// not need the notification; the state still advances.
    pub fn start_processing(&mut self) -> Result<(), PluginError> {
        match self.status {
            PluginStatus::ActiveAndProcessing => return Ok(()),
            PluginStatus::Inactive => {
                return Err(PluginError::InvalidTransition {
                    operation: "start_processing",
                    status: self.status,
                })
            }
            PluginStatus::ActiveAndSleeping => (),
        }

        if let Some(start_processing) = self.plugin().start_processing {
            if !unsafe { start_processing(self.plugin) } {
                return Err(PluginError::StartProcessingFailed);
            }
        }

        self.status = PluginStatus::ActiveAndProcessing;
        Ok(())
    }

    pub fn stop_processing(&mut self) -> Result<(), PluginError> {
        match self.status {
            PluginStatus::ActiveAndSleeping => return Ok(()),
            PluginStatus::Inactive => {
                return Err(PluginError::InvalidTransition {
                    operation: "stop_processing",
                    status: self.status,
                })
            }
            PluginStatus::ActiveAndProcessing => (),
        }

        if let Some(stop_processing) = self.plugin().stop_processing {
            unsafe { stop_processing(self.plugin) };
        }

        self.status = PluginStatus::ActiveAndSleeping;
        Ok(())
    }

    /// Run one processing cycle. Defined only while the plug-in is
    /// `ActiveAndProcessing`; in any other state this yields
    /// `CLAP_PROCESS_ERROR` without calling into the plug-in.
    pub fn process(&mut self, data: &mut ProcessData) -> clap_process_status {
        if self.status != PluginStatus::ActiveAndProcessing {
            return CLAP_PROCESS_ERROR;
        }
        let Some(process) = self.plugin().process else {
            return CLAP_PROCESS_ERROR;
        };

        let process_data = clap_process {
            steady_time: data.steady_time,
            frames_count: data.buffers.frame_count(),
            transport: ptr::null(),
            audio_inputs: data.buffers.inputs_ptr(),
            audio_outputs: data.buffers.outputs_mut_ptr(),
            audio_inputs_count: data.buffers.input_port_count(),
            audio_outputs_count: data.buffers.output_port_count(),
            in_events: data.input_events.as_raw(),
            out_events: data.output_events.as_raw(),
        };

        unsafe { process(self.plugin, &process_data) }
    }

    /// The descriptor stored on the instance itself, for comparison against
    /// what the factory reported.
    pub fn descriptor(&self) -> Result<PluginMetadata> {
        let descriptor = unsafe { self.plugin().desc.as_ref() }
            .context("the plugin instance has a null descriptor")?;
        unsafe { PluginMetadata::from_descriptor(descriptor) }
    }

    /// Query a raw extension pointer. The result is never cached; each call
    /// goes back to the plug-in.
    pub fn get_extension(&self, extension_id: &CStr) -> *const c_void {
        let Some(get_extension) = self.plugin().get_extension else {
            return ptr::null();
        };
        unsafe { get_extension(self.plugin, extension_id.as_ptr()) }
    }

    pub fn params(&self) -> Option<ParamsExt<'_>> {
        let extension = self.get_extension(CLAP_EXT_PARAMS) as *const clap_plugin_params;
        unsafe { extension.as_ref() }.map(|extension| ParamsExt::new(self.plugin, extension))
    }

    pub fn state(&self) -> Option<StateExt<'_>> {
        let extension = self.get_extension(CLAP_EXT_STATE) as *const clap_plugin_state;
        unsafe { extension.as_ref() }.map(|extension| StateExt::new(self.plugin, extension))
    }

    pub fn note_ports(&self) -> Option<NotePortsExt<'_>> {
        let extension = self.get_extension(CLAP_EXT_NOTE_PORTS) as *const clap_plugin_note_ports;
        unsafe { extension.as_ref() }.map(|extension| NotePortsExt::new(self.plugin, extension))
    }

    pub fn audio_ports(&self) -> Option<AudioPortsExt<'_>> {
        let extension = self.get_extension(CLAP_EXT_AUDIO_PORTS) as *const clap_plugin_audio_ports;
        unsafe { extension.as_ref() }.map(|extension| AudioPortsExt::new(self.plugin, extension))
    }
}

impl Drop for Plugin<'_> {
    fn drop(&mut self) {
        if self.status == PluginStatus::ActiveAndProcessing {
            let _ = self.stop_processing();
        }
        if self.status == PluginStatus::ActiveAndSleeping {
            let _ = self.deactivate();
        }
        if self.initialized {
            if let Some(destroy) = self.plugin().destroy {
                unsafe { destroy(self.plugin) };
            }
        }

        self.host.clear_current_plugin();
    }
}
