//! Typed accessors for the plug-in-side extensions the validator consults.

use std::ffi::{c_char, c_void, CStr, CString};
use std::mem;

use anyhow::{bail, Context, Result};
use clap_sys::ext::audio_ports::{clap_audio_port_info, clap_plugin_audio_ports};
use clap_sys::ext::note_ports::{clap_note_port_info, clap_plugin_note_ports};
use clap_sys::ext::params::{clap_param_info, clap_plugin_params, CLAP_PARAM_IS_STEPPED};
use clap_sys::ext::state::clap_plugin_state;
use clap_sys::id::clap_id;
use clap_sys::plugin::clap_plugin;
use clap_sys::string_sizes::CLAP_NAME_SIZE;

use crate::events::{InputEvents, OutputEvents};
use crate::stream::{InputStream, OutputStream};

/// A snapshot of a single parameter's info record, with the name copied out of
/// the fixed-size C array.
#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub id: clap_id,
    pub name: String,
    pub flags: u32,
    pub cookie: *mut c_void,
    pub min_value: f64,
    pub max_value: f64,
    pub default_value: f64,
}

impl ParamInfo {
    pub fn is_stepped(&self) -> bool {
        self.flags & CLAP_PARAM_IS_STEPPED != 0
    }
}

/// The plug-in's params extension.
pub struct ParamsExt<'a> {
    plugin: *const clap_plugin,
    ext: &'a clap_plugin_params,
}

impl<'a> ParamsExt<'a> {
    pub(crate) fn new(plugin: *const clap_plugin, ext: &'a clap_plugin_params) -> Self {
        Self { plugin, ext }
    }

    pub fn count(&self) -> u32 {
        match self.ext.count {
            Some(count) => unsafe { count(self.plugin) },
            None => 0,
        }
    }

    pub fn info(&self, index: u32) -> Result<ParamInfo> {
        let get_info = self
            .ext
            .get_info
            .context("the params extension has no get_info function")?;
        let mut info: clap_param_info = unsafe { mem::zeroed() };
        if !unsafe { get_info(self.plugin, index, &mut info) } {
            bail!("get_info() returned false for parameter index {index}");
        }

        let name = unsafe { CStr::from_ptr(info.name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        Ok(ParamInfo {
            id: info.id,
            name,
            flags: info.flags,
            cookie: info.cookie,
            min_value: info.min_value,
            max_value: info.max_value,
            default_value: info.default_value,
        })
    }

    pub fn all_info(&self) -> Result<Vec<ParamInfo>> {
        (0..self.count()).map(|index| self.info(index)).collect()
    }

    pub fn value(&self, param_id: clap_id) -> Result<f64> {
        let get_value = self
            .ext
            .get_value
            .context("the params extension has no get_value function")?;
        let mut value = 0.0f64;
        if !unsafe { get_value(self.plugin, param_id, &mut value) } {
            bail!("get_value() returned false for parameter {param_id}");
        }
        Ok(value)
    }

    /// Convert a value to its display string, or `None` when the plug-in does
    /// not support the conversion for this parameter.
    pub fn value_to_text(&self, param_id: clap_id, value: f64) -> Option<String> {
        let value_to_text = self.ext.value_to_text?;
        let mut buffer = [0 as c_char; CLAP_NAME_SIZE];
        if !unsafe {
            value_to_text(
                self.plugin,
                param_id,
                value,
                buffer.as_mut_ptr(),
                buffer.len() as u32,
            )
        } {
            return None;
        }

        Some(
            unsafe { CStr::from_ptr(buffer.as_ptr()) }
                .to_string_lossy()
                .into_owned(),
        )
    }

    pub fn text_to_value(&self, param_id: clap_id, text: &str) -> Option<f64> {
        let text_to_value = self.ext.text_to_value?;
        let text = CString::new(text).ok()?;
        let mut value = 0.0f64;
        unsafe { text_to_value(self.plugin, param_id, text.as_ptr(), &mut value) }
            .then_some(value)
    }

    /// Flush parameter events outside of `process()`. Legal on the main thread
    /// while the plug-in is inactive.
    pub fn flush(&self, input_events: &InputEvents, output_events: &OutputEvents) -> Result<()> {
        let flush = self
            .ext
            .flush
            .context("the params extension has no flush function")?;
        unsafe { flush(self.plugin, input_events.as_raw(), output_events.as_raw()) };
        Ok(())
    }
}

/// The plug-in's state extension, driven through the validator's stream
/// wrappers.
pub struct StateExt<'a> {
    plugin: *const clap_plugin,
    ext: &'a clap_plugin_state,
}

impl<'a> StateExt<'a> {
    pub(crate) fn new(plugin: *const clap_plugin, ext: &'a clap_plugin_state) -> Self {
        Self { plugin, ext }
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        let save = self
            .ext
            .save
            .context("the state extension has no save function")?;
        let mut buffer = Vec::new();
        let stream = OutputStream::new(&mut buffer);
        if !unsafe { save(self.plugin, stream.as_raw()) } {
            bail!("state save() returned false");
        }
        drop(stream);
        Ok(buffer)
    }

    /// Present `data` to `load()` and report what the plug-in returned.
    pub fn load(&self, data: &[u8]) -> Result<bool> {
        let load = self
            .ext
            .load
            .context("the state extension has no load function")?;
        let stream = InputStream::new(data);
        Ok(unsafe { load(self.plugin, stream.as_raw()) })
    }

    /// Like [`load`][Self::load], but the stream serves at most `max_chunk`
    /// bytes per read so the plug-in has to cope with short reads.
    pub fn load_buffered(&self, data: &[u8], max_chunk: usize) -> Result<bool> {
        let load = self
            .ext
            .load
            .context("the state extension has no load function")?;
        let stream = InputStream::with_max_chunk(data, max_chunk);
        Ok(unsafe { load(self.plugin, stream.as_raw()) })
    }
}

/// The plug-in's note ports extension.
pub struct NotePortsExt<'a> {
    plugin: *const clap_plugin,
    ext: &'a clap_plugin_note_ports,
}

impl<'a> NotePortsExt<'a> {
    pub(crate) fn new(plugin: *const clap_plugin, ext: &'a clap_plugin_note_ports) -> Self {
        Self { plugin, ext }
    }

    pub fn count(&self, is_input: bool) -> u32 {
        match self.ext.count {
            Some(count) => unsafe { count(self.plugin, is_input) },
            None => 0,
        }
    }

    pub fn port_name(&self, index: u32, is_input: bool) -> Result<String> {
        let get = self
            .ext
            .get
            .context("the note ports extension has no get function")?;
        let mut info: clap_note_port_info = unsafe { mem::zeroed() };
        if !unsafe { get(self.plugin, index, is_input, &mut info) } {
            bail!(
                "note port get() returned false for {} port {index}",
                direction(is_input)
            );
        }

        Ok(unsafe { CStr::from_ptr(info.name.as_ptr()) }
            .to_string_lossy()
            .into_owned())
    }
}

/// The plug-in's audio ports extension.
pub struct AudioPortsExt<'a> {
    plugin: *const clap_plugin,
    ext: &'a clap_plugin_audio_ports,
}

impl<'a> AudioPortsExt<'a> {
    pub(crate) fn new(plugin: *const clap_plugin, ext: &'a clap_plugin_audio_ports) -> Self {
        Self { plugin, ext }
    }

    pub fn count(&self, is_input: bool) -> u32 {
        match self.ext.count {
            Some(count) => unsafe { count(self.plugin, is_input) },
            None => 0,
        }
    }

    pub fn channel_count(&self, index: u32, is_input: bool) -> Result<u32> {
        let get = self
            .ext
            .get
            .context("the audio ports extension has no get function")?;
        let mut info: clap_audio_port_info = unsafe { mem::zeroed() };
        if !unsafe { get(self.plugin, index, is_input, &mut info) } {
            bail!(
                "audio port get() returned false for {} port {index}",
                direction(is_input)
            );
        }
        Ok(info.channel_count)
    }
}

fn direction(is_input: bool) -> &'static str {
    if is_input {
        "input"
    } else {
        "output"
    }
}
