//! Safe(-ish) wrappers around the CLAP ABI for hosting and validating plug-ins.
//!
//! The layering mirrors the ABI: [`ClapLibrary`] owns a loaded shared object
//! and its entry point, [`ValidatorHost`] implements the host-side function
//! tables a plug-in calls back into, and [`Plugin`] wraps a single instance
//! behind the lifecycle state machine the ABI mandates. The remaining modules
//! provide the plumbing needed to drive `process()` and the state extension:
//! audio buffers, event lists, and byte streams.

mod audio;
mod events;
mod ext;
mod host;
mod instance;
mod library;
mod stream;

pub use audio::{AudioPortConfig, NonFiniteSample, OutOfPlaceAudioBuffers, ProcessData};
pub use events::{InputEvents, OutputEvents, PluginEvent};
pub use ext::{AudioPortsExt, NotePortsExt, ParamInfo, ParamsExt, StateExt};
pub use host::{AudioThreadGuard, ValidatorHost};
pub use instance::{Plugin, PluginError, PluginStatus};
pub use library::{resolve_library_binary, ClapLibrary, LibraryMetadata, PluginMetadata};
pub use stream::{InputStream, OutputStream};

/// Re-export the raw bindings for users that need to drop down to the ABI.
pub use clap_sys as ffi;
