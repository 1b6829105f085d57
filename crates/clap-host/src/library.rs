use std::collections::HashSet;
use std::ffi::{c_char, CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap_sys::entry::clap_plugin_entry;
use clap_sys::plugin_factory::{clap_plugin_factory, CLAP_PLUGIN_FACTORY_ID};
use clap_sys::plugin::clap_plugin_descriptor;
use libloading::Library;
use tracing::debug;

use crate::host::ValidatorHost;
use crate::instance::Plugin;

/// Metadata for a single plug-in exposed by a CLAP library, copied out of the
/// descriptor strings so it stays valid independently of the plug-in's memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMetadata {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub vendor: Option<String>,
    pub description: Option<String>,
    pub manual_url: Option<String>,
    pub support_url: Option<String>,
    pub features: Vec<String>,
}

impl PluginMetadata {
    /// # Safety
    ///
    /// All string pointers in `descriptor` must be null or point to valid
    /// null-terminated C strings.
    pub(crate) unsafe fn from_descriptor(descriptor: &clap_plugin_descriptor) -> Result<Self> {
        let id = cstr_to_string(descriptor.id).context("the plugin descriptor has a null ID")?;
        if id.is_empty() {
            bail!("the plugin descriptor has an empty ID");
        }
        let name =
            cstr_to_string(descriptor.name).context("the plugin descriptor has a null name")?;

        Ok(Self {
            id,
            name,
            version: cstr_to_optional_string(descriptor.version),
            vendor: cstr_to_optional_string(descriptor.vendor),
            description: cstr_to_optional_string(descriptor.description),
            manual_url: cstr_to_optional_string(descriptor.manual_url),
            support_url: cstr_to_optional_string(descriptor.support_url),
            features: cstr_array_to_vec(descriptor.features),
        })
    }
}

/// Metadata for an entire CLAP library, which may contain multiple plug-ins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryMetadata {
    pub version_major: u32,
    pub version_minor: u32,
    pub version_revision: u32,
    pub plugins: Vec<PluginMetadata>,
}

impl LibraryMetadata {
    pub fn plugin(&self, id: &str) -> Option<&PluginMetadata> {
        self.plugins.iter().find(|plugin| plugin.id == id)
    }

    /// CLAP versions before 1.0 predate the stable ABI and cannot be validated.
    pub fn version_is_compatible(&self) -> bool {
        self.version_major >= 1
    }
}

/// A dynamically loaded CLAP library and its initialized entry point.
///
/// `clap_entry::init()` runs exactly once at load time and `deinit()` exactly
/// once on drop, strictly before the OS handle is released. Plug-in instances
/// borrow the library so they cannot outlive it.
#[derive(Debug)]
pub struct ClapLibrary {
    path: PathBuf,
    entry: *const clap_plugin_entry,
    _library: Library,
}

unsafe impl Send for ClapLibrary {}
unsafe impl Sync for ClapLibrary {}

impl ClapLibrary {
    /// Load a CLAP library from a path to a `.clap` file or bundle, resolve
    /// its `clap_entry` symbol, and initialize the entry point.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = std::path::absolute(path.as_ref()).with_context(|| {
            format!("could not compute an absolute path for {}", path.as_ref().display())
        })?;
        let binary = resolve_library_binary(&path)?;

        let library = open_library(&binary)?;
        let entry_sym: libloading::Symbol<*const clap_plugin_entry> =
            unsafe { library.get(b"clap_entry") }.with_context(|| {
                format!("{} does not expose a 'clap_entry' symbol", binary.display())
            })?;
        let entry = *entry_sym;
        if entry.is_null() {
            bail!("{} has a null 'clap_entry'", binary.display());
        }

        let init = unsafe { (*entry).init }
            .with_context(|| format!("{}: 'clap_entry' has no init function", binary.display()))?;
        let path_cstr = CString::new(path.to_string_lossy().as_bytes())
            .context("the plugin path contains a NUL byte")?;
        if !unsafe { init(path_cstr.as_ptr()) } {
            bail!("clap_entry::init() returned false for {}", path.display());
        }

        debug!(path = %path.display(), "loaded CLAP library");
        Ok(Self {
            path,
            entry,
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the metadata for all plug-ins stored in this library.
    pub fn metadata(&self) -> Result<LibraryMetadata> {
        let factory = self.plugin_factory()?;
        let get_plugin_count = factory
            .get_plugin_count
            .context("the plugin factory has no get_plugin_count function")?;
        let get_plugin_descriptor = factory
            .get_plugin_descriptor
            .context("the plugin factory has no get_plugin_descriptor function")?;

        let count = unsafe { get_plugin_count(factory) };
        let mut plugins = Vec::with_capacity(count as usize);
        let mut seen_ids = HashSet::new();
        for index in 0..count {
            let descriptor = unsafe { get_plugin_descriptor(factory, index).as_ref() }
                .with_context(|| {
                    format!("the factory returned a null descriptor for plugin index {index}")
                })?;
            let metadata = unsafe { PluginMetadata::from_descriptor(descriptor) }?;
            if !seen_ids.insert(metadata.id.clone()) {
                bail!(
                    "the factory contains multiple entries for the same plugin ID: '{}'",
                    metadata.id
                );
            }
            plugins.push(metadata);
        }

        let version = unsafe { (*self.entry).clap_version };
        Ok(LibraryMetadata {
            version_major: version.major,
            version_minor: version.minor,
            version_revision: version.revision,
            plugins,
        })
    }

    /// Whether `get_factory()` returns a non-null pointer for the given ID.
    pub fn factory_exists(&self, factory_id: &str) -> Result<bool> {
        let get_factory = unsafe { (*self.entry).get_factory }
            .context("'clap_entry' has no get_factory function")?;
        let factory_id = CString::new(factory_id).context("the factory ID contains a NUL byte")?;
        Ok(!unsafe { get_factory(factory_id.as_ptr()) }.is_null())
    }

    pub fn plugin_factory(&self) -> Result<&clap_plugin_factory> {
        let get_factory = unsafe { (*self.entry).get_factory }
            .context("'clap_entry' has no get_factory function")?;
        let factory =
            unsafe { get_factory(CLAP_PLUGIN_FACTORY_ID.as_ptr()) } as *const clap_plugin_factory;
        unsafe { factory.as_ref() }
            .with_context(|| format!("{} does not provide a plugin factory", self.path.display()))
    }

    /// Try to create the plug-in with the given ID against the given host. The
    /// returned instance still needs to be initialized.
    pub fn create_plugin(&self, id: &str, host: Arc<ValidatorHost>) -> Result<Plugin<'_>> {
        let factory = self.plugin_factory()?;
        let create_plugin = factory
            .create_plugin
            .context("the plugin factory has no create_plugin function")?;
        let id_cstr = CString::new(id).context("the plugin ID contains a NUL byte")?;
        let plugin = unsafe { create_plugin(factory, host.as_clap_host(), id_cstr.as_ptr()) };
        if plugin.is_null() {
            bail!("the factory returned a null pointer when creating '{id}'");
        }

        Ok(unsafe { Plugin::new(plugin, host, id) })
    }
}

impl Drop for ClapLibrary {
    fn drop(&mut self) {
        // The handle itself closes when the `Library` field drops, after this.
        if let Some(deinit) = unsafe { (*self.entry).deinit } {
            unsafe { deinit() };
        }
    }
}

/// Resolve the shared object to load for a `.clap` path. On macOS `.clap`
/// plug-ins are bundles and the binary lives in `Contents/MacOS`; everywhere
/// else the path is the shared object itself.
pub fn resolve_library_binary(path: &Path) -> Result<PathBuf> {
    let path = std::path::absolute(path)
        .with_context(|| format!("could not compute an absolute path for {}", path.display()))?;

    #[cfg(target_os = "macos")]
    if path.is_dir() && path.extension().is_some_and(|extension| extension == "clap") {
        return macos_bundle_binary(&path);
    }

    Ok(path)
}

#[cfg(target_os = "macos")]
fn macos_bundle_binary(bundle: &Path) -> Result<PathBuf> {
    let binaries = bundle.join("Contents/MacOS");
    if let Some(stem) = bundle.file_stem().and_then(|stem| stem.to_str()) {
        let preferred = binaries.join(stem);
        if preferred.is_file() {
            return Ok(preferred);
        }
    }

    let mut entries = std::fs::read_dir(&binaries)
        .with_context(|| format!("could not read the bundle directory {}", binaries.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file());
    let binary = entries
        .next()
        .with_context(|| format!("{} does not contain an executable", binaries.display()))?;
    if entries.next().is_some() {
        bail!(
            "{} contains multiple executables and none matches the bundle name",
            binaries.display()
        );
    }

    Ok(binary)
}

fn open_library(binary: &Path) -> Result<Library> {
    #[cfg(unix)]
    {
        use libloading::os::unix::{Library as UnixLibrary, RTLD_LAZY, RTLD_LOCAL};

        let library = unsafe { UnixLibrary::open(Some(binary), RTLD_LOCAL | RTLD_LAZY) }
            .with_context(|| format!("could not load the plugin library {}", binary.display()))?;
        Ok(library.into())
    }

    #[cfg(not(unix))]
    {
        unsafe { Library::new(binary) }
            .with_context(|| format!("could not load the plugin library {}", binary.display()))
    }
}

pub(crate) unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

pub(crate) unsafe fn cstr_to_optional_string(ptr: *const c_char) -> Option<String> {
    cstr_to_string(ptr).filter(|string| !string.is_empty())
}

pub(crate) unsafe fn cstr_array_to_vec(mut array: *const *const c_char) -> Vec<String> {
    let mut strings = Vec::new();
    if array.is_null() {
        return strings;
    }
    while !(*array).is_null() {
        if let Some(string) = cstr_to_string(*array) {
            strings.push(string);
        }
        array = array.add(1);
    }
    strings
}
