use std::cell::UnsafeCell;
use std::ffi::{c_char, c_void, CStr};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use clap_sys::ext::params::{
    clap_host_params, clap_param_clear_flags, clap_param_rescan_flags, CLAP_EXT_PARAMS,
};
use clap_sys::ext::state::{clap_host_state, CLAP_EXT_STATE};
use clap_sys::ext::thread_check::{clap_host_thread_check, CLAP_EXT_THREAD_CHECK};
use clap_sys::host::clap_host;
use clap_sys::id::clap_id;
use clap_sys::plugin::clap_plugin;
use clap_sys::version::CLAP_VERSION;
use parking_lot::Mutex;

const HOST_NAME: &CStr = c"clap-validate";
const HOST_VENDOR: &CStr = c"clap-validate";
const HOST_URL: &CStr = c"https://github.com/free-audio/clap";
const HOST_VERSION: &CStr = c"0.1.0";

/// The host a plug-in under validation is instantiated against.
///
/// The embedded `clap_host` struct and the extension tables are fully
/// initialized before the host is shared and never move afterwards, so the
/// addresses handed to a plug-in stay stable for the host's whole lifetime.
/// The thread that constructs the host is its main thread; the audio thread is
/// whatever thread currently holds an [`AudioThreadGuard`].
///
/// Callbacks invoked from the wrong thread record an error in a slot that only
/// keeps the first message; tests inspect it through
/// [`take_callback_error`][Self::take_callback_error].
pub struct ValidatorHost {
    clap_host: UnsafeCell<clap_host>,
    thread_check_ext: clap_host_thread_check,
    params_ext: clap_host_params,
    state_ext: clap_host_state,

    main_thread_id: ThreadId,
    audio_thread_id: Mutex<Option<ThreadId>>,

    callback_error: Mutex<Option<String>>,
    current_plugin: Mutex<*const clap_plugin>,

    requested_restart: AtomicBool,
    requested_callback: AtomicBool,
}

// The function tables are written once in `new()` before the `Arc` is shared;
// everything mutable afterwards sits behind a lock or an atomic.
unsafe impl Send for ValidatorHost {}
unsafe impl Sync for ValidatorHost {}

impl ValidatorHost {
    pub fn new() -> Arc<ValidatorHost> {
        let host = Arc::new(ValidatorHost {
            clap_host: UnsafeCell::new(clap_host {
                clap_version: CLAP_VERSION,
                host_data: ptr::null_mut(),
                name: HOST_NAME.as_ptr(),
                vendor: HOST_VENDOR.as_ptr(),
                url: HOST_URL.as_ptr(),
                version: HOST_VERSION.as_ptr(),
                get_extension: Some(Self::get_extension),
                request_restart: Some(Self::request_restart),
                request_process: Some(Self::request_process),
                request_callback: Some(Self::request_callback),
            }),
            thread_check_ext: clap_host_thread_check {
                is_main_thread: Some(Self::ext_is_main_thread),
                is_audio_thread: Some(Self::ext_is_audio_thread),
            },
            params_ext: clap_host_params {
                rescan: Some(Self::params_rescan),
                clear: Some(Self::params_clear),
                request_flush: Some(Self::params_request_flush),
            },
            state_ext: clap_host_state {
                mark_dirty: Some(Self::state_mark_dirty),
            },
            main_thread_id: thread::current().id(),
            audio_thread_id: Mutex::new(None),
            callback_error: Mutex::new(None),
            current_plugin: Mutex::new(ptr::null()),
            requested_restart: AtomicBool::new(false),
            requested_callback: AtomicBool::new(false),
        });

        // Plug-in callbacks recover the host through this self pointer. The
        // write happens before the host is shared with anything.
        unsafe {
            (*host.clap_host.get()).host_data = Arc::as_ptr(&host) as *mut c_void;
        }

        host
    }

    /// The `clap_host` struct to pass to plug-ins.
    pub fn as_clap_host(&self) -> *const clap_host {
        self.clap_host.get()
    }

    /// While an [`AudioThreadGuard`] marks this thread as the audio thread,
    /// it does not count as the main thread even though processing is driven
    /// from the same OS thread.
    pub fn is_main_thread(&self) -> bool {
        !self.is_audio_thread() && thread::current().id() == self.main_thread_id
    }

    pub fn is_audio_thread(&self) -> bool {
        *self.audio_thread_id.lock() == Some(thread::current().id())
    }

    /// The first error recorded by a host callback, if any.
    pub fn callback_error(&self) -> Option<String> {
        self.callback_error.lock().clone()
    }

    /// Takes the first recorded callback error, clearing the slot. Tests call
    /// this after exercising a plug-in; any recorded error turns an otherwise
    /// successful test into a failure.
    pub fn take_callback_error(&self) -> Option<String> {
        self.callback_error.lock().take()
    }

    pub fn requested_restart(&self) -> bool {
        self.requested_restart.load(Ordering::SeqCst)
    }

    pub fn clear_requested_restart(&self) {
        self.requested_restart.store(false, Ordering::SeqCst);
    }

    pub fn requested_callback(&self) -> bool {
        self.requested_callback.load(Ordering::SeqCst)
    }

    /// Services a pending `request_callback()` by calling `on_main_thread()`
    /// on the current plug-in.
    pub fn handle_callbacks_once(&self) {
        if self.requested_callback.swap(false, Ordering::SeqCst) {
            let plugin = *self.current_plugin.lock();
            if let Some(plugin) = unsafe { plugin.as_ref() } {
                if let Some(on_main_thread) = plugin.on_main_thread {
                    unsafe { on_main_thread(plugin) };
                }
            }
        }
    }

    pub(crate) fn set_current_plugin(&self, plugin: *const clap_plugin) {
        *self.current_plugin.lock() = plugin;
    }

    pub(crate) fn clear_current_plugin(&self) {
        *self.current_plugin.lock() = ptr::null();
    }

    pub(crate) fn set_audio_thread(&self, thread_id: ThreadId) {
        *self.audio_thread_id.lock() = Some(thread_id);
    }

    pub(crate) fn clear_audio_thread(&self) {
        *self.audio_thread_id.lock() = None;
    }

    fn set_callback_error(&self, message: String) {
        let mut slot = self.callback_error.lock();
        if slot.is_none() {
            *slot = Some(message);
        }
    }

    fn expect_main_thread(&self, function: &str) {
        if !self.is_main_thread() {
            self.set_callback_error(format!("{function} must be called from the main thread"));
        }
    }

    fn expect_not_audio_thread(&self, function: &str) {
        if self.is_audio_thread() {
            self.set_callback_error(format!("{function} must not be called from the audio thread"));
        }
    }

    unsafe fn from_clap_host<'a>(host: *const clap_host) -> Option<&'a ValidatorHost> {
        let host = host.as_ref()?;
        (host.host_data as *const ValidatorHost).as_ref()
    }

    unsafe extern "C" fn get_extension(
        host: *const clap_host,
        extension_id: *const c_char,
    ) -> *const c_void {
        let Some(host) = Self::from_clap_host(host) else {
            return ptr::null();
        };
        if extension_id.is_null() {
            return ptr::null();
        }

        let extension_id = CStr::from_ptr(extension_id);
        if extension_id == CLAP_EXT_THREAD_CHECK {
            &host.thread_check_ext as *const clap_host_thread_check as *const c_void
        } else if extension_id == CLAP_EXT_PARAMS {
            &host.params_ext as *const clap_host_params as *const c_void
        } else if extension_id == CLAP_EXT_STATE {
            &host.state_ext as *const clap_host_state as *const c_void
        } else {
            ptr::null()
        }
    }

    unsafe extern "C" fn request_restart(host: *const clap_host) {
        if let Some(host) = Self::from_clap_host(host) {
            host.requested_restart.store(true, Ordering::SeqCst);
        }
    }

    unsafe extern "C" fn request_process(_host: *const clap_host) {
        // The validator drives processing itself, so this is accepted silently.
    }

    unsafe extern "C" fn request_callback(host: *const clap_host) {
        if let Some(host) = Self::from_clap_host(host) {
            host.requested_callback.store(true, Ordering::SeqCst);
        }
    }

    unsafe extern "C" fn ext_is_main_thread(host: *const clap_host) -> bool {
        Self::from_clap_host(host).is_some_and(|host| host.is_main_thread())
    }

    unsafe extern "C" fn ext_is_audio_thread(host: *const clap_host) -> bool {
        Self::from_clap_host(host).is_some_and(|host| host.is_audio_thread())
    }

    unsafe extern "C" fn params_rescan(host: *const clap_host, _flags: clap_param_rescan_flags) {
        if let Some(host) = Self::from_clap_host(host) {
            host.expect_main_thread("clap_host_params::rescan()");
        }
    }

    unsafe extern "C" fn params_clear(
        host: *const clap_host,
        _param_id: clap_id,
        _flags: clap_param_clear_flags,
    ) {
        if let Some(host) = Self::from_clap_host(host) {
            host.expect_main_thread("clap_host_params::clear()");
        }
    }

    unsafe extern "C" fn params_request_flush(host: *const clap_host) {
        if let Some(host) = Self::from_clap_host(host) {
            host.expect_not_audio_thread("clap_host_params::request_flush()");
        }
    }

    unsafe extern "C" fn state_mark_dirty(host: *const clap_host) {
        if let Some(host) = Self::from_clap_host(host) {
            host.expect_main_thread("clap_host_state::mark_dirty()");
        }
    }
}

/// While this guard is alive the current thread counts as the plug-in's audio
/// thread. Acquire it around `process()` and release it before returning to
/// main-thread-only operations. Guards must not nest from different threads.
pub struct AudioThreadGuard<'a> {
    host: &'a ValidatorHost,
}

impl<'a> AudioThreadGuard<'a> {
    pub fn new(host: &'a ValidatorHost) -> Self {
        host.set_audio_thread(thread::current().id());
        Self { host }
    }
}

impl Drop for AudioThreadGuard<'_> {
    fn drop(&mut self) {
        self.host.clear_audio_thread();
    }
}
