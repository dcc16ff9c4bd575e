//! Functions exported for the managed caller.
//!
//! Each function uses the `extern "C"` ABI and the symbol name the .NET
//! bindings import. They are thin: argument translation happens here, the
//! work happens in the typed modules. Errors never unwind across the
//! boundary; they become null handles or `Z4D_*` status codes.

#![allow(non_snake_case)]

use std::ffi::{c_char, c_int, c_void, CStr};
use std::path::Path;
use std::ptr;
use std::time::Duration;

use tracing::{error, warn};

use crate::config::BridgeConfig;
use crate::config_types;
use crate::error::{BridgeError, Z4D_ERR_INVALID_ARGUMENT, Z4D_ERR_INVALID_STRING, Z4D_OK};
use crate::event_loop::EventLoop;
use crate::logging;
use crate::marshal::{self, EventHeader};
use crate::sdk::{self, EnrollCallback, EnrollCompletion, EnrollOptions, EnrollRequest, SdkContext};
use crate::string_array;
use crate::timer::{self, Timer, TimerCallback};
use crate::version::{self, BridgeVersion};

fn report(operation: &str, err: &BridgeError) -> c_int {
    error!("{} failed: {}", operation, err);
    err.status()
}

// =============================================================================
// Event loop
// =============================================================================

/// Returns the process-wide default loop, or null if it cannot be created.
#[no_mangle]
pub extern "C" fn z4d_default_loop() -> *mut EventLoop {
    match EventLoop::default_loop() {
        Ok(event_loop) => event_loop as *const EventLoop as *mut EventLoop,
        Err(e) => {
            report("z4d_default_loop", &e);
            ptr::null_mut()
        }
    }
}

/// Creates an independent loop owned by the caller. Null on failure.
#[no_mangle]
pub extern "C" fn newLoop() -> *mut EventLoop {
    match EventLoop::new() {
        Ok(event_loop) => Box::into_raw(Box::new(event_loop)),
        Err(e) => {
            report("newLoop", &e);
            ptr::null_mut()
        }
    }
}

/// Runs the loop until no work remains.
///
/// Returns 0 when the loop drained, the number of pending tasks when
/// stopped early, or a negative `Z4D_*` code.
///
/// # Safety
///
/// `event_loop` must be null or a live loop handle.
#[no_mangle]
pub unsafe extern "C" fn z4d_uv_run(event_loop: *mut EventLoop) -> c_int {
    let Some(event_loop) = event_loop.as_ref() else {
        return Z4D_ERR_INVALID_ARGUMENT;
    };
    match event_loop.run() {
        Ok(pending) => c_int::try_from(pending).unwrap_or(c_int::MAX),
        Err(e) => report("z4d_uv_run", &e),
    }
}

/// Asks a running loop to return after the current callback.
///
/// # Safety
///
/// `event_loop` must be null or a live loop handle.
#[no_mangle]
pub unsafe extern "C" fn z4d_uv_stop(event_loop: *mut EventLoop) {
    if let Some(event_loop) = event_loop.as_ref() {
        event_loop.stop();
    }
}

/// Releases a loop created with [`newLoop`].
///
/// # Safety
///
/// `event_loop` must be null or a live handle from [`newLoop`]; it must not
/// be used after this returns `Z4D_OK`.
#[no_mangle]
pub unsafe extern "C" fn z4d_loop_close(event_loop: *mut EventLoop) -> c_int {
    let Some(handle) = event_loop.as_ref() else {
        return Z4D_ERR_INVALID_ARGUMENT;
    };
    if handle.is_default() {
        warn!("refusing to close the default loop");
        return Z4D_ERR_INVALID_ARGUMENT;
    }
    if handle.is_running() {
        return report("z4d_loop_close", &BridgeError::LoopBusy);
    }
    Box::from_raw(event_loop).close();
    Z4D_OK
}

// =============================================================================
// Timers
// =============================================================================

/// Arms a timer: first firing after `delay` ms, then every `repeat` ms
/// (`repeat == 0` fires once). Null if `event_loop` or `callback` is null.
///
/// # Safety
///
/// `event_loop` must be null or a live loop handle.
#[no_mangle]
pub unsafe extern "C" fn z4d_registerUVTimer(
    event_loop: *mut EventLoop,
    callback: Option<TimerCallback>,
    delay: u64,
    repeat: u64,
) -> *mut Timer {
    let (Some(event_loop), Some(callback)) = (event_loop.as_ref(), callback) else {
        return ptr::null_mut();
    };
    timer::register(
        event_loop,
        callback,
        Duration::from_millis(delay),
        Duration::from_millis(repeat),
    )
}

/// Stops a timer and releases its handle.
///
/// # Safety
///
/// `timer` must be null or a live handle from [`z4d_registerUVTimer`].
#[no_mangle]
pub unsafe extern "C" fn z4d_stop_uv_timer(timer: *mut Timer) {
    timer::stop(timer);
}

// =============================================================================
// Arrays and events
// =============================================================================

/// Returns `array[index]`, or null if `array` is null. Not bounds checked.
///
/// # Safety
///
/// `index` must be below the array's length.
#[no_mangle]
pub unsafe extern "C" fn ziti_service_array_get(
    array: *const *mut c_void,
    index: c_int,
) -> *mut c_void {
    marshal::element_at(array, index as usize)
}

/// Number of elements before the null terminator; 0 for a null array.
///
/// # Safety
///
/// `array` must be null or null-terminated.
#[no_mangle]
pub unsafe extern "C" fn z4d_array_len(array: *const *mut c_void) -> c_int {
    c_int::try_from(marshal::null_terminated_len(array)).unwrap_or(c_int::MAX)
}

/// Reads an event's discriminant.
///
/// # Safety
///
/// `event` must point to a live event record; null is not checked.
#[no_mangle]
pub unsafe extern "C" fn ziti_event_type_from_pointer(event: *const EventHeader) -> c_int {
    marshal::event_kind(event)
}

// =============================================================================
// String arrays
// =============================================================================

/// Allocates `size` empty string slots. Null on failure.
#[no_mangle]
pub extern "C" fn make_char_array(size: c_int) -> *mut *mut c_char {
    string_array::make_raw(size)
}

/// Stores `value` at `index`, taking ownership of it.
///
/// # Safety
///
/// See [`string_array::set_raw`].
#[no_mangle]
pub unsafe extern "C" fn set_char_at(array: *mut *mut c_char, value: *mut c_char, index: c_int) {
    string_array::set_raw(array, value, index as usize);
}

/// Frees every set slot in `[0, size)` and the array itself.
///
/// # Safety
///
/// See [`string_array::free_raw`].
#[no_mangle]
pub unsafe extern "C" fn free_char_array(array: *mut *mut c_char, size: c_int) {
    string_array::free_raw(array, usize::try_from(size).unwrap_or(0));
}

/// Copies a string with the allocator [`free_char_array`] releases with.
///
/// # Safety
///
/// `value` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn z4d_strdup(value: *const c_char) -> *mut c_char {
    string_array::duplicate(value)
}

/// Static `{"all", NULL}` list. Must not be freed.
#[no_mangle]
pub extern "C" fn z4d_all_config_types() -> *const *const c_char {
    config_types::all_config_types()
}

// =============================================================================
// SDK hand-off
// =============================================================================

/// Starts enrollment; `callback` receives `context` back exactly once.
///
/// Returns the SDK's status, or a negative `Z4D_*` code when the request
/// could not be handed over.
///
/// # Safety
///
/// `options` and `event_loop` must be null or valid; string fields of
/// `options` must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn z4d_ziti_enroll(
    options: *const EnrollOptions,
    event_loop: *mut EventLoop,
    callback: Option<EnrollCallback>,
    context: *mut c_void,
) -> c_int {
    let (Some(options), Some(event_loop), Some(callback)) =
        (options.as_ref(), event_loop.as_ref(), callback)
    else {
        return Z4D_ERR_INVALID_ARGUMENT;
    };

    let request = match EnrollRequest::from_options(options) {
        Ok(request) => request,
        Err(e) => return report("z4d_ziti_enroll", &e),
    };
    let completion = EnrollCompletion::new(callback, context);
    sdk::enroll(event_loop, request, completion).unwrap_or_else(|e| report("z4d_ziti_enroll", &e))
}

/// Writes the SDK context's state to the log.
#[no_mangle]
pub extern "C" fn z4d_ziti_dump_log(context: *mut c_void) {
    if let Err(e) = sdk::dump_to_log(SdkContext::from_ptr(context)) {
        report("z4d_ziti_dump_log", &e);
    }
}

/// Writes the SDK context's state to `output_file`.
///
/// # Safety
///
/// `output_file` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn z4d_ziti_dump_file(context: *mut c_void, output_file: *const c_char) {
    if output_file.is_null() {
        warn!("z4d_ziti_dump_file called without a file name");
        return;
    }
    let Ok(path) = CStr::from_ptr(output_file).to_str() else {
        warn!("z4d_ziti_dump_file called with a non UTF-8 file name");
        return;
    };
    if let Err(e) = sdk::dump_to_file(SdkContext::from_ptr(context), Path::new(path)) {
        report("z4d_ziti_dump_file", &e);
    }
}

/// Accepted for binding compatibility; connections are closed by the SDK.
#[no_mangle]
pub extern "C" fn z4d_ziti_close(_connection: *mut c_void) -> c_int {
    Z4D_OK
}

// =============================================================================
// Library
// =============================================================================

/// Returns the static version record.
#[no_mangle]
pub extern "C" fn z4d_get_version() -> *const BridgeVersion {
    version::version()
}

/// Installs the bridge's log subscriber.
///
/// `config_json` is a JSON [`BridgeConfig`]; null reads the environment.
/// Returns 1 if installed, 0 if a subscriber already existed, or a negative
/// `Z4D_*` code.
///
/// # Safety
///
/// `config_json` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn z4d_init_logging(config_json: *const c_char) -> c_int {
    let config = if config_json.is_null() {
        BridgeConfig::from_env()
    } else {
        match CStr::from_ptr(config_json).to_str() {
            Ok(json) => BridgeConfig::from_json(json),
            Err(_) => return Z4D_ERR_INVALID_STRING,
        }
    };

    match config {
        Ok(config) => c_int::from(logging::init(&config)),
        Err(e) => e.status(),
    }
}
