//! End-to-end tests of the exported C surface, called the way the .NET
//! bindings call it.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::io::{self, Write};
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serial_test::serial;

use ziti4dotnet::error::{
    Z4D_ERR_CANCELLED, Z4D_ERR_CONFIG, Z4D_ERR_INVALID_ARGUMENT, Z4D_ERR_LOOP_BUSY,
    Z4D_ERR_SDK_UNAVAILABLE, Z4D_OK,
};
use ziti4dotnet::exports::*;
use ziti4dotnet::sdk::{EnrollCallback, EnrollOptions};
use ziti4dotnet::{
    register_sdk, unregister_sdk, EnrollCompletion, EnrollRequest, EventHeader, EventLoop,
    IdentitySdk, SdkContext, Timer,
};

#[test]
fn default_loop_is_stable() {
    let first = z4d_default_loop();
    assert!(!first.is_null());
    assert_eq!(first, z4d_default_loop());
    assert_eq!(unsafe { z4d_loop_close(first) }, Z4D_ERR_INVALID_ARGUMENT);
}

#[test]
fn new_loop_runs_empty_and_closes() {
    let event_loop = newLoop();
    assert!(!event_loop.is_null());
    assert_ne!(event_loop, z4d_default_loop());
    unsafe {
        assert_eq!(z4d_uv_run(event_loop), 0);
        assert_eq!(z4d_loop_close(event_loop), Z4D_OK);
    }
}

#[test]
fn null_handles_are_rejected() {
    unsafe {
        assert_eq!(z4d_uv_run(ptr::null_mut()), Z4D_ERR_INVALID_ARGUMENT);
        assert_eq!(z4d_loop_close(ptr::null_mut()), Z4D_ERR_INVALID_ARGUMENT);
        assert!(z4d_registerUVTimer(ptr::null_mut(), Some(count_and_stop), 0, 0).is_null());
        let event_loop = newLoop();
        assert!(z4d_registerUVTimer(event_loop, None, 0, 0).is_null());
        assert_eq!(z4d_loop_close(event_loop), Z4D_OK);
        z4d_stop_uv_timer(ptr::null_mut());
        z4d_uv_stop(ptr::null_mut());
    }
}

static REPEAT_HITS: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn count_and_stop(timer: *mut Timer) {
    if REPEAT_HITS.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
        z4d_stop_uv_timer(timer);
    }
}

#[test]
fn repeating_timer_fires_until_stopped() {
    let event_loop = newLoop();
    unsafe {
        let timer = z4d_registerUVTimer(event_loop, Some(count_and_stop), 1, 5);
        assert!(!timer.is_null());
        assert_eq!(z4d_uv_run(event_loop), 0);
        assert_eq!(REPEAT_HITS.load(Ordering::SeqCst), 2);
        assert_eq!(z4d_loop_close(event_loop), Z4D_OK);
    }
}

static CANCELLED_HITS: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn must_not_fire(_timer: *mut Timer) {
    CANCELLED_HITS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn timer_stopped_before_run_never_fires() {
    let event_loop = newLoop();
    unsafe {
        let timer = z4d_registerUVTimer(event_loop, Some(must_not_fire), 0, 10);
        z4d_stop_uv_timer(timer);
        assert_eq!(z4d_uv_run(event_loop), 0);
        assert_eq!(z4d_loop_close(event_loop), Z4D_OK);
    }
    assert_eq!(CANCELLED_HITS.load(Ordering::SeqCst), 0);
}

static STOPPING_LOOP: AtomicPtr<EventLoop> = AtomicPtr::new(ptr::null_mut());
static NESTED_RUN_STATUS: Mutex<Option<c_int>> = Mutex::new(None);

unsafe extern "C" fn stop_loop_from_callback(_timer: *mut Timer) {
    let event_loop = STOPPING_LOOP.load(Ordering::SeqCst);
    *NESTED_RUN_STATUS.lock().unwrap() = Some(z4d_uv_run(event_loop));
    z4d_uv_stop(event_loop);
}

#[test]
fn stop_and_reentrant_run_from_callback() {
    let event_loop = newLoop();
    STOPPING_LOOP.store(event_loop, Ordering::SeqCst);
    unsafe {
        let timer = z4d_registerUVTimer(event_loop, Some(stop_loop_from_callback), 0, 1);

        // The repeating timer is still armed, so the run ends with work pending.
        assert_eq!(z4d_uv_run(event_loop), 1);
        assert_eq!(*NESTED_RUN_STATUS.lock().unwrap(), Some(Z4D_ERR_LOOP_BUSY));

        z4d_stop_uv_timer(timer);
        assert_eq!(z4d_uv_run(event_loop), 0);
        assert_eq!(z4d_loop_close(event_loop), Z4D_OK);
    }
}

#[test]
fn string_array_sparse_fill() {
    let array = make_char_array(3);
    assert!(!array.is_null());
    unsafe {
        set_char_at(array, z4d_strdup(c"a".as_ptr()), 0);
        set_char_at(array, z4d_strdup(c"c".as_ptr()), 2);

        let slots = array as *const *mut c_void;
        let first = ziti_service_array_get(slots, 0) as *const c_char;
        let third = ziti_service_array_get(slots, 2) as *const c_char;
        assert_eq!(CStr::from_ptr(first), c"a");
        assert!(ziti_service_array_get(slots, 1).is_null());
        assert_eq!(CStr::from_ptr(third), c"c");

        free_char_array(array, 3);
    }
}

#[test]
fn string_array_empty_round_trip() {
    for size in [0, 1, 64] {
        let array = make_char_array(size);
        assert!(!array.is_null());
        unsafe { free_char_array(array, size) };
    }
    assert!(make_char_array(-4).is_null());
}

#[test]
fn config_types_are_all() {
    let types = z4d_all_config_types();
    unsafe {
        assert_eq!(CStr::from_ptr(*types), c"all");
        assert!((*types.add(1)).is_null());
    }
    assert_eq!(types, z4d_all_config_types());
}

#[test]
fn array_accessors() {
    let mut a = 10u8;
    let mut b = 20u8;
    let services: [*mut c_void; 3] = [
        &mut a as *mut u8 as *mut c_void,
        &mut b as *mut u8 as *mut c_void,
        ptr::null_mut(),
    ];
    unsafe {
        assert_eq!(z4d_array_len(services.as_ptr()), 2);
        assert_eq!(ziti_service_array_get(services.as_ptr(), 1), services[1]);
        assert!(ziti_service_array_get(ptr::null(), 0).is_null());
        assert_eq!(z4d_array_len(ptr::null()), 0);
    }
}

#[test]
fn event_discriminant() {
    #[repr(C)]
    struct RouterEvent {
        header: EventHeader,
        name: *const c_char,
        status: c_int,
    }

    let event = RouterEvent {
        header: EventHeader { kind: 2 },
        name: c"edge-router-1".as_ptr(),
        status: 3,
    };
    let header = &event as *const RouterEvent as *const EventHeader;
    let kind = unsafe { ziti_event_type_from_pointer(header) };
    assert_eq!(kind, 2);
}

static ENROLLMENTS: Mutex<Vec<(c_int, usize)>> = Mutex::new(Vec::new());

unsafe extern "C" fn on_enrolled(
    _identity: *const c_char,
    status: c_int,
    _error: *const c_char,
    context: *mut c_void,
) {
    ENROLLMENTS.lock().unwrap().push((status, context as usize));
}

struct StubSdk;

impl IdentitySdk for StubSdk {
    fn enroll(
        &self,
        event_loop: &EventLoop,
        request: EnrollRequest,
        completion: EnrollCompletion,
    ) -> c_int {
        if request.jwt.is_none() {
            return 5;
        }
        event_loop.spawn(async move {
            completion.complete(Ok("{}".to_string()));
        });
        0
    }

    fn dump(&self, _context: SdkContext, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "ziti context dump")
    }
}

fn options(jwt: Option<&'static CStr>) -> EnrollOptions {
    EnrollOptions {
        jwt: jwt.map_or(ptr::null(), CStr::as_ptr),
        enroll_key: ptr::null(),
        enroll_cert: ptr::null(),
        enroll_name: ptr::null(),
        use_keychain: false,
    }
}

const CALLBACK: Option<EnrollCallback> = Some(on_enrolled);

#[test]
#[serial]
fn enroll_without_sdk_is_reported() {
    unregister_sdk();
    let event_loop = newLoop();
    let opts = options(Some(c"jwt"));
    unsafe {
        assert_eq!(
            z4d_ziti_enroll(&opts, event_loop, CALLBACK, ptr::null_mut()),
            Z4D_ERR_SDK_UNAVAILABLE
        );
        assert_eq!(
            z4d_ziti_enroll(ptr::null(), event_loop, CALLBACK, ptr::null_mut()),
            Z4D_ERR_INVALID_ARGUMENT
        );
        assert_eq!(
            z4d_ziti_enroll(&opts, event_loop, None, ptr::null_mut()),
            Z4D_ERR_INVALID_ARGUMENT
        );
        assert_eq!(z4d_loop_close(event_loop), Z4D_OK);
    }
}

#[test]
#[serial]
fn enroll_callback_fires_once_with_context() {
    register_sdk(Arc::new(StubSdk));
    ENROLLMENTS.lock().unwrap().clear();
    let event_loop = newLoop();
    let ctx = 0xC0FFEE as *mut c_void;
    unsafe {
        assert_eq!(z4d_ziti_enroll(&options(Some(c"jwt")), event_loop, CALLBACK, ctx), 0);
        assert_eq!(z4d_ziti_enroll(&options(None), event_loop, CALLBACK, ctx), 5);
        assert_eq!(z4d_uv_run(event_loop), 0);
        assert_eq!(z4d_loop_close(event_loop), Z4D_OK);
    }
    assert_eq!(*ENROLLMENTS.lock().unwrap(), vec![(0, 0xC0FFEE)]);
    unregister_sdk();
}

#[test]
#[serial]
fn closing_loop_cancels_pending_enrollment() {
    register_sdk(Arc::new(StubSdk));
    ENROLLMENTS.lock().unwrap().clear();
    let event_loop = newLoop();
    let ctx = 0xBEEF as *mut c_void;
    unsafe {
        assert_eq!(z4d_ziti_enroll(&options(Some(c"jwt")), event_loop, CALLBACK, ctx), 0);
        assert_eq!(z4d_loop_close(event_loop), Z4D_OK);
    }
    assert_eq!(*ENROLLMENTS.lock().unwrap(), vec![(Z4D_ERR_CANCELLED, 0xBEEF)]);
    unregister_sdk();
}

#[test]
#[serial]
fn dump_file_writes_sdk_output() {
    register_sdk(Arc::new(StubSdk));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.txt");
    let c_path = std::ffi::CString::new(path.to_str().unwrap()).unwrap();

    unsafe { z4d_ziti_dump_file(ptr::null_mut(), c_path.as_ptr()) };
    z4d_ziti_dump_log(ptr::null_mut());

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "ziti context dump\n");
    unregister_sdk();
}

#[test]
fn close_is_a_no_op() {
    assert_eq!(z4d_ziti_close(ptr::null_mut()), Z4D_OK);
}

#[test]
fn version_record() {
    let version = unsafe { &*z4d_get_version() };
    assert_eq!(version.version_str(), env!("CARGO_PKG_VERSION"));
    assert!(!version.revision_str().is_empty());
    assert!(!version.build_date_str().is_empty());
}

#[test]
fn init_logging_accepts_json_config() {
    unsafe {
        assert_eq!(z4d_init_logging(c"{\"log_format\": \"yaml\"}".as_ptr()), Z4D_ERR_CONFIG);
        let first = z4d_init_logging(c"{\"log_filter\": \"debug\"}".as_ptr());
        assert!(first == 0 || first == 1);
        assert_eq!(z4d_init_logging(ptr::null()), 0);
    }
}
