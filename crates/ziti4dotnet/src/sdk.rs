//! Hand-off to the identity SDK.
//!
//! The SDK itself lives outside this crate. A host registers its
//! implementation of [`IdentitySdk`] once with [`register_sdk`]; enrollment
//! and diagnostic dumps are forwarded to it unchanged. With no SDK
//! registered the forwarding calls report [`BridgeError::SdkUnavailable`].

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::error::{BridgeError, BridgeResult, Z4D_ERR_CANCELLED, Z4D_ERR_INVALID_STRING};
use crate::event_loop::EventLoop;

static SDK: Lazy<RwLock<Option<Arc<dyn IdentitySdk>>>> = Lazy::new(|| RwLock::new(None));

/// Completion callback for enrollment.
///
/// `identity_json` is the enrolled identity on success (null on failure),
/// `status` is the SDK status (0 on success), `error` is a message on
/// failure (null on success) and `context` is the caller's pointer.
pub type EnrollCallback = unsafe extern "C" fn(
    identity_json: *const c_char,
    status: c_int,
    error: *const c_char,
    context: *mut c_void,
);

/// Enrollment options as laid out by the managed caller.
#[repr(C)]
#[derive(Debug)]
pub struct EnrollOptions {
    /// Enrollment token (JWT).
    pub jwt: *const c_char,
    /// PEM private key, or a key reference when `use_keychain` is set.
    pub enroll_key: *const c_char,
    /// PEM certificate for third-party CA enrollment.
    pub enroll_cert: *const c_char,
    /// Identity name requested from the controller.
    pub enroll_name: *const c_char,
    /// Keep the key in the platform keychain.
    pub use_keychain: bool,
}

/// Owned copy of [`EnrollOptions`] handed to the SDK.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrollRequest {
    pub jwt: Option<String>,
    pub key: Option<String>,
    pub cert: Option<String>,
    pub name: Option<String>,
    pub use_keychain: bool,
}

unsafe fn owned_string(ptr: *const c_char, name: &'static str) -> BridgeResult<Option<String>> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(|s| Some(s.to_owned()))
        .map_err(|_| BridgeError::InvalidString { name })
}

impl EnrollRequest {
    /// Copies the caller's options.
    ///
    /// # Safety
    ///
    /// Every non-null string field must be a valid NUL-terminated string.
    pub unsafe fn from_options(options: &EnrollOptions) -> BridgeResult<Self> {
        Ok(Self {
            jwt: owned_string(options.jwt, "jwt")?,
            key: owned_string(options.enroll_key, "enroll_key")?,
            cert: owned_string(options.enroll_cert, "enroll_cert")?,
            name: owned_string(options.enroll_name, "enroll_name")?,
            use_keychain: options.use_keychain,
        })
    }
}

/// Failed enrollment outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollFailure {
    /// SDK status code (non-zero).
    pub status: c_int,
    /// Human-readable reason.
    pub message: String,
}

/// Caller's callback and context, copied out of an [`EnrollCompletion`].
#[derive(Debug, Clone, Copy)]
struct Delivery {
    callback: EnrollCallback,
    context: *mut c_void,
}

impl Delivery {
    fn succeed(self, identity: String) {
        match CString::new(identity) {
            Ok(identity) => unsafe {
                (self.callback)(identity.as_ptr(), 0, ptr::null(), self.context)
            },
            Err(_) => {
                warn!("enrolled identity contains an interior NUL");
                self.fail(Z4D_ERR_INVALID_STRING, "enrolled identity contains an interior NUL");
            }
        }
    }

    fn fail(self, status: c_int, message: &str) {
        let message = CString::new(message.replace('\0', "")).unwrap_or_default();
        unsafe { (self.callback)(ptr::null(), status, message.as_ptr(), self.context) };
    }

    fn cancel(self) {
        self.fail(Z4D_ERR_CANCELLED, "enrollment cancelled before completion");
    }
}

const PENDING: u8 = 0;
const STARTED: u8 = 1;
const ABANDONED: u8 = 2;

/// One-shot completion for an enrollment.
///
/// Consumed by [`EnrollCompletion::complete`], so the caller's callback
/// runs at most once. The SDK must complete on the loop it was given.
///
/// Dropping a completion of a started enrollment without completing it
/// (the loop was closed with the enrollment queued, or the SDK discarded
/// it) delivers [`Z4D_ERR_CANCELLED`]. A completion dropped while the SDK
/// refuses the request stays silent.
#[derive(Debug)]
pub struct EnrollCompletion {
    delivery: Delivery,
    state: Arc<AtomicU8>,
    delivered: bool,
}

// The context pointer is opaque to the bridge and only returned to the caller.
unsafe impl Send for EnrollCompletion {}
unsafe impl Send for Delivery {}

impl EnrollCompletion {
    /// Wraps the caller's callback and context.
    pub fn new(callback: EnrollCallback, context: *mut c_void) -> Self {
        Self {
            delivery: Delivery { callback, context },
            state: Arc::new(AtomicU8::new(PENDING)),
            delivered: false,
        }
    }

    /// Delivers the outcome to the caller.
    pub fn complete(mut self, outcome: Result<String, EnrollFailure>) {
        self.delivered = true;
        match outcome {
            Ok(identity) => self.delivery.succeed(identity),
            Err(failure) => self.delivery.fail(failure.status, &failure.message),
        }
    }
}

impl Drop for EnrollCompletion {
    fn drop(&mut self) {
        if self.delivered {
            return;
        }
        // Before the SDK has accepted the request, `enroll` decides.
        if self
            .state
            .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return;
        }
        debug!("enrollment completion dropped unfired");
        self.delivery.cancel();
    }
}

/// Opaque SDK context handle, as received from SDK events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdkContext(*mut c_void);

impl SdkContext {
    /// Wraps a raw context pointer.
    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    /// The raw context pointer.
    pub fn as_ptr(&self) -> *mut c_void {
        self.0
    }
}

/// Operations the bridge forwards to the identity SDK.
pub trait IdentitySdk: Send + Sync {
    /// Starts enrollment on `event_loop`.
    ///
    /// Returns 0 if enrollment started; the SDK then completes `completion`
    /// from a task on `event_loop`. A non-zero status means it did not start
    /// and the caller's callback never fires.
    fn enroll(
        &self,
        event_loop: &EventLoop,
        request: EnrollRequest,
        completion: EnrollCompletion,
    ) -> c_int;

    /// Writes a human-readable dump of `context` into `out`.
    fn dump(&self, context: SdkContext, out: &mut dyn Write) -> io::Result<()>;
}

/// Registers the SDK implementation for the whole process.
pub fn register_sdk(sdk: Arc<dyn IdentitySdk>) {
    let mut slot = SDK.write().unwrap_or_else(|e| e.into_inner());
    if slot.replace(sdk).is_some() {
        debug!("replaced registered identity SDK");
    }
}

/// Removes the registered SDK.
pub fn unregister_sdk() {
    SDK.write().unwrap_or_else(|e| e.into_inner()).take();
}

fn current_sdk() -> BridgeResult<Arc<dyn IdentitySdk>> {
    SDK.read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
        .ok_or_else(|| {
            warn!("identity SDK called before registration");
            BridgeError::SdkUnavailable
        })
}

/// Forwards an enrollment request and returns the SDK's status unchanged.
pub fn enroll(
    event_loop: &EventLoop,
    request: EnrollRequest,
    completion: EnrollCompletion,
) -> BridgeResult<c_int> {
    let sdk = current_sdk()?;
    debug!(name = ?request.name, keychain = request.use_keychain, "starting enrollment");

    let delivery = completion.delivery;
    let state = completion.state.clone();
    let status = sdk.enroll(event_loop, request, completion);
    if status == 0
        && state
            .compare_exchange(PENDING, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
    {
        // The SDK accepted the request but dropped the completion already.
        delivery.cancel();
    }
    Ok(status)
}

/// Dumps SDK state to the log, one `info` event per line.
pub fn dump_to_log(context: SdkContext) -> BridgeResult<()> {
    let sdk = current_sdk()?;
    let mut buffer = Vec::new();
    let result = sdk.dump(context, &mut buffer);

    for line in String::from_utf8_lossy(&buffer).lines() {
        info!(target: "ziti4dotnet::dump", "{}", line);
    }
    result.map_err(|source| BridgeError::DumpIo {
        path: "<log>".to_string(),
        source,
    })
}

/// Dumps SDK state into the file at `path`, replacing it.
pub fn dump_to_file(context: SdkContext, path: &Path) -> BridgeResult<()> {
    let sdk = current_sdk()?;
    let dump_error = |source: io::Error| BridgeError::DumpIo {
        path: path.display().to_string(),
        source,
    };

    let mut out = BufWriter::new(File::create(path).map_err(dump_error)?);
    sdk.dump(context, &mut out)
        .and_then(|_| out.flush())
        .map_err(dump_error)?;
    debug!("dumped context to {}", path.display());
    Ok(())
}
