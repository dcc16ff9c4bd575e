//! Read-only accessors for SDK-owned arrays and event records.
//!
//! The foreign caller cannot walk native layouts, so it reads SDK data one
//! element or one field at a time through these helpers. The unchecked
//! variants keep the SDK's own contract: indices and pointers are trusted.

use std::ffi::c_int;
use std::fmt;

/// Layout shared by every SDK event record: the discriminant comes first,
/// the variant payload follows and is never read here.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EventHeader {
    /// Event discriminant, one of the [`EventKind`] values.
    pub kind: c_int,
}

/// Kinds of events the SDK delivers to its event callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum EventKind {
    /// Context status changed (authenticated, controller unreachable, ...).
    Context = 1,
    /// Edge router connection state changed.
    Router = 1 << 1,
    /// Services were added, changed or removed.
    Service = 1 << 2,
    /// MFA authentication is required.
    MfaAuth = 1 << 3,
    /// Controller API address changed.
    Api = 1 << 4,
}

/// Discriminant value outside the known [`EventKind`] set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownEventKind(pub c_int);

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event kind {}", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

impl TryFrom<c_int> for EventKind {
    type Error = UnknownEventKind;

    fn try_from(value: c_int) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(EventKind::Context),
            2 => Ok(EventKind::Router),
            4 => Ok(EventKind::Service),
            8 => Ok(EventKind::MfaAuth),
            16 => Ok(EventKind::Api),
            other => Err(UnknownEventKind(other)),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Context => write!(f, "context"),
            EventKind::Router => write!(f, "router"),
            EventKind::Service => write!(f, "service"),
            EventKind::MfaAuth => write!(f, "mfa-auth"),
            EventKind::Api => write!(f, "api"),
        }
    }
}

/// Reads the discriminant of an event record.
///
/// # Safety
///
/// `event` must point to a live event record. Null is not checked.
pub unsafe fn event_kind(event: *const EventHeader) -> c_int {
    (*event).kind
}

/// Returns `array[index]`, or null if `array` is null.
///
/// # Safety
///
/// `index` must be within the array; there is no bounds check.
pub unsafe fn element_at<T>(array: *const *mut T, index: usize) -> *mut T {
    if array.is_null() {
        return std::ptr::null_mut();
    }
    *array.add(index)
}

/// Bounds-checked variant of [`element_at`] for callers that know `len`.
///
/// # Safety
///
/// `array` must be null or valid for `len` reads.
pub unsafe fn element_at_checked<T>(
    array: *const *mut T,
    len: usize,
    index: usize,
) -> Option<*mut T> {
    if array.is_null() || index >= len {
        return None;
    }
    Some(*array.add(index))
}

/// Counts the elements before the terminating null of an SDK array.
///
/// # Safety
///
/// `array` must be null or null-terminated.
pub unsafe fn null_terminated_len<T>(array: *const *mut T) -> usize {
    if array.is_null() {
        return 0;
    }
    let mut len = 0;
    while !(*array.add(len)).is_null() {
        len += 1;
    }
    len
}
