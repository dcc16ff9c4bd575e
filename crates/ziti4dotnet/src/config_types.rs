//! Configuration types requested from the controller.

use std::ffi::{c_char, CStr};

/// Null-terminated list of C string pointers with static lifetime.
#[repr(transparent)]
pub struct StaticCStrList<const N: usize>([*const c_char; N]);

// Every entry points into read-only static data.
unsafe impl<const N: usize> Sync for StaticCStrList<N> {}

impl<const N: usize> StaticCStrList<N> {
    /// Pointer to the first entry, as handed to C.
    pub fn as_ptr(&self) -> *const *const c_char {
        self.0.as_ptr()
    }

    /// Entries before the terminator.
    pub fn iter(&self) -> impl Iterator<Item = &'static CStr> + '_ {
        self.0
            .iter()
            .take_while(|p| !p.is_null())
            .map(|p| unsafe { CStr::from_ptr(*p) })
    }
}

/// Every config type: the SDK expands `"all"` to whatever the controller offers.
pub static ALL_CONFIG_TYPES: StaticCStrList<2> =
    StaticCStrList([c"all".as_ptr(), std::ptr::null()]);

/// Returns the read-only config-type list. Callers must not free it.
pub fn all_config_types() -> *const *const c_char {
    ALL_CONFIG_TYPES.as_ptr()
}
