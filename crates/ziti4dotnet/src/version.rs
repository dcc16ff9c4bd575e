//! Build identification of the native library.

use std::ffi::{c_char, CStr};

/// Version record returned to the managed caller.
#[repr(C)]
#[derive(Debug)]
pub struct BridgeVersion {
    pub version: *const c_char,
    pub revision: *const c_char,
    pub build_date: *const c_char,
}

// All fields point at static, NUL-terminated strings.
unsafe impl Sync for BridgeVersion {}

static VERSION: BridgeVersion = BridgeVersion {
    version: concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr().cast(),
    revision: concat!(env!("VERGEN_GIT_SHA"), "\0").as_ptr().cast(),
    build_date: concat!(env!("VERGEN_BUILD_TIMESTAMP"), "\0").as_ptr().cast(),
};

impl BridgeVersion {
    fn field(ptr: *const c_char) -> &'static str {
        // Fields are built from string literals above, so they are UTF-8.
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap_or_default()
    }

    /// Crate version.
    pub fn version_str(&self) -> &'static str {
        Self::field(self.version)
    }

    /// Short git revision the library was built from.
    pub fn revision_str(&self) -> &'static str {
        Self::field(self.revision)
    }

    /// UTC build timestamp.
    pub fn build_date_str(&self) -> &'static str {
        Self::field(self.build_date)
    }
}

/// Returns the static version record.
pub fn version() -> &'static BridgeVersion {
    &VERSION
}
