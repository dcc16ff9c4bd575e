//! Error types and status codes for the bridge.
//!
//! Rust-side operations return [`BridgeResult`]. At the C boundary every
//! [`BridgeError`] collapses into one of the stable `Z4D_*` status codes
//! below, so nothing unwinds into the managed caller.

use std::ffi::c_int;
use std::io;
use thiserror::Error;

/// Operation completed.
pub const Z4D_OK: c_int = 0;
/// A required pointer was null or an argument was out of range.
pub const Z4D_ERR_INVALID_ARGUMENT: c_int = -1;
/// A C string was not valid UTF-8 or contained an interior NUL.
pub const Z4D_ERR_INVALID_STRING: c_int = -2;
/// The loop is already being run.
pub const Z4D_ERR_LOOP_BUSY: c_int = -3;
/// No identity SDK has been registered with the bridge.
pub const Z4D_ERR_SDK_UNAVAILABLE: c_int = -4;
/// The async runtime backing a loop could not be created.
pub const Z4D_ERR_RUNTIME: c_int = -5;
/// File or stream I/O failed.
pub const Z4D_ERR_IO: c_int = -6;
/// Bridge configuration could not be parsed.
pub const Z4D_ERR_CONFIG: c_int = -7;
/// A started enrollment was abandoned before it completed.
pub const Z4D_ERR_CANCELLED: c_int = -8;

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised inside the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Building the per-loop runtime failed.
    #[error("Failed to build event loop runtime: {source}")]
    Runtime {
        #[source]
        source: io::Error,
    },

    /// `run` was entered on a loop that is already running.
    #[error("Event loop is already running")]
    LoopBusy,

    /// A caller-supplied argument was rejected.
    #[error("Invalid argument '{name}': {message}")]
    InvalidArgument {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why it was rejected.
        message: String,
    },

    /// A string crossing the boundary could not be converted.
    #[error("Invalid string for '{name}'")]
    InvalidString {
        /// Name of the offending parameter.
        name: &'static str,
    },

    /// No SDK implementation is registered.
    #[error("Identity SDK is not registered")]
    SdkUnavailable,

    /// Dump output could not be written.
    #[error("Failed to write dump to '{path}': {source}")]
    DumpIo {
        /// Target path.
        path: String,
        #[source]
        source: io::Error,
    },

    /// Configuration was malformed.
    #[error("Invalid configuration for {field}: {message}")]
    Config {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },
}

impl BridgeError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Status code reported across the C boundary for this error.
    pub fn status(&self) -> c_int {
        match self {
            BridgeError::Runtime { .. } => Z4D_ERR_RUNTIME,
            BridgeError::LoopBusy => Z4D_ERR_LOOP_BUSY,
            BridgeError::InvalidArgument { .. } => Z4D_ERR_INVALID_ARGUMENT,
            BridgeError::InvalidString { .. } => Z4D_ERR_INVALID_STRING,
            BridgeError::SdkUnavailable => Z4D_ERR_SDK_UNAVAILABLE,
            BridgeError::DumpIo { .. } => Z4D_ERR_IO,
            BridgeError::Config { .. } => Z4D_ERR_CONFIG,
        }
    }
}
