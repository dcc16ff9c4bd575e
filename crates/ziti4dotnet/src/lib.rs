//! Native bridge between the Ziti identity SDK and .NET callers.
//!
//! The managed side cannot walk native structs, index native arrays, free
//! memory it did not allocate, or hand its delegates to an async runtime
//! directly. This crate gives it a flat C surface for all of that:
//!
//! - [`event_loop`]: default and explicit loops, run/stop/close
//! - [`timer`]: repeating and one-shot timers on a loop
//! - [`marshal`]: indexed access to SDK arrays and event discriminants
//! - [`string_array`]: C-heap string arrays built slot by slot
//! - [`config_types`]: the static config-type list
//! - [`sdk`]: enrollment and diagnostic dump hand-off to the SDK
//!
//! # Threading
//!
//! ```text
//! [.NET thread A] --newLoop / z4d_registerUVTimer--> [EventLoop]
//! [.NET thread B] --z4d_uv_run (blocks)------------> [EventLoop]
//!                 <--timer / enroll callbacks------- (on thread B only)
//! ```
//!
//! # Safety
//!
//! Exported functions follow the SDK's contract: handles and indices are
//! trusted, null handles are rejected where a status can be returned, and
//! nothing panics across the boundary.

pub mod config;
pub mod config_types;
pub mod error;
pub mod event_loop;
pub mod exports;
pub mod logging;
pub mod marshal;
pub mod sdk;
pub mod string_array;
pub mod timer;
pub mod version;

pub use config::{BridgeConfig, LogFormat};
pub use error::{BridgeError, BridgeResult};
pub use event_loop::EventLoop;
pub use marshal::{EventHeader, EventKind};
pub use sdk::{
    register_sdk, unregister_sdk, EnrollCompletion, EnrollFailure, EnrollRequest, IdentitySdk,
    SdkContext,
};
pub use string_array::StringArray;
pub use timer::Timer;
