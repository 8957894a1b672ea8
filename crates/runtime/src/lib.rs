//! Native runtime core for the Trill language.
//!
//! This crate is linked into every compiled program and invoked from
//! generated code through the stable C ABI in [`ffi`]. It provides automatic
//! reference counting for indirect types, the type-metadata schema with the
//! `Any` existential box, witness boxes for protocol-constrained generics,
//! the symbol demangler used by the crash stack trace, and the fatal-error
//! machinery (signal handlers, zero-filling allocator, once cells,
//! assertions). The runtime owns no main loop and never suspends; the only
//! concurrency primitives are the per-box atomic retain count and the once
//! cell.

use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

pub mod any;
pub mod arc;
pub mod demangle;
pub mod fatal;
pub mod ffi;
pub mod generics;
pub mod metadata;
pub mod once;

#[cfg(test)]
pub(crate) mod testutil;

pub use any::AnyBox;
pub use arc::Deinitializer;
pub use demangle::demangle;
pub use ffi::*;
pub use generics::GenericBox;
pub use metadata::{FieldMetadata, ProtocolMetadata, TypeMetadata};

static RUNTIME_LOG: AtomicBool = AtomicBool::new(false);
static RUNTIME_LOG_INIT: Once = Once::new();

/// Debug logging is opt-in via `TRILL_RUNTIME_LOG=1`; the flag is read once
/// and cached.
pub(crate) fn log_enabled() -> bool {
    RUNTIME_LOG_INIT.call_once(|| {
        if std::env::var_os("TRILL_RUNTIME_LOG").is_some_and(|v| v == "1") {
            RUNTIME_LOG.store(true, Ordering::Relaxed);
        }
    });
    RUNTIME_LOG.load(Ordering::Relaxed)
}
